//! `mboxcraft`: ingest loosely formatted MBOX archives and re-partition them.
//!
//! The library reads an archive into memory, cuts it into per-message chunks,
//! parses each chunk into a [`model::mail::MailMessage`], groups records into
//! subject threads, and splits or merges archives under several strategies.
//! [`engine::Engine`] ties the pieces together with cancellation and progress.

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod partition;
pub mod progress;
pub mod threading;
