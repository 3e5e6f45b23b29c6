//! Archive ingestion: reading, splitting into chunks, and per-message parsing.

pub mod archive;
pub mod header;
pub mod mbox;
pub mod message;
pub mod mime;
