//! Core data model types for message records, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod mail;
