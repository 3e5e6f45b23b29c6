//! Writing archives: MBOX serialization, merging, and split output.

pub mod mbox;
pub mod split;
