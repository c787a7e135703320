//! The Recency Index (RI): a bounded, recency-ordered cache in front of
//! the durable backing store.

mod lru;

pub use lru::{Blob, RecencyIndex};
