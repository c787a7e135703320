//! Backing Store (BS): the durable mapping underneath the Composite Store.
//!
//! # Module Structure
//!
//! - [`sqlite`]: the blocking SQLite-backed implementation (`SqliteStore`)
//! - [`async_ops`]: `spawn_blocking` wrappers used by the Composite Store

pub mod async_ops;
mod sqlite;

pub use sqlite::SqliteStore;
