//! # `tierkv`
//!
//! A two-tier key/value store: a bounded, recency-ordered in-memory cache
//! (the Recency Index) in front of a durable, blob-valued backing store.
//! Writes land in the cache; when the cache fills, the oldest
//! configurable fraction of it is synced to the backing store in one
//! batch. Reads consult the cache first, then the backing store,
//! promoting any value found there back into the cache.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tierkv::{CompositeStore, StoreOptions};
//!
//! # async fn run() -> tierkv::Result<()> {
//! let mut store = CompositeStore::new("documents");
//! store.connect("./data/documents.db", StoreOptions::default()).await?;
//!
//! store.write("hello", &"world".to_string()).await?;
//! let value: Option<String> = store.read("hello").await?;
//!
//! store.close().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod config;
pub mod error;
pub mod recency;
pub mod storage;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use recency::RecencyIndex;
pub use store::{CollectionIter, CompositeStore, StoreOptions};

/// Installs a `tracing` subscriber reading `RUST_LOG` (or `tierkv=info` by
/// default). Intended for binaries embedding `tierkv`, such as the
/// `demos/workload_driver` example; the library itself never installs a
/// global subscriber.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tierkv=info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
