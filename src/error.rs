//! Error types for `tierkv`.
//!
//! This module provides a unified error type for all composite-store
//! operations, following the taxonomy of §7: `BadArgument`, `NotFound`,
//! `Storage`, `NotOpen`, `Corrupt`.

use thiserror::Error;

/// Result type alias for `tierkv` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while operating a [`crate::store::CompositeStore`].
///
/// Each variant carries enough context to identify the collection and, where
/// relevant, the offending key. Error codes follow the pattern `TIER-0NN`.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller passed a value of the wrong shape (TIER-001).
    ///
    /// Raised by `write` for inputs that are neither a single pair nor a
    /// mapping, and by `read` for inputs that are neither a key nor a
    /// sequence of keys.
    #[error("[TIER-001] bad argument: {detail}")]
    BadArgument {
        /// Description of the shape mismatch.
        detail: String,
    },

    /// A `get`-style lookup found no value and no default was supplied (TIER-002).
    #[error("[TIER-002] key not found: collection='{collection}', key={key:?}")]
    NotFound {
        /// Collection the lookup was against.
        collection: String,
        /// The encoded key bytes that were missing.
        key: Vec<u8>,
    },

    /// The durable engine reported a failure (TIER-003).
    #[error("[TIER-003] storage error: collection='{collection}': {source}")]
    Storage {
        /// Collection the operation was against.
        collection: String,
        /// Underlying error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Operation issued against a collection that is not open (TIER-004).
    #[error("[TIER-004] collection '{0}' is not open")]
    NotOpen(String),

    /// An internal invariant was violated (TIER-005). Fatal: the collection
    /// must be considered unusable.
    #[error("[TIER-005] corrupt state in collection '{collection}': {detail}")]
    Corrupt {
        /// Collection the check failed in.
        collection: String,
        /// Description of the violated invariant.
        detail: String,
    },

    /// Key or value (de)serialization failed (TIER-006).
    #[error("[TIER-006] serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded or failed validation (TIER-007).
    #[error("[TIER-007] configuration error: {0}")]
    Config(String),

    /// IO error (TIER-008).
    #[error("[TIER-008] IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns the stable error code (e.g. `"TIER-001"`).
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadArgument { .. } => "TIER-001",
            Self::NotFound { .. } => "TIER-002",
            Self::Storage { .. } => "TIER-003",
            Self::NotOpen(_) => "TIER-004",
            Self::Corrupt { .. } => "TIER-005",
            Self::Serialization(_) => "TIER-006",
            Self::Config(_) => "TIER-007",
            Self::Io(_) => "TIER-008",
        }
    }

    /// Returns true if the collection is still usable after this error.
    ///
    /// `Corrupt` is fatal; every other variant is recoverable.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Corrupt { .. })
    }

    pub(crate) fn storage(
        collection: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            collection: collection.into(),
            source: Box::new(source),
        }
    }
}
