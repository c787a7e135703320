//! Key encoding and value serialization boundary.
//!
//! A text key is encoded to bytes under a fixed encoding (UTF-8 by
//! default); byte-valued keys pass through unchanged. Values that are
//! already byte sequences are stored verbatim; other values are converted
//! to bytes with `bincode`, whose output is losslessly reversed by the
//! paired deserializer.

use crate::error::{Error, Result};
use serde::{de::DeserializeOwned, Serialize};

/// Encodes a text key to its persisted byte representation.
///
/// Only UTF-8 is currently supported, matching `Config::main.keyencoding`'s
/// default.
#[must_use]
pub fn encode_key(key: &str) -> Vec<u8> {
    key.as_bytes().to_vec()
}

/// Decodes a persisted key back to text.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the bytes are not valid UTF-8.
pub fn decode_key(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| Error::Serialization(format!("key is not valid utf-8: {e}")))
}

/// Serializes a value to its persisted blob representation.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the value cannot be encoded.
pub fn serialize_value<V: Serialize>(value: &V) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| Error::Serialization(e.to_string()))
}

/// Deserializes a value from its persisted blob representation.
///
/// # Errors
///
/// Returns [`Error::Serialization`] if the bytes cannot be decoded.
pub fn deserialize_value<V: DeserializeOwned>(bytes: &[u8]) -> Result<V> {
    bincode::deserialize(bytes).map_err(|e| Error::Serialization(e.to_string()))
}
