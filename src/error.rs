//! Error types shared across the crate.
//!
//! A cache miss is not an error anywhere in this crate: cache reads
//! return `Ok(None)` and callers fall through to the source. The
//! variants below cover the failures that do surface to callers.

use thiserror::Error;

/// Errors surfaced by document sources, the cache, and the loader.
#[derive(Error, Debug)]
pub enum Error {
    /// The source has no document with this id.
    #[error("document not found: {id}")]
    DocumentNotFound { id: String },

    /// Transport or auth failure from a source. `transient` distinguishes
    /// retryable outages from permanent failures; the core never retries
    /// either — that is the caller's call.
    #[error("source failure: {message}")]
    Remote { message: String, transient: bool },

    /// Cache or source filesystem I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache snapshot could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration detected at load time.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Build a transient source failure.
    pub fn transient(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
            transient: true,
        }
    }

    /// Build a permanent source failure.
    pub fn permanent(message: impl Into<String>) -> Self {
        Error::Remote {
            message: message.into(),
            transient: false,
        }
    }

    /// True for [`Error::DocumentNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::DocumentNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
