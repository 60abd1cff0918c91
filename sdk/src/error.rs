use thiserror::Error;

/// Failure of a transfer job or one of its steps.
///
/// Only [`Error::Network`] is transient: it is retried by
/// [`RetryPolicy`](crate::retry::RetryPolicy) and surfaced only after the
/// attempts are exhausted. Every other kind is final.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed caller input. Never retried.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("a file named {0:?} already exists in the store")]
    DuplicateContainer(String),
    #[error("no file named {0:?} in the store")]
    NotFound(String),
    #[error("network error: {0:#}")]
    Network(anyhow::Error),
    /// The store understood the request and rejected it.
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
    #[error("wrong passphrase or corrupted data")]
    Authentication,
    #[error("integrity check failed: {0}")]
    Integrity(String),
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    /// The cipher refused to seal a chunk.
    #[error("encryption failed: {0}")]
    Encryption(String),
}

impl Error {
    #[must_use]
    #[inline]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    #[inline]
    pub fn network(err: impl Into<anyhow::Error>) -> Self {
        Self::Network(err.into())
    }

    #[inline]
    pub fn store(err: impl Into<anyhow::Error>) -> Self {
        Self::Store(err.into())
    }

    #[inline]
    pub fn integrity(err: impl Into<anyhow::Error>) -> Self {
        Self::Integrity(format!("{:#}", err.into()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
