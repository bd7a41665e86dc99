//! Error taxonomy for acquisition sessions.
//!
//! Only [`ValidationError`] and [`TransportError`] are user-actionable: the
//! first blocks a session from starting, the second ends it in
//! [`Phase::Failed`](crate::session::Phase::Failed). Per-sample problems are
//! not errors at all; they travel as
//! [`AcquisitionEvent::Error`](crate::event::AcquisitionEvent::Error) and the
//! session keeps running. [`PersistenceError`] is logged and never reaches the
//! session.

use std::path::PathBuf;

use thiserror::Error;

/// The request configuration is incomplete; collection was not started.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// No source device was selected.
    #[error("No source selected")]
    MissingSource,

    /// Output goes to a file but no file path was given.
    #[error("A file path is required for file output")]
    MissingFilePath,

    /// A session is already collecting.
    #[error("A collection is already in progress")]
    AlreadyCollecting,
}

/// The acquisition request itself was rejected or broke down.
///
/// The message is what the user sees after `"Collection failed: "`, so it is
/// kept verbatim rather than wrapped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for TransportError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for TransportError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Reading or writing the persisted configuration failed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    /// True when the settings file simply does not exist yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Failure in one of the auxiliary randomness tools.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("Empty range: start ({start}) must be less than end ({end})")]
    EmptyRange { start: i64, end: i64 },

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid key: expected 64 hex characters for AES-256")]
    InvalidKey,

    #[error("Invalid ciphertext: expected hex of nonce and message")]
    InvalidCiphertext,

    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed: wrong key, or the message was corrupted")]
    DecryptionFailed,

    #[error(transparent)]
    Source(#[from] TransportError),
}
