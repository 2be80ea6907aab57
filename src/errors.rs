//! Error types for key generation, store initialization and uploads.

use std::path::PathBuf;

use thiserror::Error;

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum KeygenError {
    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// The service-account credential file does not exist.
    #[error("service account key file not found at '{}'", .0.display())]
    CredentialsNotFound(PathBuf),

    /// The credential path exists but could not be read.
    #[error("cannot read service account key file '{}': {source}", path.display())]
    CredentialsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The credential file exists but is not a usable service-account key.
    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),

    /// The token endpoint rejected the service-account assertion.
    #[error("authentication failed: {0}")]
    AuthError(String),

    /// Transport-level failure talking to a remote endpoint.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The document store returned an error for a request.
    #[error("store error: {0}")]
    StoreError(String),

    /// A strict create hit an existing document with the same ID.
    #[error("document '{0}' already exists")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl KeygenError {
    /// Operator-facing hint printed after startup failures.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            KeygenError::CredentialsNotFound(_) => Some(
                "Please download it from Firebase Console -> Project settings -> Service accounts \
                 and set 'credentials.path' (or AURA_CREDENTIALS_PATH) to its location.",
            ),
            KeygenError::CredentialsUnreadable { .. } => Some(
                "Check that 'credentials.path' names a readable file, not a directory.",
            ),
            KeygenError::InvalidCredentials(_) | KeygenError::AuthError(_) => Some(
                "Please ensure 'credentials.path' points to a valid, non-revoked service account key.",
            ),
            KeygenError::ConfigError(_) => {
                Some("Check config.toml and AURA_* environment variables.")
            }
            _ => None,
        }
    }

    /// Whether this error means the target document ID is taken.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, KeygenError::AlreadyExists(_))
    }
}

/// Convenience result alias.
pub type KeygenResult<T> = Result<T, KeygenError>;
