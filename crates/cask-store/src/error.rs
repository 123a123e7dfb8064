use thiserror::Error;

/// Errors from blob store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key does not exist in the store.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// No routing branch matched the key and no default store is configured.
    #[error("no route for key: {0}")]
    NoRoute(String),

    /// A constructor or operation was given an unusable argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Decryption or authentication failed (wrong key, tampered data).
    #[error("integrity failure: {0}")]
    Integrity(String),

    /// Opaque failure from a backend (unreachable service, poisoned state).
    #[error("backend failure: {0}")]
    Backend(String),

    /// I/O error from the underlying storage medium.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
