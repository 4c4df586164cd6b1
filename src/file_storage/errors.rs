//! # File Storage Errors

use std::io;

use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// File storage errors
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    // Object errors
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    // I/O errors
    #[error("Read error: {0}")]
    ReadError(String),

    #[error("Write error: {0}")]
    WriteError(String),

    #[error("Storage full")]
    StorageFull,

    #[error("Copy error: {0}")]
    CopyError(String),

    #[error("Delete error: {0}")]
    DeleteError(String),

    #[error("Content length mismatch: expected {expected} bytes, wrote {actual}")]
    ContentLengthMismatch { expected: u64, actual: u64 },

    // Signed URL errors
    #[error("URL expired")]
    UrlExpired,

    #[error("Invalid signature")]
    InvalidSignature,

    // Configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StorageError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            StorageError::ObjectNotFound(_) => 404,
            StorageError::InvalidPath(_) => 400,
            StorageError::ReadError(_) => 500,
            StorageError::WriteError(_) => 500,
            StorageError::StorageFull => 507,
            StorageError::CopyError(_) => 500,
            StorageError::DeleteError(_) => 500,
            StorageError::ContentLengthMismatch { .. } => 400,
            StorageError::UrlExpired => 403,
            StorageError::InvalidSignature => 403,
            StorageError::InvalidConfig(_) => 500,
        }
    }

    /// Classify an error from stat/open/read
    pub(crate) fn on_read(key: &str, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => StorageError::ObjectNotFound(key.to_string()),
            _ => StorageError::ReadError(format!("{}: {}", key, e)),
        }
    }

    /// Classify an error from create/write/rename
    pub(crate) fn on_write(key: &str, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::StorageFull => StorageError::StorageFull,
            _ => StorageError::WriteError(format!("{}: {}", key, e)),
        }
    }

    /// Classify an error from a recursive copy
    pub(crate) fn on_copy(source: &str, e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::StorageFull => StorageError::StorageFull,
            _ => StorageError::CopyError(format!("{}: {}", source, e)),
        }
    }

    /// Classify an error from a recursive delete
    pub(crate) fn on_delete(key: &str, e: io::Error) -> Self {
        StorageError::DeleteError(format!("{}: {}", key, e))
    }
}
