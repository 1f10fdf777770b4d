//! Error types for snapshot persistence.

/// Errors from the key-value snapshot store.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Writing the entry would exceed the store's byte quota.
    #[error("Storage quota exceeded writing {key}: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        /// Key being written
        key: String,
        /// Size of the rejected entry
        needed: u64,
        /// Bytes left under the quota
        available: u64,
    },

    /// Filesystem error on the backing directory.
    #[error("Storage I/O error at {path}")]
    Io {
        /// File that caused the error
        path: String,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A snapshot could not be encoded.
    #[error("Failed to serialize {key}")]
    Serialization {
        /// Key being written
        key: String,
        /// The underlying serde error
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Create an `Io` error for a path.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Serialization` error for a key.
    pub fn serialization(key: impl Into<String>, source: serde_json::Error) -> Self {
        StorageError::Serialization {
            key: key.into(),
            source,
        }
    }

    /// Whether the write was refused for lack of space.
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            StorageError::QuotaExceeded { .. } => true,
            StorageError::Io { source, .. } => {
                source.kind() == std::io::ErrorKind::StorageFull
                    || source.kind() == std::io::ErrorKind::QuotaExceeded
            }
            StorageError::Serialization { .. } => false,
        }
    }
}
