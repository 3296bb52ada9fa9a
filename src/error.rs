//! Error types for store operations.
//!
//! A record that can't be found is *not* an error. Lookups return `Option`
//! and deletes return `bool`. Everything in [`Error`] is a hard failure the
//! caller has to deal with.

use std::io;
use std::path::PathBuf;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by a [`Database`](crate::db::database::Database).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The collection name can't be mapped to a file in the data directory.
    #[error("invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// The data directory or a collection file couldn't be read, created
    /// or written (permissions, disk full, ...).
    #[error("storage unavailable at {}: {source}", .path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A collection file exists but doesn't hold a JSON array of objects.
    ///
    /// Only returned by operations that would rewrite the file. Read-only
    /// operations treat a corrupt collection as empty.
    #[error("collection {collection:?} is corrupt: {source}")]
    CorruptCollection {
        collection: String,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory collection couldn't be encoded.
    #[error("failed to serialize collection {collection:?}: {source}")]
    Serialize {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::StorageUnavailable {
            path: path.into(),
            source,
        }
    }
}
