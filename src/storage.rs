use std::path::PathBuf;

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub mod json;

/// Write-side failures. Reads never fail: a missing, unreadable or corrupt
/// document is simply absent.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create cache directory '{path}': {source}")]
    CreateDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to save cache file '{path}': {source}")]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize cache document to JSON: {source}")]
    SerializeFailed {
        #[source]
        source: serde_json::Error,
    },
}

/// A directory of named JSON documents, each replaced wholesale on write.
pub trait Storage {
    fn read<T: DeserializeOwned>(&self, name: &str) -> Option<T>;
    fn write<T: Serialize>(&self, name: &str, document: &T) -> Result<(), StorageError>;
}
