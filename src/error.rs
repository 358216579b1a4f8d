//! Error types for the vocabulary store.

use crate::types::{AggregateKind, Hash};
use std::time::Duration;
use thiserror::Error;

/// Main error type for store and persist operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: AggregateKind, id: String },

    #[error("Blob not found: {0}")]
    BlobNotFound(Hash),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Store not initialized")]
    NotInitialized,

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Hash mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: Hash, got: Hash },

    #[error("Persist failed: {0}")]
    Persist(String),

    #[error("Save panicked: {0}")]
    SavePanicked(String),

    #[error("Startup timed out after {0:?}")]
    Timeout(Duration),

    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),
}

impl StoreError {
    /// Shorthand for a missing aggregate.
    pub fn not_found(kind: AggregateKind, id: impl ToString) -> Self {
        StoreError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for StoreError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for StoreError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        StoreError::Deserialization(e.to_string())
    }
}

impl From<tokio::runtime::TryCurrentError> for StoreError {
    fn from(e: tokio::runtime::TryCurrentError) -> Self {
        StoreError::NoRuntime(e.to_string())
    }
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        StoreError::TaskFailed(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
