//! Content-addressed storage for resource bytes.
//!
//! Blobs are stored by their SHA-256 hash, sharded into directories
//! by the first byte of the hash.

mod storage;

pub use storage::{BlobStorage, ResourceBlob};
