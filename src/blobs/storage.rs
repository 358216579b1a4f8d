//! Resource blob storage.

use crate::error::{Result, StoreError};
use crate::types::Hash;
use lru::LruCache;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Magic bytes for blob files.
const BLOB_MAGIC: &[u8; 4] = b"RES\0";

/// Current blob format version.
const BLOB_VERSION: u8 = 1;

/// Bytes of a stored resource.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceBlob {
    pub hash: Hash,
    pub content_type: String,
    pub content: Arc<[u8]>,
}

/// Content-addressed storage for resource bytes.
///
/// Identical images uploaded twice share one file.
pub struct BlobStorage {
    path: PathBuf,
    cache: Mutex<LruCache<Hash, ResourceBlob>>,
}

impl BlobStorage {
    /// Open blob storage rooted at `path`, caching up to `cache_size` blobs.
    pub fn new(path: impl AsRef<Path>, cache_size: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        fs::create_dir_all(&path)?;

        let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Ok(Self {
            path,
            cache: Mutex::new(LruCache::new(cache_size)),
        })
    }

    /// Store bytes, returning their hash. Storing existing content is a no-op.
    pub fn put(&self, content: &[u8], content_type: &str) -> Result<Hash> {
        let hash = Hash::from_bytes(content);
        if self.exists(&hash) {
            return Ok(hash);
        }

        fs::create_dir_all(self.shard_path(&hash))?;

        // A blob only appears under its hash once fully written.
        let blob_path = self.blob_path(&hash);
        let tmp_path = blob_path.with_extension("tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(BLOB_MAGIC)?;
            file.write_all(&[BLOB_VERSION])?;

            let content_type_bytes = content_type.as_bytes();
            file.write_all(&(content_type_bytes.len() as u16).to_le_bytes())?;
            file.write_all(content_type_bytes)?;

            file.write_all(&(content.len() as u64).to_le_bytes())?;
            file.write_all(content)?;
            file.write_all(&crc32fast::hash(content).to_le_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &blob_path)?;

        tracing::debug!(%hash, size = content.len(), "stored resource blob");

        self.cache.lock().put(
            hash,
            ResourceBlob {
                hash,
                content_type: content_type.to_string(),
                content: Arc::from(content),
            },
        );

        Ok(hash)
    }

    /// Read a blob, verifying checksum and hash.
    pub fn get(&self, hash: &Hash) -> Result<Option<ResourceBlob>> {
        if let Some(cached) = self.cache.lock().get(hash).cloned() {
            return Ok(Some(cached));
        }

        let blob_path = self.blob_path(hash);
        if !blob_path.exists() {
            return Ok(None);
        }

        let mut file = File::open(&blob_path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != BLOB_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid blob magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != BLOB_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported blob version: {}",
                version[0]
            )));
        }

        let mut type_len_bytes = [0u8; 2];
        file.read_exact(&mut type_len_bytes)?;
        let mut type_bytes = vec![0u8; u16::from_le_bytes(type_len_bytes) as usize];
        file.read_exact(&mut type_bytes)?;
        let content_type = String::from_utf8_lossy(&type_bytes).into_owned();

        let mut content_len_bytes = [0u8; 8];
        file.read_exact(&mut content_len_bytes)?;
        let mut content = vec![0u8; u64::from_le_bytes(content_len_bytes) as usize];
        file.read_exact(&mut content)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored_checksum = u32::from_le_bytes(checksum_bytes);
        let computed_checksum = crc32fast::hash(&content);
        if stored_checksum != computed_checksum {
            return Err(StoreError::ChecksumMismatch {
                expected: stored_checksum,
                got: computed_checksum,
            });
        }

        let computed_hash = Hash::from_bytes(&content);
        if &computed_hash != hash {
            return Err(StoreError::HashMismatch {
                expected: *hash,
                got: computed_hash,
            });
        }

        let blob = ResourceBlob {
            hash: *hash,
            content_type,
            content: Arc::from(content),
        };
        self.cache.lock().put(*hash, blob.clone());

        Ok(Some(blob))
    }

    pub fn exists(&self, hash: &Hash) -> bool {
        self.cache.lock().contains(hash) || self.blob_path(hash).exists()
    }

    /// Remove a blob. Returns whether it existed.
    pub fn remove(&self, hash: &Hash) -> Result<bool> {
        self.cache.lock().pop(hash);

        let blob_path = self.blob_path(hash);
        if blob_path.exists() {
            fs::remove_file(&blob_path)?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// All stored hashes.
    pub fn list(&self) -> Result<Vec<Hash>> {
        let mut hashes = Vec::new();
        for entry in self.blob_files()? {
            if let Ok(hash) = Hash::from_hex(&entry.file_name().to_string_lossy()) {
                hashes.push(hash);
            }
        }
        Ok(hashes)
    }

    /// Total bytes on disk.
    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0u64;
        for entry in self.blob_files()? {
            total += entry.metadata()?.len();
        }
        Ok(total)
    }

    fn blob_files(&self) -> Result<Vec<fs::DirEntry>> {
        let mut files = Vec::new();
        for shard in fs::read_dir(&self.path)? {
            let shard = shard?;
            if shard.file_type()?.is_dir() {
                for entry in fs::read_dir(shard.path())? {
                    files.push(entry?);
                }
            }
        }
        Ok(files)
    }

    fn shard_path(&self, hash: &Hash) -> PathBuf {
        self.path.join(hash.shard_prefix())
    }

    fn blob_path(&self, hash: &Hash) -> PathBuf {
        self.shard_path(hash).join(hash.to_hex())
    }
}
