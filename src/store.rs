//! Durable local store tying the mutation log, blob storage and tables
//! together.

use crate::blobs::{BlobStorage, ResourceBlob};
use crate::error::{Result, StoreError};
use crate::persist::{Repository, SettingsRepository, TableAccess, Tables};
use crate::records::{LogOp, MutationLog};
use crate::types::{
    Aggregate, AggregateId, AggregateKind, Category, CategoryChanges, CategoryId, NewCategory,
    NewResource, NewWord, Resource, ResourceChanges, ResourceId, Settings, SettingsChanges,
    StoreStats, Timestamp, Word, WordChanges, WordId,
};
use async_trait::async_trait;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Handle;

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Base path for the store.
    pub path: PathBuf,

    /// Resource blob cache size (number of blobs).
    pub blob_cache_size: usize,

    /// Whether to create the store if it doesn't exist.
    pub create_if_missing: bool,

    /// Sync the mutation log every N writes.
    pub sync_interval: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./vocabulary"),
            blob_cache_size: 256,
            create_if_missing: true,
            sync_interval: MutationLog::DEFAULT_SYNC_INTERVAL,
        }
    }
}

/// Outcome of [`Store::compact`].
#[derive(Clone, Debug)]
pub struct CompactionSummary {
    pub entries_before: u64,
    pub entries_after: u64,
    pub bytes_before: u64,
    pub bytes_after: u64,
}

/// Magic bytes for store manifest.
const STORE_MAGIC: &[u8; 4] = b"AAC\0";

/// Current store format version.
const STORE_VERSION: u8 = 1;

/// Log id used for the settings singleton.
const SETTINGS_LOG_ID: u64 = 0;

/// The durable vocabulary store.
///
/// Layout on disk:
/// - `MANIFEST`: magic and format version
/// - `LOCK`: held exclusively while the store is open
/// - `mutations.log`: every put/delete, replayed on open
/// - `blobs/`: resource bytes by content hash
///
/// Writes go to the log before the in-memory tables, and are serialized
/// by a write lock. The async persist operations run their file IO on
/// Tokio's blocking pool.
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: StoreConfig,

    /// Lock file for exclusive access.
    _lock_file: File,

    log: MutationLog,

    blobs: BlobStorage,

    tables: RwLock<Tables>,

    /// Lock for write operations to ensure atomicity.
    write_lock: Mutex<()>,
}

impl Store {
    /// Open an existing store or create a new one.
    pub fn open_or_create(config: StoreConfig) -> Result<Self> {
        if config.path.join("MANIFEST").exists() {
            Self::open(config)
        } else if config.create_if_missing {
            Self::create(config)
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Create a new store.
    pub fn create(config: StoreConfig) -> Result<Self> {
        fs::create_dir_all(&config.path)?;
        Self::write_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let log = MutationLog::open_with_sync_interval(
            config.path.join("mutations.log"),
            config.sync_interval,
        )?;
        let blobs = BlobStorage::new(config.path.join("blobs"), config.blob_cache_size)?;

        tracing::info!(path = %config.path.display(), "created vocabulary store");

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                _lock_file: lock_file,
                log,
                blobs,
                tables: RwLock::new(Tables::new()),
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Open an existing store, replaying its mutation log.
    pub fn open(config: StoreConfig) -> Result<Self> {
        Self::verify_manifest(&config.path)?;

        let lock_file = Self::acquire_lock(&config.path)?;
        let log = MutationLog::open_with_sync_interval(
            config.path.join("mutations.log"),
            config.sync_interval,
        )?;
        let blobs = BlobStorage::new(config.path.join("blobs"), config.blob_cache_size)?;
        let tables = Self::replay(&log)?;

        tracing::info!(
            path = %config.path.display(),
            words = tables.words.len(),
            categories = tables.categories.len(),
            resources = tables.resources.len(),
            "opened vocabulary store"
        );

        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                _lock_file: lock_file,
                log,
                blobs,
                tables: RwLock::new(tables),
                write_lock: Mutex::new(()),
            }),
        })
    }

    /// Rebuild the tables from the log.
    fn replay(log: &MutationLog) -> Result<Tables> {
        let mut tables = Tables::new();

        for entry in log.entries()? {
            match (entry.kind, entry.op) {
                (AggregateKind::Word, LogOp::Put(body)) => {
                    tables.words.put(rmp_serde::from_slice(&body)?);
                }
                (AggregateKind::Category, LogOp::Put(body)) => {
                    tables.categories.put(rmp_serde::from_slice(&body)?);
                }
                (AggregateKind::Resource, LogOp::Put(body)) => {
                    tables.resources.put(rmp_serde::from_slice(&body)?);
                }
                (AggregateKind::Settings, LogOp::Put(body)) => {
                    tables.settings = Some(rmp_serde::from_slice(&body)?);
                }
                (AggregateKind::Word, LogOp::Delete) => {
                    tables.words.remove(WordId(entry.id));
                }
                (AggregateKind::Category, LogOp::Delete) => {
                    tables.categories.remove(CategoryId(entry.id));
                }
                (AggregateKind::Resource, LogOp::Delete) => {
                    tables.resources.remove(ResourceId(entry.id));
                }
                (AggregateKind::Settings, LogOp::Delete) => {
                    return Err(StoreError::Corruption(format!(
                        "settings delete at seq {}",
                        entry.seq
                    )));
                }
            }
        }

        Ok(tables)
    }

    /// Run `op` on the blocking pool and wait for it.
    async fn blocking<R, F>(&self, op: F) -> Result<R>
    where
        F: FnOnce(&StoreInner) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        Ok(Handle::try_current()?
            .spawn_blocking(move || op(&inner))
            .await??)
    }

    // --- Resources ---

    /// Bytes of a stored resource.
    pub fn resource_content(&self, id: ResourceId) -> Result<ResourceBlob> {
        self.inner.resource_content(id)
    }

    // --- Maintenance ---

    /// Rewrite the log with one `put` per live aggregate.
    pub fn compact(&self) -> Result<CompactionSummary> {
        self.inner.compact()
    }

    /// Get store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        self.inner.stats()
    }

    /// Force sync all pending log writes.
    pub fn sync(&self) -> Result<()> {
        self.inner.log.sync()
    }

    /// Get the store path.
    pub fn path(&self) -> &Path {
        &self.inner.config.path
    }

    fn write_manifest(path: &Path) -> Result<()> {
        use std::io::Write;

        let mut file = File::create(path.join("MANIFEST"))?;
        file.write_all(STORE_MAGIC)?;
        file.write_all(&[STORE_VERSION])?;
        file.sync_all()?;

        Ok(())
    }

    fn verify_manifest(path: &Path) -> Result<()> {
        use std::io::Read;

        let mut file = File::open(path.join("MANIFEST"))?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != STORE_MAGIC {
            return Err(StoreError::InvalidFormat("Invalid store magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != STORE_VERSION {
            return Err(StoreError::InvalidFormat(format!(
                "Unsupported store version: {}",
                version[0]
            )));
        }

        Ok(())
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_file = File::create(path.join("LOCK"))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;
        Ok(lock_file)
    }
}

impl StoreInner {
    // --- Aggregate writes ---

    /// Log and insert a new aggregate. The caller holds `write_lock`.
    fn insert<A>(&self, draft: A::Draft) -> Result<A>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        let id = TableAccess::<A>::table(&*self.tables.read()).peek_id();
        let item = A::from_draft(id, draft, Timestamp::now());

        self.log.append_put(A::KIND, id.raw(), &item)?;
        TableAccess::<A>::table_mut(&mut *self.tables.write()).put(item.clone());

        tracing::debug!(kind = %A::KIND, %id, "created");
        Ok(item)
    }

    /// Log and remove an aggregate if present. The caller holds `write_lock`.
    fn remove<A>(&self, id: A::Id) -> Result<Option<A>>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        if !TableAccess::<A>::table(&*self.tables.read()).contains(id) {
            return Ok(None);
        }

        self.log.append(A::KIND, id.raw(), LogOp::Delete)?;
        let removed = TableAccess::<A>::table_mut(&mut *self.tables.write()).remove(id);

        tracing::debug!(kind = %A::KIND, %id, "deleted");
        Ok(removed)
    }

    fn create_in<A>(&self, draft: A::Draft) -> Result<A>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        let _lock = self.write_lock.lock();
        self.insert::<A>(draft)
    }

    fn update_in<A>(&self, id: A::Id, changes: &A::Changes) -> Result<()>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        let _lock = self.write_lock.lock();

        let item = TableAccess::<A>::table(&*self.tables.read()).updated(
            id,
            changes,
            Timestamp::now(),
        )?;

        self.log.append_put(A::KIND, id.raw(), &item)?;
        TableAccess::<A>::table_mut(&mut *self.tables.write()).put(item);

        tracing::debug!(kind = %A::KIND, %id, "updated");
        Ok(())
    }

    fn delete_in<A>(&self, id: A::Id) -> Result<Option<A>>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        let _lock = self.write_lock.lock();
        self.remove::<A>(id)
    }

    fn all_in<A>(&self) -> Vec<A>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        TableAccess::<A>::table(&*self.tables.read()).all()
    }

    // Blob writes and removals happen under `write_lock`, so a blob is never
    // removed between another create's existence check and its table insert.

    fn create_resource(&self, draft: NewResource) -> Result<Resource> {
        let _lock = self.write_lock.lock();
        self.blobs.put(&draft.data, &draft.content_type)?;
        self.insert::<Resource>(draft)
    }

    fn delete_resource(&self, id: ResourceId) -> Result<()> {
        let _lock = self.write_lock.lock();

        if let Some(removed) = self.remove::<Resource>(id)? {
            let still_used = self
                .tables
                .read()
                .resources
                .iter()
                .any(|r| r.hash == removed.hash);
            if !still_used {
                self.blobs.remove(&removed.hash)?;
            }
        }
        Ok(())
    }

    fn settings_or_default(&self) -> Result<Settings> {
        if let Some(settings) = self.tables.read().settings.clone() {
            return Ok(settings);
        }

        let _lock = self.write_lock.lock();
        // Another caller may have materialized it while we waited.
        if let Some(settings) = self.tables.read().settings.clone() {
            return Ok(settings);
        }

        let settings = Settings::defaults(Timestamp::now());
        self.log
            .append_put(AggregateKind::Settings, SETTINGS_LOG_ID, &settings)?;
        self.tables.write().settings = Some(settings.clone());

        tracing::info!("materialized default settings");
        Ok(settings)
    }

    fn apply_settings(&self, changes: &SettingsChanges) -> Result<()> {
        let _lock = self.write_lock.lock();

        let settings = self.tables.read().updated_settings(changes, Timestamp::now());
        self.log
            .append_put(AggregateKind::Settings, SETTINGS_LOG_ID, &settings)?;
        self.tables.write().settings = Some(settings);

        Ok(())
    }

    fn resource_content(&self, id: ResourceId) -> Result<ResourceBlob> {
        let hash = self
            .tables
            .read()
            .resources
            .get(id)
            .map(|r| r.hash)
            .ok_or_else(|| StoreError::not_found(AggregateKind::Resource, id))?;

        self.blobs
            .get(&hash)?
            .ok_or(StoreError::BlobNotFound(hash))
    }

    fn compact(&self) -> Result<CompactionSummary> {
        let _lock = self.write_lock.lock();

        let entries_before = self.log.entries()?.len() as u64;
        let bytes_before = self.log.size();

        let entries = {
            let tables = self.tables.read();
            let mut entries = Vec::new();
            for word in tables.words.iter() {
                entries.push((
                    AggregateKind::Word,
                    word.id.0,
                    LogOp::Put(rmp_serde::to_vec_named(word)?),
                ));
            }
            for category in tables.categories.iter() {
                entries.push((
                    AggregateKind::Category,
                    category.id.0,
                    LogOp::Put(rmp_serde::to_vec_named(category)?),
                ));
            }
            for resource in tables.resources.iter() {
                entries.push((
                    AggregateKind::Resource,
                    resource.id.0,
                    LogOp::Put(rmp_serde::to_vec_named(resource)?),
                ));
            }
            if let Some(settings) = &tables.settings {
                entries.push((
                    AggregateKind::Settings,
                    SETTINGS_LOG_ID,
                    LogOp::Put(rmp_serde::to_vec_named(settings)?),
                ));
            }
            entries
        };

        let entries_after = entries.len() as u64;
        self.log.rewrite(entries)?;

        let summary = CompactionSummary {
            entries_before,
            entries_after,
            bytes_before,
            bytes_after: self.log.size(),
        };
        tracing::info!(?summary, "compacted mutation log");
        Ok(summary)
    }

    fn stats(&self) -> Result<StoreStats> {
        let (word_count, category_count, resource_count) = {
            let tables = self.tables.read();
            (
                tables.words.len() as u64,
                tables.categories.len() as u64,
                tables.resources.len() as u64,
            )
        };

        Ok(StoreStats {
            word_count,
            category_count,
            resource_count,
            blob_count: self.blobs.list()?.len() as u64,
            log_entries: self.log.entries()?.len() as u64,
            log_size_bytes: self.log.size(),
            blob_size_bytes: self.blobs.total_size()?,
        })
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        // Best-effort sync on drop
        let _ = self.log.sync();
    }
}

#[async_trait]
impl Repository<Word> for Store {
    async fn create(&self, draft: NewWord) -> Result<Word> {
        self.blocking(move |store| store.create_in::<Word>(draft)).await
    }

    async fn update(&self, id: WordId, changes: WordChanges) -> Result<()> {
        self.blocking(move |store| store.update_in::<Word>(id, &changes))
            .await
    }

    async fn delete(&self, id: WordId) -> Result<()> {
        self.blocking(move |store| store.delete_in::<Word>(id).map(|_| ()))
            .await
    }

    async fn get_all(&self) -> Result<Vec<Word>> {
        self.blocking(|store| Ok(store.all_in::<Word>())).await
    }
}

#[async_trait]
impl Repository<Category> for Store {
    async fn create(&self, draft: NewCategory) -> Result<Category> {
        self.blocking(move |store| store.create_in::<Category>(draft))
            .await
    }

    async fn update(&self, id: CategoryId, changes: CategoryChanges) -> Result<()> {
        self.blocking(move |store| store.update_in::<Category>(id, &changes))
            .await
    }

    async fn delete(&self, id: CategoryId) -> Result<()> {
        self.blocking(move |store| store.delete_in::<Category>(id).map(|_| ()))
            .await
    }

    async fn get_all(&self) -> Result<Vec<Category>> {
        self.blocking(|store| Ok(store.all_in::<Category>())).await
    }
}

#[async_trait]
impl Repository<Resource> for Store {
    async fn create(&self, draft: NewResource) -> Result<Resource> {
        self.blocking(move |store| store.create_resource(draft)).await
    }

    async fn update(&self, id: ResourceId, changes: ResourceChanges) -> Result<()> {
        self.blocking(move |store| store.update_in::<Resource>(id, &changes))
            .await
    }

    async fn delete(&self, id: ResourceId) -> Result<()> {
        self.blocking(move |store| store.delete_resource(id)).await
    }

    async fn get_all(&self) -> Result<Vec<Resource>> {
        self.blocking(|store| Ok(store.all_in::<Resource>())).await
    }
}

#[async_trait]
impl SettingsRepository for Store {
    async fn get_settings(&self) -> Result<Settings> {
        self.blocking(|store| store.settings_or_default()).await
    }

    async fn update_settings(&self, changes: SettingsChanges) -> Result<()> {
        self.blocking(move |store| store.apply_settings(&changes))
            .await
    }
}
