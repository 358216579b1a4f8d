//! MemoryStore - in-memory persist layer for tests and development.

use super::tables::{TableAccess, Tables};
use super::{Repository, SettingsRepository};
use crate::error::{Result, StoreError};
use crate::types::{
    Aggregate, AggregateKind, Category, CategoryChanges, CategoryId, Hash, NewCategory,
    NewResource, NewWord, Resource, ResourceChanges, ResourceId, Settings, SettingsChanges,
    Timestamp, Word, WordChanges, WordId,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// Operation class used for fault injection and call counting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PersistOp {
    Create,
    Update,
    Delete,
    /// `get_all`, or `get_settings` for the settings singleton.
    Read,
}

#[derive(Default)]
struct Faults {
    once: HashSet<(AggregateKind, PersistOp)>,
    always: HashSet<(AggregateKind, PersistOp)>,
}

#[derive(Default)]
struct MemoryInner {
    tables: Mutex<Tables>,
    blobs: Mutex<HashMap<Hash, Vec<u8>>>,
    faults: Mutex<Faults>,
    calls: Mutex<HashMap<(AggregateKind, PersistOp), u64>>,
    latency: Mutex<Option<Duration>>,
}

/// In-memory persist layer.
///
/// Clone-friendly via `Arc`: clones share the same tables, so a test can
/// keep a handle for fault injection while a `Vocabulary` owns another.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from pre-populated tables.
    pub fn with_tables(tables: Tables) -> Self {
        let store = Self::default();
        *store.inner.tables.lock() = tables;
        store
    }

    /// Fail the next call of `op` on `kind`.
    pub fn fail_next(&self, kind: AggregateKind, op: PersistOp) {
        self.inner.faults.lock().once.insert((kind, op));
    }

    /// Fail every call of `op` on `kind` until cleared.
    pub fn fail_always(&self, kind: AggregateKind, op: PersistOp) {
        self.inner.faults.lock().always.insert((kind, op));
    }

    pub fn clear_failures(&self) {
        let mut faults = self.inner.faults.lock();
        faults.once.clear();
        faults.always.clear();
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.inner.latency.lock() = latency;
    }

    /// Number of calls made for `op` on `kind`, failed ones included.
    pub fn calls(&self, kind: AggregateKind, op: PersistOp) -> u64 {
        self.inner
            .calls
            .lock()
            .get(&(kind, op))
            .copied()
            .unwrap_or(0)
    }

    /// Copy of the current tables.
    pub fn tables(&self) -> Tables {
        self.inner.tables.lock().clone()
    }

    /// Stored bytes of a resource.
    pub fn resource_content(&self, hash: &Hash) -> Option<Vec<u8>> {
        self.inner.blobs.lock().get(hash).cloned()
    }

    async fn enter(&self, kind: AggregateKind, op: PersistOp) -> Result<()> {
        *self.inner.calls.lock().entry((kind, op)).or_insert(0) += 1;

        let latency = *self.inner.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut faults = self.inner.faults.lock();
        if faults.once.remove(&(kind, op)) || faults.always.contains(&(kind, op)) {
            return Err(StoreError::Persist(format!(
                "injected {:?} failure for {}",
                op, kind
            )));
        }
        Ok(())
    }

    async fn create_in<A>(&self, draft: A::Draft) -> Result<A>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        self.enter(A::KIND, PersistOp::Create).await?;
        let mut tables = self.inner.tables.lock();
        Ok(TableAccess::<A>::table_mut(&mut *tables).insert_draft(draft, Timestamp::now()))
    }

    async fn update_in<A>(&self, id: A::Id, changes: A::Changes) -> Result<()>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        self.enter(A::KIND, PersistOp::Update).await?;
        let mut tables = self.inner.tables.lock();
        let table = TableAccess::<A>::table_mut(&mut *tables);
        let item = table.updated(id, &changes, Timestamp::now())?;
        table.put(item);
        Ok(())
    }

    async fn delete_in<A>(&self, id: A::Id) -> Result<Option<A>>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        self.enter(A::KIND, PersistOp::Delete).await?;
        Ok(TableAccess::<A>::table_mut(&mut *self.inner.tables.lock()).remove(id))
    }

    async fn get_all_in<A>(&self) -> Result<Vec<A>>
    where
        A: Aggregate,
        Tables: TableAccess<A>,
    {
        self.enter(A::KIND, PersistOp::Read).await?;
        Ok(TableAccess::<A>::table(&*self.inner.tables.lock()).all())
    }
}

#[async_trait]
impl Repository<Word> for MemoryStore {
    async fn create(&self, draft: NewWord) -> Result<Word> {
        self.create_in::<Word>(draft).await
    }

    async fn update(&self, id: WordId, changes: WordChanges) -> Result<()> {
        self.update_in::<Word>(id, changes).await
    }

    async fn delete(&self, id: WordId) -> Result<()> {
        self.delete_in::<Word>(id).await.map(|_| ())
    }

    async fn get_all(&self) -> Result<Vec<Word>> {
        self.get_all_in::<Word>().await
    }
}

#[async_trait]
impl Repository<Category> for MemoryStore {
    async fn create(&self, draft: NewCategory) -> Result<Category> {
        self.create_in::<Category>(draft).await
    }

    async fn update(
        &self,
        id: CategoryId,
        changes: CategoryChanges,
    ) -> Result<()> {
        self.update_in::<Category>(id, changes).await
    }

    async fn delete(&self, id: CategoryId) -> Result<()> {
        self.delete_in::<Category>(id).await.map(|_| ())
    }

    async fn get_all(&self) -> Result<Vec<Category>> {
        self.get_all_in::<Category>().await
    }
}

#[async_trait]
impl Repository<Resource> for MemoryStore {
    async fn create(&self, draft: NewResource) -> Result<Resource> {
        self.enter(AggregateKind::Resource, PersistOp::Create).await?;
        // Lock order: tables, then blobs.
        let mut tables = self.inner.tables.lock();
        let hash = Hash::from_bytes(&draft.data);
        self.inner
            .blobs
            .lock()
            .entry(hash)
            .or_insert_with(|| draft.data.clone());
        Ok(tables.resources.insert_draft(draft, Timestamp::now()))
    }

    async fn update(
        &self,
        id: ResourceId,
        changes: ResourceChanges,
    ) -> Result<()> {
        self.update_in::<Resource>(id, changes).await
    }

    async fn delete(&self, id: ResourceId) -> Result<()> {
        self.enter(AggregateKind::Resource, PersistOp::Delete).await?;
        let mut tables = self.inner.tables.lock();
        if let Some(removed) = tables.resources.remove(id) {
            if !tables.resources.iter().any(|r| r.hash == removed.hash) {
                self.inner.blobs.lock().remove(&removed.hash);
            }
        }
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Resource>> {
        self.get_all_in::<Resource>().await
    }
}

#[async_trait]
impl SettingsRepository for MemoryStore {
    async fn get_settings(&self) -> Result<Settings> {
        self.enter(AggregateKind::Settings, PersistOp::Read).await?;
        let mut tables = self.inner.tables.lock();
        let settings = tables
            .settings
            .get_or_insert_with(|| Settings::defaults(Timestamp::now()));
        Ok(settings.clone())
    }

    async fn update_settings(&self, changes: SettingsChanges) -> Result<()> {
        self.enter(AggregateKind::Settings, PersistOp::Update).await?;
        let mut tables = self.inner.tables.lock();
        let settings = tables.updated_settings(&changes, Timestamp::now());
        tables.settings = Some(settings);
        Ok(())
    }
}
