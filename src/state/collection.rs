//! Optimistic manager for one aggregate collection.

use super::detached;
use crate::error::Result;
use crate::persist::Repository;
use crate::types::{Aggregate, Timestamp};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

struct CollectionState<A> {
    items: Arc<Vec<A>>,
    loading: bool,
    error: Option<String>,
}

struct Inner<A: Aggregate> {
    repo: Arc<dyn Repository<A>>,
    state: RwLock<CollectionState<A>>,
    gate: Mutex<()>,
}

/// In-memory view of one collection with optimistic updates.
///
/// `items()` hands out an immutable snapshot; later mutations never alter
/// a snapshot already taken. Clones share the same collection.
pub struct OptimisticCollection<A: Aggregate> {
    inner: Arc<Inner<A>>,
}

impl<A: Aggregate> Clone for OptimisticCollection<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: Aggregate> OptimisticCollection<A> {
    /// Create an empty, not yet loaded collection.
    pub fn new(repo: Arc<dyn Repository<A>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                state: RwLock::new(CollectionState {
                    items: Arc::new(Vec::new()),
                    loading: false,
                    error: None,
                }),
                gate: Mutex::new(()),
            }),
        }
    }

    // --- Reads ---

    pub fn items(&self) -> Arc<Vec<A>> {
        Arc::clone(&self.inner.state.read().items)
    }

    pub fn get(&self, id: A::Id) -> Option<A> {
        self.inner
            .state
            .read()
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().items.is_empty()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.read().loading
    }

    /// Message of the last failed operation.
    pub fn error(&self) -> Option<String> {
        self.inner.state.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.state.write().error = None;
    }

    // --- Mutations ---

    /// Create an item. The item appears only once the persist layer has
    /// assigned its id.
    pub async fn add(&self, draft: A::Draft) -> Result<A> {
        let inner = Arc::clone(&self.inner);
        detached(async move { inner.add(draft).await }).await
    }

    /// Apply `changes` to item `id` now, then persist them.
    ///
    /// On failure the whole collection is restored to the snapshot taken
    /// before the change, and the error is returned.
    pub async fn update(&self, id: A::Id, changes: A::Changes) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        detached(async move { inner.update(id, changes).await }).await
    }

    /// Delete item `id`. It stays visible until the persist layer confirms.
    pub async fn remove(&self, id: A::Id) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        detached(async move { inner.remove(id).await }).await
    }

    /// Re-fetch this collection. On failure the current items are kept and
    /// the error is returned.
    pub async fn refresh(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        detached(async move { inner.refresh().await }).await
    }

    // --- Helpers shared with `Vocabulary` ---

    pub(crate) async fn gate(&self) -> MutexGuard<'_, ()> {
        self.inner.gate.lock().await
    }

    pub(crate) async fn fetch(&self) -> Result<Vec<A>> {
        self.inner.repo.get_all().await
    }

    pub(crate) fn begin(&self) {
        self.inner.begin();
    }

    pub(crate) fn commit(&self, items: Vec<A>) {
        self.inner.commit(items);
    }

    pub(crate) fn fail(&self, message: &str) {
        self.inner.fail(message);
    }
}

impl<A: Aggregate> Inner<A> {
    async fn add(&self, draft: A::Draft) -> Result<A> {
        let _gate = self.gate.lock().await;
        self.begin();

        match self.repo.create(draft).await {
            Ok(item) => {
                tracing::debug!(kind = %A::KIND, id = %item.id(), "added");
                let mut state = self.state.write();
                Arc::make_mut(&mut state.items).push(item.clone());
                state.loading = false;
                Ok(item)
            }
            Err(err) => {
                tracing::warn!(kind = %A::KIND, error = %err, "create failed");
                self.fail(&err.to_string());
                Err(err)
            }
        }
    }

    async fn update(&self, id: A::Id, changes: A::Changes) -> Result<()> {
        let _gate = self.gate.lock().await;

        let snapshot = {
            let mut state = self.state.write();
            let snapshot = Arc::clone(&state.items);
            let now = Timestamp::now();
            if let Some(item) = Arc::make_mut(&mut state.items)
                .iter_mut()
                .find(|item| item.id() == id)
            {
                item.apply(&changes);
                item.touch(now);
            }
            state.loading = true;
            state.error = None;
            snapshot
        };

        match self.repo.update(id, changes).await {
            Ok(()) => {
                tracing::debug!(kind = %A::KIND, %id, "updated");
                self.state.write().loading = false;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = %A::KIND, %id, error = %err, "update failed, rolling back");
                let mut state = self.state.write();
                state.items = snapshot;
                state.error = Some(err.to_string());
                state.loading = false;
                Err(err)
            }
        }
    }

    async fn remove(&self, id: A::Id) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.begin();

        match self.repo.delete(id).await {
            Ok(()) => {
                tracing::debug!(kind = %A::KIND, %id, "removed");
                let mut state = self.state.write();
                Arc::make_mut(&mut state.items).retain(|item| item.id() != id);
                state.loading = false;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = %A::KIND, %id, error = %err, "delete failed");
                self.fail(&err.to_string());
                Err(err)
            }
        }
    }

    async fn refresh(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.begin();

        match self.repo.get_all().await {
            Ok(items) => {
                self.commit(items);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = %A::KIND, error = %err, "refresh failed");
                self.fail(&err.to_string());
                Err(err)
            }
        }
    }

    fn begin(&self) {
        let mut state = self.state.write();
        state.loading = true;
        state.error = None;
    }

    fn commit(&self, items: Vec<A>) {
        let mut state = self.state.write();
        state.items = Arc::new(items);
        state.loading = false;
        state.error = None;
    }

    fn fail(&self, message: &str) {
        let mut state = self.state.write();
        state.error = Some(message.to_string());
        state.loading = false;
    }
}
