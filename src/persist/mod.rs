//! Persist layer interface.
//!
//! The optimistic managers never touch storage directly; they are handed a
//! client implementing these traits. Two implementations ship with the
//! crate:
//!
//! - [`Store`](crate::Store): the durable on-disk store
//! - [`MemoryStore`]: an in-memory double with fault injection for tests
//!
//! Semantics every implementation follows:
//!
//! - `create` assigns the identifier and both timestamps
//! - `update` of an unknown id fails with `StoreError::NotFound`
//! - `delete` of an unknown id succeeds
//! - `get_all` returns items ordered by identifier
//! - `get_settings` materializes the default singleton on first call, once

mod memory;
mod tables;

pub use memory::{MemoryStore, PersistOp};
pub use tables::{Table, TableAccess, Tables};

use crate::error::Result;
use crate::types::{Aggregate, Category, Resource, Settings, SettingsChanges, Word};
use async_trait::async_trait;

/// CRUD access to one aggregate collection.
#[async_trait]
pub trait Repository<A: Aggregate>: Send + Sync {
    async fn create(&self, draft: A::Draft) -> Result<A>;

    async fn update(&self, id: A::Id, changes: A::Changes) -> Result<()>;

    async fn delete(&self, id: A::Id) -> Result<()>;

    async fn get_all(&self) -> Result<Vec<A>>;
}

/// Access to the settings singleton. It cannot be created, only read
/// (which materializes it) and updated.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Read the singleton, creating and persisting defaults if absent.
    async fn get_settings(&self) -> Result<Settings>;

    async fn update_settings(&self, changes: SettingsChanges) -> Result<()>;
}

/// Everything a [`Vocabulary`](crate::Vocabulary) needs from storage.
pub trait PersistLayer:
    Repository<Word> + Repository<Category> + Repository<Resource> + SettingsRepository
{
}

impl<T> PersistLayer for T where
    T: Repository<Word> + Repository<Category> + Repository<Resource> + SettingsRepository
{
}
