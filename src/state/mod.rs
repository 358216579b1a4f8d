//! Optimistic in-memory state over a persist layer.
//!
//! Updates are applied to the visible collection before the persist call
//! and rolled back to the exact prior snapshot if it fails. Creates and
//! deletes wait for the persist layer instead.
//!
//! All mutations of one collection pass through a per-collection gate, so
//! at most one snapshot is live per collection at any time. Each mutation
//! runs on its own task: dropping the returned future stops the wait, not
//! the mutation, which still commits or rolls back.

mod collection;
mod settings;
mod vocabulary;

pub use collection::OptimisticCollection;
pub use settings::SettingsManager;
pub use vocabulary::{Vocabulary, VocabularyConfig};

use crate::error::Result;
use std::future::Future;
use tokio::runtime::Handle;

/// Spawn `mutation` on the current runtime and wait for its result.
pub(crate) async fn detached<T, F>(mutation: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    Ok(Handle::try_current()?.spawn(mutation).await??)
}
