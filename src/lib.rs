//! # AAC Vocabulary
//!
//! Offline-first data layer for an AAC (augmentative and alternative
//! communication) board: words, categories, image/audio resources and
//! user settings.
//!
//! ## Core Concepts
//!
//! - **Optimistic state**: updates show up immediately and roll back to an
//!   exact snapshot if persisting fails
//! - **Auto-save**: debounced saves with live status for UI indicators
//! - **Persist layer**: a trait seam with a durable on-disk [`Store`] and
//!   an in-memory [`MemoryStore`] for tests
//!
//! ## Example
//!
//! ```ignore
//! use aac_vocab::{Store, StoreConfig, Vocabulary, VocabularyConfig, NewWord, WordType};
//! use std::sync::Arc;
//!
//! let store = Arc::new(Store::open_or_create(StoreConfig {
//!     path: "./vocabulary".into(),
//!     ..Default::default()
//! })?);
//! let vocab = Vocabulary::open(store, VocabularyConfig::default()).await?;
//!
//! // Creates wait for the store to assign an id
//! let word = vocab.words().add(NewWord::new("drink", WordType::Verb)).await?;
//!
//! // Edits from a text field are debounced and saved optimistically
//! let autosave = vocab.word_autosave(word.id, SaveCallbacks::new())?;
//! autosave.trigger(WordChanges::text("drink water"));
//! ```

pub mod autosave;
pub mod blobs;
pub mod debounce;
pub mod error;
pub mod persist;
pub mod records;
pub mod state;
pub mod store;
pub mod types;

// Re-exports
pub use autosave::{AutoSave, AutoSaveConfig, SaveCallbacks, SaveStatus, SaveStreams};
pub use blobs::{BlobStorage, ResourceBlob};
pub use debounce::Debouncer;
pub use error::{Result, StoreError};
pub use persist::{MemoryStore, PersistLayer, PersistOp, Repository, SettingsRepository, Tables};
pub use records::{LogEntry, LogOp, MutationLog};
pub use state::{OptimisticCollection, SettingsManager, Vocabulary, VocabularyConfig};
pub use store::{CompactionSummary, Store, StoreConfig};
pub use types::*;
