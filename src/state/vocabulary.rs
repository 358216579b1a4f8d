//! The vocabulary: every managed collection over one persist client.

use super::{detached, OptimisticCollection, SettingsManager};
use crate::autosave::{AutoSave, AutoSaveConfig, SaveCallbacks, SaveStreams};
use crate::error::{Result, StoreError};
use crate::persist::PersistLayer;
use crate::types::{
    Category, CategoryChanges, CategoryId, Resource, SettingsChanges, Word, WordChanges, WordId,
};
use std::sync::Arc;
use std::time::Duration;

/// Vocabulary configuration.
#[derive(Clone, Debug)]
pub struct VocabularyConfig {
    /// Bound on the initial load in [`Vocabulary::open`].
    pub startup_timeout: Duration,

    /// Settings for coordinators built by the `*_autosave` helpers.
    pub autosave: AutoSaveConfig,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            startup_timeout: Duration::from_secs(10),
            autosave: AutoSaveConfig::default(),
        }
    }
}

/// Words, categories, resources and settings, kept in memory and mutated
/// optimistically against a single persist client.
///
/// ```ignore
/// let store = Arc::new(Store::open_or_create(StoreConfig::default())?);
/// let vocab = Vocabulary::open(store, VocabularyConfig::default()).await?;
///
/// let word = vocab.words().add(NewWord::new("more", WordType::Adverb)).await?;
/// let autosave = vocab.word_autosave(word.id, SaveCallbacks::new())?;
/// autosave.trigger(WordChanges::text("more please"));
/// ```
pub struct Vocabulary {
    collections: Collections,
    config: VocabularyConfig,
}

/// Handles to every managed collection.
#[derive(Clone)]
struct Collections {
    words: OptimisticCollection<Word>,
    categories: OptimisticCollection<Category>,
    resources: OptimisticCollection<Resource>,
    settings: SettingsManager,
}

impl Collections {
    async fn reload(&self) -> Result<()> {
        // Fixed order, so concurrent reloads cannot deadlock.
        let _words = self.words.gate().await;
        let _categories = self.categories.gate().await;
        let _resources = self.resources.gate().await;
        let _settings = self.settings.gate().await;

        self.words.begin();
        self.categories.begin();
        self.resources.begin();
        self.settings.begin();

        let fetched = tokio::try_join!(
            self.words.fetch(),
            self.categories.fetch(),
            self.resources.fetch(),
            self.settings.fetch(),
        );

        match fetched {
            Ok((words, categories, resources, settings)) => {
                self.words.commit(words);
                self.categories.commit(categories);
                self.resources.commit(resources);
                self.settings.commit(settings);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "vocabulary refresh failed");
                let message = err.to_string();
                self.words.fail(&message);
                self.categories.fail(&message);
                self.resources.fail(&message);
                self.settings.fail(&message);
                Err(err)
            }
        }
    }
}

impl Vocabulary {
    /// Build an empty vocabulary without loading anything.
    pub fn new<P: PersistLayer + 'static>(persist: Arc<P>, config: VocabularyConfig) -> Self {
        Self {
            collections: Collections {
                words: OptimisticCollection::<Word>::new(persist.clone()),
                categories: OptimisticCollection::<Category>::new(persist.clone()),
                resources: OptimisticCollection::<Resource>::new(persist.clone()),
                settings: SettingsManager::new(persist),
            },
            config,
        }
    }

    /// Build a vocabulary and load every collection.
    ///
    /// Fails with [`StoreError::Timeout`] if loading takes longer than
    /// `startup_timeout`; the unfinished load is dropped along with the
    /// vocabulary.
    pub async fn open<P: PersistLayer + 'static>(
        persist: Arc<P>,
        config: VocabularyConfig,
    ) -> Result<Arc<Self>> {
        let vocabulary = Self::new(persist, config);
        let timeout = vocabulary.config.startup_timeout;

        match tokio::time::timeout(timeout, vocabulary.collections.reload()).await {
            Ok(result) => result?,
            Err(_) => {
                tracing::warn!(?timeout, "vocabulary load timed out");
                return Err(StoreError::Timeout(timeout));
            }
        }

        tracing::info!(
            words = vocabulary.words().len(),
            categories = vocabulary.categories().len(),
            resources = vocabulary.resources().len(),
            "vocabulary loaded"
        );
        Ok(Arc::new(vocabulary))
    }

    pub fn words(&self) -> &OptimisticCollection<Word> {
        &self.collections.words
    }

    pub fn categories(&self) -> &OptimisticCollection<Category> {
        &self.collections.categories
    }

    pub fn resources(&self) -> &OptimisticCollection<Resource> {
        &self.collections.resources
    }

    pub fn settings(&self) -> &SettingsManager {
        &self.collections.settings
    }

    pub fn config(&self) -> &VocabularyConfig {
        &self.config
    }

    /// Whether any collection has an operation in progress.
    pub fn loading(&self) -> bool {
        self.words().loading()
            || self.categories().loading()
            || self.resources().loading()
            || self.settings().loading()
    }

    /// Re-fetch every collection in parallel.
    ///
    /// Either every collection is replaced or none is. On failure each
    /// collection records the error message and the error is returned.
    pub async fn refresh(&self) -> Result<()> {
        let collections = self.collections.clone();
        detached(async move { collections.reload().await }).await
    }

    // --- Auto-save ---

    /// Debounced saves of `WordChanges` to word `id`.
    pub fn word_autosave(
        self: &Arc<Self>,
        id: WordId,
        callbacks: SaveCallbacks,
    ) -> Result<AutoSave<WordChanges>> {
        let vocabulary = Arc::clone(self);
        AutoSave::new(
            move |changes: WordChanges| {
                let vocabulary = Arc::clone(&vocabulary);
                async move { vocabulary.words().update(id, changes).await }
            },
            self.config.autosave.clone(),
            callbacks,
        )
    }

    /// Debounced saves of `CategoryChanges` to category `id`.
    pub fn category_autosave(
        self: &Arc<Self>,
        id: CategoryId,
        callbacks: SaveCallbacks,
    ) -> Result<AutoSave<CategoryChanges>> {
        let vocabulary = Arc::clone(self);
        AutoSave::new(
            move |changes: CategoryChanges| {
                let vocabulary = Arc::clone(&vocabulary);
                async move { vocabulary.categories().update(id, changes).await }
            },
            self.config.autosave.clone(),
            callbacks,
        )
    }

    /// Debounced saves of settings changes.
    pub fn settings_autosave(
        self: &Arc<Self>,
        callbacks: SaveCallbacks,
    ) -> Result<AutoSave<SettingsChanges>> {
        let vocabulary = Arc::clone(self);
        AutoSave::new(
            move |changes: SettingsChanges| {
                let vocabulary = Arc::clone(&vocabulary);
                async move { vocabulary.settings().update(changes).await }
            },
            self.config.autosave.clone(),
            callbacks,
        )
    }

    /// One independent auto-save stream per word being edited.
    pub fn word_streams(self: &Arc<Self>) -> SaveStreams<WordId, WordChanges> {
        let vocabulary = Arc::clone(self);
        SaveStreams::new(move |id: &WordId| vocabulary.word_autosave(*id, SaveCallbacks::new()))
    }
}
