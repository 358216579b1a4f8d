//! Optimistic manager for the settings singleton.

use super::detached;
use crate::error::Result;
use crate::persist::SettingsRepository;
use crate::types::{AggregateKind, Settings, SettingsChanges, Timestamp};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct SettingsState {
    settings: Option<Arc<Settings>>,
    loading: bool,
    error: Option<String>,
}

struct Inner {
    repo: Arc<dyn SettingsRepository>,
    state: RwLock<SettingsState>,
    gate: Mutex<()>,
}

/// In-memory settings with optimistic, merge-style updates.
///
/// Clones share the same settings.
#[derive(Clone)]
pub struct SettingsManager {
    inner: Arc<Inner>,
}

impl SettingsManager {
    pub fn new(repo: Arc<dyn SettingsRepository>) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                state: RwLock::new(SettingsState::default()),
                gate: Mutex::new(()),
            }),
        }
    }

    /// Current settings, `None` until loaded.
    pub fn settings(&self) -> Option<Arc<Settings>> {
        self.inner.state.read().settings.clone()
    }

    pub fn loading(&self) -> bool {
        self.inner.state.read().loading
    }

    pub fn error(&self) -> Option<String> {
        self.inner.state.read().error.clone()
    }

    pub fn clear_error(&self) {
        self.inner.state.write().error = None;
    }

    /// Merge `changes` into the settings now, then persist them.
    ///
    /// Each nested group is merged one level deep: only the named fields
    /// change. On failure the previous settings are restored.
    pub async fn update(&self, changes: SettingsChanges) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        detached(async move { inner.update(changes).await }).await
    }

    /// Re-read the settings, materializing defaults on first use.
    pub async fn refresh(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        detached(async move { inner.refresh().await }).await
    }

    pub(crate) async fn gate(&self) -> MutexGuard<'_, ()> {
        self.inner.gate.lock().await
    }

    pub(crate) async fn fetch(&self) -> Result<Settings> {
        self.inner.repo.get_settings().await
    }

    pub(crate) fn begin(&self) {
        self.inner.begin();
    }

    pub(crate) fn commit(&self, settings: Settings) {
        self.inner.commit(settings);
    }

    pub(crate) fn fail(&self, message: &str) {
        self.inner.fail(message);
    }
}

impl Inner {
    async fn update(&self, changes: SettingsChanges) -> Result<()> {
        let _gate = self.gate.lock().await;

        if self.state.read().settings.is_none() {
            self.begin();
            match self.repo.get_settings().await {
                Ok(settings) => self.commit(settings),
                Err(err) => {
                    tracing::warn!(kind = %AggregateKind::Settings, error = %err, "settings load failed");
                    self.fail(&err.to_string());
                    return Err(err);
                }
            }
        }

        let snapshot = {
            let mut state = self.state.write();
            let snapshot = state.settings.clone();
            if let Some(settings) = state.settings.as_mut() {
                let settings = Arc::make_mut(settings);
                settings.apply(&changes);
                settings.touch(Timestamp::now());
            }
            state.loading = true;
            state.error = None;
            snapshot
        };

        match self.repo.update_settings(changes).await {
            Ok(()) => {
                tracing::debug!(kind = %AggregateKind::Settings, "updated");
                self.state.write().loading = false;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = %AggregateKind::Settings, error = %err, "update failed, rolling back");
                let mut state = self.state.write();
                state.settings = snapshot;
                state.error = Some(err.to_string());
                state.loading = false;
                Err(err)
            }
        }
    }

    async fn refresh(&self) -> Result<()> {
        let _gate = self.gate.lock().await;
        self.begin();

        match self.repo.get_settings().await {
            Ok(settings) => {
                self.commit(settings);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(kind = %AggregateKind::Settings, error = %err, "refresh failed");
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

    fn commit(&self, settings: Settings) {
        let mut state = self.state.write();
        state.settings = Some(Arc::new(settings));
        state.loading = false;
        state.error = None;
    }

    fn fail(&self, message: &str) {
        let mut state = self.state.write();
        state.error = Some(message.to_string());
        state.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::{MemoryStore, PersistOp};
    use crate::types::{
        GridLayoutChanges, Theme, UiPreferencesChanges, VoiceSettingsChanges, WordType,
    };

    fn manager(store: &MemoryStore) -> SettingsManager {
        SettingsManager::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn test_update_loads_defaults_first() {
        let store = MemoryStore::new();
        let settings = manager(&store);
        assert!(settings.settings().is_none());

        settings
            .update(SettingsChanges::ui(UiPreferencesChanges {
                theme: Some(Theme::Dark),
                ..Default::default()
            }))
            .await
            .unwrap();

        let current = settings.settings().unwrap();
        assert_eq!(current.ui_preferences.theme, Theme::Dark);
        assert_eq!(store.calls(AggregateKind::Settings, PersistOp::Read), 1);
    }

    #[tokio::test]
    async fn test_nested_update_preserves_siblings() {
        let store = MemoryStore::new();
        let settings = manager(&store);
        settings.refresh().await.unwrap();
        let before = settings.settings().unwrap();

        settings
            .update(SettingsChanges::voice(VoiceSettingsChanges {
                rate: Some(1.5),
                ..Default::default()
            }))
            .await
            .unwrap();

        let after = settings.settings().unwrap();
        assert_eq!(after.voice_settings.rate, 1.5);
        assert_eq!(after.voice_settings.pitch, before.voice_settings.pitch);
        assert_eq!(after.voice_settings.volume, before.voice_settings.volume);
        assert_eq!(after.voice_settings.voice, before.voice_settings.voice);
        assert_eq!(after.word_type_colors, before.word_type_colors);
        assert_eq!(after.grid_layout, before.grid_layout);
        assert_eq!(after.ui_preferences, before.ui_preferences);

        // The persisted copy merged the same way
        let stored = store.tables().settings.unwrap();
        assert_eq!(stored.voice_settings, after.voice_settings);
        assert_eq!(stored.grid_layout, before.grid_layout);
    }

    #[tokio::test]
    async fn test_update_failure_restores_previous_settings() {
        let store = MemoryStore::new();
        let settings = manager(&store);
        settings.refresh().await.unwrap();
        let before = settings.settings().unwrap();

        store.fail_next(AggregateKind::Settings, PersistOp::Update);
        let result = settings
            .update(SettingsChanges::grid(GridLayoutChanges {
                columns: Some(9),
                ..Default::default()
            }))
            .await;

        assert!(result.is_err());
        let after = settings.settings().unwrap();
        assert!(Arc::ptr_eq(&after, &before));
        assert!(settings.error().is_some());
        assert!(!settings.loading());
    }

    #[tokio::test]
    async fn test_partial_colour_update() {
        let store = MemoryStore::new();
        let settings = manager(&store);
        settings.refresh().await.unwrap();

        let mut changes = SettingsChanges::default();
        changes.word_type_colors = Some(
            [(WordType::Verb, "#00FF00".to_string())]
                .into_iter()
                .collect(),
        );
        settings.update(changes).await.unwrap();

        let current = settings.settings().unwrap();
        assert_eq!(current.color_for(WordType::Verb), "#00FF00");
        assert_eq!(
            current.color_for(WordType::Noun),
            WordType::Noun.default_color()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_update_still_rolls_back() {
        let store = MemoryStore::new();
        let settings = manager(&store);
        settings.refresh().await.unwrap();
        let before = settings.settings().unwrap();

        store.set_latency(Some(std::time::Duration::from_millis(50)));
        store.fail_next(AggregateKind::Settings, PersistOp::Update);
        let waited = tokio::time::timeout(
            std::time::Duration::from_millis(10),
            settings.update(SettingsChanges::grid(GridLayoutChanges {
                columns: Some(9),
                ..Default::default()
            })),
        )
        .await;
        assert!(waited.is_err());
        assert_eq!(settings.settings().unwrap().grid_layout.columns, 9);

        tokio::time::sleep(std::time::Duration::from_secs(5)).await;

        assert!(Arc::ptr_eq(&settings.settings().unwrap(), &before));
        assert!(!settings.loading());
        assert!(settings.error().is_some());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_settings() {
        let store = MemoryStore::new();
        let settings = manager(&store);
        settings.refresh().await.unwrap();

        store.fail_next(AggregateKind::Settings, PersistOp::Read);
        assert!(settings.refresh().await.is_err());
        assert!(settings.settings().is_some());
        assert!(settings.error().is_some());
    }
}
