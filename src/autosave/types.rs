//! Auto-save configuration, status and callbacks.

use crate::error::StoreError;
use std::fmt;
use std::time::Duration;

/// Status of an auto-save coordinator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SaveStatus::Idle => "idle",
            SaveStatus::Saving => "saving",
            SaveStatus::Saved => "saved",
            SaveStatus::Error => "error",
        };
        f.write_str(label)
    }
}

/// Auto-save configuration.
#[derive(Clone, Debug)]
pub struct AutoSaveConfig {
    /// Quiet window before a save starts.
    pub debounce: Duration,

    /// How long `Saved` is shown before returning to `Idle`.
    /// `None` keeps `Saved` until the next cycle.
    pub saved_display: Option<Duration>,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            saved_display: Some(Duration::from_secs(2)),
        }
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;
type ErrorHook = Box<dyn Fn(&StoreError) + Send + Sync>;

/// Lifecycle notifications for save cycles. All are optional.
///
/// Each cycle calls `on_saving` once, then exactly one of `on_saved` or
/// `on_error`.
#[derive(Default)]
pub struct SaveCallbacks {
    on_saving: Option<Hook>,
    on_saved: Option<Hook>,
    on_error: Option<ErrorHook>,
}

impl SaveCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_saving(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_saving = Some(Box::new(f));
        self
    }

    pub fn on_saved(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_saved = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&StoreError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn saving(&self) {
        if let Some(f) = &self.on_saving {
            f();
        }
    }

    pub(crate) fn saved(&self) {
        if let Some(f) = &self.on_saved {
            f();
        }
    }

    pub(crate) fn error(&self, err: &StoreError) {
        if let Some(f) = &self.on_error {
            f(err);
        }
    }
}

impl fmt::Debug for SaveCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaveCallbacks")
            .field("on_saving", &self.on_saving.is_some())
            .field("on_saved", &self.on_saved.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
