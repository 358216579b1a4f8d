//! The auto-save coordinator.

use super::types::{AutoSaveConfig, SaveCallbacks, SaveStatus};
use crate::debounce::Debouncer;
use crate::error::{Result, StoreError};
use crate::types::Timestamp;
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use parking_lot::Mutex;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

type SaveFn<T> = Box<dyn Fn(T) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct SaveState<T> {
    status: SaveStatus,
    last_saved: Option<Timestamp>,
    /// Error of the latest cycle, if it failed.
    error: Option<Arc<StoreError>>,
    /// Payload of the latest failed cycle, kept for `retry`.
    failed: Option<T>,
    in_flight: usize,
    /// Number of the latest started cycle.
    cycle: u64,
    dismiss: Option<JoinHandle<()>>,
}

struct Shared<T> {
    save: SaveFn<T>,
    callbacks: SaveCallbacks,
    config: AutoSaveConfig,
    state: Mutex<SaveState<T>>,
    disposed: AtomicBool,
    handle: Handle,
}

impl<T: Clone + Send + 'static> Shared<T> {
    /// Start a save cycle for `payload`.
    fn start(self: &Arc<Self>, payload: T) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }

        let cycle = {
            let mut state = self.state.lock();
            state.cycle += 1;
            state.in_flight += 1;
            state.status = SaveStatus::Saving;
            state.error = None;
            state.failed = None;
            if let Some(dismiss) = state.dismiss.take() {
                dismiss.abort();
            }
            state.cycle
        };

        tracing::debug!(cycle, "auto-save started");
        self.callbacks.saving();

        let retained = payload.clone();
        let save = match panic::catch_unwind(AssertUnwindSafe(|| (self.save)(payload))) {
            Ok(save) => save,
            Err(panic) => future::ready(Err(panicked(panic))).boxed(),
        };

        let shared = Arc::clone(self);
        self.handle.spawn(async move {
            let result = match AssertUnwindSafe(save).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => Err(panicked(panic)),
            };
            shared.finish(cycle, retained, result);
        });
    }

    fn finish(self: &Arc<Self>, cycle: u64, payload: T, result: Result<()>) {
        if self.disposed.load(Ordering::Acquire) {
            tracing::debug!(cycle, "auto-save completed after dispose");
            return;
        }

        match result {
            Ok(()) => {
                let settled = {
                    let mut state = self.state.lock();
                    state.in_flight -= 1;
                    state.last_saved = Some(Timestamp::now());
                    self.settle(&mut state)
                };

                tracing::debug!(cycle, "auto-save succeeded");
                self.callbacks.saved();

                if settled == SaveStatus::Saved {
                    self.schedule_dismiss();
                }
            }
            Err(err) => {
                tracing::warn!(cycle, error = %err, "auto-save failed");
                let err = Arc::new(err);
                {
                    let mut state = self.state.lock();
                    state.in_flight -= 1;
                    // A superseded cycle's failure does not outlive the newer payload.
                    if cycle == state.cycle {
                        state.error = Some(Arc::clone(&err));
                        state.failed = Some(payload);
                    }
                    self.settle(&mut state);
                }

                self.callbacks.error(&err);
            }
        }
    }

    /// Leave `Saving` once no cycle is in flight. Returns the resulting status.
    fn settle(&self, state: &mut SaveState<T>) -> SaveStatus {
        if state.in_flight == 0 {
            state.status = if state.error.is_some() {
                SaveStatus::Error
            } else {
                SaveStatus::Saved
            };
        }
        state.status
    }

    fn schedule_dismiss(self: &Arc<Self>) {
        let Some(display) = self.config.saved_display else {
            return;
        };

        let weak: Weak<Self> = Arc::downgrade(self);
        let mut state = self.state.lock();
        let cycle = state.cycle;
        let task = self.handle.spawn(async move {
            tokio::time::sleep(display).await;
            if let Some(shared) = weak.upgrade() {
                let mut state = shared.state.lock();
                if state.cycle == cycle && state.status == SaveStatus::Saved {
                    state.status = SaveStatus::Idle;
                }
            }
        });
        if let Some(previous) = state.dismiss.replace(task) {
            previous.abort();
        }
    }
}

fn panicked(panic: Box<dyn Any + Send>) -> StoreError {
    let message = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    StoreError::SavePanicked(message)
}

/// Debounced save coordinator for one stream of edits.
///
/// `T` is the full value to save (not a diff); a burst of triggers saves
/// only the last one. Must be created inside a Tokio runtime.
///
/// ```ignore
/// let autosave = AutoSave::new(
///     move |text: String| {
///         let vocab = vocab.clone();
///         async move { vocab.words().update(id, WordChanges::text(text)).await }
///     },
///     AutoSaveConfig::default(),
///     SaveCallbacks::new().on_error(|e| eprintln!("save failed: {e}")),
/// )?;
/// autosave.trigger("hello".into());
/// ```
pub struct AutoSave<T: Clone + Send + 'static> {
    shared: Arc<Shared<T>>,
    debouncer: Debouncer<T>,
}

impl<T: Clone + Send + 'static> AutoSave<T> {
    /// Build a coordinator around `save` on the current Tokio runtime.
    pub fn new<F, Fut>(save: F, config: AutoSaveConfig, callbacks: SaveCallbacks) -> Result<Self>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let handle = Handle::try_current()?;
        let shared = Arc::new(Shared {
            save: Box::new(move |payload| save(payload).boxed()),
            callbacks,
            state: Mutex::new(SaveState {
                status: SaveStatus::Idle,
                last_saved: None,
                error: None,
                failed: None,
                in_flight: 0,
                cycle: 0,
                dismiss: None,
            }),
            disposed: AtomicBool::new(false),
            handle,
            config,
        });

        let weak = Arc::downgrade(&shared);
        let debouncer = Debouncer::new(shared.config.debounce, move |payload| {
            if let Some(shared) = weak.upgrade() {
                shared.start(payload);
            }
        })?;

        Ok(Self { shared, debouncer })
    }

    /// Record an edit. The save starts once no trigger has arrived for the
    /// debounce window. Ignored after `dispose`.
    ///
    /// A new edit replaces any failed payload kept for `retry`.
    pub fn trigger(&self, payload: T) {
        if self.is_disposed() {
            return;
        }
        self.shared.state.lock().failed = None;
        self.debouncer.schedule(payload);
    }

    /// Start the pending save now instead of waiting out the window.
    pub fn flush(&self) -> bool {
        self.debouncer.flush()
    }

    /// Save again, immediately.
    ///
    /// A pending edit is newer than the failed payload, so it is saved
    /// instead. Returns `false` if there is nothing to save.
    pub fn retry(&self) -> bool {
        if self.is_disposed() {
            return false;
        }
        if self.debouncer.flush() {
            return true;
        }
        let payload = self.shared.state.lock().failed.take();
        match payload {
            Some(payload) => {
                self.shared.start(payload);
                true
            }
            None => false,
        }
    }

    /// Clear an error and return to `Idle`.
    pub fn dismiss_error(&self) {
        let mut state = self.shared.state.lock();
        if state.status == SaveStatus::Error {
            state.status = SaveStatus::Idle;
            state.error = None;
            state.failed = None;
        }
    }

    /// Current save status.
    pub fn status(&self) -> SaveStatus {
        self.shared.state.lock().status
    }

    /// Whether a save is in flight.
    pub fn is_saving(&self) -> bool {
        self.status() == SaveStatus::Saving
    }

    /// Whether an edit is waiting out the debounce window.
    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// When the last successful save completed.
    pub fn last_saved(&self) -> Option<Timestamp> {
        self.shared.state.lock().last_saved
    }

    /// Error of the latest failed cycle.
    pub fn error(&self) -> Option<Arc<StoreError>> {
        self.shared.state.lock().error.clone()
    }

    /// Display text of [`error`](Self::error).
    pub fn error_message(&self) -> Option<String> {
        self.error().map(|e| e.to_string())
    }

    /// Cancel any pending save and silence in-flight ones.
    ///
    /// A save already running is not interrupted, but its completion
    /// changes no state and fires no callback. Idempotent.
    pub fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.debouncer.cancel();
        if let Some(dismiss) = self.shared.state.lock().dismiss.take() {
            dismiss.abort();
        }
        tracing::debug!("auto-save disposed");
    }

    /// Whether `dispose` has run.
    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }
}

impl<T: Clone + Send + 'static> Drop for AutoSave<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::time::sleep;

    type Events = Arc<Mutex<Vec<String>>>;

    fn recording_callbacks(events: &Events) -> SaveCallbacks {
        let (a, b, c) = (events.clone(), events.clone(), events.clone());
        SaveCallbacks::new()
            .on_saving(move || a.lock().push("saving".into()))
            .on_saved(move || b.lock().push("saved".into()))
            .on_error(move |e| c.lock().push(format!("error: {}", e)))
    }

    fn config(debounce_ms: u64) -> AutoSaveConfig {
        AutoSaveConfig {
            debounce: Duration::from_millis(debounce_ms),
            saved_display: Some(Duration::from_secs(2)),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_saves_last_payload_once() {
        let saved: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let events: Events = Arc::default();

        let sink = saved.clone();
        let autosave = AutoSave::new(
            move |payload| {
                sink.lock().push(payload);
                async { Ok(()) }
            },
            config(500),
            recording_callbacks(&events),
        )
        .unwrap();

        let before = Timestamp::now();
        autosave.trigger("a");
        sleep(Duration::from_millis(100)).await;
        autosave.trigger("b");

        sleep(Duration::from_millis(400)).await;
        assert!(saved.lock().is_empty());
        assert_eq!(autosave.status(), SaveStatus::Idle);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(*saved.lock(), vec!["b"]);
        assert_eq!(*events.lock(), vec!["saving", "saved"]);
        assert_eq!(autosave.status(), SaveStatus::Saved);
        assert!(autosave.last_saved().unwrap() >= before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_sets_error_status() {
        let events: Events = Arc::default();
        let autosave = AutoSave::new(
            |_: u32| async { Err(StoreError::Persist("disk full".into())) },
            config(100),
            recording_callbacks(&events),
        )
        .unwrap();

        autosave.trigger(1);
        sleep(Duration::from_millis(200)).await;

        assert_eq!(autosave.status(), SaveStatus::Error);
        assert_eq!(
            autosave.error_message().as_deref(),
            Some("Persist failed: disk full")
        );
        assert_eq!(
            *events.lock(),
            vec!["saving", "error: Persist failed: disk full"]
        );
        assert!(autosave.last_saved().is_none());

        autosave.dismiss_error();
        assert_eq!(autosave.status(), SaveStatus::Idle);
        assert!(autosave.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronous_panic_is_reported() {
        let events: Events = Arc::default();
        let autosave = AutoSave::new(
            |_: u32| -> future::Ready<Result<()>> { panic!("exploded") },
            config(100),
            recording_callbacks(&events),
        )
        .unwrap();

        autosave.trigger(1);
        sleep(Duration::from_millis(200)).await;

        assert_eq!(autosave.status(), SaveStatus::Error);
        assert!(matches!(
            autosave.error().as_deref(),
            Some(StoreError::SavePanicked(msg)) if msg == "exploded"
        ));
        assert_eq!(events.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_panic_is_reported() {
        let autosave = AutoSave::new(
            |_: u32| async {
                if true {
                    panic!("late");
                }
                Ok(())
            },
            config(100),
            SaveCallbacks::new(),
        )
        .unwrap();

        autosave.trigger(1);
        sleep(Duration::from_millis(200)).await;

        assert!(matches!(
            autosave.error().as_deref(),
            Some(StoreError::SavePanicked(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_returns_to_idle() {
        let autosave =
            AutoSave::new(|_: u32| async { Ok(()) }, config(100), SaveCallbacks::new()).unwrap();

        autosave.trigger(1);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(autosave.status(), SaveStatus::Saved);

        sleep(Duration::from_millis(2100)).await;
        assert_eq!(autosave.status(), SaveStatus::Idle);
        assert!(autosave.last_saved().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_persists_without_display_timeout() {
        let autosave = AutoSave::new(
            |_: u32| async { Ok(()) },
            AutoSaveConfig {
                debounce: Duration::from_millis(100),
                saved_display: None,
            },
            SaveCallbacks::new(),
        )
        .unwrap();

        autosave.trigger(1);
        sleep(Duration::from_secs(10)).await;
        assert_eq!(autosave.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_cancels_pending_save() {
        let calls = Arc::new(AtomicUsize::new(0));
        let events: Events = Arc::default();

        let counter = calls.clone();
        let autosave = AutoSave::new(
            move |_: u32| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
            config(100),
            recording_callbacks(&events),
        )
        .unwrap();

        autosave.trigger(1);
        autosave.dispose();
        autosave.dispose();
        autosave.trigger(2);
        sleep(Duration::from_millis(500)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(events.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_silences_in_flight_save() {
        let events: Events = Arc::default();
        let autosave = AutoSave::new(
            |_: u32| async {
                sleep(Duration::from_millis(300)).await;
                Ok(())
            },
            config(100),
            recording_callbacks(&events),
        )
        .unwrap();

        autosave.trigger(1);
        sleep(Duration::from_millis(150)).await;
        assert!(autosave.is_saving());

        autosave.dispose();
        sleep(Duration::from_millis(500)).await;

        assert_eq!(*events.lock(), vec!["saving"]);
        assert_eq!(autosave.status(), SaveStatus::Saving);
        assert!(autosave.last_saved().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_resaves_failed_payload() {
        let attempts: Arc<Mutex<Vec<u32>>> = Arc::default();
        let sink = attempts.clone();
        let autosave = AutoSave::new(
            move |payload: u32| {
                let first = {
                    let mut attempts = sink.lock();
                    attempts.push(payload);
                    attempts.len() == 1
                };
                async move {
                    if first {
                        Err(StoreError::Persist("offline".into()))
                    } else {
                        Ok(())
                    }
                }
            },
            config(100),
            SaveCallbacks::new(),
        )
        .unwrap();

        assert!(!autosave.retry());

        autosave.trigger(9);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(autosave.status(), SaveStatus::Error);

        assert!(autosave.retry());
        sleep(Duration::from_millis(10)).await;

        assert_eq!(*attempts.lock(), vec![9, 9]);
        assert_eq!(autosave.status(), SaveStatus::Saved);
        assert!(autosave.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_cycles_stay_saving_until_last_completes() {
        let events: Events = Arc::default();
        let autosave = AutoSave::new(
            |delay_ms: u64| async move {
                sleep(Duration::from_millis(delay_ms)).await;
                Ok(())
            },
            config(50),
            recording_callbacks(&events),
        )
        .unwrap();

        // First cycle starts at 50ms and runs for 400ms
        autosave.trigger(400);
        sleep(Duration::from_millis(100)).await;
        // Second cycle starts at 150ms and finishes at 250ms
        autosave.trigger(100);
        sleep(Duration::from_millis(200)).await;

        assert_eq!(*events.lock(), vec!["saving", "saving", "saved"]);
        assert_eq!(autosave.status(), SaveStatus::Saving);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *events.lock(),
            vec!["saving", "saving", "saved", "saved"]
        );
        assert_eq!(autosave.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_saves_pending_edit_instead_of_failed_one() {
        let saved: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let sink = saved.clone();
        let autosave = AutoSave::new(
            move |payload: &'static str| {
                let first = {
                    let mut saved = sink.lock();
                    saved.push(payload);
                    saved.len() == 1
                };
                async move {
                    if first {
                        Err(StoreError::Persist("offline".into()))
                    } else {
                        Ok(())
                    }
                }
            },
            config(100),
            SaveCallbacks::new(),
        )
        .unwrap();

        autosave.trigger("old");
        sleep(Duration::from_millis(150)).await;
        assert_eq!(autosave.status(), SaveStatus::Error);

        autosave.trigger("newer");
        assert!(autosave.retry());
        assert!(!autosave.is_pending());
        sleep(Duration::from_millis(500)).await;

        assert_eq!(*saved.lock(), vec!["old", "newer"]);
        assert_eq!(autosave.status(), SaveStatus::Saved);
        assert!(!autosave.retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_edit_discards_failed_payload() {
        let autosave = AutoSave::new(
            |_: u32| async { Err(StoreError::Persist("offline".into())) },
            config(100),
            SaveCallbacks::new(),
        )
        .unwrap();

        autosave.trigger(1);
        sleep(Duration::from_millis(150)).await;
        assert_eq!(autosave.status(), SaveStatus::Error);

        autosave.trigger(2);
        autosave.debouncer.cancel();
        assert!(!autosave.retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_failure_outlives_older_success() {
        let events: Events = Arc::default();
        let autosave = AutoSave::new(
            |(delay_ms, fail): (u64, bool)| async move {
                sleep(Duration::from_millis(delay_ms)).await;
                if fail {
                    Err(StoreError::Persist("newer failed".into()))
                } else {
                    Ok(())
                }
            },
            config(50),
            recording_callbacks(&events),
        )
        .unwrap();

        // Older cycle: starts at 50ms, succeeds at 450ms
        autosave.trigger((400, false));
        sleep(Duration::from_millis(100)).await;
        // Newer cycle: starts at 150ms, fails at 250ms
        autosave.trigger((100, true));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(autosave.status(), SaveStatus::Saving);

        sleep(Duration::from_millis(200)).await;
        assert_eq!(
            *events.lock(),
            vec![
                "saving",
                "saving",
                "error: Persist failed: newer failed",
                "saved"
            ]
        );
        assert_eq!(autosave.status(), SaveStatus::Error);
        assert_eq!(
            autosave.error_message().as_deref(),
            Some("Persist failed: newer failed")
        );
        assert!(autosave.last_saved().is_some());
    }
}
