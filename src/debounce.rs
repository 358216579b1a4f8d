//! Trailing-edge debouncer.
//!
//! Each [`Debouncer::schedule`] call replaces the pending payload and
//! restarts the quiet window. The callback runs once per window, with the
//! payload of the last call.

use crate::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

struct Pending<T> {
    payload: Option<T>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

struct Inner<T> {
    delay: Duration,
    callback: Box<dyn Fn(T) + Send + Sync>,
    pending: Mutex<Pending<T>>,
}

impl<T> Inner<T> {
    /// Take the payload if `generation` is still the latest schedule.
    fn take_if_current(&self, generation: u64) -> Option<T> {
        let mut pending = self.pending.lock();
        if pending.generation != generation {
            return None;
        }
        pending.task = None;
        pending.payload.take()
    }
}

/// Coalesces bursts of calls into one trailing invocation.
pub struct Debouncer<T: Send + 'static> {
    inner: Arc<Inner<T>>,
    handle: Handle,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Create a debouncer on the current tokio runtime.
    pub fn new<F>(delay: Duration, callback: F) -> Result<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let handle = Handle::try_current()?;
        Ok(Self {
            inner: Arc::new(Inner {
                delay,
                callback: Box::new(callback),
                pending: Mutex::new(Pending {
                    payload: None,
                    generation: 0,
                    task: None,
                }),
            }),
            handle,
        })
    }

    /// Length of the quiet window.
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// Replace the pending payload and restart the window.
    pub fn schedule(&self, payload: T) {
        let mut pending = self.inner.pending.lock();
        pending.generation = pending.generation.wrapping_add(1);
        pending.payload = Some(payload);
        if let Some(task) = pending.task.take() {
            task.abort();
        }

        let generation = pending.generation;
        let inner = Arc::clone(&self.inner);
        pending.task = Some(self.handle.spawn(async move {
            tokio::time::sleep(inner.delay).await;
            if let Some(payload) = inner.take_if_current(generation) {
                (inner.callback)(payload);
            }
        }));
    }

    /// Drop any pending payload. Calling this with nothing pending is a no-op.
    pub fn cancel(&self) {
        let mut pending = self.inner.pending.lock();
        pending.generation = pending.generation.wrapping_add(1);
        pending.payload = None;
        if let Some(task) = pending.task.take() {
            task.abort();
        }
    }

    /// Invoke the callback now with the pending payload, if any.
    ///
    /// Returns whether the callback ran.
    pub fn flush(&self) -> bool {
        let payload = {
            let mut pending = self.inner.pending.lock();
            pending.generation = pending.generation.wrapping_add(1);
            if let Some(task) = pending.task.take() {
                task.abort();
            }
            pending.payload.take()
        };

        match payload {
            Some(payload) => {
                (self.inner.callback)(payload);
                true
            }
            None => false,
        }
    }

    /// Whether a payload is waiting for its window to close.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.lock().payload.is_some()
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    fn recording<T: Send + 'static>(delay_ms: u64) -> (Debouncer<T>, Arc<Mutex<Vec<T>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let debouncer = Debouncer::new(Duration::from_millis(delay_ms), move |payload| {
            sink.lock().push(payload)
        })
        .unwrap();
        (debouncer, calls)
    }

    #[test]
    fn test_requires_runtime() {
        let result = Debouncer::<u32>::new(Duration::from_millis(10), |_| {});
        assert!(matches!(result, Err(crate::StoreError::NoRuntime(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_to_last_payload() {
        let (debouncer, calls) = recording::<&str>(500);

        debouncer.schedule("a");
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule("b");
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule("c");

        sleep(Duration::from_millis(499)).await;
        assert!(calls.lock().is_empty());
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(*calls.lock(), vec!["c"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_fire_separately() {
        let (debouncer, calls) = recording::<u32>(200);

        debouncer.schedule(1);
        sleep(Duration::from_millis(300)).await;
        debouncer.schedule(2);
        sleep(Duration::from_millis(300)).await;

        assert_eq!(*calls.lock(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (debouncer, calls) = recording::<u32>(100);

        debouncer.cancel();
        debouncer.schedule(7);
        debouncer.cancel();
        debouncer.cancel();
        sleep(Duration::from_millis(500)).await;

        assert!(calls.lock().is_empty());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_passed_verbatim() {
        let (debouncer, calls) = recording::<Option<serde_json::Value>>(50);

        debouncer.schedule(None);
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule(Some(serde_json::Value::Null));
        sleep(Duration::from_millis(100)).await;
        debouncer.schedule(Some(serde_json::json!({})));
        sleep(Duration::from_millis(100)).await;

        assert_eq!(
            *calls.lock(),
            vec![
                None,
                Some(serde_json::Value::Null),
                Some(serde_json::json!({}))
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_immediately() {
        let (debouncer, calls) = recording::<u32>(1000);

        assert!(!debouncer.flush());
        debouncer.schedule(3);
        assert!(debouncer.flush());
        assert_eq!(*calls.lock(), vec![3]);

        sleep(Duration::from_millis(2000)).await;
        assert_eq!(calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending() {
        let (debouncer, calls) = recording::<u32>(100);

        debouncer.schedule(1);
        drop(debouncer);
        sleep(Duration::from_millis(500)).await;

        assert!(calls.lock().is_empty());
    }
}
