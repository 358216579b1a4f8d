//! Keyed set of independent auto-save coordinators.

use super::AutoSave;
use crate::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

type Factory<K, T> = Box<dyn Fn(&K) -> Result<AutoSave<T>> + Send + Sync>;

/// One [`AutoSave`] per key, created on first use.
///
/// Streams never share debounce windows or status: editing word 1 and
/// word 2 at once produces two independent save cycles.
pub struct SaveStreams<K, T: Clone + Send + 'static> {
    factory: Factory<K, T>,
    streams: RwLock<HashMap<K, Arc<AutoSave<T>>>>,
}

impl<K, T> SaveStreams<K, T>
where
    K: Eq + Hash + Clone,
    T: Clone + Send + 'static,
{
    pub fn new(factory: impl Fn(&K) -> Result<AutoSave<T>> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            streams: RwLock::new(HashMap::new()),
        }
    }

    /// Coordinator for `key`, creating it if needed.
    pub fn stream(&self, key: &K) -> Result<Arc<AutoSave<T>>> {
        if let Some(stream) = self.streams.read().get(key) {
            return Ok(Arc::clone(stream));
        }

        let mut streams = self.streams.write();
        if let Some(stream) = streams.get(key) {
            return Ok(Arc::clone(stream));
        }
        let stream = Arc::new((self.factory)(key)?);
        streams.insert(key.clone(), Arc::clone(&stream));
        Ok(stream)
    }

    /// Trigger the stream for `key`.
    pub fn trigger(&self, key: &K, payload: T) -> Result<()> {
        self.stream(key)?.trigger(payload);
        Ok(())
    }

    pub fn get(&self, key: &K) -> Option<Arc<AutoSave<T>>> {
        self.streams.read().get(key).cloned()
    }

    /// Dispose and forget the stream for `key`. Returns whether it existed.
    pub fn dispose(&self, key: &K) -> bool {
        match self.streams.write().remove(key) {
            Some(stream) => {
                stream.dispose();
                true
            }
            None => false,
        }
    }

    pub fn dispose_all(&self) {
        let streams: Vec<_> = self.streams.write().drain().collect();
        for (_, stream) in streams {
            stream.dispose();
        }
    }

    pub fn len(&self) -> usize {
        self.streams.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.read().is_empty()
    }
}

impl<K, T: Clone + Send + 'static> Drop for SaveStreams<K, T> {
    fn drop(&mut self) {
        for stream in self.streams.get_mut().values() {
            stream.dispose();
        }
    }
}
