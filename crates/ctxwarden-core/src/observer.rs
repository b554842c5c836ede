//! Observer seam for side-effect notifications.
//!
//! Stores and orchestrators report what they did (writes, evictions,
//! warnings, compaction steps) through an [`EventObserver`] handed to them at
//! construction, so tests can inspect side effects without a runtime event
//! bus.

use parking_lot::Mutex;

/// Receives events of type `E`.
pub trait EventObserver<E>: Send + Sync {
    /// Called synchronously, in order, for every event.
    fn notify(&self, event: &E);
}

/// Observer that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl<E> EventObserver<E> for NoopObserver {
    fn notify(&self, _event: &E) {}
}

/// Observer that keeps every event it receives.
#[derive(Debug)]
pub struct RecordingObserver<E> {
    events: Mutex<Vec<E>>,
}

impl<E> Default for RecordingObserver<E> {
    fn default() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }
}

impl<E: Clone> RecordingObserver<E> {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<E> {
        self.events.lock().clone()
    }

    /// Drain the recorded events.
    pub fn take(&self) -> Vec<E> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl<E: Clone + Send> EventObserver<E> for RecordingObserver<E> {
    fn notify(&self, event: &E) {
        self.events.lock().push(event.clone());
    }
}
