//! Cross-thread TTL event queue and the script-side callback handle.

use parking_lot::Mutex;
use pyo3::prelude::*;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A TTL transition captured from the script, awaiting emission on the audio
/// thread. The sample number is assigned at drain time, not capture time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvent {
    pub line: u8,
    pub state: bool,
}

/// Locked FIFO between the script-side callback (any thread) and the audio
/// thread.
///
/// Events are accepted only while acquisition is active; the flag is owned by
/// the host. The lock is held only for the duration of a push or a drain and
/// never across a Python call.
pub struct EventQueue {
    queue: Mutex<VecDeque<PendingEvent>>,
    acquiring: Arc<AtomicBool>,
}

impl EventQueue {
    pub fn new(acquiring: Arc<AtomicBool>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            acquiring,
        }
    }

    /// Enqueue from any thread. Silently dropped while acquisition is
    /// inactive.
    pub fn push(&self, event: PendingEvent) {
        let mut queue = self.queue.lock();
        if self.acquiring.load(Ordering::Acquire) {
            queue.push_back(event);
        }
    }

    /// Drain every pending event in FIFO order, stamping all of them with the
    /// current block's base sample number.
    ///
    /// Called once per process call, from the audio thread only. Events
    /// generated within one block are all timestamped at that block's start.
    pub fn drain_and_emit(&self, sample_number: i64, mut emit: impl FnMut(PendingEvent, i64)) {
        // Move events out under the lock, emit after releasing it.
        let drained: SmallVec<[PendingEvent; 32]> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };
        for event in drained {
            emit(event, sample_number);
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

/// Callback object handed to the script constructor.
///
/// Scripts keep the reference and call `add_event(line, state)` to schedule a
/// TTL transition; the bridge emits it while draining the queue during the
/// next process call. Safe to call from inside `process` (same thread,
/// reentrant) or from any thread the script spawned.
#[pyclass(frozen)]
pub struct ScriptHostHandle {
    queue: Arc<EventQueue>,
}

impl ScriptHostHandle {
    pub(crate) fn new(queue: Arc<EventQueue>) -> Self {
        Self { queue }
    }
}

#[pymethods]
impl ScriptHostHandle {
    /// Schedule a TTL transition on `line`.
    fn add_event(&self, line: u8, state: bool) {
        self.queue.push(PendingEvent { line, state });
    }
}
