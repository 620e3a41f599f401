// SPDX-License-Identifier: GPL-3.0-only

//! Ordered blocking hand-off queue between pipeline stages

use super::Gate;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// FIFO hand-off queue carrying exclusive ownership of items between threads.
///
/// The queue is unbounded: `push` never blocks. `pop` parks the caller on the
/// gate until an item is available. Occupancy is mirrored in an atomic counter
/// so the drain loops and the monitor can observe it without touching the
/// queue contents.
pub struct Channel<T> {
    items: Mutex<VecDeque<T>>,
    gate: Gate,
    occupancy: AtomicUsize,
}

impl<T> Channel<T> {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            gate: Gate::new(),
            occupancy: AtomicUsize::new(0),
        }
    }

    /// Append an item and wake one parked consumer.
    ///
    /// The item is visible to a subsequent `pop` before the gate is signalled.
    pub fn push(&self, item: T) {
        {
            let mut items = self.items.lock().unwrap();
            items.push_back(item);
            // Under the same lock as the append, so occupancy never
            // under-reports a queued item to a concurrent drain check.
            self.occupancy.fetch_add(1, Ordering::SeqCst);
        }
        self.gate.release();
    }

    /// Remove and return the oldest item, blocking while the queue is empty.
    pub fn pop(&self) -> T {
        loop {
            self.gate.acquire();
            let mut items = self.items.lock().unwrap();
            if let Some(item) = items.pop_front() {
                self.occupancy.fetch_sub(1, Ordering::SeqCst);
                return item;
            }
            // A permit without a matching item means a clear ran in between;
            // park again until the next push.
        }
    }

    /// Discard all queued items and banked wakeups.
    ///
    /// Callers must guarantee no concurrent pusher or popper is mid-operation;
    /// the pipeline only clears channels before its stages are launched.
    pub fn clear(&self) {
        let mut items = self.items.lock().unwrap();
        items.clear();
        self.occupancy.store(0, Ordering::SeqCst);
        self.gate.reset();
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.occupancy.load(Ordering::SeqCst)
    }

    /// Whether any item is currently queued.
    pub fn has_waiting(&self) -> bool {
        self.len() > 0
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}
