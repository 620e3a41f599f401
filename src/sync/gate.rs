// SPDX-License-Identifier: GPL-3.0-only

//! Counting gate used to park a consumer on an empty hand-off queue

use std::sync::{Condvar, Mutex};

/// Counting gate over a mutex and condition variable.
///
/// Each `release` banks one permit and wakes at most one waiter, so a queue
/// guarded by this gate unblocks exactly one consumer per pushed item.
#[derive(Default)]
pub struct Gate {
    permits: Mutex<usize>,
    wakeup: Condvar,
}

impl Gate {
    /// Create a gate with no banked permits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bank one permit and wake one waiter.
    pub fn release(&self) {
        let mut permits = self.permits.lock().unwrap();
        *permits += 1;
        self.wakeup.notify_one();
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut permits = self.permits.lock().unwrap();
        // Condition variables can wake spuriously; re-check the predicate.
        while *permits == 0 {
            permits = self.wakeup.wait(permits).unwrap();
        }
        *permits -= 1;
    }

    /// Take a permit if one is available, without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock().unwrap();
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Discard all banked permits without waking waiters.
    ///
    /// Only valid while no thread can be blocked in `acquire` or calling
    /// `release`; the owning queue restricts this to its `clear`, which runs
    /// between capture runs.
    pub fn reset(&self) {
        *self.permits.lock().unwrap() = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn try_acquire_fails_without_release() {
        let gate = Gate::new();
        assert!(!gate.try_acquire());
    }

    #[test]
    fn release_banks_permits() {
        let gate = Gate::new();
        gate.release();
        gate.release();

        assert!(gate.try_acquire());
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
    }

    #[test]
    fn acquire_blocks_until_release() {
        let gate = Arc::new(Gate::new());
        let passed = Arc::new(AtomicBool::new(false));

        let gate_clone = Arc::clone(&gate);
        let passed_clone = Arc::clone(&passed);
        let waiter = thread::spawn(move || {
            gate_clone.acquire();
            passed_clone.store(true, Ordering::SeqCst);
        });

        // The waiter must still be parked before the release.
        thread::sleep(Duration::from_millis(50));
        assert!(!passed.load(Ordering::SeqCst));

        gate.release();
        waiter.join().unwrap();
        assert!(passed.load(Ordering::SeqCst));
    }

    #[test]
    fn reset_discards_banked_permits() {
        let gate = Gate::new();
        gate.release();
        gate.release();
        gate.reset();

        assert!(!gate.try_acquire());
    }
}
