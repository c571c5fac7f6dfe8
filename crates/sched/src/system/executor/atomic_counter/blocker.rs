use std::sync::{
    Condvar, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};

/// Completion gate of a single tick.
///
/// Armed with the number of systems in the tick, decremented once per
/// completed system and released exactly once when the count reaches zero.
/// The count itself is a plain atomic; the mutex only guards the transition
/// to the complete state so the waiting thread can sleep on the condition
/// variable instead of spinning.
pub struct CounterBlocker {
    remaining: AtomicUsize,
    complete: Mutex<bool>,
    signal: Condvar,
}

impl CounterBlocker {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(count),
            complete: Mutex::new(count == 0),
            signal: Condvar::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_complete(&self) -> bool {
        *self.complete.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decrements the count, waking the waiter when it reaches zero.
    ///
    /// Returns `true` for the call that completed the blocker.
    pub fn decrement_and_check(&self) -> bool {
        let previous = self.remaining.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "counter blocker decremented past zero");

        if previous != 1 {
            return false;
        }

        let mut complete = self.complete.lock().unwrap_or_else(PoisonError::into_inner);
        *complete = true;
        self.signal.notify_one();

        true
    }

    /// Blocks the calling thread until the count reaches zero.
    pub fn wait_until_zero(&self) {
        let complete = self.complete.lock().unwrap_or_else(PoisonError::into_inner);
        let _complete = self
            .signal
            .wait_while(complete, |complete| !*complete)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Runs `start`, which is expected to kick off the tick, then waits for
    /// the count to reach zero.
    pub fn execute_and_wait_until_zero(&self, start: impl FnOnce()) {
        start();
        self.wait_until_zero();
    }
}

#[cfg(test)]
mod tests {
    use super::CounterBlocker;
    use std::{sync::Arc, thread};

    #[test]
    fn releases_after_count_decrements() {
        let blocker = CounterBlocker::new(3);
        assert!(!blocker.decrement_and_check());
        assert!(!blocker.decrement_and_check());
        assert!(!blocker.is_complete());
        assert!(blocker.decrement_and_check());
        assert!(blocker.is_complete());
        assert_eq!(blocker.remaining(), 0);

        blocker.wait_until_zero();
    }

    #[test]
    fn empty_blocker_is_complete() {
        let blocker = CounterBlocker::new(0);
        assert!(blocker.is_complete());
        blocker.wait_until_zero();
    }

    #[test]
    fn wakes_waiting_thread() {
        let count = 32;
        let blocker = Arc::new(CounterBlocker::new(count));

        blocker.execute_and_wait_until_zero(|| {
            for _ in 0..count {
                let blocker = blocker.clone();
                thread::spawn(move || {
                    blocker.decrement_and_check();
                });
            }
        });

        assert_eq!(blocker.remaining(), 0);
        assert!(blocker.is_complete());
    }

    #[test]
    fn exactly_one_decrement_completes() {
        let count = 64;
        let blocker = Arc::new(CounterBlocker::new(count));

        let handles = (0..count)
            .map(|_| {
                let blocker = blocker.clone();
                thread::spawn(move || blocker.decrement_and_check())
            })
            .collect::<Vec<_>>();

        let completions = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|completed| *completed)
            .count();

        assert_eq!(completions, 1);
    }
}
