use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::SkirmishResult;

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<SkirmishResult>,
    unbounded: bool,
}

/// Bounded multi-producer queue of results awaiting a commit.
///
/// [`BatchQueue::push`] blocks while the queue holds `capacity` results, until a
/// consumer drains it. The bound can be lifted while the store is unavailable so
/// producers keep running.
#[derive(Debug)]
pub struct BatchQueue {
    state: Mutex<QueueState>,
    not_full: Condvar,
    capacity: usize,
}

impl BatchQueue {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            state: Mutex::new(QueueState::default()),
            not_full: Condvar::new(),
            capacity,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Appends a result and returns the queue length after the push.
    pub fn push(&self, result: SkirmishResult) -> usize {
        let mut state = self.state.lock();
        while !state.unbounded && state.pending.len() >= self.capacity {
            self.not_full.wait(&mut state);
        }
        state.pending.push_back(result);
        state.pending.len()
    }

    /// Removes up to `max` results from the front, oldest first.
    pub fn drain(&self, max: usize) -> Vec<SkirmishResult> {
        let mut state = self.state.lock();
        let n = max.min(state.pending.len());
        let batch = state.pending.drain(..n).collect();
        self.not_full.notify_all();
        batch
    }

    /// Puts an uncommitted batch back at the front, keeping its order.
    pub fn requeue_front(&self, batch: Vec<SkirmishResult>) {
        let mut state = self.state.lock();
        for result in batch.into_iter().rev() {
            state.pending.push_front(result);
        }
    }

    /// Lifts or restores the capacity bound.
    pub fn set_unbounded(&self, unbounded: bool) {
        self.state.lock().unbounded = unbounded;
        if unbounded {
            self.not_full.notify_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
        time::Duration,
    };

    use super::*;
    use crate::record::tests::sample;

    #[test]
    fn test_drain_keeps_order() {
        let queue = BatchQueue::new(8);
        for i in 0..5 {
            queue.push(sample(0, i));
        }
        let batch = queue.drain(3);
        let indices = batch.iter().map(|r| r.match_id.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 1, 2]);

        queue.requeue_front(batch);
        assert_eq!(queue.len(), 5);
        let all = queue.drain(10);
        let indices = all.iter().map(|r| r.match_id.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_blocks_at_capacity() {
        let queue = BatchQueue::new(2);
        queue.push(sample(0, 0));
        queue.push(sample(0, 1));
        let pushed = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| {
                queue.push(sample(0, 2));
                pushed.store(true, Ordering::SeqCst);
            });
            thread::sleep(Duration::from_millis(50));
            assert!(!pushed.load(Ordering::SeqCst));
            assert_eq!(queue.drain(1).len(), 1);
        });
        assert!(pushed.load(Ordering::SeqCst));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_unbounded_releases_producers() {
        let queue = BatchQueue::new(1);
        queue.push(sample(0, 0));
        thread::scope(|s| {
            let producer = s.spawn(|| queue.push(sample(0, 1)));
            thread::sleep(Duration::from_millis(20));
            queue.set_unbounded(true);
            assert_eq!(producer.join().unwrap(), 2);
        });
    }
}
