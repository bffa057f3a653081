use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Fixed-capacity sample store that keeps only the most recent samples.
///
/// Appends and snapshots share a single mutex, so a reader never sees a
/// half-applied append/trim.
#[derive(Debug)]
pub struct RingBuffer {
    capacity: usize,
    samples: Mutex<VecDeque<f64>>,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add one sample, evicting from the front until the capacity holds again.
    pub fn append(&self, sample: f64) {
        let mut samples = self.lock();
        samples.push_back(sample);
        while samples.len() > self.capacity {
            samples.pop_front();
        }
    }

    /// Copy of the last `n` samples in arrival order (all of them if fewer exist).
    pub fn snapshot(&self, n: usize) -> Vec<f64> {
        let samples = self.lock();
        let skip = samples.len().saturating_sub(n);
        samples.iter().skip(skip).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // Every critical section leaves the deque valid, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, VecDeque<f64>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_returns_everything_before_capacity() {
        let buffer = RingBuffer::new(5);
        for v in [1.0, 2.0, 3.0] {
            buffer.append(v);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.snapshot(10), vec![1.0, 2.0, 3.0]);
        assert_eq!(buffer.snapshot(2), vec![2.0, 3.0]);
    }

    #[test]
    fn evicts_oldest_sample_per_append_at_capacity() {
        let buffer = RingBuffer::new(3);
        for v in [1.0, 2.0, 3.0] {
            buffer.append(v);
        }
        assert_eq!(buffer.snapshot(3), vec![1.0, 2.0, 3.0]);
        buffer.append(4.0);
        assert_eq!(buffer.snapshot(3), vec![2.0, 3.0, 4.0]);
        buffer.append(5.0);
        assert_eq!(buffer.snapshot(3), vec![3.0, 4.0, 5.0]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let buffer = RingBuffer::new(500);
        for i in 0..2_000 {
            buffer.append(i as f64);
            assert!(buffer.len() <= 500);
        }
        let snap = buffer.snapshot(500);
        assert_eq!(snap.len(), 500);
        assert_eq!(snap[0], 1_500.0);
        assert_eq!(snap[499], 1_999.0);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let buffer = RingBuffer::new(0);
        buffer.append(1.0);
        assert!(buffer.is_empty());
        assert!(buffer.snapshot(10).is_empty());
    }

    #[test]
    fn snapshot_is_an_independent_copy() {
        let buffer = RingBuffer::new(4);
        buffer.append(1.0);
        let snap = buffer.snapshot(4);
        buffer.append(2.0);
        buffer.clear();
        assert_eq!(snap, vec![1.0]);
        assert!(buffer.is_empty());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn holds_exactly_the_last_capacity_appends(
                capacity in 0usize..64,
                samples in prop::collection::vec(-1_000.0f64..1_000.0, 0..300),
            ) {
                let buffer = RingBuffer::new(capacity);
                let mut model: Vec<f64> = Vec::new();
                for &v in &samples {
                    buffer.append(v);
                    model.push(v);
                    prop_assert!(buffer.len() <= capacity);
                }
                let keep = model.len().saturating_sub(capacity);
                let expected = &model[keep..];
                prop_assert_eq!(buffer.len(), expected.len());
                prop_assert_eq!(buffer.snapshot(capacity), expected.to_vec());
            }

            #[test]
            fn snapshot_is_the_tail_of_the_contents(
                capacity in 1usize..64,
                appends in 0usize..200,
                n in 0usize..80,
            ) {
                let buffer = RingBuffer::new(capacity);
                for i in 0..appends {
                    buffer.append(i as f64);
                }
                let all = buffer.snapshot(capacity);
                let snap = buffer.snapshot(n);
                prop_assert_eq!(snap.len(), n.min(all.len()));
                prop_assert_eq!(&all[all.len() - snap.len()..], &snap[..]);
            }
        }
    }
}
