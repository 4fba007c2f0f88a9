use std::collections::VecDeque;

use parking_lot::Mutex;

use super::Sample;

/// Bounded FIFO window of the most recent samples for one channel.
///
/// The sampler is the only writer. Estimators read through [`snapshot`],
/// which copies the window under the lock, so a reader never observes a
/// half-finished append.
///
/// [`snapshot`]: SampleBuffer::snapshot
pub struct SampleBuffer {
    capacity: usize,
    window: Mutex<VecDeque<Sample>>,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Appends a sample, evicting the oldest entry once full.
    pub fn push(&self, sample: Sample) {
        let mut window = self.window.lock();

        if window.len() == self.capacity {
            window.pop_front();
        }

        window.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.window.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Copies the current window, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.window.lock().iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volts(window: &[Sample]) -> Vec<f32> {
        window.iter().filter_map(|s| s.voltage()).collect()
    }

    #[test]
    fn holds_at_most_capacity_entries() {
        let buffer = SampleBuffer::new(4);

        for i in 0..20 {
            buffer.push(Sample::Voltage(i as f32));
            assert!(buffer.len() <= 4);
        }

        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn evicts_oldest_first() {
        let buffer = SampleBuffer::new(3);

        for i in 0..5 {
            buffer.push(Sample::Voltage(i as f32));
        }

        assert_eq!(volts(&buffer.snapshot()), vec![2., 3., 4.]);
    }

    #[test]
    fn snapshot_preserves_append_order() {
        let buffer = SampleBuffer::new(10);

        buffer.push(Sample::Voltage(1.));
        buffer.push(Sample::Missing);
        buffer.push(Sample::Voltage(3.));

        assert_eq!(
            buffer.snapshot(),
            vec![Sample::Voltage(1.), Sample::Missing, Sample::Voltage(3.)]
        );
    }

    #[test]
    fn empty_buffer_reports_empty() {
        let buffer = SampleBuffer::new(3);

        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), vec![]);
        assert_eq!(buffer.capacity(), 3);
    }
}
