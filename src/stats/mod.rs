//! Sliding-window statistics
//!
//! - `RollingWindow`: bounded FIFO buffer, oldest entry evicted on overflow
//! - `WindowStatistics`: population statistics over a slice of values
//!
//! Statistics are recomputed from the whole buffer on every call (O(window)).
//! Mean and variance use running updates, so windows of large finite values
//! stay finite.

use serde::Serialize;
use statrs::statistics::Statistics;
use std::collections::VecDeque;

// ============================================================================
// Rolling Window
// ============================================================================

/// Bounded FIFO buffer.
///
/// Invariant: `len() <= capacity()` after every `push`.
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    buffer: VecDeque<T>,
    capacity: usize,
}

impl<T> RollingWindow<T> {
    /// Create a window holding at most `capacity` entries (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a value, returning the evicted oldest entry if the window was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        self.buffer.push_back(value);
        if self.buffer.len() > self.capacity {
            self.buffer.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() == self.capacity
    }

    /// Newest entry
    pub fn latest(&self) -> Option<&T> {
        self.buffer.back()
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.buffer.iter()
    }

}

impl RollingWindow<f64> {
    /// Population statistics over the current contents.
    pub fn statistics(&self) -> Option<WindowStatistics> {
        WindowStatistics::from_values(self.buffer.iter().copied())
    }
}

// ============================================================================
// Window Statistics
// ============================================================================

/// Population statistics over a window of values (divide by `count`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStatistics {
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl WindowStatistics {
    /// Compute statistics, or `None` for an empty input.
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
    {
        let values: Vec<f64> = values.into_iter().collect();
        if values.is_empty() {
            return None;
        }

        let mean = Statistics::mean(values.iter());
        let variance = Statistics::mean(values.iter().map(|v| {
            let d = v - mean;
            d * d
        }));

        Some(Self {
            count: values.len(),
            sum: values.iter().sum(),
            mean,
            variance,
            std_dev: variance.sqrt(),
            min: Statistics::min(values.iter()),
            max: Statistics::max(values.iter()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_evicts_oldest() {
        let mut window = RollingWindow::new(3);
        assert_eq!(window.push(1.0), None);
        assert_eq!(window.push(2.0), None);
        assert_eq!(window.push(3.0), None);
        assert!(window.is_full());
        assert_eq!(window.push(4.0), Some(1.0));
        assert_eq!(window.push(5.0), Some(2.0));

        let contents: Vec<f64> = window.iter().copied().collect();
        assert_eq!(contents, vec![3.0, 4.0, 5.0]);
        assert_eq!(window.latest(), Some(&5.0));
    }

    #[test]
    fn test_window_holds_last_w_values_in_order() {
        for w in [1usize, 2, 5, 10] {
            let mut window = RollingWindow::new(w);
            let n = w * 3 + 1;
            for i in 0..n {
                window.push(i as f64);
                assert!(window.len() <= w);
            }
            let contents: Vec<f64> = window.iter().copied().collect();
            let expected: Vec<f64> = ((n - w)..n).map(|i| i as f64).collect();
            assert_eq!(contents, expected, "window size {w}");
        }
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut window = RollingWindow::new(0);
        assert_eq!(window.capacity(), 1);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_population_statistics() {
        let stats =
            WindowStatistics::from_values([2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.count, 8);
        assert_eq!(stats.sum, 40.0);
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.variance - 4.0).abs() < 1e-9);
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
        assert_eq!(stats.min, 2.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn test_identical_values_have_zero_std_dev() {
        let stats = WindowStatistics::from_values(std::iter::repeat(10.0).take(10)).unwrap();
        assert_eq!(stats.mean, 10.0);
        assert!(stats.std_dev.abs() < 1e-12);
    }

    #[test]
    fn test_large_finite_values_do_not_overflow() {
        let stats = WindowStatistics::from_values([1.0e308; 5]).unwrap();
        assert_eq!(stats.mean, 1.0e308);
        assert_eq!(stats.std_dev, 0.0);
        assert!(stats.sum.is_infinite());

        let stats = WindowStatistics::from_values([1.5e308, 1.7e308]).unwrap();
        assert!((stats.mean - 1.6e308).abs() < 1e293);
    }

    #[test]
    fn test_empty_has_no_statistics() {
        assert!(WindowStatistics::from_values(Vec::new()).is_none());
        assert!(RollingWindow::<f64>::new(4).statistics().is_none());
    }
}
