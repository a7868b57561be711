//! Trailing window of data points: the authoritative series state.

use super::DataPoint;
use std::collections::VecDeque;

/// Number of points the dashboard keeps.
pub const WINDOW_CAPACITY: usize = 10;

/// Fixed-capacity FIFO buffer, oldest first.
///
/// Points are never reordered or deduplicated: a repeated or regressing
/// `height` is appended like any other point.
#[derive(Debug, Clone)]
pub struct SeriesWindow {
    points: VecDeque<DataPoint>,
    capacity: usize,
}

impl Default for SeriesWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SeriesWindow {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }

    /// A window of another size. Capacity is clamped to at least 1.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Replace all points, keeping the trailing `capacity` of them.
    pub fn replace(&mut self, points: Vec<DataPoint>) {
        let skip = points.len().saturating_sub(self.capacity);
        self.points.clear();
        self.points.extend(points.into_iter().skip(skip));
    }

    /// Push a new point, evicting the oldest if at capacity.
    pub fn append(&mut self, point: DataPoint) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// Owned copy of the window, oldest first.
    pub fn current(&self) -> Vec<DataPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataPoint> {
        self.points.iter()
    }

    pub fn latest(&self) -> Option<&DataPoint> {
        self.points.back()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(height: u64) -> DataPoint {
        DataPoint::new(height, height * 10, 50_000.0 + height as f64, format!("t{height}"))
    }

    fn heights(window: &SeriesWindow) -> Vec<u64> {
        window.iter().map(|p| p.height).collect()
    }

    #[test]
    fn test_append_keeps_call_order() {
        let mut window = SeriesWindow::new();
        window.append(point(1));
        window.append(point(2));
        assert_eq!(heights(&window), [1, 2]);
        assert_eq!(window.latest().unwrap().height, 2);
    }

    #[test]
    fn test_eleventh_append_evicts_oldest() {
        let mut window = SeriesWindow::new();
        for h in 1..=11 {
            window.append(point(h));
        }
        assert_eq!(window.len(), WINDOW_CAPACITY);
        assert_eq!(heights(&window), (2..=11).collect::<Vec<_>>());
    }

    #[test]
    fn test_len_never_exceeds_capacity() {
        let mut window = SeriesWindow::new();
        for h in 0..250 {
            window.append(point(h % 7));
            assert!(window.len() <= WINDOW_CAPACITY);
        }
        let expected: Vec<u64> = (240..250).map(|h| h % 7).collect();
        assert_eq!(heights(&window), expected);
    }

    #[test]
    fn test_duplicates_and_regressions_are_kept() {
        let mut window = SeriesWindow::new();
        window.append(point(5));
        window.append(point(5));
        window.append(point(3));
        assert_eq!(heights(&window), [5, 5, 3]);
    }

    #[test]
    fn test_replace_short_sequence_unchanged() {
        let mut window = SeriesWindow::new();
        window.append(point(99));
        let seed: Vec<_> = (1..=4).map(point).collect();
        window.replace(seed.clone());
        assert_eq!(window.current(), seed);
    }

    #[test]
    fn test_replace_long_sequence_keeps_last_ten() {
        let mut window = SeriesWindow::new();
        window.replace((1..=15).map(point).collect());
        assert_eq!(heights(&window), (6..=15).collect::<Vec<_>>());
    }

    #[test]
    fn test_replace_with_empty_clears() {
        let mut window = SeriesWindow::new();
        window.append(point(1));
        window.replace(Vec::new());
        assert!(window.is_empty());
    }

    #[test]
    fn test_current_is_a_detached_copy() {
        let mut window = SeriesWindow::new();
        window.append(point(1));
        let before = window.current();
        window.append(point(2));
        assert_eq!(before.len(), 1);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_custom_capacity_clamped() {
        let mut window = SeriesWindow::with_capacity(0);
        assert_eq!(window.capacity(), 1);
        window.append(point(1));
        window.append(point(2));
        assert_eq!(heights(&window), [2]);
    }
}
