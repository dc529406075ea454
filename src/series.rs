//! Consumer-side bounded window over live time-series points.

#[cfg(test)]
#[path = "series_test.rs"]
mod series_test;

use std::collections::VecDeque;

use crate::types::TimeSeriesPoint;

/// Default window length; matches what the detail chart renders.
pub const DEFAULT_CAPACITY: usize = 50;

/// One charted point, with the monotonically increasing sequence index
/// this window assigned on insertion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesPoint {
    pub index: u64,
    pub activity: f64,
    pub feeding_time: f64,
}

/// Fixed-capacity FIFO window: pushing past the bound evicts the oldest
/// point. Indices keep counting up across evictions, so the chart axis
/// stays stable as the window slides.
#[derive(Clone, Debug)]
pub struct SeriesWindow {
    points: VecDeque<SeriesPoint>,
    capacity: usize,
    next_index: u64,
}

impl SeriesWindow {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: VecDeque::new(),
            capacity: capacity.max(1),
            next_index: 1,
        }
    }

    /// Append one point, assigning it the next sequence index.
    pub fn push(&mut self, activity: f64, feeding_time: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(SeriesPoint {
            index: self.next_index,
            activity,
            feeding_time,
        });
        self.next_index += 1;
    }

    /// Seed the window from a snapshot's initial series, oldest first.
    pub fn seed<I>(&mut self, points: I)
    where
        I: IntoIterator<Item = TimeSeriesPoint>,
    {
        for point in points {
            self.push(point.activity, point.feeding_time);
        }
    }

    /// Points in arrival order, oldest first.
    pub fn points(&self) -> impl Iterator<Item = &SeriesPoint> {
        self.points.iter()
    }

    #[must_use]
    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl Default for SeriesWindow {
    fn default() -> Self {
        Self::new()
    }
}
