//! In-memory GPS track buffer.
//!
//! The buffer is a sliding window over the device's own samples: appends
//! evict the oldest entry once the capacity is reached, so memory stays
//! bounded however long the watch runs. Remote participants' positions
//! never enter this buffer.

use std::collections::VecDeque;

use expedition_types::GpsPoint;

/// Default number of points retained in the track buffer.
pub const DEFAULT_TRACK_CAPACITY: usize = 100;

/// Bounded sliding window of the device's recent GPS samples.
///
/// Invariant: never holds more than `capacity` points; the oldest point is
/// evicted first.
#[derive(Debug, Clone)]
pub struct TrackBuffer {
    points: VecDeque<GpsPoint>,
    capacity: usize,
}

impl TrackBuffer {
    /// Create a buffer with the default capacity of
    /// [`DEFAULT_TRACK_CAPACITY`] points.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TRACK_CAPACITY)
    }

    /// Create a buffer retaining at most `capacity` points.
    ///
    /// A zero capacity is bumped to one so `push` always retains the
    /// newest sample.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a point, evicting the oldest when the buffer is full.
    pub fn push(&mut self, point: GpsPoint) {
        if self.points.len() >= self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    /// The most recently appended point, if any.
    pub fn latest(&self) -> Option<&GpsPoint> {
        self.points.back()
    }

    /// All retained points, oldest first.
    pub fn to_vec(&self) -> Vec<GpsPoint> {
        self.points.iter().copied().collect()
    }

    /// Number of points currently retained.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the buffer holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Maximum number of points the buffer retains.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TrackBuffer {
    fn default() -> Self {
        Self::new()
    }
}
