//! Location source abstraction.
//!
//! A location source is the device side of the tracker: something that,
//! once watched, emits a continuous stream of raw [`LocationFix`] readings.
//! The tracker stamps each fix with arrival time and fans it out from
//! there.
//!
//! Watch failures are the one error class the tracker refuses to handle
//! itself: `PermissionDenied`, `Unavailable`, and `Timeout` propagate to
//! whoever called `start_tracking`, because only the surrounding
//! application can ask the user for permission or decide to degrade.

use std::time::Duration;

use tokio::sync::mpsc;

use expedition_types::LocationFix;

/// Default watch timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default maximum age a cached fix may have before it is refreshed.
const DEFAULT_MAXIMUM_AGE: Duration = Duration::from_secs(1);

/// Default interval between samples.
const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

/// Buffered fixes per watch before backpressure applies.
pub(crate) const FIX_CHANNEL_CAPACITY: usize = 32;

// ---------------------------------------------------------------------------
// WatchOptions
// ---------------------------------------------------------------------------

/// Options controlling a continuous location watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Request the most accurate positioning the hardware offers, at the
    /// cost of power.
    pub high_accuracy: bool,
    /// How long the source may take to produce a first fix before the
    /// watch fails with [`LocationError::Timeout`].
    pub timeout: Duration,
    /// Maximum age of a cached fix the source may serve instead of taking
    /// a fresh reading.
    pub maximum_age: Duration,
    /// Interval between samples for sources that control their own
    /// cadence.
    pub sample_interval: Duration,
}

impl WatchOptions {
    /// Stock options: high accuracy, 10s timeout, 1s maximum age, 5s
    /// sampling interval.
    pub const fn new() -> Self {
        Self {
            high_accuracy: true,
            timeout: DEFAULT_TIMEOUT,
            maximum_age: DEFAULT_MAXIMUM_AGE,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }

    /// Set the accuracy preference.
    #[must_use]
    pub const fn with_high_accuracy(mut self, high_accuracy: bool) -> Self {
        self.high_accuracy = high_accuracy;
        self
    }

    /// Set the first-fix timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum cached-fix age.
    #[must_use]
    pub const fn with_maximum_age(mut self, maximum_age: Duration) -> Self {
        self.maximum_age = maximum_age;
        self
    }

    /// Set the sampling interval.
    #[must_use]
    pub const fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// LocationError
// ---------------------------------------------------------------------------

/// Why a location watch could not be started.
///
/// Mirrors the standard device positioning error codes, with the
/// human-readable phrasing the dashboard shows verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The user denied the positioning permission.
    #[error("location permission denied")]
    PermissionDenied,

    /// No positioning hardware or provider is available.
    #[error("location unavailable")]
    Unavailable,

    /// The source produced no fix within the configured timeout.
    #[error("location request timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// LocationSource
// ---------------------------------------------------------------------------

/// Continuous stream of raw fixes from an active watch.
///
/// Dropping the stream cancels the watch: the source's sampling task
/// notices the closed channel and stops.
pub type FixStream = mpsc::Receiver<LocationFix>;

/// A device location provider.
///
/// Implementations spawn whatever sampling machinery they need and hand
/// back a [`FixStream`]. Errors are returned from `watch` itself, never
/// smuggled into the stream.
pub trait LocationSource: Send + Sync {
    /// Begin continuous sampling with the given options.
    ///
    /// # Errors
    ///
    /// Returns a [`LocationError`] when the watch cannot be started;
    /// callers of `start_tracking` receive it unchanged.
    fn watch(
        &self,
        options: WatchOptions,
    ) -> impl Future<Output = Result<FixStream, LocationError>> + Send;
}
