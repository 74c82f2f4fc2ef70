//! Simulated location source.
//!
//! Generates a plausible random walk around a base coordinate: slow
//! horizontal drift, a gentle climb, and accuracy that tightens when high
//! accuracy is requested. Drives demos and any environment without real
//! positioning hardware.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use expedition_types::LocationFix;

use crate::location::{FIX_CHANNEL_CAPACITY, FixStream, LocationError, LocationSource, WatchOptions};

/// Horizontal drift per step, in degrees.
const STEP_DEGREES: f64 = 0.0004;

/// Vertical gain per step, in meters.
const CLIMB_STEP_M: f64 = 1.5;

/// Accuracy radius reported under high accuracy, in meters.
const ACCURACY_HIGH_M: f64 = 5.0;

/// Accuracy radius reported under standard accuracy, in meters.
const ACCURACY_STANDARD_M: f64 = 25.0;

/// A location source that fabricates a random walk.
///
/// Each watch gets an independent walk from the same base coordinate.
/// Seeded construction makes the walk reproducible.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    base: LocationFix,
    seed: Option<u64>,
}

impl SimulatedSource {
    /// Create a source walking from the given base coordinate.
    pub const fn new(base: LocationFix) -> Self {
        Self { base, seed: None }
    }

    /// Make every watch reproduce the same walk.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl LocationSource for SimulatedSource {
    async fn watch(&self, options: WatchOptions) -> Result<FixStream, LocationError> {
        let (tx, rx) = mpsc::channel(FIX_CHANNEL_CAPACITY);
        let mut rng = self
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        let accuracy = if options.high_accuracy {
            ACCURACY_HIGH_M
        } else {
            ACCURACY_STANDARD_M
        };
        let mut current = self.base;
        current.accuracy_m = accuracy;
        let interval = options.sample_interval;

        tokio::spawn(async move {
            loop {
                let dlat = rng.random_range(-STEP_DEGREES..STEP_DEGREES);
                let dlon = rng.random_range(-STEP_DEGREES..STEP_DEGREES);
                let dalt = rng.random_range(0.0..CLIMB_STEP_M);

                let previous = current;
                current.lat = (current.lat + dlat).clamp(-90.0, 90.0);
                current.lon = (current.lon + dlon).clamp(-180.0, 180.0);
                current.altitude_m += dalt;
                current.speed_mps = Some(step_speed(&previous, &current, interval.as_secs_f64()));
                current.heading_deg = Some(step_heading(&previous, &current));

                if tx.send(current).await.is_err() {
                    // Watch cancelled; the stream was dropped.
                    return;
                }
                tokio::time::sleep(interval).await;
            }
        });

        Ok(rx)
    }
}

/// Approximate ground speed between two consecutive fixes.
fn step_speed(from: &LocationFix, to: &LocationFix, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    // Equirectangular approximation is fine at walk-step scales.
    let mean_lat = ((from.lat + to.lat) / 2.0).to_radians();
    let dx = (to.lon - from.lon).to_radians() * mean_lat.cos();
    let dy = (to.lat - from.lat).to_radians();
    let distance_m = (dx * dx + dy * dy).sqrt() * 6_371_000.0;
    distance_m / elapsed_secs
}

/// Bearing from one fix to the next, in degrees clockwise from north.
fn step_heading(from: &LocationFix, to: &LocationFix) -> f64 {
    let dx = to.lon - from.lon;
    let dy = to.lat - from.lat;
    let degrees = dx.atan2(dy).to_degrees();
    if degrees < 0.0 { degrees + 360.0 } else { degrees }
}
