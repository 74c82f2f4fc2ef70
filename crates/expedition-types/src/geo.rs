//! Geographic sample types and helpers.
//!
//! [`GpsPoint`] is the canonical timestamped location sample that flows
//! through the entire system: device fixes become points, points fill the
//! track buffer, the offline queue, and the wire protocol. [`LocationFix`]
//! is the raw reading a location source produces before the tracker stamps
//! it with the sampling time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Mean Earth radius in meters, used by the haversine distance.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ---------------------------------------------------------------------------
// GpsPoint
// ---------------------------------------------------------------------------

/// A single timestamped device location sample with accuracy metadata.
///
/// Immutable once created. Latitude and longitude are stored in decimal
/// degrees, altitude and accuracy in meters, speed in meters per second,
/// heading in degrees clockwise from true north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GpsPoint {
    /// Latitude in decimal degrees, clamped to [-90, 90].
    pub lat: f64,
    /// Longitude in decimal degrees, clamped to [-180, 180].
    pub lon: f64,
    /// Altitude above mean sea level, in meters.
    pub altitude_m: f64,
    /// When the sample was taken.
    pub timestamp: DateTime<Utc>,
    /// Estimated horizontal accuracy radius, in meters.
    pub accuracy_m: f64,
    /// Ground speed in meters per second, when the device reports it.
    pub speed_mps: Option<f64>,
    /// Heading in degrees clockwise from true north, when reported.
    pub heading_deg: Option<f64>,
}

impl GpsPoint {
    /// Create a point from a raw [`LocationFix`], stamping it with the
    /// given sampling time.
    ///
    /// Coordinates are clamped into valid ranges; a fix with junk
    /// coordinates still produces a well-formed point rather than
    /// poisoning downstream consumers.
    pub fn from_fix(fix: &LocationFix, timestamp: DateTime<Utc>) -> Self {
        Self {
            lat: fix.lat.clamp(-90.0, 90.0),
            lon: fix.lon.clamp(-180.0, 180.0),
            altitude_m: fix.altitude_m,
            timestamp,
            accuracy_m: fix.accuracy_m.max(0.0),
            speed_mps: fix.speed_mps,
            heading_deg: fix.heading_deg,
        }
    }

    /// Great-circle distance to another point in meters (haversine).
    ///
    /// Ignores altitude. Accurate to well under the GPS error budget at
    /// expedition scales.
    pub fn distance_m(&self, other: &Self) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();

        let a = (dlat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }
}

// ---------------------------------------------------------------------------
// LocationFix
// ---------------------------------------------------------------------------

/// A raw reading from a location source, before timestamping.
///
/// Location sources emit fixes; the tracker converts each fix into a
/// [`GpsPoint`] stamped with the time the sample arrived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LocationFix {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Altitude above mean sea level, in meters.
    pub altitude_m: f64,
    /// Estimated horizontal accuracy radius, in meters.
    pub accuracy_m: f64,
    /// Ground speed in meters per second, if known.
    pub speed_mps: Option<f64>,
    /// Heading in degrees clockwise from true north, if known.
    pub heading_deg: Option<f64>,
}

impl LocationFix {
    /// Create a fix from the mandatory readings, with speed and heading
    /// unset.
    #[must_use]
    pub const fn new(lat: f64, lon: f64, altitude_m: f64, accuracy_m: f64) -> Self {
        Self {
            lat,
            lon,
            altitude_m,
            accuracy_m,
            speed_mps: None,
            heading_deg: None,
        }
    }
}
