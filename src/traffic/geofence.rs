//! Geofence verification for tunnel entrance reports

use crate::TunnelWatchError;
use crate::models::Point;

/// Default admissibility radius around an entrance
pub const DEFAULT_RADIUS_METERS: f64 = 200.0;

/// Great-circle distance between two points in meters.
///
/// Haversine on a sphere of radius 6 371 km; symmetric in its arguments.
#[must_use]
pub fn distance_meters(from: &Point, to: &Point) -> f64 {
    let from = haversine::Location {
        latitude: from.lat(),
        longitude: from.lng(),
    };
    let to = haversine::Location {
        latitude: to.lat(),
        longitude: to.lng(),
    };
    haversine::distance(from, to, haversine::Units::Kilometers) * 1000.0
}

/// Decides whether a claimed position is close enough to an entrance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceVerifier {
    radius_meters: f64,
}

impl Default for GeofenceVerifier {
    fn default() -> Self {
        Self {
            radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

impl GeofenceVerifier {
    /// Verifier admitting points up to `radius_meters` away.
    ///
    /// The radius must be finite and non-negative.
    pub fn new(radius_meters: f64) -> crate::Result<Self> {
        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(TunnelWatchError::validation(format!(
                "Geofence radius must be a non-negative number of meters, got {radius_meters}"
            )));
        }
        Ok(Self { radius_meters })
    }

    #[must_use]
    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    /// True when `candidate` lies within the radius of `reference` (inclusive)
    #[must_use]
    pub fn is_admissible(&self, candidate: &Point, reference: &Point) -> bool {
        distance_meters(candidate, reference) <= self.radius_meters
    }
}
