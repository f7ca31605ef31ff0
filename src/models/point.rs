//! Validated geographic point

use serde::{Deserialize, Serialize};

use crate::TunnelWatchError;

/// Latitude/longitude pair in decimal degrees.
///
/// A `Point` can only be built through [`Point::new`] or deserialization,
/// both of which reject out-of-range and non-finite coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPoint")]
pub struct Point {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct RawPoint {
    lat: f64,
    lng: f64,
}

impl TryFrom<RawPoint> for Point {
    type Error = TunnelWatchError;

    fn try_from(raw: RawPoint) -> Result<Self, Self::Error> {
        Point::new(raw.lat, raw.lng)
    }
}

impl Point {
    /// Create a point, validating latitude in [-90, 90] and longitude in [-180, 180]
    pub fn new(lat: f64, lng: f64) -> crate::Result<Self> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(TunnelWatchError::validation(format!(
                "latitude {lat} must be between -90 and 90"
            )));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(TunnelWatchError::validation(format!(
                "longitude {lng} must be between -180 and 180"
            )));
        }
        Ok(Self { lat, lng })
    }

    /// Latitude in decimal degrees
    #[must_use]
    pub fn lat(&self) -> f64 {
        self.lat
    }

    /// Longitude in decimal degrees
    #[must_use]
    pub fn lng(&self) -> f64 {
        self.lng
    }

    /// Format point as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lng)
    }
}
