//! A single position report from the location provider.

use nav_core::GeoPoint;

/// One GPS fix.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocationFix {
    pub point:       GeoPoint,
    /// Direction of travel, degrees clockwise from north.  `None` when the
    /// provider has no heading (standing still, no compass).
    pub bearing_deg: Option<f64>,
    /// Horizontal accuracy radius, metres.
    pub accuracy_m:  f64,
}

impl LocationFix {
    /// Fix at `point` with no heading and 5 m accuracy.
    pub fn new(point: GeoPoint) -> Self {
        Self { point, bearing_deg: None, accuracy_m: 5.0 }
    }

    pub fn with_bearing(mut self, bearing_deg: f64) -> Self {
        self.bearing_deg = Some(bearing_deg.rem_euclid(360.0));
        self
    }

    pub fn with_accuracy(mut self, accuracy_m: f64) -> Self {
        self.accuracy_m = accuracy_m;
        self
    }
}
