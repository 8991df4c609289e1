//! Geographic coordinate type and the small amount of spherical/planar
//! geometry the router and matcher need.
//!
//! `GeoPoint` is double precision: the matcher reports arc lengths to well
//! under a metre, which single precision cannot hold at city scale.

/// Mean Earth radius, metres.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS-84 geographic coordinate.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Result of projecting a point onto a segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Projection {
    /// The closest point on the segment.
    pub point: GeoPoint,
    /// Position along the segment, `0.0` at its start and `1.0` at its end.
    pub t: f64,
    /// Great-circle distance from the query point to `point`, metres.
    pub distance_m: f64,
}

impl GeoPoint {
    #[inline]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine great-circle distance in metres.
    pub fn distance_m(self, other: GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();

        let a = (d_lat * 0.5).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon * 0.5).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_M * c
    }

    /// Initial bearing from `self` towards `other`, degrees clockwise from
    /// north in `[0, 360)`.
    pub fn bearing_deg(self, other: GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let y = d_lon.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();
        y.atan2(x).to_degrees().rem_euclid(360.0)
    }

    /// Linear interpolation in lat/lon space.  Exact enough for the short
    /// segments of a road polyline.
    #[inline]
    pub fn lerp(self, other: GeoPoint, t: f64) -> GeoPoint {
        GeoPoint {
            lat: self.lat + (other.lat - self.lat) * t,
            lon: self.lon + (other.lon - self.lon) * t,
        }
    }

    /// Project `self` onto the segment `a → b`.
    ///
    /// Uses an equirectangular plane centred on `a`; the projection is
    /// clamped to the segment.  A degenerate segment projects onto `a`.
    pub fn project_onto(self, a: GeoPoint, b: GeoPoint) -> Projection {
        let k = a.lat.to_radians().cos();
        let (bx, by) = ((b.lon - a.lon) * k, b.lat - a.lat);
        let (px, py) = ((self.lon - a.lon) * k, self.lat - a.lat);

        let len2 = bx * bx + by * by;
        let t = if len2 <= f64::EPSILON * f64::EPSILON {
            0.0
        } else {
            ((px * bx + py * by) / len2).clamp(0.0, 1.0)
        };

        let point = a.lerp(b, t);
        Projection { point, t, distance_m: self.distance_m(point) }
    }

    /// Half-extents in degrees `(lat, lon)` of a box that contains every
    /// point within `radius_m` of `self`.
    pub fn degree_radius(self, radius_m: f64) -> (f64, f64) {
        let d_lat = (radius_m / EARTH_RADIUS_M).to_degrees();
        let cos = self.lat.to_radians().cos().max(1e-6);
        (d_lat, d_lat / cos)
    }

    /// `true` when both coordinates agree to within ~1 cm.
    #[inline]
    pub fn almost_eq(self, other: GeoPoint) -> bool {
        const EPS_DEG: f64 = 1e-7;
        (self.lat - other.lat).abs() <= EPS_DEG && (self.lon - other.lon).abs() <= EPS_DEG
    }
}

/// Smallest absolute difference between two headings, degrees in `[0, 180]`.
pub fn heading_delta_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    if d > 180.0 { 360.0 - d } else { d }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}
