//! Geodetic → planar projection.
//!
//! Converts WGS84 latitude/longitude into SVY21 (EPSG:3414) plane
//! coordinates via the standard Gauss–Krüger Transverse Mercator forward
//! series. Only the forward direction is implemented; the bridge never
//! converts planar positions back to geodetic.
//!
//! EPSG:3414 orders its axes (northing, easting); the fleet bridge works in
//! `(x = easting, y = northing)`, so [`GeoTransform::to_planar`] performs
//! the swap before returning.
//!
//! # Example
//!
//! ```rust
//! use fleetlink_geo::transform::GeoTransform;
//!
//! let tf = GeoTransform::new();
//! // The projection origin maps exactly onto the false origin.
//! let p = tf.to_planar(1.0 + 22.0 / 60.0, 103.0 + 50.0 / 60.0);
//! assert!((p.x - 28_001.642).abs() < 1e-6);
//! assert!((p.y - 38_744.572).abs() < 1e-6);
//! ```

// ────────────────────────────────────────────────────────────────────────────
// Projection constants (EPSG:3414 on the WGS84 ellipsoid)
// ────────────────────────────────────────────────────────────────────────────

/// Semi-major axis of the WGS84 ellipsoid (metres).
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;
/// Flattening of the WGS84 ellipsoid.
const FLATTENING: f64 = 1.0 / 298.257_223_563;
/// SVY21 scale factor at the natural origin.
const SCALE_FACTOR: f64 = 1.0;
/// SVY21 false easting (metres).
const FALSE_EASTING: f64 = 28_001.642;
/// SVY21 false northing (metres).
const FALSE_NORTHING: f64 = 38_744.572;
/// Latitude of the natural origin: 1°22′N.
const ORIGIN_LAT_DEG: f64 = 1.0 + 22.0 / 60.0;
/// Longitude of the natural origin: 103°50′E.
const ORIGIN_LON_DEG: f64 = 103.0 + 50.0 / 60.0;

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// A position in the planar frame: `x` east, `y` north, metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlanarPosition {
    pub x: f64,
    pub y: f64,
}

/// Stateless geodetic → planar converter.
///
/// Construction precomputes the meridian arc at the projection origin;
/// after that every call is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct GeoTransform {
    origin_arc: f64,
}

impl GeoTransform {
    pub fn new() -> Self {
        Self {
            origin_arc: meridian_arc(ORIGIN_LAT_DEG.to_radians()),
        }
    }

    /// Project a WGS84 coordinate (degrees) onto the SVY21 plane.
    pub fn to_planar(&self, lat_deg: f64, lon_deg: f64) -> PlanarPosition {
        let phi = lat_deg.to_radians();
        let d_lambda = (lon_deg - ORIGIN_LON_DEG).to_radians();

        let e2 = FLATTENING * (2.0 - FLATTENING);
        // Second eccentricity squared.
        let ep2 = e2 / (1.0 - e2);

        let sin_phi = phi.sin();
        let cos_phi = phi.cos();
        // Radius of curvature in the prime vertical.
        let nu = SEMI_MAJOR_AXIS / (1.0 - e2 * sin_phi * sin_phi).sqrt();
        let t = phi.tan() * phi.tan();
        let c = ep2 * cos_phi * cos_phi;
        let a = d_lambda * cos_phi;

        let easting = FALSE_EASTING
            + SCALE_FACTOR
                * nu
                * (a
                    + (1.0 - t + c) * a.powi(3) / 6.0
                    + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0);

        let northing = FALSE_NORTHING
            + SCALE_FACTOR
                * (meridian_arc(phi) - self.origin_arc
                    + nu * phi.tan()
                        * (a * a / 2.0
                            + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                            + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2)
                                * a.powi(6)
                                / 720.0));

        PlanarPosition {
            x: easting,
            y: northing,
        }
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

/// Meridian arc length from the equator to latitude `phi` (radians).
fn meridian_arc(phi: f64) -> f64 {
    let e2 = FLATTENING * (2.0 - FLATTENING);
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    SEMI_MAJOR_AXIS
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_projects_onto_false_origin() {
        let tf = GeoTransform::new();
        let p = tf.to_planar(ORIGIN_LAT_DEG, ORIGIN_LON_DEG);
        assert!((p.x - FALSE_EASTING).abs() < 1e-6, "x = {}", p.x);
        assert!((p.y - FALSE_NORTHING).abs() < 1e-6, "y = {}", p.y);
    }

    #[test]
    fn northward_step_grows_northing_only() {
        let tf = GeoTransform::new();
        let p = tf.to_planar(ORIGIN_LAT_DEG + 0.01, ORIGIN_LON_DEG);
        // 0.01° of latitude ≈ 1105.7 m of meridian arc at this latitude.
        assert!((p.y - FALSE_NORTHING - 1105.7).abs() < 2.0, "y = {}", p.y);
        // On the central meridian the easting stays at the false easting.
        assert!((p.x - FALSE_EASTING).abs() < 1e-6, "x = {}", p.x);
    }

    #[test]
    fn eastward_step_grows_easting() {
        let tf = GeoTransform::new();
        let p = tf.to_planar(ORIGIN_LAT_DEG, ORIGIN_LON_DEG + 0.01);
        // 0.01° of longitude ≈ 1112.9 m at 1.37°N.
        assert!((p.x - FALSE_EASTING - 1112.9).abs() < 2.0, "x = {}", p.x);
        // Grid convergence pulls the northing up by only a few millimetres.
        let dy = p.y - FALSE_NORTHING;
        assert!(dy > 0.0 && dy < 0.05, "dy = {dy}");
    }

    #[test]
    fn westward_step_shrinks_easting() {
        let tf = GeoTransform::new();
        let p = tf.to_planar(ORIGIN_LAT_DEG, ORIGIN_LON_DEG - 0.05);
        assert!(p.x < FALSE_EASTING);
    }

    #[test]
    fn projection_is_deterministic() {
        let tf = GeoTransform::new();
        let a = tf.to_planar(1.3, 103.8);
        let b = tf.to_planar(1.3, 103.8);
        assert_eq!(a, b);
    }
}
