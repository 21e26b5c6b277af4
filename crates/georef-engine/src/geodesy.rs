//! Minimal geodesy for closure checks
//!
//! Geographic coordinates are projected onto a local tangent plane of the
//! GRS80 ellipsoid (the SIRGAS 2000 ellipsoid). Over a property-sized extent
//! the plane error is far below survey tolerances; no datum transformation is
//! attempted.

use georef_types::{AbsoluteCoordinate, CoordinateKind};

/// GRS80 semi-major axis in meters
pub const GRS80_A: f64 = 6_378_137.0;
/// GRS80 flattening
pub const GRS80_F: f64 = 1.0 / 298.257_222_101;

/// Below this a length is treated as zero
pub const LENGTH_EPSILON: f64 = 1e-9;

/// Tangent plane anchored at a geographic origin
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalPlane {
    origin_lon: f64,
    origin_lat: f64,
    /// Meters per radian of longitude at the origin
    east_scale: f64,
    /// Meters per radian of latitude at the origin
    north_scale: f64,
}

impl LocalPlane {
    pub fn new(origin_lon: f64, origin_lat: f64) -> Self {
        let e2 = GRS80_F * (2.0 - GRS80_F);
        let phi = origin_lat.to_radians();
        let w = (1.0 - e2 * phi.sin().powi(2)).sqrt();
        let prime_vertical = GRS80_A / w;
        let meridional = GRS80_A * (1.0 - e2) / w.powi(3);
        Self {
            origin_lon,
            origin_lat,
            east_scale: prime_vertical * phi.cos(),
            north_scale: meridional,
        }
    }

    /// (east, north) in meters of a longitude/latitude pair in degrees
    pub fn project(&self, lon: f64, lat: f64) -> (f64, f64) {
        (
            self.east_scale * (lon - self.origin_lon).to_radians(),
            self.north_scale * (lat - self.origin_lat).to_radians(),
        )
    }
}

/// Puts every coordinate of one frame on a common metric plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Planar {
    Projected,
    Geographic(LocalPlane),
}

impl Planar {
    /// Frame for a set of coordinates, anchored at their mean position
    pub fn for_coordinates<'a, I>(kind: CoordinateKind, coordinates: I) -> Self
    where
        I: IntoIterator<Item = &'a AbsoluteCoordinate>,
    {
        match kind {
            CoordinateKind::Projected => Planar::Projected,
            CoordinateKind::Geographic => {
                let (mut lon, mut lat, mut count) = (0.0, 0.0, 0usize);
                for c in coordinates.into_iter().filter(|c| c.kind == kind) {
                    lon += c.x;
                    lat += c.y;
                    count += 1;
                }
                let n = count.max(1) as f64;
                Planar::Geographic(LocalPlane::new(lon / n, lat / n))
            }
        }
    }

    pub fn point(&self, coordinate: &AbsoluteCoordinate) -> (f64, f64) {
        match self {
            Planar::Projected => (coordinate.x, coordinate.y),
            Planar::Geographic(plane) => plane.project(coordinate.x, coordinate.y),
        }
    }
}

/// Components of a leg: `(d·sin az, d·cos az)`
pub fn leg_vector(azimuth_deg: f64, distance: f64) -> (f64, f64) {
    let az = azimuth_deg.to_radians();
    (distance * az.sin(), distance * az.cos())
}

/// Azimuth (degrees clockwise from north, [0, 360)) and length between points
pub fn azimuth_distance(from: (f64, f64), to: (f64, f64)) -> (f64, f64) {
    let de = to.0 - from.0;
    let dn = to.1 - from.1;
    let distance = de.hypot(dn);
    let azimuth = de.atan2(dn).to_degrees().rem_euclid(360.0);
    (if azimuth >= 360.0 { 0.0 } else { azimuth }, distance)
}

/// Smallest signed difference between two azimuths, in degrees
pub fn azimuth_difference(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    if diff > 180.0 {
        diff - 360.0
    } else {
        diff
    }
}

/// Signed shoelace area; positive for counter-clockwise rings.
/// Points are taken relative to the first one so UTM-sized values keep
/// their precision.
pub fn signed_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let (x0, y0) = points[0];
    let twice: f64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| (a.0 - x0) * (b.1 - y0) - (b.0 - x0) * (a.1 - y0))
        .sum();
    twice / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_local_plane_scale_at_equator() {
        let plane = LocalPlane::new(0.0, 0.0);
        let (east, north) = plane.project(1.0, 0.0);
        // One degree of longitude on the equator is 2πa/360
        assert!(approx(east, 111_319.49, 0.01));
        assert_eq!(north, 0.0);
    }

    #[test]
    fn test_local_plane_one_arcsecond_of_latitude() {
        let plane = LocalPlane::new(-47.0, -22.5);
        let (_, north) = plane.project(-47.0, -22.5 + 1.0 / 3600.0);
        assert!(approx(north, 30.76, 0.01));
    }

    #[test]
    fn test_azimuth_distance() {
        let (az, d) = azimuth_distance((0.0, 0.0), (1.0, 1.0));
        assert!(approx(az, 45.0, 1e-12));
        assert!(approx(d, 2f64.sqrt(), 1e-12));
        let (az, _) = azimuth_distance((0.0, 0.0), (-1.0, 0.0));
        assert!(approx(az, 270.0, 1e-12));
    }

    #[test]
    fn test_azimuth_difference_wraps() {
        assert!(approx(azimuth_difference(359.0, 1.0), -2.0, 1e-12));
        assert!(approx(azimuth_difference(1.0, 359.0), 2.0, 1e-12));
        assert!(approx(azimuth_difference(90.0, 90.0), 0.0, 1e-12));
    }

    #[test]
    fn test_signed_area_orientation() {
        let ccw = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)];
        assert_eq!(signed_area(&ccw), 1.0);
        let cw: Vec<_> = ccw.iter().rev().copied().collect();
        assert_eq!(signed_area(&cw), -1.0);
        assert_eq!(signed_area(&ccw[..2]), 0.0);
    }
}
