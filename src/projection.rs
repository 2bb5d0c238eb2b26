//! Equal-area projection used to measure burned area.
//!
//! Display geometry stays geographic; only a transient projected copy is
//! measured, so nothing downstream ever sees planar coordinates.

use geo::{Area, MapCoords, MultiPolygon};

// GRS80 ellipsoid
const SEMI_MAJOR_AXIS_M: f64 = 6_378_137.0;
const FLATTENING: f64 = 1.0 / 298.257_222_101;

/// Albers equal-area conic projection on the GRS80 ellipsoid (Snyder 1987, ch. 14).
#[derive(Debug, Clone, Copy)]
pub struct AlbersEqualArea {
    n: f64,
    c: f64,
    rho0: f64,
    e: f64,
    lon0_rad: f64,
    false_easting: f64,
    false_northing: f64,
}

impl AlbersEqualArea {
    pub fn new(
        lat1_deg: f64,
        lat2_deg: f64,
        lat0_deg: f64,
        lon0_deg: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let e2 = FLATTENING * (2.0 - FLATTENING);
        let e = e2.sqrt();
        let lat1 = lat1_deg.to_radians();
        let lat2 = lat2_deg.to_radians();
        let lat0 = lat0_deg.to_radians();

        let m1 = Self::m(e2, lat1);
        let m2 = Self::m(e2, lat2);
        let q0 = Self::q(e, e2, lat0);
        let q1 = Self::q(e, e2, lat1);
        let q2 = Self::q(e, e2, lat2);

        let n = (m1 * m1 - m2 * m2) / (q2 - q1);
        let c = m1 * m1 + n * q1;
        let rho0 = SEMI_MAJOR_AXIS_M * (c - n * q0).sqrt() / n;

        Self {
            n,
            c,
            rho0,
            e,
            lon0_rad: lon0_deg.to_radians(),
            false_easting,
            false_northing,
        }
    }

    /// NAD83 / California Albers (EPSG:3310), the system the source datasets
    /// were measured in.
    pub fn california() -> Self {
        Self::new(34.0, 40.5, 0.0, -120.0, 0.0, -4_000_000.0)
    }

    fn m(e2: f64, lat: f64) -> f64 {
        lat.cos() / (1.0 - e2 * lat.sin() * lat.sin()).sqrt()
    }

    fn q(e: f64, e2: f64, lat: f64) -> f64 {
        let s = lat.sin();
        (1.0 - e2) * (s / (1.0 - e2 * s * s) - (1.0 / (2.0 * e)) * ((1.0 - e * s) / (1.0 + e * s)).ln())
    }

    /// Project a geographic coordinate to planar meters.
    pub fn project(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let e2 = self.e * self.e;
        let q = Self::q(self.e, e2, lat_deg.to_radians());
        let rho = SEMI_MAJOR_AXIS_M * (self.c - self.n * q).sqrt() / self.n;
        let theta = self.n * (lon_deg.to_radians() - self.lon0_rad);
        let x = self.false_easting + rho * theta.sin();
        let y = self.false_northing + self.rho0 - rho * theta.cos();
        (x, y)
    }

    /// Measure a geographic multi-polygon in hectares.
    pub fn area_ha(&self, geometry: &MultiPolygon<f64>) -> f64 {
        let projected = geometry.map_coords(|coord| {
            let (x, y) = self.project(coord.x, coord.y);
            geo::coord! { x: x, y: y }
        });
        projected.unsigned_area() / 10_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    #[test]
    fn central_meridian_projects_to_zero_easting() {
        let albers = AlbersEqualArea::california();
        let (x, _) = albers.project(-120.0, 37.0);
        assert!(x.abs() < 1e-6, "easting on the central meridian was {}", x);
    }

    #[test]
    fn small_square_area_matches_geodetic_estimate() {
        // 0.01 x 0.01 degree square near Fresno; roughly 1110m x 890m ~ 98.8 ha.
        let square = MultiPolygon::new(vec![polygon![
            (x: -119.00, y: 37.00),
            (x: -118.99, y: 37.00),
            (x: -118.99, y: 37.01),
            (x: -119.00, y: 37.01),
        ]]);
        let area = AlbersEqualArea::california().area_ha(&square);
        assert!(
            (96.0..=102.0).contains(&area),
            "expected ~98.8 ha, got {}",
            area
        );
    }

    #[test]
    fn winding_order_does_not_make_area_negative() {
        let clockwise = MultiPolygon::new(vec![polygon![
            (x: -119.00, y: 37.01),
            (x: -118.99, y: 37.01),
            (x: -118.99, y: 37.00),
            (x: -119.00, y: 37.00),
        ]]);
        let area = AlbersEqualArea::california().area_ha(&clockwise);
        assert!(area > 0.0 && area.is_finite());
    }
}
