use crate::model::{RelativeGeometry, Sensor};
use crate::prelude::{ArrayError, ArrayResult};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Projects geographic sensor coordinates onto a local east/north plane.
///
/// Uses an equirectangular projection scaled by the cosine of the mean
/// latitude, which is adequate for arrays a few kilometres across. Offsets
/// are centred on the array centroid.
pub struct GeometryResolver;

impl GeometryResolver {
    /// `coordinates` are `(latitude, longitude)` pairs in decimal degrees.
    pub fn resolve(coordinates: &[(f64, f64)]) -> ArrayResult<RelativeGeometry> {
        if coordinates.len() < 3 {
            return Err(ArrayError::InvalidGeometry(format!(
                "at least 3 sensors required, got {}",
                coordinates.len()
            )));
        }
        for (index, &(latitude, longitude)) in coordinates.iter().enumerate() {
            if !(latitude.is_finite() && (-90.0..=90.0).contains(&latitude)) {
                return Err(ArrayError::InvalidGeometry(format!(
                    "sensor {} latitude {} out of range",
                    index, latitude
                )));
            }
            if !longitude.is_finite() {
                return Err(ArrayError::InvalidGeometry(format!(
                    "sensor {} longitude is not finite",
                    index
                )));
            }
        }

        let count = coordinates.len() as f64;
        let reference_longitude = coordinates[0].1;
        // Unwrapped longitude differences keep arrays spanning the antimeridian contiguous.
        let longitude_deltas: Vec<f64> = coordinates
            .iter()
            .map(|&(_, longitude)| wrap_degrees(longitude - reference_longitude))
            .collect();
        let mean_latitude = coordinates.iter().map(|c| c.0).sum::<f64>() / count;
        let mean_delta = longitude_deltas.iter().sum::<f64>() / count;

        let scale = EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
        let east_scale = scale * mean_latitude.to_radians().cos();
        let offsets = coordinates
            .iter()
            .zip(&longitude_deltas)
            .map(|(&(latitude, _), &delta)| {
                [
                    (delta - mean_delta) * east_scale,
                    (latitude - mean_latitude) * scale,
                ]
            })
            .collect();

        RelativeGeometry::from_offsets(offsets)
    }

    pub fn resolve_sensors(sensors: &[Sensor]) -> ArrayResult<RelativeGeometry> {
        let coordinates: Vec<(f64, f64)> = sensors
            .iter()
            .map(|sensor| (sensor.latitude, sensor.longitude))
            .collect();
        Self::resolve(&coordinates)
    }
}

/// Maps an angle difference into (-180, 180].
fn wrap_degrees(delta: f64) -> f64 {
    let wrapped = (delta + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 {
        180.0
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rioe() -> Vec<(f64, f64)> {
        vec![
            (-1.74812, -78.62735),
            (-1.74749, -78.62708),
            (-1.74906, -78.62742),
            (-1.74805, -78.62820),
        ]
    }

    #[test]
    fn resolver_returns_one_offset_per_sensor() {
        let geometry = GeometryResolver::resolve(&rioe()).unwrap();
        assert_eq!(geometry.len(), 4);
        // sub-kilometre aperture
        assert!(geometry.aperture() > 0.05 && geometry.aperture() < 0.5);
    }

    #[test]
    fn resolver_offsets_match_meridian_arc() {
        let geometry =
            GeometryResolver::resolve(&[(0.0, 0.0), (0.01, 0.0), (0.0, 0.01)]).unwrap();
        let [east, north] = geometry.baseline(0, 1);
        assert!(east.abs() < 1e-9);
        assert!((north - 1.111949).abs() < 1e-5);
    }

    #[test]
    fn resolver_is_translation_invariant() {
        let base = GeometryResolver::resolve(&rioe()).unwrap();

        let shifted_east: Vec<(f64, f64)> = rioe().iter().map(|&(la, lo)| (la, lo + 3.5)).collect();
        let moved = GeometryResolver::resolve(&shifted_east).unwrap();
        for (a, b) in base.offsets().iter().zip(moved.offsets()) {
            assert!((a[0] - b[0]).abs() < 1e-9);
            assert!((a[1] - b[1]).abs() < 1e-9);
        }

        let shifted_north: Vec<(f64, f64)> =
            rioe().iter().map(|&(la, lo)| (la + 0.001, lo)).collect();
        let moved = GeometryResolver::resolve(&shifted_north).unwrap();
        for (a, b) in base.offsets().iter().zip(moved.offsets()) {
            assert!((a[0] - b[0]).abs() < 1e-6);
            assert!((a[1] - b[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn resolver_handles_antimeridian() {
        let geometry =
            GeometryResolver::resolve(&[(10.0, 179.999), (10.0, -179.999), (10.01, 180.0)])
                .unwrap();
        assert!(geometry.aperture() < 2.0);
    }

    #[test]
    fn resolver_rejects_degenerate_input() {
        assert!(matches!(
            GeometryResolver::resolve(&[(0.0, 0.0), (0.0, 0.01)]),
            Err(ArrayError::InvalidGeometry(_))
        ));
        assert!(matches!(
            GeometryResolver::resolve(&[(0.0, 0.0), (0.0, 0.01), (0.0, 0.02)]),
            Err(ArrayError::InvalidGeometry(_))
        ));
    }
}
