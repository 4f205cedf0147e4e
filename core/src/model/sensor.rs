use crate::prelude::{ArrayError, ArrayResult};
use serde::{Deserialize, Serialize};

/// One array element as described by station metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Multiplier converting raw counts into physical units (e.g. Pa/count).
    pub calibration: f64,
}

impl Sensor {
    pub fn new(id: impl Into<String>, latitude: f64, longitude: f64, calibration: f64) -> Self {
        Self {
            id: id.into(),
            latitude,
            longitude,
            calibration,
        }
    }
}

/// Planar (east, north) sensor offsets in kilometres.
///
/// Offsets are relative to an arbitrary fixed reference; only differences
/// between sensors enter the slowness fit. Construction guarantees at least
/// three sensors that are not all on one line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelativeGeometry {
    offsets: Vec<[f64; 2]>,
}

/// Smallest accepted ratio between the minor and major spread of the layout.
const COLLINEARITY_TOLERANCE: f64 = 1e-9;

impl RelativeGeometry {
    pub fn from_offsets(offsets: Vec<[f64; 2]>) -> ArrayResult<Self> {
        if offsets.len() < 3 {
            return Err(ArrayError::InvalidGeometry(format!(
                "at least 3 sensors required, got {}",
                offsets.len()
            )));
        }
        if offsets
            .iter()
            .any(|offset| !(offset[0].is_finite() && offset[1].is_finite()))
        {
            return Err(ArrayError::InvalidGeometry(
                "sensor offsets must be finite".into(),
            ));
        }

        let count = offsets.len() as f64;
        let mean_east = offsets.iter().map(|o| o[0]).sum::<f64>() / count;
        let mean_north = offsets.iter().map(|o| o[1]).sum::<f64>() / count;
        let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
        for offset in &offsets {
            let dx = offset[0] - mean_east;
            let dy = offset[1] - mean_north;
            sxx += dx * dx;
            syy += dy * dy;
            sxy += dx * dy;
        }
        let trace = sxx + syy;
        let determinant = sxx * syy - sxy * sxy;
        if trace <= 0.0 || determinant <= COLLINEARITY_TOLERANCE * trace * trace {
            return Err(ArrayError::InvalidGeometry(format!(
                "{} sensors are collinear or coincident",
                offsets.len()
            )));
        }

        Ok(Self { offsets })
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn offsets(&self) -> &[[f64; 2]] {
        &self.offsets
    }

    /// Vector from sensor `from` to sensor `to`.
    pub fn baseline(&self, from: usize, to: usize) -> [f64; 2] {
        [
            self.offsets[to][0] - self.offsets[from][0],
            self.offsets[to][1] - self.offsets[from][1],
        ]
    }

    /// Longest inter-sensor distance in kilometres.
    pub fn aperture(&self) -> f64 {
        let mut aperture: f64 = 0.0;
        for i in 0..self.offsets.len() {
            for j in (i + 1)..self.offsets.len() {
                let [dx, dy] = self.baseline(i, j);
                aperture = aperture.max(dx.hypot(dy));
            }
        }
        aperture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geometry_rejects_two_sensors() {
        let result = RelativeGeometry::from_offsets(vec![[0.0, 0.0], [1.0, 0.0]]);
        assert!(matches!(result, Err(ArrayError::InvalidGeometry(_))));
    }

    #[test]
    fn geometry_rejects_collinear_layout() {
        let result =
            RelativeGeometry::from_offsets(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [-3.0, -3.0]]);
        assert!(matches!(result, Err(ArrayError::InvalidGeometry(_))));
    }

    #[test]
    fn aperture_is_longest_baseline() {
        let geometry =
            RelativeGeometry::from_offsets(vec![[0.0, 0.0], [0.3, 0.0], [0.0, 0.4]]).unwrap();
        assert!((geometry.aperture() - 0.5).abs() < 1e-12);
        assert_eq!(geometry.baseline(1, 2), [-0.3, 0.4]);
    }
}
