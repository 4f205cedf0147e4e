use ndarray::{Array1, ArrayView1, ArrayView2};

/// Smallest accepted `det / (a11 * a22)` of a 2x2 normal matrix.
const SINGULAR_TOLERANCE: f64 = 1e-10;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Least-squares solution of `design . x ~= rhs` for a two-column design.
    ///
    /// Returns `None` when the columns are (nearly) linearly dependent.
    pub fn least_squares_2(design: ArrayView2<f64>, rhs: ArrayView1<f64>) -> Option<[f64; 2]> {
        if design.ncols() != 2 || design.nrows() != rhs.len() || design.nrows() < 2 {
            return None;
        }
        let normal = design.t().dot(&design);
        let moment = design.t().dot(&rhs);
        let (a, b, c) = (normal[[0, 0]], normal[[0, 1]], normal[[1, 1]]);
        let determinant = a * c - b * b;
        if !(determinant > SINGULAR_TOLERANCE * a * c) {
            return None;
        }
        Some([
            (c * moment[0] - b * moment[1]) / determinant,
            (a * moment[1] - b * moment[0]) / determinant,
        ])
    }

    /// `rhs - design . solution`
    pub fn residuals(
        design: ArrayView2<f64>,
        rhs: ArrayView1<f64>,
        solution: [f64; 2],
    ) -> Array1<f64> {
        let fitted = design.dot(&Array1::from(solution.to_vec()));
        &rhs - &fitted
    }
}
