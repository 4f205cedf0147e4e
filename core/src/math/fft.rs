use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Forward/inverse `rustfft` plans of one size, reused across windows.
pub struct FftHelper {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    size: usize,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Self {
            forward,
            inverse,
            size,
        }
    }

    /// Plans a size at which correlating two `len`-sample sequences does not wrap.
    pub fn for_correlation(len: usize) -> Self {
        Self::new((2 * len).max(2).next_power_of_two())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Spectrum of `input`, zero-padded to the plan size.
    pub fn forward(&self, input: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input
            .iter()
            .take(self.size)
            .map(|&value| Complex64::new(value, 0.0))
            .collect();
        buffer.resize(self.size, Complex64::zero());
        self.forward.process(&mut buffer);
        buffer
    }

    /// Circular cross-correlation `r[k] = sum_n a[n] * b[n + k]` from two spectra.
    ///
    /// Negative lags live at the end of the buffer; use [`lag_value`] to index.
    pub fn cross_correlation(&self, a: &[Complex64], b: &[Complex64]) -> Vec<f64> {
        let mut buffer: Vec<Complex64> = a.iter().zip(b).map(|(x, y)| x.conj() * y).collect();
        self.inverse.process(&mut buffer);
        let scale = self.size as f64;
        buffer.iter().map(|value| value.re / scale).collect()
    }
}

/// Value of a circular correlation at a signed lag.
pub fn lag_value(correlation: &[f64], lag: isize) -> f64 {
    let len = correlation.len() as isize;
    correlation[lag.rem_euclid(len) as usize]
}
