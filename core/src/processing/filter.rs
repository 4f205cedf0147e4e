//! Zero-phase band-pass filtering of multichannel records.
//!
//! Designs follow the classical analog-prototype route: prototype poles
//! (Butterworth or Chebyshev Type I), lowpass-to-bandpass transformation,
//! bilinear transform with pre-warped edges, then grouping into second-order
//! sections. Each channel is run forward and backward through the cascade
//! so the net phase response is zero, and the ends are Hann-tapered.

use crate::model::{FrequencyBand, MultichannelSignal};
use crate::prelude::{ArrayError, ArrayResult, FilterFamily, ProcessingConfig};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Imaginary parts below this are treated as real poles.
const REAL_POLE_TOLERANCE: f64 = 1e-12;

/// One second-order section, `a0` normalized to one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b: [f64; 3],
    a: [f64; 2],
}

impl Biquad {
    pub fn new(b: [f64; 3], a: [f64; 2]) -> Self {
        Self { b, a }
    }

    pub fn numerator(&self) -> &[f64; 3] {
        &self.b
    }

    pub fn denominator(&self) -> &[f64; 2] {
        &self.a
    }

    /// Poles inside the unit circle.
    pub fn is_stable(&self) -> bool {
        self.a[1].abs() < 1.0 && self.a[0].abs() < 1.0 + self.a[1]
    }

    fn response(&self, z_inv: Complex64) -> Complex64 {
        let z_inv2 = z_inv * z_inv;
        let num = self.b[0] + self.b[1] * z_inv + self.b[2] * z_inv2;
        let den = 1.0 + self.a[0] * z_inv + self.a[1] * z_inv2;
        num / den
    }

    /// Direct Form II transposed state that a constant input `level` settles to.
    fn steady_state(&self, level: f64) -> ([f64; 2], f64) {
        let dc_gain = (self.b[0] + self.b[1] + self.b[2]) / (1.0 + self.a[0] + self.a[1]);
        let output = dc_gain * level;
        let s1 = self.b[2] * level - self.a[1] * output;
        let s0 = output - self.b[0] * level;
        ([s0, s1], output)
    }

    fn run(&self, samples: &mut [f64], mut state: [f64; 2]) {
        for sample in samples.iter_mut() {
            let input = *sample;
            let output = self.b[0] * input + state[0];
            state[0] = self.b[1] * input - self.a[0] * output + state[1];
            state[1] = self.b[2] * input - self.a[1] * output;
            *sample = output;
        }
    }
}

/// Cascade of second-order sections with the overall gain folded into the first.
#[derive(Debug, Clone, PartialEq)]
pub struct SosCascade {
    sections: Vec<Biquad>,
}

impl SosCascade {
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    pub fn is_stable(&self) -> bool {
        self.sections.iter().all(Biquad::is_stable)
    }

    pub fn magnitude_at(&self, freq_hz: f64, sample_rate: f64) -> f64 {
        let omega = 2.0 * PI * freq_hz / sample_rate;
        let z_inv = Complex64::new(omega.cos(), -omega.sin());
        self.sections
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, section| {
                acc * section.response(z_inv)
            })
            .norm()
    }

    /// Causal filtering starting from rest-at-`initial` conditions.
    fn lfilter(&self, samples: &mut [f64], initial: f64) {
        let mut level = initial;
        for section in &self.sections {
            let (state, settled) = section.steady_state(level);
            section.run(samples, state);
            level = settled;
        }
    }

    /// Forward-backward filtering with odd-symmetric edge extension.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let n = input.len();
        if n == 0 {
            return Vec::new();
        }
        let pad = (3 * (2 * self.sections.len() + 1)).min(n - 1);

        let mut extended = Vec::with_capacity(n + 2 * pad);
        let (first, last) = (input[0], input[n - 1]);
        extended.extend((1..=pad).rev().map(|i| 2.0 * first - input[i]));
        extended.extend_from_slice(input);
        extended.extend((1..=pad).map(|i| 2.0 * last - input[n - 1 - i]));

        let head = extended[0];
        self.lfilter(&mut extended, head);
        extended.reverse();
        let head = extended[0];
        self.lfilter(&mut extended, head);
        extended.reverse();

        extended[pad..pad + n].to_vec()
    }
}

/// Band-pass filter applied independently to every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct BandFilter {
    family: FilterFamily,
    corners: usize,
    ripple_db: f64,
    taper_fraction: f64,
}

impl BandFilter {
    pub fn new(family: FilterFamily, corners: usize, ripple_db: f64, taper_fraction: f64) -> Self {
        Self {
            family,
            corners,
            ripple_db,
            taper_fraction,
        }
    }

    pub fn butterworth(corners: usize) -> Self {
        Self::new(FilterFamily::Butterworth, corners, 0.0, 0.01)
    }

    pub fn from_config(config: &ProcessingConfig) -> Self {
        Self::new(
            config.filter_family,
            config.filter_corners,
            config.chebyshev_ripple_db,
            config.taper_fraction,
        )
    }

    pub fn family(&self) -> FilterFamily {
        self.family
    }

    /// Designs the digital band-pass cascade for `band` at `sample_rate`.
    pub fn design(&self, band: &FrequencyBand, sample_rate: f64) -> ArrayResult<SosCascade> {
        let nyquist = sample_rate / 2.0;
        let design_error = || ArrayError::FilterDesign {
            lower: band.lower,
            upper: band.upper,
            nyquist,
        };
        if !(band.lower > 0.0 && band.upper > band.lower && band.upper < nyquist) {
            return Err(design_error());
        }
        if self.corners == 0 {
            return Err(design_error());
        }

        let (prototype, prototype_gain) = match self.family {
            FilterFamily::Butterworth => butterworth_prototype(self.corners),
            FilterFamily::Chebyshev1 => {
                if !(self.ripple_db > 0.0) {
                    return Err(design_error());
                }
                chebyshev1_prototype(self.corners, self.ripple_db)
            }
        };

        let fs2 = 2.0 * sample_rate;
        let low = fs2 * (PI * band.lower / sample_rate).tan();
        let high = fs2 * (PI * band.upper / sample_rate).tan();
        let bandwidth = high - low;
        let center_sq = low * high;

        // Lowpass-to-bandpass: every prototype pole splits into two.
        let mut analog_poles = Vec::with_capacity(2 * prototype.len());
        for pole in &prototype {
            let scaled = *pole * bandwidth / 2.0;
            let root = (scaled * scaled - center_sq).sqrt();
            analog_poles.push(scaled + root);
            analog_poles.push(scaled - root);
        }
        let order = prototype.len() as i32;
        let analog_gain = prototype_gain * bandwidth.powi(order);

        // Bilinear transform; the N analog zeros at s = 0 map to z = 1, the
        // N zeros at infinity to z = -1.
        let digital_poles: Vec<Complex64> = analog_poles
            .iter()
            .map(|&p| (fs2 + p) / (fs2 - p))
            .collect();
        let denominator = analog_poles
            .iter()
            .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (fs2 - p));
        let gain = (analog_gain * fs2.powi(order) / denominator).re;

        if digital_poles.iter().any(|p| !(p.norm() < 1.0)) {
            return Err(design_error());
        }

        let mut sections = Vec::with_capacity(prototype.len());
        let mut real_poles = Vec::new();
        for pole in &digital_poles {
            if pole.im > REAL_POLE_TOLERANCE {
                sections.push(Biquad::new(
                    [1.0, 0.0, -1.0],
                    [-2.0 * pole.re, pole.norm_sqr()],
                ));
            } else if pole.im.abs() <= REAL_POLE_TOLERANCE {
                real_poles.push(pole.re);
            }
        }
        real_poles.sort_by(|a, b| a.total_cmp(b));
        for pair in real_poles.chunks(2) {
            if let [first, second] = pair {
                sections.push(Biquad::new(
                    [1.0, 0.0, -1.0],
                    [-(first + second), first * second],
                ));
            }
        }
        if sections.len() != prototype.len() {
            return Err(design_error());
        }

        if let Some(first) = sections.first_mut() {
            first.b = first.b.map(|coefficient| coefficient * gain);
        }
        Ok(SosCascade { sections })
    }

    /// Returns a new signal of identical shape, band-passed and tapered.
    pub fn apply(
        &self,
        signal: &MultichannelSignal,
        band: &FrequencyBand,
    ) -> ArrayResult<MultichannelSignal> {
        let cascade = self.design(band, signal.sample_rate())?;
        Ok(signal.map_channels(|channel| {
            let mut filtered = cascade.filtfilt(channel);
            hann_taper(&mut filtered, self.taper_fraction);
            filtered
        }))
    }
}

/// Tapers `fraction` of the record at each end with a half Hann window.
pub fn hann_taper(samples: &mut [f64], fraction: f64) {
    let n = samples.len();
    let width = ((n as f64) * fraction).floor() as usize;
    let width = width.min(n / 2);
    if width == 0 {
        return;
    }
    for i in 0..width {
        let weight = 0.5 * (1.0 - (PI * i as f64 / width as f64).cos());
        samples[i] *= weight;
        samples[n - 1 - i] *= weight;
    }
}

fn butterworth_prototype(order: usize) -> (Vec<Complex64>, f64) {
    let poles = (0..order)
        .map(|k| {
            let theta = PI * (2 * k + order + 1) as f64 / (2 * order) as f64;
            Complex64::new(theta.cos(), theta.sin())
        })
        .collect();
    (poles, 1.0)
}

fn chebyshev1_prototype(order: usize, ripple_db: f64) -> (Vec<Complex64>, f64) {
    let epsilon = (10f64.powf(ripple_db / 10.0) - 1.0).sqrt();
    let mu = (1.0 / epsilon).asinh() / order as f64;
    let poles: Vec<Complex64> = (0..order)
        .map(|k| {
            let theta = PI * (2 * k + 1) as f64 / (2 * order) as f64;
            Complex64::new(-mu.sinh() * theta.sin(), mu.cosh() * theta.cos())
        })
        .collect();
    let mut gain = poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * -p)
        .re;
    // Even orders peak at 1 and sit at the ripple floor in the band centre.
    if order % 2 == 0 {
        gain /= (1.0 + epsilon * epsilon).sqrt();
    }
    (poles, gain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::fft::{lag_value, FftHelper};
    use crate::math::StatsHelper;

    const FS: f64 = 50.0;

    fn sine(freq: f64, seconds: f64) -> Vec<f64> {
        let n = (seconds * FS) as usize;
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f64 / FS).sin())
            .collect()
    }

    /// RMS amplitude of the middle half, scaled to a sinusoid peak.
    fn core_amplitude(samples: &[f64]) -> f64 {
        let n = samples.len();
        StatsHelper::rms(&samples[n / 4..3 * n / 4]) * 2f64.sqrt()
    }

    #[test]
    fn butterworth_design_is_stable_and_unit_gain_at_centre() {
        let filter = BandFilter::butterworth(2);
        let band = FrequencyBand::new(1.0, 8.0).unwrap();
        let cascade = filter.design(&band, FS).unwrap();
        assert_eq!(cascade.sections().len(), 2);
        assert!(cascade.is_stable());

        // The bilinear transform maps the analog centre to this frequency.
        let warp = |f: f64| 2.0 * FS * (PI * f / FS).tan();
        let center = (warp(1.0) * warp(8.0)).sqrt();
        let digital_center = FS / PI * (center / (2.0 * FS)).atan();
        assert!((cascade.magnitude_at(digital_center, FS) - 1.0).abs() < 1e-9);
        assert!((cascade.magnitude_at(1.0, FS) - 0.5f64.sqrt()).abs() < 1e-6);
        assert!((cascade.magnitude_at(8.0, FS) - 0.5f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn narrow_log_band_is_stable() {
        let filter = BandFilter::butterworth(2);
        let band = FrequencyBand::new(0.1, 0.158_489_319_246_111_36).unwrap();
        let cascade = filter.design(&band, FS).unwrap();
        assert!(cascade.is_stable());
    }

    #[test]
    fn chebyshev_design_is_stable() {
        let filter = BandFilter::new(FilterFamily::Chebyshev1, 2, 0.01, 0.01);
        let band = FrequencyBand::new(1.0, 4.0).unwrap();
        let cascade = filter.design(&band, FS).unwrap();
        assert!(cascade.is_stable());
        assert!(cascade.magnitude_at(2.0, FS) > 0.99);
        assert!(cascade.magnitude_at(22.0, FS) < 0.1);
    }

    #[test]
    fn chebyshev_and_butterworth_agree_in_narrow_log_band() {
        let band = FrequencyBand::new(0.1, 0.158_489_319_246_111_36).unwrap();
        let center = (band.lower * band.upper).sqrt();
        let n = (800.0 * FS) as usize;
        let delayed: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * center * (i as f64 / FS - 0.5)).sin())
            .collect();
        let signal = MultichannelSignal::new(vec![sine(center, 800.0), delayed], FS, 0.0).unwrap();

        let butterworth = BandFilter::butterworth(2).apply(&signal, &band).unwrap();
        let chebyshev = BandFilter::new(FilterFamily::Chebyshev1, 2, 0.01, 0.01)
            .apply(&signal, &band)
            .unwrap();

        let core = n / 4..3 * n / 4;
        for channel in 0..2 {
            let input = &signal.channel(channel)[core.clone()];
            for filtered in [&butterworth, &chebyshev] {
                let output = &filtered.channel(channel)[core.clone()];
                // in phase with the input, so the pair delay is untouched
                let worst = input
                    .iter()
                    .zip(output)
                    .map(|(x, y)| (x - y).abs())
                    .fold(0.0, f64::max);
                assert!(worst < 0.005, "channel {}: {}", channel, worst);
                assert!((core_amplitude(output) - core_amplitude(input)).abs() < 0.005);
            }
        }
    }

    #[test]
    fn design_rejects_band_above_nyquist() {
        let filter = BandFilter::butterworth(2);
        let band = FrequencyBand::new(5.0, 25.0).unwrap();
        assert!(matches!(
            filter.design(&band, FS),
            Err(ArrayError::FilterDesign { .. })
        ));
    }

    #[test]
    fn in_band_sinusoid_keeps_amplitude() {
        let filter = BandFilter::butterworth(2);
        let band = FrequencyBand::new(1.0, 8.0).unwrap();
        let cascade = filter.design(&band, FS).unwrap();
        let filtered = cascade.filtfilt(&sine(2.8, 120.0));
        assert!((core_amplitude(&filtered) - 1.0).abs() < 0.02);
    }

    #[test]
    fn out_of_band_sinusoid_is_attenuated() {
        let filter = BandFilter::butterworth(2);
        let band = FrequencyBand::new(1.0, 4.0).unwrap();
        let cascade = filter.design(&band, FS).unwrap();
        let high = cascade.filtfilt(&sine(20.0, 120.0));
        let low = cascade.filtfilt(&sine(0.1, 120.0));
        assert!(core_amplitude(&high) < 0.05);
        assert!(core_amplitude(&low) < 0.05);
    }

    #[test]
    fn filtfilt_introduces_no_phase_shift() {
        let filter = BandFilter::butterworth(2);
        let band = FrequencyBand::new(1.0, 8.0).unwrap();
        let cascade = filter.design(&band, FS).unwrap();
        let input: Vec<f64> = sine(2.0, 60.0)
            .iter()
            .zip(sine(5.0, 60.0))
            .map(|(a, b)| a + 0.5 * b)
            .collect();
        let output = cascade.filtfilt(&input);

        let segment = 500..2500;
        let helper = FftHelper::for_correlation(segment.len());
        let r = helper.cross_correlation(
            &helper.forward(&input[segment.clone()]),
            &helper.forward(&output[segment]),
        );
        let best = (-10..=10isize)
            .max_by(|a, b| lag_value(&r, *a).total_cmp(&lag_value(&r, *b)))
            .unwrap();
        assert_eq!(best, 0);
    }

    #[test]
    fn apply_preserves_shape_and_tapers_edges() {
        let filter = BandFilter::butterworth(2);
        let band = FrequencyBand::new(1.0, 8.0).unwrap();
        let signal = MultichannelSignal::new(vec![sine(2.8, 100.0), sine(3.0, 100.0)], FS, 7.0)
            .unwrap();
        let filtered = filter.apply(&signal, &band).unwrap();
        assert_eq!(filtered.channel_count(), 2);
        assert_eq!(filtered.sample_count(), signal.sample_count());
        assert_eq!(filtered.start_time(), 7.0);
        assert_eq!(filtered.channel(0)[0], 0.0);
        assert_ne!(filtered, signal);
    }

    #[test]
    fn hann_taper_zeroes_ends_only() {
        let mut samples = vec![1.0; 1000];
        hann_taper(&mut samples, 0.01);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[999], 0.0);
        assert!(samples[5] > 0.0 && samples[5] < 1.0);
        assert_eq!(samples[10], 1.0);
        assert_eq!(samples[500], 1.0);
    }
}
