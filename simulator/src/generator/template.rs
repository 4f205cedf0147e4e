use rand::Rng;
use std::f64::consts::PI;

/// Source waveform built from unit tones; stands in for a broadband infrasound
/// signal whose energy spans several sub-bands.
#[derive(Debug, Clone, PartialEq)]
pub struct ToneComb {
    tones: Vec<(f64, f64)>,
}

impl ToneComb {
    /// `count` tones, one per equal slice of `[low_hz, high_hz)`, each placed
    /// at a random point of its slice with a random phase.
    pub fn random<R: Rng>(count: usize, low_hz: f64, high_hz: f64, rng: &mut R) -> Self {
        let count = count.max(1);
        let slice = (high_hz - low_hz) / count as f64;
        let tones = (0..count)
            .map(|k| {
                let freq = low_hz + slice * (k as f64 + rng.gen_range(0.2..0.8));
                (freq, rng.gen_range(0.0..2.0 * PI))
            })
            .collect();
        Self { tones }
    }

    /// Amplitude at time `t`, normalized to unit-order variance.
    pub fn value(&self, t: f64) -> f64 {
        let sum: f64 = self
            .tones
            .iter()
            .map(|(freq, phase)| (2.0 * PI * freq * t + phase).sin())
            .sum();
        sum / (self.tones.len() as f64).sqrt()
    }
}
