#![allow(dead_code)]

use nblscore::processing::{plane_wave_slowness, GeometryResolver};
use nblscore::{MultichannelSignal, RelativeGeometry};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// Four-element array used throughout the end-to-end scenarios.
pub const RIOE: [(f64, f64); 4] = [
    (-1.74812, -78.62735),
    (-1.74749, -78.62708),
    (-1.74906, -78.62742),
    (-1.74805, -78.62820),
];

pub fn rioe_geometry() -> RelativeGeometry {
    GeometryResolver::resolve(&RIOE).unwrap()
}

pub fn ring_geometry(count: usize, radius_km: f64) -> RelativeGeometry {
    RelativeGeometry::from_offsets(
        (0..count)
            .map(|k| {
                let angle = 2.0 * PI * k as f64 / count as f64;
                [radius_km * angle.cos(), radius_km * angle.sin()]
            })
            .collect(),
    )
    .unwrap()
}

/// Sum of unit tones with random frequencies and phases.
pub struct ToneSource {
    tones: Vec<(f64, f64)>,
}

impl ToneSource {
    pub fn random(count: usize, low_hz: f64, high_hz: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let tones = (0..count)
            .map(|_| (rng.gen_range(low_hz..high_hz), rng.gen_range(0.0..2.0 * PI)))
            .collect();
        Self { tones }
    }

    /// `count` tones spread evenly over `[low_hz, high_hz)` with a small
    /// random jitter, so every sub-band in that range carries energy.
    pub fn comb(count: usize, low_hz: f64, high_hz: f64, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let spacing = (high_hz - low_hz) / count as f64;
        let tones = (0..count)
            .map(|k| {
                let freq = low_hz + spacing * (k as f64 + rng.gen_range(0.2..0.8));
                (freq, rng.gen_range(0.0..2.0 * PI))
            })
            .collect();
        Self { tones }
    }

    pub fn value(&self, t: f64) -> f64 {
        self.tones
            .iter()
            .map(|(freq, phase)| (2.0 * PI * freq * t + phase).sin())
            .sum::<f64>()
            / (self.tones.len() as f64).sqrt()
    }
}

pub struct Scenario {
    pub back_azimuth: f64,
    pub trace_velocity: f64,
    pub sample_rate: f64,
    pub seconds: f64,
    /// Wave is switched off after this time.
    pub wave_until: f64,
    pub noise_amplitude: f64,
    pub seed: u64,
}

pub fn record(geometry: &RelativeGeometry, source: &ToneSource, scenario: &Scenario) -> MultichannelSignal {
    let p = plane_wave_slowness(scenario.back_azimuth, scenario.trace_velocity);
    let samples = (scenario.seconds * scenario.sample_rate) as usize;
    let mut rng = StdRng::seed_from_u64(scenario.seed);
    let channels = geometry
        .offsets()
        .iter()
        .map(|r| {
            let arrival = p[0] * r[0] + p[1] * r[1];
            (0..samples)
                .map(|i| {
                    let t = i as f64 / scenario.sample_rate;
                    let wave = if t < scenario.wave_until {
                        source.value(t - arrival)
                    } else {
                        0.0
                    };
                    wave + scenario.noise_amplitude * rng.gen_range(-1.0..1.0)
                })
                .collect()
        })
        .collect();
    MultichannelSignal::new(channels, scenario.sample_rate, 0.0).unwrap()
}

pub fn angle_error(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}
