use crate::generator::template::ToneComb;
use anyhow::{bail, Context};
use nblscore::processing::plane_wave_slowness;
use nblscore::{MultichannelSignal, RelativeGeometry, Sensor};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Configuration for synthesizing an array recording of one plane wave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub sample_rate: f64,
    pub duration_seconds: f64,
    pub back_azimuth: f64,
    /// km/s
    pub trace_velocity: f64,
    pub tone_count: usize,
    pub tone_low_hz: f64,
    pub tone_high_hz: f64,
    pub amplitude: f64,
    /// Wave is present in `[wave_start, wave_end)`, record seconds.
    pub wave_start: f64,
    pub wave_end: Option<f64>,
    /// Half-width of the uniform sensor noise, in physical units.
    pub noise: f64,
    pub seed: u64,
    pub description: Option<String>,
    pub scenario: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 50.0,
            duration_seconds: 1800.0,
            back_azimuth: 120.0,
            trace_velocity: 0.34,
            tone_count: 40,
            tone_low_hz: 1.0,
            tone_high_hz: 5.0,
            amplitude: 1.0,
            wave_start: 0.0,
            wave_end: Some(900.0),
            noise: 0.5,
            seed: 0,
            description: None,
            scenario: None,
        }
    }
}

impl GeneratorConfig {
    fn sample_count(&self) -> anyhow::Result<usize> {
        let count = (self.duration_seconds * self.sample_rate).floor();
        if !(count.is_finite() && count >= 1.0) {
            bail!(
                "scenario of {} s at {} Hz holds no samples",
                self.duration_seconds,
                self.sample_rate
            );
        }
        Ok(count as usize)
    }

    fn wave_active(&self, t: f64) -> bool {
        t >= self.wave_start && self.wave_end.map_or(true, |end| t < end)
    }
}

/// Raw-count recording of the configured plane wave across `sensors`.
///
/// Each channel is divided by its sensor's calibration factor so that
/// calibrating the result restores physical units.
pub fn build_recording(
    config: &GeneratorConfig,
    sensors: &[Sensor],
    geometry: &RelativeGeometry,
) -> anyhow::Result<MultichannelSignal> {
    if sensors.len() != geometry.len() {
        bail!(
            "{} sensors for a {}-element geometry",
            sensors.len(),
            geometry.len()
        );
    }
    if !(config.trace_velocity > 0.0) {
        bail!("trace velocity must be positive, got {}", config.trace_velocity);
    }
    if let Some(sensor) = sensors.iter().find(|s| s.calibration == 0.0) {
        bail!("sensor {} has a zero calibration factor", sensor.id);
    }

    let samples = config.sample_count()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let source = ToneComb::random(
        config.tone_count,
        config.tone_low_hz,
        config.tone_high_hz,
        &mut rng,
    );
    let slowness = plane_wave_slowness(config.back_azimuth, config.trace_velocity);

    let channels = geometry
        .offsets()
        .iter()
        .zip(sensors)
        .map(|(offset, sensor)| {
            let arrival = slowness[0] * offset[0] + slowness[1] * offset[1];
            (0..samples)
                .map(|i| {
                    let t = i as f64 / config.sample_rate;
                    let wave = if config.wave_active(t - arrival) {
                        config.amplitude * source.value(t - arrival)
                    } else {
                        0.0
                    };
                    let noise = if config.noise > 0.0 {
                        rng.gen_range(-config.noise..config.noise)
                    } else {
                        0.0
                    };
                    (wave + noise) / sensor.calibration
                })
                .collect()
        })
        .collect();

    MultichannelSignal::new(channels, config.sample_rate, 0.0)
        .context("assembling synthetic recording")
}
