mod common;

use common::{angle_error, record, ring_geometry, Scenario, ToneSource};
use nblscore::{BandAggregator, MultichannelSignal, ProcessingConfig};

const SAMPLE_RATE: f64 = 50.0;
const BACK_AZIMUTH: f64 = 50.0;

fn config(alpha: f64) -> ProcessingConfig {
    ProcessingConfig {
        fmin: 0.5,
        fmax: 8.0,
        nbands: 1,
        window_length_seconds: 30.0,
        alpha,
        min_trace_velocity: Some(0.15),
        ..Default::default()
    }
}

/// Eight-sensor ring where sensor 3 records half a second late.
fn skewed_recording() -> (nblscore::RelativeGeometry, MultichannelSignal) {
    let geometry = ring_geometry(8, 0.2);
    let source = ToneSource::comb(30, 0.8, 6.0, 3);
    let signal = record(
        &geometry,
        &source,
        &Scenario {
            back_azimuth: BACK_AZIMUTH,
            trace_velocity: 0.34,
            sample_rate: SAMPLE_RATE,
            seconds: 240.0,
            wave_until: f64::INFINITY,
            noise_amplitude: 0.0,
            seed: 5,
        },
    );
    let shift = (0.5 * SAMPLE_RATE) as usize;
    let mut channels = signal.channels().to_vec();
    let original = channels[3].clone();
    for (i, sample) in channels[3].iter_mut().enumerate() {
        *sample = if i >= shift { original[i - shift] } else { 0.0 };
    }
    (
        geometry,
        MultichannelSignal::new(channels, SAMPLE_RATE, 0.0).unwrap(),
    )
}

fn mean_error(geometry: &nblscore::RelativeGeometry, signal: &MultichannelSignal, alpha: f64) -> f64 {
    let aggregator = BandAggregator::new(config(alpha), geometry.clone()).unwrap();
    let result = aggregator.run(signal).unwrap();
    let broadband = result.broadband.unwrap();
    let interior: Vec<f64> = broadband
        .estimates
        .iter()
        .filter(|e| e.start_time >= 15.0 && e.start_time + 30.0 <= 225.0)
        .map(|e| angle_error(e.back_azimuth, BACK_AZIMUTH))
        .collect();
    assert!(!interior.is_empty());
    interior.iter().sum::<f64>() / interior.len() as f64
}

#[test]
fn trimming_suppresses_a_late_sensor() {
    let (geometry, signal) = skewed_recording();
    let ordinary = mean_error(&geometry, &signal, 1.0);
    let trimmed = mean_error(&geometry, &signal, 0.75);
    assert!(ordinary > 5.0, "ordinary fit error {}", ordinary);
    assert!(trimmed < 1.0, "trimmed fit error {}", trimmed);
}

#[test]
fn trimmed_fit_retains_clean_pairs_only() {
    let (geometry, signal) = skewed_recording();
    let aggregator = BandAggregator::new(config(0.75), geometry).unwrap();
    let result = aggregator.run(&signal).unwrap();
    let band = result.band(0).unwrap();
    assert!(!band.estimates.is_empty());
    assert!(band.estimates.iter().all(|e| e.retained_pairs == 21));
}
