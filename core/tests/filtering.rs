mod common;

use common::{angle_error, record, rioe_geometry, Scenario, ToneSource};
use nblscore::math::FftHelper;
use nblscore::model::FrequencyBand;
use nblscore::prelude::{BandSpacing, FilterFamily};
use nblscore::processing::{EstimatorConfig, SlownessEstimator};
use nblscore::{BandAggregator, BandFilter, ProcessingConfig};

#[test]
fn filtering_leaves_pair_delays_unchanged() {
    let geometry = rioe_geometry();
    let signal = record(
        &geometry,
        &ToneSource::comb(24, 1.0, 4.0, 9),
        &Scenario {
            back_azimuth: 200.0,
            trace_velocity: 0.3,
            sample_rate: 100.0,
            seconds: 120.0,
            wave_until: f64::INFINITY,
            noise_amplitude: 0.0,
            seed: 0,
        },
    );
    let filtered = BandFilter::butterworth(2)
        .apply(&signal, &FrequencyBand::new(0.5, 8.0).unwrap())
        .unwrap();

    let estimator = SlownessEstimator::new(
        &geometry,
        EstimatorConfig {
            min_trace_velocity: Some(0.2),
            ..Default::default()
        },
    )
    .unwrap();
    // a window away from the tapered ends
    let (start, length) = (4000, 3000);
    let fft = FftHelper::for_correlation(length);
    let window = |s: &nblscore::MultichannelSignal| -> Vec<Vec<f64>> {
        s.channels()
            .iter()
            .map(|c| c[start..start + length].to_vec())
            .collect()
    };
    let raw = window(&signal);
    let band = window(&filtered);
    let raw_refs: Vec<&[f64]> = raw.iter().map(|c| c.as_slice()).collect();
    let band_refs: Vec<&[f64]> = band.iter().map(|c| c.as_slice()).collect();

    let before = estimator.measure_delays(&raw_refs, 100.0, &fft).unwrap();
    let after = estimator.measure_delays(&band_refs, 100.0, &fft).unwrap();
    for (b, a) in before.iter().zip(&after) {
        assert_eq!((b.from, b.to), (a.from, a.to));
        assert!((b.delay - a.delay).abs() < 1e-3, "{} vs {}", b.delay, a.delay);
    }
}

#[test]
fn chebyshev_run_matches_butterworth_run() {
    let geometry = rioe_geometry();
    let signal = record(
        &geometry,
        &ToneSource::comb(24, 1.0, 4.0, 5),
        &Scenario {
            back_azimuth: 75.0,
            trace_velocity: 0.34,
            sample_rate: 100.0,
            seconds: 240.0,
            wave_until: f64::INFINITY,
            noise_amplitude: 0.0,
            seed: 0,
        },
    );
    let config = |filter_family| ProcessingConfig {
        fmin: 1.0,
        fmax: 4.0,
        nbands: 2,
        band_spacing: BandSpacing::Linear,
        filter_family,
        window_length_seconds: 30.0,
        min_trace_velocity: Some(0.2),
        ..Default::default()
    };

    let butterworth = BandAggregator::new(config(FilterFamily::Butterworth), geometry.clone())
        .unwrap()
        .run(&signal)
        .unwrap();
    let chebyshev = BandAggregator::new(config(FilterFamily::Chebyshev1), geometry)
        .unwrap()
        .run(&signal)
        .unwrap();
    assert!(chebyshev.is_complete());

    for (b, c) in butterworth.iter().zip(chebyshev.iter()) {
        assert_eq!(b.id, c.id);
        assert_eq!(b.estimates.len(), 15);
        assert_eq!(c.estimates.len(), b.estimates.len());
        for (eb, ec) in b.estimates.iter().zip(&c.estimates) {
            assert_eq!(eb.window_index, ec.window_index);
            assert!(angle_error(ec.back_azimuth, 75.0) < 2.0, "{:?}: {}", c.id, ec.back_azimuth);
            assert!(angle_error(eb.back_azimuth, ec.back_azimuth) < 1.5);
            assert!((eb.trace_velocity - ec.trace_velocity).abs() < 0.02);
            assert!(ec.coherence > 0.9);
        }
    }
}
