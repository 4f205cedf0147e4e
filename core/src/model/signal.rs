use crate::model::sensor::Sensor;
use crate::prelude::{ArrayError, ArrayResult};

/// Equal-length channels sampled at a common rate, one per sensor.
///
/// Channel order matches the order of the [`RelativeGeometry`] the signal is
/// processed with. Every transform returns a new signal; buffers are never
/// modified in place.
///
/// [`RelativeGeometry`]: crate::model::RelativeGeometry
#[derive(Debug, Clone, PartialEq)]
pub struct MultichannelSignal {
    channels: Vec<Vec<f64>>,
    sample_rate: f64,
    start_time: f64,
}

impl MultichannelSignal {
    /// `start_time` is in seconds on the caller's time axis (e.g. Unix epoch).
    pub fn new(channels: Vec<Vec<f64>>, sample_rate: f64, start_time: f64) -> ArrayResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(ArrayError::InvalidSignal(format!(
                "sample rate must be positive, got {}",
                sample_rate
            )));
        }
        if !start_time.is_finite() {
            return Err(ArrayError::InvalidSignal("start time must be finite".into()));
        }
        let Some(first) = channels.first() else {
            return Err(ArrayError::InvalidSignal("signal has no channels".into()));
        };
        let sample_count = first.len();
        for (index, channel) in channels.iter().enumerate() {
            if channel.len() != sample_count {
                return Err(ArrayError::InvalidSignal(format!(
                    "channel {} has {} samples, expected {}",
                    index,
                    channel.len(),
                    sample_count
                )));
            }
            if channel.iter().any(|value| !value.is_finite()) {
                return Err(ArrayError::InvalidSignal(format!(
                    "channel {} contains non-finite samples",
                    index
                )));
            }
        }

        Ok(Self {
            channels,
            sample_rate,
            start_time,
        })
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn sample_count(&self) -> usize {
        self.channels[0].len()
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn nyquist(&self) -> f64 {
        self.sample_rate / 2.0
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn duration(&self) -> f64 {
        self.sample_count() as f64 / self.sample_rate
    }

    pub fn channel(&self, index: usize) -> &[f64] {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    /// Time of the sample at `index`.
    pub fn time_at(&self, index: usize) -> f64 {
        self.start_time + index as f64 / self.sample_rate
    }

    /// Applies `transform` to every channel, keeping rate and start time.
    pub(crate) fn map_channels<F>(&self, mut transform: F) -> Self
    where
        F: FnMut(&[f64]) -> Vec<f64>,
    {
        Self {
            channels: self.channels.iter().map(|c| transform(c)).collect(),
            sample_rate: self.sample_rate,
            start_time: self.start_time,
        }
    }

    /// Scales every channel by the calibration factor of its sensor.
    pub fn calibrated(&self, sensors: &[Sensor]) -> ArrayResult<Self> {
        if sensors.len() != self.channel_count() {
            return Err(ArrayError::InvalidSignal(format!(
                "{} calibration entries for {} channels",
                sensors.len(),
                self.channel_count()
            )));
        }
        let channels = self
            .channels
            .iter()
            .zip(sensors)
            .map(|(channel, sensor)| channel.iter().map(|v| v * sensor.calibration).collect())
            .collect();
        Self::new(channels, self.sample_rate, self.start_time)
    }

    /// Keeps the samples whose time falls in `[start, end]`.
    pub fn trim(&self, start: f64, end: f64) -> ArrayResult<Self> {
        if !(end > start) {
            return Err(ArrayError::InvalidSignal(format!(
                "trim window [{}, {}] is empty",
                start, end
            )));
        }
        let first = ((start - self.start_time) * self.sample_rate).ceil().max(0.0) as usize;
        let last = ((end - self.start_time) * self.sample_rate).floor();
        if last < 0.0 || first >= self.sample_count() {
            return Err(ArrayError::InvalidSignal(format!(
                "trim window [{}, {}] lies outside the record",
                start, end
            )));
        }
        let last = (last as usize).min(self.sample_count() - 1);
        let channels = self
            .channels
            .iter()
            .map(|channel| channel[first..=last].to_vec())
            .collect();
        Self::new(channels, self.sample_rate, self.time_at(first))
    }
}
