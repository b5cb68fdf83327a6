use crate::error::BinningError;
use crate::model::NamedSleepModel;
use crate::{AllSensorSamples, DecodeWindow, MotionSample, Sensor, SensorSample, MILLIS_PER_MINUTE};
use chrono::{DateTime, Timelike};
use log::debug;
use ndarray::{Array2, ArrayView1};

const LIGHT_PREMULTIPLIER: f64 = 4.0;

pub const NUM_FEATURES: usize = 5;

/// Rows of the feature matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureChannel {
    Light,
    MotionCount,
    Disturbance,
    LogSoundCount,
    NaturalLightForbidden,
}

impl FeatureChannel {
    pub const ALL: [FeatureChannel; NUM_FEATURES] = [
        FeatureChannel::Light,
        FeatureChannel::MotionCount,
        FeatureChannel::Disturbance,
        FeatureChannel::LogSoundCount,
        FeatureChannel::NaturalLightForbidden,
    ];

    pub fn index(&self) -> usize {
        match self {
            FeatureChannel::Light => 0,
            FeatureChannel::MotionCount => 1,
            FeatureChannel::Disturbance => 2,
            FeatureChannel::LogSoundCount => 3,
            FeatureChannel::NaturalLightForbidden => 4,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeatureChannel::Light => "light",
            FeatureChannel::MotionCount => "motion",
            FeatureChannel::Disturbance => "disturbance",
            FeatureChannel::LogSoundCount => "logsc",
            FeatureChannel::NaturalLightForbidden => "natlight",
        }
    }
}

/// Binned features for one night: `data[[channel, bin]]`.
///
/// Every channel shares the same bin count and the same origin `t0`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub data: Array2<f64>,
    pub t0: i64,
    pub minutes_per_bin: i32,
    pub timezone_offset: i32,
}

impl FeatureMatrix {
    pub fn num_bins(&self) -> usize {
        self.data.ncols()
    }

    pub fn channel(&self, channel: FeatureChannel) -> ArrayView1<'_, f64> {
        self.data.row(channel.index())
    }

    /// All channel values for a single bin.
    pub fn observation(&self, bin: usize) -> ArrayView1<'_, f64> {
        self.data.column(bin)
    }

    pub fn bin_start_time(&self, bin: usize) -> i64 {
        time_from_bin(bin, self.minutes_per_bin, self.t0)
    }
}

pub fn time_from_bin(bin: usize, minutes_per_bin: i32, t0: i64) -> i64 {
    t0 + bin as i64 * minutes_per_bin as i64 * MILLIS_PER_MINUTE
}

/// Bin index of `t`, or None when it falls outside the grid.
fn bin_index(t: i64, t0: i64, minutes_per_bin: i32, num_bins: usize) -> Option<usize> {
    if t < t0 {
        return None;
    }
    let idx = ((t - t0) / MILLIS_PER_MINUTE / minutes_per_bin as i64) as usize;
    (idx < num_bins).then_some(idx)
}

struct Binner {
    data: Array2<f64>,
    t0: i64,
    minutes_per_bin: i32,
}

impl Binner {
    fn add(&mut self, t: i64, value: f64, channel: FeatureChannel) {
        if let Some(idx) = bin_index(t, self.t0, self.minutes_per_bin, self.data.ncols()) {
            self.data[[channel.index(), idx]] += value;
        }
    }

    fn max(&mut self, t: i64, value: f64, channel: FeatureChannel) {
        if let Some(idx) = bin_index(t, self.t0, self.minutes_per_bin, self.data.ncols()) {
            let cell = &mut self.data[[channel.index(), idx]];
            if *cell < value {
                *cell = value;
            }
        }
    }
}

/// Local clock hour (fractional) of a sample.
fn local_hour(sample: &SensorSample) -> Option<f64> {
    let local = DateTime::from_timestamp_millis(sample.timestamp + sample.offset_millis as i64)?;
    Some(local.hour() as f64 + local.minute() as f64 / 60.0)
}

/// 1.0 when the sample's local hour lies in the window where daylight
/// should not be present (after `start_hour` or before `stop_hour`).
pub fn natural_light_forbidden(sample: &SensorSample, start_hour: f64, stop_hour: f64) -> f64 {
    match local_hour(sample) {
        Some(hour) if hour > start_hour || hour < stop_hour => 1.0,
        _ => 0.0,
    }
}

/// Convert raw samples into the fixed-width feature matrix the model expects.
pub fn bin_sensor_data(
    sensors: &AllSensorSamples,
    motion: &[MotionSample],
    model: &NamedSleepModel,
    window: DecodeWindow,
) -> Result<FeatureMatrix, BinningError> {
    let light = sensors.get(Sensor::Light);
    let waves = sensors.get(Sensor::WaveCount);
    let sound_peaks = sensors.get(Sensor::SoundPeakDisturbance);
    let sound_counts = sensors.get(Sensor::SoundDisturbanceCount);

    let first_light = light.first().ok_or(BinningError::EmptyLight)?;
    let timezone_offset = first_light.offset_millis;

    let minutes_per_bin = model.window_minutes;
    if minutes_per_bin <= 0 {
        return Err(BinningError::NonPositiveWindowWidth(minutes_per_bin));
    }

    let t0 = window.start;
    let mut tf = window.end;

    // do not bin time that has not happened yet
    if window.now < tf && window.now >= t0 {
        tf = window.now;
    }

    let bin_millis = minutes_per_bin as i64 * MILLIS_PER_MINUTE;
    let num_bins = if tf > t0 { (tf - t0) / bin_millis } else { 0 };
    if num_bins <= 0 {
        return Err(BinningError::EmptyWindow { start: t0, end: tf });
    }

    let mut binner = Binner {
        data: Array2::zeros((NUM_FEATURES, num_bins as usize)),
        t0,
        minutes_per_bin,
    };

    for sample in light {
        let value = sample.value.max(0.0);
        let compressed = (value * LIGHT_PREMULTIPLIER + 1.0).log2();
        binner.add(sample.timestamp, compressed, FeatureChannel::Light);
    }
    // sum -> average per minute
    binner
        .data
        .row_mut(FeatureChannel::Light.index())
        .mapv_inplace(|v| v / minutes_per_bin as f64);

    for m in motion.iter().filter(|m| !m.is_heartbeat()) {
        if m.value > model.pill_magnitude_disturbance_threshold_lsb {
            binner.max(m.timestamp, 1.0, FeatureChannel::Disturbance);
        }
        binner.add(m.timestamp, 1.0, FeatureChannel::MotionCount);
    }

    for sample in waves.iter().filter(|s| s.value > 0.0) {
        binner.max(sample.timestamp, 1.0, FeatureChannel::Disturbance);
    }

    for sample in sound_peaks
        .iter()
        .filter(|s| s.value > model.sound_disturbance_threshold_db)
    {
        binner.max(sample.timestamp, 1.0, FeatureChannel::Disturbance);
    }

    for sample in sound_counts {
        let value = (sample.value + 1.0).log2();
        if value >= 0.0 {
            binner.max(sample.timestamp, value, FeatureChannel::LogSoundCount);
        }
    }

    for sample in light {
        let value = natural_light_forbidden(
            sample,
            model.natural_light_filter_start_hour,
            model.natural_light_filter_stop_hour,
        );
        binner.max(sample.timestamp, value, FeatureChannel::NaturalLightForbidden);
    }

    let features = FeatureMatrix {
        data: binner.data,
        t0,
        minutes_per_bin,
        timezone_offset,
    };

    debug!(
        "t0={},tf={},bins={}",
        t0,
        features.bin_start_time(features.num_bins()),
        features.num_bins()
    );
    for channel in FeatureChannel::ALL {
        debug!(
            "{}={}",
            channel.name(),
            vector_as_string(features.channel(channel))
        );
    }

    Ok(features)
}

pub fn vector_as_string(values: ArrayView1<'_, f64>) -> String {
    values
        .iter()
        .map(|v| format!("{:.1}", v))
        .collect::<Vec<_>>()
        .join(",")
}
