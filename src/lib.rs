pub mod config;
pub mod data_loading;
pub mod decoder;
pub mod density;
pub mod error;
pub mod events;
pub mod hmm;
pub mod matching;
pub mod model;
pub mod output;
pub mod preprocessing;
pub mod segments;
pub mod timezone;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub use decoder::{SleepHmmDecoder, SleepHmmResult};
pub use error::{BinningError, EventError, ModelError, TimezoneError};
pub use events::{Event, EventKind};
pub use matching::{MatchedPeriod, SleepStats};
pub use model::{ModelRepository, NamedSleepModel};
pub use timezone::TimezoneOffsetTable;

pub const MILLIS_PER_MINUTE: i64 = 60_000;

/// Pill records carrying this magnitude are heartbeats, not motion.
pub const MOTION_HEARTBEAT_SENTINEL: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    Light,
    MotionCount,
    SoundPeakDisturbance,
    #[serde(rename = "sound_num_disturbances")]
    SoundDisturbanceCount,
    WaveCount,
}

impl Sensor {
    pub fn name(&self) -> &'static str {
        match self {
            Sensor::Light => "light",
            Sensor::MotionCount => "motion_count",
            Sensor::SoundPeakDisturbance => "sound_peak_disturbance",
            Sensor::SoundDisturbanceCount => "sound_num_disturbances",
            Sensor::WaveCount => "wave_count",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Sensor::Light),
            "motion_count" => Ok(Sensor::MotionCount),
            "sound_peak_disturbance" => Ok(Sensor::SoundPeakDisturbance),
            "sound_num_disturbances" => Ok(Sensor::SoundDisturbanceCount),
            "wave_count" => Ok(Sensor::WaveCount),
            _ => Err(format!("Unknown sensor: {}", s)),
        }
    }
}

/// One bedside sensor reading. Timestamps are UTC epoch millis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    pub timestamp: i64,
    pub value: f64,
    pub offset_millis: i32,
}

impl SensorSample {
    pub fn new(timestamp: i64, value: f64, offset_millis: i32) -> Self {
        Self {
            timestamp,
            value,
            offset_millis,
        }
    }
}

/// One wearable motion record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub timestamp: i64,
    pub value: f64,
}

impl MotionSample {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }

    pub fn is_heartbeat(&self) -> bool {
        self.value == MOTION_HEARTBEAT_SENTINEL
    }
}

/// Per-channel sensor samples for one night, each channel ordered by time.
#[derive(Debug, Clone, Default)]
pub struct AllSensorSamples {
    samples: HashMap<Sensor, Vec<SensorSample>>,
}

impl AllSensorSamples {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sensor: Sensor, samples: Vec<SensorSample>) {
        self.samples.insert(sensor, samples);
    }

    pub fn push(&mut self, sensor: Sensor, sample: SensorSample) {
        self.samples.entry(sensor).or_default().push(sample);
    }

    /// Missing channels read as empty.
    pub fn get(&self, sensor: Sensor) -> &[SensorSample] {
        self.samples
            .get(&sensor)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn sort_by_time(&mut self) {
        for samples in self.samples.values_mut() {
            samples.sort_by_key(|s| s.timestamp);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.values().all(|v| v.is_empty())
    }
}

/// Bounds of a decode request, all UTC epoch millis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeWindow {
    pub start: i64,
    pub end: i64,
    pub now: i64,
}

impl DecodeWindow {
    pub fn new(start: i64, end: i64, now: i64) -> Self {
        Self { start, end, now }
    }
}
