use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Decode a night of sensor data into a sleep timeline
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// CSV of sensor samples (timestamp,sensor,value,offset_millis)
    #[arg(help = "CSV of sensor samples (timestamp,sensor,value,offset_millis)")]
    pub sensor_csv: PathBuf,

    /// CSV of wearable motion samples (timestamp,value)
    #[arg(long)]
    pub motion_csv: Option<PathBuf>,

    /// Serialized model set file, or a directory of .model files
    #[arg(long, env = "SLEEP_MODELS")]
    pub models: PathBuf,

    /// Start time (format: YYYY-MM-DD HH:MM, UTC), defaults to 24 hours ago
    #[arg(long)]
    pub start_time: Option<String>,

    /// End time (format: YYYY-MM-DD HH:MM, UTC), defaults to now
    #[arg(long)]
    pub end_time: Option<String>,

    /// Current time bound (format: YYYY-MM-DD HH:MM, UTC), defaults to now
    #[arg(long)]
    pub now: Option<String>,

    /// IANA timezone used to re-stamp event offsets (e.g. America/Los_Angeles)
    #[arg(long, env = "SLEEP_TIMEZONE")]
    pub timezone: Option<String>,

    /// CSV output file prefix (e.g. /path/to/output/prefix)
    #[arg(long)]
    pub csv_output: Option<String>,

    /// JSON summary output path
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Gaps inside a sleep segment up to this many minutes are absorbed
    #[arg(long, default_value = "30")]
    pub acceptable_gap_minutes: i32,

    /// Minimum duration of a sleep segment in minutes
    #[arg(long, default_value = "30")]
    pub min_sleep_minutes: i32,

    /// Extra minutes on top of the sleep minimum required of an on-bed segment
    #[arg(long, default_value = "30")]
    pub bed_margin_minutes: i32,
}

impl Args {
    pub fn decode_params(&self) -> DecodeParams {
        DecodeParams {
            acceptable_gap_minutes: self.acceptable_gap_minutes,
            min_sleep_minutes: self.min_sleep_minutes,
            bed_margin_minutes: self.bed_margin_minutes,
        }
    }
}

/// Segmentation thresholds, expressed in minutes and converted to bins
/// against the window width of whichever model wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeParams {
    pub acceptable_gap_minutes: i32,
    pub min_sleep_minutes: i32,
    pub bed_margin_minutes: i32,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            acceptable_gap_minutes: 30,
            min_sleep_minutes: 30,
            bed_margin_minutes: 2 * 15,
        }
    }
}

impl DecodeParams {
    pub fn acceptable_gap_bins(&self, minutes_per_bin: i32) -> usize {
        to_bins(self.acceptable_gap_minutes, minutes_per_bin)
    }

    pub fn min_sleep_bins(&self, minutes_per_bin: i32) -> usize {
        to_bins(self.min_sleep_minutes, minutes_per_bin)
    }

    pub fn min_bed_bins(&self, minutes_per_bin: i32) -> usize {
        to_bins(
            self.min_sleep_minutes + self.bed_margin_minutes,
            minutes_per_bin,
        )
    }
}

fn to_bins(minutes: i32, minutes_per_bin: i32) -> usize {
    if minutes_per_bin <= 0 || minutes <= 0 {
        return 0;
    }
    (minutes / minutes_per_bin) as usize
}
