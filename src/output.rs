use crate::decoder::SleepHmmResult;
use crate::events::Event;
use crate::matching::SleepStats;
use anyhow::{Context, Result};
use chrono::DateTime;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Wall-clock rendering of `timestamp` shifted by `offset_millis`.
pub fn local_time(timestamp: i64, offset_millis: i32) -> String {
    DateTime::from_timestamp_millis(timestamp + offset_millis as i64)
        .map(|t| t.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// `<dir>/<stem>_<model>_timeline.<ext>` derived from a prefix like
/// `/path/to/output/night.csv`.
fn timeline_path(base_path: &str, model_name: &str) -> PathBuf {
    let path = Path::new(base_path);
    let dir = path.parent().unwrap_or(Path::new("."));
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("csv");

    dir.join(format!("{}_{}_timeline.{}", stem, model_name, ext))
}

pub fn write_events_csv<W: Write>(writer: W, events: &[Event]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);

    writer.write_record([
        "timestamp",
        "end_timestamp",
        "offset_millis",
        "local_time",
        "type",
        "description",
    ])?;

    for event in events {
        writer.write_record([
            event.start_timestamp.to_string(),
            event.end_timestamp.to_string(),
            event.timezone_offset.to_string(),
            local_time(event.start_timestamp, event.timezone_offset),
            event.kind().name().to_string(),
            event.description().to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Write the flattened timeline next to `base_path`, returning the file
/// actually written.
pub fn write_timeline_csv(base_path: &str, result: &SleepHmmResult) -> Result<PathBuf> {
    let full_path = timeline_path(base_path, &result.model_name);
    if let Some(dir) = full_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }

    println!("Writing timeline to {}", full_path.display());
    let file = File::create(&full_path)
        .with_context(|| format!("Failed to create file: {}", full_path.display()))?;
    write_events_csv(BufWriter::new(file), &result.events())?;
    Ok(full_path)
}

#[derive(Debug, Serialize)]
struct TimelineSummary<'a> {
    model_name: &'a str,
    bic: f64,
    stats: &'a SleepStats,
    path: &'a [usize],
    events: Vec<Event>,
}

pub fn write_summary_json<W: Write>(writer: W, result: &SleepHmmResult) -> Result<()> {
    let summary = TimelineSummary {
        model_name: &result.model_name,
        bic: result.bic,
        stats: &result.stats,
        path: &result.path,
        events: result.events(),
    };
    serde_json::to_writer_pretty(writer, &summary).context("Failed to serialize summary")?;
    Ok(())
}

pub fn write_summary_file(path: &Path, result: &SleepHmmResult) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    write_summary_json(&mut writer, result)?;
    writer.flush()?;
    Ok(())
}
