use anyhow::{Context, Result};
use chrono::{Duration, NaiveDateTime, Utc};
use clap::Parser;
use log::{debug, info};
use sleep_timeline::config::Args;
use sleep_timeline::data_loading::{read_motion_file, read_sensor_file};
use sleep_timeline::{
    output, DecodeWindow, ModelRepository, SleepHmmDecoder, TimezoneOffsetTable,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Parse an optional `YYYY-MM-DD HH:MM` UTC time into epoch millis.
fn parse_time(value: Option<&str>, default: i64) -> Result<i64> {
    match value {
        Some(s) => {
            let t = NaiveDateTime::parse_from_str(s, TIME_FORMAT)
                .with_context(|| format!("Invalid time '{}', expected YYYY-MM-DD HH:MM", s))?;
            Ok(t.and_utc().timestamp_millis())
        }
        None => Ok(default),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let repository = ModelRepository::load(&args.models)
        .with_context(|| format!("Failed to load models from {}", args.models.display()))?;
    println!("Loaded {} model(s)", repository.len());

    let (sensors, mut motion) = read_sensor_file(&args.sensor_csv)?;
    if let Some(path) = &args.motion_csv {
        motion.extend(read_motion_file(path)?);
        motion.sort_by_key(|m| m.timestamp);
    }
    println!("Loaded {} motion samples", motion.len());

    let now = Utc::now();
    let end = parse_time(args.end_time.as_deref(), now.timestamp_millis())?;
    let start = parse_time(
        args.start_time.as_deref(),
        (now - Duration::hours(24)).timestamp_millis(),
    )?;
    let current = parse_time(args.now.as_deref(), now.timestamp_millis())?;
    debug!("window start={} end={} now={}", start, end, current);

    let decoder = SleepHmmDecoder::new(repository, args.decode_params());
    let Some(mut result) = decoder.decode(&sensors, &motion, DecodeWindow::new(start, end, current))
    else {
        println!("No sleep timeline could be decoded for this window");
        return Ok(());
    };

    if let Some(zone) = &args.timezone {
        let table = TimezoneOffsetTable::from_zone_id(zone, start, end)?;
        info!("Re-stamping event offsets with {}", zone);
        result = result.remap_offsets(&table);
    }

    println!("\nModel: {} (bic {:.2})", result.model_name, result.bic);
    println!("Minutes in bed: {}", result.stats.minutes_in_bed);
    println!("Minutes asleep: {}", result.stats.minutes_asleep);
    println!("Times woken: {}", result.stats.times_woken_during_sleep);
    println!("Matched periods: {}", result.stats.num_matched_segments);

    for event in result.events() {
        println!(
            "  {}  {:<11} {}",
            output::local_time(event.start_timestamp, event.timezone_offset),
            event.kind().name(),
            event.description()
        );
    }

    if let Some(prefix) = &args.csv_output {
        output::write_timeline_csv(prefix, &result)?;
    }

    if let Some(path) = &args.json_output {
        println!("Writing summary to {}", path.display());
        output::write_summary_file(path, &result)?;
    }

    Ok(())
}
