use crate::error::ModelError;
use crate::model::ModelSetDef;
use crate::{AllSensorSamples, MotionSample, Sensor, SensorSample};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use walkdir::WalkDir;

pub const MODEL_SET_VERSION: u32 = 1;
pub const MODEL_FILE_EXTENSION: &str = "model";

/// Outer CBOR record of a model set file. The payload is itself CBOR and
/// is only decoded once the version is known.
#[derive(Debug, Serialize, Deserialize)]
struct ModelSetEnvelope {
    version: u32,
    #[serde(with = "serde_bytes")]
    payload: Vec<u8>,
}

pub fn decode_model_set<R: Read>(reader: R) -> Result<ModelSetDef, ModelError> {
    let envelope: ModelSetEnvelope =
        ciborium::from_reader(reader).map_err(|e| ModelError::Decode(e.to_string()))?;
    if envelope.version != MODEL_SET_VERSION {
        return Err(ModelError::UnsupportedVersion(envelope.version));
    }
    ciborium::from_reader(envelope.payload.as_slice()).map_err(|e| ModelError::Decode(e.to_string()))
}

pub fn encode_model_set<W: Write>(set: &ModelSetDef, writer: W) -> Result<(), ModelError> {
    let mut payload = Vec::new();
    ciborium::into_writer(set, &mut payload).map_err(|e| ModelError::Encode(e.to_string()))?;
    let envelope = ModelSetEnvelope {
        version: MODEL_SET_VERSION,
        payload,
    };
    ciborium::into_writer(&envelope, writer).map_err(|e| ModelError::Encode(e.to_string()))
}

pub fn read_model_set_file(path: &Path) -> Result<ModelSetDef, ModelError> {
    let file = File::open(path)?;
    let set = decode_model_set(BufReader::new(file))?;
    info!(
        "Loaded {} model(s) from {}",
        set.models.len(),
        path.display()
    );
    Ok(set)
}

pub fn write_model_set_file(set: &ModelSetDef, path: &Path) -> Result<(), ModelError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    encode_model_set(set, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Concatenate every model set found below `dir`, in path order.
pub fn read_model_dir(dir: &Path) -> Result<ModelSetDef, ModelError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| ModelError::Io(e.into()))?;
        let path = entry.path();
        if entry.file_type().is_file()
            && path.extension().and_then(|s| s.to_str()) == Some(MODEL_FILE_EXTENSION)
        {
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    let mut combined = ModelSetDef::default();
    for path in &paths {
        debug!("Reading model file: {}", path.display());
        combined.models.extend(read_model_set_file(path)?.models);
    }
    Ok(combined)
}

#[derive(Debug, Deserialize)]
struct SensorRow {
    timestamp: i64,
    sensor: String,
    value: f64,
    #[serde(default)]
    offset_millis: i32,
}

#[derive(Debug, Deserialize)]
struct MotionRow {
    timestamp: i64,
    value: f64,
}

/// Read `timestamp,sensor,value,offset_millis` rows. Unknown sensors are
/// skipped with a warning; `motion_count` rows become motion samples.
pub fn read_sensor_csv<R: Read>(reader: R) -> Result<(AllSensorSamples, Vec<MotionSample>)> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut sensors = AllSensorSamples::new();
    let mut motion = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.deserialize() {
        let row: SensorRow = result.context("Failed to parse sensor row")?;
        match row.sensor.parse::<Sensor>() {
            Ok(Sensor::MotionCount) => motion.push(MotionSample::new(row.timestamp, row.value)),
            Ok(sensor) => sensors.push(
                sensor,
                SensorSample::new(row.timestamp, row.value, row.offset_millis),
            ),
            Err(e) => {
                skipped += 1;
                debug!("{}", e);
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} rows with unknown sensors", skipped);
    }

    sensors.sort_by_time();
    motion.sort_by_key(|m| m.timestamp);
    Ok((sensors, motion))
}

pub fn read_motion_csv<R: Read>(reader: R) -> Result<Vec<MotionSample>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut motion = Vec::new();
    for result in rdr.deserialize() {
        let row: MotionRow = result.context("Failed to parse motion row")?;
        motion.push(MotionSample::new(row.timestamp, row.value));
    }
    motion.sort_by_key(|m| m.timestamp);
    Ok(motion)
}

pub fn read_sensor_file(path: &Path) -> Result<(AllSensorSamples, Vec<MotionSample>)> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_sensor_csv(BufReader::new(file))
}

pub fn read_motion_file(path: &Path) -> Result<Vec<MotionSample>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    read_motion_csv(BufReader::new(file))
}
