//! End-to-end decoding from a serialized model set and CSV sensor data

use pretty_assertions::assert_eq;
use sleep_timeline::config::DecodeParams;
use sleep_timeline::data_loading::{decode_model_set, encode_model_set, read_sensor_csv};
use sleep_timeline::density::DensityDef;
use sleep_timeline::model::{ModelDef, ModelSetDef, StateDef};
use sleep_timeline::preprocessing::FeatureChannel;
use sleep_timeline::{
    AllSensorSamples, DecodeWindow, EventKind, ModelRepository, MotionSample, SleepHmmDecoder,
    SleepStats, MILLIS_PER_MINUTE,
};
use std::fmt::Write;
use std::thread;

const T0: i64 = 1_420_000_200_000;
const BIN: i64 = 15 * MILLIS_PER_MINUTE;
const OFFSET: i32 = -28_800_000;

fn model_def(name: &str, light_off_bed: Vec<f64>) -> ModelDef {
    let dark = vec![0.96, 0.01, 0.01, 0.01, 0.01];
    let state = |light: &Vec<f64>, motion_mean: f64| StateDef {
        densities: vec![
            DensityDef::DiscreteAlphabet {
                channel: FeatureChannel::Light.index(),
                probabilities: light.clone(),
            },
            DensityDef::Poisson {
                channel: FeatureChannel::MotionCount.index(),
                mean: motion_mean,
            },
        ],
    };
    ModelDef {
        name: name.to_string(),
        window_minutes: 15,
        initial_probabilities: vec![1.0 / 3.0; 3],
        transition_matrix: vec![
            vec![0.9, 0.05, 0.05],
            vec![0.05, 0.9, 0.05],
            vec![0.05, 0.05, 0.9],
        ],
        states: vec![
            state(&light_off_bed, 8.0),
            state(&dark, 8.0),
            state(&dark, 0.5),
        ],
        sleep_states: vec![2],
        on_bed_states: vec![1, 2],
        allowable_ending_states: vec![0, 1],
        pill_magnitude_disturbance_threshold_lsb: 15000.0,
        sound_disturbance_threshold_db: 70.0,
        natural_light_filter_start_hour: 20.0,
        natural_light_filter_stop_hour: 6.0,
    }
}

fn model_set() -> ModelSetDef {
    ModelSetDef {
        models: vec![
            model_def("uniform", vec![0.2; 5]),
            model_def("bright_off_bed", vec![0.01, 0.01, 0.01, 0.01, 0.96]),
        ],
    }
}

fn repository() -> ModelRepository {
    let mut bytes = Vec::new();
    encode_model_set(&model_set(), &mut bytes).unwrap();
    let decoded = decode_model_set(bytes.as_slice()).unwrap();
    ModelRepository::from_defs(&decoded).unwrap()
}

/// One night as CSV: bright and moving, in bed awake, asleep with a single
/// waking bin at 13, awake in bed, then up again.
fn night_csv() -> String {
    let mut csv = String::from("timestamp,sensor,value,offset_millis\n");
    for bin in 0..40i64 {
        let (bright, active) = match bin {
            0..=1 | 36..=39 => (true, true),
            2..=4 | 13 | 31..=35 => (false, true),
            _ => (false, false),
        };
        let bin_start = T0 + bin * BIN;
        for minute in 0..15 {
            let lux = if bright { 3.75 } else { 0.0 };
            writeln!(
                csv,
                "{},light,{},{}",
                bin_start + minute * MILLIS_PER_MINUTE,
                lux,
                OFFSET
            )
            .unwrap();
        }
        if active {
            for k in 0..8 {
                writeln!(csv, "{},motion_count,500,0", bin_start + k * MILLIS_PER_MINUTE).unwrap();
            }
        }
        // quiet room, never loud enough to count as a disturbance
        writeln!(csv, "{},sound_peak_disturbance,40,{}", bin_start, OFFSET).unwrap();
    }
    csv
}

fn night() -> (AllSensorSamples, Vec<MotionSample>) {
    read_sensor_csv(night_csv().as_bytes()).unwrap()
}

fn window() -> DecodeWindow {
    DecodeWindow::new(T0, T0 + 40 * BIN, T0 + 100 * BIN)
}

#[test]
fn test_decode_night_from_serialized_models() {
    let decoder = SleepHmmDecoder::new(repository(), DecodeParams::default());
    let (sensors, motion) = night();
    let result = decoder.decode(&sensors, &motion, window()).unwrap();

    assert_eq!(result.model_name, "bright_off_bed");
    assert_eq!(
        result.stats,
        SleepStats {
            minutes_in_bed: 510,
            minutes_asleep: 345,
            times_woken_during_sleep: 1,
            num_matched_segments: 1,
        }
    );

    let events = result.events();
    let summary: Vec<_> = events
        .iter()
        .map(|e| (e.kind(), (e.start_timestamp - T0) / BIN))
        .collect();
    assert_eq!(
        summary,
        vec![
            (EventKind::InBed, 2),
            (EventKind::Sleep, 5),
            (EventKind::WakeUp, 12),
            (EventKind::Sleep, 14),
            (EventKind::WakeUp, 30),
            (EventKind::OutOfBed, 35),
        ]
    );
    assert!(events.iter().all(|e| e.timezone_offset == OFFSET));
    assert!(events
        .iter()
        .all(|e| e.end_timestamp - e.start_timestamp == MILLIS_PER_MINUTE));
}

#[test]
fn test_decode_is_deterministic() {
    let decoder = SleepHmmDecoder::new(repository(), DecodeParams::default());
    let (sensors, motion) = night();
    let first = decoder.decode(&sensors, &motion, window());
    let second = decoder.decode(&sensors, &motion, window());
    assert!(first.is_some());
    assert_eq!(first, second);
}

#[test]
fn test_parallel_decodes_share_repository() {
    let decoder = SleepHmmDecoder::new(repository(), DecodeParams::default());
    let (sensors, motion) = night();
    let expected = decoder.decode(&sensors, &motion, window());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let decoder = decoder.clone();
            let (sensors, motion) = night();
            thread::spawn(move || decoder.decode(&sensors, &motion, window()))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn test_now_inside_first_bin_gives_no_result() {
    let decoder = SleepHmmDecoder::new(repository(), DecodeParams::default());
    let (sensors, motion) = night();
    let truncated = DecodeWindow::new(T0, T0 + 40 * BIN, T0 + BIN / 2);
    assert!(decoder.decode(&sensors, &motion, truncated).is_none());
}

#[test]
fn test_missing_light_gives_no_result() {
    let decoder = SleepHmmDecoder::new(repository(), DecodeParams::default());
    let (_, motion) = night();
    assert!(decoder
        .decode(&AllSensorSamples::new(), &motion, window())
        .is_none());
}
