use crate::config::DecodeParams;
use crate::events::Event;
use crate::hmm::{path_as_string, DecodedPath};
use crate::matching::{match_sleep_to_bed, MatchedPeriod, SleepStats};
use crate::model::{ModelRepository, NamedSleepModel};
use crate::preprocessing::{bin_sensor_data, FeatureMatrix};
use crate::segments::segments_for_states;
use crate::timezone::TimezoneOffsetTable;
use crate::{AllSensorSamples, DecodeWindow, MotionSample};
use log::{debug, info, warn};
use serde::Serialize;

/// Outcome of one successful decode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SleepHmmResult {
    pub model_name: String,
    pub stats: SleepStats,
    pub periods: Vec<MatchedPeriod>,
    pub path: Vec<usize>,
    pub bic: f64,
}

impl SleepHmmResult {
    /// Every event of every period, ordered by start time.
    pub fn events(&self) -> Vec<Event> {
        let mut events: Vec<Event> = self
            .periods
            .iter()
            .flat_map(|p| p.events().into_iter().cloned())
            .collect();
        events.sort_by_key(|e| e.start_timestamp);
        events
    }

    /// Re-stamp event offsets from `table`. Instants are unchanged.
    pub fn remap_offsets(&self, table: &TimezoneOffsetTable) -> SleepHmmResult {
        if table.is_empty() {
            return self.clone();
        }
        SleepHmmResult {
            periods: self
                .periods
                .iter()
                .map(|p| p.with_event_offsets(|t| table.get(t)))
                .collect(),
            ..self.clone()
        }
    }
}

/// Multi-model sleep decoder. Holds a shared handle to the model repository,
/// so one instance (or clones of it) can serve any number of threads.
#[derive(Debug, Clone)]
pub struct SleepHmmDecoder {
    repository: ModelRepository,
    params: DecodeParams,
}

impl SleepHmmDecoder {
    pub fn new(repository: ModelRepository, params: DecodeParams) -> Self {
        Self { repository, params }
    }

    pub fn repository(&self) -> &ModelRepository {
        &self.repository
    }

    pub fn params(&self) -> &DecodeParams {
        &self.params
    }

    /// Decode every model, keep the lowest score, segment and match.
    ///
    /// None covers every absence: a model that cannot bin the data (which
    /// invalidates the whole comparison), no model with a legal path, and no
    /// sleep segment contained in a bed segment.
    pub fn decode(
        &self,
        sensors: &AllSensorSamples,
        motion: &[MotionSample],
        window: DecodeWindow,
    ) -> Option<SleepHmmResult> {
        let (model, features, decoded) = self.select_model(sensors, motion, window)?;

        info!(
            "Chosen model {} (bic={:.2}, {} bins)",
            model.name,
            decoded.bic,
            decoded.path.len()
        );
        debug!("path={}", path_as_string(&decoded.path));

        let minutes_per_bin = model.window_minutes;
        let gap = self.params.acceptable_gap_bins(minutes_per_bin);

        let sleeps = segments_for_states(
            &decoded.path,
            &model.sleep_states,
            gap,
            self.params.min_sleep_bins(minutes_per_bin),
        );
        let beds = segments_for_states(
            &decoded.path,
            &model.on_bed_states,
            gap,
            self.params.min_bed_bins(minutes_per_bin),
        );
        debug!("{} sleep segment(s), {} bed segment(s)", sleeps.len(), beds.len());

        let Some((stats, periods)) = match_sleep_to_bed(
            &sleeps,
            &beds,
            features.t0,
            features.timezone_offset,
            minutes_per_bin,
        ) else {
            info!("No sleep segment fits inside a bed segment");
            return None;
        };

        info!(
            "asleep={}min in_bed={}min periods={}",
            stats.minutes_asleep,
            stats.minutes_in_bed,
            periods.len()
        );

        Some(SleepHmmResult {
            model_name: model.name.clone(),
            stats,
            periods,
            path: decoded.path,
            bic: decoded.bic,
        })
    }

    fn select_model(
        &self,
        sensors: &AllSensorSamples,
        motion: &[MotionSample],
        window: DecodeWindow,
    ) -> Option<(&NamedSleepModel, FeatureMatrix, DecodedPath)> {
        let mut best: Option<(&NamedSleepModel, FeatureMatrix, DecodedPath)> = None;

        for model in self.repository.models() {
            let features = match bin_sensor_data(sensors, motion, model, window) {
                Ok(features) => features,
                Err(e) => {
                    warn!("Binning failed for model {}: {}", model.name, e);
                    return None;
                }
            };

            let Some(decoded) = model.hmm.decode(&features, &model.allowable_endings()) else {
                debug!("Model {} has no legal path", model.name);
                continue;
            };
            debug!(
                "Model {}: log_likelihood={:.2} bic={:.2}",
                model.name, decoded.log_likelihood, decoded.bic
            );

            if best
                .as_ref()
                .map_or(true, |(_, _, current)| decoded.bic < current.bic)
            {
                best = Some((model, features, decoded));
            }
        }

        if best.is_none() {
            warn!("No model produced a decoded path");
        }
        best
    }
}
