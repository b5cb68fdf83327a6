use crate::density::{build_composite, DensityDef};
use crate::error::ModelError;
use crate::hmm::HiddenMarkovModel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// A pretrained HMM plus the thresholds and state classifications needed to
/// interpret its output. Immutable once built.
#[derive(Debug)]
pub struct NamedSleepModel {
    pub name: String,
    pub window_minutes: i32,
    pub hmm: HiddenMarkovModel,
    pub sleep_states: BTreeSet<usize>,
    pub on_bed_states: BTreeSet<usize>,
    pub allowable_ending_states: BTreeSet<usize>,
    pub pill_magnitude_disturbance_threshold_lsb: f64,
    pub sound_disturbance_threshold_db: f64,
    pub natural_light_filter_start_hour: f64,
    pub natural_light_filter_stop_hour: f64,
}

impl NamedSleepModel {
    pub fn num_states(&self) -> usize {
        self.hmm.num_states()
    }

    pub fn allowable_endings(&self) -> Vec<usize> {
        self.allowable_ending_states.iter().copied().collect()
    }
}

/// Emission model of a single state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDef {
    pub densities: Vec<DensityDef>,
}

/// Serialized model, the shape stored inside a model set payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    pub window_minutes: i32,
    pub initial_probabilities: Vec<f64>,
    pub transition_matrix: Vec<Vec<f64>>,
    pub states: Vec<StateDef>,
    pub sleep_states: Vec<usize>,
    pub on_bed_states: Vec<usize>,
    pub allowable_ending_states: Vec<usize>,
    pub pill_magnitude_disturbance_threshold_lsb: f64,
    pub sound_disturbance_threshold_db: f64,
    pub natural_light_filter_start_hour: f64,
    pub natural_light_filter_stop_hour: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ModelSetDef {
    pub models: Vec<ModelDef>,
}

impl ModelDef {
    pub fn build(&self) -> Result<NamedSleepModel, ModelError> {
        let num_states = self.states.len();
        let state_set = |states: &[usize]| -> Result<BTreeSet<usize>, ModelError> {
            match states.iter().find(|&&s| s >= num_states) {
                Some(&state) => Err(ModelError::StateOutOfRange {
                    model: self.name.clone(),
                    state,
                    num_states,
                }),
                None => Ok(states.iter().copied().collect()),
            }
        };

        let sleep_states = state_set(&self.sleep_states)?;
        let on_bed_states = state_set(&self.on_bed_states)?;
        let allowable_ending_states = state_set(&self.allowable_ending_states)?;

        let emissions = self
            .states
            .iter()
            .map(|state| build_composite(&state.densities))
            .collect::<Result<Vec<_>, _>>()?;

        let hmm = HiddenMarkovModel::new(
            &self.initial_probabilities,
            &self.transition_matrix,
            emissions,
        )
        .map_err(|e| match e {
            ModelError::DimensionMismatch { reason, .. } => ModelError::DimensionMismatch {
                model: self.name.clone(),
                reason,
            },
            other => other,
        })?;

        Ok(NamedSleepModel {
            name: self.name.clone(),
            window_minutes: self.window_minutes,
            hmm,
            sleep_states,
            on_bed_states,
            allowable_ending_states,
            pill_magnitude_disturbance_threshold_lsb: self.pill_magnitude_disturbance_threshold_lsb,
            sound_disturbance_threshold_db: self.sound_disturbance_threshold_db,
            natural_light_filter_start_hour: self.natural_light_filter_start_hour,
            natural_light_filter_stop_hour: self.natural_light_filter_stop_hour,
        })
    }
}

/// Models loaded once at startup and shared read-only by every decode.
///
/// Cloning only bumps a reference count.
#[derive(Debug, Clone)]
pub struct ModelRepository {
    models: Arc<[NamedSleepModel]>,
}

impl ModelRepository {
    pub fn new(models: Vec<NamedSleepModel>) -> Result<Self, ModelError> {
        if models.is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(Self {
            models: models.into(),
        })
    }

    pub fn from_defs(set: &ModelSetDef) -> Result<Self, ModelError> {
        let models = set
            .models
            .iter()
            .map(ModelDef::build)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(models)
    }

    /// Load a model set file, or every `.model` file below a directory.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let set = if path.is_dir() {
            crate::data_loading::read_model_dir(path)?
        } else {
            crate::data_loading::read_model_set_file(path)?
        };
        Self::from_defs(&set)
    }

    pub fn models(&self) -> &[NamedSleepModel] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&NamedSleepModel> {
        self.models.iter().find(|m| m.name == name)
    }
}
