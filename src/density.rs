//! Per-state emission densities.
//!
//! Every density reads one bin's observation column (all feature channels)
//! and returns a log-probability. Univariate densities look at a single
//! channel; [`CompositeDensity`] sums its members into a joint
//! log-likelihood, so the decoder never needs to know the shape of a state's
//! emission model.

use crate::error::ModelError;
use crate::preprocessing::{FeatureChannel, NUM_FEATURES};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Continuous, Discrete, Gamma, Poisson};
use std::fmt::Debug;

/// Floor applied to every univariate log-probability.
pub const MIN_LOG_PROBABILITY: f64 = -50.0;

const MAX_LOG_PROBABILITY: f64 = 50.0;

pub trait Density: Debug + Send + Sync {
    fn log_probability(&self, observation: ArrayView1<'_, f64>) -> f64;

    /// Free parameters, used for the BIC penalty.
    fn parameter_count(&self) -> usize;
}

fn bounded(log_probability: f64) -> f64 {
    if log_probability.is_nan() {
        return MIN_LOG_PROBABILITY;
    }
    log_probability.clamp(MIN_LOG_PROBABILITY, MAX_LOG_PROBABILITY)
}

fn channel_value(observation: ArrayView1<'_, f64>, channel: FeatureChannel) -> Option<f64> {
    observation.get(channel.index()).copied()
}

/// Probability table over integer symbols; the observation is rounded.
#[derive(Debug, Clone)]
pub struct DiscreteAlphabetPdf {
    channel: FeatureChannel,
    log_probabilities: Vec<f64>,
}

impl DiscreteAlphabetPdf {
    pub fn new(channel: FeatureChannel, probabilities: &[f64]) -> Result<Self, ModelError> {
        if probabilities.is_empty() {
            return Err(ModelError::InvalidDensity(
                "discrete alphabet needs at least one symbol".to_string(),
            ));
        }
        if let Some(p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
            return Err(ModelError::InvalidDensity(format!(
                "discrete alphabet probability {} outside [0, 1]",
                p
            )));
        }
        Ok(Self {
            channel,
            log_probabilities: probabilities.iter().map(|p| p.ln()).collect(),
        })
    }
}

impl Density for DiscreteAlphabetPdf {
    fn log_probability(&self, observation: ArrayView1<'_, f64>) -> f64 {
        let Some(value) = channel_value(observation, self.channel) else {
            return MIN_LOG_PROBABILITY;
        };
        let symbol = value.round();
        if symbol < 0.0 || symbol >= self.log_probabilities.len() as f64 {
            return MIN_LOG_PROBABILITY;
        }
        bounded(self.log_probabilities[symbol as usize])
    }

    fn parameter_count(&self) -> usize {
        self.log_probabilities.len() - 1
    }
}

/// Gamma density parameterised by mean and standard deviation.
#[derive(Debug, Clone)]
pub struct GammaPdf {
    channel: FeatureChannel,
    gamma: Gamma,
}

impl GammaPdf {
    pub fn new(channel: FeatureChannel, mean: f64, stddev: f64) -> Result<Self, ModelError> {
        if !(mean > 0.0) || !(stddev > 0.0) {
            return Err(ModelError::InvalidDensity(format!(
                "gamma mean {} and stddev {} must be positive",
                mean, stddev
            )));
        }
        let variance = stddev * stddev;
        let shape = mean * mean / variance;
        let rate = mean / variance;
        let gamma =
            Gamma::new(shape, rate).map_err(|e| ModelError::InvalidDensity(e.to_string()))?;
        Ok(Self { channel, gamma })
    }
}

impl Density for GammaPdf {
    fn log_probability(&self, observation: ArrayView1<'_, f64>) -> f64 {
        match channel_value(observation, self.channel) {
            Some(value) if value >= 0.0 => bounded(self.gamma.ln_pdf(value)),
            _ => MIN_LOG_PROBABILITY,
        }
    }

    fn parameter_count(&self) -> usize {
        2
    }
}

/// Poisson density over rounded non-negative counts.
#[derive(Debug, Clone)]
pub struct PoissonPdf {
    channel: FeatureChannel,
    poisson: Poisson,
}

impl PoissonPdf {
    pub fn new(channel: FeatureChannel, mean: f64) -> Result<Self, ModelError> {
        let poisson =
            Poisson::new(mean).map_err(|e| ModelError::InvalidDensity(e.to_string()))?;
        Ok(Self { channel, poisson })
    }
}

impl Density for PoissonPdf {
    fn log_probability(&self, observation: ArrayView1<'_, f64>) -> f64 {
        match channel_value(observation, self.channel) {
            Some(value) if value >= 0.0 => bounded(self.poisson.ln_pmf(value.round() as u64)),
            _ => MIN_LOG_PROBABILITY,
        }
    }

    fn parameter_count(&self) -> usize {
        1
    }
}

/// Joint density of independent channels.
#[derive(Debug, Default)]
pub struct CompositeDensity {
    members: Vec<Box<dyn Density>>,
}

impl CompositeDensity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, density: impl Density + 'static) -> Self {
        self.members.push(Box::new(density));
        self
    }

    pub fn push(&mut self, density: Box<dyn Density>) {
        self.members.push(density);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Density for CompositeDensity {
    fn log_probability(&self, observation: ArrayView1<'_, f64>) -> f64 {
        self.members
            .iter()
            .map(|d| d.log_probability(observation))
            .sum()
    }

    fn parameter_count(&self) -> usize {
        self.members.iter().map(|d| d.parameter_count()).sum()
    }
}

/// Serialized form of a univariate density inside a model set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DensityDef {
    DiscreteAlphabet { channel: usize, probabilities: Vec<f64> },
    Gamma { channel: usize, mean: f64, stddev: f64 },
    Poisson { channel: usize, mean: f64 },
}

impl DensityDef {
    pub fn channel(&self) -> usize {
        match self {
            DensityDef::DiscreteAlphabet { channel, .. }
            | DensityDef::Gamma { channel, .. }
            | DensityDef::Poisson { channel, .. } => *channel,
        }
    }

    pub fn build(&self) -> Result<Box<dyn Density>, ModelError> {
        let channel = FeatureChannel::from_index(self.channel()).ok_or_else(|| {
            ModelError::InvalidDensity(format!(
                "channel {} out of range (num features = {})",
                self.channel(),
                NUM_FEATURES
            ))
        })?;
        Ok(match self {
            DensityDef::DiscreteAlphabet { probabilities, .. } => {
                Box::new(DiscreteAlphabetPdf::new(channel, probabilities)?)
            }
            DensityDef::Gamma { mean, stddev, .. } => {
                Box::new(GammaPdf::new(channel, *mean, *stddev)?)
            }
            DensityDef::Poisson { mean, .. } => Box::new(PoissonPdf::new(channel, *mean)?),
        })
    }
}

/// Build the composite emission density of one state.
pub fn build_composite(defs: &[DensityDef]) -> Result<CompositeDensity, ModelError> {
    let mut composite = CompositeDensity::new();
    for def in defs {
        composite.push(def.build()?);
    }
    Ok(composite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn obs(light: f64, motion: f64, disturbance: f64) -> ndarray::Array1<f64> {
        arr1(&[light, motion, disturbance, 0.0, 0.0])
    }

    #[test]
    fn test_discrete_alphabet_rounds_to_symbol() {
        let pdf = DiscreteAlphabetPdf::new(FeatureChannel::Disturbance, &[0.9, 0.1]).unwrap();
        assert!((pdf.log_probability(obs(0.0, 0.0, 0.0).view()) - 0.9f64.ln()).abs() < 1e-12);
        assert!((pdf.log_probability(obs(0.0, 0.0, 0.8).view()) - 0.1f64.ln()).abs() < 1e-12);
        assert_eq!(pdf.log_probability(obs(0.0, 0.0, 4.0).view()), MIN_LOG_PROBABILITY);
        assert_eq!(pdf.parameter_count(), 1);
    }

    #[test]
    fn test_discrete_alphabet_zero_probability_is_floored() {
        let pdf = DiscreteAlphabetPdf::new(FeatureChannel::Light, &[1.0, 0.0]).unwrap();
        assert_eq!(pdf.log_probability(obs(1.0, 0.0, 0.0).view()), MIN_LOG_PROBABILITY);
    }

    #[test]
    fn test_discrete_alphabet_rejects_bad_tables() {
        assert!(DiscreteAlphabetPdf::new(FeatureChannel::Light, &[]).is_err());
        assert!(DiscreteAlphabetPdf::new(FeatureChannel::Light, &[1.5]).is_err());
    }

    #[test]
    fn test_poisson_matches_closed_form() {
        let pdf = PoissonPdf::new(FeatureChannel::MotionCount, 2.0).unwrap();
        // P(3; 2) = e^-2 2^3 / 3!
        let expected = (-2.0f64).exp() * 8.0 / 6.0;
        let lp = pdf.log_probability(obs(0.0, 3.0, 0.0).view());
        assert!((lp - expected.ln()).abs() < 1e-9);
        assert_eq!(pdf.log_probability(obs(0.0, -1.0, 0.0).view()), MIN_LOG_PROBABILITY);
    }

    #[test]
    fn test_gamma_prefers_values_near_mean() {
        let pdf = GammaPdf::new(FeatureChannel::Light, 4.0, 1.0).unwrap();
        let near = pdf.log_probability(obs(4.0, 0.0, 0.0).view());
        let far = pdf.log_probability(obs(0.5, 0.0, 0.0).view());
        assert!(near > far);
        assert_eq!(pdf.log_probability(obs(-1.0, 0.0, 0.0).view()), MIN_LOG_PROBABILITY);
        assert!(GammaPdf::new(FeatureChannel::Light, 0.0, 1.0).is_err());
    }

    #[test]
    fn test_composite_sums_members() {
        let alphabet = DiscreteAlphabetPdf::new(FeatureChannel::Disturbance, &[0.5, 0.5]).unwrap();
        let poisson = PoissonPdf::new(FeatureChannel::MotionCount, 1.0).unwrap();
        let o = obs(0.0, 0.0, 1.0);
        let expected = alphabet.log_probability(o.view()) + poisson.log_probability(o.view());
        let composite = CompositeDensity::new().with(alphabet).with(poisson);
        assert!((composite.log_probability(o.view()) - expected).abs() < 1e-12);
        assert_eq!(composite.parameter_count(), 2);
        assert_eq!(composite.len(), 2);
    }

    #[test]
    fn test_density_def_validates_channel() {
        let def = DensityDef::Poisson {
            channel: NUM_FEATURES,
            mean: 1.0,
        };
        assert!(matches!(def.build(), Err(ModelError::InvalidDensity(_))));
    }

    #[test]
    fn test_density_def_json_shape() {
        let def: DensityDef =
            serde_json::from_str(r#"{"type":"gamma","channel":0,"mean":2.0,"stddev":1.0}"#)
                .unwrap();
        assert_eq!(
            def,
            DensityDef::Gamma {
                channel: 0,
                mean: 2.0,
                stddev: 1.0
            }
        );
    }
}
