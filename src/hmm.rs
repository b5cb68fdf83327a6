use crate::density::{CompositeDensity, Density};
use crate::error::ModelError;
use crate::preprocessing::FeatureMatrix;
use ndarray::Array2;

/// Maximum-likelihood state sequence for one model, plus its fit score.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPath {
    pub path: Vec<usize>,
    pub log_likelihood: f64,
    /// BIC-style score, lower is better.
    pub bic: f64,
}

/// Hidden Markov model with composite emission densities.
///
/// Probabilities are stored in log space; transitions with zero probability
/// become `-inf` and are never taken by the decoder.
#[derive(Debug)]
pub struct HiddenMarkovModel {
    log_initial: Vec<f64>,
    log_transition: Array2<f64>,
    emissions: Vec<CompositeDensity>,
}

impl HiddenMarkovModel {
    pub fn new(
        initial: &[f64],
        transition: &[Vec<f64>],
        emissions: Vec<CompositeDensity>,
    ) -> Result<Self, ModelError> {
        let n = emissions.len();
        let mismatch = |reason: String| ModelError::DimensionMismatch {
            model: "hmm".to_string(),
            reason,
        };
        if n == 0 {
            return Err(mismatch("model has no states".to_string()));
        }
        if initial.len() != n {
            return Err(mismatch(format!(
                "initial length {} != num states {}",
                initial.len(),
                n
            )));
        }
        if transition.len() != n || transition.iter().any(|row| row.len() != n) {
            return Err(mismatch(format!(
                "transition matrix must be {}x{}",
                n, n
            )));
        }
        if initial
            .iter()
            .chain(transition.iter().flatten())
            .any(|p| !(0.0..=1.0).contains(p))
        {
            return Err(mismatch("probabilities must lie in [0, 1]".to_string()));
        }

        let log_transition = Array2::from_shape_fn((n, n), |(i, j)| transition[i][j].ln());

        Ok(Self {
            log_initial: initial.iter().map(|p| p.ln()).collect(),
            log_transition,
            emissions,
        })
    }

    pub fn num_states(&self) -> usize {
        self.emissions.len()
    }

    /// Free parameters: initial distribution, transition rows and emissions.
    pub fn parameter_count(&self) -> usize {
        let n = self.num_states();
        let emission_params: usize = self.emissions.iter().map(|e| e.parameter_count()).sum();
        (n - 1) + n * (n - 1) + emission_params
    }

    /// Viterbi decode constrained so the last bin ends in one of
    /// `allowable_endings` (all states when empty).
    ///
    /// Returns None for an empty matrix or when no legal path exists.
    pub fn decode(&self, features: &FeatureMatrix, allowable_endings: &[usize]) -> Option<DecodedPath> {
        let n = self.num_states();
        let t_len = features.num_bins();
        if t_len == 0 {
            return None;
        }

        // log emission likelihood for every (bin, state)
        let emission = Array2::from_shape_fn((t_len, n), |(t, s)| {
            self.emissions[s].log_probability(features.observation(t))
        });

        let mut delta = Array2::from_elem((t_len, n), f64::NEG_INFINITY);
        let mut psi = Array2::<usize>::zeros((t_len, n));

        for s in 0..n {
            delta[[0, s]] = self.log_initial[s] + emission[[0, s]];
        }

        for t in 1..t_len {
            for s in 0..n {
                let mut best_val = f64::NEG_INFINITY;
                let mut best_prev = 0;
                for prev in 0..n {
                    let candidate = delta[[t - 1, prev]] + self.log_transition[[prev, s]];
                    if candidate > best_val {
                        best_val = candidate;
                        best_prev = prev;
                    }
                }
                delta[[t, s]] = best_val + emission[[t, s]];
                psi[[t, s]] = best_prev;
            }
        }

        let last = t_len - 1;
        let mut best_final: Option<(usize, f64)> = None;
        for s in 0..n {
            if !allowable_endings.is_empty() && !allowable_endings.contains(&s) {
                continue;
            }
            let score = delta[[last, s]];
            if score == f64::NEG_INFINITY {
                continue;
            }
            if best_final.map_or(true, |(_, best)| score > best) {
                best_final = Some((s, score));
            }
        }
        let (final_state, log_likelihood) = best_final?;

        let mut path = vec![0; t_len];
        path[last] = final_state;
        for t in (1..t_len).rev() {
            path[t - 1] = psi[[t, path[t]]];
        }

        let k = self.parameter_count() as f64;
        let bic = -2.0 * log_likelihood + k * (t_len as f64).ln();

        Some(DecodedPath {
            path,
            log_likelihood,
            bic,
        })
    }
}

pub fn path_as_string(path: &[usize]) -> String {
    path.iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
