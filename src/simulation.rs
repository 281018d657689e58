//! What-if runs: score several parameter variants against copies of one
//! state and pick the most promising.
//!
//! Each variant optimizes its own deep copy, so the base state never
//! changes and variants never see each other. Copies are flagged as
//! simulation runs so downstream persistence can tell them apart from
//! the real optimization of the day.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::pipeline::{OptimizationError, OptimizationService};
use crate::score::{MetricKey, Score};
use crate::state::{OptimizationParams, OptimizationState};

/// One parameter set to try, under a human-readable label.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationVariant {
    pub label: String,
    pub params: OptimizationParams,
}

impl SimulationVariant {
    pub fn new(label: impl Into<String>, params: OptimizationParams) -> Self {
        Self {
            label: label.into(),
            params,
        }
    }
}

/// Scored result of one variant's run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub label: String,
    pub average_scores: BTreeMap<MetricKey, Score>,
    pub unassigned_count: usize,
    pub state: OptimizationState,
}

impl SimulationOutcome {
    /// Average optimization score, when the run produced one.
    pub fn optimization_score(&self) -> Option<f64> {
        self.average_scores
            .get(&MetricKey::OptimizationScore)
            .map(|score| score.value())
    }
}

/// The outcome with the best average optimization score. Unscored
/// outcomes lose to any scored one; ties keep the earlier variant.
pub fn best(outcomes: &[SimulationOutcome]) -> Option<&SimulationOutcome> {
    let mut best: Option<&SimulationOutcome> = None;
    for outcome in outcomes {
        let challenger = outcome.optimization_score().unwrap_or(f64::NEG_INFINITY);
        let incumbent = best
            .and_then(|current| current.optimization_score())
            .unwrap_or(f64::NEG_INFINITY);
        if best.is_none() || challenger > incumbent {
            best = Some(outcome);
        }
    }
    best
}

/// Runs the optimization pipeline once per variant against throwaway
/// copies of a base state.
pub struct SimulationService {
    pipeline: OptimizationService,
}

impl Default for SimulationService {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationService {
    pub fn new() -> Self {
        Self {
            pipeline: OptimizationService::new(),
        }
    }

    pub fn with_pipeline(pipeline: OptimizationService) -> Self {
        Self { pipeline }
    }

    /// Optimizes one copy of `base` per variant, in parallel.
    ///
    /// Outcomes come back in variant order. A failed variant fails the
    /// whole run; partial results are not worth reporting when the
    /// variants were meant to be compared against each other.
    pub fn run(
        &self,
        base: &OptimizationState,
        variants: Vec<SimulationVariant>,
    ) -> Result<Vec<SimulationOutcome>, OptimizationError> {
        variants
            .into_par_iter()
            .map(|variant| {
                let mut state = base.clone();
                *state.params_mut() = variant.params;
                state.params_mut().simulation_run = true;
                let state = self.pipeline.optimize(state)?;
                Ok(SimulationOutcome {
                    label: variant.label,
                    average_scores: state.average_scores(),
                    unassigned_count: state.unassigned_appointments().len(),
                    state,
                })
            })
            .collect()
    }
}
