//! The optimization pipeline: rules, engine passes, scoring.
//!
//! `OptimizationService` strings the pieces together for one run. The
//! plan pass is soft-failing by design: upstream callers schedule it
//! speculatively, so an engine failure hands back the untouched
//! pre-plan state instead of an error. The optimize pass is the real
//! run and surfaces failures.

use thiserror::Error;

use crate::engine::{EngineError, EngineRegistry};
use crate::metrics::{InvalidTotalWeightOfMetrics, RouteOptimizationScoreCalculationService};
use crate::rules::RulesRegister;
use crate::state::{OptimizationState, OptimizationStatus};
use crate::traits::WeatherService;

/// Knobs for one optimization run.
#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    /// Upper bound on relaxation iterations while appointments remain
    /// unassigned.
    pub max_additional_iterations: usize,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            max_additional_iterations: 3,
        }
    }
}

#[derive(Debug, Error)]
pub enum OptimizationError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Metrics(#[from] InvalidTotalWeightOfMetrics),
}

/// Runs states through rules, the engine, post rules, and scoring.
pub struct OptimizationService {
    config: OptimizationConfig,
    engines: EngineRegistry,
    rules: RulesRegister,
    score_service: RouteOptimizationScoreCalculationService,
}

impl Default for OptimizationService {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimizationService {
    pub fn new() -> Self {
        Self {
            config: OptimizationConfig::default(),
            engines: EngineRegistry::standard(),
            rules: RulesRegister::standard(),
            score_service: RouteOptimizationScoreCalculationService::standard(),
        }
    }

    pub fn with_config(mut self, config: OptimizationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_engines(mut self, engines: EngineRegistry) -> Self {
        self.engines = engines;
        self
    }

    pub fn with_rules(mut self, rules: RulesRegister) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_score_service(mut self, score_service: RouteOptimizationScoreCalculationService) -> Self {
        self.score_service = score_service;
        self
    }

    /// Seeds routes from a pre-optimization state.
    ///
    /// Soft-failing: any engine problem returns the state exactly as it
    /// came in, still in the `Pre` stage, so the caller can retry or
    /// fall through to the optimize run later.
    pub fn plan(&self, state: OptimizationState) -> OptimizationState {
        let snapshot = state.clone();
        let engine = match self.engines.get(state.engine()) {
            Ok(engine) => engine,
            Err(error) => {
                tracing::warn!(error = %error, "plan pass aborted");
                return snapshot;
            }
        };
        let mut state = state;
        for rule in self.rules.general_plan_rules() {
            state.apply_rule(rule.as_ref());
        }
        match engine.plan(state) {
            Ok(mut planned) => {
                planned.set_status(OptimizationStatus::Plan);
                planned
            }
            Err(error) => {
                tracing::warn!(error = %error, "plan pass failed, keeping unplanned state");
                snapshot
            }
        }
    }

    /// Runs the full optimization: general rules, the engine, bounded
    /// relaxation while appointments remain unassigned, post rules, and
    /// finally scoring. Success leaves the state in the `Post` stage.
    pub fn optimize(
        &self,
        state: OptimizationState,
    ) -> Result<OptimizationState, OptimizationError> {
        let engine = self.engines.get(state.engine())?;

        let mut state = state;
        for rule in self.rules.general_optimization_rules() {
            state.apply_rule(rule.as_ref());
        }
        state = engine.optimize(state)?;

        let additional = self.rules.additional_optimization_rules();
        if !additional.is_empty() {
            for iteration in 0..self.config.max_additional_iterations {
                if !state.has_unassigned_appointments() {
                    break;
                }
                tracing::debug!(
                    iteration,
                    unassigned = state.unassigned_appointment_count(),
                    "relaxing constraints"
                );
                let upper = iteration.min(additional.len() - 1);
                for rule in &additional[..=upper] {
                    state.apply_rule(rule.as_ref());
                }
                state = engine.optimize(state)?;
            }
        }

        for rule in self.rules.post_optimization_rules() {
            state.apply_rule(rule.as_ref());
        }
        self.score_service.calculate(&mut state)?;
        state.set_status(OptimizationStatus::Post);
        Ok(state)
    }

    /// Looks up conditions around the day's work area and attaches them
    /// to the state. Failures are logged and swallowed: weather is an
    /// enrichment, never a reason to stop planning.
    pub fn attach_weather(&self, state: &mut OptimizationState, weather: &dyn WeatherService) {
        let Some(centroid) = state.area_central_point() else {
            return;
        };
        let date = state.time_window().start_at().date_naive();
        let lookup = weather.current_weather(state.office(), date, centroid);
        match lookup {
            Ok(info) => state.set_weather(Some(info)),
            Err(error) => {
                tracing::warn!(error = %error, "weather unavailable, continuing without conditions");
            }
        }
    }
}
