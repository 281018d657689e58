//! Engine abstraction: the pluggable algorithm behind the pipeline.
//!
//! The pipeline asks an engine for two passes. `plan` seeds routes from
//! a pre-optimization state and is allowed to fail softly upstream;
//! `optimize` refines an already planned state. Engines are registered
//! by identifier so a request can select one ("insertion" today) without
//! the caller linking against a concrete type.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::state::OptimizationState;

/// Engine failures surfaced to the pipeline.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("no optimization engine registered under '{0}'")]
    UnknownEngine(String),
    #[error("optimization failed: {0}")]
    Failed(String),
}

/// A routing algorithm that can seed and refine daily routes.
///
/// Both passes take the state by value and hand back the transformed
/// state, so a failed pass cannot leave a half-mutated state behind.
pub trait RouteOptimizationService: Send + Sync {
    /// Identifier requests use to select this engine.
    fn id(&self) -> &str;

    /// Seed routes from an unplanned state.
    fn plan(&self, state: OptimizationState) -> Result<OptimizationState, EngineError>;

    /// Refine a planned state, trying to place remaining unassigned work.
    fn optimize(&self, state: OptimizationState) -> Result<OptimizationState, EngineError>;
}

impl std::fmt::Debug for dyn RouteOptimizationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOptimizationService")
            .field("id", &self.id())
            .finish()
    }
}

/// Engines known to this process, keyed by [`RouteOptimizationService::id`].
#[derive(Default)]
pub struct EngineRegistry {
    engines: HashMap<String, Arc<dyn RouteOptimizationService>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the stock insertion engine over straight-line travel.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::insertion::InsertionEngine::with_defaults()));
        registry
    }

    /// Later registrations under the same id replace earlier ones.
    pub fn register(&mut self, engine: Arc<dyn RouteOptimizationService>) {
        self.engines.insert(engine.id().to_string(), engine);
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn RouteOptimizationService>, EngineError> {
        self.engines
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownEngine(id.to_string()))
    }

    pub fn ids(&self) -> Vec<&str> {
        self.engines.keys().map(String::as_str).collect()
    }
}
