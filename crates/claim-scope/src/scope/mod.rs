//! Zone-driven line-item scoping.
//!
//! A [`Zone`] flows through metrics, rule matching, dependency resolution,
//! quantity evaluation and validation. [`ScopeEngine`] wires the stages
//! together over a shared, immutable [`ScopeCatalog`].

pub mod catalog;
pub mod domain;
pub mod engine;
pub mod formula;
pub mod item;
pub mod matcher;
pub mod metrics;
pub mod quantity;
pub mod resolver;
pub mod validation;

pub use catalog::{
    CarrierSensitivity, CatalogDocument, CatalogError, CatalogLoader, LineItemRule, RuleDefinition,
    RuleId, ScopeCatalog, Unit,
};
pub use domain::{
    DamageSeverity, DamageType, Opening, Subroom, Surface, WaterCategory, WaterClass, Zone,
    ZoneId, ZoneType,
};
pub use engine::{ScopeEngine, ScopeResult, ZoneAssessment};
pub use formula::{Formula, FormulaError};
pub use item::{SuggestedItem, ValidationStatus};
pub use matcher::{match_rules, MatchCondition};
pub use metrics::{compute_zone_metrics, MetricAlias, ZoneMetrics};
pub use quantity::{QuantityEvaluation, QuantitySource};
pub use resolver::{resolve, ExcludedItem, ExclusionKind, Resolution, ScopeError};
pub use validation::{
    Severity, ValidationCategory, ValidationIssue, ValidationOptions, ValidationResult, Validator,
};

pub const DEFAULT_MAX_RESOLVER_ITERATIONS: usize = 10_000;

/// Tunables shared by the resolver and validator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub quantity_tolerance: f64,
    pub max_resolver_iterations: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            quantity_tolerance: validation::DEFAULT_QUANTITY_TOLERANCE,
            max_resolver_iterations: DEFAULT_MAX_RESOLVER_ITERATIONS,
        }
    }
}
