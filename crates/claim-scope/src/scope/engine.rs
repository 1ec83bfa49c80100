use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::catalog::ScopeCatalog;
use super::domain::{Zone, ZoneId, ZoneType};
use super::item::SuggestedItem;
use super::matcher::match_rules;
use super::metrics::{ZoneMetrics, DEFAULT_HEIGHT_FT};
use super::quantity;
use super::resolver::{resolve, ExcludedItem, ScopeError};
use super::validation::{ValidationOptions, ValidationResult, Validator};
use super::EngineSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeResult {
    pub zone_id: ZoneId,
    pub metrics: ZoneMetrics,
    pub suggested_items: Vec<SuggestedItem>,
    pub excluded_items: Vec<ExcludedItem>,
    pub warnings: Vec<String>,
}

/// Scope plus validation for one zone, with item statuses applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoneAssessment {
    #[serde(flatten)]
    pub scope: ScopeResult,
    pub validation: ValidationResult,
}

/// Runs zones through metrics, matching, resolution, quantities and validation.
///
/// Cheap to clone; the catalog is shared read-only.
#[derive(Debug, Clone)]
pub struct ScopeEngine {
    catalog: Arc<ScopeCatalog>,
    settings: EngineSettings,
    validator: Validator,
}

impl ScopeEngine {
    pub fn new(catalog: Arc<ScopeCatalog>, settings: EngineSettings) -> Self {
        let validator = Validator::new(ValidationOptions::new(settings.quantity_tolerance));
        Self {
            catalog,
            settings,
            validator,
        }
    }

    pub fn catalog(&self) -> &ScopeCatalog {
        &self.catalog
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn metrics(&self, zone: &Zone) -> ZoneMetrics {
        zone.metrics()
    }

    pub fn scope(&self, zone: &Zone) -> Result<ScopeResult, ScopeError> {
        let catalog = self.catalog.as_ref();
        let metrics = zone.metrics();
        let candidates = match_rules(zone, catalog);
        let resolution = resolve(&candidates, catalog, self.settings.max_resolver_iterations)?;

        let suggested_items: Vec<SuggestedItem> = resolution
            .items
            .iter()
            .map(|item| {
                let rule = catalog.rule(item.rule);
                let trigger = item.added_by.map(|trigger| catalog.rule(trigger));
                SuggestedItem::from_rule(rule, quantity::evaluate(rule, &metrics), trigger)
            })
            .collect();

        let mut warnings = Vec::new();
        if !metrics.has_dimensions() {
            warnings.push(
                "Zone length and width are missing; geometry-based quantities are 0".to_string(),
            );
        } else if metrics.default_height_used && zone.zone_type != ZoneType::Roof {
            warnings.push(format!(
                "Ceiling height not recorded; assumed {DEFAULT_HEIGHT_FT} ft"
            ));
        }
        if candidates.is_empty() {
            warnings.push("No catalog rules match this zone's damage profile".to_string());
        }

        info!(
            zone = %zone.id,
            matched = candidates.len(),
            items = suggested_items.len(),
            excluded = resolution.excluded.len(),
            "zone scoped"
        );

        Ok(ScopeResult {
            zone_id: zone.id.clone(),
            metrics,
            suggested_items,
            excluded_items: resolution.excluded,
            warnings,
        })
    }

    pub fn validate(&self, items: &[SuggestedItem], zone: &Zone) -> ValidationResult {
        self.validator.validate(items, zone, &self.catalog)
    }

    pub fn assess(&self, zone: &Zone) -> Result<ZoneAssessment, ScopeError> {
        let mut scope = self.scope(zone)?;
        let validation = self.validate(&scope.suggested_items, zone);
        validation.apply_statuses(&mut scope.suggested_items);

        info!(
            zone = %zone.id,
            valid = validation.is_valid,
            errors = validation.error_count,
            warnings = validation.warning_count,
            info = validation.info_count,
            "zone assessed"
        );

        Ok(ZoneAssessment { scope, validation })
    }

    /// Assesses zones in parallel; results keep the input order.
    pub fn assess_all(&self, zones: &[Zone]) -> Vec<Result<ZoneAssessment, ScopeError>> {
        zones.par_iter().map(|zone| self.assess(zone)).collect()
    }
}
