//! Post-hoc review of a zone's line items.
//!
//! Four independent checks run over the items: dependency, quantity,
//! exclusion and completeness. Every irregularity becomes a
//! [`ValidationIssue`]; nothing here fails hard.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::catalog::{CarrierSensitivity, ScopeCatalog};
use super::domain::{Zone, ZoneId};
use super::item::{SuggestedItem, ValidationStatus};
use super::metrics::{format_decimal, ZoneMetrics};
use super::quantity::QuantitySource;

pub const DEFAULT_QUANTITY_TOLERANCE: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl Severity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Info => "Info",
        }
    }
}

/// The check that raised an issue; declaration order is the run order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationCategory {
    Dependency,
    Quantity,
    Exclusion,
    Completeness,
}

impl ValidationCategory {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::Dependency,
            Self::Quantity,
            Self::Exclusion,
            Self::Completeness,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Dependency => "Dependency",
            Self::Quantity => "Quantity",
            Self::Exclusion => "Exclusion",
            Self::Completeness => "Completeness",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: ValidationCategory,
    pub code: String,
    pub message: String,
    /// Set on zone-level findings, which name no line item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<ZoneId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_item_code: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_item_codes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    fn new(
        severity: Severity,
        category: ValidationCategory,
        code: &str,
        message: String,
    ) -> Self {
        Self {
            severity,
            category,
            code: code.to_string(),
            message,
            zone_id: None,
            line_item_code: None,
            related_item_codes: Vec::new(),
            suggestion: None,
        }
    }

    fn for_item(mut self, code: &str) -> Self {
        self.line_item_code = Some(code.to_string());
        self
    }

    fn related(mut self, code: &str) -> Self {
        self.related_item_codes.push(code.to_string());
        self
    }

    fn suggest(mut self, suggestion: String) -> Self {
        self.suggestion = Some(suggestion);
        self
    }

    /// True when the issue names the item directly or as a related item.
    pub fn concerns(&self, code: &str) -> bool {
        self.line_item_code.as_deref() == Some(code)
            || self.related_item_codes.iter().any(|related| related == code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckSummary {
    pub category: ValidationCategory,
    pub passed: bool,
    pub issue_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub is_valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub issues: Vec<ValidationIssue>,
    pub checks: Vec<CheckSummary>,
}

impl ValidationResult {
    fn from_issues(mut issues: Vec<ValidationIssue>) -> Self {
        issues.sort_by_key(|issue| (issue.severity, issue.category));

        let count = |severity: Severity| {
            issues
                .iter()
                .filter(|issue| issue.severity == severity)
                .count()
        };
        let error_count = count(Severity::Error);
        let warning_count = count(Severity::Warning);
        let info_count = count(Severity::Info);

        let checks = ValidationCategory::ordered()
            .into_iter()
            .map(|category| {
                let issue_count = issues
                    .iter()
                    .filter(|issue| issue.category == category)
                    .count();
                CheckSummary {
                    category,
                    passed: issue_count == 0,
                    issue_count,
                }
            })
            .collect();

        Self {
            is_valid: error_count == 0,
            error_count,
            warning_count,
            info_count,
            issues,
            checks,
        }
    }

    pub fn issues_for<'a>(&'a self, code: &'a str) -> impl Iterator<Item = &'a ValidationIssue> + 'a {
        self.issues.iter().filter(move |issue| issue.concerns(code))
    }

    /// Writes each item's status from the worst issue that concerns it.
    pub fn apply_statuses(&self, items: &mut [SuggestedItem]) {
        for item in items.iter_mut() {
            let worst = self.issues_for(&item.code).map(|issue| issue.severity).min();
            item.validation_status = match worst {
                Some(Severity::Error) => ValidationStatus::Error,
                Some(Severity::Warning) => ValidationStatus::Warning,
                Some(Severity::Info) | None => ValidationStatus::Valid,
            };
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationOptions {
    quantity_tolerance: f64,
    escalate_high_sensitivity: bool,
}

impl ValidationOptions {
    /// Tolerances at or below 1.0 fall back to the default.
    pub fn new(quantity_tolerance: f64) -> Self {
        let sanitized = if quantity_tolerance.is_finite() && quantity_tolerance > 1.0 {
            quantity_tolerance
        } else {
            DEFAULT_QUANTITY_TOLERANCE
        };
        Self {
            quantity_tolerance: sanitized,
            escalate_high_sensitivity: true,
        }
    }

    /// Keeps quantity findings on high-sensitivity items at warning level.
    pub fn without_escalation(mut self) -> Self {
        self.escalate_high_sensitivity = false;
        self
    }

    pub fn quantity_tolerance(&self) -> f64 {
        self.quantity_tolerance
    }
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self::new(DEFAULT_QUANTITY_TOLERANCE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidationOptions,
}

impl Validator {
    pub fn new(options: ValidationOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ValidationOptions {
        &self.options
    }

    pub fn validate(
        &self,
        items: &[SuggestedItem],
        zone: &Zone,
        catalog: &ScopeCatalog,
    ) -> ValidationResult {
        let metrics = zone.metrics();
        let present: HashSet<&str> = items.iter().map(|item| item.code.as_str()).collect();

        let mut issues = Vec::new();
        check_dependencies(items, &present, catalog, &mut issues);
        self.check_quantities(items, &metrics, catalog, &mut issues);
        check_exclusions(items, catalog, &mut issues);
        check_completeness(items, zone, &metrics, catalog, &mut issues);

        for issue in issues
            .iter_mut()
            .filter(|issue| issue.line_item_code.is_none())
        {
            issue.zone_id = Some(zone.id.clone());
        }

        ValidationResult::from_issues(issues)
    }

    fn check_quantities(
        &self,
        items: &[SuggestedItem],
        metrics: &ZoneMetrics,
        catalog: &ScopeCatalog,
        issues: &mut Vec<ValidationIssue>,
    ) {
        if !metrics.has_dimensions() {
            return;
        }

        for item in items {
            let Some(rule) = catalog.get(&item.code) else {
                continue;
            };
            let severity = if self.options.escalate_high_sensitivity
                && rule.carrier_sensitivity == CarrierSensitivity::High
            {
                Severity::Error
            } else {
                Severity::Warning
            };

            if item.quantity <= 0.0 {
                issues.push(
                    ValidationIssue::new(
                        severity,
                        ValidationCategory::Quantity,
                        "QUANTITY_ZERO",
                        format!(
                            "{} has a zero quantity although the zone has dimensions",
                            item.code
                        ),
                    )
                    .for_item(&item.code)
                    .suggest("Confirm the measurement or remove the line item".to_string()),
                );
                continue;
            }

            let Some(bound) = rule.quantity_bound else {
                continue;
            };
            let factor = bound.factor.unwrap_or(self.options.quantity_tolerance);
            let metric = metrics.value(bound.metric);
            let limit = metric * factor;
            if item.quantity > limit + 1e-9 {
                issues.push(
                    ValidationIssue::new(
                        severity,
                        ValidationCategory::Quantity,
                        "QUANTITY_EXCEEDS_BOUND",
                        format!(
                            "{} quantity {} {} exceeds {} × {} ({} {})",
                            item.code,
                            format_decimal(item.quantity, 2),
                            item.unit,
                            format_decimal(factor, 2),
                            bound.metric,
                            format_decimal(limit, 2),
                            item.unit
                        ),
                    )
                    .for_item(&item.code)
                    .suggest(format!(
                        "Expected at most {} {} based on {}",
                        format_decimal(limit, 2),
                        item.unit,
                        metrics.describe(bound.metric)
                    )),
                );
            }
        }
    }
}

fn check_dependencies(
    items: &[SuggestedItem],
    present: &HashSet<&str>,
    catalog: &ScopeCatalog,
    issues: &mut Vec<ValidationIssue>,
) {
    for item in items {
        let Some(rule) = catalog.get(&item.code) else {
            issues.push(
                ValidationIssue::new(
                    Severity::Warning,
                    ValidationCategory::Dependency,
                    "UNKNOWN_LINE_ITEM",
                    format!("{} is not in the scope catalog", item.code),
                )
                .for_item(&item.code),
            );
            continue;
        };

        for required in &rule.requires {
            if present.contains(required.as_str()) {
                continue;
            }
            let description = catalog
                .get(required)
                .map(|rule| rule.description.as_str())
                .unwrap_or_default();
            issues.push(
                ValidationIssue::new(
                    Severity::Error,
                    ValidationCategory::Dependency,
                    "DEPENDENCY_MISSING",
                    format!(
                        "{} requires {} ({}), which is not in scope",
                        item.code, required, description
                    ),
                )
                .for_item(&item.code)
                .related(required)
                .suggest(format!("Add {required}")),
            );
        }

        if !item.is_auto_added {
            continue;
        }
        let trigger_present = item
            .added_by_item
            .as_deref()
            .is_some_and(|trigger| present.contains(trigger));
        let adoptable = items.iter().any(|other| {
            other.code != item.code
                && catalog
                    .get(&other.code)
                    .is_some_and(|other_rule| other_rule.auto_adds.contains(&item.code))
        });
        if !trigger_present && !adoptable {
            let message = match item.added_by_item.as_deref() {
                Some(trigger) => format!(
                    "{} was auto-added by {}, which is no longer in scope",
                    item.code, trigger
                ),
                None => format!("{} is marked auto-added but names no trigger", item.code),
            };
            let issue = ValidationIssue::new(
                Severity::Warning,
                ValidationCategory::Dependency,
                "AUTO_ADD_ORPHANED",
                message,
            )
            .for_item(&item.code);
            issues.push(match item.added_by_item.as_deref() {
                Some(trigger) => issue.related(trigger),
                None => issue,
            });
        }
    }
}

fn check_exclusions(items: &[SuggestedItem], catalog: &ScopeCatalog, issues: &mut Vec<ValidationIssue>) {
    let known: Vec<(&SuggestedItem, _)> = items
        .iter()
        .filter_map(|item| catalog.id_of(&item.code).map(|id| (item, id)))
        .collect();

    let mut reported = HashSet::new();
    for (index, (first, first_id)) in known.iter().enumerate() {
        for (second, second_id) in &known[index + 1..] {
            if first_id == second_id || !catalog.conflicts(*first_id, *second_id) {
                continue;
            }
            let pair = if first_id < second_id {
                (*first_id, *second_id)
            } else {
                (*second_id, *first_id)
            };
            if !reported.insert(pair) {
                continue;
            }
            issues.push(
                ValidationIssue::new(
                    Severity::Error,
                    ValidationCategory::Exclusion,
                    "EXCLUSION_CONFLICT",
                    format!(
                        "{} and {} are mutually exclusive",
                        first.code, second.code
                    ),
                )
                .for_item(&first.code)
                .related(&second.code)
                .suggest(format!("Remove either {} or {}", first.code, second.code)),
            );
        }
    }
}

fn check_completeness(
    items: &[SuggestedItem],
    zone: &Zone,
    metrics: &ZoneMetrics,
    catalog: &ScopeCatalog,
    issues: &mut Vec<ValidationIssue>,
) {
    if items.is_empty() {
        if zone.has_damage() {
            issues.push(
                ValidationIssue::new(
                    Severity::Info,
                    ValidationCategory::Completeness,
                    "NO_LINE_ITEMS",
                    format!(
                        "Damage is recorded for {} but no line items are scoped",
                        zone.display_name()
                    ),
                )
                .suggest("Review the damage characterization or add items manually".to_string()),
            );
        }
        return;
    }

    for surface in &zone.affected_surfaces {
        let covered = items.iter().any(|item| {
            catalog
                .get(&item.code)
                .is_some_and(|rule| rule.covers.contains(surface))
        });
        if !covered {
            let name = surface.label().to_ascii_lowercase();
            issues.push(
                ValidationIssue::new(
                    Severity::Info,
                    ValidationCategory::Completeness,
                    "SURFACE_NOT_SCOPED",
                    format!(
                        "{} damage noted but no {} line item present",
                        surface.label(),
                        name
                    ),
                )
                .suggest(format!("Add a line item addressing the {name}")),
            );
        }
    }

    let formula_items = items
        .iter()
        .any(|item| item.quantity_source == QuantitySource::Formula);
    if !metrics.has_dimensions() && formula_items {
        issues.push(
            ValidationIssue::new(
                Severity::Info,
                ValidationCategory::Completeness,
                "GEOMETRY_MISSING",
                format!(
                    "{} has no length and width; formula quantities evaluated to 0",
                    zone.display_name()
                ),
            )
            .suggest("Capture the zone dimensions".to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::catalog::Unit;
    use crate::scope::domain::{DamageType, Surface, ZoneType};

    fn catalog() -> ScopeCatalog {
        ScopeCatalog::standard().expect("standard catalog")
    }

    fn zone() -> Zone {
        let mut zone = Zone::new("bath", ZoneType::Room);
        zone.length_ft = Some(10.0);
        zone.width_ft = Some(10.0);
        zone.damage_type = Some(DamageType::Water);
        zone.affected_surfaces = [Surface::Floor].into_iter().collect();
        zone
    }

    fn item(code: &str, quantity: f64) -> SuggestedItem {
        let catalog = catalog();
        let unit = catalog.get(code).map(|rule| rule.unit).unwrap_or(Unit::Ea);
        SuggestedItem {
            code: code.to_string(),
            description: String::new(),
            category: String::new(),
            quantity,
            unit,
            quantity_source: QuantitySource::Formula,
            formula: None,
            explanation: String::new(),
            is_auto_added: false,
            added_by_item: None,
            carrier_sensitivity: CarrierSensitivity::Low,
            validation_status: ValidationStatus::Pending,
        }
    }

    fn codes(result: &ValidationResult) -> Vec<&str> {
        result.issues.iter().map(|issue| issue.code.as_str()).collect()
    }

    #[test]
    fn missing_requirement_is_an_error() {
        let mut dehu = item("DRY_DEHU", 3.0);
        dehu.is_auto_added = true;
        dehu.added_by_item = Some("DRY_SETUP".to_string());
        let result = Validator::default().validate(&[item("WTR_EXT_PORT", 100.0), dehu], &zone(), &catalog());

        assert!(!result.is_valid);
        assert_eq!(codes(&result), vec!["DEPENDENCY_MISSING", "AUTO_ADD_ORPHANED"]);
        assert_eq!(result.issues[0].related_item_codes, vec!["DRY_SETUP".to_string()]);
    }

    #[test]
    fn unknown_items_are_warnings() {
        let result = Validator::default().validate(
            &[item("WTR_EXT_PORT", 100.0), item("CUSTOM_1", 1.0)],
            &zone(),
            &catalog(),
        );
        assert!(result.is_valid);
        assert_eq!(codes(&result), vec!["UNKNOWN_LINE_ITEM"]);
    }

    #[test]
    fn rule_bound_factor_overrides_tolerance() {
        let result = Validator::default().validate(&[item("WTR_EXT_PORT", 116.0)], &zone(), &catalog());
        assert_eq!(codes(&result), vec!["QUANTITY_EXCEEDS_BOUND"]);
        assert_eq!(result.issues[0].severity, Severity::Warning);

        let within = Validator::default().validate(&[item("WTR_EXT_PORT", 115.0)], &zone(), &catalog());
        assert!(within.issues.is_empty());
    }

    #[test]
    fn high_sensitivity_findings_escalate_to_errors() {
        let truck = item("WTR_EXT_TRUCK", 0.0);
        let escalated = Validator::default().validate(std::slice::from_ref(&truck), &zone(), &catalog());
        assert_eq!(codes(&escalated), vec!["QUANTITY_ZERO"]);
        assert_eq!(escalated.issues[0].severity, Severity::Error);

        let relaxed = Validator::new(ValidationOptions::default().without_escalation()).validate(
            &[truck],
            &zone(),
            &catalog(),
        );
        assert_eq!(relaxed.issues[0].severity, Severity::Warning);
        assert!(relaxed.is_valid);
    }

    #[test]
    fn exclusion_conflicts_are_reported_once_per_pair() {
        let result = Validator::default().validate(
            &[item("WTR_EXT_PORT", 100.0), item("WTR_EXT_TRUCK", 100.0)],
            &zone(),
            &catalog(),
        );
        let conflicts: Vec<_> = result
            .issues
            .iter()
            .filter(|issue| issue.code == "EXCLUSION_CONFLICT")
            .collect();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].message, "WTR_EXT_PORT and WTR_EXT_TRUCK are mutually exclusive");
    }

    #[test]
    fn uncovered_surfaces_are_informational() {
        let mut zone = zone();
        zone.affected_surfaces.insert(Surface::Cabinet);
        let result = Validator::default().validate(&[item("WTR_EXT_PORT", 100.0)], &zone, &catalog());
        assert!(result.is_valid);
        assert_eq!(result.info_count, 1);
        assert_eq!(
            result.issues[0].message,
            "Cabinet damage noted but no cabinet line item present"
        );
    }

    #[test]
    fn zone_level_issues_reference_the_zone() {
        let mut zone = zone();
        zone.affected_surfaces.insert(Surface::Cabinet);
        let result = Validator::default().validate(&[item("DRY_SETUP", 1.0)], &zone, &catalog());

        let missing = result
            .issues
            .iter()
            .find(|issue| issue.code == "DEPENDENCY_MISSING")
            .expect("dependency issue");
        assert_eq!(missing.line_item_code.as_deref(), Some("DRY_SETUP"));
        assert!(missing.zone_id.is_none());

        let uncovered = result
            .issues
            .iter()
            .find(|issue| issue.code == "SURFACE_NOT_SCOPED")
            .expect("completeness issue");
        assert_eq!(uncovered.zone_id, Some(zone.id.clone()));
        let value = serde_json::to_value(uncovered).expect("serialize");
        assert_eq!(value["zoneId"], serde_json::json!("bath"));
    }

    #[test]
    fn damage_without_items_is_noted() {
        let result = Validator::default().validate(&[], &zone(), &catalog());
        assert_eq!(codes(&result), vec!["NO_LINE_ITEMS"]);
        assert!(result.is_valid);
    }

    #[test]
    fn missing_geometry_is_noted_for_formula_items() {
        let mut zone = zone();
        zone.length_ft = None;
        let result = Validator::default().validate(&[item("WTR_EXT_PORT", 0.0)], &zone, &catalog());
        assert_eq!(codes(&result), vec!["GEOMETRY_MISSING"]);
    }

    #[test]
    fn issues_rank_by_severity_then_check() {
        let mut zone = zone();
        zone.affected_surfaces.insert(Surface::Ceiling);
        let result = Validator::default().validate(
            &[
                item("CUSTOM_1", 1.0),
                item("WTR_EXT_PORT", 500.0),
                item("WTR_EXT_TRUCK", 100.0),
            ],
            &zone,
            &catalog(),
        );
        let severities: Vec<Severity> = result.issues.iter().map(|issue| issue.severity).collect();
        let mut sorted = severities.clone();
        sorted.sort();
        assert_eq!(severities, sorted);
        assert_eq!(result.issues[0].code, "EXCLUSION_CONFLICT");
        assert_eq!(result.issues.last().map(|issue| issue.code.as_str()), Some("SURFACE_NOT_SCOPED"));

        let dependency = &result.checks[0];
        assert_eq!(dependency.category, ValidationCategory::Dependency);
        assert!(!dependency.passed);
        assert_eq!(dependency.issue_count, 1);
    }

    #[test]
    fn statuses_follow_the_worst_issue() {
        let mut items = vec![
            item("WTR_EXT_PORT", 100.0),
            item("WTR_EXT_TRUCK", 100.0),
            item("WTR_MOIST_INSP", 1.0),
        ];
        let result = Validator::default().validate(&items, &zone(), &catalog());
        result.apply_statuses(&mut items);
        assert_eq!(items[0].validation_status, ValidationStatus::Error);
        assert_eq!(items[1].validation_status, ValidationStatus::Error);
        assert_eq!(items[2].validation_status, ValidationStatus::Valid);
    }

    #[test]
    fn tolerance_below_one_falls_back_to_default() {
        assert_eq!(ValidationOptions::new(0.8).quantity_tolerance(), DEFAULT_QUANTITY_TOLERANCE);
        assert_eq!(ValidationOptions::new(1.5).quantity_tolerance(), 1.5);
    }
}
