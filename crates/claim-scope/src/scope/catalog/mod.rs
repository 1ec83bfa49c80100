//! Line-item rule catalog.
//!
//! Rules are authored externally as [`RuleDefinition`]s and compiled once into
//! a [`ScopeCatalog`]: an arena of [`LineItemRule`]s addressed by [`RuleId`],
//! with every relation resolved to ids and checked before the first zone is
//! scoped. A compiled catalog is never mutated and can be shared across
//! threads behind an `Arc`.

mod graph;
mod loader;
mod standard;

pub use loader::{CatalogDocument, CatalogLoader};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use super::domain::Surface;
use super::formula::{Formula, FormulaError};
use super::matcher::MatchCondition;
use super::metrics::{MetricAlias, UnknownMetricAlias};

/// Index of a rule inside its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) usize);

impl RuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unit {
    Sf,
    Lf,
    Sy,
    Sq,
    #[default]
    Ea,
    Hr,
    Day,
}

impl Unit {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Sf => "SF",
            Self::Lf => "LF",
            Self::Sy => "SY",
            Self::Sq => "SQ",
            Self::Ea => "EA",
            Self::Hr => "HR",
            Self::Day => "DAY",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Display-side hint for items that draw extra carrier scrutiny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CarrierSensitivity {
    #[default]
    Low,
    Medium,
    High,
}

impl CarrierSensitivity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// Upper bound on a plausible quantity: `metric × factor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityBound {
    pub metric: MetricAlias,
    /// Falls back to the validator's tolerance when absent.
    pub factor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuantitySpec {
    Formula(Formula),
    Fixed(f64),
}

/// Catalog entry as authored, before relations and formulas are checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleDefinition {
    pub code: String,
    pub description: String,
    pub unit: Unit,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub conditions: Vec<MatchCondition>,
    #[serde(default)]
    pub auto_add_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_quantity: Option<f64>,
    #[serde(default)]
    pub auto_adds: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
    #[serde(default)]
    pub replaces: Vec<String>,
    #[serde(default)]
    pub replaced_by: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub covers: Vec<Surface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_bound: Option<BoundDefinition>,
    #[serde(default)]
    pub carrier_sensitivity: CarrierSensitivity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundDefinition {
    pub metric: String,
    #[serde(default)]
    pub factor: Option<f64>,
}

/// A compiled catalog rule.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemRule {
    pub id: RuleId,
    pub code: String,
    pub description: String,
    pub unit: Unit,
    pub category: String,
    pub priority: i32,
    pub conditions: Vec<MatchCondition>,
    pub auto_add_only: bool,
    pub quantity: QuantitySpec,
    pub auto_adds: Vec<String>,
    pub excludes: Vec<String>,
    pub replaces: Vec<String>,
    /// Inverse of `replaces`, merged from both directions at load.
    pub replaced_by: Vec<String>,
    pub requires: Vec<String>,
    pub covers: Vec<Surface>,
    pub quantity_bound: Option<QuantityBound>,
    pub carrier_sensitivity: CarrierSensitivity,
}

impl LineItemRule {
    pub fn excludes_code(&self, code: &str) -> bool {
        self.excludes.iter().any(|excluded| excluded == code)
    }
}

/// Relations of a rule resolved to arena ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleEdges {
    pub auto_adds: Vec<RuleId>,
    pub excludes: Vec<RuleId>,
    pub replaces: Vec<RuleId>,
    pub replaced_by: Vec<RuleId>,
    pub requires: Vec<RuleId>,
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog contains no rules")]
    Empty,
    #[error("rule #{position} has an empty code")]
    EmptyCode { position: usize },
    #[error("duplicate rule code '{0}'")]
    DuplicateCode(String),
    #[error("rule '{code}' {relation} unknown code '{target}'")]
    UnknownReference {
        code: String,
        relation: &'static str,
        target: String,
    },
    #[error("rule '{code}' {relation} itself")]
    SelfReference { code: String, relation: &'static str },
    #[error("rule '{code}' both auto-adds and excludes '{target}'")]
    ContradictoryRelation { code: String, target: String },
    #[error("rule '{code}' declares neither a quantity formula nor a fixed quantity")]
    MissingQuantity { code: String },
    #[error("rule '{code}' declares both a quantity formula and a fixed quantity")]
    AmbiguousQuantity { code: String },
    #[error("rule '{code}' has an invalid fixed quantity {value}")]
    InvalidFixedQuantity { code: String, value: f64 },
    #[error("rule '{code}' formula '{formula}' is invalid: {source}")]
    Formula {
        code: String,
        formula: String,
        #[source]
        source: FormulaError,
    },
    #[error("rule '{code}' quantity bound is invalid: {source}")]
    BoundMetric {
        code: String,
        #[source]
        source: UnknownMetricAlias,
    },
    #[error("rule '{code}' quantity bound factor must be positive (got {factor})")]
    InvalidBoundFactor { code: String, factor: f64 },
    #[error("rule '{code}' has an invalid {field} entry '{value}': {reason}")]
    InvalidField {
        code: String,
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("{relation} cycle detected through rule '{code}'")]
    Cycle { relation: &'static str, code: String },
    #[error("unsupported catalog format for '{}' (expected .json or .csv)", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid catalog CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// Immutable, validated set of line-item rules.
#[derive(Debug, Clone)]
pub struct ScopeCatalog {
    rules: Vec<LineItemRule>,
    edges: Vec<RuleEdges>,
    index: HashMap<String, RuleId>,
}

impl ScopeCatalog {
    /// Compiles and validates rule definitions; declaration order is preserved.
    pub fn new(definitions: Vec<RuleDefinition>) -> Result<Self, CatalogError> {
        if definitions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut index = HashMap::with_capacity(definitions.len());
        for (position, definition) in definitions.iter().enumerate() {
            let code = definition.code.trim();
            if code.is_empty() {
                return Err(CatalogError::EmptyCode { position });
            }
            if index.insert(code.to_string(), RuleId(position)).is_some() {
                return Err(CatalogError::DuplicateCode(code.to_string()));
            }
        }

        let mut rules = definitions
            .into_iter()
            .enumerate()
            .map(|(position, definition)| compile_rule(RuleId(position), definition))
            .collect::<Result<Vec<_>, _>>()?;

        let mut edges = Vec::with_capacity(rules.len());
        for rule in &rules {
            edges.push(RuleEdges {
                auto_adds: resolve_codes(&index, rule, "auto-adds", &rule.auto_adds)?,
                excludes: resolve_codes(&index, rule, "excludes", &rule.excludes)?,
                replaces: resolve_codes(&index, rule, "replaces", &rule.replaces)?,
                replaced_by: resolve_codes(&index, rule, "is replaced by", &rule.replaced_by)?,
                requires: resolve_codes(&index, rule, "requires", &rule.requires)?,
            });
        }

        for (rule, rule_edges) in rules.iter().zip(&edges) {
            if let Some(target) = rule_edges
                .auto_adds
                .iter()
                .find(|target| rule_edges.excludes.contains(target))
            {
                return Err(CatalogError::ContradictoryRelation {
                    code: rule.code.clone(),
                    target: rules[target.0].code.clone(),
                });
            }
        }

        normalize_replacements(&mut rules, &mut edges);
        graph::reject_cycles(&rules, &edges)?;

        Ok(Self {
            rules,
            edges,
            index,
        })
    }

    /// Built-in reference catalog covering water, drying, roofing, smoke, and mold scope.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::new(standard::standard_rule_definitions()?)
    }

    pub fn rules(&self) -> &[LineItemRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rule(&self, id: RuleId) -> &LineItemRule {
        &self.rules[id.0]
    }

    pub fn edges(&self, id: RuleId) -> &RuleEdges {
        &self.edges[id.0]
    }

    pub fn id_of(&self, code: &str) -> Option<RuleId> {
        self.index.get(code).copied()
    }

    pub fn get(&self, code: &str) -> Option<&LineItemRule> {
        self.id_of(code).map(|id| self.rule(id))
    }

    /// True when either rule lists the other in its `excludes`.
    pub fn conflicts(&self, a: RuleId, b: RuleId) -> bool {
        self.edges(a).excludes.contains(&b) || self.edges(b).excludes.contains(&a)
    }
}

fn compile_rule(id: RuleId, definition: RuleDefinition) -> Result<LineItemRule, CatalogError> {
    let code = definition.code.trim().to_string();

    let quantity = match (definition.quantity_formula, definition.fixed_quantity) {
        (Some(formula), None) => QuantitySpec::Formula(Formula::parse(&formula).map_err(
            |source| CatalogError::Formula {
                code: code.clone(),
                formula: formula.clone(),
                source,
            },
        )?),
        (None, Some(value)) if value.is_finite() && value >= 0.0 => QuantitySpec::Fixed(value),
        (None, Some(value)) => {
            return Err(CatalogError::InvalidFixedQuantity { code, value });
        }
        (Some(_), Some(_)) => return Err(CatalogError::AmbiguousQuantity { code }),
        (None, None) => return Err(CatalogError::MissingQuantity { code }),
    };

    let quantity_bound = match definition.quantity_bound {
        Some(bound) => {
            let metric = bound
                .metric
                .parse::<MetricAlias>()
                .map_err(|source| CatalogError::BoundMetric {
                    code: code.clone(),
                    source,
                })?;
            if let Some(factor) = bound.factor {
                if !(factor.is_finite() && factor > 0.0) {
                    return Err(CatalogError::InvalidBoundFactor { code, factor });
                }
            }
            Some(QuantityBound {
                metric,
                factor: bound.factor,
            })
        }
        None => None,
    };

    for condition in &definition.conditions {
        condition
            .check()
            .map_err(|reason| CatalogError::InvalidField {
                code: code.clone(),
                field: "condition",
                value: condition.to_string(),
                reason,
            })?;
    }

    Ok(LineItemRule {
        id,
        code,
        description: definition.description,
        unit: definition.unit,
        category: definition.category,
        priority: definition.priority,
        conditions: definition.conditions,
        auto_add_only: definition.auto_add_only,
        quantity,
        auto_adds: trimmed(definition.auto_adds),
        excludes: trimmed(definition.excludes),
        replaces: trimmed(definition.replaces),
        replaced_by: trimmed(definition.replaced_by),
        requires: trimmed(definition.requires),
        covers: definition.covers,
        quantity_bound,
        carrier_sensitivity: definition.carrier_sensitivity,
    })
}

fn trimmed(codes: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    codes
        .into_iter()
        .map(|code| code.trim().to_string())
        .filter(|code| !code.is_empty() && seen.insert(code.clone()))
        .collect()
}

fn resolve_codes(
    index: &HashMap<String, RuleId>,
    rule: &LineItemRule,
    relation: &'static str,
    codes: &[String],
) -> Result<Vec<RuleId>, CatalogError> {
    codes
        .iter()
        .map(|target| {
            if *target == rule.code {
                return Err(CatalogError::SelfReference {
                    code: rule.code.clone(),
                    relation,
                });
            }
            index
                .get(target)
                .copied()
                .ok_or_else(|| CatalogError::UnknownReference {
                    code: rule.code.clone(),
                    relation,
                    target: target.clone(),
                })
        })
        .collect()
}

/// Mirrors `replaces` and `replacedBy` so both sides see the relation.
fn normalize_replacements(rules: &mut [LineItemRule], edges: &mut [RuleEdges]) {
    let mut pairs: Vec<(RuleId, RuleId)> = Vec::new();
    for (position, rule_edges) in edges.iter().enumerate() {
        let specific = RuleId(position);
        pairs.extend(rule_edges.replaces.iter().map(|generic| (*generic, specific)));
        pairs.extend(
            rule_edges
                .replaced_by
                .iter()
                .map(|superseding| (specific, *superseding)),
        );
    }

    for (generic, specific) in pairs {
        if !edges[generic.0].replaced_by.contains(&specific) {
            edges[generic.0].replaced_by.push(specific);
            let code = rules[specific.0].code.clone();
            rules[generic.0].replaced_by.push(code);
        }
        if !edges[specific.0].replaces.contains(&generic) {
            edges[specific.0].replaces.push(generic);
            let code = rules[generic.0].code.clone();
            rules[specific.0].replaces.push(code);
        }
    }
}
