use serde::{Deserialize, Deserializer, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::{BoundDefinition, CarrierSensitivity, CatalogError, RuleDefinition, ScopeCatalog, Unit};
use crate::scope::domain::Surface;
use crate::scope::matcher::MatchCondition;

/// JSON catalog document: `{ "version": "...", "rules": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub rules: Vec<RuleDefinition>,
}

pub struct CatalogLoader;

impl CatalogLoader {
    /// Loads a catalog file, picking the format from its extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ScopeCatalog, CatalogError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("json") => Self::from_json_path(path),
            Some("csv") => Self::from_csv_path(path),
            _ => Err(CatalogError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<ScopeCatalog, CatalogError> {
        let file = File::open(path)?;
        Self::from_json_reader(file)
    }

    pub fn from_json_reader<R: Read>(reader: R) -> Result<ScopeCatalog, CatalogError> {
        let document: CatalogDocument = serde_json::from_reader(reader)?;
        tracing::debug!(
            version = document.version.as_deref().unwrap_or("unversioned"),
            rules = document.rules.len(),
            "parsed JSON catalog"
        );
        ScopeCatalog::new(document.rules)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<ScopeCatalog, CatalogError> {
        let file = File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// Reads a spreadsheet export with one rule per row.
    ///
    /// List columns separate codes and surfaces with `|`; the `conditions`
    /// column separates compact conditions with `;`.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<ScopeCatalog, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut definitions = Vec::new();

        for record in csv_reader.deserialize::<CatalogRow>() {
            let row = record?;
            definitions.push(row.into_definition()?);
        }

        tracing::debug!(rules = definitions.len(), "parsed CSV catalog");
        ScopeCatalog::new(definitions)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    code: String,
    description: String,
    unit: Unit,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    category: Option<String>,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    conditions: Option<String>,
    #[serde(default)]
    auto_add_only: Option<bool>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    quantity_formula: Option<String>,
    #[serde(default)]
    fixed_quantity: Option<f64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    auto_adds: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    excludes: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    replaces: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    replaced_by: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    requires: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    covers: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    bound_metric: Option<String>,
    #[serde(default)]
    bound_factor: Option<f64>,
    #[serde(default)]
    carrier_sensitivity: Option<CarrierSensitivity>,
}

impl CatalogRow {
    fn into_definition(self) -> Result<RuleDefinition, CatalogError> {
        let code = self.code;

        let conditions = split_list(self.conditions.as_deref(), ';')
            .into_iter()
            .map(|text| {
                text.parse::<MatchCondition>()
                    .map_err(|err| CatalogError::InvalidField {
                        code: code.clone(),
                        field: "condition",
                        value: err.condition,
                        reason: err.reason,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let covers = split_list(self.covers.as_deref(), '|')
            .into_iter()
            .map(|text| {
                Surface::parse(&text).ok_or_else(|| CatalogError::InvalidField {
                    code: code.clone(),
                    field: "covers",
                    value: text.clone(),
                    reason: "unknown surface".to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let quantity_bound = match (self.bound_metric, self.bound_factor) {
            (Some(metric), factor) => Some(BoundDefinition { metric, factor }),
            (None, Some(factor)) => {
                return Err(CatalogError::InvalidField {
                    code,
                    field: "bound_factor",
                    value: factor.to_string(),
                    reason: "bound_metric is required when a factor is given".to_string(),
                });
            }
            (None, None) => None,
        };

        Ok(RuleDefinition {
            description: self.description,
            unit: self.unit,
            category: self.category.unwrap_or_default(),
            priority: self.priority.unwrap_or_default(),
            conditions,
            auto_add_only: self.auto_add_only.unwrap_or(false),
            quantity_formula: self.quantity_formula,
            fixed_quantity: self.fixed_quantity,
            auto_adds: split_list(self.auto_adds.as_deref(), '|'),
            excludes: split_list(self.excludes.as_deref(), '|'),
            replaces: split_list(self.replaces.as_deref(), '|'),
            replaced_by: split_list(self.replaced_by.as_deref(), '|'),
            requires: split_list(self.requires.as_deref(), '|'),
            covers,
            quantity_bound,
            carrier_sensitivity: self.carrier_sensitivity.unwrap_or_default(),
            code,
        })
    }
}

fn split_list(value: Option<&str>, separator: char) -> Vec<String> {
    value
        .map(|text| {
            text.split(separator)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::catalog::QuantitySpec;
    use crate::scope::metrics::MetricAlias;

    const HEADER: &str = "code,description,unit,category,priority,conditions,auto_add_only,quantity_formula,fixed_quantity,auto_adds,excludes,replaces,replaced_by,requires,covers,bound_metric,bound_factor,carrier_sensitivity";

    #[test]
    fn reads_csv_rows_with_list_columns() {
        let csv = format!(
            "{HEADER}\n\
             WTR_EXT,Water extraction,SF,Water Mitigation,20,damage=water;surface=floor,false,FLOOR_SF,,WTR_INSP,,,,,floor,FLOOR_SF,1.15,medium\n\
             WTR_INSP,Moisture inspection,EA,Water Mitigation,,,true,,1,,,,,,,,,\n"
        );
        let catalog = CatalogLoader::from_csv_reader(csv.as_bytes()).expect("csv catalog");

        let extraction = catalog.get("WTR_EXT").expect("extraction rule");
        assert_eq!(extraction.priority, 20);
        assert_eq!(extraction.conditions.len(), 2);
        assert_eq!(extraction.auto_adds, vec!["WTR_INSP".to_string()]);
        assert_eq!(extraction.covers, vec![Surface::Floor]);
        assert_eq!(extraction.carrier_sensitivity, CarrierSensitivity::Medium);
        let bound = extraction.quantity_bound.expect("bound");
        assert_eq!(bound.metric, MetricAlias::FloorSf);
        assert_eq!(bound.factor, Some(1.15));

        let inspection = catalog.get("WTR_INSP").expect("inspection rule");
        assert!(inspection.auto_add_only);
        assert_eq!(inspection.quantity, QuantitySpec::Fixed(1.0));
    }

    #[test]
    fn csv_conditions_report_the_offending_rule() {
        let csv = format!("{HEADER}\nWTR_EXT,Water extraction,SF,,,damage=lava,,FLOOR_SF,,,,,,,,,,\n");
        let err = CatalogLoader::from_csv_reader(csv.as_bytes()).expect_err("bad condition");
        match err {
            CatalogError::InvalidField { code, field, value, .. } => {
                assert_eq!(code, "WTR_EXT");
                assert_eq!(field, "condition");
                assert_eq!(value, "damage=lava");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn reads_json_documents() {
        let json = r#"{
            "version": "2024.1",
            "rules": [
                {
                    "code": "RFG_TEAR_OFF",
                    "description": "Remove roofing",
                    "unit": "SQ",
                    "priority": 30,
                    "conditions": [
                        { "kind": "zone_type", "values": ["roof"] },
                        { "kind": "severity_at_least", "severity": "severe" }
                    ],
                    "quantityFormula": "ROOF_SQ",
                    "quantityBound": { "metric": "ROOF_SQ", "factor": 1.2 },
                    "carrierSensitivity": "high"
                }
            ]
        }"#;
        let catalog = CatalogLoader::from_json_reader(json.as_bytes()).expect("json catalog");
        let rule = catalog.get("RFG_TEAR_OFF").expect("tear-off rule");
        assert_eq!(rule.unit, Unit::Sq);
        assert_eq!(rule.carrier_sensitivity, CarrierSensitivity::High);
        assert!(matches!(rule.quantity, QuantitySpec::Formula(_)));
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = CatalogLoader::from_json_reader("{ \"rules\": [ {".as_bytes()).expect_err("bad json");
        assert!(matches!(err, CatalogError::Json(_)));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let err = CatalogLoader::from_path("catalog.xlsx").expect_err("unsupported");
        assert!(matches!(err, CatalogError::UnsupportedFormat(_)));
    }
}
