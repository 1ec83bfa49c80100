use serde::{Deserialize, Serialize};

use super::catalog::{CarrierSensitivity, LineItemRule, Unit};
use super::quantity::{QuantityEvaluation, QuantitySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    #[default]
    Pending,
    Valid,
    Warning,
    Error,
}

impl ValidationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Valid => "Valid",
            Self::Warning => "Warning",
            Self::Error => "Error",
        }
    }
}

/// A line item proposed for a zone, with its quantity derivation.
///
/// Also the input shape for validating an estimate edited outside the
/// engine, so everything except `code`, `quantity` and `unit` is optional
/// on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedItem {
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    pub quantity: f64,
    pub unit: Unit,
    #[serde(default)]
    pub quantity_source: QuantitySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub is_auto_added: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_by_item: Option<String>,
    #[serde(default)]
    pub carrier_sensitivity: CarrierSensitivity,
    #[serde(default)]
    pub validation_status: ValidationStatus,
}

impl SuggestedItem {
    pub fn from_rule(
        rule: &LineItemRule,
        evaluation: QuantityEvaluation,
        added_by: Option<&LineItemRule>,
    ) -> Self {
        Self {
            code: rule.code.clone(),
            description: rule.description.clone(),
            category: rule.category.clone(),
            quantity: evaluation.quantity,
            unit: evaluation.unit,
            quantity_source: evaluation.source,
            formula: evaluation.formula,
            explanation: evaluation.explanation,
            is_auto_added: added_by.is_some(),
            added_by_item: added_by.map(|trigger| trigger.code.clone()),
            carrier_sensitivity: rule.carrier_sensitivity,
            validation_status: ValidationStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_payload_fills_defaults() {
        let item: SuggestedItem = serde_json::from_value(json!({
            "code": "WTR_EXT_PORT",
            "quantity": 168.0,
            "unit": "SF"
        }))
        .expect("minimal item");
        assert_eq!(item.validation_status, ValidationStatus::Pending);
        assert!(!item.is_auto_added);
        assert_eq!(item.carrier_sensitivity, CarrierSensitivity::Low);
    }

    #[test]
    fn serializes_with_camel_case_names() {
        let item = SuggestedItem {
            code: "DRY_DEHU".to_string(),
            description: "Dehumidifier".to_string(),
            category: "Drying Equipment".to_string(),
            quantity: 3.0,
            unit: Unit::Day,
            quantity_source: QuantitySource::Formula,
            formula: Some("MAX(3, CEIL(FLOOR_SF/500))".to_string()),
            explanation: String::new(),
            is_auto_added: true,
            added_by_item: Some("DRY_SETUP".to_string()),
            carrier_sensitivity: CarrierSensitivity::Medium,
            validation_status: ValidationStatus::Valid,
        };
        let value = serde_json::to_value(&item).expect("serialize");
        assert_eq!(value["isAutoAdded"], json!(true));
        assert_eq!(value["addedByItem"], json!("DRY_SETUP"));
        assert_eq!(value["validationStatus"], json!("valid"));
        assert_eq!(value["unit"], json!("DAY"));
    }
}
