use serde::{Deserialize, Serialize};

use super::catalog::{LineItemRule, QuantitySpec, Unit};
use super::metrics::{format_decimal, MetricAlias, ZoneMetrics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantitySource {
    #[default]
    Formula,
    Fixed,
}

/// A computed quantity together with the derivation shown to adjusters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityEvaluation {
    pub quantity: f64,
    pub unit: Unit,
    pub source: QuantitySource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    pub explanation: String,
}

pub fn metric_value(metrics: &ZoneMetrics, alias: MetricAlias) -> f64 {
    metrics.value(alias)
}

/// Evaluates a rule's quantity for a zone; clamped at zero, rounded to cents.
pub fn evaluate(rule: &LineItemRule, metrics: &ZoneMetrics) -> QuantityEvaluation {
    match &rule.quantity {
        QuantitySpec::Fixed(value) => {
            let quantity = round_quantity(*value);
            QuantityEvaluation {
                quantity,
                unit: rule.unit,
                source: QuantitySource::Fixed,
                formula: None,
                explanation: format!(
                    "Fixed quantity: {} {}",
                    format_decimal(quantity, 2),
                    rule.unit
                ),
            }
        }
        QuantitySpec::Formula(formula) => {
            let evaluation = formula.evaluate(metrics);
            let quantity = round_quantity(evaluation.value);

            let mut lines: Vec<String> = formula
                .aliases()
                .into_iter()
                .map(|alias| metrics.describe(alias))
                .collect();
            let result = if evaluation.value < 0.0 {
                format!(
                    "{} = {} (negative, floored at 0) = {} {}",
                    evaluation.substituted,
                    format_decimal(evaluation.value, 2),
                    format_decimal(quantity, 2),
                    rule.unit
                )
            } else {
                format!(
                    "{} = {} {}",
                    evaluation.substituted,
                    format_decimal(quantity, 2),
                    rule.unit
                )
            };
            lines.push(result);

            QuantityEvaluation {
                quantity,
                unit: rule.unit,
                source: QuantitySource::Formula,
                formula: Some(formula.source().to_string()),
                explanation: lines.join("; "),
            }
        }
    }
}

fn round_quantity(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::catalog::ScopeCatalog;
    use crate::scope::domain::{Opening, Zone, ZoneType};

    fn kitchen_metrics() -> ZoneMetrics {
        let mut zone = Zone::new("kitchen", ZoneType::Room);
        zone.length_ft = Some(12.0);
        zone.width_ft = Some(14.0);
        zone.height_ft = Some(9.0);
        zone.openings = vec![Opening::new(3.0, 7.0, 1), Opening::new(4.0, 5.5, 1)];
        zone.metrics()
    }

    fn standard() -> ScopeCatalog {
        ScopeCatalog::standard().expect("standard catalog")
    }

    #[test]
    fn dehumidifier_days_follow_the_floor_area() {
        let catalog = standard();
        let rule = catalog.get("DRY_DEHU").expect("dehumidifier rule");
        let evaluation = evaluate(rule, &kitchen_metrics());

        assert_eq!(evaluation.quantity, 3.0);
        assert_eq!(evaluation.unit, Unit::Day);
        assert_eq!(evaluation.source, QuantitySource::Formula);
        assert_eq!(
            evaluation.explanation,
            "Floor area: 12ft × 14ft = 168 SF; \
             MAX(3, CEIL(168/500)) × MAX(1, CEIL(168/1000)) = 3 DAY"
        );
    }

    #[test]
    fn fixed_quantities_explain_themselves() {
        let catalog = standard();
        let rule = catalog.get("WTR_MOIST_INSP").expect("inspection rule");
        let evaluation = evaluate(rule, &kitchen_metrics());
        assert_eq!(evaluation.quantity, 1.0);
        assert_eq!(evaluation.formula, None);
        assert_eq!(evaluation.explanation, "Fixed quantity: 1 EA");
    }

    #[test]
    fn aliases_are_explained_in_first_use_order() {
        let catalog = standard();
        let rule = catalog.get("WTR_ANTIMICROBIAL").expect("antimicrobial rule");
        let evaluation = evaluate(rule, &kitchen_metrics());
        assert_eq!(evaluation.quantity, 272.0);
        let explanation = evaluation.explanation;
        let floor = explanation.find("Floor area").expect("floor derivation");
        let perimeter = explanation.find("Perimeter").expect("perimeter derivation");
        assert!(floor < perimeter);
        assert!(explanation.ends_with("168 + 52 × 2 = 272 SF"));
    }

    #[test]
    fn quantities_are_rounded_and_never_negative() {
        assert_eq!(round_quantity(11.180339), 11.18);
        assert_eq!(round_quantity(-4.0), 0.0);
        assert_eq!(round_quantity(f64::NAN), 0.0);
    }

    #[test]
    fn negative_results_note_the_floor() {
        let rule = ScopeCatalog::new(vec![crate::scope::catalog::RuleDefinition {
            code: "NEG".to_string(),
            unit: Unit::Lf,
            quantity_formula: Some("PERIMETER_LF - 100".to_string()),
            ..Default::default()
        }])
        .expect("catalog");
        let evaluation = evaluate(&rule.rules()[0], &kitchen_metrics());
        assert_eq!(evaluation.quantity, 0.0);
        assert!(evaluation
            .explanation
            .ends_with("52 - 100 = -48 (negative, floored at 0) = 0 LF"));
    }

    #[test]
    fn metric_value_reads_the_alias() {
        let metrics = kitchen_metrics();
        assert_eq!(metric_value(&metrics, MetricAlias::WallSfNet), 425.0);
        assert_eq!(metric_value(&metrics, MetricAlias::PitchMult), 1.0);
    }
}
