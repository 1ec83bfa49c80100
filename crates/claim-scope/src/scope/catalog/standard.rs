use super::{BoundDefinition, CarrierSensitivity, CatalogError, RuleDefinition, Unit};
use crate::scope::domain::Surface;
use crate::scope::matcher::MatchCondition;

const WATER: &str = "Water Mitigation";
const DRYING: &str = "Drying Equipment";
const DRYWALL: &str = "Drywall";
const CABINETRY: &str = "Cabinetry";
const ROOFING: &str = "Roofing";
const CLEANING: &str = "Cleaning";
const MOLD: &str = "Mold Remediation";

pub(super) fn standard_rule_definitions() -> Result<Vec<RuleDefinition>, CatalogError> {
    Ok(vec![
        RuleDefinition {
            code: "WTR_EXT_PORT".into(),
            description: "Water extraction from floor - portable extractor".into(),
            unit: Unit::Sf,
            category: WATER.into(),
            priority: 20,
            conditions: conditions("WTR_EXT_PORT", &["damage=water", "surface=floor"])?,
            quantity_formula: Some("FLOOR_SF".into()),
            auto_adds: codes(&["WTR_MOIST_INSP", "DRY_SETUP"]),
            excludes: codes(&["WTR_EXT_TRUCK"]),
            covers: vec![Surface::Floor],
            quantity_bound: bound("FLOOR_SF", Some(1.15)),
            carrier_sensitivity: CarrierSensitivity::Medium,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_EXT_TRUCK".into(),
            description: "Water extraction from floor - truck-mounted unit".into(),
            unit: Unit::Sf,
            category: WATER.into(),
            priority: 10,
            conditions: conditions(
                "WTR_EXT_TRUCK",
                &["damage=water", "surface=floor", "category=2-3"],
            )?,
            quantity_formula: Some("FLOOR_SF".into()),
            auto_adds: codes(&["WTR_MOIST_INSP", "DRY_SETUP"]),
            excludes: codes(&["WTR_EXT_PORT"]),
            covers: vec![Surface::Floor],
            quantity_bound: bound("FLOOR_SF", Some(1.15)),
            carrier_sensitivity: CarrierSensitivity::High,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_MOIST_INSP".into(),
            description: "Moisture inspection and mapping".into(),
            unit: Unit::Ea,
            category: WATER.into(),
            auto_add_only: true,
            fixed_quantity: Some(1.0),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "DRY_SETUP".into(),
            description: "Drying equipment setup, monitoring and takedown".into(),
            unit: Unit::Ea,
            category: DRYING.into(),
            auto_add_only: true,
            fixed_quantity: Some(1.0),
            auto_adds: codes(&["DRY_DEHU", "DRY_AIRM"]),
            requires: codes(&["WTR_MOIST_INSP"]),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "DRY_DEHU".into(),
            description: "Dehumidifier - large (per 24 hour period)".into(),
            unit: Unit::Day,
            category: DRYING.into(),
            auto_add_only: true,
            quantity_formula: Some("MAX(3, CEIL(FLOOR_SF/500)) * MAX(1, CEIL(FLOOR_SF/1000))".into()),
            requires: codes(&["DRY_SETUP"]),
            carrier_sensitivity: CarrierSensitivity::Medium,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "DRY_AIRM".into(),
            description: "Air mover (per 24 hour period)".into(),
            unit: Unit::Day,
            category: DRYING.into(),
            auto_add_only: true,
            quantity_formula: Some("MAX(3, CEIL(FLOOR_SF/70)) * 3".into()),
            requires: codes(&["DRY_SETUP"]),
            carrier_sensitivity: CarrierSensitivity::Medium,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_BASE_RMV".into(),
            description: "Remove baseboard - water damaged".into(),
            unit: Unit::Lf,
            category: WATER.into(),
            conditions: conditions("WTR_BASE_RMV", &["damage=water", "surface=baseboard"])?,
            quantity_formula: Some("PERIMETER_LF".into()),
            covers: vec![Surface::Baseboard],
            quantity_bound: bound("PERIMETER_LF", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_FLOOD_CUT".into(),
            description: "Flood cut drywall - 2 ft above floor line".into(),
            unit: Unit::Sf,
            category: DRYWALL.into(),
            conditions: conditions(
                "WTR_FLOOD_CUT",
                &["damage=water", "surface=wall", "category=2-3"],
            )?,
            quantity_formula: Some("PERIMETER_LF * 2".into()),
            replaces: codes(&["WTR_DRYWALL_DRY"]),
            covers: vec![Surface::Wall],
            quantity_bound: bound("WALL_SF_NET", None),
            carrier_sensitivity: CarrierSensitivity::Medium,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_DRYWALL_DRY".into(),
            description: "Drywall - dry in place with wall cavity drying".into(),
            unit: Unit::Sf,
            category: DRYWALL.into(),
            conditions: conditions("WTR_DRYWALL_DRY", &["damage=water", "surface=wall"])?,
            quantity_formula: Some("WALL_SF_NET".into()),
            covers: vec![Surface::Wall],
            quantity_bound: bound("WALL_SF_NET", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_ANTIMICROBIAL".into(),
            description: "Apply antimicrobial agent to affected areas".into(),
            unit: Unit::Sf,
            category: WATER.into(),
            conditions: conditions("WTR_ANTIMICROBIAL", &["damage=water", "category>=2"])?,
            quantity_formula: Some("FLOOR_SF + PERIMETER_LF * 2".into()),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_CAT3_PPE".into(),
            description: "Personal protective equipment - category 3 water".into(),
            unit: Unit::Ea,
            category: WATER.into(),
            conditions: conditions("WTR_CAT3_PPE", &["damage=water", "category=3"])?,
            fixed_quantity: Some(1.0),
            carrier_sensitivity: CarrierSensitivity::Medium,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_CAB_DETACH".into(),
            description: "Detach and reset lower cabinetry".into(),
            unit: Unit::Lf,
            category: CABINETRY.into(),
            conditions: conditions(
                "WTR_CAB_DETACH",
                &["damage=water", "surface=cabinet|countertop", "severity>=severe"],
            )?,
            quantity_formula: Some("CEIL(PERIMETER_LF / 4)".into()),
            covers: vec![Surface::Cabinet, Surface::Countertop],
            quantity_bound: bound("PERIMETER_LF", None),
            carrier_sensitivity: CarrierSensitivity::High,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_CEIL_RMV".into(),
            description: "Remove wet ceiling drywall".into(),
            unit: Unit::Sf,
            category: DRYWALL.into(),
            conditions: conditions(
                "WTR_CEIL_RMV",
                &["damage=water", "surface=ceiling", "severity>=moderate"],
            )?,
            quantity_formula: Some("CEIL_SF".into()),
            covers: vec![Surface::Ceiling],
            quantity_bound: bound("CEIL_SF", None),
            carrier_sensitivity: CarrierSensitivity::High,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "WTR_INSUL_RMV".into(),
            description: "Remove wet insulation".into(),
            unit: Unit::Sf,
            category: DRYWALL.into(),
            conditions: conditions("WTR_INSUL_RMV", &["damage=water", "surface=insulation"])?,
            quantity_formula: Some("CEIL_SF".into()),
            covers: vec![Surface::Insulation],
            quantity_bound: bound("CEIL_SF", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "RFG_TEAR_OFF".into(),
            description: "Tear off composition shingle roofing".into(),
            unit: Unit::Sq,
            category: ROOFING.into(),
            priority: 30,
            conditions: conditions(
                "RFG_TEAR_OFF",
                &["zone=roof", "damage=wind|hail", "severity>=severe", "surface=roof"],
            )?,
            quantity_formula: Some("ROOF_SQ".into()),
            auto_adds: codes(&["RFG_SHINGLE", "RFG_DRIP_EDGE"]),
            excludes: codes(&["RFG_REPAIR"]),
            covers: vec![Surface::Roof],
            quantity_bound: bound("ROOF_SQ", None),
            carrier_sensitivity: CarrierSensitivity::High,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "RFG_SHINGLE".into(),
            description: "Laminated composition shingles - incl. 10% waste".into(),
            unit: Unit::Sq,
            category: ROOFING.into(),
            auto_add_only: true,
            quantity_formula: Some("CEIL(ROOF_SQ * 1.1)".into()),
            auto_adds: codes(&["RFG_FELT"]),
            requires: codes(&["RFG_TEAR_OFF"]),
            covers: vec![Surface::Roof],
            quantity_bound: bound("ROOF_SQ", None),
            carrier_sensitivity: CarrierSensitivity::High,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "RFG_FELT".into(),
            description: "Roofing felt - 15 lb".into(),
            unit: Unit::Sq,
            category: ROOFING.into(),
            auto_add_only: true,
            quantity_formula: Some("ROOF_SQ".into()),
            quantity_bound: bound("ROOF_SQ", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "RFG_DRIP_EDGE".into(),
            description: "Drip edge".into(),
            unit: Unit::Lf,
            category: ROOFING.into(),
            auto_add_only: true,
            quantity_formula: Some("PERIMETER_LF".into()),
            quantity_bound: bound("PERIMETER_LF", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "RFG_REPAIR".into(),
            description: "Roof repair - replace damaged shingles".into(),
            unit: Unit::Sq,
            category: ROOFING.into(),
            priority: 5,
            conditions: conditions("RFG_REPAIR", &["zone=roof", "damage=wind|hail", "surface=roof"])?,
            quantity_formula: Some("MAX(1, CEIL(ROOF_SQ * 0.1))".into()),
            covers: vec![Surface::Roof],
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "RFG_GUTTER".into(),
            description: "Detach and reset gutters".into(),
            unit: Unit::Lf,
            category: ROOFING.into(),
            conditions: conditions("RFG_GUTTER", &["zone=roof", "surface=gutter"])?,
            quantity_formula: Some("PERIMETER_LF / 2".into()),
            covers: vec![Surface::Gutter],
            quantity_bound: bound("PERIMETER_LF", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "CLN_SMOKE_WALL".into(),
            description: "Clean walls - smoke and soot".into(),
            unit: Unit::Sf,
            category: CLEANING.into(),
            conditions: conditions("CLN_SMOKE_WALL", &["damage=smoke|fire", "surface=wall"])?,
            quantity_formula: Some("WALL_SF_NET".into()),
            covers: vec![Surface::Wall],
            quantity_bound: bound("WALL_SF_NET", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "CLN_SMOKE_CEIL".into(),
            description: "Clean ceiling - smoke and soot".into(),
            unit: Unit::Sf,
            category: CLEANING.into(),
            conditions: conditions("CLN_SMOKE_CEIL", &["damage=smoke|fire", "surface=ceiling"])?,
            quantity_formula: Some("CEIL_SF".into()),
            covers: vec![Surface::Ceiling],
            quantity_bound: bound("CEIL_SF", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "CLN_DEODORIZE".into(),
            description: "Deodorize - thermal fogging".into(),
            unit: Unit::Sf,
            category: CLEANING.into(),
            conditions: conditions("CLN_DEODORIZE", &["damage=smoke|fire"])?,
            quantity_formula: Some("FLOOR_SF".into()),
            quantity_bound: bound("FLOOR_SF", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "CLN_SEAL".into(),
            description: "Seal with stain-blocking primer".into(),
            unit: Unit::Sf,
            category: CLEANING.into(),
            conditions: conditions("CLN_SEAL", &["damage=fire", "severity>=moderate"])?,
            quantity_formula: Some("WALL_SF_NET + CEIL_SF".into()),
            carrier_sensitivity: CarrierSensitivity::Medium,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "MLD_CONTAIN".into(),
            description: "Mold containment - poly barrier and negative air".into(),
            unit: Unit::Sf,
            category: MOLD.into(),
            auto_add_only: true,
            quantity_formula: Some("PERIMETER_LF * HEIGHT_FT".into()),
            quantity_bound: bound("WALL_SF", None),
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "MLD_REMEDIATE".into(),
            description: "Mold remediation of affected surfaces".into(),
            unit: Unit::Sf,
            category: MOLD.into(),
            conditions: conditions("MLD_REMEDIATE", &["damage=mold"])?,
            quantity_formula: Some("WALL_SF_NET".into()),
            auto_adds: codes(&["MLD_CONTAIN", "MLD_CLEARANCE"]),
            requires: codes(&["MLD_CONTAIN"]),
            covers: vec![Surface::Wall],
            quantity_bound: bound("WALL_SF_NET", None),
            carrier_sensitivity: CarrierSensitivity::High,
            ..RuleDefinition::default()
        },
        RuleDefinition {
            code: "MLD_CLEARANCE".into(),
            description: "Post-remediation clearance testing".into(),
            unit: Unit::Ea,
            category: MOLD.into(),
            auto_add_only: true,
            fixed_quantity: Some(1.0),
            ..RuleDefinition::default()
        },
    ])
}

fn conditions(code: &str, texts: &[&str]) -> Result<Vec<MatchCondition>, CatalogError> {
    texts
        .iter()
        .map(|text| {
            text.parse::<MatchCondition>()
                .map_err(|err| CatalogError::InvalidField {
                    code: code.to_string(),
                    field: "condition",
                    value: err.condition,
                    reason: err.reason,
                })
        })
        .collect()
}

fn codes(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|code| code.to_string()).collect()
}

fn bound(metric: &str, factor: Option<f64>) -> Option<BoundDefinition> {
    Some(BoundDefinition {
        metric: metric.to_string(),
        factor,
    })
}
