use std::sync::Arc;

use claim_scope::scope::{
    DamageSeverity, DamageType, EngineSettings, ExclusionKind, Opening, ScopeCatalog, ScopeEngine,
    Severity, Surface, ValidationStatus, WaterCategory, Zone, ZoneType,
};

fn engine() -> ScopeEngine {
    let catalog = ScopeCatalog::standard().expect("standard catalog compiles");
    ScopeEngine::new(Arc::new(catalog), EngineSettings::default())
}

fn kitchen() -> Zone {
    let mut zone = Zone::new("kitchen", ZoneType::Room);
    zone.name = Some("Kitchen".to_string());
    zone.length_ft = Some(12.0);
    zone.width_ft = Some(14.0);
    zone.height_ft = Some(9.0);
    zone.damage_type = Some(DamageType::Water);
    zone.damage_severity = Some(DamageSeverity::Moderate);
    zone.water_category = Some(WaterCategory::new(2).expect("category 2"));
    zone.affected_surfaces = [
        Surface::Floor,
        Surface::Wall,
        Surface::Baseboard,
        Surface::Cabinet,
    ]
    .into_iter()
    .collect();
    zone.openings = vec![Opening::new(3.0, 7.0, 1), Opening::new(4.0, 5.5, 1)];
    zone
}

fn roof() -> Zone {
    let mut zone = Zone::new("main-roof", ZoneType::Roof);
    zone.length_ft = Some(40.0);
    zone.width_ft = Some(25.0);
    zone.pitch = Some("6/12".to_string());
    zone.damage_type = Some(DamageType::Wind);
    zone.damage_severity = Some(DamageSeverity::Severe);
    zone.affected_surfaces = [Surface::Roof].into_iter().collect();
    zone
}

#[test]
fn kitchen_metrics_match_the_field_sketch() {
    let metrics = engine().metrics(&kitchen());
    assert_eq!(metrics.floor_square_feet, 168.0);
    assert_eq!(metrics.perimeter_linear_feet, 52.0);
    assert_eq!(metrics.wall_square_feet, 468.0);
    assert_eq!(metrics.opening_square_feet, 43.0);
    assert_eq!(metrics.wall_square_feet_net, 425.0);
    assert!(!metrics.default_height_used);
}

#[test]
fn kitchen_water_loss_is_scoped_end_to_end() {
    let assessment = engine().assess(&kitchen()).expect("kitchen assessment");
    let scope = &assessment.scope;

    let codes: Vec<&str> = scope
        .suggested_items
        .iter()
        .map(|item| item.code.as_str())
        .collect();
    assert_eq!(
        codes,
        vec![
            "WTR_EXT_PORT",
            "WTR_BASE_RMV",
            "WTR_FLOOD_CUT",
            "WTR_ANTIMICROBIAL",
            "WTR_MOIST_INSP",
            "DRY_SETUP",
            "DRY_DEHU",
            "DRY_AIRM",
        ]
    );

    let find = |code: &str| {
        scope
            .suggested_items
            .iter()
            .find(|item| item.code == code)
            .unwrap_or_else(|| panic!("{code} scoped"))
    };

    let extraction = find("WTR_EXT_PORT");
    assert!(!extraction.is_auto_added);
    assert_eq!(extraction.quantity, 168.0);

    for code in ["WTR_MOIST_INSP", "DRY_SETUP"] {
        let item = find(code);
        assert!(item.is_auto_added);
        assert_eq!(item.added_by_item.as_deref(), Some("WTR_EXT_PORT"));
    }

    let dehumidifier = find("DRY_DEHU");
    assert_eq!(dehumidifier.added_by_item.as_deref(), Some("DRY_SETUP"));
    assert_eq!(dehumidifier.quantity, 3.0);
    assert!(dehumidifier
        .explanation
        .contains("MAX(3, CEIL(168/500)) × MAX(1, CEIL(168/1000)) = 3 DAY"));

    let truck = scope
        .excluded_items
        .iter()
        .find(|item| item.code == "WTR_EXT_TRUCK")
        .expect("truck-mount excluded");
    assert_eq!(truck.excluded_by, "WTR_EXT_PORT");
    assert_eq!(truck.kind, ExclusionKind::Excluded);

    let dry_in_place = scope
        .excluded_items
        .iter()
        .find(|item| item.code == "WTR_DRYWALL_DRY")
        .expect("generic drywall replaced");
    assert_eq!(dry_in_place.kind, ExclusionKind::Replaced);
    assert_eq!(dry_in_place.excluded_by, "WTR_FLOOD_CUT");

    assert!(scope.warnings.is_empty());
}

#[test]
fn kitchen_validation_only_flags_the_cabinets() {
    let assessment = engine().assess(&kitchen()).expect("kitchen assessment");
    let validation = &assessment.validation;

    assert!(validation.is_valid);
    assert_eq!(validation.error_count, 0);
    assert_eq!(validation.warning_count, 0);
    assert_eq!(validation.info_count, 1);

    let issue = &validation.issues[0];
    assert_eq!(issue.severity, Severity::Info);
    assert_eq!(issue.code, "SURFACE_NOT_SCOPED");
    assert_eq!(
        issue.message,
        "Cabinet damage noted but no cabinet line item present"
    );

    assert!(assessment
        .scope
        .suggested_items
        .iter()
        .all(|item| item.validation_status == ValidationStatus::Valid));
}

#[test]
fn severe_kitchen_loss_adds_cabinetry() {
    let mut zone = kitchen();
    zone.damage_severity = Some(DamageSeverity::Severe);
    let assessment = engine().assess(&zone).expect("assessment");

    assert!(assessment
        .scope
        .suggested_items
        .iter()
        .any(|item| item.code == "WTR_CAB_DETACH"));
    assert_eq!(assessment.validation.info_count, 0);
}

#[test]
fn roof_geometry_uses_the_pitch_factor() {
    let metrics = engine().metrics(&roof());
    let multiplier = metrics.pitch_multiplier.expect("roof multiplier");
    let area = metrics.roof_square_feet.expect("roof area");
    let squares = metrics.roof_squares.expect("roof squares");

    assert!((multiplier - 1.118).abs() < 0.001);
    assert!((area - 1118.0).abs() < 0.1);
    assert!((squares - 11.18).abs() < 0.01);
}

#[test]
fn severe_wind_roof_is_torn_off_not_repaired() {
    let assessment = engine().assess(&roof()).expect("roof assessment");
    let scope = &assessment.scope;

    let codes: Vec<&str> = scope
        .suggested_items
        .iter()
        .map(|item| item.code.as_str())
        .collect();
    assert_eq!(
        codes,
        vec!["RFG_TEAR_OFF", "RFG_SHINGLE", "RFG_DRIP_EDGE", "RFG_FELT"]
    );

    let quantities: Vec<f64> = scope
        .suggested_items
        .iter()
        .map(|item| item.quantity)
        .collect();
    assert_eq!(quantities, vec![11.18, 13.0, 130.0, 11.18]);

    let repair = scope
        .excluded_items
        .iter()
        .find(|item| item.code == "RFG_REPAIR")
        .expect("repair excluded");
    assert_eq!(repair.excluded_by, "RFG_TEAR_OFF");

    assert!(scope.warnings.is_empty());
    assert!(assessment.validation.is_valid);
    assert!(assessment.validation.issues.is_empty());
}

#[test]
fn moderate_roof_damage_is_a_repair() {
    let mut zone = roof();
    zone.damage_severity = Some(DamageSeverity::Moderate);
    let scope = engine().scope(&zone).expect("scope");

    let codes: Vec<&str> = scope
        .suggested_items
        .iter()
        .map(|item| item.code.as_str())
        .collect();
    assert_eq!(codes, vec!["RFG_REPAIR"]);
    assert_eq!(scope.suggested_items[0].quantity, 2.0);
}

#[test]
fn zones_without_dimensions_still_scope() {
    let mut zone = kitchen();
    zone.length_ft = None;
    zone.width_ft = None;
    let assessment = engine().assess(&zone).expect("assessment");

    assert!(!assessment.scope.metrics.has_dimensions());
    assert_eq!(assessment.scope.metrics.floor_square_feet, 0.0);
    assert!(!assessment.scope.suggested_items.is_empty());
    assert!(assessment
        .validation
        .issues
        .iter()
        .any(|issue| issue.code == "GEOMETRY_MISSING"));
}

#[test]
fn scope_results_use_camel_case_field_names() {
    let scope = engine().scope(&kitchen()).expect("scope");
    let value = serde_json::to_value(&scope).expect("serialize");

    for key in ["zoneId", "metrics", "suggestedItems", "excludedItems", "warnings"] {
        assert!(value.get(key).is_some(), "missing {key}");
    }
    assert_eq!(value["metrics"]["floorSquareFeet"], serde_json::json!(168.0));
    assert_eq!(
        value["suggestedItems"][4]["addedByItem"],
        serde_json::json!("WTR_EXT_PORT")
    );
    assert_eq!(
        value["excludedItems"][0]["excludedBy"],
        serde_json::json!("WTR_EXT_PORT")
    );
}
