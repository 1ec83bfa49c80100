use std::path::PathBuf;
use std::sync::Arc;

use claim_scope::scope::{
    CatalogError, CatalogLoader, DamageType, EngineSettings, ScopeCatalog, ScopeEngine, Surface,
    WaterCategory, Zone, ZoneType,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn carpeted_bedroom() -> Zone {
    let mut zone = Zone::new("bedroom-2", ZoneType::Room);
    zone.length_ft = Some(11.0);
    zone.width_ft = Some(12.0);
    zone.height_ft = Some(8.0);
    zone.damage_type = Some(DamageType::Water);
    zone.water_category = Some(WaterCategory::new(3).expect("category 3"));
    zone.affected_surfaces = [Surface::Floor].into_iter().collect();
    zone
}

fn scoped_codes(catalog: ScopeCatalog) -> Vec<String> {
    let engine = ScopeEngine::new(Arc::new(catalog), EngineSettings::default());
    engine
        .assess(&carpeted_bedroom())
        .expect("assessment")
        .scope
        .suggested_items
        .into_iter()
        .map(|item| item.code)
        .collect()
}

#[test]
fn json_and_csv_exports_describe_the_same_catalog() {
    let from_json = CatalogLoader::from_path(fixture("water_catalog.json")).expect("json catalog");
    let from_csv = CatalogLoader::from_path(fixture("water_catalog.csv")).expect("csv catalog");

    assert_eq!(from_json.len(), 3);
    assert_eq!(from_csv.len(), 3);
    for (json_rule, csv_rule) in from_json.rules().iter().zip(from_csv.rules()) {
        assert_eq!(json_rule, csv_rule);
    }
}

#[test]
fn loaded_catalogs_drive_the_engine() {
    let catalog = CatalogLoader::from_json_path(fixture("water_catalog.json")).expect("catalog");
    assert_eq!(scoped_codes(catalog), vec!["WTR_EXT", "WTR_PAD", "WTR_INSP"]);
}

#[test]
fn cyclic_catalogs_are_rejected_at_load() {
    let err = CatalogLoader::from_path(fixture("cyclic_catalog.json")).expect_err("cycle");
    match err {
        CatalogError::Cycle { relation, code } => {
            assert_eq!(relation, "auto-add");
            assert!(code == "DRY_SETUP" || code == "DRY_DEHU");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn missing_files_surface_io_errors() {
    let err = CatalogLoader::from_path(fixture("does_not_exist.json")).expect_err("missing");
    assert!(matches!(err, CatalogError::Io(_)));
}
