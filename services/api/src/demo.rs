use crate::infra::{build_engine, load_catalog, read_zones};
use clap::Args;
use claim_scope::config::AppConfig;
use claim_scope::error::AppError;
use claim_scope::scope::{
    DamageSeverity, DamageType, Opening, ScopeEngine, Surface, WaterCategory, Zone,
    ZoneAssessment, ZoneType,
};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct ScopeArgs {
    /// JSON file holding one zone or a list of zones
    #[arg(long)]
    pub(crate) zone: PathBuf,
    /// Catalog export (.json or .csv) to scope against instead of the configured one
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Emit the assessments as JSON instead of a readable report
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct CatalogCheckArgs {
    /// Catalog export (.json or .csv) to compile
    #[arg(long)]
    pub(crate) path: PathBuf,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Emit the assessments as JSON instead of a readable report
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_scope(args: ScopeArgs) -> Result<(), AppError> {
    let ScopeArgs { zone, catalog, json } = args;

    let mut config = AppConfig::load()?;
    if catalog.is_some() {
        config.engine.catalog_path = catalog;
    }
    let engine = build_engine(&config.engine)?;
    let zones = read_zones(&zone)?;

    let assessments = engine
        .assess_all(&zones)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;
    emit(&assessments, json)
}

pub(crate) fn run_catalog_check(args: CatalogCheckArgs) -> Result<(), AppError> {
    let catalog = load_catalog(Some(&args.path))?;

    let direct = catalog
        .rules()
        .iter()
        .filter(|rule| !rule.auto_add_only)
        .count();
    println!("Catalog {} compiles", args.path.display());
    println!(
        "  {} rules ({} directly matchable, {} auto-add only)",
        catalog.len(),
        direct,
        catalog.len() - direct
    );
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let engine = build_engine(&config.engine)?;

    if !args.json {
        println!("Zone scoping demo");
    }
    let assessments = demo_assessments(&engine)?;
    emit(&assessments, args.json)
}

fn demo_assessments(engine: &ScopeEngine) -> Result<Vec<ZoneAssessment>, AppError> {
    let zones = [demo_kitchen(), demo_roof()];
    let assessments = engine
        .assess_all(&zones)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assessments)
}

fn emit(assessments: &[ZoneAssessment], json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", serde_json::to_string_pretty(assessments)?);
        return Ok(());
    }
    for assessment in assessments {
        render_assessment(assessment);
    }
    Ok(())
}

fn demo_kitchen() -> Zone {
    let mut zone = Zone::new("kitchen", ZoneType::Room);
    zone.name = Some("Kitchen".to_string());
    zone.length_ft = Some(12.0);
    zone.width_ft = Some(14.0);
    zone.height_ft = Some(9.0);
    zone.damage_type = Some(DamageType::Water);
    zone.damage_severity = Some(DamageSeverity::Moderate);
    zone.water_category = WaterCategory::new(2).ok();
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

fn demo_roof() -> Zone {
    let mut zone = Zone::new("main-roof", ZoneType::Roof);
    zone.name = Some("Main roof".to_string());
    zone.length_ft = Some(40.0);
    zone.width_ft = Some(25.0);
    zone.pitch = Some("6/12".to_string());
    zone.damage_type = Some(DamageType::Wind);
    zone.damage_severity = Some(DamageSeverity::Severe);
    zone.affected_surfaces = [Surface::Roof].into_iter().collect();
    zone
}

fn render_assessment(assessment: &ZoneAssessment) {
    let scope = &assessment.scope;
    let metrics = &scope.metrics;

    println!("\nZone {}", scope.zone_id);
    println!(
        "  Floor {:.2} SF | Perimeter {:.2} LF | Net wall {:.2} SF | Height {:.2} ft{}",
        metrics.floor_square_feet,
        metrics.perimeter_linear_feet,
        metrics.wall_square_feet_net,
        metrics.height_feet,
        if metrics.default_height_used {
            " (assumed)"
        } else {
            ""
        }
    );
    if let (Some(area), Some(squares)) = (metrics.roof_square_feet, metrics.roof_squares) {
        println!("  Roof {:.2} SF ({:.2} squares)", area, squares);
    }

    println!("\nLine items");
    if scope.suggested_items.is_empty() {
        println!("  none");
    }
    for item in &scope.suggested_items {
        let origin = match item.added_by_item.as_deref() {
            Some(trigger) => format!(" [auto-added by {trigger}]"),
            None => String::new(),
        };
        println!(
            "  - {:<18} {:>10} {:<3} {}{} ({})",
            item.code,
            item.quantity,
            item.unit,
            item.description,
            origin,
            item.validation_status.label()
        );
        println!("      {}", item.explanation);
    }

    if !scope.excluded_items.is_empty() {
        println!("\nExcluded");
        for excluded in &scope.excluded_items {
            println!(
                "  - {:<18} {}: {}",
                excluded.code,
                excluded.kind.label(),
                excluded.reason
            );
        }
    }

    for warning in &scope.warnings {
        println!("  ! {}", warning);
    }

    let validation = &assessment.validation;
    println!(
        "\nValidation: {} ({} errors, {} warnings, {} info)",
        if validation.is_valid { "valid" } else { "invalid" },
        validation.error_count,
        validation.warning_count,
        validation.info_count
    );
    for issue in &validation.issues {
        println!(
            "  [{}] {} {}: {}",
            issue.severity.label(),
            issue.category.label(),
            issue.code,
            issue.message
        );
        if let Some(suggestion) = &issue.suggestion {
            println!("      suggestion: {}", suggestion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claim_scope::config::EngineConfig;

    #[test]
    fn demo_zones_assess_cleanly() {
        let engine = build_engine(&EngineConfig::default()).expect("engine");
        let assessments = demo_assessments(&engine).expect("assessments");

        assert_eq!(assessments.len(), 2);
        assert!(assessments
            .iter()
            .all(|assessment| assessment.validation.is_valid));
        assert_eq!(assessments[1].scope.suggested_items[0].code, "RFG_TEAR_OFF");
    }
}
