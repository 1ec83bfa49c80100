use claim_scope::config::EngineConfig;
use claim_scope::error::AppError;
use claim_scope::scope::{CatalogLoader, ScopeCatalog, ScopeEngine, Zone};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) engine: Arc<ScopeEngine>,
}

/// A zone file holds either one zone or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ZoneInput {
    Many(Vec<Zone>),
    One(Box<Zone>),
}

impl ZoneInput {
    pub(crate) fn into_zones(self) -> Vec<Zone> {
        match self {
            Self::Many(zones) => zones,
            Self::One(zone) => vec![*zone],
        }
    }
}

pub(crate) fn load_catalog(path: Option<&Path>) -> Result<ScopeCatalog, AppError> {
    let catalog = match path {
        Some(path) => {
            let catalog = CatalogLoader::from_path(path)?;
            info!(path = %path.display(), rules = catalog.len(), "catalog loaded");
            catalog
        }
        None => ScopeCatalog::standard()?,
    };
    Ok(catalog)
}

pub(crate) fn build_engine(config: &EngineConfig) -> Result<ScopeEngine, AppError> {
    let catalog = load_catalog(config.catalog_path.as_deref())?;
    Ok(ScopeEngine::new(Arc::new(catalog), config.settings()))
}

pub(crate) fn read_zones(path: &Path) -> Result<Vec<Zone>, AppError> {
    let reader = BufReader::new(File::open(path)?);
    let input: ZoneInput = serde_json::from_reader(reader)?;
    Ok(input.into_zones())
}
