use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::scope::EngineSettings;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            engine: EngineConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Scoping engine knobs and the catalog location.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// `.json` or `.csv` catalog export; the built-in catalog is used when unset.
    pub catalog_path: Option<PathBuf>,
    pub quantity_tolerance: f64,
    pub max_resolver_iterations: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let settings = EngineSettings::default();
        Self {
            catalog_path: None,
            quantity_tolerance: settings.quantity_tolerance,
            max_resolver_iterations: settings.max_resolver_iterations,
        }
    }
}

impl EngineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let catalog_path = env::var("SCOPE_CATALOG_PATH")
            .ok()
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let quantity_tolerance = match env::var("SCOPE_QUANTITY_TOLERANCE") {
            Ok(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite() && *value > 1.0)
                .ok_or(ConfigError::InvalidQuantityTolerance(raw))?,
            Err(_) => defaults.quantity_tolerance,
        };

        let max_resolver_iterations = match env::var("SCOPE_MAX_RESOLVER_ITERATIONS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidIterationCap(raw))?,
            Err(_) => defaults.max_resolver_iterations,
        };

        Ok(Self {
            catalog_path,
            quantity_tolerance,
            max_resolver_iterations,
        })
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            quantity_tolerance: self.quantity_tolerance,
            max_resolver_iterations: self.max_resolver_iterations,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidQuantityTolerance(String),
    InvalidIterationCap(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidQuantityTolerance(raw) => write!(
                f,
                "SCOPE_QUANTITY_TOLERANCE must be a number greater than 1.0 (got '{}')",
                raw
            ),
            ConfigError::InvalidIterationCap(raw) => write!(
                f,
                "SCOPE_MAX_RESOLVER_ITERATIONS must be a positive integer (got '{}')",
                raw
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidQuantityTolerance(_)
            | ConfigError::InvalidIterationCap(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("SCOPE_CATALOG_PATH");
        env::remove_var("SCOPE_QUANTITY_TOLERANCE");
        env::remove_var("SCOPE_MAX_RESOLVER_ITERATIONS");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.engine.catalog_path.is_none());
        assert_eq!(config.engine.quantity_tolerance, 1.2);
        assert_eq!(config.engine.max_resolver_iterations, 10_000);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn engine_overrides_are_parsed() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCOPE_CATALOG_PATH", "catalogs/water.json");
        env::set_var("SCOPE_QUANTITY_TOLERANCE", "1.15");
        env::set_var("SCOPE_MAX_RESOLVER_ITERATIONS", "500");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(
            config.engine.catalog_path,
            Some(PathBuf::from("catalogs/water.json"))
        );
        let settings = config.engine.settings();
        assert_eq!(settings.quantity_tolerance, 1.15);
        assert_eq!(settings.max_resolver_iterations, 500);
        reset_env();
    }

    #[test]
    fn rejects_tolerance_at_or_below_one() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SCOPE_QUANTITY_TOLERANCE", "0.9");
        let err = AppConfig::load().expect_err("tolerance rejected");
        assert!(matches!(err, ConfigError::InvalidQuantityTolerance(_)));
        reset_env();
    }
}
