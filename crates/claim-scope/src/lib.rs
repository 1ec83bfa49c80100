pub mod config;
pub mod error;
pub mod scope;
pub mod telemetry;
