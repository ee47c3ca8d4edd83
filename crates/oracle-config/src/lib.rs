//! Oracle configuration: file formats, environment overrides and validation.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("Validation error: {0}")]
	Validation(String),

	#[error("Invalid environment override {name}: {reason}")]
	InvalidEnv { name: &'static str, reason: String },
}
