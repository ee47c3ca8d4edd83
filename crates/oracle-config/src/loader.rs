//! Configuration loading from files and environment.

use crate::types::*;
use crate::ConfigError;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
	/// Load configuration from file, apply environment overrides and validate.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<OracleConfig> {
		let path = path.as_ref();
		info!("Loading configuration from {:?}", path);

		let contents = std::fs::read_to_string(path)
			.with_context(|| format!("Failed to read config file: {:?}", path))?;

		let mut config = match path.extension().and_then(|s| s.to_str()) {
			Some("toml") => Self::from_toml(&contents)?,
			Some("json") => Self::from_json(&contents)?,
			Some("yaml") | Some("yml") => Self::from_yaml(&contents)?,
			_ => anyhow::bail!("Unsupported config format: {:?}", path),
		};

		Self::apply_env_overrides(&mut config)?;
		Self::validate_config(&config)?;
		Ok(config)
	}

	/// Load from TOML string
	pub fn from_toml(contents: &str) -> Result<OracleConfig> {
		toml::from_str(contents).map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))
	}

	/// Load from JSON string
	pub fn from_json(contents: &str) -> Result<OracleConfig> {
		serde_json::from_str(contents).context("Failed to parse JSON")
	}

	/// Load from YAML string
	pub fn from_yaml(contents: &str) -> Result<OracleConfig> {
		serde_yaml::from_str(contents).context("Failed to parse YAML")
	}

	fn apply_env_overrides(config: &mut OracleConfig) -> Result<()> {
		Self::apply_overrides_from(config, |name| std::env::var(name).ok())
	}

	fn apply_overrides_from<F>(config: &mut OracleConfig, lookup: F) -> Result<()>
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(endpoint) = lookup("ORACLE_BRIDGE_ENDPOINT") {
			debug!("Overriding bridge endpoint from environment");
			config.bridge.endpoint = endpoint;
		}

		if let Some(port) = lookup("ORACLE_API_PORT") {
			debug!("Overriding API port from environment");
			config.api.port = port.parse().map_err(|e| ConfigError::InvalidEnv {
				name: "ORACLE_API_PORT",
				reason: format!("{}", e),
			})?;
		}

		if let Some(path) = lookup("ORACLE_STORAGE_PATH") {
			debug!("Overriding storage path from environment");
			config.storage.path = Some(PathBuf::from(path));
		}

		if let Some(tick) = lookup("ORACLE_TICK_TIME_MS") {
			debug!("Overriding tick time from environment");
			config.oracle.tick_time_ms = tick.parse().map_err(|e| ConfigError::InvalidEnv {
				name: "ORACLE_TICK_TIME_MS",
				reason: format!("{}", e),
			})?;
		}

		Ok(())
	}

	/// Validate configuration
	pub fn validate_config(config: &OracleConfig) -> Result<()> {
		if config.cardano_chains.is_empty() && config.eth_chains.is_empty() {
			return Err(invalid("At least one chain must be configured"));
		}

		let mut seen = HashSet::new();
		for chain_id in config.cardano_chains.keys().chain(config.eth_chains.keys()) {
			// Storage keys are ':'-separated and embed the chain id.
			if chain_id.as_str().is_empty() || chain_id.as_str().contains(':') {
				return Err(invalid(format!(
					"Chain id {:?} must be non-empty and must not contain ':'",
					chain_id.as_str()
				)));
			}

			if !seen.insert(chain_id) {
				return Err(invalid(format!(
					"Chain {} is configured more than once",
					chain_id
				)));
			}
		}

		if config.bridging_settings.max_bridging_claims_to_group == 0 {
			return Err(invalid("max_bridging_claims_to_group must be at least 1"));
		}

		if config.oracle.tick_time_ms == 0 {
			return Err(invalid("tick_time_ms must be greater than zero"));
		}

		if config.oracle.expected_txs_poll_ms == 0 {
			return Err(invalid("expected_txs_poll_ms must be greater than zero"));
		}

		if config.bridge.confirmed_blocks_submit_ms == 0 {
			return Err(invalid("confirmed_blocks_submit_ms must be greater than zero"));
		}

		let retry = &config.retry_unprocessed_settings;
		if retry.base_timeout_secs == 0 || retry.max_timeout_secs < retry.base_timeout_secs {
			return Err(invalid(
				"retry_unprocessed_settings needs 0 < base_timeout_secs <= max_timeout_secs",
			));
		}

		if config.storage.backend == StorageBackend::File && config.storage.path.is_none() {
			return Err(invalid("File storage backend requires a path"));
		}

		for (chain_id, chain) in &config.cardano_chains {
			check_addresses(chain_id.as_str(), &chain.bridging_address, &chain.fee_address)?;
		}

		for (chain_id, chain) in &config.eth_chains {
			check_addresses(chain_id.as_str(), &chain.bridging_address, &chain.fee_address)?;
		}

		Ok(())
	}
}

fn check_addresses(chain_id: &str, bridging_address: &str, fee_address: &str) -> Result<()> {
	if bridging_address.is_empty() {
		return Err(invalid(format!("Chain {} has no bridging address", chain_id)));
	}

	if fee_address.is_empty() {
		return Err(invalid(format!("Chain {} has no fee address", chain_id)));
	}

	Ok(())
}

fn invalid(message: impl Into<String>) -> anyhow::Error {
	ConfigError::Validation(message.into()).into()
}

#[cfg(test)]
mod tests {
	use super::*;
	use oracle_types::{ChainId, ChainType};
	use std::collections::HashMap;
	use std::io::Write;

	const TOML: &str = r#"
[oracle]
name = "oracle-1"
tick_time_ms = 500

[storage]
backend = "file"
path = "./data/oracle.json"

[bridge]
endpoint = "http://127.0.0.1:8080"

[bridging_settings]
max_bridging_claims_to_group = 5
max_receivers_per_bridging_request = 3

[cardano_chains.prime]
bridging_address = "addr_prime_bridge"
fee_address = "addr_prime_fee"
fee_addr_bridging_amount = 1000000
min_fee_for_bridging = 1000010
utxo_min_amount = 1000000

[cardano_chains.vector]
bridging_address = "addr_vector_bridge"
fee_address = "addr_vector_fee"
fee_addr_bridging_amount = 1000000
min_fee_for_bridging = 1000010
utxo_min_amount = 1000000

[eth_chains.nexus]
bridging_address = "0xgateway"
fee_address = "0x0000000000000000000000000000000000000000"
fee_addr_bridging_amount = 1000000
min_fee_for_bridging = 1000010
"#;

	#[test]
	fn test_toml_parsing() {
		let config = ConfigLoader::from_toml(TOML).unwrap();

		assert_eq!(config.oracle.name, "oracle-1");
		assert_eq!(config.oracle.tick_time_ms, 500);
		assert_eq!(config.oracle.ttl_insurance_offset, 2);
		assert_eq!(config.storage.backend, StorageBackend::File);
		assert_eq!(config.bridge.max_retries, 3);
		assert_eq!(config.bridge.confirmed_blocks_threshold, 20);
		assert_eq!(config.retry_unprocessed_settings.base_timeout_secs, 60);
		assert!(config.api.enabled);
		assert_eq!(config.bridging_settings.max_bridging_claims_to_group, 5);
		assert_eq!(config.bridging_settings.max_amount_allowed_to_bridge, 0);

		assert_eq!(
			config.chain_ids(ChainType::Cardano),
			vec![ChainId::from("prime"), ChainId::from("vector")]
		);
		assert_eq!(
			config.all_chain_ids(),
			vec![
				ChainId::from("nexus"),
				ChainId::from("prime"),
				ChainId::from("vector")
			]
		);
		assert_eq!(config.chain_type(&"nexus".into()), Some(ChainType::Evm));
		assert_eq!(config.chain_type(&"unknown".into()), None);

		ConfigLoader::validate_config(&config).unwrap();
	}

	#[test]
	fn test_json_parsing() {
		let json = r#"{
			"oracle": { "name": "oracle-json" },
			"bridge": { "endpoint": "http://bridge" },
			"eth_chains": {
				"nexus": {
					"bridging_address": "0xgateway",
					"fee_address": "0xfee",
					"fee_addr_bridging_amount": 10,
					"min_fee_for_bridging": 20
				}
			}
		}"#;

		let config = ConfigLoader::from_json(json).unwrap();
		assert_eq!(config.oracle.tick_time_ms, 2000);
		assert_eq!(config.storage.backend, StorageBackend::Memory);
		assert_eq!(config.eth_chains.len(), 1);
		ConfigLoader::validate_config(&config).unwrap();
	}

	#[test]
	fn test_validation_failures() {
		let base = ConfigLoader::from_toml(TOML).unwrap();

		let mut no_chains = base.clone();
		no_chains.cardano_chains.clear();
		no_chains.eth_chains.clear();
		assert!(ConfigLoader::validate_config(&no_chains).is_err());

		let mut duplicate = base.clone();
		let chain = duplicate.eth_chains.remove("nexus").unwrap();
		duplicate.eth_chains.insert("prime".into(), chain);
		let err = ConfigLoader::validate_config(&duplicate).unwrap_err();
		assert!(err.to_string().contains("more than once"));

		let mut zero_group = base.clone();
		zero_group.bridging_settings.max_bridging_claims_to_group = 0;
		assert!(ConfigLoader::validate_config(&zero_group).is_err());

		let mut inverted_retry = base.clone();
		inverted_retry.retry_unprocessed_settings.max_timeout_secs = 1;
		assert!(ConfigLoader::validate_config(&inverted_retry).is_err());

		let mut no_path = base.clone();
		no_path.storage.path = None;
		assert!(ConfigLoader::validate_config(&no_path).is_err());

		let mut separator = base.clone();
		let chain = separator.cardano_chains.remove("vector").unwrap();
		separator.cardano_chains.insert("prime:1".into(), chain);
		let err = ConfigLoader::validate_config(&separator).unwrap_err();
		assert!(err.to_string().contains("prime:1"));

		let mut no_fee = base;
		if let Some(chain) = no_fee.cardano_chains.get_mut("vector") {
			chain.fee_address.clear();
		}
		let err = ConfigLoader::validate_config(&no_fee).unwrap_err();
		assert!(err.to_string().contains("vector"));
	}

	#[test]
	fn test_env_overrides() {
		let mut config = ConfigLoader::from_toml(TOML).unwrap();
		let env: HashMap<&str, &str> = [
			("ORACLE_BRIDGE_ENDPOINT", "http://other:9000"),
			("ORACLE_API_PORT", "4100"),
			("ORACLE_TICK_TIME_MS", "50"),
		]
		.into_iter()
		.collect();

		ConfigLoader::apply_overrides_from(&mut config, |name| {
			env.get(name).map(|value| value.to_string())
		})
		.unwrap();

		assert_eq!(config.bridge.endpoint, "http://other:9000");
		assert_eq!(config.api.port, 4100);
		assert_eq!(config.oracle.tick_time_ms, 50);
	}

	#[test]
	fn test_invalid_env_override() {
		let mut config = ConfigLoader::from_toml(TOML).unwrap();

		let result = ConfigLoader::apply_overrides_from(&mut config, |name| {
			(name == "ORACLE_API_PORT").then(|| "not-a-port".to_string())
		});

		assert!(result.is_err());
	}

	#[test]
	fn test_from_file_by_extension() {
		let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
		file.write_all(TOML.as_bytes()).unwrap();

		let config = ConfigLoader::from_file(file.path()).unwrap();
		assert_eq!(config.cardano_chains.len(), 2);

		let unsupported = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
		assert!(ConfigLoader::from_file(unsupported.path()).is_err());
	}
}
