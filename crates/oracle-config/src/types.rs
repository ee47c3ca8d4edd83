//! Configuration types for the oracle.

use oracle_types::{ChainId, ChainType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Complete oracle configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleConfig {
	/// Oracle identity and timing
	pub oracle: OracleSettings,
	/// Persistence settings
	#[serde(default)]
	pub storage: StorageConfig,
	/// Bridge contract endpoint
	pub bridge: BridgeConfig,
	/// HTTP API
	#[serde(default)]
	pub api: ApiConfig,
	/// Limits applied while validating and grouping claims
	#[serde(default)]
	pub bridging_settings: BridgingSettings,
	/// Backoff for txs whose claim keeps getting rejected on its own
	#[serde(default)]
	pub retry_unprocessed_settings: RetryUnprocessedSettings,
	/// Cardano chains, keyed by chain id
	#[serde(default)]
	pub cardano_chains: BTreeMap<ChainId, CardanoChainConfig>,
	/// EVM chains, keyed by chain id
	#[serde(default)]
	pub eth_chains: BTreeMap<ChainId, EthChainConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OracleSettings {
	pub name: String,
	/// Interval between two chains of one orchestration tick
	#[serde(default = "default_tick_time_ms")]
	pub tick_time_ms: u64,
	/// Blocks past the TTL before an expected tx is considered overdue
	#[serde(default = "default_ttl_insurance_offset")]
	pub ttl_insurance_offset: u64,
	#[serde(default = "default_expected_txs_poll_ms")]
	pub expected_txs_poll_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
	#[default]
	Memory,
	File,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageConfig {
	#[serde(default)]
	pub backend: StorageBackend,
	/// Snapshot file location for the file backend
	pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
	pub endpoint: String,
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
	#[serde(default = "default_timeout_secs")]
	pub timeout_secs: u64,
	/// Interval between two confirmed block reports of one chain
	#[serde(default = "default_confirmed_blocks_submit_ms")]
	pub confirmed_blocks_submit_ms: u64,
	/// Most blocks reported at once
	#[serde(default = "default_confirmed_blocks_threshold")]
	pub confirmed_blocks_threshold: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_api_host")]
	pub host: String,
	#[serde(default = "default_api_port")]
	pub port: u16,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			host: default_api_host(),
			port: default_api_port(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgingSettings {
	#[serde(default = "default_max_bridging_claims_to_group")]
	pub max_bridging_claims_to_group: usize,
	#[serde(default = "default_max_receivers")]
	pub max_receivers_per_bridging_request: usize,
	/// Upper bound on the receiver sum of one request. Zero disables the check.
	#[serde(default)]
	pub max_amount_allowed_to_bridge: u64,
}

impl Default for BridgingSettings {
	fn default() -> Self {
		Self {
			max_bridging_claims_to_group: default_max_bridging_claims_to_group(),
			max_receivers_per_bridging_request: default_max_receivers(),
			max_amount_allowed_to_bridge: 0,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryUnprocessedSettings {
	#[serde(default = "default_retry_base_timeout_secs")]
	pub base_timeout_secs: u64,
	#[serde(default = "default_retry_max_timeout_secs")]
	pub max_timeout_secs: u64,
}

impl Default for RetryUnprocessedSettings {
	fn default() -> Self {
		Self {
			base_timeout_secs: default_retry_base_timeout_secs(),
			max_timeout_secs: default_retry_max_timeout_secs(),
		}
	}
}

impl RetryUnprocessedSettings {
	/// Wait after the `try_count`-th failure: the base timeout doubled per
	/// earlier failure, capped at the max timeout.
	pub fn retry_after_secs(&self, try_count: u32) -> u64 {
		if try_count == 0 {
			return 0;
		}

		let factor = 1u64 << (try_count - 1).min(63);
		self.base_timeout_secs
			.saturating_mul(factor)
			.min(self.max_timeout_secs)
	}

	/// Whether a tx last tried at `last_time_tried` may be retried at `now`.
	/// Times are unix seconds.
	pub fn is_ready(&self, try_count: u32, last_time_tried: u64, now: u64) -> bool {
		try_count == 0
			|| last_time_tried == 0
			|| now >= last_time_tried.saturating_add(self.retry_after_secs(try_count))
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CardanoChainConfig {
	/// Multisig address users lock funds on
	pub bridging_address: String,
	/// Multisig fee address
	pub fee_address: String,
	/// Amount paid to the fee address on the destination side of a bridging request
	pub fee_addr_bridging_amount: u64,
	pub min_fee_for_bridging: u64,
	pub utxo_min_amount: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EthChainConfig {
	/// Gateway contract address
	pub bridging_address: String,
	pub fee_address: String,
	pub fee_addr_bridging_amount: u64,
	pub min_fee_for_bridging: u64,
}

impl OracleConfig {
	/// Sorted chain ids of one family.
	pub fn chain_ids(&self, chain_type: ChainType) -> Vec<ChainId> {
		match chain_type {
			ChainType::Cardano => self.cardano_chains.keys().cloned().collect(),
			ChainType::Evm => self.eth_chains.keys().cloned().collect(),
		}
	}

	/// Sorted chain ids of every family.
	pub fn all_chain_ids(&self) -> Vec<ChainId> {
		let mut ids: Vec<ChainId> = self
			.cardano_chains
			.keys()
			.chain(self.eth_chains.keys())
			.cloned()
			.collect();
		ids.sort();
		ids
	}

	pub fn chain_type(&self, chain_id: &ChainId) -> Option<ChainType> {
		if self.cardano_chains.contains_key(chain_id) {
			Some(ChainType::Cardano)
		} else if self.eth_chains.contains_key(chain_id) {
			Some(ChainType::Evm)
		} else {
			None
		}
	}

	pub fn tick_time(&self) -> Duration {
		Duration::from_millis(self.oracle.tick_time_ms)
	}

	pub fn expected_txs_poll_interval(&self) -> Duration {
		Duration::from_millis(self.oracle.expected_txs_poll_ms)
	}

	pub fn confirmed_blocks_submit_interval(&self) -> Duration {
		Duration::from_millis(self.bridge.confirmed_blocks_submit_ms)
	}
}

fn default_tick_time_ms() -> u64 {
	2000
}

fn default_ttl_insurance_offset() -> u64 {
	2
}

fn default_expected_txs_poll_ms() -> u64 {
	5000
}

fn default_max_retries() -> u32 {
	3
}

fn default_timeout_secs() -> u64 {
	30
}

fn default_confirmed_blocks_submit_ms() -> u64 {
	3000
}

fn default_confirmed_blocks_threshold() -> usize {
	20
}

fn default_retry_base_timeout_secs() -> u64 {
	60
}

fn default_retry_max_timeout_secs() -> u64 {
	60 * 2048
}

fn default_true() -> bool {
	true
}

fn default_api_host() -> String {
	"127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
	3000
}

fn default_max_bridging_claims_to_group() -> usize {
	10
}

fn default_max_receivers() -> usize {
	4
}
