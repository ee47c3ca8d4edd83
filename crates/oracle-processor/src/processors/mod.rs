//! Transaction processors and their registry.
//!
//! A success processor turns a confirmed transaction of one declared type into
//! a claim; a failed processor turns an expected transaction that never showed
//! up into a failure claim. Processors are pure: everything they need is the
//! transaction and the configuration.

use crate::ProcessorError;
use oracle_config::OracleConfig;
use oracle_types::{
	unmarshal_metadata, BaseMetadata, BridgeClaims, BridgingTxType, CardanoTx, ChainTx, EthTx,
	ExpectedTx,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub mod cardano;
pub mod eth;
pub mod failed;

pub use cardano::{
	CardanoBatchExecutedProcessor, CardanoBridgingRequestedProcessor, HotWalletIncrementProcessor,
};
pub use eth::{EthBatchExecutedProcessor, EthBridgingRequestedProcessor};
pub use failed::BatchExecutionFailedProcessor;

/// Builds claims from confirmed transactions of type [`Self::tx_type`].
pub trait SuccessTxProcessor<T>: Send + Sync {
	fn tx_type(&self) -> BridgingTxType;

	/// Run when the transaction is first received. A failure makes the
	/// transaction irrelevant, so only its shape is checked here.
	fn pre_validate(&self, tx: &T, config: &OracleConfig) -> Result<(), ProcessorError>;

	/// Validates `tx` and appends its claim to `claims`.
	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &T,
		config: &OracleConfig,
	) -> Result<(), ProcessorError>;
}

/// Builds failure claims for expected transactions whose TTL passed.
pub trait FailedTxProcessor: Send + Sync {
	fn tx_type(&self) -> BridgingTxType;

	fn pre_validate(&self, tx: &ExpectedTx, config: &OracleConfig) -> Result<(), ProcessorError>;

	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &ExpectedTx,
		config: &OracleConfig,
	) -> Result<(), ProcessorError>;
}

/// Processors of one chain family, keyed by the transaction type they handle.
pub struct TxProcessorsCollection<T> {
	success: HashMap<BridgingTxType, Arc<dyn SuccessTxProcessor<T>>>,
	failed: HashMap<BridgingTxType, Arc<dyn FailedTxProcessor>>,
}

impl<T> Default for TxProcessorsCollection<T> {
	fn default() -> Self {
		Self {
			success: HashMap::new(),
			failed: HashMap::new(),
		}
	}
}

impl<T: ChainTx> TxProcessorsCollection<T> {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_success(mut self, processor: impl SuccessTxProcessor<T> + 'static) -> Self {
		self.register_success(Arc::new(processor));
		self
	}

	pub fn with_failed(mut self, processor: impl FailedTxProcessor + 'static) -> Self {
		self.register_failed(Arc::new(processor));
		self
	}

	/// Registers `processor`, replacing any previous one for the same type.
	pub fn register_success(&mut self, processor: Arc<dyn SuccessTxProcessor<T>>) {
		let tx_type = processor.tx_type();
		debug!("Registering {} success processor for {}", T::CHAIN_TYPE, tx_type);
		self.success.insert(tx_type, processor);
	}

	pub fn register_failed(&mut self, processor: Arc<dyn FailedTxProcessor>) {
		let tx_type = processor.tx_type();
		debug!("Registering {} failed processor for {}", T::CHAIN_TYPE, tx_type);
		self.failed.insert(tx_type, processor);
	}

	/// Resolves and pre-validates the processor for a confirmed transaction.
	///
	/// Transactions without metadata are only relevant when a hot wallet fund
	/// processor is registered for the family.
	pub fn get_success(
		&self,
		tx: &T,
		config: &OracleConfig,
	) -> Result<Arc<dyn SuccessTxProcessor<T>>, ProcessorError> {
		let tx_type = if tx.metadata().is_empty() {
			BridgingTxType::HotWalletFund
		} else {
			unmarshal_metadata::<BaseMetadata>(tx.metadata())?.bridging_tx_type
		};

		let processor = self
			.success
			.get(&tx_type)
			.ok_or_else(|| ProcessorError::IrrelevantTx(tx_type.to_string()))?;

		processor.pre_validate(tx, config)?;
		Ok(processor.clone())
	}

	pub fn get_failed(
		&self,
		tx: &ExpectedTx,
		config: &OracleConfig,
	) -> Result<Arc<dyn FailedTxProcessor>, ProcessorError> {
		let metadata: BaseMetadata = unmarshal_metadata(&tx.metadata)?;

		let processor = self
			.failed
			.get(&metadata.bridging_tx_type)
			.ok_or_else(|| ProcessorError::IrrelevantTx(metadata.bridging_tx_type.to_string()))?;

		processor.pre_validate(tx, config)?;
		Ok(processor.clone())
	}

	pub fn success_types(&self) -> Vec<BridgingTxType> {
		let mut types: Vec<_> = self.success.keys().copied().collect();
		types.sort();
		types
	}
}

impl<T> fmt::Debug for TxProcessorsCollection<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut success: Vec<_> = self.success.keys().collect();
		success.sort();
		let mut failed: Vec<_> = self.failed.keys().collect();
		failed.sort();

		f.debug_struct("TxProcessorsCollection")
			.field("success", &success)
			.field("failed", &failed)
			.finish()
	}
}

/// Processors used for Cardano chains.
pub fn cardano_tx_processors() -> TxProcessorsCollection<CardanoTx> {
	TxProcessorsCollection::new()
		.with_success(CardanoBatchExecutedProcessor)
		.with_success(CardanoBridgingRequestedProcessor)
		.with_success(HotWalletIncrementProcessor)
		.with_failed(BatchExecutionFailedProcessor)
}

/// Processors used for EVM chains.
pub fn eth_tx_processors() -> TxProcessorsCollection<EthTx> {
	TxProcessorsCollection::new()
		.with_success(EthBatchExecutedProcessor)
		.with_success(EthBridgingRequestedProcessor)
		.with_failed(BatchExecutionFailedProcessor)
}

#[cfg(test)]
pub(crate) mod test_utils {
	use oracle_config::{
		BridgeConfig, BridgingSettings, CardanoChainConfig, EthChainConfig, OracleConfig,
		OracleSettings,
	};
	use oracle_types::{
		marshal_metadata, BatchExecutedMetadata, BridgingRequestMetadata,
		BridgingRequestMetadataTransaction, BridgingTxType, CardanoTx, ChainId, EthTx,
		ExpectedTx, TxOutput,
	};
	use std::collections::BTreeMap;

	pub const PRIME_BRIDGING: &str = "addr_prime_bridging";
	pub const PRIME_FEE: &str = "addr_prime_fee";
	pub const VECTOR_BRIDGING: &str = "addr_vector_bridging";
	pub const VECTOR_FEE: &str = "addr_vector_fee";
	pub const NEXUS_BRIDGING: &str = "0xnexus_gateway";
	pub const NEXUS_FEE: &str = "0xnexus_fee";

	fn cardano_chain(bridging: &str, fee: &str) -> CardanoChainConfig {
		CardanoChainConfig {
			bridging_address: bridging.to_string(),
			fee_address: fee.to_string(),
			fee_addr_bridging_amount: 1_000_000,
			min_fee_for_bridging: 1_000_010,
			utxo_min_amount: 1_000_000,
		}
	}

	/// Two Cardano chains (`prime`, `vector`) and one EVM chain (`nexus`).
	pub fn config() -> OracleConfig {
		let mut cardano_chains = BTreeMap::new();
		cardano_chains.insert(ChainId::from("prime"), cardano_chain(PRIME_BRIDGING, PRIME_FEE));
		cardano_chains.insert(
			ChainId::from("vector"),
			cardano_chain(VECTOR_BRIDGING, VECTOR_FEE),
		);

		let mut eth_chains = BTreeMap::new();
		eth_chains.insert(
			ChainId::from("nexus"),
			EthChainConfig {
				bridging_address: NEXUS_BRIDGING.to_string(),
				fee_address: NEXUS_FEE.to_string(),
				fee_addr_bridging_amount: 1_000_000,
				min_fee_for_bridging: 1_000_010,
			},
		);

		OracleConfig {
			oracle: OracleSettings {
				name: "test-oracle".to_string(),
				tick_time_ms: 10,
				ttl_insurance_offset: 2,
				expected_txs_poll_ms: 10,
			},
			storage: Default::default(),
			bridge: BridgeConfig {
				endpoint: "http://127.0.0.1:1".to_string(),
				max_retries: 0,
				timeout_secs: 1,
				confirmed_blocks_submit_ms: 10,
				confirmed_blocks_threshold: 20,
			},
			api: Default::default(),
			bridging_settings: BridgingSettings::default(),
			retry_unprocessed_settings: Default::default(),
			cardano_chains,
			eth_chains,
		}
	}

	pub fn output(address: &str, amount: u64) -> TxOutput {
		TxOutput {
			address: address.to_string(),
			amount,
		}
	}

	pub fn receiver(address: &str, amount: u64) -> BridgingRequestMetadataTransaction {
		// Split like wallets do to stay under the on-chain string limit.
		let (head, tail) = address.split_at(address.len() / 2);
		BridgingRequestMetadataTransaction {
			address: vec![head.to_string(), tail.to_string()],
			amount,
		}
	}

	pub fn bridging_metadata(
		destination: &str,
		bridging_fee: u64,
		receivers: Vec<BridgingRequestMetadataTransaction>,
	) -> Vec<u8> {
		marshal_metadata(&BridgingRequestMetadata {
			bridging_tx_type: BridgingTxType::BridgingRequest,
			destination_chain_id: destination.into(),
			sender_addr: vec!["addr_sender".to_string()],
			transactions: receivers,
			bridging_fee,
		})
		.unwrap()
	}

	pub fn batch_metadata(tx_type: BridgingTxType, batch_nonce_id: u64) -> Vec<u8> {
		marshal_metadata(&BatchExecutedMetadata {
			bridging_tx_type: tx_type,
			batch_nonce_id,
		})
		.unwrap()
	}

	pub fn cardano_tx(hash: &str, slot: u64, metadata: Vec<u8>, outputs: Vec<TxOutput>) -> CardanoTx {
		CardanoTx {
			origin_chain_id: "prime".into(),
			priority: 1,
			block_slot: slot,
			block_hash: format!("b{}", slot),
			hash: hash.to_string(),
			metadata,
			inputs: vec![],
			outputs,
			fee: 0,
			submit_try_count: 0,
			last_time_tried: 0,
		}
	}

	pub fn eth_tx(hash: &str, block: u64, metadata: Vec<u8>, value: u128) -> EthTx {
		EthTx {
			origin_chain_id: "nexus".into(),
			priority: 1,
			block_number: block,
			block_hash: format!("e{}", block),
			hash: hash.to_string(),
			metadata,
			value,
			submit_try_count: 0,
			last_time_tried: 0,
		}
	}

	pub fn expected_tx(chain: &str, hash: &str, ttl: u64, batch_nonce_id: u64) -> ExpectedTx {
		ExpectedTx {
			chain_id: chain.into(),
			hash: hash.to_string(),
			ttl,
			metadata: batch_metadata(BridgingTxType::BatchExecution, batch_nonce_id),
			priority: 0,
			is_processed: false,
			is_invalid: false,
		}
	}
}
