//! Wires storage, processors, orchestrators and the bridge client into an
//! [`Oracle`].

use crate::blocks_submitter::ConfirmedBlocksSubmitter;
use crate::error::CoreError;
use crate::fetcher::ExpectedTxsFetcher;
use crate::lifecycle::LifecycleManager;
use crate::oracle::{Oracle, Workers};
use crate::txs_processor::TxsProcessor;
use oracle_bridge::{BridgeInterface, HttpBridge};
use oracle_chains::ChainObservers;
use oracle_config::OracleConfig;
use oracle_processor::{
	cardano_tx_processors, eth_tx_processors, OracleTelemetry, TxsReceiver, TxsStateProcessor,
};
use oracle_state::{BridgingRequestStateManager, BridgingRequestStateUpdater};
use oracle_storage::{create_storage, SharedStorage, StorageService, TxsProcessorDb};
use oracle_types::{CardanoTx, ChainType, EthTx};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::info;

#[derive(Default)]
pub struct OracleBuilder {
	config: Option<OracleConfig>,
	storage: Option<SharedStorage>,
	bridge: Option<Arc<dyn BridgeInterface>>,
}

impl OracleBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_config(mut self, config: OracleConfig) -> Self {
		self.config = Some(config);
		self
	}

	/// Uses `storage` instead of the backend named in the configuration.
	pub fn with_storage(mut self, storage: SharedStorage) -> Self {
		self.storage = Some(storage);
		self
	}

	/// Uses `bridge` instead of an HTTP client for the configured endpoint.
	pub fn with_bridge(mut self, bridge: Arc<dyn BridgeInterface>) -> Self {
		self.bridge = Some(bridge);
		self
	}

	pub async fn build(self) -> Result<Oracle, CoreError> {
		let config = Arc::new(self.config.ok_or_else(|| {
			CoreError::Configuration("No configuration provided".to_string())
		})?);

		let storage = match self.storage {
			Some(storage) => storage,
			None => Arc::new(StorageService::new(create_storage(&config.storage).await?)),
		};

		let bridge = match self.bridge {
			Some(bridge) => bridge,
			None => Arc::new(HttpBridge::new(&config.bridge)?),
		};

		let observers = ChainObservers::from_storage(config.all_chain_ids(), storage.clone())?;
		let states = Arc::new(BridgingRequestStateManager::new(storage.clone()));
		let state_updater: Arc<dyn BridgingRequestStateUpdater> = states.clone();
		let telemetry = Arc::new(OracleTelemetry::new());

		let cardano_db = TxsProcessorDb::<CardanoTx>::new(storage.clone());
		let eth_db = TxsProcessorDb::<EthTx>::new(storage.clone());
		let cardano_processors = Arc::new(cardano_tx_processors());
		let eth_processors = Arc::new(eth_tx_processors());

		let cardano_receiver = TxsReceiver::new(
			config.clone(),
			cardano_db.clone(),
			cardano_processors.clone(),
			state_updater.clone(),
			telemetry.clone(),
		);
		let eth_receiver = TxsReceiver::new(
			config.clone(),
			eth_db.clone(),
			eth_processors.clone(),
			state_updater.clone(),
			telemetry.clone(),
		);

		let cardano_chains = config.chain_ids(ChainType::Cardano);
		let eth_chains = config.chain_ids(ChainType::Evm);
		let mut workers = Workers {
			cardano_processor: None,
			eth_processor: None,
			cardano_fetcher: None,
			eth_fetcher: None,
			cardano_blocks_submitters: Vec::new(),
			eth_blocks_submitters: Vec::new(),
		};

		for chain_id in &cardano_chains {
			workers.cardano_blocks_submitters.push(
				ConfirmedBlocksSubmitter::new(
					bridge.clone(),
					observers.get_required(chain_id)?,
					cardano_db.clone(),
					config.confirmed_blocks_submit_interval(),
					config.bridge.confirmed_blocks_threshold,
				)
				.await?,
			);
		}

		for chain_id in &eth_chains {
			workers.eth_blocks_submitters.push(
				ConfirmedBlocksSubmitter::new(
					bridge.clone(),
					observers.get_required(chain_id)?,
					eth_db.clone(),
					config.confirmed_blocks_submit_interval(),
					config.bridge.confirmed_blocks_threshold,
				)
				.await?,
			);
		}

		if !cardano_chains.is_empty() {
			let state_processor = Arc::new(TxsStateProcessor::new(
				config.clone(),
				cardano_db.clone(),
				cardano_processors,
				observers.clone(),
				state_updater.clone(),
				telemetry.clone(),
			));
			workers.cardano_processor = Some(TxsProcessor::new(
				&config,
				state_processor,
				bridge.clone(),
				telemetry.clone(),
			));
			workers.cardano_fetcher = Some(ExpectedTxsFetcher::new(
				cardano_chains.clone(),
				bridge.clone(),
				cardano_db,
				config.expected_txs_poll_interval(),
			));
		}

		if !eth_chains.is_empty() {
			let state_processor = Arc::new(TxsStateProcessor::new(
				config.clone(),
				eth_db.clone(),
				eth_processors,
				observers.clone(),
				state_updater,
				telemetry.clone(),
			));
			workers.eth_processor = Some(TxsProcessor::new(
				&config,
				state_processor,
				bridge.clone(),
				telemetry.clone(),
			));
			workers.eth_fetcher = Some(ExpectedTxsFetcher::new(
				eth_chains.clone(),
				bridge,
				eth_db,
				config.expected_txs_poll_interval(),
			));
		}

		info!(
			name = %config.oracle.name,
			cardano_chains = ?cardano_chains,
			eth_chains = ?eth_chains,
			"Oracle built"
		);

		Ok(Oracle {
			config,
			observers,
			states,
			telemetry,
			cardano_receiver,
			eth_receiver,
			lifecycle: LifecycleManager::new(),
			workers: Mutex::new(Some(workers)),
			tasks: Mutex::new(JoinSet::new()),
		})
	}
}
