//! The running oracle: receivers for observed blocks, one orchestrator and one
//! expected-txs fetcher per chain family, a confirmed blocks submitter per
//! chain, and the bridging request states.

use crate::blocks_submitter::ConfirmedBlocksSubmitter;
use crate::error::CoreError;
use crate::fetcher::ExpectedTxsFetcher;
use crate::lifecycle::{LifecycleManager, LifecycleState};
use crate::txs_processor::TxsProcessor;
use oracle_chains::{ChainObservers, ConfirmedBlock};
use oracle_config::OracleConfig;
use oracle_processor::{CardanoStateProcessor, EthStateProcessor, OracleTelemetry, TxsReceiver};
use oracle_state::{BridgingRequestStateManager, BridgingRequestStateUpdater};
use oracle_types::{CardanoTx, ChainId, ChainType, EthTx, TxKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Transactions of one confirmed block, in the shape of the chain's family.
#[derive(Debug, Clone)]
pub enum ObservedTxs {
	Cardano(Vec<CardanoTx>),
	Evm(Vec<EthTx>),
}

impl ObservedTxs {
	pub fn chain_type(&self) -> ChainType {
		match self {
			Self::Cardano(_) => ChainType::Cardano,
			Self::Evm(_) => ChainType::Evm,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Self::Cardano(txs) => txs.len(),
			Self::Evm(txs) => txs.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchEventKind {
	/// The bridge put the requests into a batch for the destination.
	Included,
	/// The batch was sent to the destination chain.
	Submitted,
}

/// Progress of a destination batch reported by the bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvent {
	pub destination_chain_id: ChainId,
	pub batch_id: u64,
	pub event: BatchEventKind,
	/// Requests the batch carries. Only read for `included`.
	#[serde(default)]
	pub source_txs: Vec<TxKey>,
}

/// Background loops waiting for [`Oracle::start`].
pub(crate) struct Workers {
	pub(crate) cardano_processor: Option<TxsProcessor<CardanoStateProcessor>>,
	pub(crate) eth_processor: Option<TxsProcessor<EthStateProcessor>>,
	pub(crate) cardano_fetcher: Option<ExpectedTxsFetcher<CardanoTx>>,
	pub(crate) eth_fetcher: Option<ExpectedTxsFetcher<EthTx>>,
	pub(crate) cardano_blocks_submitters: Vec<ConfirmedBlocksSubmitter<CardanoTx>>,
	pub(crate) eth_blocks_submitters: Vec<ConfirmedBlocksSubmitter<EthTx>>,
}

pub struct Oracle {
	pub(crate) config: Arc<OracleConfig>,
	pub(crate) observers: ChainObservers,
	pub(crate) states: Arc<BridgingRequestStateManager>,
	pub(crate) telemetry: Arc<OracleTelemetry>,
	pub(crate) cardano_receiver: TxsReceiver<CardanoTx>,
	pub(crate) eth_receiver: TxsReceiver<EthTx>,
	pub(crate) lifecycle: LifecycleManager,
	pub(crate) workers: Mutex<Option<Workers>>,
	pub(crate) tasks: Mutex<JoinSet<()>>,
}

impl Oracle {
	pub fn config(&self) -> &OracleConfig {
		&self.config
	}

	pub fn states(&self) -> &BridgingRequestStateManager {
		&self.states
	}

	pub fn telemetry(&self) -> &OracleTelemetry {
		&self.telemetry
	}

	pub async fn state(&self) -> LifecycleState {
		self.lifecycle.get_state().await
	}

	/// Spawns the orchestrators, fetchers and block submitters.
	pub async fn start(&self) -> Result<(), CoreError> {
		info!(name = %self.config.oracle.name, "Starting oracle");
		self.lifecycle.initialize().await?;

		let Some(workers) = self.workers.lock().await.take() else {
			self.lifecycle.fail().await?;
			return Err(CoreError::Lifecycle("Oracle was already started".to_string()));
		};

		let mut tasks = self.tasks.lock().await;
		if let Some(processor) = workers.cardano_processor {
			tasks.spawn(processor.start(self.lifecycle.subscribe_shutdown()));
		}
		if let Some(processor) = workers.eth_processor {
			tasks.spawn(processor.start(self.lifecycle.subscribe_shutdown()));
		}
		if let Some(fetcher) = workers.cardano_fetcher {
			tasks.spawn(fetcher.start(self.lifecycle.subscribe_shutdown()));
		}
		if let Some(fetcher) = workers.eth_fetcher {
			tasks.spawn(fetcher.start(self.lifecycle.subscribe_shutdown()));
		}
		for submitter in workers.cardano_blocks_submitters {
			tasks.spawn(submitter.start(self.lifecycle.subscribe_shutdown()));
		}
		for submitter in workers.eth_blocks_submitters {
			tasks.spawn(submitter.start(self.lifecycle.subscribe_shutdown()));
		}

		self.lifecycle.start().await?;
		info!(tasks = tasks.len(), "Oracle started");
		Ok(())
	}

	/// Signals shutdown and waits for the loops to finish their current pass.
	pub async fn shutdown(&self) -> Result<(), CoreError> {
		info!("Shutting down oracle");
		self.lifecycle.shutdown().await?;

		let mut tasks = self.tasks.lock().await;
		while let Some(result) = tasks.join_next().await {
			if let Err(e) = result {
				error!(error = %e, "Oracle task ended abnormally");
			}
		}

		self.lifecycle.stopped().await?;
		info!("Oracle shutdown complete");
		Ok(())
	}

	/// Accepts a block confirmed by the observer of `chain_id`.
	///
	/// Transactions are classified and stored before the block is recorded, so
	/// a pass never treats the block as confirmed while its txs are missing.
	pub async fn ingest_block(
		&self,
		chain_id: &ChainId,
		block: ConfirmedBlock,
		txs: ObservedTxs,
	) -> Result<(), CoreError> {
		let chain_type = self
			.config
			.chain_type(chain_id)
			.ok_or_else(|| CoreError::UnknownChain(chain_id.clone()))?;

		if chain_type != txs.chain_type() {
			return Err(CoreError::ChainTypeMismatch {
				chain_id: chain_id.clone(),
				expected: chain_type,
				actual: txs.chain_type(),
			});
		}

		match txs {
			ObservedTxs::Cardano(txs) => {
				self.cardano_receiver
					.new_unprocessed_txs(chain_id, txs)
					.await?
			}
			ObservedTxs::Evm(txs) => self.eth_receiver.new_unprocessed_txs(chain_id, txs).await?,
		}

		self.observers
			.get_required(chain_id)?
			.add_confirmed_block(&block)
			.await?;

		Ok(())
	}

	pub async fn apply_batch_event(&self, event: &BatchEvent) -> Result<(), CoreError> {
		if self.config.chain_type(&event.destination_chain_id).is_none() {
			return Err(CoreError::UnknownChain(event.destination_chain_id.clone()));
		}

		match event.event {
			BatchEventKind::Included => {
				self.states
					.included_in_batch(&event.destination_chain_id, event.batch_id, &event.source_txs)
					.await?
			}
			BatchEventKind::Submitted => {
				self.states
					.submitted_to_destination(&event.destination_chain_id, event.batch_id)
					.await?
			}
		}

		info!(
			destination_chain = %event.destination_chain_id,
			batch_id = event.batch_id,
			event = ?event.event,
			"Applied batch event"
		);

		Ok(())
	}
}
