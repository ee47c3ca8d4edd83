//! Entry point for confirmed transactions delivered by a chain observer.

use crate::processors::TxProcessorsCollection;
use crate::telemetry::{OracleCounter, OracleTelemetry};
use crate::ProcessorError;
use oracle_config::OracleConfig;
use oracle_state::BridgingRequestStateUpdater;
use oracle_storage::TxsProcessorDb;
use oracle_types::{BridgingTxType, ChainId, ChainTx, NewBridgingRequestStateModel};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Classifies new transactions of one chain family and stores the relevant ones.
pub struct TxsReceiver<T> {
	config: Arc<OracleConfig>,
	db: TxsProcessorDb<T>,
	processors: Arc<TxProcessorsCollection<T>>,
	state_updater: Arc<dyn BridgingRequestStateUpdater>,
	telemetry: Arc<OracleTelemetry>,
}

impl<T: ChainTx> TxsReceiver<T> {
	pub fn new(
		config: Arc<OracleConfig>,
		db: TxsProcessorDb<T>,
		processors: Arc<TxProcessorsCollection<T>>,
		state_updater: Arc<dyn BridgingRequestStateUpdater>,
		telemetry: Arc<OracleTelemetry>,
	) -> Self {
		Self {
			config,
			db,
			processors,
			state_updater,
			telemetry,
		}
	}

	/// Stores relevant `txs` as unprocessed and records the rest as invalid.
	///
	/// A storage failure is returned so the observer redelivers the block;
	/// redelivery is harmless because already processed txs are skipped.
	pub async fn new_unprocessed_txs(
		&self,
		origin_chain_id: &ChainId,
		txs: Vec<T>,
	) -> Result<(), ProcessorError> {
		let mut relevant = Vec::new();
		let mut irrelevant = Vec::new();
		let mut new_requests = Vec::new();

		for mut tx in txs {
			if tx.origin_chain_id() != origin_chain_id {
				warn!(
					tx = %tx.key(),
					expected_chain = %origin_chain_id,
					"Dropping tx delivered for another chain"
				);
				continue;
			}

			let processor = match self.processors.get_success(&tx, &self.config) {
				Ok(processor) => processor,
				Err(e) => {
					debug!(tx = %tx.key(), error = %e, "Tx is not relevant");
					irrelevant.push(tx.to_processed(true));
					continue;
				}
			};

			let tx_type = processor.tx_type();
			tx.set_priority(tx_type.priority());

			if tx_type == BridgingTxType::BridgingRequest {
				new_requests.push(NewBridgingRequestStateModel {
					source_tx_hash: tx.hash().clone(),
					is_refund: false,
				});
			}

			relevant.push(tx);
		}

		if !new_requests.is_empty() {
			if let Err(e) = self
				.state_updater
				.new_multiple(origin_chain_id, new_requests)
				.await
			{
				error!(chain_id = %origin_chain_id, error = %e, "Failed to add new bridging request states");
			}
		}

		if relevant.is_empty() && irrelevant.is_empty() {
			return Ok(());
		}

		self.db.add_txs(&irrelevant, &relevant).await?;

		info!(
			chain_id = %origin_chain_id,
			relevant = relevant.len(),
			irrelevant = irrelevant.len(),
			"Received new txs"
		);

		self.telemetry.add(
			OracleCounter::TxsReceived,
			origin_chain_id,
			(relevant.len() + irrelevant.len()) as u64,
		);
		self.telemetry.add(
			OracleCounter::InvalidMetadata,
			origin_chain_id,
			irrelevant.len() as u64,
		);

		Ok(())
	}
}
