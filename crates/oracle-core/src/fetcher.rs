//! Polls the bridge for the transactions it expects to see on each chain.

use crate::error::CoreError;
use oracle_bridge::BridgeInterface;
use oracle_storage::TxsProcessorDb;
use oracle_types::{
	unmarshal_metadata, BaseMetadata, ChainId, ChainTx, ExpectedTx, PRIORITY_BATCH_EXECUTION,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Stores expected txs for the chains of one family.
///
/// A chain is only asked again once its previous expected tx was resolved:
/// the bridge does not create a new batch for a chain before the oracle has
/// claimed the outcome of the last one.
pub struct ExpectedTxsFetcher<T> {
	chain_ids: Vec<ChainId>,
	bridge: Arc<dyn BridgeInterface>,
	db: TxsProcessorDb<T>,
	poll_interval: Duration,
}

impl<T: ChainTx> ExpectedTxsFetcher<T> {
	pub fn new(
		chain_ids: Vec<ChainId>,
		bridge: Arc<dyn BridgeInterface>,
		db: TxsProcessorDb<T>,
		poll_interval: Duration,
	) -> Self {
		Self {
			chain_ids,
			bridge,
			db,
			poll_interval,
		}
	}

	pub async fn start(self, mut shutdown_rx: broadcast::Receiver<()>) {
		info!(chain_type = %T::CHAIN_TYPE, "Starting expected txs fetcher");

		loop {
			tokio::select! {
				_ = tokio::time::sleep(self.poll_interval) => {
					if let Err(e) = self.fetch_data().await {
						error!(chain_type = %T::CHAIN_TYPE, error = %e, "Error while fetching expected txs");
					}
				}
				_ = shutdown_rx.recv() => {
					info!(chain_type = %T::CHAIN_TYPE, "Expected txs fetcher received shutdown signal");
					break;
				}
			}
		}
	}

	/// One polling round. Returns how many new expected txs were stored.
	pub async fn fetch_data(&self) -> Result<usize, CoreError> {
		let mut expected_txs = Vec::new();

		for chain_id in &self.chain_ids {
			match self
				.db
				.get_expected_txs(chain_id, PRIORITY_BATCH_EXECUTION, 1)
				.await
			{
				Ok(pending) if !pending.is_empty() => {
					debug!(chain_id = %chain_id, "Previous expected tx still pending");
					continue;
				}
				Ok(_) => {}
				Err(e) => {
					error!(chain_id = %chain_id, error = %e, "Failed to get expected txs from db");
					continue;
				}
			}

			let fetched = match self.bridge.get_expected_txs(chain_id).await {
				Ok(fetched) => fetched,
				Err(e) => {
					error!(chain_id = %chain_id, error = %e, "Failed to fetch expected txs from bridge");
					continue;
				}
			};

			debug!(chain_id = %chain_id, count = fetched.len(), "Fetched expected txs");

			expected_txs.extend(
				fetched
					.into_iter()
					.filter_map(|tx| Self::prepare(chain_id, tx)),
			);
		}

		if expected_txs.is_empty() {
			return Ok(0);
		}

		let added = self.db.add_expected_txs(&expected_txs).await?;
		if added > 0 {
			info!(chain_type = %T::CHAIN_TYPE, added, "Added expected txs");
		}

		Ok(added)
	}

	fn prepare(chain_id: &ChainId, mut tx: ExpectedTx) -> Option<ExpectedTx> {
		if &tx.chain_id != chain_id {
			warn!(
				chain_id = %chain_id,
				tx = %tx.key(),
				"Bridge returned an expected tx of another chain"
			);
			return None;
		}

		let metadata: BaseMetadata = match unmarshal_metadata(&tx.metadata) {
			Ok(metadata) => metadata,
			Err(e) => {
				warn!(tx = %tx.key(), error = %e, "Skipping expected tx with invalid metadata");
				return None;
			}
		};

		tx.priority = metadata.bridging_tx_type.priority();
		tx.is_processed = false;
		tx.is_invalid = false;
		Some(tx)
	}
}
