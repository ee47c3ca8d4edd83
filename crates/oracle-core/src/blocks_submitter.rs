//! Reports confirmed blocks of one chain to the bridge.
//!
//! A block is only reported once every transaction up to and including it
//! has left the unprocessed store, so the bridge never learns about a block
//! the oracle could still claim something from. Progress is stored per
//! chain and survives restarts.

use crate::error::CoreError;
use oracle_bridge::BridgeInterface;
use oracle_chains::{ChainObserverDb, ConfirmedBlock};
use oracle_storage::TxsProcessorDb;
use oracle_types::{ChainId, ChainTx};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

pub struct ConfirmedBlocksSubmitter<T> {
	chain_id: ChainId,
	bridge: Arc<dyn BridgeInterface>,
	observer: Arc<dyn ChainObserverDb>,
	db: TxsProcessorDb<T>,
	interval: Duration,
	threshold: usize,
	last_submitted: Option<u64>,
}

impl<T: ChainTx> ConfirmedBlocksSubmitter<T> {
	/// Resumes after the last block stored as submitted for the observer's chain.
	pub async fn new(
		bridge: Arc<dyn BridgeInterface>,
		observer: Arc<dyn ChainObserverDb>,
		db: TxsProcessorDb<T>,
		interval: Duration,
		threshold: usize,
	) -> Result<Self, CoreError> {
		let chain_id = observer.chain_id().clone();
		let last_submitted = db.get_last_submitted_block(&chain_id).await?;

		Ok(Self {
			chain_id,
			bridge,
			observer,
			db,
			interval,
			threshold,
			last_submitted,
		})
	}

	pub fn chain_id(&self) -> &ChainId {
		&self.chain_id
	}

	pub fn last_submitted(&self) -> Option<u64> {
		self.last_submitted
	}

	pub async fn start(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
		info!(chain_id = %self.chain_id, "Starting confirmed blocks submitter");

		loop {
			tokio::select! {
				_ = tokio::time::sleep(self.interval) => {
					if let Err(e) = self.execute().await {
						error!(chain_id = %self.chain_id, error = %e, "Error while submitting confirmed blocks");
					}
				}
				_ = shutdown_rx.recv() => {
					info!(chain_id = %self.chain_id, "Confirmed blocks submitter received shutdown signal");
					break;
				}
			}
		}
	}

	/// One round. Returns how many blocks were reported.
	pub async fn execute(&mut self) -> Result<usize, CoreError> {
		let from = self.last_submitted.map_or(0, |last| last + 1);
		let blocks = self.blocks_to_submit(from).await?;

		let Some(last) = blocks.last().map(|block| block.number) else {
			return Ok(0);
		};

		self.bridge
			.submit_confirmed_blocks(&self.chain_id, &blocks)
			.await?;
		self.db
			.set_last_submitted_block(&self.chain_id, last)
			.await?;
		self.last_submitted = Some(last);

		info!(
			chain_id = %self.chain_id,
			count = blocks.len(),
			last,
			"Submitted confirmed blocks"
		);

		Ok(blocks.len())
	}

	async fn blocks_to_submit(&self, from: u64) -> Result<Vec<ConfirmedBlock>, CoreError> {
		debug!(chain_id = %self.chain_id, from, "Collecting confirmed blocks");

		let blocks = self
			.observer
			.get_confirmed_blocks_from(from, self.threshold)
			.await?;

		// Stop before the first block that still has work pending.
		let pending_from = self.db.first_unprocessed_position(&self.chain_id).await?;

		Ok(blocks
			.into_iter()
			.take_while(|block| pending_from.map_or(true, |pending| block.number < pending))
			.collect())
	}
}
