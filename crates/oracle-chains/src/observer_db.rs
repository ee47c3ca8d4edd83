//! Storage-backed chain observer database.

use crate::{ChainObserverDb, ChainObserverError, ConfirmedBlock};
use async_trait::async_trait;
use oracle_storage::{keys, SharedStorage, StorageBatch};
use oracle_types::ChainId;
use tracing::debug;

pub struct StorageChainObserverDb {
	chain_id: ChainId,
	storage: SharedStorage,
}

impl StorageChainObserverDb {
	pub fn new(chain_id: ChainId, storage: SharedStorage) -> Self {
		Self { chain_id, storage }
	}
}

#[async_trait]
impl ChainObserverDb for StorageChainObserverDb {
	fn chain_id(&self) -> &ChainId {
		&self.chain_id
	}

	async fn get_confirmed_blocks_from(
		&self,
		from: u64,
		limit: usize,
	) -> Result<Vec<ConfirmedBlock>, ChainObserverError> {
		Ok(self
			.storage
			.list_from(
				&keys::blocks_prefix(&self.chain_id),
				&keys::block(&self.chain_id, from),
				limit,
			)
			.await?)
	}

	async fn get_last_processed_block(&self) -> Result<Option<ConfirmedBlock>, ChainObserverError> {
		Ok(self
			.storage
			.try_retrieve(&keys::last_processed_block(&self.chain_id))
			.await?)
	}

	async fn add_confirmed_block(&self, block: &ConfirmedBlock) -> Result<(), ChainObserverError> {
		let mut batch = StorageBatch::new();
		batch.put(keys::block(&self.chain_id, block.number), block)?;

		let last = self.get_last_processed_block().await?;
		if last.map_or(true, |last| last.number < block.number) {
			batch.put(keys::last_processed_block(&self.chain_id), block)?;
		}

		debug!(chain_id = %self.chain_id, number = block.number, "Recorded confirmed block");
		Ok(self.storage.commit(batch).await?)
	}
}
