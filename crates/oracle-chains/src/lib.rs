//! Chain observer access for the oracle.
//!
//! The indexers that follow each chain are external. What the oracle needs
//! from them is the list of confirmed blocks and the last block they fully
//! processed; both are recorded in storage as blocks are delivered and read
//! back through [`ChainObserverDb`].

use async_trait::async_trait;
use oracle_storage::StorageError;
use oracle_types::{BlockHash, BlockPoint, ChainId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod observer_db;
pub mod registry;

pub use observer_db::StorageChainObserverDb;
pub use registry::ChainObservers;

#[derive(Debug, Error)]
pub enum ChainObserverError {
	#[error("Chain {0} not registered")]
	NotRegistered(ChainId),
	#[error("Chain {0} already registered")]
	AlreadyRegistered(ChainId),
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

/// A block the indexer has confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmedBlock {
	/// Slot for Cardano, block number for EVM.
	pub number: u64,
	pub hash: BlockHash,
}

impl ConfirmedBlock {
	pub fn new(number: u64, hash: impl Into<BlockHash>) -> Self {
		Self {
			number,
			hash: hash.into(),
		}
	}

	pub fn point(&self) -> BlockPoint {
		BlockPoint::new(self.number, Some(self.hash.clone()))
	}
}

/// Read side of a chain indexer, one instance per chain.
#[async_trait]
pub trait ChainObserverDb: Send + Sync {
	fn chain_id(&self) -> &ChainId;

	/// Up to `limit` confirmed blocks with number `>= from`, ascending.
	async fn get_confirmed_blocks_from(
		&self,
		from: u64,
		limit: usize,
	) -> Result<Vec<ConfirmedBlock>, ChainObserverError>;

	async fn get_last_processed_block(&self) -> Result<Option<ConfirmedBlock>, ChainObserverError>;

	/// Records a block delivered by the indexer.
	async fn add_confirmed_block(&self, block: &ConfirmedBlock) -> Result<(), ChainObserverError>;
}
