//! Transactions as delivered by the chain indexers and as tracked by the oracle.

use crate::chains::{ChainId, ChainType};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

pub type TxHash = String;
pub type BlockHash = String;

/// Priority tier of batch execution transactions. Processed before everything else.
pub const PRIORITY_BATCH_EXECUTION: u8 = 0;
/// Priority tier of every other relevant transaction.
pub const PRIORITY_DEFAULT: u8 = 1;
/// Highest (numerically) priority tier the processors iterate over.
pub const LAST_PROCESSING_PRIORITY: u8 = 1;

/// Identity of a transaction across all stores: (origin chain, hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxKey {
	pub chain_id: ChainId,
	pub hash: TxHash,
}

impl TxKey {
	pub fn new(chain_id: impl Into<ChainId>, hash: impl Into<TxHash>) -> Self {
		Self {
			chain_id: chain_id.into(),
			hash: hash.into(),
		}
	}
}

impl fmt::Display for TxKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.chain_id, self.hash)
	}
}

/// A block position: slot (Cardano) or number (EVM), plus the block hash where
/// the chain family identifies blocks by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPoint {
	pub position: u64,
	pub hash: Option<BlockHash>,
}

impl BlockPoint {
	pub fn new(position: u64, hash: Option<BlockHash>) -> Self {
		Self { position, hash }
	}
}

/// Behaviour shared by the chain-family transaction types.
pub trait ChainTx:
	Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
	const CHAIN_TYPE: ChainType;

	fn origin_chain_id(&self) -> &ChainId;
	fn hash(&self) -> &TxHash;
	/// Slot for Cardano, block number for EVM.
	fn block_position(&self) -> u64;
	fn block_hash(&self) -> &BlockHash;
	fn metadata(&self) -> &[u8];
	fn priority(&self) -> u8;
	fn set_priority(&mut self, priority: u8);

	/// Failed submissions this tx was the only claim of.
	fn submit_try_count(&self) -> u32;
	/// Unix seconds of the last failed submission, `0` when never tried.
	fn last_time_tried(&self) -> u64;
	/// Records a failed submission at `now` (unix seconds).
	fn mark_tried(&mut self, now: u64);

	fn key(&self) -> TxKey {
		TxKey::new(self.origin_chain_id().clone(), self.hash().clone())
	}

	/// Position of the containing block as compared against a claims cursor.
	fn block_point(&self) -> BlockPoint {
		let hash = Self::CHAIN_TYPE
			.compares_block_hash()
			.then(|| self.block_hash().clone());

		BlockPoint::new(self.block_position(), hash)
	}

	fn to_processed(&self, is_invalid: bool) -> ProcessedTx {
		ProcessedTx {
			origin_chain_id: self.origin_chain_id().clone(),
			hash: self.hash().clone(),
			block_position: self.block_position(),
			block_hash: self.block_hash().clone(),
			priority: self.priority(),
			is_invalid,
		}
	}
}

/// UTXO input, resolved to the output it spends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
	pub hash: TxHash,
	pub index: u32,
	pub address: String,
	pub amount: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
	pub address: String,
	pub amount: u64,
}

/// Confirmed transaction on a Cardano chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardanoTx {
	pub origin_chain_id: ChainId,
	#[serde(default)]
	pub priority: u8,
	pub block_slot: u64,
	pub block_hash: BlockHash,
	pub hash: TxHash,
	#[serde(with = "crate::serde_helpers::hex_bytes", default)]
	pub metadata: Vec<u8>,
	#[serde(default)]
	pub inputs: Vec<TxInput>,
	#[serde(default)]
	pub outputs: Vec<TxOutput>,
	#[serde(default)]
	pub fee: u64,
	#[serde(default)]
	pub submit_try_count: u32,
	#[serde(default)]
	pub last_time_tried: u64,
}

impl ChainTx for CardanoTx {
	const CHAIN_TYPE: ChainType = ChainType::Cardano;

	fn origin_chain_id(&self) -> &ChainId {
		&self.origin_chain_id
	}

	fn hash(&self) -> &TxHash {
		&self.hash
	}

	fn block_position(&self) -> u64 {
		self.block_slot
	}

	fn block_hash(&self) -> &BlockHash {
		&self.block_hash
	}

	fn metadata(&self) -> &[u8] {
		&self.metadata
	}

	fn priority(&self) -> u8 {
		self.priority
	}

	fn set_priority(&mut self, priority: u8) {
		self.priority = priority;
	}

	fn submit_try_count(&self) -> u32 {
		self.submit_try_count
	}

	fn last_time_tried(&self) -> u64 {
		self.last_time_tried
	}

	fn mark_tried(&mut self, now: u64) {
		self.submit_try_count = self.submit_try_count.saturating_add(1);
		self.last_time_tried = now;
	}
}

/// Confirmed bridging transaction (gateway event) on an EVM chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthTx {
	pub origin_chain_id: ChainId,
	#[serde(default)]
	pub priority: u8,
	pub block_number: u64,
	pub block_hash: BlockHash,
	pub hash: TxHash,
	#[serde(with = "crate::serde_helpers::hex_bytes", default)]
	pub metadata: Vec<u8>,
	/// Amount of native currency locked by the transaction.
	#[serde(default)]
	pub value: u128,
	#[serde(default)]
	pub submit_try_count: u32,
	#[serde(default)]
	pub last_time_tried: u64,
}

impl ChainTx for EthTx {
	const CHAIN_TYPE: ChainType = ChainType::Evm;

	fn origin_chain_id(&self) -> &ChainId {
		&self.origin_chain_id
	}

	fn hash(&self) -> &TxHash {
		&self.hash
	}

	fn block_position(&self) -> u64 {
		self.block_number
	}

	fn block_hash(&self) -> &BlockHash {
		&self.block_hash
	}

	fn metadata(&self) -> &[u8] {
		&self.metadata
	}

	fn priority(&self) -> u8 {
		self.priority
	}

	fn set_priority(&mut self, priority: u8) {
		self.priority = priority;
	}

	fn submit_try_count(&self) -> u32 {
		self.submit_try_count
	}

	fn last_time_tried(&self) -> u64 {
		self.last_time_tried
	}

	fn mark_tried(&mut self, now: u64) {
		self.submit_try_count = self.submit_try_count.saturating_add(1);
		self.last_time_tried = now;
	}
}

/// Write-once record of a transaction the oracle is done with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedTx {
	pub origin_chain_id: ChainId,
	pub hash: TxHash,
	pub block_position: u64,
	pub block_hash: BlockHash,
	pub priority: u8,
	pub is_invalid: bool,
}

impl ProcessedTx {
	pub fn key(&self) -> TxKey {
		TxKey::new(self.origin_chain_id.clone(), self.hash.clone())
	}
}

/// A transaction the bridge expects to appear on `chain_id` before `ttl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedTx {
	pub chain_id: ChainId,
	pub hash: TxHash,
	pub ttl: u64,
	#[serde(with = "crate::serde_helpers::hex_bytes", default)]
	pub metadata: Vec<u8>,
	#[serde(default)]
	pub priority: u8,
	#[serde(default)]
	pub is_processed: bool,
	#[serde(default)]
	pub is_invalid: bool,
}

impl ExpectedTx {
	pub fn key(&self) -> TxKey {
		TxKey::new(self.chain_id.clone(), self.hash.clone())
	}
}
