//! The block cursor used while grouping claims.

use crate::chains::ChainId;
use crate::txs::{BlockHash, BlockPoint, ChainTx, ExpectedTx, ProcessedTx};
use serde::{Deserialize, Serialize};

/// Identifies the single block whose transactions are claimed in one inner iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeClaimsBlockInfo {
	pub chain_id: ChainId,
	pub position: u64,
	pub hash: Option<BlockHash>,
}

impl BridgeClaimsBlockInfo {
	pub fn new(chain_id: ChainId, point: BlockPoint) -> Self {
		Self {
			chain_id,
			position: point.position,
			hash: point.hash,
		}
	}

	pub fn point(&self) -> BlockPoint {
		BlockPoint::new(self.position, self.hash.clone())
	}

	pub fn equal_with_unprocessed<T: ChainTx>(&self, tx: &T) -> bool {
		tx.origin_chain_id() == &self.chain_id && tx.block_point() == self.point()
	}

	pub fn equal_with_processed(&self, tx: &ProcessedTx) -> bool {
		tx.origin_chain_id == self.chain_id
			&& tx.block_position == self.position
			&& self.hash.as_ref().map_or(true, |hash| hash == &tx.block_hash)
	}

	/// `expiry_block` is the block resolved for `tx.ttl` plus the insurance offset.
	pub fn equal_with_expected(&self, tx: &ExpectedTx, expiry_block: &BlockPoint) -> bool {
		tx.chain_id == self.chain_id && *expiry_block == self.point()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::txs::{CardanoTx, EthTx};

	fn cardano_tx(slot: u64, block_hash: &str) -> CardanoTx {
		CardanoTx {
			origin_chain_id: "prime".into(),
			priority: 1,
			block_slot: slot,
			block_hash: block_hash.to_string(),
			hash: "aa".to_string(),
			metadata: vec![],
			inputs: vec![],
			outputs: vec![],
			fee: 0,
			submit_try_count: 0,
			last_time_tried: 0,
		}
	}

	#[test]
	fn test_cardano_cursor_compares_slot_and_hash() {
		let info = BridgeClaimsBlockInfo::new(
			"prime".into(),
			BlockPoint::new(6, Some("b6".to_string())),
		);

		assert!(info.equal_with_unprocessed(&cardano_tx(6, "b6")));
		assert!(!info.equal_with_unprocessed(&cardano_tx(6, "other")));
		assert!(!info.equal_with_unprocessed(&cardano_tx(7, "b6")));

		let processed = cardano_tx(6, "b6").to_processed(false);
		assert!(info.equal_with_processed(&processed));
	}

	#[test]
	fn test_evm_cursor_compares_number_only() {
		let info = BridgeClaimsBlockInfo::new("nexus".into(), BlockPoint::new(9, None));
		let tx = EthTx {
			origin_chain_id: "nexus".into(),
			priority: 1,
			block_number: 9,
			block_hash: "whatever".to_string(),
			hash: "bb".to_string(),
			metadata: vec![],
			value: 0,
			submit_try_count: 0,
			last_time_tried: 0,
		};

		assert!(info.equal_with_unprocessed(&tx));
		assert!(info.equal_with_processed(&tx.to_processed(false)));
	}

	#[test]
	fn test_expected_uses_expiry_block() {
		let info = BridgeClaimsBlockInfo::new(
			"prime".into(),
			BlockPoint::new(6, Some("b6".to_string())),
		);
		let expected = ExpectedTx {
			chain_id: "prime".into(),
			hash: "cc".to_string(),
			ttl: 2,
			metadata: vec![],
			priority: 0,
			is_processed: false,
			is_invalid: false,
		};

		assert!(info.equal_with_expected(&expected, &BlockPoint::new(6, Some("b6".to_string()))));
		assert!(!info.equal_with_expected(&expected, &BlockPoint::new(4, Some("b4".to_string()))));
	}
}
