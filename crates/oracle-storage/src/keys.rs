//! Storage key layout.
//!
//! Numeric components are zero-padded to 20 digits so lexicographic key order
//! matches numeric order in prefix scans.

use oracle_types::{ChainId, TxKey};

pub const UNPROCESSED: &str = "unprocessed";
pub const PROCESSED: &str = "processed";
pub const EXPECTED: &str = "expected";
pub const EXPECTED_RESOLVED: &str = "expected_resolved";
pub const BRIDGING_REQUEST: &str = "bridging_request";
pub const BATCH: &str = "batch";
pub const BLOCKS: &str = "blocks";
pub const LAST_PROCESSED_BLOCK: &str = "last_processed_block";
pub const LAST_SUBMITTED_BLOCK: &str = "last_submitted_block";

pub fn unprocessed_prefix(chain_id: &ChainId, priority: u8) -> String {
	format!("{}:{}:{}:", UNPROCESSED, chain_id, priority)
}

pub fn unprocessed(chain_id: &ChainId, priority: u8, position: u64, hash: &str) -> String {
	format!(
		"{}{:020}:{}",
		unprocessed_prefix(chain_id, priority),
		position,
		hash
	)
}

pub fn processed(key: &TxKey) -> String {
	format!("{}:{}:{}", PROCESSED, key.chain_id, key.hash)
}

pub fn expected_prefix(chain_id: &ChainId, priority: u8) -> String {
	format!("{}:{}:{}:", EXPECTED, chain_id, priority)
}

pub fn expected(chain_id: &ChainId, priority: u8, ttl: u64, hash: &str) -> String {
	format!("{}{:020}:{}", expected_prefix(chain_id, priority), ttl, hash)
}

pub fn expected_resolved(key: &TxKey) -> String {
	format!("{}:{}:{}", EXPECTED_RESOLVED, key.chain_id, key.hash)
}

pub fn bridging_request_prefix() -> String {
	format!("{}:", BRIDGING_REQUEST)
}

pub fn bridging_request(key: &TxKey) -> String {
	format!("{}:{}:{}", BRIDGING_REQUEST, key.chain_id, key.hash)
}

/// Index of the requests carried by batch `batch_id` towards `destination`.
pub fn batch_prefix(destination: &ChainId, batch_id: u64) -> String {
	format!("{}:{}:{:020}:", BATCH, destination, batch_id)
}

pub fn batch(destination: &ChainId, batch_id: u64, key: &TxKey) -> String {
	format!(
		"{}{}:{}",
		batch_prefix(destination, batch_id),
		key.chain_id,
		key.hash
	)
}

pub fn blocks_prefix(chain_id: &ChainId) -> String {
	format!("{}:{}:", BLOCKS, chain_id)
}

pub fn block(chain_id: &ChainId, position: u64) -> String {
	format!("{}{:020}", blocks_prefix(chain_id), position)
}

pub fn last_processed_block(chain_id: &ChainId) -> String {
	format!("{}:{}", LAST_PROCESSED_BLOCK, chain_id)
}

/// Last block reported to the bridge as confirmed.
pub fn last_submitted_block(chain_id: &ChainId) -> String {
	format!("{}:{}", LAST_SUBMITTED_BLOCK, chain_id)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_positions_sort_numerically() {
		let chain = ChainId::from("prime");
		let low = unprocessed(&chain, 1, 9, "ff");
		let high = unprocessed(&chain, 1, 10, "00");

		assert!(low < high);
		assert!(low.starts_with(&unprocessed_prefix(&chain, 1)));
		assert_eq!(low, "unprocessed:prime:1:00000000000000000009:ff");
	}

	#[test]
	fn test_block_keys() {
		let chain = ChainId::from("nexus");
		assert_eq!(block(&chain, 5), "blocks:nexus:00000000000000000005");
		assert_eq!(last_processed_block(&chain), "last_processed_block:nexus");
	}

	#[test]
	fn test_batch_index_keys() {
		let key = batch(&"vector".into(), 3, &TxKey::new("prime", "ab"));
		assert_eq!(key, "batch:vector:00000000000000000003:prime:ab");
		assert!(key.starts_with(&batch_prefix(&"vector".into(), 3)));
		assert!(!key.starts_with(&batch_prefix(&"vector".into(), 30)));
	}
}
