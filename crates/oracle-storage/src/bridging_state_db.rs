//! Bridging request state records.

use crate::{keys, SharedStorage, StorageBatch, StorageError};
use oracle_types::{BridgingRequestState, ChainId, TxKey};
use tracing::debug;

#[derive(Clone)]
pub struct BridgingRequestStateDb {
	storage: SharedStorage,
}

impl BridgingRequestStateDb {
	pub fn new(storage: SharedStorage) -> Self {
		Self { storage }
	}

	pub async fn get(&self, key: &TxKey) -> Result<Option<BridgingRequestState>, StorageError> {
		self.storage.try_retrieve(&keys::bridging_request(key)).await
	}

	/// Inserts or replaces `state`.
	pub async fn put(&self, state: &BridgingRequestState) -> Result<(), StorageError> {
		self.put_multiple(std::slice::from_ref(state)).await
	}

	/// Writes the states together with their batch index entries.
	pub async fn put_multiple(&self, states: &[BridgingRequestState]) -> Result<(), StorageError> {
		let mut batch = StorageBatch::new();
		for state in states {
			let key = state.key();
			batch.put(keys::bridging_request(&key), state)?;

			if let (Some(destination), Some(batch_id)) = (&state.destination_chain_id, state.batch_id) {
				batch.put(keys::batch(destination, batch_id, &key), &key)?;
			}
		}

		self.storage.commit(batch).await
	}

	/// States included in batch `batch_id` towards `destination_chain_id`.
	///
	/// Index entries are never removed, so a state that moved on to another
	/// batch is filtered out here.
	pub async fn get_by_batch_id(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
	) -> Result<Vec<BridgingRequestState>, StorageError> {
		let indexed: Vec<TxKey> = self
			.storage
			.list(&keys::batch_prefix(destination_chain_id, batch_id), 0)
			.await?;

		let mut states = Vec::with_capacity(indexed.len());
		for key in indexed {
			match self.get(&key).await? {
				Some(state)
					if state.batch_id == Some(batch_id)
						&& state.destination_chain_id.as_ref() == Some(destination_chain_id) =>
				{
					states.push(state)
				}
				_ => debug!(tx = %key, batch_id, "Stale batch index entry"),
			}
		}

		Ok(states)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::StorageService;
	use std::sync::Arc;

	fn state(chain: &str, hash: &str, dest: &str, batch_id: Option<u64>) -> BridgingRequestState {
		let mut state = BridgingRequestState::new(chain.into(), hash.to_string(), false);
		state.destination_chain_id = Some(dest.into());
		state.batch_id = batch_id;
		state
	}

	#[tokio::test]
	async fn test_put_get_and_batch_lookup() {
		let db = BridgingRequestStateDb::new(Arc::new(StorageService::in_memory()));

		db.put_multiple(&[
			state("prime", "a", "vector", Some(3)),
			state("prime", "b", "vector", Some(4)),
			state("nexus", "c", "vector", Some(3)),
			state("prime", "d", "nexus", Some(3)),
		])
		.await
		.unwrap();

		let loaded = db.get(&TxKey::new("prime", "a")).await.unwrap().unwrap();
		assert_eq!(loaded.batch_id, Some(3));
		assert!(db.get(&TxKey::new("prime", "z")).await.unwrap().is_none());

		let in_batch = db.get_by_batch_id(&"vector".into(), 3).await.unwrap();
		let mut hashes: Vec<_> = in_batch.iter().map(|s| s.source_tx_hash.as_str()).collect();
		hashes.sort();
		assert_eq!(hashes, vec!["a", "c"]);
	}

	#[tokio::test]
	async fn test_moved_state_leaves_old_batch() {
		let db = BridgingRequestStateDb::new(Arc::new(StorageService::in_memory()));
		let mut moved = state("prime", "a", "vector", Some(3));
		db.put(&moved).await.unwrap();
		db.put(&state("prime", "b", "vector", Some(3))).await.unwrap();

		moved.batch_id = Some(5);
		db.put(&moved).await.unwrap();

		let old = db.get_by_batch_id(&"vector".into(), 3).await.unwrap();
		assert_eq!(old.len(), 1);
		assert_eq!(old[0].source_tx_hash, "b");

		let new = db.get_by_batch_id(&"vector".into(), 5).await.unwrap();
		assert_eq!(new.len(), 1);
		assert_eq!(new[0].source_tx_hash, "a");

		assert!(db.get_by_batch_id(&"vector".into(), 4).await.unwrap().is_empty());
	}
}
