//! Unprocessed, processed and expected transaction stores for one chain family.

use crate::{keys, SharedStorage, StorageBatch, StorageError};
use oracle_types::{
	ChainId, ChainTx, ExpectedTx, ProcessedTx, TxKey, LAST_PROCESSING_PRIORITY,
};
use std::marker::PhantomData;
use tracing::debug;

/// Transaction store used by the receiver and the state processor of the
/// chain family `T`.
pub struct TxsProcessorDb<T> {
	storage: SharedStorage,
	_tx: PhantomData<fn() -> T>,
}

impl<T> Clone for TxsProcessorDb<T> {
	fn clone(&self) -> Self {
		Self {
			storage: self.storage.clone(),
			_tx: PhantomData,
		}
	}
}

impl<T: ChainTx> TxsProcessorDb<T> {
	pub fn new(storage: SharedStorage) -> Self {
		Self {
			storage,
			_tx: PhantomData,
		}
	}

	/// Unprocessed txs of `(chain_id, priority)` in ascending block position.
	/// `limit == 0` means no limit.
	pub async fn get_unprocessed_txs(
		&self,
		chain_id: &ChainId,
		priority: u8,
		limit: usize,
	) -> Result<Vec<T>, StorageError> {
		self.storage
			.list(&keys::unprocessed_prefix(chain_id, priority), limit)
			.await
	}

	/// Pending expected txs of `(chain_id, priority)` in ascending TTL.
	pub async fn get_expected_txs(
		&self,
		chain_id: &ChainId,
		priority: u8,
		limit: usize,
	) -> Result<Vec<ExpectedTx>, StorageError> {
		self.storage
			.list(&keys::expected_prefix(chain_id, priority), limit)
			.await
	}

	pub async fn get_processed_tx(&self, key: &TxKey) -> Result<Option<ProcessedTx>, StorageError> {
		self.storage.try_retrieve(&keys::processed(key)).await
	}

	/// Expected tx that was already marked processed or invalid.
	pub async fn get_resolved_expected_tx(
		&self,
		key: &TxKey,
	) -> Result<Option<ExpectedTx>, StorageError> {
		self.storage.try_retrieve(&keys::expected_resolved(key)).await
	}

	/// Writes new processed records and unprocessed txs in one batch.
	///
	/// Processed records are write-once, and an unprocessed tx whose key already
	/// has a processed record is skipped, so redelivering a block is harmless.
	/// Both conditions are checked when the batch commits, not before.
	pub async fn add_txs(&self, processed: &[ProcessedTx], unprocessed: &[T]) -> Result<(), StorageError> {
		let mut batch = StorageBatch::new();

		for tx in processed {
			let key = keys::processed(&tx.key());
			batch.put_unless_exists(key.clone(), key, tx)?;
		}

		for tx in unprocessed {
			batch.put_unless_exists(unprocessed_key(tx), keys::processed(&tx.key()), tx)?;
		}

		debug!(
			processed = processed.len(),
			unprocessed = unprocessed.len(),
			"Adding txs"
		);
		self.storage.commit(batch).await
	}

	/// Rewrites unprocessed txs in place, e.g. after their retry counters
	/// changed. Txs that were processed meanwhile are not brought back.
	pub async fn update_unprocessed_txs(&self, txs: &[T]) -> Result<(), StorageError> {
		let mut batch = StorageBatch::new();

		for tx in txs {
			batch.put_unless_exists(unprocessed_key(tx), keys::processed(&tx.key()), tx)?;
		}

		self.storage.commit(batch).await
	}

	/// Moves txs from unprocessed to processed: one atomic delete + write per tx.
	pub async fn mark_unprocessed_txs_as_processed(
		&self,
		processed: &[ProcessedTx],
	) -> Result<(), StorageError> {
		let mut batch = StorageBatch::new();

		for tx in processed {
			batch.delete(keys::unprocessed(
				&tx.origin_chain_id,
				tx.priority,
				tx.block_position,
				&tx.hash,
			));
			batch.put(keys::processed(&tx.key()), tx)?;
		}

		self.storage.commit(batch).await
	}

	/// Lowest block position holding an unprocessed tx of `chain_id`.
	pub async fn first_unprocessed_position(&self, chain_id: &ChainId) -> Result<Option<u64>, StorageError> {
		let mut first: Option<u64> = None;
		for priority in 0..=LAST_PROCESSING_PRIORITY {
			if let Some(tx) = self.get_unprocessed_txs(chain_id, priority, 1).await?.first() {
				let position = tx.block_position();
				first = Some(first.map_or(position, |current| current.min(position)));
			}
		}

		Ok(first)
	}

	pub async fn get_last_submitted_block(&self, chain_id: &ChainId) -> Result<Option<u64>, StorageError> {
		self.storage
			.try_retrieve(&keys::last_submitted_block(chain_id))
			.await
	}

	pub async fn set_last_submitted_block(&self, chain_id: &ChainId, number: u64) -> Result<(), StorageError> {
		self.storage
			.store(&keys::last_submitted_block(chain_id), &number)
			.await
	}

	/// Stores expected txs announced by the bridge. Txs that are already
	/// resolved are ignored.
	pub async fn add_expected_txs(&self, txs: &[ExpectedTx]) -> Result<usize, StorageError> {
		let mut batch = StorageBatch::new();

		for tx in txs {
			if self.storage.exists(&keys::expected_resolved(&tx.key())).await? {
				continue;
			}

			batch.put(
				keys::expected(&tx.chain_id, tx.priority, tx.ttl, &tx.hash),
				tx,
			)?;
		}

		let added = batch.len();
		self.storage.commit(batch).await?;
		Ok(added)
	}

	pub async fn mark_expected_txs_as_processed(&self, txs: &[ExpectedTx]) -> Result<(), StorageError> {
		self.resolve_expected_txs(txs, false).await
	}

	pub async fn mark_expected_txs_as_invalid(&self, txs: &[ExpectedTx]) -> Result<(), StorageError> {
		self.resolve_expected_txs(txs, true).await
	}

	async fn resolve_expected_txs(&self, txs: &[ExpectedTx], invalid: bool) -> Result<(), StorageError> {
		let mut batch = StorageBatch::new();

		for tx in txs {
			let mut resolved = tx.clone();
			resolved.is_processed = !invalid;
			resolved.is_invalid = invalid;

			batch.delete(keys::expected(&tx.chain_id, tx.priority, tx.ttl, &tx.hash));
			batch.put(keys::expected_resolved(&tx.key()), &resolved)?;
		}

		self.storage.commit(batch).await
	}
}

fn unprocessed_key<T: ChainTx>(tx: &T) -> String {
	keys::unprocessed(tx.origin_chain_id(), tx.priority(), tx.block_position(), tx.hash())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::StorageService;
	use oracle_types::CardanoTx;
	use std::sync::Arc;

	fn db() -> TxsProcessorDb<CardanoTx> {
		TxsProcessorDb::new(Arc::new(StorageService::in_memory()))
	}

	fn tx(hash: &str, slot: u64, priority: u8) -> CardanoTx {
		CardanoTx {
			origin_chain_id: "prime".into(),
			priority,
			block_slot: slot,
			block_hash: format!("b{}", slot),
			hash: hash.to_string(),
			metadata: vec![],
			inputs: vec![],
			outputs: vec![],
			fee: 0,
			submit_try_count: 0,
			last_time_tried: 0,
		}
	}

	fn expected(hash: &str, ttl: u64) -> ExpectedTx {
		ExpectedTx {
			chain_id: "prime".into(),
			hash: hash.to_string(),
			ttl,
			metadata: vec![],
			priority: 0,
			is_processed: false,
			is_invalid: false,
		}
	}

	#[tokio::test]
	async fn test_unprocessed_ordered_by_position_per_priority() {
		let db = db();
		let chain = ChainId::from("prime");

		db.add_txs(&[], &[tx("c", 100, 1), tx("a", 9, 1), tx("b", 10, 0)])
			.await
			.unwrap();

		let normal = db.get_unprocessed_txs(&chain, 1, 0).await.unwrap();
		assert_eq!(
			normal.iter().map(|t| t.hash.as_str()).collect::<Vec<_>>(),
			vec!["a", "c"]
		);

		let batch = db.get_unprocessed_txs(&chain, 0, 0).await.unwrap();
		assert_eq!(batch.len(), 1);

		let limited = db.get_unprocessed_txs(&chain, 1, 1).await.unwrap();
		assert_eq!(limited[0].hash, "a");
	}

	#[tokio::test]
	async fn test_move_to_processed_is_exactly_once() {
		let db = db();
		let chain = ChainId::from("prime");
		let pending = tx("a", 6, 1);

		db.add_txs(&[], &[pending.clone()]).await.unwrap();
		let processed = pending.to_processed(false);
		db.mark_unprocessed_txs_as_processed(&[processed.clone()])
			.await
			.unwrap();

		assert!(db.get_unprocessed_txs(&chain, 1, 0).await.unwrap().is_empty());
		assert_eq!(
			db.get_processed_tx(&pending.key()).await.unwrap(),
			Some(processed.clone())
		);

		// Retrying the move and redelivering the tx leave the store unchanged.
		db.mark_unprocessed_txs_as_processed(&[processed.clone()])
			.await
			.unwrap();
		db.add_txs(&[], &[pending]).await.unwrap();
		assert!(db.get_unprocessed_txs(&chain, 1, 0).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_unprocessed_tx_not_added_once_processed_record_commits_first() {
		let db = db();
		let chain = ChainId::from("prime");
		let redelivered = tx("a", 6, 1);

		// The receiver saw no processed record, then the processor moved the
		// earlier copy before the receiver committed.
		db.add_txs(&[], &[redelivered.clone()]).await.unwrap();
		db.mark_unprocessed_txs_as_processed(&[redelivered.to_processed(false)])
			.await
			.unwrap();
		db.add_txs(&[], &[redelivered.clone()]).await.unwrap();

		assert!(db.get_unprocessed_txs(&chain, 1, 0).await.unwrap().is_empty());

		let mut retried = redelivered.clone();
		retried.submit_try_count = 1;
		db.update_unprocessed_txs(&[retried]).await.unwrap();
		assert!(db.get_unprocessed_txs(&chain, 1, 0).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_update_rewrites_unprocessed_tx() {
		let db = db();
		let chain = ChainId::from("prime");
		let mut pending = tx("a", 6, 1);
		db.add_txs(&[], &[pending.clone()]).await.unwrap();

		pending.submit_try_count = 2;
		pending.last_time_tried = 1_700_000_000;
		db.update_unprocessed_txs(&[pending.clone()]).await.unwrap();

		assert_eq!(db.get_unprocessed_txs(&chain, 1, 0).await.unwrap(), vec![pending]);
	}

	#[tokio::test]
	async fn test_processed_records_are_write_once() {
		let db = db();
		let original = tx("a", 6, 1).to_processed(true);
		db.add_txs(&[original.clone()], &[]).await.unwrap();

		let mut other = original.clone();
		other.is_invalid = false;
		db.add_txs(&[other], &[]).await.unwrap();

		assert_eq!(
			db.get_processed_tx(&original.key()).await.unwrap(),
			Some(original)
		);
	}

	#[tokio::test]
	async fn test_first_unprocessed_position_spans_priorities() {
		let db = db();
		let chain = ChainId::from("prime");
		assert_eq!(db.first_unprocessed_position(&chain).await.unwrap(), None);

		db.add_txs(&[], &[tx("late", 30, 1), tx("batch", 12, 0), tx("early", 9, 1)])
			.await
			.unwrap();
		assert_eq!(db.first_unprocessed_position(&chain).await.unwrap(), Some(9));

		assert_eq!(db.get_last_submitted_block(&chain).await.unwrap(), None);
		db.set_last_submitted_block(&chain, 8).await.unwrap();
		assert_eq!(db.get_last_submitted_block(&chain).await.unwrap(), Some(8));
	}

	#[tokio::test]
	async fn test_expected_lifecycle() {
		let db = db();
		let chain = ChainId::from("prime");

		let added = db
			.add_expected_txs(&[expected("late", 20), expected("early", 2)])
			.await
			.unwrap();
		assert_eq!(added, 2);

		let pending = db.get_expected_txs(&chain, 0, 0).await.unwrap();
		assert_eq!(
			pending.iter().map(|t| t.hash.as_str()).collect::<Vec<_>>(),
			vec!["early", "late"]
		);

		db.mark_expected_txs_as_processed(&[pending[0].clone()])
			.await
			.unwrap();
		db.mark_expected_txs_as_invalid(&[pending[1].clone()])
			.await
			.unwrap();
		assert!(db.get_expected_txs(&chain, 0, 0).await.unwrap().is_empty());

		let resolved = db
			.get_resolved_expected_tx(&pending[0].key())
			.await
			.unwrap()
			.unwrap();
		assert!(resolved.is_processed);
		assert!(!resolved.is_invalid);

		// The bridge announcing a resolved tx again does not resurrect it.
		let added = db.add_expected_txs(&[expected("early", 2)]).await.unwrap();
		assert_eq!(added, 0);
		assert!(db.get_expected_txs(&chain, 0, 0).await.unwrap().is_empty());
	}
}
