//! Persistence for the bridge oracle.
//!
//! Two layers: a byte-oriented [`StorageInterface`] implemented by the
//! memory and file backends, and the typed stores built on top of it through
//! [`StorageService`]. Every multi-record update goes through
//! [`StorageInterface::apply_batch`], which is atomic with respect to other
//! readers and writers of the same backend.

use async_trait::async_trait;
use oracle_config::{StorageBackend, StorageConfig};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod bridging_state_db;
pub mod keys;
pub mod txs_db;

pub mod implementations {
	pub mod file;
	pub mod memory;
}

pub use bridging_state_db::BridgingRequestStateDb;
pub use implementations::{file::FileStorage, memory::MemoryStorage};
pub use txs_db::TxsProcessorDb;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	#[error("Not found")]
	NotFound,
	#[error("Serialization error: {0}")]
	Serialization(String),
	#[error("Backend error: {0}")]
	Backend(String),
}

/// One write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
	Put { key: String, value: Vec<u8> },
	/// Skipped when `guard` exists at the point the op is applied.
	PutUnless {
		key: String,
		value: Vec<u8>,
		guard: String,
	},
	Delete { key: String },
}

/// Low-level key-value interface implemented by the storage backends.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deleting a missing key is not an error.
	async fn delete(&self, key: &str) -> Result<(), StorageError>;

	async fn exists(&self, key: &str) -> Result<bool, StorageError>;

	/// All entries whose key starts with `prefix`, sorted by key.
	async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

	/// Entries under `prefix` with key `>= start`, sorted by key. At most
	/// `limit` entries when `limit` is non-zero.
	async fn list_from(
		&self,
		prefix: &str,
		start: &str,
		limit: usize,
	) -> Result<Vec<(String, Vec<u8>)>, StorageError>;

	/// Applies every operation or none of them.
	async fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError>;
}

/// Collects typed writes to be committed together.
#[derive(Debug, Default)]
pub struct StorageBatch {
	ops: Vec<BatchOp>,
}

impl StorageBatch {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn put<T: Serialize>(&mut self, key: String, data: &T) -> Result<(), StorageError> {
		let value =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.ops.push(BatchOp::Put { key, value });
		Ok(())
	}

	/// Puts `data` under `key` unless `guard` exists when the batch commits.
	pub fn put_unless_exists<T: Serialize>(
		&mut self,
		key: String,
		guard: String,
		data: &T,
	) -> Result<(), StorageError> {
		let value =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.ops.push(BatchOp::PutUnless { key, value, guard });
		Ok(())
	}

	pub fn delete(&mut self, key: String) {
		self.ops.push(BatchOp::Delete { key });
	}

	pub fn is_empty(&self) -> bool {
		self.ops.is_empty()
	}

	pub fn len(&self) -> usize {
		self.ops.len()
	}
}

/// Typed JSON layer over a storage backend.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	/// Storage service over a fresh in-memory backend.
	pub fn in_memory() -> Self {
		Self::new(Box::new(MemoryStorage::new()))
	}

	pub async fn store<T: Serialize>(&self, key: &str, data: &T) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend.set_bytes(key, bytes).await
	}

	pub async fn retrieve<T: DeserializeOwned>(&self, key: &str) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(key).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Like [`retrieve`](Self::retrieve), mapping a missing key to `None`.
	pub async fn try_retrieve<T: DeserializeOwned>(
		&self,
		key: &str,
	) -> Result<Option<T>, StorageError> {
		match self.retrieve(key).await {
			Ok(value) => Ok(Some(value)),
			Err(StorageError::NotFound) => Ok(None),
			Err(e) => Err(e),
		}
	}

	pub async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		self.backend.exists(key).await
	}

	pub async fn remove(&self, key: &str) -> Result<(), StorageError> {
		self.backend.delete(key).await
	}

	/// Deserializes every value under `prefix`, in key order. At most `limit`
	/// values are returned when `limit` is non-zero.
	pub async fn list<T: DeserializeOwned>(
		&self,
		prefix: &str,
		limit: usize,
	) -> Result<Vec<T>, StorageError> {
		self.list_from(prefix, prefix, limit).await
	}

	/// Like [`list`](Self::list), starting at the first key `>= start`.
	pub async fn list_from<T: DeserializeOwned>(
		&self,
		prefix: &str,
		start: &str,
		limit: usize,
	) -> Result<Vec<T>, StorageError> {
		self.backend
			.list_from(prefix, start, limit)
			.await?
			.into_iter()
			.map(|(_, bytes)| {
				serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
			})
			.collect()
	}

	pub async fn commit(&self, batch: StorageBatch) -> Result<(), StorageError> {
		if batch.is_empty() {
			return Ok(());
		}

		self.backend.apply_batch(batch.ops).await
	}
}

/// Creates the backend selected in configuration.
pub async fn create_storage(
	config: &StorageConfig,
) -> Result<Box<dyn StorageInterface>, StorageError> {
	match config.backend {
		StorageBackend::Memory => Ok(Box::new(MemoryStorage::new())),
		StorageBackend::File => {
			let path = config.path.clone().ok_or_else(|| {
				StorageError::Backend("file storage requires a path".to_string())
			})?;
			Ok(Box::new(FileStorage::open(path).await?))
		}
	}
}

/// Shared storage service handle used across the workspace.
pub type SharedStorage = Arc<StorageService>;

#[cfg(test)]
mod tests {
	use super::*;
	use serde::Deserialize;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	struct Record {
		name: String,
		value: u64,
	}

	#[tokio::test]
	async fn test_typed_roundtrip_and_missing_key() {
		let service = StorageService::in_memory();
		let record = Record {
			name: "a".to_string(),
			value: 1,
		};

		service.store("records:a", &record).await.unwrap();

		let loaded: Record = service.retrieve("records:a").await.unwrap();
		assert_eq!(loaded, record);

		let missing: Option<Record> = service.try_retrieve("records:b").await.unwrap();
		assert!(missing.is_none());
		assert!(matches!(
			service.retrieve::<Record>("records:b").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_list_is_sorted_and_limited() {
		let service = StorageService::in_memory();
		for (key, value) in [("records:c", 3), ("records:a", 1), ("records:b", 2), ("other:z", 9)] {
			service
				.store(
					key,
					&Record {
						name: key.to_string(),
						value,
					},
				)
				.await
				.unwrap();
		}

		let all: Vec<Record> = service.list("records:", 0).await.unwrap();
		assert_eq!(
			all.iter().map(|r| r.value).collect::<Vec<_>>(),
			vec![1, 2, 3]
		);

		let first_two: Vec<Record> = service.list("records:", 2).await.unwrap();
		assert_eq!(first_two.len(), 2);

		let from_b: Vec<Record> = service.list_from("records:", "records:b", 1).await.unwrap();
		assert_eq!(from_b.iter().map(|r| r.value).collect::<Vec<_>>(), vec![2]);

		let past_prefix: Vec<Record> = service.list_from("records:", "records:d", 0).await.unwrap();
		assert!(past_prefix.is_empty());
	}

	#[tokio::test]
	async fn test_commit_batch() {
		let service = StorageService::in_memory();
		service.store("records:old", &1u64).await.unwrap();

		let mut batch = StorageBatch::new();
		batch.delete("records:old".to_string());
		batch.put("records:new".to_string(), &2u64).unwrap();
		service.commit(batch).await.unwrap();

		assert!(!service.exists("records:old").await.unwrap());
		assert_eq!(service.retrieve::<u64>("records:new").await.unwrap(), 2);

		service.commit(StorageBatch::new()).await.unwrap();
	}

	#[tokio::test]
	async fn test_guarded_put_checks_guard_at_commit() {
		let service = StorageService::in_memory();

		let mut batch = StorageBatch::new();
		batch
			.put_unless_exists("pending:a".to_string(), "done:a".to_string(), &1u64)
			.unwrap();
		batch
			.put_unless_exists("pending:b".to_string(), "done:b".to_string(), &2u64)
			.unwrap();

		// The guard appears after the batch was built but before it commits.
		service.store("done:a", &true).await.unwrap();
		service.commit(batch).await.unwrap();

		assert!(!service.exists("pending:a").await.unwrap());
		assert_eq!(service.retrieve::<u64>("pending:b").await.unwrap(), 2);
	}

	#[tokio::test]
	async fn test_create_storage_from_config() {
		let memory = create_storage(&StorageConfig::default()).await.unwrap();
		memory.set_bytes("k", vec![1]).await.unwrap();
		assert!(memory.exists("k").await.unwrap());

		let missing_path = StorageConfig {
			backend: StorageBackend::File,
			path: None,
		};
		assert!(create_storage(&missing_path).await.is_err());
	}
}
