//! In-memory storage implementation.

use crate::{BatchOp, StorageError, StorageInterface};
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;

/// In-memory storage (lost on restart).
///
/// Single-key operations go straight to the map; batches hold the commit lock
/// exclusively so no reader observes half of a batch.
#[derive(Default)]
pub struct MemoryStorage {
	data: DashMap<String, Vec<u8>>,
	commit_lock: RwLock<()>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let _guard = self.commit_lock.read().await;
		self.data
			.get(key)
			.map(|entry| entry.value().clone())
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let _guard = self.commit_lock.read().await;
		self.data.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		let _guard = self.commit_lock.read().await;
		self.data.remove(key);
		Ok(())
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		let _guard = self.commit_lock.read().await;
		Ok(self.data.contains_key(key))
	}

	async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let _guard = self.commit_lock.read().await;
		let mut entries: Vec<(String, Vec<u8>)> = self
			.data
			.iter()
			.filter(|entry| entry.key().starts_with(prefix))
			.map(|entry| (entry.key().clone(), entry.value().clone()))
			.collect();

		entries.sort_by(|a, b| a.0.cmp(&b.0));
		Ok(entries)
	}

	async fn list_from(
		&self,
		prefix: &str,
		start: &str,
		limit: usize,
	) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let _guard = self.commit_lock.read().await;
		let mut keys: Vec<String> = self
			.data
			.iter()
			.filter(|entry| entry.key().starts_with(prefix) && entry.key().as_str() >= start)
			.map(|entry| entry.key().clone())
			.collect();

		keys.sort();
		if limit > 0 {
			keys.truncate(limit);
		}

		Ok(keys
			.into_iter()
			.filter_map(|key| {
				let value = self.data.get(&key)?.value().clone();
				Some((key, value))
			})
			.collect())
	}

	async fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
		let _guard = self.commit_lock.write().await;
		for op in ops {
			match op {
				BatchOp::Put { key, value } => {
					self.data.insert(key, value);
				}
				BatchOp::PutUnless { key, value, guard } => {
					if !self.data.contains_key(&guard) {
						self.data.insert(key, value);
					}
				}
				BatchOp::Delete { key } => {
					self.data.remove(&key);
				}
			}
		}

		Ok(())
	}
}
