//! File-backed storage.
//!
//! The whole keyspace is kept in memory and written out as one JSON snapshot
//! (values hex encoded) after every mutation. The snapshot is written to a
//! temporary file and renamed over the previous one, so a crash leaves either
//! the old or the new keyspace on disk.

use crate::{BatchOp, StorageError, StorageInterface};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

pub struct FileStorage {
	path: PathBuf,
	data: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl FileStorage {
	/// Opens the snapshot at `path`, starting empty when it does not exist yet.
	pub async fn open(path: PathBuf) -> Result<Self, StorageError> {
		if let Some(parent) = path.parent() {
			if !parent.as_os_str().is_empty() {
				fs::create_dir_all(parent)
					.await
					.map_err(|e| StorageError::Backend(e.to_string()))?;
			}
		}

		let data = match fs::read(&path).await {
			Ok(contents) => decode_snapshot(&contents)?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		debug!("Loaded {} keys from {:?}", data.len(), path);

		Ok(Self {
			path,
			data: Mutex::new(data),
		})
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	async fn persist(&self, data: &BTreeMap<String, Vec<u8>>) -> Result<(), StorageError> {
		let snapshot: BTreeMap<&String, String> =
			data.iter().map(|(k, v)| (k, hex::encode(v))).collect();
		let contents = serde_json::to_vec(&snapshot)
			.map_err(|e| StorageError::Serialization(e.to_string()))?;

		let temp_path = self.path.with_extension("tmp");
		fs::write(&temp_path, contents)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		fs::rename(&temp_path, &self.path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}
}

fn decode_snapshot(contents: &[u8]) -> Result<BTreeMap<String, Vec<u8>>, StorageError> {
	let snapshot: BTreeMap<String, String> = serde_json::from_slice(contents)
		.map_err(|e| StorageError::Serialization(e.to_string()))?;

	snapshot
		.into_iter()
		.map(|(key, value)| {
			hex::decode(&value)
				.map(|bytes| (key, bytes))
				.map_err(|e| StorageError::Serialization(e.to_string()))
		})
		.collect()
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let data = self.data.lock().await;
		data.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		self.apply_batch(vec![BatchOp::Put {
			key: key.to_string(),
			value,
		}])
		.await
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		self.apply_batch(vec![BatchOp::Delete {
			key: key.to_string(),
		}])
		.await
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.data.lock().await.contains_key(key))
	}

	async fn list_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let data = self.data.lock().await;
		Ok(data
			.range(prefix.to_string()..)
			.take_while(|(key, _)| key.starts_with(prefix))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect())
	}

	async fn list_from(
		&self,
		prefix: &str,
		start: &str,
		limit: usize,
	) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
		let data = self.data.lock().await;
		let from = if start < prefix { prefix } else { start };
		let take = if limit == 0 { usize::MAX } else { limit };

		Ok(data
			.range(from.to_string()..)
			.take_while(|(key, _)| key.starts_with(prefix))
			.take(take)
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect())
	}

	async fn apply_batch(&self, ops: Vec<BatchOp>) -> Result<(), StorageError> {
		let mut data = self.data.lock().await;
		let mut next = data.clone();

		for op in ops {
			match op {
				BatchOp::Put { key, value } => {
					next.insert(key, value);
				}
				BatchOp::PutUnless { key, value, guard } => {
					if !next.contains_key(&guard) {
						next.insert(key, value);
					}
				}
				BatchOp::Delete { key } => {
					next.remove(&key);
				}
			}
		}

		// Only swap in the new keyspace once it is safely on disk.
		self.persist(&next).await?;
		*data = next;
		Ok(())
	}
}
