//! Registry of chain observer databases, one per configured chain.

use crate::{ChainObserverDb, ChainObserverError, StorageChainObserverDb};
use oracle_storage::SharedStorage;
use oracle_types::ChainId;
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::info;

#[derive(Default, Clone)]
pub struct ChainObservers {
	observers: HashMap<ChainId, Arc<dyn ChainObserverDb>>,
}

impl ChainObservers {
	pub fn new() -> Self {
		Self::default()
	}

	/// Storage-backed observers for every chain in `chain_ids`.
	pub fn from_storage(
		chain_ids: impl IntoIterator<Item = ChainId>,
		storage: SharedStorage,
	) -> Result<Self, ChainObserverError> {
		let mut observers = Self::new();
		for chain_id in chain_ids {
			observers.register(Arc::new(StorageChainObserverDb::new(
				chain_id,
				storage.clone(),
			)))?;
		}

		Ok(observers)
	}

	pub fn register(&mut self, observer: Arc<dyn ChainObserverDb>) -> Result<(), ChainObserverError> {
		let chain_id = observer.chain_id().clone();
		info!("Registering chain observer for chain {}", chain_id);

		if self.observers.contains_key(&chain_id) {
			return Err(ChainObserverError::AlreadyRegistered(chain_id));
		}

		self.observers.insert(chain_id, observer);
		Ok(())
	}

	pub fn get(&self, chain_id: &ChainId) -> Option<Arc<dyn ChainObserverDb>> {
		self.observers.get(chain_id).cloned()
	}

	pub fn get_required(&self, chain_id: &ChainId) -> Result<Arc<dyn ChainObserverDb>, ChainObserverError> {
		self.get(chain_id)
			.ok_or_else(|| ChainObserverError::NotRegistered(chain_id.clone()))
	}

	/// Registered chain ids, sorted.
	pub fn chains(&self) -> Vec<ChainId> {
		let mut chains: Vec<ChainId> = self.observers.keys().cloned().collect();
		chains.sort();
		chains
	}
}

impl fmt::Debug for ChainObservers {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChainObservers")
			.field("observers", &self.chains())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use oracle_storage::StorageService;

	#[test]
	fn test_register_and_lookup() {
		let storage = Arc::new(StorageService::in_memory());
		let mut observers =
			ChainObservers::from_storage(vec!["vector".into(), "prime".into()], storage.clone())
				.unwrap();

		assert_eq!(
			observers.chains(),
			vec![ChainId::from("prime"), ChainId::from("vector")]
		);
		assert!(observers.get_required(&"prime".into()).is_ok());
		assert!(matches!(
			observers.get_required(&"nexus".into()),
			Err(ChainObserverError::NotRegistered(_))
		));

		let duplicate = Arc::new(StorageChainObserverDb::new("prime".into(), storage));
		assert!(matches!(
			observers.register(duplicate),
			Err(ChainObserverError::AlreadyRegistered(_))
		));
	}
}
