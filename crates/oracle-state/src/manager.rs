//! Forward-only status tracking of user bridging requests.

use crate::StateError;
use async_trait::async_trait;
use oracle_storage::{BridgingRequestStateDb, SharedStorage};
use oracle_types::{
	BridgingRequestState, ChainId, InvalidTransitionError, NewBridgingRequestStateModel, TxHash,
	TxKey,
};
use tracing::{debug, info};

/// Status updates the receiver and the state processors apply to bridging requests.
///
/// Every operation is applied per request: a request that is missing or whose
/// transition is not allowed is reported in the returned error while the
/// remaining requests are still updated.
#[async_trait]
pub trait BridgingRequestStateUpdater: Send + Sync {
	async fn new_request(
		&self,
		source_chain_id: &ChainId,
		model: NewBridgingRequestStateModel,
	) -> Result<(), StateError>;

	async fn new_multiple(
		&self,
		source_chain_id: &ChainId,
		models: Vec<NewBridgingRequestStateModel>,
	) -> Result<(), StateError>;

	async fn invalid(&self, keys: &[TxKey]) -> Result<(), StateError>;

	async fn submitted_to_bridge(
		&self,
		keys: &[TxKey],
		destination_chain_id: &ChainId,
	) -> Result<(), StateError>;

	async fn included_in_batch(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
		keys: &[TxKey],
	) -> Result<(), StateError>;

	async fn submitted_to_destination(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
	) -> Result<(), StateError>;

	async fn failed_to_execute_on_destination(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
	) -> Result<(), StateError>;

	async fn executed_on_destination(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
		destination_tx_hash: TxHash,
	) -> Result<(), StateError>;
}

pub struct BridgingRequestStateManager {
	db: BridgingRequestStateDb,
}

impl BridgingRequestStateManager {
	pub fn new(storage: SharedStorage) -> Self {
		Self {
			db: BridgingRequestStateDb::new(storage),
		}
	}

	pub async fn get(&self, key: &TxKey) -> Result<Option<BridgingRequestState>, StateError> {
		Ok(self.db.get(key).await?)
	}

	/// States of `tx_hashes` on `source_chain_id`; unknown hashes are left out.
	pub async fn get_multiple(
		&self,
		source_chain_id: &ChainId,
		tx_hashes: &[TxHash],
	) -> Result<Vec<BridgingRequestState>, StateError> {
		let mut states = Vec::with_capacity(tx_hashes.len());
		for hash in tx_hashes {
			if let Some(state) = self.db.get(&TxKey::new(source_chain_id.clone(), hash.clone())).await? {
				states.push(state);
			}
		}

		Ok(states)
	}

	/// Loads each keyed state, applies `update` and stores the ones that moved.
	async fn update_keys<F>(&self, keys: &[TxKey], update: F) -> Result<(), StateError>
	where
		F: Fn(&mut BridgingRequestState) -> Result<(), InvalidTransitionError> + Send + Sync,
	{
		let mut errors = Vec::new();
		let mut updated = Vec::with_capacity(keys.len());

		for key in keys {
			match self.db.get(key).await {
				Ok(Some(mut state)) => match update(&mut state) {
					Ok(()) => {
						touch(&mut state);
						updated.push(state);
					}
					Err(e) => errors.push(e.into()),
				},
				Ok(None) => errors.push(StateError::NotFound(key.clone())),
				Err(e) => errors.push(e.into()),
			}
		}

		if let Err(e) = self.db.put_multiple(&updated).await {
			errors.push(e.into());
		}

		StateError::join(errors)
	}

	async fn update_batch<F>(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
		update: F,
	) -> Result<(), StateError>
	where
		F: Fn(&mut BridgingRequestState) -> Result<(), InvalidTransitionError> + Send + Sync,
	{
		let states = self
			.db
			.get_by_batch_id(destination_chain_id, batch_id)
			.await?;

		if states.is_empty() {
			debug!(
				destination_chain_id = %destination_chain_id,
				batch_id,
				"No bridging requests in batch"
			);
			return Ok(());
		}

		let keys: Vec<TxKey> = states.iter().map(|state| state.key()).collect();
		self.update_keys(&keys, update).await
	}
}

fn touch(state: &mut BridgingRequestState) {
	state.updated_at = chrono::Utc::now().timestamp().max(0) as u64;
}

#[async_trait]
impl BridgingRequestStateUpdater for BridgingRequestStateManager {
	async fn new_request(
		&self,
		source_chain_id: &ChainId,
		model: NewBridgingRequestStateModel,
	) -> Result<(), StateError> {
		self.new_multiple(source_chain_id, vec![model]).await
	}

	async fn new_multiple(
		&self,
		source_chain_id: &ChainId,
		models: Vec<NewBridgingRequestStateModel>,
	) -> Result<(), StateError> {
		let mut errors = Vec::new();
		let mut created = Vec::with_capacity(models.len());

		for model in models {
			let key = TxKey::new(source_chain_id.clone(), model.source_tx_hash.clone());
			match self.db.get(&key).await {
				Ok(Some(_)) => {
					debug!(request = %key, "Bridging request state already exists");
				}
				Ok(None) => {
					let mut state = BridgingRequestState::new(
						source_chain_id.clone(),
						model.source_tx_hash,
						model.is_refund,
					);
					touch(&mut state);
					created.push(state);
				}
				Err(e) => errors.push(e.into()),
			}
		}

		if !created.is_empty() {
			match self.db.put_multiple(&created).await {
				Ok(()) => info!(
					source_chain_id = %source_chain_id,
					count = created.len(),
					"New bridging requests discovered"
				),
				Err(e) => errors.push(e.into()),
			}
		}

		StateError::join(errors)
	}

	async fn invalid(&self, keys: &[TxKey]) -> Result<(), StateError> {
		self.update_keys(keys, |state| state.to_invalid_request())
			.await
	}

	async fn submitted_to_bridge(
		&self,
		keys: &[TxKey],
		destination_chain_id: &ChainId,
	) -> Result<(), StateError> {
		self.update_keys(keys, |state| {
			state.to_submitted_to_bridge(destination_chain_id.clone())
		})
		.await
	}

	async fn included_in_batch(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
		keys: &[TxKey],
	) -> Result<(), StateError> {
		self.update_keys(keys, |state| {
			state.to_included_in_batch(batch_id)?;
			state.destination_chain_id = Some(destination_chain_id.clone());
			Ok(())
		})
		.await
	}

	async fn submitted_to_destination(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
	) -> Result<(), StateError> {
		self.update_batch(destination_chain_id, batch_id, |state| {
			state.to_submitted_to_destination()
		})
		.await
	}

	async fn failed_to_execute_on_destination(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
	) -> Result<(), StateError> {
		self.update_batch(destination_chain_id, batch_id, |state| {
			state.to_failed_to_execute_on_destination()
		})
		.await
	}

	async fn executed_on_destination(
		&self,
		destination_chain_id: &ChainId,
		batch_id: u64,
		destination_tx_hash: TxHash,
	) -> Result<(), StateError> {
		self.update_batch(destination_chain_id, batch_id, |state| {
			state.to_executed_on_destination(destination_tx_hash.clone())
		})
		.await
	}
}
