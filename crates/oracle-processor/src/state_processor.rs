//! Block-by-block claim building for one chain family.
//!
//! Within a pass the processor walks a cursor over the blocks of a chain. Each
//! step picks the lowest block that either holds unprocessed transactions or
//! is the expiry block of an expected transaction, validates everything that
//! belongs to that block and appends the claims. Nothing is written until
//! [`ChainTxsProcessorState::persist_new`] runs after a successful submission.

use crate::processors::TxProcessorsCollection;
use crate::telemetry::{OracleCounter, OracleTelemetry};
use async_trait::async_trait;
use oracle_chains::{ChainObserverDb, ChainObserverError, ChainObservers};
use oracle_config::OracleConfig;
use oracle_state::BridgingRequestStateUpdater;
use oracle_storage::TxsProcessorDb;
use oracle_types::{
	unmarshal_metadata, BaseMetadata, BlockPoint, BridgeClaims, BridgeClaimsBlockInfo,
	BridgingTxType, CardanoTx, ChainId, ChainTx, ChainType, EthTx, ExpectedTx, ExpiryResolution,
	ProcessedTx, TxKey,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Per-family claim building driven by the orchestrator.
#[async_trait]
pub trait ChainTxsProcessorState: Send + Sync {
	/// Scratch state of one pass, created by [`Self::reset`].
	type TickState: Send;

	fn chain_type(&self) -> ChainType;

	fn reset(&self) -> Self::TickState;

	/// Adds claims for `(chain_id, priority)` until the batch holds
	/// `max_claims_to_group` claims or nothing is left.
	async fn run_checks(
		&self,
		state: &mut Self::TickState,
		claims: &mut BridgeClaims,
		chain_id: &ChainId,
		max_claims_to_group: usize,
		priority: u8,
	);

	/// Persists the outcome of a pass whose claims were submitted.
	async fn persist_new(&self, state: Self::TickState, claims: &BridgeClaims);

	/// Called instead of [`Self::persist_new`] when the bridge rejected a
	/// batch holding a single claim.
	async fn persist_failed(&self, _state: Self::TickState, _claims: &BridgeClaims) {}
}

/// Outcome of one pass, written by `persist_new`.
#[derive(Debug)]
pub struct TickState<T> {
	/// Unprocessed txs to move to processed, valid or not.
	pub processed: Vec<ProcessedTx>,
	/// Unprocessed txs rejected by their processor.
	pub processed_invalid: Vec<T>,
	/// Unprocessed txs that produced a claim.
	pub submitted: Vec<T>,
	/// Expected txs that were observed or got a failure claim.
	pub expected_processed: Vec<ExpectedTx>,
	pub expected_invalid: Vec<ExpectedTx>,
}

impl<T> Default for TickState<T> {
	fn default() -> Self {
		Self {
			processed: Vec::new(),
			processed_invalid: Vec::new(),
			submitted: Vec::new(),
			expected_processed: Vec::new(),
			expected_invalid: Vec::new(),
		}
	}
}

impl<T> TickState<T> {
	pub fn is_empty(&self) -> bool {
		self.processed.is_empty()
			&& self.expected_processed.is_empty()
			&& self.expected_invalid.is_empty()
	}
}

/// Pending work of one `(chain, priority)` within `run_checks`.
struct ChainScan<'a, T> {
	chain_id: &'a ChainId,
	unprocessed: Vec<T>,
	expected: BTreeMap<TxKey, ExpectedTx>,
	observer: Option<Arc<dyn ChainObserverDb>>,
}

pub struct TxsStateProcessor<T> {
	config: Arc<OracleConfig>,
	db: TxsProcessorDb<T>,
	processors: Arc<TxProcessorsCollection<T>>,
	observers: ChainObservers,
	state_updater: Arc<dyn BridgingRequestStateUpdater>,
	telemetry: Arc<OracleTelemetry>,
}

pub type CardanoStateProcessor = TxsStateProcessor<CardanoTx>;
pub type EthStateProcessor = TxsStateProcessor<EthTx>;

impl<T: ChainTx> TxsStateProcessor<T> {
	pub fn new(
		config: Arc<OracleConfig>,
		db: TxsProcessorDb<T>,
		processors: Arc<TxProcessorsCollection<T>>,
		observers: ChainObservers,
		state_updater: Arc<dyn BridgingRequestStateUpdater>,
		telemetry: Arc<OracleTelemetry>,
	) -> Self {
		Self {
			config,
			db,
			processors,
			observers,
			state_updater,
			telemetry,
		}
	}

	/// Block at which `tx` counts as overdue, if the chain has reached it.
	async fn expiry_block(
		&self,
		observer: &dyn ChainObserverDb,
		tx: &ExpectedTx,
	) -> Result<Option<BlockPoint>, ChainObserverError> {
		let target = tx
			.ttl
			.saturating_add(self.config.oracle.ttl_insurance_offset);

		match T::CHAIN_TYPE.expiry_resolution() {
			ExpiryResolution::FirstConfirmedBlock => Ok(observer
				.get_confirmed_blocks_from(target, 1)
				.await?
				.into_iter()
				.next()
				.map(|block| block.point())),
			ExpiryResolution::LastProcessedBlock => Ok(observer
				.get_last_processed_block()
				.await?
				.filter(|last| last.number >= target)
				.map(|_| BlockPoint::new(target, None))),
		}
	}

	/// Next block strictly after `prev` holding work for this chain.
	async fn construct_bridge_claims_block_info(
		&self,
		scan: &ChainScan<'_, T>,
		prev: Option<&BridgeClaimsBlockInfo>,
	) -> Option<BridgeClaimsBlockInfo> {
		let after_prev = |position: u64| prev.map_or(true, |prev| prev.position < position);

		let mut candidate = scan
			.unprocessed
			.iter()
			.find(|tx| after_prev(tx.block_position()))
			.map(|tx| tx.block_point());

		if let Some(observer) = &scan.observer {
			let mut by_ttl: Vec<&ExpectedTx> = scan.expected.values().collect();
			by_ttl.sort_by_key(|tx| tx.ttl);

			for tx in by_ttl {
				match self.expiry_block(observer.as_ref(), tx).await {
					Ok(Some(point)) => {
						let earlier = candidate
							.as_ref()
							.map_or(true, |current| point.position < current.position);

						if earlier && after_prev(point.position) {
							candidate = Some(point);
							break;
						}
					}
					Ok(None) => {}
					Err(e) => {
						error!(chain_id = %scan.chain_id, tx = %tx.key(), error = %e, "Failed to resolve expiry block");
					}
				}
			}
		}

		candidate.map(|point| BridgeClaimsBlockInfo::new(scan.chain_id.clone(), point))
	}

	/// Drops txs that already have a processed record (queueing their stale
	/// copies for removal) and txs still waiting out a retry timeout.
	async fn ready_unprocessed_txs(&self, state: &mut TickState<T>, unprocessed: Vec<T>) -> Vec<T> {
		let retry = &self.config.retry_unprocessed_settings;
		let now = unix_now();
		let mut ready = Vec::with_capacity(unprocessed.len());

		for tx in unprocessed {
			match self.db.get_processed_tx(&tx.key()).await {
				Ok(Some(processed)) => {
					warn!(tx = %tx.key(), "Unprocessed tx already has a processed record");
					state.processed.push(processed);
					continue;
				}
				Ok(None) => {}
				Err(e) => {
					error!(tx = %tx.key(), error = %e, "Failed to load processed tx");
					continue;
				}
			}

			if !retry.is_ready(tx.submit_try_count(), tx.last_time_tried(), now) {
				debug!(
					tx = %tx.key(),
					try_count = tx.submit_try_count(),
					"Tx is waiting to be retried"
				);
				continue;
			}

			ready.push(tx);
		}

		ready
	}

	fn check_unprocessed_txs(
		&self,
		state: &mut TickState<T>,
		claims: &mut BridgeClaims,
		scan: &mut ChainScan<'_, T>,
		block_info: &BridgeClaimsBlockInfo,
		max_claims_to_group: usize,
	) {
		let relevant: Vec<&T> = scan
			.unprocessed
			.iter()
			.filter(|tx| block_info.equal_with_unprocessed(*tx))
			.collect();

		for tx in relevant {
			let result = self
				.processors
				.get_success(tx, &self.config)
				.and_then(|processor| processor.validate_and_add_claim(claims, tx, &self.config));

			match result {
				Ok(()) => {
					state.processed.push(tx.to_processed(false));
					state.submitted.push(tx.clone());

					if let Some(expected) = scan.expected.remove(&tx.key()) {
						debug!(tx = %tx.key(), "Expected tx observed on chain");
						state.expected_processed.push(expected);
					}
				}
				Err(e) => {
					warn!(tx = %tx.key(), error = %e, "Tx failed validation");
					self.telemetry
						.increment(OracleCounter::InvalidClaims, scan.chain_id);
					state.processed.push(tx.to_processed(true));
					state.processed_invalid.push(tx.clone());
				}
			}

			if !claims.can_add_more(max_claims_to_group) {
				break;
			}
		}
	}

	async fn check_expected_txs(
		&self,
		state: &mut TickState<T>,
		claims: &mut BridgeClaims,
		scan: &mut ChainScan<'_, T>,
		block_info: &BridgeClaimsBlockInfo,
		max_claims_to_group: usize,
	) {
		if !claims.can_add_more(max_claims_to_group) {
			return;
		}

		let Some(observer) = scan.observer.clone() else {
			return;
		};

		let mut relevant = Vec::new();
		for (key, tx) in &scan.expected {
			match self.expiry_block(observer.as_ref(), tx).await {
				Ok(Some(point)) if block_info.equal_with_expected(tx, &point) => {
					relevant.push(key.clone());
				}
				Ok(_) => {}
				Err(e) => {
					error!(chain_id = %scan.chain_id, tx = %key, error = %e, "Failed to resolve expiry block");
				}
			}
		}

		for key in relevant {
			let Some(tx) = scan.expected.remove(&key) else {
				continue;
			};

			match self.db.get_processed_tx(&key).await {
				Ok(Some(processed)) if !processed.is_invalid => {
					debug!(tx = %key, "Expected tx already processed");
					state.expected_processed.push(tx);
					continue;
				}
				Ok(_) => {}
				Err(e) => {
					error!(tx = %key, error = %e, "Failed to load processed tx");
					continue;
				}
			}

			let result = self
				.processors
				.get_failed(&tx, &self.config)
				.and_then(|processor| processor.validate_and_add_claim(claims, &tx, &self.config));

			match result {
				Ok(()) => state.expected_processed.push(tx),
				Err(e) => {
					warn!(tx = %key, error = %e, "Expected tx failed validation");
					self.telemetry
						.increment(OracleCounter::InvalidClaims, scan.chain_id);
					state.expected_invalid.push(tx);
				}
			}

			if !claims.can_add_more(max_claims_to_group) {
				break;
			}
		}
	}

	async fn update_bridging_request_states(&self, state: &TickState<T>, claims: &BridgeClaims) {
		let mut submitted: BTreeMap<&ChainId, Vec<TxKey>> = BTreeMap::new();
		for claim in &claims.bridging_request_claims {
			submitted
				.entry(&claim.destination_chain_id)
				.or_default()
				.push(TxKey::new(
					claim.source_chain_id.clone(),
					claim.observed_transaction_hash.clone(),
				));
		}

		for (destination_chain_id, keys) in submitted {
			if let Err(e) = self
				.state_updater
				.submitted_to_bridge(&keys, destination_chain_id)
				.await
			{
				error!(error = %e, "Failed to mark bridging requests as submitted to bridge");
			}
		}

		let invalid: Vec<TxKey> = state
			.processed_invalid
			.iter()
			.filter(|tx| {
				unmarshal_metadata::<BaseMetadata>(tx.metadata())
					.map(|metadata| metadata.bridging_tx_type == BridgingTxType::BridgingRequest)
					.unwrap_or(false)
			})
			.map(|tx| tx.key())
			.collect();

		if !invalid.is_empty() {
			if let Err(e) = self.state_updater.invalid(&invalid).await {
				error!(error = %e, "Failed to mark bridging requests as invalid");
			}
		}

		for claim in &claims.batch_executed_claims {
			if let Err(e) = self
				.state_updater
				.executed_on_destination(
					&claim.chain_id,
					claim.batch_nonce_id,
					claim.observed_transaction_hash.clone(),
				)
				.await
			{
				error!(
					chain_id = %claim.chain_id,
					batch_id = claim.batch_nonce_id,
					error = %e,
					"Failed to mark batch as executed on destination"
				);
			}
		}

		for claim in &claims.batch_execution_failed_claims {
			if let Err(e) = self
				.state_updater
				.failed_to_execute_on_destination(&claim.chain_id, claim.batch_nonce_id)
				.await
			{
				error!(
					chain_id = %claim.chain_id,
					batch_id = claim.batch_nonce_id,
					error = %e,
					"Failed to mark batch as failed on destination"
				);
			}
		}
	}
}

#[async_trait]
impl<T: ChainTx> ChainTxsProcessorState for TxsStateProcessor<T> {
	type TickState = TickState<T>;

	fn chain_type(&self) -> ChainType {
		T::CHAIN_TYPE
	}

	fn reset(&self) -> TickState<T> {
		TickState::default()
	}

	async fn run_checks(
		&self,
		state: &mut TickState<T>,
		claims: &mut BridgeClaims,
		chain_id: &ChainId,
		max_claims_to_group: usize,
		priority: u8,
	) {
		let expected = match self.db.get_expected_txs(chain_id, priority, 0).await {
			Ok(txs) => txs,
			Err(e) => {
				error!(chain_id = %chain_id, priority, error = %e, "Failed to load expected txs");
				return;
			}
		};

		let unprocessed = match self.db.get_unprocessed_txs(chain_id, priority, 0).await {
			Ok(txs) => txs,
			Err(e) => {
				error!(chain_id = %chain_id, priority, error = %e, "Failed to load unprocessed txs");
				return;
			}
		};

		let unprocessed = self.ready_unprocessed_txs(state, unprocessed).await;

		if expected.is_empty() && unprocessed.is_empty() {
			return;
		}

		let mut scan = ChainScan {
			chain_id,
			unprocessed,
			expected: expected.into_iter().map(|tx| (tx.key(), tx)).collect(),
			observer: self.observers.get(chain_id),
		};

		let claims_before = claims.count();
		let mut block_info = None;

		while claims.can_add_more(max_claims_to_group) {
			block_info = self
				.construct_bridge_claims_block_info(&scan, block_info.as_ref())
				.await;

			let Some(info) = block_info.as_ref() else {
				break;
			};

			debug!(chain_id = %chain_id, block = info.position, "Checking block");

			self.check_unprocessed_txs(state, claims, &mut scan, info, max_claims_to_group);
			self.check_expected_txs(state, claims, &mut scan, info, max_claims_to_group)
				.await;
		}

		let added = claims.count() - claims_before;
		if added > 0 {
			info!(chain_id = %chain_id, priority, added, "Created claims");
		}
	}

	async fn persist_new(&self, state: TickState<T>, claims: &BridgeClaims) {
		if !state.expected_invalid.is_empty() {
			if let Err(e) = self
				.db
				.mark_expected_txs_as_invalid(&state.expected_invalid)
				.await
			{
				error!(error = %e, "Failed to mark expected txs as invalid");
			}
		}

		if !state.expected_processed.is_empty() {
			if let Err(e) = self
				.db
				.mark_expected_txs_as_processed(&state.expected_processed)
				.await
			{
				error!(error = %e, "Failed to mark expected txs as processed");
			}
		}

		if !state.processed.is_empty() {
			if let Err(e) = self
				.db
				.mark_unprocessed_txs_as_processed(&state.processed)
				.await
			{
				error!(error = %e, "Failed to mark unprocessed txs as processed");
			}
		}

		self.update_bridging_request_states(&state, claims).await;
	}

	async fn persist_failed(&self, state: TickState<T>, _claims: &BridgeClaims) {
		if state.submitted.is_empty() {
			return;
		}

		let now = unix_now();
		let retry = &self.config.retry_unprocessed_settings;
		let mut parked = state.submitted;
		for tx in &mut parked {
			tx.mark_tried(now);
			warn!(
				tx = %tx.key(),
				try_count = tx.submit_try_count(),
				retry_after_secs = retry.retry_after_secs(tx.submit_try_count()),
				"Claim rejected, retrying tx later"
			);
		}

		if let Err(e) = self.db.update_unprocessed_txs(&parked).await {
			error!(error = %e, "Failed to update retried unprocessed txs");
		}
	}
}

fn unix_now() -> u64 {
	chrono::Utc::now().timestamp().max(0) as u64
}
