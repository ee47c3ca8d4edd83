//! Claim batch orchestrator, one instance per chain family.
//!
//! Every tick visits the family's chains in sorted order. Each visit waits
//! `tick_time` and then builds one batch that starts with the visited chain
//! and is topped up from the others, so every chain gets to lead a batch in
//! turn. The batch is submitted to the bridge and persisted only once the
//! submission succeeded.

use crate::settings::{TxsProcessorSettings, MIN_BRIDGING_CLAIMS_TO_GROUP};
use oracle_bridge::{BridgeInterface, SubmitOpts};
use oracle_config::OracleConfig;
use oracle_processor::{ChainTxsProcessorState, OracleCounter, OracleTelemetry};
use oracle_types::{BridgeClaims, ChainId, LAST_PROCESSING_PRIORITY};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

pub struct TxsProcessor<S: ChainTxsProcessorState> {
	state_processor: Arc<S>,
	bridge: Arc<dyn BridgeInterface>,
	telemetry: Arc<OracleTelemetry>,
	settings: TxsProcessorSettings,
	chain_ids: Vec<ChainId>,
	tick_time: Duration,
}

impl<S: ChainTxsProcessorState> TxsProcessor<S> {
	pub fn new(
		config: &OracleConfig,
		state_processor: Arc<S>,
		bridge: Arc<dyn BridgeInterface>,
		telemetry: Arc<OracleTelemetry>,
	) -> Self {
		let mut chain_ids = config.chain_ids(state_processor.chain_type());
		chain_ids.sort();

		let settings = TxsProcessorSettings::new(
			&chain_ids,
			config.bridging_settings.max_bridging_claims_to_group,
		);

		Self {
			state_processor,
			bridge,
			telemetry,
			settings,
			chain_ids,
			tick_time: config.tick_time(),
		}
	}

	pub fn settings(&self) -> &TxsProcessorSettings {
		&self.settings
	}

	pub async fn start(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
		info!(
			chain_type = %self.state_processor.chain_type(),
			chains = ?self.chain_ids,
			"Starting txs processor"
		);

		while self.check_should_generate_claims(&mut shutdown_rx).await {}

		info!(chain_type = %self.state_processor.chain_type(), "Txs processor stopped");
	}

	/// Runs one tick. Returns `false` once shutdown was signalled; a pass that
	/// already started always runs to the end.
	pub async fn check_should_generate_claims(
		&mut self,
		shutdown_rx: &mut broadcast::Receiver<()>,
	) -> bool {
		if self.chain_ids.is_empty() {
			let _ = shutdown_rx.recv().await;
			return false;
		}

		for chain_id in self.chain_ids.clone() {
			tokio::select! {
				_ = tokio::time::sleep(self.tick_time) => {}
				_ = shutdown_rx.recv() => {
					debug!(chain_type = %self.state_processor.chain_type(), "Txs processor received shutdown signal");
					return false;
				}
			}

			self.process_all_starting_with_chain(&chain_id).await;
		}

		true
	}

	/// Builds, submits and persists one batch led by `start_chain_id`.
	pub async fn process_all_starting_with_chain(&mut self, start_chain_id: &ChainId) {
		let mut state = self.state_processor.reset();
		let mut claims = BridgeClaims::new();
		let max_claims_to_group = self.settings.max_bridging_claims_to_group(start_chain_id);

		self.process_all_for_chain(&mut state, &mut claims, start_chain_id, max_claims_to_group)
			.await;

		for chain_id in &self.chain_ids {
			if chain_id != start_chain_id {
				self.process_all_for_chain(&mut state, &mut claims, chain_id, max_claims_to_group)
					.await;
			}
		}

		if claims.any() && !self.submit_claims(start_chain_id, &claims).await {
			// A lone rejected claim points at its tx; park it for a while.
			if claims.count() <= MIN_BRIDGING_CLAIMS_TO_GROUP {
				self.state_processor.persist_failed(state, &claims).await;
			}
			return;
		}

		self.state_processor.persist_new(state, &claims).await;
	}

	async fn process_all_for_chain(
		&self,
		state: &mut S::TickState,
		claims: &mut BridgeClaims,
		chain_id: &ChainId,
		max_claims_to_group: usize,
	) {
		for priority in 0..=LAST_PROCESSING_PRIORITY {
			if !claims.can_add_more(max_claims_to_group) {
				break;
			}

			self.state_processor
				.run_checks(state, claims, chain_id, max_claims_to_group, priority)
				.await;
		}
	}

	async fn submit_claims(&mut self, start_chain_id: &ChainId, claims: &BridgeClaims) -> bool {
		let opts = SubmitOpts {
			gas_limit_multiplier: self.settings.gas_limit_multiplier(start_chain_id),
		};

		info!(
			start_chain = %start_chain_id,
			claims = %claims,
			gas_limit_multiplier = opts.gas_limit_multiplier,
			"Submitting bridge claims"
		);

		if let Err(e) = self.bridge.submit_claims(claims, opts).await {
			error!(start_chain = %start_chain_id, error = %e, "Failed to submit claims");

			self.settings
				.on_submit_claims_failed(start_chain_id, claims.count());
			self.telemetry
				.increment(OracleCounter::SubmitFailures, start_chain_id);

			warn!(
				start_chain = %start_chain_id,
				max_bridging_claims_to_group = self.settings.max_bridging_claims_to_group(start_chain_id),
				gas_limit_multiplier = self.settings.gas_limit_multiplier(start_chain_id),
				"Adjusted submit claims settings"
			);

			return false;
		}

		self.settings.reset_submit_claims_settings(start_chain_id);
		self.telemetry.add(
			OracleCounter::SubmittedClaims,
			start_chain_id,
			claims.count() as u64,
		);

		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_utils::{config, MockBridge};
	use async_trait::async_trait;
	use oracle_types::{ChainType, HotWalletIncrementClaim};
	use std::collections::HashMap;
	use std::sync::Mutex;

	/// Hands out one hot wallet claim per pending unit of a chain.
	#[derive(Default)]
	struct MockStateProcessor {
		pending: Mutex<HashMap<ChainId, usize>>,
		checks: Mutex<Vec<(ChainId, u8)>>,
		passes: Mutex<usize>,
		persisted: Mutex<Vec<usize>>,
		failed: Mutex<Vec<usize>>,
	}

	impl MockStateProcessor {
		fn with_pending(pending: &[(&str, usize)]) -> Self {
			let processor = Self::default();
			*processor.pending.lock().unwrap() = pending
				.iter()
				.map(|(chain, count)| (ChainId::from(*chain), *count))
				.collect();
			processor
		}

		fn pending(&self, chain: &str) -> usize {
			self.pending
				.lock()
				.unwrap()
				.get(&ChainId::from(chain))
				.copied()
				.unwrap_or_default()
		}
	}

	#[async_trait]
	impl ChainTxsProcessorState for MockStateProcessor {
		type TickState = Vec<ChainId>;

		fn chain_type(&self) -> ChainType {
			ChainType::Cardano
		}

		fn reset(&self) -> Self::TickState {
			*self.passes.lock().unwrap() += 1;
			Vec::new()
		}

		async fn run_checks(
			&self,
			state: &mut Self::TickState,
			claims: &mut BridgeClaims,
			chain_id: &ChainId,
			max_claims_to_group: usize,
			priority: u8,
		) {
			self.checks.lock().unwrap().push((chain_id.clone(), priority));

			let pending = self.pending(chain_id.as_str());
			let mut taken = state.iter().filter(|c| *c == chain_id).count();
			while taken < pending && claims.can_add_more(max_claims_to_group) {
				claims
					.hot_wallet_increment_claims
					.push(HotWalletIncrementClaim {
						chain_id: chain_id.clone(),
						amount: 1,
						is_increment: true,
					});
				state.push(chain_id.clone());
				taken += 1;
			}
		}

		async fn persist_new(&self, state: Self::TickState, claims: &BridgeClaims) {
			let mut pending = self.pending.lock().unwrap();
			for chain_id in state {
				if let Some(count) = pending.get_mut(&chain_id) {
					*count -= 1;
				}
			}
			self.persisted.lock().unwrap().push(claims.count());
		}

		async fn persist_failed(&self, _state: Self::TickState, claims: &BridgeClaims) {
			self.failed.lock().unwrap().push(claims.count());
		}
	}

	fn processor(
		state: MockStateProcessor,
		bridge: Arc<MockBridge>,
	) -> (TxsProcessor<MockStateProcessor>, Arc<MockStateProcessor>, Arc<OracleTelemetry>) {
		let state = Arc::new(state);
		let telemetry = Arc::new(OracleTelemetry::new());
		let processor = TxsProcessor::new(&config(), state.clone(), bridge, telemetry.clone());
		(processor, state, telemetry)
	}

	#[tokio::test]
	async fn test_start_chain_is_processed_first() {
		let (mut processor, state, _) =
			processor(MockStateProcessor::default(), Arc::new(MockBridge::default()));

		processor
			.process_all_starting_with_chain(&"vector".into())
			.await;

		assert_eq!(
			*state.checks.lock().unwrap(),
			vec![
				("vector".into(), 0),
				("vector".into(), 1),
				("prime".into(), 0),
				("prime".into(), 1),
			]
		);
		// Empty passes are persisted without touching the bridge.
		assert_eq!(*state.persisted.lock().unwrap(), vec![0]);
	}

	#[tokio::test]
	async fn test_full_batch_skips_remaining_chains() {
		let bridge = Arc::new(MockBridge::default());
		let (mut processor, state, telemetry) = processor(
			MockStateProcessor::with_pending(&[("prime", 5), ("vector", 2)]),
			bridge.clone(),
		);

		processor
			.process_all_starting_with_chain(&"vector".into())
			.await;

		// max_bridging_claims_to_group is 3: both vector claims and one prime claim.
		assert_eq!(bridge.submitted_counts(), vec![3]);
		assert_eq!(state.pending("vector"), 0);
		assert_eq!(state.pending("prime"), 4);
		assert!(!state
			.checks
			.lock()
			.unwrap()
			.contains(&("prime".into(), 1)));
		assert_eq!(
			telemetry.get(OracleCounter::SubmittedClaims, &"vector".into()),
			3
		);
	}

	#[tokio::test]
	async fn test_failed_submission_backs_off_without_persisting() {
		let bridge = Arc::new(MockBridge::default());
		bridge.fail_next(1);
		let (mut processor, state, telemetry) = processor(
			MockStateProcessor::with_pending(&[("prime", 3)]),
			bridge.clone(),
		);
		let prime = ChainId::from("prime");

		processor.process_all_starting_with_chain(&prime).await;
		assert!(state.persisted.lock().unwrap().is_empty());
		assert!(state.failed.lock().unwrap().is_empty());
		assert_eq!(state.pending("prime"), 3);
		assert_eq!(processor.settings().max_bridging_claims_to_group(&prime), 2);
		assert_eq!(telemetry.get(OracleCounter::SubmitFailures, &prime), 1);

		processor.process_all_starting_with_chain(&prime).await;
		assert_eq!(bridge.submitted_counts(), vec![2]);
		assert_eq!(*state.persisted.lock().unwrap(), vec![2]);
		assert_eq!(state.pending("prime"), 1);
		assert_eq!(processor.settings().max_bridging_claims_to_group(&prime), 3);
	}

	#[tokio::test]
	async fn test_single_claim_failures_raise_gas_multiplier() {
		let bridge = Arc::new(MockBridge::default());
		bridge.fail_next(2);
		let (mut processor, state, _) = processor(
			MockStateProcessor::with_pending(&[("prime", 1)]),
			bridge.clone(),
		);
		let prime = ChainId::from("prime");

		processor.process_all_starting_with_chain(&prime).await;
		processor.process_all_starting_with_chain(&prime).await;
		assert_eq!(processor.settings().gas_limit_multiplier(&prime), 2.0);
		// Each lone rejected claim is handed back for a delayed retry.
		assert_eq!(*state.failed.lock().unwrap(), vec![1, 1]);

		processor.process_all_starting_with_chain(&prime).await;
		assert_eq!(bridge.submitted_multipliers(), vec![2.0]);
		assert_eq!(processor.settings().gas_limit_multiplier(&prime), 1.0);
	}

	#[tokio::test]
	async fn test_each_chain_leads_one_pass_per_tick() {
		let (mut processor, state, _) =
			processor(MockStateProcessor::default(), Arc::new(MockBridge::default()));
		let (_shutdown_tx, mut shutdown_rx) = broadcast::channel(1);

		assert!(processor.check_should_generate_claims(&mut shutdown_rx).await);
		assert_eq!(*state.passes.lock().unwrap(), 2);

		let leaders: Vec<ChainId> = state
			.checks
			.lock()
			.unwrap()
			.chunks(4)
			.map(|pass| pass[0].0.clone())
			.collect();
		assert_eq!(leaders, vec![ChainId::from("prime"), ChainId::from("vector")]);
	}

	#[tokio::test]
	async fn test_shutdown_interrupts_tick_sleep() {
		let mut config = config();
		config.oracle.tick_time_ms = 60_000;
		let state = Arc::new(MockStateProcessor::default());
		let processor = TxsProcessor::new(
			&config,
			state.clone(),
			Arc::new(MockBridge::default()),
			Arc::new(OracleTelemetry::new()),
		);

		let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
		let handle = tokio::spawn(processor.start(shutdown_rx));
		shutdown_tx.send(()).unwrap();

		tokio::time::timeout(Duration::from_secs(5), handle)
			.await
			.unwrap()
			.unwrap();
		assert_eq!(*state.passes.lock().unwrap(), 0);
	}
}
