//! Adaptive submission settings of an orchestrator.
//!
//! A failed submission shrinks the batch size used when the same start chain
//! comes around again; once a single claim keeps failing the gas limit
//! multiplier is raised instead. A successful submission restores both.

use oracle_types::ChainId;
use std::collections::HashMap;

pub const MIN_BRIDGING_CLAIMS_TO_GROUP: usize = 1;
pub const DEFAULT_GAS_LIMIT_MULTIPLIER: f32 = 1.0;
pub const GAS_LIMIT_MULTIPLIER_STEP: f32 = 0.5;
pub const MAX_GAS_LIMIT_MULTIPLIER: f32 = 3.0;

#[derive(Debug, Clone)]
pub struct TxsProcessorSettings {
	default_max_claims_to_group: usize,
	max_bridging_claims_to_group: HashMap<ChainId, usize>,
	gas_limit_multiplier: HashMap<ChainId, f32>,
}

impl TxsProcessorSettings {
	pub fn new(chain_ids: &[ChainId], default_max_claims_to_group: usize) -> Self {
		Self {
			default_max_claims_to_group,
			max_bridging_claims_to_group: chain_ids
				.iter()
				.map(|chain_id| (chain_id.clone(), default_max_claims_to_group))
				.collect(),
			gas_limit_multiplier: chain_ids
				.iter()
				.map(|chain_id| (chain_id.clone(), DEFAULT_GAS_LIMIT_MULTIPLIER))
				.collect(),
		}
	}

	pub fn max_bridging_claims_to_group(&self, chain_id: &ChainId) -> usize {
		self.max_bridging_claims_to_group
			.get(chain_id)
			.copied()
			.unwrap_or(self.default_max_claims_to_group)
	}

	pub fn gas_limit_multiplier(&self, chain_id: &ChainId) -> f32 {
		self.gas_limit_multiplier
			.get(chain_id)
			.copied()
			.unwrap_or(DEFAULT_GAS_LIMIT_MULTIPLIER)
	}

	pub fn on_submit_claims_failed(&mut self, chain_id: &ChainId, claims_count: usize) {
		let max = claims_count
			.saturating_sub(1)
			.max(MIN_BRIDGING_CLAIMS_TO_GROUP);
		self.max_bridging_claims_to_group
			.insert(chain_id.clone(), max);

		let multiplier = self.gas_limit_multiplier(chain_id);
		if claims_count <= MIN_BRIDGING_CLAIMS_TO_GROUP
			&& multiplier + GAS_LIMIT_MULTIPLIER_STEP <= MAX_GAS_LIMIT_MULTIPLIER
		{
			self.gas_limit_multiplier
				.insert(chain_id.clone(), multiplier + GAS_LIMIT_MULTIPLIER_STEP);
		}
	}

	pub fn reset_submit_claims_settings(&mut self, chain_id: &ChainId) {
		self.max_bridging_claims_to_group
			.insert(chain_id.clone(), self.default_max_claims_to_group);
		self.gas_limit_multiplier
			.insert(chain_id.clone(), DEFAULT_GAS_LIMIT_MULTIPLIER);
	}
}
