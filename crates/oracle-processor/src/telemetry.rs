//! Per-chain counters for the oracle pipeline.
//!
//! Counters only ever increase. They are labelled with the chain they relate
//! to and exposed as a sorted snapshot for the metrics endpoint.

use dashmap::DashMap;
use oracle_types::ChainId;
use serde::Serialize;
use std::fmt;

/// What a counter measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleCounter {
	/// Relevant transactions accepted by the receiver.
	TxsReceived,
	/// Transactions whose metadata could not be decoded.
	InvalidMetadata,
	/// Transactions rejected by a processor.
	InvalidClaims,
	/// Claims included in a successful submission.
	SubmittedClaims,
	/// Failed submissions.
	SubmitFailures,
}

impl OracleCounter {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::TxsReceived => "oracle_txs_received",
			Self::InvalidMetadata => "oracle_invalid_metadata",
			Self::InvalidClaims => "oracle_invalid_claims",
			Self::SubmittedClaims => "oracle_submitted_claims",
			Self::SubmitFailures => "oracle_submit_failures",
		}
	}
}

impl fmt::Display for OracleCounter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A counter value at the time of the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterValue {
	pub name: &'static str,
	pub chain_id: ChainId,
	pub value: u64,
}

#[derive(Debug, Default)]
pub struct OracleTelemetry {
	counters: DashMap<(OracleCounter, ChainId), u64>,
}

impl OracleTelemetry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn increment(&self, counter: OracleCounter, chain_id: &ChainId) {
		self.add(counter, chain_id, 1);
	}

	pub fn add(&self, counter: OracleCounter, chain_id: &ChainId, value: u64) {
		if value == 0 {
			return;
		}

		*self
			.counters
			.entry((counter, chain_id.clone()))
			.or_insert(0) += value;
	}

	pub fn get(&self, counter: OracleCounter, chain_id: &ChainId) -> u64 {
		self.counters
			.get(&(counter, chain_id.clone()))
			.map(|value| *value)
			.unwrap_or(0)
	}

	/// All counters, ordered by counter then chain.
	pub fn snapshot(&self) -> Vec<CounterValue> {
		let mut entries: Vec<_> = self
			.counters
			.iter()
			.map(|entry| (entry.key().clone(), *entry.value()))
			.collect();
		entries.sort();

		entries
			.into_iter()
			.map(|((counter, chain_id), value)| CounterValue {
				name: counter.as_str(),
				chain_id,
				value,
			})
			.collect()
	}
}
