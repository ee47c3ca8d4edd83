//! Access to the bridge contract.
//!
//! The oracle talks to the bridge to submit the claims of a pass, to fetch
//! the transactions the bridge expects to see on a chain (batches it handed
//! out for execution) and to report which blocks of a chain it has fully
//! processed.

use async_trait::async_trait;
use oracle_chains::ConfirmedBlock;
use oracle_types::{BridgeClaims, ChainId, ExpectedTx};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod http;
pub mod retry;

pub use http::HttpBridge;
pub use retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum BridgeError {
	#[error("Transport error: {0}")]
	Transport(String),

	#[error("Bridge responded with status {status}: {body}")]
	Status { status: u16, body: String },

	#[error("Invalid bridge response: {0}")]
	Decode(String),

	#[error("Client configuration error: {0}")]
	Configuration(String),
}

impl BridgeError {
	/// Connection problems and server-side failures are worth retrying; a
	/// rejected request is not.
	pub fn is_transient(&self) -> bool {
		match self {
			Self::Transport(_) => true,
			Self::Status { status, .. } => *status >= 500 || *status == 429,
			Self::Decode(_) | Self::Configuration(_) => false,
		}
	}
}

/// Per-submission options chosen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubmitOpts {
	pub gas_limit_multiplier: f32,
}

impl Default for SubmitOpts {
	fn default() -> Self {
		Self {
			gas_limit_multiplier: 1.0,
		}
	}
}

#[async_trait]
pub trait BridgeInterface: Send + Sync {
	async fn submit_claims(&self, claims: &BridgeClaims, opts: SubmitOpts) -> Result<(), BridgeError>;

	/// Transactions the bridge expects on `chain_id`, in any order.
	async fn get_expected_txs(&self, chain_id: &ChainId) -> Result<Vec<ExpectedTx>, BridgeError>;

	/// Reports `blocks` of `chain_id`, ascending, as observed by this oracle.
	async fn submit_confirmed_blocks(
		&self,
		chain_id: &ChainId,
		blocks: &[ConfirmedBlock],
	) -> Result<(), BridgeError>;
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_transient_errors() {
		assert!(BridgeError::Transport("reset".into()).is_transient());
		assert!(BridgeError::Status {
			status: 503,
			body: String::new()
		}
		.is_transient());
		assert!(!BridgeError::Status {
			status: 400,
			body: String::new()
		}
		.is_transient());
		assert!(!BridgeError::Decode("eof".into()).is_transient());
	}
}
