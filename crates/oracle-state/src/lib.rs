//! Bridging request state tracking.

pub mod manager;

pub use manager::{BridgingRequestStateManager, BridgingRequestStateUpdater};

use oracle_storage::StorageError;
use oracle_types::{InvalidTransitionError, TxKey};
use thiserror::Error;

/// State management errors
#[derive(Debug, Error)]
pub enum StateError {
	#[error(transparent)]
	InvalidTransition(#[from] InvalidTransitionError),

	#[error("Bridging request state not found: {0}")]
	NotFound(TxKey),

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),

	#[error("{}", join_errors(.0))]
	Multiple(Vec<StateError>),
}

impl StateError {
	/// Collapses per-item errors into a single result.
	pub fn join(mut errors: Vec<StateError>) -> Result<(), StateError> {
		match errors.len() {
			0 => Ok(()),
			1 => Err(errors.remove(0)),
			_ => Err(StateError::Multiple(errors)),
		}
	}
}

fn join_errors(errors: &[StateError]) -> String {
	errors
		.iter()
		.map(|e| e.to_string())
		.collect::<Vec<_>>()
		.join("; ")
}
