// oracle-core/src/error.rs

use oracle_bridge::BridgeError;
use oracle_chains::ChainObserverError;
use oracle_processor::ProcessorError;
use oracle_state::StateError;
use oracle_storage::StorageError;
use oracle_types::{ChainId, ChainType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
	#[error("Configuration error: {0}")]
	Configuration(String),

	#[error("Service initialization error: {0}")]
	ServiceInit(String),

	#[error("Lifecycle error: {0}")]
	Lifecycle(String),

	#[error("Chain {0} is not configured")]
	UnknownChain(ChainId),

	#[error("Chain {chain_id} is a {expected} chain, got {actual} transactions")]
	ChainTypeMismatch {
		chain_id: ChainId,
		expected: ChainType,
		actual: ChainType,
	},

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),

	#[error("Bridge error: {0}")]
	Bridge(#[from] BridgeError),

	#[error("Processor error: {0}")]
	Processor(#[from] ProcessorError),

	#[error("Chain observer error: {0}")]
	Chain(#[from] ChainObserverError),

	#[error("State error: {0}")]
	State(#[from] StateError),
}
