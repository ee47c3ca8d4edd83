//! Transaction classification and claim building.
//!
//! The [`TxsReceiver`] classifies confirmed transactions delivered by the chain
//! observers and stores the relevant ones as unprocessed. The
//! [`TxsStateProcessor`] later walks unprocessed and expected transactions of
//! one chain block by block, validates them through the registered
//! [`processors`] and appends the resulting claims to a [`BridgeClaims`]
//! batch.
//!
//! [`BridgeClaims`]: oracle_types::BridgeClaims

use oracle_storage::StorageError;
use oracle_types::{BridgingTxType, ChainId, MetadataError};
use thiserror::Error;

pub mod processors;
pub mod receiver;
pub mod state_processor;
pub mod telemetry;

pub use processors::{
	cardano_tx_processors, eth_tx_processors, FailedTxProcessor, SuccessTxProcessor,
	TxProcessorsCollection,
};
pub use receiver::TxsReceiver;
pub use state_processor::{
	CardanoStateProcessor, ChainTxsProcessorState, EthStateProcessor, TickState,
	TxsStateProcessor,
};
pub use telemetry::{OracleCounter, OracleTelemetry};

#[derive(Debug, Error)]
pub enum ProcessorError {
	#[error("Invalid metadata: {0}")]
	Metadata(#[from] MetadataError),

	#[error("Irrelevant tx. Tx type: {0}")]
	IrrelevantTx(String),

	#[error("Processor for {expected} called for tx of type {actual}")]
	TypeMismatch {
		expected: BridgingTxType,
		actual: BridgingTxType,
	},

	#[error("Chain {0} is not registered")]
	UnregisteredChain(ChainId),

	#[error("Validation failed: {0}")]
	Validation(String),

	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),
}

impl ProcessorError {
	pub(crate) fn validation(message: impl Into<String>) -> Self {
		Self::Validation(message.into())
	}
}
