//! Failure claims for batches that were not executed before their TTL.

use super::FailedTxProcessor;
use crate::ProcessorError;
use oracle_config::OracleConfig;
use oracle_types::{
	unmarshal_metadata, BatchExecutedMetadata, BatchExecutionFailedClaim, BridgeClaims,
	BridgingTxType, ExpectedTx,
};
use tracing::info;

/// Shared by every chain family: an expected tx carries the batch metadata the
/// bridge created, nothing chain specific.
pub struct BatchExecutionFailedProcessor;

impl FailedTxProcessor for BatchExecutionFailedProcessor {
	fn tx_type(&self) -> BridgingTxType {
		BridgingTxType::BatchExecution
	}

	fn pre_validate(&self, _tx: &ExpectedTx, _config: &OracleConfig) -> Result<(), ProcessorError> {
		Ok(())
	}

	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &ExpectedTx,
		_config: &OracleConfig,
	) -> Result<(), ProcessorError> {
		let metadata: BatchExecutedMetadata = unmarshal_metadata(&tx.metadata)?;
		if metadata.bridging_tx_type != self.tx_type() {
			return Err(ProcessorError::TypeMismatch {
				expected: self.tx_type(),
				actual: metadata.bridging_tx_type,
			});
		}

		claims
			.batch_execution_failed_claims
			.push(BatchExecutionFailedClaim {
				observed_transaction_hash: tx.hash.clone(),
				chain_id: tx.chain_id.clone(),
				batch_nonce_id: metadata.batch_nonce_id,
			});

		info!(
			tx = %tx.key(),
			batch_nonce_id = metadata.batch_nonce_id,
			"Added batch execution failed claim"
		);

		Ok(())
	}
}
