//! Success processors for EVM chains.
//!
//! EVM transactions reach the oracle as gateway events, so the contract has
//! already checked inputs and the locked value is carried on the transaction.

use super::SuccessTxProcessor;
use crate::ProcessorError;
use oracle_config::OracleConfig;
use oracle_types::{
	unmarshal_metadata, BatchExecutedClaim, BatchExecutedMetadata, BridgeClaims,
	BridgingRequestClaim, BridgingRequestMetadata, BridgingRequestReceiver, BridgingTxType,
	ChainTx, EthTx,
};
use tracing::debug;

pub struct EthBatchExecutedProcessor;

impl EthBatchExecutedProcessor {
	fn validate(&self, tx: &EthTx) -> Result<BatchExecutedMetadata, ProcessorError> {
		let metadata: BatchExecutedMetadata = unmarshal_metadata(&tx.metadata)?;
		if metadata.bridging_tx_type != self.tx_type() {
			return Err(ProcessorError::TypeMismatch {
				expected: self.tx_type(),
				actual: metadata.bridging_tx_type,
			});
		}

		Ok(metadata)
	}
}

impl SuccessTxProcessor<EthTx> for EthBatchExecutedProcessor {
	fn tx_type(&self) -> BridgingTxType {
		BridgingTxType::BatchExecution
	}

	fn pre_validate(&self, tx: &EthTx, _config: &OracleConfig) -> Result<(), ProcessorError> {
		self.validate(tx).map(|_| ())
	}

	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &EthTx,
		_config: &OracleConfig,
	) -> Result<(), ProcessorError> {
		let metadata = self.validate(tx)?;

		claims.batch_executed_claims.push(BatchExecutedClaim {
			observed_transaction_hash: tx.hash.clone(),
			chain_id: tx.origin_chain_id.clone(),
			batch_nonce_id: metadata.batch_nonce_id,
		});

		debug!(tx = %tx.key(), batch_nonce_id = metadata.batch_nonce_id, "Added batch executed claim");

		Ok(())
	}
}

/// Bridging requests emitted by the gateway contract of an EVM chain.
///
/// Unlike Cardano requests the fee is an ordinary receiver paying the fee
/// address of the destination, and every receiver (fee included) is claimed.
pub struct EthBridgingRequestedProcessor;

impl EthBridgingRequestedProcessor {
	fn validate(&self, tx: &EthTx, config: &OracleConfig) -> Result<BridgingRequestMetadata, ProcessorError> {
		let metadata: BridgingRequestMetadata = unmarshal_metadata(&tx.metadata)?;
		if metadata.bridging_tx_type != self.tx_type() {
			return Err(ProcessorError::TypeMismatch {
				expected: self.tx_type(),
				actual: metadata.bridging_tx_type,
			});
		}

		if !config.eth_chains.contains_key(&tx.origin_chain_id) {
			return Err(ProcessorError::UnregisteredChain(tx.origin_chain_id.clone()));
		}

		if metadata.destination_chain_id == tx.origin_chain_id {
			return Err(ProcessorError::validation(format!(
				"bridging direction not allowed: {} -> {}",
				tx.origin_chain_id, metadata.destination_chain_id
			)));
		}

		let cardano_dest = config.cardano_chains.get(&metadata.destination_chain_id);
		let (fee_address, min_fee_for_bridging) = match cardano_dest {
			Some(chain) => (chain.fee_address.as_str(), chain.min_fee_for_bridging),
			None => match config.eth_chains.get(&metadata.destination_chain_id) {
				Some(chain) => (chain.fee_address.as_str(), chain.min_fee_for_bridging),
				None => {
					return Err(ProcessorError::validation(format!(
						"destination chain not registered: {}",
						metadata.destination_chain_id
					)))
				}
			},
		};

		let max_receivers = config.bridging_settings.max_receivers_per_bridging_request;
		if metadata.transactions.len() > max_receivers {
			return Err(ProcessorError::validation(format!(
				"number of receivers in metadata greater than maximum allowed - no: {}, max: {}",
				metadata.transactions.len(),
				max_receivers
			)));
		}

		let mut found_fee = false;
		let mut fee_sum: u128 = 0;
		let mut receivers_sum: u128 = 0;

		for receiver in &metadata.transactions {
			if let Some(chain) = cardano_dest {
				if receiver.amount < chain.utxo_min_amount {
					return Err(ProcessorError::validation(format!(
						"found a utxo value below minimum value in metadata receivers: {} < {}",
						receiver.amount, chain.utxo_min_amount
					)));
				}
			}

			let amount = u128::from(receiver.amount);
			if receiver.address_string() == fee_address {
				found_fee = true;
				fee_sum += amount;
			}

			receivers_sum += amount;
		}

		if !found_fee {
			return Err(ProcessorError::validation(
				"destination chain fee address not found in receiver addrs",
			));
		}

		if fee_sum < u128::from(min_fee_for_bridging) {
			return Err(ProcessorError::validation(format!(
				"bridging fee in metadata receivers is less than minimum: fee {}, minFee {}",
				fee_sum, min_fee_for_bridging
			)));
		}

		if receivers_sum != tx.value {
			return Err(ProcessorError::validation(format!(
				"tx value is not equal to sum of receiver amounts: expected {} but got {}",
				tx.value, receivers_sum
			)));
		}

		Ok(metadata)
	}
}

impl SuccessTxProcessor<EthTx> for EthBridgingRequestedProcessor {
	fn tx_type(&self) -> BridgingTxType {
		BridgingTxType::BridgingRequest
	}

	/// Value and receiver checks run when the claim is built, after the
	/// request got its state.
	fn pre_validate(&self, tx: &EthTx, _config: &OracleConfig) -> Result<(), ProcessorError> {
		let metadata: BridgingRequestMetadata = unmarshal_metadata(&tx.metadata)?;
		if metadata.bridging_tx_type != self.tx_type() {
			return Err(ProcessorError::TypeMismatch {
				expected: self.tx_type(),
				actual: metadata.bridging_tx_type,
			});
		}

		Ok(())
	}

	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &EthTx,
		config: &OracleConfig,
	) -> Result<(), ProcessorError> {
		let metadata = self.validate(tx, config)?;

		let receivers: Vec<BridgingRequestReceiver> = metadata
			.transactions
			.iter()
			.map(|receiver| BridgingRequestReceiver {
				destination_address: receiver.address_string(),
				amount: u128::from(receiver.amount),
			})
			.collect();
		let total: u128 = receivers.iter().map(|receiver| receiver.amount).sum();

		claims.bridging_request_claims.push(BridgingRequestClaim {
			observed_transaction_hash: tx.hash.clone(),
			source_chain_id: tx.origin_chain_id.clone(),
			destination_chain_id: metadata.destination_chain_id.clone(),
			receivers,
			total_amount_src: total,
			total_amount_dst: total,
			retry_counter: 0,
		});

		debug!(
			tx = %tx.key(),
			destination = %metadata.destination_chain_id,
			"Added bridging request claim"
		);

		Ok(())
	}
}
