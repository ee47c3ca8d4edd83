//! Success processors for Cardano chains.

use super::SuccessTxProcessor;
use crate::ProcessorError;
use oracle_config::{CardanoChainConfig, OracleConfig};
use oracle_types::{
	unmarshal_metadata, BatchExecutedClaim, BatchExecutedMetadata, BridgeClaims,
	BridgingRequestClaim, BridgingRequestMetadata, BridgingRequestReceiver, BridgingTxType,
	CardanoTx, ChainId, ChainTx, HotWalletIncrementClaim, TxOutput,
};
use tracing::debug;

/// Fee receiver used for EVM destinations, which have no fee address of their own in
/// the request metadata.
pub const EVM_FEE_RECEIVER_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

fn origin_config<'a>(
	tx: &CardanoTx,
	config: &'a OracleConfig,
) -> Result<&'a CardanoChainConfig, ProcessorError> {
	config
		.cardano_chains
		.get(&tx.origin_chain_id)
		.ok_or_else(|| ProcessorError::UnregisteredChain(tx.origin_chain_id.clone()))
}

fn ensure_type(expected: BridgingTxType, actual: BridgingTxType) -> Result<(), ProcessorError> {
	if expected != actual {
		return Err(ProcessorError::TypeMismatch { expected, actual });
	}

	Ok(())
}

/// Every input must be spent from the bridging or the fee multisig, and both must be spent.
pub(crate) fn validate_tx_inputs(tx: &CardanoTx, config: &OracleConfig) -> Result<(), ProcessorError> {
	let chain = origin_config(tx, config)?;
	let mut found_bridging = false;
	let mut found_fee = false;

	for input in &tx.inputs {
		if input.address == chain.bridging_address {
			found_bridging = true;
		} else if input.address == chain.fee_address {
			found_fee = true;
		} else {
			return Err(ProcessorError::validation(format!(
				"unexpected address found in tx input: {}",
				input.address
			)));
		}
	}

	if !found_bridging {
		return Err(ProcessorError::validation("bridging address not found in tx inputs"));
	}

	if !found_fee {
		return Err(ProcessorError::validation("fee address not found in tx inputs"));
	}

	Ok(())
}

/// Returns the first output paying the bridging address of the origin chain.
pub(crate) fn validate_tx_outputs<'a>(
	tx: &'a CardanoTx,
	config: &OracleConfig,
	allow_multiple: bool,
) -> Result<&'a TxOutput, ProcessorError> {
	let chain = origin_config(tx, config)?;
	let mut to_bridging = tx
		.outputs
		.iter()
		.filter(|output| output.address == chain.bridging_address);

	let first = to_bridging.next().ok_or_else(|| {
		ProcessorError::validation("bridging address on origin not found in utxos")
	})?;

	if !allow_multiple && to_bridging.next().is_some() {
		return Err(ProcessorError::validation(
			"found multiple utxos to the bridging address on origin",
		));
	}

	Ok(first)
}

/// Observes execution of a batch the bridge handed out for a Cardano chain.
pub struct CardanoBatchExecutedProcessor;

impl CardanoBatchExecutedProcessor {
	fn validate(
		&self,
		tx: &CardanoTx,
		config: &OracleConfig,
	) -> Result<BatchExecutedMetadata, ProcessorError> {
		let metadata: BatchExecutedMetadata = unmarshal_metadata(&tx.metadata)?;
		ensure_type(self.tx_type(), metadata.bridging_tx_type)?;
		validate_tx_inputs(tx, config)?;

		Ok(metadata)
	}
}

impl SuccessTxProcessor<CardanoTx> for CardanoBatchExecutedProcessor {
	fn tx_type(&self) -> BridgingTxType {
		BridgingTxType::BatchExecution
	}

	/// Only the metadata shape is checked here; inputs are checked when the
	/// claim is built so a bad batch tx still ends up as processed invalid.
	fn pre_validate(&self, tx: &CardanoTx, _config: &OracleConfig) -> Result<(), ProcessorError> {
		let metadata: BatchExecutedMetadata = unmarshal_metadata(&tx.metadata)?;
		ensure_type(self.tx_type(), metadata.bridging_tx_type)
	}

	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &CardanoTx,
		config: &OracleConfig,
	) -> Result<(), ProcessorError> {
		let metadata = self.validate(tx, config)?;

		claims.batch_executed_claims.push(BatchExecutedClaim {
			observed_transaction_hash: tx.hash.clone(),
			chain_id: tx.origin_chain_id.clone(),
			batch_nonce_id: metadata.batch_nonce_id,
		});

		debug!(
			tx = %tx.key(),
			batch_nonce_id = metadata.batch_nonce_id,
			"Added batch executed claim"
		);

		Ok(())
	}
}

/// Funds sent to the bridging address without metadata top up the hot wallet.
pub struct HotWalletIncrementProcessor;

impl HotWalletIncrementProcessor {
	fn validate(&self, tx: &CardanoTx, config: &OracleConfig) -> Result<(), ProcessorError> {
		validate_tx_outputs(tx, config, true)?;

		if !tx.metadata.is_empty() {
			return Err(ProcessorError::validation("metadata should be empty"));
		}

		Ok(())
	}
}

impl SuccessTxProcessor<CardanoTx> for HotWalletIncrementProcessor {
	fn tx_type(&self) -> BridgingTxType {
		BridgingTxType::HotWalletFund
	}

	fn pre_validate(&self, tx: &CardanoTx, config: &OracleConfig) -> Result<(), ProcessorError> {
		self.validate(tx, config)
	}

	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &CardanoTx,
		config: &OracleConfig,
	) -> Result<(), ProcessorError> {
		self.validate(tx, config)?;
		let chain = origin_config(tx, config)?;

		let amount: u128 = tx
			.outputs
			.iter()
			.filter(|output| output.address == chain.bridging_address)
			.map(|output| u128::from(output.amount))
			.sum();

		claims.hot_wallet_increment_claims.push(HotWalletIncrementClaim {
			chain_id: tx.origin_chain_id.clone(),
			amount,
			is_increment: true,
		});

		debug!(tx = %tx.key(), amount, "Added hot wallet increment claim");

		Ok(())
	}
}

/// Where the destination fee is paid and how much, per destination family.
struct DestinationFee {
	address: String,
	payout: u64,
	min_fee_for_bridging: u64,
}

enum Destination<'a> {
	Cardano(&'a CardanoChainConfig),
	Evm,
}

/// Users lock funds on the bridging address of a Cardano chain to be released
/// on a destination chain.
pub struct CardanoBridgingRequestedProcessor;

impl CardanoBridgingRequestedProcessor {
	fn destination<'a>(
		config: &'a OracleConfig,
		destination_chain_id: &ChainId,
	) -> Result<(Destination<'a>, DestinationFee), ProcessorError> {
		if let Some(chain) = config.cardano_chains.get(destination_chain_id) {
			let fee = DestinationFee {
				address: chain.fee_address.clone(),
				payout: chain.fee_addr_bridging_amount,
				min_fee_for_bridging: chain.min_fee_for_bridging,
			};
			return Ok((Destination::Cardano(chain), fee));
		}

		if let Some(chain) = config.eth_chains.get(destination_chain_id) {
			let fee = DestinationFee {
				address: EVM_FEE_RECEIVER_ADDRESS.to_string(),
				payout: chain.fee_addr_bridging_amount,
				min_fee_for_bridging: chain.min_fee_for_bridging,
			};
			return Ok((Destination::Evm, fee));
		}

		Err(ProcessorError::validation(format!(
			"destination chain not registered: {}",
			destination_chain_id
		)))
	}

	fn validate(
		&self,
		tx: &CardanoTx,
		metadata: &BridgingRequestMetadata,
		config: &OracleConfig,
	) -> Result<(), ProcessorError> {
		ensure_type(self.tx_type(), metadata.bridging_tx_type)?;
		origin_config(tx, config)?;

		if metadata.destination_chain_id == tx.origin_chain_id {
			return Err(ProcessorError::validation(format!(
				"bridging direction not allowed: {} -> {}",
				tx.origin_chain_id, metadata.destination_chain_id
			)));
		}

		let multisig_output = validate_tx_outputs(tx, config, false)?;
		let (destination, fee) = Self::destination(config, &metadata.destination_chain_id)?;

		let max_receivers = config.bridging_settings.max_receivers_per_bridging_request;
		if metadata.transactions.len() > max_receivers {
			return Err(ProcessorError::validation(format!(
				"number of receivers in metadata greater than maximum allowed - no: {}, max: {}",
				metadata.transactions.len(),
				max_receivers
			)));
		}

		let mut receivers_sum: u128 = 0;
		let mut fee_sum: u128 = 0;

		for receiver in &metadata.transactions {
			let address = receiver.address_string();
			let amount = u128::from(receiver.amount);

			if let Destination::Cardano(chain) = &destination {
				if receiver.amount < chain.utxo_min_amount {
					return Err(ProcessorError::validation(format!(
						"found a utxo value below minimum value in metadata receivers: {} < {}",
						receiver.amount, chain.utxo_min_amount
					)));
				}
			}

			if address == fee.address {
				fee_sum += amount;
			} else {
				receivers_sum += amount;
			}
		}

		let max_amount = config.bridging_settings.max_amount_allowed_to_bridge;
		if max_amount > 0 && receivers_sum > u128::from(max_amount) {
			return Err(ProcessorError::validation(format!(
				"sum of receiver amounts + fee: {} greater than maximum allowed: {}",
				receivers_sum, max_amount
			)));
		}

		let total_fee = u128::from(metadata.bridging_fee) + fee_sum;
		if total_fee < u128::from(fee.min_fee_for_bridging) {
			return Err(ProcessorError::validation(format!(
				"bridging fee in metadata receivers is less than minimum: fee {}, minFee {}",
				total_fee, fee.min_fee_for_bridging
			)));
		}

		if receivers_sum + total_fee != u128::from(multisig_output.amount) {
			return Err(ProcessorError::validation(format!(
				"multisig amount is not equal to sum of receiver amounts + fee: expected {} but got {}",
				multisig_output.amount,
				receivers_sum + total_fee
			)));
		}

		Ok(())
	}

	fn validate_tx(
		&self,
		tx: &CardanoTx,
		config: &OracleConfig,
	) -> Result<BridgingRequestMetadata, ProcessorError> {
		let metadata: BridgingRequestMetadata = unmarshal_metadata(&tx.metadata)?;
		self.validate(tx, &metadata, config)?;

		Ok(metadata)
	}
}

impl SuccessTxProcessor<CardanoTx> for CardanoBridgingRequestedProcessor {
	fn tx_type(&self) -> BridgingTxType {
		BridgingTxType::BridgingRequest
	}

	/// Amounts and receivers are left to [`Self::validate_and_add_claim`]: a
	/// request that fails them must still get a state so it can be reported
	/// as invalid.
	fn pre_validate(&self, tx: &CardanoTx, _config: &OracleConfig) -> Result<(), ProcessorError> {
		let metadata: BridgingRequestMetadata = unmarshal_metadata(&tx.metadata)?;
		ensure_type(self.tx_type(), metadata.bridging_tx_type)
	}

	fn validate_and_add_claim(
		&self,
		claims: &mut BridgeClaims,
		tx: &CardanoTx,
		config: &OracleConfig,
	) -> Result<(), ProcessorError> {
		let metadata = self.validate_tx(tx, config)?;
		let (_, fee) = Self::destination(config, &metadata.destination_chain_id)?;

		let mut receivers = Vec::with_capacity(metadata.transactions.len() + 1);
		let mut receivers_sum: u128 = 0;
		let mut fee_sum: u128 = 0;

		for receiver in &metadata.transactions {
			let address = receiver.address_string();
			let amount = u128::from(receiver.amount);

			if address == fee.address {
				fee_sum += amount;
				continue;
			}

			receivers_sum += amount;
			receivers.push(BridgingRequestReceiver {
				destination_address: address,
				amount,
			});
		}

		let fee_payout = u128::from(fee.payout);
		receivers.push(BridgingRequestReceiver {
			destination_address: fee.address,
			amount: fee_payout,
		});

		claims.bridging_request_claims.push(BridgingRequestClaim {
			observed_transaction_hash: tx.hash.clone(),
			source_chain_id: tx.origin_chain_id.clone(),
			destination_chain_id: metadata.destination_chain_id.clone(),
			receivers,
			total_amount_src: receivers_sum + u128::from(metadata.bridging_fee) + fee_sum,
			total_amount_dst: receivers_sum + fee_payout,
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

#[cfg(test)]
mod tests {
	use super::*;
	use crate::processors::test_utils::*;
	use oracle_types::TxInput;

	fn input(address: &str) -> TxInput {
		TxInput {
			hash: "prev".to_string(),
			index: 0,
			address: address.to_string(),
			amount: 10,
		}
	}

	fn rejection(
		processor: &dyn SuccessTxProcessor<CardanoTx>,
		tx: &CardanoTx,
		config: &OracleConfig,
	) -> ProcessorError {
		let mut claims = BridgeClaims::new();
		let err = processor
			.validate_and_add_claim(&mut claims, tx, config)
			.unwrap_err();
		assert!(!claims.any());
		err
	}

	fn bridging_tx(metadata: Vec<u8>, locked: u64) -> CardanoTx {
		cardano_tx(
			"aa",
			6,
			metadata,
			vec![output(PRIME_BRIDGING, locked), output("addr_change", 5)],
		)
	}

	#[test]
	fn test_batch_executed_requires_both_multisig_inputs() {
		let config = config();
		let processor = CardanoBatchExecutedProcessor;
		let mut tx = cardano_tx(
			"aa",
			6,
			batch_metadata(BridgingTxType::BatchExecution, 9),
			vec![],
		);
		tx.inputs = vec![input(PRIME_BRIDGING), input(PRIME_FEE)];

		let mut claims = BridgeClaims::new();
		processor
			.validate_and_add_claim(&mut claims, &tx, &config)
			.unwrap();
		assert_eq!(
			claims.batch_executed_claims,
			vec![BatchExecutedClaim {
				observed_transaction_hash: "aa".to_string(),
				chain_id: "prime".into(),
				batch_nonce_id: 9,
			}]
		);

		tx.inputs = vec![input(PRIME_BRIDGING)];
		let err = rejection(&processor, &tx, &config);
		assert!(err.to_string().contains("fee address not found in tx inputs"));

		tx.inputs = vec![input(PRIME_FEE)];
		let err = rejection(&processor, &tx, &config);
		assert!(err.to_string().contains("bridging address not found in tx inputs"));

		tx.inputs = vec![input(PRIME_BRIDGING), input(PRIME_FEE), input("addr_other")];
		let err = rejection(&processor, &tx, &config);
		assert!(err.to_string().contains("unexpected address found in tx input"));
	}

	#[test]
	fn test_hot_wallet_increment_sums_bridging_outputs() {
		let config = config();
		let processor = HotWalletIncrementProcessor;
		let tx = cardano_tx(
			"aa",
			6,
			vec![],
			vec![
				output(PRIME_BRIDGING, 100),
				output("addr_change", 7),
				output(PRIME_BRIDGING, 50),
			],
		);

		let mut claims = BridgeClaims::new();
		processor
			.validate_and_add_claim(&mut claims, &tx, &config)
			.unwrap();
		assert_eq!(
			claims.hot_wallet_increment_claims,
			vec![HotWalletIncrementClaim {
				chain_id: "prime".into(),
				amount: 150,
				is_increment: true,
			}]
		);

		let mut with_metadata = tx.clone();
		with_metadata.metadata = b"{}".to_vec();
		let err = processor.pre_validate(&with_metadata, &config).unwrap_err();
		assert!(err.to_string().contains("metadata should be empty"));
	}

	#[test]
	fn test_bridging_request_to_cardano() {
		let config = config();
		let processor = CardanoBridgingRequestedProcessor;
		// 2 ADA to the receiver, 1.1 ADA bridging fee and 1 ADA paid to the fee address.
		let metadata = bridging_metadata(
			"vector",
			1_100_000,
			vec![
				receiver("addr_vector_receiver", 2_000_000),
				receiver(VECTOR_FEE, 1_000_000),
			],
		);
		let tx = bridging_tx(metadata, 4_100_000);

		let mut claims = BridgeClaims::new();
		processor
			.validate_and_add_claim(&mut claims, &tx, &config)
			.unwrap();

		let claim = &claims.bridging_request_claims[0];
		assert_eq!(claim.source_chain_id, ChainId::from("prime"));
		assert_eq!(claim.destination_chain_id, ChainId::from("vector"));
		assert_eq!(claim.total_amount_src, 4_100_000);
		assert_eq!(claim.total_amount_dst, 3_000_000);
		assert_eq!(claim.retry_counter, 0);
		assert_eq!(
			claim.receivers,
			vec![
				BridgingRequestReceiver {
					destination_address: "addr_vector_receiver".to_string(),
					amount: 2_000_000,
				},
				BridgingRequestReceiver {
					destination_address: VECTOR_FEE.to_string(),
					amount: 1_000_000,
				},
			]
		);
	}

	#[test]
	fn test_bridging_request_to_evm_uses_zero_fee_address() {
		let config = config();
		let processor = CardanoBridgingRequestedProcessor;
		let metadata = bridging_metadata(
			"nexus",
			1_000_010,
			vec![receiver("0xreceiver", 500)],
		);
		let tx = bridging_tx(metadata, 1_000_510);

		let mut claims = BridgeClaims::new();
		processor
			.validate_and_add_claim(&mut claims, &tx, &config)
			.unwrap();

		let claim = &claims.bridging_request_claims[0];
		assert_eq!(claim.receivers.len(), 2);
		assert_eq!(claim.receivers[1].destination_address, EVM_FEE_RECEIVER_ADDRESS);
		assert_eq!(claim.total_amount_dst, 1_000_500);
	}

	#[test]
	fn test_bridging_request_rejections() {
		let config = config();
		let processor = CardanoBridgingRequestedProcessor;

		let cases = vec![
			(
				bridging_tx(
					bridging_metadata("prime", 1_100_000, vec![receiver("addr_x", 2_000_000)]),
					3_100_000,
				),
				"bridging direction not allowed",
			),
			(
				bridging_tx(
					bridging_metadata("unknown", 1_100_000, vec![receiver("addr_x", 2_000_000)]),
					3_100_000,
				),
				"destination chain not registered",
			),
			(
				bridging_tx(
					bridging_metadata("vector", 1_100_000, vec![receiver("addr_x", 999_999)]),
					2_099_999,
				),
				"below minimum value",
			),
			(
				bridging_tx(
					bridging_metadata("vector", 1_000, vec![receiver("addr_x", 2_000_000)]),
					2_001_000,
				),
				"less than minimum",
			),
			(
				bridging_tx(
					bridging_metadata("vector", 1_100_000, vec![receiver("addr_x", 2_000_000)]),
					3_000_000,
				),
				"multisig amount is not equal",
			),
			(
				bridging_tx(
					bridging_metadata(
						"vector",
						1_100_000,
						(0..5).map(|i| receiver(&format!("addr_{}", i), 2_000_000)).collect(),
					),
					11_100_000,
				),
				"greater than maximum allowed",
			),
		];

		for (tx, expected) in cases {
			let err = rejection(&processor, &tx, &config);
			assert!(
				err.to_string().contains(expected),
				"expected '{}' in '{}'",
				expected,
				err
			);
		}
	}

	#[test]
	fn test_pre_validation_only_checks_metadata_shape() {
		let config = config();
		let processor = CardanoBridgingRequestedProcessor;

		let underfunded = bridging_tx(
			bridging_metadata("vector", 1_100_000, vec![receiver("addr_x", 2_000_000)]),
			1_000,
		);
		processor.pre_validate(&underfunded, &config).unwrap();

		let mut batch = cardano_tx("bb", 6, batch_metadata(BridgingTxType::BatchExecution, 2), vec![]);
		batch.inputs = vec![input("addr_other")];
		CardanoBatchExecutedProcessor
			.pre_validate(&batch, &config)
			.unwrap();

		let wrong_shape = bridging_tx(batch_metadata(BridgingTxType::BridgingRequest, 2), 1_000);
		assert!(matches!(
			processor.pre_validate(&wrong_shape, &config),
			Err(ProcessorError::Metadata(_))
		));
	}

	#[test]
	fn test_bridging_request_output_checks() {
		let config = config();
		let processor = CardanoBridgingRequestedProcessor;
		let metadata = bridging_metadata("vector", 1_100_000, vec![receiver("addr_x", 2_000_000)]);

		let none = cardano_tx("aa", 6, metadata.clone(), vec![output("addr_change", 5)]);
		let err = rejection(&processor, &none, &config);
		assert!(err.to_string().contains("bridging address on origin not found"));

		let twice = cardano_tx(
			"aa",
			6,
			metadata,
			vec![output(PRIME_BRIDGING, 3_100_000), output(PRIME_BRIDGING, 1)],
		);
		let err = rejection(&processor, &twice, &config);
		assert!(err.to_string().contains("found multiple utxos"));
	}

	#[test]
	fn test_max_amount_allowed_to_bridge() {
		let mut config = config();
		config.bridging_settings.max_amount_allowed_to_bridge = 1_500_000;
		let processor = CardanoBridgingRequestedProcessor;

		let tx = bridging_tx(
			bridging_metadata("vector", 1_100_000, vec![receiver("addr_x", 2_000_000)]),
			3_100_000,
		);
		let err = rejection(&processor, &tx, &config);
		assert!(err.to_string().contains("greater than maximum allowed: 1500000"));
	}
}
