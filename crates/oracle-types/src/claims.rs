//! Claims submitted to the bridge contract.

use crate::chains::ChainId;
use crate::txs::TxHash;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgingRequestReceiver {
	pub destination_address: String,
	pub amount: u128,
}

/// A user locked funds on `source_chain_id` to be released on `destination_chain_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgingRequestClaim {
	pub observed_transaction_hash: TxHash,
	pub source_chain_id: ChainId,
	pub destination_chain_id: ChainId,
	pub receivers: Vec<BridgingRequestReceiver>,
	/// Receivers plus bridging fee, in source currency.
	pub total_amount_src: u128,
	/// Receivers plus destination fee payout, in destination currency.
	pub total_amount_dst: u128,
	pub retry_counter: u64,
}

/// A batch the bridge handed out was executed on `chain_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExecutedClaim {
	pub observed_transaction_hash: TxHash,
	pub chain_id: ChainId,
	pub batch_nonce_id: u64,
}

/// A batch was not executed on `chain_id` before its TTL passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExecutionFailedClaim {
	pub observed_transaction_hash: TxHash,
	pub chain_id: ChainId,
	pub batch_nonce_id: u64,
}

/// Funds were sent straight to the bridging address, topping up the hot wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotWalletIncrementClaim {
	pub chain_id: ChainId,
	pub amount: u128,
	pub is_increment: bool,
}

/// Not produced yet; refunds are modeled so the batch layout is stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundRequestClaim {
	pub origin_transaction_hash: TxHash,
	pub origin_chain_id: ChainId,
	pub origin_sender_address: String,
	pub origin_amount: u128,
	pub retry_counter: u64,
}

/// Not produced yet, see [`RefundRequestClaim`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundExecutedClaim {
	pub observed_transaction_hash: TxHash,
	pub chain_id: ChainId,
	pub refund_tx_hash: TxHash,
}

/// Claims accumulated during one orchestration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeClaims {
	pub bridging_request_claims: Vec<BridgingRequestClaim>,
	pub batch_executed_claims: Vec<BatchExecutedClaim>,
	pub batch_execution_failed_claims: Vec<BatchExecutionFailedClaim>,
	pub hot_wallet_increment_claims: Vec<HotWalletIncrementClaim>,
	pub refund_request_claims: Vec<RefundRequestClaim>,
	pub refund_executed_claims: Vec<RefundExecutedClaim>,
}

impl BridgeClaims {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of claims counted against the group size. Refund claims are not counted.
	pub fn count(&self) -> usize {
		self.bridging_request_claims.len()
			+ self.batch_executed_claims.len()
			+ self.batch_execution_failed_claims.len()
			+ self.hot_wallet_increment_claims.len()
	}

	pub fn any(&self) -> bool {
		self.count() > 0
	}

	pub fn can_add_more(&self, max_claims_to_group: usize) -> bool {
		self.count() < max_claims_to_group
	}
}

impl fmt::Display for BridgeClaims {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"BRC={} BEC={} BEFC={} HWIC={}",
			self.bridging_request_claims.len(),
			self.batch_executed_claims.len(),
			self.batch_execution_failed_claims.len(),
			self.hot_wallet_increment_claims.len()
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_count_and_capacity() {
		let mut claims = BridgeClaims::new();
		assert!(!claims.any());
		assert!(claims.can_add_more(1));
		assert!(!claims.can_add_more(0));

		claims.batch_executed_claims.push(BatchExecutedClaim {
			observed_transaction_hash: "aa".to_string(),
			chain_id: "prime".into(),
			batch_nonce_id: 1,
		});
		claims.hot_wallet_increment_claims.push(HotWalletIncrementClaim {
			chain_id: "prime".into(),
			amount: 10,
			is_increment: true,
		});

		assert_eq!(claims.count(), 2);
		assert!(claims.can_add_more(3));
		assert!(!claims.can_add_more(2));
		assert_eq!(claims.to_string(), "BRC=0 BEC=1 BEFC=0 HWIC=1");
	}

	#[test]
	fn test_refund_claims_are_not_counted() {
		let mut claims = BridgeClaims::new();
		claims.refund_executed_claims.push(RefundExecutedClaim {
			observed_transaction_hash: "aa".to_string(),
			chain_id: "prime".into(),
			refund_tx_hash: "bb".to_string(),
		});

		assert_eq!(claims.count(), 0);
		assert!(!claims.any());
	}
}
