//! Bridging request status machine.
//!
//! Every user bridging request is tracked from its discovery on the source
//! chain until its funds are released on the destination chain. Statuses only
//! move forward; `InvalidRequest` and `ExecutedOnDestination` are terminal.

use crate::chains::ChainId;
use crate::txs::{TxHash, TxKey};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BridgingRequestStatus {
	DiscoveredOnSource,
	InvalidRequest,
	SubmittedToBridge,
	IncludedInBatch,
	SubmittedToDestination,
	FailedToExecuteOnDestination,
	ExecutedOnDestination,
}

impl BridgingRequestStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::DiscoveredOnSource => "DiscoveredOnSource",
			Self::InvalidRequest => "InvalidRequest",
			Self::SubmittedToBridge => "SubmittedToBridge",
			Self::IncludedInBatch => "IncludedInBatch",
			Self::SubmittedToDestination => "SubmittedToDestination",
			Self::FailedToExecuteOnDestination => "FailedToExecuteOnDestination",
			Self::ExecutedOnDestination => "ExecutedOnDestination",
		}
	}

	/// Display name, remapped to the refund flow names for refund requests.
	pub fn display_str(&self, is_refund: bool) -> &'static str {
		if !is_refund {
			return self.as_str();
		}

		match self {
			Self::SubmittedToBridge => "RefundRequestSubmittedToBridge",
			Self::SubmittedToDestination => "RefundSubmittedToChain",
			Self::FailedToExecuteOnDestination => "FailedToRefund",
			Self::ExecutedOnDestination => "RefundExecuted",
			other => other.as_str(),
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::InvalidRequest | Self::ExecutedOnDestination)
	}

	/// Whether moving from `self` to `to` would be a regression.
	fn forbids(&self, to: BridgingRequestStatus) -> bool {
		use BridgingRequestStatus::*;

		match self {
			DiscoveredOnSource => false,
			InvalidRequest | ExecutedOnDestination => true,
			SubmittedToBridge => matches!(to, DiscoveredOnSource | InvalidRequest),
			IncludedInBatch => matches!(to, DiscoveredOnSource | InvalidRequest | SubmittedToBridge),
			SubmittedToDestination => matches!(
				to,
				DiscoveredOnSource | InvalidRequest | SubmittedToBridge | IncludedInBatch
			),
			FailedToExecuteOnDestination => matches!(to, DiscoveredOnSource),
		}
	}
}

impl fmt::Display for BridgingRequestStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("BridgingRequestState ({chain_id}, {tx_hash}) invalid transition {from} -> {to}")]
pub struct InvalidTransitionError {
	pub chain_id: ChainId,
	pub tx_hash: TxHash,
	/// Current status, as displayed (refund names for refund requests).
	pub from: String,
	pub to: BridgingRequestStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgingRequestState {
	pub source_chain_id: ChainId,
	pub source_tx_hash: TxHash,
	#[serde(default)]
	pub destination_chain_id: Option<ChainId>,
	pub status: BridgingRequestStatus,
	#[serde(default)]
	pub destination_tx_hash: Option<TxHash>,
	#[serde(default)]
	pub batch_id: Option<u64>,
	#[serde(default)]
	pub is_refund: bool,
	/// Unix seconds of the last status change.
	#[serde(default)]
	pub updated_at: u64,
}

impl BridgingRequestState {
	pub fn new(source_chain_id: ChainId, source_tx_hash: TxHash, is_refund: bool) -> Self {
		Self {
			source_chain_id,
			source_tx_hash,
			destination_chain_id: None,
			status: BridgingRequestStatus::DiscoveredOnSource,
			destination_tx_hash: None,
			batch_id: None,
			is_refund,
			updated_at: 0,
		}
	}

	pub fn key(&self) -> TxKey {
		TxKey::new(self.source_chain_id.clone(), self.source_tx_hash.clone())
	}

	pub fn status_str(&self) -> &'static str {
		self.status.display_str(self.is_refund)
	}

	pub fn is_transition_possible(
		&self,
		new_status: BridgingRequestStatus,
	) -> Result<(), InvalidTransitionError> {
		if self.status.forbids(new_status) {
			return Err(InvalidTransitionError {
				chain_id: self.source_chain_id.clone(),
				tx_hash: self.source_tx_hash.clone(),
				from: self.status_str().to_string(),
				to: new_status,
			});
		}

		Ok(())
	}

	fn transition(&mut self, new_status: BridgingRequestStatus) -> Result<(), InvalidTransitionError> {
		self.is_transition_possible(new_status)?;
		self.status = new_status;
		Ok(())
	}

	pub fn to_invalid_request(&mut self) -> Result<(), InvalidTransitionError> {
		self.transition(BridgingRequestStatus::InvalidRequest)
	}

	pub fn to_submitted_to_bridge(
		&mut self,
		destination_chain_id: ChainId,
	) -> Result<(), InvalidTransitionError> {
		self.transition(BridgingRequestStatus::SubmittedToBridge)?;
		self.destination_chain_id = Some(destination_chain_id);
		Ok(())
	}

	pub fn to_included_in_batch(&mut self, batch_id: u64) -> Result<(), InvalidTransitionError> {
		self.transition(BridgingRequestStatus::IncludedInBatch)?;
		self.batch_id = Some(batch_id);
		Ok(())
	}

	pub fn to_submitted_to_destination(&mut self) -> Result<(), InvalidTransitionError> {
		self.transition(BridgingRequestStatus::SubmittedToDestination)
	}

	pub fn to_failed_to_execute_on_destination(&mut self) -> Result<(), InvalidTransitionError> {
		self.transition(BridgingRequestStatus::FailedToExecuteOnDestination)
	}

	pub fn to_executed_on_destination(
		&mut self,
		destination_tx_hash: TxHash,
	) -> Result<(), InvalidTransitionError> {
		self.transition(BridgingRequestStatus::ExecutedOnDestination)?;
		self.destination_tx_hash = Some(destination_tx_hash);
		Ok(())
	}
}

/// A freshly discovered bridging request, as reported by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBridgingRequestStateModel {
	pub source_tx_hash: TxHash,
	#[serde(default)]
	pub is_refund: bool,
}
