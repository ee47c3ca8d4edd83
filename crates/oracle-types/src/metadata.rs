//! Metadata embedded in bridging transactions.
//!
//! The payload is a JSON object with the actual metadata under key `"1"`,
//! mirroring the metadata label used on Cardano. Field names are kept short
//! because the payload is stored on-chain.

use crate::chains::ChainId;
use crate::txs::{PRIORITY_BATCH_EXECUTION, PRIORITY_DEFAULT};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

const METADATA_MAP_KEY: &str = "1";

#[derive(Debug, Error)]
pub enum MetadataError {
	#[error("Metadata is empty")]
	Empty,
	#[error("Metadata key {0} not found")]
	MissingKey(&'static str),
	#[error("Failed to decode metadata: {0}")]
	Decode(String),
	#[error("Failed to encode metadata: {0}")]
	Encode(String),
}

/// Declared type of a bridging transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BridgingTxType {
	#[serde(rename = "bridge")]
	BridgingRequest,
	#[serde(rename = "batch")]
	BatchExecution,
	#[serde(rename = "refund")]
	RefundExecution,
	#[serde(rename = "fund")]
	HotWalletFund,
}

impl BridgingTxType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::BridgingRequest => "bridge",
			Self::BatchExecution => "batch",
			Self::RefundExecution => "refund",
			Self::HotWalletFund => "fund",
		}
	}

	/// Priority tier a transaction of this type is stored under.
	pub fn priority(&self) -> u8 {
		match self {
			Self::BatchExecution => PRIORITY_BATCH_EXECUTION,
			_ => PRIORITY_DEFAULT,
		}
	}
}

impl fmt::Display for BridgingTxType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// The part every metadata variant shares; used to pick a processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseMetadata {
	#[serde(rename = "t")]
	pub bridging_tx_type: BridgingTxType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchExecutedMetadata {
	#[serde(rename = "t")]
	pub bridging_tx_type: BridgingTxType,
	#[serde(rename = "n")]
	pub batch_nonce_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgingRequestMetadataTransaction {
	/// Receiver address, split in chunks to fit the on-chain string limit.
	#[serde(rename = "a")]
	pub address: Vec<String>,
	#[serde(rename = "m")]
	pub amount: u64,
}

impl BridgingRequestMetadataTransaction {
	pub fn address_string(&self) -> String {
		self.address.concat()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgingRequestMetadata {
	#[serde(rename = "t")]
	pub bridging_tx_type: BridgingTxType,
	#[serde(rename = "d")]
	pub destination_chain_id: ChainId,
	#[serde(rename = "s")]
	pub sender_addr: Vec<String>,
	#[serde(rename = "tx")]
	pub transactions: Vec<BridgingRequestMetadataTransaction>,
	#[serde(rename = "fa", default)]
	pub bridging_fee: u64,
}

/// Decodes the metadata stored under the `"1"` key of `data`.
pub fn unmarshal_metadata<T: DeserializeOwned>(data: &[u8]) -> Result<T, MetadataError> {
	if data.is_empty() {
		return Err(MetadataError::Empty);
	}

	let mut wrapper: HashMap<String, serde_json::Value> =
		serde_json::from_slice(data).map_err(|e| MetadataError::Decode(e.to_string()))?;

	let value = wrapper
		.remove(METADATA_MAP_KEY)
		.ok_or(MetadataError::MissingKey(METADATA_MAP_KEY))?;

	serde_json::from_value(value).map_err(|e| MetadataError::Decode(e.to_string()))
}

/// Encodes `metadata` under the `"1"` key.
pub fn marshal_metadata<T: Serialize>(metadata: &T) -> Result<Vec<u8>, MetadataError> {
	let value = serde_json::to_value(metadata).map_err(|e| MetadataError::Encode(e.to_string()))?;

	let mut wrapper = HashMap::with_capacity(1);
	wrapper.insert(METADATA_MAP_KEY, value);

	serde_json::to_vec(&wrapper).map_err(|e| MetadataError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_unmarshal_base_from_bridging_request() {
		let metadata = BridgingRequestMetadata {
			bridging_tx_type: BridgingTxType::BridgingRequest,
			destination_chain_id: "vector".into(),
			sender_addr: vec!["addr_test1".to_string(), "xyz".to_string()],
			transactions: vec![BridgingRequestMetadataTransaction {
				address: vec!["addr_".to_string(), "receiver".to_string()],
				amount: 2_000_000,
			}],
			bridging_fee: 1_100_000,
		};

		let bytes = marshal_metadata(&metadata).unwrap();
		let base: BaseMetadata = unmarshal_metadata(&bytes).unwrap();

		assert_eq!(base.bridging_tx_type, BridgingTxType::BridgingRequest);
		assert_eq!(
			metadata.transactions[0].address_string(),
			"addr_receiver".to_string()
		);
	}

	#[test]
	fn test_unmarshal_raw_payload() {
		let raw = br#"{"1":{"t":"batch","n":7}}"#;
		let metadata: BatchExecutedMetadata = unmarshal_metadata(raw).unwrap();

		assert_eq!(metadata.bridging_tx_type, BridgingTxType::BatchExecution);
		assert_eq!(metadata.batch_nonce_id, 7);
	}

	#[test]
	fn test_unmarshal_errors() {
		assert!(matches!(
			unmarshal_metadata::<BaseMetadata>(&[]),
			Err(MetadataError::Empty)
		));
		assert!(matches!(
			unmarshal_metadata::<BaseMetadata>(br#"{"2":{"t":"batch"}}"#),
			Err(MetadataError::MissingKey(_))
		));
		assert!(matches!(
			unmarshal_metadata::<BaseMetadata>(br#"{"1":{"t":"unknown"}}"#),
			Err(MetadataError::Decode(_))
		));
		assert!(matches!(
			unmarshal_metadata::<BaseMetadata>(b"not json"),
			Err(MetadataError::Decode(_))
		));
	}

	#[test]
	fn test_priority_per_type() {
		assert_eq!(BridgingTxType::BatchExecution.priority(), 0);
		assert_eq!(BridgingTxType::BridgingRequest.priority(), 1);
		assert_eq!(BridgingTxType::HotWalletFund.priority(), 1);
	}
}
