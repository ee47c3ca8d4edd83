//! Chain identifiers and chain families.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Chain identifier as used in configuration and on the bridge (e.g. `prime`, `nexus`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub String);

impl ChainId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for ChainId {
	fn from(value: &str) -> Self {
		Self(value.to_string())
	}
}

impl From<String> for ChainId {
	fn from(value: String) -> Self {
		Self(value)
	}
}

impl Borrow<str> for ChainId {
	fn borrow(&self) -> &str {
		&self.0
	}
}

/// How the expiry block of an expected transaction is located on a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryResolution {
	/// The first confirmed block at or after `ttl + offset` (slot-based chains
	/// where not every slot holds a block).
	FirstConfirmedBlock,
	/// Block number `ttl + offset` itself, once the indexer has processed it.
	LastProcessedBlock,
}

/// Chain family. Each family has its own transaction shape and state processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainType {
	Cardano,
	Evm,
}

impl ChainType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Cardano => "cardano",
			Self::Evm => "evm",
		}
	}

	pub fn expiry_resolution(&self) -> ExpiryResolution {
		match self {
			Self::Cardano => ExpiryResolution::FirstConfirmedBlock,
			Self::Evm => ExpiryResolution::LastProcessedBlock,
		}
	}

	/// EVM block numbers are final once confirmed, so cursors only compare numbers.
	pub fn compares_block_hash(&self) -> bool {
		matches!(self, Self::Cardano)
	}
}

impl fmt::Display for ChainType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	#[test]
	fn test_chain_id_lookup_by_str() {
		let mut map = HashMap::new();
		map.insert(ChainId::from("prime"), 1u32);

		assert_eq!(map.get("prime"), Some(&1));
		assert_eq!(map.get("vector"), None);
	}

	#[test]
	fn test_chain_id_serializes_as_plain_string() {
		let json = serde_json::to_string(&ChainId::from("nexus")).unwrap();
		assert_eq!(json, "\"nexus\"");
	}

	#[test]
	fn test_chain_type_behaviour() {
		assert_eq!(
			ChainType::Cardano.expiry_resolution(),
			ExpiryResolution::FirstConfirmedBlock
		);
		assert_eq!(
			ChainType::Evm.expiry_resolution(),
			ExpiryResolution::LastProcessedBlock
		);
		assert!(ChainType::Cardano.compares_block_hash());
		assert!(!ChainType::Evm.compares_block_hash());
	}
}
