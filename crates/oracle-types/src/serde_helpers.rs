//! Serde helpers for raw byte payloads.

/// Serializes `Vec<u8>` as a hex string so stored records and API payloads stay readable.
pub mod hex_bytes {
	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&hex::encode(bytes))
	}

	pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
	where
		D: Deserializer<'de>,
	{
		let value = String::deserialize(deserializer)?;
		let trimmed = value.strip_prefix("0x").unwrap_or(&value);

		hex::decode(trimmed).map_err(|e| serde::de::Error::custom(format!("Invalid hex: {}", e)))
	}
}
