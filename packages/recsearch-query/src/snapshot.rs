use serde_json::Value;

use crate::Result;

/// Value fingerprint of a serialized request or filter. Two snapshots are equal exactly when the
/// JSON they were taken from serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSnapshot(String);
impl RequestSnapshot {
	pub fn of(value: &Value) -> Result<Self> {
		let raw = serde_json::to_vec(value)?;

		Ok(Self(blake3::hash(&raw).to_hex().to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Short form for log lines.
	pub fn prefix(&self) -> &str {
		let len = self.0.len().min(12);

		&self.0[..len]
	}
}
