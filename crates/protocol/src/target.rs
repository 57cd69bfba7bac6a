//! `Target` domain types: opening and closing isolated browsing contexts.

use serde::{Deserialize, Serialize};

/// Parameters for `Target.createTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetParams {
	/// Initial URL for the new target.
	pub url: String,
}

impl CreateTargetParams {
	/// A blank target, ready to be navigated.
	pub fn blank() -> Self {
		Self {
			url: "about:blank".to_string(),
		}
	}
}

/// Result of `Target.createTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTargetResult {
	/// Identifier of the created target.
	pub target_id: String,
}

/// Parameters for `Target.closeTarget`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseTargetParams {
	/// Identifier of the target to close.
	pub target_id: String,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn create_target_round_trip() {
		let params = CreateTargetParams::blank();
		let value = serde_json::to_value(&params).unwrap();
		assert_eq!(value["url"], "about:blank");

		let result: CreateTargetResult =
			serde_json::from_str(r#"{"targetId": "T-123"}"#).unwrap();
		assert_eq!(result.target_id, "T-123");
	}
}
