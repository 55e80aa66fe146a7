//! Asset input and derived metadata document.
//!
//! An [`Asset`] is what the caller hands to the publication pipeline: the file
//! bytes plus the descriptive fields registered on the ledger. The pipeline
//! derives an [`AssetMetadata`] document from it once the primary content has a
//! locator.

use serde::{Deserialize, Serialize};

/// Content type of the metadata document.
pub const METADATA_CONTENT_TYPE: &str = "application/json";

/// File name under which the metadata document is uploaded.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Description used when the caller supplies none.
pub const DEFAULT_DESCRIPTION: &str = "A research paper.";

/// A file-backed research asset submitted for publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
	/// Human title; becomes the metadata `name`.
	pub title: String,
	/// Free-text description; empty means [`DEFAULT_DESCRIPTION`].
	pub description: String,
	/// Original file name, sanitized before use in an object name.
	pub file_name: String,
	/// MIME type of the payload.
	pub content_type: String,
	/// Raw file bytes.
	pub payload: Vec<u8>,
	/// Content-integrity hash registered with the record.
	pub output_hash: String,
	/// Decimal price in the native coin, "0" for free access.
	pub price: String,
	/// Whether the ledger should open a DAO alongside the record.
	pub create_dao: bool,
}

/// Reasons an asset is rejected before any remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
	#[error("Asset payload is empty")]
	EmptyPayload,
	#[error("Asset title is empty")]
	EmptyTitle,
	#[error("Asset output hash is empty")]
	EmptyHash,
}

impl Asset {
	/// Checks the fields the pipeline cannot proceed without.
	pub fn validate(&self) -> Result<(), AssetError> {
		if self.payload.is_empty() {
			return Err(AssetError::EmptyPayload);
		}
		if self.title.trim().is_empty() {
			return Err(AssetError::EmptyTitle);
		}
		if self.output_hash.trim().is_empty() {
			return Err(AssetError::EmptyHash);
		}
		Ok(())
	}

	/// Price to submit, treating an empty string as zero.
	pub fn effective_price(&self) -> &str {
		let price = self.price.trim();
		if price.is_empty() {
			"0"
		} else {
			price
		}
	}

	/// Builds the metadata document that references the uploaded content.
	pub fn metadata(&self, content_locator: &str) -> AssetMetadata {
		let description = if self.description.trim().is_empty() {
			DEFAULT_DESCRIPTION.to_string()
		} else {
			self.description.clone()
		};
		AssetMetadata {
			name: self.title.clone(),
			description,
			pdf_url: content_locator.to_string(),
		}
	}
}

/// JSON document stored next to the content and registered on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetMetadata {
	pub name: String,
	pub description: String,
	/// Canonical locator of the primary content.
	pub pdf_url: String,
}

impl AssetMetadata {
	pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::utils::builders::AssetBuilder;

	#[test]
	fn test_validate_rejects_missing_fields() {
		assert_eq!(
			AssetBuilder::new().with_payload(vec![]).build().validate(),
			Err(AssetError::EmptyPayload)
		);
		assert_eq!(
			AssetBuilder::new().with_title("  ").build().validate(),
			Err(AssetError::EmptyTitle)
		);
		assert_eq!(
			AssetBuilder::new().with_output_hash("").build().validate(),
			Err(AssetError::EmptyHash)
		);
		assert!(AssetBuilder::new().build().validate().is_ok());
	}

	#[test]
	fn test_metadata_document() {
		let asset = AssetBuilder::new()
			.with_title("On Things")
			.with_description("")
			.build();
		let metadata = asset.metadata("gnfd://0xabc/1-paper.pdf");
		assert_eq!(metadata.description, DEFAULT_DESCRIPTION);

		let json: serde_json::Value =
			serde_json::from_slice(&metadata.to_json_bytes().unwrap()).unwrap();
		assert_eq!(json["name"], "On Things");
		assert_eq!(json["pdf_url"], "gnfd://0xabc/1-paper.pdf");
	}

	#[test]
	fn test_effective_price_defaults_to_zero() {
		assert_eq!(AssetBuilder::new().with_price("").build().effective_price(), "0");
		assert_eq!(
			AssetBuilder::new().with_price(" 0.5 ").build().effective_price(),
			"0.5"
		);
	}
}
