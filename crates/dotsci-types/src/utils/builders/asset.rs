//! Builder for [`Asset`] with a small valid PDF-like payload by default.

use crate::Asset;

/// Builder for creating `Asset` instances.
///
/// # Examples
///
/// ```
/// use dotsci_types::utils::builders::AssetBuilder;
///
/// let asset = AssetBuilder::new()
///     .with_file_name("paper.pdf")
///     .with_payload(vec![0u8; 1024])
///     .build();
/// assert_eq!(asset.payload.len(), 1024);
/// ```
#[derive(Debug, Clone)]
pub struct AssetBuilder {
	title: String,
	description: String,
	file_name: String,
	content_type: String,
	payload: Vec<u8>,
	output_hash: String,
	price: String,
	create_dao: bool,
}

impl Default for AssetBuilder {
	fn default() -> Self {
		Self {
			title: "Test Paper".to_string(),
			description: "A research paper.".to_string(),
			file_name: "paper.pdf".to_string(),
			content_type: "application/pdf".to_string(),
			payload: b"%PDF-1.4 test".to_vec(),
			output_hash: "QmTestOutputHash".to_string(),
			price: "0".to_string(),
			create_dao: false,
		}
	}
}

impl AssetBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_title(mut self, title: impl Into<String>) -> Self {
		self.title = title.into();
		self
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
		self.file_name = file_name.into();
		self
	}

	pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
		self.content_type = content_type.into();
		self
	}

	pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
		self.payload = payload;
		self
	}

	pub fn with_output_hash(mut self, output_hash: impl Into<String>) -> Self {
		self.output_hash = output_hash.into();
		self
	}

	pub fn with_price(mut self, price: impl Into<String>) -> Self {
		self.price = price.into();
		self
	}

	pub fn with_create_dao(mut self, create_dao: bool) -> Self {
		self.create_dao = create_dao;
		self
	}

	pub fn build(self) -> Asset {
		Asset {
			title: self.title,
			description: self.description,
			file_name: self.file_name,
			content_type: self.content_type,
			payload: self.payload,
			output_hash: self.output_hash,
			price: self.price,
			create_dao: self.create_dao,
		}
	}
}
