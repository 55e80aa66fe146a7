//! Builder for [`PublicationRecord`].

use crate::{Address, PublicationRecord};
use alloy_primitives::U256;

#[derive(Debug, Clone)]
pub struct PublicationRecordBuilder {
	id: u64,
	author: Address,
	metadata_uri: String,
	content_uri: Option<String>,
	content_hash: Option<String>,
	price: Option<U256>,
}

impl Default for PublicationRecordBuilder {
	fn default() -> Self {
		Self {
			id: 1,
			author: Address(vec![0xab; 20]),
			metadata_uri: "gnfd://0xabababababababababababababababababababab/1-metadata.json"
				.to_string(),
			content_uri: None,
			content_hash: None,
			price: None,
		}
	}
}

impl PublicationRecordBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_id(mut self, id: u64) -> Self {
		self.id = id;
		self
	}

	pub fn with_author(mut self, author: Address) -> Self {
		self.author = author;
		self
	}

	pub fn with_metadata_uri(mut self, uri: impl Into<String>) -> Self {
		self.metadata_uri = uri.into();
		self
	}

	pub fn with_content_uri(mut self, uri: impl Into<String>) -> Self {
		self.content_uri = Some(uri.into());
		self
	}

	pub fn with_content_hash(mut self, hash: impl Into<String>) -> Self {
		self.content_hash = Some(hash.into());
		self
	}

	pub fn with_price(mut self, price: U256) -> Self {
		self.price = Some(price);
		self
	}

	pub fn build(self) -> PublicationRecord {
		PublicationRecord {
			id: self.id,
			author: self.author,
			metadata_uri: self.metadata_uri,
			content_uri: self.content_uri,
			content_hash: self.content_hash,
			price: self.price,
		}
	}
}
