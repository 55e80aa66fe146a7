//! Storage-side types: containers, objects and locators.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use url::Url;

/// Scheme prefix of canonical object locators.
pub const LOCATOR_SCHEME: &str = "gnfd://";

/// Read policy applied to containers and objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
	#[default]
	PublicRead,
	Private,
}

impl Visibility {
	pub fn as_str(&self) -> &'static str {
		match self {
			Visibility::PublicRead => "public_read",
			Visibility::Private => "private",
		}
	}
}

impl FromStr for Visibility {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"public_read" | "public-read" => Ok(Visibility::PublicRead),
			"private" => Ok(Visibility::Private),
			other => Err(format!("Unknown visibility: {}", other)),
		}
	}
}

/// Replication scheme requested for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RedundancyType {
	#[default]
	ErasureCoding,
	Replica,
}

/// A logical bucket owned by one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageContainer {
	/// Lower-cased `0x` hex address of the owner.
	pub name: String,
	pub visibility: Visibility,
	pub owner: crate::Address,
}

/// Canonical reference to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectLocator {
	pub container: String,
	pub object: String,
}

impl ObjectLocator {
	pub fn new(container: impl Into<String>, object: impl Into<String>) -> Self {
		Self {
			container: container.into(),
			object: object.into(),
		}
	}

	/// Human-viewable URL under a storage-provider gateway.
	///
	/// Container and object are percent-encoded as single path segments, so
	/// `#`, `?` and `%` in an object name stay part of the path.
	pub fn view_url(&self, view_base: &str) -> String {
		let Ok(mut url) = Url::parse(view_base) else {
			return format!(
				"{}/view/{}/{}",
				view_base.trim_end_matches('/'),
				self.container,
				self.object
			);
		};
		if let Ok(mut segments) = url.path_segments_mut() {
			segments
				.pop_if_empty()
				.extend(["view", self.container.as_str(), self.object.as_str()]);
		}
		url.into()
	}
}

impl fmt::Display for ObjectLocator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}{}/{}", LOCATOR_SCHEME, self.container, self.object)
	}
}

impl FromStr for ObjectLocator {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let rest = s
			.strip_prefix(LOCATOR_SCHEME)
			.ok_or_else(|| format!("Locator must start with {}: {}", LOCATOR_SCHEME, s))?;
		let (container, object) = rest
			.split_once('/')
			.ok_or_else(|| format!("Locator has no object segment: {}", s))?;
		if container.is_empty() || object.is_empty() {
			return Err(format!("Locator has an empty segment: {}", s));
		}
		Ok(Self::new(container, object))
	}
}

/// An immutable object created by a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
	pub locator: ObjectLocator,
	pub content_type: String,
	pub payload_size: usize,
	pub view_url: String,
}

impl StoredObject {
	pub fn container(&self) -> &str {
		&self.locator.container
	}

	pub fn object_name(&self) -> &str {
		&self.locator.object
	}

	/// Canonical locator string for ledger embedding.
	pub fn uri(&self) -> String {
		self.locator.to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_locator_format_and_parse() {
		let locator = ObjectLocator::new("0xabc", "1700000000000-paper.pdf");
		let text = locator.to_string();
		assert_eq!(text, "gnfd://0xabc/1700000000000-paper.pdf");
		assert_eq!(text.parse::<ObjectLocator>().unwrap(), locator);
	}

	#[test]
	fn test_locator_parse_rejects_malformed() {
		assert!("https://0xabc/x".parse::<ObjectLocator>().is_err());
		assert!("gnfd://0xabc".parse::<ObjectLocator>().is_err());
		assert!("gnfd:///x".parse::<ObjectLocator>().is_err());
	}

	#[test]
	fn test_view_url() {
		let locator = ObjectLocator::new("0xabc", "1-a.pdf");
		assert_eq!(
			locator.view_url("https://sp.example/"),
			"https://sp.example/view/0xabc/1-a.pdf"
		);
		assert_eq!(
			locator.view_url("https://sp.example/gateway"),
			"https://sp.example/gateway/view/0xabc/1-a.pdf"
		);
	}

	#[test]
	fn test_view_url_keeps_reserved_characters_in_the_path() {
		let locator = ObjectLocator::new("0xabc", "1-a#1?v=2 100%.pdf");
		let view = locator.view_url("https://sp.example");
		assert_eq!(
			view,
			"https://sp.example/view/0xabc/1-a%231%3Fv=2%20100%25.pdf"
		);

		let parsed = Url::parse(&view).unwrap();
		assert_eq!(parsed.fragment(), None);
		assert_eq!(parsed.query(), None);
		assert_eq!(parsed.path_segments().map(|s| s.count()), Some(3));
	}

	#[test]
	fn test_visibility_parse() {
		assert_eq!("public-read".parse::<Visibility>().unwrap(), Visibility::PublicRead);
		assert!("world".parse::<Visibility>().is_err());
	}
}
