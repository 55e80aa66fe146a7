//! HTTP gateway object store.
//!
//! Talks to a storage-provider gateway that exposes the store's query and
//! transaction endpoints over JSON:
//!
//! - `GET  /containers/{name}` - container lookup, 404 when absent
//! - `POST /tx/estimate`        - simulate a prepared transaction
//! - `POST /tx/broadcast`       - commit a signed transaction
//! - `GET  /view/{container}/{object}` - object payload

use crate::{
	BackendError, BroadcastResult, ContainerInfo, ObjectStoreInterface, PreparedStorageTx,
	SignedStorageTx, TxEstimate,
};
use async_trait::async_trait;
use dotsci_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use reqwest::{
	header::{HeaderMap, HeaderValue, ACCEPT},
	Client, StatusCode, Url,
};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// JSON body of estimate and broadcast requests.
#[derive(Serialize)]
struct WireTx<'a> {
	tx: &'a PreparedStorageTx,
	/// Hex-encoded object payload, absent for container messages.
	#[serde(skip_serializing_if = "Option::is_none")]
	payload: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	gas_limit: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	gas_price: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	signature: Option<String>,
}

impl<'a> WireTx<'a> {
	fn unsigned(tx: &'a PreparedStorageTx) -> Self {
		Self {
			tx,
			payload: tx.msg().payload().map(hex::encode),
			gas_limit: None,
			gas_price: None,
			signature: None,
		}
	}

	fn signed(signed: &'a SignedStorageTx) -> Self {
		Self {
			gas_limit: Some(signed.estimate.gas_limit),
			gas_price: Some(signed.estimate.gas_price),
			signature: Some(signed.signature.to_hex()),
			..Self::unsigned(&signed.prepared)
		}
	}
}

/// Object store reached through an HTTP gateway.
pub struct HttpObjectStore {
	client: Client,
	base_url: String,
}

impl HttpObjectStore {
	pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
		let mut headers = HeaderMap::new();
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

		let client = Client::builder()
			.default_headers(headers)
			.timeout(timeout)
			.build()
			.map_err(|e| BackendError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	fn url(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path.trim_start_matches('/'))
	}

	/// `view/{container}/{object}` with each name encoded as one path segment.
	fn object_url(&self, container: &str, object: &str) -> Result<Url, BackendError> {
		let mut url = Url::parse(&self.base_url).map_err(|e| {
			BackendError::Configuration(format!("Invalid gateway URL {}: {}", self.base_url, e))
		})?;
		url.path_segments_mut()
			.map_err(|_| {
				BackendError::Configuration(format!("Gateway URL {} cannot hold a path", self.base_url))
			})?
			.pop_if_empty()
			.extend(["view", container, object]);
		Ok(url)
	}

	async fn post_json<T: serde::de::DeserializeOwned>(
		&self,
		path: &str,
		body: &WireTx<'_>,
	) -> Result<T, BackendError> {
		let url = self.url(path);
		debug!(url = %url, "Posting storage transaction");

		let response = self
			.client
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| BackendError::Network(format!("Request to {} failed: {}", url, e)))?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(if status.is_client_error() {
				BackendError::Rejected(format!("{}: {}", status, body))
			} else {
				BackendError::Network(format!("Gateway returned {}: {}", status, body))
			});
		}

		response
			.json::<T>()
			.await
			.map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {}", e)))
	}
}

/// Configuration schema for [`HttpObjectStore`].
pub struct HttpObjectStoreSchema;

impl ConfigSchema for HttpObjectStoreSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![Field::new("endpoint", FieldType::String).with_validator(|value| {
				match value.as_str() {
					Some(url) if url.starts_with("http://") || url.starts_with("https://") => {
						Ok(())
					},
					_ => Err("endpoint must be an http(s) URL".to_string()),
				}
			})],
			vec![Field::new(
				"timeout_seconds",
				FieldType::Integer {
					min: Some(1),
					max: Some(600),
				},
			)],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl ObjectStoreInterface for HttpObjectStore {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(HttpObjectStoreSchema)
	}

	async fn head_container(&self, name: &str) -> Result<ContainerInfo, BackendError> {
		let url = self.url(&format!("containers/{}", name));
		let response = self
			.client
			.get(&url)
			.send()
			.await
			.map_err(|e| BackendError::Network(format!("Request to {} failed: {}", url, e)))?;

		match response.status() {
			StatusCode::NOT_FOUND => Err(BackendError::NotFound(format!("No such bucket: {}", name))),
			status if status.is_success() => response.json::<ContainerInfo>().await.map_err(|e| {
				BackendError::InvalidResponse(format!("Failed to parse container: {}", e))
			}),
			status => {
				let body = response.text().await.unwrap_or_default();
				Err(BackendError::Network(format!(
					"Container lookup returned {}: {}",
					status, body
				)))
			},
		}
	}

	async fn estimate(&self, tx: &PreparedStorageTx) -> Result<TxEstimate, BackendError> {
		self.post_json("tx/estimate", &WireTx::unsigned(tx)).await
	}

	async fn broadcast(&self, tx: &SignedStorageTx) -> Result<BroadcastResult, BackendError> {
		self.post_json("tx/broadcast", &WireTx::signed(tx)).await
	}

	async fn fetch_object(&self, container: &str, object: &str) -> Result<Vec<u8>, BackendError> {
		let url = self.object_url(container, object)?;
		let response = self
			.client
			.get(url.clone())
			.send()
			.await
			.map_err(|e| BackendError::Network(format!("Request to {} failed: {}", url, e)))?;

		match response.status() {
			StatusCode::NOT_FOUND => Err(BackendError::NotFound(format!("{}/{}", container, object))),
			status if status.is_success() => response
				.bytes()
				.await
				.map(|b| b.to_vec())
				.map_err(|e| BackendError::Network(format!("Failed to read body: {}", e))),
			status => Err(BackendError::Network(format!("Object fetch returned {}", status))),
		}
	}
}

/// Factory function for the HTTP object store.
pub fn create_store(config: &toml::Value) -> Result<Box<dyn ObjectStoreInterface>, BackendError> {
	HttpObjectStoreSchema
		.validate(config)
		.map_err(|e| BackendError::Configuration(e.to_string()))?;

	let endpoint = config
		.get("endpoint")
		.and_then(|v| v.as_str())
		.ok_or_else(|| BackendError::Configuration("endpoint is required".to_string()))?;
	let timeout = config
		.get("timeout_seconds")
		.and_then(|v| v.as_integer())
		.map(|v| v as u64)
		.unwrap_or(DEFAULT_TIMEOUT_SECONDS);

	Ok(Box::new(HttpObjectStore::new(
		endpoint,
		Duration::from_secs(timeout),
	)?))
}

/// Registry for the HTTP object store.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "http";
	type Factory = crate::ObjectStoreFactory;

	fn factory() -> Self::Factory {
		create_store
	}
}

impl crate::ObjectStoreRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::StorageMsg;
	use dotsci_types::{Address, RedundancyType, Signature, Visibility};

	fn prepared() -> PreparedStorageTx {
		PreparedStorageTx::new(
			StorageMsg::create_object(
				Address(vec![0x22; 20]),
				"0x2222222222222222222222222222222222222222",
				"1-a.txt",
				"text/plain",
				Visibility::PublicRead,
				RedundancyType::ErasureCoding,
				b"abc".to_vec(),
			),
			5600,
			5611,
		)
	}

	#[test]
	fn test_url_joining() {
		let store = HttpObjectStore::new("https://sp.example/", Duration::from_secs(1)).unwrap();
		assert_eq!(store.url("/tx/estimate"), "https://sp.example/tx/estimate");
		assert_eq!(store.url("view/c/o"), "https://sp.example/view/c/o");
	}

	#[test]
	fn test_object_url_encodes_reserved_characters() {
		let store = HttpObjectStore::new("https://sp.example/", Duration::from_secs(1)).unwrap();
		let url = store.object_url("0xabc", "1-a#1.pdf").unwrap();
		assert_eq!(url.as_str(), "https://sp.example/view/0xabc/1-a%231.pdf");
		assert_eq!(url.fragment(), None);

		let url = store.object_url("0xabc", "1-50%?.pdf").unwrap();
		assert_eq!(url.path(), "/view/0xabc/1-50%25%3F.pdf");
		assert_eq!(url.query(), None);
	}

	#[test]
	fn test_wire_body_carries_payload_and_signature() {
		let prepared = prepared();
		let unsigned = serde_json::to_value(WireTx::unsigned(&prepared)).unwrap();
		assert_eq!(unsigned["payload"], "616263");
		assert!(unsigned.get("signature").is_none());

		let signed = prepared.into_signed(
			TxEstimate {
				gas_limit: 10,
				gas_price: 2,
			},
			Signature(vec![0xaa, 0xbb]),
		);
		let body = serde_json::to_value(WireTx::signed(&signed)).unwrap();
		assert_eq!(body["signature"], "0xaabb");
		assert_eq!(body["gas_limit"], 10);
		assert_eq!(body["tx"]["chain_id"], 5600);
	}

	#[tokio::test]
	async fn test_unreachable_gateway_is_network_error() {
		let store = HttpObjectStore::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
		assert!(matches!(
			store.head_container("0xabc").await,
			Err(BackendError::Network(_))
		));
	}

	#[test]
	fn test_schema_requires_http_endpoint() {
		let ok: toml::Value = toml::from_str("endpoint = \"https://sp.example\"").unwrap();
		assert!(HttpObjectStoreSchema.validate(&ok).is_ok());
		let bad: toml::Value = toml::from_str("endpoint = \"ftp://sp.example\"").unwrap();
		assert!(HttpObjectStoreSchema.validate(&bad).is_err());
		assert!(create_store(&bad).is_err());
	}
}
