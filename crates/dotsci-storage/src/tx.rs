//! Prepared and signed storage transactions.
//!
//! A [`PreparedStorageTx`] is built once and never mutated: it is estimated,
//! then either dropped or signed into a [`SignedStorageTx`] and broadcast.
//! Retrying means preparing a new value.

use crate::TxEstimate;
use alloy_primitives::{keccak256, B256};
use dotsci_types::{Address, RedundancyType, Signature, Visibility};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Message carried by a storage transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageMsg {
	CreateContainer {
		creator: Address,
		container: String,
		visibility: Visibility,
		charged_read_quota: u64,
		primary_sp_address: Address,
	},
	CreateObject {
		creator: Address,
		container: String,
		object: String,
		content_type: String,
		visibility: Visibility,
		redundancy: RedundancyType,
		payload_size: usize,
		/// Integrity hash over the payload.
		payload_hash: B256,
		#[serde(skip)]
		payload: Arc<Vec<u8>>,
	},
}

impl StorageMsg {
	pub fn create_object(
		creator: Address,
		container: impl Into<String>,
		object: impl Into<String>,
		content_type: impl Into<String>,
		visibility: Visibility,
		redundancy: RedundancyType,
		payload: Vec<u8>,
	) -> Self {
		StorageMsg::CreateObject {
			creator,
			container: container.into(),
			object: object.into(),
			content_type: content_type.into(),
			visibility,
			redundancy,
			payload_size: payload.len(),
			payload_hash: keccak256(&payload),
			payload: Arc::new(payload),
		}
	}

	pub fn container(&self) -> &str {
		match self {
			StorageMsg::CreateContainer { container, .. } => container,
			StorageMsg::CreateObject { container, .. } => container,
		}
	}

	pub fn kind(&self) -> &'static str {
		match self {
			StorageMsg::CreateContainer { .. } => "create_container",
			StorageMsg::CreateObject { .. } => "create_object",
		}
	}

	/// Payload bytes of an object message.
	pub fn payload(&self) -> Option<&[u8]> {
		match self {
			StorageMsg::CreateObject { payload, .. } => Some(payload.as_slice()),
			StorageMsg::CreateContainer { .. } => None,
		}
	}
}

/// An immutable transaction ready for estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedStorageTx {
	msg: StorageMsg,
	/// Storage network the message targets.
	chain_id: u64,
	/// Network the signing agent was on when the session was established.
	signer_chain_id: u64,
}

impl PreparedStorageTx {
	pub fn new(msg: StorageMsg, chain_id: u64, signer_chain_id: u64) -> Self {
		Self {
			msg,
			chain_id,
			signer_chain_id,
		}
	}

	pub fn msg(&self) -> &StorageMsg {
		&self.msg
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn signer_chain_id(&self) -> u64 {
		self.signer_chain_id
	}

	/// Canonical bytes presented to the signing agent.
	///
	/// The payload is represented by its size and hash so the document stays
	/// small regardless of object size.
	pub fn signing_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
		serde_json::to_vec(self)
	}

	/// Attaches the estimate and the agent's signature.
	pub fn into_signed(self, estimate: TxEstimate, signature: Signature) -> SignedStorageTx {
		SignedStorageTx {
			prepared: self,
			estimate,
			signature,
		}
	}
}

/// A prepared transaction with its estimate and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedStorageTx {
	pub prepared: PreparedStorageTx,
	pub estimate: TxEstimate,
	pub signature: Signature,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn creator() -> Address {
		Address(vec![0xab; 20])
	}

	#[test]
	fn test_object_message_records_size_and_hash() {
		let msg = StorageMsg::create_object(
			creator(),
			"0xabab",
			"1-paper.pdf",
			"application/pdf",
			Visibility::PublicRead,
			RedundancyType::ErasureCoding,
			vec![7u8; 1024],
		);
		match &msg {
			StorageMsg::CreateObject {
				payload_size,
				payload_hash,
				..
			} => {
				assert_eq!(*payload_size, 1024);
				assert_eq!(*payload_hash, keccak256(vec![7u8; 1024]));
			},
			_ => panic!("expected object message"),
		}
		assert_eq!(msg.payload().map(|p| p.len()), Some(1024));
	}

	#[test]
	fn test_signing_bytes_exclude_payload_but_commit_to_it() {
		let build = |byte: u8| {
			PreparedStorageTx::new(
				StorageMsg::create_object(
					creator(),
					"c",
					"o",
					"text/plain",
					Visibility::PublicRead,
					RedundancyType::ErasureCoding,
					vec![byte; 4096],
				),
				5600,
				5611,
			)
		};
		let a = build(1).signing_bytes().unwrap();
		let b = build(2).signing_bytes().unwrap();
		assert_ne!(a, b);
		assert!(a.len() < 4096);

		let doc: serde_json::Value = serde_json::from_slice(&a).unwrap();
		assert_eq!(doc["msg"]["type"], "create_object");
		assert_eq!(doc["chain_id"], 5600);
	}
}
