//! Transaction signer handed from a session to the ledger layer.
//!
//! `AccountSigner` implements alloy's `TxSigner`, so a session's signing
//! capability plugs straight into an `EthereumWallet` without the ledger
//! backend knowing which agent produced it.

use alloy_consensus::SignableTransaction;
use alloy_network::TxSigner;
use alloy_primitives::{Address, Signature};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;

/// Signing capability of an established session.
#[derive(Clone)]
pub enum AccountSigner {
	/// Key material held in process.
	Local(PrivateKeySigner),
}

impl AccountSigner {
	pub fn address(&self) -> Address {
		match self {
			Self::Local(s) => Signer::address(s),
		}
	}

	/// Chain the signer stamps on transactions (EIP-155), if pinned.
	pub fn chain_id(&self) -> Option<u64> {
		match self {
			Self::Local(s) => Signer::chain_id(s),
		}
	}

	/// Returns the same signer pinned to `chain_id`.
	pub fn with_chain_id(self, chain_id: Option<u64>) -> Self {
		match self {
			Self::Local(s) => Self::Local(Signer::with_chain_id(s, chain_id)),
		}
	}

	/// Signs an EIP-191 personal message.
	pub async fn sign_message(&self, message: &[u8]) -> alloy_signer::Result<Signature> {
		match self {
			Self::Local(s) => s.sign_message(message).await,
		}
	}
}

#[async_trait]
impl TxSigner<Signature> for AccountSigner {
	fn address(&self) -> Address {
		AccountSigner::address(self)
	}

	async fn sign_transaction(
		&self,
		tx: &mut dyn SignableTransaction<Signature>,
	) -> alloy_signer::Result<Signature> {
		match self {
			Self::Local(s) => TxSigner::sign_transaction(s, tx).await,
		}
	}
}

impl std::fmt::Debug for AccountSigner {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Local(s) => f
				.debug_struct("AccountSigner::Local")
				.field("address", &Signer::address(s))
				.finish_non_exhaustive(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const TEST_PRIVATE_KEY: &str =
		"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn local_signer() -> AccountSigner {
		AccountSigner::Local(TEST_PRIVATE_KEY.parse().unwrap())
	}

	#[test]
	fn test_address_and_chain_pinning() {
		let signer = local_signer();
		assert_eq!(
			format!("{:?}", signer.address()).to_lowercase(),
			"0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
		);
		assert_eq!(signer.chain_id(), None);
		assert_eq!(signer.with_chain_id(Some(5611)).chain_id(), Some(5611));
	}

	#[tokio::test]
	async fn test_message_signature_recovers_to_signer() {
		let signer = local_signer();
		let signature = signer.sign_message(b"challenge").await.unwrap();
		let recovered = signature.recover_address_from_msg(b"challenge").unwrap();
		assert_eq!(recovered, signer.address());
	}

	#[test]
	fn test_debug_hides_key_material() {
		let rendered = format!("{:?}", local_signer());
		assert!(rendered.contains("AccountSigner::Local"));
		assert!(!rendered.contains("ac0974bec39a17e36ba4a6b4d238ff944bacb478"));
	}
}
