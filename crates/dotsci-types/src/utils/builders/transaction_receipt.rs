//! Builder for finalized [`TransactionReceipt`] values.

use crate::{TransactionHash, TransactionReceipt};

#[derive(Debug, Clone)]
pub struct TransactionReceiptBuilder {
	hash: TransactionHash,
	block_number: u64,
	success: bool,
}

impl Default for TransactionReceiptBuilder {
	fn default() -> Self {
		Self {
			hash: TransactionHash(vec![0x11; 32]),
			block_number: 1,
			success: true,
		}
	}
}

impl TransactionReceiptBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_hash(mut self, hash: TransactionHash) -> Self {
		self.hash = hash;
		self
	}

	pub fn with_block_number(mut self, block_number: u64) -> Self {
		self.block_number = block_number;
		self
	}

	/// Marks the receipt as a reverted execution.
	pub fn reverted(mut self) -> Self {
		self.success = false;
		self
	}

	pub fn build(self) -> TransactionReceipt {
		TransactionReceipt {
			hash: self.hash,
			block_number: self.block_number,
			success: self.success,
		}
	}
}
