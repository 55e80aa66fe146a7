//! Fluent builders for pipeline types, used by tests across the workspace.

pub mod asset;
pub mod publication_record;
pub mod transaction_receipt;

pub use asset::AssetBuilder;
pub use publication_record::PublicationRecordBuilder;
pub use transaction_receipt::TransactionReceiptBuilder;
