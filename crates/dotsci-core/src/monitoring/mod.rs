//! Monitoring of finalized writes until they become readable.
//!
//! A finalized ledger transaction is not yet visible to every reader. This
//! module polls read state until the write shows up or the attempt budget runs
//! out.

pub mod reconciliation;

pub use reconciliation::{Backoff, PollOutcome, PollSettings, ReconciliationPoller};
