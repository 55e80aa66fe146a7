//! Collision-resistant object names.

use dotsci_types::{current_timestamp_millis, sanitize_file_name};
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces `<timestamp-ms>-<sanitized file name>` object names.
///
/// The timestamp never repeats within one namer: when two names are requested
/// in the same millisecond, the later one is stamped one millisecond ahead.
#[derive(Debug, Default)]
pub struct ObjectNamer {
	last: AtomicU64,
}

impl ObjectNamer {
	pub fn new() -> Self {
		Self::default()
	}

	fn next_stamp(&self, now: u64) -> u64 {
		let mut previous = self.last.load(Ordering::Relaxed);
		loop {
			let candidate = now.max(previous + 1);
			match self.last.compare_exchange_weak(
				previous,
				candidate,
				Ordering::AcqRel,
				Ordering::Relaxed,
			) {
				Ok(_) => return candidate,
				Err(actual) => previous = actual,
			}
		}
	}

	pub fn next_name(&self, file_name: &str) -> String {
		self.name_at(current_timestamp_millis(), file_name)
	}

	fn name_at(&self, now: u64, file_name: &str) -> String {
		format!("{}-{}", self.next_stamp(now), sanitize_file_name(file_name))
	}
}
