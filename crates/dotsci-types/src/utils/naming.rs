//! Naming helpers for stored objects.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix time in milliseconds.
pub fn current_timestamp_millis() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_millis() as u64)
		.unwrap_or(0)
}

/// Makes a user-supplied file name safe to embed in an object name.
///
/// Whitespace becomes `_` and path separators become `-`, so the result never
/// introduces an extra path segment into a locator. An empty result falls back
/// to `"file"`.
pub fn sanitize_file_name(file_name: &str) -> String {
	let sanitized: String = file_name
		.trim()
		.chars()
		.map(|c| match c {
			c if c.is_whitespace() => '_',
			'/' | '\\' => '-',
			c => c,
		})
		.collect();

	if sanitized.is_empty() {
		"file".to_string()
	} else {
		sanitized
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_sanitize_replaces_whitespace() {
		assert_eq!(sanitize_file_name("my paper v2.pdf"), "my_paper_v2.pdf");
		assert_eq!(sanitize_file_name("tab\there.pdf"), "tab_here.pdf");
	}

	#[test]
	fn test_sanitize_strips_separators() {
		assert_eq!(sanitize_file_name("../etc/passwd"), "..-etc-passwd");
		assert_eq!(sanitize_file_name("a\\b.pdf"), "a-b.pdf");
	}

	#[test]
	fn test_sanitize_empty() {
		assert_eq!(sanitize_file_name("   "), "file");
		assert_eq!(sanitize_file_name(""), "file");
	}

	#[test]
	fn test_timestamp_is_recent() {
		// 2020-01-01T00:00:00Z
		assert!(current_timestamp_millis() > 1_577_836_800_000);
	}
}
