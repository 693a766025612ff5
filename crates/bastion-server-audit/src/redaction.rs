// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Secret redaction for audit metadata.
//!
//! Callers should never put credential material in metadata, but a stray
//! `password` or `token` field must not make it to a durable sink. Values
//! under sensitive-looking keys are replaced with `[REDACTED]`.

use serde_json::Value;

const MAX_DEPTH: usize = 64;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
	"password", "passwd", "secret", "token", "csrf", "hash", "cookie", "authorization",
];

fn is_sensitive_key(key: &str) -> bool {
	let key = key.to_ascii_lowercase();
	SENSITIVE_KEY_FRAGMENTS
		.iter()
		.any(|fragment| key.contains(fragment))
}

/// Redacts values under sensitive keys in-place, recursing into arrays and
/// objects. Depth is limited so hostile nesting cannot overflow the stack.
pub fn redact_json_value(value: &mut Value) {
	redact_json_value_with_depth(value, 0);
}

fn redact_json_value_with_depth(value: &mut Value, depth: usize) {
	if depth > MAX_DEPTH {
		*value = Value::String(REDACTED.to_string());
		return;
	}

	match value {
		Value::Array(items) => {
			for item in items {
				redact_json_value_with_depth(item, depth + 1);
			}
		}
		Value::Object(obj) => {
			for (key, v) in obj.iter_mut() {
				if is_sensitive_key(key) {
					*v = Value::String(REDACTED.to_string());
				} else {
					redact_json_value_with_depth(v, depth + 1);
				}
			}
		}
		_ => {}
	}
}
