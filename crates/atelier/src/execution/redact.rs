//! Masking of secret-bearing values before they reach audit records.

use serde_json::Value;

pub(crate) const REDACTED: &str = "***REDACTED***";

const SENSITIVE_MARKERS: [&str; 4] = ["key", "secret", "token", "password"];

/// Whether a field name looks like it carries credentials.
pub(crate) fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Deep-copy a value with every entry under a sensitive-looking key masked.
pub(crate) fn redact_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, entry)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_value(entry))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_value).collect()),
        other => other.clone(),
    }
}
