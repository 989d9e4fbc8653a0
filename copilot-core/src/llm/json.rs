//! Pull a JSON object out of a model reply.
//!
//! Models wrap JSON in code fences or add a sentence before it; we take the
//! first balanced `{...}` that parses.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::LlmError;

/// Extract the first JSON object embedded in `text`.
pub fn extract_json(text: &str) -> Result<Value, LlmError> {
    let trimmed = text.trim();
    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    let bytes = trimmed.as_bytes();
    let mut start = 0;
    while let Some(offset) = trimmed[start..].find('{') {
        let open = start + offset;
        if let Some(close) = matching_brace(bytes, open) {
            if let Ok(value @ Value::Object(_)) =
                serde_json::from_str::<Value>(&trimmed[open..=close])
            {
                return Ok(value);
            }
        }
        start = open + 1;
    }

    Err(LlmError::ParseFailed(format!(
        "no JSON object in reply ({} chars)",
        text.len()
    )))
}

/// Extract and deserialize in one step.
pub fn extract_as<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(|e| LlmError::InvalidFormat(e.to_string()))
}

fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
