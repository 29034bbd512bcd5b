//! Parsing of loosely-structured generation output.
//!
//! Responses are untrusted text: the JSON payload may arrive bare, wrapped
//! in prose, fenced as ```json, or double-escaped. One generic helper
//! family handles every call site: strip an outer fence, conservatively
//! unescape, decode, extract the expected top-level key, and (for the
//! shape-checked variants) validate the extracted value's shape.

use serde_json::{Map, Value};

use crate::errors::ParseError;

/// How much of a raw response to keep in decode-error diagnostics.
const EXCERPT_LEN: usize = 500;

/// Extract the value under `key` from a raw generation response.
///
/// Tolerates a surrounding markdown fence (a ```json-tagged fence is
/// preferred; otherwise the first generic fence; otherwise the text is
/// used verbatim) and double-escaped `\n` / `\"` sequences.
pub fn extract_field(raw: &str, key: &str) -> Result<Value, ParseError> {
    let cleaned = unescape(strip_code_fence(raw));

    let parsed: Value = serde_json::from_str(&cleaned).map_err(|source| ParseError::Malformed {
        source,
        excerpt: excerpt(raw),
    })?;

    match parsed {
        Value::Object(mut map) => map.remove(key).ok_or_else(|| ParseError::MissingField {
            field: key.to_string(),
            available: map.keys().cloned().collect(),
        }),
        _ => Err(ParseError::MissingField {
            field: key.to_string(),
            available: Vec::new(),
        }),
    }
}

/// Extract the value under `key` and require it to be an array.
pub fn extract_array(raw: &str, key: &str) -> Result<Vec<Value>, ParseError> {
    match extract_field(raw, key)? {
        Value::Array(items) => Ok(items),
        _ => Err(ParseError::InvalidShape {
            field: key.to_string(),
            expected: "an array",
        }),
    }
}

/// Extract the value under `key` and require it to be an object.
pub fn extract_object(raw: &str, key: &str) -> Result<Map<String, Value>, ParseError> {
    match extract_field(raw, key)? {
        Value::Object(map) => Ok(map),
        _ => Err(ParseError::InvalidShape {
            field: key.to_string(),
            expected: "an object",
        }),
    }
}

/// Strip an outer markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    if let Some(start) = raw.find("```json") {
        let body = &raw[start + "```json".len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    if let Some(start) = raw.find("```") {
        let body = &raw[start + "```".len()..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }
    raw.trim()
}

/// Conservative unescape for double-escaped generations: literal `\n` and
/// `\"` sequences only.
fn unescape(text: &str) -> String {
    text.replace("\\n", "\n").replace("\\\"", "\"")
}

fn excerpt(raw: &str) -> String {
    raw.chars().take(EXCERPT_LEN).collect()
}
