//! Loader query string parsing.
//!
//! Two forms are accepted, as produced by bundler configurations:
//!
//! - `?{"helperDirs":["./helpers"],"debug":true}`: a JSON object
//! - `?helperDirs[]=./helpers&knownHelpers[]=t&debug&-inlineRequires`: key/value
//!   pairs separated by `&` or `,`. `key[]=v` appends to a list, a bare `key`
//!   (or `+key`) means `true`, `-key` means `false`, and the values `true` /
//!   `false` become booleans. Keys and values are percent-decoded.

use crate::core::LoaderError;
use serde_json::{Map, Value};

/// Parse a loader query into a JSON object.
///
/// An empty query (or a lone `?`) yields an empty object.
pub fn parse_query(query: &str) -> Result<Map<String, Value>, LoaderError> {
    let query = query.trim();
    let body = query.strip_prefix('?').unwrap_or(query);

    if body.is_empty() {
        return Ok(Map::new());
    }

    if body.starts_with('{') {
        return match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(invalid("query must be a JSON object")),
            Err(e) => Err(invalid(&format!("malformed JSON: {e}"))),
        };
    }

    let mut result = Map::new();
    for pair in body.split(['&', ',']).filter(|p| !p.is_empty()) {
        let (raw_key, raw_value) = match pair.split_once('=') {
            Some((key, value)) => (key, Some(value)),
            None => (pair, None),
        };
        let key = percent_decode(raw_key)?;

        let Some(raw_value) = raw_value else {
            if let Some(name) = key.strip_prefix('-') {
                result.insert(name.to_string(), Value::Bool(false));
            } else {
                let name = key.strip_prefix('+').unwrap_or(&key);
                result.insert(name.to_string(), Value::Bool(true));
            }
            continue;
        };

        let value = match percent_decode(raw_value)?.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            other => Value::String(other.to_string()),
        };

        if let Some(name) = key.strip_suffix("[]") {
            let slot = result.entry(name.to_string()).or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(value),
                existing => {
                    let previous = existing.take();
                    *existing = Value::Array(vec![previous, value]);
                }
            }
        } else {
            result.insert(key, value);
        }
    }

    Ok(result)
}

fn invalid(reason: &str) -> LoaderError {
    LoaderError::InvalidOption {
        option: "query".to_string(),
        reason: reason.to_string(),
    }
}

/// Decode `%XX` escapes and `+` as space.
fn percent_decode(input: &str) -> Result<String, LoaderError> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| invalid(&format!("bad percent escape in '{input}'")))?;
                out.push(hex);
                i += 3;
            }
            b'+' if i > 0 => {
                out.push(b' ');
                i += 1;
            }
            byte => {
                out.push(byte);
                i += 1;
            }
        }
    }

    String::from_utf8(out).map_err(|_| invalid(&format!("'{input}' is not valid UTF-8")))
}
