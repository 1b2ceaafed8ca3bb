//! Payload decoding for device messages.
//!
//! Devices publish one of two encodings onto the queues:
//!
//! - **Legacy**: a flattened key/value rendering such as
//!   `{'id': 'A1', 'datetime': '2019:03:01:10:15:45', 'x_position': 0.3}`.
//!   Entries are separated by `", "`, keys from values by `": "`, and quote
//!   characters are stripped. A value that itself contains `", "` corrupts the
//!   split; that is a limitation of the format, not something we try to repair.
//! - **JSON**: a flat JSON object with scalar values.
//!
//! Both decode into the same [`Fields`] map (every value a string), which the
//! typed decoders in [`crate::model`] then read.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

/// Flat field name to string value mapping.
pub type Fields = BTreeMap<String, String>;

const ENTRY_SEPARATOR: &str = ", ";
const KEY_SEPARATOR: &str = ": ";

/// Structural problems with a payload.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("payload is not wrapped in braces")]
    Unbraced,

    #[error("entry `{entry}` has no key separator")]
    MissingSeparator { entry: String },

    #[error("entry `{entry}` has an empty key")]
    EmptyKey { entry: String },

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON field `{0}` is not a scalar")]
    NonScalar(String),
}

/// Decode a payload in either encoding.
///
/// A payload whose first non-blank character inside the braces is `"` is
/// treated as JSON; anything else goes through the legacy decoder.
pub fn decode_fields(payload: &str) -> Result<Fields, ParseError> {
    let trimmed = payload.trim();
    let inner = trimmed.strip_prefix('{').ok_or(ParseError::Unbraced)?;

    if inner.trim_start().starts_with('"') {
        decode_json(trimmed)
    } else {
        decode_legacy(trimmed)
    }
}

/// Decode the legacy flattened key/value encoding.
pub fn decode_legacy(payload: &str) -> Result<Fields, ParseError> {
    let body = payload
        .trim()
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or(ParseError::Unbraced)?;

    let mut fields = Fields::new();
    if body.trim().is_empty() {
        return Ok(fields);
    }

    for entry in body.split(ENTRY_SEPARATOR) {
        let (key, value) =
            entry
                .split_once(KEY_SEPARATOR)
                .ok_or_else(|| ParseError::MissingSeparator {
                    entry: entry.to_string(),
                })?;

        let key = strip_quotes(key);
        if key.is_empty() {
            return Err(ParseError::EmptyKey {
                entry: entry.to_string(),
            });
        }
        fields.insert(key, strip_quotes(value));
    }

    Ok(fields)
}

/// Render fields in the legacy encoding, keys in order.
pub fn encode_fields(fields: &Fields) -> String {
    let entries: Vec<String> = fields
        .iter()
        .map(|(key, value)| format!("'{key}'{KEY_SEPARATOR}'{value}'"))
        .collect();
    format!("{{{}}}", entries.join(ENTRY_SEPARATOR))
}

fn decode_json(payload: &str) -> Result<Fields, ParseError> {
    let object: serde_json::Map<String, Value> = serde_json::from_str(payload)?;

    object
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Null | Value::Array(_) | Value::Object(_) => {
                    return Err(ParseError::NonScalar(key));
                }
            };
            Ok((key, text))
        })
        .collect()
}

fn strip_quotes(s: &str) -> String {
    s.trim().replace(['\'', '"'], "")
}
