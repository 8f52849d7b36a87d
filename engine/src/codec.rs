//! Value codec applied to everything written under a collection key.
//!
//! Two optional passes: compaction strips null and empty fields before
//! storage, and encoding wraps the JSON text in base64. Encoding is an
//! obfuscation of the stored blob, not encryption, and must not be relied on
//! to protect sensitive data.

use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

/// Encoder/decoder for stored values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Codec {
    pub compaction: bool,
    pub encoding: bool,
}

impl Codec {
    pub fn new(compaction: bool, encoding: bool) -> Self {
        Self {
            compaction,
            encoding,
        }
    }

    /// Serialize a value for storage.
    pub fn encode(&self, value: &Value) -> Result<String> {
        let json = if self.compaction {
            serde_json::to_string(&compact(value.clone()))?
        } else {
            serde_json::to_string(value)?
        };

        if self.encoding {
            Ok(STANDARD.encode(json))
        } else {
            Ok(json)
        }
    }

    /// Parse a stored value.
    ///
    /// Both representations are accepted regardless of the current setting,
    /// so toggling encoding does not orphan data written before the switch.
    /// The configured representation is tried first and its error is the one
    /// reported when neither works.
    pub fn decode(&self, raw: &str) -> Result<Value> {
        if self.encoding {
            decode_base64(raw).or_else(|err| serde_json::from_str(raw).map_err(|_| err))
        } else {
            serde_json::from_str(raw)
                .map_err(Error::from)
                .or_else(|err| decode_base64(raw).map_err(|_| err))
        }
    }
}

fn decode_base64(raw: &str) -> Result<Value> {
    let bytes = STANDARD.decode(raw.trim())?;
    let text = String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
    Ok(serde_json::from_str(&text)?)
}

/// Recursively drop object fields that are null, empty strings, or
/// containers left empty after compaction.
///
/// Array elements are compacted but never removed, so positions are stable.
pub fn compact(value: Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(key, value)| (key, compact(value)))
                .filter(|(_, value)| !is_empty(value))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(compact).collect()),
        other => other,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}
