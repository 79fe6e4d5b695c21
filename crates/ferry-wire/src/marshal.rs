//! Value marshalling
//!
//! Every value is wrapped in exactly one envelope, and containers wrap
//! each element recursively:
//!
//! ```text
//! [1, "a"]   →  {"type":"array","value":[{"type":"integer","value":1},
//!                                        {"type":"string","value":"a"}]}
//! ```

use crate::envelope::*;
use crate::{ConversionError, DecodeError, EncodingError, ObjectRef, ResourceRef, Thrown, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Number};

/// Encode a value into its envelope.
///
/// Fails only for a map holding the same key twice, which the foreign
/// container type cannot represent.
pub fn encode(value: &Value) -> Result<Envelope, EncodingError> {
    let (tag, payload) = encode_parts(value)?;
    Ok(Envelope::new(tag, payload))
}

/// Encode a value into the JSON form of its envelope, for embedding in
/// command payloads.
pub fn encode_json(value: &Value) -> Result<serde_json::Value, EncodingError> {
    let (tag, payload) = encode_parts(value)?;
    Ok(json!({ "type": tag, "value": payload }))
}

fn encode_parts(value: &Value) -> Result<(&'static str, serde_json::Value), EncodingError> {
    let payload = match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(n) => json!(n),
        Value::Double(x) => encode_double(*x),
        Value::String(s) => json!(s),
        Value::List(items) => serde_json::Value::Array(
            items.iter().map(encode_json).collect::<Result<_, _>>()?,
        ),
        Value::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, item) in entries {
                if map.insert(key.clone(), encode_json(item)?).is_some() {
                    return Err(EncodingError::new(
                        value.tag(),
                        format!("duplicate key {:?}", key),
                    ));
                }
            }
            serde_json::Value::Object(map)
        }
        Value::Object(obj) => json!({ "class": obj.class, "hash": obj.hash }),
        Value::Resource(res) => json!({ "type": res.kind, "hash": res.hash }),
    };
    Ok((value.tag(), payload))
}

fn encode_double(x: f64) -> serde_json::Value {
    match Number::from_f64(x) {
        Some(n) => serde_json::Value::Number(n),
        None if x.is_nan() => json!("NAN"),
        None if x > 0.0 => json!("INF"),
        None => json!("-INF"),
    }
}

/// Decode an envelope.
///
/// A `thrownException` anywhere in the tree is raised as
/// [`DecodeError::Thrown`] instead of being returned.
pub fn decode(envelope: &Envelope) -> Result<Value, DecodeError> {
    decode_parts(&envelope.tag, &envelope.value)
}

/// Decode the JSON form of an envelope.
pub fn decode_json(node: &serde_json::Value) -> Result<Value, DecodeError> {
    let tag = node
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| DecodeError::invalid("envelope", "missing \"type\""))?;
    let payload = node.get("value").unwrap_or(&serde_json::Value::Null);
    decode_parts(tag, payload)
}

fn decode_parts(tag: &str, payload: &serde_json::Value) -> Result<Value, DecodeError> {
    match tag {
        TAG_NULL => Ok(Value::Null),
        TAG_BOOLEAN => payload
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| DecodeError::invalid(tag, "expected a boolean")),
        TAG_INTEGER => payload
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| DecodeError::invalid(tag, format!("expected a 64-bit integer, got {}", payload))),
        TAG_DOUBLE => decode_double(payload),
        TAG_STRING => payload
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| DecodeError::invalid(tag, "expected a string")),
        TAG_ARRAY => match payload {
            serde_json::Value::Array(items) => {
                items.iter().map(decode_json).collect::<Result<Vec<_>, _>>().map(Value::List)
            }
            serde_json::Value::Object(map) => map
                .iter()
                .map(|(k, v)| decode_json(v).map(|v| (k.clone(), v)))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Map),
            other => Err(DecodeError::invalid(tag, format!("expected a list or map, got {}", other))),
        },
        TAG_OBJECT => {
            let class = string_field(tag, payload, "class")?;
            let hash = handle_field(tag, payload)?;
            Ok(Value::Object(ObjectRef { class, hash }))
        }
        TAG_RESOURCE => {
            let kind = string_field(tag, payload, "type")?;
            let hash = handle_field(tag, payload)?;
            Ok(Value::Resource(ResourceRef { kind, hash }))
        }
        TAG_THROWN => {
            let thrown: Thrown = serde_json::from_value(payload.clone())
                .map_err(|e| DecodeError::invalid(tag, e.to_string()))?;
            Err(DecodeError::Thrown(thrown))
        }
        TAG_PROTOCOL_ERROR => {
            let fault = serde_json::from_value(payload.clone())
                .map_err(|e| DecodeError::invalid(tag, e.to_string()))?;
            Err(DecodeError::Protocol(fault))
        }
        other => Err(DecodeError::UnknownTypeTag(other.to_string())),
    }
}

fn decode_double(payload: &serde_json::Value) -> Result<Value, DecodeError> {
    if let Some(x) = payload.as_f64() {
        return Ok(Value::Double(x));
    }
    match payload.as_str() {
        Some("NAN") => Ok(Value::Double(f64::NAN)),
        Some("INF") => Ok(Value::Double(f64::INFINITY)),
        Some("-INF") => Ok(Value::Double(f64::NEG_INFINITY)),
        _ => Err(DecodeError::invalid(TAG_DOUBLE, format!("expected a number, got {}", payload))),
    }
}

fn string_field(tag: &str, payload: &serde_json::Value, field: &str) -> Result<String, DecodeError> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| DecodeError::invalid(tag, format!("missing \"{}\"", field)))
}

// Handles are strings, but some runtimes hand out integer resource ids.
fn handle_field(tag: &str, payload: &serde_json::Value) -> Result<String, DecodeError> {
    match payload.get("hash") {
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        _ => Err(DecodeError::invalid(tag, "missing \"hash\"")),
    }
}

// ============================================================================
// Serde bridging for plain Rust data
// ============================================================================

/// Convert any serializable Rust value into a [`Value`].
///
/// Only scalars, sequences and string-keyed maps are representable; anything
/// else fails with an [`EncodingError`] naming `T`.
pub fn to_value<T: Serialize + ?Sized>(data: &T) -> Result<Value, EncodingError> {
    let type_name = std::any::type_name::<T>();
    let json = serde_json::to_value(data).map_err(|e| EncodingError::new(type_name, e.to_string()))?;
    from_plain_json(json).map_err(|reason| EncodingError::new(type_name, reason))
}

fn from_plain_json(json: serde_json::Value) -> Result<Value, String> {
    Ok(match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if n.is_u64() {
                return Err(format!("integer {} does not fit in 64 signed bits", n));
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => Value::List(
            items.into_iter().map(from_plain_json).collect::<Result<Vec<_>, _>>()?,
        ),
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(k, v)| from_plain_json(v).map(|v| (k, v)))
                .collect::<Result<Vec<_>, _>>()?,
        ),
    })
}

/// Convert a [`Value`] back into plain Rust data.
///
/// Objects and resources have no plain representation and are rejected.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, ConversionError> {
    let json = to_plain_json(value)?;
    serde_json::from_value(json).map_err(|e| ConversionError::Custom(e.to_string()))
}

fn to_plain_json(value: Value) -> Result<serde_json::Value, ConversionError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(n) => json!(n),
        Value::Double(x) => Number::from_f64(x)
            .map(serde_json::Value::Number)
            .ok_or_else(|| ConversionError::Custom(format!("{} has no plain representation", x)))?,
        Value::String(s) => serde_json::Value::String(s),
        Value::List(items) => serde_json::Value::Array(
            items.into_iter().map(to_plain_json).collect::<Result<Vec<_>, _>>()?,
        ),
        Value::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (k, v) in entries {
                map.insert(k, to_plain_json(v)?);
            }
            serde_json::Value::Object(map)
        }
        other @ (Value::Object(_) | Value::Resource(_)) => {
            return Err(ConversionError::TypeMismatch {
                expected: "plain data".to_string(),
                got: other.tag().to_string(),
            })
        }
    })
}
