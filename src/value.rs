//! Host values
//!
//! The host mirror of [`ferry_wire::Value`]: plain data is carried by
//! value, while foreign objects, resources, functions and classes are
//! represented by their proxies.

use crate::class::Class;
use crate::function::Function;
use crate::object::{Object, Resource};
use ferry_wire::{ConversionError, EncodingError, ObjectRef, ResourceRef, Value as WireValue};
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),

    // Proxies
    Object(Object),
    Resource(Resource),
    Function(Function),
    Class(Class),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Resource(_) => "resource",
            Value::Function(_) => "function",
            Value::Class(_) => "class",
        }
    }

    /// Build a map from `(key, value)` pairs, preserving order.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Convert any serializable Rust data.
    pub fn serialize<T: Serialize + ?Sized>(data: &T) -> Result<Self, EncodingError> {
        ferry_wire::to_value(data).map(Value::from_plain)
    }

    /// Convert back into plain Rust data. Proxies have no plain form.
    pub fn deserialize<T: DeserializeOwned>(self) -> Result<T, ConversionError> {
        ferry_wire::from_value(self.into_plain()?)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<Object> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Look up a key in a map value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Encode for the bridge identified by `bridge_id`.
    ///
    /// Proxies travel as their handle, or by name for functions and
    /// classes. A proxy from another bridge names a handle the peer has
    /// never seen and is rejected.
    pub fn to_wire(&self, bridge_id: u64) -> Result<WireValue, EncodingError> {
        Ok(match self {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(*b),
            Value::Int(n) => WireValue::Int(*n),
            Value::Double(x) => WireValue::Double(*x),
            Value::String(s) => WireValue::String(s.clone()),
            Value::List(items) => WireValue::List(
                items
                    .iter()
                    .map(|item| item.to_wire(bridge_id))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(entries) => WireValue::Map(
                entries
                    .iter()
                    .map(|(k, v)| v.to_wire(bridge_id).map(|v| (k.clone(), v)))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(obj) => {
                if obj.bridge_id() != bridge_id {
                    return Err(foreign_proxy("Object", obj.class_name()));
                }
                WireValue::Object(ObjectRef {
                    class: obj.class_name().to_string(),
                    hash: obj.handle().to_string(),
                })
            }
            Value::Resource(res) => {
                if res.bridge_id() != bridge_id {
                    return Err(foreign_proxy("Resource", res.kind()));
                }
                WireValue::Resource(ResourceRef {
                    kind: res.kind().to_string(),
                    hash: res.handle().to_string(),
                })
            }
            Value::Function(f) => WireValue::String(f.name().to_string()),
            Value::Class(c) => WireValue::String(c.name().to_string()),
        })
    }

    /// Plain wire data, with no proxies inside.
    pub(crate) fn from_plain(wire: WireValue) -> Self {
        match wire {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(n) => Value::Int(n),
            WireValue::Double(x) => Value::Double(x),
            WireValue::String(s) => Value::String(s),
            WireValue::List(items) => Value::List(items.into_iter().map(Value::from_plain).collect()),
            WireValue::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_plain(v)))
                    .collect(),
            ),
            // Only reachable through serde data, which never holds handles
            WireValue::Object(obj) => Value::String(obj.hash),
            WireValue::Resource(res) => Value::String(res.hash),
        }
    }

    fn into_plain(self) -> Result<WireValue, ConversionError> {
        Ok(match self {
            Value::Null => WireValue::Null,
            Value::Bool(b) => WireValue::Bool(b),
            Value::Int(n) => WireValue::Int(n),
            Value::Double(x) => WireValue::Double(x),
            Value::String(s) => WireValue::String(s),
            Value::List(items) => WireValue::List(
                items
                    .into_iter()
                    .map(Value::into_plain)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Map(entries) => WireValue::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| v.into_plain().map(|v| (k, v)))
                    .collect::<Result<_, _>>()?,
            ),
            other => {
                return Err(ConversionError::TypeMismatch {
                    expected: "plain data".to_string(),
                    got: other.type_name().to_string(),
                })
            }
        })
    }
}

fn foreign_proxy(type_name: &str, class: &str) -> EncodingError {
    EncodingError::new(
        type_name,
        format!("{} proxy belongs to a different bridge", class),
    )
}

// ============================================================================
// From implementations
// ============================================================================

impl From<()> for Value {
    fn from(_: ()) -> Self { Value::Null }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::Int(v.into()) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::Int(v) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::Double(v) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::String(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::String(v.to_string()) }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self { Value::Object(v) }
}

impl From<Resource> for Value {
    fn from(v: Resource) -> Self { Value::Resource(v) }
}

impl From<Function> for Value {
    fn from(v: Function) -> Self { Value::Function(v) }
}

impl From<Class> for Value {
    fn from(v: Class) -> Self { Value::Class(v) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// TryFrom implementations
// ============================================================================

fn mismatch(expected: &str, got: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: expected.to_string(),
        got: got.type_name().to_string(),
    }
}

impl TryFrom<Value> for bool {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_bool().ok_or_else(|| mismatch("bool", &v))
    }
}

impl TryFrom<Value> for i64 {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_int().ok_or_else(|| mismatch("int", &v))
    }
}

impl TryFrom<Value> for f64 {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.as_double().ok_or_else(|| mismatch("double", &v))
    }
}

impl TryFrom<Value> for String {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::String(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<Value> for Object {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Object(obj) => Ok(obj),
            other => Err(mismatch("object", &other)),
        }
    }
}

impl TryFrom<Value> for Vec<Value> {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::List(items) => Ok(items),
            Value::Map(entries) => Ok(entries.into_iter().map(|(_, v)| v).collect()),
            other => Err(mismatch("list", &other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Point {
        x: i64,
        y: f64,
        tags: Vec<String>,
    }

    #[test]
    fn plain_data_survives_serde() {
        let point = Point { x: 1, y: 2.5, tags: vec!["a".into()] };
        let value = Value::serialize(&point).expect("serialize");
        assert_eq!(value.get("x"), Some(&Value::Int(1)));
        assert_eq!(value.deserialize::<Point>().expect("deserialize"), point);
    }

    #[test]
    fn plain_values_encode_for_any_bridge() {
        let value = Value::map([("n", Value::Int(1)), ("xs", Value::from(vec![1.5, 2.0]))]);
        let wire = value.to_wire(7).expect("encode");
        assert_eq!(
            wire,
            WireValue::map([
                ("n", WireValue::Int(1)),
                ("xs", WireValue::List(vec![WireValue::Double(1.5), WireValue::Double(2.0)])),
            ])
        );
    }
}
