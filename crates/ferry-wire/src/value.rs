//! Runtime values

use crate::ConversionError;

/// Reference to one live object inside the foreign runtime.
///
/// The `hash` is assigned by the foreign side and stays unique for the
/// lifetime of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub class: String,
    pub hash: String,
}

/// Reference to a foreign resource (stream, connection, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: String,
    pub hash: String,
}

/// A value that can cross the bridge.
///
/// Sequences and string-keyed maps share the `array` tag on the wire but
/// stay distinct here, so a decoded value always compares equal to the
/// value that was encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),

    // By reference: only the handle travels
    Object(ObjectRef),
    Resource(ResourceRef),
}

impl Value {
    /// The wire tag this value is encoded under.
    pub fn tag(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::List(_) | Value::Map(_) => "array",
            Value::Object(_) => "object",
            Value::Resource(_) => "resource",
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

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
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

    /// Entries of a map value. An empty list counts as an empty map, since
    /// foreign runtimes with a unified container type cannot tell them apart.
    pub fn into_entries(self) -> Result<Vec<(String, Value)>, ConversionError> {
        match self {
            Value::Map(entries) => Ok(entries),
            Value::List(items) if items.is_empty() => Ok(Vec::new()),
            Value::List(items) => Ok(items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect()),
            other => Err(ConversionError::TypeMismatch {
                expected: "array".to_string(),
                got: other.tag().to_string(),
            }),
        }
    }

    /// Items of an ordered sequence. Maps yield their values in order.
    pub fn into_items(self) -> Result<Vec<Value>, ConversionError> {
        match self {
            Value::List(items) => Ok(items),
            Value::Map(entries) => Ok(entries.into_iter().map(|(_, v)| v).collect()),
            other => Err(ConversionError::TypeMismatch {
                expected: "array".to_string(),
                got: other.tag().to_string(),
            }),
        }
    }
}

// ============================================================================
// From implementations for primitives
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

impl From<u32> for Value {
    fn from(v: u32) -> Self { Value::Int(v.into()) }
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

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self { Value::Object(v) }
}

impl From<ResourceRef> for Value {
    fn from(v: ResourceRef) -> Self { Value::Resource(v) }
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
// TryFrom implementations for primitives
// ============================================================================

fn mismatch(expected: &str, got: &Value) -> ConversionError {
    ConversionError::TypeMismatch {
        expected: expected.to_string(),
        got: got.tag().to_string(),
    }
}

impl TryFrom<Value> for bool {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("boolean", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Int(n) => Ok(n),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Double(x) => Ok(x),
            Value::Int(n) => Ok(n as f64),
            other => Err(mismatch("double", &other)),
        }
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

impl TryFrom<Value> for ObjectRef {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        match v {
            Value::Object(obj) => Ok(obj),
            other => Err(mismatch("object", &other)),
        }
    }
}

impl<T: TryFrom<Value, Error = ConversionError>> TryFrom<Value> for Vec<T> {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        v.into_items()?
            .into_iter()
            .enumerate()
            .map(|(i, item)| T::try_from(item).map_err(|e| ConversionError::IndexError(i, Box::new(e))))
            .collect()
    }
}

// ============================================================================
// FromValue trait - avoids coherence issues with TryFrom for Option<T>
// ============================================================================

/// Trait for converting from a Value.
///
/// Exists so `Option<T>` can treat `null` as `None` without colliding with
/// the blanket `TryFrom` implementations.
pub trait FromValue: Sized {
    fn from_value(v: Value) -> Result<Self, ConversionError>;
}

impl<T: TryFrom<Value, Error = ConversionError>> FromValue for T {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        T::try_from(v)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(v: Value) -> Result<Self, ConversionError> {
        match v {
            // Absent parents and docs arrive as `false`
            Value::Null | Value::Bool(false) => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_reads_as_empty_map() {
        let entries = Value::List(vec![]).into_entries().expect("entries");
        assert!(entries.is_empty());
    }

    #[test]
    fn option_treats_false_as_absent() {
        let parent: Option<String> = FromValue::from_value(Value::Bool(false)).expect("convert");
        assert_eq!(parent, None);
        let parent: Option<String> = FromValue::from_value(Value::from("Base")).expect("convert");
        assert_eq!(parent.as_deref(), Some("Base"));
    }

    #[test]
    fn vec_conversion_reports_index() {
        let err = Vec::<i64>::try_from(Value::List(vec![Value::Int(1), Value::from("x")]))
            .expect_err("second item is a string");
        assert!(matches!(err, ConversionError::IndexError(1, _)));
    }
}
