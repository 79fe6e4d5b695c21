//! Introspection records
//!
//! The foreign side answers `funcInfo` and `classInfo` with these records,
//! encoded as ordinary `array` values. Key names follow the reflection
//! vocabulary of the foreign runtime (`hasDefault`, `isInterface`, ...).

use crate::{ConversionError, FromValue, Value};

/// A parameter or return type hint.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub name: String,
    pub nullable: bool,
    /// The hint names a class rather than a builtin type
    pub is_class: bool,
}

impl TypeInfo {
    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nullable: false,
            is_class: false,
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self {
            is_class: true,
            ..Self::builtin(name)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub name: String,
    pub has_default: bool,
    /// Only meaningful when `has_default` is set
    pub default: Value,
    pub variadic: bool,
    pub by_reference: bool,
    pub type_hint: Option<TypeInfo>,
}

impl ParamInfo {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            has_default: false,
            default: Value::Null,
            variadic: false,
            by_reference: false,
            type_hint: None,
        }
    }

    pub fn optional(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            has_default: true,
            default: default.into(),
            ..Self::required(name)
        }
    }

    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            variadic: true,
            ..Self::required(name)
        }
    }

    pub fn typed(mut self, hint: TypeInfo) -> Self {
        self.type_hint = Some(hint);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionInfo {
    /// Canonical name as the foreign runtime spells it
    pub name: String,
    pub params: Vec<ParamInfo>,
    pub return_type: Option<TypeInfo>,
    pub doc: Option<String>,
}

impl FunctionInfo {
    pub fn new(name: impl Into<String>, params: Vec<ParamInfo>) -> Self {
        Self {
            name: name.into(),
            params,
            return_type: None,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn returns(mut self, hint: TypeInfo) -> Self {
        self.return_type = Some(hint);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    /// Class that declares the method; differs from the described class
    /// for inherited methods
    pub owner: String,
    pub is_static: bool,
    pub is_abstract: bool,
    pub params: Vec<ParamInfo>,
    pub return_type: Option<TypeInfo>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyInfo {
    pub name: String,
    pub doc: Option<String>,
    pub is_static: bool,
    pub has_default: bool,
    pub default: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub doc: Option<String>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub is_abstract: bool,
    pub is_interface: bool,
    pub consts: Vec<(String, Value)>,
    pub methods: Vec<MethodInfo>,
    pub properties: Vec<PropertyInfo>,
}

impl ClassInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            parent: None,
            interfaces: Vec::new(),
            is_abstract: false,
            is_interface: false,
            consts: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Field access over decoded maps
// ============================================================================

struct Fields {
    entries: Vec<(String, Value)>,
}

impl Fields {
    fn new(value: Value) -> Result<Self, ConversionError> {
        Ok(Self {
            entries: value.into_entries()?,
        })
    }

    fn take(&mut self, key: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.swap_remove(index).1)
    }

    fn required<T: FromValue>(&mut self, key: &str) -> Result<T, ConversionError> {
        let value = self
            .take(key)
            .ok_or_else(|| ConversionError::MissingField(key.to_string()))?;
        T::from_value(value).map_err(|e| ConversionError::FieldError(key.to_string(), Box::new(e)))
    }

    fn optional<T: FromValue>(&mut self, key: &str) -> Result<Option<T>, ConversionError> {
        match self.take(key) {
            // Absent docs and parents arrive as `false`
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
            Some(value) => T::from_value(value)
                .map(Some)
                .map_err(|e| ConversionError::FieldError(key.to_string(), Box::new(e))),
        }
    }

    fn flag(&mut self, key: &str) -> Result<bool, ConversionError> {
        Ok(self.optional::<bool>(key)?.unwrap_or(false))
    }

    fn any(&mut self, key: &str) -> Value {
        self.take(key).unwrap_or(Value::Null)
    }

    /// A keyed collection whose entries are themselves records.
    fn records<T>(
        &mut self,
        key: &str,
        convert: fn(String, Value) -> Result<T, ConversionError>,
    ) -> Result<Vec<T>, ConversionError> {
        let Some(value) = self.take(key) else {
            return Ok(Vec::new());
        };
        value
            .into_entries()
            .and_then(|entries| entries.into_iter().map(|(k, v)| convert(k, v)).collect())
            .map_err(|e| ConversionError::FieldError(key.to_string(), Box::new(e)))
    }
}

fn doc_value(doc: &Option<String>) -> Value {
    match doc {
        Some(text) => Value::from(text.as_str()),
        None => Value::Bool(false),
    }
}

// ============================================================================
// TypeInfo
// ============================================================================

impl From<&TypeInfo> for Value {
    fn from(t: &TypeInfo) -> Self {
        Value::map([
            ("name", Value::from(t.name.as_str())),
            ("nullable", Value::Bool(t.nullable)),
            ("isClass", Value::Bool(t.is_class)),
        ])
    }
}

impl TryFrom<Value> for TypeInfo {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        let mut f = Fields::new(v)?;
        Ok(TypeInfo {
            name: f.required("name")?,
            nullable: f.flag("nullable")?,
            is_class: f.flag("isClass")?,
        })
    }
}

fn type_value(t: &Option<TypeInfo>) -> Value {
    t.as_ref().map(Value::from).unwrap_or(Value::Null)
}

// ============================================================================
// ParamInfo
// ============================================================================

impl From<&ParamInfo> for Value {
    fn from(p: &ParamInfo) -> Self {
        Value::map([
            ("name", Value::from(p.name.as_str())),
            ("hasDefault", Value::Bool(p.has_default)),
            ("default", p.default.clone()),
            ("variadic", Value::Bool(p.variadic)),
            ("byReference", Value::Bool(p.by_reference)),
            ("type", type_value(&p.type_hint)),
        ])
    }
}

impl TryFrom<Value> for ParamInfo {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        let mut f = Fields::new(v)?;
        let has_default = f.flag("hasDefault")?;
        Ok(ParamInfo {
            name: f.required("name")?,
            default: if has_default { f.any("default") } else { Value::Null },
            has_default,
            variadic: f.flag("variadic")?,
            by_reference: f.flag("byReference")?,
            type_hint: f.optional("type")?,
        })
    }
}

fn params_value(params: &[ParamInfo]) -> Value {
    Value::List(params.iter().map(Value::from).collect())
}

// ============================================================================
// FunctionInfo
// ============================================================================

impl From<&FunctionInfo> for Value {
    fn from(info: &FunctionInfo) -> Self {
        Value::map([
            ("name", Value::from(info.name.as_str())),
            ("params", params_value(&info.params)),
            ("returnType", type_value(&info.return_type)),
            ("doc", doc_value(&info.doc)),
        ])
    }
}

impl TryFrom<Value> for FunctionInfo {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        let mut f = Fields::new(v)?;
        Ok(FunctionInfo {
            name: f.required("name")?,
            params: f.optional("params")?.unwrap_or_default(),
            return_type: f.optional("returnType")?,
            doc: f.optional("doc")?,
        })
    }
}

// ============================================================================
// ClassInfo and members
// ============================================================================

impl From<&MethodInfo> for Value {
    fn from(m: &MethodInfo) -> Self {
        Value::map([
            ("name", Value::from(m.name.as_str())),
            ("owner", Value::from(m.owner.as_str())),
            ("static", Value::Bool(m.is_static)),
            ("abstract", Value::Bool(m.is_abstract)),
            ("params", params_value(&m.params)),
            ("returnType", type_value(&m.return_type)),
            ("doc", doc_value(&m.doc)),
        ])
    }
}

fn method_from_entry(key: String, v: Value) -> Result<MethodInfo, ConversionError> {
    let mut f = Fields::new(v)?;
    Ok(MethodInfo {
        name: f.optional("name")?.unwrap_or(key),
        owner: f.required("owner")?,
        is_static: f.flag("static")?,
        is_abstract: f.flag("abstract")?,
        params: f.optional("params")?.unwrap_or_default(),
        return_type: f.optional("returnType")?,
        doc: f.optional("doc")?,
    })
}

impl From<&PropertyInfo> for Value {
    fn from(p: &PropertyInfo) -> Self {
        Value::map([
            ("doc", doc_value(&p.doc)),
            ("static", Value::Bool(p.is_static)),
            ("hasDefault", Value::Bool(p.has_default)),
            ("default", p.default.clone()),
        ])
    }
}

fn property_from_entry(key: String, v: Value) -> Result<PropertyInfo, ConversionError> {
    let mut f = Fields::new(v)?;
    let has_default = f.flag("hasDefault")?;
    Ok(PropertyInfo {
        name: key,
        doc: f.optional("doc")?,
        is_static: f.flag("static")?,
        default: if has_default { f.any("default") } else { Value::Null },
        has_default,
    })
}

impl From<&ClassInfo> for Value {
    fn from(info: &ClassInfo) -> Self {
        Value::map([
            ("name", Value::from(info.name.as_str())),
            ("doc", doc_value(&info.doc)),
            (
                "parent",
                info.parent.as_deref().map(Value::from).unwrap_or(Value::Bool(false)),
            ),
            (
                "interfaces",
                Value::List(info.interfaces.iter().map(|i| Value::from(i.as_str())).collect()),
            ),
            ("isAbstract", Value::Bool(info.is_abstract)),
            ("isInterface", Value::Bool(info.is_interface)),
            ("consts", Value::Map(info.consts.clone())),
            (
                "methods",
                Value::Map(info.methods.iter().map(|m| (m.name.clone(), Value::from(m))).collect()),
            ),
            (
                "properties",
                Value::Map(info.properties.iter().map(|p| (p.name.clone(), Value::from(p))).collect()),
            ),
        ])
    }
}

impl TryFrom<Value> for ClassInfo {
    type Error = ConversionError;
    fn try_from(v: Value) -> Result<Self, Self::Error> {
        let mut f = Fields::new(v)?;
        Ok(ClassInfo {
            name: f.required("name")?,
            doc: f.optional("doc")?,
            parent: f.optional("parent")?,
            interfaces: f.optional("interfaces")?.unwrap_or_default(),
            is_abstract: f.flag("isAbstract")?,
            is_interface: f.flag("isInterface")?,
            consts: f.records("consts", |k, v| Ok((k, v)))?,
            methods: f.records("methods", method_from_entry)?,
            properties: f.records("properties", property_from_entry)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_class() -> ClassInfo {
        let mut info = ClassInfo::new("App\\Counter");
        info.parent = Some("App\\Base".into());
        info.interfaces = vec!["Countable".into()];
        info.consts = vec![("LIMIT".into(), Value::Int(10))];
        info.methods.push(MethodInfo {
            name: "add".into(),
            owner: "App\\Counter".into(),
            is_static: false,
            is_abstract: false,
            params: vec![ParamInfo::required("n"), ParamInfo::optional("times", 1)],
            return_type: Some(TypeInfo { name: "int".into(), nullable: false, is_class: false }),
            doc: Some("/** Add n. */".into()),
        });
        info.properties.push(PropertyInfo {
            name: "total".into(),
            doc: None,
            is_static: false,
            has_default: true,
            default: Value::Int(0),
        });
        info
    }

    #[test]
    fn class_info_survives_value_conversion() {
        let info = sample_class();
        let back = ClassInfo::try_from(Value::from(&info)).expect("convert");
        assert_eq!(back, info);
    }

    #[test]
    fn empty_collections_may_arrive_as_lists() {
        let value = Value::map([
            ("name", Value::from("Bare")),
            ("parent", Value::Bool(false)),
            ("doc", Value::Bool(false)),
            ("consts", Value::List(vec![])),
            ("methods", Value::List(vec![])),
            ("properties", Value::List(vec![])),
        ]);
        let info = ClassInfo::try_from(value).expect("convert");
        assert_eq!(info.parent, None);
        assert_eq!(info.doc, None);
        assert!(info.methods.is_empty());
    }

    #[test]
    fn missing_owner_names_the_field() {
        let value = Value::map([
            ("name", Value::from("Broken")),
            ("methods", Value::map([("run", Value::map([("static", false)]))])),
        ]);
        let err = ClassInfo::try_from(value).expect_err("owner is required");
        assert!(err.to_string().contains("owner"), "{}", err);
    }
}
