use super::{MemoryRuntime, MethodFn};
use ferry_wire::{ClassInfo, MethodInfo, ObjectRef, ParamInfo, PropertyInfo, Thrown, Value};
use std::sync::Arc;

pub(super) struct MethodDef {
    pub(super) info: MethodInfo,
    /// `None` for abstract and interface methods
    pub(super) body: Option<MethodFn>,
}

pub(super) struct ClassDef {
    pub(super) name: String,
    pub(super) doc: Option<String>,
    pub(super) parent: Option<String>,
    pub(super) interfaces: Vec<String>,
    pub(super) is_abstract: bool,
    pub(super) is_interface: bool,
    pub(super) consts: Vec<(String, Value)>,
    pub(super) methods: Vec<MethodDef>,
    pub(super) properties: Vec<PropertyInfo>,
}

impl ClassDef {
    /// Introspection record for the class itself, without members.
    pub(super) fn header(&self) -> ClassInfo {
        ClassInfo {
            name: self.name.clone(),
            doc: self.doc.clone(),
            parent: self.parent.clone(),
            interfaces: self.interfaces.clone(),
            is_abstract: self.is_abstract || self.is_interface,
            is_interface: self.is_interface,
            consts: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }
}

/// Declares a class or interface for [`MemoryRuntime::define_class`].
///
/// ```ignore
/// rt.define_class(
///     ClassBuilder::new("Greeter")
///         .property("name", "world")
///         .method("greet", vec![], |rt, this, _| {
///             let name = rt.get_property(this.unwrap(), "name")?;
///             Ok(Value::from(format!("hello {}", name.as_str().unwrap_or(""))))
///         }),
/// );
/// ```
pub struct ClassBuilder {
    def: ClassDef,
}

impl ClassBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            def: ClassDef {
                name: name.trim_start_matches('\\').to_string(),
                doc: None,
                parent: None,
                interfaces: Vec::new(),
                is_abstract: false,
                is_interface: false,
                consts: Vec::new(),
                methods: Vec::new(),
                properties: Vec::new(),
            },
        }
    }

    pub fn interface(name: impl Into<String>) -> Self {
        let mut builder = Self::new(name);
        builder.def.is_interface = true;
        builder
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        let parent: String = parent.into();
        self.def.parent = Some(parent.trim_start_matches('\\').to_string());
        self
    }

    /// Implement an interface, or extend one when building an interface.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        let interface: String = interface.into();
        self.def.interfaces.push(interface.trim_start_matches('\\').to_string());
        self
    }

    pub fn abstract_class(mut self) -> Self {
        self.def.is_abstract = true;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.def.doc = Some(doc.into());
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.def.consts.push((name.into(), value.into()));
        self
    }

    /// Declare an instance property with a default value.
    pub fn property(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.def.properties.push(PropertyInfo {
            name: name.into(),
            doc: None,
            is_static: false,
            has_default: true,
            default: default.into(),
        });
        self
    }

    pub fn method<F>(self, name: impl Into<String>, params: Vec<ParamInfo>, body: F) -> Self
    where
        F: Fn(&mut MemoryRuntime, Option<&ObjectRef>, Vec<Value>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.push_method(name.into(), params, false, Some(Arc::new(body)))
    }

    pub fn static_method<F>(self, name: impl Into<String>, params: Vec<ParamInfo>, body: F) -> Self
    where
        F: Fn(&mut MemoryRuntime, Option<&ObjectRef>, Vec<Value>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.push_method(name.into(), params, true, Some(Arc::new(body)))
    }

    pub fn abstract_method(self, name: impl Into<String>, params: Vec<ParamInfo>) -> Self {
        self.push_method(name.into(), params, false, None)
    }

    /// Attach a doc comment to the most recently declared method.
    pub fn method_doc(mut self, doc: impl Into<String>) -> Self {
        if let Some(method) = self.def.methods.last_mut() {
            method.info.doc = Some(doc.into());
        }
        self
    }

    fn push_method(mut self, name: String, params: Vec<ParamInfo>, is_static: bool, body: Option<MethodFn>) -> Self {
        self.def.methods.push(MethodDef {
            info: MethodInfo {
                name,
                owner: self.def.name.clone(),
                is_static,
                is_abstract: body.is_none(),
                params,
                return_type: None,
                doc: None,
            },
            body,
        });
        self
    }

    pub(super) fn build(self) -> ClassDef {
        self.def
    }
}
