//! Class descriptors
//!
//! A [`Class`] is a capability record, not a Rust type: its descriptor plus
//! the names of every ancestor. Subtype checks are set lookups and never
//! touch the bridge.

use crate::bridge::{Bridge, BridgeInner};
use crate::error::{Error, Result};
use crate::object::Object;
use crate::value::Value;
use ferry_wire::marshal::encode_json;
use ferry_wire::{ClassInfo, MethodInfo, PropertyInfo, Value as WireValue};
use serde_json::json;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

#[derive(Clone)]
pub struct Class {
    inner: Arc<ClassInner>,
}

struct ClassInner {
    info: ClassInfo,
    constants: Vec<(String, Value)>,
    /// Lowercased names of this class and everything it extends or implements
    ancestors: HashSet<String>,
    bridge: Weak<BridgeInner>,
    bridge_id: u64,
}

impl Class {
    pub(crate) fn from_info(
        info: ClassInfo,
        constants: Vec<(String, Value)>,
        mut ancestors: HashSet<String>,
        bridge: &Arc<BridgeInner>,
    ) -> Self {
        ancestors.insert(info.name.to_ascii_lowercase());
        Self {
            inner: Arc::new(ClassInner {
                info,
                constants,
                ancestors,
                bridge: Arc::downgrade(bridge),
                bridge_id: bridge.id(),
            }),
        }
    }

    fn bridge(&self) -> Result<Bridge> {
        self.inner
            .bridge
            .upgrade()
            .map(Bridge::from_inner)
            .ok_or(Error::Disconnected)
    }

    pub fn name(&self) -> &str {
        &self.inner.info.name
    }

    pub fn info(&self) -> &ClassInfo {
        &self.inner.info
    }

    pub fn doc(&self) -> Option<&str> {
        self.inner.info.doc.as_deref()
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.inner.info.parent.as_deref()
    }

    /// The parent descriptor. Already resolved alongside this class.
    pub fn parent(&self) -> Result<Option<Class>> {
        match &self.inner.info.parent {
            Some(parent) => self.bridge()?.class(parent).map(Some),
            None => Ok(None),
        }
    }

    pub fn interfaces(&self) -> &[String] {
        &self.inner.info.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.inner.info.is_interface
    }

    pub fn is_abstract(&self) -> bool {
        self.inner.info.is_abstract
    }

    /// Is this class `class`, or does it extend or implement it?
    pub fn is_subclass_of(&self, class: &str) -> bool {
        let name = class.trim_start_matches('\\').to_ascii_lowercase();
        self.inner.ancestors.contains(&name)
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.inner.ancestors.iter().map(String::as_str)
    }

    pub(crate) fn ancestor_set(&self) -> &HashSet<String> {
        &self.inner.ancestors
    }

    pub fn constants(&self) -> &[(String, Value)] {
        &self.inner.constants
    }

    pub fn constant(&self, name: &str) -> Result<Value> {
        self.inner
            .constants
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| Error::NotFound {
                kind: "class constant",
                name: format!("{}::{}", self.name(), name),
            })
    }

    pub fn methods(&self) -> &[MethodInfo] {
        &self.inner.info.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.inner.info.method(name)
    }

    pub fn properties(&self) -> &[PropertyInfo] {
        &self.inner.info.properties
    }

    // ========================================================================
    // Instantiation and static calls
    // ========================================================================

    /// Instantiate the class.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(&self, args: Vec<Value>) -> Result<Object> {
        self.new_with(args, Vec::<(String, Value)>::new())
    }

    /// Instantiate with keyword arguments bound by the constructor.
    pub fn new_with<K, V, I>(&self, args: Vec<Value>, kwargs: I) -> Result<Object>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        if self.is_interface() {
            return Err(Error::Instantiation(format!("interface {}", self.name())));
        }
        if self.is_abstract() {
            return Err(Error::Instantiation(format!("abstract class {}", self.name())));
        }
        let bridge = self.bridge()?;
        let kwargs = collect_kwargs(kwargs);
        let params = self.method("__construct").map(|m| m.params.as_slice());
        let callee = format!("{}::__construct", self.name());
        let args = bridge.encode_call(&callee, params, args, kwargs)?;
        bridge
            .send("createObject", json!({ "name": self.name(), "args": args }))?
            .into_object()
            .ok_or_else(|| Error::malformed("createObject must answer an object"))
    }

    pub fn call_static(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.call_static_with(method, args, Vec::<(String, Value)>::new())
    }

    pub fn call_static_with<K, V, I>(&self, method: &str, args: Vec<Value>, kwargs: I) -> Result<Value>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let bridge = self.bridge()?;
        let kwargs = collect_kwargs(kwargs);
        let params = self.method(method).map(|m| m.params.as_slice());
        let callee = format!("{}::{}", self.name(), method);
        let args = bridge.encode_call(&callee, params, args, kwargs)?;
        let target = encode_json(&WireValue::String(self.name().to_string()))?;
        bridge.send("callMethod", json!({ "obj": target, "name": method, "args": args }))
    }
}

pub(crate) fn collect_kwargs<K, V, I>(kwargs: I) -> Vec<(String, Value)>
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    kwargs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.inner.bridge_id == other.inner.bridge_id
            && self.inner.info.name.eq_ignore_ascii_case(&other.inner.info.name)
    }
}

impl std::fmt::Debug for Class {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.inner.info.name)
            .field("ancestors", &self.inner.ancestors.len())
            .finish()
    }
}
