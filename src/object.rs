//! Proxy objects
//!
//! An [`Object`] stands for one live foreign object. Reads, writes and
//! calls are forwarded as commands carrying its handle. Property values
//! read through a proxy are cached until the bridge next runs a command
//! that may execute foreign code.

use crate::bridge::{Bridge, BridgeInner};
use crate::class::{collect_kwargs, Class};
use crate::error::{Error, Result};
use crate::value::Value;
use ferry_wire::marshal::encode_json;
use ferry_wire::{ConversionError, ObjectRef, Value as WireValue};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::trace;

#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    handle: String,
    class_name: String,
    bridge: Weak<BridgeInner>,
    bridge_id: u64,
    class: OnceCell<Class>,
    cache: RwLock<PropertyCache>,
    prefetch_defaults: bool,
    /// Bridge epoch when the handle was first seen
    born: u64,
}

/// Property values valid for one bridge epoch.
struct PropertyCache {
    epoch: u64,
    values: HashMap<String, Value>,
}

impl Object {
    pub(crate) fn new(
        class_name: String,
        handle: String,
        bridge: &Arc<BridgeInner>,
        class: Option<Class>,
        prefetch_defaults: bool,
        epoch: u64,
    ) -> Self {
        let object = Self {
            inner: Arc::new(ObjectInner {
                handle,
                class_name,
                bridge: Arc::downgrade(bridge),
                bridge_id: bridge.id(),
                class: OnceCell::new(),
                cache: RwLock::new(PropertyCache { epoch, values: HashMap::new() }),
                prefetch_defaults,
                born: epoch,
            }),
        };
        if let Some(class) = class {
            if prefetch_defaults {
                object.seed_defaults(&class, epoch);
            }
            let _ = object.inner.class.set(class);
        }
        object
    }

    /// The foreign handle. Unique for the life of the bridge.
    pub fn handle(&self) -> &str {
        &self.inner.handle
    }

    pub fn class_name(&self) -> &str {
        &self.inner.class_name
    }

    pub(crate) fn bridge_id(&self) -> u64 {
        self.inner.bridge_id
    }

    fn bridge(&self) -> Result<Bridge> {
        self.inner
            .bridge
            .upgrade()
            .map(Bridge::from_inner)
            .ok_or(Error::Disconnected)
    }

    fn wire(&self) -> Result<serde_json::Value> {
        Ok(encode_json(&WireValue::Object(ObjectRef {
            class: self.inner.class_name.clone(),
            hash: self.inner.handle.clone(),
        }))?)
    }

    /// The class descriptor, resolved on first use.
    pub fn class(&self) -> Result<Class> {
        if let Some(class) = self.inner.class.get() {
            return Ok(class.clone());
        }
        let bridge = self.bridge()?;
        let class = bridge.class(&self.inner.class_name)?;
        if self.inner.prefetch_defaults {
            self.seed_defaults(&class, bridge.epoch());
        }
        Ok(self.inner.class.get_or_init(|| class).clone())
    }

    /// Fill the cache with declared defaults while nothing could have
    /// changed them since the handle was first seen.
    fn seed_defaults(&self, class: &Class, epoch: u64) {
        if epoch != self.inner.born {
            return;
        }
        let mut cache = self.inner.cache.write();
        if cache.epoch != epoch {
            return;
        }
        for property in class.properties() {
            if property.has_default && !property.is_static {
                cache
                    .values
                    .entry(property.name.clone())
                    .or_insert_with(|| Value::from_plain(property.default.clone()));
            }
        }
    }

    pub fn is_instance_of(&self, class: &str) -> Result<bool> {
        Ok(self.class()?.is_subclass_of(class))
    }

    fn require(&self, capability: &str, what: &str) -> Result<()> {
        if self.is_instance_of(capability)? {
            Ok(())
        } else {
            Err(Error::Unsupported(format!("{} object {}", self.inner.class_name, what)))
        }
    }

    // ========================================================================
    // Properties
    // ========================================================================

    pub fn get(&self, name: &str) -> Result<Value> {
        if self.inner.prefetch_defaults && self.inner.class.get().is_none() {
            self.class()?;
        }
        let bridge = self.bridge()?;
        let epoch = bridge.epoch();
        if let Some(value) = self.cached(name, epoch) {
            trace!(handle = %self.inner.handle, property = name, "property cache hit");
            return Ok(value);
        }
        let value = bridge.send("getProperty", json!({ "obj": self.wire()?, "name": name }))?;
        self.remember(name, value.clone(), epoch);
        Ok(value)
    }

    /// Read a property and convert it.
    pub fn get_as<T>(&self, name: &str) -> Result<T>
    where
        T: TryFrom<Value, Error = ConversionError>,
    {
        Ok(T::try_from(self.get(name)?)?)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let bridge = self.bridge()?;
        let value = value.into();
        let data = json!({ "obj": self.wire()?, "name": name, "value": bridge.encode(&value)? });
        bridge.send("setProperty", data)?;
        self.remember(name, value, bridge.epoch());
        Ok(())
    }

    pub fn unset(&self, name: &str) -> Result<()> {
        let bridge = self.bridge()?;
        bridge.send("unsetProperty", json!({ "obj": self.wire()?, "name": name }))?;
        self.inner.cache.write().values.remove(name);
        Ok(())
    }

    fn cached(&self, name: &str, epoch: u64) -> Option<Value> {
        let cache = self.inner.cache.read();
        if cache.epoch == epoch {
            cache.values.get(name).cloned()
        } else {
            None
        }
    }

    fn remember(&self, name: &str, value: Value, epoch: u64) {
        let mut cache = self.inner.cache.write();
        if cache.epoch != epoch {
            cache.values.clear();
            cache.epoch = epoch;
        }
        cache.values.insert(name.to_string(), value);
    }

    // ========================================================================
    // Calls
    // ========================================================================

    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value> {
        self.call_with(method, args, Vec::<(String, Value)>::new())
    }

    /// Call a method with keyword arguments bound by its declared parameters.
    pub fn call_with<K, V, I>(&self, method: &str, args: Vec<Value>, kwargs: I) -> Result<Value>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let bridge = self.bridge()?;
        let kwargs = collect_kwargs(kwargs);
        let args = if kwargs.is_empty() {
            bridge.encode_call(method, None, args, kwargs)?
        } else {
            let class = self.class()?;
            let params = class.method(method).map(|m| m.params.as_slice());
            bridge.encode_call(method, params, args, kwargs)?
        };
        bridge.send("callMethod", json!({ "obj": self.wire()?, "name": method, "args": args }))
    }

    /// Invoke the object itself, for callable objects.
    pub fn invoke(&self, args: Vec<Value>) -> Result<Value> {
        let bridge = self.bridge()?;
        let args = bridge.encode_call("__invoke", None, args, Vec::new())?;
        bridge.send("callObj", json!({ "obj": self.wire()?, "args": args }))
    }

    // ========================================================================
    // Containers
    // ========================================================================

    pub fn len(&self) -> Result<usize> {
        self.require("Countable", "is not countable")?;
        let count = self.bridge()?.send("count", self.wire()?)?;
        count
            .as_int()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::malformed("count must answer a non-negative integer"))
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn item_command(&self, cmd: &str, offset: Value, value: Option<Value>) -> Result<Value> {
        self.require("ArrayAccess", "does not support indexing")?;
        let bridge = self.bridge()?;
        let mut data = json!({ "obj": self.wire()?, "offset": bridge.encode(&offset)? });
        if let Some(value) = value {
            data["value"] = bridge.encode(&value)?;
        }
        bridge.send(cmd, data)
    }

    pub fn get_item(&self, offset: impl Into<Value>) -> Result<Value> {
        self.item_command("getItem", offset.into(), None)
    }

    pub fn set_item(&self, offset: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        self.item_command("setItem", offset.into(), Some(value.into()))?;
        Ok(())
    }

    pub fn del_item(&self, offset: impl Into<Value>) -> Result<()> {
        self.item_command("delItem", offset.into(), None)?;
        Ok(())
    }

    pub fn has_item(&self, offset: impl Into<Value>) -> Result<bool> {
        let found = self.item_command("hasItem", offset.into(), None)?;
        found
            .as_bool()
            .ok_or_else(|| Error::malformed("hasItem must answer a boolean"))
    }

    /// Iterate a traversable object as `(key, value)` pairs.
    pub fn iter(&self) -> Result<ObjectIter> {
        self.require("Traversable", "is not traversable")?;
        let bridge = self.bridge()?;
        let iterator = bridge
            .send("startIteration", self.wire()?)?
            .into_object()
            .ok_or_else(|| Error::malformed("startIteration must answer an object"))?;
        Ok(ObjectIter {
            bridge,
            iterator,
            done: false,
        })
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Printable form as the foreign runtime renders it.
    pub fn repr(&self) -> Result<String> {
        let text = self.bridge()?.send("repr", self.wire()?)?;
        match text {
            Value::String(s) => Ok(s.trim_end().to_string()),
            other => Err(Error::malformed(format!("repr answered {}", other.type_name()))),
        }
    }

    /// Declared properties, dynamic properties, then methods.
    pub fn dir(&self) -> Result<Vec<String>> {
        let class = self.class()?;
        let dynamic = self
            .bridge()?
            .send("listNonDefaultProperties", self.wire()?)?;
        let dynamic = Vec::<Value>::try_from(dynamic)?;

        let mut names: Vec<String> = class
            .properties()
            .iter()
            .filter(|p| !p.is_static)
            .map(|p| p.name.clone())
            .collect();
        names.extend(dynamic.into_iter().filter_map(|v| v.as_str().map(str::to_string)));
        names.extend(class.methods().iter().map(|m| m.name.clone()));
        let mut seen = std::collections::HashSet::new();
        names.retain(|name| seen.insert(name.clone()));
        Ok(names)
    }
}

impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        self.inner.bridge_id == other.inner.bridge_id && self.inner.handle == other.inner.handle
    }
}

impl Eq for Object {}

impl std::hash::Hash for Object {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.bridge_id.hash(state);
        self.inner.handle.hash(state);
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.inner.class_name)
            .field("handle", &self.inner.handle)
            .finish()
    }
}

/// Pairs produced by a foreign iterator.
///
/// Yields an error at most once and then stops.
pub struct ObjectIter {
    bridge: Bridge,
    iterator: Object,
    done: bool,
}

impl ObjectIter {
    fn step(&mut self) -> Result<Option<(Value, Value)>> {
        let reply = self.bridge.send("nextIteration", self.iterator.wire()?)?;
        let mut parts = Vec::<Value>::try_from(reply)
            .map_err(Error::malformed)?
            .into_iter();
        match (parts.next(), parts.next(), parts.next()) {
            (Some(Value::Bool(true)), Some(key), Some(value)) => Ok(Some((key, value))),
            (Some(Value::Bool(false)), _, _) => Ok(None),
            _ => Err(Error::malformed("nextIteration must answer [status, key, value]")),
        }
    }
}

impl Iterator for ObjectIter {
    type Item = Result<(Value, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(pair)) => Some(Ok(pair)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

// ============================================================================
// Resources
// ============================================================================

/// A foreign resource (stream, connection, ...). Opaque to the host.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

#[derive(Debug)]
struct ResourceInner {
    kind: String,
    handle: String,
    bridge_id: u64,
}

impl Resource {
    pub(crate) fn new(kind: String, handle: String, bridge_id: u64) -> Self {
        Self {
            inner: Arc::new(ResourceInner { kind, handle, bridge_id }),
        }
    }

    pub fn kind(&self) -> &str {
        &self.inner.kind
    }

    pub fn handle(&self) -> &str {
        &self.inner.handle
    }

    pub(crate) fn bridge_id(&self) -> u64 {
        self.inner.bridge_id
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        self.inner.bridge_id == other.inner.bridge_id && self.inner.handle == other.inner.handle
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.inner.kind)
            .field("handle", &self.inner.handle)
            .finish()
    }
}
