//! The bridge
//!
//! Owns the transport and every process-wide cache: the handle registry,
//! function and class descriptors, and namespace listings. Cloning a
//! [`Bridge`] is cheap and all clones share one connection.
//!
//! ```text
//! Function::call ─┐
//! Object::get   ──┼─▶ Bridge::send ─▶ Transport ─▶ foreign dispatcher
//! Class::new    ──┘        │
//!                          └─▶ lift: handles → proxies, thrown → ForeignError
//! ```

use crate::binding::{bind, BindingError};
use crate::class::Class;
use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::exception::ForeignError;
use crate::function::Function;
use crate::handles::HandleRegistry;
use crate::namespace::{Kind, Namespace};
use crate::object::{Object, Resource};
use crate::value::Value;
use dashmap::DashMap;
use ferry_guest::{Dispatcher, ForeignRuntime};
use ferry_wire::marshal::encode_json;
use ferry_wire::{
    ChannelTransport, ClassInfo, Command, DecodeError, Envelope, FaultKind, FunctionInfo,
    ObjectRef, ParamInfo, ResourceRef, Thrown, Transport, TransportError, Value as WireValue,
};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

static NEXT_BRIDGE_ID: AtomicU64 = AtomicU64::new(1);

/// Commands that never run foreign user code. Everything else may mutate
/// foreign state and invalidates cached property values.
const READ_ONLY_COMMANDS: &[&str] = &[
    "getConst",
    "listConsts",
    "getGlobal",
    "listGlobals",
    "funcInfo",
    "listFuns",
    "classInfo",
    "listClasses",
    "getProperty",
    "listNonDefaultProperties",
    "repr",
    "resolveName",
    "listEverything",
];

/// A connection to one foreign runtime.
#[derive(Clone)]
pub struct Bridge {
    pub(crate) inner: Arc<BridgeInner>,
}

pub(crate) struct BridgeInner {
    id: u64,
    transport: Mutex<Box<dyn Transport>>,
    poisoned: AtomicBool,
    /// Bumped by every command that may run foreign code
    epoch: AtomicU64,
    config: BridgeConfig,
    registry: HandleRegistry,
    functions: DashMap<String, Function>,
    classes: DashMap<String, Class>,
    listings: DashMap<String, Arc<Vec<String>>>,
}

/// A decoded response before thrown errors are lifted.
enum Reply {
    Value(WireValue),
    Thrown(Thrown),
}

impl Bridge {
    /// Talk to a dispatcher on the other end of `transport`.
    pub fn connect<T: Transport + 'static>(transport: T) -> Self {
        Self::with_config(transport, BridgeConfig::default())
    }

    pub fn with_config<T: Transport + 'static>(transport: T, config: BridgeConfig) -> Self {
        let id = NEXT_BRIDGE_ID.fetch_add(1, Ordering::Relaxed);
        debug!(bridge = id, "bridge connected");
        Self {
            inner: Arc::new(BridgeInner {
                id,
                transport: Mutex::new(Box::new(transport) as Box<dyn Transport>),
                poisoned: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                config,
                registry: HandleRegistry::new(),
                functions: DashMap::new(),
                classes: DashMap::new(),
                listings: DashMap::new(),
            }),
        }
    }

    /// Run `runtime` behind a dispatcher on a worker thread.
    ///
    /// The worker exits once the last clone of the bridge is dropped.
    pub fn in_process<R: ForeignRuntime + Send + 'static>(runtime: R) -> Result<Self> {
        Self::in_process_with_config(runtime, BridgeConfig::default())
    }

    pub fn in_process_with_config<R: ForeignRuntime + Send + 'static>(
        runtime: R,
        config: BridgeConfig,
    ) -> Result<Self> {
        let (host, mut guest) = ChannelTransport::pair();
        std::thread::Builder::new()
            .name("ferry-guest".to_string())
            .spawn(move || {
                let mut dispatcher = Dispatcher::new(runtime);
                match dispatcher.serve(&mut guest) {
                    Ok(served) => debug!(served, "in-process dispatcher finished"),
                    Err(e) => warn!(error = %e, "in-process dispatcher failed"),
                }
            })
            .map_err(TransportError::Io)?;
        Ok(Self::with_config(host, config))
    }

    pub(crate) fn from_inner(inner: Arc<BridgeInner>) -> Self {
        Self { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.inner.registry
    }

    pub fn is_poisoned(&self) -> bool {
        self.inner.poisoned.load(Ordering::Acquire)
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::Acquire)
    }

    // ========================================================================
    // Requests
    // ========================================================================

    /// Send one command and hand back the raw response envelope.
    ///
    /// Nothing is decoded, so thrown errors and protocol faults come back
    /// as envelopes. Transport failures still poison the bridge.
    pub fn request(&self, command: &Command) -> Result<Envelope> {
        if self.is_poisoned() {
            return Err(TransportError::Poisoned.into());
        }
        let result = self.exchange(command);
        if let Err(e) = &result {
            self.poison(e);
        }
        result
    }

    fn exchange(&self, command: &Command) -> Result<Envelope> {
        let mut transport = self.inner.transport.lock();
        if !READ_ONLY_COMMANDS.contains(&command.cmd.as_str()) {
            self.inner.epoch.fetch_add(1, Ordering::AcqRel);
        }
        debug!(bridge = self.inner.id, cmd = %command.cmd, "sending command");
        transport.send_json(command)?;
        match transport.receive_json::<Envelope>()? {
            Some(envelope) => {
                debug!(bridge = self.inner.id, tag = %envelope.tag, "received response");
                Ok(envelope)
            }
            None => Err(TransportError::ClosedMidCall.into()),
        }
    }

    fn poison(&self, error: &Error) {
        if error.is_fatal() && !self.inner.poisoned.swap(true, Ordering::AcqRel) {
            warn!(bridge = self.inner.id, error = %error, "bridge poisoned");
        }
    }

    fn call_raw(&self, cmd: &str, data: serde_json::Value) -> Result<Reply> {
        let envelope = self.request(&Command::new(cmd, data))?;
        let reply = match ferry_wire::decode(&envelope) {
            Ok(value) => Ok(Reply::Value(value)),
            Err(DecodeError::Thrown(thrown)) => Ok(Reply::Thrown(thrown)),
            Err(DecodeError::Protocol(fault)) => Err(match fault.kind {
                FaultKind::UnknownCommand => {
                    Error::UnknownCommand(fault.command.unwrap_or_else(|| cmd.to_string()))
                }
                FaultKind::MalformedFrame => TransportError::MalformedFrame(fault.message).into(),
            }),
            Err(DecodeError::UnknownTypeTag(tag)) => Err(Error::UnknownTypeTag(tag)),
            Err(e @ DecodeError::InvalidValue { .. }) => Err(Error::malformed(e)),
        };
        if let Err(e) = &reply {
            self.poison(e);
        }
        reply
    }

    /// Send a command and lift the result into host values.
    pub(crate) fn send(&self, cmd: &str, data: serde_json::Value) -> Result<Value> {
        match self.call_raw(cmd, data)? {
            Reply::Value(value) => Ok(self.lift(value)),
            Reply::Thrown(thrown) => Err(self.lift_thrown(thrown).into()),
        }
    }

    /// Send a command for bridge bookkeeping. Thrown errors are reported
    /// without resolving their hierarchy, which would need more commands.
    fn send_plain(&self, cmd: &str, data: serde_json::Value) -> Result<WireValue> {
        match self.call_raw(cmd, data)? {
            Reply::Value(value) => Ok(value),
            Reply::Thrown(thrown) => Err(ForeignError::detached(thrown.class, thrown.message).into()),
        }
    }

    pub(crate) fn encode(&self, value: &Value) -> Result<serde_json::Value> {
        Ok(encode_json(&value.to_wire(self.inner.id)?)?)
    }

    /// Encode call arguments, merging keyword arguments by `params`.
    pub(crate) fn encode_call(
        &self,
        callee: &str,
        params: Option<&[ParamInfo]>,
        args: Vec<Value>,
        kwargs: Vec<(String, Value)>,
    ) -> Result<serde_json::Value> {
        let id = self.inner.id;
        let positional = args
            .iter()
            .map(|arg| arg.to_wire(id))
            .collect::<Result<Vec<_>, _>>()?;
        let keywords = kwargs
            .iter()
            .map(|(name, arg)| arg.to_wire(id).map(|w| (name.clone(), w)))
            .collect::<Result<Vec<_>, _>>()?;
        let bound = match params {
            Some(params) => bind(callee, params, positional, keywords)?,
            None if keywords.is_empty() => positional,
            None => {
                return Err(BindingError::NoSignature {
                    callee: callee.to_string(),
                }
                .into())
            }
        };
        let encoded = bound.iter().map(encode_json).collect::<Result<Vec<_>, _>>()?;
        Ok(serde_json::Value::Array(encoded))
    }

    // ========================================================================
    // Lifting
    // ========================================================================

    pub(crate) fn lift(&self, value: WireValue) -> Value {
        match value {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(n) => Value::Int(n),
            WireValue::Double(x) => Value::Double(x),
            WireValue::String(s) => Value::String(s),
            WireValue::List(items) => Value::List(items.into_iter().map(|v| self.lift(v)).collect()),
            WireValue::Map(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, self.lift(v)))
                    .collect(),
            ),
            WireValue::Object(obj) => Value::Object(self.lift_object(obj)),
            WireValue::Resource(res) => Value::Resource(self.lift_resource(res)),
        }
    }

    fn lift_object(&self, obj: ObjectRef) -> Object {
        let class = self.cached_class(&obj.class);
        let prefetch = self.inner.config.prefetch_defaults;
        let epoch = self.epoch();
        self.inner.registry.object(&obj.hash, || {
            trace!(handle = %obj.hash, class = %obj.class, "registering object");
            Object::new(obj.class.clone(), obj.hash.clone(), &self.inner, class, prefetch, epoch)
        })
    }

    fn lift_resource(&self, res: ResourceRef) -> Resource {
        self.inner.registry.resource(&res.hash, || {
            Resource::new(res.kind.clone(), res.hash.clone(), self.inner.id)
        })
    }

    /// Turn a thrown envelope into a catchable error with its hierarchy.
    fn lift_thrown(&self, thrown: Thrown) -> ForeignError {
        let object = thrown.handle.as_ref().map(|hash| {
            self.lift_object(ObjectRef {
                class: thrown.class.clone(),
                hash: hash.clone(),
            })
        });
        let ancestors = match self.class(&thrown.class) {
            Ok(class) => class.ancestor_set().clone(),
            Err(e) => {
                warn!(class = %thrown.class, error = %e, "cannot resolve thrown class");
                HashSet::new()
            }
        };
        ForeignError::new(thrown.class, thrown.message, object, ancestors)
    }

    // ========================================================================
    // Constants and globals
    // ========================================================================

    pub fn constant(&self, name: &str) -> Result<Value> {
        self.send("getConst", json!(name))
    }

    pub fn set_constant(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = self.encode(&value.into())?;
        self.send("setConst", json!({ "name": name, "value": value }))?;
        Ok(())
    }

    pub fn constants(&self) -> Result<Vec<String>> {
        self.names("listConsts")
    }

    pub fn global(&self, name: &str) -> Result<Value> {
        self.send("getGlobal", json!(name))
    }

    pub fn set_global(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = self.encode(&value.into())?;
        self.send("setGlobal", json!({ "name": name, "value": value }))?;
        Ok(())
    }

    pub fn globals(&self) -> Result<Vec<String>> {
        self.names("listGlobals")
    }

    fn names(&self, cmd: &str) -> Result<Vec<String>> {
        let value = self.send_plain(cmd, serde_json::Value::Null)?;
        Vec::<String>::try_from(value).map_err(Error::malformed)
    }

    // ========================================================================
    // Functions and classes
    // ========================================================================

    fn key<'a>(&self, name: &'a str) -> &'a str {
        name.trim_start_matches(self.inner.config.separator.as_str())
    }

    /// Call a function or proxy helper by name without resolving it first.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let args = self.encode_call(name, None, args, Vec::new())?;
        self.send("callFun", json!({ "name": name, "args": args }))
    }

    pub fn function(&self, name: &str) -> Result<Function> {
        let key = self.key(name);
        if let Some(function) = self.inner.functions.get(key) {
            trace!(name = key, "function cache hit");
            return Ok(function.clone());
        }
        let info = match self.send_plain("funcInfo", json!(key)) {
            Ok(value) => FunctionInfo::try_from(value).map_err(Error::malformed)?,
            Err(Error::Foreign(_)) => {
                return Err(Error::NotFound {
                    kind: "function",
                    name: key.to_string(),
                })
            }
            Err(e) => return Err(e),
        };
        let canonical = self.key(&info.name).to_string();
        let function = self
            .inner
            .functions
            .entry(canonical)
            .or_insert_with(|| Function::new(info, &self.inner))
            .clone();
        self.inner.functions.insert(key.to_string(), function.clone());
        Ok(function)
    }

    pub fn functions(&self) -> Result<Vec<String>> {
        self.names("listFuns")
    }

    /// Resolve a class and, recursively, every ancestor.
    pub fn class(&self, name: &str) -> Result<Class> {
        self.resolve_class(name, &mut Vec::new())
    }

    pub(crate) fn cached_class(&self, name: &str) -> Option<Class> {
        self.inner.classes.get(self.key(name)).map(|c| c.clone())
    }

    fn resolve_class(&self, name: &str, resolving: &mut Vec<String>) -> Result<Class> {
        let key = self.key(name);
        if let Some(class) = self.cached_class(key) {
            trace!(name = key, "class cache hit");
            return Ok(class);
        }
        if resolving.iter().any(|seen| seen.eq_ignore_ascii_case(key)) {
            return Err(Error::malformed(format!("inheritance cycle through {}", key)));
        }

        let info = match self.send_plain("classInfo", json!(key)) {
            Ok(value) => ClassInfo::try_from(value).map_err(Error::malformed)?,
            Err(Error::Foreign(_)) => {
                return Err(Error::NotFound {
                    kind: "class",
                    name: key.to_string(),
                })
            }
            Err(e) => return Err(e),
        };
        let canonical = self.key(&info.name).to_string();
        if let Some(class) = self.cached_class(&canonical) {
            self.inner.classes.insert(key.to_string(), class.clone());
            return Ok(class);
        }

        resolving.push(canonical.clone());
        let mut ancestors = HashSet::new();
        for ancestor in info.parent.iter().chain(info.interfaces.iter()) {
            let resolved = self.resolve_class(ancestor, resolving)?;
            ancestors.extend(resolved.ancestor_set().iter().cloned());
        }
        resolving.pop();

        let constants = info
            .consts
            .iter()
            .map(|(name, value)| (name.clone(), self.lift(value.clone())))
            .collect();
        debug!(class = %canonical, ancestors = ancestors.len(), "class resolved");
        let class = self
            .inner
            .classes
            .entry(canonical)
            .or_insert_with(|| Class::from_info(info, constants, ancestors, &self.inner))
            .clone();
        self.inner.classes.insert(key.to_string(), class.clone());
        Ok(class)
    }

    pub fn classes(&self) -> Result<Vec<String>> {
        self.names("listClasses")
    }

    // ========================================================================
    // Names and namespaces
    // ========================================================================

    /// Resolve a name to a function, class, constant or global.
    ///
    /// Without a `kind`, the configured precedence decides between kinds
    /// that share a name.
    pub fn resolve(&self, name: &str, kind: Option<Kind>) -> Result<Value> {
        let key = self.key(name);
        let kinds: Vec<&str> = match kind {
            Some(kind) => vec![kind.as_str()],
            None => self.inner.config.precedence.iter().map(|k| k.as_str()).collect(),
        };
        let reply = self.send_plain("resolveName", json!({ "name": key, "kind": kinds }))?;
        let mut parts = reply.into_items().map_err(Error::malformed)?.into_iter();
        let (found, content) = match (parts.next(), parts.next()) {
            (Some(WireValue::String(found)), Some(content)) => (found, content),
            _ => return Err(Error::malformed("resolveName must answer [kind, content]")),
        };
        let target = match &content {
            WireValue::String(s) => Ok(s.clone()),
            _ => Err(Error::malformed("resolveName content must be a name")),
        };
        match found.as_str() {
            "func" => Ok(Value::Function(self.function(&target?)?)),
            "class" => Ok(Value::Class(self.class(&target?)?)),
            "const" | "global" => Ok(self.lift(content)),
            "none" => Err(Error::NotFound {
                kind: kind.map(Kind::noun).unwrap_or("name"),
                name: key.to_string(),
            }),
            other => Err(Error::malformed(format!("unknown name kind '{}'", other))),
        }
    }

    /// A namespace node. Building one never talks to the foreign side.
    pub fn namespace(&self, path: &str) -> Namespace {
        Namespace::new(self.clone(), path)
    }

    /// Names below `path`, relative to it. Cached for the life of the bridge.
    pub(crate) fn listing(&self, path: &str) -> Result<Arc<Vec<String>>> {
        if let Some(listing) = self.inner.listings.get(path) {
            trace!(path, "namespace cache hit");
            return Ok(listing.clone());
        }
        let value = self.send_plain("listEverything", json!(path))?;
        let names = Vec::<String>::try_from(value).map_err(Error::malformed)?;
        let listing = self
            .inner
            .listings
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(names))
            .clone();
        Ok(listing)
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("id", &self.inner.id)
            .field("poisoned", &self.is_poisoned())
            .field("handles", &self.inner.registry.len())
            .finish()
    }
}

impl BridgeInner {
    pub(crate) fn id(&self) -> u64 {
        self.id
    }
}
