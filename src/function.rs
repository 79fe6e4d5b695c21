use crate::bridge::{Bridge, BridgeInner};
use crate::class::collect_kwargs;
use crate::error::{Error, Result};
use crate::value::Value;
use ferry_wire::{FunctionInfo, ParamInfo, TypeInfo};
use serde_json::json;
use std::sync::{Arc, Weak};

/// A foreign function, callable with positional or keyword arguments.
#[derive(Clone)]
pub struct Function {
    inner: Arc<FunctionInner>,
}

struct FunctionInner {
    info: FunctionInfo,
    bridge: Weak<BridgeInner>,
    bridge_id: u64,
}

impl Function {
    pub(crate) fn new(info: FunctionInfo, bridge: &Arc<BridgeInner>) -> Self {
        Self {
            inner: Arc::new(FunctionInner {
                info,
                bridge: Arc::downgrade(bridge),
                bridge_id: bridge.id(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.info.name
    }

    pub fn info(&self) -> &FunctionInfo {
        &self.inner.info
    }

    pub fn params(&self) -> &[ParamInfo] {
        &self.inner.info.params
    }

    pub fn return_type(&self) -> Option<&TypeInfo> {
        self.inner.info.return_type.as_ref()
    }

    pub fn doc(&self) -> Option<&str> {
        self.inner.info.doc.as_deref()
    }

    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        self.call_with(args, Vec::<(String, Value)>::new())
    }

    /// Call with keyword arguments placed by parameter name.
    ///
    /// Binding errors are reported before anything is sent.
    pub fn call_with<K, V, I>(&self, args: Vec<Value>, kwargs: I) -> Result<Value>
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        let bridge = self
            .inner
            .bridge
            .upgrade()
            .map(Bridge::from_inner)
            .ok_or(Error::Disconnected)?;
        let args = bridge.encode_call(self.name(), Some(self.params()), args, collect_kwargs(kwargs))?;
        bridge.send("callFun", json!({ "name": self.name(), "args": args }))
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.inner.bridge_id == other.inner.bridge_id
            && self.inner.info.name.eq_ignore_ascii_case(&other.inner.info.name)
    }
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Function({})", self.inner.info.name)
    }
}
