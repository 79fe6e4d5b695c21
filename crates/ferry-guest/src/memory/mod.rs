//! In-process foreign runtime
//!
//! Functions, classes and scripts are Rust closures registered up front.
//! Objects live in a handle table for the lifetime of the runtime, the same
//! way the host keeps every proxy it has seen.

mod builtins;
mod class;

pub use class::ClassBuilder;

use crate::helpers::format_double;
use crate::runtime::{ForeignRuntime, Target};
use class::{ClassDef, MethodDef};
use ferry_wire::{ClassInfo, FunctionInfo, ObjectRef, ParamInfo, PropertyInfo, ResourceRef, Thrown, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Body of a function or script.
pub type NativeFn = Arc<dyn Fn(&mut MemoryRuntime, Vec<Value>) -> Result<Value, Thrown> + Send + Sync>;

/// Body of a method; `this` is `None` for static calls.
pub type MethodFn =
    Arc<dyn Fn(&mut MemoryRuntime, Option<&ObjectRef>, Vec<Value>) -> Result<Value, Thrown> + Send + Sync>;

/// Native backing state of an object, for classes implemented in Rust.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Native {
    #[default]
    None,
    /// Ordered key/value storage with an iteration cursor
    Array { entries: Vec<(Value, Value)>, cursor: usize },
}

struct FunctionDef {
    info: FunctionInfo,
    body: NativeFn,
}

struct Instance {
    class: String,
    properties: Vec<(String, Value)>,
    native: Native,
}

#[derive(Debug, Clone)]
struct ResourceState {
    kind: String,
    buffer: String,
    open: bool,
}

pub struct MemoryRuntime {
    constants: BTreeMap<String, Value>,
    globals: BTreeMap<String, Value>,
    functions: BTreeMap<String, FunctionDef>,
    classes: BTreeMap<String, ClassDef>,
    scripts: HashMap<String, NativeFn>,
    included: HashSet<String>,
    objects: HashMap<String, Instance>,
    resources: HashMap<String, ResourceState>,
    next_handle: u64,
    output: String,
}

fn key(name: &str) -> String {
    name.trim_start_matches('\\').to_ascii_lowercase()
}

fn canonical(name: &str) -> &str {
    name.trim_start_matches('\\')
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuntime {
    /// A runtime with the standard constants, functions and classes.
    pub fn new() -> Self {
        let mut rt = Self::empty();
        builtins::install(&mut rt);
        rt
    }

    /// A runtime with nothing defined.
    pub fn empty() -> Self {
        Self {
            constants: BTreeMap::new(),
            globals: BTreeMap::new(),
            functions: BTreeMap::new(),
            classes: BTreeMap::new(),
            scripts: HashMap::new(),
            included: HashSet::new(),
            objects: HashMap::new(),
            resources: HashMap::new(),
            next_handle: 1,
            output: String::new(),
        }
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    pub fn define_function<F>(&mut self, info: FunctionInfo, body: F) -> &mut Self
    where
        F: Fn(&mut MemoryRuntime, Vec<Value>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        let mut info = info;
        info.name = canonical(&info.name).to_string();
        self.functions.insert(
            key(&info.name),
            FunctionDef {
                info,
                body: Arc::new(body),
            },
        );
        self
    }

    pub fn define_class(&mut self, class: ClassBuilder) -> &mut Self {
        let def = class.build();
        self.classes.insert(key(&def.name), def);
        self
    }

    /// Register a source unit for `include`/`require`.
    pub fn define_script<F>(&mut self, path: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(&mut MemoryRuntime, Vec<Value>) -> Result<Value, Thrown> + Send + Sync + 'static,
    {
        self.scripts.insert(path.into(), Arc::new(body));
        self
    }

    /// Everything written by `echo` and `print` so far.
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    fn allocate(&mut self, class: &str, native: Native) -> ObjectRef {
        let hash = format!("{:032x}", self.next_handle);
        self.next_handle += 1;
        let properties = self
            .class_info(class)
            .map(|info| {
                info.properties
                    .into_iter()
                    .filter(|p| !p.is_static)
                    .map(|p| (p.name, p.default))
                    .collect()
            })
            .unwrap_or_default();
        self.objects.insert(
            hash.clone(),
            Instance {
                class: class.to_string(),
                properties,
                native,
            },
        );
        ObjectRef {
            class: class.to_string(),
            hash,
        }
    }

    fn instance(&self, obj: &ObjectRef) -> Result<&Instance, Thrown> {
        self.objects.get(&obj.hash).ok_or_else(|| no_such_object(obj))
    }

    fn instance_mut(&mut self, obj: &ObjectRef) -> Result<&mut Instance, Thrown> {
        self.objects.get_mut(&obj.hash).ok_or_else(|| no_such_object(obj))
    }

    pub fn native(&self, obj: &ObjectRef) -> Option<&Native> {
        self.objects.get(&obj.hash).map(|i| &i.native)
    }

    pub fn native_mut(&mut self, obj: &ObjectRef) -> Option<&mut Native> {
        self.objects.get_mut(&obj.hash).map(|i| &mut i.native)
    }

    pub fn set_native(&mut self, obj: &ObjectRef, native: Native) -> Result<(), Thrown> {
        self.instance_mut(obj)?.native = native;
        Ok(())
    }

    /// Build an error object of `class` and return it ready to be raised.
    ///
    /// Unknown classes still produce an error, just without a live object.
    pub fn throw(&mut self, class: &str, message: impl Into<String>) -> Thrown {
        let message = message.into();
        let Some(def) = self.classes.get(&key(class)) else {
            return Thrown::new(canonical(class), message);
        };
        let class = def.name.clone();
        let obj = self.allocate(&class, Native::None);
        if let Ok(instance) = self.instance_mut(&obj) {
            set_slot(&mut instance.properties, "message", Value::from(message.as_str()));
        }
        Thrown::new(class, message).with_handle(obj.hash)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    pub fn open_resource(&mut self, kind: &str) -> ResourceRef {
        let hash = self.next_handle.to_string();
        self.next_handle += 1;
        self.resources.insert(
            hash.clone(),
            ResourceState {
                kind: kind.to_string(),
                buffer: String::new(),
                open: true,
            },
        );
        ResourceRef {
            kind: kind.to_string(),
            hash,
        }
    }

    fn resource_mut(&mut self, res: &ResourceRef) -> Result<&mut ResourceState, Thrown> {
        match self.resources.get_mut(&res.hash) {
            Some(state) if state.open => Ok(state),
            Some(_) => Err(Thrown::new("TypeError", "supplied resource is not a valid stream resource")),
            None => Err(Thrown::new("Error", format!("no live resource with handle {}", res.hash))),
        }
    }

    // ------------------------------------------------------------------
    // Calls
    // ------------------------------------------------------------------

    /// Look a method up along the parent chain, then the interfaces.
    fn find_method(&self, class: &str, name: &str) -> Option<(String, &MethodDef)> {
        let wanted = name.to_ascii_lowercase();
        let mut pending = vec![class.to_string()];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if !seen.insert(key(&current)) {
                continue;
            }
            let Some(def) = self.classes.get(&key(&current)) else {
                continue;
            };
            if let Some(method) = def.methods.iter().find(|m| m.info.name.to_ascii_lowercase() == wanted) {
                return Some((def.name.clone(), method));
            }
            // Interfaces are searched last
            pending.extend(def.interfaces.iter().rev().cloned());
            pending.extend(def.parent.clone());
        }
        None
    }

    fn invoke_method(
        &mut self,
        class: &str,
        this: Option<&ObjectRef>,
        name: &str,
        args: Vec<Value>,
    ) -> Result<Value, Thrown> {
        let Some((owner, method)) = self.find_method(class, name) else {
            return Err(self.throw("Error", format!("Call to undefined method {}::{}()", class, name)));
        };
        let label = format!("{}::{}", owner, method.info.name);
        let is_static = method.info.is_static;
        let params = method.info.params.clone();
        let Some(body) = method.body.clone() else {
            return Err(self.throw("Error", format!("Cannot call abstract method {}()", label)));
        };
        if this.is_none() && !is_static {
            return Err(self.throw(
                "Error",
                format!("Non-static method {}() cannot be called statically", label),
            ));
        }
        let args = self.bind_args(&label, &params, args)?;
        body(self, if is_static { None } else { this }, args)
    }

    /// Check arity and fill omitted optional parameters with their defaults.
    fn bind_args(&mut self, label: &str, params: &[ParamInfo], mut args: Vec<Value>) -> Result<Vec<Value>, Thrown> {
        let required = params.iter().filter(|p| !p.has_default && !p.variadic).count();
        if args.len() < required {
            let bound = if params.iter().any(|p| p.has_default || p.variadic) {
                "at least"
            } else {
                "exactly"
            };
            return Err(self.throw(
                "ArgumentCountError",
                format!(
                    "Too few arguments to function {}(), {} passed and {} {} expected",
                    label,
                    args.len(),
                    bound,
                    required
                ),
            ));
        }
        for param in params.iter().skip(args.len()) {
            if param.variadic {
                break;
            }
            args.push(param.default.clone());
        }
        Ok(args)
    }

    fn render(&self, value: &Value, seen: &mut Vec<String>, out: &mut String) {
        match value {
            Value::Null => out.push_str("NULL"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Int(n) => out.push_str(&n.to_string()),
            Value::Double(x) if x.is_finite() && x.fract() == 0.0 => out.push_str(&format!("{:.1}", x)),
            Value::Double(x) => out.push_str(&format_double(*x)),
            Value::String(s) => {
                out.push('\'');
                out.push_str(&s.replace('\\', "\\\\").replace('\'', "\\'"));
                out.push('\'');
            }
            Value::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render(item, seen, out);
                }
                out.push(']');
            }
            Value::Map(entries) => {
                out.push('[');
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.render(&Value::from(k.as_str()), seen, out);
                    out.push_str(" => ");
                    self.render(v, seen, out);
                }
                out.push(']');
            }
            Value::Resource(res) => out.push_str(&format!("resource({}) of type ({})", res.hash, res.kind)),
            Value::Object(obj) => {
                let Some(instance) = self.objects.get(&obj.hash) else {
                    out.push_str(&format!("{} Object (*FREED*)", obj.class));
                    return;
                };
                out.push_str(&instance.class);
                out.push_str(" Object (");
                if seen.contains(&obj.hash) {
                    out.push_str("*RECURSION*)");
                    return;
                }
                seen.push(obj.hash.clone());
                for (i, (name, v)) in instance.properties.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&format!("[{}] => ", name));
                    self.render(v, seen, out);
                }
                seen.pop();
                out.push(')');
            }
        }
    }
}

fn no_such_object(obj: &ObjectRef) -> Thrown {
    Thrown::new("Error", format!("no live object with handle {}", obj.hash))
}

fn set_slot(slots: &mut Vec<(String, Value)>, name: &str, value: Value) {
    match slots.iter_mut().find(|(k, _)| k == name) {
        Some(slot) => slot.1 = value,
        None => slots.push((name.to_string(), value)),
    }
}

impl ForeignRuntime for MemoryRuntime {
    fn constant(&self, name: &str) -> Option<Value> {
        self.constants.get(canonical(name)).cloned()
    }

    fn define_constant(&mut self, name: &str, value: Value) -> Result<(), Thrown> {
        let name = canonical(name);
        if self.constants.contains_key(name) {
            return Err(self.throw("Error", format!("Constant {} already defined", name)));
        }
        self.constants.insert(name.to_string(), value);
        Ok(())
    }

    fn constant_names(&self) -> Vec<String> {
        self.constants.keys().cloned().collect()
    }

    fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    fn global_names(&self) -> Vec<String> {
        self.globals.keys().cloned().collect()
    }

    fn function_info(&self, name: &str) -> Option<FunctionInfo> {
        self.functions.get(&key(name)).map(|f| f.info.clone())
    }

    fn function_names(&self) -> Vec<String> {
        self.functions.values().map(|f| f.info.name.clone()).collect()
    }

    fn call_function(&mut self, name: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        let Some(def) = self.functions.get(&key(name)) else {
            return Err(self.throw("Error", format!("Call to undefined function {}()", name)));
        };
        let label = def.info.name.clone();
        let params = def.info.params.clone();
        let body = def.body.clone();
        let args = self.bind_args(&label, &params, args)?;
        body(self, args)
    }

    fn class_info(&self, name: &str) -> Option<ClassInfo> {
        let def = self.classes.get(&key(name))?;
        let mut info = def.header();

        let mut pending = vec![def.name.clone()];
        let mut seen = HashSet::new();
        while let Some(current) = pending.pop() {
            if !seen.insert(key(&current)) {
                continue;
            }
            let Some(def) = self.classes.get(&key(&current)) else {
                continue;
            };
            for method in &def.methods {
                if info.method(&method.info.name).is_none() {
                    info.methods.push(method.info.clone());
                }
            }
            for property in &def.properties {
                if !info.properties.iter().any(|p| p.name == property.name) {
                    info.properties.push(property.clone());
                }
            }
            for (name, value) in &def.consts {
                if !info.consts.iter().any(|(n, _)| n == name) {
                    info.consts.push((name.clone(), value.clone()));
                }
            }
            pending.extend(def.interfaces.iter().rev().cloned());
            pending.extend(def.parent.clone());
        }
        Some(info)
    }

    fn class_names(&self) -> Vec<String> {
        self.classes.values().map(|c| c.name.clone()).collect()
    }

    fn create_object(&mut self, class: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        let Some(def) = self.classes.get(&key(class)) else {
            return Err(self.throw("Error", format!("Class \"{}\" not found", canonical(class))));
        };
        let name = def.name.clone();
        if def.is_interface {
            return Err(self.throw("Error", format!("Cannot instantiate interface {}", name)));
        }
        if def.is_abstract {
            return Err(self.throw("Error", format!("Cannot instantiate abstract class {}", name)));
        }
        let obj = self.allocate(&name, Native::None);
        if self.find_method(&name, "__construct").is_some() {
            self.invoke_method(&name, Some(&obj), "__construct", args)?;
        }
        Ok(Value::Object(obj))
    }

    fn call_method(&mut self, target: Target<'_>, name: &str, args: Vec<Value>) -> Result<Value, Thrown> {
        match target {
            Target::Object(obj) => {
                let class = self.instance(obj)?.class.clone();
                self.invoke_method(&class, Some(obj), name, args)
            }
            Target::Class(class) => {
                let Some(def) = self.classes.get(&key(class)) else {
                    return Err(self.throw("Error", format!("Class \"{}\" not found", canonical(class))));
                };
                let class = def.name.clone();
                self.invoke_method(&class, None, name, args)
            }
        }
    }

    fn get_property(&mut self, obj: &ObjectRef, name: &str) -> Result<Value, Thrown> {
        let instance = self.instance(obj)?;
        if let Some((_, value)) = instance.properties.iter().find(|(k, _)| k == name) {
            return Ok(value.clone());
        }
        let class = instance.class.clone();
        if self.find_method(&class, "__get").is_some() {
            return self.invoke_method(&class, Some(obj), "__get", vec![Value::from(name)]);
        }
        Err(self.throw("Error", format!("Undefined property: {}::${}", class, name)))
    }

    fn set_property(&mut self, obj: &ObjectRef, name: &str, value: Value) -> Result<(), Thrown> {
        let instance = self.instance_mut(obj)?;
        set_slot(&mut instance.properties, name, value);
        Ok(())
    }

    fn unset_property(&mut self, obj: &ObjectRef, name: &str) -> Result<(), Thrown> {
        let instance = self.instance_mut(obj)?;
        instance.properties.retain(|(k, _)| k != name);
        Ok(())
    }

    fn dynamic_properties(&self, obj: &ObjectRef) -> Result<Vec<String>, Thrown> {
        let instance = self.instance(obj)?;
        let declared: Vec<PropertyInfo> = self
            .class_info(&instance.class)
            .map(|info| info.properties)
            .unwrap_or_default();
        Ok(instance
            .properties
            .iter()
            .filter(|(k, _)| !declared.iter().any(|p| &p.name == k))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn object_class(&self, obj: &ObjectRef) -> Option<String> {
        self.objects.get(&obj.hash).map(|i| i.class.clone())
    }

    fn repr(&self, value: &Value) -> String {
        let mut out = String::new();
        self.render(value, &mut Vec::new(), &mut out);
        out
    }

    fn write_output(&mut self, text: &str) {
        self.output.push_str(text);
    }

    fn include(&mut self, path: &str, once: bool, required: bool) -> Result<Value, Thrown> {
        if once && self.included.contains(path) {
            return Ok(Value::Bool(true));
        }
        let Some(body) = self.scripts.get(path).cloned() else {
            if required {
                return Err(self.throw("Error", format!("Failed opening required '{}'", path)));
            }
            return Ok(Value::Bool(false));
        };
        self.included.insert(path.to_string());
        body(self, Vec::new())
    }
}
