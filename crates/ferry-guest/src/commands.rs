//! Built-in command handlers

use crate::runtime::Target;
use crate::{Dispatcher, ForeignRuntime, GuestError};
use ferry_wire::marshal::decode_json;
use ferry_wire::{ObjectRef, Thrown, Value};
use serde::de::DeserializeOwned;
use serde::Deserialize;

pub(crate) fn register_builtins<R: ForeignRuntime>(d: &mut Dispatcher<R>) {
    d.register("getConst", get_const::<R>);
    d.register("setConst", set_const::<R>);
    d.register("listConsts", list_consts::<R>);
    d.register("getGlobal", get_global::<R>);
    d.register("setGlobal", set_global::<R>);
    d.register("listGlobals", list_globals::<R>);
    d.register("callFun", call_fun::<R>);
    d.register("funcInfo", func_info::<R>);
    d.register("listFuns", list_funs::<R>);
    d.register("classInfo", class_info::<R>);
    d.register("listClasses", list_classes::<R>);
    d.register("createObject", create_object::<R>);
    d.register("callMethod", call_method::<R>);
    d.register("getProperty", get_property::<R>);
    d.register("setProperty", set_property::<R>);
    d.register("unsetProperty", unset_property::<R>);
    d.register("listNonDefaultProperties", list_non_default_properties::<R>);
    d.register("callObj", call_obj::<R>);
    d.register("count", count::<R>);
    d.register("hasItem", has_item::<R>);
    d.register("getItem", get_item::<R>);
    d.register("setItem", set_item::<R>);
    d.register("delItem", del_item::<R>);
    d.register("startIteration", start_iteration::<R>);
    d.register("nextIteration", next_iteration::<R>);
    d.register("repr", repr::<R>);
    d.register("resolveName", resolve_name::<R>);
    d.register("listEverything", list_everything::<R>);
}

// ============================================================================
// Payload shapes
// ============================================================================

#[derive(Deserialize)]
struct Named {
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct Call {
    name: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct MethodCall {
    obj: serde_json::Value,
    name: String,
    #[serde(default)]
    args: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Member {
    obj: serde_json::Value,
    name: String,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct Invocation {
    obj: serde_json::Value,
    #[serde(default)]
    args: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct Item {
    obj: serde_json::Value,
    offset: serde_json::Value,
    #[serde(default)]
    value: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Resolve {
    Bare(String),
    Query {
        name: String,
        #[serde(default)]
        kind: Option<Kinds>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Kinds {
    One(String),
    Many(Vec<String>),
}

fn parse<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, GuestError> {
    serde_json::from_value(data).map_err(|e| GuestError::bad_data(e.to_string()))
}

fn decode_one(node: &serde_json::Value) -> Result<Value, GuestError> {
    Ok(decode_json(node)?)
}

fn decode_args(nodes: &[serde_json::Value]) -> Result<Vec<Value>, GuestError> {
    nodes.iter().map(decode_one).collect()
}

fn decode_object(node: &serde_json::Value) -> Result<ObjectRef, GuestError> {
    match decode_one(node)? {
        Value::Object(obj) => Ok(obj),
        other => Err(GuestError::bad_data(format!("expected an object, got {}", other.tag()))),
    }
}

fn names(list: Vec<String>) -> Value {
    Value::List(list.into_iter().map(Value::String).collect())
}

fn live_class<R: ForeignRuntime>(rt: &R, obj: &ObjectRef) -> Result<String, GuestError> {
    rt.object_class(obj).ok_or_else(|| {
        GuestError::Thrown(Thrown::new(
            "Error",
            format!("no live object with handle {}", obj.hash),
        ))
    })
}

// ============================================================================
// Constants and globals
// ============================================================================

fn get_const<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let name: String = parse(data)?;
    rt.constant(&name).ok_or_else(|| {
        GuestError::Thrown(Thrown::new("Error", format!("Undefined constant \"{}\"", name)))
    })
}

fn set_const<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Named { name, value } = parse(data)?;
    rt.define_constant(&name, decode_one(&value)?)?;
    Ok(Value::Null)
}

fn list_consts<R: ForeignRuntime>(rt: &mut R, _: serde_json::Value) -> Result<Value, GuestError> {
    Ok(names(rt.constant_names()))
}

fn get_global<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let name: String = parse(data)?;
    rt.global(&name).ok_or_else(|| {
        GuestError::Thrown(Thrown::new("Error", format!("Undefined global variable ${}", name)))
    })
}

fn set_global<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Named { name, value } = parse(data)?;
    rt.set_global(&name, decode_one(&value)?);
    Ok(Value::Null)
}

fn list_globals<R: ForeignRuntime>(rt: &mut R, _: serde_json::Value) -> Result<Value, GuestError> {
    Ok(names(rt.global_names()))
}

// ============================================================================
// Functions and classes
// ============================================================================

fn call_fun<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Call { name, args } = parse(data)?;
    let args = decode_args(&args)?;
    if rt.function_info(&name).is_some() {
        return Ok(rt.call_function(&name, args)?);
    }
    match crate::helpers::lookup(&name) {
        Some(helper) => helper(rt, args),
        None => Err(GuestError::Thrown(Thrown::new(
            "Error",
            format!("Call to undefined function {}()", name),
        ))),
    }
}

fn func_info<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let name: String = parse(data)?;
    match rt.function_info(&name) {
        Some(info) => Ok(Value::from(&info)),
        None => Err(GuestError::Thrown(Thrown::new(
            "ReflectionException",
            format!("Function {}() does not exist", name),
        ))),
    }
}

fn list_funs<R: ForeignRuntime>(rt: &mut R, _: serde_json::Value) -> Result<Value, GuestError> {
    Ok(names(rt.function_names()))
}

fn class_info<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let name: String = parse(data)?;
    match rt.class_info(&name) {
        Some(info) => Ok(Value::from(&info)),
        None => Err(GuestError::Thrown(Thrown::new(
            "ReflectionException",
            format!("Class \"{}\" does not exist", name),
        ))),
    }
}

fn list_classes<R: ForeignRuntime>(rt: &mut R, _: serde_json::Value) -> Result<Value, GuestError> {
    Ok(names(rt.class_names()))
}

// ============================================================================
// Objects
// ============================================================================

fn create_object<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Call { name, args } = parse(data)?;
    let args = decode_args(&args)?;
    Ok(rt.create_object(&name, args)?)
}

fn call_method<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let MethodCall { obj, name, args } = parse(data)?;
    let args = decode_args(&args)?;
    match decode_one(&obj)? {
        Value::Object(obj) => Ok(rt.call_method(Target::Object(&obj), &name, args)?),
        Value::String(class) => Ok(rt.call_method(Target::Class(&class), &name, args)?),
        other => Err(GuestError::bad_data(format!(
            "method receiver must be an object or class name, got {}",
            other.tag()
        ))),
    }
}

fn get_property<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Member { obj, name, .. } = parse(data)?;
    let obj = decode_object(&obj)?;
    Ok(rt.get_property(&obj, &name)?)
}

fn set_property<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Member { obj, name, value } = parse(data)?;
    let obj = decode_object(&obj)?;
    rt.set_property(&obj, &name, decode_one(&value)?)?;
    Ok(Value::Null)
}

fn unset_property<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Member { obj, name, .. } = parse(data)?;
    let obj = decode_object(&obj)?;
    rt.unset_property(&obj, &name)?;
    Ok(Value::Null)
}

fn list_non_default_properties<R: ForeignRuntime>(
    rt: &mut R,
    data: serde_json::Value,
) -> Result<Value, GuestError> {
    let obj = decode_object(&data)?;
    Ok(names(rt.dynamic_properties(&obj)?))
}

fn call_obj<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Invocation { obj, args } = parse(data)?;
    let obj = decode_object(&obj)?;
    let args = decode_args(&args)?;
    Ok(rt.invoke_object(&obj, args)?)
}

// ============================================================================
// Container protocols
// ============================================================================

fn require_capability<R: ForeignRuntime>(
    rt: &R,
    obj: &ObjectRef,
    interface: &str,
    failure: impl FnOnce(&str) -> Thrown,
) -> Result<(), GuestError> {
    let class = live_class(rt, obj)?;
    if rt.is_subclass(&class, interface) {
        Ok(())
    } else {
        Err(GuestError::Thrown(failure(&class)))
    }
}

fn require_array_access<R: ForeignRuntime>(rt: &R, obj: &ObjectRef) -> Result<(), GuestError> {
    require_capability(rt, obj, "ArrayAccess", |class| {
        Thrown::new("Error", format!("Cannot use object of type {} as array", class))
    })
}

fn count<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let obj = decode_object(&data)?;
    require_capability(rt, &obj, "Countable", |class| {
        Thrown::new(
            "TypeError",
            format!("count(): Argument #1 ($value) must be of type Countable|array, {} given", class),
        )
    })?;
    Ok(rt.call_method(Target::Object(&obj), "count", Vec::new())?)
}

fn has_item<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Item { obj, offset, .. } = parse(data)?;
    let obj = decode_object(&obj)?;
    require_array_access(rt, &obj)?;
    let found = rt.call_method(Target::Object(&obj), "offsetExists", vec![decode_one(&offset)?])?;
    Ok(Value::Bool(crate::helpers::truthy(&found)))
}

fn get_item<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Item { obj, offset, .. } = parse(data)?;
    let obj = decode_object(&obj)?;
    require_array_access(rt, &obj)?;
    Ok(rt.call_method(Target::Object(&obj), "offsetGet", vec![decode_one(&offset)?])?)
}

fn set_item<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Item { obj, offset, value } = parse(data)?;
    let obj = decode_object(&obj)?;
    require_array_access(rt, &obj)?;
    let args = vec![decode_one(&offset)?, decode_one(&value)?];
    rt.call_method(Target::Object(&obj), "offsetSet", args)?;
    Ok(Value::Null)
}

fn del_item<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let Item { obj, offset, .. } = parse(data)?;
    let obj = decode_object(&obj)?;
    require_array_access(rt, &obj)?;
    rt.call_method(Target::Object(&obj), "offsetUnset", vec![decode_one(&offset)?])?;
    Ok(Value::Null)
}

// Aggregates may hand out further aggregates; give up past this depth.
const MAX_AGGREGATE_DEPTH: usize = 16;

fn start_iteration<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let mut current = decode_object(&data)?;
    for _ in 0..MAX_AGGREGATE_DEPTH {
        let class = live_class(rt, &current)?;
        if rt.is_subclass(&class, "Iterator") {
            rt.call_method(Target::Object(&current), "rewind", Vec::new())?;
            return Ok(Value::Object(current));
        }
        if !rt.is_subclass(&class, "IteratorAggregate") {
            return Err(GuestError::Thrown(Thrown::new(
                "Error",
                format!("Objects of type {} are not traversable", class),
            )));
        }
        current = match rt.call_method(Target::Object(&current), "getIterator", Vec::new())? {
            Value::Object(next) => next,
            other => {
                return Err(GuestError::Thrown(Thrown::new(
                    "TypeError",
                    format!("{}::getIterator() must return a Traversable, {} returned", class, other.tag()),
                )))
            }
        };
    }
    Err(GuestError::Thrown(Thrown::new(
        "Error",
        "iterator aggregates nested too deeply",
    )))
}

fn next_iteration<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let it = decode_object(&data)?;
    let target = Target::Object(&it);
    let valid = rt.call_method(target, "valid", Vec::new())?;
    if !crate::helpers::truthy(&valid) {
        return Ok(Value::List(vec![Value::Bool(false), Value::Null, Value::Null]));
    }
    let value = rt.call_method(target, "current", Vec::new())?;
    let key = rt.call_method(target, "key", Vec::new())?;
    rt.call_method(target, "next", Vec::new())?;
    Ok(Value::List(vec![Value::Bool(true), key, value]))
}

// ============================================================================
// Names
// ============================================================================

fn repr<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let value = decode_one(&data)?;
    Ok(Value::String(rt.repr(&value)))
}

pub(crate) const KIND_FUNC: &str = "func";
pub(crate) const KIND_CLASS: &str = "class";
pub(crate) const KIND_CONST: &str = "const";
pub(crate) const KIND_GLOBAL: &str = "global";
pub(crate) const KIND_NONE: &str = "none";

const DEFAULT_ORDER: [&str; 4] = [KIND_FUNC, KIND_CLASS, KIND_CONST, KIND_GLOBAL];

fn resolve_name<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let (name, order) = match parse(data)? {
        Resolve::Bare(name) => (name, None),
        Resolve::Query { name, kind } => (name, kind),
    };
    let order: Vec<String> = match order {
        None => DEFAULT_ORDER.iter().map(|k| k.to_string()).collect(),
        Some(Kinds::One(kind)) => vec![kind],
        Some(Kinds::Many(kinds)) => kinds,
    };

    for kind in &order {
        let found = match kind.as_str() {
            KIND_FUNC => rt.function_info(&name).map(|info| Value::String(info.name)),
            KIND_CLASS => rt.class_info(&name).map(|info| Value::String(info.name)),
            KIND_CONST => rt.constant(&name),
            KIND_GLOBAL => rt.global(&name),
            other => return Err(GuestError::bad_data(format!("unknown name kind '{}'", other))),
        };
        if let Some(content) = found {
            return Ok(Value::List(vec![Value::from(kind.as_str()), content]));
        }
    }
    Ok(Value::List(vec![Value::from(KIND_NONE), Value::Null]))
}

fn list_everything<R: ForeignRuntime>(rt: &mut R, data: serde_json::Value) -> Result<Value, GuestError> {
    let path: Option<String> = parse(data)?;
    let path = path.unwrap_or_default();
    let path = path.trim_matches('\\');
    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{}\\", path.to_ascii_lowercase())
    };

    let mut entries: Vec<String> = Vec::new();
    let all = rt
        .constant_names()
        .into_iter()
        .chain(rt.function_names())
        .chain(rt.class_names());
    for name in all {
        let name = name.trim_start_matches('\\');
        if !name.to_ascii_lowercase().starts_with(&prefix) {
            continue;
        }
        let relative = &name[prefix.len()..];
        if !relative.is_empty() && !entries.iter().any(|e| e == relative) {
            entries.push(relative.to_string());
        }
    }
    Ok(names(entries))
}
