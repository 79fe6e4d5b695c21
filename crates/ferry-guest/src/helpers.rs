//! Proxy helpers
//!
//! Language constructs that look like functions to the host but that the
//! foreign runtime cannot reflect on. `callFun` falls back to these when no
//! real function of that name exists.

use crate::{ForeignRuntime, GuestError};
use ferry_wire::{Thrown, Value};

pub(crate) type Helper<R> = fn(&mut R, Vec<Value>) -> Result<Value, GuestError>;

pub(crate) fn lookup<R: ForeignRuntime>(name: &str) -> Option<Helper<R>> {
    let helper: Helper<R> = match name.to_ascii_lowercase().as_str() {
        "echo" => echo::<R>,
        "print" => print::<R>,
        "require" => require::<R>,
        "require_once" => require_once::<R>,
        "include" => include::<R>,
        "include_once" => include_once::<R>,
        "instanceof" => instance_of::<R>,
        _ => return None,
    };
    Some(helper)
}

/// Truthiness of a value in the foreign runtime's terms.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Int(n) => *n != 0,
        Value::Double(x) => *x != 0.0,
        Value::String(s) => !s.is_empty() && s != "0",
        Value::List(items) => !items.is_empty(),
        Value::Map(entries) => !entries.is_empty(),
        Value::Object(_) | Value::Resource(_) => true,
    }
}

/// String conversion used for program output.
pub fn to_output(value: &Value) -> Result<String, Thrown> {
    Ok(match value {
        Value::Null | Value::Bool(false) => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Double(x) => format_double(*x),
        Value::String(s) => s.clone(),
        Value::List(_) | Value::Map(_) => "Array".to_string(),
        Value::Resource(res) => format!("Resource id #{}", res.hash),
        Value::Object(obj) => {
            return Err(Thrown::new(
                "Error",
                format!("Object of class {} could not be converted to string", obj.class),
            ))
        }
    })
}

pub fn format_double(x: f64) -> String {
    if x.is_nan() {
        "NAN".to_string()
    } else if x.is_infinite() {
        (if x > 0.0 { "INF" } else { "-INF" }).to_string()
    } else if x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{}", x as i64)
    } else {
        format!("{}", x)
    }
}

fn echo<R: ForeignRuntime>(rt: &mut R, args: Vec<Value>) -> Result<Value, GuestError> {
    for arg in &args {
        let text = to_output(arg)?;
        rt.write_output(&text);
    }
    Ok(Value::Null)
}

fn print<R: ForeignRuntime>(rt: &mut R, args: Vec<Value>) -> Result<Value, GuestError> {
    let [arg] = <[Value; 1]>::try_from(args)
        .map_err(|args| GuestError::bad_data(format!("print takes exactly 1 argument, {} given", args.len())))?;
    let text = to_output(&arg)?;
    rt.write_output(&text);
    Ok(Value::Int(1))
}

fn require<R: ForeignRuntime>(rt: &mut R, args: Vec<Value>) -> Result<Value, GuestError> {
    load(rt, args, "require", false, true)
}

fn require_once<R: ForeignRuntime>(rt: &mut R, args: Vec<Value>) -> Result<Value, GuestError> {
    load(rt, args, "require_once", true, true)
}

fn include<R: ForeignRuntime>(rt: &mut R, args: Vec<Value>) -> Result<Value, GuestError> {
    load(rt, args, "include", false, false)
}

fn include_once<R: ForeignRuntime>(rt: &mut R, args: Vec<Value>) -> Result<Value, GuestError> {
    load(rt, args, "include_once", true, false)
}

fn load<R: ForeignRuntime>(
    rt: &mut R,
    args: Vec<Value>,
    construct: &str,
    once: bool,
    required: bool,
) -> Result<Value, GuestError> {
    match args.as_slice() {
        [Value::String(path)] => Ok(rt.include(path, once, required)?),
        _ => Err(GuestError::bad_data(format!("{} takes a single path", construct))),
    }
}

fn instance_of<R: ForeignRuntime>(rt: &mut R, args: Vec<Value>) -> Result<Value, GuestError> {
    match args.as_slice() {
        [Value::Object(obj), Value::String(class)] => Ok(Value::Bool(rt.is_instance_of(obj, class))),
        [Value::Object(obj), Value::Object(other)] => {
            let class = rt.object_class(other).unwrap_or_else(|| other.class.clone());
            Ok(Value::Bool(rt.is_instance_of(obj, &class)))
        }
        // Only objects are ever instances
        [_, Value::String(_)] | [_, Value::Object(_)] => Ok(Value::Bool(false)),
        _ => Err(GuestError::bad_data("instanceof takes a value and a class name")),
    }
}
