//! Standard constants, functions and classes of the in-memory runtime.

use super::{ClassBuilder, MemoryRuntime, Native};
use crate::helpers::{to_output, truthy};
use crate::runtime::{ForeignRuntime, Target};
use ferry_wire::{FunctionInfo, ObjectRef, ParamInfo, ResourceRef, Thrown, TypeInfo, Value};

pub(super) fn install(rt: &mut MemoryRuntime) {
    install_constants(rt);
    install_interfaces(rt);
    install_throwables(rt);
    install_arrays(rt);
    rt.define_class(ClassBuilder::new("stdClass"));
    install_functions(rt);
}

fn install_constants(rt: &mut MemoryRuntime) {
    let constants = [
        ("PHP_VERSION", Value::from("8.3.0")),
        ("PHP_EOL", Value::from("\n")),
        ("PHP_INT_MAX", Value::Int(i64::MAX)),
        ("PHP_INT_MIN", Value::Int(i64::MIN)),
        ("PHP_INT_SIZE", Value::Int(8)),
        ("PHP_FLOAT_EPSILON", Value::Double(f64::EPSILON)),
        ("M_PI", Value::Double(std::f64::consts::PI)),
        ("INF", Value::Double(f64::INFINITY)),
        ("NAN", Value::Double(f64::NAN)),
    ];
    for (name, value) in constants {
        // Fresh runtime: nothing is defined yet
        let _ = rt.define_constant(name, value);
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Type name as the runtime spells it in error messages.
pub(super) fn type_name(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(_) => "bool".to_string(),
        Value::Int(_) => "int".to_string(),
        Value::Double(_) => "float".to_string(),
        Value::String(_) => "string".to_string(),
        Value::List(_) | Value::Map(_) => "array".to_string(),
        Value::Object(obj) => obj.class.clone(),
        Value::Resource(_) => "resource".to_string(),
    }
}

fn type_error(rt: &mut MemoryRuntime, func: &str, index: usize, param: &str, expected: &str, got: &Value) -> Thrown {
    rt.throw(
        "TypeError",
        format!(
            "{}(): Argument #{} (${}) must be of type {}, {} given",
            func,
            index + 1,
            param,
            expected,
            type_name(got)
        ),
    )
}

fn string_arg(rt: &mut MemoryRuntime, func: &str, args: &[Value], index: usize, param: &str) -> Result<String, Thrown> {
    match args.get(index) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(type_error(rt, func, index, param, "string", other)),
        None => Err(type_error(rt, func, index, param, "string", &Value::Null)),
    }
}

fn int_arg(rt: &mut MemoryRuntime, func: &str, args: &[Value], index: usize, param: &str) -> Result<i64, Thrown> {
    match args.get(index) {
        Some(Value::Int(n)) => Ok(*n),
        Some(other) => Err(type_error(rt, func, index, param, "int", other)),
        None => Err(type_error(rt, func, index, param, "int", &Value::Null)),
    }
}

fn object_arg(rt: &mut MemoryRuntime, func: &str, args: &[Value], index: usize, param: &str) -> Result<ObjectRef, Thrown> {
    match args.get(index) {
        Some(Value::Object(obj)) => Ok(obj.clone()),
        Some(other) => Err(type_error(rt, func, index, param, "object", other)),
        None => Err(type_error(rt, func, index, param, "object", &Value::Null)),
    }
}

fn resource_arg(rt: &mut MemoryRuntime, func: &str, args: &[Value], index: usize) -> Result<ResourceRef, Thrown> {
    match args.get(index) {
        Some(Value::Resource(res)) => Ok(res.clone()),
        Some(other) => Err(type_error(rt, func, index, "stream", "resource", other)),
        None => Err(type_error(rt, func, index, "stream", "resource", &Value::Null)),
    }
}

fn this(rt: &mut MemoryRuntime, this: Option<&ObjectRef>) -> Result<ObjectRef, Thrown> {
    match this {
        Some(obj) => Ok(obj.clone()),
        None => Err(rt.throw("Error", "Using $this when not in object context")),
    }
}

fn arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}

fn string(name: &str) -> ParamInfo {
    ParamInfo::required(name).typed(TypeInfo::builtin("string"))
}

fn int(name: &str) -> ParamInfo {
    ParamInfo::required(name).typed(TypeInfo::builtin("int"))
}

fn returns(name: &str, params: Vec<ParamInfo>, ty: &str) -> FunctionInfo {
    FunctionInfo::new(name, params).returns(TypeInfo::builtin(ty))
}

// ============================================================================
// Interfaces
// ============================================================================

fn install_interfaces(rt: &mut MemoryRuntime) {
    let offset = || ParamInfo::required("offset").typed(TypeInfo::builtin("mixed"));
    rt.define_class(ClassBuilder::interface("Traversable").doc("/** Objects usable in foreach. */"))
        .define_class(
            ClassBuilder::interface("Iterator")
                .implements("Traversable")
                .abstract_method("current", vec![])
                .abstract_method("key", vec![])
                .abstract_method("next", vec![])
                .abstract_method("rewind", vec![])
                .abstract_method("valid", vec![]),
        )
        .define_class(
            ClassBuilder::interface("IteratorAggregate")
                .implements("Traversable")
                .abstract_method("getIterator", vec![]),
        )
        .define_class(
            ClassBuilder::interface("ArrayAccess")
                .abstract_method("offsetExists", vec![offset()])
                .abstract_method("offsetGet", vec![offset()])
                .abstract_method("offsetSet", vec![offset(), ParamInfo::required("value")])
                .abstract_method("offsetUnset", vec![offset()]),
        )
        .define_class(ClassBuilder::interface("Countable").abstract_method("count", vec![]))
        .define_class(ClassBuilder::interface("Stringable").abstract_method("__toString", vec![]))
        .define_class(
            ClassBuilder::interface("Throwable")
                .implements("Stringable")
                .abstract_method("getMessage", vec![])
                .abstract_method("getCode", vec![])
                .abstract_method("getPrevious", vec![]),
        );
}

// ============================================================================
// Exceptions and errors
// ============================================================================

fn throwable_base(name: &str) -> ClassBuilder {
    ClassBuilder::new(name)
        .implements("Throwable")
        .property("message", "")
        .property("code", 0)
        .property("previous", Value::Null)
        .method(
            "__construct",
            vec![
                ParamInfo::optional("message", ""),
                ParamInfo::optional("code", 0),
                ParamInfo::optional("previous", Value::Null),
            ],
            throwable_construct,
        )
        .method("getMessage", vec![], |rt, this, _| property_of(rt, this, "message"))
        .method("getCode", vec![], |rt, this, _| property_of(rt, this, "code"))
        .method("getPrevious", vec![], |rt, this, _| property_of(rt, this, "previous"))
        .method("__toString", vec![], throwable_to_string)
}

fn throwable_construct(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, args: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    rt.set_property(&obj, "message", arg(&args, 0))?;
    rt.set_property(&obj, "code", arg(&args, 1))?;
    rt.set_property(&obj, "previous", arg(&args, 2))?;
    Ok(Value::Null)
}

fn throwable_to_string(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let message = rt.get_property(&obj, "message")?;
    let class = rt.object_class(&obj).unwrap_or_else(|| obj.class.clone());
    Ok(Value::from(format!("{}: {}", class, to_output(&message)?)))
}

fn property_of(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, name: &str) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    rt.get_property(&obj, name)
}

fn install_throwables(rt: &mut MemoryRuntime) {
    rt.define_class(throwable_base("Exception").doc("/** Base class for user exceptions. */"))
        .define_class(throwable_base("Error").doc("/** Base class for internal errors. */"));

    let hierarchy = [
        ("ErrorException", "Exception"),
        ("LogicException", "Exception"),
        ("BadFunctionCallException", "LogicException"),
        ("BadMethodCallException", "BadFunctionCallException"),
        ("DomainException", "LogicException"),
        ("InvalidArgumentException", "LogicException"),
        ("LengthException", "LogicException"),
        ("OutOfRangeException", "LogicException"),
        ("RuntimeException", "Exception"),
        ("OutOfBoundsException", "RuntimeException"),
        ("OverflowException", "RuntimeException"),
        ("RangeException", "RuntimeException"),
        ("UnderflowException", "RuntimeException"),
        ("UnexpectedValueException", "RuntimeException"),
        ("JsonException", "Exception"),
        ("ReflectionException", "Exception"),
        ("CompileError", "Error"),
        ("ParseError", "CompileError"),
        ("TypeError", "Error"),
        ("ArgumentCountError", "TypeError"),
        ("ValueError", "Error"),
        ("ArithmeticError", "Error"),
        ("DivisionByZeroError", "ArithmeticError"),
        ("AssertionError", "Error"),
        ("UnhandledMatchError", "Error"),
    ];
    for (class, parent) in hierarchy {
        rt.define_class(ClassBuilder::new(class).extends(parent));
    }
}

// ============================================================================
// ArrayObject and ArrayIterator
// ============================================================================

fn install_arrays(rt: &mut MemoryRuntime) {
    let optional_array = || ParamInfo::optional("array", Value::List(Vec::new()));
    let offset = || ParamInfo::required("key");

    let with_storage = |builder: ClassBuilder| {
        builder
            .implements("ArrayAccess")
            .implements("Countable")
            .method("__construct", vec![optional_array()], array_construct)
            .method("offsetExists", vec![offset()], offset_exists)
            .method("offsetGet", vec![offset()], offset_get)
            .method("offsetSet", vec![offset(), ParamInfo::required("value")], offset_set)
            .method("offsetUnset", vec![offset()], offset_unset)
            .method("count", vec![], array_count)
            .method("getArrayCopy", vec![], array_copy)
    };

    rt.define_class(
        with_storage(ClassBuilder::new("ArrayObject").implements("IteratorAggregate"))
            .doc("/** Allows objects to work as arrays. */")
            .method("getIterator", vec![], array_get_iterator),
    );
    rt.define_class(
        with_storage(ClassBuilder::new("ArrayIterator").implements("Iterator"))
            .method("current", vec![], iterator_current)
            .method("key", vec![], iterator_key)
            .method("next", vec![], iterator_next)
            .method("rewind", vec![], iterator_rewind)
            .method("valid", vec![], iterator_valid),
    );
}

/// Array keys are integers or strings; canonical integer strings become
/// integers.
fn array_key(rt: &mut MemoryRuntime, key: Value) -> Result<Value, Thrown> {
    match key {
        Value::Int(n) => Ok(Value::Int(n)),
        Value::String(s) => match s.parse::<i64>() {
            Ok(n) if n.to_string() == s => Ok(Value::Int(n)),
            _ => Ok(Value::String(s)),
        },
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Double(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
        Value::Null => Ok(Value::String(String::new())),
        other => Err(rt.throw("TypeError", format!("Illegal offset type {}", type_name(&other)))),
    }
}

fn array_entries(rt: &mut MemoryRuntime, value: Value) -> Result<Vec<(Value, Value)>, Thrown> {
    match value {
        Value::List(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Value::Int(i as i64), v))
            .collect()),
        Value::Map(entries) => {
            let mut out = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                out.push((array_key(rt, Value::String(k))?, v));
            }
            Ok(out)
        }
        other => Err(rt.throw(
            "TypeError",
            format!("Argument #1 ($array) must be of type array, {} given", type_name(&other)),
        )),
    }
}

/// Sequential integer keys from zero come back as a list, anything else as
/// a map.
pub(super) fn entries_to_value(entries: &[(Value, Value)]) -> Value {
    let sequential = entries
        .iter()
        .enumerate()
        .all(|(i, (k, _))| *k == Value::Int(i as i64));
    if sequential {
        return Value::List(entries.iter().map(|(_, v)| v.clone()).collect());
    }
    Value::Map(
        entries
            .iter()
            .map(|(k, v)| {
                let key = match k {
                    Value::Int(n) => n.to_string(),
                    Value::String(s) => s.clone(),
                    other => type_name(other),
                };
                (key, v.clone())
            })
            .collect(),
    )
}

fn storage<'a>(
    rt: &'a mut MemoryRuntime,
    obj: &ObjectRef,
) -> Result<(&'a mut Vec<(Value, Value)>, &'a mut usize), Thrown> {
    let Some(native) = rt.native_mut(obj) else {
        return Err(super::no_such_object(obj));
    };
    // Subclasses may skip the parent constructor
    if *native == Native::None {
        *native = Native::Array {
            entries: Vec::new(),
            cursor: 0,
        };
    }
    match native {
        Native::Array { entries, cursor } => Ok((entries, cursor)),
        Native::None => Err(Thrown::new("Error", "object has no array storage")),
    }
}

fn array_construct(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, args: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let entries = array_entries(rt, arg(&args, 0))?;
    rt.set_native(&obj, Native::Array { entries, cursor: 0 })?;
    Ok(Value::Null)
}

fn offset_exists(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, args: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let key = array_key(rt, arg(&args, 0))?;
    let (entries, _) = storage(rt, &obj)?;
    Ok(Value::Bool(entries.iter().any(|(k, _)| *k == key)))
}

fn offset_get(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, args: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let key = array_key(rt, arg(&args, 0))?;
    let (entries, _) = storage(rt, &obj)?;
    Ok(entries
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.clone())
        .unwrap_or(Value::Null))
}

fn offset_set(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, args: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let value = arg(&args, 1);
    let key = match arg(&args, 0) {
        // `$a[] = v` appends
        Value::Null => None,
        other => Some(array_key(rt, other)?),
    };
    let (entries, _) = storage(rt, &obj)?;
    let key = key.unwrap_or_else(|| {
        let next = entries
            .iter()
            .filter_map(|(k, _)| k.as_int())
            .max()
            .map_or(0, |n| n + 1);
        Value::Int(next)
    });
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
    Ok(Value::Null)
}

fn offset_unset(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, args: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let key = array_key(rt, arg(&args, 0))?;
    let (entries, cursor) = storage(rt, &obj)?;
    if let Some(index) = entries.iter().position(|(k, _)| *k == key) {
        entries.remove(index);
        if index < *cursor {
            *cursor -= 1;
        }
    }
    Ok(Value::Null)
}

fn array_count(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (entries, _) = storage(rt, &obj)?;
    Ok(Value::Int(entries.len() as i64))
}

fn array_copy(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (entries, _) = storage(rt, &obj)?;
    Ok(entries_to_value(entries))
}

fn array_get_iterator(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (entries, _) = storage(rt, &obj)?;
    let copy = entries_to_value(entries);
    rt.create_object("ArrayIterator", vec![copy])
}

fn iterator_current(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (entries, cursor) = storage(rt, &obj)?;
    Ok(entries.get(*cursor).map(|(_, v)| v.clone()).unwrap_or(Value::Null))
}

fn iterator_key(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (entries, cursor) = storage(rt, &obj)?;
    Ok(entries.get(*cursor).map(|(k, _)| k.clone()).unwrap_or(Value::Null))
}

fn iterator_next(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (entries, cursor) = storage(rt, &obj)?;
    if *cursor < entries.len() {
        *cursor += 1;
    }
    Ok(Value::Null)
}

fn iterator_rewind(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (_, cursor) = storage(rt, &obj)?;
    *cursor = 0;
    Ok(Value::Null)
}

fn iterator_valid(rt: &mut MemoryRuntime, this_obj: Option<&ObjectRef>, _: Vec<Value>) -> Result<Value, Thrown> {
    let obj = this(rt, this_obj)?;
    let (entries, cursor) = storage(rt, &obj)?;
    Ok(Value::Bool(*cursor < entries.len()))
}

// ============================================================================
// Functions
// ============================================================================

fn install_functions(rt: &mut MemoryRuntime) {
    rt.define_function(returns("strtoupper", vec![string("string")], "string"), |rt, args| {
        Ok(Value::from(string_arg(rt, "strtoupper", &args, 0, "string")?.to_uppercase()))
    })
    .define_function(returns("strtolower", vec![string("string")], "string"), |rt, args| {
        Ok(Value::from(string_arg(rt, "strtolower", &args, 0, "string")?.to_lowercase()))
    })
    .define_function(returns("strlen", vec![string("string")], "int"), |rt, args| {
        Ok(Value::Int(string_arg(rt, "strlen", &args, 0, "string")?.len() as i64))
    })
    .define_function(
        returns("str_repeat", vec![string("string"), int("times")], "string"),
        str_repeat,
    )
    .define_function(
        returns("implode", vec![string("separator"), ParamInfo::required("array")], "string"),
        implode,
    )
    .define_function(returns("intdiv", vec![int("num1"), int("num2")], "int"), intdiv)
    .define_function(
        returns("count", vec![ParamInfo::required("value"), ParamInfo::optional("mode", 0)], "int"),
        count,
    )
    .define_function(
        returns("define", vec![string("constant_name"), ParamInfo::required("value")], "bool"),
        |rt, args| {
            let name = string_arg(rt, "define", &args, 0, "constant_name")?;
            if rt.constant(&name).is_some() {
                return Ok(Value::Bool(false));
            }
            rt.define_constant(&name, arg(&args, 1))?;
            Ok(Value::Bool(true))
        },
    )
    .define_function(returns("defined", vec![string("constant_name")], "bool"), |rt, args| {
        let name = string_arg(rt, "defined", &args, 0, "constant_name")?;
        Ok(Value::Bool(rt.constant(&name).is_some()))
    })
    .define_function(FunctionInfo::new("constant", vec![string("name")]), |rt, args| {
        let name = string_arg(rt, "constant", &args, 0, "name")?;
        match rt.constant(&name) {
            Some(value) => Ok(value),
            None => Err(rt.throw("Error", format!("Undefined constant \"{}\"", name))),
        }
    })
    .define_function(
        returns("get_class", vec![ParamInfo::required("object").typed(TypeInfo::builtin("object"))], "string"),
        |rt, args| {
            let obj = object_arg(rt, "get_class", &args, 0, "object")?;
            Ok(Value::from(rt.object_class(&obj).unwrap_or(obj.class)))
        },
    )
    .define_function(
        returns("assert", vec![ParamInfo::required("assertion"), ParamInfo::optional("description", Value::Null)], "bool"),
        |rt, args| {
            if truthy(&arg(&args, 0)) {
                return Ok(Value::Bool(true));
            }
            let message = match arg(&args, 1) {
                Value::String(s) => s,
                _ => "assert(false)".to_string(),
            };
            Err(rt.throw("AssertionError", message))
        },
    )
    .define_function(
        FunctionInfo::new(
            "json_decode",
            vec![string("json"), ParamInfo::optional("associative", Value::Bool(true))],
        )
        .with_doc("/** Decodes a JSON string. Throws JsonException on malformed input. */"),
        json_decode,
    )
    .define_function(returns("json_encode", vec![ParamInfo::required("value")], "string"), json_encode)
    .define_function(
        returns("iterator_to_array", vec![ParamInfo::required("iterator").typed(TypeInfo::class("Traversable"))], "array"),
        iterator_to_array,
    )
    .define_function(FunctionInfo::new("tmpfile", vec![]), |rt, _| {
        Ok(Value::Resource(rt.open_resource("stream")))
    })
    .define_function(
        returns("fwrite", vec![ParamInfo::required("stream"), string("data")], "int"),
        |rt, args| {
            let res = resource_arg(rt, "fwrite", &args, 0)?;
            let data = string_arg(rt, "fwrite", &args, 1, "data")?;
            rt.resource_mut(&res)?.buffer.push_str(&data);
            Ok(Value::Int(data.len() as i64))
        },
    )
    .define_function(
        returns("stream_get_contents", vec![ParamInfo::required("stream")], "string"),
        |rt, args| {
            let res = resource_arg(rt, "stream_get_contents", &args, 0)?;
            Ok(Value::from(rt.resource_mut(&res)?.buffer.clone()))
        },
    )
    .define_function(returns("fclose", vec![ParamInfo::required("stream")], "bool"), |rt, args| {
        let res = resource_arg(rt, "fclose", &args, 0)?;
        rt.resource_mut(&res)?.open = false;
        Ok(Value::Bool(true))
    })
    .define_function(
        returns("get_resource_type", vec![ParamInfo::required("resource")], "string"),
        |rt, args| {
            let res = resource_arg(rt, "get_resource_type", &args, 0)?;
            let state = rt.resources.get(&res.hash).map(|s| (s.open, s.kind.clone()));
            match state {
                Some((true, kind)) => Ok(Value::from(kind)),
                Some((false, _)) => Ok(Value::from("Unknown")),
                None => Err(rt.throw("Error", format!("no live resource with handle {}", res.hash))),
            }
        },
    );
}

fn str_repeat(rt: &mut MemoryRuntime, args: Vec<Value>) -> Result<Value, Thrown> {
    let text = string_arg(rt, "str_repeat", &args, 0, "string")?;
    let times = int_arg(rt, "str_repeat", &args, 1, "times")?;
    let Ok(times) = usize::try_from(times) else {
        return Err(rt.throw(
            "ValueError",
            "str_repeat(): Argument #2 ($times) must be greater than or equal to 0",
        ));
    };
    Ok(Value::from(text.repeat(times)))
}

fn implode(rt: &mut MemoryRuntime, args: Vec<Value>) -> Result<Value, Thrown> {
    let separator = string_arg(rt, "implode", &args, 0, "separator")?;
    let items = match arg(&args, 1) {
        Value::List(items) => items,
        Value::Map(entries) => entries.into_iter().map(|(_, v)| v).collect(),
        other => return Err(type_error(rt, "implode", 1, "array", "array", &other)),
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in &items {
        parts.push(to_output(item)?);
    }
    Ok(Value::from(parts.join(&separator)))
}

fn intdiv(rt: &mut MemoryRuntime, args: Vec<Value>) -> Result<Value, Thrown> {
    let num1 = int_arg(rt, "intdiv", &args, 0, "num1")?;
    let num2 = int_arg(rt, "intdiv", &args, 1, "num2")?;
    if num2 == 0 {
        return Err(rt.throw("DivisionByZeroError", "Division by zero"));
    }
    match num1.checked_div(num2) {
        Some(q) => Ok(Value::Int(q)),
        None => Err(rt.throw("ArithmeticError", "Division of PHP_INT_MIN by -1 is not an integer")),
    }
}

fn count(rt: &mut MemoryRuntime, args: Vec<Value>) -> Result<Value, Thrown> {
    match arg(&args, 0) {
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(entries) => Ok(Value::Int(entries.len() as i64)),
        Value::Object(obj) if rt.is_instance_of(&obj, "Countable") => {
            rt.call_method(Target::Object(&obj), "count", Vec::new())
        }
        other => Err(type_error(rt, "count", 0, "value", "Countable|array", &other)),
    }
}

fn json_decode(rt: &mut MemoryRuntime, args: Vec<Value>) -> Result<Value, Thrown> {
    let text = string_arg(rt, "json_decode", &args, 0, "json")?;
    let parsed: serde_json::Value = match serde_json::from_str(&text) {
        Ok(parsed) => parsed,
        Err(err) => return Err(rt.throw("JsonException", format!("Syntax error: {}", err))),
    };
    ferry_wire::to_value(&parsed).map_err(|err| rt.throw("JsonException", err.reason))
}

fn json_encode(rt: &mut MemoryRuntime, args: Vec<Value>) -> Result<Value, Thrown> {
    let value = arg(&args, 0);
    let plain: serde_json::Value = match ferry_wire::from_value(value) {
        Ok(plain) => plain,
        Err(err) => return Err(rt.throw("JsonException", format!("Type is not supported: {}", err))),
    };
    Ok(Value::from(plain.to_string()))
}

fn iterator_to_array(rt: &mut MemoryRuntime, args: Vec<Value>) -> Result<Value, Thrown> {
    let mut it = object_arg(rt, "iterator_to_array", &args, 0, "iterator")?;
    while !rt.is_instance_of(&it, "Iterator") {
        if !rt.is_instance_of(&it, "IteratorAggregate") {
            let got = Value::Object(it);
            return Err(type_error(rt, "iterator_to_array", 0, "iterator", "Traversable|array", &got));
        }
        it = match rt.call_method(Target::Object(&it), "getIterator", Vec::new())? {
            Value::Object(next) => next,
            other => {
                return Err(rt.throw(
                    "TypeError",
                    format!("getIterator() must return a Traversable, {} returned", type_name(&other)),
                ))
            }
        };
    }

    let target = Target::Object(&it);
    let mut entries: Vec<(Value, Value)> = Vec::new();
    let step = |rt: &mut MemoryRuntime, name: &str| rt.call_method(target, name, Vec::new());
    step(rt, "rewind")?;
    while truthy(&step(rt, "valid")?) {
        let value = step(rt, "current")?;
        let raw_key = step(rt, "key")?;
        let key = array_key(rt, raw_key)?;
        match entries.iter_mut().find(|entry| entry.0 == key) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
        step(rt, "next")?;
    }
    Ok(entries_to_value(&entries))
}
