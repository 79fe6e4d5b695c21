//! End-to-end tests through an in-process dispatcher

use ferry::{Bridge, Error, ErrorKind, Kind, Value};
use ferry_guest::memory::MemoryRuntime;
use ferry_guest::ForeignRuntime;
use ferry_wire::{FunctionInfo, ParamInfo};

fn bridge() -> Bridge {
    Bridge::in_process(MemoryRuntime::new()).expect("bridge")
}

#[test]
fn test_undefined_constant_then_defined() {
    let bridge = bridge();

    let err = bridge.constant("FOO").expect_err("undefined");
    let foreign = err.as_foreign().expect("foreign error");
    assert!(foreign.message.contains("FOO"), "{}", foreign.message);

    bridge.set_constant("FOO", 42).expect("define");
    assert_eq!(bridge.constant("FOO").expect("defined"), Value::Int(42));
    assert!(bridge.constants().expect("list").iter().any(|c| c == "FOO"));
}

#[test]
fn test_null_constant_is_not_undefined() {
    let bridge = bridge();
    bridge.set_constant("NOTHING", Value::Null).expect("define");
    assert_eq!(bridge.constant("NOTHING").expect("defined"), Value::Null);
    assert!(bridge.constant("MISSING").is_err());
}

#[test]
fn test_call_function_by_name() {
    let bridge = bridge();
    let upper = bridge
        .function("strtoupper")
        .expect("resolve")
        .call(vec!["hi".into()])
        .expect("call");
    assert_eq!(upper, Value::from("HI"));

    // Leading separator names the same descriptor
    let a = bridge.function("\\strtoupper").expect("resolve");
    let b = bridge.function("strtoupper").expect("resolve");
    assert_eq!(a, b);
}

#[test]
fn test_unknown_function() {
    let bridge = bridge();
    match bridge.function("no_such_fn") {
        Err(Error::NotFound { kind, name }) => {
            assert_eq!(kind, "function");
            assert_eq!(name, "no_such_fn");
        }
        other => panic!("expected NotFound, got {:?}", other),
    }

    let err = bridge.call("no_such_fn", vec![]).expect_err("undefined");
    let foreign = err.into_foreign().expect("foreign");
    assert!(foreign.message.contains("no_such_fn"));
}

#[test]
fn test_arguments_arrive_in_order() {
    let mut runtime = MemoryRuntime::new();
    runtime.define_function(FunctionInfo::new("collect", vec![ParamInfo::variadic("items")]), |_, args| {
        Ok(ferry_wire::Value::List(args))
    });
    let bridge = Bridge::in_process(runtime).expect("bridge");

    let args: Vec<Value> = (0..5).map(Value::Int).collect();
    let result = bridge.function("collect").expect("resolve").call(args.clone()).expect("call");
    assert_eq!(result, Value::List(args));
}

#[test]
fn test_foreign_error_keeps_class_and_hierarchy() {
    let bridge = bridge();
    let err = bridge
        .function("intdiv")
        .expect("resolve")
        .call(vec![1.into(), 0.into()])
        .expect_err("division by zero");
    assert!(!err.is_fatal());

    let foreign = err.into_foreign().expect("foreign");
    assert_eq!(foreign.class, "DivisionByZeroError");
    assert_eq!(foreign.message, "Division by zero");
    assert!(foreign.is_a("ArithmeticError"));
    assert!(foreign.is_a("Throwable"));
    assert!(!foreign.is_a("Exception"));
    assert_eq!(foreign.kind(), ErrorKind::Arithmetic);

    // The thrown object itself stays usable
    let thrown = foreign.object.expect("thrown object");
    assert_eq!(thrown.call("getMessage", vec![]).expect("call"), Value::from("Division by zero"));
    assert!(thrown.is_instance_of("Error").expect("class"));

    // The bridge keeps working afterwards
    assert_eq!(
        bridge.call("strlen", vec!["four".into()]).expect("call"),
        Value::Int(4)
    );
}

#[test]
fn test_error_kinds_follow_base_classes() {
    let bridge = bridge();
    let parse = bridge
        .call("json_decode", vec!["{".into()])
        .expect_err("syntax")
        .into_foreign()
        .expect("foreign");
    assert_eq!(parse.class, "JsonException");
    assert_eq!(parse.kind(), ErrorKind::Parse);

    let arity = bridge
        .call("intdiv", vec![1.into()])
        .expect_err("too few")
        .into_foreign()
        .expect("foreign");
    assert_eq!(arity.class, "ArgumentCountError");
    assert_eq!(arity.kind(), ErrorKind::Type);
}

#[test]
fn test_globals_round_trip() {
    let bridge = bridge();
    bridge.set_global("answer", 42).expect("set");
    assert_eq!(bridge.global("answer").expect("get"), Value::Int(42));
    assert!(bridge.globals().expect("list").contains(&"answer".to_string()));
    assert!(bridge.global("question").is_err());
}

#[test]
fn test_nested_data_round_trips() {
    let bridge = bridge();
    let data = Value::map([
        ("name", Value::from("ferry")),
        ("ratio", Value::Double(2.0)),
        ("tags", Value::from(vec!["a", "b"])),
        ("none", Value::Null),
    ]);
    bridge.set_global("data", data.clone()).expect("set");
    assert_eq!(bridge.global("data").expect("get"), data);
}

#[test]
fn test_resolve_uses_precedence_unless_kind_given() {
    let mut runtime = MemoryRuntime::new();
    runtime.define_constant("strlen", ferry_wire::Value::Int(7)).expect("define");
    let bridge = Bridge::in_process(runtime).expect("bridge");

    match bridge.resolve("strlen", None).expect("resolve") {
        Value::Function(f) => assert_eq!(f.name(), "strlen"),
        other => panic!("expected function, got {:?}", other),
    }
    assert_eq!(bridge.resolve("strlen", Some(Kind::Constant)).expect("const"), Value::Int(7));
    assert!(matches!(
        bridge.resolve("nothing_here", None),
        Err(Error::NotFound { .. })
    ));
}
