use ferry_guest::memory::{ClassBuilder, MemoryRuntime};
use ferry_guest::{Dispatcher, ForeignRuntime};
use ferry_wire::{FunctionInfo, LineTransport, ParamInfo, Value};
use serde_json::{json, Value as Json};
use std::io::Cursor;

fn dispatcher() -> Dispatcher<MemoryRuntime> {
    Dispatcher::new(MemoryRuntime::new())
}

fn send(d: &mut Dispatcher<MemoryRuntime>, frame: Json) -> Json {
    d.handle_frame(&frame.to_string()).into_json()
}

fn object_of(response: &Json) -> Json {
    assert_eq!(response["type"], "object", "{}", response);
    response.clone()
}

#[test]
fn test_undefined_then_defined_constant() {
    let mut d = dispatcher();

    let response = send(&mut d, json!({"cmd": "getConst", "data": "FOO"}));
    assert_eq!(response["type"], "thrownException");
    assert!(response["value"]["message"].as_str().expect("message").contains("FOO"));

    let response = send(
        &mut d,
        json!({"cmd": "setConst", "data": {"name": "FOO", "value": {"type": "integer", "value": 42}}}),
    );
    assert_eq!(response, json!({"type": "NULL", "value": null}));

    let response = send(&mut d, json!({"cmd": "getConst", "data": "FOO"}));
    assert_eq!(response, json!({"type": "integer", "value": 42}));
}

#[test]
fn test_calls_a_function_by_name() {
    let mut d = dispatcher();
    let response = send(
        &mut d,
        json!({"cmd": "callFun", "data": {"name": "strtoupper", "args": [{"type": "string", "value": "hi"}]}}),
    );
    assert_eq!(response, json!({"type": "string", "value": "HI"}));
}

#[test]
fn test_unknown_function_error_names_it() {
    let mut d = dispatcher();
    let response = send(&mut d, json!({"cmd": "callFun", "data": {"name": "no_such_fn", "args": []}}));
    assert_eq!(response["type"], "thrownException");
    assert_eq!(response["value"]["type"], "Error");
    assert!(response["value"]["message"].as_str().expect("message").contains("no_such_fn"));
}

#[test]
fn test_arguments_arrive_in_order() {
    let mut rt = MemoryRuntime::new();
    rt.define_function(FunctionInfo::new("collect", vec![ParamInfo::variadic("items")]), |_, args| {
        Ok(Value::List(args))
    });
    let mut d = Dispatcher::new(rt);

    let args: Vec<Json> = (0..5).map(|i| json!({"type": "integer", "value": i})).collect();
    let response = send(&mut d, json!({"cmd": "callFun", "data": {"name": "collect", "args": args}}));
    let items: Vec<i64> = response["value"]
        .as_array()
        .expect("list")
        .iter()
        .map(|item| item["value"].as_i64().expect("int"))
        .collect();
    assert_eq!(items, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_infrastructure_faults_are_not_thrown_exceptions() {
    let mut d = dispatcher();

    let response = send(&mut d, json!({"cmd": "frobnicate", "data": null}));
    assert_eq!(response["type"], "protocolError");
    assert_eq!(response["value"]["kind"], "unknownCommand");
    assert_eq!(response["value"]["command"], "frobnicate");

    let response = d.handle_frame("{not json").into_json();
    assert_eq!(response["type"], "protocolError");
    assert_eq!(response["value"]["kind"], "malformedFrame");
}

#[test]
fn test_bad_command_data_is_reported_and_survived() {
    let mut d = dispatcher();
    let response = send(&mut d, json!({"cmd": "getConst", "data": {"oops": true}}));
    assert_eq!(response["type"], "thrownException");
    assert!(response["value"]["message"].as_str().expect("message").starts_with("getConst:"));

    let response = send(&mut d, json!({"cmd": "getConst", "data": "PHP_INT_SIZE"}));
    assert_eq!(response, json!({"type": "integer", "value": 8}));
}

#[test]
fn test_handler_panic_becomes_thrown_error() {
    let mut rt = MemoryRuntime::new();
    rt.define_function(FunctionInfo::new("explode_badly", vec![]), |_, _| panic!("kaboom"));
    let mut d = Dispatcher::new(rt);

    let response = send(&mut d, json!({"cmd": "callFun", "data": {"name": "explode_badly", "args": []}}));
    assert_eq!(response["type"], "thrownException");
    assert!(response["value"]["message"].as_str().expect("message").contains("kaboom"));

    let response = send(&mut d, json!({"cmd": "callFun", "data": {"name": "strlen", "args": [{"type": "string", "value": "abc"}]}}));
    assert_eq!(response, json!({"type": "integer", "value": 3}));
}

#[test]
fn test_serve_answers_every_frame_in_order() {
    let frames = [
        json!({"cmd": "getConst", "data": "PHP_EOL"}),
        json!({"cmd": "bogus"}),
        json!({"cmd": "getConst", "data": "MISSING"}),
        json!({"cmd": "callFun", "data": {"name": "strlen", "args": [{"type": "string", "value": "four"}]}}),
    ];
    let input: String = frames.iter().map(|f| format!("{}\n", f)).collect();
    let mut transport = LineTransport::new(Cursor::new(input.into_bytes()), Vec::new());

    let served = dispatcher().serve(&mut transport).expect("serve");
    assert_eq!(served, 4);

    let (_, written) = transport.into_inner();
    let text = String::from_utf8(written).expect("utf8");
    let tags: Vec<String> = text
        .lines()
        .map(|line| serde_json::from_str::<Json>(line).expect("frame")["type"].as_str().expect("tag").to_string())
        .collect();
    assert_eq!(tags, vec!["string", "protocolError", "thrownException", "integer"]);
}

#[test]
fn test_serve_survives_a_frame_that_is_not_text() {
    let input = b"\xff\xfe\n{\"cmd\":\"getConst\",\"data\":\"PHP_INT_SIZE\"}\n".to_vec();
    let mut transport = LineTransport::new(Cursor::new(input), Vec::new());

    let served = dispatcher().serve(&mut transport).expect("serve");
    assert_eq!(served, 2);

    let (_, written) = transport.into_inner();
    let text = String::from_utf8(written).expect("utf8");
    let responses: Vec<Json> = text
        .lines()
        .map(|line| serde_json::from_str(line).expect("frame"))
        .collect();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["type"], "protocolError");
    assert_eq!(responses[0]["value"]["kind"], "malformedFrame");
    assert_eq!(responses[1], json!({"type": "integer", "value": 8}));
}

#[test]
fn test_thrown_exceptions_carry_a_live_handle() {
    let mut d = dispatcher();
    let response = send(
        &mut d,
        json!({"cmd": "callFun", "data": {"name": "intdiv", "args": [
            {"type": "integer", "value": 1}, {"type": "integer", "value": 0}
        ]}}),
    );
    assert_eq!(response["value"]["type"], "DivisionByZeroError");
    let hash = response["value"]["hash"].as_str().expect("hash").to_string();

    let message = send(
        &mut d,
        json!({"cmd": "callMethod", "data": {
            "obj": {"type": "object", "value": {"class": "DivisionByZeroError", "hash": hash}},
            "name": "getMessage",
            "args": []
        }}),
    );
    assert_eq!(message, json!({"type": "string", "value": "Division by zero"}));
}

#[test]
fn test_array_access_and_iteration_commands() {
    let mut d = dispatcher();
    let array = object_of(&send(
        &mut d,
        json!({"cmd": "createObject", "data": {"name": "ArrayObject", "args": [
            {"type": "array", "value": [{"type": "string", "value": "x"}, {"type": "string", "value": "y"}]}
        ]}}),
    ));

    assert_eq!(send(&mut d, json!({"cmd": "count", "data": array})), json!({"type": "integer", "value": 2}));
    assert_eq!(
        send(&mut d, json!({"cmd": "hasItem", "data": {"obj": array, "offset": {"type": "integer", "value": 1}}})),
        json!({"type": "boolean", "value": true})
    );
    send(
        &mut d,
        json!({"cmd": "delItem", "data": {"obj": array, "offset": {"type": "integer", "value": 0}}}),
    );

    let it = object_of(&send(&mut d, json!({"cmd": "startIteration", "data": array})));
    assert_eq!(
        send(&mut d, json!({"cmd": "nextIteration", "data": it})),
        json!({"type": "array", "value": [
            {"type": "boolean", "value": true},
            {"type": "integer", "value": 1},
            {"type": "string", "value": "y"}
        ]})
    );
    let done = send(&mut d, json!({"cmd": "nextIteration", "data": it}));
    assert_eq!(done["value"][0], json!({"type": "boolean", "value": false}));
}

#[test]
fn test_container_commands_check_capabilities() {
    let mut d = dispatcher();
    let plain = object_of(&send(&mut d, json!({"cmd": "createObject", "data": {"name": "stdClass", "args": []}})));

    let response = send(&mut d, json!({"cmd": "count", "data": plain}));
    assert_eq!(response["value"]["type"], "TypeError");
    let response = send(&mut d, json!({"cmd": "getItem", "data": {"obj": plain, "offset": {"type": "integer", "value": 0}}}));
    assert!(response["value"]["message"].as_str().expect("message").contains("as array"));
    let response = send(&mut d, json!({"cmd": "startIteration", "data": plain}));
    assert!(response["value"]["message"].as_str().expect("message").contains("not traversable"));
}

#[test]
fn test_resolve_name_follows_precedence() {
    let mut rt = MemoryRuntime::new();
    rt.define_constant("strlen", Value::Int(7)).expect("define");
    let mut d = Dispatcher::new(rt);

    assert_eq!(
        send(&mut d, json!({"cmd": "resolveName", "data": "STRLEN"})),
        json!({"type": "array", "value": [
            {"type": "string", "value": "func"},
            {"type": "string", "value": "strlen"}
        ]})
    );
    let only_const = send(&mut d, json!({"cmd": "resolveName", "data": {"name": "strlen", "kind": "const"}}));
    assert_eq!(only_const["value"][1], json!({"type": "integer", "value": 7}));
    let none = send(&mut d, json!({"cmd": "resolveName", "data": "nothing_here"}));
    assert_eq!(none["value"][0]["value"], "none");
}

#[test]
fn test_list_everything_is_relative_to_the_namespace() {
    let mut rt = MemoryRuntime::new();
    rt.define_class(ClassBuilder::new("App\\Models\\User"))
        .define_class(ClassBuilder::new("App\\Kernel"))
        .define_function(FunctionInfo::new("App\\boot", vec![]), |_, _| Ok(Value::Null));
    let mut d = Dispatcher::new(rt);

    let response = send(&mut d, json!({"cmd": "listEverything", "data": "App"}));
    let mut names: Vec<String> = response["value"]
        .as_array()
        .expect("list")
        .iter()
        .map(|n| n["value"].as_str().expect("name").to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Kernel", "Models\\User", "boot"]);
}

#[test]
fn test_echo_helper_writes_program_output() {
    let mut d = dispatcher();
    let response = send(
        &mut d,
        json!({"cmd": "callFun", "data": {"name": "echo", "args": [
            {"type": "string", "value": "a"}, {"type": "integer", "value": 1}, {"type": "boolean", "value": true}
        ]}}),
    );
    assert_eq!(response["type"], "NULL");
    assert_eq!(d.runtime().output(), "a11");
}

#[test]
fn test_registered_commands_extend_the_protocol() {
    let mut d = dispatcher();
    d.register("countFuns", |rt: &mut MemoryRuntime, _| {
        Ok(Value::Int(rt.function_names().len() as i64))
    });
    let response = send(&mut d, json!({"cmd": "countFuns"}));
    assert_eq!(response["type"], "integer");
    assert!(response["value"].as_i64().expect("count") > 5);
}
