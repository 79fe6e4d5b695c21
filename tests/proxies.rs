//! Proxy objects, class descriptors and namespaces

mod common;

use ferry::{Bridge, BridgeConfig, Error, Value};
use ferry_guest::memory::{ClassBuilder, MemoryRuntime};
use ferry_guest::ForeignRuntime;
use ferry_wire::{FunctionInfo, ParamInfo, Thrown, Value as WireValue};

fn with_counter_class() -> MemoryRuntime {
    let mut runtime = MemoryRuntime::new();
    runtime.define_class(
        ClassBuilder::new("Counter")
            .constant("STEP", 1)
            .property("n", 0)
            .method("bump", vec![], |rt, this, _| {
                let this = this.ok_or_else(|| Thrown::new("Error", "no object"))?;
                let n = rt.get_property(this, "n")?.as_int().unwrap_or(0);
                rt.set_property(this, "n", WireValue::Int(n + 1))?;
                Ok(WireValue::Null)
            })
            .method(
                "__invoke",
                vec![ParamInfo::required("a"), ParamInfo::required("b")],
                |_, _, args| {
                    let sum: i64 = args.iter().filter_map(WireValue::as_int).sum();
                    Ok(WireValue::Int(sum))
                },
            )
            .static_method("describe", vec![], |_, _, _| Ok(WireValue::from("counts things"))),
    );
    runtime
}

#[test]
fn test_same_handle_same_proxy() {
    let bridge = Bridge::in_process(MemoryRuntime::new()).expect("bridge");
    let array = bridge
        .class("ArrayObject")
        .expect("class")
        .new(vec![Value::from(vec![1, 2])])
        .expect("create");

    // Reached again through a global and through an array slot
    bridge.set_global("shared", array.clone()).expect("set");
    let via_global = bridge.global("shared").expect("get").into_object().expect("object");

    let holder = bridge.class("ArrayObject").expect("class").new(vec![]).expect("create");
    holder.set_item("inner", array.clone()).expect("set item");
    let via_item = holder.get_item("inner").expect("get item").into_object().expect("object");

    assert_eq!(via_global, array);
    assert_eq!(via_item, array);
    assert_eq!(via_global.handle(), via_item.handle());
    assert!(bridge.registry().contains(array.handle()));
    assert_ne!(holder, array);
}

#[test]
fn test_ancestors_answer_without_round_trips() {
    let mut runtime = MemoryRuntime::new();
    runtime
        .define_class(ClassBuilder::new("A"))
        .define_class(ClassBuilder::new("B").extends("A"))
        .define_class(ClassBuilder::new("C").extends("B"));
    let (bridge, sent) = common::counted(runtime);

    let c = bridge.class("C").expect("class");
    let resolved = sent.get();
    assert!(c.is_subclass_of("A"));
    assert!(c.is_subclass_of("\\b"));
    assert!(c.is_subclass_of("C"));
    assert!(!c.is_subclass_of("stdClass"));
    assert_eq!(c.parent_name(), Some("B"));

    // Ancestors were resolved and cached along the way
    let a = bridge.class("A").expect("class");
    assert!(!a.is_subclass_of("C"));
    assert_eq!(sent.get(), resolved);

    let obj = c.new(vec![]).expect("create");
    assert!(obj.is_instance_of("A").expect("instance"));
    assert_eq!(sent.get(), resolved + 1);
}

#[test]
fn test_property_cache_invalidated_by_calls() {
    let (bridge, sent) = common::counted(with_counter_class());
    let counter = bridge.class("Counter").expect("class").new(vec![]).expect("create");
    let base = sent.get();

    assert_eq!(counter.get("n").expect("get"), Value::Int(0));
    assert_eq!(counter.get("n").expect("cached"), Value::Int(0));
    assert_eq!(sent.get(), base + 1);

    counter.call("bump", vec![]).expect("bump");
    assert_eq!(counter.get("n").expect("refetched"), Value::Int(1));
    assert_eq!(sent.get(), base + 3);

    counter.set("n", 10).expect("set");
    assert_eq!(counter.get_as::<i64>("n").expect("cached"), 10);
    assert_eq!(sent.get(), base + 4);

    counter.unset("n").expect("unset");
    assert!(counter.get("n").is_err());
}

#[test]
fn test_prefetched_defaults_skip_the_first_read() {
    let config = BridgeConfig {
        prefetch_defaults: true,
        ..BridgeConfig::default()
    };
    let (bridge, sent) = common::counted_with(with_counter_class(), config);
    let counter = bridge.class("Counter").expect("class").new(vec![]).expect("create");
    let base = sent.get();
    assert_eq!(counter.get("n").expect("get"), Value::Int(0));
    assert_eq!(sent.get(), base);
}

#[test]
fn test_prefetch_covers_objects_returned_by_functions() {
    let config = BridgeConfig {
        prefetch_defaults: true,
        ..BridgeConfig::default()
    };
    let mut runtime = with_counter_class();
    runtime.define_function(FunctionInfo::new("make_counter", vec![]), |rt, _| {
        rt.create_object("Counter", vec![])
    });
    let (bridge, sent) = common::counted_with(runtime, config);

    let fresh = bridge.call("make_counter", vec![]).expect("call").into_object().expect("object");
    assert_eq!(fresh.get("n").expect("get"), Value::Int(0));
    let resolved = sent.get();
    assert_eq!(fresh.get("n").expect("cached"), Value::Int(0));
    assert_eq!(sent.get(), resolved);

    // Once foreign code has run on it, the declared default is not trusted
    let bumped = bridge.call("make_counter", vec![]).expect("call").into_object().expect("object");
    bumped.call("bump", vec![]).expect("bump");
    let before = sent.get();
    assert_eq!(bumped.get("n").expect("get"), Value::Int(1));
    assert_eq!(sent.get(), before + 1);
}

#[test]
fn test_invoke_static_and_class_constants() {
    let bridge = Bridge::in_process(with_counter_class()).expect("bridge");
    let class = bridge.class("Counter").expect("class");
    let counter = class.new(vec![]).expect("create");

    assert_eq!(counter.invoke(vec![2.into(), 3.into()]).expect("invoke"), Value::Int(5));
    assert_eq!(class.call_static("describe", vec![]).expect("static"), Value::from("counts things"));
    assert_eq!(class.constant("STEP").expect("const"), Value::Int(1));
    assert!(matches!(class.constant("MISSING"), Err(Error::NotFound { .. })));
    assert!(class.method("BUMP").is_some());
}

#[test]
fn test_array_access_and_iteration() {
    let bridge = Bridge::in_process(MemoryRuntime::new()).expect("bridge");
    let array = bridge
        .class("ArrayObject")
        .expect("class")
        .new(vec![Value::from(vec!["x", "y"])])
        .expect("create");

    assert_eq!(array.len().expect("len"), 2);
    assert_eq!(array.get_item(1).expect("get"), Value::from("y"));
    assert!(array.has_item(0).expect("has"));
    array.set_item("k", "v").expect("set");
    array.del_item(0).expect("del");
    assert!(!array.has_item(0).expect("has"));

    let pairs: Vec<(Value, Value)> = array
        .iter()
        .expect("iter")
        .collect::<Result<_, _>>()
        .expect("pairs");
    assert_eq!(
        pairs,
        vec![
            (Value::Int(1), Value::from("y")),
            (Value::from("k"), Value::from("v")),
        ]
    );
}

#[test]
fn test_capabilities_are_checked_host_side() {
    let (bridge, sent) = common::counted(MemoryRuntime::new());
    let plain = bridge.class("stdClass").expect("class").new(vec![]).expect("create");
    let base = sent.get();

    assert!(matches!(plain.len(), Err(Error::Unsupported(_))));
    assert!(matches!(plain.get_item(0), Err(Error::Unsupported(_))));
    assert!(matches!(plain.iter(), Err(Error::Unsupported(_))));
    assert_eq!(sent.get(), base);
}

#[test]
fn test_interfaces_and_abstract_classes_are_not_instantiated() {
    let mut runtime = MemoryRuntime::new();
    runtime.define_class(ClassBuilder::new("Shape").abstract_class().abstract_method("area", vec![]));
    let (bridge, sent) = common::counted(runtime);

    let countable = bridge.class("Countable").expect("class");
    let shape = bridge.class("Shape").expect("class");
    let base = sent.get();
    assert!(countable.is_interface());
    assert!(matches!(countable.new(vec![]), Err(Error::Instantiation(_))));
    assert!(matches!(shape.new(vec![]), Err(Error::Instantiation(_))));
    assert_eq!(sent.get(), base);
}

#[test]
fn test_namespace_traversal_is_lazy() {
    let mut runtime = MemoryRuntime::new();
    runtime
        .define_class(ClassBuilder::new("App\\Models\\User").property("name", "anon"))
        .define_function(FunctionInfo::new("App\\boot", vec![]), |_, _| Ok(WireValue::from("booted")));
    let (bridge, sent) = common::counted(runtime);

    let before = sent.get();
    let models = bridge.namespace("App").child("Models");
    assert_eq!(models.path(), "App\\Models");
    assert_eq!(sent.get(), before);

    let app = bridge.namespace("\\App\\");
    assert!(app.entries().expect("entries").contains(&"boot".to_string()));
    assert_eq!(app.children().expect("children"), vec!["Models".to_string()]);
    let listed = sent.get();
    app.entries().expect("cached");
    assert_eq!(sent.get(), listed);

    match app.get("boot").expect("resolve") {
        Value::Function(boot) => assert_eq!(boot.call(vec![]).expect("call"), Value::from("booted")),
        other => panic!("expected function, got {:?}", other),
    }
    let user = models.class("User").expect("class");
    assert_eq!(user.name(), "App\\Models\\User");
    let anon = user.new(vec![]).expect("create");
    assert_eq!(anon.get("name").expect("get"), Value::from("anon"));
}

#[test]
fn test_dir_and_repr() {
    let bridge = Bridge::in_process(MemoryRuntime::new()).expect("bridge");
    let error = bridge
        .class("RuntimeException")
        .expect("class")
        .new(vec!["boom".into()])
        .expect("create");
    assert_eq!(error.get("message").expect("message"), Value::from("boom"));
    assert!(error.is_instance_of("Exception").expect("instance"));

    error.set("extra", 1).expect("set");
    let names = error.dir().expect("dir");
    for expected in ["message", "extra", "getMessage"] {
        assert!(names.iter().any(|n| n == expected), "{} missing from {:?}", expected, names);
    }

    let plain = bridge.class("stdClass").expect("class").new(vec![]).expect("create");
    plain.set("n", 2.0).expect("set");
    assert_eq!(plain.repr().expect("repr"), "stdClass Object ([n] => 2.0)");
}

#[test]
fn test_proxies_from_another_bridge_are_not_encodable() {
    let first = Bridge::in_process(MemoryRuntime::new()).expect("bridge");
    let second = Bridge::in_process(MemoryRuntime::new()).expect("bridge");
    let obj = first.class("stdClass").expect("class").new(vec![]).expect("create");

    let err = second.set_global("stranger", obj).expect_err("foreign proxy");
    assert!(matches!(err, Error::Encoding(_)));
    assert!(!second.is_poisoned());

    let strlen = first.function("strlen").expect("resolve");
    assert_eq!(
        Value::from(strlen).to_wire(first.id()).expect("encode"),
        WireValue::from("strlen")
    );
}

#[test]
fn test_maps_with_repeated_keys_are_not_sent() {
    let (bridge, sent) = common::counted(MemoryRuntime::new());
    let before = sent.get();
    let repeated = Value::Map(vec![
        ("a".to_string(), Value::Int(1)),
        ("a".to_string(), Value::Int(2)),
    ]);

    let err = bridge.set_global("data", repeated).expect_err("repeated key");
    assert!(matches!(err, Error::Encoding(_)));
    assert_eq!(sent.get(), before);
    assert!(!bridge.is_poisoned());
}
