use ferry_wire::{decode, encode, Envelope, ObjectRef, ResourceRef, Value};
use proptest::prelude::*;

fn through_text(value: &Value) -> Value {
    let text = serde_json::to_string(&encode(value).expect("encode")).expect("serialize");
    assert!(!text.contains('\n'), "frame must stay on one line: {}", text);
    let envelope: Envelope = serde_json::from_str(&text).expect("parse");
    decode(&envelope).expect("decode")
}

fn handle() -> impl Strategy<Value = String> {
    "[0-9a-f]{32}"
}

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        // Binary fractions parse back exactly
        (-1_000_000i32..1_000_000).prop_map(|n| Value::Double(f64::from(n) / 8.0)),
        ".*".prop_map(Value::String),
        ("[A-Z][a-z]{1,8}", handle()).prop_map(|(class, hash)| Value::Object(ObjectRef { class, hash })),
        ("[a-z]{1,8}", handle()).prop_map(|(kind, hash)| Value::Resource(ResourceRef { kind, hash })),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::List),
            prop::collection::btree_map("[a-z_]{1,6}", inner, 0..6)
                .prop_map(|entries| Value::Map(entries.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn test_any_value_survives_the_wire(v in value()) {
        prop_assert_eq!(through_text(&v), v);
    }

    #[test]
    fn test_strings_with_control_characters_stay_framed(s in "[\\x00-\\x1f\\u{2028}\"\\\\a-z]{0,32}") {
        let v = Value::String(s);
        prop_assert_eq!(through_text(&v), v);
    }
}

#[test]
fn test_roundtrip_scalars() {
    let values = vec![
        Value::Null,
        Value::Bool(false),
        Value::Int(i64::MIN),
        Value::Int(i64::MAX),
        Value::Double(-0.5),
        Value::Double(2.0),
        Value::String(String::new()),
        Value::String("línea\r\nnueva".to_string()),
    ];

    for value in values {
        assert_eq!(through_text(&value), value);
    }
}

#[test]
fn test_roundtrip_infinities() {
    assert_eq!(through_text(&Value::Double(f64::INFINITY)), Value::Double(f64::INFINITY));
    assert_eq!(
        through_text(&Value::Double(f64::NEG_INFINITY)),
        Value::Double(f64::NEG_INFINITY)
    );
}

#[test]
fn test_envelopes_wrap_every_level() {
    let value = Value::List(vec![Value::Int(1), Value::map([("k", "v")])]);
    assert_eq!(
        encode(&value).expect("encode").into_json(),
        serde_json::json!({
            "type": "array",
            "value": [
                {"type": "integer", "value": 1},
                {"type": "array", "value": {"k": {"type": "string", "value": "v"}}}
            ]
        })
    );
}

#[test]
fn test_object_payload_carries_class_and_hash() {
    let value = Value::Object(ObjectRef {
        class: "DateTime".to_string(),
        hash: "000000000000000000000000000000a1".to_string(),
    });
    assert_eq!(
        encode(&value).expect("encode").into_json(),
        serde_json::json!({
            "type": "object",
            "value": {"class": "DateTime", "hash": "000000000000000000000000000000a1"}
        })
    );
}

#[test]
fn test_duplicate_keys_fail_instead_of_collapsing() {
    let value = Value::map([("a", 1), ("b", 2)]);
    assert_eq!(through_text(&value), value);

    let repeated = Value::Map(vec![
        ("a".to_string(), Value::Int(1)),
        ("a".to_string(), Value::Int(2)),
    ]);
    let err = encode(&repeated).expect_err("repeated key");
    assert_eq!(err.type_name, "array");
}
