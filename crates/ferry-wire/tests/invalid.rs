use ferry_wire::{decode, DecodeError, Envelope, FaultKind, Transport, TransportError};
use serde_json::json;

fn envelope(tag: &str, value: serde_json::Value) -> Envelope {
    Envelope::new(tag, value)
}

#[test]
fn test_rejects_unknown_tag() {
    match decode(&envelope("complex", json!([1, 2]))) {
        Err(DecodeError::UnknownTypeTag(tag)) => assert_eq!(tag, "complex"),
        other => panic!("expected unknown tag, got {:?}", other),
    }
}

#[test]
fn test_rejects_fractional_integer() {
    assert!(matches!(
        decode(&envelope("integer", json!(1.5))),
        Err(DecodeError::InvalidValue { .. })
    ));
}

#[test]
fn test_rejects_integer_outside_signed_range() {
    assert!(decode(&envelope("integer", json!(u64::MAX))).is_err());
}

#[test]
fn test_rejects_object_without_hash() {
    assert!(matches!(
        decode(&envelope("object", json!({"class": "Foo"}))),
        Err(DecodeError::InvalidValue { .. })
    ));
}

#[test]
fn test_rejects_scalar_array_payload() {
    assert!(decode(&envelope("array", json!("not a container"))).is_err());
}

#[test]
fn test_rejects_nested_envelope_without_tag() {
    assert!(decode(&envelope("array", json!([{"value": 1}]))).is_err());
}

#[test]
fn test_thrown_envelope_is_raised() {
    match decode(&envelope(
        "thrownException",
        json!({"type": "LogicException", "message": "no", "hash": "ab"}),
    )) {
        Err(DecodeError::Thrown(thrown)) => {
            assert_eq!(thrown.class, "LogicException");
            assert_eq!(thrown.handle.as_deref(), Some("ab"));
        }
        other => panic!("expected thrown, got {:?}", other),
    }
}

#[test]
fn test_protocol_error_is_not_a_thrown_exception() {
    match decode(&envelope(
        "protocolError",
        json!({"kind": "unknownCommand", "command": "frobnicate", "message": "unknown command 'frobnicate'"}),
    )) {
        Err(DecodeError::Protocol(fault)) => {
            assert_eq!(fault.kind, FaultKind::UnknownCommand);
            assert_eq!(fault.command.as_deref(), Some("frobnicate"));
        }
        other => panic!("expected protocol fault, got {:?}", other),
    }
}

#[test]
fn test_receive_json_reports_garbage_frames() {
    let input = std::io::Cursor::new(b"this is not json\n".to_vec());
    let mut transport = ferry_wire::LineTransport::new(input, Vec::new());
    let result: Result<Option<Envelope>, _> = transport.receive_json();
    assert!(matches!(result, Err(TransportError::MalformedFrame(_))));
}
