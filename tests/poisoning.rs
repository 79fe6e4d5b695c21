//! Fatal channel errors poison the bridge; foreign errors never do

mod common;

use common::Scripted;
use ferry::wire::TransportError;
use ferry::{Bridge, Error, Value};
use ferry_guest::memory::MemoryRuntime;

fn assert_poisoned(bridge: &Bridge) {
    assert!(bridge.is_poisoned());
    match bridge.constant("ANYTHING") {
        Err(Error::Transport(TransportError::Poisoned)) => {}
        other => panic!("expected Poisoned, got {:?}", other),
    }
}

#[test]
fn test_unreadable_frame_poisons() {
    let bridge = Bridge::connect(Scripted::new(&["{not json"]));
    let err = bridge.constant("X").expect_err("garbage");
    assert!(matches!(err, Error::Transport(TransportError::MalformedFrame(_))));
    assert!(err.is_fatal());
    assert_poisoned(&bridge);
}

#[test]
fn test_unknown_tag_poisons() {
    let bridge = Bridge::connect(Scripted::new(&[r#"{"type":"weird","value":1}"#]));
    match bridge.constant("X") {
        Err(Error::UnknownTypeTag(tag)) => assert_eq!(tag, "weird"),
        other => panic!("expected UnknownTypeTag, got {:?}", other),
    }
    assert_poisoned(&bridge);
}

#[test]
fn test_unknown_command_fault_poisons() {
    let bridge = Bridge::connect(Scripted::new(&[
        r#"{"type":"protocolError","value":{"kind":"unknownCommand","command":"getConst","message":"unknown command 'getConst'"}}"#,
    ]));
    match bridge.constant("X") {
        Err(Error::UnknownCommand(cmd)) => assert_eq!(cmd, "getConst"),
        other => panic!("expected UnknownCommand, got {:?}", other),
    }
    assert_poisoned(&bridge);
}

#[test]
fn test_stream_closed_mid_call_poisons() {
    let bridge = Bridge::connect(Scripted::new(&[]));
    match bridge.constant("X") {
        Err(Error::Transport(TransportError::ClosedMidCall)) => {}
        other => panic!("expected ClosedMidCall, got {:?}", other),
    }
    assert_poisoned(&bridge);
}

#[test]
fn test_raw_request_returns_unexamined_envelopes() {
    let bridge = Bridge::connect(Scripted::new(&[
        r#"{"type":"protocolError","value":{"kind":"unknownCommand","command":"x","message":"unknown command 'x'"}}"#,
    ]));
    let envelope = bridge
        .request(&ferry::wire::Command::new("x", serde_json::Value::Null))
        .expect("raw request");
    assert_eq!(envelope.tag, "protocolError");
    assert!(!bridge.is_poisoned());
}

#[test]
fn test_foreign_errors_leave_the_bridge_usable() {
    let bridge = Bridge::in_process(MemoryRuntime::new()).expect("bridge");
    for _ in 0..3 {
        let err = bridge.constant("MISSING").expect_err("undefined");
        assert!(!err.is_fatal());
    }
    assert!(!bridge.is_poisoned());
    assert_eq!(bridge.constant("PHP_INT_SIZE").expect("defined"), Value::Int(8));
}
