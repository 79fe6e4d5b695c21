//! Frame payloads: commands going out, envelopes coming back.

use serde::{Deserialize, Serialize};

pub const TAG_INTEGER: &str = "integer";
pub const TAG_DOUBLE: &str = "double";
pub const TAG_STRING: &str = "string";
pub const TAG_BOOLEAN: &str = "boolean";
pub const TAG_NULL: &str = "NULL";
pub const TAG_ARRAY: &str = "array";
pub const TAG_OBJECT: &str = "object";
pub const TAG_RESOURCE: &str = "resource";
pub const TAG_THROWN: &str = "thrownException";
pub const TAG_PROTOCOL_ERROR: &str = "protocolError";

/// The unit crossing the wire: `{"type": <tag>, "value": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub tag: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

impl Envelope {
    pub fn new(tag: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            tag: tag.into(),
            value,
        }
    }

    pub fn null() -> Self {
        Self::new(TAG_NULL, serde_json::Value::Null)
    }

    pub fn thrown(thrown: &Thrown) -> Self {
        Self::new(
            TAG_THROWN,
            serde_json::to_value(thrown).unwrap_or(serde_json::Value::Null),
        )
    }

    pub fn fault(fault: &ProtocolFault) -> Self {
        Self::new(
            TAG_PROTOCOL_ERROR,
            serde_json::to_value(fault).unwrap_or(serde_json::Value::Null),
        )
    }

    pub fn is_thrown(&self) -> bool {
        self.tag == TAG_THROWN
    }

    pub fn into_json(self) -> serde_json::Value {
        serde_json::json!({ "type": self.tag, "value": self.value })
    }
}

/// A request from the host: `{"cmd": <name>, "data": <payload>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub cmd: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Command {
    pub fn new(cmd: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            cmd: cmd.into(),
            data,
        }
    }
}

/// An error raised inside the foreign runtime while running one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thrown {
    /// Fully-qualified foreign class of the error
    #[serde(rename = "type")]
    pub class: String,
    pub message: String,
    /// Handle of the thrown object, when the runtime keeps it alive
    #[serde(rename = "hash", default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

impl Thrown {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            message: message.into(),
            handle: None,
        }
    }

    pub fn with_handle(mut self, handle: impl Into<String>) -> Self {
        self.handle = Some(handle.into());
        self
    }
}

impl std::fmt::Display for Thrown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.class, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FaultKind {
    UnknownCommand,
    MalformedFrame,
}

/// The dispatcher could not even start executing a request.
///
/// Kept apart from [`Thrown`] so a desynchronised channel is never mistaken
/// for an error raised by foreign code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolFault {
    pub kind: FaultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    pub message: String,
}

impl ProtocolFault {
    pub fn unknown_command(cmd: &str) -> Self {
        Self {
            kind: FaultKind::UnknownCommand,
            command: Some(cmd.to_string()),
            message: format!("unknown command '{}'", cmd),
        }
    }

    pub fn malformed_frame(reason: impl std::fmt::Display) -> Self {
        Self {
            kind: FaultKind::MalformedFrame,
            command: None,
            message: format!("malformed request frame: {}", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_serializes_with_cmd_and_data() {
        let cmd = Command::new("getConst", serde_json::json!("FOO"));
        let text = serde_json::to_string(&cmd).expect("serialize");
        assert_eq!(text, r#"{"cmd":"getConst","data":"FOO"}"#);
    }

    #[test]
    fn thrown_uses_type_and_message_keys() {
        let envelope = Envelope::thrown(&Thrown::new("RuntimeException", "boom"));
        assert_eq!(
            envelope.into_json(),
            serde_json::json!({
                "type": "thrownException",
                "value": {"type": "RuntimeException", "message": "boom"}
            })
        );
    }
}
