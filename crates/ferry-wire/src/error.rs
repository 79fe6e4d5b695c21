//! Infrastructure errors
//!
//! These describe failures of the bridge itself. A foreign runtime raising
//! an error is not one of them: that arrives as [`DecodeError::Thrown`] and
//! is handed to the caller as an ordinary, catchable value.

use crate::envelope::{ProtocolFault, Thrown};
use thiserror::Error;

/// The duplex channel failed. Always fatal to the bridge.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the stream")]
    Closed,

    #[error("peer closed the stream while a response was pending")]
    ClosedMidCall,

    #[error("unreadable frame: {0}")]
    MalformedFrame(String),

    #[error("frame contains a raw line break and cannot be delimited")]
    EmbeddedDelimiter,

    #[error("bridge is unusable after an earlier fatal error")]
    Poisoned,
}

/// A host value that cannot be marshalled by value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot encode value of type `{type_name}`: {reason}")]
pub struct EncodingError {
    pub type_name: String,
    pub reason: String,
}

impl EncodingError {
    pub fn new(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}

/// An envelope could not be turned back into a value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("unknown type tag {0:?}")]
    UnknownTypeTag(String),

    #[error("invalid {tag} payload: {reason}")]
    InvalidValue { tag: String, reason: String },

    /// The envelope carried an error raised inside the foreign runtime.
    #[error("{}: {}", .0.class, .0.message)]
    Thrown(Thrown),

    /// The peer rejected the request itself.
    #[error("protocol fault: {}", .0.message)]
    Protocol(ProtocolFault),
}

impl DecodeError {
    pub(crate) fn invalid(tag: &str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidValue {
            tag: tag.to_string(),
            reason: reason.into(),
        }
    }
}

/// A value did not have the shape a record or Rust type expected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("missing field `{0}`")]
    MissingField(String),

    #[error("in field `{0}`: {1}")]
    FieldError(String, Box<ConversionError>),

    #[error("at index {0}: {1}")]
    IndexError(usize, Box<ConversionError>),

    #[error("{0}")]
    Custom(String),
}
