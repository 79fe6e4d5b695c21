//! Host-side error taxonomy
//!
//! Infrastructure failures (transport, desync, unencodable values) and
//! errors raised by foreign code stay in separate variants. Only
//! [`Error::Foreign`] ever carries something the foreign runtime threw.

use crate::binding::BindingError;
use crate::exception::ForeignError;
use ferry_wire::{ConversionError, EncodingError, TransportError};
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("foreign side does not know command '{0}'")]
    UnknownCommand(String),

    #[error("unknown type tag {0:?} in response")]
    UnknownTypeTag(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Foreign(Box<ForeignError>),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("cannot instantiate {0}")]
    Instantiation(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("bridge has been dropped")]
    Disconnected,

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl Error {
    /// The channel can no longer be trusted after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Transport(_)
                | Error::UnknownCommand(_)
                | Error::UnknownTypeTag(_)
                | Error::MalformedResponse(_)
        )
    }

    /// The foreign error, if foreign code raised this.
    pub fn as_foreign(&self) -> Option<&ForeignError> {
        match self {
            Error::Foreign(err) => Some(err),
            _ => None,
        }
    }

    pub fn into_foreign(self) -> Option<ForeignError> {
        match self {
            Error::Foreign(err) => Some(*err),
            _ => None,
        }
    }

    pub(crate) fn malformed(reason: impl std::fmt::Display) -> Self {
        Error::MalformedResponse(reason.to_string())
    }
}

impl From<ForeignError> for Error {
    fn from(err: ForeignError) -> Self {
        Error::Foreign(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desync_and_transport_errors_are_fatal() {
        assert!(Error::Transport(TransportError::Closed).is_fatal());
        assert!(Error::UnknownCommand("x".into()).is_fatal());
        assert!(Error::UnknownTypeTag("weird".into()).is_fatal());
        assert!(Error::malformed("bad").is_fatal());
    }

    #[test]
    fn recoverable_errors_are_not_fatal() {
        assert!(!Error::Unsupported("len".into()).is_fatal());
        assert!(!Error::Instantiation("interface Countable".into()).is_fatal());
        assert!(!Error::NotFound { kind: "class", name: "Nope".into() }.is_fatal());
        assert!(!Error::from(ForeignError::detached("Exception", "boom")).is_fatal());
    }
}
