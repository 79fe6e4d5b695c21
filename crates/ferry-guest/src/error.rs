use ferry_wire::{DecodeError, Thrown};
use thiserror::Error;

/// Failure while executing one command.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuestError {
    /// The foreign runtime raised an error.
    #[error("{0}")]
    Thrown(Thrown),

    /// The command payload did not have the expected shape.
    #[error("invalid command data: {0}")]
    BadData(String),

    #[error("undecodable argument: {0}")]
    Decode(DecodeError),
}

impl GuestError {
    pub fn bad_data(reason: impl Into<String>) -> Self {
        GuestError::BadData(reason.into())
    }

    /// The error as it is reported back to the host.
    pub fn into_thrown(self, command: &str) -> Thrown {
        match self {
            GuestError::Thrown(thrown) => thrown,
            GuestError::BadData(reason) => {
                Thrown::new("Error", format!("{}: invalid command data: {}", command, reason))
            }
            // The host can only have sent a thrown envelope by mistake
            GuestError::Decode(DecodeError::Thrown(inner)) => Thrown::new(
                "Error",
                format!("{}: argument carries an exception ({})", command, inner),
            ),
            GuestError::Decode(err) => Thrown::new("Error", format!("{}: {}", command, err)),
        }
    }
}

impl From<Thrown> for GuestError {
    fn from(thrown: Thrown) -> Self {
        GuestError::Thrown(thrown)
    }
}

impl From<DecodeError> for GuestError {
    fn from(err: DecodeError) -> Self {
        GuestError::Decode(err)
    }
}
