//! Exception bridge
//!
//! A `thrownException` envelope becomes a [`ForeignError`]: an ordinary
//! Rust error that also remembers the foreign class hierarchy of what was
//! thrown, so callers can catch by foreign type.
//!
//! ```ignore
//! match bridge.function("intdiv")?.call(vec![1.into(), 0.into()]) {
//!     Err(Error::Foreign(e)) if e.is_a("ArithmeticError") => { /* ... */ }
//!     other => { /* ... */ }
//! }
//! ```

use crate::object::Object;
use std::collections::HashSet;
use thiserror::Error;

/// Host-side base taxonomy that foreign error classes map onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Arithmetic,
    Assertion,
    OutOfBounds,
    Overflow,
    Parse,
    UnexpectedValue,
    Type,
    Runtime,
    Generic,
}

// First match wins, so more specific families come before their bases.
const KIND_TABLE: &[(&str, ErrorKind)] = &[
    ("ArithmeticError", ErrorKind::Arithmetic),
    ("AssertionError", ErrorKind::Assertion),
    ("OutOfBoundsException", ErrorKind::OutOfBounds),
    ("OutOfRangeException", ErrorKind::OutOfBounds),
    ("OverflowException", ErrorKind::Overflow),
    ("ParseError", ErrorKind::Parse),
    ("JsonException", ErrorKind::Parse),
    ("UnexpectedValueException", ErrorKind::UnexpectedValue),
    ("TypeError", ErrorKind::Type),
    ("InvalidArgumentException", ErrorKind::Type),
    ("RuntimeException", ErrorKind::Runtime),
];

/// An error raised by foreign code while running one command.
#[derive(Error, Debug, Clone)]
#[error("{class}: {message}")]
pub struct ForeignError {
    pub class: String,
    pub message: String,
    /// The thrown object itself, when the foreign side kept it alive
    pub object: Option<Object>,
    /// Lowercased names of the class and every ancestor
    ancestors: HashSet<String>,
}

impl ForeignError {
    pub(crate) fn new(
        class: String,
        message: String,
        object: Option<Object>,
        ancestors: HashSet<String>,
    ) -> Self {
        let mut ancestors = ancestors;
        ancestors.insert(normalize(&class));
        Self {
            class,
            message,
            object,
            ancestors,
        }
    }

    /// An error whose hierarchy is unknown beyond its own class.
    pub fn detached(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(class.into(), message.into(), None, HashSet::new())
    }

    /// Does the thrown class equal or descend from `class`?
    pub fn is_a(&self, class: &str) -> bool {
        self.ancestors.contains(&normalize(class))
    }

    pub fn kind(&self) -> ErrorKind {
        KIND_TABLE
            .iter()
            .find(|(class, _)| self.is_a(class))
            .map(|(_, kind)| *kind)
            .unwrap_or(ErrorKind::Generic)
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        self.ancestors.iter().map(String::as_str)
    }
}

fn normalize(class: &str) -> String {
    class.trim_start_matches('\\').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ancestors(class: &str, ancestors: &[&str]) -> ForeignError {
        ForeignError::new(
            class.to_string(),
            "boom".to_string(),
            None,
            ancestors.iter().map(|a| normalize(a)).collect(),
        )
    }

    #[test]
    fn catches_by_ancestor_case_insensitively() {
        let err = with_ancestors("DivisionByZeroError", &["ArithmeticError", "Error", "Throwable"]);
        assert!(err.is_a("\\arithmeticerror"));
        assert!(err.is_a("Throwable"));
        assert!(!err.is_a("Exception"));
        assert_eq!(err.kind(), ErrorKind::Arithmetic);
    }

    #[test]
    fn specific_families_win_over_runtime() {
        let err = with_ancestors("OutOfBoundsException", &["RuntimeException", "Exception"]);
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        let err = with_ancestors("ArgumentCountError", &["TypeError", "Error"]);
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn unknown_hierarchy_is_generic() {
        let err = ForeignError::detached("Exception", "boom");
        assert_eq!(err.kind(), ErrorKind::Generic);
        assert_eq!(err.to_string(), "Exception: boom");
    }
}
