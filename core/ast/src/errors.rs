//! Error types for the AST crate.
//!
//! This module defines structured errors for reading CIL source text and for
//! turning the parse tree into typed statements.

use thiserror::Error;

use crate::nodes::Location;

/// Errors raised while reading parenthesized source text.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[must_use = "errors must not be silently ignored"]
pub enum ParseError {
    #[error("{location}: unclosed parenthesis")]
    UnclosedParen { location: Location },

    #[error("{location}: unexpected ')'")]
    UnexpectedCloseParen { location: Location },

    #[error("{location}: unterminated string")]
    UnterminatedString { location: Location },
}

/// Errors raised while building typed statements from the parse tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[must_use = "errors must not be silently ignored"]
pub enum BuildError {
    /// The statement keyword is not one this builder knows.
    #[error("{location}: unknown statement '{keyword}'")]
    UnknownStatement { keyword: String, location: Location },

    /// A statement has the wrong number or shape of arguments.
    #[error("{location}: invalid {statement} statement: {reason}")]
    InvalidSyntax {
        statement: String,
        reason: String,
        location: Location,
    },

    /// A name uses a reserved keyword or illegal characters.
    #[error("{location}: invalid name '{name}': {reason}")]
    InvalidName {
        name: String,
        reason: String,
        location: Location,
    },

    #[error("{location}: invalid ip address '{value}'")]
    InvalidIpAddr { value: String, location: Location },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_location() -> Location {
        Location::new(0, 0, 1, 5, 1, 10, String::new())
    }

    #[test]
    fn test_display_unknown_statement() {
        let err = BuildError::UnknownStatement {
            keyword: "frobnicate".to_string(),
            location: test_location(),
        };
        assert_eq!(err.to_string(), "1:5: unknown statement 'frobnicate'");
    }

    #[test]
    fn test_display_invalid_syntax() {
        let err = BuildError::InvalidSyntax {
            statement: "type".to_string(),
            reason: "expected 1 argument".to_string(),
            location: test_location(),
        };
        assert_eq!(
            err.to_string(),
            "1:5: invalid type statement: expected 1 argument"
        );
    }

    #[test]
    fn test_display_invalid_name() {
        let err = BuildError::InvalidName {
            name: "self".to_string(),
            reason: "the keyword 'self' is reserved".to_string(),
            location: test_location(),
        };
        assert_eq!(
            err.to_string(),
            "1:5: invalid name 'self': the keyword 'self' is reserved"
        );
    }
}
