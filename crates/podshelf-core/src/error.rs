// ABOUTME: Validation error type raised when a client payload does not match its schema.
// ABOUTME: Carries the offending field name so the HTTP layer can report it verbatim.

use thiserror::Error;

/// A client-supplied payload failed schema checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("request body is not valid JSON: {0}")]
    MalformedBody(String),

    #[error("request body must be a JSON object")]
    NotAnObject,

    #[error("field `{0}` is required")]
    Missing(&'static str),

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("field `{field}` {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("`{0}` is not a valid identifier")]
    InvalidId(String),

    #[error("query parameter `{param}` {reason}")]
    InvalidQuery { param: &'static str, reason: String },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for a rejected query-string parameter.
    pub fn query(param: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            param,
            reason: reason.into(),
        }
    }
}
