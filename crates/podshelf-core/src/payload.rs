// ABOUTME: Typed accessors over an untyped JSON request body, checked against an allow-list of fields.
// ABOUTME: Every domain `from_json` constructor goes through this so schema errors are reported uniformly.

use serde_json::{Map, Value};

use crate::error::ValidationError;

/// A JSON object body that has passed the unknown-field check.
///
/// `null` values are treated the same as absent fields. String accessors
/// return trimmed values.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Payload<'a> {
    /// Wrap `value`, rejecting non-objects and any key not listed in `allowed`.
    pub fn new(value: &'a Value, allowed: &[&str]) -> Result<Self, ValidationError> {
        let fields = value.as_object().ok_or(ValidationError::NotAnObject)?;
        if let Some(unknown) = fields.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(ValidationError::UnknownField(unknown.clone()));
        }
        Ok(Self { fields })
    }

    fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields.get(field).filter(|v| !v.is_null())
    }

    pub fn required_str(&self, field: &'static str) -> Result<String, ValidationError> {
        self.optional_str(field)?
            .ok_or(ValidationError::Missing(field))
    }

    pub fn optional_str(&self, field: &'static str) -> Result<Option<String>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
            Some(_) => Err(ValidationError::WrongType {
                field,
                expected: "a string",
            }),
        }
    }

    pub fn optional_bool(&self, field: &'static str) -> Result<Option<bool>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(ValidationError::WrongType {
                field,
                expected: "a boolean",
            }),
        }
    }

    pub fn optional_f64(&self, field: &'static str) -> Result<Option<f64>, ValidationError> {
        match self.get(field) {
            None => Ok(None),
            Some(Value::Number(n)) => n.as_f64().map(Some).ok_or(ValidationError::WrongType {
                field,
                expected: "a number",
            }),
            Some(_) => Err(ValidationError::WrongType {
                field,
                expected: "a number",
            }),
        }
    }
}

/// Reject values longer than `max` characters.
pub(crate) fn check_len(
    field: &'static str,
    value: &str,
    max: usize,
) -> Result<(), ValidationError> {
    if value.chars().count() > max {
        return Err(ValidationError::invalid(
            field,
            format!("must be at most {max} characters"),
        ));
    }
    Ok(())
}

/// The first `max` characters of `value`.
pub(crate) fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Accept only absolute http(s) URLs without embedded whitespace.
pub(crate) fn check_http_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    match rest {
        Some(host) if !host.is_empty() && !host.chars().any(char::is_whitespace) => {
            check_len(field, value, 2048)
        }
        _ => Err(ValidationError::invalid(field, "must be an http(s) URL")),
    }
}
