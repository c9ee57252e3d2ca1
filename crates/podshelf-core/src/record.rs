// ABOUTME: Defines the generic Record entity and the validated field set clients may write to it.
// ABOUTME: Server-assigned fields (id, timestamps) live only on Record, never on RecordFields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::payload::{Payload, check_len};

/// A persisted record as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The client-writable part of a record. Used for both create and full update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFields {
    pub name: String,
    pub description: Option<String>,
}

impl RecordFields {
    pub const NAME_MAX: usize = 200;
    pub const DESCRIPTION_MAX: usize = 2000;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Parse and validate an untyped JSON body.
    pub fn from_json(value: &Value) -> Result<Self, ValidationError> {
        let payload = Payload::new(value, &["name", "description"])?;
        let fields = Self {
            name: payload.required_str("name")?,
            description: payload.optional_str("description")?,
        };
        fields.validate()?;
        Ok(fields)
    }

    /// Check the field constraints. The store calls this again before every write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::invalid("name", "must not be empty"));
        }
        check_len("name", &self.name, Self::NAME_MAX)?;
        if let Some(description) = &self.description {
            check_len("description", description, Self::DESCRIPTION_MAX)?;
        }
        Ok(())
    }
}
