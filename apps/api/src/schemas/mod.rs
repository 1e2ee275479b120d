//! Form ↔ row transforms for the dashboard's structured records.
//!
//! Form shapes are what the editing UI works with: camelCase, nested, every
//! field filled with a default. Row shapes are what the store keeps:
//! snake_case, trimmed. `Form::from_row(None)` yields the blank form for a
//! new record.

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::store::{PersistedRecord, Record};

pub mod case;
pub mod category;
pub mod job_offer;
pub mod skill;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid fields: {}", describe(.0))]
    Invalid(Vec<FieldError>),

    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Collects field errors; `finish` fails if any were recorded.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<FieldError>,
}

impl Validator {
    pub fn check(&mut self, ok: bool, field: &str, message: &str) -> &mut Self {
        if !ok {
            self.errors.push(FieldError {
                field: field.to_string(),
                message: message.to_string(),
            });
        }
        self
    }

    /// Length in characters, bounds inclusive.
    pub fn length(&mut self, field: &str, value: &str, min: usize, max: usize) -> &mut Self {
        let len = value.trim().chars().count();
        if len < min {
            let message = if min == 1 {
                "is required".to_string()
            } else {
                format!("must be at least {min} characters")
            };
            self.check(false, field, &message)
        } else if len > max {
            self.check(false, field, &format!("must not exceed {max} characters"))
        } else {
            self
        }
    }

    /// Empty strings are allowed: the form leaves optional links blank.
    pub fn optional_url(&mut self, field: &str, value: &str) -> &mut Self {
        let value = value.trim();
        let ok = value.is_empty()
            || ((value.starts_with("http://") || value.starts_with("https://"))
                && value.len() > "https://".len()
                && !value.contains(char::is_whitespace));
        self.check(ok, field, "must be a valid URL")
    }

    pub fn optional_email(&mut self, field: &str, value: &str) -> &mut Self {
        let value = value.trim();
        let ok = value.is_empty()
            || value
                .split_once('@')
                .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
                .unwrap_or(false);
        self.check(ok, field, "must be a valid email")
    }

    pub fn unit_score(&mut self, field: &str, value: Option<f64>) -> &mut Self {
        let ok = value.map(|v| (0.0..=1.0).contains(&v)).unwrap_or(true);
        self.check(ok, field, "must be between 0 and 1")
    }

    pub fn finish(&mut self) -> Result<(), SchemaError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::Invalid(std::mem::take(&mut self.errors)))
        }
    }
}

/// Serialises a row into a store payload.
pub fn to_record<T: Serialize>(row: &T) -> Result<Record, SchemaError> {
    match serde_json::to_value(row)? {
        Value::Object(map) => Ok(map),
        other => Err(SchemaError::Malformed(<serde_json::Error as serde::ser::Error>::custom(
            format!("expected an object, got {other}"),
        ))),
    }
}

/// Reads a stored record (id folded in) back into a row.
pub fn from_persisted<T: DeserializeOwned>(record: &PersistedRecord) -> Result<T, SchemaError> {
    Ok(serde_json::from_value(Value::Object(record.to_record()))?)
}

/// `None` for missing or blank strings, mirroring the form's `value || default`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
