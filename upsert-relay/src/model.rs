use crate::errors::ValidationError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One name/value pair entered in the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
}

impl Field {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Body of an inbound save.
///
/// Missing members deserialize as empty so that they are reported by
/// [`SaveRequest::validate`] with a precise rule instead of a parse error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    #[serde(default)]
    pub email_name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

impl SaveRequest {
    pub fn new(email_name: impl Into<String>, fields: Vec<Field>) -> Self {
        SaveRequest {
            email_name: email_name.into(),
            fields,
        }
    }

    /// Checks the request, reporting the first rule it breaks.
    pub fn validate(&self, max_fields: usize) -> Result<(), ValidationError> {
        if is_blank(&self.email_name) {
            return Err(ValidationError::EmptyEmailName);
        }
        if self.fields.is_empty() {
            return Err(ValidationError::NoFields);
        }
        if self.fields.len() > max_fields {
            return Err(ValidationError::TooManyFields {
                count: self.fields.len(),
                max: max_fields,
            });
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for (index, field) in self.fields.iter().enumerate() {
            if is_blank(&field.name) {
                return Err(ValidationError::EmptyFieldName { index });
            }
            if is_blank(&field.value) {
                return Err(ValidationError::EmptyFieldValue {
                    name: field.name.clone(),
                });
            }
            if !seen.insert(field.name.to_lowercase()) {
                return Err(ValidationError::DuplicateFieldName {
                    name: field.name.clone(),
                });
            }
        }

        Ok(())
    }

    /// Expands the request into one row per field, all sharing
    /// `entry_timestamp`.
    pub fn into_rows(self, entry_timestamp: &str) -> Vec<Row> {
        let email_name = self.email_name;
        self.fields
            .into_iter()
            .map(|field| Row {
                email_name: email_name.clone(),
                field_name: field.name,
                field_value: field.value,
                entry_timestamp: entry_timestamp.to_string(),
            })
            .collect()
    }
}

/// A row of the target data extension. `(email_name, field_name)` is its
/// primary key upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub email_name: String,
    pub field_name: String,
    pub field_value: String,
    pub entry_timestamp: String,
}

/// Renders the generation time the way it is stored upstream,
/// e.g. `2026-10-19T12:00:00.000Z`.
pub fn format_entry_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveResult {
    pub rows_submitted: usize,
    pub entry_timestamp: String,
    /// Whatever the platform returned on success, untouched.
    pub upstream: Option<serde_json::Value>,
}
