//! Input validation for service payloads.
//!
//! Payloads are deserialized into a `validator::Validate` struct; any
//! failure becomes a 422 whose `errors` maps field paths to messages.

use std::collections::BTreeMap;

use anyhow::Result;
use ink_core::errors::InkError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Field path → messages, in a stable order.
#[derive(Debug, Default)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_json(&self) -> Value {
        json!(self.0)
    }

    pub fn into_unprocessable(self, message: &str) -> anyhow::Error {
        InkError::unprocessable(message)
            .with_errors(self.to_json())
            .into_anyhow()
    }

    /// `Ok` when nothing was pushed.
    pub fn finish(self, message: &str) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self.into_unprocessable(message))
        }
    }
}

fn friendly_message(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some("is required"),
        "email" => Some("must be a valid email"),
        "length" => Some("has invalid length"),
        "range" => Some("is out of range"),
        "url" => Some("must be a valid URL"),
        "blank" => Some("must not be blank"),
        _ => None,
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{prefix}.{field}")
    }
}

fn push_validation_errors(out: &mut FieldErrors, prefix: &str, errs: &ValidationErrors) {
    for (field, kind) in errs.errors() {
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let key = join_path(prefix, field);
                for e in field_errors {
                    let msg = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .or_else(|| friendly_message(&e.code).map(str::to_string))
                        .unwrap_or_else(|| e.code.to_string());
                    out.push(key.clone(), msg);
                }
            }
            ValidationErrorsKind::Struct(nested) => {
                push_validation_errors(out, &join_path(prefix, field), nested.as_ref());
            }
            ValidationErrorsKind::List(items) => {
                let base = join_path(prefix, field);
                for (idx, nested) in items {
                    push_validation_errors(out, &format!("{base}[{idx}]"), nested.as_ref());
                }
            }
        }
    }
}

/// Deserialize and validate `data` as `T`.
pub fn validate<T>(data: &Value, error_message: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(data.clone()).map_err(|e| {
        let mut errors = FieldErrors::default();
        errors.push("_schema", e.to_string());
        errors.into_unprocessable(error_message)
    })?;

    if let Err(e) = parsed.validate() {
        let mut errors = FieldErrors::default();
        push_validation_errors(&mut errors, "", &e);
        return Err(errors.into_unprocessable(error_message));
    }

    Ok(parsed)
}

/// Field validator rejecting whitespace-only strings.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("blank"))
    } else {
        Ok(())
    }
}

/// Tells a missing field (`None`) apart from an explicit `null`
/// (`Some(None)`). Use with `#[serde(default)]`.
pub fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

/// `None` for missing or blank strings, trimmed otherwise.
pub fn clean(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}
