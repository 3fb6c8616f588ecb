use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use ink_core::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ts;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    #[default]
    String,
    Integer,
    Boolean,
    Json,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::String => "string",
            SettingType::Integer => "integer",
            SettingType::Boolean => "boolean",
            SettingType::Json => "json",
        }
    }

    /// The type a JSON value is stored as.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => SettingType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => SettingType::Integer,
            Value::String(_) => SettingType::String,
            _ => SettingType::Json,
        }
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "string" => Ok(SettingType::String),
            "integer" => Ok(SettingType::Integer),
            "boolean" => Ok(SettingType::Boolean),
            "json" => Ok(SettingType::Json),
            other => Err(format!("unknown setting type '{other}'")),
        }
    }
}

/// A per-tenant key/value pair; values are kept in their string form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub id: u64,
    pub tenant_id: TenantId,
    pub key: String,
    pub value: String,
    pub data_type: SettingType,
    pub description: Option<String>,
    /// Exposed to public templates.
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Setting {
    /// The stored string converted back to its declared type.
    ///
    /// Values that don't parse as their type come back as strings.
    pub fn typed_value(&self) -> Value {
        match self.data_type {
            SettingType::String => Value::String(self.value.clone()),
            SettingType::Integer => self
                .value
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| Value::String(self.value.clone())),
            SettingType::Boolean => Value::Bool(matches!(
                self.value.trim().to_ascii_lowercase().as_str(),
                "true" | "1" | "yes" | "on"
            )),
            SettingType::Json => {
                serde_json::from_str(&self.value).unwrap_or_else(|_| Value::String(self.value.clone()))
            }
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "key": self.key,
            "value": self.typed_value(),
            "data_type": self.data_type,
            "description": self.description,
            "is_public": self.is_public,
            "created_at": ts(&self.created_at),
            "updated_at": ts(&self.updated_at),
        })
    }
}

/// String form a JSON value is stored under.
pub fn stored_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
