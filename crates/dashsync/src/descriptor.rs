use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::connector::ConnectorError;

/// Input widget type of a configuration field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Password,
    Number,
}

/// One configuration field a connector declares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub key: String,
    pub label: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl FieldDescriptor {
    pub fn new(key: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            kind,
            default: None,
            placeholder: None,
            help: None,
        }
    }

    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Text)
    }

    pub fn password(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Password)
    }

    pub fn number(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self::new(key, label, FieldKind::Number)
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

/// Static metadata a connector variant exposes. Carries no runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl ConnectorDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            icon: icon.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_fields(mut self, fields: Vec<FieldDescriptor>) -> Self {
        self.fields = fields;
        self
    }

    /// Check the descriptor is registrable. Returns a reason when it is not.
    pub fn check(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("connector id is empty".into());
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.key == field.key) {
                return Err(format!("duplicate field key '{}'", field.key));
            }
        }
        Ok(())
    }
}

/// Fill defaults and convert field values to their declared types.
///
/// Absent keys take the field default. `number` fields given as strings are
/// parsed into JSON numbers; an empty string counts as absent. Keys the
/// descriptor does not mention pass through untouched.
pub fn prepare_config(
    fields: &[FieldDescriptor],
    config: &Map<String, Value>,
) -> Result<Map<String, Value>, ConnectorError> {
    let mut prepared = config.clone();

    for field in fields {
        let current = prepared.get(&field.key).cloned();
        let value = match (current, field.kind) {
            (None | Some(Value::Null), _) => field.default.clone(),
            (Some(Value::String(s)), FieldKind::Number) if s.trim().is_empty() => {
                field.default.clone()
            }
            (Some(Value::String(s)), FieldKind::Number) => Some(parse_number(&s).ok_or_else(
                || ConnectorError::Config(format!("'{}' must be a number, got '{s}'", field.label)),
            )?),
            (Some(other), _) => Some(other),
        };

        if let Some(value) = value {
            prepared.insert(field.key.clone(), value);
        }
    }

    Ok(prepared)
}

fn parse_number(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(Value::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}
