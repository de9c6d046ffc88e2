//! Inbound notification model.
//!
//! Devices post loosely shaped JSON. Each entry is first captured as a
//! [`NotificationEntry`] whose fields keep their raw JSON value, so absent,
//! empty and falsy can be told apart. [`NotificationEntry::validate`] then
//! produces a strongly typed [`Notification`] or a [`ValidationError`].

use serde::Deserialize;
use serde_json::Value;

use crate::errors::ValidationError;

/// Display value used for call fields that were not supplied.
pub const UNKNOWN_FIELD: &str = "Unknown";

/// One batch entry as received.
///
/// A JSON `null` is treated the same as an absent field. Unknown fields are
/// ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationEntry {
    #[serde(default)]
    pub ids: Option<Value>,
    #[serde(default)]
    pub sms: Option<Value>,
    #[serde(default)]
    pub call: Option<Value>,
    #[serde(default)]
    pub from: Option<Value>,
    #[serde(default)]
    pub to: Option<Value>,
}

/// What a notification says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Sms(String),
    Call { from: String, to: String },
}

/// A validated entry: at least one recipient and exactly one content kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub content: Content,
}

/// JSON truthiness: `null`, `false`, `0`, `""`, `[]` and `{}` are falsy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn present(field: &Option<Value>) -> Option<&Value> {
    field.as_ref().filter(|v| is_truthy(v))
}

/// Text form of a scalar: strings verbatim, anything else as JSON.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Split a comma-separated recipient list, trimming and dropping blanks.
pub fn parse_recipients(ids: &str) -> Vec<String> {
    ids.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_owned)
        .collect()
}

impl NotificationEntry {
    /// Capture one element of the batch array.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        if !value.is_object() {
            return Err(ValidationError::NotAnObject);
        }
        serde_json::from_value(value).map_err(|_| ValidationError::NotAnObject)
    }

    /// The content this entry carries, if any.
    ///
    /// A truthy `sms` wins over `call`. A `call` that is present but falsy
    /// (`false`, `""`) suppresses the call branch entirely.
    pub fn content(&self) -> Option<Content> {
        if let Some(sms) = present(&self.sms) {
            return Some(Content::Sms(display(sms)));
        }
        if present(&self.call).is_some() {
            let field = |v: &Option<Value>| {
                v.as_ref()
                    .map(display)
                    .unwrap_or_else(|| UNKNOWN_FIELD.to_owned())
            };
            return Some(Content::Call {
                from: field(&self.from),
                to: field(&self.to),
            });
        }
        None
    }

    /// Parse the recipient list.
    ///
    /// Numeric `ids` are accepted as a single identifier; other non-string
    /// values are rejected.
    pub fn recipients(&self) -> Result<Vec<String>, ValidationError> {
        let ids = present(&self.ids).ok_or(ValidationError::MissingIds)?;
        let ids = match ids {
            Value::String(s) => parse_recipients(s),
            Value::Number(n) => vec![n.to_string()],
            _ => return Err(ValidationError::InvalidIds),
        };
        if ids.is_empty() {
            return Err(ValidationError::NoRecipients);
        }
        Ok(ids)
    }

    /// Recipients are checked before content.
    pub fn validate(&self) -> Result<Notification, ValidationError> {
        let recipients = self.recipients()?;
        let content = self.content().ok_or(ValidationError::MissingContent)?;
        Ok(Notification {
            recipients,
            content,
        })
    }
}
