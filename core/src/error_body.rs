//! Classification of JSON error bodies returned by the backend.
//!
//! The backend speaks three error dialects: `{"detail": ...}` for framework
//! errors, `{"field": ["msg", ...], ...}` for validation failures and
//! `{"error": "msg"}` from hand-written views. `ErrorBody::parse` maps a body
//! onto exactly one of them. `ErrorBody::message_or` turns that into the
//! string shown to the user for intake and completion, where only `detail`
//! and field errors count; `ErrorBody::login_message_or` also accepts the
//! `error` key.
//!
//! Key order matters for field errors (the first field reported wins), which
//! is why the crate enables serde_json's `preserve_order` feature.

use serde_json::{Map, Value};

/// Validation messages reported for one request field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorBody {
    Detail(String),
    /// In document order. Only array-valued entries are kept.
    FieldErrors(Vec<FieldError>),
    Message(String),
    Unknown,
}

impl ErrorBody {
    /// Never fails: unreadable bodies are `Unknown`.
    pub fn parse(body: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => Self::from_object(&map),
            _ => ErrorBody::Unknown,
        }
    }

    fn from_object(map: &Map<String, Value>) -> Self {
        let detail = match map.get("detail") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Array(items)) => items.first().and_then(Value::as_str).map(str::to_string),
            _ => None,
        };
        if let Some(detail) = detail.filter(|d| !d.is_empty()) {
            return ErrorBody::Detail(detail);
        }

        if matches!(map.values().next(), Some(Value::Array(_))) {
            let fields = map
                .iter()
                .filter_map(|(field, value)| {
                    let items = value.as_array()?;
                    Some(FieldError {
                        field: field.clone(),
                        messages: items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                    })
                })
                .collect();
            return ErrorBody::FieldErrors(fields);
        }

        match map.get("error") {
            Some(Value::String(s)) => ErrorBody::Message(s.clone()),
            _ => ErrorBody::Unknown,
        }
    }

    /// `detail`, else the first field's first message, else `fallback`.
    /// An `error` message is not shown.
    pub fn message_or(&self, fallback: &str) -> String {
        let message = match self {
            ErrorBody::Detail(s) => Some(s.as_str()),
            ErrorBody::FieldErrors(fields) => fields
                .first()
                .and_then(|f| f.messages.first())
                .map(String::as_str),
            ErrorBody::Message(_) | ErrorBody::Unknown => None,
        };
        or_fallback(message, fallback)
    }

    /// Like `message_or`, but an `error` message is shown too.
    pub fn login_message_or(&self, fallback: &str) -> String {
        match self {
            ErrorBody::Message(s) => or_fallback(Some(s.as_str()), fallback),
            other => other.message_or(fallback),
        }
    }
}

fn or_fallback(message: Option<&str>, fallback: &str) -> String {
    match message {
        Some(m) if !m.is_empty() => m.to_string(),
        _ => fallback.to_string(),
    }
}
