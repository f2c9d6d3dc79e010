//! Canonical data structure for a single security event.
//!
//! Events arrive from the store as loosely typed JSON documents. They are
//! converted into [`SecurityEvent`] at the repository boundary; any keys this
//! struct does not model are kept in `extra` so nothing the store sent is lost
//! when the event is re-serialised.

use serde_json::{Map, Value};

/// One observed security-relevant occurrence.
///
/// Optional fields are `None` when the document lacks them or carries
/// `null`; they are never conflated with the empty string. `raw_log` is the
/// exception and defaults to `""`.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SecurityEvent {
    /// Store-assigned identifier, kept opaque.
    #[serde(rename = "_id")]
    pub id: Option<Value>,

    /// ISO-8601-like timestamp string. Not validated; compared as text.
    pub timestamp: String,

    /// Host the event was observed on.
    pub hostname: String,

    /// Producer of the event (agent, log file, sensor...).
    pub source: String,

    /// Event kind, e.g. `user_login` or `process_start`.
    pub event_type: String,

    /// Severity label as emitted by the producer.
    pub severity: String,

    /// Account associated with the event, if any.
    pub user: Option<String>,

    /// Process name associated with the event, if any.
    pub process: Option<String>,

    /// Command line associated with the event, if any.
    pub command: Option<String>,

    /// Original log line.
    pub raw_log: String,

    /// Document keys not modelled above (e.g. `agent_last_seen`).
    #[serde(flatten)]
    pub extra: Map<String, Value>,

    /// Which label fields the document lacked (or carried as `null`).
    #[serde(skip)]
    pub absent: AbsentLabels,
}

/// Label fields missing from the source document, as opposed to present but
/// empty. Dashboard grouping reports the two differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbsentLabels {
    pub hostname: bool,
    pub source: bool,
    pub event_type: bool,
    pub severity: bool,
}

impl SecurityEvent {
    /// Build an event from a store document.
    ///
    /// Strings are taken as-is, numbers and booleans are stringified, and
    /// `null` or missing keys become `""` (required fields) or `None`
    /// (optional fields). A non-object document yields an empty event.
    pub fn from_document(document: Value) -> Self {
        let mut fields = match document {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        let id = fields.remove("_id").filter(|value| !value.is_null());

        let mut take = |key: &str| fields.remove(key).and_then(value_to_text);
        let timestamp = take("timestamp").unwrap_or_default();
        let hostname = take("hostname");
        let source = take("source");
        let event_type = take("event_type");
        let severity = take("severity");
        let user = take("user");
        let process = take("process");
        let command = take("command");
        let raw_log = take("raw_log").unwrap_or_default();

        let absent = AbsentLabels {
            hostname: hostname.is_none(),
            source: source.is_none(),
            event_type: event_type.is_none(),
            severity: severity.is_none(),
        };

        Self {
            id,
            timestamp,
            hostname: hostname.unwrap_or_default(),
            source: source.unwrap_or_default(),
            event_type: event_type.unwrap_or_default(),
            severity: severity.unwrap_or_default(),
            user,
            process,
            command,
            raw_log,
            extra: fields,
            absent,
        }
    }

    /// Re-serialise into the store's document shape.
    pub fn to_document(&self) -> Value {
        // Serialising plain strings, options and a JSON map cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Text value of a named field for filtering and export.
    ///
    /// Absent optional fields read as `""`. Unmodelled keys are looked up in
    /// `extra`.
    pub fn field_text(&self, name: &str) -> String {
        match name {
            "_id" => self.id.clone().and_then(value_to_text).unwrap_or_default(),
            "timestamp" => self.timestamp.clone(),
            "hostname" => self.hostname.clone(),
            "source" => self.source.clone(),
            "event_type" => self.event_type.clone(),
            "severity" => self.severity.clone(),
            "user" => self.user.clone().unwrap_or_default(),
            "process" => self.process.clone().unwrap_or_default(),
            "command" => self.command.clone().unwrap_or_default(),
            "raw_log" => self.raw_log.clone(),
            other => self
                .extra
                .get(other)
                .cloned()
                .and_then(value_to_text)
                .unwrap_or_default(),
        }
    }

    /// The fields searched by the free-text filter, in search order.
    pub fn searchable_fields(&self) -> [&str; 8] {
        [
            self.hostname.as_str(),
            self.source.as_str(),
            self.event_type.as_str(),
            self.severity.as_str(),
            self.user.as_deref().unwrap_or_default(),
            self.process.as_deref().unwrap_or_default(),
            self.command.as_deref().unwrap_or_default(),
            self.raw_log.as_str(),
        ]
    }

    /// `agent_last_seen` from the document, falling back to the event's own
    /// timestamp.
    pub fn agent_last_seen(&self) -> &str {
        self.extra
            .get("agent_last_seen")
            .and_then(Value::as_str)
            .unwrap_or(self.timestamp.as_str())
    }
}

/// Text form of a scalar JSON value. `null` is `None`; arrays and objects
/// use their compact JSON text.
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
