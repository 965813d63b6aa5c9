//! Function definitions, run records, message envelopes and capability results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::ids::ObjectId;

/// Log line opening every run record
pub const STARTED_MARKER: &str = "Function started";

/// Log line appended when a run finishes
pub const COMPLETED_MARKER: &str = "Function completed";

/// Trigger topic that binds a function to HTTP requests
pub const WEB_TRIGGER: &str = "web";

/// Event class that invokes a function
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// HTTP request
    Web,
    /// Named system event or pub/sub topic
    Topic(String),
}

impl TriggerKind {
    /// Parse the stored trigger text
    pub fn parse(trigger: &str) -> Self {
        if trigger == WEB_TRIGGER {
            TriggerKind::Web
        } else {
            TriggerKind::Topic(trigger.to_string())
        }
    }

    /// Stored trigger text
    pub fn as_str(&self) -> &str {
        match self {
            TriggerKind::Web => WEB_TRIGGER,
            TriggerKind::Topic(topic) => topic,
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-version record of a tenant function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecData {
    /// Function identifier
    pub id: ObjectId,
    /// Display name
    pub function_name: String,
    /// Trigger text: `web` or an event/topic name
    pub trigger_topic: String,
    /// Script source
    pub code: String,
    /// Version number
    pub version: i32,
    /// Owning tenant base
    pub base_id: String,
    /// Last modification time
    pub last_updated: DateTime<Utc>,
}

impl ExecData {
    /// Create a version-1 definition
    pub fn new(
        function_name: impl Into<String>,
        trigger_topic: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            id: ObjectId::new(),
            function_name: function_name.into(),
            trigger_topic: trigger_topic.into(),
            code: code.into(),
            version: 1,
            base_id: String::new(),
            last_updated: Utc::now(),
        }
    }

    /// Set the owning base
    pub fn with_base(mut self, base_id: impl Into<String>) -> Self {
        self.base_id = base_id.into();
        self
    }

    /// Set the version number
    pub fn with_version(mut self, version: i32) -> Self {
        self.version = version;
        self
    }

    /// Parsed trigger kind
    pub fn trigger(&self) -> TriggerKind {
        TriggerKind::parse(&self.trigger_topic)
    }
}

/// Audit entry for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecHistory {
    /// Run identifier
    pub id: String,
    /// Function version that ran
    pub version: i32,
    /// Start time
    pub started: DateTime<Utc>,
    /// Completion time, set by the completion recorder
    pub completed: Option<DateTime<Utc>>,
    /// Whether the entry point returned without throwing
    pub success: bool,
    /// Ordered log lines
    pub output: Vec<String>,
}

impl ExecHistory {
    /// Open a run for the given function version
    pub fn start(version: i32) -> Self {
        Self {
            id: ObjectId::new().to_hex(),
            version,
            started: Utc::now(),
            completed: None,
            success: false,
            output: vec![STARTED_MARKER.to_string()],
        }
    }

    /// Close the run with the invocation outcome
    pub fn finish(&mut self, error: Option<&str>) {
        self.completed = Some(Utc::now());
        self.success = error.is_none();
        self.output.push(COMPLETED_MARKER.to_string());
        if let Some(message) = error {
            self.output.push(message.to_string());
        }
    }
}

/// Message published to the real-time bus from within a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Source function identifier
    pub sid: String,
    /// Message type tag
    #[serde(rename = "type")]
    pub msg_type: String,
    /// JSON-encoded payload
    pub data: String,
    /// Target channel
    pub channel: String,
    /// Bearer token of the triggering caller
    pub token: String,
}

/// Uniform value every capability returns to the script.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CapabilityResult {
    /// Whether the operation succeeded
    pub ok: bool,
    /// Operation data, or a failure message
    pub content: Value,
}

impl CapabilityResult {
    /// Successful result carrying data
    pub fn success(content: Value) -> Self {
        Self { ok: true, content }
    }

    /// Soft failure carrying a human-readable message
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            content: Value::String(message.into()),
        }
    }
}
