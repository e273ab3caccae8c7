//! Hook point definitions with their dispatch contracts and payloads.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the dispatcher threads a payload through the plugins of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Each plugin's output is the next plugin's input; a plugin may terminate.
    Chain,
    /// Every plugin sees the same input; results are collected per plugin.
    FanOut,
}

/// Enumeration of all hook points in the workflow pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPoint {
    // ── Step envelope ──
    /// Fired before a workflow step starts. Can transform or terminate.
    PreStep,

    // ── Workflow stages ──
    /// Converts external input into a workflow message.
    Input,
    /// Parses the message into structured data.
    Parse,
    /// Reasoning stage (prompting, planning).
    Think,
    /// Action stage (tool execution).
    Do,
    /// Validation of the produced result.
    Review,
    /// Converts the result into an external representation.
    Output,

    // ── Observation ──
    /// Fired after a workflow step completes.
    PostStep,
    /// Fired when the host pipeline hits an error.
    OnError,
    /// Fired before the host shuts the plugin set down.
    OnShutdown,
}

impl HookPoint {
    /// The workflow stages in pipeline order.
    pub const STAGES: [HookPoint; 6] = [
        Self::Input,
        Self::Parse,
        Self::Think,
        Self::Do,
        Self::Review,
        Self::Output,
    ];

    /// Every hook point.
    pub const ALL: [HookPoint; 10] = [
        Self::PreStep,
        Self::Input,
        Self::Parse,
        Self::Think,
        Self::Do,
        Self::Review,
        Self::Output,
        Self::PostStep,
        Self::OnError,
        Self::OnShutdown,
    ];

    /// Returns the string name of this hook point.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreStep => "pre_step",
            Self::Input => "input",
            Self::Parse => "parse",
            Self::Think => "think",
            Self::Do => "do",
            Self::Review => "review",
            Self::Output => "output",
            Self::PostStep => "post_step",
            Self::OnError => "on_error",
            Self::OnShutdown => "on_shutdown",
        }
    }

    /// Returns the dispatch mode fixed for this hook point.
    pub fn mode(&self) -> DispatchMode {
        match self {
            Self::PreStep
            | Self::Input
            | Self::Parse
            | Self::Think
            | Self::Do
            | Self::Review
            | Self::Output => DispatchMode::Chain,
            Self::PostStep | Self::OnError | Self::OnShutdown => DispatchMode::FanOut,
        }
    }

    /// Returns whether plugins are visited in reverse activation order.
    ///
    /// Error and teardown-class hooks unwind like a stack.
    pub fn is_reverse_ordered(&self) -> bool {
        matches!(self, Self::OnError | Self::OnShutdown)
    }
}

impl std::fmt::Display for HookPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload passed to hook handlers.
///
/// In chain mode the payload returned by one plugin is handed to the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookPayload {
    /// The hook point being fired.
    pub hook: HookPoint,
    /// Correlates all payloads of one host pipeline run.
    pub dispatch_id: Uuid,
    /// The workflow message.
    pub message: String,
    /// Arbitrary data keyed by string.
    pub data: HashMap<String, serde_json::Value>,
    /// Messages the plugins asked the host to emit, in order.
    pub responses: Vec<String>,
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,
}

impl HookPayload {
    /// Creates a new hook payload.
    pub fn new(hook: HookPoint) -> Self {
        Self {
            hook,
            dispatch_id: Uuid::now_v7(),
            message: String::new(),
            data: HashMap::new(),
            responses: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Re-targets the payload at another hook point, keeping message, data
    /// and responses.
    pub fn retarget(mut self, hook: HookPoint) -> Self {
        self.hook = hook;
        self.timestamp = Utc::now();
        self
    }

    /// Sets the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Inserts a data value.
    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    /// Inserts a string value.
    pub fn with_string(self, key: &str, value: &str) -> Self {
        self.with_data(key, serde_json::json!(value))
    }

    /// Inserts an integer value.
    pub fn with_int(self, key: &str, value: i64) -> Self {
        self.with_data(key, serde_json::json!(value))
    }

    /// Sets a data value in place.
    pub fn insert(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }

    /// Queues a message for the host to emit.
    pub fn say(&mut self, message: impl Into<String>) {
        self.responses.push(message.into());
    }

    /// Gets a data value by key.
    pub fn get_data(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Gets a string data value.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| v.as_str())
    }

    /// Gets an i64 data value.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.data.get(key).and_then(|v| v.as_i64())
    }
}

/// Action returned by a hook handler telling the dispatcher what to do next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookAction {
    /// Continue to the next plugin.
    Continue,
    /// Stop the chain; remaining plugins are skipped.
    ///
    /// Ignored for fan-out hooks.
    Terminate {
        /// Reason for terminating.
        reason: String,
    },
}

/// Result returned from a hook handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookResult {
    /// The action the handler wants the dispatcher to take.
    pub action: HookAction,
    /// The (possibly transformed) payload.
    pub payload: HookPayload,
}

impl HookResult {
    /// Continue the chain with this payload.
    pub fn continue_with(payload: HookPayload) -> Self {
        Self {
            action: HookAction::Continue,
            payload,
        }
    }

    /// Terminate the chain; this payload becomes the chain result.
    pub fn terminate(payload: HookPayload, reason: &str) -> Self {
        Self {
            action: HookAction::Terminate {
                reason: reason.to_string(),
            },
            payload,
        }
    }

    /// Returns whether the handler asked to terminate.
    pub fn is_terminate(&self) -> bool {
        matches!(self.action, HookAction::Terminate { .. })
    }
}
