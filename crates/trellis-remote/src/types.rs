//! Task value objects exchanged with the infrastructure client.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token for an in-flight asynchronous remote mutation. The
/// infrastructure owns the task; this core only polls it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(String);

impl TaskHandle {
    /// Wraps a raw task token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reported state of a remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Accepted, not yet running.
    Queued,
    /// In progress.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with an error.
    Error,
}

impl TaskState {
    /// Whether the task has reached a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

/// An interactive question blocking a remote operation: the
/// infrastructure is waiting for operator input before continuing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    /// Question identity, echoed back when answering.
    pub id: String,
    /// Question text.
    pub text: String,
}

/// Status snapshot of a remote task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Current state.
    pub state: TaskState,
    /// Self-reported completion percentage (0–100).
    pub progress_percent: u8,
    /// Result payload, present on success.
    pub result: Option<serde_json::Value>,
    /// Error message, present on error.
    pub error_message: Option<String>,
    /// Question blocking the operation, if any.
    pub question: Option<PendingQuestion>,
}

impl TaskInfo {
    /// A queued task.
    #[must_use]
    pub fn queued() -> Self {
        Self {
            state: TaskState::Queued,
            progress_percent: 0,
            result: None,
            error_message: None,
            question: None,
        }
    }

    /// A running task at the given progress.
    #[must_use]
    pub fn running(progress_percent: u8) -> Self {
        Self {
            state: TaskState::Running,
            progress_percent,
            ..Self::queued()
        }
    }

    /// A successfully finished task with an optional result payload.
    #[must_use]
    pub fn success(result: Option<serde_json::Value>) -> Self {
        Self {
            state: TaskState::Success,
            progress_percent: 100,
            result,
            ..Self::queued()
        }
    }

    /// A failed task with the infrastructure-provided message.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            state: TaskState::Error,
            error_message: Some(message.into()),
            ..Self::queued()
        }
    }

    /// Attaches a blocking question.
    #[must_use]
    pub fn with_question(mut self, id: impl Into<String>, text: impl Into<String>) -> Self {
        self.question = Some(PendingQuestion {
            id: id.into(),
            text: text.into(),
        });
        self
    }
}

/// Geometry answered by a datastore that holds the probed disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskGeometry {
    /// Disk capacity in KB.
    pub capacity_kb: u64,
}
