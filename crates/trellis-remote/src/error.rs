//! Error types for remote infrastructure interaction.

use thiserror::Error;

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Errors from the infrastructure client boundary and the task
/// machinery built on top of it.
///
/// `TaskTimeout` is deliberately distinct from `TaskFailed`: a timeout
/// only means this process stopped waiting, the remote operation keeps
/// running and its true outcome must be reconciled by re-querying.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// An infrastructure call failed (connectivity, API error). The
    /// transient cases are absorbed by the bounded retry wrapper; this
    /// surfaces only once the retry budget is exhausted.
    #[error("infrastructure call failed: {message}")]
    Client {
        /// Error reported by the client.
        message: String,
    },

    /// A property lookup ran in ensure mode and a required attribute
    /// was absent.
    #[error("required property {name} missing on {object}")]
    MissingProperty {
        /// Remote object the lookup targeted.
        object: String,
        /// Name of the missing attribute.
        name: String,
    },

    /// The infrastructure reported the task in its error state.
    #[error("remote task failed: {message}")]
    TaskFailed {
        /// Error message reported by the task.
        message: String,
    },

    /// The local wall-clock budget ran out while polling; the remote
    /// operation's outcome is unknown.
    #[error("gave up waiting for remote task after {elapsed_secs}s; its outcome is unknown")]
    TaskTimeout {
        /// Seconds spent polling before giving up.
        elapsed_secs: u64,
    },

    /// A named template could not be located in the inventory.
    #[error("template not found: {name}")]
    TemplateNotFound {
        /// The missing template name.
        name: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_timeout_is_distinct_from_task_failure() {
        let timeout = RemoteError::TaskTimeout { elapsed_secs: 3600 };
        let failure = RemoteError::TaskFailed {
            message: "disk is locked".into(),
        };
        assert_ne!(timeout, failure);
        assert_eq!(
            timeout.to_string(),
            "gave up waiting for remote task after 3600s; its outcome is unknown"
        );
        assert_eq!(failure.to_string(), "remote task failed: disk is locked");
    }

    #[test]
    fn missing_property_display() {
        let err = RemoteError::MissingProperty {
            object: "vm-42".into(),
            name: "runtime.host".into(),
        };
        assert_eq!(
            err.to_string(),
            "required property runtime.host missing on vm-42"
        );
    }
}
