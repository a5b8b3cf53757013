//! Remote-call plumbing: client abstraction, retries, task polling,
//! and template replication.

#![forbid(unsafe_code)]

pub mod client;
pub mod error;
pub mod replica;
pub mod retry;
pub mod striped;
pub mod task;
pub mod types;

pub use client::{InfrastructureClient, PropertyMap, require_property};
pub use error::{RemoteError, Result};
pub use replica::TemplateReplicator;
pub use retry::{RetryConfig, retry};
pub use striped::IdentityLocks;
pub use task::{PollConfig, TaskWaiter, next_poll_interval};
pub use types::{DiskGeometry, PendingQuestion, TaskHandle, TaskInfo, TaskState};
