//! Client trait abstracting the infrastructure control-plane API.
//!
//! Every remote call in this workspace goes through
//! [`InfrastructureClient`], so higher layers can be exercised against
//! in-memory fakes while production wires in a real transport.

use std::collections::HashMap;

use trellis_resources::ManagedRef;

use crate::error::{RemoteError, Result};
use crate::types::{DiskGeometry, TaskHandle, TaskInfo};

/// Property bag returned for one managed object.
pub type PropertyMap = HashMap<String, serde_json::Value>;

/// Reads a required attribute from one object's property bag.
///
/// This is the ensure-mode failure shape: clients implementing
/// [`InfrastructureClient::properties`] with `ensure_all` set report an
/// absent attribute through the same error, and callers use this helper
/// to enforce it on results of non-ensure lookups.
pub fn require_property<'a>(
    object: &ManagedRef,
    properties: &'a PropertyMap,
    name: &str,
) -> Result<&'a serde_json::Value> {
    properties
        .get(name)
        .ok_or_else(|| RemoteError::MissingProperty {
            object: object.to_string(),
            name: name.to_string(),
        })
}

/// Control-plane operations the placement and disk layers depend on.
///
/// Mutating calls return a [`TaskHandle`] immediately; callers observe
/// completion through [`task_info`](InfrastructureClient::task_info),
/// usually via [`TaskWaiter`](crate::task::TaskWaiter).
pub trait InfrastructureClient: Send + Sync {
    /// Fetches the named properties of each object in one round trip.
    ///
    /// With `ensure_all` set, a property missing on any object is an
    /// error; otherwise absent properties are simply omitted from that
    /// object's map.
    fn properties(
        &self,
        objects: &[ManagedRef],
        names: &[&str],
        ensure_all: bool,
    ) -> impl Future<Output = Result<HashMap<ManagedRef, PropertyMap>>> + Send;

    /// Reads the current status of a task.
    fn task_info(&self, task: &TaskHandle) -> impl Future<Output = Result<TaskInfo>> + Send;

    /// Answers a question that is blocking a task.
    fn answer(
        &self,
        task: &TaskHandle,
        question_id: &str,
        choice: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Starts creating a virtual disk at `path` on the datastore.
    fn create_disk(
        &self,
        datastore: &ManagedRef,
        path: &str,
        size_kb: u64,
    ) -> impl Future<Output = Result<TaskHandle>> + Send;

    /// Starts moving (or copying, when `copy` is set) a virtual disk.
    fn move_disk(
        &self,
        source: &str,
        destination: &str,
        copy: bool,
    ) -> impl Future<Output = Result<TaskHandle>> + Send;

    /// Starts deleting a virtual disk.
    fn delete_disk(&self, path: &str) -> impl Future<Output = Result<TaskHandle>> + Send;

    /// Probes a path for a virtual disk, returning its geometry if one
    /// exists there.
    fn query_disk(&self, path: &str) -> impl Future<Output = Result<Option<DiskGeometry>>> + Send;

    /// Looks up a VM by inventory name.
    fn find_vm(&self, name: &str) -> impl Future<Output = Result<Option<ManagedRef>>> + Send;

    /// Starts cloning `source` into a new VM named `name` backed by the
    /// given datastore.
    fn clone_vm(
        &self,
        source: &ManagedRef,
        name: &str,
        datastore: &ManagedRef,
    ) -> impl Future<Output = Result<TaskHandle>> + Send;
}
