//! On-demand template replication onto target datastores.
//!
//! A template VM can only be cloned efficiently from a datastore the
//! target host can reach, so before first use on a datastore we clone
//! a local replica there. Replicas are named deterministically from
//! the template name and a datastore token; a lookup by that name
//! doubles as the "already replicated" check.

use tracing::{debug, info};
use trellis_resources::ManagedRef;

use crate::client::InfrastructureClient;
use crate::error::{RemoteError, Result};
use crate::striped::IdentityLocks;
use crate::task::{PollConfig, TaskWaiter};

/// Ensures a template has a local replica on whichever datastore a
/// placement lands on, cloning one the first time it is needed.
pub struct TemplateReplicator<'a, C> {
    client: &'a C,
    locks: IdentityLocks,
    poll: PollConfig,
}

impl<'a, C: InfrastructureClient> TemplateReplicator<'a, C> {
    /// Creates a replicator with the given polling policy.
    pub fn new(client: &'a C, poll: PollConfig) -> Self {
        Self {
            client,
            locks: IdentityLocks::new(),
            poll,
        }
    }

    /// Resolves a base template by inventory name.
    ///
    /// # Errors
    ///
    /// [`RemoteError::TemplateNotFound`] when no VM carries the name.
    pub async fn find_template(&self, name: &str) -> Result<ManagedRef> {
        self.client
            .find_vm(name)
            .await?
            .ok_or_else(|| RemoteError::TemplateNotFound {
                name: name.to_string(),
            })
    }

    /// Returns a replica of `template_vm` resident on the datastore
    /// identified by `datastore_token`, cloning one if none exists.
    ///
    /// Concurrent calls for the same replica name serialise on a
    /// per-name lock, and the lookup is repeated under the lock, so at
    /// most one clone task runs per replica.
    pub async fn ensure_replica(
        &self,
        template_vm: &ManagedRef,
        template_name: &str,
        datastore: &ManagedRef,
        datastore_token: &str,
    ) -> Result<ManagedRef> {
        let local_name = format!("{template_name} / {datastore_token}");
        if let Some(existing) = self.client.find_vm(&local_name).await? {
            debug!(replica = %local_name, "template replica already present");
            return Ok(existing);
        }

        let lock = self.locks.entry(&local_name);
        let _guard = lock.lock().await;
        if let Some(existing) = self.client.find_vm(&local_name).await? {
            return Ok(existing);
        }

        info!(template = template_name, replica = %local_name, "replicating template");
        let task = self
            .client
            .clone_vm(template_vm, &local_name, datastore)
            .await?;
        let result = TaskWaiter::new(self.client, self.poll.clone())
            .wait(&task)
            .await?;
        match result.as_ref().and_then(serde_json::Value::as_str) {
            Some(replica) => Ok(ManagedRef::new(replica)),
            None => Err(RemoteError::Client {
                message: format!("clone of '{local_name}' finished without a VM reference"),
            }),
        }
    }
}
