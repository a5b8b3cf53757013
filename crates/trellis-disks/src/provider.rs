//! Disk provisioning against the remote infrastructure.

use tracing::{debug, info};
use trellis_remote::{InfrastructureClient, PollConfig, RetryConfig, TaskWaiter, retry};
use trellis_resources::Resources;
use uuid::Uuid;

use crate::error::{DiskError, Result};
use crate::types::Disk;

/// Disk provider settings.
#[derive(Debug, Clone)]
pub struct DiskConfig {
    /// Datastore folder that holds every managed disk.
    pub folder: String,
    /// Leave the source disk in place when relocating (copy instead of
    /// move). The source is then reclaimed out of band.
    pub copy_on_move: bool,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            folder: "trellis_disks".to_string(),
            copy_on_move: false,
        }
    }
}

/// Creates, finds, and relocates standalone persistent disks.
///
/// Placement decisions come from the shared [`Resources`] ledger; every
/// remote mutation runs as a single task awaited to completion.
pub struct DiskProvider<'a, C> {
    client: &'a C,
    resources: &'a Resources,
    config: DiskConfig,
    retry: RetryConfig,
    poll: PollConfig,
}

impl<'a, C: InfrastructureClient> DiskProvider<'a, C> {
    /// Creates a provider over the given client and capacity ledger.
    pub fn new(
        client: &'a C,
        resources: &'a Resources,
        config: DiskConfig,
        retry: RetryConfig,
        poll: PollConfig,
    ) -> Self {
        Self {
            client,
            resources,
            config,
            retry,
            poll,
        }
    }

    /// Creates a new persistent disk of `size_mb`, placed on whichever
    /// persistent-eligible datastore has room.
    ///
    /// # Errors
    ///
    /// [`PlacementError::NoDiskSpace`](trellis_resources::PlacementError::NoDiskSpace)
    /// when no datastore fits the disk, or a remote error from the
    /// create task.
    pub async fn create(&self, size_mb: u64) -> Result<Disk> {
        let placement = self.resources.pick_persistent_anywhere(size_mb)?;
        let id = format!("disk-{}", Uuid::new_v4());
        let disk = Disk::new(&id, size_mb, &placement.datastore, &self.config.folder);
        info!(disk = %disk.id, datastore = %disk.datastore, size_mb, "creating persistent disk");
        let task = self
            .client
            .create_disk(&placement.datastore_mob, &disk.path, size_mb * 1024)
            .await
            .map_err(DiskError::from)?;
        self.waiter().wait(&task).await?;
        Ok(disk)
    }

    /// Finds an existing disk by probing each candidate datastore for
    /// its backing path. The size is recovered from the geometry the
    /// hosting datastore reports.
    ///
    /// # Errors
    ///
    /// [`DiskError::NotFound`] when no candidate holds the disk.
    pub async fn find(&self, disk_id: &str, candidates: &[String]) -> Result<Disk> {
        for datastore in candidates {
            let path = Disk::path_for(datastore, &self.config.folder, disk_id);
            let geometry = retry(&self.retry, || self.client.query_disk(&path)).await?;
            if let Some(geometry) = geometry {
                debug!(disk = disk_id, datastore = %datastore, "found persistent disk");
                // Round partial megabytes up so a later relocation
                // never reserves less than the disk's true size.
                return Ok(Disk {
                    id: disk_id.to_string(),
                    size_mb: geometry.capacity_kb.div_ceil(1024),
                    datastore: datastore.clone(),
                    path,
                });
            }
        }
        Err(DiskError::NotFound {
            disk_id: disk_id.to_string(),
        })
    }

    /// Finds a disk and, if its current datastore is not in the
    /// requesting host's accessible set, relocates it to one that is,
    /// chosen within `cluster_name`.
    ///
    /// Already-accessible disks are returned unchanged with no remote
    /// mutation. A relocation is a single remote task covering both
    /// the descriptor and the data.
    ///
    /// # Errors
    ///
    /// [`DiskError::NotFound`] if the disk exists nowhere,
    /// [`DiskError::InconsistentConfig`] if the destination pick falls
    /// outside the accessible set, or capacity/remote errors.
    pub async fn find_and_move(
        &self,
        disk_id: &str,
        cluster_name: &str,
        accessible: &[String],
    ) -> Result<Disk> {
        let candidates = self.all_persistent_datastores();
        let disk = self.find(disk_id, &candidates).await?;
        if accessible.iter().any(|name| *name == disk.datastore) {
            debug!(disk = disk_id, datastore = %disk.datastore, "disk already accessible");
            return Ok(disk);
        }

        let placement = self
            .resources
            .pick_persistent_among(cluster_name, accessible, disk.size_mb)?;
        // The pick is restricted to `accessible`; a destination outside
        // it means the cluster and datastore configuration disagree.
        if !accessible.iter().any(|name| *name == placement.datastore) {
            return Err(DiskError::InconsistentConfig {
                datastore: placement.datastore,
                cluster: cluster_name.to_string(),
            });
        }

        let destination = Disk::new(disk_id, disk.size_mb, &placement.datastore, &self.config.folder);
        info!(
            disk = disk_id,
            source = %disk.datastore,
            destination = %destination.datastore,
            copy = self.config.copy_on_move,
            "relocating persistent disk"
        );
        let task = self
            .client
            .move_disk(&disk.path, &destination.path, self.config.copy_on_move)
            .await
            .map_err(DiskError::from)?;
        self.waiter().wait(&task).await?;
        Ok(destination)
    }

    /// Deletes a disk's remote backing.
    pub async fn delete(&self, disk: &Disk) -> Result<()> {
        info!(disk = %disk.id, datastore = %disk.datastore, "deleting persistent disk");
        let task = self
            .client
            .delete_disk(&disk.path)
            .await
            .map_err(DiskError::from)?;
        self.waiter().wait(&task).await?;
        Ok(())
    }

    fn waiter(&self) -> TaskWaiter<'a, C> {
        TaskWaiter::new(self.client, self.poll.clone())
    }

    /// Every persistent-eligible datastore name across the session's
    /// clusters, deduplicated, in cluster order.
    fn all_persistent_datastores(&self) -> Vec<String> {
        let mut names = Vec::new();
        for cluster in self.resources.cluster_names() {
            if let Ok(datastores) = self.resources.persistent_datastore_names(&cluster) {
                for name in datastores {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
        names
    }
}
