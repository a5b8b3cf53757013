//! Capacity units: clusters, datastores, and the value objects that
//! describe placement requests and results.
//!
//! `Cluster` and `Datastore` pair immutable identity with mutable
//! allocation counters. They are built fresh from a live infrastructure
//! snapshot at the start of a scheduling session and discarded at the
//! end; nothing here is persisted.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque reference to a remote managed object (cluster, datastore,
/// virtual machine, ...). The infrastructure client owns the meaning of
/// the token; this core only carries it around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedRef(String);

impl ManagedRef {
    /// Wraps a raw object token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ManagedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-in-time view of a datastore, as reported by live queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatastoreSnapshot {
    /// Datastore name.
    pub name: String,
    /// Remote object reference.
    pub mob: ManagedRef,
    /// Total capacity in MB.
    pub capacity_mb: u64,
    /// Free space in MB at snapshot time.
    pub free_space_mb: u64,
}

/// Point-in-time view of a cluster and its visible datastores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    /// Cluster name.
    pub name: String,
    /// Name of the datacenter the cluster belongs to.
    pub datacenter: String,
    /// Remote object reference.
    pub mob: ManagedRef,
    /// Total physical memory in MB.
    pub total_memory_mb: u64,
    /// Free memory in MB at snapshot time.
    pub free_memory_mb: u64,
    /// Datastores visible to the cluster.
    pub datastores: Vec<DatastoreSnapshot>,
}

/// A storage pool with finite capacity and session-scoped reservations.
///
/// `allocated_mb` only ever grows: capacity reserved here is released
/// out-of-band when the backing disk or VM is deleted, tracked by the
/// remote infrastructure rather than this in-memory model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Datastore {
    name: String,
    mob: ManagedRef,
    capacity_mb: u64,
    synced_free_mb: u64,
    allocated_mb: u64,
}

impl Datastore {
    pub(crate) fn from_snapshot(snapshot: &DatastoreSnapshot) -> Self {
        Self {
            name: snapshot.name.clone(),
            mob: snapshot.mob.clone(),
            capacity_mb: snapshot.capacity_mb,
            synced_free_mb: snapshot.free_space_mb.min(snapshot.capacity_mb),
            allocated_mb: 0,
        }
    }

    /// Datastore name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remote object reference.
    #[must_use]
    pub fn mob(&self) -> &ManagedRef {
        &self.mob
    }

    /// Total capacity in MB.
    #[must_use]
    pub fn capacity_mb(&self) -> u64 {
        self.capacity_mb
    }

    /// Free space in MB, net of session reservations.
    #[must_use]
    pub fn free_space_mb(&self) -> u64 {
        self.synced_free_mb.saturating_sub(self.allocated_mb)
    }

    /// Reserves `size_mb` against this datastore.
    pub(crate) fn allocate(&mut self, size_mb: u64) {
        debug_assert!(size_mb <= self.free_space_mb());
        self.allocated_mb += size_mb;
    }
}

/// A pool of physical hosts sharing a memory budget and a set of
/// visible storage pools, partitioned into ephemeral-eligible and
/// persistent-eligible datastores.
#[derive(Debug, Clone)]
pub struct Cluster {
    name: String,
    datacenter: String,
    mob: ManagedRef,
    total_memory_mb: u64,
    /// Schedulable free memory at snapshot time, with the overcommit
    /// ratio already applied.
    synced_free_memory_mb: u64,
    allocated_memory_mb: u64,
    ephemeral: BTreeMap<String, Datastore>,
    persistent: BTreeMap<String, Datastore>,
}

impl Cluster {
    pub(crate) fn new(
        snapshot: &ClusterSnapshot,
        overcommit: f64,
        ephemeral: BTreeMap<String, Datastore>,
        persistent: BTreeMap<String, Datastore>,
    ) -> Self {
        let used = snapshot
            .total_memory_mb
            .saturating_sub(snapshot.free_memory_mb);
        let budget = (snapshot.total_memory_mb as f64 * overcommit) as u64;
        Self {
            name: snapshot.name.clone(),
            datacenter: snapshot.datacenter.clone(),
            mob: snapshot.mob.clone(),
            total_memory_mb: snapshot.total_memory_mb,
            synced_free_memory_mb: budget.saturating_sub(used),
            allocated_memory_mb: 0,
            ephemeral,
            persistent,
        }
    }

    /// Cluster name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning datacenter.
    #[must_use]
    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    /// Remote object reference.
    #[must_use]
    pub fn mob(&self) -> &ManagedRef {
        &self.mob
    }

    /// Total physical memory in MB (before overcommit).
    #[must_use]
    pub fn total_memory_mb(&self) -> u64 {
        self.total_memory_mb
    }

    /// Schedulable free memory in MB, net of session reservations.
    #[must_use]
    pub fn free_memory_mb(&self) -> u64 {
        self.synced_free_memory_mb
            .saturating_sub(self.allocated_memory_mb)
    }

    /// Datastores eligible for ephemeral (scratch/root) disks.
    #[must_use]
    pub fn ephemeral_datastores(&self) -> &BTreeMap<String, Datastore> {
        &self.ephemeral
    }

    /// Datastores eligible for persistent disks.
    #[must_use]
    pub fn persistent_datastores(&self) -> &BTreeMap<String, Datastore> {
        &self.persistent
    }

    /// Reserves `memory_mb` of schedulable memory.
    pub(crate) fn allocate(&mut self, memory_mb: u64) {
        debug_assert!(memory_mb <= self.free_memory_mb());
        self.allocated_memory_mb += memory_mb;
    }

    /// First ephemeral-eligible datastore with `size_mb` plus `slack_mb`
    /// free, if any.
    #[must_use]
    pub fn pick_ephemeral(&self, size_mb: u64, slack_mb: u64) -> Option<&Datastore> {
        self.ephemeral
            .values()
            .find(|ds| ds.free_space_mb() >= size_mb + slack_mb)
    }

    /// First persistent-eligible datastore with `size_mb` plus
    /// `slack_mb` free, if any.
    #[must_use]
    pub fn pick_persistent(&self, size_mb: u64, slack_mb: u64) -> Option<&Datastore> {
        self.persistent
            .values()
            .find(|ds| ds.free_space_mb() >= size_mb + slack_mb)
    }

    pub(crate) fn ephemeral_mut(&mut self, name: &str) -> Option<&mut Datastore> {
        self.ephemeral.get_mut(name)
    }

    pub(crate) fn persistent_mut(&mut self, name: &str) -> Option<&mut Datastore> {
        self.persistent.get_mut(name)
    }

    /// Whether `datastore` is one of this cluster's persistent-eligible
    /// datastores.
    #[must_use]
    pub fn hosts_persistent(&self, datastore: &str) -> bool {
        self.persistent.contains_key(datastore)
    }
}

/// An existing persistent disk supplied as a locality hint to `place`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskLocality {
    /// Disk identity.
    pub disk_id: String,
    /// Disk size in MB.
    pub size_mb: u64,
    /// Name of the datastore currently hosting the disk, when known.
    pub datastore: Option<String>,
}

impl DiskLocality {
    /// Creates a locality hint for a disk with a known location.
    pub fn new(disk_id: impl Into<String>, size_mb: u64, datastore: impl Into<String>) -> Self {
        Self {
            disk_id: disk_id.into(),
            size_mb,
            datastore: Some(datastore.into()),
        }
    }

    /// Creates a locality hint for a disk whose location is unknown.
    pub fn unplaced(disk_id: impl Into<String>, size_mb: u64) -> Self {
        Self {
            disk_id: disk_id.into(),
            size_mb,
            datastore: None,
        }
    }
}

/// The outcome of a placement decision: the chosen cluster/datastore
/// pair, with capacity already reserved on both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Placement {
    /// Chosen cluster name.
    pub cluster: String,
    /// Remote reference of the chosen cluster.
    pub cluster_mob: ManagedRef,
    /// Chosen datastore name.
    pub datastore: String,
    /// Remote reference of the chosen datastore.
    pub datastore_mob: ManagedRef,
}
