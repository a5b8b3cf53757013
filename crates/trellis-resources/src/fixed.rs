//! Fixed-cluster placement: an operator override that pins every
//! placement to one administrator-specified cluster.

use tracing::debug;

use crate::engine::Resources;
use crate::error::Result;
use crate::types::{DiskLocality, Placement};

/// Degenerate placement strategy targeting a single named cluster.
///
/// Not a scheduler: it never considers persistent-disk locality or any
/// other cluster, and fails with `NoCapacity` when the pinned cluster
/// cannot satisfy the request.
#[derive(Debug, Clone)]
pub struct FixedClusterPlacer {
    cluster: String,
}

impl FixedClusterPlacer {
    /// Pins placement to `cluster`.
    pub fn new(cluster: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
        }
    }

    /// Name of the pinned cluster.
    #[must_use]
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// Places on the pinned cluster, reserving capacity there.
    ///
    /// # Errors
    ///
    /// `UnknownCluster` if the pinned cluster is not in the snapshot,
    /// `NoCapacity` if it cannot satisfy the request.
    pub fn place(
        &self,
        resources: &Resources,
        memory_mb: u64,
        ephemeral_mb: u64,
    ) -> Result<Placement> {
        debug!(cluster = %self.cluster, "operator override: fixed-cluster placement");
        resources.place_in(&self.cluster, memory_mb, ephemeral_mb)
    }
}

/// Placement strategy selected once per request from operator
/// configuration.
#[derive(Debug, Clone)]
pub enum Placer {
    /// Automatic scheduling: locality ranking, fitness scoring, and
    /// weighted-random tie-breaking over the whole snapshot.
    Automatic,
    /// Operator override pinning one cluster.
    Fixed(FixedClusterPlacer),
}

impl Placer {
    /// Places a VM with the selected strategy.
    ///
    /// The fixed strategy ignores `disks`; locality hints only steer
    /// the automatic scheduler.
    ///
    /// # Errors
    ///
    /// Propagates the underlying engine errors; both strategies fail
    /// with `NoCapacity` when their candidate set is exhausted.
    pub fn place(
        &self,
        resources: &Resources,
        memory_mb: u64,
        ephemeral_mb: u64,
        disks: &[DiskLocality],
    ) -> Result<Placement> {
        match self {
            Self::Automatic => resources.place(memory_mb, ephemeral_mb, disks),
            Self::Fixed(placer) => placer.place(resources, memory_mb, ephemeral_mb),
        }
    }
}
