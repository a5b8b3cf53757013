//! Disk-locality ranking of placement candidates.
//!
//! Placing a VM next to the datastores that already hold its persistent
//! disks avoids cross-datastore moves later; the ranker orders clusters
//! by how much of the caller's persistent data they already host.

use crate::types::{Cluster, DiskLocality};

/// A cluster annotated with the caller's disks it already hosts.
#[derive(Debug)]
pub struct RankedCluster<'a> {
    /// Index of the cluster in the snapshot ordering.
    pub index: usize,
    /// The candidate cluster.
    pub cluster: &'a Cluster,
    /// Disks from the request that live on this cluster's persistent
    /// datastores.
    pub colocated: Vec<&'a DiskLocality>,
}

impl RankedCluster<'_> {
    /// Total size in MB of the colocated disks.
    #[must_use]
    pub fn colocated_size_mb(&self) -> u64 {
        self.colocated.iter().map(|d| d.size_mb).sum()
    }

    /// Sizes of the disks *not* already hosted here; these are the ones
    /// that would consume new capacity.
    #[must_use]
    pub fn noncolocated_sizes(&self, disks: &[DiskLocality]) -> Vec<u64> {
        disks
            .iter()
            .filter(|d| !self.colocated.iter().any(|c| c.disk_id == d.disk_id))
            .map(|d| d.size_mb)
            .collect()
    }
}

/// Orders `clusters` by descending total size of the caller's disks
/// already resident there. Clusters hosting none of the disks are
/// appended last in snapshot order.
#[must_use]
pub fn rank<'a>(clusters: &'a [Cluster], disks: &'a [DiskLocality]) -> Vec<RankedCluster<'a>> {
    let mut ranked: Vec<RankedCluster<'a>> = clusters
        .iter()
        .enumerate()
        .map(|(index, cluster)| {
            let colocated = disks
                .iter()
                .filter(|disk| {
                    disk.datastore
                        .as_deref()
                        .is_some_and(|ds| cluster.hosts_persistent(ds))
                })
                .collect();
            RankedCluster {
                index,
                cluster,
                colocated,
            }
        })
        .collect();

    // Stable sort: ties and disk-less clusters keep snapshot order.
    ranked.sort_by_key(|entry| std::cmp::Reverse(entry.colocated_size_mb()));
    ranked
}
