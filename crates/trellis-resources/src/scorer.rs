//! Fitness scoring for placement candidates.
//!
//! The score is a pure function over a cluster snapshot: zero means the
//! cluster cannot host the request, any positive value is a selection
//! weight proportional to the memory headroom the cluster would retain.
//! Weighting by remaining headroom spreads load across clusters instead
//! of saturating the fullest feasible one.

use crate::config::PlacementConfig;
use crate::types::Cluster;

/// Scores `cluster` against a placement request.
///
/// Returns `0` when the cluster is infeasible:
/// - free memory below `memory_mb` plus the configured slack,
/// - no single ephemeral-eligible datastore with `ephemeral_mb` plus
///   slack free (only checked when `ephemeral_mb > 0`),
/// - any entry of `persistent_mb` that no persistent-eligible datastore
///   can hold. Each disk is checked independently; disks need not share
///   a datastore.
///
/// Otherwise returns the memory headroom remaining after the request,
/// never less than 1 so a feasible cluster always carries some weight.
#[must_use]
pub fn score(
    cluster: &Cluster,
    memory_mb: u64,
    ephemeral_mb: u64,
    persistent_mb: &[u64],
    config: &PlacementConfig,
) -> u64 {
    let free_memory = cluster.free_memory_mb();
    if free_memory < memory_mb + config.memory_slack_mb {
        return 0;
    }

    if ephemeral_mb > 0
        && cluster
            .pick_ephemeral(ephemeral_mb, config.datastore_slack_mb)
            .is_none()
    {
        return 0;
    }

    for &size_mb in persistent_mb {
        if cluster
            .pick_persistent(size_mb, config.datastore_slack_mb)
            .is_none()
        {
            return 0;
        }
    }

    (free_memory - memory_mb).max(1)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use test_case::test_case;

    use super::*;
    use crate::types::{ClusterSnapshot, DatastoreSnapshot, ManagedRef};

    fn cluster(
        free_memory_mb: u64,
        ephemeral_free_mb: &[u64],
        persistent_free_mb: &[u64],
    ) -> Cluster {
        let ds = |prefix: &str, i: usize, free: u64| DatastoreSnapshot {
            name: format!("{prefix}-{i}"),
            mob: ManagedRef::new(format!("datastore-{prefix}-{i}")),
            capacity_mb: free * 2,
            free_space_mb: free,
        };
        let mut datastores: Vec<DatastoreSnapshot> = ephemeral_free_mb
            .iter()
            .enumerate()
            .map(|(i, &free)| ds("eph", i, free))
            .collect();
        datastores.extend(
            persistent_free_mb
                .iter()
                .enumerate()
                .map(|(i, &free)| ds("pst", i, free)),
        );

        let snapshot = ClusterSnapshot {
            name: "alpha".into(),
            datacenter: "dc-1".into(),
            mob: ManagedRef::new("domain-c1"),
            total_memory_mb: free_memory_mb * 2,
            free_memory_mb: free_memory_mb * 2 - free_memory_mb,
            datastores: datastores.clone(),
        };

        let mut ephemeral = BTreeMap::new();
        let mut persistent = BTreeMap::new();
        for snap in &datastores {
            let store = crate::types::Datastore::from_snapshot(snap);
            if snap.name.starts_with("eph") {
                ephemeral.insert(snap.name.clone(), store);
            } else {
                persistent.insert(snap.name.clone(), store);
            }
        }
        Cluster::new(&snapshot, 1.0, ephemeral, persistent)
    }

    fn config() -> PlacementConfig {
        PlacementConfig::new("^eph-", "^pst-")
            .with_memory_slack_mb(128)
            .with_datastore_slack_mb(512)
    }

    #[test]
    fn feasible_cluster_scores_memory_headroom() {
        let cluster = cluster(4096, &[20 * 1024], &[]);
        let weight = score(&cluster, 1024, 10 * 1024, &[], &config());
        assert_eq!(weight, 3072);
    }

    // Feasibility gates, one dimension at a time.
    #[test_case(4096, 4096 - 127 ; "memory inside slack margin")]
    #[test_case(4096, 8192 ; "memory beyond free")]
    fn memory_gate(free_mb: u64, requested_mb: u64) {
        let cluster = cluster(free_mb, &[20 * 1024], &[]);
        assert_eq!(score(&cluster, requested_mb, 1024, &[], &config()), 0);
    }

    #[test]
    fn ephemeral_gate_requires_a_single_datastore_fit() {
        // Two half-full datastores cannot jointly host one disk.
        let cluster = cluster(8192, &[6 * 1024, 6 * 1024], &[]);
        assert_eq!(score(&cluster, 1024, 10 * 1024, &[], &config()), 0);
        assert!(score(&cluster, 1024, 5 * 1024, &[], &config()) > 0);
    }

    #[test]
    fn zero_ephemeral_request_skips_the_datastore_gate() {
        let cluster = cluster(8192, &[], &[]);
        assert!(score(&cluster, 1024, 0, &[], &config()) > 0);
    }

    #[test]
    fn persistent_disks_are_checked_independently() {
        // 6 GB and 3 GB free: a 5 GB and a 2 GB disk fit (separately),
        // two 5 GB disks also fit since each is checked on its own.
        let cluster = cluster(8192, &[20 * 1024], &[6 * 1024, 3 * 1024]);
        let cfg = config();
        assert!(score(&cluster, 1024, 1024, &[5 * 1024, 2 * 1024], &cfg) > 0);
        assert!(score(&cluster, 1024, 1024, &[5 * 1024, 5 * 1024], &cfg) > 0);
        assert_eq!(score(&cluster, 1024, 1024, &[8 * 1024], &cfg), 0);
    }

    #[test]
    fn weight_is_at_least_one_for_feasible_clusters() {
        let cluster = cluster(4096, &[20 * 1024], &[]);
        let cfg = config().with_memory_slack_mb(0);
        assert_eq!(score(&cluster, 4096, 1024, &[], &cfg), 1);
    }
}
