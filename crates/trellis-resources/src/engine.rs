//! The placement engine: a session-scoped capacity ledger plus the
//! two-pass scheduling algorithm.
//!
//! All scoring and reservation happens under one lock so that two
//! concurrent requests can never both reserve the last unit of capacity
//! on the same cluster or datastore. No remote I/O happens under the
//! lock; callers submit and await their remote tasks afterwards.

use parking_lot::Mutex;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::config::{DatastoreKind, PlacementConfig};
use crate::error::{PlacementError, Result};
use crate::locality;
use crate::scorer;
use crate::types::{Cluster, ClusterSnapshot, Datastore, DiskLocality, Placement};

/// Session-scoped capacity ledger and placement engine.
///
/// Built from a live infrastructure snapshot, mutated only by capacity
/// reservations, and discarded at session end. Construct a fresh one
/// per scheduling session; the ledger does not observe out-of-band
/// deletions.
pub struct Resources {
    config: PlacementConfig,
    clusters: Mutex<Vec<Cluster>>,
}

struct Candidate {
    index: usize,
    datastore: String,
    weight: u64,
}

impl Resources {
    /// Builds the ledger from cluster snapshots, partitioning each
    /// cluster's datastores by the configured name patterns.
    ///
    /// # Errors
    ///
    /// Returns an error when a pattern does not compile or when a
    /// datastore matches both the ephemeral and persistent patterns.
    pub fn build(snapshots: &[ClusterSnapshot], config: PlacementConfig) -> Result<Self> {
        let matchers = config.datastore_matchers()?;
        let mut clusters = Vec::with_capacity(snapshots.len());
        for snapshot in snapshots {
            let mut ephemeral = std::collections::BTreeMap::new();
            let mut persistent = std::collections::BTreeMap::new();
            for ds in &snapshot.datastores {
                match matchers.classify(&ds.name)? {
                    DatastoreKind::Ephemeral => {
                        ephemeral.insert(ds.name.clone(), Datastore::from_snapshot(ds));
                    }
                    DatastoreKind::Persistent => {
                        persistent.insert(ds.name.clone(), Datastore::from_snapshot(ds));
                    }
                    DatastoreKind::Unmanaged => {
                        debug!(datastore = %ds.name, cluster = %snapshot.name, "datastore matches neither pattern, ignoring");
                    }
                }
            }
            clusters.push(Cluster::new(
                snapshot,
                config.mem_overcommit_ratio,
                ephemeral,
                persistent,
            ));
        }
        Ok(Self {
            config,
            clusters: Mutex::new(clusters),
        })
    }

    /// Placement configuration this ledger was built with.
    #[must_use]
    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Chooses a (cluster, datastore) pair for a VM and reserves
    /// `memory_mb` on the cluster and `ephemeral_mb` on the datastore.
    ///
    /// Two passes: a locality pass walks clusters already hosting some
    /// of `disks` (largest colocated footprint first) and takes the
    /// first feasible one; the fallback scores every cluster and draws
    /// one at random with probability proportional to its score, which
    /// spreads load instead of herding onto the emptiest cluster.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::NoCapacity`] when no pair is feasible.
    /// No capacity is reserved on failure.
    pub fn place(
        &self,
        memory_mb: u64,
        ephemeral_mb: u64,
        disks: &[DiskLocality],
    ) -> Result<Placement> {
        let mut clusters = self.clusters.lock();
        let chosen = self.decide(&clusters, memory_mb, ephemeral_mb, disks)?;
        Ok(Self::reserve(
            &mut clusters,
            chosen,
            memory_mb,
            ephemeral_mb,
        ))
    }

    fn decide(
        &self,
        clusters: &[Cluster],
        memory_mb: u64,
        ephemeral_mb: u64,
        disks: &[DiskLocality],
    ) -> Result<Candidate> {
        let ranked = locality::rank(clusters, disks);

        // Locality pass: first fit among clusters already holding some
        // of the caller's disks. Locality dominates raw score here.
        for entry in ranked.iter().filter(|e| !e.colocated.is_empty()) {
            let extra = entry.noncolocated_sizes(disks);
            let weight = scorer::score(entry.cluster, memory_mb, ephemeral_mb, &extra, &self.config);
            if weight == 0 {
                continue;
            }
            if let Some(ds) = entry
                .cluster
                .pick_ephemeral(ephemeral_mb, self.config.datastore_slack_mb)
            {
                debug!(
                    cluster = %entry.cluster.name(),
                    datastore = %ds.name(),
                    colocated_mb = entry.colocated_size_mb(),
                    "locality pass selected cluster"
                );
                return Ok(Candidate {
                    index: entry.index,
                    datastore: ds.name().to_string(),
                    weight,
                });
            }
        }

        // Global pass: weighted-random draw over every feasible cluster.
        let mut candidates = Vec::new();
        for entry in &ranked {
            let extra = entry.noncolocated_sizes(disks);
            let weight = scorer::score(entry.cluster, memory_mb, ephemeral_mb, &extra, &self.config);
            if weight == 0 {
                continue;
            }
            if let Some(ds) = entry
                .cluster
                .pick_ephemeral(ephemeral_mb, self.config.datastore_slack_mb)
            {
                candidates.push(Candidate {
                    index: entry.index,
                    datastore: ds.name().to_string(),
                    weight,
                });
            }
        }

        if candidates.is_empty() {
            warn!(memory_mb, ephemeral_mb, "no feasible cluster for request");
            return Err(PlacementError::NoCapacity {
                memory_mb,
                ephemeral_mb,
            });
        }

        let winner = weighted_pick(&mut rand::thread_rng(), &candidates);
        Ok(candidates.swap_remove(winner))
    }

    fn reserve(
        clusters: &mut [Cluster],
        chosen: Candidate,
        memory_mb: u64,
        ephemeral_mb: u64,
    ) -> Placement {
        let cluster = &mut clusters[chosen.index];
        cluster.allocate(memory_mb);
        let cluster_name = cluster.name().to_string();
        let cluster_mob = cluster.mob().clone();
        // The candidate was picked from this cluster's ephemeral set
        // under the same lock, so the lookup cannot miss.
        let (datastore, datastore_mob) = match cluster.ephemeral_mut(&chosen.datastore) {
            Some(ds) => {
                ds.allocate(ephemeral_mb);
                (ds.name().to_string(), ds.mob().clone())
            }
            None => unreachable!("picked datastore vanished from cluster"),
        };
        info!(
            cluster = %cluster_name,
            datastore = %datastore,
            memory_mb,
            ephemeral_mb,
            "reserved vm placement"
        );
        Placement {
            cluster: cluster_name,
            cluster_mob,
            datastore,
            datastore_mob,
        }
    }

    /// Picks a persistent-eligible datastore within the named cluster
    /// for a `size_mb` disk and reserves the space.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::UnknownCluster`] for a cluster outside
    /// the snapshot and [`PlacementError::NoDiskSpace`] when no
    /// datastore fits.
    pub fn pick_persistent_in(&self, cluster_name: &str, size_mb: u64) -> Result<Placement> {
        self.pick_persistent_filtered(cluster_name, size_mb, |_| true)
    }

    /// Picks a persistent-eligible datastore within the named cluster,
    /// restricted to the given accessible datastore names. Used when
    /// relocating a disk toward a consuming host.
    ///
    /// # Errors
    ///
    /// Same as [`Resources::pick_persistent_in`].
    pub fn pick_persistent_among(
        &self,
        cluster_name: &str,
        accessible: &[String],
        size_mb: u64,
    ) -> Result<Placement> {
        self.pick_persistent_filtered(cluster_name, size_mb, |name| {
            accessible.iter().any(|a| a == name)
        })
    }

    fn pick_persistent_filtered(
        &self,
        cluster_name: &str,
        size_mb: u64,
        eligible: impl Fn(&str) -> bool,
    ) -> Result<Placement> {
        let mut clusters = self.clusters.lock();
        let cluster = clusters
            .iter_mut()
            .find(|c| c.name() == cluster_name)
            .ok_or_else(|| PlacementError::UnknownCluster {
                name: cluster_name.to_string(),
            })?;

        let slack = self.config.datastore_slack_mb;
        let picked = cluster
            .persistent_datastores()
            .values()
            .find(|ds| eligible(ds.name()) && ds.free_space_mb() >= size_mb + slack)
            .map(|ds| ds.name().to_string());

        let Some(name) = picked else {
            return Err(PlacementError::NoDiskSpace { size_mb });
        };
        let cluster_mob = cluster.mob().clone();
        let (datastore, datastore_mob) = match cluster.persistent_mut(&name) {
            Some(ds) => {
                ds.allocate(size_mb);
                (ds.name().to_string(), ds.mob().clone())
            }
            None => unreachable!("picked datastore vanished from cluster"),
        };
        info!(cluster = %cluster_name, datastore = %datastore, size_mb, "reserved persistent disk space");
        Ok(Placement {
            cluster: cluster_name.to_string(),
            cluster_mob,
            datastore,
            datastore_mob,
        })
    }

    /// Picks a persistent-eligible datastore in any cluster for a
    /// `size_mb` disk and reserves the space. First fit in snapshot
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::NoDiskSpace`] when nothing fits.
    pub fn pick_persistent_anywhere(&self, size_mb: u64) -> Result<Placement> {
        let names: Vec<String> = {
            let clusters = self.clusters.lock();
            clusters.iter().map(|c| c.name().to_string()).collect()
        };
        for name in names {
            match self.pick_persistent_in(&name, size_mb) {
                Ok(placement) => return Ok(placement),
                Err(PlacementError::NoDiskSpace { .. }) => {}
                Err(other) => return Err(other),
            }
        }
        Err(PlacementError::NoDiskSpace { size_mb })
    }

    /// Places a VM on one specific cluster, ignoring locality and every
    /// other cluster. Backs the fixed-cluster operator override.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::UnknownCluster`] or
    /// [`PlacementError::NoCapacity`].
    pub fn place_in(
        &self,
        cluster_name: &str,
        memory_mb: u64,
        ephemeral_mb: u64,
    ) -> Result<Placement> {
        let mut clusters = self.clusters.lock();
        let index = clusters
            .iter()
            .position(|c| c.name() == cluster_name)
            .ok_or_else(|| PlacementError::UnknownCluster {
                name: cluster_name.to_string(),
            })?;

        let cluster = &clusters[index];
        if scorer::score(cluster, memory_mb, ephemeral_mb, &[], &self.config) == 0 {
            return Err(PlacementError::NoCapacity {
                memory_mb,
                ephemeral_mb,
            });
        }
        let Some(ds) = cluster.pick_ephemeral(ephemeral_mb, self.config.datastore_slack_mb) else {
            return Err(PlacementError::NoCapacity {
                memory_mb,
                ephemeral_mb,
            });
        };
        let chosen = Candidate {
            index,
            datastore: ds.name().to_string(),
            weight: 0,
        };
        Ok(Self::reserve(&mut clusters, chosen, memory_mb, ephemeral_mb))
    }

    /// Names of all clusters in the session snapshot.
    #[must_use]
    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters
            .lock()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Persistent-eligible datastore names of the named cluster.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::UnknownCluster`] for an unknown name.
    pub fn persistent_datastore_names(&self, cluster_name: &str) -> Result<Vec<String>> {
        let clusters = self.clusters.lock();
        let cluster = clusters
            .iter()
            .find(|c| c.name() == cluster_name)
            .ok_or_else(|| PlacementError::UnknownCluster {
                name: cluster_name.to_string(),
            })?;
        Ok(cluster.persistent_datastores().keys().cloned().collect())
    }

    /// Current schedulable free memory of a cluster, if known.
    #[must_use]
    pub fn free_memory_mb(&self, cluster_name: &str) -> Option<u64> {
        self.clusters
            .lock()
            .iter()
            .find(|c| c.name() == cluster_name)
            .map(Cluster::free_memory_mb)
    }

    /// Current free space of a datastore (in either pool), if known.
    #[must_use]
    pub fn free_space_mb(&self, cluster_name: &str, datastore: &str) -> Option<u64> {
        let clusters = self.clusters.lock();
        let cluster = clusters.iter().find(|c| c.name() == cluster_name)?;
        cluster
            .ephemeral_datastores()
            .get(datastore)
            .or_else(|| cluster.persistent_datastores().get(datastore))
            .map(Datastore::free_space_mb)
    }
}

/// Cumulative-weight draw: each candidate is selected with probability
/// proportional to its weight.
fn weighted_pick<R: Rng>(rng: &mut R, candidates: &[Candidate]) -> usize {
    let total: u64 = candidates.iter().map(|c| c.weight).sum();
    let roll = rng.gen_range(0..total.max(1));
    let mut cumulative = 0u64;
    for (i, candidate) in candidates.iter().enumerate() {
        cumulative += candidate.weight;
        if roll < cumulative {
            return i;
        }
    }
    candidates.len() - 1
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::types::{DatastoreSnapshot, ManagedRef};

    fn snapshot(name: &str, free_memory_mb: u64, datastores: &[(&str, u64)]) -> ClusterSnapshot {
        ClusterSnapshot {
            name: name.into(),
            datacenter: "dc-1".into(),
            mob: ManagedRef::new(format!("domain-{name}")),
            total_memory_mb: free_memory_mb * 2,
            free_memory_mb,
            datastores: datastores
                .iter()
                .map(|(ds, free)| DatastoreSnapshot {
                    name: (*ds).to_string(),
                    mob: ManagedRef::new(format!("datastore-{ds}")),
                    capacity_mb: free * 2,
                    free_space_mb: *free,
                })
                .collect(),
        }
    }

    fn config() -> PlacementConfig {
        PlacementConfig::new("^eph-", "^pst-")
            .with_memory_slack_mb(0)
            .with_datastore_slack_mb(0)
    }

    #[test]
    fn place_reserves_memory_and_ephemeral_space() {
        let snapshots = [snapshot("alpha", 4096, &[("eph-a", 20 * 1024)])];
        let resources = Resources::build(&snapshots, config()).expect("build");

        let placement = resources.place(1024, 10 * 1024, &[]).expect("place");
        assert_eq!(placement.cluster, "alpha");
        assert_eq!(placement.datastore, "eph-a");
        assert_eq!(resources.free_memory_mb("alpha"), Some(3072));
        assert_eq!(resources.free_space_mb("alpha", "eph-a"), Some(10 * 1024));
    }

    #[test]
    fn place_in_ignores_other_clusters() {
        let snapshots = [
            snapshot("alpha", 512, &[("eph-a", 1024)]),
            snapshot("beta", 64 * 1024, &[("eph-b", 100 * 1024)]),
        ];
        let resources = Resources::build(&snapshots, config()).expect("build");

        let err = resources.place_in("alpha", 256, 5 * 1024).expect_err("full");
        assert_eq!(
            err,
            PlacementError::NoCapacity {
                memory_mb: 256,
                ephemeral_mb: 5 * 1024
            }
        );
        let placement = resources.place_in("beta", 256, 5 * 1024).expect("fits");
        assert_eq!(placement.cluster, "beta");
    }

    #[test]
    fn pick_persistent_among_respects_accessibility() {
        let snapshots = [snapshot(
            "alpha",
            4096,
            &[("pst-1", 50 * 1024), ("pst-2", 50 * 1024)],
        )];
        let resources = Resources::build(&snapshots, config()).expect("build");

        let placement = resources
            .pick_persistent_among("alpha", &["pst-2".to_string()], 1024)
            .expect("pick");
        assert_eq!(placement.datastore, "pst-2");

        let err = resources
            .pick_persistent_among("alpha", &["pst-9".to_string()], 1024)
            .expect_err("inaccessible");
        assert_eq!(err, PlacementError::NoDiskSpace { size_mb: 1024 });
    }

    #[test]
    fn pick_persistent_anywhere_first_fit_in_snapshot_order() {
        let snapshots = [
            snapshot("alpha", 4096, &[("pst-a", 2 * 1024)]),
            snapshot("beta", 4096, &[("pst-b", 50 * 1024)]),
        ];
        let resources = Resources::build(&snapshots, config()).expect("build");

        let placement = resources.pick_persistent_anywhere(1024).expect("pick");
        assert_eq!(placement.cluster, "alpha");
        let placement = resources.pick_persistent_anywhere(10 * 1024).expect("pick");
        assert_eq!(placement.cluster, "beta");
    }

    #[test]
    fn unknown_cluster_is_reported() {
        let resources = Resources::build(&[], config()).expect("build");
        let err = resources.pick_persistent_in("ghost", 1024).expect_err("unknown");
        assert_eq!(err, PlacementError::UnknownCluster { name: "ghost".into() });
    }

    #[test]
    fn weighted_pick_is_proportional() {
        let candidates = vec![
            Candidate {
                index: 0,
                datastore: "a".into(),
                weight: 3,
            },
            Candidate {
                index: 1,
                datastore: "b".into(),
                weight: 1,
            },
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let mut hits = [0u32; 2];
        for _ in 0..4000 {
            hits[weighted_pick(&mut rng, &candidates)] += 1;
        }
        let ratio = f64::from(hits[0]) / f64::from(hits[1]);
        assert!((2.6..=3.4).contains(&ratio), "ratio was {ratio}");
    }
}
