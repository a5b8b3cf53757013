//! Cluster and datastore capacity model with placement scheduling for
//! Trellis.
//!
//! `trellis-resources` is the in-memory half of the provisioning core:
//! it snapshots the live infrastructure into a session-scoped capacity
//! ledger, scores candidate clusters for a VM or disk request, biases
//! placement toward the clusters already holding the caller's
//! persistent data, and reserves capacity atomically on the chosen
//! cluster/datastore pair.
//!
//! # Placement algorithm
//!
//! 1. Rank clusters by how much of the request's persistent-disk
//!    footprint they already host ([`locality::rank`]).
//! 2. Walk the ranked clusters that host any of the disks and take the
//!    first feasible one (locality strictly dominates score here).
//! 3. Otherwise score every cluster ([`scorer::score`]) and draw a
//!    winner at random with probability proportional to its remaining
//!    memory headroom, spreading load instead of herding.
//! 4. Reserve memory and ephemeral space on the winner under the same
//!    lock that scored it; fail with [`PlacementError::NoCapacity`]
//!    without reserving anything when no candidate is feasible.
//!
//! The ledger is rebuilt from live queries each session and never
//! persisted; reservations are released out-of-band when the remote
//! infrastructure deletes the backing VM or disk.

#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod fixed;
pub mod locality;
pub mod scorer;
pub mod types;

pub use config::{DatastoreKind, DatastoreMatchers, PlacementConfig};
pub use engine::Resources;
pub use error::{PlacementError, Result};
pub use fixed::{FixedClusterPlacer, Placer};
pub use types::{
    Cluster, ClusterSnapshot, Datastore, DatastoreSnapshot, DiskLocality, ManagedRef, Placement,
};
