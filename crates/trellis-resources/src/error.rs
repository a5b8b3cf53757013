//! Error types for capacity modeling and placement.

use thiserror::Error;

/// Result type for placement operations.
pub type Result<T> = std::result::Result<T, PlacementError>;

/// Errors that can occur while building the capacity model or placing
/// workloads against it.
///
/// Capacity failures are deterministic: retrying without a capacity
/// change cannot succeed, so callers see them verbatim.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// No cluster/datastore pair can satisfy the request.
    #[error("no cluster has capacity for {memory_mb} MB memory and {ephemeral_mb} MB ephemeral disk")]
    NoCapacity {
        /// Requested memory in MB.
        memory_mb: u64,
        /// Requested ephemeral disk size in MB.
        ephemeral_mb: u64,
    },

    /// No persistent-eligible datastore in scope can hold the disk.
    #[error("not enough persistent datastore space for a {size_mb} MB disk")]
    NoDiskSpace {
        /// Requested disk size in MB.
        size_mb: u64,
    },

    /// The named cluster is not part of the session snapshot.
    #[error("unknown cluster: {name}")]
    UnknownCluster {
        /// Name of the cluster that was not found.
        name: String,
    },

    /// A datastore matched both the ephemeral and the persistent
    /// pattern; the patterns must be mutually exclusive.
    #[error("datastore patterns are not mutually exclusive: {datastore} matches both")]
    OverlappingPatterns {
        /// Name of the datastore that matched both patterns.
        datastore: String,
    },

    /// A configured datastore name pattern failed to compile.
    #[error("invalid datastore pattern {pattern:?}: {message}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Compilation error reported by the regex engine.
        message: String,
    },
}
