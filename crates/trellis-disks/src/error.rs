//! Error types for disk provisioning.

use thiserror::Error;

/// Errors from the disk provider.
#[derive(Debug, Error)]
pub enum DiskError {
    /// No probed datastore holds a disk with this identity.
    #[error("disk '{disk_id}' was not found on any persistent datastore")]
    NotFound {
        /// Identity of the missing disk.
        disk_id: String,
    },

    /// A destination pick fell outside the accessible set, meaning the
    /// cluster and datastore configuration disagree with each other.
    #[error(
        "datastore '{datastore}' of cluster '{cluster}' is not accessible to the requesting host; \
         cluster and datastore configuration are inconsistent"
    )]
    InconsistentConfig {
        /// Picked destination datastore.
        datastore: String,
        /// Cluster the pick was made in.
        cluster: String,
    },

    /// Capacity or configuration error from the placement layer.
    #[error(transparent)]
    Placement(#[from] trellis_resources::PlacementError),

    /// Remote call or task error.
    #[error(transparent)]
    Remote(#[from] trellis_remote::RemoteError),
}

/// Result alias for disk operations.
pub type Result<T> = std::result::Result<T, DiskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_disk() {
        let err = DiskError::NotFound {
            disk_id: "disk-77".to_string(),
        };
        assert!(err.to_string().contains("disk-77"));
    }

    #[test]
    fn placement_errors_pass_through_transparently() {
        let err = DiskError::from(trellis_resources::PlacementError::NoDiskSpace { size_mb: 4096 });
        assert!(err.to_string().contains("4096"));
    }
}
