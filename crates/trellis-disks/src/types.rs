//! Disk value object.

use serde::{Deserialize, Serialize};

/// A standalone persistent disk, identified by a generated uuid and
/// addressed by a fully-qualified datastore path.
///
/// Disks have no in-process lifecycle: a `Disk` is recreated from a
/// lookup whenever one is needed, and the path alone is enough to
/// operate on it remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    /// Disk identity, `disk-<uuid>`.
    pub id: String,
    /// Disk size in MB.
    pub size_mb: u64,
    /// Name of the hosting datastore.
    pub datastore: String,
    /// Fully-qualified backing path, `[<datastore>] <folder>/<id>.vmdk`.
    pub path: String,
}

impl Disk {
    /// Builds a disk record for the given location.
    #[must_use]
    pub fn new(id: &str, size_mb: u64, datastore: &str, folder: &str) -> Self {
        Self {
            id: id.to_string(),
            size_mb,
            datastore: datastore.to_string(),
            path: Self::path_for(datastore, folder, id),
        }
    }

    /// The backing path a disk with `id` would have on `datastore`.
    #[must_use]
    pub fn path_for(datastore: &str, folder: &str, id: &str) -> String {
        format!("[{datastore}] {folder}/{id}.vmdk")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_is_fully_qualified() {
        let disk = Disk::new("disk-ab12", 4096, "shared-ds-1", "trellis_disks");
        assert_eq!(disk.path, "[shared-ds-1] trellis_disks/disk-ab12.vmdk");
    }
}
