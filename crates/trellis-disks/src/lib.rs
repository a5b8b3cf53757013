//! Standalone persistent disk provisioning: creation, lookup by probe,
//! and relocation toward the consuming host.

#![forbid(unsafe_code)]

pub mod error;
pub mod provider;
pub mod types;

pub use error::{DiskError, Result};
pub use provider::{DiskConfig, DiskProvider};
pub use types::Disk;
