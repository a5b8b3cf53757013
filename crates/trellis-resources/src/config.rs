//! Placement configuration.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{PlacementError, Result};

/// Per-deployment placement configuration.
///
/// The slack margins keep the scorer from driving clusters and
/// datastores to exact exhaustion: a candidate must fit the request
/// *plus* the margin to count as feasible. Defaults are deliberately
/// conservative and can be tuned per deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Multiplier applied to physical memory to obtain the schedulable
    /// memory budget.
    pub mem_overcommit_ratio: f64,
    /// Memory headroom in MB a cluster must retain beyond the request.
    pub memory_slack_mb: u64,
    /// Free-space headroom in MB a datastore must retain beyond the
    /// request.
    pub datastore_slack_mb: u64,
    /// Name pattern selecting ephemeral-eligible datastores. Defaults
    /// to every datastore visible to the cluster.
    pub ephemeral_pattern: String,
    /// Name pattern selecting persistent-eligible datastores. Defaults
    /// to matching nothing; deployments name their long-lived storage
    /// explicitly.
    pub persistent_pattern: String,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            mem_overcommit_ratio: 1.0,
            memory_slack_mb: 128,
            datastore_slack_mb: 1024,
            ephemeral_pattern: ".*".to_string(),
            persistent_pattern: "^$".to_string(),
        }
    }
}

impl PlacementConfig {
    /// Creates a configuration with the given datastore name patterns
    /// and default margins.
    pub fn new(ephemeral_pattern: impl Into<String>, persistent_pattern: impl Into<String>) -> Self {
        Self {
            ephemeral_pattern: ephemeral_pattern.into(),
            persistent_pattern: persistent_pattern.into(),
            ..Self::default()
        }
    }

    /// Sets the memory overcommit ratio.
    #[must_use]
    pub fn with_overcommit(mut self, ratio: f64) -> Self {
        self.mem_overcommit_ratio = ratio;
        self
    }

    /// Sets the memory slack margin in MB.
    #[must_use]
    pub fn with_memory_slack_mb(mut self, slack_mb: u64) -> Self {
        self.memory_slack_mb = slack_mb;
        self
    }

    /// Sets the datastore slack margin in MB.
    #[must_use]
    pub fn with_datastore_slack_mb(mut self, slack_mb: u64) -> Self {
        self.datastore_slack_mb = slack_mb;
        self
    }

    /// Compiles the datastore name patterns.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::InvalidPattern`] if either pattern is
    /// not a valid regular expression.
    pub fn datastore_matchers(&self) -> Result<DatastoreMatchers> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| PlacementError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })
        };
        Ok(DatastoreMatchers {
            ephemeral: compile(&self.ephemeral_pattern)?,
            persistent: compile(&self.persistent_pattern)?,
        })
    }
}

/// Compiled datastore name patterns.
#[derive(Debug, Clone)]
pub struct DatastoreMatchers {
    ephemeral: Regex,
    persistent: Regex,
}

impl DatastoreMatchers {
    /// Classifies a datastore by name.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError::OverlappingPatterns`] when the name
    /// matches both patterns; ephemeral and persistent pools must not
    /// share datastores.
    pub fn classify(&self, name: &str) -> Result<DatastoreKind> {
        let ephemeral = self.ephemeral.is_match(name);
        let persistent = self.persistent.is_match(name);
        match (ephemeral, persistent) {
            (true, true) => Err(PlacementError::OverlappingPatterns {
                datastore: name.to_string(),
            }),
            (true, false) => Ok(DatastoreKind::Ephemeral),
            (false, true) => Ok(DatastoreKind::Persistent),
            (false, false) => Ok(DatastoreKind::Unmanaged),
        }
    }
}

/// Eligibility of a datastore, as decided by the configured patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreKind {
    /// Eligible for ephemeral (scratch/root) disks.
    Ephemeral,
    /// Reserved for persistent disks.
    Persistent,
    /// Visible but matched by neither pattern; ignored.
    Unmanaged,
}
