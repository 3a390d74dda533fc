//! Counter configuration loaded from a JSON settings document.
//!
//! ```json
//! {
//!   "counters": [
//!     { "alias": "cpu", "query": "\\Processor(_Total)\\% Processor Time" },
//!     { "name": "disk", "group": [
//!       { "alias": "reads", "query": "\\PhysicalDisk(_Total)\\Disk Reads/sec" }
//!     ] }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::{CounterSpec, leaves, normalize};

/// Error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no counters configured")]
    NoCounters,

    #[error("alias for counter #{index} cannot be empty{}", group_suffix(.group))]
    EmptyAlias {
        index: usize,
        group: Option<String>,
    },

    #[error("name for group #{index} cannot be empty")]
    EmptyGroupName { index: usize },
}

fn group_suffix(group: &Option<String>) -> String {
    group
        .as_ref()
        .map(|g| format!(" (group '{}')", g))
        .unwrap_or_default()
}

/// Settings document for the perfmon collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerfmonConfig {
    pub counters: Vec<CounterSpec>,
}

impl PerfmonConfig {
    /// Parses and validates a configuration document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: PerfmonConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Checks the preconditions the collector relies on.
    ///
    /// Duplicate aliases and duplicate paths are accepted but logged.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if leaves(&self.counters).next().is_none() {
            return Err(ConfigError::NoCounters);
        }

        let mut index = 0;
        for (group_index, spec) in self.counters.iter().enumerate() {
            match spec {
                CounterSpec::Flat(counter) => {
                    if counter.alias.is_empty() {
                        return Err(ConfigError::EmptyAlias { index, group: None });
                    }
                    index += 1;
                }
                CounterSpec::Group(group) => {
                    if group.name.is_empty() {
                        return Err(ConfigError::EmptyGroupName { index: group_index });
                    }
                    for counter in &group.members {
                        if counter.alias.is_empty() {
                            return Err(ConfigError::EmptyAlias {
                                index,
                                group: Some(group.name.clone()),
                            });
                        }
                        index += 1;
                    }
                }
            }
        }

        self.warn_duplicates();
        Ok(())
    }

    /// Logs aliases that collide in the same output mapping and repeated paths.
    fn warn_duplicates(&self) {
        let mut top_level = HashSet::new();
        for plan in normalize(&self.counters) {
            match plan.name {
                None => {
                    for counter in &plan.members {
                        if !top_level.insert(counter.alias.as_str()) {
                            warn!("Duplicate counter alias '{}'", counter.alias);
                        }
                    }
                }
                Some(name) => {
                    if !top_level.insert(name) {
                        warn!("Duplicate group or alias name '{}'", name);
                    }
                    let mut aliases = HashSet::new();
                    for counter in &plan.members {
                        if !aliases.insert(counter.alias.as_str()) {
                            warn!(
                                "Duplicate counter alias '{}' in group '{}'",
                                counter.alias, name
                            );
                        }
                    }
                }
            }
        }

        let mut paths = HashSet::new();
        for counter in leaves(&self.counters) {
            if !paths.insert(counter.query.as_str()) {
                warn!("Counter path {} is registered more than once", counter.query);
            }
        }
    }
}
