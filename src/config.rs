//! Graph configuration, persisted next to the tables.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};
use crate::table::spannable::DEFAULT_CAPACITY;

/// File name of the persisted config inside a graph directory.
pub const CONFIG_FILE_NAME: &str = "graph_config.json";

/// Persistent graph configuration.
///
/// Written by `save_to_directory` to `graph_config.json`. Read on load to
/// restore the name separators; a missing file means the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GraphConfig {
    /// Separator between atoms of pip names.
    pub pip_name_separator: char,
    /// Separator between atoms of file and directory paths.
    pub path_separator: char,
    /// Initial capacity of each entity table.
    pub initial_capacity: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            pip_name_separator: '.',
            path_separator: '/',
            initial_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(TableError::InvalidCapacity(0));
        }
        for sep in [self.pip_name_separator, self.path_separator] {
            if sep == '\n' || sep == '\r' {
                return Err(TableError::LineBreakInString(sep.to_string()));
            }
        }
        Ok(())
    }

    /// Read config from a graph directory. Returns None if the file doesn't exist.
    pub fn read_from(directory: &Path) -> Result<Option<Self>> {
        let path = directory.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(Some(config))
    }

    /// Write config to a graph directory.
    pub fn write_to(&self, directory: &Path) -> Result<()> {
        let path = directory.join(CONFIG_FILE_NAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, json)?;
        Ok(())
    }
}
