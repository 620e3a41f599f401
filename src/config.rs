// SPDX-License-Identifier: GPL-3.0-only

//! Pipeline configuration handling

use crate::constants::DEFAULT_MONITOR_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which geometry the conversion stage trusts for output frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometrySource {
    /// The layout queried from the capture source once at start
    #[default]
    Fixed,
    /// Per-frame embedded metadata, falling back to the fixed layout for
    /// frames that carry none
    Metadata,
}

/// Settings for one capture run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Destination of the raw converted-sample stream
    pub output_path: PathBuf,
    /// Stop acquiring after this many frames; `None` runs until `stop`
    pub frame_limit: Option<u64>,
    /// Geometry authority for the conversion stage
    pub geometry_source: GeometrySource,
    /// Monitor sampling interval in milliseconds
    pub monitor_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("capture.raw"),
            frame_limit: None,
            geometry_source: GeometrySource::default(),
            monitor_interval_ms: DEFAULT_MONITOR_INTERVAL.as_millis() as u64,
        }
    }
}

impl PipelineConfig {
    /// Monitor sampling interval as a duration
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_millis(self.monitor_interval_ms)
    }

    /// Default location of the persisted configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("framepipe").join("config.json"))
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(std::io::Error::other)
    }

    /// Store this configuration as JSON, creating parent directories
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, contents)
    }
}
