//! Pipeline configuration
//!
//! Thresholds and the curated data corrections (isolations, deletions,
//! name overrides) live in one JSON document so the engine itself carries
//! no region-specific constants.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use interchange_common::{Error, Result};

use crate::core::model::{NodeId, WayId};

/// Schema version this build understands
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    /// Single-linkage threshold for the initial clustering, in planar degrees
    #[serde(default = "default_cluster_threshold")]
    pub cluster_threshold_deg: f64,
    /// Threshold used when a compound-named interchange is re-clustered
    #[serde(default = "default_split_threshold")]
    pub split_threshold_deg: f64,
    #[serde(default = "default_weigh_station_threshold")]
    pub weigh_station_threshold_km: f64,
    #[serde(default)]
    pub isolate_branch_way_ids: Vec<WayId>,
    #[serde(default)]
    pub delete_interchange_way_ids: Vec<WayId>,
    /// Checked in order; the first way found in an interchange names it
    #[serde(default)]
    pub way_name_overrides: Vec<(WayId, String)>,
    #[serde(default)]
    pub node_name_overrides: BTreeMap<NodeId, String>,
    #[serde(default)]
    pub ignored_junction_node_ids: Vec<NodeId>,
    #[serde(default)]
    pub excluded_way_ids: Vec<WayId>,
    #[serde(default)]
    pub preserved_endpoint_way_ids: Vec<WayId>,
    /// External display name → interchange name
    #[serde(default)]
    pub external_name_mapping: BTreeMap<String, String>,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_cluster_threshold() -> f64 {
    0.005
}

fn default_split_threshold() -> f64 {
    0.001
}

fn default_weigh_station_threshold() -> f64 {
    0.05
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            cluster_threshold_deg: default_cluster_threshold(),
            split_threshold_deg: default_split_threshold(),
            weigh_station_threshold_km: default_weigh_station_threshold(),
            isolate_branch_way_ids: Vec::new(),
            delete_interchange_way_ids: Vec::new(),
            way_name_overrides: Vec::new(),
            node_name_overrides: BTreeMap::new(),
            ignored_junction_node_ids: Vec::new(),
            excluded_way_ids: Vec::new(),
            preserved_endpoint_way_ids: Vec::new(),
            external_name_mapping: BTreeMap::new(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: PipelineConfig = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(Error::InvalidConfig(format!(
                "unsupported version {} (expected {CONFIG_VERSION})",
                self.version
            )));
        }
        let thresholds = [
            ("cluster_threshold_deg", self.cluster_threshold_deg),
            ("split_threshold_deg", self.split_threshold_deg),
            ("weigh_station_threshold_km", self.weigh_station_threshold_km),
        ];
        for (field, value) in thresholds {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!("{field} must be positive, got {value}")));
            }
        }
        Ok(())
    }

    pub fn isolate_branch_ways(&self) -> HashSet<WayId> {
        self.isolate_branch_way_ids.iter().copied().collect()
    }

    pub fn delete_interchange_ways(&self) -> HashSet<WayId> {
        self.delete_interchange_way_ids.iter().copied().collect()
    }

    pub fn ignored_junction_nodes(&self) -> HashSet<NodeId> {
        self.ignored_junction_node_ids.iter().copied().collect()
    }

    pub fn excluded_ways(&self) -> HashSet<WayId> {
        self.excluded_way_ids.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.version, 1);
        assert_eq!(config.cluster_threshold_deg, 0.005);
        assert_eq!(config.split_threshold_deg, 0.001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "version": 1,
                "isolate_branch_way_ids": [331946645],
                "way_name_overrides": [[1, "五股交流道"], [2, "林口交流道"]],
                "node_name_overrides": {{"42": "頭城交流道"}}
            }}"#
        )
        .unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert!(config.isolate_branch_ways().contains(&331946645));
        assert_eq!(config.way_name_overrides[1], (2, "林口交流道".to_string()));
        assert_eq!(config.node_name_overrides.get(&42).map(String::as_str), Some("頭城交流道"));
        assert_eq!(config.cluster_threshold_deg, 0.005);
    }

    #[test]
    fn test_rejects_unknown_version() {
        let config = PipelineConfig {
            version: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let config = PipelineConfig {
            split_threshold_deg: -0.001,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("split_threshold_deg"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = PipelineConfig::load(&dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }
}
