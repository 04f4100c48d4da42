//! Node, registry and backup point inventory

use crate::error::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A registered host that can take a cluster role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: String,
    pub ip: String,
    pub arch: String,
    #[serde(default)]
    pub region: String,
}

/// A known image registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    pub host: String,
}

/// A configured backup destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupPoint {
    pub name: String,
}

/// Everything the wizard lists as selectable resources
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    #[serde(default)]
    pub nodes: Vec<NodeInfo>,
    #[serde(default)]
    pub registries: Vec<Registry>,
    #[serde(default)]
    pub backup_points: Vec<BackupPoint>,
}

impl Inventory {
    pub fn node(&self, id: &str) -> Option<&NodeInfo> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Distinct regions, sorted
    pub fn regions(&self) -> Vec<String> {
        let mut regions: Vec<String> = self.nodes.iter().map(|n| n.region.clone()).collect();
        regions.sort();
        regions.dedup();
        regions
    }

    pub fn nodes_in<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a NodeInfo> + 'a {
        self.nodes.iter().filter(move |n| n.region == region)
    }

    pub fn has_backup_point(&self, name: &str) -> bool {
        self.backup_points.iter().any(|b| b.name == name)
    }
}

/// Source of the inventory
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn fetch_inventory(&self) -> Result<Inventory, ClientError>;
}

#[async_trait]
impl InventorySource for Inventory {
    async fn fetch_inventory(&self) -> Result<Inventory, ClientError> {
        Ok(self.clone())
    }
}

/// Inventory backed by a YAML file
#[derive(Debug, Clone)]
pub struct FileInventorySource {
    path: PathBuf,
}

impl FileInventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InventorySource for FileInventorySource {
    async fn fetch_inventory(&self) -> Result<Inventory, ClientError> {
        let text = crate::read_document(&self.path).await?;
        let inventory: Inventory = serde_yaml::from_str(&text)?;
        tracing::debug!(
            "Loaded {} nodes, {} registries, {} backup points",
            inventory.nodes.len(),
            inventory.registries.len(),
            inventory.backup_points.len()
        );
        Ok(inventory)
    }
}
