//! Installable component catalog
//!
//! Storage provisioners and plugins that can be attached to a cluster. Each
//! component carries the version that will be installed and a config schema;
//! schema properties flagged `mask` hold credentials or key material.

use crate::error::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which wizard step offers the component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Storage,
    #[default]
    Plugin,
}

/// Schema of a single config property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    /// Value must be encoded before it is embedded in a document
    #[serde(default)]
    pub mask: bool,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Config schema of a component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentSchema {
    #[serde(default)]
    pub properties: BTreeMap<String, PropertySchema>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ComponentSchema {
    /// Names of properties that must be encoded
    pub fn masked(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .filter(|(_, prop)| prop.mask)
            .map(|(name, _)| name.as_str())
    }

    /// Whether the schema declares `prop`
    pub fn declares(&self, prop: &str) -> bool {
        self.properties.contains_key(prop)
    }
}

/// An installable component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub category: ComponentCategory,
    #[serde(default)]
    pub schema: ComponentSchema,
}

/// Look up a component by name
pub fn find_component<'a>(components: &'a [Component], name: &str) -> Option<&'a Component> {
    components.iter().find(|c| c.name == name)
}

/// Source of the component catalog
#[async_trait]
pub trait ComponentSource: Send + Sync {
    async fn fetch_components(&self) -> Result<Vec<Component>, ClientError>;
}

#[async_trait]
impl ComponentSource for Vec<Component> {
    async fn fetch_components(&self) -> Result<Vec<Component>, ClientError> {
        Ok(self.clone())
    }
}

/// Component catalog backed by a YAML list
#[derive(Debug, Clone)]
pub struct FileComponentSource {
    path: PathBuf,
}

impl FileComponentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ComponentSource for FileComponentSource {
    async fn fetch_components(&self) -> Result<Vec<Component>, ClientError> {
        let text = crate::read_document(&self.path).await?;
        let components: Vec<Component> = serde_yaml::from_str(&text)?;

        for component in &components {
            if component.version.is_empty() {
                return Err(ClientError::Invalid(format!(
                    "component {} has no version",
                    component.name
                )));
            }
        }

        tracing::debug!(
            "Loaded {} components from {}",
            components.len(),
            self.path.display()
        );
        Ok(components)
    }
}
