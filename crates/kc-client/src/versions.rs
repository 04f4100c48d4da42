//! Kubernetes version matrices
//!
//! The version source returns, per image mode, the installable Kubernetes
//! releases together with the container runtime (`cri`) and network plugin
//! (`cni`) versions shipped for each release.

use crate::error::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where cluster images are pulled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageMode {
    /// Images come from public registries
    #[default]
    Online,
    /// Images come from uploaded offline packages and the local registry
    Offline,
}

impl ImageMode {
    pub fn from_offline(offline: bool) -> Self {
        if offline {
            ImageMode::Offline
        } else {
            ImageMode::Online
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self, ImageMode::Offline)
    }
}

impl std::fmt::Display for ImageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageMode::Online => write!(f, "online"),
            ImageMode::Offline => write!(f, "offline"),
        }
    }
}

/// A runtime or network plugin version released alongside Kubernetes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionControlItem {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub default: bool,
}

/// Compatible runtime and CNI versions for one release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionControl {
    #[serde(default)]
    pub cri: Vec<VersionControlItem>,
    #[serde(default)]
    pub cni: Vec<VersionControlItem>,
}

/// One installable Kubernetes release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesRelease {
    pub version: String,
    #[serde(default)]
    pub archs: Vec<String>,
    #[serde(default)]
    pub version_control: VersionControl,
}

/// Full matrix document: `{ online: [...], offline: [...] }`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionMatrix {
    #[serde(default)]
    pub online: Vec<KubernetesRelease>,
    #[serde(default)]
    pub offline: Vec<KubernetesRelease>,
}

impl VersionMatrix {
    /// Releases available for an image mode
    pub fn releases(&self, mode: ImageMode) -> &[KubernetesRelease] {
        match mode {
            ImageMode::Online => &self.online,
            ImageMode::Offline => &self.offline,
        }
    }
}

/// Source of the version matrix
#[async_trait]
pub trait VersionSource: Send + Sync {
    /// Fetch the releases available for `mode`
    async fn fetch(&self, mode: ImageMode) -> Result<Vec<KubernetesRelease>, ClientError>;
}

#[async_trait]
impl VersionSource for VersionMatrix {
    async fn fetch(&self, mode: ImageMode) -> Result<Vec<KubernetesRelease>, ClientError> {
        Ok(self.releases(mode).to_vec())
    }
}

/// Version source backed by a YAML file
#[derive(Debug, Clone)]
pub struct FileVersionSource {
    path: PathBuf,
}

impl FileVersionSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl VersionSource for FileVersionSource {
    async fn fetch(&self, mode: ImageMode) -> Result<Vec<KubernetesRelease>, ClientError> {
        let text = crate::read_document(&self.path).await?;
        let matrix = parse_version_matrix(&text)?;
        tracing::debug!(
            "Loaded {} {} releases from {}",
            matrix.releases(mode).len(),
            mode,
            self.path.display()
        );
        Ok(matrix.releases(mode).to_vec())
    }
}

/// Parse a version matrix document
pub fn parse_version_matrix(yaml_str: &str) -> Result<VersionMatrix, ClientError> {
    let matrix: VersionMatrix = serde_yaml::from_str(yaml_str)?;

    for release in matrix.online.iter().chain(matrix.offline.iter()) {
        if release.version.trim().is_empty() {
            return Err(ClientError::Invalid(
                "release with an empty version".to_string(),
            ));
        }
        let items = release
            .version_control
            .cri
            .iter()
            .chain(release.version_control.cni.iter());
        for item in items {
            if item.name.is_empty() || item.version.is_empty() {
                return Err(ClientError::Invalid(format!(
                    "release {} has an incomplete version_control entry",
                    release.version
                )));
            }
        }
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MATRIX: &str = r#"
online:
  - version: v1.23.6
    archs: [amd64, arm64]
    version_control:
      cri:
        - name: containerd
          version: 1.6.4
          default: true
        - name: docker
          version: 20.10.20
          default: true
      cni:
        - name: calico
          version: v3.22.4
          default: true
  - version: v1.27.4
    archs: [amd64]
    version_control:
      cri:
        - name: containerd
          version: 1.6.4
offline:
  - version: v1.23.6
    archs: [amd64]
"#;

    #[test]
    fn test_parse_version_matrix() {
        let matrix = parse_version_matrix(MATRIX).unwrap();
        assert_eq!(matrix.online.len(), 2);
        assert_eq!(matrix.offline.len(), 1);

        let first = &matrix.online[0];
        assert_eq!(first.version, "v1.23.6");
        assert_eq!(first.archs, vec!["amd64", "arm64"]);
        assert_eq!(first.version_control.cri.len(), 2);
        assert!(first.version_control.cri[0].default);

        // `default` is optional and false when absent
        assert!(!matrix.online[1].version_control.cri[0].default);
        assert!(matrix.offline[0].version_control.cni.is_empty());
    }

    #[test]
    fn test_parse_rejects_incomplete_items() {
        let yaml = r#"
online:
  - version: v1.23.6
    version_control:
      cri:
        - name: containerd
          version: ""
"#;
        let err = parse_version_matrix(yaml).unwrap_err();
        assert!(matches!(err, ClientError::Invalid(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_version_matrix("online: 12"),
            Err(ClientError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_file_source_fetches_by_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.yaml");
        std::fs::write(&path, MATRIX).unwrap();

        let source = FileVersionSource::new(path.clone());
        let online = source.fetch(ImageMode::Online).await.unwrap();
        let offline = source.fetch(ImageMode::Offline).await.unwrap();
        assert_eq!(online.len(), 2);
        assert_eq!(offline.len(), 1);
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileVersionSource::new("/nonexistent/versions.yaml");
        let err = source.fetch(ImageMode::Online).await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
    }

    #[test]
    fn test_image_mode_from_offline() {
        assert_eq!(ImageMode::from_offline(true), ImageMode::Offline);
        assert_eq!(ImageMode::from_offline(false), ImageMode::Online);
        assert_eq!(ImageMode::Offline.to_string(), "offline");
    }
}
