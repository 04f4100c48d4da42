//! Version catalog
//!
//! Read-only view of the Kubernetes version matrix for both image modes,
//! plus the loader that fetches it once at wizard entry.

use crate::config::{RuntimeThresholds, WizardConfig};
use crate::error::WizardError;
use crate::types::RuntimeKind;
use kc_client::{ImageMode, KubernetesRelease, VersionControlItem, VersionSource};
use semver::Version;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Duration;
use tokio::sync::Mutex;

/// A runtime or CNI version option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionItem {
    pub name: String,
    pub version: String,
    pub is_default: bool,
}

impl From<&VersionControlItem> for VersionItem {
    fn from(item: &VersionControlItem) -> Self {
        Self {
            name: item.name.clone(),
            version: item.version.clone(),
            is_default: item.default,
        }
    }
}

/// One Kubernetes version and everything compatible with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionEntry {
    pub version: String,
    pub semver: Version,
    pub supported_architectures: BTreeSet<String>,
    pub compatible_runtimes: Vec<VersionItem>,
    pub compatible_cni_plugins: Vec<VersionItem>,
}

impl VersionEntry {
    pub fn from_release(release: &KubernetesRelease) -> Result<Self, semver::Error> {
        Ok(Self {
            version: release.version.clone(),
            semver: parse_kube_version(&release.version)?,
            supported_architectures: release.archs.iter().cloned().collect(),
            compatible_runtimes: release.version_control.cri.iter().map(Into::into).collect(),
            compatible_cni_plugins: release.version_control.cni.iter().map(Into::into).collect(),
        })
    }

    pub fn supports_arch(&self, arch: &str) -> bool {
        self.supported_architectures.contains(arch)
    }
}

/// Parse a Kubernetes version, with or without the leading `v`
pub fn parse_kube_version(value: &str) -> Result<Version, semver::Error> {
    Version::parse(value.strip_prefix('v').unwrap_or(value))
}

/// The loaded version matrix
#[derive(Debug, Clone, PartialEq)]
pub struct VersionCatalog {
    online: Vec<VersionEntry>,
    offline: Vec<VersionEntry>,
    thresholds: RuntimeThresholds,
}

impl VersionCatalog {
    /// Build a catalog; at least one image mode must offer a version
    pub fn new(
        online: Vec<VersionEntry>,
        offline: Vec<VersionEntry>,
        thresholds: RuntimeThresholds,
    ) -> Result<Self, WizardError> {
        if online.is_empty() && offline.is_empty() {
            return Err(WizardError::CatalogUnavailable(
                "version matrix is empty".to_string(),
            ));
        }
        Ok(Self {
            online,
            offline,
            thresholds,
        })
    }

    pub fn entries(&self, mode: ImageMode) -> &[VersionEntry] {
        match mode {
            ImageMode::Online => &self.online,
            ImageMode::Offline => &self.offline,
        }
    }

    pub fn find(&self, mode: ImageMode, version: &str) -> Option<&VersionEntry> {
        self.entries(mode).iter().find(|e| e.version == version)
    }

    pub fn thresholds(&self) -> &RuntimeThresholds {
        &self.thresholds
    }

    /// Runtime versions of `kind` compatible with `entry`; empty when none match
    pub fn runtimes_for(entry: &VersionEntry, kind: RuntimeKind) -> Vec<VersionItem> {
        entry
            .compatible_runtimes
            .iter()
            .filter(|item| item.name == kind.as_str())
            .cloned()
            .collect()
    }

    /// CNI plugin versions named `name` compatible with `entry`
    pub fn cni_for(entry: &VersionEntry, name: &str) -> Vec<VersionItem> {
        entry
            .compatible_cni_plugins
            .iter()
            .filter(|item| item.name == name)
            .cloned()
            .collect()
    }

    /// Names of the CNI plugins compatible with `entry`, in matrix order
    pub fn cni_names(entry: &VersionEntry) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for item in &entry.compatible_cni_plugins {
            if !names.contains(&item.name) {
                names.push(item.name.clone());
            }
        }
        names
    }

    /// The item flagged default, if any
    pub fn default_for(items: &[VersionItem]) -> Option<&VersionItem> {
        items.iter().find(|item| item.is_default)
    }

    /// Runtime a fresh selection of `version` starts with
    pub fn default_runtime(&self, version: &Version) -> RuntimeKind {
        if *version >= self.thresholds.containerd_default_from {
            RuntimeKind::Containerd
        } else {
            RuntimeKind::Docker
        }
    }

    /// Runtimes that may be used with `version`
    pub fn allowed_runtimes(&self, version: &Version) -> Vec<RuntimeKind> {
        if *version >= self.thresholds.docker_removed_from {
            vec![RuntimeKind::Containerd]
        } else {
            RuntimeKind::ALL.to_vec()
        }
    }
}

/// Fetches the version matrix, one request at a time
///
/// Concurrent callers queue behind the request in flight, so state is
/// never updated from two fetches at once.
pub struct CatalogLoader<S> {
    source: S,
    timeout: Duration,
    thresholds: RuntimeThresholds,
    in_flight: Mutex<()>,
}

impl<S: VersionSource> CatalogLoader<S> {
    pub fn new(source: S, config: &WizardConfig) -> Self {
        Self {
            source,
            timeout: config.fetch_timeout(),
            thresholds: config.thresholds.clone(),
            in_flight: Mutex::new(()),
        }
    }

    /// Versions for one image mode; an empty list is an error
    pub async fn load(&self, mode: ImageMode) -> Result<Vec<VersionEntry>, WizardError> {
        let _guard = self.in_flight.lock().await;
        let entries = self.fetch_entries(mode).await?;
        if entries.is_empty() {
            return Err(WizardError::CatalogUnavailable(format!(
                "no {} versions available",
                mode
            )));
        }
        Ok(entries)
    }

    /// Both image modes as a catalog
    pub async fn load_catalog(&self) -> Result<VersionCatalog, WizardError> {
        let _guard = self.in_flight.lock().await;
        let online = self.fetch_entries(ImageMode::Online).await?;
        let offline = self.fetch_entries(ImageMode::Offline).await?;
        tracing::info!(
            "Loaded version catalog: {} online, {} offline",
            online.len(),
            offline.len()
        );
        VersionCatalog::new(online, offline, self.thresholds.clone())
    }

    async fn fetch_entries(&self, mode: ImageMode) -> Result<Vec<VersionEntry>, WizardError> {
        let releases = match tokio::time::timeout(self.timeout, self.source.fetch(mode)).await {
            Ok(Ok(releases)) => releases,
            Ok(Err(e)) => {
                tracing::warn!("Failed to fetch {} versions: {}", mode, e);
                return Err(WizardError::CatalogUnavailable(e.to_string()));
            }
            Err(_) => {
                tracing::warn!("Fetching {} versions timed out", mode);
                return Err(WizardError::CatalogUnavailable(format!(
                    "{} version fetch timed out after {:?}",
                    mode, self.timeout
                )));
            }
        };

        releases
            .iter()
            .map(|release| {
                VersionEntry::from_release(release).map_err(|e| {
                    WizardError::CatalogUnavailable(format!(
                        "malformed version {}: {}",
                        release.version, e
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sources::*;
    use kc_client::{ClientError, VersionControl, VersionMatrix};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn item(name: &str, version: &str, default: bool) -> VersionControlItem {
        VersionControlItem {
            name: name.to_string(),
            version: version.to_string(),
            default,
        }
    }

    fn release(version: &str) -> KubernetesRelease {
        KubernetesRelease {
            version: version.to_string(),
            archs: vec!["amd64".to_string()],
            version_control: VersionControl {
                cri: vec![
                    item("containerd", "1.6.4", true),
                    item("containerd", "1.5.9", false),
                    item("docker", "20.10.20", true),
                ],
                cni: vec![item("calico", "v3.22.4", true)],
            },
        }
    }

    fn catalog() -> VersionCatalog {
        let online = ["v1.18.6", "v1.23.6", "v1.24.0", "v1.27.4"]
            .iter()
            .map(|v| VersionEntry::from_release(&release(v)).unwrap())
            .collect();
        VersionCatalog::new(online, vec![], RuntimeThresholds::default()).unwrap()
    }

    #[test]
    fn test_runtimes_for_filters_by_kind() {
        let catalog = catalog();
        let entry = catalog.find(ImageMode::Online, "v1.23.6").unwrap();

        let containerd = VersionCatalog::runtimes_for(entry, RuntimeKind::Containerd);
        assert_eq!(containerd.len(), 2);
        assert_eq!(
            VersionCatalog::default_for(&containerd).unwrap().version,
            "1.6.4"
        );

        let calico = VersionCatalog::cni_for(entry, "calico");
        assert_eq!(calico.len(), 1);
        assert!(VersionCatalog::cni_for(entry, "cilium").is_empty());
    }

    #[test]
    fn test_default_for_without_flag() {
        let items = vec![VersionItem {
            name: "docker".to_string(),
            version: "19.03.12".to_string(),
            is_default: false,
        }];
        assert!(VersionCatalog::default_for(&items).is_none());
        assert!(VersionCatalog::default_for(&[]).is_none());
    }

    #[test]
    fn test_docker_removed_from_1_24() {
        let catalog = catalog();
        for entry in catalog.entries(ImageMode::Online) {
            let allowed = catalog.allowed_runtimes(&entry.semver);
            if entry.semver >= Version::new(1, 24, 0) {
                assert_eq!(allowed, vec![RuntimeKind::Containerd], "{}", entry.version);
                assert_eq!(catalog.default_runtime(&entry.semver), RuntimeKind::Containerd);
            } else {
                assert!(allowed.contains(&RuntimeKind::Docker), "{}", entry.version);
            }
        }
    }

    #[test]
    fn test_default_runtime_threshold() {
        let catalog = catalog();
        assert_eq!(
            catalog.default_runtime(&parse_kube_version("v1.18.6").unwrap()),
            RuntimeKind::Docker
        );
        assert_eq!(
            catalog.default_runtime(&parse_kube_version("1.20.0").unwrap()),
            RuntimeKind::Containerd
        );
    }

    #[test]
    fn test_empty_catalog_is_unavailable() {
        let err = VersionCatalog::new(vec![], vec![], RuntimeThresholds::default()).unwrap_err();
        assert!(matches!(err, WizardError::CatalogUnavailable(_)));
    }

    #[tokio::test]
    async fn test_loader_rejects_malformed_version() {
        let matrix = VersionMatrix {
            online: vec![release("latest")],
            offline: vec![],
        };
        let loader = CatalogLoader::new(matrix, &WizardConfig::default());
        let err = loader.load_catalog().await.unwrap_err();
        assert!(err.to_string().contains("malformed version latest"));
    }

    #[tokio::test]
    async fn test_loader_empty_mode() {
        let matrix = VersionMatrix {
            online: vec![release("v1.23.6")],
            offline: vec![],
        };
        let loader = CatalogLoader::new(matrix, &WizardConfig::default());
        assert_eq!(loader.load(ImageMode::Online).await.unwrap().len(), 1);
        assert!(matches!(
            loader.load(ImageMode::Offline).await,
            Err(WizardError::CatalogUnavailable(_))
        ));
        // An empty offline list is fine for the catalog as a whole
        let catalog = loader.load_catalog().await.unwrap();
        assert!(catalog.entries(ImageMode::Offline).is_empty());
    }

    #[tokio::test]
    async fn test_loader_source_failure() {
        let loader = CatalogLoader::new(FailingSource, &WizardConfig::default());
        let err = loader.load_catalog().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Version catalog unavailable: Document not found: versions.yaml"
        );
    }

    #[tokio::test]
    async fn test_loader_times_out() {
        let config = WizardConfig {
            fetch_timeout_secs: 0,
            ..WizardConfig::default()
        };
        let loader = CatalogLoader::new(
            SlowSource {
                active: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                delay: Duration::from_millis(200),
            },
            &config,
        );
        let err = loader.load(ImageMode::Online).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_loader_single_flight() {
        let peak = Arc::new(AtomicUsize::new(0));
        let loader = CatalogLoader::new(
            SlowSource {
                active: Arc::new(AtomicUsize::new(0)),
                peak: peak.clone(),
                delay: Duration::from_millis(20),
            },
            &WizardConfig::default(),
        );

        let (a, b) = tokio::join!(loader.load_catalog(), loader.load(ImageMode::Online));
        assert!(a.is_ok());
        assert!(b.is_ok());
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    /// Test sources
    mod sources {
        use super::*;

        pub struct FailingSource;

        #[async_trait::async_trait]
        impl VersionSource for FailingSource {
            async fn fetch(&self, _mode: ImageMode) -> Result<Vec<KubernetesRelease>, ClientError> {
                Err(ClientError::NotFound("versions.yaml".to_string()))
            }
        }

        pub struct SlowSource {
            pub active: Arc<AtomicUsize>,
            pub peak: Arc<AtomicUsize>,
            pub delay: Duration,
        }

        #[async_trait::async_trait]
        impl VersionSource for SlowSource {
            async fn fetch(&self, _mode: ImageMode) -> Result<Vec<KubernetesRelease>, ClientError> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(self.delay).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![release("v1.23.6")])
            }
        }
    }
}
