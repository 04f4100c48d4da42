//! Wizard state
//!
//! Field values per step, the derived context computed from them, and the
//! addon slots of the storage and plugin steps. The controller is the only
//! writer; rules read it.

use crate::catalog::VersionItem;
use crate::types::{FieldValue, IpFamily, RuntimeKind, UnderlayMode};
use kc_client::ImageMode;
use std::collections::BTreeMap;

/// Config of an enabled addon, as entered
pub type AddonConfig = serde_json::Map<String, serde_json::Value>;

static EMPTY: FieldValue = FieldValue::Empty;

/// Entries of one storage provisioner; `None` marks a disabled entry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageTab {
    pub name: String,
    pub entries: Vec<Option<AddonConfig>>,
}

/// Storage and plugin slots
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Addons {
    pub storage: Vec<StorageTab>,
    pub plugins: BTreeMap<String, Option<AddonConfig>>,
}

impl Addons {
    /// Enabled storage entries as `(component, config)`
    pub fn enabled_storage(&self) -> impl Iterator<Item = (&str, &AddonConfig)> {
        self.storage.iter().flat_map(|tab| {
            tab.entries
                .iter()
                .flatten()
                .map(move |config| (tab.name.as_str(), config))
        })
    }

    /// Enabled plugins as `(component, config)`
    pub fn enabled_plugins(&self) -> impl Iterator<Item = (&str, &AddonConfig)> {
        self.plugins
            .iter()
            .filter_map(|(name, config)| config.as_ref().map(|c| (name.as_str(), c)))
    }

    /// `scName` of every enabled storage entry
    pub fn storage_class_names(&self) -> Vec<&str> {
        self.enabled_storage()
            .filter_map(|(_, config)| config.get("scName").and_then(|v| v.as_str()))
            .collect()
    }
}

/// Values derived from committed fields
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WizardContext {
    /// Common architecture of the selected nodes
    pub arch: Option<String>,
    pub kubernetes_versions: Vec<String>,
    pub runtime_options: Vec<RuntimeKind>,
    pub containerd_versions: Vec<VersionItem>,
    pub docker_versions: Vec<VersionItem>,
    pub calico_versions: Vec<VersionItem>,
    /// CNI plugins the selected Kubernetes version ships with
    pub cni_types: Vec<String>,
    /// Default image registry for addons
    pub component_registry: Option<String>,
    /// Registry last written into an insecure-registry field
    pub locked_registry: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WizardState {
    steps: Vec<BTreeMap<String, FieldValue>>,
    pub context: WizardContext,
    pub addons: Addons,
    current_step: usize,
}

impl WizardState {
    pub fn new(step_count: usize) -> Self {
        Self {
            steps: vec![BTreeMap::new(); step_count],
            context: WizardContext::default(),
            addons: Addons::default(),
            current_step: 0,
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn current_step(&self) -> usize {
        self.current_step
    }

    pub(crate) fn set_current_step(&mut self, step: usize) {
        self.current_step = step;
    }

    /// Value of `key` on whichever step holds it
    pub fn value(&self, key: &str) -> &FieldValue {
        self.steps
            .iter()
            .find_map(|values| values.get(key))
            .unwrap_or(&EMPTY)
    }

    /// Store `value`; returns false when nothing changed
    pub(crate) fn set(&mut self, step: usize, key: &str, value: FieldValue) -> bool {
        let Some(values) = self.steps.get_mut(step) else {
            return false;
        };
        if values.get(key) == Some(&value) {
            return false;
        }
        values.insert(key.to_string(), value);
        true
    }

    /// Trimmed text of `key`, `None` when blank
    pub fn text(&self, key: &str) -> Option<&str> {
        self.value(key)
            .as_text()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.value(key).as_flag().unwrap_or(false)
    }

    pub fn image_mode(&self) -> ImageMode {
        ImageMode::from_offline(self.flag("offline"))
    }

    pub fn runtime(&self) -> Option<RuntimeKind> {
        self.text("containerRuntimeType").and_then(RuntimeKind::parse)
    }

    pub fn is_docker(&self) -> bool {
        self.runtime() == Some(RuntimeKind::Docker)
    }

    pub fn is_calico(&self) -> bool {
        self.text("cniType") == Some("calico")
    }

    pub fn ip_family(&self) -> IpFamily {
        self.text("IPVersion")
            .and_then(IpFamily::parse)
            .unwrap_or(IpFamily::Ipv4)
    }

    pub fn is_dual_stack(&self) -> bool {
        self.ip_family() == IpFamily::DualStack
    }

    pub fn underlay(&self) -> UnderlayMode {
        self.text("podNetworkUnderlay")
            .and_then(UnderlayMode::parse)
            .unwrap_or(UnderlayMode::FirstFound)
    }

    pub fn underlay_v6(&self) -> UnderlayMode {
        self.text("podNetworkUnderlayV6")
            .and_then(UnderlayMode::parse)
            .unwrap_or(UnderlayMode::FirstFound)
    }

    /// Selected master and worker node ids, masters first
    pub fn selected_nodes(&self) -> Vec<String> {
        let mut nodes = self.value("masters").list_values();
        nodes.extend(self.value("workers").list_values());
        nodes
    }
}
