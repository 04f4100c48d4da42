//! Document assembly
//!
//! Pure transforms from a finished wizard state into the documents handed
//! to the store. Only fields visible under the final values contribute.
//!
//! Masked addon properties and provider credentials are base64 encoded.
//! That keeps them out of casual view in transit; it is not encryption.

use crate::catalog::VersionCatalog;
use crate::error::AssemblyError;
use crate::rules::Resources;
use crate::state::{AddonConfig, WizardState};
use crate::types::{FieldValue, RuntimeKind, UnderlayMode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kc_client::{ComponentSchema, Document, find_component};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const API_VERSION: &str = "core.kubeclipper.io/v1";

pub const LABEL_PROJECT: &str = "kubeclipper.io/project";
pub const LABEL_REGION: &str = "topology.kubeclipper.io/region";
pub const LABEL_BACKUP_POINT: &str = "kubeclipper.io/backupPoint";
pub const LABEL_EXTERNAL_IP: &str = "kubeclipper.io/externalIP";
pub const ANNOTATION_DESCRIPTION: &str = "kubeclipper.io/description";
pub const ANNOTATION_OFFLINE: &str = "kubeclipper.io/offline";

/// Addon array properties whose empty elements are dropped
const FILTERED_ARRAYS: [&str; 2] = ["mountOptions", "monitors"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAssignment {
    pub id: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerRuntime {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default)]
    pub insecure_registry: Vec<String>,
    pub root_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CidrBlocks {
    pub cidr_blocks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Networking {
    pub ip_family: String,
    pub services: CidrBlocks,
    pub dns_domain: String,
    pub pods: CidrBlocks,
    #[serde(default)]
    pub worker_node_vip: String,
    pub proxy_mode: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeletConfig {
    pub root_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalicoConfig {
    #[serde(rename = "IPv4AutoDetection")]
    pub ipv4_auto_detection: String,
    #[serde(rename = "IPv6AutoDetection", default)]
    pub ipv6_auto_detection: String,
    pub mode: String,
    #[serde(rename = "IPManger")]
    pub ip_manager: bool,
    pub mtu: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CniConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calico: Option<CalicoConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Addon {
    pub name: String,
    pub version: String,
    pub config: AddonConfig,
}

/// Cluster body shared by cluster documents and templates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    #[serde(rename = "certSANs", default)]
    pub cert_sans: Vec<String>,
    #[serde(default)]
    pub local_registry: String,
    pub kubernetes_version: String,
    pub container_runtime: ContainerRuntime,
    pub networking: Networking,
    #[serde(default)]
    pub kube_proxy: serde_json::Map<String, Value>,
    pub etcd: EtcdConfig,
    pub kubelet: KubeletConfig,
    pub cni: CniConfig,
    #[serde(default)]
    pub addons: Vec<Addon>,
}

/// Cluster creation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentSpec {
    pub kind: String,
    pub api_version: String,
    pub metadata: ObjectMeta,
    pub provider: ProviderRef,
    #[serde(flatten)]
    pub config: ClusterConfig,
    pub masters: Vec<NodeAssignment>,
    #[serde(default)]
    pub workers: Vec<NodeAssignment>,
}

impl Document for DeploymentSpec {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &str {
        &self.metadata.name
    }
}

/// Stored cluster body of a template, without name, nodes, project or region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(flatten)]
    pub cluster: ClusterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSpec {
    pub template_name: String,
    #[serde(default)]
    pub template_description: String,
    pub plugin_name: String,
    pub plugin_version: String,
    pub plugin_category: String,
    pub config: TemplateConfig,
}

impl Document for TemplateSpec {
    fn kind(&self) -> &str {
        "Template"
    }

    fn name(&self) -> &str {
        &self.template_name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_endpoint: String,
    pub cluster_name: String,
    pub kube_config: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshConfig {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    pub port: u16,
}

/// Cloud provider registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    pub kind: String,
    pub api_version: String,
    pub metadata: ObjectMeta,
    #[serde(rename = "type")]
    pub provider_type: String,
    pub region: String,
    pub config: ProviderConfig,
    pub ssh: SshConfig,
}

impl Document for ProviderSpec {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn name(&self) -> &str {
        &self.metadata.name
    }
}

pub fn encode(value: &str) -> String {
    STANDARD.encode(value)
}

fn required_text(state: &WizardState, key: &str) -> Result<String, AssemblyError> {
    state
        .text(key)
        .map(str::to_string)
        .ok_or_else(|| AssemblyError::MissingContext(key.to_string()))
}

fn optional_text(state: &WizardState, key: &str) -> String {
    state.text(key).unwrap_or_default().to_string()
}

/// `first-found` or `<mode>=<value>`
fn auto_detection(
    state: &WizardState,
    mode: UnderlayMode,
    key: &str,
) -> Result<String, AssemblyError> {
    match mode {
        UnderlayMode::FirstFound => Ok(mode.as_str().to_string()),
        _ => Ok(format!("{}={}", mode.as_str(), required_text(state, key)?)),
    }
}

fn cni_config(state: &WizardState, resources: &Resources) -> Result<CniConfig, AssemblyError> {
    let kind = required_text(state, "cniType")?;

    if !state.is_calico() {
        let version = resources
            .catalog
            .find(state.image_mode(), state.text("kubernetesVersion").unwrap_or_default())
            .and_then(|entry| {
                VersionCatalog::default_for(&VersionCatalog::cni_for(entry, &kind))
                    .map(|item| item.version.clone())
            })
            .ok_or_else(|| AssemblyError::MissingContext(format!("{} version", kind)))?;
        return Ok(CniConfig {
            kind,
            version,
            calico: None,
        });
    }

    let ipv6_auto_detection = if state.is_dual_stack() {
        auto_detection(state, state.underlay_v6(), "IPv6AutoDetection")?
    } else {
        String::new()
    };
    let mtu = state
        .value("mtu")
        .as_number()
        .ok_or_else(|| AssemblyError::MissingContext("mtu".to_string()))?;

    Ok(CniConfig {
        kind,
        version: required_text(state, "calicoVersion")?,
        calico: Some(CalicoConfig {
            ipv4_auto_detection: auto_detection(state, state.underlay(), "IPv4AutoDetection")?,
            ipv6_auto_detection,
            mode: required_text(state, "calicoMode")?,
            ip_manager: state.flag("IPManger"),
            mtu,
        }),
    })
}

fn runtime_config(state: &WizardState) -> Result<ContainerRuntime, AssemblyError> {
    let runtime = state
        .runtime()
        .ok_or_else(|| AssemblyError::MissingContext("containerRuntimeType".to_string()))?;
    let (version_key, root_key) = match runtime {
        RuntimeKind::Docker => ("dockerVersion", "dockerRootDir"),
        RuntimeKind::Containerd => ("containerdVersion", "containerdRootDir"),
    };
    Ok(ContainerRuntime {
        kind: runtime.as_str().to_string(),
        version: required_text(state, version_key)?,
        insecure_registry: state.value(runtime.registry_field()).list_values(),
        root_dir: required_text(state, root_key)?,
    })
}

/// v4 first, then v6 in dual-stack
fn cidr_blocks(state: &WizardState, v4: &str, v6: &str) -> Result<CidrBlocks, AssemblyError> {
    let mut cidr_blocks = vec![required_text(state, v4)?];
    if state.is_dual_stack() {
        cidr_blocks.push(required_text(state, v6)?);
    }
    Ok(CidrBlocks { cidr_blocks })
}

fn networking(state: &WizardState) -> Result<Networking, AssemblyError> {
    Ok(Networking {
        ip_family: state.ip_family().as_str().to_string(),
        services: cidr_blocks(state, "serviceSubnet", "serviceSubnetV6")?,
        dns_domain: required_text(state, "dnsDomain")?,
        pods: cidr_blocks(state, "podIPv4CIDR", "podIPv6CIDR")?,
        worker_node_vip: optional_text(state, "workerNodeVip"),
        proxy_mode: required_text(state, "proxyMode")?,
    })
}

/// Cluster body from the cluster step
pub fn cluster_config(
    state: &WizardState,
    resources: &Resources,
) -> Result<ClusterConfig, AssemblyError> {
    let kubernetes_version = required_text(state, "kubernetesVersion")?;
    if resources
        .catalog
        .find(state.image_mode(), &kubernetes_version)
        .is_none()
    {
        return Err(AssemblyError::MissingContext(format!(
            "catalog entry for {}",
            kubernetes_version
        )));
    }

    Ok(ClusterConfig {
        cert_sans: state.value("certSANs").list_values(),
        local_registry: optional_text(state, "localRegistry"),
        kubernetes_version,
        container_runtime: runtime_config(state)?,
        networking: networking(state)?,
        kube_proxy: serde_json::Map::new(),
        etcd: EtcdConfig {
            data_dir: required_text(state, "etcdDataDir")?,
        },
        kubelet: KubeletConfig {
            root_dir: required_text(state, "kubeletDataDir")?,
        },
        cni: cni_config(state, resources)?,
        addons: assemble_addons(state, resources)?,
    })
}

/// Base64 every masked property present in `config`
pub fn encode_masked(config: &mut AddonConfig, schema: &ComponentSchema) {
    for prop in schema.masked() {
        let encoded = match config.get(prop) {
            None | Some(Value::Null) => continue,
            Some(Value::String(s)) => encode(s),
            Some(other) => encode(&other.to_string()),
        };
        config.insert(prop.to_string(), Value::String(encoded));
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn drop_empty_elements(config: &mut AddonConfig) {
    for key in FILTERED_ARRAYS {
        if let Some(Value::Array(items)) = config.get_mut(key) {
            items.retain(is_truthy);
        }
    }
}

/// Enabled storage entries, then enabled plugins
pub fn assemble_addons(
    state: &WizardState,
    resources: &Resources,
) -> Result<Vec<Addon>, AssemblyError> {
    let default_storage = state.text("defaultStorage");
    let mut addons = Vec::new();

    for (name, entry) in state.addons.enabled_storage() {
        let component = find_component(&resources.components, name)
            .ok_or_else(|| AssemblyError::UnknownComponent(name.to_string()))?;

        let mut config = entry.clone();
        config.remove("enable");
        drop_empty_elements(&mut config);

        let sc_name = config.get("scName").and_then(Value::as_str);
        let is_default = default_storage.is_some() && sc_name == default_storage;
        config.insert("isDefaultSC".to_string(), Value::Bool(is_default));

        let has_mirror = config
            .get("imageRepoMirror")
            .is_some_and(is_truthy);
        if component.schema.declares("imageRepoMirror") && !has_mirror {
            if let Some(registry) = &state.context.component_registry {
                config.insert(
                    "imageRepoMirror".to_string(),
                    Value::String(registry.clone()),
                );
            }
        }

        encode_masked(&mut config, &component.schema);
        addons.push(Addon {
            name: name.to_string(),
            version: component.version.clone(),
            config,
        });
    }

    for (name, entry) in state.addons.enabled_plugins() {
        let component = find_component(&resources.components, name)
            .ok_or_else(|| AssemblyError::UnknownComponent(name.to_string()))?;

        let mut config = entry.clone();
        config.remove("enable");
        drop_empty_elements(&mut config);
        encode_masked(&mut config, &component.schema);
        addons.push(Addon {
            name: name.to_string(),
            version: component.version.clone(),
            config,
        });
    }
    Ok(addons)
}

/// backupPoint, externalIP and user labels
fn cluster_labels(state: &WizardState) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    if let Some(backup_point) = state.text("backupPoint") {
        labels.insert(LABEL_BACKUP_POINT.to_string(), backup_point.to_string());
    }
    if let Some(external_ip) = state.text("externalIP") {
        labels.insert(LABEL_EXTERNAL_IP.to_string(), external_ip.to_string());
    }
    for pair in state.value("labels").as_pairs() {
        if !pair.key.is_empty() {
            labels.insert(pair.key.clone(), pair.value.clone());
        }
    }
    labels
}

fn cluster_annotations(state: &WizardState) -> BTreeMap<String, String> {
    let mut annotations = BTreeMap::new();
    annotations.insert(
        ANNOTATION_DESCRIPTION.to_string(),
        optional_text(state, "description"),
    );
    if state.flag("offline") {
        annotations.insert(ANNOTATION_OFFLINE.to_string(), String::new());
    }
    annotations
}

fn node_assignments(
    state: &WizardState,
    resources: &Resources,
    key: &str,
) -> Result<Vec<NodeAssignment>, AssemblyError> {
    state
        .value(key)
        .list_values()
        .into_iter()
        .map(|id| {
            let node = resources
                .inventory
                .node(&id)
                .ok_or_else(|| AssemblyError::MissingContext(format!("node {}", id)))?;
            let mut labels = BTreeMap::new();
            labels.insert(LABEL_REGION.to_string(), node.region.clone());
            Ok(NodeAssignment { id, labels })
        })
        .collect()
}

/// Cluster document from a finished cluster flow
pub fn assemble(
    state: &WizardState,
    resources: &Resources,
) -> Result<DeploymentSpec, AssemblyError> {
    let name = required_text(state, "name")?;
    let region = required_text(state, "region")?;
    if state.context.arch.is_none() {
        return Err(AssemblyError::MissingContext("node architecture".to_string()));
    }

    let mut labels = cluster_labels(state);
    labels.insert(LABEL_REGION.to_string(), region);
    if let Some(project) = &resources.project {
        labels.insert(LABEL_PROJECT.to_string(), project.clone());
    }

    Ok(DeploymentSpec {
        kind: "Cluster".to_string(),
        api_version: API_VERSION.to_string(),
        metadata: ObjectMeta {
            name,
            labels,
            annotations: cluster_annotations(state),
        },
        provider: ProviderRef {
            name: resources.config.defaults.provider_type.clone(),
        },
        config: cluster_config(state, resources)?,
        masters: node_assignments(state, resources, "masters")?,
        workers: node_assignments(state, resources, "workers")?,
    })
}

/// Template document from a finished template flow
pub fn assemble_template(
    state: &WizardState,
    resources: &Resources,
) -> Result<TemplateSpec, AssemblyError> {
    Ok(TemplateSpec {
        template_name: required_text(state, "templateName")?,
        template_description: optional_text(state, "templateDescription"),
        plugin_name: "kubernetes".to_string(),
        plugin_version: "v1".to_string(),
        plugin_category: "kubernetes".to_string(),
        config: TemplateConfig {
            metadata: ObjectMeta {
                name: String::new(),
                labels: cluster_labels(state),
                annotations: cluster_annotations(state),
            },
            cluster: cluster_config(state, resources)?,
        },
    })
}

/// Provider document from a finished provider flow
pub fn assemble_provider(state: &WizardState) -> Result<ProviderSpec, AssemblyError> {
    let mut labels = BTreeMap::new();
    labels.insert(LABEL_PROJECT.to_string(), required_text(state, "project")?);
    let mut annotations = BTreeMap::new();
    annotations.insert(
        ANNOTATION_DESCRIPTION.to_string(),
        optional_text(state, "description"),
    );

    let (password, private_key) = if state.text("sshType") == Some("password") {
        (Some(encode(&required_text(state, "password")?)), None)
    } else {
        (None, Some(encode(&required_text(state, "privateKey")?)))
    };

    Ok(ProviderSpec {
        kind: "CloudProvider".to_string(),
        api_version: API_VERSION.to_string(),
        metadata: ObjectMeta {
            name: required_text(state, "name")?,
            labels,
            annotations,
        },
        provider_type: required_text(state, "type")?,
        region: required_text(state, "region")?,
        config: ProviderConfig {
            api_endpoint: optional_text(state, "apiEndpoint"),
            cluster_name: required_text(state, "clusterName")?,
            kube_config: encode(&required_text(state, "kubeConfig")?),
        },
        ssh: SshConfig {
            user: required_text(state, "user")?,
            password,
            private_key,
            port: 22,
        },
    })
}

/// Field value of a detection string, split back into mode and value
pub(crate) fn split_detection(detection: &str) -> (UnderlayMode, FieldValue) {
    match detection.split_once('=') {
        Some((mode, value)) => match UnderlayMode::parse(mode) {
            Some(mode) => (mode, FieldValue::text(value)),
            None => (UnderlayMode::FirstFound, FieldValue::Empty),
        },
        None => (UnderlayMode::FirstFound, FieldValue::Empty),
    }
}
