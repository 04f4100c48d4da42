//! Field definitions
//!
//! One table per flow: every field with its visibility and required
//! predicates, validator, option source and the keys it invalidates.

use crate::catalog::VersionCatalog;
use crate::rules::{Resources, RuleEnv};
use crate::state::WizardState;
use crate::types::{FieldKind, FieldValue, StepKind, UnderlayMode};
use crate::validate;
use kc_client::{ComponentCategory, ImageMode};

pub type Predicate = fn(&WizardState) -> bool;
pub type Validator = fn(&FieldValue, &RuleEnv<'_>) -> Result<(), String>;
pub type OptionsFn = fn(&RuleEnv<'_>) -> Vec<String>;
pub type DefaultFn = fn(&Resources) -> FieldValue;

/// Where a field's choices come from
#[derive(Clone, Copy)]
pub enum OptionSet {
    /// Free input
    Any,
    /// Value must be one of these
    OneOf(OptionsFn),
    /// Offered choices; other input allowed
    Suggest(OptionsFn),
}

#[derive(Clone)]
pub struct FieldDefinition {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub visible_when: Predicate,
    pub required_when: Predicate,
    pub validate: Validator,
    /// Keys to recompute after this field changes
    pub dependents: &'static [&'static str],
    pub options: OptionSet,
    pub default: DefaultFn,
}

impl std::fmt::Debug for FieldDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldDefinition")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .field("dependents", &self.dependents)
            .finish()
    }
}

fn always(_: &WizardState) -> bool {
    true
}

fn never(_: &WizardState) -> bool {
    false
}

fn accept(_: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    Ok(())
}

fn no_default(_: &Resources) -> FieldValue {
    FieldValue::Empty
}

impl FieldDefinition {
    pub fn new(key: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            key,
            label,
            kind,
            visible_when: always,
            required_when: never,
            validate: accept,
            dependents: &[],
            options: OptionSet::Any,
            default: no_default,
        }
    }

    /// Required whenever visible
    pub fn required(mut self) -> Self {
        self.required_when = always;
        self
    }

    pub fn required_when(mut self, predicate: Predicate) -> Self {
        self.required_when = predicate;
        self
    }

    pub fn visible_when(mut self, predicate: Predicate) -> Self {
        self.visible_when = predicate;
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate = validator;
        self
    }

    pub fn dependents(mut self, keys: &'static [&'static str]) -> Self {
        self.dependents = keys;
        self
    }

    pub fn options(mut self, options: OptionSet) -> Self {
        self.options = options;
        self
    }

    pub fn default(mut self, default: DefaultFn) -> Self {
        self.default = default;
        self
    }
}

/// Which wizard is being run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    CreateCluster,
    CreateTemplate,
    AddProvider,
}

impl FlowKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cluster" => Some(FlowKind::CreateCluster),
            "template" => Some(FlowKind::CreateTemplate),
            "provider" => Some(FlowKind::AddProvider),
            _ => None,
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowKind::CreateCluster => write!(f, "cluster"),
            FlowKind::CreateTemplate => write!(f, "template"),
            FlowKind::AddProvider => write!(f, "provider"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub kind: StepKind,
    pub fields: Vec<FieldDefinition>,
}

impl StepDefinition {
    fn new(kind: StepKind, fields: Vec<FieldDefinition>) -> Self {
        Self { kind, fields }
    }
}

/// Ordered steps of `flow`; the plugin step exists only when a plugin does
pub fn steps_for(flow: FlowKind, resources: &Resources) -> Vec<StepDefinition> {
    let has_plugins = resources
        .components
        .iter()
        .any(|c| c.category == ComponentCategory::Plugin);

    let mut steps = Vec::new();
    match flow {
        FlowKind::CreateCluster => {
            steps.push(StepDefinition::new(StepKind::Node, node_fields()));
            steps.push(StepDefinition::new(StepKind::Cluster, cluster_fields(flow)));
        }
        FlowKind::CreateTemplate => {
            steps.push(StepDefinition::new(StepKind::Cluster, cluster_fields(flow)));
        }
        FlowKind::AddProvider => {
            return vec![StepDefinition::new(StepKind::Provider, provider_fields())];
        }
    }

    steps.push(StepDefinition::new(StepKind::Storage, storage_fields()));
    if has_plugins {
        steps.push(StepDefinition::new(StepKind::Plugin, Vec::new()));
    }
    steps.push(StepDefinition::new(StepKind::Confirm, confirm_fields(flow)));
    steps
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

const CALICO_MODES: &[&str] = &[
    "BGP",
    "Overlay-IPIP-All",
    "Overlay-IPIP-Cross-Subnet",
    "Overlay-Vxlan-All",
    "Overlay-Vxlan-Cross-Subnet",
];
const PROXY_MODES: &[&str] = &["ipvs", "iptables"];
const IP_VERSIONS: &[&str] = &["IPv4", "IPv4+IPv6"];
const PROVIDER_TYPES: &[&str] = &["kubeadm"];
const SSH_TYPES: &[&str] = &["privateKey", "password"];

fn underlay_modes(_: &RuleEnv<'_>) -> Vec<String> {
    UnderlayMode::ALL.iter().map(|m| m.as_str().to_string()).collect()
}

fn text(value: &FieldValue) -> &str {
    value.as_text().unwrap_or("")
}

fn node_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("region", "Region", FieldKind::SingleSelect)
            .required()
            .options(OptionSet::OneOf(|env| env.resources.inventory.regions())),
        FieldDefinition::new("masters", "Master Nodes", FieldKind::MultiSelect)
            .required()
            .options(OptionSet::Suggest(nodes_in_region))
            .validate(validate_masters)
            .dependents(&["arch"]),
        FieldDefinition::new("workers", "Worker Nodes", FieldKind::MultiSelect)
            .options(OptionSet::Suggest(nodes_in_region))
            .validate(validate_workers)
            .dependents(&["arch"]),
    ]
}

fn nodes_in_region(env: &RuleEnv<'_>) -> Vec<String> {
    let region = env.state.text("region").unwrap_or("");
    env.resources
        .inventory
        .nodes_in(region)
        .map(|n| n.id.clone())
        .collect()
}

/// Existence, region, and duplicates of one role's node list
fn check_nodes(ids: &[String], env: &RuleEnv<'_>) -> Result<(), String> {
    let region = env.state.text("region").unwrap_or("");
    let mut seen = Vec::new();
    for id in ids {
        let node = env
            .resources
            .inventory
            .node(id)
            .ok_or_else(|| format!("node {} not found", id))?;
        if node.region != region {
            return Err(format!("node {} is not in region {}", id, region));
        }
        if seen.contains(&id) {
            return Err(format!("node {} selected twice", id));
        }
        seen.push(id);
    }
    Ok(())
}

fn validate_masters(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    let masters = value.list_values();
    check_nodes(&masters, env)?;

    let workers = env.state.value("workers").list_values();
    if let Some(both) = masters.iter().find(|id| workers.contains(id)) {
        return Err(format!("node {} is both master and worker", both));
    }

    let mut archs: Vec<&str> = masters
        .iter()
        .chain(workers.iter())
        .filter_map(|id| env.resources.inventory.node(id))
        .map(|n| n.arch.as_str())
        .collect();
    archs.sort_unstable();
    archs.dedup();
    if archs.len() > 1 {
        return Err(format!(
            "nodes must share one architecture, found {}",
            archs.join(", ")
        ));
    }
    Ok(())
}

fn validate_workers(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    check_nodes(&value.list_values(), env)
}

fn cluster_fields(flow: FlowKind) -> Vec<FieldDefinition> {
    let mut fields = Vec::new();
    if flow == FlowKind::CreateCluster {
        fields.push(
            FieldDefinition::new("name", "Cluster Name", FieldKind::Text)
                .required()
                .validate(validate_name),
        );
    }

    fields.extend([
        FieldDefinition::new("offline", "Image Type", FieldKind::Radio)
            .required()
            .default(|r| FieldValue::Flag(r.config.defaults.offline))
            .validate(validate_image_type)
            .dependents(&["kubernetesVersion"]),
        FieldDefinition::new("localRegistry", "Image Registry", FieldKind::SingleSelect)
            .options(OptionSet::Suggest(|env| {
                env.resources
                    .inventory
                    .registries
                    .iter()
                    .map(|r| r.host.clone())
                    .collect()
            }))
            .validate(validate_registry)
            .dependents(&["insecureRegistry", "componentRegistry"]),
        FieldDefinition::new("kubernetesVersion", "Kubernetes Version", FieldKind::SingleSelect)
            .required()
            .options(OptionSet::OneOf(|env| {
                env.state.context.kubernetes_versions.clone()
            }))
            .validate(validate_kubernetes_version)
            .dependents(&[
                "containerRuntimeType",
                "containerdVersion",
                "dockerVersion",
                "cniType",
                "calicoVersion",
                "insecureRegistry",
            ]),
        FieldDefinition::new("etcdDataDir", "ETCD Data Dir", FieldKind::Text)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.etcd_data_dir))
            .validate(validate_abs_path),
        FieldDefinition::new("kubeletDataDir", "Kubelet Data Dir", FieldKind::Text)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.kubelet_data_dir))
            .validate(validate_abs_path),
        FieldDefinition::new("certSANs", "Cert SANs", FieldKind::TextList)
            .validate(validate_cert_sans),
        FieldDefinition::new("containerRuntimeType", "Container Runtime", FieldKind::SingleSelect)
            .required()
            .options(OptionSet::OneOf(|env| {
                env.state
                    .context
                    .runtime_options
                    .iter()
                    .map(|r| r.as_str().to_string())
                    .collect()
            }))
            .validate(validate_runtime_type)
            .dependents(&["insecureRegistry"]),
        FieldDefinition::new("dockerVersion", "Docker Version", FieldKind::SingleSelect)
            .visible_when(WizardState::is_docker)
            .required()
            .options(OptionSet::Suggest(|env| {
                item_versions(&env.state.context.docker_versions)
            }))
            .validate(validate_docker_version),
        FieldDefinition::new("dockerRootDir", "Docker Root Dir", FieldKind::Text)
            .visible_when(WizardState::is_docker)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.docker_root_dir))
            .validate(validate_abs_path),
        FieldDefinition::new("dockerInsecureRegistry", "Docker Insecure Registry", FieldKind::TextList)
            .visible_when(WizardState::is_docker)
            .validate(validate_registry),
        FieldDefinition::new("containerdVersion", "Containerd Version", FieldKind::SingleSelect)
            .visible_when(|s| !s.is_docker())
            .required()
            .options(OptionSet::OneOf(|env| {
                item_versions(&env.state.context.containerd_versions)
            })),
        FieldDefinition::new("containerdRootDir", "Containerd Root Dir", FieldKind::Text)
            .visible_when(|s| !s.is_docker())
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.containerd_root_dir))
            .validate(validate_abs_path),
        FieldDefinition::new(
            "containerdInsecureRegistry",
            "Containerd Insecure Registry",
            FieldKind::TextList,
        )
        .visible_when(|s| !s.is_docker())
        .validate(validate_registry),
        FieldDefinition::new("dnsDomain", "DNS Domain", FieldKind::Text)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.dns_domain))
            .validate(|v, _| {
                if validate::is_fqdn(text(v)) {
                    Ok(())
                } else {
                    Err("must be a valid domain name".to_string())
                }
            }),
        FieldDefinition::new("workerNodeVip", "Worker Load Balancer IP", FieldKind::IpAddress)
            .default(|r| FieldValue::text(&r.config.defaults.worker_node_vip))
            .validate(validate_ipv4),
        FieldDefinition::new("cniType", "CNI", FieldKind::SingleSelect)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.cni_type))
            .options(OptionSet::OneOf(|env| env.state.context.cni_types.clone()))
            .validate(validate_cni_type),
        FieldDefinition::new("calicoVersion", "Calico Version", FieldKind::SingleSelect)
            .visible_when(WizardState::is_calico)
            .required()
            .options(OptionSet::OneOf(|env| {
                item_versions(&env.state.context.calico_versions)
            })),
        FieldDefinition::new("calicoMode", "Calico Mode", FieldKind::SingleSelect)
            .visible_when(WizardState::is_calico)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.calico_mode))
            .options(OptionSet::OneOf(|_| strings(CALICO_MODES))),
        FieldDefinition::new("proxyMode", "Proxy Mode", FieldKind::SingleSelect)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.proxy_mode))
            .options(OptionSet::OneOf(|_| strings(PROXY_MODES))),
        FieldDefinition::new("IPManger", "IP Manager", FieldKind::Checkbox)
            .visible_when(WizardState::is_calico)
            .default(|r| FieldValue::Flag(r.config.defaults.ip_manager)),
        FieldDefinition::new("IPVersion", "IP Version", FieldKind::Radio)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.ip_version))
            .options(OptionSet::OneOf(|_| strings(IP_VERSIONS))),
        FieldDefinition::new("podNetworkUnderlay", "Pod Network Underlay", FieldKind::SingleSelect)
            .visible_when(WizardState::is_calico)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.pod_network_underlay))
            .options(OptionSet::OneOf(underlay_modes)),
        FieldDefinition::new("IPv4AutoDetection", "IPv4 Auto Detection", FieldKind::Text)
            .visible_when(|s| s.is_calico() && s.underlay() != UnderlayMode::FirstFound)
            .required()
            .validate(validate_detection_v4),
        FieldDefinition::new("podIPv4CIDR", "Pod CIDR", FieldKind::Text)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.pod_ipv4_cidr))
            .validate(validate_cidr_v4),
        FieldDefinition::new("serviceSubnet", "Service Subnet", FieldKind::Text)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.service_subnet))
            .validate(validate_cidr_v4),
        FieldDefinition::new("podIPv6CIDR", "Pod CIDR (IPv6)", FieldKind::Text)
            .visible_when(WizardState::is_dual_stack)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.pod_ipv6_cidr))
            .validate(validate_cidr_v6),
        FieldDefinition::new("podNetworkUnderlayV6", "Pod Network Underlay (IPv6)", FieldKind::SingleSelect)
            .visible_when(|s| s.is_calico() && s.is_dual_stack())
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.pod_network_underlay))
            .options(OptionSet::OneOf(underlay_modes)),
        FieldDefinition::new("IPv6AutoDetection", "IPv6 Auto Detection", FieldKind::Text)
            .visible_when(|s| {
                s.is_calico() && s.is_dual_stack() && s.underlay_v6() != UnderlayMode::FirstFound
            })
            .required()
            .validate(validate_detection_v6),
        FieldDefinition::new("serviceSubnetV6", "Service Subnet (IPv6)", FieldKind::Text)
            .visible_when(WizardState::is_dual_stack)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.service_subnet_v6))
            .validate(validate_cidr_v6),
        FieldDefinition::new("mtu", "MTU", FieldKind::Number)
            .visible_when(WizardState::is_calico)
            .required()
            .default(|r| FieldValue::Number(r.config.defaults.mtu))
            .validate(|v, _| match v.as_number() {
                Some(n) if (576..=1460).contains(&n) => Ok(()),
                _ => Err("must be between 576 and 1460".to_string()),
            }),
        FieldDefinition::new("description", "Description", FieldKind::Text),
        FieldDefinition::new("externalIP", "External IP", FieldKind::IpAddress)
            .validate(validate_ipv4),
        FieldDefinition::new("backupPoint", "Backup Point", FieldKind::SingleSelect)
            .options(OptionSet::Suggest(|env| {
                env.resources
                    .inventory
                    .backup_points
                    .iter()
                    .map(|b| b.name.clone())
                    .collect()
            }))
            .validate(|v, env| {
                if env.resources.inventory.has_backup_point(text(v)) {
                    Ok(())
                } else {
                    Err(format!("backup point {} not found", text(v)))
                }
            }),
        FieldDefinition::new("labels", "Labels", FieldKind::KeyValueList).validate(|v, _| {
            if validate::labels_complete(v.as_pairs()) {
                Ok(())
            } else {
                Err("each label needs both a key and a value".to_string())
            }
        }),
    ]);
    fields
}

fn item_versions(items: &[crate::catalog::VersionItem]) -> Vec<String> {
    items.iter().map(|i| i.version.clone()).collect()
}

fn validate_image_type(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    let mode = ImageMode::from_offline(value.as_flag().unwrap_or(false));
    if env.resources.catalog.entries(mode).is_empty() {
        return Err(format!("no {} versions available", mode));
    }
    Ok(())
}

fn validate_kubernetes_version(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    let mode = env.state.image_mode();
    let version = text(value);
    let entry = env
        .resources
        .catalog
        .find(mode, version)
        .ok_or_else(|| format!("{} is not available for {} images", version, mode))?;

    match &env.state.context.arch {
        Some(arch) if !entry.supports_arch(arch) => Err(format!(
            "{} does not support {} nodes",
            version, arch
        )),
        _ => Ok(()),
    }
}

fn validate_runtime_type(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    let mode = env.state.image_mode();
    let Some(entry) = env
        .state
        .text("kubernetesVersion")
        .and_then(|v| env.resources.catalog.find(mode, v))
    else {
        return Err("select a Kubernetes version first".to_string());
    };

    let runtime = text(value);
    let allowed = env.resources.catalog.allowed_runtimes(&entry.semver);
    if allowed.iter().any(|r| r.as_str() == runtime) {
        Ok(())
    } else {
        Err(format!(
            "{} is not supported by Kubernetes {}",
            runtime, entry.version
        ))
    }
}

fn validate_docker_version(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    let version = text(value);
    if env.state.image_mode().is_offline() {
        let known = env
            .state
            .context
            .docker_versions
            .iter()
            .any(|item| item.version == version);
        if !known {
            return Err(format!("{} is not available for offline images", version));
        }
        return Ok(());
    }
    if validate::is_version_triplet(version) {
        Ok(())
    } else {
        Err("must be a version like 20.10.20".to_string())
    }
}

fn validate_cni_type(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    let mode = env.state.image_mode();
    let Some(entry) = env
        .state
        .text("kubernetesVersion")
        .and_then(|v| env.resources.catalog.find(mode, v))
    else {
        return Err("select a Kubernetes version first".to_string());
    };

    let cni = text(value);
    let items = VersionCatalog::cni_for(entry, cni);
    if items.is_empty() {
        return Err(format!(
            "{} is not available for Kubernetes {}",
            cni, entry.version
        ));
    }
    // calico has its own version field; others take the matrix default
    if cni != "calico" && VersionCatalog::default_for(&items).is_none() {
        return Err(format!(
            "{} has no default version for Kubernetes {}",
            cni, entry.version
        ));
    }
    Ok(())
}

fn validate_name(value: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    if validate::is_k8s_name(text(value)) {
        Ok(())
    } else {
        Err("must be lower case alphanumerics or '-', at most 63 characters".to_string())
    }
}

fn validate_abs_path(value: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    if validate::is_abs_path(text(value)) {
        Ok(())
    } else {
        Err("must be an absolute path".to_string())
    }
}

fn validate_ipv4(value: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    if validate::is_ipv4(text(value)) {
        Ok(())
    } else {
        Err("must be an IPv4 address".to_string())
    }
}

fn validate_cidr_v4(value: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    if validate::is_cidr_v4(text(value)) {
        Ok(())
    } else {
        Err("must be an IPv4 CIDR such as 10.96.0.0/16".to_string())
    }
}

fn validate_cidr_v6(value: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    if validate::is_cidr_v6(text(value)) {
        Ok(())
    } else {
        Err("must be an IPv6 CIDR such as fd04::/112".to_string())
    }
}

/// Scalar registry or every element of a registry list
fn validate_registry(value: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    let items = match value {
        FieldValue::List(_) => value.list_values(),
        _ => vec![text(value).to_string()],
    };
    match items.iter().find(|item| !validate::is_registry(item)) {
        Some(bad) => Err(format!(
            "{} is not a domain, domain/path, IPv4 or IPv4:port",
            bad
        )),
        None => Ok(()),
    }
}

fn validate_cert_sans(value: &FieldValue, _: &RuleEnv<'_>) -> Result<(), String> {
    let bad = value
        .list_values()
        .into_iter()
        .find(|san| !validate::is_ipv4(san) && !validate::is_domain(san));
    match bad {
        Some(san) => Err(format!("{} is not an IPv4 address or domain", san)),
        None => Ok(()),
    }
}

fn check_detection(value: &str, mode: UnderlayMode, ipv6: bool) -> Result<(), String> {
    match mode {
        UnderlayMode::FirstFound => Ok(()),
        UnderlayMode::CanReach => {
            let ip_ok = if ipv6 {
                validate::is_ipv6(value)
            } else {
                validate::is_ipv4(value)
            };
            if ip_ok || validate::is_domain(value) {
                Ok(())
            } else if ipv6 {
                Err("must be an IPv6 address or domain".to_string())
            } else {
                Err("must be an IPv4 address or domain".to_string())
            }
        }
        // interface patterns are passed to the CNI as entered
        UnderlayMode::Interface | UnderlayMode::SkipInterface => Ok(()),
    }
}

fn validate_detection_v4(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    check_detection(text(value), env.state.underlay(), false)
}

fn validate_detection_v6(value: &FieldValue, env: &RuleEnv<'_>) -> Result<(), String> {
    check_detection(text(value), env.state.underlay_v6(), true)
}

fn storage_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("defaultStorage", "Default Storage", FieldKind::SingleSelect)
            .options(OptionSet::OneOf(|env| {
                env.state
                    .addons
                    .storage_class_names()
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            })),
    ]
}

fn confirm_fields(flow: FlowKind) -> Vec<FieldDefinition> {
    if flow != FlowKind::CreateTemplate {
        return Vec::new();
    }
    vec![
        FieldDefinition::new("templateName", "Template Name", FieldKind::Text)
            .required()
            .validate(validate_name),
        FieldDefinition::new("templateDescription", "Template Description", FieldKind::Text),
    ]
}

fn provider_fields() -> Vec<FieldDefinition> {
    vec![
        FieldDefinition::new("name", "Name", FieldKind::Text)
            .required()
            .validate(validate_name),
        FieldDefinition::new("description", "Description", FieldKind::Text).validate(|v, _| {
            if text(v).chars().count() <= 256 {
                Ok(())
            } else {
                Err("must be at most 256 characters".to_string())
            }
        }),
        FieldDefinition::new("type", "Provider Type", FieldKind::Radio)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.provider_type))
            .options(OptionSet::OneOf(|_| strings(PROVIDER_TYPES))),
        FieldDefinition::new("region", "Region", FieldKind::SingleSelect)
            .required()
            .options(OptionSet::Suggest(|env| env.resources.inventory.regions())),
        FieldDefinition::new("project", "Project", FieldKind::SingleSelect)
            .required()
            .default(|r| match &r.project {
                Some(project) => FieldValue::text(project),
                None => FieldValue::Empty,
            }),
        FieldDefinition::new("sshType", "SSH", FieldKind::Radio)
            .required()
            .default(|r| FieldValue::text(&r.config.defaults.ssh_type))
            .options(OptionSet::OneOf(|_| strings(SSH_TYPES))),
        FieldDefinition::new("user", "User", FieldKind::Text).required(),
        FieldDefinition::new("password", "Password", FieldKind::Text)
            .visible_when(|s| s.text("sshType") == Some("password"))
            .required(),
        FieldDefinition::new("privateKey", "PrivateKey", FieldKind::Text)
            .visible_when(|s| s.text("sshType") != Some("password"))
            .required(),
        FieldDefinition::new("clusterName", "Cluster Name", FieldKind::Text)
            .required()
            .validate(validate_name),
        FieldDefinition::new("kubeConfig", "KubeConfig", FieldKind::Text)
            .required()
            .validate(|v, _| {
                serde_yaml::from_str::<serde_yaml::Value>(text(v))
                    .map(|_| ())
                    .map_err(|e| format!("must be valid YAML: {}", e))
            }),
        FieldDefinition::new("apiEndpoint", "API Endpoint", FieldKind::Text).validate(|v, _| {
            let endpoint = text(v);
            if validate::is_ipv4(endpoint)
                || validate::is_ip_port(endpoint)
                || validate::is_domain(endpoint)
                || validate::is_domain_path(endpoint)
            {
                Ok(())
            } else {
                Err("must be a host or host:port".to_string())
            }
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::make_resources;

    fn keys(step: &StepDefinition) -> Vec<&'static str> {
        step.fields.iter().map(|f| f.key).collect()
    }

    #[test]
    fn test_cluster_flow_steps() {
        let resources = make_resources();
        let steps = steps_for(FlowKind::CreateCluster, &resources);
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                StepKind::Node,
                StepKind::Cluster,
                StepKind::Storage,
                StepKind::Plugin,
                StepKind::Confirm
            ]
        );
        assert!(keys(&steps[1]).contains(&"name"));
        assert!(steps[4].fields.is_empty());
    }

    #[test]
    fn test_plugin_step_needs_a_plugin() {
        let mut resources = make_resources();
        resources
            .components
            .retain(|c| c.category != ComponentCategory::Plugin);
        let steps = steps_for(FlowKind::CreateTemplate, &resources);
        let kinds: Vec<StepKind> = steps.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![StepKind::Cluster, StepKind::Storage, StepKind::Confirm]
        );
        assert!(!keys(&steps[0]).contains(&"name"));
        assert_eq!(keys(&steps[2]), vec!["templateName", "templateDescription"]);
    }

    #[test]
    fn test_provider_flow_is_single_step() {
        let steps = steps_for(FlowKind::AddProvider, &make_resources());
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].kind, StepKind::Provider);
        assert!(keys(&steps[0]).contains(&"kubeConfig"));
    }

    #[test]
    fn test_flow_parse() {
        assert_eq!(FlowKind::parse("template"), Some(FlowKind::CreateTemplate));
        assert_eq!(FlowKind::parse("nope"), None);
        assert_eq!(FlowKind::AddProvider.to_string(), "provider");
    }

    #[test]
    fn test_detection_rules() {
        assert!(check_detection("10.0.0.1", UnderlayMode::CanReach, false).is_ok());
        assert!(check_detection("www.example.com", UnderlayMode::CanReach, false).is_ok());
        assert!(check_detection("fd00::1", UnderlayMode::CanReach, false).is_err());
        assert!(check_detection("fd00::1", UnderlayMode::CanReach, true).is_ok());
        assert!(check_detection("eth.*", UnderlayMode::Interface, false).is_ok());
        assert!(check_detection("eth(", UnderlayMode::SkipInterface, false).is_ok());
        assert!(check_detection("bond0|eth[", UnderlayMode::Interface, true).is_ok());
        assert!(check_detection("", UnderlayMode::FirstFound, false).is_ok());
    }

    #[test]
    fn test_name_fields_share_one_rule() {
        let resources = make_resources();
        let state = WizardState::new(1);
        let env = RuleEnv::new(&state, &resources);
        assert!(validate_name(&FieldValue::text("prod-1"), &env).is_ok());
        assert_eq!(
            validate_name(&FieldValue::text("Prod_1"), &env).unwrap_err(),
            "must be lower case alphanumerics or '-', at most 63 characters"
        );

        for flow in [FlowKind::CreateCluster, FlowKind::CreateTemplate, FlowKind::AddProvider] {
            for step in steps_for(flow, &resources) {
                for field in &step.fields {
                    if ["name", "templateName", "clusterName"].contains(&field.key) {
                        assert!((field.validate)(&FieldValue::text("a_b"), &env).is_err());
                    }
                }
            }
        }
    }
}
