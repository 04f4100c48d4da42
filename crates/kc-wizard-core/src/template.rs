//! Saved templates
//!
//! Turns a stored template body back into field values and addon slots so a
//! new wizard can start from it.

use crate::assembler::{
    ANNOTATION_DESCRIPTION, ANNOTATION_OFFLINE, LABEL_BACKUP_POINT, LABEL_EXTERNAL_IP,
    TemplateConfig, split_detection,
};
use crate::state::{AddonConfig, Addons, StorageTab};
use crate::types::{FieldValue, KeyValue, RuntimeKind, UnderlayMode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use kc_client::{Component, ComponentCategory, find_component};
use serde_json::Value;

/// Values a template fills in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateValues {
    pub fields: Vec<(&'static str, FieldValue)>,
    pub addons: Addons,
    pub default_storage: Option<String>,
}

fn text(value: &str) -> FieldValue {
    if value.is_empty() {
        FieldValue::Empty
    } else {
        FieldValue::text(value)
    }
}

/// Field values of the cluster step held by `config`
pub fn template_values(config: &TemplateConfig, components: &[Component]) -> TemplateValues {
    let cluster = &config.cluster;
    let meta = &config.metadata;
    let mut fields: Vec<(&'static str, FieldValue)> = Vec::new();

    fields.push((
        "offline",
        FieldValue::Flag(meta.annotations.contains_key(ANNOTATION_OFFLINE)),
    ));
    if let Some(description) = meta.annotations.get(ANNOTATION_DESCRIPTION) {
        fields.push(("description", text(description)));
    }
    if let Some(backup_point) = meta.labels.get(LABEL_BACKUP_POINT) {
        fields.push(("backupPoint", text(backup_point)));
    }
    if let Some(external_ip) = meta.labels.get(LABEL_EXTERNAL_IP) {
        fields.push(("externalIP", text(external_ip)));
    }
    let labels: Vec<KeyValue> = meta
        .labels
        .iter()
        .filter(|(key, _)| *key != LABEL_BACKUP_POINT && *key != LABEL_EXTERNAL_IP)
        .map(|(key, value)| KeyValue::new(key.as_str(), value.as_str()))
        .collect();
    if !labels.is_empty() {
        fields.push(("labels", FieldValue::Pairs(labels)));
    }

    fields.push(("localRegistry", text(&cluster.local_registry)));
    fields.push(("certSANs", FieldValue::List(cluster.cert_sans.clone())));
    fields.push(("kubernetesVersion", text(&cluster.kubernetes_version)));
    fields.push(("etcdDataDir", text(&cluster.etcd.data_dir)));
    fields.push(("kubeletDataDir", text(&cluster.kubelet.root_dir)));

    let runtime = &cluster.container_runtime;
    fields.push(("containerRuntimeType", text(&runtime.kind)));
    let (version_key, root_key) = match RuntimeKind::parse(&runtime.kind) {
        Some(RuntimeKind::Docker) => ("dockerVersion", "dockerRootDir"),
        _ => ("containerdVersion", "containerdRootDir"),
    };
    fields.push((version_key, text(&runtime.version)));
    fields.push((root_key, text(&runtime.root_dir)));
    if let Some(kind) = RuntimeKind::parse(&runtime.kind) {
        fields.push((
            kind.registry_field(),
            FieldValue::List(runtime.insecure_registry.clone()),
        ));
    }

    let net = &cluster.networking;
    fields.push(("IPVersion", text(&net.ip_family)));
    for (blocks, v4, v6) in [
        (&net.pods.cidr_blocks, "podIPv4CIDR", "podIPv6CIDR"),
        (&net.services.cidr_blocks, "serviceSubnet", "serviceSubnetV6"),
    ] {
        if let Some(cidr) = blocks.first() {
            fields.push((v4, text(cidr)));
        }
        if let Some(cidr) = blocks.get(1) {
            fields.push((v6, text(cidr)));
        }
    }
    fields.push(("dnsDomain", text(&net.dns_domain)));
    fields.push(("workerNodeVip", text(&net.worker_node_vip)));
    fields.push(("proxyMode", text(&net.proxy_mode)));

    fields.push(("cniType", text(&cluster.cni.kind)));
    if let Some(calico) = &cluster.cni.calico {
        fields.push(("calicoVersion", text(&cluster.cni.version)));
        fields.push(("calicoMode", text(&calico.mode)));
        fields.push(("IPManger", FieldValue::Flag(calico.ip_manager)));
        fields.push(("mtu", FieldValue::Number(calico.mtu)));
        for (detection, underlay_key, value_key) in [
            (&calico.ipv4_auto_detection, "podNetworkUnderlay", "IPv4AutoDetection"),
            (&calico.ipv6_auto_detection, "podNetworkUnderlayV6", "IPv6AutoDetection"),
        ] {
            if detection.is_empty() {
                continue;
            }
            let (mode, value) = split_detection(detection);
            fields.push((underlay_key, FieldValue::text(mode.as_str())));
            if mode != UnderlayMode::FirstFound {
                fields.push((value_key, value));
            }
        }
    }

    let (addons, default_storage) = template_addons(config, components);
    TemplateValues {
        fields,
        addons,
        default_storage,
    }
}

fn decode(value: &str) -> Option<String> {
    STANDARD
        .decode(value)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}

/// Addon slots of the template; unknown components are kept as plugins
fn template_addons(config: &TemplateConfig, components: &[Component]) -> (Addons, Option<String>) {
    let mut addons = Addons::default();
    let mut default_storage = None;

    for addon in &config.cluster.addons {
        let mut entry: AddonConfig = addon.config.clone();
        let component = find_component(components, &addon.name);

        if let Some(component) = component {
            for prop in component.schema.masked() {
                let decoded = entry
                    .get(prop)
                    .and_then(Value::as_str)
                    .and_then(decode);
                if let Some(decoded) = decoded {
                    entry.insert(prop.to_string(), Value::String(decoded));
                }
            }
        }

        match component.map(|c| c.category) {
            Some(ComponentCategory::Storage) => {
                if entry.remove("isDefaultSC") == Some(Value::Bool(true)) {
                    default_storage = entry
                        .get("scName")
                        .and_then(Value::as_str)
                        .map(str::to_string);
                }
                match addons.storage.iter_mut().find(|tab| tab.name == addon.name) {
                    Some(tab) => tab.entries.push(Some(entry)),
                    None => addons.storage.push(StorageTab {
                        name: addon.name.clone(),
                        entries: vec![Some(entry)],
                    }),
                }
            }
            _ => {
                addons.plugins.insert(addon.name.clone(), Some(entry));
            }
        }
    }
    (addons, default_storage)
}
