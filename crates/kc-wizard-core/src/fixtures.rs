//! Shared test data: a small version matrix, component catalog and inventory

use crate::catalog::{VersionCatalog, VersionEntry};
use crate::config::WizardConfig;
use crate::rules::Resources;
use kc_client::{
    BackupPoint, Component, ComponentCategory, ComponentSchema, Inventory, KubernetesRelease,
    NodeInfo, PropertySchema, Registry, VersionControl, VersionControlItem,
};

fn item(name: &str, version: &str, default: bool) -> VersionControlItem {
    VersionControlItem {
        name: name.to_string(),
        version: version.to_string(),
        default,
    }
}

fn entry(version: &str, archs: &[&str], cri: Vec<VersionControlItem>, cni: Vec<VersionControlItem>) -> VersionEntry {
    let release = KubernetesRelease {
        version: version.to_string(),
        archs: archs.iter().map(|a| a.to_string()).collect(),
        version_control: VersionControl { cri, cni },
    };
    VersionEntry::from_release(&release).unwrap()
}

fn v1_23_6() -> VersionEntry {
    entry(
        "v1.23.6",
        &["amd64", "arm64"],
        vec![
            item("containerd", "1.6.4", true),
            item("containerd", "1.5.9", false),
            item("docker", "20.10.20", true),
        ],
        vec![item("calico", "v3.22.4", true), item("calico", "v3.21.2", false)],
    )
}

pub fn make_catalog() -> VersionCatalog {
    let online = vec![
        v1_23_6(),
        entry(
            "v1.27.4",
            &["amd64"],
            vec![item("containerd", "1.6.4", true)],
            vec![item("calico", "v3.26.1", true), item("cilium", "1.14.2", true)],
        ),
        entry(
            "v1.18.6",
            &["amd64"],
            vec![
                item("containerd", "1.4.4", true),
                item("docker", "19.03.12", true),
            ],
            vec![item("calico", "v3.16.10", true)],
        ),
    ];
    VersionCatalog::new(online, vec![v1_23_6()], Default::default()).unwrap()
}

fn prop(mask: bool) -> PropertySchema {
    PropertySchema {
        mask,
        kind: Some("string".to_string()),
        title: None,
    }
}

fn schema(props: &[(&str, bool)], required: &[&str]) -> ComponentSchema {
    ComponentSchema {
        properties: props
            .iter()
            .map(|(name, mask)| (name.to_string(), prop(*mask)))
            .collect(),
        required: required.iter().map(|r| r.to_string()).collect(),
    }
}

pub fn make_components() -> Vec<Component> {
    vec![
        Component {
            name: "nfs-provisioner".to_string(),
            version: "v1".to_string(),
            category: ComponentCategory::Storage,
            schema: schema(
                &[
                    ("scName", false),
                    ("serverAddr", false),
                    ("sharedPath", false),
                    ("mountOptions", false),
                    ("imageRepoMirror", false),
                ],
                &["scName", "serverAddr"],
            ),
        },
        Component {
            name: "cephfs-provisioner".to_string(),
            version: "v1".to_string(),
            category: ComponentCategory::Storage,
            schema: schema(
                &[
                    ("scName", false),
                    ("monitors", false),
                    ("adminKey", true),
                    ("imageRepoMirror", false),
                ],
                &["scName"],
            ),
        },
        Component {
            name: "kubesphere".to_string(),
            version: "v3.3.1".to_string(),
            category: ComponentCategory::Plugin,
            schema: schema(&[("consolePort", false), ("adminPassword", true)], &[]),
        },
    ]
}

fn node(id: &str, arch: &str, region: &str) -> NodeInfo {
    NodeInfo {
        id: id.to_string(),
        ip: format!("10.0.0.{}", id.len()),
        arch: arch.to_string(),
        region: region.to_string(),
    }
}

pub fn make_inventory() -> Inventory {
    Inventory {
        nodes: vec![
            node("node-1", "amd64", "default"),
            node("node-2", "amd64", "default"),
            node("node-arm", "arm64", "default"),
            node("node-edge", "amd64", "edge"),
        ],
        registries: vec![Registry {
            host: "10.0.0.100:5000".to_string(),
        }],
        backup_points: vec![BackupPoint {
            name: "bp-s3".to_string(),
        }],
    }
}

pub fn make_resources() -> Resources {
    Resources {
        catalog: make_catalog(),
        components: make_components(),
        inventory: make_inventory(),
        config: WizardConfig::default(),
        project: Some("default".to_string()),
    }
}
