//! Wizard configuration
//!
//! Initial field values, the Kubernetes versions at which runtime support
//! changes, and the catalog fetch timeout. Every key is optional in the YAML
//! file; missing keys keep the built-in default.

use crate::error::WizardError;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Values a fresh wizard starts from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldDefaults {
    pub offline: bool,
    pub etcd_data_dir: String,
    pub kubelet_data_dir: String,
    pub docker_root_dir: String,
    pub containerd_root_dir: String,
    pub dns_domain: String,
    pub worker_node_vip: String,
    pub cni_type: String,
    pub calico_mode: String,
    pub proxy_mode: String,
    pub ip_version: String,
    pub ip_manager: bool,
    pub pod_network_underlay: String,
    pub pod_ipv4_cidr: String,
    pub service_subnet: String,
    pub pod_ipv6_cidr: String,
    pub service_subnet_v6: String,
    pub mtu: i64,
    pub provider_type: String,
    pub ssh_type: String,
}

impl Default for FieldDefaults {
    fn default() -> Self {
        Self {
            offline: false,
            etcd_data_dir: "/var/lib/etcd".to_string(),
            kubelet_data_dir: "/var/lib/kubelet".to_string(),
            docker_root_dir: "/var/lib/docker".to_string(),
            containerd_root_dir: "/var/lib/containerd".to_string(),
            dns_domain: "cluster.local".to_string(),
            worker_node_vip: "169.254.169.100".to_string(),
            cni_type: "calico".to_string(),
            calico_mode: "Overlay-Vxlan-All".to_string(),
            proxy_mode: "ipvs".to_string(),
            ip_version: "IPv4".to_string(),
            ip_manager: true,
            pod_network_underlay: "first-found".to_string(),
            pod_ipv4_cidr: "172.25.0.0/16".to_string(),
            service_subnet: "10.96.0.0/16".to_string(),
            pod_ipv6_cidr: "fd05::/120".to_string(),
            service_subnet_v6: "fd04::/112".to_string(),
            mtu: 1440,
            provider_type: "kubeadm".to_string(),
            ssh_type: "privateKey".to_string(),
        }
    }
}

/// Kubernetes versions at which runtime support changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeThresholds {
    /// From this version on containerd is the default runtime
    pub containerd_default_from: Version,
    /// From this version on docker is not supported at all
    pub docker_removed_from: Version,
}

impl Default for RuntimeThresholds {
    fn default() -> Self {
        Self {
            containerd_default_from: Version::new(1, 20, 0),
            docker_removed_from: Version::new(1, 24, 0),
        }
    }
}

/// Top-level wizard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WizardConfig {
    pub defaults: FieldDefaults,
    pub thresholds: RuntimeThresholds,
    pub fetch_timeout_secs: u64,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            defaults: FieldDefaults::default(),
            thresholds: RuntimeThresholds::default(),
            fetch_timeout_secs: 30,
        }
    }
}

impl WizardConfig {
    pub fn from_yaml(yaml_str: &str) -> Result<Self, WizardError> {
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml_str)?)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}
