//! Syntactic validators
//!
//! Pure string predicates shared by the field rules. Each accepts only an
//! exact match: surrounding whitespace or trailing garbage is rejected.

use crate::types::KeyValue;
use regex::Regex;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

/// Dotted host name whose last label starts with a letter
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[-a-zA-Z0-9]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z](?:[-a-zA-Z0-9]{0,61}[a-zA-Z0-9])?$",
    )
    .expect("domain regex")
});

static FQDN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z0-9](?:[-a-z0-9]{0,61}[a-z0-9])?\.)+[a-z]{2,63}$|^[a-z0-9](?:[-a-z0-9]{0,61}[a-z0-9])?$")
        .expect("fqdn regex")
});

static PATH_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("path segment regex"));

static ABS_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(?:[A-Za-z0-9._-]+/?)*$").expect("path regex"));

static TRIPLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+){2}$").expect("version regex"));

static K8S_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9](?:[-a-z0-9]*[a-z0-9])?$").expect("name regex"));

pub fn is_ipv4(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
}

pub fn is_ipv6(value: &str) -> bool {
    value.parse::<Ipv6Addr>().is_ok()
}

pub fn is_domain(value: &str) -> bool {
    value.len() <= 253 && DOMAIN_RE.is_match(value)
}

/// Decimal TCP port, 1-65535, no sign or leading zeros
pub fn is_port(value: &str) -> bool {
    if value.is_empty() || value.starts_with('0') || !value.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    value.parse::<u16>().is_ok()
}

/// `IPv4:port`
pub fn is_ip_port(value: &str) -> bool {
    match value.rsplit_once(':') {
        Some((host, port)) => is_ipv4(host) && is_port(port),
        None => false,
    }
}

/// Domain with a port, a path, or both: `registry.io:5000/library`
pub fn is_domain_path(value: &str) -> bool {
    let (host, path) = match value.split_once('/') {
        Some((host, path)) => (host, Some(path)),
        None => (value, None),
    };

    let (domain, port) = match host.rsplit_once(':') {
        Some((domain, port)) => (domain, Some(port)),
        None => (host, None),
    };

    if port.is_none() && path.is_none() {
        return false;
    }
    if !is_domain(domain) || !port.is_none_or(is_port) {
        return false;
    }
    match path {
        Some(path) => path.split('/').all(|seg| PATH_SEGMENT_RE.is_match(seg)),
        None => true,
    }
}

/// Image registry address: domain, domain with port/path, IPv4, or IPv4:port
pub fn is_registry(value: &str) -> bool {
    is_domain(value) || is_domain_path(value) || is_ipv4(value) || is_ip_port(value)
}

fn prefix_within(prefix: &str, max: u8) -> bool {
    if prefix.is_empty() || prefix.len() > 3 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if prefix.len() > 1 && prefix.starts_with('0') {
        return false;
    }
    prefix.parse::<u8>().is_ok_and(|p| p <= max)
}

pub fn is_cidr_v4(value: &str) -> bool {
    match value.split_once('/') {
        Some((addr, prefix)) => is_ipv4(addr) && prefix_within(prefix, 32),
        None => false,
    }
}

pub fn is_cidr_v6(value: &str) -> bool {
    match value.split_once('/') {
        Some((addr, prefix)) => is_ipv6(addr) && prefix_within(prefix, 128),
        None => false,
    }
}

/// Lower-case DNS domain such as `cluster.local`
pub fn is_fqdn(value: &str) -> bool {
    value.len() <= 253 && FQDN_RE.is_match(value)
}

pub fn is_abs_path(value: &str) -> bool {
    ABS_PATH_RE.is_match(value)
}

/// `X.Y.Z`
pub fn is_version_triplet(value: &str) -> bool {
    TRIPLET_RE.is_match(value)
}

/// RFC 1123 label
pub fn is_k8s_name(value: &str) -> bool {
    value.len() <= 63 && K8S_NAME_RE.is_match(value)
}

/// Each entry has both key and value, or neither
pub fn labels_complete(pairs: &[KeyValue]) -> bool {
    pairs
        .iter()
        .all(|kv| kv.key.is_empty() == kv.value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_exact_match() {
        for ok in ["10.0.0.0/16", "0.0.0.0/0", "192.168.1.0/32", "172.25.0.0/24"] {
            assert!(is_cidr_v4(ok), "{}", ok);
        }
        for bad in [
            "10.0.0.0/16 ",
            " 10.0.0.0/16",
            "10.0.0/16",
            "10.0.0.0/33",
            "10.0.0.0/016",
            "10.0.0.0/",
            "10.0.0.0",
            "256.0.0.0/8",
            "10.0.0.0/16/1",
            "10.0.0.0/+8",
        ] {
            assert!(!is_cidr_v4(bad), "{:?}", bad);
            assert!(!is_cidr_v6(bad), "{:?}", bad);
        }
    }

    #[test]
    fn test_cidr_v6() {
        for ok in ["fd00::/48", "::/0", "fd05::/120", "2001:db8::/128"] {
            assert!(is_cidr_v6(ok), "{}", ok);
        }
        for bad in ["fd00::/129", "fd00::", "fd00:::/48", "fd00::/48\n", "10.0.0.0/8"] {
            assert!(!is_cidr_v6(bad), "{:?}", bad);
        }
    }

    #[test]
    fn test_registry() {
        for ok in [
            "myregistry.com:5000",
            "myregistry.com",
            "registry.io/library",
            "registry.io:5000/library/images",
            "10.0.0.1",
            "10.0.0.1:5000",
        ] {
            assert!(is_registry(ok), "{}", ok);
        }
        for bad in [
            "not a registry!",
            "",
            "registry.io:0",
            "registry.io:99999",
            "10.0.0.1:",
            "registry.io//x",
            "http://registry.io",
        ] {
            assert!(!is_registry(bad), "{:?}", bad);
        }
    }

    #[test]
    fn test_domain() {
        assert!(is_domain("baidu.com"));
        assert!(is_domain("www.google.com"));
        assert!(!is_domain("localhost"));
        assert!(!is_domain("999.1.1.1"));
        assert!(!is_domain("-bad.com"));
        assert!(!is_domain("bad_underscore.com"));
    }

    #[test]
    fn test_fqdn_and_paths() {
        assert!(is_fqdn("cluster.local"));
        assert!(is_fqdn("corp"));
        assert!(!is_fqdn("Cluster.Local"));
        assert!(!is_fqdn("cluster..local"));

        assert!(is_abs_path("/var/lib/etcd"));
        assert!(is_abs_path("/"));
        assert!(!is_abs_path("var/lib/etcd"));
        assert!(!is_abs_path("/var/lib etcd"));
    }

    #[test]
    fn test_versions_and_names() {
        assert!(is_version_triplet("20.10.20"));
        assert!(!is_version_triplet("v20.10.20"));
        assert!(!is_version_triplet("20.10"));

        assert!(is_k8s_name("prod-01"));
        assert!(!is_k8s_name("Prod"));
        assert!(!is_k8s_name("prod-"));
        assert!(!is_k8s_name(&"a".repeat(64)));
    }

    #[test]
    fn test_labels_complete() {
        assert!(labels_complete(&[KeyValue::new("env", "prod"), KeyValue::default()]));
        assert!(!labels_complete(&[KeyValue::new("env", "")]));
        assert!(!labels_complete(&[KeyValue::new("", "prod")]));
    }

    #[test]
    fn test_ip_port() {
        assert!(is_ip_port("192.168.0.1:443"));
        assert!(!is_ip_port("192.168.0.1"));
    }
}
