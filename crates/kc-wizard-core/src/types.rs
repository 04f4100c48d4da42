//! Domain types for the cluster wizard
//!
//! Field values as entered by the user, the field kinds they are entered
//! through, and the small closed vocabularies (runtime kind, IP family,
//! underlay detection mode) the rules branch on.

use serde::{Deserialize, Serialize};

/// One entry of a key/value list (labels)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }
}

/// Value held by a wizard field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    #[default]
    Empty,
    Flag(bool),
    Number(i64),
    Text(String),
    List(Vec<String>),
    Pairs(Vec<KeyValue>),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }

    /// True when the user effectively entered nothing
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Empty => true,
            FieldValue::Flag(_) | FieldValue::Number(_) => false,
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
            FieldValue::Pairs(pairs) => pairs.iter().all(KeyValue::is_blank),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// List items, or an empty slice for non-list values
    pub fn as_list(&self) -> &[String] {
        match self {
            FieldValue::List(items) => items,
            _ => &[],
        }
    }

    pub fn as_pairs(&self) -> &[KeyValue] {
        match self {
            FieldValue::Pairs(pairs) => pairs,
            _ => &[],
        }
    }

    /// Non-blank list items, in order
    pub fn list_values(&self) -> Vec<String> {
        self.as_list()
            .iter()
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Flag(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value)
    }
}

/// How a field is entered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    SingleSelect,
    MultiSelect,
    /// Free-form list of strings (registries, SANs)
    TextList,
    KeyValueList,
    IpAddress,
    Radio,
    Checkbox,
}

impl FieldKind {
    /// Whether `value` has the shape this kind produces
    pub fn accepts(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (_, FieldValue::Empty) => true,
            (FieldKind::Text | FieldKind::SingleSelect | FieldKind::IpAddress, FieldValue::Text(_)) => {
                true
            }
            (FieldKind::Number, FieldValue::Number(_)) => true,
            (FieldKind::MultiSelect | FieldKind::TextList, FieldValue::List(_)) => true,
            (FieldKind::KeyValueList, FieldValue::Pairs(_)) => true,
            (FieldKind::Radio, FieldValue::Text(_) | FieldValue::Flag(_)) => true,
            (FieldKind::Checkbox, FieldValue::Flag(_)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldKind::Text => write!(f, "text"),
            FieldKind::Number => write!(f, "number"),
            FieldKind::SingleSelect => write!(f, "single select"),
            FieldKind::MultiSelect => write!(f, "multi select"),
            FieldKind::TextList => write!(f, "list"),
            FieldKind::KeyValueList => write!(f, "key/value list"),
            FieldKind::IpAddress => write!(f, "ip address"),
            FieldKind::Radio => write!(f, "radio"),
            FieldKind::Checkbox => write!(f, "checkbox"),
        }
    }
}

/// Container runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    Containerd,
    Docker,
}

impl RuntimeKind {
    pub const ALL: [RuntimeKind; 2] = [RuntimeKind::Containerd, RuntimeKind::Docker];

    pub fn as_str(&self) -> &'static str {
        match self {
            RuntimeKind::Containerd => "containerd",
            RuntimeKind::Docker => "docker",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "containerd" => Some(RuntimeKind::Containerd),
            "docker" => Some(RuntimeKind::Docker),
            _ => None,
        }
    }

    /// Field holding this runtime's insecure registries
    pub fn registry_field(&self) -> &'static str {
        match self {
            RuntimeKind::Containerd => "containerdInsecureRegistry",
            RuntimeKind::Docker => "dockerInsecureRegistry",
        }
    }
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cluster IP family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    Ipv4,
    DualStack,
}

impl IpFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            IpFamily::Ipv4 => "IPv4",
            IpFamily::DualStack => "IPv4+IPv6",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "IPv4" => Some(IpFamily::Ipv4),
            "IPv4+IPv6" => Some(IpFamily::DualStack),
            _ => None,
        }
    }
}

/// How Calico picks the node interface for pod traffic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnderlayMode {
    FirstFound,
    /// Interface that can reach a given IP or domain
    CanReach,
    /// Interfaces matching a name regex
    Interface,
    /// Interfaces not matching a name regex
    SkipInterface,
}

impl UnderlayMode {
    pub const ALL: [UnderlayMode; 4] = [
        UnderlayMode::FirstFound,
        UnderlayMode::CanReach,
        UnderlayMode::Interface,
        UnderlayMode::SkipInterface,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnderlayMode::FirstFound => "first-found",
            UnderlayMode::CanReach => "can-reach",
            UnderlayMode::Interface => "interface",
            UnderlayMode::SkipInterface => "skip-interface",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        UnderlayMode::ALL.into_iter().find(|m| m.as_str() == value)
    }
}

/// Kind of wizard step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Node,
    Cluster,
    Storage,
    Plugin,
    Confirm,
    Provider,
}

impl StepKind {
    /// Step title for display
    pub fn title(&self) -> &'static str {
        match self {
            StepKind::Node => "Node Config",
            StepKind::Cluster => "Cluster Config",
            StepKind::Storage => "Storage Config",
            StepKind::Plugin => "Plugin Manage",
            StepKind::Confirm => "Confirm Config",
            StepKind::Provider => "Provider",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_value_blankness() {
        assert!(FieldValue::Empty.is_blank());
        assert!(FieldValue::text("  ").is_blank());
        assert!(FieldValue::list(["", " "]).is_blank());
        assert!(FieldValue::Pairs(vec![KeyValue::default()]).is_blank());
        assert!(!FieldValue::Flag(false).is_blank());
        assert!(!FieldValue::Number(0).is_blank());
        assert!(!FieldValue::list(["", "a"]).is_blank());
    }

    #[test]
    fn test_field_value_from_yaml() {
        let values: Vec<FieldValue> =
            serde_yaml::from_str("[~, true, 1440, cluster.local, [a, b], [{key: k, value: v}]]")
                .unwrap();
        assert_eq!(
            values,
            vec![
                FieldValue::Empty,
                FieldValue::Flag(true),
                FieldValue::Number(1440),
                FieldValue::text("cluster.local"),
                FieldValue::list(["a", "b"]),
                FieldValue::Pairs(vec![KeyValue::new("k", "v")]),
            ]
        );
    }

    #[test]
    fn test_kind_accepts_shape() {
        assert!(FieldKind::Checkbox.accepts(&FieldValue::Flag(true)));
        assert!(!FieldKind::Checkbox.accepts(&FieldValue::text("yes")));
        assert!(FieldKind::Radio.accepts(&FieldValue::Flag(false)));
        assert!(FieldKind::Radio.accepts(&FieldValue::text("IPv4")));
        assert!(FieldKind::TextList.accepts(&FieldValue::list(["a"])));
        assert!(!FieldKind::Number.accepts(&FieldValue::text("1440")));
        assert!(FieldKind::Number.accepts(&FieldValue::Empty));
    }

    #[test]
    fn test_runtime_registry_field() {
        assert_eq!(
            RuntimeKind::Docker.registry_field(),
            "dockerInsecureRegistry"
        );
        assert_eq!(RuntimeKind::parse("containerd"), Some(RuntimeKind::Containerd));
        assert_eq!(RuntimeKind::parse("cri-o"), None);
    }

    #[test]
    fn test_underlay_mode_parse() {
        assert_eq!(UnderlayMode::parse("can-reach"), Some(UnderlayMode::CanReach));
        assert_eq!(UnderlayMode::parse("nope"), None);
        assert_eq!(IpFamily::parse("IPv4+IPv6"), Some(IpFamily::DualStack));
    }
}
