//! kc-wizard-core: the cluster provisioning wizard engine
//!
//! - `catalog`: Kubernetes versions with their runtime and CNI options
//! - `fields` / `rules`: per-field visibility, validation, options and the
//!   recomputation of derived values
//! - `controller`: step navigation, validation gating and submission
//! - `assembler` / `template`: wizard state to documents and back
//!
//! Presentation is left to the caller.

pub mod assembler;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod fields;
pub mod rules;
pub mod state;
pub mod template;
pub mod types;
pub mod validate;

#[cfg(test)]
mod fixtures;

pub use assembler::{
    ClusterConfig, DeploymentSpec, ProviderSpec, TemplateConfig, TemplateSpec, assemble,
    assemble_provider, assemble_template,
};
pub use catalog::{CatalogLoader, VersionCatalog, VersionEntry, VersionItem};
pub use config::{FieldDefaults, RuntimeThresholds, WizardConfig};
pub use controller::{FieldUpdate, Output, Phase, Wizard};
pub use error::{AssemblyError, ValidationError, WizardError};
pub use fields::{FieldDefinition, FlowKind, OptionSet, StepDefinition};
pub use rules::{FieldRules, FieldStatus, Resources, RuleEnv};
pub use state::{AddonConfig, Addons, StorageTab, WizardContext, WizardState};
pub use types::{FieldKind, FieldValue, IpFamily, KeyValue, RuntimeKind, StepKind, UnderlayMode};

pub use kc_client::ImageMode;
