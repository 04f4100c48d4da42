//! Answers files: the values a user would enter, step by step
//!
//! ```yaml
//! flow: cluster
//! template: ./template-base.yaml   # or an inline template document
//! steps:
//!   - fields: {region: default, masters: [node-1]}
//!   - fields: {name: prod, kubernetesVersion: v1.23.6}
//!   - storage:
//!       nfs-provisioner:
//!         - {scName: nfs-sc, serverAddr: 10.0.0.5}
//!     fields: {defaultStorage: nfs-sc}
//! ```
//!
//! Fields are set in file order so derived values cascade the way they
//! would from a form.

use kc_client::ClusterStore;
use kc_wizard_core::{AddonConfig, FieldValue, TemplateSpec, Wizard, WizardError};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Answers {
    pub flow: Option<String>,
    pub template: Option<TemplateSource>,
    pub steps: Vec<StepAnswers>,
}

/// Template to start from
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplateSource {
    Path(PathBuf),
    Inline(Box<TemplateSpec>),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StepAnswers {
    pub fields: serde_yaml::Mapping,
    /// Storage tab name to its entries; `null` leaves a slot disabled
    pub storage: BTreeMap<String, Vec<Option<AddonConfig>>>,
    /// Plugin name to its config; `null` disables it
    pub plugins: BTreeMap<String, Option<AddonConfig>>,
}

impl Answers {
    pub fn from_yaml(yaml_str: &str) -> Result<Self, serde_yaml::Error> {
        if yaml_str.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml_str)
    }
}

impl TemplateSource {
    /// The template document; relative paths resolve against `base`
    pub fn load(&self, base: &Path) -> color_eyre::Result<TemplateSpec> {
        match self {
            TemplateSource::Inline(spec) => Ok(spec.as_ref().clone()),
            TemplateSource::Path(path) => {
                let path = if path.is_relative() {
                    base.join(path)
                } else {
                    path.clone()
                };
                let text = std::fs::read_to_string(&path).map_err(|e| {
                    color_eyre::eyre::eyre!("Cannot read template {}: {}", path.display(), e)
                })?;
                Ok(serde_yaml::from_str(&text)?)
            }
        }
    }
}

/// Enter one step's answers into the wizard
pub fn apply_step(wizard: &mut Wizard, step: usize, answers: &StepAnswers) -> Result<(), WizardError> {
    for (key, value) in &answers.fields {
        let Some(key) = key.as_str() else {
            return Err(WizardError::UnknownField(format!("{:?}", key)));
        };
        let value: FieldValue = serde_yaml::from_value(value.clone())?;
        let update = wizard.set_field(step, key, value)?;
        if !update.recomputed.is_empty() {
            tracing::debug!("{} -> {:?}", key, update.recomputed);
        }
    }
    for (tab, entries) in &answers.storage {
        for (index, entry) in entries.iter().enumerate() {
            wizard.set_storage_entry(tab, index, entry.clone())?;
        }
    }
    for (name, config) in &answers.plugins {
        wizard.set_plugin(name, config.clone())?;
    }
    Ok(())
}

/// Walk every step in order and submit at the end
pub async fn replay<S: ClusterStore>(
    wizard: &mut Wizard,
    answers: &Answers,
    store: &S,
) -> Result<String, WizardError> {
    let count = wizard.step_count();
    if answers.steps.len() > count {
        tracing::warn!(
            "Answers have {} steps, the wizard only {}; extra steps ignored",
            answers.steps.len(),
            count
        );
    }

    for step in 0..count {
        if let Some(step_answers) = answers.steps.get(step) {
            apply_step(wizard, step, step_answers)?;
        }
        if step + 1 < count {
            wizard.advance()?;
        }
    }
    wizard.submit(store).await
}
