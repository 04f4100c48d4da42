//! Step controller
//!
//! Drives one wizard run: edits go to the step being edited, `advance`
//! gates on that step's validation, and `submit` assembles the document and
//! hands it to the store once.

use crate::assembler::{
    DeploymentSpec, ProviderSpec, TemplateConfig, TemplateSpec, assemble, assemble_provider,
    assemble_template,
};
use crate::error::{AssemblyError, ValidationError, WizardError};
use crate::fields::FlowKind;
use crate::rules::{FieldRules, FieldStatus, Resources, RuleEnv};
use crate::state::{AddonConfig, StorageTab, WizardState};
use crate::template::template_values;
use crate::types::{FieldValue, StepKind};
use kc_client::{ClientError, ClusterStore, Document};
use serde::Serialize;

/// Where the wizard is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// User edits step i
    Editing(usize),
    /// Step i is being checked before moving on
    Validating(usize),
    /// Document handed to the store
    Submitting,
    /// Store accepted the document
    Completed(String),
    /// Store refused the document; values are kept for another attempt
    Failed(String),
    Cancelled,
}

impl Phase {
    pub fn is_closed(&self) -> bool {
        matches!(self, Phase::Completed(_) | Phase::Cancelled)
    }
}

/// Outcome of a single edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldUpdate {
    /// Derived keys recomputed because of the edit
    pub recomputed: Vec<String>,
    /// Status of every field of the current step afterwards
    pub fields: Vec<FieldStatus>,
}

/// Assembled document of any flow
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Output {
    Cluster(DeploymentSpec),
    Template(TemplateSpec),
    Provider(ProviderSpec),
}

impl Output {
    /// Message shown once the store accepted the document
    pub fn success_message(&self) -> String {
        match self {
            Output::Cluster(spec) => format!("Cluster {} is installing.", spec.name()),
            Output::Template(spec) => format!("Template {} is saved.", spec.name()),
            Output::Provider(spec) => format!("Provider {} is added.", spec.name()),
        }
    }

    async fn send<S: ClusterStore>(&self, store: &S) -> Result<(), ClientError> {
        match self {
            Output::Cluster(spec) => store.create(spec).await,
            Output::Template(spec) => store.create(spec).await,
            Output::Provider(spec) => store.create(spec).await,
        }
    }
}

pub struct Wizard {
    rules: FieldRules,
    resources: Resources,
    state: WizardState,
    phase: Phase,
}

impl Wizard {
    pub fn new(flow: FlowKind, resources: Resources) -> Self {
        let rules = FieldRules::new(flow, &resources);
        let state = rules.initial_state(&resources);
        tracing::info!(
            "Starting {} wizard with {} steps",
            flow,
            rules.steps().len()
        );
        Self {
            rules,
            resources,
            state,
            phase: Phase::Editing(0),
        }
    }

    /// Start from a saved template instead of the catalog defaults
    pub fn with_template(
        flow: FlowKind,
        resources: Resources,
        template: &TemplateConfig,
    ) -> Result<Self, WizardError> {
        if flow == FlowKind::AddProvider {
            return Err(WizardError::Template(
                "provider flow does not take a template".to_string(),
            ));
        }

        let mut wizard = Self::new(flow, resources);
        let values = template_values(template, &wizard.resources.components);
        for (key, value) in values.fields {
            if let Some(step) = wizard.rules.step_of(key) {
                wizard.state.set(step, key, value);
            }
        }

        for tab in values.addons.storage {
            match wizard
                .state
                .addons
                .storage
                .iter_mut()
                .find(|t| t.name == tab.name)
            {
                Some(existing) => existing.entries = tab.entries,
                None => wizard.state.addons.storage.push(StorageTab {
                    name: tab.name,
                    entries: tab.entries,
                }),
            }
        }
        wizard.state.addons.plugins.extend(values.addons.plugins);
        let storage_step = wizard.rules.step_of("defaultStorage");
        if let (Some(name), Some(step)) = (values.default_storage, storage_step) {
            wizard.state.set(step, "defaultStorage", FieldValue::text(name));
        }

        wizard
            .rules
            .refresh_options(&mut wizard.state, &wizard.resources)
            .map_err(WizardError::Template)?;
        Ok(wizard)
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn rules(&self) -> &FieldRules {
        &self.rules
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn current_step(&self) -> usize {
        self.state.current_step()
    }

    pub fn step_count(&self) -> usize {
        self.rules.steps().len()
    }

    pub fn step_kind(&self) -> Option<StepKind> {
        self.rules.steps().get(self.current_step()).map(|s| s.kind)
    }

    fn last_step(&self) -> usize {
        self.step_count().saturating_sub(1)
    }

    fn env(&self) -> RuleEnv<'_> {
        RuleEnv::new(&self.state, &self.resources)
    }

    /// Field statuses of the current step
    pub fn field_statuses(&self) -> Vec<FieldStatus> {
        self.rules.field_statuses(self.current_step(), &self.env())
    }

    fn transition(&mut self, phase: Phase) {
        tracing::info!("Wizard: {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    /// Step being edited, or `Closed`
    fn ensure_open(&self) -> Result<usize, WizardError> {
        if self.phase.is_closed() {
            return Err(WizardError::Closed);
        }
        Ok(self.current_step())
    }

    /// Leave `Failed` once the user edits again
    fn resume_editing(&mut self) {
        if matches!(self.phase, Phase::Failed(_)) {
            self.transition(Phase::Editing(self.current_step()));
        }
    }

    /// Set a field of the step being edited and recompute what depends on it
    pub fn set_field(
        &mut self,
        step: usize,
        key: &str,
        value: FieldValue,
    ) -> Result<FieldUpdate, WizardError> {
        let current = self.ensure_open()?;
        if step != current {
            return Err(WizardError::StepNotActive { step, current });
        }
        match self.rules.step_of(key) {
            Some(owner) if owner == step => {}
            Some(owner) => {
                return Err(WizardError::StepNotActive {
                    step: owner,
                    current,
                });
            }
            None => return Err(WizardError::UnknownField(key.to_string())),
        }

        let dependents = self.rules.on_change(key, value, &mut self.state)?;
        let recomputed = self
            .rules
            .cascade(&dependents, &mut self.state, &self.resources);
        self.resume_editing();

        Ok(FieldUpdate {
            recomputed: recomputed.into_iter().map(str::to_string).collect(),
            fields: self.field_statuses(),
        })
    }

    /// Enable (`Some`) or disable (`None`) one storage entry; an index past
    /// the end appends
    pub fn set_storage_entry(
        &mut self,
        tab: &str,
        index: usize,
        config: Option<AddonConfig>,
    ) -> Result<(), WizardError> {
        self.ensure_open()?;
        let storage = &mut self.state.addons.storage;
        let pos = match storage.iter().position(|t| t.name == tab) {
            Some(pos) => pos,
            None => {
                storage.push(StorageTab {
                    name: tab.to_string(),
                    entries: Vec::new(),
                });
                storage.len() - 1
            }
        };
        let entries = &mut storage[pos].entries;
        match entries.get_mut(index) {
            Some(entry) => *entry = config,
            None => entries.push(config),
        }
        self.resume_editing();
        Ok(())
    }

    /// Enable (`Some`) or disable (`None`) a plugin
    pub fn set_plugin(&mut self, name: &str, config: Option<AddonConfig>) -> Result<(), WizardError> {
        self.ensure_open()?;
        self.state.addons.plugins.insert(name.to_string(), config);
        self.resume_editing();
        Ok(())
    }

    /// Validate the current step and move to the next one
    pub fn advance(&mut self) -> Result<usize, WizardError> {
        let current = self.ensure_open()?;
        if current >= self.last_step() {
            return Err(WizardError::AtLastStep);
        }

        self.transition(Phase::Validating(current));
        if self.rules.step_of("kubernetesVersion").is_some() {
            self.rules
                .cascade(&["arch", "componentRegistry"], &mut self.state, &self.resources);
        }

        let errors = self.rules.validate_step(current, &self.env());
        if !errors.is_empty() {
            tracing::warn!("Step {} has {} invalid field(s)", current, errors.len());
            self.transition(Phase::Editing(current));
            return Err(WizardError::Invalid(errors));
        }

        let next = current + 1;
        self.state.set_current_step(next);
        self.transition(Phase::Editing(next));
        Ok(next)
    }

    /// Go back one step without validating
    pub fn back(&mut self) -> Result<usize, WizardError> {
        let current = self.ensure_open()?;
        let previous = current.saturating_sub(1);
        self.state.set_current_step(previous);
        self.transition(Phase::Editing(previous));
        Ok(previous)
    }

    /// Discard everything entered
    pub fn cancel(&mut self) -> Result<(), WizardError> {
        self.ensure_open()?;
        self.state = WizardState::new(self.step_count());
        self.transition(Phase::Cancelled);
        Ok(())
    }

    /// Errors of every step, in step order
    pub fn validate_all(&self) -> Vec<ValidationError> {
        let env = self.env();
        (0..self.step_count())
            .flat_map(|step| self.rules.validate_step(step, &env))
            .collect()
    }

    /// The document `submit` would send
    pub fn preview(&self) -> Result<Output, AssemblyError> {
        match self.rules.flow() {
            FlowKind::CreateCluster => assemble(&self.state, &self.resources).map(Output::Cluster),
            FlowKind::CreateTemplate => {
                assemble_template(&self.state, &self.resources).map(Output::Template)
            }
            FlowKind::AddProvider => assemble_provider(&self.state).map(Output::Provider),
        }
    }

    /// Validate everything, assemble, and hand the document to `store`
    pub async fn submit<S: ClusterStore>(&mut self, store: &S) -> Result<String, WizardError> {
        let current = self.ensure_open()?;
        let last = self.last_step();
        if current != last {
            return Err(WizardError::NotReady(current));
        }

        self.transition(Phase::Validating(last));
        let errors = self.validate_all();
        if !errors.is_empty() {
            self.transition(Phase::Editing(last));
            return Err(WizardError::Invalid(errors));
        }

        let output = match self.preview() {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("Assembly failed: {}", e);
                self.transition(Phase::Editing(last));
                return Err(e.into());
            }
        };

        self.transition(Phase::Submitting);
        match output.send(store).await {
            Ok(()) => {
                let message = output.success_message();
                tracing::info!("{}", message);
                self.transition(Phase::Completed(message.clone()));
                Ok(message)
            }
            Err(e) => {
                tracing::warn!("Submission failed: {}", e);
                self.transition(Phase::Failed(e.to_string()));
                Err(WizardError::Submission(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VersionCatalog;
    use crate::fixtures::make_resources;
    use crate::types::RuntimeKind;
    use kc_client::{ImageMode, MemoryStore};
    use serde_json::json;

    fn text(value: &str) -> FieldValue {
        FieldValue::text(value)
    }

    /// Cluster wizard filled in up to the confirm step
    fn make_cluster_wizard() -> Wizard {
        let mut wizard = Wizard::new(FlowKind::CreateCluster, make_resources());
        wizard.set_field(0, "region", text("default")).unwrap();
        wizard
            .set_field(0, "masters", FieldValue::list(["node-1"]))
            .unwrap();
        assert_eq!(wizard.advance().unwrap(), 1);
        wizard.set_field(1, "name", text("prod")).unwrap();
        assert_eq!(wizard.advance().unwrap(), 2);
        assert_eq!(wizard.advance().unwrap(), 3);
        assert_eq!(wizard.advance().unwrap(), 4);
        wizard
    }

    #[test]
    fn test_set_field_is_idempotent() {
        let mut wizard = Wizard::new(FlowKind::CreateTemplate, make_resources());
        for (key, value) in [
            ("kubernetesVersion", text("v1.18.6")),
            ("offline", FieldValue::Flag(true)),
            ("localRegistry", text("10.0.0.100:5000")),
            ("IPVersion", text("IPv4+IPv6")),
        ] {
            wizard.set_field(0, key, value.clone()).unwrap();
            let once = wizard.state().clone();
            let update = wizard.set_field(0, key, value).unwrap();
            assert_eq!(wizard.state(), &once, "{}", key);
            assert!(update.recomputed.is_empty());
        }
    }

    #[test]
    fn test_default_versions_round_trip() {
        let mut wizard = Wizard::new(FlowKind::CreateTemplate, make_resources());
        let catalog = wizard.resources().catalog.clone();

        for entry in catalog.entries(ImageMode::Online) {
            wizard
                .set_field(0, "kubernetesVersion", text(&entry.version))
                .unwrap();
            let state = wizard.state();
            let expected = |items: Vec<crate::catalog::VersionItem>| {
                VersionCatalog::default_for(&items)
                    .map(|item| text(&item.version))
                    .unwrap_or_default()
            };
            assert_eq!(
                state.value("containerdVersion"),
                &expected(VersionCatalog::runtimes_for(entry, RuntimeKind::Containerd)),
                "{}",
                entry.version
            );
            assert_eq!(
                state.value("dockerVersion"),
                &expected(VersionCatalog::runtimes_for(entry, RuntimeKind::Docker)),
                "{}",
                entry.version
            );
            assert_eq!(
                state.value("calicoVersion"),
                &expected(VersionCatalog::cni_for(entry, "calico")),
                "{}",
                entry.version
            );
        }
    }

    #[test]
    fn test_calico_toggle_unblocks_advance() {
        let mut wizard = Wizard::new(FlowKind::CreateTemplate, make_resources());
        wizard
            .set_field(0, "kubernetesVersion", text("v1.27.4"))
            .unwrap();
        wizard
            .set_field(0, "podNetworkUnderlay", text("can-reach"))
            .unwrap();

        let err = wizard.advance().unwrap_err();
        let fields: Vec<&str> = err
            .validation_errors()
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, vec!["IPv4AutoDetection"]);
        assert_eq!(wizard.phase(), &Phase::Editing(0));

        wizard.set_field(0, "cniType", text("cilium")).unwrap();
        assert_eq!(wizard.advance().unwrap(), 1);
    }

    #[test]
    fn test_cni_missing_from_matrix_blocks_advance() {
        let mut wizard = Wizard::new(FlowKind::CreateCluster, make_resources());
        wizard.set_field(0, "region", text("default")).unwrap();
        wizard
            .set_field(0, "masters", FieldValue::list(["node-1"]))
            .unwrap();
        assert_eq!(wizard.advance().unwrap(), 1);
        wizard.set_field(1, "name", text("prod")).unwrap();
        assert_eq!(wizard.state().text("kubernetesVersion"), Some("v1.23.6"));

        wizard.set_field(1, "cniType", text("cilium")).unwrap();
        let err = wizard.advance().unwrap_err();
        let fields: Vec<&str> = err
            .validation_errors()
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        assert_eq!(fields, vec!["cniType"]);
        assert_eq!(wizard.phase(), &Phase::Editing(1));
        assert!(wizard.validate_all().iter().any(|e| e.field == "cniType"));

        wizard.set_field(1, "cniType", text("calico")).unwrap();
        assert_eq!(wizard.advance().unwrap(), 2);
    }

    #[test]
    fn test_advance_reports_every_error() {
        let mut wizard = Wizard::new(FlowKind::CreateTemplate, make_resources());
        wizard.set_field(0, "podIPv4CIDR", text("10.0.0/16")).unwrap();
        wizard.set_field(0, "mtu", FieldValue::Number(9000)).unwrap();
        wizard.set_field(0, "etcdDataDir", text("")).unwrap();

        let err = wizard.advance().unwrap_err();
        let mut fields: Vec<&str> = err
            .validation_errors()
            .iter()
            .map(|e| e.field.as_str())
            .collect();
        fields.sort_unstable();
        assert_eq!(fields, vec!["etcdDataDir", "mtu", "podIPv4CIDR"]);
    }

    #[test]
    fn test_edits_only_on_current_step() {
        let mut wizard = Wizard::new(FlowKind::CreateCluster, make_resources());
        assert!(matches!(
            wizard.set_field(1, "name", text("prod")),
            Err(WizardError::StepNotActive { step: 1, current: 0 })
        ));
        assert!(matches!(
            wizard.set_field(0, "name", text("prod")),
            Err(WizardError::StepNotActive { step: 1, current: 0 })
        ));
        assert!(matches!(
            wizard.set_field(0, "bogus", text("x")),
            Err(WizardError::UnknownField(_))
        ));
    }

    #[test]
    fn test_back_preserves_values() {
        let mut wizard = make_cluster_wizard();
        assert_eq!(wizard.back().unwrap(), 3);
        assert_eq!(wizard.back().unwrap(), 2);
        assert_eq!(wizard.back().unwrap(), 1);
        assert_eq!(wizard.state().text("name"), Some("prod"));
        wizard.set_field(1, "name", text("staging")).unwrap();
        assert_eq!(wizard.back().unwrap(), 0);
        assert_eq!(wizard.back().unwrap(), 0);
        assert_eq!(wizard.state().value("masters"), &FieldValue::list(["node-1"]));
    }

    #[test]
    fn test_at_last_step() {
        let mut wizard = make_cluster_wizard();
        assert!(matches!(wizard.advance(), Err(WizardError::AtLastStep)));
    }

    #[tokio::test]
    async fn test_submit_cluster() {
        let mut wizard = make_cluster_wizard();
        let store = MemoryStore::new();

        let message = wizard.submit(&store).await.unwrap();
        assert_eq!(message, "Cluster prod is installing.");
        assert_eq!(
            wizard.phase(),
            &Phase::Completed("Cluster prod is installing.".to_string())
        );

        let documents = store.documents().await;
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0]["kind"], json!("Cluster"));
        assert_eq!(documents[0]["masters"][0]["id"], json!("node-1"));

        assert!(matches!(
            wizard.set_field(4, "x", FieldValue::Empty),
            Err(WizardError::Closed)
        ));
        assert!(matches!(wizard.submit(&store).await, Err(WizardError::Closed)));
    }

    #[tokio::test]
    async fn test_submit_before_last_step() {
        let mut wizard = Wizard::new(FlowKind::CreateCluster, make_resources());
        let store = MemoryStore::new();
        assert!(matches!(
            wizard.submit(&store).await,
            Err(WizardError::NotReady(0))
        ));
    }

    #[tokio::test]
    async fn test_unknown_addon_sends_nothing() {
        let mut wizard = make_cluster_wizard();
        wizard.set_plugin("ghost", Some(AddonConfig::new())).unwrap();
        let store = MemoryStore::new();

        let err = wizard.submit(&store).await.unwrap_err();
        assert!(matches!(
            err,
            WizardError::Assembly(AssemblyError::UnknownComponent(ref name)) if name == "ghost"
        ));
        assert_eq!(wizard.phase(), &Phase::Editing(4));
        assert!(store.documents().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_submission_keeps_values() {
        let mut wizard = make_cluster_wizard();
        let before = wizard.state().clone();

        let err = wizard
            .submit(&MemoryStore::rejecting("quota exceeded"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Submission failed: Rejected: quota exceeded");
        assert_eq!(
            wizard.phase(),
            &Phase::Failed("Rejected: quota exceeded".to_string())
        );
        assert_eq!(wizard.state(), &before);

        let store = MemoryStore::new();
        assert!(wizard.submit(&store).await.is_ok());
        assert_eq!(store.documents().await.len(), 1);
    }

    #[test]
    fn test_cancel_closes() {
        let mut wizard = make_cluster_wizard();
        wizard.cancel().unwrap();
        assert_eq!(wizard.phase(), &Phase::Cancelled);
        assert_eq!(wizard.state().value("name"), &FieldValue::Empty);
        assert!(matches!(wizard.advance(), Err(WizardError::Closed)));
        assert!(matches!(wizard.back(), Err(WizardError::Closed)));
        assert!(matches!(wizard.cancel(), Err(WizardError::Closed)));
        assert!(matches!(
            wizard.set_plugin("kubesphere", None),
            Err(WizardError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_template_round_trip() {
        let resources = make_resources();
        let mut wizard = Wizard::new(FlowKind::CreateTemplate, resources.clone());
        wizard.set_field(0, "kubernetesVersion", text("v1.18.6")).unwrap();
        wizard.set_field(0, "localRegistry", text("10.0.0.100:5000")).unwrap();
        wizard.set_field(0, "IPVersion", text("IPv4+IPv6")).unwrap();
        wizard.advance().unwrap();
        let mut ceph = AddonConfig::new();
        ceph.insert("scName".to_string(), json!("ceph-sc"));
        ceph.insert("adminKey".to_string(), json!("secret"));
        wizard
            .set_storage_entry("cephfs-provisioner", 0, Some(ceph))
            .unwrap();
        wizard.set_field(1, "defaultStorage", text("ceph-sc")).unwrap();
        wizard.advance().unwrap();
        wizard.advance().unwrap();
        wizard.set_field(3, "templateName", text("base")).unwrap();

        let store = MemoryStore::new();
        assert_eq!(wizard.submit(&store).await.unwrap(), "Template base is saved.");
        let Ok(Output::Template(saved)) = wizard.preview() else {
            panic!("template expected");
        };

        let seeded =
            Wizard::with_template(FlowKind::CreateCluster, resources, &saved.config).unwrap();
        let state = seeded.state();
        assert_eq!(state.text("kubernetesVersion"), Some("v1.18.6"));
        assert_eq!(state.text("containerRuntimeType"), Some("docker"));
        assert_eq!(state.text("dockerVersion"), Some("19.03.12"));
        assert_eq!(
            state.value("dockerInsecureRegistry"),
            &FieldValue::list(["10.0.0.100:5000"])
        );
        assert_eq!(state.text("podIPv6CIDR"), Some("fd05::/120"));
        assert_eq!(state.text("defaultStorage"), Some("ceph-sc"));
        assert_eq!(
            state.context.runtime_options,
            vec![RuntimeKind::Containerd, RuntimeKind::Docker]
        );
        let ceph = state
            .addons
            .storage
            .iter()
            .find(|t| t.name == "cephfs-provisioner")
            .unwrap();
        assert_eq!(ceph.entries[0].as_ref().unwrap()["adminKey"], json!("secret"));
    }

    #[test]
    fn test_template_with_unknown_version() {
        let template = TemplateConfig {
            cluster: crate::assembler::ClusterConfig {
                kubernetes_version: "v1.99.0".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = Wizard::with_template(FlowKind::CreateCluster, make_resources(), &template)
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "Invalid template: Kubernetes version v1.99.0 is not available for online images"
        );
    }

    #[tokio::test]
    async fn test_provider_flow() {
        let mut wizard = Wizard::new(FlowKind::AddProvider, make_resources());
        assert_eq!(wizard.step_count(), 1);
        for (key, value) in [
            ("name", "edge"),
            ("region", "edge"),
            ("sshType", "password"),
            ("user", "root"),
            ("password", "hunter2"),
            ("clusterName", "edge-cluster"),
            ("kubeConfig", "apiVersion: v1\nkind: Config\n"),
        ] {
            wizard.set_field(0, key, text(value)).unwrap();
        }
        assert!(!wizard.rules().visible("privateKey", wizard.state()));

        let store = MemoryStore::new();
        assert_eq!(wizard.submit(&store).await.unwrap(), "Provider edge is added.");
        let documents = store.documents().await;
        assert_eq!(documents[0]["ssh"]["password"], json!("aHVudGVyMg=="));
        assert!(documents[0]["ssh"].get("privateKey").is_none());
    }
}
