//! Field rule engine
//!
//! Evaluates the field tables against a state: visibility, requiredness,
//! validation, and recomputation of derived fields after a change.

use crate::catalog::{VersionCatalog, VersionEntry, VersionItem};
use crate::config::WizardConfig;
use crate::error::{ValidationError, WizardError};
use crate::fields::{FieldDefinition, FlowKind, OptionSet, StepDefinition, steps_for};
use crate::state::{AddonConfig, StorageTab, WizardState};
use crate::types::{FieldValue, RuntimeKind, StepKind};
use crate::validate;
use kc_client::{Component, ComponentCategory, Inventory, find_component};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

/// Everything loaded at wizard entry; read-only afterwards
#[derive(Debug, Clone)]
pub struct Resources {
    pub catalog: VersionCatalog,
    pub components: Vec<Component>,
    pub inventory: Inventory,
    pub config: WizardConfig,
    /// Project new clusters are created in
    pub project: Option<String>,
}

/// What a rule may read
#[derive(Clone, Copy)]
pub struct RuleEnv<'a> {
    pub state: &'a WizardState,
    pub resources: &'a Resources,
}

impl<'a> RuleEnv<'a> {
    pub fn new(state: &'a WizardState, resources: &'a Resources) -> Self {
        Self { state, resources }
    }
}

/// Presentation-relevant status of one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldStatus {
    pub key: String,
    pub visible: bool,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Rule tables of one flow
#[derive(Debug, Clone)]
pub struct FieldRules {
    flow: FlowKind,
    steps: Vec<StepDefinition>,
    index: HashMap<&'static str, (usize, usize)>,
}

impl FieldRules {
    pub fn new(flow: FlowKind, resources: &Resources) -> Self {
        let steps = steps_for(flow, resources);
        let mut index = HashMap::new();
        for (step, def) in steps.iter().enumerate() {
            for (pos, field) in def.fields.iter().enumerate() {
                index.insert(field.key, (step, pos));
            }
        }
        Self { flow, steps, index }
    }

    pub fn flow(&self) -> FlowKind {
        self.flow
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    pub fn definition(&self, key: &str) -> Option<&FieldDefinition> {
        self.index
            .get(key)
            .map(|&(step, pos)| &self.steps[step].fields[pos])
    }

    pub fn step_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).map(|&(step, _)| step)
    }

    pub fn visible(&self, key: &str, state: &WizardState) -> bool {
        self.definition(key)
            .is_some_and(|def| (def.visible_when)(state))
    }

    /// Required and visible; hidden fields are never required
    pub fn required(&self, key: &str, state: &WizardState) -> bool {
        self.definition(key)
            .is_some_and(|def| (def.visible_when)(state) && (def.required_when)(state))
    }

    /// Current choices of `key`, if it offers any
    pub fn options(&self, key: &str, env: &RuleEnv<'_>) -> Option<Vec<String>> {
        match self.definition(key)?.options {
            OptionSet::Any => None,
            OptionSet::OneOf(options) | OptionSet::Suggest(options) => Some(options(env)),
        }
    }

    /// Validate the committed value of `key`
    pub fn validate(&self, key: &str, env: &RuleEnv<'_>) -> Result<(), ValidationError> {
        let def = self
            .definition(key)
            .ok_or_else(|| ValidationError::new(key, "unknown field"))?;
        let value = env.state.value(key);

        if !def.kind.accepts(value) {
            return Err(ValidationError::new(
                key,
                format!("expected a {} value", def.kind),
            ));
        }
        if value.is_blank() {
            if self.required(key, env.state) {
                return Err(ValidationError::new(key, "is required"));
            }
            return Ok(());
        }

        (def.validate)(value, env).map_err(|message| ValidationError::new(key, message))?;

        if let OptionSet::OneOf(options) = def.options {
            let options = options(env);
            let chosen = match value {
                FieldValue::List(_) => value.list_values(),
                FieldValue::Text(s) => vec![s.clone()],
                _ => Vec::new(),
            };
            if let Some(bad) = chosen.iter().find(|c| !options.contains(c)) {
                return Err(ValidationError::new(
                    key,
                    format!("{} is not one of the available options", bad),
                ));
            }
        }
        Ok(())
    }

    /// Every error of the visible fields and addon slots of `step`
    pub fn validate_step(&self, step: usize, env: &RuleEnv<'_>) -> Vec<ValidationError> {
        let Some(def) = self.steps.get(step) else {
            return Vec::new();
        };

        let mut errors: Vec<ValidationError> = def
            .fields
            .iter()
            .filter(|field| (field.visible_when)(env.state))
            .filter_map(|field| self.validate(field.key, env).err())
            .collect();

        match def.kind {
            StepKind::Storage => errors.extend(validate_storage(env)),
            StepKind::Plugin => errors.extend(validate_plugins(env)),
            _ => {}
        }
        errors
    }

    pub fn field_statuses(&self, step: usize, env: &RuleEnv<'_>) -> Vec<FieldStatus> {
        let Some(def) = self.steps.get(step) else {
            return Vec::new();
        };
        def.fields
            .iter()
            .map(|field| FieldStatus {
                key: field.key.to_string(),
                visible: self.visible(field.key, env.state),
                required: self.required(field.key, env.state),
                options: self.options(field.key, env),
            })
            .collect()
    }

    /// A fresh state: defaults, empty addon slots, derived values resolved
    pub fn initial_state(&self, resources: &Resources) -> WizardState {
        let mut state = WizardState::new(self.steps.len());
        for (step, def) in self.steps.iter().enumerate() {
            for field in &def.fields {
                let value = (field.default)(resources);
                if !value.is_blank() {
                    state.set(step, field.key, value);
                }
            }
        }

        if self.flow != FlowKind::AddProvider {
            for component in &resources.components {
                match component.category {
                    ComponentCategory::Storage => state.addons.storage.push(StorageTab {
                        name: component.name.clone(),
                        entries: Vec::new(),
                    }),
                    ComponentCategory::Plugin => {
                        state.addons.plugins.insert(component.name.clone(), None);
                    }
                }
            }
        }

        if self.step_of("kubernetesVersion").is_some() {
            self.cascade(&["kubernetesVersion", "componentRegistry"], &mut state, resources);
        }
        state
    }

    /// Store `value` under `key`; returns the keys to recompute
    pub fn on_change(
        &self,
        key: &str,
        value: FieldValue,
        state: &mut WizardState,
    ) -> Result<Vec<&'static str>, WizardError> {
        let (step, def) = self
            .step_of(key)
            .zip(self.definition(key))
            .ok_or_else(|| WizardError::UnknownField(key.to_string()))?;

        if !def.kind.accepts(&value) {
            return Err(WizardError::Invalid(vec![ValidationError::new(
                key,
                format!("expected a {} value", def.kind),
            )]));
        }
        if !state.set(step, key, value) {
            return Ok(Vec::new());
        }
        Ok(def.dependents.to_vec())
    }

    /// Recompute `roots` and everything they invalidate, each key once
    pub fn cascade(
        &self,
        roots: &[&'static str],
        state: &mut WizardState,
        resources: &Resources,
    ) -> Vec<&'static str> {
        let mut queue: VecDeque<&'static str> = roots.iter().copied().collect();
        let mut done = Vec::new();
        while let Some(key) = queue.pop_front() {
            if done.contains(&key) {
                continue;
            }
            done.push(key);
            for next in self.recompute(key, state, resources) {
                if !done.contains(&next) && !queue.contains(&next) {
                    queue.push_back(next);
                }
            }
        }
        if !done.is_empty() {
            tracing::debug!("Recomputed {:?}", done);
        }
        done
    }

    /// Recompute one derived key; returns keys invalidated in turn
    pub fn recompute(
        &self,
        key: &str,
        state: &mut WizardState,
        resources: &Resources,
    ) -> Vec<&'static str> {
        match key {
            "kubernetesVersion" => {
                let versions: Vec<String> = resources
                    .catalog
                    .entries(state.image_mode())
                    .iter()
                    .map(|e| e.version.clone())
                    .collect();
                let first = versions
                    .first()
                    .map(|v| FieldValue::text(v.as_str()))
                    .unwrap_or_default();
                state.context.kubernetes_versions = versions;
                self.assign("kubernetesVersion", first, state);
                self.dependents_of("kubernetesVersion")
            }
            "containerRuntimeType" => {
                let (options, value) = match selected_entry(state, resources) {
                    Some(entry) => {
                        let runtime = resources.catalog.default_runtime(&entry.semver);
                        (
                            resources.catalog.allowed_runtimes(&entry.semver),
                            FieldValue::text(runtime.as_str()),
                        )
                    }
                    None => (Vec::new(), FieldValue::Empty),
                };
                state.context.runtime_options = options;
                self.assign("containerRuntimeType", value, state);
                self.dependents_of("containerRuntimeType")
            }
            "containerdVersion" => {
                let items = selected_entry(state, resources)
                    .map(|e| VersionCatalog::runtimes_for(e, RuntimeKind::Containerd))
                    .unwrap_or_default();
                self.assign(key, default_value(&items), state);
                state.context.containerd_versions = items;
                Vec::new()
            }
            "dockerVersion" => {
                let items = selected_entry(state, resources)
                    .map(|e| VersionCatalog::runtimes_for(e, RuntimeKind::Docker))
                    .unwrap_or_default();
                self.assign(key, default_value(&items), state);
                state.context.docker_versions = items;
                Vec::new()
            }
            "cniType" => {
                let names = selected_entry(state, resources)
                    .map(VersionCatalog::cni_names)
                    .unwrap_or_default();
                let preferred = [
                    state.text("cniType"),
                    Some(resources.config.defaults.cni_type.as_str()),
                ];
                let value = preferred
                    .into_iter()
                    .flatten()
                    .find(|name| names.iter().any(|n| n == *name))
                    .or_else(|| names.first().map(String::as_str))
                    .map(|name| FieldValue::text(name))
                    .unwrap_or_default();
                self.assign(key, value, state);
                state.context.cni_types = names;
                Vec::new()
            }
            "calicoVersion" => {
                let items = selected_entry(state, resources)
                    .map(|e| VersionCatalog::cni_for(e, "calico"))
                    .unwrap_or_default();
                self.assign(key, default_value(&items), state);
                state.context.calico_versions = items;
                Vec::new()
            }
            "insecureRegistry" => {
                self.retarget_registry(state);
                Vec::new()
            }
            "componentRegistry" => {
                state.context.component_registry = local_registry(state);
                Vec::new()
            }
            "arch" => {
                state.context.arch = common_arch(state, &resources.inventory);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Rebuild option lists for the committed values without touching them
    pub fn refresh_options(
        &self,
        state: &mut WizardState,
        resources: &Resources,
    ) -> Result<(), String> {
        let mode = state.image_mode();
        state.context.kubernetes_versions = resources
            .catalog
            .entries(mode)
            .iter()
            .map(|e| e.version.clone())
            .collect();

        let entry = selected_entry(state, resources).ok_or_else(|| {
            format!(
                "Kubernetes version {} is not available for {} images",
                state.text("kubernetesVersion").unwrap_or(""),
                mode
            )
        })?;
        state.context.runtime_options = resources.catalog.allowed_runtimes(&entry.semver);
        state.context.containerd_versions =
            VersionCatalog::runtimes_for(entry, RuntimeKind::Containerd);
        state.context.docker_versions = VersionCatalog::runtimes_for(entry, RuntimeKind::Docker);
        state.context.calico_versions = VersionCatalog::cni_for(entry, "calico");
        state.context.cni_types = VersionCatalog::cni_names(entry);
        state.context.locked_registry = local_registry(state);
        state.context.component_registry = local_registry(state);
        state.context.arch = common_arch(state, &resources.inventory);
        Ok(())
    }

    fn dependents_of(&self, key: &str) -> Vec<&'static str> {
        self.definition(key)
            .map(|def| def.dependents.to_vec())
            .unwrap_or_default()
    }

    /// Write a derived value; keys outside this flow are ignored
    fn assign(&self, key: &str, value: FieldValue, state: &mut WizardState) {
        if let Some(step) = self.step_of(key) {
            state.set(step, key, value);
        }
    }

    /// Lock the local registry into the selected runtime's insecure list
    fn retarget_registry(&self, state: &mut WizardState) {
        if let Some(old) = state.context.locked_registry.take() {
            for runtime in RuntimeKind::ALL {
                let field = runtime.registry_field();
                let items = state.value(field).as_list();
                if items.contains(&old) {
                    let kept: Vec<String> = items.iter().filter(|r| **r != old).cloned().collect();
                    self.assign(field, FieldValue::List(kept), state);
                }
            }
        }

        if let (Some(local), Some(runtime)) = (local_registry(state), state.runtime()) {
            self.assign(
                runtime.registry_field(),
                FieldValue::list([local.clone()]),
                state,
            );
            state.context.locked_registry = Some(local);
        }
    }
}

fn selected_entry<'r>(state: &WizardState, resources: &'r Resources) -> Option<&'r VersionEntry> {
    let version = state.text("kubernetesVersion")?;
    resources.catalog.find(state.image_mode(), version)
}

fn default_value(items: &[VersionItem]) -> FieldValue {
    VersionCatalog::default_for(items)
        .map(|item| FieldValue::text(&item.version))
        .unwrap_or_default()
}

/// `localRegistry` when it is a valid registry
fn local_registry(state: &WizardState) -> Option<String> {
    state
        .text("localRegistry")
        .filter(|r| validate::is_registry(r))
        .map(str::to_string)
}

/// Architecture shared by every selected node
fn common_arch(state: &WizardState, inventory: &Inventory) -> Option<String> {
    let mut archs: Vec<&str> = state
        .selected_nodes()
        .iter()
        .filter_map(|id| inventory.node(id))
        .map(|n| n.arch.as_str())
        .collect();
    archs.sort_unstable();
    archs.dedup();
    match archs.as_slice() {
        [arch] => Some(arch.to_string()),
        _ => None,
    }
}

fn is_missing(config: &AddonConfig, prop: &str) -> bool {
    match config.get(prop) {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::String(s)) => s.trim().is_empty(),
        Some(serde_json::Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

fn check_required(
    component: &Component,
    config: &AddonConfig,
    field: &str,
) -> Vec<ValidationError> {
    component
        .schema
        .required
        .iter()
        .filter(|prop| is_missing(config, prop))
        .map(|prop| ValidationError::new(format!("{}.{}", field, prop), "is required"))
        .collect()
}

fn validate_storage(env: &RuleEnv<'_>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut classes: Vec<&str> = Vec::new();

    for tab in &env.state.addons.storage {
        let component = find_component(&env.resources.components, &tab.name);
        for (index, entry) in tab.entries.iter().enumerate() {
            let Some(config) = entry else {
                continue;
            };
            let field = format!("{}[{}]", tab.name, index);
            if let Some(component) = component {
                errors.extend(check_required(component, config, &field));
            }
            if let Some(class) = config.get("scName").and_then(|v| v.as_str()) {
                if classes.contains(&class) {
                    errors.push(ValidationError::new(
                        format!("{}.scName", field),
                        format!("storage class {} is defined twice", class),
                    ));
                }
                classes.push(class);
            }
        }
    }
    errors
}

fn validate_plugins(env: &RuleEnv<'_>) -> Vec<ValidationError> {
    env.state
        .addons
        .enabled_plugins()
        .filter_map(|(name, config)| {
            find_component(&env.resources.components, name)
                .map(|component| check_required(component, config, name))
        })
        .flatten()
        .collect()
}
