// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Per-reconcile Run Context for Configuration reconciliation.
//!
//! Every invocation derives a fresh [`RunContext`] from the current
//! Configuration snapshot; nothing in it survives across reconciles. The
//! context carries the derived artifact names, the rendered configuration,
//! the executor settings taken from the environment, and the drift flags
//! the rest of the engine keys off.

use k8s_openapi::api::core::v1::EnvVar;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::warn;

use crate::backend::K8sBackend;
use crate::configuration::{
    get_provider_namespaced_name, replace_terraform_source, ConfigurationType,
};
use crate::constants::{
    ENV_GITHUB_BLOCKED, ENV_JOB_NODE_SELECTOR, TF_INPUT_CONFIGMAP_PREFIX,
    TF_VARIABLE_SECRET_PREFIX,
};
use crate::crd::{Configuration, Reference};

/// The two commands an executor Job can run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionType {
    /// `terraform apply`
    Apply,
    /// `terraform destroy`
    Destroy,
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionType::Apply => write!(f, "apply"),
            ExecutionType::Destroy => write!(f, "destroy"),
        }
    }
}

/// Non-error result of a reconcile pass.
///
/// "Job still running" and "teardown incomplete" are ordinary outcomes, not
/// failures; errors are reserved for conditions that need the error policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing left to do until the object changes.
    Done,
    /// Check back after the given delay.
    RequeueAfter(Duration),
}

/// Artifact names under the per-tenant layout, remembered before the
/// centralized-mode rename so deletion can find pre-migration objects.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LegacySubResources {
    /// Namespace the legacy artifacts live in (the Configuration's own).
    pub namespace: String,
    pub apply_job_name: String,
    pub destroy_job_name: String,
    pub configuration_cm_name: String,
    pub variable_secret_name: String,
}

/// Everything one reconcile pass needs, derived up front.
#[derive(Clone, Default)]
pub struct RunContext {
    /// Configuration name.
    pub name: String,
    /// Configuration namespace.
    pub namespace: String,
    /// Namespace the derived artifacts live in. Equals `namespace` in
    /// per-tenant mode.
    pub controller_namespace: String,

    /// Validated source kind; populated by pre-check.
    pub configuration_type: Option<ConfigurationType>,
    /// Rendered Terraform text; populated by pre-check.
    pub complete_configuration: String,
    /// Remote repository URL, after the mirror rewrite.
    pub remote_git: String,
    /// Sub-directory inside the remote repository.
    pub remote_git_path: String,

    /// The stored ConfigMap no longer matches the rendered text.
    pub configuration_changed: bool,
    /// The stored variable Secret no longer matches the desired bytes.
    pub env_changed: bool,

    pub configuration_cm_name: String,
    pub apply_job_name: String,
    pub destroy_job_name: String,
    pub variable_secret_name: String,

    /// Environment variables of the executor containers, referencing keys
    /// of the variable Secret.
    pub envs: Vec<EnvVar>,
    /// Desired bytes of the variable Secret.
    pub variable_secret_data: BTreeMap<String, Vec<u8>>,

    /// Provider reference, absent for inline credentials.
    pub provider_reference: Option<Reference>,
    /// Decoded provider credentials.
    pub credentials: Option<BTreeMap<String, String>>,
    /// Resolved region.
    pub region: String,

    /// Run `terraform destroy` on deletion.
    pub delete_resource: bool,

    /// State backend handle; populated by pre-check.
    pub backend: Option<K8sBackend>,

    /// Node selector applied to the Job pod.
    pub job_node_selector: Option<BTreeMap<String, String>>,

    pub terraform_image: String,
    pub busybox_image: String,
    pub git_image: String,

    /// Executor resource settings. The raw strings are kept next to the
    /// parsed quantities because presence checks gate the Job spec fields.
    pub resources_limits_cpu: String,
    pub resources_limits_cpu_quantity: Option<Quantity>,
    pub resources_limits_memory: String,
    pub resources_limits_memory_quantity: Option<Quantity>,
    pub resources_requests_cpu: String,
    pub resources_requests_cpu_quantity: Option<Quantity>,
    pub resources_requests_memory: String,
    pub resources_requests_memory_quantity: Option<Quantity>,

    /// Per-tenant names snapshotted before the centralized-mode rename.
    pub legacy_sub_resources: Option<LegacySubResources>,
}

impl RunContext {
    /// Derive the per-tenant Run Context from a Configuration.
    #[must_use]
    pub fn new(configuration: &Configuration) -> Self {
        let name = configuration.name_any();
        let namespace = configuration.namespace().unwrap_or_default();

        let mut meta = RunContext {
            configuration_cm_name: format!("{TF_INPUT_CONFIGMAP_PREFIX}-{name}"),
            variable_secret_name: format!("{TF_VARIABLE_SECRET_PREFIX}-{name}"),
            apply_job_name: format!("{name}-{}", ExecutionType::Apply),
            destroy_job_name: format!("{name}-{}", ExecutionType::Destroy),
            controller_namespace: namespace.clone(),
            namespace,
            name,
            delete_resource: configuration.spec.delete_resource.unwrap_or(true),
            ..Default::default()
        };

        if let Ok(selector_json) = std::env::var(ENV_JOB_NODE_SELECTOR) {
            if !selector_json.is_empty() {
                match serde_json::from_str(&selector_json) {
                    Ok(selector) => meta.job_node_selector = Some(selector),
                    Err(error) => {
                        warn!("the value of {ENV_JOB_NODE_SELECTOR} is not a JSON object: {error}");
                    }
                }
            }
        }

        let github_blocked =
            std::env::var(ENV_GITHUB_BLOCKED).unwrap_or_else(|_| "false".to_string());
        meta.remote_git =
            replace_terraform_source(configuration.spec.remote.as_deref(), &github_blocked);
        meta.remote_git_path = match configuration.spec.path.as_deref() {
            None | Some("") => ".".to_string(),
            Some(path) => path.to_string(),
        };

        if !configuration.spec.inline_credentials {
            meta.provider_reference = Some(get_provider_namespaced_name(configuration));
        }

        meta
    }

    /// Snapshot the per-tenant names before they are overwritten with the
    /// UID-keyed centralized layout.
    pub fn keep_legacy_sub_resources(&mut self) {
        self.legacy_sub_resources = Some(LegacySubResources {
            namespace: self.namespace.clone(),
            apply_job_name: self.apply_job_name.clone(),
            destroy_job_name: self.destroy_job_name.clone(),
            configuration_cm_name: self.configuration_cm_name.clone(),
            variable_secret_name: self.variable_secret_name.clone(),
        });
    }

    /// Switch to the centralized layout: artifacts keyed by UID, all in the
    /// controller namespace.
    pub fn apply_centralized_mode(&mut self, controller_namespace: &str, uid: &str) {
        self.keep_legacy_sub_resources();
        self.apply_job_name = format!("{uid}-{}", ExecutionType::Apply);
        self.destroy_job_name = format!("{uid}-{}", ExecutionType::Destroy);
        self.configuration_cm_name = format!("{TF_INPUT_CONFIGMAP_PREFIX}-{uid}");
        self.variable_secret_name = format!("{TF_VARIABLE_SECRET_PREFIX}-{uid}");
        self.controller_namespace = controller_namespace.to_string();
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;
