// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for Terraform management.
//!
//! This module defines the two resources Terry reconciles:
//!
//! - [`Configuration`] - one unit of Terraform configuration, either inline
//!   HCL or a remote git repository, together with its variables and the
//!   target for its outputs
//! - [`Provider`] - cloud credentials and a default region, referenced by
//!   Configurations that do not carry inline credentials
//!
//! # Example: an inline HCL Configuration
//!
//! ```rust,no_run
//! use terry::crd::ConfigurationSpec;
//!
//! let spec = ConfigurationSpec {
//!     hcl: Some("resource \"random_id\" \"server\" { byte_length = 8 }".to_string()),
//!     ..Default::default()
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reference to a named object in an optional namespace.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    /// Name of the referenced object.
    pub name: String,

    /// Namespace of the referenced object. Defaults to `default` when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Reference to a Secret a Configuration writes its outputs into.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the connection Secret.
    pub name: String,

    /// Namespace of the connection Secret. Defaults to `default` when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Reference to a key inside a Secret.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyReference {
    /// Name of the Secret.
    pub name: String,

    /// Namespace of the Secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Key within the Secret data.
    pub key: String,
}

/// Terraform state backend selector.
///
/// Only the in-cluster Kubernetes backend is modelled; when the controller
/// runs in centralized mode this is forced with the Configuration UID as the
/// suffix so state Secrets never collide.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Backend {
    /// Store state in the cluster the Job runs in.
    #[serde(default)]
    pub in_cluster_config: bool,

    /// Suffix of the state Secret (`tfstate-default-<suffix>`).
    #[serde(default)]
    pub secret_suffix: String,
}

/// Lifecycle states reported in a Configuration status.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConfigurationState {
    /// Cloud resources are deployed and outputs have been harvested.
    Available,

    /// An apply Job is running and its outcome is being checked.
    ConfigurationProvisioningAndChecking,

    /// The Configuration spec failed static validation.
    ConfigurationStaticCheckFailed,

    /// Credentials are being resolved from the referenced Provider.
    Authorizing,

    /// The referenced Provider exists but is not ready.
    ProviderNotReady,

    /// Inputs changed and the execution Job is being replaced.
    ConfigurationReloading,

    /// Apply succeeded but harvesting outputs failed.
    GeneratingOutputs,

    /// The resolved region was rejected by the cloud provider.
    InvalidRegion,

    /// The apply Job failed.
    ConfigurationApplyFailed,

    /// A destroy Job is running.
    ConfigurationDestroying,

    /// The destroy Job failed.
    ConfigurationDestroyFailed,
}

/// One harvested Terraform output value, stringified.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
pub struct Property {
    /// The output value rendered as a string.
    pub value: String,
}

/// Status of the apply phase.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationApplyStatus {
    /// Current apply state.
    pub state: ConfigurationState,

    /// Human-readable progress or error message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,

    /// Region the resources were provisioned in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Terraform outputs keyed by output name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<BTreeMap<String, Property>>,
}

/// Status of the destroy phase.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationDestroyStatus {
    /// Current destroy state.
    pub state: ConfigurationState,

    /// Human-readable progress or error message.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Status subresource of a Configuration.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationStatus {
    /// State of the most recent apply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apply: Option<ConfigurationApplyStatus>,

    /// State of the most recent destroy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destroy: Option<ConfigurationDestroyStatus>,

    /// Generation most recently acted upon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

/// A Terraform configuration unit.
///
/// Exactly one of `hcl` or `remote` must be set. Variables become
/// `TF_VAR_<name>` environment variables of the executor Job, stored in a
/// derived Secret alongside the Provider credentials.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "terraform.firestoned.io",
    version = "v1beta2",
    kind = "Configuration",
    namespaced,
    shortname = "cfg",
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.apply.state"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[kube(status = "ConfigurationStatus")]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationSpec {
    /// Inline Terraform configuration in HCL or JSON syntax.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hcl: Option<String>,

    /// URL of a git repository holding the Terraform configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,

    /// Sub-directory of the remote repository holding the configuration.
    /// Defaults to the repository root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Terraform variables. Values may be any scalar; they are stringified
    /// into `TF_VAR_<name>` environment variables.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable: Option<BTreeMap<String, serde_json::Value>>,

    /// Terraform state backend. Ignored (and forced to the in-cluster
    /// backend) when the controller runs in centralized mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<Backend>,

    /// Region override taking precedence over the Provider region.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Secret the harvested outputs are written into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_connection_secret_to_reference: Option<SecretReference>,

    /// Provider carrying the credentials for this Configuration.
    /// Defaults to `default/default` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_ref: Option<Reference>,

    /// The configuration text carries its own credentials; no Provider is
    /// consulted.
    #[serde(default)]
    pub inline_credentials: bool,

    /// Run `terraform destroy` on deletion. Defaults to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_resource: Option<bool>,

    /// Remove all derived artifacts on deletion even if the destroy Job
    /// fails. Defaults to false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_delete: Option<bool>,
}

/// States reported in a Provider status.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ProviderState {
    /// Credentials resolved and usable.
    #[serde(rename = "ready")]
    Ready,

    /// Credentials are not yet usable.
    ProviderIsInitializing,
}

/// Status subresource of a Provider.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Readiness of the Provider credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ProviderState>,

    /// Human-readable error message when not ready.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Credential source of a Provider.
#[derive(Clone, Debug, Serialize, Deserialize, Default, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    /// How credentials are obtained. Only `Secret` is supported.
    pub source: String,

    /// Secret holding the credential payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<SecretKeyReference>,
}

/// Cloud credentials and a default region.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, Default, JsonSchema)]
#[kube(
    group = "terraform.firestoned.io",
    version = "v1beta1",
    kind = "Provider",
    namespaced,
    printcolumn = r#"{"name":"State","type":"string","jsonPath":".status.state"}"#
)]
#[kube(status = "ProviderStatus")]
#[serde(rename_all = "camelCase")]
pub struct ProviderSpec {
    /// Cloud provider kind, e.g. `aws`, `azure`, `gcp`, `alibaba` or
    /// `custom`.
    pub provider: String,

    /// Default region for Configurations using this Provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Where the credentials come from.
    pub credentials: ProviderCredentials,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
