// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration validation and rendering helpers.
//!
//! This module owns everything about a `Configuration` spec that does not
//! touch the cluster: static validation, rendering the complete Terraform
//! text (user HCL plus backend stanza), classifying whether deletion needs a
//! destroy Job, the GitHub mirror rewrite, and scalar stringification for
//! variables and outputs.

use anyhow::{bail, Context, Result};
use kube::{Api, Client};
use url::Url;

use crate::backend::K8sBackend;
use crate::constants::DEFAULT_NAMESPACE;
use crate::crd::{Backend, Configuration, ConfigurationState, Provider, Reference};

/// The two supported sources of Terraform text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigurationType {
    /// Inline HCL (or JSON) in `spec.hcl`.
    Hcl,
    /// A git repository in `spec.remote`.
    Remote,
}

/// Statically validate a Configuration into its [`ConfigurationType`].
///
/// Exactly one of `spec.hcl` and `spec.remote` must be set.
///
/// # Errors
///
/// Returns an error when both or neither source is present.
pub fn valid_configuration_object(configuration: &Configuration) -> Result<ConfigurationType> {
    let has_hcl = configuration
        .spec
        .hcl
        .as_deref()
        .is_some_and(|hcl| !hcl.is_empty());
    let has_remote = configuration
        .spec
        .remote
        .as_deref()
        .is_some_and(|remote| !remote.is_empty());

    match (has_hcl, has_remote) {
        (true, true) => bail!("spec.hcl and spec.remote cannot be set at the same time"),
        (true, false) => Ok(ConfigurationType::Hcl),
        (false, true) => Ok(ConfigurationType::Remote),
        (false, false) => bail!("spec.hcl or spec.remote should be set"),
    }
}

/// Render the complete Terraform text and the state backend handle.
///
/// For inline HCL the result is the user text followed by the backend
/// stanza; for remote configurations only the stanza is rendered (the
/// cloned repository supplies the rest). The backend Secret lives in
/// `job_namespace`, the namespace the executor Job runs in.
///
/// # Errors
///
/// Returns an error when the Configuration requests a backend other than
/// the in-cluster Kubernetes backend.
pub fn render_configuration(
    configuration: &Configuration,
    client: &Client,
    configuration_type: ConfigurationType,
    job_namespace: &str,
) -> Result<(String, K8sBackend)> {
    let backend_spec = effective_backend(configuration);
    if !backend_spec.in_cluster_config {
        bail!("only the in-cluster Kubernetes backend is supported");
    }

    let stanza = backend_stanza(&backend_spec.secret_suffix, job_namespace);
    let complete = match configuration_type {
        ConfigurationType::Hcl => {
            let hcl = configuration.spec.hcl.as_deref().unwrap_or_default();
            format!("{hcl}\n\n{stanza}")
        }
        ConfigurationType::Remote => stanza,
    };

    let backend = K8sBackend::new(
        client.clone(),
        job_namespace.to_string(),
        backend_spec.secret_suffix,
    );
    Ok((complete, backend))
}

/// The backend selector actually in force: the spec's, or the default
/// in-cluster backend suffixed with the Configuration name.
fn effective_backend(configuration: &Configuration) -> Backend {
    configuration
        .spec
        .backend
        .clone()
        .unwrap_or_else(|| Backend {
            in_cluster_config: true,
            secret_suffix: configuration.metadata.name.clone().unwrap_or_default(),
        })
}

fn backend_stanza(secret_suffix: &str, namespace: &str) -> String {
    format!(
        r#"terraform {{
  backend "kubernetes" {{
    secret_suffix     = "{secret_suffix}"
    in_cluster_config = true
    namespace         = "{namespace}"
  }}
}}"#
    )
}

/// Decide whether a deleting Configuration can skip the destroy Job.
///
/// A Configuration that never successfully applied has no cloud resources
/// worth destroying: no apply status yet, a pre-provisioning failure state,
/// or an invalid region all qualify. So does a missing Provider, since the
/// destroy Job could not authenticate anyway.
///
/// # Errors
///
/// Returns an error when the Provider lookup fails for a reason other than
/// absence.
pub async fn is_deletable(client: &Client, configuration: &Configuration) -> Result<bool> {
    if !configuration.spec.inline_credentials {
        let provider_ref = get_provider_namespaced_name(configuration);
        let namespace = provider_ref
            .namespace
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE);
        let providers: Api<Provider> = Api::namespaced(client.clone(), namespace);
        if providers
            .get_opt(&provider_ref.name)
            .await
            .context("failed to look up the referenced provider")?
            .is_none()
        {
            return Ok(true);
        }
    }

    let apply = configuration
        .status
        .as_ref()
        .and_then(|status| status.apply.as_ref());
    let deletable = match apply {
        None => true,
        Some(apply) => matches!(
            apply.state,
            ConfigurationState::InvalidRegion
                | ConfigurationState::ConfigurationStaticCheckFailed
                | ConfigurationState::Authorizing
                | ConfigurationState::ProviderNotReady
        ),
    };
    Ok(deletable)
}

/// Resolve the Provider reference, defaulting name and namespace to
/// `default`.
#[must_use]
pub fn get_provider_namespaced_name(configuration: &Configuration) -> Reference {
    match &configuration.spec.provider_ref {
        Some(reference) => Reference {
            name: reference.name.clone(),
            namespace: Some(
                reference
                    .namespace
                    .clone()
                    .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            ),
        },
        None => Reference {
            name: DEFAULT_NAMESPACE.to_string(),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
        },
    }
}

/// Rewrite a GitHub remote to its mirror when GitHub is blocked in-cluster.
///
/// Returns the remote unchanged when it is empty, not a URL, or the blocked
/// flag is anything but `"true"`.
#[must_use]
pub fn replace_terraform_source(remote: Option<&str>, github_blocked: &str) -> String {
    let remote = remote.unwrap_or_default();
    if github_blocked != "true" || remote.is_empty() {
        return remote.to_string();
    }

    match Url::parse(remote) {
        Ok(mut url) if url.host_str() == Some("github.com") => {
            if url.set_host(Some("gitee.com")).is_ok() {
                url.to_string()
            } else {
                remote.to_string()
            }
        }
        _ => remote.to_string(),
    }
}

/// Stringify a scalar variable or output value.
///
/// # Errors
///
/// Returns an error for arrays, objects and null, which have no single
/// environment-variable rendering.
pub fn scalar_to_string(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => bail!("value {other} cannot be converted to a string"),
    }
}

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod configuration_tests;
