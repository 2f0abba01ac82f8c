// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pre-check: populate the Run Context and re-establish artifact invariants.
//!
//! This is the single place the Run Context becomes fully usable. In order:
//! resolve images and resource quantities, validate the spec, resolve
//! credentials, render the configuration, compare it against the stored
//! ConfigMap, persist the ConfigMap, compare and ensure the variable
//! Secret, and install the executor ClusterRole. Both drift checks read the
//! stored artifact before anything writes to it; a comparison made after
//! the persist could never see a difference.

use anyhow::{bail, Context, Result};
use k8s_openapi::api::core::v1::{ConfigMap, EnvVar, EnvVarSource, Secret, SecretKeySelector};
use k8s_openapi::ByteString;
use kube::api::{ObjectMeta, PostParams};
use kube::{Api, Client};
use std::collections::BTreeMap;
use tracing::info;

use crate::configuration::{
    render_configuration, scalar_to_string, valid_configuration_object, ConfigurationType,
};
use crate::constants::{
    CLUSTER_ROLE_NAME, DEFAULT_BUSYBOX_IMAGE, DEFAULT_GIT_IMAGE, DEFAULT_NAMESPACE,
    DEFAULT_TERRAFORM_IMAGE, ENV_BUSYBOX_IMAGE, ENV_GIT_IMAGE, ENV_RESOURCES_LIMITS_CPU,
    ENV_RESOURCES_LIMITS_MEMORY, ENV_RESOURCES_REQUESTS_CPU, ENV_RESOURCES_REQUESTS_MEMORY,
    ENV_TERRAFORM_IMAGE, ERR_CREDENTIAL_NOT_RETRIEVED, ERR_PROVIDER_NOT_FOUND,
    ERR_PROVIDER_NOT_READY, MSG_RELOADING_AS_HCL_CHANGED, MSG_RELOADING_AS_VARIABLE_CHANGED,
};
use crate::crd::{Configuration, ConfigurationState, Provider, ProviderState};
use crate::provider::{get_provider_credentials, get_provider_from_configuration, set_region};
use crate::quantity::parse_quantity;
use crate::rbac::create_terraform_executor_cluster_role;

use super::drift::{configuration_changed, configuration_data_key, variables_changed};
use super::status::update_apply_status;
use super::types::RunContext;

/// Run the ordered pre-check against a Configuration.
///
/// Status side effects: static-check failures record
/// `ConfigurationStaticCheckFailed`, credential problems record
/// `Authorizing`, and either drift records `ConfigurationReloading`.
///
/// # Errors
///
/// Returns an error for any failed step; on a deleting object the caller
/// ignores it.
pub async fn precheck(
    client: &Client,
    configuration: &Configuration,
    meta: &mut RunContext,
) -> Result<()> {
    resolve_images(meta);
    precheck_resources_setting(meta)?;

    // Static validation of the spec itself.
    let configuration_type = match valid_configuration_object(configuration) {
        Ok(configuration_type) => configuration_type,
        Err(error) => {
            update_apply_status(
                client,
                meta,
                ConfigurationState::ConfigurationStaticCheckFailed,
                &error.to_string(),
            )
            .await?;
            return Err(error);
        }
    };
    meta.configuration_type = Some(configuration_type);

    if !configuration.spec.inline_credentials {
        resolve_credentials(client, configuration, meta).await?;
    }

    let (complete_configuration, backend) = render_configuration(
        configuration,
        client,
        configuration_type,
        &meta.controller_namespace,
    )?;
    meta.complete_configuration = complete_configuration;
    meta.backend = Some(backend);

    // Drift is judged against what the previous reconcile stored, so the
    // comparison must happen before the ConfigMap is rewritten.
    check_whether_configuration_changes(client, meta, configuration_type).await?;
    if meta.configuration_changed {
        info!("Configuration changed, reloading...");
        update_apply_status(
            client,
            meta,
            ConfigurationState::ConfigurationReloading,
            MSG_RELOADING_AS_HCL_CHANGED,
        )
        .await?;
        return store_tf_configuration(client, meta, configuration_type).await;
    }

    if configuration.metadata.deletion_timestamp.is_none() {
        store_tf_configuration(client, meta, configuration_type).await?;
    }

    prepare_tf_variables(configuration, meta)?;
    ensure_variable_secret(client, meta).await?;

    create_terraform_executor_cluster_role(
        client,
        &format!("{}-{CLUSTER_ROLE_NAME}", meta.controller_namespace),
    )
    .await
}

/// Resolve the three images from the environment with their defaults.
fn resolve_images(meta: &mut RunContext) {
    meta.terraform_image = std::env::var(ENV_TERRAFORM_IMAGE)
        .ok()
        .filter(|image| !image.is_empty())
        .unwrap_or_else(|| DEFAULT_TERRAFORM_IMAGE.to_string());
    meta.busybox_image = std::env::var(ENV_BUSYBOX_IMAGE)
        .ok()
        .filter(|image| !image.is_empty())
        .unwrap_or_else(|| DEFAULT_BUSYBOX_IMAGE.to_string());
    meta.git_image = std::env::var(ENV_GIT_IMAGE)
        .ok()
        .filter(|image| !image.is_empty())
        .unwrap_or_else(|| DEFAULT_GIT_IMAGE.to_string());
}

/// Read and validate the executor resource quantities from the environment.
///
/// # Errors
///
/// Returns a wrapped parse error naming the offending variable.
pub fn precheck_resources_setting(meta: &mut RunContext) -> Result<()> {
    meta.resources_limits_cpu = std::env::var(ENV_RESOURCES_LIMITS_CPU).unwrap_or_default();
    if !meta.resources_limits_cpu.is_empty() {
        meta.resources_limits_cpu_quantity = Some(
            parse_quantity(&meta.resources_limits_cpu).with_context(|| {
                format!("failed to parse env variable {ENV_RESOURCES_LIMITS_CPU} into a quantity")
            })?,
        );
    }
    meta.resources_limits_memory = std::env::var(ENV_RESOURCES_LIMITS_MEMORY).unwrap_or_default();
    if !meta.resources_limits_memory.is_empty() {
        meta.resources_limits_memory_quantity = Some(
            parse_quantity(&meta.resources_limits_memory).with_context(|| {
                format!(
                    "failed to parse env variable {ENV_RESOURCES_LIMITS_MEMORY} into a quantity"
                )
            })?,
        );
    }
    meta.resources_requests_cpu = std::env::var(ENV_RESOURCES_REQUESTS_CPU).unwrap_or_default();
    if !meta.resources_requests_cpu.is_empty() {
        meta.resources_requests_cpu_quantity = Some(
            parse_quantity(&meta.resources_requests_cpu).with_context(|| {
                format!(
                    "failed to parse env variable {ENV_RESOURCES_REQUESTS_CPU} into a quantity"
                )
            })?,
        );
    }
    meta.resources_requests_memory =
        std::env::var(ENV_RESOURCES_REQUESTS_MEMORY).unwrap_or_default();
    if !meta.resources_requests_memory.is_empty() {
        meta.resources_requests_memory_quantity = Some(
            parse_quantity(&meta.resources_requests_memory).with_context(|| {
                format!(
                    "failed to parse env variable {ENV_RESOURCES_REQUESTS_MEMORY} into a quantity"
                )
            })?,
        );
    }
    Ok(())
}

/// Resolve the Provider, its region, and its credentials into the context.
async fn resolve_credentials(
    client: &Client,
    configuration: &Configuration,
    meta: &mut RunContext,
) -> Result<()> {
    let Some(provider_reference) = meta.provider_reference.clone() else {
        bail!("the referenced provider could not be retrieved");
    };
    let provider_namespace = provider_reference
        .namespace
        .as_deref()
        .unwrap_or(DEFAULT_NAMESPACE);

    let provider =
        match get_provider_from_configuration(client, provider_namespace, &provider_reference.name)
            .await
        {
            Ok(Some(provider)) => provider,
            Ok(None) => {
                update_apply_status(
                    client,
                    meta,
                    ConfigurationState::Authorizing,
                    ERR_PROVIDER_NOT_FOUND,
                )
                .await
                .context(ERR_PROVIDER_NOT_FOUND)?;
                bail!(ERR_PROVIDER_NOT_FOUND);
            }
            Err(error) => {
                let message = error.to_string();
                update_apply_status(client, meta, ConfigurationState::Authorizing, &message)
                    .await
                    .context(message.clone())?;
                return Err(error);
            }
        };

    if !provider_ready(&provider) {
        update_apply_status(
            client,
            meta,
            ConfigurationState::Authorizing,
            ERR_PROVIDER_NOT_READY,
        )
        .await
        .context(ERR_PROVIDER_NOT_READY)?;
        bail!(ERR_PROVIDER_NOT_READY);
    }

    get_credentials(client, configuration, &provider, meta).await
}

fn provider_ready(provider: &Provider) -> bool {
    provider
        .status
        .as_ref()
        .and_then(|status| status.state)
        .is_some_and(|state| state == ProviderState::Ready)
}

/// Resolve region and decode credentials from a ready Provider.
async fn get_credentials(
    client: &Client,
    configuration: &Configuration,
    provider: &Provider,
    meta: &mut RunContext,
) -> Result<()> {
    let region = set_region(configuration, provider)?;
    let credentials = get_provider_credentials(client, provider, &region).await?;
    let Some(credentials) = credentials else {
        bail!(ERR_CREDENTIAL_NOT_RETRIEVED);
    };
    meta.credentials = Some(credentials);
    meta.region = region;
    Ok(())
}

/// The ConfigMap payload: the rendered text plus an empty kubeconfig stub.
#[must_use]
pub fn prepare_tf_input_configuration_data(
    meta: &RunContext,
    configuration_type: ConfigurationType,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            configuration_data_key(configuration_type).to_string(),
            meta.complete_configuration.clone(),
        ),
        ("kubeconfig".to_string(), String::new()),
    ])
}

/// Create or update the ConfigMap holding the rendered configuration.
async fn store_tf_configuration(
    client: &Client,
    meta: &RunContext,
    configuration_type: ConfigurationType,
) -> Result<()> {
    let data = prepare_tf_input_configuration_data(meta, configuration_type);
    let config_maps: Api<ConfigMap> =
        Api::namespaced(client.clone(), &meta.controller_namespace);

    match config_maps.get_opt(&meta.configuration_cm_name).await? {
        None => {
            let config_map = ConfigMap {
                metadata: ObjectMeta {
                    name: Some(meta.configuration_cm_name.clone()),
                    namespace: Some(meta.controller_namespace.clone()),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            };
            config_maps
                .create(&PostParams::default(), &config_map)
                .await
                .context("failed to create TF configuration ConfigMap")?;
        }
        Some(mut existing) => {
            if existing.data.as_ref() != Some(&data) {
                existing.data = Some(data);
                config_maps
                    .replace(
                        &meta.configuration_cm_name,
                        &PostParams::default(),
                        &existing,
                    )
                    .await
                    .context("failed to update TF configuration ConfigMap")?;
            }
        }
    }
    Ok(())
}

/// Compare the ConfigMap stored by the previous reconcile against the
/// rendered text and set the drift flag.
///
/// An absent ConfigMap is a first run, not drift; the caller persists the
/// rendered text afterwards.
async fn check_whether_configuration_changes(
    client: &Client,
    meta: &mut RunContext,
    configuration_type: ConfigurationType,
) -> Result<()> {
    let config_maps: Api<ConfigMap> =
        Api::namespaced(client.clone(), &meta.controller_namespace);
    let Some(config_map) = config_maps
        .get_opt(&meta.configuration_cm_name)
        .await
        .with_context(|| {
            format!(
                "failed to get configuration ConfigMap {}/{}",
                meta.controller_namespace, meta.configuration_cm_name
            )
        })?
    else {
        meta.configuration_changed = false;
        return Ok(());
    };

    let stored = config_map
        .data
        .as_ref()
        .and_then(|data| data.get(configuration_data_key(configuration_type)))
        .map(String::as_str);
    meta.configuration_changed = configuration_changed(
        configuration_type,
        stored,
        &meta.complete_configuration,
    );
    if meta.configuration_changed {
        info!(
            name = %meta.configuration_cm_name,
            "Stored configuration no longer matches the rendered text"
        );
    }
    Ok(())
}

/// Build the executor environment and the desired variable Secret bytes.
///
/// Every `spec.variable` entry becomes a `TF_VAR_<name>` key; credential
/// keys are appended verbatim. All values flow through the Secret and are
/// referenced by key from the Job env.
///
/// # Errors
///
/// Returns an error for non-scalar variables or unretrievable credentials.
pub fn prepare_tf_variables(
    configuration: &Configuration,
    meta: &mut RunContext,
) -> Result<()> {
    let mut envs = Vec::new();
    let mut data: BTreeMap<String, Vec<u8>> = BTreeMap::new();

    if !configuration.spec.inline_credentials && meta.provider_reference.is_none() {
        bail!("the referenced provider could not be retrieved");
    }

    if let Some(variables) = configuration.spec.variable.as_ref() {
        for (key, value) in variables {
            let env_key = format!("TF_VAR_{key}");
            let env_value = scalar_to_string(value).with_context(|| {
                format!("failed to get Terraform JSON variable from Configuration variable {key}")
            })?;
            data.insert(env_key.clone(), env_value.into_bytes());
            envs.push(secret_key_env(&env_key, &meta.variable_secret_name));
        }
    }

    if !configuration.spec.inline_credentials {
        let Some(credentials) = meta.credentials.as_ref() else {
            bail!(ERR_CREDENTIAL_NOT_RETRIEVED);
        };
        for (key, value) in credentials {
            data.insert(key.clone(), value.clone().into_bytes());
            envs.push(secret_key_env(key, &meta.variable_secret_name));
        }
    }

    meta.envs = envs;
    meta.variable_secret_data = data;
    Ok(())
}

fn secret_key_env(key: &str, secret_name: &str) -> EnvVar {
    EnvVar {
        name: key.to_string(),
        value_from: Some(EnvVarSource {
            secret_key_ref: Some(SecretKeySelector {
                key: key.to_string(),
                name: secret_name.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Create the variable Secret, or compare it byte-wise and flag env drift.
async fn ensure_variable_secret(client: &Client, meta: &mut RunContext) -> Result<()> {
    let secrets: Api<Secret> = Api::namespaced(client.clone(), &meta.controller_namespace);

    match secrets.get_opt(&meta.variable_secret_name).await? {
        None => {
            let data: BTreeMap<String, ByteString> = meta
                .variable_secret_data
                .iter()
                .map(|(key, value)| (key.clone(), ByteString(value.clone())))
                .collect();
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(meta.variable_secret_name.clone()),
                    namespace: Some(meta.controller_namespace.clone()),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            };
            secrets
                .create(&PostParams::default(), &secret)
                .await
                .context("failed to create variable secret")?;
        }
        Some(existing) => {
            let stored = existing.data.unwrap_or_default();
            if variables_changed(&meta.variable_secret_data, &stored) {
                meta.env_changed = true;
                info!("Job environment changed");
                update_apply_status(
                    client,
                    meta,
                    ConfigurationState::ConfigurationReloading,
                    MSG_RELOADING_AS_VARIABLE_CHANGED,
                )
                .await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "precheck_tests.rs"]
mod precheck_tests;
