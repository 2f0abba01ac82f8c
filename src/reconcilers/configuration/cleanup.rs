// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Garbage collection of derived artifacts.
//!
//! Teardown deletes, in order: the configuration ConfigMap, the connection
//! Secret, the apply Job, the destroy Job, the variable Secret, and the
//! backend state. Each named artifact is tried under three
//! `{name, namespace}` combinations (the legacy per-tenant snapshot, the
//! controller namespace, and the Configuration's own namespace) so that
//! objects created before a layout migration are still found. Absence is
//! skipped silently; any other failure aborts the pass so the finalizer
//! stays put.

use anyhow::{Context, Result};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::DeleteParams;
use kube::{Api, Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use tracing::info;

use crate::backend::StateBackend;
use crate::constants::DEFAULT_NAMESPACE;
use crate::crd::Configuration;
use crate::metrics::record_resource_deleted;

use super::types::RunContext;

/// The `{name, namespace}` pairs a derived artifact may live under.
///
/// Ordered: legacy snapshot first, then the controller namespace, then the
/// per-tenant namespace. Empty names (no legacy snapshot) are dropped.
#[must_use]
pub fn possible_combinations(
    legacy: Option<(&str, &str)>,
    name: &str,
    controller_namespace: &str,
    namespace: &str,
) -> Vec<(String, String)> {
    let mut combinations = Vec::with_capacity(3);
    if let Some((legacy_name, legacy_namespace)) = legacy {
        combinations.push((legacy_name.to_string(), legacy_namespace.to_string()));
    }
    combinations.push((name.to_string(), controller_namespace.to_string()));
    combinations.push((name.to_string(), namespace.to_string()));
    combinations
        .into_iter()
        .filter(|(name, namespace)| !name.is_empty() && !namespace.is_empty())
        .collect()
}

/// Delete one artifact kind under every combination it may live at.
async fn delete_combinations<K>(client: &Client, combinations: Vec<(String, String)>) -> Result<()>
where
    K: Resource<DynamicType = (), Scope = kube::core::NamespaceResourceScope>
        + Clone
        + std::fmt::Debug
        + DeserializeOwned,
{
    for (name, namespace) in combinations {
        let api: Api<K> = Api::namespaced(client.clone(), &namespace);
        if api.get_opt(&name).await?.is_some() {
            info!(
                kind = %K::kind(&()),
                namespace = %namespace,
                name = %name,
                "Deleting derived artifact"
            );
            api.delete(&name, &DeleteParams::default())
                .await
                .with_context(|| {
                    format!("failed to delete {} {namespace}/{name}", K::kind(&()))
                })?;
            record_resource_deleted(&K::kind(&()));
        }
    }
    Ok(())
}

fn legacy_pair<'a>(
    meta: &'a RunContext,
    pick: impl Fn(&'a super::types::LegacySubResources) -> &'a str,
) -> Option<(&'a str, &'a str)> {
    meta.legacy_sub_resources
        .as_ref()
        .map(|legacy| (pick(legacy), legacy.namespace.as_str()))
}

/// Delete the ConfigMap storing the rendered configuration.
pub async fn delete_config_map(client: &Client, meta: &RunContext) -> Result<()> {
    let combinations = possible_combinations(
        legacy_pair(meta, |legacy| &legacy.configuration_cm_name),
        &meta.configuration_cm_name,
        &meta.controller_namespace,
        &meta.namespace,
    );
    delete_combinations::<ConfigMap>(client, combinations).await
}

/// Delete the Secret storing variables and credentials.
pub async fn delete_variable_secret(client: &Client, meta: &RunContext) -> Result<()> {
    let combinations = possible_combinations(
        legacy_pair(meta, |legacy| &legacy.variable_secret_name),
        &meta.variable_secret_name,
        &meta.controller_namespace,
        &meta.namespace,
    );
    delete_combinations::<Secret>(client, combinations).await
}

/// Delete the apply Job.
pub async fn delete_apply_job(client: &Client, meta: &RunContext) -> Result<()> {
    let combinations = possible_combinations(
        legacy_pair(meta, |legacy| &legacy.apply_job_name),
        &meta.apply_job_name,
        &meta.controller_namespace,
        &meta.namespace,
    );
    delete_combinations::<Job>(client, combinations).await
}

/// Delete the destroy Job.
pub async fn delete_destroy_job(client: &Client, meta: &RunContext) -> Result<()> {
    let combinations = possible_combinations(
        legacy_pair(meta, |legacy| &legacy.destroy_job_name),
        &meta.destroy_job_name,
        &meta.controller_namespace,
        &meta.namespace,
    );
    delete_combinations::<Job>(client, combinations).await
}

/// Delete the user-facing connection Secret, when one was referenced.
pub async fn delete_connection_secret(
    client: &Client,
    name: &str,
    namespace: &str,
) -> Result<()> {
    if name.is_empty() {
        return Ok(());
    }
    let namespace = if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    };
    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    if secrets.get_opt(name).await?.is_some() {
        info!(namespace = %namespace, name = %name, "Deleting connection secret");
        secrets
            .delete(name, &DeleteParams::default())
            .await
            .with_context(|| format!("failed to delete connection secret {namespace}/{name}"))?;
        record_resource_deleted("Secret");
    }
    Ok(())
}

/// Run the six teardown steps in order.
///
/// # Errors
///
/// Returns the first non-NotFound failure; the caller keeps the finalizer
/// in place and retries.
pub async fn clean_up_sub_resources(
    client: &Client,
    configuration: &Configuration,
    meta: &RunContext,
) -> Result<()> {
    info!(
        name = %configuration.name_any(),
        namespace = ?configuration.namespace(),
        "Cleaning up derived artifacts"
    );

    delete_config_map(client, meta).await?;

    if let Some(reference) = configuration
        .spec
        .write_connection_secret_to_reference
        .as_ref()
    {
        delete_connection_secret(
            client,
            &reference.name,
            reference.namespace.as_deref().unwrap_or_default(),
        )
        .await?;
    }

    delete_apply_job(client, meta).await?;
    delete_destroy_job(client, meta).await?;
    delete_variable_secret(client, meta).await?;

    if let Some(backend) = meta.backend.as_ref() {
        backend.clean_up().await?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod cleanup_tests;
