// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! RBAC installation for executor Jobs.
//!
//! Executor pods run `terraform` with the Kubernetes state backend, so they
//! need to read and write Secrets. The controller installs a ClusterRole
//! named `<controller namespace>-tf-executor-clusterrole`, the
//! `tf-executor-service-account` ServiceAccount, and the binding between
//! them. All three are applied server-side so repeated reconciles are
//! no-ops.

use anyhow::{Context, Result};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};
use kube::api::{ObjectMeta, Patch, PatchParams};
use kube::{Api, Client};
use tracing::debug;

use crate::constants::FIELD_MANAGER;

/// Ensure the executor ClusterRole exists.
///
/// # Errors
///
/// Returns an error when the server-side apply fails.
pub async fn create_terraform_executor_cluster_role(client: &Client, name: &str) -> Result<()> {
    let roles: Api<ClusterRole> = Api::all(client.clone());
    let role = ClusterRole {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["secrets".to_string(), "configmaps".to_string()]),
            verbs: ["get", "list", "watch", "create", "update", "patch", "delete"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            ..Default::default()
        }]),
        ..Default::default()
    };

    debug!(name = %name, "Applying executor ClusterRole");
    roles
        .patch(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Apply(&role))
        .await
        .with_context(|| format!("failed to apply ClusterRole {name}"))?;
    Ok(())
}

/// Ensure the executor ServiceAccount exists in the Job namespace.
///
/// # Errors
///
/// Returns an error when the server-side apply fails.
pub async fn create_terraform_executor_service_account(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<()> {
    let service_accounts: Api<ServiceAccount> = Api::namespaced(client.clone(), namespace);
    let service_account = ServiceAccount {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };

    debug!(namespace = %namespace, name = %name, "Applying executor ServiceAccount");
    service_accounts
        .patch(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Apply(&service_account),
        )
        .await
        .with_context(|| format!("failed to apply ServiceAccount {namespace}/{name}"))?;
    Ok(())
}

/// Ensure the binding between the executor ClusterRole and ServiceAccount.
///
/// # Errors
///
/// Returns an error when the server-side apply fails.
pub async fn create_terraform_executor_cluster_role_binding(
    client: &Client,
    namespace: &str,
    role_name: &str,
    service_account_name: &str,
) -> Result<()> {
    let bindings: Api<ClusterRoleBinding> = Api::all(client.clone());
    let binding_name = format!("{role_name}-binding");
    let binding = ClusterRoleBinding {
        metadata: ObjectMeta {
            name: Some(binding_name.clone()),
            ..Default::default()
        },
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: role_name.to_string(),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: service_account_name.to_string(),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        }]),
    };

    debug!(name = %binding_name, "Applying executor ClusterRoleBinding");
    bindings
        .patch(
            &binding_name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Apply(&binding),
        )
        .await
        .with_context(|| format!("failed to apply ClusterRoleBinding {binding_name}"))?;
    Ok(())
}
