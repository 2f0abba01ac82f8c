// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration reconciliation.
//!
//! The driver is level-triggered: every invocation re-derives the desired
//! state from the current Configuration snapshot and reads Kubernetes for
//! every "did I already do this" question. One pass runs pre-check, then
//! branches on the deletion timestamp into the apply path (ensure the apply
//! Job, refresh it on drift, record progress) or the destroy path (run the
//! destroy Job when needed, garbage-collect, release the finalizer).
//!
//! ## Module Structure
//!
//! - [`types`] - Run Context and reconcile outcome types
//! - [`precheck`] - context population and artifact invariants
//! - [`drift`] - input drift comparisons
//! - [`job`] - executor Job assembly
//! - [`outputs`] - output harvesting and the connection Secret
//! - [`cleanup`] - ordered teardown with legacy-name fallbacks
//! - [`status`] - apply/destroy status writers

pub mod cleanup;
pub mod drift;
pub mod job;
pub mod outputs;
pub mod precheck;
pub mod status;
pub mod types;

use anyhow::{Context, Result};
use k8s_openapi::api::batch::v1::Job;
use kube::api::{DeleteParams, PostParams, PropagationPolicy};
use kube::{Api, Client, ResourceExt};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::configuration::is_deletable;
use crate::constants::{
    CLUSTER_ROLE_NAME, CONFIGURATION_FINALIZER, ERR_UPDATE_APPLY_JOB, ERR_UPDATE_DESTROY_JOB,
    FAILED_POLL_REQUEUE_SECS, IN_PROGRESS_REQUEUE_SECS, MSG_CLOUD_RESOURCE_DEPLOYED,
    MSG_CLOUD_RESOURCE_DESTROYING, MSG_CLOUD_RESOURCE_PROVISIONING, SERVICE_ACCOUNT_NAME,
    TERRAFORM_CONTAINER_NAME, TERRAFORM_INIT_CONTAINER_NAME,
};
use crate::crd::{Backend, Configuration, ConfigurationState};
use crate::rbac::{
    create_terraform_executor_cluster_role_binding, create_terraform_executor_service_account,
};
use crate::reconcilers::finalizers::{ensure_finalizer, remove_finalizer};
use crate::terraform::get_terraform_status;

use precheck::precheck;
use status::{update_apply_status, update_destroy_status};
use types::{ExecutionType, ReconcileOutcome, RunContext};

/// Reconcile one Configuration.
///
/// `controller_namespace`, when set, switches the engine into centralized
/// mode: all derived artifacts are renamed by UID into that namespace and
/// the state backend is forced to the in-cluster one.
///
/// # Errors
///
/// Returns an error for real failures only; "a Job is still running" is the
/// [`ReconcileOutcome::RequeueAfter`] outcome, not an error.
pub async fn reconcile_configuration(
    client: &Client,
    configuration: &Configuration,
    controller_namespace: Option<&str>,
) -> Result<ReconcileOutcome> {
    let name = configuration.name_any();
    let namespace = configuration.namespace().unwrap_or_default();
    info!(namespace = %namespace, name = %name, "Reconciling Terraform Configuration");

    let mut configuration = configuration.clone();
    let mut meta = RunContext::new(&configuration);

    if let Some(controller_namespace) =
        controller_namespace.filter(|controller_namespace| !controller_namespace.is_empty())
    {
        // A single namespace runs every Job, so names must be unique across
        // it; key them by UID and remember the per-tenant names for GC.
        let uid = configuration.uid().unwrap_or_default();
        meta.apply_centralized_mode(controller_namespace, &uid);
        configuration.spec.backend = Some(Backend {
            in_cluster_config: true,
            secret_suffix: uid,
        });
    }

    let is_deleting = configuration.metadata.deletion_timestamp.is_some();
    if !is_deleting {
        ensure_finalizer(client, &configuration, CONFIGURATION_FINALIZER)
            .await
            .context("failed to add finalizer")?;
    }

    if let Err(error) = precheck(client, &configuration, &mut meta).await {
        if !is_deleting {
            return Err(error);
        }
        debug!(name = %name, "Ignoring pre-check failure on deleting Configuration: {error:#}");
    }

    // Opportunistic early success: a finished apply Job with unchanged
    // inputs means the resources are already up.
    let jobs: Api<Job> = Api::namespaced(client.clone(), &meta.controller_namespace);
    if let Some(apply_job) = jobs.get_opt(&meta.apply_job_name).await? {
        if !meta.env_changed && job_succeeded(&apply_job) {
            update_apply_status(
                client,
                &meta,
                ConfigurationState::Available,
                MSG_CLOUD_RESOURCE_DEPLOYED,
            )
            .await?;
        }
    }

    if is_deleting {
        info!(
            namespace = %namespace,
            name = %name,
            job = %meta.destroy_job_name,
            "Performing Configuration destroy"
        );

        if let Err(probe) = get_terraform_status(
            client,
            &meta.namespace,
            &meta.destroy_job_name,
            &meta.controller_namespace,
            TERRAFORM_CONTAINER_NAME,
            TERRAFORM_INIT_CONTAINER_NAME,
        )
        .await
        {
            error!("Terraform destroy failed: {probe}");
            update_destroy_status(
                client,
                &meta,
                ConfigurationState::ConfigurationDestroyFailed,
                &probe.message,
            )
            .await?;
        }

        if let ReconcileOutcome::RequeueAfter(delay) =
            terraform_destroy(client, &configuration, &meta).await?
        {
            return Ok(ReconcileOutcome::RequeueAfter(delay));
        }

        let configurations: Api<Configuration> = Api::namespaced(client.clone(), &namespace);
        if let Some(current) = configurations.get_opt(&name).await? {
            remove_finalizer(client, &current, CONFIGURATION_FINALIZER)
                .await
                .context("failed to remove finalizer")?;
        }
        return Ok(ReconcileOutcome::Done);
    }

    // Terraform apply (create or update).
    info!(namespace = %namespace, name = %name, "Performing Terraform apply");
    terraform_apply(client, &configuration, &meta).await?;

    if let Err(probe) = get_terraform_status(
        client,
        &meta.namespace,
        &meta.apply_job_name,
        &meta.controller_namespace,
        TERRAFORM_CONTAINER_NAME,
        TERRAFORM_INIT_CONTAINER_NAME,
    )
    .await
    {
        error!("Terraform apply failed: {probe}");
        update_apply_status(client, &meta, probe.state, &probe.message).await?;
        return Ok(ReconcileOutcome::RequeueAfter(Duration::from_secs(
            FAILED_POLL_REQUEUE_SECS,
        )));
    }

    Ok(ReconcileOutcome::Done)
}

/// Ensure the apply Job exists and reflect its progress into status.
async fn terraform_apply(
    client: &Client,
    configuration: &Configuration,
    meta: &RunContext,
) -> Result<()> {
    debug!(
        namespace = %meta.controller_namespace,
        job = %meta.apply_job_name,
        "Ensuring Terraform apply job"
    );

    let jobs: Api<Job> = Api::namespaced(client.clone(), &meta.controller_namespace);
    let Some(apply_job) = jobs.get_opt(&meta.apply_job_name).await? else {
        return assemble_and_trigger_job(client, meta, ExecutionType::Apply).await;
    };

    update_terraform_job_if_needed(client, meta, ExecutionType::Apply)
        .await
        .context(ERR_UPDATE_APPLY_JOB)?;

    if !meta.env_changed && job_succeeded(&apply_job) {
        update_apply_status(
            client,
            meta,
            ConfigurationState::Available,
            MSG_CLOUD_RESOURCE_DEPLOYED,
        )
        .await?;
    } else {
        // Provisioning is in flight; InvalidRegion is terminal and must not
        // be papered over.
        let current_state = configuration
            .status
            .as_ref()
            .and_then(|status| status.apply.as_ref())
            .map(|apply| apply.state);
        if !matches!(
            current_state,
            Some(ConfigurationState::ConfigurationProvisioningAndChecking)
                | Some(ConfigurationState::InvalidRegion)
        ) {
            update_apply_status(
                client,
                meta,
                ConfigurationState::ConfigurationProvisioningAndChecking,
                MSG_CLOUD_RESOURCE_PROVISIONING,
            )
            .await?;
        }
    }
    Ok(())
}

/// Drive the destroy side: run the destroy Job when required, then
/// garbage-collect.
async fn terraform_destroy(
    client: &Client,
    configuration: &Configuration,
    meta: &RunContext,
) -> Result<ReconcileOutcome> {
    let deletable = is_deletable(client, configuration).await?;
    let delete_directly = deletable || !meta.delete_resource;
    let jobs: Api<Job> = Api::namespaced(client.clone(), &meta.controller_namespace);

    if !delete_directly {
        if jobs.get_opt(&meta.destroy_job_name).await?.is_none() {
            let configurations: Api<Configuration> =
                Api::namespaced(client.clone(), &meta.namespace);
            if configurations.get_opt(&meta.name).await?.is_some() {
                assemble_and_trigger_job(client, meta, ExecutionType::Destroy).await?;
            }
        }
        update_terraform_job_if_needed(client, meta, ExecutionType::Destroy)
            .await
            .context(ERR_UPDATE_DESTROY_JOB)?;
    }

    update_destroy_status(
        client,
        meta,
        ConfigurationState::ConfigurationDestroying,
        MSG_CLOUD_RESOURCE_DESTROYING,
    )
    .await?;

    if configuration.spec.force_delete.unwrap_or(false) {
        // Remove whatever can be removed; a failed destroy Job must not
        // hold the Configuration hostage.
        if let Err(error) = cleanup::clean_up_sub_resources(client, configuration, meta).await {
            warn!(
                "Failed to clean up sub-resources of force-deleted configuration, ignoring: {error:#}"
            );
        }
        return Ok(ReconcileOutcome::Done);
    }

    if !delete_directly {
        let destroy_done = jobs
            .get_opt(&meta.destroy_job_name)
            .await?
            .is_some_and(|job| job_succeeded(&job));
        if !destroy_done {
            return Ok(ReconcileOutcome::RequeueAfter(Duration::from_secs(
                IN_PROGRESS_REQUEUE_SECS,
            )));
        }
    }

    cleanup::clean_up_sub_resources(client, configuration, meta).await?;
    Ok(ReconcileOutcome::Done)
}

/// Delete the Job and the variable Secret when either input drifted, so
/// the next reconcile recreates both from fresh inputs.
async fn update_terraform_job_if_needed(
    client: &Client,
    meta: &RunContext,
    execution_type: ExecutionType,
) -> Result<()> {
    if !meta.env_changed && !meta.configuration_changed {
        return Ok(());
    }

    let job_name = match execution_type {
        ExecutionType::Apply => &meta.apply_job_name,
        ExecutionType::Destroy => &meta.destroy_job_name,
    };
    info!(
        namespace = %meta.controller_namespace,
        job = %job_name,
        "Inputs changed, deleting execution job"
    );

    let jobs: Api<Job> = Api::namespaced(client.clone(), &meta.controller_namespace);
    if jobs.get_opt(job_name).await?.is_some() {
        jobs.delete(
            job_name,
            &DeleteParams {
                propagation_policy: Some(PropagationPolicy::Background),
                ..Default::default()
            },
        )
        .await
        .with_context(|| format!("failed to delete job {job_name}"))?;
    }

    let secrets: Api<k8s_openapi::api::core::v1::Secret> =
        Api::namespaced(client.clone(), &meta.controller_namespace);
    if secrets.get_opt(&meta.variable_secret_name).await?.is_some() {
        secrets
            .delete(&meta.variable_secret_name, &DeleteParams::default())
            .await
            .with_context(|| {
                format!("failed to delete variable secret {}", meta.variable_secret_name)
            })?;
    }
    Ok(())
}

/// Install executor RBAC, assemble the Job, and submit it.
async fn assemble_and_trigger_job(
    client: &Client,
    meta: &RunContext,
    execution_type: ExecutionType,
) -> Result<()> {
    create_terraform_executor_service_account(
        client,
        &meta.controller_namespace,
        SERVICE_ACCOUNT_NAME,
    )
    .await?;
    create_terraform_executor_cluster_role_binding(
        client,
        &meta.controller_namespace,
        &format!("{}-{CLUSTER_ROLE_NAME}", meta.controller_namespace),
        SERVICE_ACCOUNT_NAME,
    )
    .await?;

    let job = job::assemble_terraform_job(meta, execution_type);
    let jobs: Api<Job> = Api::namespaced(client.clone(), &meta.controller_namespace);
    info!(
        namespace = %meta.controller_namespace,
        job = ?job.metadata.name,
        execution = %execution_type,
        "Submitting Terraform execution job"
    );
    jobs.create(&PostParams::default(), &job)
        .await
        .with_context(|| format!("failed to create Terraform {execution_type} job"))?;
    Ok(())
}

fn job_succeeded(job: &Job) -> bool {
    job.status
        .as_ref()
        .and_then(|status| status.succeeded)
        .unwrap_or(0)
        == 1
}
