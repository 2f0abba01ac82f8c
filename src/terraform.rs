// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod-log based status probe for executor Jobs.
//!
//! The batch Job API only reports success counts; the reason a run failed
//! lives in the container logs. This module locates the Job's pod through
//! the `job-name` label, pulls the logs of the failed container, and
//! classifies the error into a Configuration state the driver writes into
//! status.

use anyhow::Result;
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};
use kube::api::{ListParams, LogParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::crd::ConfigurationState;

/// A failed (or failing) Terraform run, with the state it maps to.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TerraformStatusError {
    /// State the driver should record.
    pub state: ConfigurationState,
    /// The error text extracted from the logs.
    pub message: String,
}

/// Log markers emitted by Terraform when a region is rejected.
const INVALID_REGION_MARKERS: [&str; 3] = ["Invalid region", "invalid region", "InvalidRegion"];

/// Probe the pod of an executor Job for a failed Terraform run.
///
/// Succeeds silently when the pod is absent, still running, or completed
/// cleanly. A non-zero exit of the init (`terraform init`) or executor
/// container yields a [`TerraformStatusError`] carrying the classified
/// state and the `Error:` lines from the logs.
///
/// # Errors
///
/// Returns `Err` only for a detected Terraform failure; API errors while
/// probing are swallowed (the next reconcile retries).
pub async fn get_terraform_status(
    client: &Client,
    namespace: &str,
    job_name: &str,
    controller_namespace: &str,
    container_name: &str,
    init_container_name: &str,
) -> Result<(), TerraformStatusError> {
    let pods: Api<Pod> = Api::namespaced(client.clone(), controller_namespace);
    let params = ListParams::default().labels(&format!("job-name={job_name}"));

    let pod_list = match pods.list(&params).await {
        Ok(list) => list,
        Err(error) => {
            debug!(
                namespace = %namespace,
                job = %job_name,
                "Failed to list pods for job, skipping status probe: {error}"
            );
            return Ok(());
        }
    };

    let Some(pod) = pod_list.items.into_iter().next() else {
        debug!(job = %job_name, "No pod found for job yet");
        return Ok(());
    };

    let Some(container) = failed_container(&pod, container_name, init_container_name) else {
        return Ok(());
    };

    let logs = match pods
        .logs(
            &pod.name_any(),
            &LogParams {
                container: Some(container),
                ..Default::default()
            },
        )
        .await
    {
        Ok(logs) => logs,
        Err(error) => {
            debug!(pod = %pod.name_any(), "Failed to read pod logs: {error}");
            return Ok(());
        }
    };

    match analyze_terraform_log(&logs) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Pick the failed container worth reading logs from, init container first.
fn failed_container(
    pod: &Pod,
    container_name: &str,
    init_container_name: &str,
) -> Option<String> {
    let status = pod.status.as_ref()?;

    let has_failed = |statuses: Option<&Vec<ContainerStatus>>, name: &str| -> bool {
        statuses
            .into_iter()
            .flatten()
            .filter(|s| s.name == name)
            .any(|s| {
                s.state
                    .as_ref()
                    .and_then(|state| state.terminated.as_ref())
                    .is_some_and(|terminated| terminated.exit_code != 0)
            })
    };

    if has_failed(status.init_container_statuses.as_ref(), init_container_name) {
        return Some(init_container_name.to_string());
    }
    if has_failed(status.container_statuses.as_ref(), container_name) {
        return Some(container_name.to_string());
    }
    None
}

/// Extract and classify the error lines of a Terraform log.
///
/// Returns `None` when the log carries no `Error:` marker.
#[must_use]
pub fn analyze_terraform_log(logs: &str) -> Option<TerraformStatusError> {
    let error_lines: Vec<&str> = logs
        .lines()
        .skip_while(|line| !line.contains("Error:"))
        .collect();
    if error_lines.is_empty() {
        return None;
    }

    let message = error_lines.join("\n");
    let state = if INVALID_REGION_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
    {
        ConfigurationState::InvalidRegion
    } else {
        ConfigurationState::ConfigurationApplyFailed
    };

    Some(TerraformStatusError { state, message })
}

#[cfg(test)]
#[path = "terraform_tests.rs"]
mod terraform_tests;
