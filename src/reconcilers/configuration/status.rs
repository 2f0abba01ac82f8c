// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status writers for the apply and destroy phases.
//!
//! Both writers fetch the current Configuration, mutate only their own
//! half of the status, and replace the status subresource. A Configuration
//! that vanished mid-reconcile is treated as success. Any transition into
//! `Available` harvests outputs; a harvest failure degrades the state to
//! `GeneratingOutputs` instead of failing the reconcile.

use anyhow::{Context, Result};
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::{debug, warn};

use crate::constants::ERR_GENERATE_OUTPUTS;
use crate::crd::{
    Configuration, ConfigurationApplyStatus, ConfigurationDestroyStatus, ConfigurationState,
};

use super::outputs::get_tf_outputs;
use super::types::RunContext;

/// Record the apply state and message, harvesting outputs on `Available`.
///
/// # Errors
///
/// Returns an error when the status replace fails; the harvest result is
/// folded into the written state instead of propagating.
pub async fn update_apply_status(
    client: &Client,
    meta: &RunContext,
    state: ConfigurationState,
    message: &str,
) -> Result<()> {
    let configurations: Api<Configuration> = Api::namespaced(client.clone(), &meta.namespace);
    let Some(mut configuration) = configurations.get_opt(&meta.name).await? else {
        debug!(name = %meta.name, "Configuration is gone, skipping apply status update");
        return Ok(());
    };

    let mut apply = ConfigurationApplyStatus {
        state,
        message: message.to_string(),
        region: (!meta.region.is_empty()).then(|| meta.region.clone()),
        outputs: None,
    };

    if state == ConfigurationState::Available {
        match get_tf_outputs(client, meta, &configuration).await {
            Ok(outputs) => apply.outputs = Some(outputs),
            Err(error) => {
                warn!(name = %meta.name, "Failed to harvest outputs: {error:#}");
                apply = ConfigurationApplyStatus {
                    state: ConfigurationState::GeneratingOutputs,
                    message: format!("{ERR_GENERATE_OUTPUTS}: {error:#}"),
                    region: apply.region.clone(),
                    outputs: None,
                };
            }
        }
    }

    let mut status = configuration.status.clone().unwrap_or_default();
    status.apply = Some(apply);
    status.observed_generation = configuration.metadata.generation;
    configuration.status = Some(status);

    replace_status(&configurations, &meta.name, &configuration).await
}

/// Record the destroy state and message.
///
/// # Errors
///
/// Returns an error when the status replace fails.
pub async fn update_destroy_status(
    client: &Client,
    meta: &RunContext,
    state: ConfigurationState,
    message: &str,
) -> Result<()> {
    let configurations: Api<Configuration> = Api::namespaced(client.clone(), &meta.namespace);
    let Some(mut configuration) = configurations.get_opt(&meta.name).await? else {
        debug!(name = %meta.name, "Configuration is gone, skipping destroy status update");
        return Ok(());
    };

    let mut status = configuration.status.clone().unwrap_or_default();
    status.destroy = Some(ConfigurationDestroyStatus {
        state,
        message: message.to_string(),
    });
    configuration.status = Some(status);

    replace_status(&configurations, &meta.name, &configuration).await
}

async fn replace_status(
    configurations: &Api<Configuration>,
    name: &str,
    configuration: &Configuration,
) -> Result<()> {
    let payload =
        serde_json::to_vec(configuration).context("failed to serialize configuration status")?;
    configurations
        .replace_status(name, &PostParams::default(), payload)
        .await
        .with_context(|| format!("failed to update status of configuration {name}"))?;
    Ok(())
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod status_tests;
