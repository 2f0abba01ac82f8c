// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider reconciliation.
//!
//! A Provider is ready when its credentials Secret exists and decodes for
//! the declared cloud; nothing else is managed. The single status field is
//! what Configuration pre-check gates on.

use anyhow::{Context, Result};
use kube::api::PostParams;
use kube::{Api, Client, ResourceExt};
use tracing::{error, info};

use crate::crd::{Provider, ProviderState, ProviderStatus};
use crate::provider::validate_provider_credentials;

const ERR_GET_CREDENTIALS: &str = "failed to get credentials from the cloud provider";
const ERR_SETTING_STATUS: &str = "failed to set status";

/// Reconcile one Provider: validate its credentials and set the readiness
/// state.
///
/// # Errors
///
/// Returns an error when credential validation or the status update fails.
pub async fn reconcile_provider(client: &Client, provider: &Provider) -> Result<()> {
    let namespace = provider.namespace().unwrap_or_default();
    let name = provider.name_any();
    info!(namespace = %namespace, name = %name, "Reconciling Terraform Provider");

    let providers: Api<Provider> = Api::namespaced(client.clone(), &namespace);
    let mut provider = provider.clone();

    if let Err(validation_error) = validate_provider_credentials(client, &provider).await {
        error!(
            namespace = %namespace,
            name = %name,
            "{ERR_GET_CREDENTIALS}: {validation_error:#}"
        );
        provider.status = Some(ProviderStatus {
            state: Some(ProviderState::ProviderIsInitializing),
            message: format!("{ERR_GET_CREDENTIALS}: {validation_error:#}"),
        });
        update_status(&providers, &name, &provider).await?;
        return Err(validation_error.context(ERR_GET_CREDENTIALS));
    }

    provider.status = Some(ProviderStatus {
        state: Some(ProviderState::Ready),
        message: String::new(),
    });
    update_status(&providers, &name, &provider).await
}

async fn update_status(providers: &Api<Provider>, name: &str, provider: &Provider) -> Result<()> {
    let payload = serde_json::to_vec(provider).context(ERR_SETTING_STATUS)?;
    providers
        .replace_status(name, &PostParams::default(), payload)
        .await
        .context(ERR_SETTING_STATUS)?;
    Ok(())
}
