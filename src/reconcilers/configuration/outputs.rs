// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Output harvesting after a successful apply.
//!
//! The state blob is read back from the backend, its `outputs` mapping is
//! stringified into the Configuration status, and, when the Configuration
//! asks for one, a connection Secret is written. The ownership labels on
//! that Secret are the one cross-object safety invariant of the engine: a
//! Secret owned by another Configuration is never overwritten.

use anyhow::{bail, Context, Result};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{ObjectMeta, PostParams};
use kube::{Api, Client, ResourceExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::backend::StateBackend;
use crate::configuration::scalar_to_string;
use crate::constants::DEFAULT_NAMESPACE;
use crate::crd::{Configuration, Property};
use crate::labels::{CREATED_BY_TERRY, LABEL_CREATED_BY, LABEL_OWNED_BY, LABEL_OWNED_NAMESPACE};

use super::types::RunContext;

/// One output entry of a Terraform state blob.
#[derive(Debug, Deserialize)]
pub struct TfStateProperty {
    /// The output value; any scalar.
    #[serde(default)]
    pub value: serde_json::Value,
    /// The output type descriptor; unused beyond round-tripping.
    #[serde(default, rename = "type")]
    pub r#type: serde_json::Value,
}

/// The subset of a Terraform state blob the harvester reads.
#[derive(Debug, Deserialize)]
pub struct TfState {
    /// Outputs keyed by name.
    #[serde(default)]
    pub outputs: BTreeMap<String, TfStateProperty>,
}

/// Parse a state blob into stringified outputs.
///
/// # Errors
///
/// Returns an error when the blob is not valid state JSON or an output
/// value is not a scalar.
pub fn parse_state_outputs(state_json: &[u8]) -> Result<BTreeMap<String, Property>> {
    let state: TfState =
        serde_json::from_slice(state_json).context("failed to parse Terraform state JSON")?;

    let mut outputs = BTreeMap::new();
    for (key, property) in state.outputs {
        let value = scalar_to_string(&property.value).with_context(|| {
            format!("failed to convert value of terraform state output '{key}' to a string")
        })?;
        outputs.insert(key, Property { value });
    }
    Ok(outputs)
}

/// Verify the ownership labels of an existing connection Secret.
///
/// A label that is present and names another Configuration blocks the
/// write; absent labels are treated as unowned and may be adopted.
///
/// # Errors
///
/// Returns the precise ownership conflict, naming both Configurations.
pub fn check_connection_secret_ownership(
    secret: &Secret,
    configuration_name: &str,
    configuration_namespace: &str,
) -> Result<()> {
    let labels = secret.metadata.labels.clone().unwrap_or_default();
    let owner_name = labels.get(LABEL_OWNED_BY).cloned().unwrap_or_default();
    let owner_namespace = labels
        .get(LABEL_OWNED_NAMESPACE)
        .cloned()
        .unwrap_or_default();

    if (!owner_name.is_empty() && owner_name != configuration_name)
        || (!owner_namespace.is_empty() && owner_namespace != configuration_namespace)
    {
        bail!(
            "configuration(namespace: {} ; name: {}) cannot update secret(namespace: {} ; name: {}) whose owner is configuration(namespace: {} ; name: {})",
            configuration_namespace,
            configuration_name,
            secret.namespace().unwrap_or_default(),
            secret.name_any(),
            owner_namespace,
            owner_name,
        );
    }
    Ok(())
}

/// Read the state blob, record the outputs, and write the connection
/// Secret when one is referenced.
///
/// # Errors
///
/// Returns an error when the backend read fails, the state does not parse,
/// or the connection Secret is owned by another Configuration.
pub async fn get_tf_outputs(
    client: &Client,
    meta: &RunContext,
    configuration: &Configuration,
) -> Result<BTreeMap<String, Property>> {
    let backend = meta
        .backend
        .as_ref()
        .context("state backend is not initialized")?;
    let state_json = backend.get_tf_state_json().await?;
    let outputs = parse_state_outputs(&state_json)?;

    let Some(reference) = configuration
        .spec
        .write_connection_secret_to_reference
        .as_ref()
        .filter(|reference| !reference.name.is_empty())
    else {
        return Ok(outputs);
    };

    let secret_namespace = reference
        .namespace
        .as_deref()
        .filter(|namespace| !namespace.is_empty())
        .unwrap_or(DEFAULT_NAMESPACE);

    let data: BTreeMap<String, ByteString> = outputs
        .iter()
        .map(|(key, property)| (key.clone(), ByteString(property.value.clone().into_bytes())))
        .collect();

    let configuration_name = configuration.name_any();
    let configuration_namespace = configuration.namespace().unwrap_or_default();
    let secrets: Api<Secret> = Api::namespaced(client.clone(), secret_namespace);

    match secrets.get_opt(&reference.name).await? {
        None => {
            let labels = BTreeMap::from([
                (LABEL_CREATED_BY.to_string(), CREATED_BY_TERRY.to_string()),
                (LABEL_OWNED_BY.to_string(), configuration_name.clone()),
                (
                    LABEL_OWNED_NAMESPACE.to_string(),
                    configuration_namespace.clone(),
                ),
            ]);
            let secret = Secret {
                metadata: ObjectMeta {
                    name: Some(reference.name.clone()),
                    namespace: Some(secret_namespace.to_string()),
                    labels: Some(labels),
                    ..Default::default()
                },
                data: Some(data),
                ..Default::default()
            };
            info!(
                namespace = %secret_namespace,
                name = %reference.name,
                "Creating connection secret"
            );
            secrets
                .create(&PostParams::default(), &secret)
                .await
                .with_context(|| format!("failed to create connection secret {}", reference.name))?;
        }
        Some(mut existing) => {
            check_connection_secret_ownership(
                &existing,
                &configuration_name,
                &configuration_namespace,
            )?;
            existing.data = Some(data);
            info!(
                namespace = %secret_namespace,
                name = %reference.name,
                "Updating connection secret"
            );
            secrets
                .replace(&reference.name, &PostParams::default(), &existing)
                .await
                .with_context(|| format!("failed to update connection secret {}", reference.name))?;
        }
    }

    Ok(outputs)
}

#[cfg(test)]
#[path = "outputs_tests.rs"]
mod outputs_tests;
