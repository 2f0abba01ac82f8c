// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Terraform state backends.
//!
//! The executor Job persists Terraform state through the backend configured
//! in the rendered stanza; the controller reads the same state back to
//! harvest outputs, and deletes it during garbage collection. Only the
//! in-cluster Kubernetes backend is implemented: state lives in a Secret
//! named `tfstate-<workspace>-<suffix>`, gzip-compressed under the
//! `tfstate` key.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine;
use flate2::read::GzDecoder;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::io::Read;
use tracing::{debug, info};

use crate::constants::{TERRAFORM_WORKSPACE, TF_STATE_SECRET_KEY};

/// Access to the Terraform state produced by an executor Job.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Fetch the raw Terraform state JSON.
    async fn get_tf_state_json(&self) -> Result<Vec<u8>>;

    /// Remove any state storage the backend created.
    async fn clean_up(&self) -> Result<()>;
}

/// The in-cluster Kubernetes backend.
#[derive(Clone)]
pub struct K8sBackend {
    client: Client,
    namespace: String,
    secret_suffix: String,
}

impl K8sBackend {
    /// Create a backend handle for the given namespace and Secret suffix.
    #[must_use]
    pub fn new(client: Client, namespace: String, secret_suffix: String) -> Self {
        Self {
            client,
            namespace,
            secret_suffix,
        }
    }

    /// Name of the Secret Terraform stores its state in.
    #[must_use]
    pub fn state_secret_name(&self) -> String {
        format!("tfstate-{TERRAFORM_WORKSPACE}-{}", self.secret_suffix)
    }
}

#[async_trait]
impl StateBackend for K8sBackend {
    async fn get_tf_state_json(&self) -> Result<Vec<u8>> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let name = self.state_secret_name();

        debug!(
            namespace = %self.namespace,
            name = %name,
            "Reading Terraform state secret"
        );

        let secret = secrets
            .get(&name)
            .await
            .with_context(|| format!("failed to get state secret {}/{name}", self.namespace))?;

        let raw = secret
            .data
            .as_ref()
            .and_then(|data| data.get(TF_STATE_SECRET_KEY))
            .map(|payload| payload.0.clone())
            .with_context(|| format!("state secret {name} has no '{TF_STATE_SECRET_KEY}' key"))?;

        decode_state(&raw)
    }

    async fn clean_up(&self) -> Result<()> {
        let secrets: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let name = self.state_secret_name();

        if secrets.get_opt(&name).await?.is_some() {
            info!(
                namespace = %self.namespace,
                name = %name,
                "Deleting Terraform state secret"
            );
            secrets
                .delete(&name, &kube::api::DeleteParams::default())
                .await
                .with_context(|| format!("failed to delete state secret {name}"))?;
        }
        Ok(())
    }
}

/// Decode the state payload into plain JSON.
///
/// Terraform stores the state gzip-compressed, sometimes with an extra
/// base64 layer depending on the writer version; plain JSON is accepted too.
fn decode_state(raw: &[u8]) -> Result<Vec<u8>> {
    if raw.starts_with(&[0x1f, 0x8b]) {
        return gunzip(raw);
    }
    if raw.starts_with(b"{") {
        return Ok(raw.to_vec());
    }
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(raw)
        .context("state payload is neither gzip, JSON nor base64")?;
    if decoded.starts_with(&[0x1f, 0x8b]) {
        gunzip(&decoded)
    } else {
        Ok(decoded)
    }
}

fn gunzip(compressed: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut state = Vec::new();
    decoder
        .read_to_end(&mut state)
        .context("failed to decompress Terraform state")?;
    if state.is_empty() {
        bail!("Terraform state is empty");
    }
    Ok(state)
}

#[cfg(test)]
#[path = "backend_tests.rs"]
mod backend_tests;
