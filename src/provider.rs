// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider credential plumbing.
//!
//! A `Provider` names a credentials Secret and a default region. This
//! module resolves the Provider referenced by a Configuration, picks the
//! effective region, and decodes the credential payload into the
//! environment map the executor Job authenticates with. Each cloud has its
//! own payload schema and environment variable names.

use anyhow::{bail, Context, Result};
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use crate::constants::{DEFAULT_NAMESPACE, ERR_CREDENTIAL_NOT_RETRIEVED};
use crate::crd::{Configuration, Provider};

/// Fetch a Provider, mapping absence to `None`.
///
/// # Errors
///
/// Returns an error only for API failures other than NotFound.
pub async fn get_provider_from_configuration(
    client: &Client,
    namespace: &str,
    name: &str,
) -> Result<Option<Provider>> {
    let providers: Api<Provider> = Api::namespaced(client.clone(), namespace);
    providers
        .get_opt(name)
        .await
        .with_context(|| format!("failed to get provider {namespace}/{name}"))
}

/// Resolve the effective region: the Configuration override wins, then the
/// Provider default.
///
/// # Errors
///
/// Returns an error when neither carries a region.
pub fn set_region(configuration: &Configuration, provider: &Provider) -> Result<String> {
    if let Some(region) = configuration
        .spec
        .region
        .as_deref()
        .filter(|region| !region.is_empty())
    {
        return Ok(region.to_string());
    }
    if let Some(region) = provider
        .spec
        .region
        .as_deref()
        .filter(|region| !region.is_empty())
    {
        return Ok(region.to_string());
    }
    bail!("no region is set in either the Configuration or the Provider")
}

/// AWS credential payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AwsCredentials {
    #[serde(rename = "awsAccessKeyID")]
    aws_access_key_id: String,
    aws_secret_access_key: String,
    #[serde(default)]
    aws_session_token: String,
}

/// Alibaba Cloud credential payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlibabaCredentials {
    #[serde(rename = "accessKeyID")]
    access_key_id: String,
    access_key_secret: String,
    #[serde(default)]
    security_token: String,
}

/// GCP credential payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GcpCredentials {
    #[serde(rename = "gcpCredentialsJSON")]
    gcp_credentials_json: String,
    gcp_project: String,
}

/// Azure credential payload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AzureCredentials {
    #[serde(rename = "armClientID")]
    arm_client_id: String,
    arm_client_secret: String,
    #[serde(rename = "armSubscriptionID")]
    arm_subscription_id: String,
    #[serde(rename = "armTenantID")]
    arm_tenant_id: String,
}

/// Decode the Provider credentials Secret into executor environment
/// variables.
///
/// # Errors
///
/// Returns an error when the Secret or its key is missing, the payload does
/// not parse for the declared provider kind, or the kind is unknown.
pub async fn get_provider_credentials(
    client: &Client,
    provider: &Provider,
    region: &str,
) -> Result<Option<BTreeMap<String, String>>> {
    let Some(secret_ref) = provider.spec.credentials.secret_ref.as_ref() else {
        bail!("provider credentials secretRef is not set");
    };
    let namespace = secret_ref.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);

    let secrets: Api<Secret> = Api::namespaced(client.clone(), namespace);
    let secret = secrets.get(&secret_ref.name).await.with_context(|| {
        format!(
            "failed to get credentials secret {namespace}/{}",
            secret_ref.name
        )
    })?;

    let payload = secret
        .data
        .as_ref()
        .and_then(|data| data.get(&secret_ref.key))
        .map(|payload| payload.0.clone())
        .with_context(|| {
            format!(
                "credentials secret {namespace}/{} has no key '{}'",
                secret_ref.name, secret_ref.key
            )
        })?;

    debug!(
        provider = %provider.spec.provider,
        secret = %secret_ref.name,
        "Decoding provider credentials"
    );

    let credentials = decode_credentials(
        &provider.spec.provider,
        &payload,
        secret.data.as_ref(),
        region,
    )?;
    if credentials.is_empty() {
        bail!(ERR_CREDENTIAL_NOT_RETRIEVED);
    }
    Ok(Some(credentials))
}

/// Map a credential payload to environment variables for one provider kind.
fn decode_credentials(
    kind: &str,
    payload: &[u8],
    all_data: Option<&BTreeMap<String, k8s_openapi::ByteString>>,
    region: &str,
) -> Result<BTreeMap<String, String>> {
    let mut credentials = BTreeMap::new();
    match kind {
        "aws" => {
            let aws: AwsCredentials =
                serde_yaml::from_slice(payload).context("failed to parse AWS credentials")?;
            credentials.insert("AWS_ACCESS_KEY_ID".to_string(), aws.aws_access_key_id);
            credentials.insert(
                "AWS_SECRET_ACCESS_KEY".to_string(),
                aws.aws_secret_access_key,
            );
            if !aws.aws_session_token.is_empty() {
                credentials.insert("AWS_SESSION_TOKEN".to_string(), aws.aws_session_token);
            }
            credentials.insert("AWS_DEFAULT_REGION".to_string(), region.to_string());
        }
        "alibaba" => {
            let alibaba: AlibabaCredentials =
                serde_yaml::from_slice(payload).context("failed to parse Alibaba credentials")?;
            credentials.insert("ALICLOUD_ACCESS_KEY".to_string(), alibaba.access_key_id);
            credentials.insert("ALICLOUD_SECRET_KEY".to_string(), alibaba.access_key_secret);
            if !alibaba.security_token.is_empty() {
                credentials.insert("ALICLOUD_SECURITY_TOKEN".to_string(), alibaba.security_token);
            }
            credentials.insert("ALICLOUD_REGION".to_string(), region.to_string());
        }
        "gcp" => {
            let gcp: GcpCredentials =
                serde_yaml::from_slice(payload).context("failed to parse GCP credentials")?;
            credentials.insert("GOOGLE_CREDENTIALS".to_string(), gcp.gcp_credentials_json);
            credentials.insert("GOOGLE_PROJECT".to_string(), gcp.gcp_project);
            credentials.insert("GOOGLE_REGION".to_string(), region.to_string());
        }
        "azure" => {
            let azure: AzureCredentials =
                serde_yaml::from_slice(payload).context("failed to parse Azure credentials")?;
            credentials.insert("ARM_CLIENT_ID".to_string(), azure.arm_client_id);
            credentials.insert("ARM_CLIENT_SECRET".to_string(), azure.arm_client_secret);
            credentials.insert("ARM_SUBSCRIPTION_ID".to_string(), azure.arm_subscription_id);
            credentials.insert("ARM_TENANT_ID".to_string(), azure.arm_tenant_id);
        }
        "custom" => {
            // Every key of the secret is passed through verbatim.
            if let Some(data) = all_data {
                for (key, value) in data {
                    credentials.insert(
                        key.clone(),
                        String::from_utf8_lossy(&value.0).into_owned(),
                    );
                }
            }
        }
        other => bail!("unsupported provider kind '{other}'"),
    }
    Ok(credentials)
}

/// Validate that a Provider's credentials are resolvable and decodable.
///
/// Used by the Provider reconciler to flip the readiness state.
///
/// # Errors
///
/// Returns an error when the Secret is missing or the payload does not
/// decode.
pub async fn validate_provider_credentials(client: &Client, provider: &Provider) -> Result<()> {
    let region = provider.spec.region.clone().unwrap_or_default();
    get_provider_credentials(client, provider, &region)
        .await
        .map(|_| ())
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
