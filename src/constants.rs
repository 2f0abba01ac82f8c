// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Terry operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// API group for all Terry CRDs
pub const API_GROUP: &str = "terraform.firestoned.io";

/// Kind name for the `Configuration` resource
pub const KIND_CONFIGURATION: &str = "Configuration";

/// Kind name for the `Provider` resource
pub const KIND_PROVIDER: &str = "Provider";

/// Finalizer placed on every live `Configuration`
pub const CONFIGURATION_FINALIZER: &str = "configuration.finalizers.terraform.firestoned.io";

/// Field manager name used for server-side apply
pub const FIELD_MANAGER: &str = "terry-controller";

// ============================================================================
// Derived Artifact Naming
// ============================================================================

/// Prefix of the ConfigMap holding the rendered Terraform configuration (`tf-<key>`)
pub const TF_INPUT_CONFIGMAP_PREFIX: &str = "tf";

/// Prefix of the Secret holding variables and credentials (`variable-<key>`)
pub const TF_VARIABLE_SECRET_PREFIX: &str = "variable";

/// Base name of the ClusterRole granted to executor Jobs; the full name is
/// `<controller namespace>-tf-executor-clusterrole`
pub const CLUSTER_ROLE_NAME: &str = "tf-executor-clusterrole";

/// ServiceAccount the executor Job runs under
pub const SERVICE_ACCOUNT_NAME: &str = "tf-executor-service-account";

/// ConfigMap key holding a Terraform HCL configuration
pub const TERRAFORM_HCL_CONFIGURATION_NAME: &str = "main.tf";

/// ConfigMap key holding only the backend stanza for remote configurations
pub const TERRAFORM_BACKEND_CONFIGURATION_NAME: &str = "terraform-backend.tf";

/// Namespace used when an object reference leaves its namespace empty
pub const DEFAULT_NAMESPACE: &str = "default";

// ============================================================================
// Executor Job Shape
// ============================================================================

/// Mount path of the working volume shared by all containers in the Job pod
pub const WORKING_VOLUME_MOUNT_PATH: &str = "/data";

/// Volume name projecting the input configuration ConfigMap
pub const INPUT_TF_CONFIGURATION_VOLUME_NAME: &str = "tf-input-configuration";

/// Mount path of the input configuration volume
pub const INPUT_TF_CONFIGURATION_VOLUME_MOUNT_PATH: &str = "/opt/tf-configuration";

/// Volume name of the scratch space used by the git clone step
pub const BACKEND_VOLUME_NAME: &str = "tf-backend";

/// Mount path of the scratch volume
pub const BACKEND_VOLUME_MOUNT_PATH: &str = "/opt/tf-backend";

/// Name of the container that runs `terraform apply`/`terraform destroy`
pub const TERRAFORM_CONTAINER_NAME: &str = "terraform-executor";

/// Name of the init container that runs `terraform init`
pub const TERRAFORM_INIT_CONTAINER_NAME: &str = "terraform-init";

/// Name of the init container that stages the rendered configuration
pub const PREPARE_INPUT_CONTAINER_NAME: &str = "prepare-input-terraform-configurations";

/// Name of the init container that clones a remote configuration
pub const GIT_CONTAINER_NAME: &str = "git-configuration";

// ============================================================================
// Images (override with the matching environment variable)
// ============================================================================

/// Default image that can run `terraform init/plan/apply`
pub const DEFAULT_TERRAFORM_IMAGE: &str = "oamdev/docker-terraform:1.1.2";

/// Default image for the configuration staging init container
pub const DEFAULT_BUSYBOX_IMAGE: &str = "busybox:latest";

/// Default image for the git clone init container
pub const DEFAULT_GIT_IMAGE: &str = "alpine/git:latest";

/// Environment variable overriding the Terraform executor image
pub const ENV_TERRAFORM_IMAGE: &str = "TERRAFORM_IMAGE";

/// Environment variable overriding the staging image
pub const ENV_BUSYBOX_IMAGE: &str = "BUSYBOX_IMAGE";

/// Environment variable overriding the git image
pub const ENV_GIT_IMAGE: &str = "GIT_IMAGE";

/// Environment variable carrying the executor CPU limit quantity
pub const ENV_RESOURCES_LIMITS_CPU: &str = "RESOURCES_LIMITS_CPU";

/// Environment variable carrying the executor memory limit quantity
pub const ENV_RESOURCES_LIMITS_MEMORY: &str = "RESOURCES_LIMITS_MEMORY";

/// Environment variable carrying the executor CPU request quantity
pub const ENV_RESOURCES_REQUESTS_CPU: &str = "RESOURCES_REQUESTS_CPU";

/// Environment variable carrying the executor memory request quantity
pub const ENV_RESOURCES_REQUESTS_MEMORY: &str = "RESOURCES_REQUESTS_MEMORY";

/// Environment variable carrying a JSON object used as the Job pod nodeSelector
pub const ENV_JOB_NODE_SELECTOR: &str = "JOB_NODE_SELECTOR";

/// Environment variable marking GitHub as unreachable from the cluster
pub const ENV_GITHUB_BLOCKED: &str = "GITHUB_BLOCKED";

/// Environment variable selecting the single namespace all executor Jobs run in
pub const ENV_CONTROLLER_NAMESPACE: &str = "CONTROLLER_NAMESPACE";

// ============================================================================
// State Backend
// ============================================================================

/// Terraform workspace used by the in-cluster Kubernetes backend
pub const TERRAFORM_WORKSPACE: &str = "default";

/// Key of the state payload inside the backend Secret
pub const TF_STATE_SECRET_KEY: &str = "tfstate";

// ============================================================================
// Requeue Durations
// ============================================================================

/// Requeue while a Job is still running or teardown is incomplete (3 seconds)
pub const IN_PROGRESS_REQUEUE_SECS: u64 = 3;

/// Requeue after an apply Job failure so the recorded status sticks (5 seconds)
pub const FAILED_POLL_REQUEUE_SECS: u64 = 5;

/// Requeue duration applied by the controller error policy (3 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 3;

// ============================================================================
// Leader Election Constants
// ============================================================================

/// Default leader election lease duration (15 seconds)
pub const DEFAULT_LEASE_DURATION_SECS: u64 = 15;

/// Default leader election retry period (2 seconds)
pub const DEFAULT_LEASE_RETRY_PERIOD_SECS: u64 = 2;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for the Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Port for the Prometheus metrics HTTP server
pub const METRICS_SERVER_PORT: u16 = 8080;

/// Path of the Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Bind address of the metrics HTTP server
pub const METRICS_SERVER_BIND_ADDRESS: &str = "0.0.0.0";

// ============================================================================
// Status Messages
// ============================================================================

/// Apply finished and outputs are usable
pub const MSG_CLOUD_RESOURCE_DEPLOYED: &str = "Cloud resources are deployed and ready to use";

/// Apply Job is running
pub const MSG_CLOUD_RESOURCE_PROVISIONING: &str =
    "Cloud resources are being provisioned and provisioning status is checking...";

/// Destroy Job is running
pub const MSG_CLOUD_RESOURCE_DESTROYING: &str = "Cloud resources are being destroyed...";

/// Rendered configuration text no longer matches the stored ConfigMap
pub const MSG_RELOADING_AS_HCL_CHANGED: &str =
    "Configuration HCL has changed, reloading the execution Job";

/// Variable or credential bytes no longer match the stored Secret
pub const MSG_RELOADING_AS_VARIABLE_CHANGED: &str =
    "Configuration variables have changed, reloading the execution Job";

// ============================================================================
// Error Messages
// ============================================================================

/// Referenced Provider object does not exist
pub const ERR_PROVIDER_NOT_FOUND: &str = "provider not found";

/// Referenced Provider exists but has not become ready
pub const ERR_PROVIDER_NOT_READY: &str = "provider is not ready";

/// Credential decoding returned nothing without reporting a cause
pub const ERR_CREDENTIAL_NOT_RETRIEVED: &str =
    "credentials are not retrieved from the referenced Provider";

/// Prefix used when output harvesting fails after a successful apply
pub const ERR_GENERATE_OUTPUTS: &str = "failed to generate outputs";

/// Prefix used when refreshing the apply Job fails
pub const ERR_UPDATE_APPLY_JOB: &str = "failed to update Terraform apply job";

/// Prefix used when refreshing the destroy Job fails
pub const ERR_UPDATE_DESTROY_JOB: &str = "failed to update Terraform destroy job";

#[cfg(test)]
#[path = "constants_tests.rs"]
mod constants_tests;
