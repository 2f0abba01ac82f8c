// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the constants module.
//!
//! The artifact names, container names, and messages are part of the
//! controller's external contract; these tests pin them down.

#[cfg(test)]
mod tests {
    use crate::constants::*;

    #[test]
    fn test_api_group() {
        assert_eq!(API_GROUP, "terraform.firestoned.io");
    }

    #[test]
    fn test_finalizer_name() {
        assert_eq!(
            CONFIGURATION_FINALIZER,
            "configuration.finalizers.terraform.firestoned.io"
        );
    }

    #[test]
    fn test_derived_artifact_prefixes() {
        assert_eq!(TF_INPUT_CONFIGMAP_PREFIX, "tf");
        assert_eq!(TF_VARIABLE_SECRET_PREFIX, "variable");
    }

    #[test]
    fn test_executor_rbac_names() {
        assert_eq!(CLUSTER_ROLE_NAME, "tf-executor-clusterrole");
        assert_eq!(SERVICE_ACCOUNT_NAME, "tf-executor-service-account");
    }

    #[test]
    fn test_configuration_data_keys() {
        assert_eq!(TERRAFORM_HCL_CONFIGURATION_NAME, "main.tf");
        assert_eq!(TERRAFORM_BACKEND_CONFIGURATION_NAME, "terraform-backend.tf");
    }

    #[test]
    fn test_executor_container_names() {
        assert_eq!(TERRAFORM_CONTAINER_NAME, "terraform-executor");
        assert_eq!(TERRAFORM_INIT_CONTAINER_NAME, "terraform-init");
        assert_eq!(
            PREPARE_INPUT_CONTAINER_NAME,
            "prepare-input-terraform-configurations"
        );
        assert_eq!(GIT_CONTAINER_NAME, "git-configuration");
    }

    #[test]
    fn test_volume_layout() {
        assert_eq!(WORKING_VOLUME_MOUNT_PATH, "/data");
        assert_eq!(INPUT_TF_CONFIGURATION_VOLUME_NAME, "tf-input-configuration");
        assert_eq!(
            INPUT_TF_CONFIGURATION_VOLUME_MOUNT_PATH,
            "/opt/tf-configuration"
        );
        assert_eq!(BACKEND_VOLUME_NAME, "tf-backend");
        assert_eq!(BACKEND_VOLUME_MOUNT_PATH, "/opt/tf-backend");
    }

    #[test]
    fn test_default_images() {
        assert_eq!(DEFAULT_TERRAFORM_IMAGE, "oamdev/docker-terraform:1.1.2");
        assert_eq!(DEFAULT_BUSYBOX_IMAGE, "busybox:latest");
        assert_eq!(DEFAULT_GIT_IMAGE, "alpine/git:latest");
    }

    #[test]
    fn test_requeue_durations() {
        assert_eq!(IN_PROGRESS_REQUEUE_SECS, 3);
        assert_eq!(FAILED_POLL_REQUEUE_SECS, 5);
    }
}
