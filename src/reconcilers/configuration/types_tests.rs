// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the Run Context derivation.

#[cfg(test)]
mod tests {
    use crate::crd::{Configuration, ConfigurationSpec, Reference};
    use crate::reconcilers::configuration::types::{ExecutionType, RunContext};
    use kube::api::ObjectMeta;

    fn configuration(name: &str, namespace: &str, spec: ConfigurationSpec) -> Configuration {
        Configuration {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                uid: Some("0f5bff1a-8f22-4d1d-bb5e-66b0df3a4e0f".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    #[test]
    fn test_execution_type_display() {
        assert_eq!(ExecutionType::Apply.to_string(), "apply");
        assert_eq!(ExecutionType::Destroy.to_string(), "destroy");
    }

    #[test]
    fn test_per_tenant_naming() {
        let meta = RunContext::new(&configuration(
            "poc",
            "tenant-1",
            ConfigurationSpec {
                hcl: Some("terraform {}".to_string()),
                ..Default::default()
            },
        ));

        assert_eq!(meta.name, "poc");
        assert_eq!(meta.namespace, "tenant-1");
        assert_eq!(meta.controller_namespace, "tenant-1");
        assert_eq!(meta.apply_job_name, "poc-apply");
        assert_eq!(meta.destroy_job_name, "poc-destroy");
        assert_eq!(meta.configuration_cm_name, "tf-poc");
        assert_eq!(meta.variable_secret_name, "variable-poc");
        assert!(meta.legacy_sub_resources.is_none());
    }

    #[test]
    fn test_centralized_mode_renames_by_uid() {
        let mut meta = RunContext::new(&configuration(
            "poc",
            "tenant-1",
            ConfigurationSpec {
                hcl: Some("terraform {}".to_string()),
                ..Default::default()
            },
        ));
        meta.apply_centralized_mode("terraform-system", "u-42");

        assert_eq!(meta.apply_job_name, "u-42-apply");
        assert_eq!(meta.destroy_job_name, "u-42-destroy");
        assert_eq!(meta.configuration_cm_name, "tf-u-42");
        assert_eq!(meta.variable_secret_name, "variable-u-42");
        assert_eq!(meta.controller_namespace, "terraform-system");
        // The Configuration's own namespace is untouched; status writes
        // still go there.
        assert_eq!(meta.namespace, "tenant-1");
    }

    #[test]
    fn test_centralized_mode_snapshots_legacy_names() {
        let mut meta = RunContext::new(&configuration(
            "poc",
            "tenant-1",
            ConfigurationSpec {
                hcl: Some("terraform {}".to_string()),
                ..Default::default()
            },
        ));
        meta.apply_centralized_mode("terraform-system", "u-42");

        let legacy = meta.legacy_sub_resources.unwrap();
        assert_eq!(legacy.namespace, "tenant-1");
        assert_eq!(legacy.apply_job_name, "poc-apply");
        assert_eq!(legacy.destroy_job_name, "poc-destroy");
        assert_eq!(legacy.configuration_cm_name, "tf-poc");
        assert_eq!(legacy.variable_secret_name, "variable-poc");
    }

    #[test]
    fn test_delete_resource_defaults_to_true() {
        let meta = RunContext::new(&configuration("poc", "t", ConfigurationSpec::default()));
        assert!(meta.delete_resource);

        let meta = RunContext::new(&configuration(
            "poc",
            "t",
            ConfigurationSpec {
                delete_resource: Some(false),
                ..Default::default()
            },
        ));
        assert!(!meta.delete_resource);
    }

    #[test]
    fn test_remote_path_defaults_to_dot() {
        let meta = RunContext::new(&configuration(
            "poc",
            "t",
            ConfigurationSpec {
                remote: Some("https://gitlab.com/example/modules.git".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(meta.remote_git_path, ".");

        let meta = RunContext::new(&configuration(
            "poc",
            "t",
            ConfigurationSpec {
                remote: Some("https://gitlab.com/example/modules.git".to_string()),
                path: Some("stacks/network".to_string()),
                ..Default::default()
            },
        ));
        assert_eq!(meta.remote_git_path, "stacks/network");
    }

    #[test]
    fn test_provider_reference_skipped_for_inline_credentials() {
        let meta = RunContext::new(&configuration(
            "poc",
            "t",
            ConfigurationSpec {
                inline_credentials: true,
                ..Default::default()
            },
        ));
        assert!(meta.provider_reference.is_none());
    }

    #[test]
    fn test_provider_reference_defaults() {
        let meta = RunContext::new(&configuration("poc", "t", ConfigurationSpec::default()));
        let reference = meta.provider_reference.unwrap();
        assert_eq!(reference.name, "default");
        assert_eq!(reference.namespace.as_deref(), Some("default"));

        let meta = RunContext::new(&configuration(
            "poc",
            "t",
            ConfigurationSpec {
                provider_ref: Some(Reference {
                    name: "aws".to_string(),
                    namespace: Some("infra".to_string()),
                }),
                ..Default::default()
            },
        ));
        let reference = meta.provider_reference.unwrap();
        assert_eq!(reference.name, "aws");
        assert_eq!(reference.namespace.as_deref(), Some("infra"));
    }
}
