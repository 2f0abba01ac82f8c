// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for Configuration validation and rendering helpers.

#[cfg(test)]
mod tests {
    use crate::configuration::*;
    use crate::crd::{Configuration, ConfigurationSpec, Reference};
    use kube::api::ObjectMeta;

    fn configuration_with(spec: ConfigurationSpec) -> Configuration {
        Configuration {
            metadata: ObjectMeta {
                name: Some("example".to_string()),
                namespace: Some("default".to_string()),
                ..Default::default()
            },
            spec,
            status: None,
        }
    }

    // ========================================================================
    // Static validation
    // ========================================================================

    #[test]
    fn test_valid_configuration_object_hcl() {
        let configuration = configuration_with(ConfigurationSpec {
            hcl: Some("terraform {}".to_string()),
            ..Default::default()
        });
        assert_eq!(
            valid_configuration_object(&configuration).unwrap(),
            ConfigurationType::Hcl
        );
    }

    #[test]
    fn test_valid_configuration_object_remote() {
        let configuration = configuration_with(ConfigurationSpec {
            remote: Some("https://github.com/example/modules.git".to_string()),
            ..Default::default()
        });
        assert_eq!(
            valid_configuration_object(&configuration).unwrap(),
            ConfigurationType::Remote
        );
    }

    #[test]
    fn test_valid_configuration_object_rejects_both() {
        let configuration = configuration_with(ConfigurationSpec {
            hcl: Some("terraform {}".to_string()),
            remote: Some("https://github.com/example/modules.git".to_string()),
            ..Default::default()
        });
        let error = valid_configuration_object(&configuration).unwrap_err();
        assert!(error.to_string().contains("at the same time"));
    }

    #[test]
    fn test_valid_configuration_object_rejects_neither() {
        let configuration = configuration_with(ConfigurationSpec::default());
        let error = valid_configuration_object(&configuration).unwrap_err();
        assert!(error.to_string().contains("should be set"));
    }

    #[test]
    fn test_valid_configuration_object_empty_strings_count_as_unset() {
        let configuration = configuration_with(ConfigurationSpec {
            hcl: Some(String::new()),
            remote: Some(String::new()),
            ..Default::default()
        });
        assert!(valid_configuration_object(&configuration).is_err());
    }

    // ========================================================================
    // Provider reference resolution
    // ========================================================================

    #[test]
    fn test_get_provider_namespaced_name_defaults() {
        let configuration = configuration_with(ConfigurationSpec::default());
        let reference = get_provider_namespaced_name(&configuration);
        assert_eq!(reference.name, "default");
        assert_eq!(reference.namespace.as_deref(), Some("default"));
    }

    #[test]
    fn test_get_provider_namespaced_name_explicit() {
        let configuration = configuration_with(ConfigurationSpec {
            provider_ref: Some(Reference {
                name: "aws".to_string(),
                namespace: Some("infra".to_string()),
            }),
            ..Default::default()
        });
        let reference = get_provider_namespaced_name(&configuration);
        assert_eq!(reference.name, "aws");
        assert_eq!(reference.namespace.as_deref(), Some("infra"));
    }

    #[test]
    fn test_get_provider_namespaced_name_defaults_namespace_only() {
        let configuration = configuration_with(ConfigurationSpec {
            provider_ref: Some(Reference {
                name: "aws".to_string(),
                namespace: None,
            }),
            ..Default::default()
        });
        let reference = get_provider_namespaced_name(&configuration);
        assert_eq!(reference.name, "aws");
        assert_eq!(reference.namespace.as_deref(), Some("default"));
    }

    // ========================================================================
    // GitHub mirror rewrite
    // ========================================================================

    #[test]
    fn test_replace_terraform_source_not_blocked() {
        let remote = replace_terraform_source(
            Some("https://github.com/example/modules.git"),
            "false",
        );
        assert_eq!(remote, "https://github.com/example/modules.git");
    }

    #[test]
    fn test_replace_terraform_source_blocked_rewrites_host() {
        let remote = replace_terraform_source(
            Some("https://github.com/example/modules.git"),
            "true",
        );
        assert_eq!(remote, "https://gitee.com/example/modules.git");
    }

    #[test]
    fn test_replace_terraform_source_blocked_leaves_other_hosts() {
        let remote = replace_terraform_source(
            Some("https://gitlab.com/example/modules.git"),
            "true",
        );
        assert_eq!(remote, "https://gitlab.com/example/modules.git");
    }

    #[test]
    fn test_replace_terraform_source_empty() {
        assert_eq!(replace_terraform_source(None, "true"), "");
        assert_eq!(replace_terraform_source(Some(""), "false"), "");
    }

    // ========================================================================
    // Scalar stringification
    // ========================================================================

    #[test]
    fn test_scalar_to_string_string() {
        assert_eq!(
            scalar_to_string(&serde_json::json!("hello")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_scalar_to_string_number() {
        assert_eq!(scalar_to_string(&serde_json::json!(42)).unwrap(), "42");
        assert_eq!(scalar_to_string(&serde_json::json!(1.5)).unwrap(), "1.5");
    }

    #[test]
    fn test_scalar_to_string_bool() {
        assert_eq!(scalar_to_string(&serde_json::json!(true)).unwrap(), "true");
    }

    #[test]
    fn test_scalar_to_string_rejects_compound_values() {
        assert!(scalar_to_string(&serde_json::json!([1, 2])).is_err());
        assert!(scalar_to_string(&serde_json::json!({"a": 1})).is_err());
        assert!(scalar_to_string(&serde_json::Value::Null).is_err());
    }

    // ========================================================================
    // Deletability (API-bound; expected behavior documented)
    // ========================================================================

    #[tokio::test]
    async fn test_is_deletable_never_applied() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: a Configuration with inline credentials and no apply status
        // When: is_deletable is called
        // Then: returns Ok(true) - nothing was provisioned, no destroy Job
    }

    #[tokio::test]
    async fn test_is_deletable_available_configuration() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: a Configuration with apply state Available
        // When: is_deletable is called
        // Then: returns Ok(false) - cloud resources exist, destroy must run
    }

    #[tokio::test]
    async fn test_is_deletable_missing_provider() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: a Configuration referencing a Provider that does not exist
        // When: is_deletable is called
        // Then: returns Ok(true) - the destroy Job could not authenticate
    }
}
