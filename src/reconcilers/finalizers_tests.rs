// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `finalizers.rs`

#[cfg(test)]
mod tests {
    use crate::constants::CONFIGURATION_FINALIZER;
    use crate::crd::{Configuration, ConfigurationSpec};
    use kube::api::ObjectMeta;

    fn configuration_with_finalizers(finalizers: Option<Vec<String>>) -> Configuration {
        Configuration {
            metadata: ObjectMeta {
                name: Some("poc".to_string()),
                namespace: Some("tenant-1".to_string()),
                finalizers,
                ..Default::default()
            },
            spec: ConfigurationSpec::default(),
            status: None,
        }
    }

    #[test]
    fn test_finalizer_presence_detection() {
        // The add/remove helpers patch only when the list actually changes;
        // this pins the membership checks they branch on.
        let without = configuration_with_finalizers(None);
        assert!(!without
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.contains(&CONFIGURATION_FINALIZER.to_string())));

        let with =
            configuration_with_finalizers(Some(vec![CONFIGURATION_FINALIZER.to_string()]));
        assert!(with
            .metadata
            .finalizers
            .as_ref()
            .is_some_and(|f| f.contains(&CONFIGURATION_FINALIZER.to_string())));
    }

    #[test]
    fn test_removal_preserves_foreign_finalizers() {
        let mut finalizers = vec![
            "other.io/finalizer".to_string(),
            CONFIGURATION_FINALIZER.to_string(),
        ];
        finalizers.retain(|f| f != CONFIGURATION_FINALIZER);
        assert_eq!(finalizers, vec!["other.io/finalizer".to_string()]);
    }

    #[tokio::test]
    async fn test_ensure_finalizer_idempotent() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: a Configuration that already carries the finalizer
        // When: ensure_finalizer is called again
        // Then: no patch is sent and the call returns Ok(())
    }

    #[tokio::test]
    async fn test_remove_finalizer_absent_is_noop() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: a Configuration without the finalizer
        // When: remove_finalizer is called
        // Then: no patch is sent and the call returns Ok(())
    }
}
