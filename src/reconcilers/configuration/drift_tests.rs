// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for drift detection.

#[cfg(test)]
mod tests {
    use crate::configuration::ConfigurationType;
    use crate::reconcilers::configuration::drift::*;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    #[test]
    fn test_configuration_data_key() {
        assert_eq!(configuration_data_key(ConfigurationType::Hcl), "main.tf");
        assert_eq!(
            configuration_data_key(ConfigurationType::Remote),
            "terraform-backend.tf"
        );
    }

    #[test]
    fn test_hcl_unchanged() {
        assert!(!configuration_changed(
            ConfigurationType::Hcl,
            Some("terraform {}"),
            "terraform {}"
        ));
    }

    #[test]
    fn test_hcl_changed() {
        assert!(configuration_changed(
            ConfigurationType::Hcl,
            Some("terraform {}"),
            "terraform { required_version = \">= 1.0\" }"
        ));
    }

    #[test]
    fn test_hcl_missing_key_counts_as_changed() {
        assert!(configuration_changed(
            ConfigurationType::Hcl,
            None,
            "terraform {}"
        ));
    }

    #[test]
    fn test_remote_never_drifts() {
        assert!(!configuration_changed(
            ConfigurationType::Remote,
            Some("anything"),
            "something else"
        ));
        assert!(!configuration_changed(ConfigurationType::Remote, None, "x"));
    }

    fn stored(entries: &[(&str, &[u8])]) -> BTreeMap<String, ByteString> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), ByteString(value.to_vec())))
            .collect()
    }

    fn desired(entries: &[(&str, &[u8])]) -> BTreeMap<String, Vec<u8>> {
        entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), value.to_vec()))
            .collect()
    }

    #[test]
    fn test_variables_equal() {
        let want = desired(&[("TF_VAR_name", b"poc"), ("AWS_ACCESS_KEY_ID", b"AKIA")]);
        let have = stored(&[("TF_VAR_name", b"poc"), ("AWS_ACCESS_KEY_ID", b"AKIA")]);
        assert!(!variables_changed(&want, &have));
    }

    #[test]
    fn test_variables_value_differs() {
        let want = desired(&[("TF_VAR_name", b"poc-v2")]);
        let have = stored(&[("TF_VAR_name", b"poc")]);
        assert!(variables_changed(&want, &have));
    }

    #[test]
    fn test_variables_missing_key() {
        let want = desired(&[("TF_VAR_name", b"poc"), ("TF_VAR_count", b"3")]);
        let have = stored(&[("TF_VAR_name", b"poc")]);
        assert!(variables_changed(&want, &have));
    }

    #[test]
    fn test_extra_stored_keys_are_not_drift() {
        let want = desired(&[("TF_VAR_name", b"poc")]);
        let have = stored(&[("TF_VAR_name", b"poc"), ("LEFTOVER", b"zzz")]);
        assert!(!variables_changed(&want, &have));
    }

    #[test]
    fn test_empty_desired_never_drifts() {
        let want = desired(&[]);
        let have = stored(&[("ANY", b"thing")]);
        assert!(!variables_changed(&want, &have));
    }
}
