// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Input drift detection for Configuration reconciliation.
//!
//! Two independent, purely comparative checks: the rendered Terraform text
//! against the stored ConfigMap, and the desired variable bytes against the
//! stored Secret. Either kind of drift invalidates a running Job and forces
//! a fresh run.

use k8s_openapi::ByteString;
use std::collections::BTreeMap;

use crate::configuration::ConfigurationType;
use crate::constants::{TERRAFORM_BACKEND_CONFIGURATION_NAME, TERRAFORM_HCL_CONFIGURATION_NAME};

/// ConfigMap key the rendered text is stored under for a source kind.
#[must_use]
pub fn configuration_data_key(configuration_type: ConfigurationType) -> &'static str {
    match configuration_type {
        ConfigurationType::Hcl => TERRAFORM_HCL_CONFIGURATION_NAME,
        ConfigurationType::Remote => TERRAFORM_BACKEND_CONFIGURATION_NAME,
    }
}

/// Whether the stored configuration text differs from the rendered text.
///
/// Remote configurations never drift here: the repository HEAD is the
/// source of truth and is re-resolved by the Job itself.
#[must_use]
pub fn configuration_changed(
    configuration_type: ConfigurationType,
    stored: Option<&str>,
    rendered: &str,
) -> bool {
    match configuration_type {
        ConfigurationType::Hcl => stored != Some(rendered),
        ConfigurationType::Remote => false,
    }
}

/// Whether any desired variable key is missing from or differs byte-wise in
/// the stored Secret.
///
/// Extra keys in the Secret do not count as drift.
#[must_use]
pub fn variables_changed(
    desired: &BTreeMap<String, Vec<u8>>,
    stored: &BTreeMap<String, ByteString>,
) -> bool {
    desired
        .iter()
        .any(|(key, value)| stored.get(key).map(|stored| &stored.0) != Some(value))
}

#[cfg(test)]
#[path = "drift_tests.rs"]
mod drift_tests;
