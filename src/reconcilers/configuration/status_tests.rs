// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the status writers.
//!
//! These tests document expected behavior; the writers are thin wrappers
//! around the status subresource API.

#[cfg(test)]
mod tests {
    #[tokio::test]
    async fn test_update_apply_status_available_harvests_outputs() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: a Configuration and a backend with state outputs {a: "1"}
        // When: update_apply_status is called with state Available
        // Then: status.apply.state == Available
        //       AND status.apply.outputs == {a: {value: "1"}}
        //       AND status.observedGeneration == metadata.generation
    }

    #[tokio::test]
    async fn test_update_apply_status_degrades_on_harvest_failure() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: the backend read fails (state secret missing)
        // When: update_apply_status is called with state Available
        // Then: status.apply.state == GeneratingOutputs
        //       AND status.apply.message starts with
        //       "failed to generate outputs: "
        //       AND the reconcile itself does not fail
    }

    #[tokio::test]
    async fn test_update_apply_status_gone_configuration_is_success() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: the Configuration was deleted between fetch and write
        // When: update_apply_status is called
        // Then: returns Ok(()) without creating anything
    }

    #[tokio::test]
    async fn test_update_destroy_status_only_touches_destroy_half() {
        // This test requires a Kubernetes API; the expected behavior:
        //
        // Given: a Configuration with status.apply set
        // When: update_destroy_status(ConfigurationDestroying, ...) is called
        // Then: status.destroy is replaced
        //       AND status.apply is left untouched
    }
}
