// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants used across all reconcilers.
//!
//! This module defines the ownership labels stamped on connection Secrets so
//! that one Configuration can never clobber outputs written by another.

/// Label marking a Secret as created by this controller
pub const LABEL_CREATED_BY: &str = "terraform.firestoned.io/created-by";

/// Value of [`LABEL_CREATED_BY`] on Secrets written by Terry
pub const CREATED_BY_TERRY: &str = "terry";

/// Label naming the Configuration that owns a connection Secret
pub const LABEL_OWNED_BY: &str = "terraform.firestoned.io/owned-by";

/// Label naming the namespace of the owning Configuration
pub const LABEL_OWNED_NAMESPACE: &str = "terraform.firestoned.io/owned-namespace";
