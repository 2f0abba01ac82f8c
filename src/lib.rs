// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Terry - Terraform Controller for Kubernetes
//!
//! Terry is a Kubernetes controller written in Rust that provisions cloud
//! infrastructure declaratively: a `Configuration` custom resource carries a
//! Terraform configuration (inline HCL or a git remote), and the controller
//! drives the real cloud state to match by running `terraform apply` and
//! `terraform destroy` in disposable batch Jobs.
//!
//! ## Overview
//!
//! For every Configuration the controller materializes the rendered
//! Terraform text into a ConfigMap, the variables and Provider credentials
//! into a Secret, and supervises an executor Job built from both. Drift in
//! either input replaces the Job; a successful apply harvests the Terraform
//! outputs from the state backend into the resource status and an optional
//! connection Secret. Deletion tears everything down in order behind a
//! finalizer.
//!
//! ## Modules
//!
//! - [`crd`] - Custom Resource Definition types
//! - [`reconcilers`] - Reconciliation logic for each resource type
//! - [`configuration`] - Configuration validation and rendering
//! - [`provider`] - Provider credential plumbing
//! - [`backend`] - Terraform state backends
//! - [`terraform`] - Pod-log based Job status probing
//! - [`rbac`] - Executor RBAC installation
//!
//! ## Example
//!
//! ```rust,no_run
//! use terry::crd::{ConfigurationSpec, SecretReference};
//!
//! let spec = ConfigurationSpec {
//!     hcl: Some(r#"resource "random_id" "server" { byte_length = 8 }"#.to_string()),
//!     inline_credentials: true,
//!     write_connection_secret_to_reference: Some(SecretReference {
//!         name: "server-id".to_string(),
//!         namespace: Some("default".to_string()),
//!     }),
//!     ..Default::default()
//! };
//! ```

pub mod backend;
pub mod configuration;
pub mod constants;
pub mod crd;
pub mod labels;
pub mod metrics;
pub mod provider;
pub mod quantity;
pub mod rbac;
pub mod reconcilers;
pub mod terraform;
