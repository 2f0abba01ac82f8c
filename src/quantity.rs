// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation for Kubernetes resource quantity strings.
//!
//! `k8s_openapi` models quantities as opaque strings, so the executor
//! resource settings taken from the environment are validated here before
//! they are placed into a Job spec. The grammar accepted is the usual
//! quantity form: a decimal number with an optional binary (`Ki`..`Ei`),
//! decimal (`k`..`E`) or milli (`m`) suffix, e.g. `250m`, `1.5Gi`, `2`.

use anyhow::{bail, Result};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

const BINARY_SUFFIXES: [&str; 6] = ["Ki", "Mi", "Gi", "Ti", "Pi", "Ei"];
const DECIMAL_SUFFIXES: [&str; 7] = ["m", "k", "M", "G", "T", "P", "E"];

/// Parse a resource quantity string into a [`Quantity`].
///
/// # Examples
///
/// ```
/// use terry::quantity::parse_quantity;
///
/// assert!(parse_quantity("250m").is_ok());
/// assert!(parse_quantity("1.5Gi").is_ok());
/// assert!(parse_quantity("2").is_ok());
/// assert!(parse_quantity("lots").is_err());
/// ```
///
/// # Errors
///
/// Returns an error when the string is empty, carries an unknown suffix, or
/// the numeric part is not a non-negative decimal number.
pub fn parse_quantity(quantity_str: &str) -> Result<Quantity> {
    if quantity_str.is_empty() {
        bail!("quantity string cannot be empty");
    }

    let number = strip_suffix(quantity_str);
    if number.is_empty() {
        bail!("quantity '{quantity_str}' has no numeric part");
    }

    let value: f64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("quantity '{quantity_str}' is not a valid number"))?;
    if value < 0.0 {
        bail!("quantity '{quantity_str}' must not be negative");
    }

    Ok(Quantity(quantity_str.to_string()))
}

/// Strip a recognized unit suffix, returning the numeric part.
///
/// Unknown suffixes are left attached so the numeric parse rejects them.
fn strip_suffix(quantity_str: &str) -> &str {
    for suffix in BINARY_SUFFIXES {
        if let Some(number) = quantity_str.strip_suffix(suffix) {
            return number;
        }
    }
    for suffix in DECIMAL_SUFFIXES {
        if let Some(number) = quantity_str.strip_suffix(suffix) {
            return number;
        }
    }
    quantity_str
}

#[cfg(test)]
#[path = "quantity_tests.rs"]
mod quantity_tests;
