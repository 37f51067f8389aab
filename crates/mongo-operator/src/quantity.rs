//! Resource quantity parsing ("1Gi", "500m", "0.5").

use std::sync::LazyLock;

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use regex::Regex;

use crate::error::{OperatorError, Result};

static QUANTITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+(?:\.[0-9]+)?)(m|Ki|Mi|Gi|Ti|Pi|Ei|k|K|M|G|T|P|E)?$")
        .expect("quantity pattern is a valid regex")
});

/// Whether `s` is a quantity the operator accepts.
pub fn is_valid(s: &str) -> bool {
    QUANTITY_REGEX.is_match(s.trim())
}

/// Validate `value` and wrap it as a `Quantity`. `field` names the spec field
/// in the error.
pub fn parse(field: &'static str, value: &str) -> Result<Quantity> {
    if !is_valid(value) {
        return Err(OperatorError::InvalidQuantity {
            field,
            value: value.to_string(),
        });
    }
    Ok(Quantity(value.trim().to_string()))
}

/// Value of a quantity in thousandths of its base unit, so that "1", "1000m"
/// and "1k" (in thousandths of one thousand) all compare on one scale.
pub fn millis(s: &str) -> Option<f64> {
    let caps = QUANTITY_REGEX.captures(s.trim())?;
    let number: f64 = caps.get(1)?.as_str().parse().ok()?;
    let scale = match caps.get(2).map(|m| m.as_str()) {
        None => 1e3,
        Some("m") => 1.0,
        Some("k") | Some("K") => 1e6,
        Some("M") => 1e9,
        Some("G") => 1e12,
        Some("T") => 1e15,
        Some("P") => 1e18,
        Some("E") => 1e21,
        Some("Ki") => 1024.0 * 1e3,
        Some("Mi") => 1024f64.powi(2) * 1e3,
        Some("Gi") => 1024f64.powi(3) * 1e3,
        Some("Ti") => 1024f64.powi(4) * 1e3,
        Some("Pi") => 1024f64.powi(5) * 1e3,
        Some("Ei") => 1024f64.powi(6) * 1e3,
        Some(_) => return None,
    };
    Some(number * scale)
}

/// Numeric equality of two quantity strings. Falls back to string equality
/// when either side does not parse.
pub fn equivalent(a: &str, b: &str) -> bool {
    match (millis(a), millis(b)) {
        (Some(x), Some(y)) => (x - y).abs() <= f64::EPSILON * x.abs().max(y.abs()),
        _ => a == b,
    }
}
