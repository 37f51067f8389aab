//! Structural comparison of an expected object against what the API server
//! returned.
//!
//! The expected value is a projection built by the resource factories. It
//! only sets the fields the operator cares about, while the observed value
//! additionally carries server-populated defaults (cluster IPs, rollout
//! strategy, termination message paths, ...). A resource is up to date when
//! every field the expected value sets is present and equal in the observed
//! one.

use serde_json::Value;

use crate::quantity;

/// Returns true if `expected` is a deep subset of `observed`.
pub fn is_subset(expected: &Value, observed: &Value) -> bool {
    subset(expected, observed, false)
}

fn subset(expected: &Value, observed: &Value, quantities: bool) -> bool {
    match (expected, observed) {
        (Value::Object(exp), Value::Object(obs)) => exp.iter().all(|(key, exp_val)| {
            let nested_quantities = quantities || key == "requests" || key == "limits";
            match obs.get(key) {
                Some(obs_val) => subset(exp_val, obs_val, nested_quantities),
                None => is_empty(exp_val),
            }
        }),
        (Value::Array(exp), Value::Array(obs)) => {
            exp.len() == obs.len()
                && exp
                    .iter()
                    .zip(obs)
                    .all(|(e, o)| subset(e, o, quantities))
        }
        (Value::String(exp), Value::String(obs)) if quantities => {
            quantity::equivalent(exp, obs)
        }
        (Value::Null, _) => true,
        _ => expected == observed,
    }
}

/// Empty collections and nulls are omitted by the API server on the way back.
fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}
