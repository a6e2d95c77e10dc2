//! `{{step_N_result}}` placeholder resolution for step parameters.
//!
//! Only the exact form `{{step_N_result}}` is recognised, and only results of
//! completed steps that come before the step being resolved are visible. A
//! placeholder that cannot be resolved stays in the string as written.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

use waypoint_contracts::plan::Plan;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{step_(\d+)_result\}\}").expect("placeholder pattern is a valid regex")
    })
}

/// Resolve every placeholder in `params` against the completed steps of
/// `plan` with index below `before`.
///
/// A string that consists of a single placeholder is replaced by the stored
/// result value itself, so structured results survive. Placeholders embedded
/// in longer strings are replaced by the result's text: strings verbatim,
/// anything else as compact JSON. Nested arrays and objects are walked.
pub fn resolve_params(params: &Map<String, Value>, plan: &Plan, before: usize) -> Map<String, Value> {
    let lookup = |index: usize| {
        plan.steps
            .get(index)
            .filter(|s| index < before && s.is_completed())
            .and_then(|s| s.result.as_ref())
    };

    params
        .iter()
        .map(|(k, v)| (k.clone(), resolve_value(v, &lookup)))
        .collect()
}

fn resolve_value<'p>(value: &Value, lookup: &dyn Fn(usize) -> Option<&'p Value>) -> Value {
    match value {
        Value::String(s) => resolve_str(s, lookup),
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_value(v, lookup)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v, lookup)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn resolve_str<'p>(s: &str, lookup: &dyn Fn(usize) -> Option<&'p Value>) -> Value {
    let pattern = placeholder();

    if let Some(caps) = pattern.captures(s) {
        let whole = caps.get(0).map(|m| m.as_str().len() == s.len()).unwrap_or(false);
        if whole {
            if let Some(result) = step_index(&caps).and_then(lookup) {
                return result.clone();
            }
            return Value::String(s.to_string());
        }
    }

    let replaced = pattern.replace_all(s, |caps: &Captures<'_>| {
        match step_index(caps).and_then(lookup) {
            Some(result) => value_text(result),
            None => caps[0].to_string(),
        }
    });
    Value::String(replaced.into_owned())
}

fn step_index(caps: &Captures<'_>) -> Option<usize> {
    caps.get(1).and_then(|m| m.as_str().parse().ok())
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
