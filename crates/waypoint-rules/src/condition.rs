//! Condition evaluation against a serialized evaluation context.
//!
//! A field path that does not resolve is "undefined": every operator is
//! false against it, `exists` included.

use regex::Regex;
use serde_json::Value;

use waypoint_contracts::{
    error::{WaypointError, WaypointResult},
    rule::{Condition, ConditionOperator, LogicalOperator},
};

/// Resolve a dot-notation path (e.g. `"input.recipient.domain"`) against a
/// JSON value. Numeric segments also index into arrays, so
/// `"prior_results.0.count"` works.
pub fn resolve_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Numbers as-is, numeric strings parsed, booleans as 1/0. Nothing else
/// compares numerically.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Evaluate one condition against `ctx`.
pub fn condition_holds(condition: &Condition, ctx: &Value) -> bool {
    let Some(actual) = resolve_path(ctx, &condition.field) else {
        return false;
    };
    let expected = &condition.value;

    match condition.operator {
        ConditionOperator::Equals => values_equal(actual, expected),
        ConditionOperator::Contains => match (actual, expected) {
            (Value::String(haystack), Value::String(needle)) => haystack.contains(needle.as_str()),
            (Value::Array(items), needle) => items.iter().any(|item| values_equal(item, needle)),
            _ => false,
        },
        ConditionOperator::GreaterThan => compare(actual, expected, |a, b| a > b),
        ConditionOperator::LessThan => compare(actual, expected, |a, b| a < b),
        ConditionOperator::Regex => match (actual, expected) {
            (Value::String(s), Value::String(pattern)) => {
                // Patterns are checked when the rule is written; one that
                // still fails to compile never matches.
                Regex::new(pattern).map(|re| re.is_match(s)).unwrap_or(false)
            }
            _ => false,
        },
        ConditionOperator::Exists => !actual.is_null(),
    }
}

/// JSON equality where numbers compare by value, so `5` equals `5.0`.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn compare(actual: &Value, expected: &Value, op: impl Fn(f64, f64) -> bool) -> bool {
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(b)) => op(a, b),
        _ => false,
    }
}

/// Fold `conditions` left to right. The first condition seeds the result
/// (its logical operator is ignored); every later one joins the running
/// result with its own operator, AND by default. No conditions means the
/// rule always matches.
pub fn conditions_hold(conditions: &[Condition], ctx: &Value) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return true;
    };

    iter.fold(condition_holds(first, ctx), |acc, condition| {
        match condition.logical_operator.unwrap_or_default() {
            LogicalOperator::And => acc && condition_holds(condition, ctx),
            LogicalOperator::Or => acc || condition_holds(condition, ctx),
        }
    })
}

/// Reject conditions that could never be evaluated as written.
pub fn validate_condition(condition: &Condition) -> WaypointResult<()> {
    if condition.field.trim().is_empty() {
        return Err(WaypointError::validation("condition field path must not be empty"));
    }
    if condition.field.split('.').any(str::is_empty) {
        return Err(WaypointError::validation(format!(
            "condition field path '{}' has an empty segment",
            condition.field
        )));
    }

    let op = condition.operator.as_str();
    match condition.operator {
        ConditionOperator::Exists => Ok(()),
        _ if condition.value.is_null() => Err(WaypointError::validation(format!(
            "condition on '{}' uses '{}' but has no value",
            condition.field, op
        ))),
        ConditionOperator::Regex => {
            let Some(pattern) = condition.value.as_str() else {
                return Err(WaypointError::validation(format!(
                    "regex condition on '{}' needs a string pattern",
                    condition.field
                )));
            };
            Regex::new(pattern).map(|_| ()).map_err(|e| {
                WaypointError::validation(format!(
                    "regex condition on '{}' does not compile: {}",
                    condition.field, e
                ))
            })
        }
        ConditionOperator::GreaterThan | ConditionOperator::LessThan => {
            match as_number(&condition.value) {
                Some(_) => Ok(()),
                None => Err(WaypointError::validation(format!(
                    "'{}' condition on '{}' needs a numeric value, got {}",
                    op, condition.field, condition.value
                ))),
            }
        }
        ConditionOperator::Equals | ConditionOperator::Contains => Ok(()),
    }
}
