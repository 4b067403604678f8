//! Gate evaluation: apply a resolved policy to a decision result.
//!
//! Policies are value objects; rules run in declared order and the first
//! failing rule is terminal. A denial is a result, not an error — the engine
//! reports why and the caller decides what to do with it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use verdict_core::DecisionResult;

/// String markers that `no_secrets` scans for inside result text.
const SECRET_MARKERS: [&str; 5] = [
    "-----BEGIN",
    "PRIVATE KEY",
    "AKIA",
    "Bearer ",
    "password=",
];

/// Terminal outcome of a gate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateAction {
    #[default]
    Allow,
    Deny,
}

/// One rule in a policy, applied in declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum GateRule {
    /// The result's confidence measure must reach `min`.
    MinConfidence { min: f64 },
    /// The recommended action's cost must not exceed `max`.
    CostCeiling { max: f64 },
    /// Dot-separated paths that must exist and be non-null in the
    /// serialized result.
    RequireFields { fields: Vec<String> },
    /// No string value in the serialized result may contain a secret marker.
    NoSecrets,
}

/// A resolved policy: ordered rules plus the action taken when none fails.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GatePolicy {
    #[serde(default)]
    pub rules: Vec<GateRule>,
    #[serde(default)]
    pub default_action: GateAction,
}

/// Outcome with machine-readable reasons for every denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateDecision {
    pub action: GateAction,
    pub reasons: Vec<String>,
}

impl GateDecision {
    #[must_use]
    pub fn allowed(&self) -> bool {
        self.action == GateAction::Allow
    }
}

/// Apply the policy to a result. The result is never mutated.
#[must_use]
pub fn evaluate_gate(policy: &GatePolicy, result: &DecisionResult) -> GateDecision {
    let serialized = serde_json::to_value(result).unwrap_or(Value::Null);
    for rule in &policy.rules {
        if let Some(reason) = check_rule(rule, result, &serialized) {
            return GateDecision {
                action: GateAction::Deny,
                reasons: vec![reason],
            };
        }
    }
    match policy.default_action {
        GateAction::Allow => GateDecision {
            action: GateAction::Allow,
            reasons: Vec::new(),
        },
        GateAction::Deny => GateDecision {
            action: GateAction::Deny,
            reasons: vec!["default action is deny".to_owned()],
        },
    }
}

fn check_rule(rule: &GateRule, result: &DecisionResult, serialized: &Value) -> Option<String> {
    match rule {
        GateRule::MinConfidence { min } => {
            let confidence = result.confidence();
            (confidence < *min)
                .then(|| format!("confidence {confidence} below required minimum {min}"))
        }
        GateRule::CostCeiling { max } => match result.cost() {
            Some(cost) if cost > *max => {
                Some(format!("cost {cost} exceeds ceiling {max}"))
            }
            _ => None,
        },
        GateRule::RequireFields { fields } => fields
            .iter()
            .find(|path| lookup_path(serialized, path.as_str()).is_none())
            .map(|path| format!("required field '{path}' is missing")),
        GateRule::NoSecrets => find_secret(serialized)
            .map(|marker| format!("result contains secret marker '{marker}'")),
    }
}

/// Resolve a dot-separated path; array segments may be numeric indices.
/// Returns `None` for missing or null values.
fn lookup_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn find_secret(value: &Value) -> Option<&'static str> {
    match value {
        Value::String(text) => SECRET_MARKERS
            .iter()
            .find(|marker| text.contains(*marker))
            .copied(),
        Value::Array(items) => items.iter().find_map(find_secret),
        Value::Object(map) => map.values().find_map(find_secret),
        _ => None,
    }
}
