//! Structured diff between two canonical JSON forms.
//!
//! Replay reports carry a machine-readable diff rather than interpolated
//! prose: changed paths, numeric deltas beyond the kernel tolerance, and the
//! ranking delta when the two results disagree about order.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use verdict_core::TIE_EPSILON;

/// One numeric disagreement beyond tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericDelta {
    pub path: String,
    pub expected: f64,
    pub actual: f64,
    pub delta: f64,
}

/// Ranking disagreement between the stored and replayed results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingDelta {
    pub expected: Vec<String>,
    pub actual: Vec<String>,
}

/// Structured difference between two canonical forms.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplayDiff {
    /// Paths whose values changed shape, type, or non-numeric content,
    /// including keys present on only one side.
    pub changed_paths: Vec<String>,
    /// Numeric values differing by more than 1e-9.
    pub numeric_deltas: Vec<NumericDelta>,
    /// Present when the two sides rank actions differently.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking_delta: Option<RankingDelta>,
}

impl ReplayDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changed_paths.is_empty()
            && self.numeric_deltas.is_empty()
            && self.ranking_delta.is_none()
    }
}

/// Compare two canonical values and collect every disagreement.
#[must_use]
pub fn diff_values(expected: &Value, actual: &Value) -> ReplayDiff {
    let mut diff = ReplayDiff::default();
    walk("", expected, actual, &mut diff);
    if let (Some(expected_ranking), Some(actual_ranking)) = (
        string_array(expected.get("ranking")),
        string_array(actual.get("ranking")),
    ) {
        if expected_ranking != actual_ranking {
            diff.ranking_delta = Some(RankingDelta {
                expected: expected_ranking,
                actual: actual_ranking,
            });
        }
    }
    diff
}

fn string_array(value: Option<&Value>) -> Option<Vec<String>> {
    value?.as_array().map(|items| {
        items
            .iter()
            .filter_map(|item| item.as_str().map(ToOwned::to_owned))
            .collect()
    })
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{prefix}.{key}")
    }
}

fn walk(path: &str, expected: &Value, actual: &Value, diff: &mut ReplayDiff) {
    match (expected, actual) {
        (Value::Object(lhs), Value::Object(rhs)) => {
            for (key, left) in lhs {
                match rhs.get(key) {
                    Some(right) => walk(&join(path, key), left, right, diff),
                    None => diff.changed_paths.push(join(path, key)),
                }
            }
            for key in rhs.keys() {
                if !lhs.contains_key(key) {
                    diff.changed_paths.push(join(path, key));
                }
            }
        }
        (Value::Array(lhs), Value::Array(rhs)) => {
            if lhs.len() != rhs.len() {
                diff.changed_paths.push(path.to_owned());
                return;
            }
            for (index, (left, right)) in lhs.iter().zip(rhs).enumerate() {
                walk(&format!("{path}[{index}]"), left, right, diff);
            }
        }
        (Value::Number(lhs), Value::Number(rhs)) => {
            let left = lhs.as_f64().unwrap_or(f64::NAN);
            let right = rhs.as_f64().unwrap_or(f64::NAN);
            let delta = right - left;
            if delta.is_nan() || delta.abs() >= TIE_EPSILON {
                diff.numeric_deltas.push(NumericDelta {
                    path: path.to_owned(),
                    expected: left,
                    actual: right,
                    delta,
                });
            }
        }
        (left, right) => {
            if left != right {
                diff.changed_paths.push(path.to_owned());
            }
        }
    }
}
