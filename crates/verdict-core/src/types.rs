//! Core data model for the decision engine.
//!
//! All types serialize deterministically: mappings are `BTreeMap`s, score
//! values are `OrderedFloat` so they stay totally ordered internally while
//! rendering as plain numbers on the wire.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// Whether a criterion selects by maximizing or minimizing its score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Maximize,
    Minimize,
}

/// The closed set of decision criteria.
///
/// Dispatch is type-level: adding a criterion means adding a variant, not a
/// string lookup in a hot path. `savage` and `wald` are accepted on the wire
/// as aliases for the canonical tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    #[serde(alias = "savage")]
    MinimaxRegret,
    #[serde(alias = "wald")]
    Maximin,
    WeightedSum,
    Softmax,
    Hurwicz,
    Laplace,
    Starr,
    HodgesLehmann,
    BrownRobinson,
    Nash,
    Pareto,
    EpsilonContamination,
}

impl Algorithm {
    /// Canonical wire tag.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MinimaxRegret => "minimax_regret",
            Self::Maximin => "maximin",
            Self::WeightedSum => "weighted_sum",
            Self::Softmax => "softmax",
            Self::Hurwicz => "hurwicz",
            Self::Laplace => "laplace",
            Self::Starr => "starr",
            Self::HodgesLehmann => "hodges_lehmann",
            Self::BrownRobinson => "brown_robinson",
            Self::Nash => "nash",
            Self::Pareto => "pareto",
            Self::EpsilonContamination => "epsilon_contamination",
        }
    }

    /// Selection direction of the primary score.
    #[must_use]
    pub fn direction(self) -> Direction {
        match self {
            Self::MinimaxRegret | Self::Starr => Direction::Minimize,
            _ => Direction::Maximize,
        }
    }

    /// Whether the criterion consumes the state weight distribution.
    #[must_use]
    pub fn uses_weights(self) -> bool {
        matches!(
            self,
            Self::WeightedSum | Self::Softmax | Self::Starr | Self::EpsilonContamination
        )
    }

    /// Every criterion, in declaration order.
    pub const ALL: [Self; 12] = [
        Self::MinimaxRegret,
        Self::Maximin,
        Self::WeightedSum,
        Self::Softmax,
        Self::Hurwicz,
        Self::Laplace,
        Self::Starr,
        Self::HodgesLehmann,
        Self::BrownRobinson,
        Self::Nash,
        Self::Pareto,
        Self::EpsilonContamination,
    ];
}

/// The decision problem: candidate actions, world states, and the utility
/// matrix. Created by the caller, consumed by the kernel, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSpec {
    /// Candidate actions in input order. Identifiers must be distinct and
    /// non-empty; input order fixes the deterministic summation order.
    pub actions: Vec<String>,
    /// World states in input order, same identifier rules.
    pub states: Vec<String>,
    /// `action id -> state id -> finite utility`.
    pub outcomes: BTreeMap<String, BTreeMap<String, f64>>,
}

/// Algorithm selection and configuration.
///
/// The selector and `strict` travel with the params object; snapshots store
/// `spec` and `params` as separate sub-objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmParams {
    pub algorithm: Algorithm,
    /// `state id -> weight in [0, 1]`. Strict mode requires the sum to equal
    /// one within 1e-9; non-strict mode normalizes by the sum unless the sum
    /// is zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<BTreeMap<String, f64>>,
    /// Softmax temperature, > 0. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Hurwicz optimism index in [0, 1]. Defaults to 0.5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimism: Option<f64>,
    /// Hodges-Lehmann confidence in [0, 1]. Defaults to 0.5.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Brown-Robinson iteration count, > 0. Defaults to 1000.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    /// Contamination mass in [0, 1]. Defaults to 0.1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    /// Hex-encoded seed reserved for seedable iterative extensions. It is
    /// validated but no shipped criterion draws from it, and it never
    /// enters the fingerprint scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_hex: Option<String>,
    /// Exact validation instead of corrective validation.
    #[serde(default)]
    pub strict: bool,
}

impl AlgorithmParams {
    /// Params with every knob at its default for the given criterion.
    #[must_use]
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            algorithm,
            weights: None,
            temperature: None,
            optimism: None,
            confidence: None,
            iterations: None,
            epsilon: None,
            seed_hex: None,
            strict: false,
        }
    }
}

/// Per-algorithm score tables kept for reproducibility.
///
/// Exactly one primary table is populated per run (plus the regret table for
/// regret-based criteria and the fallback utilities for `nash`). Fields are
/// omitted from serialization when absent so the snapshot schema stays
/// minimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTrace {
    pub algorithm: Algorithm,
    /// Identifier assigned by the run context. Excluded from the
    /// fingerprint; two replays of the same snapshot reproduce it only
    /// because the id counter is restored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regret_table: Option<BTreeMap<String, BTreeMap<String, OrderedFloat<f64>>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_regret: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_utility: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted_scores: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hurwicz_scores: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub laplace_scores: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starr_scores: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hodges_lehmann_scores: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brown_robinson_scores: Option<BTreeMap<String, OrderedFloat<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nash_equilibria: Option<Vec<(String, String)>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pareto_frontier: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epsilon_contamination_scores: Option<BTreeMap<String, OrderedFloat<f64>>>,
    /// Human-readable description of the tie rule. Not fingerprint-bound.
    pub tie_break_rule: String,
    /// Content hash over the fingerprint scope (see the `trace` module).
    pub fingerprint: String,
}

impl DecisionTrace {
    /// Primary numeric score table for the criterion, when one exists.
    /// `nash` falls back to its maximin utilities; `pareto` has none.
    #[must_use]
    pub fn primary_numeric_scores(&self) -> Option<&BTreeMap<String, OrderedFloat<f64>>> {
        match self.algorithm {
            Algorithm::MinimaxRegret => self.max_regret.as_ref(),
            Algorithm::Maximin => self.min_utility.as_ref(),
            Algorithm::WeightedSum => self.weighted_scores.as_ref(),
            Algorithm::Softmax => self.probabilities.as_ref(),
            Algorithm::Hurwicz => self.hurwicz_scores.as_ref(),
            Algorithm::Laplace => self.laplace_scores.as_ref(),
            Algorithm::Starr => self.starr_scores.as_ref(),
            Algorithm::HodgesLehmann => self.hodges_lehmann_scores.as_ref(),
            Algorithm::BrownRobinson => self.brown_robinson_scores.as_ref(),
            Algorithm::Nash => self.min_utility.as_ref(),
            Algorithm::Pareto => None,
            Algorithm::EpsilonContamination => self.epsilon_contamination_scores.as_ref(),
        }
    }

    /// Algorithm-specific scores as a JSON value for the fingerprint scope.
    /// `nash` contributes its saddle points, `pareto` its frontier.
    #[must_use]
    pub fn primary_scores_value(&self) -> serde_json::Value {
        match self.algorithm {
            Algorithm::Nash => serde_json::to_value(&self.nash_equilibria)
                .unwrap_or(serde_json::Value::Null),
            Algorithm::Pareto => serde_json::to_value(&self.pareto_frontier)
                .unwrap_or(serde_json::Value::Null),
            _ => serde_json::to_value(self.primary_numeric_scores())
                .unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Output of one kernel invocation. Owned by the caller after return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    /// Always equal to `ranking[0]`.
    pub recommended_action: String,
    /// A permutation of the spec's actions, best first.
    pub ranking: Vec<String>,
    pub trace: DecisionTrace,
}

impl DecisionResult {
    /// Confidence measure consumed by gate policies.
    ///
    /// Softmax runs report the recommended action's probability; other
    /// scored criteria report the margin between the top two scores (1.0
    /// for a single action); `pareto` reports the reciprocal frontier size.
    #[must_use]
    pub fn confidence(&self) -> f64 {
        if self.trace.algorithm == Algorithm::Pareto {
            return self
                .trace
                .pareto_frontier
                .as_ref()
                .map_or(0.0, |frontier| {
                    if frontier.is_empty() {
                        0.0
                    } else {
                        #[allow(clippy::cast_precision_loss)]
                        let size = frontier.len() as f64;
                        1.0 / size
                    }
                });
        }
        let Some(scores) = self.trace.primary_numeric_scores() else {
            return 0.0;
        };
        if self.trace.algorithm == Algorithm::Softmax {
            return scores
                .get(&self.recommended_action)
                .map_or(0.0, |p| p.into_inner());
        }
        if self.ranking.len() < 2 {
            return 1.0;
        }
        let top = scores.get(&self.ranking[0]).map_or(0.0, |s| s.into_inner());
        let runner_up = scores.get(&self.ranking[1]).map_or(0.0, |s| s.into_inner());
        (top - runner_up).abs()
    }

    /// Cost measure consumed by gate policies: the recommended action's
    /// primary score for minimizing criteria (regret-like scores are costs),
    /// its negation for maximizing ones. `None` when the criterion has no
    /// numeric score.
    #[must_use]
    pub fn cost(&self) -> Option<f64> {
        let scores = self.trace.primary_numeric_scores()?;
        let score = scores.get(&self.recommended_action)?.into_inner();
        Some(match self.trace.algorithm.direction() {
            Direction::Minimize => score,
            Direction::Maximize => -score,
        })
    }
}
