//! Trace assembly, fingerprint scope, and run identity.
//!
//! The fingerprint covers, in canonical form:
//! `{algorithm, actions, states, outcomes, params_subset, result_core}`.
//! `params_subset` holds only the parameters that influence the selected
//! criterion, with defaults materialized and weights normalized, so two
//! semantically identical runs fingerprint identically. Wall clock,
//! hostname, and trace identifiers are excluded.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::EngineError;
use crate::hash::{fingerprint, Fingerprint};
use crate::kernel;
use crate::types::{Algorithm, AlgorithmParams, DecisionResult, DecisionSpec, DecisionTrace};

/// Tie rule description recorded in every trace. Informational only.
pub const TIE_BREAK_RULE: &str = "lexicographic_by_action_id";

/// Monotonic run-scoped identity counter.
///
/// Trace identifiers are allocated from here and captured in snapshots as
/// `id_counter_offset`; the replay verifier restores the offset so the
/// re-executed run reproduces the stored identifiers byte for byte.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    next_id: u64,
}

impl RunContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a captured counter offset.
    #[must_use]
    pub fn with_offset(offset: u64) -> Self {
        Self { next_id: offset }
    }

    /// Current counter value, captured into snapshots before evaluation.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.next_id
    }

    /// Allocate the next trace identifier for a run.
    pub fn next_trace_id(&mut self, run_id: &str) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("{run_id}-t{id}")
    }
}

/// Parameters that influence the selected criterion, defaults materialized.
///
/// Serialized into the fingerprint scope; fields irrelevant to the criterion
/// are absent so e.g. an unused temperature cannot perturb the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamsSubset {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimism: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epsilon: Option<f64>,
    pub strict: bool,
}

#[derive(Serialize)]
struct ResultCore<'a> {
    recommended_action: &'a str,
    ranking: &'a [String],
    scores: serde_json::Value,
}

#[derive(Serialize)]
struct FingerprintScope<'a> {
    algorithm: &'static str,
    actions: &'a [String],
    states: &'a [String],
    outcomes: &'a BTreeMap<String, BTreeMap<String, f64>>,
    params_subset: &'a ParamsSubset,
    result_core: ResultCore<'a>,
}

fn scope_hash(
    spec: &DecisionSpec,
    algorithm: Algorithm,
    subset: &ParamsSubset,
    recommended_action: &str,
    ranking: &[String],
    trace: &DecisionTrace,
) -> Result<Fingerprint, EngineError> {
    let scope = FingerprintScope {
        algorithm: algorithm.as_str(),
        actions: &spec.actions,
        states: &spec.states,
        outcomes: &spec.outcomes,
        params_subset: subset,
        result_core: ResultCore {
            recommended_action,
            ranking,
            scores: trace.primary_scores_value(),
        },
    };
    fingerprint(&scope).map_err(EngineError::from)
}

/// Recompute the fingerprint a result should carry for the given inputs.
///
/// The single integrity check used by the snapshot store on load and by the
/// replay verifier; it flows through the same scope construction as sealing,
/// so there is exactly one definition of what the fingerprint covers.
pub fn compute_fingerprint(
    spec: &DecisionSpec,
    params: &AlgorithmParams,
    result: &DecisionResult,
) -> Result<Fingerprint, EngineError> {
    let subset = kernel::resolve_params_subset(spec, params)?;
    scope_hash(
        spec,
        params.algorithm,
        &subset,
        &result.recommended_action,
        &result.ranking,
        &result.trace,
    )
}

/// Accumulates a run's trace, then seals it into an immutable result.
///
/// Sealing consumes the builder; nothing can mutate the trace after the
/// fingerprint is computed.
#[derive(Debug)]
pub(crate) struct TraceBuilder {
    trace: DecisionTrace,
}

impl TraceBuilder {
    pub(crate) fn new(algorithm: Algorithm, trace_id: Option<String>) -> Self {
        Self {
            trace: DecisionTrace {
                algorithm,
                trace_id,
                regret_table: None,
                max_regret: None,
                min_utility: None,
                weighted_scores: None,
                probabilities: None,
                hurwicz_scores: None,
                laplace_scores: None,
                starr_scores: None,
                hodges_lehmann_scores: None,
                brown_robinson_scores: None,
                nash_equilibria: None,
                pareto_frontier: None,
                epsilon_contamination_scores: None,
                tie_break_rule: TIE_BREAK_RULE.to_owned(),
                fingerprint: String::new(),
            },
        }
    }

    pub(crate) fn trace_mut(&mut self) -> &mut DecisionTrace {
        &mut self.trace
    }

    /// Finalize the run: bind the ranking, compute the fingerprint over the
    /// sealed state, and hand ownership of the result to the caller.
    pub(crate) fn seal(
        mut self,
        spec: &DecisionSpec,
        subset: &ParamsSubset,
        ranking: Vec<String>,
    ) -> Result<DecisionResult, EngineError> {
        let recommended_action = ranking
            .first()
            .cloned()
            .ok_or_else(|| EngineError::algorithm("sealed run has an empty ranking"))?;
        let hash = scope_hash(
            spec,
            self.trace.algorithm,
            subset,
            &recommended_action,
            &ranking,
            &self.trace,
        )?;
        self.trace.fingerprint = hash;
        Ok(DecisionResult {
            recommended_action,
            ranking,
            trace: self.trace,
        })
    }
}
