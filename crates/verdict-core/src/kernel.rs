//! The algorithm kernel: pure decision criteria over a validated matrix.
//!
//! Validation lowers the caller's outcome mapping into a dense row-major
//! matrix indexed by position; every criterion then operates on that matrix
//! with deterministic iteration order (states in input order) and produces a
//! total ranking with tolerance-aware lexicographic tie-breaking.
//!
//! The kernel is pure and single-threaded per invocation: no logging, no
//! shared mutable state, no suspension points. Identical inputs, parameters,
//! and seed produce byte-identical results on every machine.

use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;

use crate::error::{detail, EngineError};
use crate::trace::{ParamsSubset, RunContext, TraceBuilder};
use crate::types::{Algorithm, AlgorithmParams, DecisionResult, DecisionSpec, Direction};

/// Absolute tolerance for score comparisons in ranking.
pub const TIE_EPSILON: f64 = 1e-9;

const DEFAULT_TEMPERATURE: f64 = 1.0;
const DEFAULT_OPTIMISM: f64 = 0.5;
const DEFAULT_CONFIDENCE: f64 = 0.5;
const DEFAULT_ITERATIONS: u32 = 1000;
const DEFAULT_EPSILON: f64 = 0.1;

// ---------------------------------------------------------------------------
// Dense matrix
// ---------------------------------------------------------------------------

/// Row-major utility matrix produced by validation.
#[derive(Debug, Clone)]
pub(crate) struct Matrix {
    actions: Vec<String>,
    states: Vec<String>,
    values: Vec<f64>,
}

impl Matrix {
    /// Validate the spec shape and lower the outcome mapping.
    ///
    /// Strict mode rejects missing cells and unknown outcome keys; corrective
    /// mode substitutes `0.0` for missing cells and ignores unknown keys.
    pub(crate) fn build(spec: &DecisionSpec, strict: bool) -> Result<Self, EngineError> {
        if spec.actions.is_empty() {
            return Err(EngineError::invalid_input("no actions provided"));
        }
        if spec.states.is_empty() {
            return Err(EngineError::invalid_input("no states provided"));
        }
        check_identifiers("action", &spec.actions)?;
        check_identifiers("state", &spec.states)?;

        if strict {
            let known_actions: BTreeSet<&String> = spec.actions.iter().collect();
            let known_states: BTreeSet<&String> = spec.states.iter().collect();
            for (action, row) in &spec.outcomes {
                if !known_actions.contains(action) {
                    return Err(EngineError::invalid_input_with(
                        "outcome row for unknown action",
                        detail("action", action.clone()),
                    ));
                }
                for state in row.keys() {
                    if !known_states.contains(state) {
                        return Err(EngineError::invalid_input_with(
                            "outcome entry for unknown state",
                            detail("state", state.clone()),
                        ));
                    }
                }
            }
        }

        let mut values = Vec::with_capacity(spec.actions.len() * spec.states.len());
        for action in &spec.actions {
            let row = spec.outcomes.get(action);
            for state in &spec.states {
                let cell = row.and_then(|row| row.get(state)).copied();
                match cell {
                    Some(utility) if utility.is_finite() => values.push(utility),
                    Some(_) => {
                        let mut details = detail("action", action.clone());
                        details.insert("state".to_owned(), state.clone());
                        return Err(EngineError::invalid_numeric(
                            "utility is NaN or infinite",
                            details,
                        ));
                    }
                    None if strict => {
                        return Err(EngineError::MissingOutcome {
                            action: action.clone(),
                            state: state.clone(),
                        })
                    }
                    None => values.push(0.0),
                }
            }
        }

        Ok(Self {
            actions: spec.actions.clone(),
            states: spec.states.clone(),
            values,
        })
    }

    fn at(&self, action: usize, state: usize) -> f64 {
        self.values[action * self.states.len() + state]
    }

    fn action_count(&self) -> usize {
        self.actions.len()
    }

    fn state_count(&self) -> usize {
        self.states.len()
    }
}

fn check_identifiers(kind: &str, ids: &[String]) -> Result<(), EngineError> {
    let mut seen = BTreeSet::new();
    for id in ids {
        if id.is_empty() {
            return Err(EngineError::invalid_input_with(
                format!("empty {kind} identifier"),
                detail("kind", kind),
            ));
        }
        if !seen.insert(id) {
            return Err(EngineError::invalid_input_with(
                format!("duplicate {kind} identifier"),
                detail(kind, id.clone()),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Parameter resolution
// ---------------------------------------------------------------------------

/// Params with defaults materialized and weights normalized per state index.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedParams {
    algorithm: Algorithm,
    weights: Option<Vec<f64>>,
    weight_map: Option<BTreeMap<String, f64>>,
    temperature: f64,
    optimism: f64,
    confidence: f64,
    iterations: u32,
    epsilon: f64,
    strict: bool,
}

impl ResolvedParams {
    /// The fingerprint-scoped view: only knobs the criterion reads.
    pub(crate) fn subset(&self) -> ParamsSubset {
        let mut subset = ParamsSubset {
            weights: None,
            temperature: None,
            optimism: None,
            confidence: None,
            iterations: None,
            epsilon: None,
            strict: self.strict,
        };
        match self.algorithm {
            Algorithm::WeightedSum | Algorithm::Starr => {
                subset.weights = self.weight_map.clone();
            }
            Algorithm::Softmax => {
                subset.weights = self.weight_map.clone();
                subset.temperature = Some(self.temperature);
            }
            Algorithm::Hurwicz => subset.optimism = Some(self.optimism),
            Algorithm::HodgesLehmann => subset.confidence = Some(self.confidence),
            Algorithm::BrownRobinson => subset.iterations = Some(self.iterations),
            Algorithm::EpsilonContamination => {
                subset.weights = self.weight_map.clone();
                subset.epsilon = Some(self.epsilon);
            }
            _ => {}
        }
        subset
    }
}

fn check_unit_interval(name: &str, value: f64) -> Result<f64, EngineError> {
    if !value.is_finite() {
        return Err(EngineError::invalid_numeric(
            format!("{name} is NaN or infinite"),
            detail("param", name),
        ));
    }
    if !(0.0..=1.0).contains(&value) {
        let mut details = detail("param", name);
        details.insert("value".to_owned(), value.to_string());
        return Err(EngineError::invalid_numeric(
            format!("{name} must lie in [0, 1]"),
            details,
        ));
    }
    Ok(value)
}

fn resolve_weights(
    spec: &DecisionSpec,
    raw: &BTreeMap<String, f64>,
    strict: bool,
) -> Result<(Vec<f64>, BTreeMap<String, f64>), EngineError> {
    let known_states: BTreeSet<&String> = spec.states.iter().collect();
    for (state, weight) in raw {
        if !weight.is_finite() {
            return Err(EngineError::invalid_numeric(
                "weight is NaN or infinite",
                detail("state", state.clone()),
            ));
        }
        if *weight < 0.0 || (strict && *weight > 1.0) {
            let mut details = detail("state", state.clone());
            details.insert("value".to_owned(), weight.to_string());
            return Err(EngineError::invalid_numeric(
                "weight out of range",
                details,
            ));
        }
        if strict && !known_states.contains(state) {
            return Err(EngineError::invalid_params(
                "weight for unknown state",
                detail("state", state.clone()),
            ));
        }
    }
    if strict {
        for state in &spec.states {
            if !raw.contains_key(state) {
                return Err(EngineError::invalid_params(
                    "weight missing for state",
                    detail("state", state.clone()),
                ));
            }
        }
    }

    // Deterministic summation order: states in input order.
    let mut by_index: Vec<f64> = spec
        .states
        .iter()
        .map(|state| raw.get(state).copied().unwrap_or(0.0))
        .collect();
    let sum: f64 = by_index.iter().sum();

    if strict && (sum - 1.0).abs() > TIE_EPSILON {
        return Err(EngineError::invalid_params(
            "weights must sum to 1 in strict mode",
            detail("sum", sum.to_string()),
        ));
    }
    if !strict && sum > 0.0 {
        for weight in &mut by_index {
            *weight /= sum;
        }
    }

    let map: BTreeMap<String, f64> = spec
        .states
        .iter()
        .cloned()
        .zip(by_index.iter().copied())
        .collect();
    Ok((by_index, map))
}

pub(crate) fn resolve_params(
    spec: &DecisionSpec,
    params: &AlgorithmParams,
) -> Result<ResolvedParams, EngineError> {
    let temperature = params.temperature.unwrap_or(DEFAULT_TEMPERATURE);
    if !temperature.is_finite() {
        return Err(EngineError::invalid_numeric(
            "temperature is NaN or infinite",
            detail("param", "temperature"),
        ));
    }
    if temperature <= 0.0 {
        return Err(EngineError::invalid_params(
            "temperature must be positive",
            detail("value", temperature.to_string()),
        ));
    }

    let optimism = check_unit_interval("optimism", params.optimism.unwrap_or(DEFAULT_OPTIMISM))?;
    let confidence =
        check_unit_interval("confidence", params.confidence.unwrap_or(DEFAULT_CONFIDENCE))?;
    let epsilon = check_unit_interval("epsilon", params.epsilon.unwrap_or(DEFAULT_EPSILON))?;

    let iterations = params.iterations.unwrap_or(DEFAULT_ITERATIONS);
    if iterations == 0 {
        return Err(EngineError::invalid_params(
            "iterations must be greater than zero",
            detail("param", "iterations"),
        ));
    }

    let (weights, weight_map) = match &params.weights {
        Some(raw) => {
            let (by_index, map) = resolve_weights(spec, raw, params.strict)?;
            (Some(by_index), Some(map))
        }
        None => {
            if params.algorithm.uses_weights() {
                return Err(EngineError::invalid_params(
                    format!("weights required for {}", params.algorithm.as_str()),
                    detail("algorithm", params.algorithm.as_str()),
                ));
            }
            (None, None)
        }
    };

    if let Some(seed_hex) = &params.seed_hex {
        if hex::decode(seed_hex).is_err() {
            return Err(EngineError::invalid_params(
                "seed_hex is not valid hex",
                detail("param", "seed_hex"),
            ));
        }
    }

    Ok(ResolvedParams {
        algorithm: params.algorithm,
        weights,
        weight_map,
        temperature,
        optimism,
        confidence,
        iterations,
        epsilon,
        strict: params.strict,
    })
}

/// Resolve the fingerprint-scoped parameter view for a spec/params pair.
///
/// Shared by the trace builder and the snapshot integrity check so both
/// normalize weights and materialize defaults identically.
pub(crate) fn resolve_params_subset(
    spec: &DecisionSpec,
    params: &AlgorithmParams,
) -> Result<ParamsSubset, EngineError> {
    Matrix::build(spec, params.strict)?;
    Ok(resolve_params(spec, params)?.subset())
}

// ---------------------------------------------------------------------------
// Ranking helpers
// ---------------------------------------------------------------------------

/// Total order over actions: by score in the criterion's direction, with
/// scores closer than [`TIE_EPSILON`] ordered by action id.
fn rank_actions(actions: &[String], scores: &[f64], direction: Direction) -> Vec<String> {
    let mut order: Vec<usize> = (0..actions.len()).collect();
    order.sort_by(|&a, &b| {
        if (scores[a] - scores[b]).abs() < TIE_EPSILON {
            actions[a].cmp(&actions[b])
        } else {
            match direction {
                Direction::Maximize => scores[b].total_cmp(&scores[a]),
                Direction::Minimize => scores[a].total_cmp(&scores[b]),
            }
        }
    });
    order.into_iter().map(|i| actions[i].clone()).collect()
}

fn score_map(actions: &[String], scores: &[f64]) -> BTreeMap<String, OrderedFloat<f64>> {
    actions
        .iter()
        .cloned()
        .zip(scores.iter().map(|&s| OrderedFloat(s)))
        .collect()
}

/// Index of the extreme accumulator value, exact ties broken by id order.
fn pick_extreme(values: &[f64], ids: &[String], direction: Direction) -> usize {
    let mut best = 0;
    for candidate in 1..values.len() {
        let ordering = match direction {
            Direction::Maximize => values[candidate].total_cmp(&values[best]),
            Direction::Minimize => values[best].total_cmp(&values[candidate]),
        };
        match ordering {
            std::cmp::Ordering::Greater => best = candidate,
            std::cmp::Ordering::Equal if ids[candidate] < ids[best] => best = candidate,
            _ => {}
        }
    }
    best
}

/// Best utility per state across all actions, used by regret criteria.
fn state_maxima(matrix: &Matrix) -> Vec<f64> {
    (0..matrix.state_count())
        .map(|state| {
            (0..matrix.action_count())
                .map(|action| matrix.at(action, state))
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Evaluate a decision spec with the selected criterion.
///
/// Pure: identical `(spec, params, seed)` produce byte-identical results.
/// Every shipped criterion is seed-free; the `seed` argument exists for
/// seedable iterative extensions and may be omitted.
pub fn evaluate(
    spec: &DecisionSpec,
    params: &AlgorithmParams,
    seed: Option<&[u8]>,
) -> Result<DecisionResult, EngineError> {
    evaluate_inner(spec, params, seed, None)
}

/// Evaluate within a run context, allocating a trace identifier.
///
/// The context's counter is what snapshots capture as `id_counter_offset`;
/// replays restore it so trace identifiers reproduce.
pub fn evaluate_with_context(
    spec: &DecisionSpec,
    params: &AlgorithmParams,
    seed: Option<&[u8]>,
    ctx: &mut RunContext,
    run_id: &str,
) -> Result<DecisionResult, EngineError> {
    let trace_id = ctx.next_trace_id(run_id);
    evaluate_inner(spec, params, seed, Some(trace_id))
}

fn evaluate_inner(
    spec: &DecisionSpec,
    params: &AlgorithmParams,
    _seed: Option<&[u8]>,
    trace_id: Option<String>,
) -> Result<DecisionResult, EngineError> {
    let matrix = Matrix::build(spec, params.strict)?;
    let resolved = resolve_params(spec, params)?;

    let mut builder = TraceBuilder::new(params.algorithm, trace_id);
    let ranking = match params.algorithm {
        Algorithm::MinimaxRegret => minimax_regret(&matrix, &mut builder),
        Algorithm::Maximin => maximin(&matrix, &mut builder),
        Algorithm::WeightedSum => weighted_sum(&matrix, &resolved, &mut builder)?,
        Algorithm::Softmax => softmax(&matrix, &resolved, &mut builder)?,
        Algorithm::Hurwicz => hurwicz(&matrix, &resolved, &mut builder),
        Algorithm::Laplace => laplace(&matrix, &mut builder),
        Algorithm::Starr => starr(&matrix, &resolved, &mut builder)?,
        Algorithm::HodgesLehmann => hodges_lehmann(&matrix, &resolved, &mut builder),
        Algorithm::BrownRobinson => brown_robinson(&matrix, resolved.iterations, &mut builder),
        Algorithm::Nash => nash(&matrix, &mut builder),
        Algorithm::Pareto => pareto(&matrix, &mut builder),
        Algorithm::EpsilonContamination => {
            epsilon_contamination(&matrix, &resolved, &mut builder)?
        }
    };

    builder.seal(spec, &resolved.subset(), ranking)
}

// ---------------------------------------------------------------------------
// Criteria
// ---------------------------------------------------------------------------

/// Savage criterion: minimize the maximum regret across states.
fn minimax_regret(matrix: &Matrix, builder: &mut TraceBuilder) -> Vec<String> {
    let best_per_state = state_maxima(matrix);

    let mut regret_table = BTreeMap::new();
    let mut max_regret = Vec::with_capacity(matrix.action_count());
    for (a, action) in matrix.actions.iter().enumerate() {
        let mut row = BTreeMap::new();
        let mut worst = 0.0_f64;
        for (s, state) in matrix.states.iter().enumerate() {
            let regret = best_per_state[s] - matrix.at(a, s);
            row.insert(state.clone(), OrderedFloat(regret));
            worst = worst.max(regret);
        }
        regret_table.insert(action.clone(), row);
        max_regret.push(worst);
    }

    let trace = builder.trace_mut();
    trace.regret_table = Some(regret_table);
    trace.max_regret = Some(score_map(&matrix.actions, &max_regret));
    rank_actions(&matrix.actions, &max_regret, Direction::Minimize)
}

/// Wald criterion: maximize the minimum utility.
fn maximin(matrix: &Matrix, builder: &mut TraceBuilder) -> Vec<String> {
    let scores = min_utilities(matrix);
    builder.trace_mut().min_utility = Some(score_map(&matrix.actions, &scores));
    rank_actions(&matrix.actions, &scores, Direction::Maximize)
}

fn min_utilities(matrix: &Matrix) -> Vec<f64> {
    (0..matrix.action_count())
        .map(|a| {
            (0..matrix.state_count())
                .map(|s| matrix.at(a, s))
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

fn weighted_scores(matrix: &Matrix, weights: &[f64]) -> Vec<f64> {
    (0..matrix.action_count())
        .map(|a| {
            (0..matrix.state_count())
                .map(|s| weights[s] * matrix.at(a, s))
                .sum()
        })
        .collect()
}

fn require_weights<'a>(resolved: &'a ResolvedParams) -> Result<&'a [f64], EngineError> {
    resolved
        .weights
        .as_deref()
        .ok_or_else(|| EngineError::algorithm("weights absent after resolution"))
}

/// Bayesian expected utility under the state weight distribution.
fn weighted_sum(
    matrix: &Matrix,
    resolved: &ResolvedParams,
    builder: &mut TraceBuilder,
) -> Result<Vec<String>, EngineError> {
    let scores = weighted_scores(matrix, require_weights(resolved)?);
    builder.trace_mut().weighted_scores = Some(score_map(&matrix.actions, &scores));
    Ok(rank_actions(&matrix.actions, &scores, Direction::Maximize))
}

/// Softmax over weighted scores: p(a) = exp((σ_w(a) − M) / T) / Z.
fn softmax(
    matrix: &Matrix,
    resolved: &ResolvedParams,
    builder: &mut TraceBuilder,
) -> Result<Vec<String>, EngineError> {
    let base = weighted_scores(matrix, require_weights(resolved)?);
    let max_score = base.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let exps: Vec<f64> = base
        .iter()
        .map(|score| ((score - max_score) / resolved.temperature).exp())
        .collect();
    let partition: f64 = exps.iter().sum();
    let probabilities: Vec<f64> = exps.iter().map(|e| e / partition).collect();

    let trace = builder.trace_mut();
    trace.weighted_scores = Some(score_map(&matrix.actions, &base));
    trace.probabilities = Some(score_map(&matrix.actions, &probabilities));
    Ok(rank_actions(
        &matrix.actions,
        &probabilities,
        Direction::Maximize,
    ))
}

/// Optimism-pessimism index: α·max + (1 − α)·min.
fn hurwicz(matrix: &Matrix, resolved: &ResolvedParams, builder: &mut TraceBuilder) -> Vec<String> {
    let alpha = resolved.optimism;
    let scores: Vec<f64> = (0..matrix.action_count())
        .map(|a| {
            let mut min_val = f64::INFINITY;
            let mut max_val = f64::NEG_INFINITY;
            for s in 0..matrix.state_count() {
                let u = matrix.at(a, s);
                min_val = min_val.min(u);
                max_val = max_val.max(u);
            }
            alpha * max_val + (1.0 - alpha) * min_val
        })
        .collect();
    builder.trace_mut().hurwicz_scores = Some(score_map(&matrix.actions, &scores));
    rank_actions(&matrix.actions, &scores, Direction::Maximize)
}

/// Insufficient reason: mean utility over states.
fn laplace(matrix: &Matrix, builder: &mut TraceBuilder) -> Vec<String> {
    #[allow(clippy::cast_precision_loss)]
    let n = matrix.state_count() as f64;
    let scores: Vec<f64> = (0..matrix.action_count())
        .map(|a| {
            let sum: f64 = (0..matrix.state_count()).map(|s| matrix.at(a, s)).sum();
            sum / n
        })
        .collect();
    builder.trace_mut().laplace_scores = Some(score_map(&matrix.actions, &scores));
    rank_actions(&matrix.actions, &scores, Direction::Maximize)
}

/// Starr criterion: minimize expected regret under the weight distribution.
fn starr(
    matrix: &Matrix,
    resolved: &ResolvedParams,
    builder: &mut TraceBuilder,
) -> Result<Vec<String>, EngineError> {
    let weights = require_weights(resolved)?;
    let best_per_state = state_maxima(matrix);
    let scores: Vec<f64> = (0..matrix.action_count())
        .map(|a| {
            (0..matrix.state_count())
                .map(|s| weights[s] * (best_per_state[s] - matrix.at(a, s)))
                .sum()
        })
        .collect();
    builder.trace_mut().starr_scores = Some(score_map(&matrix.actions, &scores));
    Ok(rank_actions(&matrix.actions, &scores, Direction::Minimize))
}

/// Hodges-Lehmann: α·min + (1 − α)·mean, a pessimism/neutrality compromise.
fn hodges_lehmann(
    matrix: &Matrix,
    resolved: &ResolvedParams,
    builder: &mut TraceBuilder,
) -> Vec<String> {
    let alpha = resolved.confidence;
    #[allow(clippy::cast_precision_loss)]
    let n = matrix.state_count() as f64;
    let scores: Vec<f64> = (0..matrix.action_count())
        .map(|a| {
            let mut min_val = f64::INFINITY;
            let mut sum = 0.0;
            for s in 0..matrix.state_count() {
                let u = matrix.at(a, s);
                min_val = min_val.min(u);
                sum += u;
            }
            alpha * min_val + (1.0 - alpha) * (sum / n)
        })
        .collect();
    builder.trace_mut().hodges_lehmann_scores = Some(score_map(&matrix.actions, &scores));
    rank_actions(&matrix.actions, &scores, Direction::Maximize)
}

/// Brown-Robinson fictitious play against an adversarial nature.
///
/// Accumulators start at zero; each iteration the maximizer takes the action
/// with the greatest accumulated row value and the minimizer the state with
/// the least accumulated column value, exact ties resolved by id order
/// (including the all-zero first iteration). The score is the empirical pick
/// frequency. Deterministic and independent of any RNG.
fn brown_robinson(matrix: &Matrix, iterations: u32, builder: &mut TraceBuilder) -> Vec<String> {
    let rows = matrix.action_count();
    let cols = matrix.state_count();

    let mut counts = vec![0_u64; rows];
    let mut row_accum = vec![0.0_f64; rows];
    let mut col_accum = vec![0.0_f64; cols];

    for _ in 0..iterations {
        let pick_row = pick_extreme(&row_accum, &matrix.actions, Direction::Maximize);
        let pick_col = pick_extreme(&col_accum, &matrix.states, Direction::Minimize);

        counts[pick_row] += 1;
        for (i, accum) in row_accum.iter_mut().enumerate() {
            *accum += matrix.at(i, pick_col);
        }
        for (j, accum) in col_accum.iter_mut().enumerate() {
            *accum += matrix.at(pick_row, j);
        }
    }

    let total = f64::from(iterations);
    #[allow(clippy::cast_precision_loss)]
    let scores: Vec<f64> = counts.iter().map(|&c| c as f64 / total).collect();

    builder.trace_mut().brown_robinson_scores = Some(score_map(&matrix.actions, &scores));
    rank_actions(&matrix.actions, &scores, Direction::Maximize)
}

/// Saddle-point identification: U(a,s) = min over the row = max over the
/// column. Falls back to the maximin ranking when no saddle exists; when one
/// does, its action leads the ranking.
fn nash(matrix: &Matrix, builder: &mut TraceBuilder) -> Vec<String> {
    let row_mins = min_utilities(matrix);
    let col_maxs = state_maxima(matrix);

    let mut equilibria = Vec::new();
    for (a, action) in matrix.actions.iter().enumerate() {
        for (s, state) in matrix.states.iter().enumerate() {
            let value = matrix.at(a, s);
            if value == row_mins[a] && value == col_maxs[s] {
                equilibria.push((action.clone(), state.clone()));
            }
        }
    }
    equilibria.sort();

    let mut ranking = rank_actions(&matrix.actions, &row_mins, Direction::Maximize);
    if let Some((saddle_action, _)) = equilibria.first() {
        ranking.retain(|action| action != saddle_action);
        ranking.insert(0, saddle_action.clone());
    }

    let trace = builder.trace_mut();
    trace.min_utility = Some(score_map(&matrix.actions, &row_mins));
    trace.nash_equilibria = Some(equilibria);
    ranking
}

/// Dominance filtering: frontier actions (lex order) ahead of dominated
/// actions (lex order). An action is dominated only when some other action
/// is strictly better in every state; matching any single state keeps it on
/// the frontier.
fn pareto(matrix: &Matrix, builder: &mut TraceBuilder) -> Vec<String> {
    let mut dominated = BTreeSet::new();
    for (a, action) in matrix.actions.iter().enumerate() {
        for b in 0..matrix.action_count() {
            if a == b {
                continue;
            }
            let strictly_dominates = (0..matrix.state_count())
                .all(|s| matrix.at(b, s) > matrix.at(a, s));
            if strictly_dominates {
                dominated.insert(action.clone());
                break;
            }
        }
    }

    let mut frontier: Vec<String> = matrix
        .actions
        .iter()
        .filter(|action| !dominated.contains(*action))
        .cloned()
        .collect();
    frontier.sort();

    let mut ranking = frontier.clone();
    ranking.extend(dominated.iter().cloned());

    builder.trace_mut().pareto_frontier = Some(frontier);
    ranking
}

/// ε-contamination: (1 − ε)·expected utility + ε·worst case, robust to
/// misspecified priors.
fn epsilon_contamination(
    matrix: &Matrix,
    resolved: &ResolvedParams,
    builder: &mut TraceBuilder,
) -> Result<Vec<String>, EngineError> {
    let weights = require_weights(resolved)?;
    let epsilon = resolved.epsilon;
    let scores: Vec<f64> = (0..matrix.action_count())
        .map(|a| {
            let mut expected = 0.0;
            let mut min_val = f64::INFINITY;
            for s in 0..matrix.state_count() {
                let u = matrix.at(a, s);
                expected += weights[s] * u;
                min_val = min_val.min(u);
            }
            (1.0 - epsilon) * expected + epsilon * min_val
        })
        .collect();
    builder.trace_mut().epsilon_contamination_scores = Some(score_map(&matrix.actions, &scores));
    Ok(rank_actions(&matrix.actions, &scores, Direction::Maximize))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn spec(outcomes: &[(&str, &[(&str, f64)])]) -> DecisionSpec {
        let actions: Vec<String> = outcomes.iter().map(|(a, _)| (*a).to_owned()).collect();
        let mut states: Vec<String> = Vec::new();
        let mut table = BTreeMap::new();
        for (action, row) in outcomes {
            let mut row_map = BTreeMap::new();
            for (state, utility) in *row {
                if !states.contains(&(*state).to_owned()) {
                    states.push((*state).to_owned());
                }
                row_map.insert((*state).to_owned(), *utility);
            }
            table.insert((*action).to_owned(), row_map);
        }
        DecisionSpec {
            actions,
            states,
            outcomes: table,
        }
    }

    fn params(algorithm: Algorithm) -> AlgorithmParams {
        AlgorithmParams::new(algorithm)
    }

    fn params_with_weights(algorithm: Algorithm, weights: &[(&str, f64)]) -> AlgorithmParams {
        let mut p = AlgorithmParams::new(algorithm);
        p.weights = Some(
            weights
                .iter()
                .map(|(s, w)| ((*s).to_owned(), *w))
                .collect(),
        );
        p
    }

    #[test]
    fn minimax_regret_picks_least_worst_regret() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 5.0)]),
            ("a2", &[("s1", 0.0), ("s2", 20.0)]),
        ]);
        let result = evaluate(&spec, &params(Algorithm::MinimaxRegret), None).unwrap();
        let max_regret = result.trace.max_regret.as_ref().unwrap();
        assert_eq!(max_regret["a1"].into_inner(), 15.0);
        assert_eq!(max_regret["a2"].into_inner(), 10.0);
        assert_eq!(result.recommended_action, "a2");
        assert_eq!(result.ranking, vec!["a2", "a1"]);
    }

    #[test]
    fn maximin_picks_best_worst_case() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 0.0)]),
            ("a2", &[("s1", 5.0), ("s2", 5.0)]),
        ]);
        let result = evaluate(&spec, &params(Algorithm::Maximin), None).unwrap();
        assert_eq!(result.recommended_action, "a2");
        assert_eq!(result.ranking, vec!["a2", "a1"]);
    }

    #[test]
    fn tie_break_is_lexicographic() {
        let spec = spec(&[("b", &[("s1", 10.0)]), ("a", &[("s1", 10.0)])]);
        let result = evaluate(&spec, &params(Algorithm::MinimaxRegret), None).unwrap();
        assert_eq!(result.recommended_action, "a");
        assert_eq!(result.ranking, vec!["a", "b"]);
    }

    #[test]
    fn weighted_sum_tie_breaks_lexicographically() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 5.0)]),
            ("a2", &[("s1", 0.0), ("s2", 20.0)]),
        ]);
        let params = params_with_weights(Algorithm::WeightedSum, &[("s1", 0.6), ("s2", 0.4)]);
        let result = evaluate(&spec, &params, None).unwrap();
        let scores = result.trace.weighted_scores.as_ref().unwrap();
        assert!((scores["a1"].into_inner() - 8.0).abs() < 1e-9);
        assert!((scores["a2"].into_inner() - 8.0).abs() < 1e-9);
        assert_eq!(result.recommended_action, "a1");
        assert_eq!(result.ranking, vec!["a1", "a2"]);
    }

    #[test]
    fn weight_scaling_does_not_change_outcome() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 5.0)]),
            ("a2", &[("s1", 2.0), ("s2", 20.0)]),
        ]);
        let base = params_with_weights(Algorithm::WeightedSum, &[("s1", 0.6), ("s2", 0.4)]);
        let scaled = params_with_weights(Algorithm::WeightedSum, &[("s1", 6.0), ("s2", 4.0)]);
        let r1 = evaluate(&spec, &base, None).unwrap();
        let r2 = evaluate(&spec, &scaled, None).unwrap();
        assert_eq!(r1.ranking, r2.ranking);
        assert_eq!(r1.trace.fingerprint, r2.trace.fingerprint);
    }

    #[test]
    fn zero_weight_sum_degrades_to_full_tie() {
        let spec = spec(&[
            ("b", &[("s1", 10.0), ("s2", 5.0)]),
            ("a", &[("s1", 0.0), ("s2", 20.0)]),
        ]);
        let params = params_with_weights(Algorithm::WeightedSum, &[("s1", 0.0), ("s2", 0.0)]);
        let result = evaluate(&spec, &params, None).unwrap();
        assert_eq!(result.ranking, vec!["a", "b"]);
    }

    #[test]
    fn strict_weights_must_sum_to_one() {
        let spec = spec(&[("a1", &[("s1", 1.0), ("s2", 2.0)])]);
        let mut params = params_with_weights(Algorithm::WeightedSum, &[("s1", 0.7), ("s2", 0.4)]);
        params.strict = true;
        let err = evaluate(&spec, &params, None).unwrap_err();
        assert_eq!(err.code(), "invalid_params");
    }

    #[test]
    fn softmax_orders_by_probability() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 5.0)]),
            ("a2", &[("s1", 0.0), ("s2", 1.0)]),
        ]);
        let params = params_with_weights(Algorithm::Softmax, &[("s1", 0.5), ("s2", 0.5)]);
        let result = evaluate(&spec, &params, None).unwrap();
        let probabilities = result.trace.probabilities.as_ref().unwrap();
        let total: f64 = probabilities.values().map(|p| p.into_inner()).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(result.recommended_action, "a1");
    }

    #[test]
    fn softmax_requires_positive_temperature() {
        let spec = spec(&[("a1", &[("s1", 1.0)])]);
        let mut params = params_with_weights(Algorithm::Softmax, &[("s1", 1.0)]);
        params.temperature = Some(0.0);
        let err = evaluate(&spec, &params, None).unwrap_err();
        assert_eq!(err.code(), "invalid_params");
    }

    #[test]
    fn hurwicz_interpolates_optimism() {
        let spec = spec(&[
            ("safe", &[("s1", 5.0), ("s2", 5.0)]),
            ("bold", &[("s1", 0.0), ("s2", 10.0)]),
        ]);
        let mut pessimist = params(Algorithm::Hurwicz);
        pessimist.optimism = Some(0.0);
        let r = evaluate(&spec, &pessimist, None).unwrap();
        assert_eq!(r.recommended_action, "safe");

        let mut optimist = params(Algorithm::Hurwicz);
        optimist.optimism = Some(1.0);
        let r = evaluate(&spec, &optimist, None).unwrap();
        assert_eq!(r.recommended_action, "bold");
    }

    #[test]
    fn optimism_outside_unit_interval_is_invalid_numeric() {
        let spec = spec(&[("a1", &[("s1", 1.0)])]);
        let mut params = params(Algorithm::Hurwicz);
        params.optimism = Some(1.5);
        let err = evaluate(&spec, &params, None).unwrap_err();
        assert_eq!(err.code(), "invalid_numeric");
    }

    #[test]
    fn laplace_averages_over_states() {
        let spec = spec(&[
            ("a1", &[("s1", 0.0), ("s2", 10.0)]),
            ("a2", &[("s1", 6.0), ("s2", 6.0)]),
        ]);
        let result = evaluate(&spec, &params(Algorithm::Laplace), None).unwrap();
        let scores = result.trace.laplace_scores.as_ref().unwrap();
        assert_eq!(scores["a1"].into_inner(), 5.0);
        assert_eq!(scores["a2"].into_inner(), 6.0);
        assert_eq!(result.recommended_action, "a2");
    }

    #[test]
    fn starr_minimizes_expected_regret() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 0.0)]),
            ("a2", &[("s1", 0.0), ("s2", 10.0)]),
        ]);
        let params = params_with_weights(Algorithm::Starr, &[("s1", 0.9), ("s2", 0.1)]);
        let result = evaluate(&spec, &params, None).unwrap();
        // Expected regret: a1 = 0.1 * 10, a2 = 0.9 * 10.
        assert_eq!(result.recommended_action, "a1");
    }

    #[test]
    fn hodges_lehmann_blends_min_and_mean() {
        let spec = spec(&[
            ("a1", &[("s1", 0.0), ("s2", 10.0)]),
            ("a2", &[("s1", 4.0), ("s2", 4.0)]),
        ]);
        let mut cautious = params(Algorithm::HodgesLehmann);
        cautious.confidence = Some(1.0);
        let r = evaluate(&spec, &cautious, None).unwrap();
        assert_eq!(r.recommended_action, "a2");

        let mut neutral = params(Algorithm::HodgesLehmann);
        neutral.confidence = Some(0.0);
        let r = evaluate(&spec, &neutral, None).unwrap();
        assert_eq!(r.recommended_action, "a1");
    }

    #[test]
    fn brown_robinson_finds_the_saddle_column_game() {
        // Dominant row: a2 beats a1 in every state.
        let spec = spec(&[
            ("a1", &[("s1", 1.0), ("s2", 2.0)]),
            ("a2", &[("s1", 3.0), ("s2", 4.0)]),
        ]);
        let mut params = params(Algorithm::BrownRobinson);
        params.iterations = Some(200);
        let result = evaluate(&spec, &params, None).unwrap();
        assert_eq!(result.recommended_action, "a2");
        let scores = result.trace.brown_robinson_scores.as_ref().unwrap();
        assert!(scores["a2"].into_inner() > 0.9);
    }

    #[test]
    fn brown_robinson_is_deterministic() {
        let spec = spec(&[
            ("a1", &[("s1", 3.0), ("s2", 0.0)]),
            ("a2", &[("s1", 0.0), ("s2", 3.0)]),
        ]);
        let mut params = params(Algorithm::BrownRobinson);
        params.iterations = Some(500);
        let r1 = evaluate(&spec, &params, None).unwrap();
        let r2 = evaluate(&spec, &params, None).unwrap();
        assert_eq!(r1, r2);
    }

    #[test]
    fn brown_robinson_ignores_seed_material() {
        let spec = spec(&[
            ("a1", &[("s1", 3.0), ("s2", 0.0)]),
            ("a2", &[("s1", 0.0), ("s2", 3.0)]),
        ]);
        let mut bare = params(Algorithm::BrownRobinson);
        bare.iterations = Some(100);
        let baseline = evaluate(&spec, &bare, None).unwrap();

        let mut seeded = bare.clone();
        seeded.seed_hex = Some("deadbeef".to_owned());
        let with_hex = evaluate(&spec, &seeded, None).unwrap();
        let with_arg = evaluate(&spec, &seeded, Some(b"other-seed")).unwrap();

        // Fictitious play is independent of any RNG: seed material changes
        // neither the ranking nor the fingerprint.
        assert_eq!(with_hex, baseline);
        assert_eq!(with_arg, baseline);
    }

    #[test]
    fn nash_prefers_the_saddle_action() {
        // Saddle at (a2, s1): row min of a2 and column max of s1.
        let spec = spec(&[
            ("a1", &[("s1", 0.0), ("s2", 10.0)]),
            ("a2", &[("s1", 4.0), ("s2", 5.0)]),
        ]);
        let result = evaluate(&spec, &params(Algorithm::Nash), None).unwrap();
        let equilibria = result.trace.nash_equilibria.as_ref().unwrap();
        assert_eq!(equilibria, &vec![("a2".to_owned(), "s1".to_owned())]);
        assert_eq!(result.recommended_action, "a2");
        assert_eq!(result.ranking[0], "a2");
    }

    #[test]
    fn nash_without_saddle_falls_back_to_maximin() {
        // Matching pennies has no pure saddle.
        let spec = spec(&[
            ("a1", &[("s1", 1.0), ("s2", -1.0)]),
            ("a2", &[("s1", -1.0), ("s2", 1.0)]),
        ]);
        let result = evaluate(&spec, &params(Algorithm::Nash), None).unwrap();
        assert!(result.trace.nash_equilibria.as_ref().unwrap().is_empty());
        // Both rows have min -1: full tie, lexicographic order.
        assert_eq!(result.ranking, vec!["a1", "a2"]);
    }

    #[test]
    fn pareto_frontier_leads_the_ranking() {
        let spec = spec(&[
            ("a", &[("s1", 1.0), ("s2", 2.0)]),
            ("b", &[("s1", 2.0), ("s2", 3.0)]),
            ("c", &[("s1", 0.0), ("s2", 3.0)]),
        ]);
        let result = evaluate(&spec, &params(Algorithm::Pareto), None).unwrap();
        assert_eq!(
            result.trace.pareto_frontier.as_ref().unwrap(),
            &vec!["b".to_owned(), "c".to_owned()]
        );
        assert_eq!(result.recommended_action, "b");
        assert_eq!(result.ranking, vec!["b", "c", "a"]);
    }

    #[test]
    fn pareto_dominance_property_holds() {
        let spec = spec(&[
            ("w", &[("s1", 1.0), ("s2", 1.0)]),
            ("x", &[("s1", 2.0), ("s2", 1.0)]),
            ("y", &[("s1", 3.0), ("s2", 2.0)]),
            ("z", &[("s1", 0.0), ("s2", 3.0)]),
        ]);
        let result = evaluate(&spec, &params(Algorithm::Pareto), None).unwrap();
        let frontier = result.trace.pareto_frontier.as_ref().unwrap();
        // y strictly dominates w and x; z matches nothing everywhere.
        assert_eq!(frontier, &vec!["y".to_owned(), "z".to_owned()]);
        assert_eq!(result.recommended_action, "y");
        assert!(result.ranking.ends_with(&["w".to_owned(), "x".to_owned()]));
    }

    #[test]
    fn epsilon_contamination_blends_expectation_and_worst_case() {
        let spec = spec(&[
            ("risky", &[("s1", 100.0), ("s2", -50.0)]),
            ("safe", &[("s1", 10.0), ("s2", 10.0)]),
        ]);
        let mut pure_expectation =
            params_with_weights(Algorithm::EpsilonContamination, &[("s1", 0.9), ("s2", 0.1)]);
        pure_expectation.epsilon = Some(0.0);
        let r = evaluate(&spec, &pure_expectation, None).unwrap();
        assert_eq!(r.recommended_action, "risky");

        let mut pure_robust =
            params_with_weights(Algorithm::EpsilonContamination, &[("s1", 0.9), ("s2", 0.1)]);
        pure_robust.epsilon = Some(1.0);
        let r = evaluate(&spec, &pure_robust, None).unwrap();
        assert_eq!(r.recommended_action, "safe");
    }

    #[test]
    fn ranking_is_always_a_permutation_with_recommended_first() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 5.0)]),
            ("a2", &[("s1", 0.0), ("s2", 20.0)]),
            ("a3", &[("s1", 7.0), ("s2", 7.0)]),
        ]);
        for algorithm in Algorithm::ALL {
            let mut params = AlgorithmParams::new(algorithm);
            if algorithm.uses_weights() {
                params.weights = Some(
                    [("s1".to_owned(), 0.5), ("s2".to_owned(), 0.5)]
                        .into_iter()
                        .collect(),
                );
            }
            let result = evaluate(&spec, &params, None).unwrap();
            assert_eq!(result.recommended_action, result.ranking[0]);
            let mut sorted = result.ranking.clone();
            sorted.sort();
            assert_eq!(sorted, vec!["a1", "a2", "a3"]);
        }
    }

    #[test]
    fn repeated_evaluation_is_byte_equal() {
        let spec = spec(&[
            ("a1", &[("s1", 10.0), ("s2", 5.0)]),
            ("a2", &[("s1", 0.0), ("s2", 20.0)]),
        ]);
        let params = params_with_weights(Algorithm::WeightedSum, &[("s1", 0.6), ("s2", 0.4)]);
        let r1 = evaluate(&spec, &params, None).unwrap();
        let r2 = evaluate(&spec, &params, None).unwrap();
        let b1 = crate::canonical::to_canonical_bytes(&r1).unwrap();
        let b2 = crate::canonical::to_canonical_bytes(&r2).unwrap();
        assert_eq!(b1, b2);
    }

    #[test]
    fn missing_outcome_defaults_to_zero_when_not_strict() {
        let mut spec = spec(&[
            ("a1", &[("s1", 5.0), ("s2", 5.0)]),
            ("a2", &[("s1", 10.0), ("s2", 10.0)]),
        ]);
        spec.outcomes.get_mut("a2").unwrap().remove("s2");
        let result = evaluate(&spec, &params(Algorithm::Maximin), None).unwrap();
        let min_utility = result.trace.min_utility.as_ref().unwrap();
        assert_eq!(min_utility["a2"].into_inner(), 0.0);
        assert_eq!(result.recommended_action, "a1");
    }

    #[test]
    fn missing_outcome_errors_in_strict_mode() {
        let mut spec = spec(&[("a1", &[("s1", 5.0), ("s2", 5.0)])]);
        spec.outcomes.get_mut("a1").unwrap().remove("s2");
        let mut params = params(Algorithm::Maximin);
        params.strict = true;
        let err = evaluate(&spec, &params, None).unwrap_err();
        assert_eq!(err.code(), "missing_outcome");
        assert_eq!(err.details()["state"], "s2");
    }

    #[test]
    fn duplicate_action_is_invalid_input() {
        let mut bad = spec(&[("a1", &[("s1", 1.0)])]);
        bad.actions.push("a1".to_owned());
        let err = evaluate(&bad, &params(Algorithm::Maximin), None).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn nan_utility_is_invalid_numeric() {
        let mut bad = spec(&[("a1", &[("s1", 1.0)])]);
        bad.outcomes
            .get_mut("a1")
            .unwrap()
            .insert("s1".to_owned(), f64::NAN);
        let err = evaluate(&bad, &params(Algorithm::Maximin), None).unwrap_err();
        assert_eq!(err.code(), "invalid_numeric");
    }

    #[test]
    fn unknown_outcome_key_rejected_only_in_strict_mode() {
        let mut spec = spec(&[("a1", &[("s1", 1.0)])]);
        spec.outcomes
            .insert("ghost".to_owned(), BTreeMap::from([("s1".to_owned(), 2.0)]));

        let lenient = evaluate(&spec, &params(Algorithm::Maximin), None);
        assert!(lenient.is_ok());

        let mut strict = params(Algorithm::Maximin);
        strict.strict = true;
        let err = evaluate(&spec, &strict, None).unwrap_err();
        assert_eq!(err.code(), "invalid_input");
    }

    #[test]
    fn trace_id_is_allocated_from_the_context() {
        let spec = spec(&[("a1", &[("s1", 1.0)])]);
        let mut ctx = RunContext::new();
        let r1 =
            evaluate_with_context(&spec, &params(Algorithm::Maximin), None, &mut ctx, "run-7")
                .unwrap();
        let r2 =
            evaluate_with_context(&spec, &params(Algorithm::Maximin), None, &mut ctx, "run-7")
                .unwrap();
        assert_eq!(r1.trace.trace_id.as_deref(), Some("run-7-t0"));
        assert_eq!(r2.trace.trace_id.as_deref(), Some("run-7-t1"));
        // Identifiers never perturb the fingerprint.
        assert_eq!(r1.trace.fingerprint, r2.trace.fingerprint);
    }
}
