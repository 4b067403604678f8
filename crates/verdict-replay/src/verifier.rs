//! Replay verification.
//!
//! Re-executes a stored snapshot and classifies the outcome:
//!
//! - **PASS** — fingerprint matches and the recommendation and ranking are
//!   identical.
//! - **DRIFT** — fingerprint matches but a non-fingerprint-bound field
//!   differs (trace identifiers, human-readable text). Reported with a
//!   diff; not a failure unless policy says so.
//! - **MISMATCH** — fingerprint differs; the canonical forms are diffed.
//! - **DEGRADED** — replay could not be attempted (missing snapshot,
//!   incompatible engine or contract version, unreadable spec).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use verdict_core::{
    compute_fingerprint, contract_compatible, evaluate_with_context, replay_compatible,
    to_canonical_bytes, DecisionResult, RunContext, CONTRACT_VERSION, ENGINE_VERSION,
};

use crate::diff::{diff_values, RankingDelta, ReplayDiff};
use crate::snapshot::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
use crate::store::{SnapshotStore, StoreError};

/// Terminal classification of one replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplayVerdict {
    Pass,
    Drift,
    Mismatch,
    Degraded,
}

/// Outcome of a replay, with enough structure for audit tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayReport {
    pub run_id: String,
    pub verdict: ReplayVerdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replayed_fingerprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<ReplayDiff>,
    /// Set for DEGRADED outcomes: why replay never ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ReplayReport {
    fn degraded(run_id: &str, reason: impl Into<String>) -> Self {
        Self {
            run_id: run_id.to_owned(),
            verdict: ReplayVerdict::Degraded,
            expected_fingerprint: None,
            replayed_fingerprint: None,
            diff: None,
            reason: Some(reason.into()),
        }
    }

    /// Lift the classification into the error taxonomy: MISMATCH becomes
    /// `DeterminismMismatch`, DEGRADED becomes `Degraded`, PASS and DRIFT
    /// stay results.
    pub fn into_result(self) -> Result<Self, ReplayError> {
        match self.verdict {
            ReplayVerdict::Pass | ReplayVerdict::Drift => Ok(self),
            ReplayVerdict::Mismatch => Err(ReplayError::DeterminismMismatch {
                report: Box::new(self),
            }),
            ReplayVerdict::Degraded => Err(ReplayError::Degraded {
                report: Box::new(self),
            }),
        }
    }
}

/// Replay failures as errors, for callers that treat MISMATCH/DEGRADED as
/// terminal rather than as report rows.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("replay of run '{}' diverged from the stored result", report.run_id)]
    DeterminismMismatch { report: Box<ReplayReport> },
    #[error("replay of run '{}' could not be attempted: {}", report.run_id,
            report.reason.as_deref().unwrap_or("unknown"))]
    Degraded { report: Box<ReplayReport> },
}

impl ReplayError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DeterminismMismatch { .. } => "determinism_mismatch",
            Self::Degraded { .. } => "degraded",
        }
    }

    #[must_use]
    pub fn details(&self) -> BTreeMap<String, String> {
        let report = match self {
            Self::DeterminismMismatch { report } | Self::Degraded { report } => report,
        };
        let mut details = BTreeMap::new();
        details.insert("run_id".to_owned(), report.run_id.clone());
        if let Some(reason) = &report.reason {
            details.insert("reason".to_owned(), reason.clone());
        }
        details
    }

    #[must_use]
    pub fn report(&self) -> &ReplayReport {
        match self {
            Self::DeterminismMismatch { report } | Self::Degraded { report } => report,
        }
    }
}

/// Load a snapshot from the store and verify it.
///
/// Store-level failures (missing snapshot, corrupt bytes, failed integrity
/// check) classify as DEGRADED rather than erroring: replay was not
/// attempted, which is exactly what DEGRADED means.
pub fn replay(store: &dyn SnapshotStore, run_id: &str) -> ReplayReport {
    match store.load(run_id) {
        Ok(snapshot) => verify_snapshot(&snapshot),
        Err(StoreError::FingerprintMismatch {
            expected, actual, ..
        }) => {
            // The stored bundle itself is internally inconsistent; surface
            // the fingerprints so operators can triage.
            let mut report = ReplayReport::degraded(run_id, "stored snapshot failed integrity verification");
            report.expected_fingerprint = Some(expected);
            report.replayed_fingerprint = Some(actual);
            report
        }
        Err(err) => ReplayReport::degraded(run_id, err.to_string()),
    }
}

/// Re-run a snapshot's spec and params and classify the outcome.
#[must_use]
pub fn verify_snapshot(snapshot: &Snapshot) -> ReplayReport {
    if snapshot.version != SNAPSHOT_SCHEMA_VERSION {
        return ReplayReport::degraded(
            &snapshot.run_id,
            format!("unsupported snapshot schema version '{}'", snapshot.version),
        );
    }
    if !replay_compatible(&snapshot.engine_version, ENGINE_VERSION) {
        return ReplayReport::degraded(
            &snapshot.run_id,
            format!(
                "engine version '{}' is not replay-compatible with '{ENGINE_VERSION}'",
                snapshot.engine_version
            ),
        );
    }
    if !contract_compatible(&snapshot.contract_version, CONTRACT_VERSION) {
        return ReplayReport::degraded(
            &snapshot.run_id,
            format!(
                "contract version '{}' does not match '{CONTRACT_VERSION}'",
                snapshot.contract_version
            ),
        );
    }

    // Restore the captured counter so trace identifiers reproduce.
    let mut ctx = RunContext::with_offset(snapshot.id_counter_offset);
    let replayed = match evaluate_with_context(
        &snapshot.spec,
        &snapshot.params,
        None,
        &mut ctx,
        &snapshot.run_id,
    ) {
        Ok(result) => result,
        Err(err) => {
            warn!(run_id = %snapshot.run_id, code = err.code(), "replay evaluation failed");
            return ReplayReport::degraded(
                &snapshot.run_id,
                format!("re-evaluation failed: {err}"),
            );
        }
    };

    classify(snapshot, &replayed)
}

fn classify(snapshot: &Snapshot, replayed: &DecisionResult) -> ReplayReport {
    let stored = &snapshot.result;
    // Recompute the stored bundle's fingerprint from its canonical scope
    // rather than trusting the embedded string: a tampered score table with
    // a stale fingerprint must classify as MISMATCH, not drift.
    let expected_fingerprint =
        match compute_fingerprint(&snapshot.spec, &snapshot.params, stored) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                return ReplayReport::degraded(
                    &snapshot.run_id,
                    format!("stored result cannot be fingerprinted: {err}"),
                )
            }
        };
    let replayed_fingerprint = replayed.trace.fingerprint.clone();

    if expected_fingerprint != replayed_fingerprint {
        let diff = result_diff(stored, replayed);
        warn!(run_id = %snapshot.run_id, "replay fingerprint mismatch");
        return ReplayReport {
            run_id: snapshot.run_id.clone(),
            verdict: ReplayVerdict::Mismatch,
            expected_fingerprint: Some(expected_fingerprint),
            replayed_fingerprint: Some(replayed_fingerprint),
            diff: Some(diff),
            reason: None,
        };
    }

    // Fingerprints agree. The recommendation and ranking are bound by the
    // fingerprint, so a disagreement here means the bundle lies about its
    // own hash: treat as MISMATCH, not drift.
    if stored.recommended_action != replayed.recommended_action
        || stored.ranking != replayed.ranking
    {
        let diff = result_diff(stored, replayed);
        return ReplayReport {
            run_id: snapshot.run_id.clone(),
            verdict: ReplayVerdict::Mismatch,
            expected_fingerprint: Some(expected_fingerprint),
            replayed_fingerprint: Some(replayed_fingerprint),
            diff: Some(diff),
            reason: None,
        };
    }

    let stored_bytes = to_canonical_bytes(stored);
    let replayed_bytes = to_canonical_bytes(replayed);
    let byte_equal = matches!((&stored_bytes, &replayed_bytes), (Ok(a), Ok(b)) if a == b);

    if byte_equal {
        debug!(run_id = %snapshot.run_id, "replay PASS");
        return ReplayReport {
            run_id: snapshot.run_id.clone(),
            verdict: ReplayVerdict::Pass,
            expected_fingerprint: Some(expected_fingerprint),
            replayed_fingerprint: Some(replayed_fingerprint),
            diff: None,
            reason: None,
        };
    }

    let diff = result_diff(stored, replayed);
    debug!(run_id = %snapshot.run_id, "replay DRIFT on non-fingerprint-bound fields");
    ReplayReport {
        run_id: snapshot.run_id.clone(),
        verdict: ReplayVerdict::Drift,
        expected_fingerprint: Some(expected_fingerprint),
        replayed_fingerprint: Some(replayed_fingerprint),
        diff: Some(diff),
        reason: None,
    }
}

fn result_diff(stored: &DecisionResult, replayed: &DecisionResult) -> ReplayDiff {
    let stored_value = serde_json::to_value(stored).unwrap_or(serde_json::Value::Null);
    let replayed_value = serde_json::to_value(replayed).unwrap_or(serde_json::Value::Null);
    let mut diff = diff_values(&stored_value, &replayed_value);
    if diff.ranking_delta.is_none() && stored.ranking != replayed.ranking {
        diff.ranking_delta = Some(RankingDelta {
            expected: stored.ranking.clone(),
            actual: replayed.ranking.clone(),
        });
    }
    diff
}
