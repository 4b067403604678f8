//! Self-contained snapshot of one evaluation.

use serde::{Deserialize, Serialize};

use verdict_core::{AlgorithmParams, DecisionResult, DecisionSpec};

/// Snapshot schema version; bumped on any breaking layout change.
pub const SNAPSHOT_SCHEMA_VERSION: &str = "1";

/// A self-contained, immutable record of one evaluation, sufficient to
/// reproduce it: the spec, the params, the sealed result, and the version
/// identifiers plus run-counter offset the verifier needs to re-execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub run_id: String,
    pub engine_version: String,
    pub protocol_version: String,
    pub contract_version: String,
    /// Run-context counter value at capture time; restored before replay so
    /// trace identifiers reproduce.
    #[serde(default)]
    pub id_counter_offset: u64,
    pub spec: DecisionSpec,
    pub params: AlgorithmParams,
    pub result: DecisionResult,
}

impl Snapshot {
    /// Capture a finished evaluation under the current engine identity.
    #[must_use]
    pub fn capture(
        run_id: impl Into<String>,
        spec: DecisionSpec,
        params: AlgorithmParams,
        result: DecisionResult,
        id_counter_offset: u64,
    ) -> Self {
        Self {
            version: SNAPSHOT_SCHEMA_VERSION.to_owned(),
            run_id: run_id.into(),
            engine_version: verdict_core::ENGINE_VERSION.to_owned(),
            protocol_version: verdict_core::PROTOCOL_VERSION.to_owned(),
            contract_version: verdict_core::CONTRACT_VERSION.to_owned(),
            id_counter_offset,
            spec,
            params,
            result,
        }
    }
}
