//! Validator-facing replay envelope.
//!
//! External validators consume a flat summary of a snapshot rather than the
//! full bundle. Fields serialize in alphabetical order on the wire (struct
//! declaration order below, which canonical serialization preserves by
//! sorting anyway). The timestamp is audit metadata only; it never enters
//! any fingerprint.

use serde::{Deserialize, Serialize};

use verdict_core::{combine_hashes, fingerprint, CanonicalError};

use crate::snapshot::Snapshot;

/// Engine family identifier placed in `engine_type`.
pub const ENGINE_TYPE: &str = "verdict";

/// Flat replay summary for external validators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEnvelope {
    pub algorithm: String,
    /// Content id of the whole snapshot bundle.
    pub bundle_cid: String,
    pub contract_version: String,
    pub engine_type: String,
    pub engine_version: String,
    /// The result fingerprint a replay must reproduce.
    pub expected_output_hash: String,
    /// Hash over the canonical `{spec, params}` pair.
    pub input_hash: String,
    /// Parent digest over `(input_hash, expected_output_hash)`.
    pub merkle_root: String,
    pub protocol_version: String,
    pub request_id: String,
    /// Audit metadata; excluded from every fingerprint.
    pub timestamp: String,
}

#[derive(Serialize)]
struct InputScope<'a> {
    spec: &'a verdict_core::DecisionSpec,
    params: &'a verdict_core::AlgorithmParams,
}

impl ReplayEnvelope {
    /// Derive an envelope from a snapshot. The caller supplies the request
    /// id and timestamp; the engine never reads a wall clock.
    pub fn from_snapshot(
        snapshot: &Snapshot,
        request_id: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Result<Self, CanonicalError> {
        let input_hash = fingerprint(&InputScope {
            spec: &snapshot.spec,
            params: &snapshot.params,
        })?;
        let expected_output_hash = snapshot.result.trace.fingerprint.clone();
        let bundle_cid = fingerprint(snapshot)?;
        let merkle_root = combine_hashes(&input_hash, &expected_output_hash);
        Ok(Self {
            algorithm: snapshot.params.algorithm.as_str().to_owned(),
            bundle_cid,
            contract_version: snapshot.contract_version.clone(),
            engine_type: ENGINE_TYPE.to_owned(),
            engine_version: snapshot.engine_version.clone(),
            expected_output_hash,
            input_hash,
            merkle_root,
            protocol_version: snapshot.protocol_version.clone(),
            request_id: request_id.into(),
            timestamp: timestamp.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use verdict_core::{evaluate, Algorithm, AlgorithmParams, DecisionSpec};

    fn sample_snapshot() -> Snapshot {
        let mut outcomes = BTreeMap::new();
        outcomes.insert(
            "a1".to_owned(),
            BTreeMap::from([("s1".to_owned(), 3.0), ("s2".to_owned(), 1.0)]),
        );
        outcomes.insert(
            "a2".to_owned(),
            BTreeMap::from([("s1".to_owned(), 2.0), ("s2".to_owned(), 2.0)]),
        );
        let spec = DecisionSpec {
            actions: vec!["a1".to_owned(), "a2".to_owned()],
            states: vec!["s1".to_owned(), "s2".to_owned()],
            outcomes,
        };
        let params = AlgorithmParams::new(Algorithm::Maximin);
        let result = evaluate(&spec, &params, None).unwrap();
        Snapshot::capture("run-env", spec, params, result, 0)
    }

    #[test]
    fn envelope_binds_input_and_output_hashes() {
        let snapshot = sample_snapshot();
        let envelope =
            ReplayEnvelope::from_snapshot(&snapshot, "req-1", "2024-05-01T00:00:00Z").unwrap();
        assert_eq!(envelope.algorithm, "maximin");
        assert_eq!(envelope.engine_type, ENGINE_TYPE);
        assert_eq!(
            envelope.expected_output_hash,
            snapshot.result.trace.fingerprint
        );
        assert_eq!(
            envelope.merkle_root,
            combine_hashes(&envelope.input_hash, &envelope.expected_output_hash)
        );
    }

    #[test]
    fn timestamp_does_not_affect_content_hashes() {
        let snapshot = sample_snapshot();
        let e1 = ReplayEnvelope::from_snapshot(&snapshot, "req-1", "2024-01-01T00:00:00Z").unwrap();
        let e2 = ReplayEnvelope::from_snapshot(&snapshot, "req-1", "2030-12-31T23:59:59Z").unwrap();
        assert_eq!(e1.input_hash, e2.input_hash);
        assert_eq!(e1.expected_output_hash, e2.expected_output_hash);
        assert_eq!(e1.merkle_root, e2.merkle_root);
        assert_eq!(e1.bundle_cid, e2.bundle_cid);
    }

    #[test]
    fn wire_fields_are_alphabetical() {
        let snapshot = sample_snapshot();
        let envelope =
            ReplayEnvelope::from_snapshot(&snapshot, "req-1", "2024-05-01T00:00:00Z").unwrap();
        let json = serde_json::to_string(&envelope).unwrap();
        let field_names = [
            "algorithm",
            "bundle_cid",
            "contract_version",
            "engine_type",
            "engine_version",
            "expected_output_hash",
            "input_hash",
            "merkle_root",
            "protocol_version",
            "request_id",
            "timestamp",
        ];
        let positions: Vec<usize> = field_names
            .iter()
            .map(|name| json.find(&format!("\"{name}\"")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
