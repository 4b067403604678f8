//! # Verdict
//!
//! Facade over the deterministic decision engine: re-exports the kernel and
//! replay layers and adds the gate evaluator plus the `verdict-json`
//! stdin/stdout front-end.
//!
//! Layering:
//! - [`verdict_core`] — canonicalization, hashing, seeded RNG, the
//!   algorithm kernel, and trace fingerprinting. Pure; no I/O.
//! - [`verdict_replay`] — snapshot persistence and replay classification.
//! - this crate — policy gating over sealed results and the JSON front-end.

pub mod gate;

pub use gate::{evaluate_gate, GateAction, GateDecision, GatePolicy, GateRule};

pub use verdict_core::{
    evaluate, evaluate_with_context, Algorithm, AlgorithmParams, DecisionResult, DecisionSpec,
    DecisionTrace, EngineError, RunContext, CONTRACT_VERSION, ENGINE_VERSION, PROTOCOL_VERSION,
};
pub use verdict_replay::{
    replay, verify_snapshot, FsSnapshotStore, ReplayEnvelope, ReplayReport, ReplayVerdict,
    Snapshot, SnapshotStore, StoreError,
};
