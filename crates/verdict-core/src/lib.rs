//! # Verdict Core
//!
//! Deterministic decision evaluation kernel with replay-grade fingerprints.
//!
//! Given a finite set of candidate actions, a finite set of world states, a
//! utility matrix over `(action, state)` pairs, and an algorithm selector,
//! the kernel computes a recommended action, a total ranking, and a trace
//! binding inputs, parameters, and outputs under a content hash.
//!
//! ## Determinism Guarantees
//!
//! - Identical `(spec, params, seed)` always produce byte-identical results
//! - Canonical JSON with sorted keys and 10-decimal float bounding
//! - One hash primitive (SHA-256) everywhere a fingerprint is computed
//! - Lexicographic tie-breaking by action id within a 1e-9 tolerance
//! - Summation iterates states in input order, never data-dependent order
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use verdict_core::{evaluate, Algorithm, AlgorithmParams, DecisionSpec};
//!
//! let mut outcomes = BTreeMap::new();
//! outcomes.insert(
//!     "hold".to_owned(),
//!     BTreeMap::from([("calm".to_owned(), 10.0), ("storm".to_owned(), 5.0)]),
//! );
//! outcomes.insert(
//!     "expand".to_owned(),
//!     BTreeMap::from([("calm".to_owned(), 0.0), ("storm".to_owned(), 20.0)]),
//! );
//! let spec = DecisionSpec {
//!     actions: vec!["hold".to_owned(), "expand".to_owned()],
//!     states: vec!["calm".to_owned(), "storm".to_owned()],
//!     outcomes,
//! };
//!
//! let result = evaluate(&spec, &AlgorithmParams::new(Algorithm::MinimaxRegret), None).unwrap();
//! assert_eq!(result.recommended_action, result.ranking[0]);
//! assert_eq!(result.trace.fingerprint.len(), 64);
//! ```

pub mod canonical;
pub mod error;
pub mod hash;
pub mod kernel;
pub mod rng;
pub mod trace;
pub mod types;
pub mod version;

pub use canonical::{
    canonical_number, to_canonical_bytes, value_to_canonical_bytes, CanonicalError, FLOAT_DECIMALS,
};
pub use error::EngineError;
pub use hash::{combine_hashes, fingerprint, stable_hash, Fingerprint, FINGERPRINT_LEN};
pub use kernel::{evaluate, evaluate_with_context, TIE_EPSILON};
pub use rng::SeededRng;
pub use trace::{compute_fingerprint, RunContext, TIE_BREAK_RULE};
pub use types::{
    Algorithm, AlgorithmParams, DecisionResult, DecisionSpec, DecisionTrace, Direction,
};
pub use version::{
    contract_compatible, parse_semver, replay_compatible, CONTRACT_VERSION, ENGINE_VERSION,
    PROTOCOL_VERSION,
};
