//! # Verdict Replay
//!
//! Snapshot persistence and replay verification for the verdict engine.
//!
//! A run captured as a [`Snapshot`] is self-contained: spec, params, sealed
//! result, version identifiers, and the run-counter offset. The
//! [`FsSnapshotStore`] persists bundles with atomic write-temp-then-rename
//! and re-verifies the stored fingerprint on every load; the
//! [`verifier`] re-executes a bundle and classifies the outcome as
//! PASS / DRIFT / MISMATCH / DEGRADED with a structured diff.

pub mod diff;
pub mod envelope;
pub mod snapshot;
pub mod store;
pub mod verifier;

pub use diff::{NumericDelta, RankingDelta, ReplayDiff};
pub use envelope::{ReplayEnvelope, ENGINE_TYPE};
pub use snapshot::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
pub use store::{FsSnapshotStore, SnapshotStore, StoreError, MAX_FRAME_BYTES};
pub use verifier::{replay, verify_snapshot, ReplayError, ReplayReport, ReplayVerdict};
