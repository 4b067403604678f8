//! Version identifiers and compatibility rules.
//!
//! Three identifiers travel with every snapshot:
//! - `engine_version`: this crate's version; replay requires equal major and
//!   minor positions (patch upgrades stay replay-compatible).
//! - `protocol_version`: the snapshot/envelope schema version.
//! - `contract_version`: the determinism contract, whose build-metadata
//!   suffix declares the unified hash primitive.

/// Engine semver, stamped into snapshots at capture time.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Snapshot and replay-envelope schema version.
pub const PROTOCOL_VERSION: &str = "1.0.0";

/// Determinism contract. The `+sha256` suffix declares the hash primitive;
/// changing the primitive is a major contract change.
pub const CONTRACT_VERSION: &str = "1.0.0+sha256";

/// Parse `major.minor.patch`, ignoring any build-metadata suffix on the
/// patch position. Malformed input maps to `(0, 0, 0)` so compatibility
/// checks fail closed.
#[must_use]
pub fn parse_semver(version: &str) -> (u32, u32, u32) {
    let core = version.split('+').next().unwrap_or("");
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() != 3 {
        return (0, 0, 0);
    }
    let major = parts[0].parse::<u32>().unwrap_or(0);
    let minor = parts[1].parse::<u32>().unwrap_or(0);
    let patch = parts[2].parse::<u32>().unwrap_or(0);
    (major, minor, patch)
}

/// Whether a snapshot produced by `source` may be replayed by `target`.
/// Patch positions may differ; major and minor must match.
#[must_use]
pub fn replay_compatible(source: &str, target: &str) -> bool {
    let (source_major, source_minor, _) = parse_semver(source);
    let (target_major, target_minor, _) = parse_semver(target);
    (source_major, source_minor) != (0, 0) && source_major == target_major && source_minor == target_minor
}

/// Whether two contract versions agree: same major position and the same
/// declared hash primitive suffix.
#[must_use]
pub fn contract_compatible(source: &str, target: &str) -> bool {
    let (source_major, _, _) = parse_semver(source);
    let (target_major, _, _) = parse_semver(target);
    source_major == target_major && hash_suffix(source) == hash_suffix(target)
}

fn hash_suffix(version: &str) -> Option<&str> {
    version.split_once('+').map(|(_, suffix)| suffix)
}
