//! Filesystem snapshot store.
//!
//! Append-only sink/source for snapshot bundles keyed by run id. Writes are
//! atomic: canonical bytes go to a temp file in the target directory, are
//! fsynced, and then renamed over the final path, so a reader never observes
//! a partial snapshot. Reads verify the stored fingerprint against the hash
//! of the snapshot's canonical form before returning.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use verdict_core::{compute_fingerprint, to_canonical_bytes};

use crate::snapshot::Snapshot;

/// Largest serialized snapshot the store accepts (64 MiB).
pub const MAX_FRAME_BYTES: usize = 64 * 1024 * 1024;

const SNAPSHOT_SUFFIX: &str = ".snapshot.json";

/// Store failures, each with a stable code and structured details.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("run id '{run_id}' contains characters unsafe for filenames")]
    InvalidRunId { run_id: String },
    #[error("snapshot for run '{run_id}' already exists with different content")]
    Duplicate { run_id: String },
    #[error("serialized snapshot is {size} bytes, above the {max} byte frame limit")]
    FrameTooLarge { size: usize, max: usize },
    #[error("no snapshot stored for run '{run_id}'")]
    NotFound { run_id: String },
    #[error("snapshot for run '{run_id}' failed integrity verification")]
    FingerprintMismatch {
        run_id: String,
        expected: String,
        actual: String,
    },
    #[error("snapshot for run '{run_id}' is not valid snapshot JSON: {cause}")]
    Malformed { run_id: String, cause: String },
    #[error("canonicalization failed: {0}")]
    Canonical(#[from] verdict_core::CanonicalError),
    #[error("fingerprint recomputation failed: {0}")]
    Engine(#[from] verdict_core::EngineError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRunId { .. } => "invalid_run_id",
            Self::Duplicate { .. } => "duplicate_run_id",
            Self::FrameTooLarge { .. } => "frame_too_large",
            Self::NotFound { .. } => "not_found",
            Self::FingerprintMismatch { .. } => "fingerprint_mismatch",
            Self::Malformed { .. } => "malformed_snapshot",
            Self::Canonical(_) => "canonical_error",
            Self::Engine(_) => "engine_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Structured context for machine consumption.
    #[must_use]
    pub fn details(&self) -> BTreeMap<String, String> {
        let mut details = BTreeMap::new();
        match self {
            Self::InvalidRunId { run_id }
            | Self::Duplicate { run_id }
            | Self::NotFound { run_id } => {
                details.insert("run_id".to_owned(), run_id.clone());
            }
            Self::FrameTooLarge { size, max } => {
                details.insert("size".to_owned(), size.to_string());
                details.insert("max".to_owned(), max.to_string());
            }
            Self::FingerprintMismatch {
                run_id,
                expected,
                actual,
            } => {
                details.insert("run_id".to_owned(), run_id.clone());
                details.insert("expected".to_owned(), expected.clone());
                details.insert("actual".to_owned(), actual.clone());
            }
            Self::Malformed { run_id, cause } => {
                details.insert("run_id".to_owned(), run_id.clone());
                details.insert("cause".to_owned(), cause.clone());
            }
            Self::Canonical(_) | Self::Engine(_) | Self::Io(_) => {}
        }
        details
    }
}

/// Append-only snapshot sink/source keyed by run id.
pub trait SnapshotStore {
    /// Persist a snapshot; returns the path it landed at. Rejects a second
    /// append under an existing run id unless the bytes are identical.
    fn append(&self, snapshot: &Snapshot) -> Result<PathBuf, StoreError>;

    /// Load and integrity-check a snapshot.
    fn load(&self, run_id: &str) -> Result<Snapshot, StoreError>;

    /// Run ids starting with `prefix`, sorted, at most `limit`.
    fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError>;
}

/// Snapshot store over a caller-supplied base directory. Filenames are
/// `<run_id>.snapshot.json`; no hidden metadata.
#[derive(Debug, Clone)]
pub struct FsSnapshotStore {
    base_dir: PathBuf,
    max_frame_bytes: usize,
}

impl FsSnapshotStore {
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_frame_bytes: MAX_FRAME_BYTES,
        }
    }

    /// Override the frame limit, e.g. to tighten it for constrained hosts.
    #[must_use]
    pub fn with_frame_limit(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn snapshot_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}{SNAPSHOT_SUFFIX}"))
    }
}

fn check_run_id(run_id: &str) -> Result<(), StoreError> {
    let safe = !run_id.is_empty()
        && !run_id.starts_with('.')
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if safe {
        Ok(())
    } else {
        Err(StoreError::InvalidRunId {
            run_id: run_id.to_owned(),
        })
    }
}

/// fsync the directory so a rename survives power loss. Directories cannot
/// be fsynced on every platform; failures are non-fatal.
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn append(&self, snapshot: &Snapshot) -> Result<PathBuf, StoreError> {
        check_run_id(&snapshot.run_id)?;
        let bytes = to_canonical_bytes(snapshot)?;
        if bytes.len() > self.max_frame_bytes {
            return Err(StoreError::FrameTooLarge {
                size: bytes.len(),
                max: self.max_frame_bytes,
            });
        }

        fs::create_dir_all(&self.base_dir)?;
        let path = self.snapshot_path(&snapshot.run_id);
        if path.exists() {
            // Snapshots are immutable: re-appending identical bytes is a
            // no-op, anything else is a conflict.
            let existing = fs::read(&path)?;
            if existing == bytes {
                debug!(run_id = %snapshot.run_id, "snapshot already stored, append is a no-op");
                return Ok(path);
            }
            return Err(StoreError::Duplicate {
                run_id: snapshot.run_id.clone(),
            });
        }

        let tmp = self
            .base_dir
            .join(format!(".{}{SNAPSHOT_SUFFIX}.tmp-{}", snapshot.run_id, std::process::id()));
        let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
        if let Err(err) = file.write_all(&bytes).and_then(|()| file.sync_all()) {
            drop(file);
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        drop(file);
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(err.into());
        }
        sync_dir(&self.base_dir);

        debug!(run_id = %snapshot.run_id, bytes = bytes.len(), "snapshot appended");
        Ok(path)
    }

    fn load(&self, run_id: &str) -> Result<Snapshot, StoreError> {
        check_run_id(run_id)?;
        let path = self.snapshot_path(run_id);
        let bytes = fs::read(&path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound {
                    run_id: run_id.to_owned(),
                }
            } else {
                StoreError::Io(err)
            }
        })?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::Malformed {
                run_id: run_id.to_owned(),
                cause: err.to_string(),
            })?;

        let expected =
            compute_fingerprint(&snapshot.spec, &snapshot.params, &snapshot.result)?;
        if expected != snapshot.result.trace.fingerprint {
            warn!(run_id, "stored snapshot failed fingerprint verification");
            return Err(StoreError::FingerprintMismatch {
                run_id: run_id.to_owned(),
                expected,
                actual: snapshot.result.trace.fingerprint.clone(),
            });
        }
        Ok(snapshot)
    }

    fn list(&self, prefix: &str, limit: usize) -> Result<Vec<String>, StoreError> {
        let mut run_ids = Vec::new();
        let entries = match fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(run_ids),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with('.') {
                continue;
            }
            let Some(run_id) = name.strip_suffix(SNAPSHOT_SUFFIX) else {
                continue;
            };
            if run_id.starts_with(prefix) {
                run_ids.push(run_id.to_owned());
            }
        }
        run_ids.sort();
        run_ids.truncate(limit);
        Ok(run_ids)
    }
}
