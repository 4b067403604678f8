//! Kernel error taxonomy.
//!
//! Every variant carries a stable machine-readable code, a one-line human
//! summary via `Display`, and a structured details map. Callers dispatch on
//! [`EngineError::code`], never on the English text.

use std::collections::BTreeMap;

use crate::canonical::CanonicalError;

/// Errors surfaced by validation and evaluation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Shape violation: duplicate or empty identifiers, unknown algorithm
    /// tag, outcome keys naming unknown actions or states in strict mode.
    #[error("invalid input: {summary}")]
    InvalidInput {
        summary: String,
        details: BTreeMap<String, String>,
    },
    /// NaN/infinite utility or an out-of-range numeric parameter.
    #[error("invalid numeric value: {summary}")]
    InvalidNumeric {
        summary: String,
        details: BTreeMap<String, String>,
    },
    /// Parameter contract violation (weights that do not sum to one in
    /// strict mode, non-positive temperature, zero iterations).
    #[error("invalid params: {summary}")]
    InvalidParams {
        summary: String,
        details: BTreeMap<String, String>,
    },
    /// Strict mode only: `U(action, state)` absent from the outcome matrix.
    #[error("missing outcome for action '{action}' in state '{state}'")]
    MissingOutcome { action: String, state: String },
    /// Internal invariant broken. Firing indicates a bug in the kernel.
    #[error("algorithm invariant violated: {summary}")]
    AlgorithmError { summary: String },
}

impl EngineError {
    pub(crate) fn invalid_input(summary: impl Into<String>) -> Self {
        Self::InvalidInput {
            summary: summary.into(),
            details: BTreeMap::new(),
        }
    }

    pub(crate) fn invalid_input_with(
        summary: impl Into<String>,
        details: BTreeMap<String, String>,
    ) -> Self {
        Self::InvalidInput {
            summary: summary.into(),
            details,
        }
    }

    pub(crate) fn invalid_numeric(
        summary: impl Into<String>,
        details: BTreeMap<String, String>,
    ) -> Self {
        Self::InvalidNumeric {
            summary: summary.into(),
            details,
        }
    }

    pub(crate) fn invalid_params(
        summary: impl Into<String>,
        details: BTreeMap<String, String>,
    ) -> Self {
        Self::InvalidParams {
            summary: summary.into(),
            details,
        }
    }

    pub(crate) fn algorithm(summary: impl Into<String>) -> Self {
        Self::AlgorithmError {
            summary: summary.into(),
        }
    }

    /// Stable machine-readable code for this error kind.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid_input",
            Self::InvalidNumeric { .. } => "invalid_numeric",
            Self::InvalidParams { .. } => "invalid_params",
            Self::MissingOutcome { .. } => "missing_outcome",
            Self::AlgorithmError { .. } => "algorithm_error",
        }
    }

    /// Structured context for machine consumption.
    #[must_use]
    pub fn details(&self) -> BTreeMap<String, String> {
        match self {
            Self::InvalidInput { details, .. }
            | Self::InvalidNumeric { details, .. }
            | Self::InvalidParams { details, .. } => details.clone(),
            Self::MissingOutcome { action, state } => {
                let mut details = BTreeMap::new();
                details.insert("action".to_owned(), action.clone());
                details.insert("state".to_owned(), state.clone());
                details
            }
            Self::AlgorithmError { .. } => BTreeMap::new(),
        }
    }
}

impl From<CanonicalError> for EngineError {
    fn from(err: CanonicalError) -> Self {
        match err {
            CanonicalError::InvalidNumeric => Self::InvalidNumeric {
                summary: "value cannot be canonicalized".to_owned(),
                details: BTreeMap::new(),
            },
            CanonicalError::InvalidKey => Self::invalid_input("object key is not a string"),
            CanonicalError::Serialization(message) => {
                let mut details = BTreeMap::new();
                details.insert("cause".to_owned(), message);
                Self::invalid_input_with("serialization failed", details)
            }
        }
    }
}

/// Detail-map helper used by validation sites.
pub(crate) fn detail(key: &str, value: impl Into<String>) -> BTreeMap<String, String> {
    let mut details = BTreeMap::new();
    details.insert(key.to_owned(), value.into());
    details
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        let err = EngineError::MissingOutcome {
            action: "a1".into(),
            state: "s1".into(),
        };
        assert_eq!(err.code(), "missing_outcome");
        assert_eq!(err.details().get("action").unwrap(), "a1");
        assert_eq!(
            err.to_string(),
            "missing outcome for action 'a1' in state 's1'"
        );
    }

    #[test]
    fn canonical_errors_map_to_taxonomy() {
        assert_eq!(
            EngineError::from(CanonicalError::InvalidNumeric).code(),
            "invalid_numeric"
        );
        assert_eq!(
            EngineError::from(CanonicalError::InvalidKey).code(),
            "invalid_input"
        );
    }
}
