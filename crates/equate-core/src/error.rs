//! Error types.
//!
//! Nothing in a running session is surfaced to the caller as a hard failure:
//! host errors degrade to skipping the current step, and `StepFailure` exists
//! to classify those degradations in logs.

use thiserror::Error;

/// Failure reported by a platform trait implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("no window or document available")]
    NoDocument,
    #[error("node is no longer attached to the document")]
    Detached,
    #[error("selection failed: {0}")]
    Selection(String),
    #[error("dom operation failed: {0}")]
    Dom(String),
}

impl HostError {
    /// Wrap a stringly DOM error, as returned by `web-sys` calls.
    pub fn dom(msg: impl Into<String>) -> Self {
        HostError::Dom(msg.into())
    }
}

/// Why a step did not end in a confirmed conversion.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StepFailure {
    #[error("no eligible span in the document")]
    NoTargetFound,
    #[error("editable ancestor could not be focused")]
    FocusFailure,
    #[error("host did not confirm the conversion in time")]
    ConfirmationTimeout,
    #[error("equation dialog found but no confirm control worked")]
    DialogDetectionFailure,
    #[error("target text changed between edits")]
    StaleTarget,
    #[error("host rejected the selection or deletion")]
    EditRejected,
}

/// Invalid converter configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one root selector is required")]
    NoRootSelectors,
    #[error("selector for {0} must not be empty")]
    EmptySelector(&'static str),
    #[error("skip timeout ({skip_ms} ms) must be longer than retry timeout ({retry_ms} ms)")]
    SkipBeforeRetry { retry_ms: u32, skip_ms: u32 },
    #[error("focus failure budget must be at least 1")]
    ZeroFailureBudget,
    #[error("cancel key must not be empty")]
    EmptyCancelKey,
}
