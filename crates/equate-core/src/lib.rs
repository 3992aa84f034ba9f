//! equate-core: target-independent engine for turning `$...$` text into
//! host-rendered equations.
//!
//! This crate provides:
//! - `scanner` - delimiter span scanning over text snapshots
//! - `walker` - live-document discovery of convertible text
//! - `watcher` - coalescing of document change bursts
//! - `dialog` - confirmation of the host's equation modal
//! - `machine` - the `Controller` that runs one conversion session
//! - `platform` - the traits a host environment implements

pub mod config;
pub mod dialog;
pub mod error;
pub mod keys;
pub mod machine;
pub mod platform;
pub mod scanner;
pub mod session;
pub mod walker;
pub mod watcher;

#[cfg(test)]
pub(crate) mod fake_host;

pub use config::{ConverterConfig, HostContract, Timing};
pub use dialog::{ConfirmStrategy, confirm_dialog, find_dialog};
pub use error::{ConfigError, HostError, StepFailure};
pub use keys::{KeyChord, PrimaryModifier, is_cancel_key};
pub use machine::{Controller, StartOutcome};
pub use platform::{
    DocumentTree, EditSurface, Host, NoopReporter, ProgressReporter, Scheduler, Wake,
};
pub use scanner::{EquationSpan, find_dollar_spans, first_dollar_span};
pub use session::{Lifecycle, SessionEnd, SessionSummary};
pub use smol_str::SmolStr;
pub use walker::TargetLocation;
pub use watcher::MutationWatcher;
