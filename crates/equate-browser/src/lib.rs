//! Browser host for the equate converter.
//!
//! This crate implements the core platform traits over the live DOM. It
//! assumes a `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `dom`: document traversal, selection, deletion and synthetic keys
//! - `schedule`: timers, animation frames and the mutation observer
//! - `events`: the capture-phase cancel-key listener
//! - `runtime`: the shared controller handle wired to the page
//! - `platform`: Browser/OS detection for the shortcut modifier
//! - `style`: inline styling for overlays
//!
//! # Re-exports
//!
//! This crate re-exports `equate-core` for convenience, so consumers only
//! need to depend on `equate-browser`.

pub use equate_core;
pub use equate_core::*;

pub mod dom;
pub mod events;
pub mod platform;
pub mod runtime;
pub mod schedule;
pub mod style;

pub use dom::DomHost;
pub use events::{KeyIntent, classify_keydown};
pub use platform::{Platform, platform};
pub use runtime::Runtime;
pub use schedule::{BrowserScheduler, TaskHandle, WakeSink};
