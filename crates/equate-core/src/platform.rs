//! Platform abstraction traits for the conversion engine.
//!
//! These traits are the seam between the engine and whatever renders the
//! host document. The browser implementation drives the live DOM through
//! `web-sys`; tests drive an in-memory tree with a virtual clock. The engine
//! itself never blocks or sleeps: every suspension is a request to the
//! [`Scheduler`], which later hands a [`Wake`] back to the controller.

use std::fmt;
use std::time::Duration;

use crate::error::HostError;
use crate::keys::KeyChord;
use crate::session::SessionSummary;

/// Read access to the host document tree.
///
/// Selectors are CSS selector strings taken from the host contract.
pub trait DocumentTree {
    /// A handle to a live node. Handles may outlive the node they point to.
    type Node: Clone + PartialEq + fmt::Debug;

    /// All elements in the document matching `selector`, in document order.
    fn query_all(&self, selector: &str) -> Vec<Self::Node>;

    /// All elements under `root` matching `selector`, in document order.
    fn query_within(&self, root: &Self::Node, selector: &str) -> Vec<Self::Node>;

    /// The document body, used when no root selector matches.
    fn body(&self) -> Option<Self::Node>;

    /// Whether `node` is `ancestor` or one of its descendants.
    fn contains(&self, ancestor: &Self::Node, node: &Self::Node) -> bool;

    /// Whether the node is still attached to the document.
    fn is_connected(&self, node: &Self::Node) -> bool;

    /// Text leaves under `root`, in document order.
    fn text_leaves(&self, root: &Self::Node) -> Vec<Self::Node>;

    /// Current character data of a text leaf.
    fn text(&self, node: &Self::Node) -> Option<String>;

    /// Concatenated text content of an element, as a user would read it.
    fn text_content(&self, node: &Self::Node) -> String;

    /// Parent element of a node, skipping non-element parents.
    fn parent_element(&self, node: &Self::Node) -> Option<Self::Node>;

    /// Whether the element is in an editing context (explicitly marked or
    /// inheriting from an editable ancestor).
    fn is_editable(&self, element: &Self::Node) -> bool;

    /// Nearest inclusive ancestor of `element` matching `selector`.
    fn closest(&self, element: &Self::Node, selector: &str) -> Option<Self::Node>;
}

/// Mutating access to the host's editing surface.
pub trait EditSurface: DocumentTree {
    /// Move keyboard focus to an element. Returns false if it did not take.
    fn focus(&mut self, element: &Self::Node) -> bool;

    /// Select `start..end` (UTF-16 code units) inside a text leaf.
    fn select_text(&mut self, node: &Self::Node, start: u32, end: u32) -> Result<(), HostError>;

    /// Delete the current selection through the host's input pipeline.
    fn delete_selection(&mut self) -> Result<(), HostError>;

    /// Node the current selection is anchored in, if any.
    fn selection_anchor(&self) -> Option<Self::Node>;

    /// Visually mark the current selection.
    fn mark_selection(&mut self);

    /// Remove the visual mark.
    fn clear_mark(&mut self);

    /// Dispatch a key chord at the focused element.
    fn dispatch_chord(&mut self, chord: &KeyChord);

    /// Dispatch a key chord at a specific element.
    fn dispatch_chord_at(&mut self, target: &Self::Node, chord: &KeyChord);

    /// Activate a control as if clicked.
    fn click(&mut self, element: &Self::Node);
}

/// Where a continuation resumes once the scheduler wakes the controller.
///
/// Tokens carry the step they were issued for; a token from an earlier step
/// is stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// A pause inside the step elapsed.
    Continue { step: u64 },
    /// The retry timeout elapsed.
    Retry { step: u64 },
    /// The skip timeout elapsed.
    Skip { step: u64 },
    /// The animation frame requested after document changes arrived.
    Frame { step: u64 },
    /// The observed document changed.
    DocumentChanged,
}

/// Timer, frame and change-notification services.
pub trait Scheduler {
    /// Handle to a pending timer or frame. Passing it back to
    /// [`Scheduler::cancel`] guarantees the wake is never delivered.
    type Handle;

    /// Deliver `wake` after `delay`.
    fn set_timer(&mut self, delay: Duration, wake: Wake) -> Self::Handle;

    /// Deliver `wake` on the next animation frame.
    fn request_frame(&mut self, wake: Wake) -> Self::Handle;

    /// Cancel a pending timer or frame.
    fn cancel(&mut self, handle: Self::Handle);

    /// Start delivering [`Wake::DocumentChanged`] for any change anywhere in
    /// the document (structure, text or attributes).
    fn observe_document(&mut self) -> Result<(), HostError>;

    /// Stop delivering change notifications.
    fn disconnect_document(&mut self);
}

/// Everything the controller needs from its environment.
pub trait Host: EditSurface + Scheduler {}

impl<T: EditSurface + Scheduler> Host for T {}

/// Presentation of progress to the user.
pub trait ProgressReporter {
    /// A session started with `total` spans found.
    fn report_started(&mut self, _total: usize) {}

    /// A conversion was confirmed.
    fn report_progress(&mut self, current: usize, total: usize);

    /// The session ended, for any reason.
    fn report_done(&mut self, summary: &SessionSummary);
}

/// Reporter that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report_progress(&mut self, _current: usize, _total: usize) {}

    fn report_done(&mut self, _summary: &SessionSummary) {}
}
