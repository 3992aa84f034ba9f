//! Session state for one conversion run.

use std::time::Duration;

use web_time::Instant;

use crate::platform::Scheduler;
use crate::walker::TargetLocation;
use crate::watcher::MutationWatcher;

/// Externally visible lifecycle of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No session exists.
    Idle,
    /// Looking for the next span, or waiting to retry after a focus failure.
    Scanning,
    /// Removing delimiters and selecting the expression.
    Editing,
    /// Command dispatched; waiting for the host to react.
    AwaitingConfirmation,
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// No spans left.
    Completed,
    /// Stopped by the user.
    Cancelled,
    /// Stopped after too many consecutive focus or edit failures.
    Aborted,
}

/// Final numbers of a session, handed to the reporter.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub converted: usize,
    pub skipped: usize,
    pub total: usize,
    pub end: SessionEnd,
    pub elapsed: Duration,
}

/// Where inside a step the session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepState {
    Scanning,
    Editing(EditStage),
    AwaitingConfirmation,
    /// Modal seen; pausing before confirming it.
    ConfirmingDialog,
    /// Confirmation seen; settle delay running.
    Settling,
}

/// Edit sub-stage, each entered after a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditStage {
    RemoveLeading,
    SelectInner,
    Dispatch,
}

impl StepState {
    pub(crate) fn lifecycle(self) -> Lifecycle {
        match self {
            StepState::Scanning => Lifecycle::Scanning,
            StepState::Editing(_) => Lifecycle::Editing,
            StepState::AwaitingConfirmation
            | StepState::ConfirmingDialog
            | StepState::Settling => Lifecycle::AwaitingConfirmation,
        }
    }
}

/// The span being converted plus the text the leaf should hold after the
/// edits applied so far.
#[derive(Debug, Clone)]
pub(crate) struct ActiveTarget<N> {
    pub location: TargetLocation<N>,
    pub expected: String,
}

/// Mutable state of the single running session.
///
/// Every timer handle lives here so that ending the step or the session can
/// cancel all of them explicitly.
#[derive(Debug)]
pub struct ConversionSession<N, H> {
    pub(crate) step: u64,
    pub(crate) converted: usize,
    pub(crate) skipped: usize,
    pub(crate) total: usize,
    pub(crate) consecutive_failures: u32,
    pub(crate) state: StepState,
    pub(crate) target: Option<ActiveTarget<N>>,
    /// Leaves holding an unpaired opener from an abandoned edit.
    pub(crate) excluded: Vec<N>,
    pub(crate) dialog_confirmed: bool,
    pub(crate) pause: Option<H>,
    pub(crate) retry: Option<H>,
    pub(crate) skip: Option<H>,
    pub(crate) watcher: MutationWatcher<H>,
    started: Instant,
}

impl<N, H> ConversionSession<N, H> {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            step: 0,
            converted: 0,
            skipped: 0,
            total,
            consecutive_failures: 0,
            state: StepState::Scanning,
            target: None,
            excluded: Vec::new(),
            dialog_confirmed: false,
            pause: None,
            retry: None,
            skip: None,
            watcher: MutationWatcher::new(),
            started: Instant::now(),
        }
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn converted(&self) -> usize {
        self.converted
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Cancel the retry and skip timers: a confirmation won the race.
    pub(crate) fn clear_race<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler<Handle = H>,
    {
        if let Some(handle) = self.retry.take() {
            scheduler.cancel(handle);
        }
        if let Some(handle) = self.skip.take() {
            scheduler.cancel(handle);
        }
    }

    /// Cancel every pending timer and frame and stop observing.
    pub(crate) fn teardown<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler<Handle = H>,
    {
        self.clear_race(scheduler);
        if let Some(handle) = self.pause.take() {
            scheduler.cancel(handle);
        }
        self.watcher.disarm(scheduler);
    }

    /// Tear down the previous step and open the next one.
    pub(crate) fn next_step<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler<Handle = H>,
    {
        self.teardown(scheduler);
        self.step += 1;
        self.state = StepState::Scanning;
        self.target = None;
        self.dialog_confirmed = false;
    }

    pub(crate) fn summary(&self, end: SessionEnd) -> SessionSummary {
        SessionSummary {
            converted: self.converted,
            skipped: self.skipped,
            total: self.total.max(self.converted),
            end,
            elapsed: self.started.elapsed(),
        }
    }
}
