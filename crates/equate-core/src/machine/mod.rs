//! The conversion state machine.
//!
//! One [`Controller`] owns the host, the reporter and at most one
//! [`ConversionSession`]. It is driven entirely from outside: `start` and
//! `cancel` come from the user, and everything else arrives through
//! [`Controller::wake`] when a timer, frame or change notification the
//! controller asked for fires.
//!
//! # Step
//!
//! 1. Rescan the live document; no span left ends the session.
//! 2. Focus the editable ancestor (bounded retries on failure).
//! 3. Delete the trailing delimiter, pause, re-validate.
//! 4. Delete the leading delimiter, pause, re-validate.
//! 5. Select and mark the bare expression, arm the change watcher and the
//!    retry/skip timers, pause.
//! 6. Dispatch the inline-equation chord and wait.
//!
//! Re-validation follows a leaf the host replaced with identical text. A
//! span lost after its closer was deleted keeps every leaf still holding its
//! opener out of later scans, so the opener is never paired with another
//! span.
//!
//! While waiting, three sources race: change notifications (modal appeared
//! or selection now inside rendered math), the retry timer (re-dispatch the
//! chord once) and the skip timer (give up on this span). The first
//! confirmation cancels both timers; every wake token carries the step it
//! was issued for, so anything that slips through from an older step is
//! dropped.

use tracing::{debug, info, trace, warn};

use crate::config::ConverterConfig;
use crate::dialog;
use crate::error::StepFailure;
use crate::keys::{KeyChord, PrimaryModifier};
use crate::platform::{Host, ProgressReporter, Wake};
use crate::scanner::EquationSpan;
use crate::session::{
    ActiveTarget, ConversionSession, EditStage, Lifecycle, SessionEnd, SessionSummary, StepState,
};
use crate::walker;


/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { total: usize },
    /// A session is already running; nothing changed.
    AlreadyRunning,
    /// No eligible span in the document.
    NothingToDo,
}

/// What the controller does after handling an input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    /// Suspend until the next wake.
    Wait,
    /// Open a new step.
    Step,
    /// Give up on the current span and open a new step.
    Abandon(StepFailure),
    Finish(SessionEnd),
}

/// Process-wide owner of the conversion session.
pub struct Controller<H: Host, R: ProgressReporter> {
    host: H,
    reporter: R,
    config: ConverterConfig,
    chord: KeyChord,
    session: Option<ConversionSession<H::Node, H::Handle>>,
    last_summary: Option<SessionSummary>,
}

impl<H: Host, R: ProgressReporter> Controller<H, R> {
    pub fn new(host: H, reporter: R, config: ConverterConfig, modifier: PrimaryModifier) -> Self {
        Self {
            host,
            reporter,
            config,
            chord: KeyChord::inline_equation(modifier),
            session: None,
            last_summary: None,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    /// The chord dispatched to request a conversion.
    pub fn chord(&self) -> &KeyChord {
        &self.chord
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.session
            .as_ref()
            .map(|s| s.state.lifecycle())
            .unwrap_or(Lifecycle::Idle)
    }

    /// `(converted, total)` of the running session.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.session.as_ref().map(|s| (s.converted, s.total))
    }

    /// Summary of the most recently ended session.
    pub fn last_summary(&self) -> Option<&SessionSummary> {
        self.last_summary.as_ref()
    }

    /// Start a session unless one is already running.
    pub fn start(&mut self) -> StartOutcome {
        if self.session.is_some() {
            debug!(target: "equate::machine", "start ignored, session already running");
            return StartOutcome::AlreadyRunning;
        }

        let total = walker::count_targets(&self.host, &self.config.contract);
        if total == 0 {
            debug!(
                target: "equate::machine",
                failure = %StepFailure::NoTargetFound,
                "nothing to convert"
            );
            return StartOutcome::NothingToDo;
        }

        info!(target: "equate::machine", total, "conversion session started");
        self.session = Some(ConversionSession::new(total));
        self.reporter.report_started(total);
        self.drive(Next::Step);
        StartOutcome::Started { total }
    }

    /// Cancel the running session. Returns false if there was none.
    pub fn cancel(&mut self) -> bool {
        if self.session.is_none() {
            return false;
        }
        self.finish(SessionEnd::Cancelled);
        true
    }

    /// Feed back a wake token the host scheduler was asked to deliver.
    pub fn wake(&mut self, wake: Wake) {
        let Some(session) = self.session.as_mut() else {
            trace!(target: "equate::machine", ?wake, "wake without session");
            return;
        };
        let current = session.step;

        let next = match wake {
            Wake::DocumentChanged => {
                session.watcher.notify(&mut self.host, current);
                return;
            }
            Wake::Continue { step } if step == current => {
                session.pause = None;
                self.on_continue()
            }
            Wake::Retry { step } if step == current => {
                session.retry = None;
                self.on_retry()
            }
            Wake::Skip { step } if step == current => {
                session.skip = None;
                Next::Abandon(StepFailure::ConfirmationTimeout)
            }
            Wake::Frame { step } if step == current => {
                let coalesced = session.watcher.frame_fired();
                trace!(target: "equate::machine", step, coalesced, "evaluating document changes");
                self.evaluate()
            }
            stale => {
                trace!(target: "equate::machine", ?stale, current, "dropping stale wake");
                return;
            }
        };
        self.drive(next);
    }

    fn drive(&mut self, mut next: Next) {
        loop {
            next = match next {
                Next::Wait => return,
                Next::Step => self.begin_step(),
                Next::Abandon(failure) => {
                    if let Some(session) = self.session.as_mut() {
                        session.skipped += 1;
                        warn!(
                            target: "equate::machine",
                            step = session.step,
                            %failure,
                            "skipping span"
                        );
                    }
                    Next::Step
                }
                Next::Finish(end) => {
                    self.finish(end);
                    return;
                }
            };
        }
    }

    /// Rescan, focus, and remove the trailing delimiter.
    fn begin_step(&mut self) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        session.next_step(&mut self.host);
        self.host.clear_mark();
        let step = session.step;

        let Some(location) = walker::find_next_target_excluding(
            &self.host,
            &self.config.contract,
            &session.excluded,
        ) else {
            return Next::Finish(SessionEnd::Completed);
        };
        debug!(
            target: "equate::machine",
            step,
            inner = location.span.inner_text(&location.text).unwrap_or_default(),
            display = location.span.display,
            "next span"
        );

        let focused = walker::editable_ancestor(&self.host, &location.node)
            .is_some_and(|editable| self.host.focus(&editable));
        if !focused {
            return self.step_failed(StepFailure::FocusFailure);
        }

        let span = location.span;
        let trailing = EquationSpan::utf16_range(&location.text, span.inner_end..span.close);
        if let Err(err) = self
            .host
            .select_text(&location.node, trailing.start, trailing.end)
            .and_then(|()| self.host.delete_selection())
        {
            warn!(target: "equate::machine", step, %err, "could not remove trailing delimiter");
            return self.step_failed(StepFailure::EditRejected);
        }

        let mut expected = location.text.clone();
        expected.replace_range(span.inner_end..span.close, "");

        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        session.consecutive_failures = 0;
        session.target = Some(ActiveTarget { location, expected });
        session.state = StepState::Editing(EditStage::RemoveLeading);
        session.pause = Some(
            self.host
                .set_timer(self.config.timing.edit_pause(), Wake::Continue { step }),
        );
        Next::Wait
    }

    /// Count a failure to start editing; retry after a pause or abort.
    fn step_failed(&mut self, failure: StepFailure) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        session.consecutive_failures += 1;
        if session.consecutive_failures >= self.config.max_focus_failures {
            warn!(
                target: "equate::machine",
                %failure,
                failures = session.consecutive_failures,
                "too many consecutive failures, aborting"
            );
            return Next::Finish(SessionEnd::Aborted);
        }
        debug!(
            target: "equate::machine",
            %failure,
            failures = session.consecutive_failures,
            "retrying after pause"
        );
        session.state = StepState::Scanning;
        session.pause = Some(self.host.set_timer(
            self.config.timing.focus_retry(),
            Wake::Continue { step: session.step },
        ));
        Next::Wait
    }

    fn on_continue(&mut self) -> Next {
        let Some(session) = self.session.as_ref() else {
            return Next::Wait;
        };
        match session.state {
            StepState::Scanning | StepState::Settling => Next::Step,
            StepState::Editing(EditStage::RemoveLeading) => self.remove_leading(),
            StepState::Editing(EditStage::SelectInner) => self.select_inner(),
            StepState::Editing(EditStage::Dispatch) => self.dispatch(),
            StepState::ConfirmingDialog => self.confirm_dialog(),
            StepState::AwaitingConfirmation => Next::Wait,
        }
    }

    fn remove_leading(&mut self) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        let step = session.step;
        let Some(target) = session.target.as_mut() else {
            return Next::Abandon(StepFailure::StaleTarget);
        };
        if !target
            .location
            .revalidate(&self.host, &self.config.contract, &target.expected)
        {
            return self.lost_opener();
        }

        let span = target.location.span;
        let leading = EquationSpan::utf16_range(&target.expected, span.open..span.inner_start);
        if let Err(err) = self
            .host
            .select_text(&target.location.node, leading.start, leading.end)
            .and_then(|()| self.host.delete_selection())
        {
            warn!(target: "equate::machine", step, %err, "could not remove leading delimiter");
            return Next::Abandon(StepFailure::EditRejected);
        }
        target.expected.replace_range(span.open..span.inner_start, "");

        session.state = StepState::Editing(EditStage::SelectInner);
        session.pause = Some(
            self.host
                .set_timer(self.config.timing.edit_pause(), Wake::Continue { step }),
        );
        Next::Wait
    }

    /// The leaf lost track of after its closing delimiter was deleted.
    ///
    /// Its opener may still be on the page with no closer, where a later
    /// scan would pair it with the next span's opener. Every leaf still
    /// holding the opener and expression is kept out of this session.
    fn lost_opener(&mut self) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        let Some(target) = session.target.take() else {
            return Next::Abandon(StepFailure::StaleTarget);
        };
        let span = target.location.span;
        let fragment = target
            .expected
            .get(span.open..span.inner_end)
            .unwrap_or_default();
        if fragment.is_empty() {
            return Next::Abandon(StepFailure::StaleTarget);
        }

        let holders = walker::leaves_containing(&self.host, &self.config.contract, fragment);
        if !holders.is_empty() {
            warn!(
                target: "equate::machine",
                step = session.step,
                leaves = holders.len(),
                "unpaired opener left behind, excluding its leaves"
            );
        }
        for leaf in holders {
            if !session.excluded.contains(&leaf) {
                session.excluded.push(leaf);
            }
        }
        Next::Abandon(StepFailure::StaleTarget)
    }

    /// Select the bare expression and arm the confirmation race.
    fn select_inner(&mut self) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        let step = session.step;
        let Some(target) = session.target.as_mut() else {
            return Next::Abandon(StepFailure::StaleTarget);
        };
        // Both delimiters are gone, so an unfound leaf leaves nothing to pair.
        if !target
            .location
            .revalidate(&self.host, &self.config.contract, &target.expected)
        {
            return Next::Abandon(StepFailure::StaleTarget);
        }

        let span = target.location.span;
        let inner = EquationSpan::utf16_range(
            &target.expected,
            span.open..span.open + span.inner_len(),
        );
        if let Err(err) = self
            .host
            .select_text(&target.location.node, inner.start, inner.end)
        {
            warn!(target: "equate::machine", step, %err, "could not select expression");
            return Next::Abandon(StepFailure::EditRejected);
        }
        self.host.mark_selection();

        if let Err(err) = session.watcher.arm(&mut self.host) {
            // Timers alone still bound the step.
            warn!(target: "equate::machine", step, %err, "could not observe document changes");
        }
        let timing = self.config.timing;
        session.retry = Some(self.host.set_timer(timing.retry(), Wake::Retry { step }));
        session.skip = Some(self.host.set_timer(timing.skip(), Wake::Skip { step }));

        session.state = StepState::Editing(EditStage::Dispatch);
        session.pause = Some(
            self.host
                .set_timer(timing.dispatch_pause(), Wake::Continue { step }),
        );
        Next::Wait
    }

    fn dispatch(&mut self) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        trace!(target: "equate::machine", step = session.step, "dispatching inline equation chord");
        session.state = StepState::AwaitingConfirmation;
        self.host.dispatch_chord(&self.chord);
        Next::Wait
    }

    fn on_retry(&mut self) -> Next {
        let Some(session) = self.session.as_ref() else {
            return Next::Wait;
        };
        if session.state == StepState::AwaitingConfirmation && !session.dialog_confirmed {
            debug!(
                target: "equate::machine",
                step = session.step,
                "no confirmation yet, re-dispatching chord"
            );
            self.host.dispatch_chord(&self.chord);
        }
        Next::Wait
    }

    /// Look at the document after a burst of changes.
    fn evaluate(&mut self) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        if session.state != StepState::AwaitingConfirmation {
            return Next::Wait;
        }

        if !session.dialog_confirmed
            && dialog::find_dialog(&self.host, &self.config.contract).is_some()
        {
            trace!(target: "equate::machine", step = session.step, "equation dialog detected");
            session.state = StepState::ConfirmingDialog;
            session.pause = Some(self.host.set_timer(
                self.config.timing.dialog_pause(),
                Wake::Continue { step: session.step },
            ));
            return Next::Wait;
        }

        self.check_inline_render()
    }

    /// The modal pause elapsed: re-locate the modal and confirm it.
    fn confirm_dialog(&mut self) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        session.state = StepState::AwaitingConfirmation;
        let step = session.step;

        if let Some(dialog) = dialog::find_dialog(&self.host, &self.config.contract) {
            match dialog::confirm_dialog(
                &mut self.host,
                &dialog,
                &self.config.contract,
                &self.config.confirm_labels,
            ) {
                Some(strategy) => {
                    debug!(target: "equate::machine", step, ?strategy, "equation dialog confirmed");
                    session.dialog_confirmed = true;
                    let settle = self.config.timing.dialog_settle();
                    return self.confirmed(settle);
                }
                None => {
                    warn!(
                        target: "equate::machine",
                        step,
                        failure = %StepFailure::DialogDetectionFailure,
                        "falling back to inline detection"
                    );
                }
            }
        }
        self.check_inline_render()
    }

    fn check_inline_render(&mut self) -> Next {
        if walker::selection_in_rendered_math(&self.host, &self.config.contract) {
            let settle = self.config.timing.inline_settle();
            return self.confirmed(settle);
        }
        Next::Wait
    }

    /// A confirmation won the race: stop the timers, count it, settle.
    fn confirmed(&mut self, settle: std::time::Duration) -> Next {
        let Some(session) = self.session.as_mut() else {
            return Next::Wait;
        };
        session.clear_race(&mut self.host);
        session.watcher.disarm(&mut self.host);
        self.host.clear_mark();

        session.converted += 1;
        session.total = session.total.max(session.converted);
        session.state = StepState::Settling;
        session.pause = Some(self.host.set_timer(settle, Wake::Continue { step: session.step }));
        debug!(
            target: "equate::machine",
            step = session.step,
            converted = session.converted,
            total = session.total,
            "conversion confirmed"
        );
        self.reporter
            .report_progress(session.converted, session.total);
        Next::Wait
    }

    fn finish(&mut self, end: SessionEnd) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.teardown(&mut self.host);
        self.host.clear_mark();

        let summary = session.summary(end);
        info!(
            target: "equate::machine",
            converted = summary.converted,
            skipped = summary.skipped,
            total = summary.total,
            end = ?summary.end,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "conversion session ended"
        );
        self.reporter.report_done(&summary);
        self.last_summary = Some(summary);
    }
}
