//! Shared controller handle wired to the live page.
//!
//! The controller lives in an `Rc<RefCell<_>>`. Host callbacks (timers,
//! frames, mutation records) hold only a weak reference, so dropping the
//! runtime drops everything. A callback that finds the controller already
//! borrowed re-posts itself on a zero-delay timer rather than re-entering.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use equate_core::{
    Controller, ConverterConfig, HostError, Lifecycle, ProgressReporter, SessionSummary,
    StartOutcome, Wake,
};
use gloo_events::EventListener;
use gloo_timers::callback::Timeout;

use crate::dom::DomHost;
use crate::events;
use crate::platform::platform;
use crate::schedule::WakeSink;

type Shared<R> = Rc<RefCell<Controller<DomHost, R>>>;
type WeakShared<R> = Weak<RefCell<Controller<DomHost, R>>>;

fn wake_sink<R: ProgressReporter + 'static>(weak: WeakShared<R>) -> WakeSink {
    Rc::new(move |wake: Wake| deliver(&weak, wake))
}

fn deliver<R: ProgressReporter + 'static>(weak: &WeakShared<R>, wake: Wake) {
    let Some(controller) = weak.upgrade() else {
        return;
    };
    match controller.try_borrow_mut() {
        Ok(mut controller) => controller.wake(wake),
        Err(_) => {
            tracing::trace!(target: "equate::runtime", ?wake, "controller busy, re-posting wake");
            let weak = weak.clone();
            Timeout::new(0, move || deliver(&weak, wake)).forget();
        }
    };
}

/// The converter bound to the current page.
pub struct Runtime<R: ProgressReporter + 'static> {
    controller: Shared<R>,
    _cancel: EventListener,
}

impl<R: ProgressReporter + 'static> Runtime<R> {
    /// Bind a controller to the current window and install the cancel key.
    pub fn new(reporter: R, config: ConverterConfig) -> Result<Self, HostError> {
        let window = web_sys::window().ok_or(HostError::NoDocument)?;
        let document = window.document().ok_or(HostError::NoDocument)?;
        let modifier = platform().primary_modifier();
        let cancel_key = config.cancel_key.clone();

        let host_document = document.clone();
        let controller: Shared<R> = Rc::new_cyclic(move |weak| {
            let host = DomHost::new(window, host_document, wake_sink(weak.clone()));
            RefCell::new(Controller::new(host, reporter, config, modifier))
        });

        let chord = controller.borrow().chord().clone();
        let weak = Rc::downgrade(&controller);
        let cancel = events::cancel_listener(&document, chord, cancel_key, move || {
            let Some(controller) = weak.upgrade() else {
                return false;
            };
            controller.try_borrow_mut().is_ok_and(|mut c| c.cancel())
        });

        tracing::debug!(target: "equate::runtime", ?modifier, "runtime bound to page");
        Ok(Self {
            controller,
            _cancel: cancel,
        })
    }

    /// Start a session. A request while one runs is ignored.
    pub fn start(&self) -> StartOutcome {
        match self.controller.try_borrow_mut() {
            Ok(mut controller) => controller.start(),
            Err(_) => StartOutcome::AlreadyRunning,
        }
    }

    pub fn cancel(&self) -> bool {
        self.controller
            .try_borrow_mut()
            .map(|mut c| c.cancel())
            .unwrap_or(false)
    }

    pub fn is_running(&self) -> bool {
        self.controller
            .try_borrow()
            .map(|c| c.is_running())
            .unwrap_or(true)
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.controller
            .try_borrow()
            .map(|c| c.lifecycle())
            .unwrap_or(Lifecycle::Scanning)
    }

    pub fn progress(&self) -> Option<(usize, usize)> {
        self.controller.try_borrow().ok()?.progress()
    }

    pub fn last_summary(&self) -> Option<SessionSummary> {
        self.controller.try_borrow().ok()?.last_summary().cloned()
    }

    pub fn config(&self) -> Option<ConverterConfig> {
        self.controller
            .try_borrow()
            .ok()
            .map(|c| c.config().clone())
    }
}
