//! Coalescing of host document change notifications.
//!
//! The host re-renders in bursts: one conversion can produce dozens of
//! change records across several notification callbacks. The watcher turns
//! each burst into a single evaluation on the next animation frame.

use crate::error::HostError;
use crate::platform::{Scheduler, Wake};

/// Per-session subscription state, re-armed at the start of every step.
#[derive(Debug)]
pub struct MutationWatcher<H> {
    armed: bool,
    frame: Option<H>,
    coalesced: u32,
}

impl<H> Default for MutationWatcher<H> {
    fn default() -> Self {
        Self {
            armed: false,
            frame: None,
            coalesced: 0,
        }
    }
}

impl<H> MutationWatcher<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Whether an evaluation frame is pending.
    pub fn frame_pending(&self) -> bool {
        self.frame.is_some()
    }

    /// Tear down any previous subscription and start a fresh observation window.
    pub fn arm<S>(&mut self, scheduler: &mut S) -> Result<(), HostError>
    where
        S: Scheduler<Handle = H>,
    {
        self.disarm(scheduler);
        scheduler.observe_document()?;
        self.armed = true;
        Ok(())
    }

    /// Stop observing and drop any pending evaluation.
    pub fn disarm<S>(&mut self, scheduler: &mut S)
    where
        S: Scheduler<Handle = H>,
    {
        if let Some(frame) = self.frame.take() {
            scheduler.cancel(frame);
        }
        if self.armed {
            scheduler.disconnect_document();
            self.armed = false;
        }
        self.coalesced = 0;
    }

    /// Record a change notification. Schedules an evaluation frame for
    /// `step` unless one is already pending; returns whether it did.
    pub fn notify<S>(&mut self, scheduler: &mut S, step: u64) -> bool
    where
        S: Scheduler<Handle = H>,
    {
        if !self.armed {
            return false;
        }
        self.coalesced += 1;
        if self.frame.is_some() {
            return false;
        }
        self.frame = Some(scheduler.request_frame(Wake::Frame { step }));
        true
    }

    /// The evaluation frame fired. Returns how many notifications it covers.
    pub fn frame_fired(&mut self) -> u32 {
        self.frame = None;
        std::mem::take(&mut self.coalesced)
    }
}
