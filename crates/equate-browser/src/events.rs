//! Keyboard handling while a session runs.

use equate_core::{KeyChord, is_cancel_key};
use gloo_events::{EventListener, EventListenerOptions, EventListenerPhase};
use wasm_bindgen::JsCast;
use web_sys::{Element, EventTarget, KeyboardEvent};

/// What a keydown means to the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyIntent {
    /// Stop the running session.
    Cancel,
    /// Our own synthetic chord, or anything else: leave it alone.
    Ignore,
}

/// Classify a keydown event.
///
/// The synthetic inline-equation chord passes through untouched so the host
/// still receives it.
pub fn classify_keydown(event: &KeyboardEvent, chord: &KeyChord, cancel_key: &str) -> KeyIntent {
    let key = event.key();
    if chord.matches(
        &key,
        event.shift_key(),
        event.ctrl_key(),
        event.meta_key(),
        event.alt_key(),
    ) {
        return KeyIntent::Ignore;
    }
    let tag = event
        .target()
        .and_then(|t| t.dyn_into::<Element>().ok())
        .map(|el| el.tag_name());
    if is_cancel_key(cancel_key, &key, tag.as_deref()) {
        KeyIntent::Cancel
    } else {
        KeyIntent::Ignore
    }
}

/// Listen for keydown in the capture phase, ahead of the host's own handlers.
///
/// `on_cancel` returns whether it stopped a session; only then is the
/// event's default prevented.
pub fn cancel_listener<F>(
    target: &EventTarget,
    chord: KeyChord,
    cancel_key: String,
    on_cancel: F,
) -> EventListener
where
    F: Fn() -> bool + 'static,
{
    let options = EventListenerOptions {
        phase: EventListenerPhase::Capture,
        passive: false,
    };
    EventListener::new_with_options(target, "keydown", options, move |event| {
        let Some(event) = event.dyn_ref::<KeyboardEvent>() else {
            return;
        };
        if classify_keydown(event, &chord, &cancel_key) == KeyIntent::Cancel && on_cancel() {
            tracing::debug!(target: "equate::events", "session cancelled from keyboard");
            event.prevent_default();
        }
    })
}
