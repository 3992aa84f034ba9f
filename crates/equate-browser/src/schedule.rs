//! Timers, animation frames and document observation for the controller.
//!
//! Every callback funnels into one [`WakeSink`]; the scheduler itself never
//! touches the controller.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use equate_core::{HostError, Wake};
use gloo_timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, MutationObserver, MutationObserverInit, Window};

/// Where fired timers, frames and change notifications are delivered.
pub type WakeSink = Rc<dyn Fn(Wake)>;

/// Handle to a scheduled timer or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

enum TaskKind {
    Timer(Timeout),
    Frame {
        id: i32,
        _callback: Closure<dyn FnMut()>,
    },
}

struct Task {
    fired: Rc<Cell<bool>>,
    kind: TaskKind,
}

struct Observation {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, MutationObserver)>,
}

/// Browser-backed scheduling services.
pub struct BrowserScheduler {
    window: Window,
    document: Document,
    sink: WakeSink,
    next_id: u64,
    tasks: HashMap<u64, Task>,
    observation: Option<Observation>,
}

impl BrowserScheduler {
    pub fn new(window: Window, document: Document, sink: WakeSink) -> Self {
        Self {
            window,
            document,
            sink,
            next_id: 0,
            tasks: HashMap::new(),
            observation: None,
        }
    }

    /// Number of timers and frames that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.values().filter(|t| !t.fired.get()).count()
    }

    fn insert(&mut self, fired: Rc<Cell<bool>>, kind: TaskKind) -> TaskHandle {
        // Fired tasks are only dropped here, never from inside their callback.
        self.tasks.retain(|_, task| !task.fired.get());
        self.next_id += 1;
        self.tasks.insert(self.next_id, Task { fired, kind });
        TaskHandle(self.next_id)
    }

    fn deliver(&self, wake: Wake) -> (Rc<Cell<bool>>, impl FnOnce() + 'static) {
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let sink = self.sink.clone();
        (fired, move || {
            flag.set(true);
            sink(wake);
        })
    }

    pub fn set_timer(&mut self, delay: Duration, wake: Wake) -> TaskHandle {
        let millis = u32::try_from(delay.as_millis()).unwrap_or(u32::MAX);
        let (fired, callback) = self.deliver(wake);
        let timeout = Timeout::new(millis, callback);
        self.insert(fired, TaskKind::Timer(timeout))
    }

    pub fn request_frame(&mut self, wake: Wake) -> TaskHandle {
        let (fired, callback) = self.deliver(wake);
        let callback = Closure::once(callback);
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(id) => self.insert(
                fired,
                TaskKind::Frame {
                    id,
                    _callback: callback,
                },
            ),
            Err(err) => {
                // Background tabs may refuse frames; a short timer stands in.
                tracing::debug!(target: "equate::schedule", ?err, "animation frame unavailable");
                drop(callback);
                self.set_timer(Duration::from_millis(16), wake)
            }
        }
    }

    pub fn cancel(&mut self, handle: TaskHandle) {
        let Some(task) = self.tasks.remove(&handle.0) else {
            return;
        };
        match task.kind {
            TaskKind::Timer(timeout) => {
                timeout.cancel();
            }
            TaskKind::Frame { id, .. } => {
                if let Err(err) = self.window.cancel_animation_frame(id) {
                    tracing::trace!(
                        target: "equate::schedule",
                        ?err,
                        "cancel_animation_frame failed"
                    );
                }
            }
        }
    }

    pub fn observe_document(&mut self) -> Result<(), HostError> {
        self.disconnect_document();
        let root = self
            .document
            .document_element()
            .ok_or(HostError::NoDocument)?;

        let sink = self.sink.clone();
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(
            move |_records: js_sys::Array, _observer: MutationObserver| {
                sink(Wake::DocumentChanged);
            },
        );
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| HostError::dom(format!("MutationObserver: {e:?}")))?;

        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        init.set_character_data(true);
        init.set_attributes(true);
        observer
            .observe_with_options(&root, &init)
            .map_err(|e| HostError::dom(format!("observe: {e:?}")))?;

        self.observation = Some(Observation {
            observer,
            _callback: callback,
        });
        Ok(())
    }

    pub fn disconnect_document(&mut self) {
        if let Some(observation) = self.observation.take() {
            observation.observer.disconnect();
        }
    }

    pub fn is_observing(&self) -> bool {
        self.observation.is_some()
    }
}

impl Drop for BrowserScheduler {
    fn drop(&mut self) {
        self.disconnect_document();
        let handles: Vec<u64> = self.tasks.keys().copied().collect();
        for handle in handles {
            self.cancel(TaskHandle(handle));
        }
    }
}
