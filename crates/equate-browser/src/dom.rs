//! The live page as a conversion host.
//!
//! Implements the core's document and editing traits over `web-sys`. All
//! selection offsets arriving here are UTF-16 code units, as DOM ranges
//! expect.

use std::time::Duration;

use equate_core::{DocumentTree, EditSurface, HostError, KeyChord, Scheduler, Wake};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use web_sys::{
    Document, Element, EventTarget, HtmlDocument, HtmlElement, InputEvent, InputEventInit,
    KeyboardEvent, KeyboardEventInit, Node, NodeList, Selection, Window,
};

use crate::schedule::{BrowserScheduler, TaskHandle, WakeSink};
use crate::style;

/// `NodeFilter.SHOW_TEXT`
const SHOW_TEXT: u32 = 0x4;

fn describe(err: JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{err:?}"))
}

fn selection_err(err: JsValue) -> HostError {
    HostError::Selection(describe(err))
}

fn dom_err(err: JsValue) -> HostError {
    HostError::dom(describe(err))
}

fn collect_nodes(list: Result<NodeList, JsValue>, selector: &str) -> Vec<Node> {
    match list {
        Ok(list) => (0..list.length()).filter_map(|i| list.item(i)).collect(),
        Err(err) => {
            tracing::warn!(
                target: "equate::dom",
                selector,
                err = %describe(err),
                "selector rejected"
            );
            Vec::new()
        }
    }
}

/// Browser host: the page document, its selection and the scheduler.
pub struct DomHost {
    window: Window,
    document: Document,
    mark: Option<HtmlElement>,
    scheduler: BrowserScheduler,
}

impl DomHost {
    pub fn new(window: Window, document: Document, sink: WakeSink) -> Self {
        let scheduler = BrowserScheduler::new(window.clone(), document.clone(), sink);
        Self {
            window,
            document,
            mark: None,
            scheduler,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn scheduler(&self) -> &BrowserScheduler {
        &self.scheduler
    }

    fn selection(&self) -> Result<Selection, HostError> {
        self.window
            .get_selection()
            .map_err(selection_err)?
            .ok_or_else(|| HostError::Selection("no selection object".into()))
    }

    /// Where focus-relative events go: the active element, else the body.
    fn active_target(&self) -> Option<EventTarget> {
        self.document
            .active_element()
            .map(EventTarget::from)
            .or_else(|| self.document.body().map(EventTarget::from))
    }

    fn mark_element(&mut self) -> Option<HtmlElement> {
        if let Some(mark) = &self.mark {
            return Some(mark.clone());
        }
        let mark: HtmlElement = self.document.create_element("div").ok()?.dyn_into().ok()?;
        mark.set_attribute("data-equate-mark", "").ok()?;
        style::apply(&mark, &style::overlay_base());
        let border = format!("2px solid {}", style::rgba_u32_to_css(style::MARK_COLOR));
        style::apply(
            &mark,
            &[
                ("border", border.as_str()),
                ("border-radius", "4px"),
                ("background", "transparent"),
            ],
        );
        self.document
            .document_element()?
            .append_child(&mark)
            .ok()?;
        self.mark = Some(mark.clone());
        Some(mark)
    }
}

impl DocumentTree for DomHost {
    type Node = Node;

    fn query_all(&self, selector: &str) -> Vec<Node> {
        collect_nodes(self.document.query_selector_all(selector), selector)
    }

    fn query_within(&self, root: &Node, selector: &str) -> Vec<Node> {
        match root.dyn_ref::<Element>() {
            Some(element) => collect_nodes(element.query_selector_all(selector), selector),
            None => Vec::new(),
        }
    }

    fn body(&self) -> Option<Node> {
        self.document.body().map(Node::from)
    }

    fn contains(&self, ancestor: &Node, node: &Node) -> bool {
        ancestor.contains(Some(node))
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn text_leaves(&self, root: &Node) -> Vec<Node> {
        let walker = match self
            .document
            .create_tree_walker_with_what_to_show(root, SHOW_TEXT)
        {
            Ok(walker) => walker,
            Err(err) => {
                tracing::warn!(
                    target: "equate::dom",
                    err = %describe(err),
                    "create_tree_walker failed"
                );
                return Vec::new();
            }
        };
        let mut leaves = Vec::new();
        while let Ok(Some(node)) = walker.next_node() {
            leaves.push(node);
        }
        leaves
    }

    fn text(&self, node: &Node) -> Option<String> {
        if node.node_type() != Node::TEXT_NODE {
            return None;
        }
        Some(node.node_value().unwrap_or_default())
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn parent_element(&self, node: &Node) -> Option<Node> {
        node.parent_element().map(Node::from)
    }

    fn is_editable(&self, element: &Node) -> bool {
        element
            .dyn_ref::<HtmlElement>()
            .is_some_and(HtmlElement::is_content_editable)
    }

    fn closest(&self, element: &Node, selector: &str) -> Option<Node> {
        element
            .dyn_ref::<Element>()?
            .closest(selector)
            .ok()
            .flatten()
            .map(Node::from)
    }
}

impl EditSurface for DomHost {
    fn focus(&mut self, element: &Node) -> bool {
        let Some(html) = element.dyn_ref::<HtmlElement>() else {
            return false;
        };
        match html.focus() {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(target: "equate::dom", err = %describe(err), "focus rejected");
                false
            }
        }
    }

    fn select_text(&mut self, node: &Node, start: u32, end: u32) -> Result<(), HostError> {
        if !node.is_connected() {
            return Err(HostError::Detached);
        }
        let range = self.document.create_range().map_err(selection_err)?;
        range.set_start(node, start).map_err(selection_err)?;
        range.set_end(node, end).map_err(selection_err)?;

        let selection = self.selection()?;
        selection.remove_all_ranges().map_err(selection_err)?;
        selection.add_range(&range).map_err(selection_err)?;
        tracing::trace!(target: "equate::dom", start, end, "selection set");
        Ok(())
    }

    fn delete_selection(&mut self) -> Result<(), HostError> {
        let html = self
            .document
            .dyn_ref::<HtmlDocument>()
            .ok_or_else(|| HostError::dom("document does not support editing commands"))?;
        if !html.exec_command("delete").map_err(dom_err)? {
            return Err(HostError::dom("delete command was not applied"));
        }

        // Editors that listen to `input` rather than mutations need to hear about it.
        let init = InputEventInit::new();
        init.set_bubbles(true);
        init.set_input_type("deleteContent");
        let event = InputEvent::new_with_event_init_dict("input", &init).map_err(dom_err)?;
        if let Some(target) = self.active_target() {
            target.dispatch_event(&event).map_err(dom_err)?;
        }
        Ok(())
    }

    fn selection_anchor(&self) -> Option<Node> {
        self.selection().ok()?.anchor_node()
    }

    fn mark_selection(&mut self) {
        let rect = self
            .selection()
            .ok()
            .filter(|s| s.range_count() > 0)
            .and_then(|s| s.get_range_at(0).ok())
            .and_then(|range| range.get_client_rects())
            .and_then(|rects| rects.get(0));
        let Some(mark) = self.mark_element() else {
            return;
        };
        let Some(rect) = rect else {
            style::apply(&mark, &[("display", "none")]);
            return;
        };
        let left = format!("{}px", rect.left() - 2.0);
        let top = format!("{}px", rect.top() - 2.0);
        let width = format!("{}px", rect.width() + 4.0);
        let height = format!("{}px", rect.height() + 4.0);
        style::apply(
            &mark,
            &[
                ("left", left.as_str()),
                ("top", top.as_str()),
                ("width", width.as_str()),
                ("height", height.as_str()),
                ("display", "block"),
            ],
        );
    }

    fn clear_mark(&mut self) {
        if let Some(mark) = &self.mark {
            style::apply(mark, &[("display", "none")]);
        }
    }

    fn dispatch_chord(&mut self, chord: &KeyChord) {
        match self.active_target() {
            Some(target) => dispatch_key_pair(&target, chord),
            None => tracing::warn!(target: "equate::dom", "no element to receive the chord"),
        }
    }

    fn dispatch_chord_at(&mut self, target: &Node, chord: &KeyChord) {
        dispatch_key_pair(target, chord);
    }

    fn click(&mut self, element: &Node) {
        match element.dyn_ref::<HtmlElement>() {
            Some(html) => html.click(),
            None => tracing::debug!(target: "equate::dom", "click target is not an HTML element"),
        }
    }
}

/// Fire keydown then keyup for `chord` at `target`.
pub fn dispatch_key_pair(target: &EventTarget, chord: &KeyChord) {
    for kind in ["keydown", "keyup"] {
        let init = KeyboardEventInit::new();
        init.set_key(&chord.key);
        init.set_code(&chord.code);
        init.set_key_code(chord.key_code);
        init.set_which(chord.key_code);
        init.set_shift_key(chord.shift);
        init.set_ctrl_key(chord.ctrl);
        init.set_meta_key(chord.meta);
        init.set_alt_key(chord.alt);
        init.set_bubbles(true);
        init.set_cancelable(true);
        init.set_composed(true);

        let dispatched = KeyboardEvent::new_with_keyboard_event_init_dict(kind, &init)
            .and_then(|event| target.dispatch_event(&event));
        if let Err(err) = dispatched {
            tracing::warn!(
                target: "equate::dom",
                kind,
                key = %chord.key,
                err = %describe(err),
                "key dispatch failed"
            );
        }
    }
}

impl Scheduler for DomHost {
    type Handle = TaskHandle;

    fn set_timer(&mut self, delay: Duration, wake: Wake) -> TaskHandle {
        self.scheduler.set_timer(delay, wake)
    }

    fn request_frame(&mut self, wake: Wake) -> TaskHandle {
        self.scheduler.request_frame(wake)
    }

    fn cancel(&mut self, handle: TaskHandle) {
        self.scheduler.cancel(handle);
    }

    fn observe_document(&mut self) -> Result<(), HostError> {
        self.scheduler.observe_document()
    }

    fn disconnect_document(&mut self) {
        self.scheduler.disconnect_document();
    }
}

impl Drop for DomHost {
    fn drop(&mut self) {
        if let Some(mark) = self.mark.take() {
            mark.remove();
        }
    }
}
