//! In-memory host for tests: a small element tree, a selector matcher that
//! covers the selectors the contract uses, and a virtual clock.

use std::time::Duration;

use crate::error::HostError;
use crate::keys::KeyChord;
use crate::platform::{DocumentTree, EditSurface, ProgressReporter, Scheduler, Wake};
use crate::session::SessionSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone)]
enum Kind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    kind: Kind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed document. Node 0 is `html`, node 1 is `body`.
#[derive(Debug, Clone)]
pub struct FakeDoc {
    nodes: Vec<Node>,
}

const HTML: NodeId = NodeId(0);
const BODY: NodeId = NodeId(1);

impl Default for FakeDoc {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDoc {
    pub fn new() -> Self {
        let mut doc = Self { nodes: Vec::new() };
        doc.push(
            None,
            Kind::Element {
                tag: "html".into(),
                attrs: Vec::new(),
            },
        );
        doc.push(
            Some(HTML),
            Kind::Element {
                tag: "body".into(),
                attrs: Vec::new(),
            },
        );
        doc
    }

    pub fn body(&self) -> NodeId {
        BODY
    }

    fn push(&mut self, parent: Option<NodeId>, kind: Kind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            kind,
            parent,
            children: Vec::new(),
        });
        if let Some(p) = parent {
            self.nodes[p.0].children.push(id);
        }
        id
    }

    pub fn element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let attrs = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.push(
            Some(parent),
            Kind::Element {
                tag: tag.to_ascii_lowercase(),
                attrs,
            },
        )
    }

    pub fn text(&mut self, parent: NodeId, text: &str) -> NodeId {
        self.push(Some(parent), Kind::Text(text.to_string()))
    }

    pub fn set_text(&mut self, leaf: NodeId, text: &str) {
        if let Kind::Text(t) = &mut self.nodes[leaf.0].kind {
            *t = text.to_string();
        }
    }

    /// Remove a node (and its subtree) from its parent.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            Kind::Element { tag, .. } => Some(tag),
            Kind::Text(_) => None,
        }
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node.0].kind {
            Kind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            Kind::Text(_) => None,
        }
    }

    pub fn leaf_text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node.0].kind {
            Kind::Text(t) => Some(t),
            Kind::Element { .. } => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.ancestors(node).any(|n| n == HTML)
    }

    /// `node` and its ancestors, nearest first.
    fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(node), |n| self.nodes[n.0].parent)
    }

    /// Descendants of `root` in document order, excluding `root`.
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[root.0].children.iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.nodes[n.0].children.iter().rev().copied());
        }
        out
    }

    fn text_content(&self, node: NodeId) -> String {
        if let Some(t) = self.leaf_text(node) {
            return t.to_string();
        }
        self.descendants(node)
            .into_iter()
            .filter_map(|n| self.leaf_text(n))
            .collect()
    }

    fn insert_after(&mut self, anchor: NodeId, node: NodeId) {
        let Some(parent) = self.nodes[anchor.0].parent else {
            return;
        };
        if let Some(old) = self.nodes[node.0].parent.take() {
            self.nodes[old.0].children.retain(|c| *c != node);
        }
        let siblings = &mut self.nodes[parent.0].children;
        let at = siblings
            .iter()
            .position(|c| *c == anchor)
            .map_or(siblings.len(), |i| i + 1);
        siblings.insert(at, node);
        self.nodes[node.0].parent = Some(parent);
    }

    /// Split `start..end` (UTF-16) out of a text leaf into a rendered
    /// equation. Returns the text node inside the rendered math.
    pub fn wrap_math(&mut self, leaf: NodeId, start: u32, end: u32) -> Option<NodeId> {
        let text = self.leaf_text(leaf)?.to_string();
        let start = byte_offset(&text, start)?;
        let end = byte_offset(&text, end)?;
        let parent = self.parent(leaf)?;

        self.set_text(leaf, &text[..start]);
        let math = self.element(parent, "span", &[("class", "notion-equation")]);
        self.insert_after(leaf, math);
        let katex = self.element(math, "span", &[("class", "katex")]);
        let rendered = self.text(katex, &text[start..end]);
        if end < text.len() {
            let rest = self.text(parent, &text[end..]);
            self.insert_after(math, rest);
        }
        Some(rendered)
    }

    /// Text of every rendered equation, in document order.
    pub fn math_texts(&self) -> Vec<String> {
        self.descendants(HTML)
            .into_iter()
            .filter(|n| self.matches(*n, ".notion-equation"))
            .map(|n| self.text_content(n))
            .collect()
    }

    /// Concatenated text of the body.
    pub fn body_text(&self) -> String {
        self.text_content(BODY)
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        selector
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .any(|alt| self.matches_chain(node, &split_compounds(alt)))
    }

    /// Right-to-left descendant-combinator matching.
    fn matches_chain(&self, node: NodeId, chain: &[&str]) -> bool {
        let Some((last, rest)) = chain.split_last() else {
            return false;
        };
        if !self.matches_compound(node, last) {
            return false;
        }
        let mut remaining = rest;
        let mut current = self.parent(node);
        while let Some((want, before)) = remaining.split_last() {
            loop {
                let Some(n) = current else {
                    return false;
                };
                current = self.parent(n);
                if self.matches_compound(n, want) {
                    break;
                }
            }
            remaining = before;
        }
        true
    }

    fn matches_compound(&self, node: NodeId, compound: &str) -> bool {
        let Some(tag) = self.tag(node) else {
            return false;
        };
        let (name, mut rest) = split_tag(compound);
        if !name.is_empty() && !name.eq_ignore_ascii_case(tag) {
            return false;
        }
        while !rest.is_empty() {
            if let Some(after) = rest.strip_prefix('.') {
                let len = after.find(['.', '[']).unwrap_or(after.len());
                let class = &after[..len];
                let has = self
                    .attr(node, "class")
                    .is_some_and(|c| c.split_whitespace().any(|x| x == class));
                if !has {
                    return false;
                }
                rest = &after[len..];
            } else if let Some(after) = rest.strip_prefix('[') {
                let Some(close) = after.find(']') else {
                    return false;
                };
                let body = &after[..close];
                let ok = match body.split_once('=') {
                    Some((k, v)) => self.attr(node, k.trim()) == Some(v.trim().trim_matches('"')),
                    None => self.attr(node, body.trim()).is_some(),
                };
                if !ok {
                    return false;
                }
                rest = &after[close + 1..];
            } else {
                return false;
            }
        }
        true
    }
}

/// Split a selector alternative on whitespace outside attribute brackets.
fn split_compounds(selector: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, c) in selector.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&selector[s..i]);
                }
                continue;
            }
            _ => {}
        }
        start.get_or_insert(i);
    }
    if let Some(s) = start {
        out.push(&selector[s..]);
    }
    out
}

fn split_tag(compound: &str) -> (&str, &str) {
    let at = compound.find(['.', '[']).unwrap_or(compound.len());
    compound.split_at(at)
}

fn byte_offset(text: &str, utf16: u32) -> Option<usize> {
    let mut units = 0u32;
    for (i, c) in text.char_indices() {
        if units == utf16 {
            return Some(i);
        }
        units += c.len_utf16() as u32;
    }
    (units == utf16).then_some(text.len())
}

/// How the fake host reacts to the inline-equation chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBehavior {
    /// Render the selection in place and move the caret into it.
    Inline,
    /// Open a modal; confirming it renders the selection.
    Dialog,
    /// Do nothing.
    Ignore,
}

/// Observable side effects, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Focused(NodeId),
    Selected { node: NodeId, start: u32, end: u32 },
    Deleted(String),
    Marked,
    Chord(KeyChord),
    ChordAt(NodeId, KeyChord),
    Clicked(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerId(u64);

#[derive(Debug, Clone)]
struct Pending {
    at: Duration,
    seq: u64,
    id: TimerId,
    wake: Wake,
}

#[derive(Debug, Clone, Copy)]
struct OpenDialog {
    dialog: NodeId,
    leaf: NodeId,
    start: u32,
    end: u32,
}

const FRAME: Duration = Duration::from_millis(16);

#[derive(Debug)]
pub struct FakeHost {
    doc: FakeDoc,
    behavior: HostBehavior,
    drop_chords: u32,
    refuse_focus: u32,
    focused: Option<NodeId>,
    selection: Option<(NodeId, u32, u32)>,
    marked: bool,
    observing: bool,
    dialog: Option<OpenDialog>,
    events: Vec<HostEvent>,
    now: Duration,
    seq: u64,
    queue: Vec<Pending>,
}

impl FakeHost {
    pub fn new(doc: FakeDoc) -> Self {
        Self {
            doc,
            behavior: HostBehavior::Ignore,
            drop_chords: 0,
            refuse_focus: 0,
            focused: None,
            selection: None,
            marked: false,
            observing: false,
            dialog: None,
            events: Vec::new(),
            now: Duration::ZERO,
            seq: 0,
            queue: Vec::new(),
        }
    }

    pub fn with_behavior(mut self, behavior: HostBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Ignore the first `n` chords, as a host that is still busy would.
    pub fn drop_first_chords(mut self, n: u32) -> Self {
        self.drop_chords = n;
        self
    }

    /// Refuse the next `n` focus requests.
    pub fn refuse_focus(mut self, n: u32) -> Self {
        self.refuse_focus = n;
        self
    }

    pub fn doc(&self) -> &FakeDoc {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut FakeDoc {
        &mut self.doc
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn chord_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, HostEvent::Chord(_)))
            .count()
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn is_marked(&self) -> bool {
        self.marked
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Wakes still queued, in delivery order.
    pub fn pending_wakes(&self) -> Vec<Wake> {
        let mut queue = self.queue.clone();
        queue.sort_by_key(|p| (p.at, p.seq));
        queue.into_iter().map(|p| p.wake).collect()
    }

    /// Advance the clock to the earliest queued wake and take it.
    pub fn next_wake(&mut self) -> Option<Wake> {
        let (index, _) = self
            .queue
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.at, p.seq))?;
        let pending = self.queue.remove(index);
        self.now = self.now.max(pending.at);
        Some(pending.wake)
    }

    /// Like [`FakeHost::next_wake`], but only for wakes due by `deadline`.
    pub fn next_wake_until(&mut self, deadline: Duration) -> Option<Wake> {
        let due = self.queue.iter().any(|p| p.at <= deadline);
        if due {
            self.next_wake()
        } else {
            self.now = self.now.max(deadline);
            None
        }
    }

    fn enqueue(&mut self, at: Duration, wake: Wake) -> TimerId {
        self.seq += 1;
        let id = TimerId(self.seq);
        self.queue.push(Pending { at, seq: self.seq, id, wake });
        id
    }

    /// The document changed through the host's own editing.
    fn touched(&mut self) {
        if self.observing {
            self.enqueue(self.now, Wake::DocumentChanged);
        }
    }

    fn on_chord(&mut self) {
        if self.drop_chords > 0 {
            self.drop_chords -= 1;
            return;
        }
        let Some((leaf, start, end)) = self.selection else {
            return;
        };
        match self.behavior {
            HostBehavior::Ignore => {}
            HostBehavior::Inline => {
                if let Some(rendered) = self.doc.wrap_math(leaf, start, end) {
                    let len = self
                        .doc
                        .leaf_text(rendered)
                        .map_or(0, |t| t.encode_utf16().count());
                    self.selection = Some((rendered, 0, len as u32));
                    self.touched();
                }
            }
            HostBehavior::Dialog => {
                if self.dialog.is_some() {
                    return;
                }
                let expr = self
                    .doc
                    .leaf_text(leaf)
                    .and_then(|t| {
                        let range = byte_offset(t, start)?..byte_offset(t, end)?;
                        t.get(range).map(str::to_string)
                    })
                    .unwrap_or_default();
                let body = self.doc.body();
                let dialog = self.doc.element(body, "div", &[("role", "dialog")]);
                let input = self.doc.element(
                    dialog,
                    "div",
                    &[
                        ("contenteditable", "true"),
                        ("data-content-editable-leaf", "true"),
                    ],
                );
                self.doc.text(input, &expr);
                let cancel = self.doc.element(dialog, "div", &[("role", "button")]);
                self.doc.text(cancel, "Cancel");
                let done = self.doc.element(dialog, "div", &[("role", "button")]);
                self.doc.text(done, "Done");
                self.dialog = Some(OpenDialog { dialog, leaf, start, end });
                self.touched();
            }
        }
    }

    fn close_dialog(&mut self, convert: bool) {
        let Some(open) = self.dialog.take() else {
            return;
        };
        self.doc.detach(open.dialog);
        if convert {
            if let Some(rendered) = self.doc.wrap_math(open.leaf, open.start, open.end) {
                self.selection = Some((rendered, 0, 0));
            }
        }
        self.touched();
    }

    fn in_dialog(&self, node: NodeId) -> bool {
        self.dialog
            .is_some_and(|d| self.doc.ancestors(node).any(|n| n == d.dialog))
    }
}

impl DocumentTree for FakeHost {
    type Node = NodeId;

    fn query_all(&self, selector: &str) -> Vec<NodeId> {
        let mut all = vec![HTML];
        all.extend(self.doc.descendants(HTML));
        all.into_iter()
            .filter(|n| self.doc.matches(*n, selector))
            .collect()
    }

    fn query_within(&self, root: &NodeId, selector: &str) -> Vec<NodeId> {
        self.doc
            .descendants(*root)
            .into_iter()
            .filter(|n| self.doc.matches(*n, selector))
            .collect()
    }

    fn body(&self) -> Option<NodeId> {
        Some(BODY)
    }

    fn contains(&self, ancestor: &NodeId, node: &NodeId) -> bool {
        self.doc.ancestors(*node).any(|n| n == *ancestor)
    }

    fn is_connected(&self, node: &NodeId) -> bool {
        self.doc.is_connected(*node)
    }

    fn text_leaves(&self, root: &NodeId) -> Vec<NodeId> {
        self.doc
            .descendants(*root)
            .into_iter()
            .filter(|n| self.doc.leaf_text(*n).is_some())
            .collect()
    }

    fn text(&self, node: &NodeId) -> Option<String> {
        self.doc.leaf_text(*node).map(str::to_string)
    }

    fn text_content(&self, node: &NodeId) -> String {
        self.doc.text_content(*node)
    }

    fn parent_element(&self, node: &NodeId) -> Option<NodeId> {
        self.doc.parent(*node)
    }

    fn is_editable(&self, element: &NodeId) -> bool {
        self.doc
            .ancestors(*element)
            .find_map(|n| self.doc.attr(n, "contenteditable"))
            .is_some_and(|v| matches!(v, "" | "true" | "plaintext-only"))
    }

    fn closest(&self, element: &NodeId, selector: &str) -> Option<NodeId> {
        self.doc
            .ancestors(*element)
            .find(|n| self.doc.matches(*n, selector))
    }
}

impl EditSurface for FakeHost {
    fn focus(&mut self, element: &NodeId) -> bool {
        if self.refuse_focus > 0 {
            self.refuse_focus -= 1;
            return false;
        }
        if !self.doc.is_connected(*element) {
            return false;
        }
        self.focused = Some(*element);
        self.events.push(HostEvent::Focused(*element));
        true
    }

    fn select_text(&mut self, node: &NodeId, start: u32, end: u32) -> Result<(), HostError> {
        if !self.doc.is_connected(*node) {
            return Err(HostError::Detached);
        }
        let text = self
            .doc
            .leaf_text(*node)
            .ok_or_else(|| HostError::Selection("not a text node".into()))?;
        if start > end || byte_offset(text, end).is_none() {
            return Err(HostError::Selection(format!("{start}..{end} out of range")));
        }
        self.selection = Some((*node, start, end));
        self.events.push(HostEvent::Selected { node: *node, start, end });
        Ok(())
    }

    fn delete_selection(&mut self) -> Result<(), HostError> {
        let (node, start, end) = self
            .selection
            .ok_or_else(|| HostError::Selection("no selection".into()))?;
        let text = self.doc.leaf_text(node).ok_or(HostError::Detached)?.to_string();
        let (Some(s), Some(e)) = (byte_offset(&text, start), byte_offset(&text, end)) else {
            return Err(HostError::Selection("selection out of range".into()));
        };
        let mut next = text.clone();
        let removed: String = next.drain(s..e).collect();
        self.doc.set_text(node, &next);
        self.selection = Some((node, start, start));
        self.events.push(HostEvent::Deleted(removed));
        self.touched();
        Ok(())
    }

    fn selection_anchor(&self) -> Option<NodeId> {
        self.selection.map(|(node, _, _)| node)
    }

    fn mark_selection(&mut self) {
        self.marked = true;
        self.events.push(HostEvent::Marked);
    }

    fn clear_mark(&mut self) {
        self.marked = false;
    }

    fn dispatch_chord(&mut self, chord: &KeyChord) {
        self.events.push(HostEvent::Chord(chord.clone()));
        if chord.key == "E" && chord.shift {
            self.on_chord();
        }
    }

    fn dispatch_chord_at(&mut self, target: &NodeId, chord: &KeyChord) {
        self.events.push(HostEvent::ChordAt(*target, chord.clone()));
        if chord.key == "Enter" && self.in_dialog(*target) {
            self.close_dialog(true);
        }
    }

    fn click(&mut self, element: &NodeId) {
        self.events.push(HostEvent::Clicked(*element));
        if self.in_dialog(*element) {
            let confirm = !self.doc.text_content(*element).contains("Cancel");
            self.close_dialog(confirm);
        }
    }
}

impl Scheduler for FakeHost {
    type Handle = TimerId;

    fn set_timer(&mut self, delay: Duration, wake: Wake) -> TimerId {
        self.enqueue(self.now + delay, wake)
    }

    fn request_frame(&mut self, wake: Wake) -> TimerId {
        self.enqueue(self.now + FRAME, wake)
    }

    fn cancel(&mut self, handle: TimerId) {
        self.queue.retain(|p| p.id != handle);
    }

    fn observe_document(&mut self) -> Result<(), HostError> {
        self.observing = true;
        Ok(())
    }

    fn disconnect_document(&mut self) {
        self.observing = false;
        self.queue.retain(|p| p.wake != Wake::DocumentChanged);
    }
}

/// Reporter that records every call.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub started: Vec<usize>,
    pub progress: Vec<(usize, usize)>,
    pub done: Vec<SessionSummary>,
}

impl ProgressReporter for RecordingReporter {
    fn report_started(&mut self, total: usize) {
        self.started.push(total);
    }

    fn report_progress(&mut self, current: usize, total: usize) {
        self.progress.push((current, total));
    }

    fn report_done(&mut self, summary: &SessionSummary) {
        self.done.push(summary.clone());
    }
}
