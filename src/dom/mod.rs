//! Document model the engine operates on
//!
//! A small, host-driven stand-in for a browser document: an arena of
//! element and text nodes addressed by generational [`NodeId`]s, form
//! control state for inputs and textareas, a selection, editing commands,
//! mutation records and a log of dispatched events.
//!
//! Handles are weak by construction. Removing a node frees its slot and
//! bumps the slot generation, so a stale `NodeId` held by a cache or a
//! pending timer resolves to nothing instead of to a recycled node.
//!
//! All text offsets are in characters.

mod html;
mod range;
mod walker;

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::debug;

use crate::clipboard::Clipboard;

pub use html::{
    decode_entities, escape_html, format_for_rich_text, is_void_element, needs_markup,
    parse_fragment, HtmlNode,
};
pub use range::{Boundary, Range};
pub use walker::{flat_offset, locate_end, locate_start, text_nodes};

/// Generational handle to a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

/// Handle to a browsing context (top document or iframe)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u32);

impl FrameId {
    pub const TOP: FrameId = FrameId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0:?} is no longer in the document")]
    StaleNode(NodeId),
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("node {0:?} is not an element")]
    NotElement(NodeId),
    #[error("offset {offset} out of bounds for {node:?} (length {len})")]
    OffsetOutOfBounds {
        node: NodeId,
        offset: usize,
        len: usize,
    },
    #[error("node {0:?} cannot be inserted here")]
    HierarchyRequest(NodeId),
    #[error("range end precedes its start")]
    InvertedRange,
    #[error("document has no selection")]
    NoSelection,
    #[error("editor rejected direct modification of {0:?}")]
    Rejected(NodeId),
    #[error("element {0:?} has no form value")]
    NotFormControl(NodeId),
}

/// Input types that expose `selectionStart`/`setSelectionRange`
const SELECTION_API_TYPES: &[&str] = &["text", "search", "url", "tel", "password"];

/// Dispatched events kept in the log; older ones are dropped first
pub const MAX_EVENT_LOG: usize = 256;

#[derive(Debug, Clone)]
struct FormState {
    value: String,
    selection: (usize, usize),
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    form: Option<FormState>,
    content_frame: Option<FrameId>,
}

#[derive(Debug, Clone)]
enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Complete,
}

/// Which editing commands the editing host honours
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditingSupport {
    pub insert_text: bool,
    pub insert_html: bool,
    pub paste: bool,
}

impl Default for EditingSupport {
    fn default() -> Self {
        Self {
            insert_text: true,
            insert_html: true,
            paste: true,
        }
    }
}

/// Who produced an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOrigin {
    /// Trusted, produced by the user agent for a real keystroke
    User,
    /// Synthetic input fired by the engine after a trigger keydown
    KeydownProbe,
    /// Synthetic input fired by the engine after a successful splice
    Redispatch,
}

impl EventOrigin {
    pub fn is_trusted(self) -> bool {
        matches!(self, EventOrigin::User)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    pub target: NodeId,
    pub origin: EventOrigin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub target: NodeId,
    pub key: String,
    pub trusted: bool,
}

/// Nodes inserted under `target`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub added: Vec<NodeId>,
}

/// A document: one per frame
#[derive(Debug, Clone)]
pub struct Document {
    slots: Vec<Slot>,
    free: Vec<u32>,
    body: NodeId,
    url: String,
    origin: String,
    ready_state: ReadyState,
    selection: Option<Range>,
    focused: Option<NodeId>,
    editing: EditingSupport,
    guarded: Vec<NodeId>,
    mutations: Vec<MutationRecord>,
    events: Vec<InputEvent>,
}

/// `scheme://host[:port]` of a URL; the whole string if it has no scheme
pub fn origin_of(url: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let after = &url[scheme_end + 3..];
            let host_end = after.find(['/', '?', '#']).unwrap_or(after.len());
            url[..scheme_end + 3 + host_end].to_ascii_lowercase()
        }
        None => url.to_string(),
    }
}

pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Byte index of the `char_idx`-th character (or `s.len()` past the end)
pub(crate) fn byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Replace chars `[start, end)` of `s` with `insert`
pub(crate) fn splice_chars(s: &str, start: usize, end: usize, insert: &str) -> String {
    let a = byte_index(s, start);
    let b = byte_index(s, end);
    let mut out = String::with_capacity(s.len() + insert.len());
    out.push_str(&s[..a]);
    out.push_str(insert);
    out.push_str(&s[b..]);
    out
}

impl Document {
    pub fn new(url: &str) -> Self {
        let mut doc = Self {
            slots: Vec::new(),
            free: Vec::new(),
            body: NodeId {
                index: 0,
                generation: 0,
            },
            url: url.to_string(),
            origin: origin_of(url),
            ready_state: ReadyState::Complete,
            selection: None,
            focused: None,
            editing: EditingSupport::default(),
            guarded: Vec::new(),
            mutations: Vec::new(),
            events: Vec::new(),
        };
        doc.body = doc.create_element("body");
        doc
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    // ------------------------------------------------------------------
    // Arena
    // ------------------------------------------------------------------

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let node = Node {
            data,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeId {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        }
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
            .ok_or(DomError::StaleNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
            .ok_or(DomError::StaleNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.node(id)?.data {
            NodeData::Element(e) => Ok(e),
            NodeData::Text(_) => Err(DomError::NotElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Element(e) => Ok(e),
            NodeData::Text(_) => Err(DomError::NotElement(id)),
        }
    }

    /// Free `id` and its subtree
    fn free_subtree(&mut self, id: NodeId) {
        let children = self
            .node(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.free_subtree(child);
        }
        if let Some(slot) = self.slots.get_mut(id.index as usize) {
            if slot.generation == id.generation && slot.node.is_some() {
                slot.node = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(id.index);
            }
        }
    }

    pub fn is_alive(&self, id: NodeId) -> bool {
        self.node(id).is_ok()
    }

    /// Alive and attached under `body`
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.is_inclusive_ancestor(self.body, id)
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return self.is_alive(id);
            }
            current = self.parent(id);
        }
        false
    }

    // ------------------------------------------------------------------
    // Construction and tree edits
    // ------------------------------------------------------------------

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let form = matches!(tag.as_str(), "input" | "textarea").then(|| FormState {
            value: String::new(),
            selection: (0, 0),
        });
        self.alloc(NodeData::Element(ElementData {
            tag,
            attributes: BTreeMap::new(),
            form,
            content_frame: None,
        }))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.alloc(NodeData::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (append when `None`)
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        self.element(parent)?;
        self.node(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest(child));
        }
        let index = match reference {
            Some(r) => self
                .children(parent)
                .iter()
                .position(|c| *c == r)
                .ok_or(DomError::HierarchyRequest(r))?,
            None => self.children(parent).len(),
        };
        self.raw_insert_children(parent, index, &[child]);
        Ok(())
    }

    /// Remove `id` from the document and release it
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), DomError> {
        self.node(id)?;
        if id == self.body {
            return Err(DomError::HierarchyRequest(id));
        }
        self.raw_detach(id);
        self.free_subtree(id);
        self.drop_dangling_state();
        Ok(())
    }

    fn raw_detach(&mut self, id: NodeId) {
        let parent = self.node(id).ok().and_then(|n| n.parent);
        if let Some(parent) = parent {
            if let Ok(p) = self.node_mut(parent) {
                p.children.retain(|c| *c != id);
            }
        }
        if let Ok(n) = self.node_mut(id) {
            n.parent = None;
        }
    }

    /// Insert detached `nodes` as children of `parent` starting at `index`
    fn raw_insert_children(&mut self, parent: NodeId, index: usize, nodes: &[NodeId]) {
        for node in nodes {
            self.raw_detach(*node);
        }
        let mut at = index.min(self.children(parent).len());
        for node in nodes {
            if let Ok(p) = self.node_mut(parent) {
                p.children.insert(at, *node);
                at += 1;
            }
            if let Ok(n) = self.node_mut(*node) {
                n.parent = Some(parent);
            }
        }
        if !nodes.is_empty() && self.is_connected(parent) {
            self.mutations.push(MutationRecord {
                target: parent,
                added: nodes.to_vec(),
            });
        }
    }

    fn raw_remove_children(&mut self, parent: NodeId) {
        for child in self.children(parent).to_vec() {
            self.raw_detach(child);
            self.free_subtree(child);
        }
    }

    /// Selection or focus pointing at freed nodes is dropped
    fn drop_dangling_state(&mut self) {
        if let Some(range) = self.selection {
            if !self.is_alive(range.start.node) || !self.is_alive(range.end.node) {
                self.selection = None;
            }
        }
        if let Some(focused) = self.focused {
            if !self.is_alive(focused) {
                self.focused = None;
            }
        }
    }

    /// Build detached nodes from parsed markup
    pub fn build_fragment(&mut self, nodes: &[HtmlNode]) -> Vec<NodeId> {
        let mut built = Vec::with_capacity(nodes.len());
        for node in nodes {
            match node {
                HtmlNode::Text(text) => built.push(self.create_text(text)),
                HtmlNode::Element {
                    tag,
                    attributes,
                    children,
                } => {
                    let element = self.create_element(tag);
                    if let Ok(e) = self.element_mut(element) {
                        for (name, value) in attributes {
                            e.attributes.insert(name.clone(), value.clone());
                        }
                    }
                    let kids = self.build_fragment(children);
                    for kid in kids {
                        if let Ok(n) = self.node_mut(kid) {
                            n.parent = Some(element);
                        }
                        if let Ok(e) = self.node_mut(element) {
                            e.children.push(kid);
                        }
                    }
                    built.push(element);
                }
            }
        }
        built
    }

    /// Release nodes that were created but never inserted
    pub fn discard(&mut self, nodes: &[NodeId]) {
        for node in nodes {
            if self.node(*node).is_ok_and(|n| n.parent.is_none()) && *node != self.body {
                self.free_subtree(*node);
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).ok().map(|e| e.tag.as_str())
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).map(|n| &n.data), Ok(NodeData::Text(_)))
    }

    pub fn text_data(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).ok()?.data {
            NodeData::Text(t) => Some(t),
            NodeData::Element(_) => None,
        }
    }

    pub fn set_text_data(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        self.check_guard(id)?;
        self.raw_set_text_data(id, text)
    }

    fn raw_set_text_data(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(id)?.data {
            NodeData::Text(t) => {
                *t = text.to_string();
                Ok(())
            }
            NodeData::Element(_) => Err(DomError::NotText(id)),
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)
            .ok()
            .and_then(|e| e.attributes.get(name))
            .map(String::as_str)
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let e = self.element_mut(id)?;
        e.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<(), DomError> {
        self.element_mut(id)?.attributes.remove(name);
        Ok(())
    }

    pub fn content_frame(&self, id: NodeId) -> Option<FrameId> {
        self.element(id).ok().and_then(|e| e.content_frame)
    }

    pub fn set_content_frame(&mut self, id: NodeId, frame: FrameId) -> Result<(), DomError> {
        self.element_mut(id)?.content_frame = Some(frame);
        Ok(())
    }

    /// `id` and every node below it, in document order
    pub fn descendants_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !self.is_alive(current) {
                continue;
            }
            out.push(current);
            for child in self.children(current).iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Elements with `tag` under (and including) `root`, in document order
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants_inclusive(root)
            .into_iter()
            .filter(|id| self.tag(*id) == Some(tag))
            .collect()
    }

    /// Concatenated text of all text descendants
    pub fn text_content(&self, id: NodeId) -> String {
        match self.text_data(id) {
            Some(text) => text.to_string(),
            None => text_nodes(self, id)
                .into_iter()
                .filter_map(|t| self.text_data(t))
                .collect(),
        }
    }

    /// Replace all children of `id` with a single text node
    pub fn set_text_content(&mut self, id: NodeId, text: &str) -> Result<(), DomError> {
        self.check_guard(id)?;
        if self.is_text(id) {
            return self.raw_set_text_data(id, text);
        }
        self.element(id)?;
        self.raw_remove_children(id);
        if !text.is_empty() {
            let node = self.create_text(text);
            self.raw_insert_children(id, 0, &[node]);
        }
        self.drop_dangling_state();
        Ok(())
    }

    pub fn inner_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(id) {
            self.serialize(*child, &mut out);
        }
        out
    }

    fn serialize(&self, id: NodeId, out: &mut String) {
        let Ok(node) = self.node(id) else { return };
        match &node.data {
            NodeData::Text(text) => out.push_str(&html::escape_text_content(text)),
            NodeData::Element(e) => {
                out.push('<');
                out.push_str(&e.tag);
                for (name, value) in &e.attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_html(value));
                    out.push('"');
                }
                out.push('>');
                if is_void_element(&e.tag) {
                    return;
                }
                for child in &node.children {
                    self.serialize(*child, out);
                }
                out.push_str("</");
                out.push_str(&e.tag);
                out.push('>');
            }
        }
    }

    pub fn set_inner_html(&mut self, id: NodeId, markup: &str) -> Result<(), DomError> {
        self.check_guard(id)?;
        self.element(id)?;
        self.raw_remove_children(id);
        let nodes = self.build_fragment(&parse_fragment(markup));
        self.raw_insert_children(id, 0, &nodes);
        self.drop_dangling_state();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Editability
    // ------------------------------------------------------------------

    /// Whether `id` (or the element containing a text node) is editable rich content
    pub fn is_content_editable(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if let Ok(e) = self.element(node) {
                match e.attributes.get("contenteditable").map(String::as_str) {
                    Some("" | "true" | "plaintext-only") => return true,
                    Some("false") => return false,
                    _ => {}
                }
            }
            current = self.parent(node);
        }
        false
    }

    /// Outermost element of the editable region containing `id`
    pub fn editing_host(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_content_editable(id) {
            return None;
        }
        let mut host = if self.is_text(id) { self.parent(id)? } else { id };
        while let Some(parent) = self.parent(host) {
            if !self.is_content_editable(parent) {
                break;
            }
            host = parent;
        }
        Some(host)
    }

    /// Reject direct DOM edits under `root`; editing commands still work.
    ///
    /// Models editors that keep their own document model and only accept
    /// command-driven changes.
    pub fn guard_subtree(&mut self, root: NodeId) {
        if !self.guarded.contains(&root) {
            self.guarded.push(root);
        }
    }

    pub(crate) fn check_guard(&self, id: NodeId) -> Result<(), DomError> {
        match self
            .guarded
            .iter()
            .find(|root| self.is_inclusive_ancestor(**root, id))
        {
            Some(root) => Err(DomError::Rejected(*root)),
            None => Ok(()),
        }
    }

    pub fn editing_support(&self) -> EditingSupport {
        self.editing
    }

    pub fn set_editing_support(&mut self, support: EditingSupport) {
        self.editing = support;
    }

    // ------------------------------------------------------------------
    // Form controls
    // ------------------------------------------------------------------

    fn form(&self, id: NodeId) -> Result<&FormState, DomError> {
        self.element(id)?
            .form
            .as_ref()
            .ok_or(DomError::NotFormControl(id))
    }

    fn form_mut(&mut self, id: NodeId) -> Result<&mut FormState, DomError> {
        self.element_mut(id)?
            .form
            .as_mut()
            .ok_or(DomError::NotFormControl(id))
    }

    /// Lowercased `type` of an input (`text` when absent)
    pub fn input_type(&self, id: NodeId) -> Option<String> {
        (self.tag(id)? == "input").then(|| {
            self.attribute(id, "type")
                .map(str::to_ascii_lowercase)
                .unwrap_or_else(|| "text".to_string())
        })
    }

    fn supports_selection_api(&self, id: NodeId) -> bool {
        match self.tag(id) {
            Some("textarea") => true,
            Some("input") => self
                .input_type(id)
                .is_some_and(|t| SELECTION_API_TYPES.contains(&t.as_str())),
            _ => false,
        }
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.form(id).ok().map(|f| f.value.as_str())
    }

    /// Set a form value; the caret moves to the end, as in browsers
    pub fn set_value(&mut self, id: NodeId, value: &str) -> Result<(), DomError> {
        let form = self.form_mut(id)?;
        form.value = value.to_string();
        let end = char_len(value);
        form.selection = (end, end);
        Ok(())
    }

    /// `(selectionStart, selectionEnd)`; `None` for types without the selection API
    pub fn selection_range(&self, id: NodeId) -> Option<(usize, usize)> {
        if !self.supports_selection_api(id) {
            return None;
        }
        self.form(id).ok().map(|f| f.selection)
    }

    pub fn set_selection_range(&mut self, id: NodeId, start: usize, end: usize) -> Result<(), DomError> {
        if !self.supports_selection_api(id) {
            return Err(DomError::NotFormControl(id));
        }
        let form = self.form_mut(id)?;
        let len = char_len(&form.value);
        let start = start.min(len);
        form.selection = (start, end.clamp(start, len));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Focus and selection
    // ------------------------------------------------------------------

    pub fn focus(&mut self, id: NodeId) {
        if self.is_alive(id) {
            self.focused = Some(id);
        }
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.focused.filter(|id| self.is_alive(*id))
    }

    pub fn selection(&self) -> Option<Range> {
        self.selection
    }

    pub fn set_selection(&mut self, range: Option<Range>) {
        self.selection = range.filter(|r| self.is_alive(r.start.node) && self.is_alive(r.end.node));
    }

    pub fn collapse_selection(&mut self, at: Boundary) {
        self.set_selection(Some(Range::collapsed(at)));
    }

    // ------------------------------------------------------------------
    // Typing and editing commands
    // ------------------------------------------------------------------

    /// Native text insertion at the caret, as the user agent does for a keystroke.
    ///
    /// Goes to the focused form control if there is one, otherwise to the
    /// selection inside an editable region.
    pub fn type_text(&mut self, text: &str) -> Result<(), DomError> {
        if let Some(focused) = self.active_element() {
            if self.form(focused).is_ok() {
                let form = self.form_mut(focused)?;
                let (start, end) = form.selection;
                form.value = splice_chars(&form.value, start, end, text);
                let caret = start + char_len(text);
                form.selection = (caret, caret);
                return Ok(());
            }
        }

        let range = self.selection.ok_or(DomError::NoSelection)?;
        if !self.is_content_editable(range.start.node) {
            return Err(DomError::Rejected(range.start.node));
        }
        let node = self.create_text(text);
        match self.raw_replace_range(&range, &[node]) {
            Ok(caret) => {
                self.collapse_selection(caret);
                Ok(())
            }
            Err(e) => {
                self.discard(&[node]);
                Err(e)
            }
        }
    }

    /// `insertText` editing command
    pub fn exec_insert_text(&mut self, text: &str) -> bool {
        if !self.editing.insert_text {
            debug!("insertText command not supported by editing host");
            return false;
        }
        self.type_text(text).is_ok()
    }

    /// `insertHTML` editing command
    pub fn exec_insert_html(&mut self, markup: &str) -> bool {
        if !self.editing.insert_html {
            debug!("insertHTML command not supported by editing host");
            return false;
        }
        let Some(range) = self.selection else {
            return false;
        };
        if !self.is_content_editable(range.start.node) {
            return false;
        }
        let nodes = self.build_fragment(&parse_fragment(markup));
        match self.raw_replace_range(&range, &nodes) {
            Ok(caret) => {
                self.collapse_selection(caret);
                true
            }
            Err(e) => {
                debug!(error = %e, "insertHTML failed");
                self.discard(&nodes);
                false
            }
        }
    }

    /// Native paste from `clipboard`, preferring its HTML flavour
    pub fn exec_paste(&mut self, clipboard: &mut dyn Clipboard) -> bool {
        if !self.editing.paste {
            debug!("paste command not supported by editing host");
            return false;
        }
        let content = match clipboard.read() {
            Ok(Some(content)) => content,
            Ok(None) => return false,
            Err(e) => {
                debug!(error = %e, "Paste could not read clipboard");
                return false;
            }
        };
        let saved = self.editing;
        // Paste inserts through the same path as the insert commands
        self.editing.insert_html = true;
        self.editing.insert_text = true;
        let pasted = match content.html {
            Some(ref markup) => self.exec_insert_html(markup),
            None => self.exec_insert_text(&content.plain),
        };
        self.editing = saved;
        pasted
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Drain pending mutation records
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    /// Dispatch an input event on `target`; host listeners see it in [`Document::events`]
    pub fn dispatch_input(&mut self, target: NodeId, origin: EventOrigin) {
        if self.events.len() >= MAX_EVENT_LOG {
            let excess = self.events.len() + 1 - MAX_EVENT_LOG;
            self.events.drain(..excess);
        }
        self.events.push(InputEvent { target, origin });
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
#[path = "dom_tests.rs"]
mod tests;
