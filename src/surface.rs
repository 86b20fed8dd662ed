//! Surface adapter
//!
//! Classifies an event target into one of three editing surfaces and gives
//! the detector a uniform way to read text and caret position from it.
//! Classification is cached per element in a bounded LRU; handles are
//! generational, so an entry for a removed element can never be matched
//! by a new one. The input-type exclusion, text and caret are checked
//! fresh on every call: a page may flip an input to `password` at any time.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

use crate::dom::{flat_offset, Document, NodeId};

/// Input types we replace in; everything else (password, number, date, ...) is excluded
const EDITABLE_INPUT_TYPES: &[&str] = &["text", "search", "url", "tel", "email"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceKind {
    /// `<input>` / `<textarea>`: a flat string value plus selection offsets
    InputLike,
    /// A `contenteditable` region, read as the concatenation of its text nodes
    RichEditable,
    /// Anything else: only the document selection is usable
    Opaque,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    InputLike { element: NodeId },
    RichEditable { element: NodeId, host: NodeId },
    Opaque { element: NodeId },
}

impl Surface {
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Surface::InputLike { .. } => SurfaceKind::InputLike,
            Surface::RichEditable { .. } => SurfaceKind::RichEditable,
            Surface::Opaque { .. } => SurfaceKind::Opaque,
        }
    }

    /// The element events are dispatched to after a splice
    pub fn target(&self) -> NodeId {
        match self {
            Surface::InputLike { element } | Surface::Opaque { element } => *element,
            Surface::RichEditable { host, .. } => *host,
        }
    }

    /// Full text of the surface, `None` if it is gone or unreadable
    pub fn read_text(&self, doc: &Document) -> Option<String> {
        match self {
            Surface::InputLike { element } => doc.value(*element).map(str::to_string),
            Surface::RichEditable { host, .. } => {
                doc.is_alive(*host).then(|| doc.text_content(*host))
            }
            Surface::Opaque { .. } => {
                let caret = doc.selection()?.end;
                if !doc.is_content_editable(caret.node) {
                    return None;
                }
                doc.text_data(caret.node).map(str::to_string)
            }
        }
    }

    /// Caret as a char offset into [`Surface::read_text`], when it can be determined
    pub fn read_cursor(&self, doc: &Document) -> Option<usize> {
        match self {
            Surface::InputLike { element } => doc.selection_range(*element).map(|(_, end)| end),
            Surface::RichEditable { host, .. } => {
                let caret = doc.selection()?.end;
                flat_offset(doc, *host, caret)
            }
            Surface::Opaque { .. } => {
                let caret = doc.selection()?.end;
                doc.is_text(caret.node).then_some(caret.offset)
            }
        }
    }
}

/// Inputs whose current `type` must never be touched
fn is_excluded_input(doc: &Document, target: NodeId) -> bool {
    doc.tag(target) == Some("input")
        && !doc
            .input_type(target)
            .is_some_and(|t| EDITABLE_INPUT_TYPES.contains(&t.as_str()))
}

fn classify_kind(doc: &Document, target: NodeId) -> Option<SurfaceKind> {
    match doc.tag(target) {
        Some("input") => {
            let input_type = doc.input_type(target)?;
            EDITABLE_INPUT_TYPES
                .contains(&input_type.as_str())
                .then_some(SurfaceKind::InputLike)
        }
        Some("textarea") => Some(SurfaceKind::InputLike),
        Some(_) if doc.is_content_editable(target) => Some(SurfaceKind::RichEditable),
        Some(_) => Some(SurfaceKind::Opaque),
        None => None,
    }
}

fn build(doc: &Document, target: NodeId, kind: SurfaceKind) -> Option<Surface> {
    match kind {
        SurfaceKind::InputLike => Some(Surface::InputLike { element: target }),
        SurfaceKind::RichEditable => Some(Surface::RichEditable {
            element: target,
            host: doc.editing_host(target)?,
        }),
        SurfaceKind::Opaque => Some(Surface::Opaque { element: target }),
    }
}

/// Classify `target` without caching; `None` means the element is excluded
pub fn classify(doc: &Document, target: NodeId) -> Option<Surface> {
    build(doc, target, classify_kind(doc, target)?)
}

/// Bounded per-element classification cache
pub struct SurfaceCache {
    kinds: LruCache<NodeId, SurfaceKind>,
}

impl SurfaceCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            kinds: LruCache::new(capacity),
        }
    }

    pub fn classify(&mut self, doc: &Document, target: NodeId) -> Option<Surface> {
        if !doc.is_alive(target) || is_excluded_input(doc, target) {
            self.kinds.pop(&target);
            return None;
        }
        let kind = match self.kinds.get(&target) {
            Some(kind) => *kind,
            None => {
                let kind = classify_kind(doc, target)?;
                debug!(?target, ?kind, "Classified surface");
                self.kinds.put(target, kind);
                kind
            }
        };
        build(doc, target, kind)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
    }
}
