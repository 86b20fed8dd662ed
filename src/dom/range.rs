//! Ranges and range replacement
//!
//! Boundary points follow DOM semantics: inside a text node the offset
//! counts characters, inside an element it counts children.

use std::cmp::Ordering;
use std::collections::HashMap;

use super::{char_len, splice_chars, Document, DomError, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub start: Boundary,
    pub end: Boundary,
}

impl Range {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub fn collapsed(at: Boundary) -> Self {
        Self { start: at, end: at }
    }

    /// Characters `[start, end)` of a single text node
    pub fn in_text(node: NodeId, start: usize, end: usize) -> Self {
        Self::new(Boundary::new(node, start), Boundary::new(node, end))
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }
}

/// Preorder positions of every node under a root
struct TreeOrder {
    index: HashMap<NodeId, usize>,
}

impl TreeOrder {
    fn new(doc: &Document, root: NodeId) -> Self {
        let index = doc
            .descendants_inclusive(root)
            .into_iter()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();
        Self { index }
    }

    fn position(&self, id: NodeId) -> usize {
        self.index.get(&id).copied().unwrap_or(usize::MAX)
    }
}

impl Document {
    /// DOM "length" of a node: chars for text, child count for elements
    pub fn node_length(&self, id: NodeId) -> Result<usize, DomError> {
        match self.text_data(id) {
            Some(text) => Ok(char_len(text)),
            None => {
                self.element(id)?;
                Ok(self.children(id).len())
            }
        }
    }

    fn index_in_parent(&self, id: NodeId) -> usize {
        self.parent(id)
            .and_then(|p| self.children(p).iter().position(|c| *c == id))
            .unwrap_or(0)
    }

    fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        let mut current = Some(a);
        while let Some(id) = current {
            if self.is_inclusive_ancestor(id, b) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    fn validate_boundary(&self, b: &Boundary) -> Result<(), DomError> {
        let len = self.node_length(b.node)?;
        if b.offset > len {
            return Err(DomError::OffsetOutOfBounds {
                node: b.node,
                offset: b.offset,
                len,
            });
        }
        Ok(())
    }

    /// Relative position of two boundary points
    fn compare_boundaries(&self, order: &TreeOrder, a: &Boundary, b: &Boundary) -> Ordering {
        if a.node == b.node {
            return a.offset.cmp(&b.offset);
        }
        if order.position(a.node) > order.position(b.node) {
            return self.compare_boundaries(order, b, a).reverse();
        }
        if self.is_inclusive_ancestor(a.node, b.node) {
            let mut child = b.node;
            while let Some(parent) = self.parent(child) {
                if parent == a.node {
                    break;
                }
                child = parent;
            }
            if self.index_in_parent(child) < a.offset {
                return Ordering::Greater;
            }
        }
        Ordering::Less
    }

    /// Check that `range` can be edited, without touching anything
    pub(crate) fn validate_range(&self, range: &Range) -> Result<NodeId, DomError> {
        self.validate_boundary(&range.start)?;
        self.validate_boundary(&range.end)?;
        let common = self
            .common_ancestor(range.start.node, range.end.node)
            .ok_or(DomError::HierarchyRequest(range.end.node))?;
        let order = TreeOrder::new(self, common);
        if self.compare_boundaries(&order, &range.start, &range.end) == Ordering::Greater {
            return Err(DomError::InvertedRange);
        }
        Ok(common)
    }

    /// Delete the contents of `range`; returns the collapsed point
    fn raw_delete_range(&mut self, range: &Range) -> Result<Boundary, DomError> {
        let common = self.validate_range(range)?;
        let (start, end) = (range.start, range.end);

        if start.node == end.node {
            if let Some(text) = self.text_data(start.node) {
                let updated = splice_chars(text, start.offset, end.offset, "");
                self.raw_set_text_data(start.node, &updated)?;
            } else {
                let doomed: Vec<NodeId> = self.children(start.node)[start.offset..end.offset].to_vec();
                for node in doomed {
                    self.raw_detach(node);
                    self.free_subtree(node);
                }
            }
            return Ok(start);
        }

        let order = TreeOrder::new(self, common);
        let contained: Vec<NodeId> = self
            .descendants_inclusive(common)
            .into_iter()
            .filter(|id| {
                let Ok(len) = self.node_length(*id) else {
                    return false;
                };
                self.compare_boundaries(&order, &Boundary::new(*id, 0), &start) == Ordering::Greater
                    && self.compare_boundaries(&order, &Boundary::new(*id, len), &end) == Ordering::Less
            })
            .collect();

        let collapse_to = if self.is_inclusive_ancestor(start.node, end.node) {
            start
        } else {
            let mut reference = start.node;
            while let Some(parent) = self.parent(reference) {
                if self.is_inclusive_ancestor(parent, end.node) {
                    break;
                }
                reference = parent;
            }
            let parent = self.parent(reference).unwrap_or(common);
            Boundary::new(parent, self.index_in_parent(reference) + 1)
        };

        if let Some(text) = self.text_data(start.node) {
            let updated = splice_chars(text, start.offset, char_len(text), "");
            self.raw_set_text_data(start.node, &updated)?;
        }
        for node in &contained {
            // Descendants of a removed node go with it
            let top = self.parent(*node).is_none_or(|p| !contained.contains(&p));
            if top && self.is_alive(*node) {
                self.raw_detach(*node);
                self.free_subtree(*node);
            }
        }
        if let Some(text) = self.text_data(end.node) {
            let updated = splice_chars(text, 0, end.offset, "");
            self.raw_set_text_data(end.node, &updated)?;
        }

        // Child offsets shift once earlier siblings are removed
        let collapse_to = if collapse_to.node == start.node || self.is_text(collapse_to.node) {
            collapse_to
        } else {
            let len = self.node_length(collapse_to.node)?;
            Boundary::new(collapse_to.node, collapse_to.offset.min(len))
        };
        Ok(collapse_to)
    }

    /// Insert detached `nodes` at `at`; returns the point just after them
    fn raw_insert_at(&mut self, at: Boundary, nodes: &[NodeId]) -> Result<Boundary, DomError> {
        if nodes.is_empty() {
            return Ok(at);
        }

        if let Some(text) = self.text_data(at.node).map(str::to_string) {
            // A lone text node merges into the text it lands in
            if let [single] = nodes {
                if let Some(inserted) = self.text_data(*single).map(str::to_string) {
                    let updated = splice_chars(&text, at.offset, at.offset, &inserted);
                    self.raw_set_text_data(at.node, &updated)?;
                    self.discard(nodes);
                    return Ok(Boundary::new(at.node, at.offset + char_len(&inserted)));
                }
            }

            let parent = self.parent(at.node).ok_or(DomError::HierarchyRequest(at.node))?;
            let mut index = self.index_in_parent(at.node);
            let len = char_len(&text);
            if at.offset == 0 {
                // insert before the text node
            } else if at.offset >= len {
                index += 1;
            } else {
                let head = splice_chars(&text, at.offset, len, "");
                let tail = splice_chars(&text, 0, at.offset, "");
                self.raw_set_text_data(at.node, &head)?;
                let tail_node = self.create_text(&tail);
                self.raw_insert_children(parent, index + 1, &[tail_node]);
                index += 1;
            }
            self.raw_insert_children(parent, index, nodes);
            return Ok(self.point_after(nodes));
        }

        self.element(at.node)?;
        self.raw_insert_children(at.node, at.offset, nodes);
        Ok(self.point_after(nodes))
    }

    fn point_after(&self, nodes: &[NodeId]) -> Boundary {
        let last = nodes[nodes.len() - 1];
        match self.text_data(last) {
            Some(text) => Boundary::new(last, char_len(text)),
            None => Boundary::new(
                self.parent(last).unwrap_or(self.body()),
                self.index_in_parent(last) + 1,
            ),
        }
    }

    /// Replace `range` with detached `nodes`, bypassing editor guards
    pub(crate) fn raw_replace_range(
        &mut self,
        range: &Range,
        nodes: &[NodeId],
    ) -> Result<Boundary, DomError> {
        let collapsed = self.raw_delete_range(range)?;
        self.raw_insert_at(collapsed, nodes)
    }

    fn check_range_guard(&self, range: &Range) -> Result<(), DomError> {
        self.check_guard(range.start.node)?;
        self.check_guard(range.end.node)
    }

    /// Replace `range` with plain text; returns the point after the insertion.
    ///
    /// Nothing is modified when the range is invalid or guarded.
    pub fn replace_range_with_text(&mut self, range: &Range, text: &str) -> Result<Boundary, DomError> {
        self.check_range_guard(range)?;
        self.validate_range(range)?;
        if text.is_empty() {
            return self.raw_delete_range(range);
        }
        let node = self.create_text(text);
        self.raw_replace_range(range, &[node]).inspect_err(|_| self.discard(&[node]))
    }

    /// Replace `range` with parsed markup; returns the point after the insertion
    pub fn replace_range_with_markup(
        &mut self,
        range: &Range,
        markup: &str,
    ) -> Result<Boundary, DomError> {
        self.check_range_guard(range)?;
        self.validate_range(range)?;
        let nodes = self.build_fragment(&super::parse_fragment(markup));
        self.raw_replace_range(range, &nodes)
            .inspect_err(|_| self.discard(&nodes))
    }
}
