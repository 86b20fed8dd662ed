//! Mapping between flat text offsets and DOM boundary points
//!
//! A rich-text region reads as the concatenation of its text nodes. The
//! helpers here translate a char offset into that flat string back to a
//! (text node, offset) pair and forward again.

use super::{char_len, Boundary, Document, NodeId};

/// Text nodes under `root` in document order
pub fn text_nodes(doc: &Document, root: NodeId) -> Vec<NodeId> {
    doc.descendants_inclusive(root)
        .into_iter()
        .filter(|id| doc.is_text(*id))
        .collect()
}

/// Boundary for a flat offset used as a range start.
///
/// At a node seam the point lands at the start of the following node.
pub fn locate_start(doc: &Document, root: NodeId, flat: usize) -> Option<Boundary> {
    let nodes = text_nodes(doc, root);
    let mut pos = 0;
    for node in &nodes {
        let len = doc.text_data(*node).map(char_len)?;
        if pos <= flat && flat < pos + len {
            return Some(Boundary::new(*node, flat - pos));
        }
        pos += len;
    }
    // End of the text belongs to the last node
    let last = *nodes.last()?;
    (flat == pos).then(|| Boundary::new(last, doc.text_data(last).map(char_len).unwrap_or(0)))
}

/// Boundary for a flat offset used as a range end.
///
/// At a node seam the point stays at the end of the preceding node.
pub fn locate_end(doc: &Document, root: NodeId, flat: usize) -> Option<Boundary> {
    let nodes = text_nodes(doc, root);
    if flat == 0 {
        return nodes.first().map(|n| Boundary::new(*n, 0));
    }
    let mut pos = 0;
    for node in &nodes {
        let len = doc.text_data(*node).map(char_len)?;
        if pos < flat && flat <= pos + len {
            return Some(Boundary::new(*node, flat - pos));
        }
        pos += len;
    }
    None
}

/// Flat char offset of `boundary` within `root`'s text
pub fn flat_offset(doc: &Document, root: NodeId, boundary: Boundary) -> Option<usize> {
    if !doc.is_inclusive_ancestor(root, boundary.node) {
        return None;
    }
    let order = doc.descendants_inclusive(root);
    let position = |id: NodeId| order.iter().position(|n| *n == id);

    if doc.is_text(boundary.node) {
        let mut total = 0;
        for node in text_nodes(doc, root) {
            if node == boundary.node {
                return Some(total + boundary.offset);
            }
            total += doc.text_data(node).map(char_len).unwrap_or(0);
        }
        return None;
    }

    // Element boundary: count text before the child at `offset`
    let children = doc.children(boundary.node);
    let limit = match children.get(boundary.offset) {
        Some(child) => position(*child)?,
        None => {
            let subtree = doc.descendants_inclusive(boundary.node).len();
            position(boundary.node)? + subtree
        }
    };
    Some(
        order[..limit.min(order.len())]
            .iter()
            .filter_map(|id| doc.text_data(*id))
            .map(char_len)
            .sum(),
    )
}
