//! Mutation watcher
//!
//! Finds iframes among subtrees added to the document so the bridge can
//! reach frames created after attach. Records are only consumed while
//! connected; a disconnected watcher drops them.

use tracing::debug;

use crate::bridge::{is_processed, mark_processed};
use crate::dom::{Document, MutationRecord, NodeId};

#[derive(Debug, Default)]
pub struct MutationWatcher {
    connected: bool,
}

impl MutationWatcher {
    pub fn connect(&mut self) {
        self.connected = true;
    }

    pub fn disconnect(&mut self) {
        self.connected = false;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// New, unprocessed iframes in `records`; each is marked before it's returned
    pub fn take_new_iframes(&self, doc: &mut Document, records: &[MutationRecord]) -> Vec<NodeId> {
        if !self.connected {
            return Vec::new();
        }
        let mut found: Vec<NodeId> = Vec::new();
        for record in records {
            for added in &record.added {
                for iframe in doc.elements_by_tag(*added, "iframe") {
                    if !is_processed(doc, iframe) && !found.contains(&iframe) {
                        found.push(iframe);
                    }
                }
            }
        }
        for iframe in &found {
            mark_processed(doc, *iframe);
        }
        if !found.is_empty() {
            debug!(count = found.len(), "Mutation watcher found new iframes");
        }
        found
    }
}
