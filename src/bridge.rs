//! Cross-frame bridge
//!
//! The top-level engine keeps every same-origin iframe's engine supplied
//! with the current table and enabled flag. Frames are discovered, marked
//! with [`PROCESSED_ATTR`], and after a delay get an engine installed if
//! their document is reachable. Data then flows only through messages:
//!
//! ```text
//! frame  ── request-data / iframe-ready ──▶ parent
//! parent ── data-update (table, enabled) ──▶ frame(s)
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info};

use crate::dom::{Document, FrameId, NodeId, ReadyState};
use crate::protocol::BridgeMessage;

/// Marks an iframe element the parent has already scheduled for injection
pub const PROCESSED_ATTR: &str = "data-replacer-processed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("frame {0:?} is cross-origin")]
    CrossOrigin(FrameId),
    #[error("frame {0:?} has not finished loading")]
    NotReady(FrameId),
    #[error("iframe element {0:?} has no content frame")]
    MissingFrame(NodeId),
    #[error("iframe element {0:?} is no longer in the document")]
    Detached(NodeId),
}

/// Who a message goes to, or came from, relative to the engine handling it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Peer {
    Parent,
    Child(FrameId),
    Unrelated,
}

/// Side effects an engine asks its host to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    PostMessage { to: Peer, message: BridgeMessage },
    /// Install and start an engine in `frame` (no-op if one exists)
    InstallFrameEngine { frame: FrameId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub origin: String,
    pub url: String,
    pub ready: bool,
    pub has_engine: bool,
}

/// What the host knows about each frame, as seen by the engines
#[derive(Debug, Clone, Default)]
pub struct FrameDirectory {
    frames: HashMap<FrameId, FrameInfo>,
}

impl FrameDirectory {
    pub fn insert(&mut self, frame: FrameId, info: FrameInfo) {
        self.frames.insert(frame, info);
    }

    pub fn get(&self, frame: FrameId) -> Option<&FrameInfo> {
        self.frames.get(&frame)
    }

    /// Access `frame`'s document from `requester_origin`, as a same-origin policy would allow
    pub fn access(&self, frame: FrameId, requester_origin: &str) -> Result<&FrameInfo, BridgeError> {
        let info = self
            .frames
            .get(&frame)
            .ok_or(BridgeError::CrossOrigin(frame))?;
        if info.origin != requester_origin {
            return Err(BridgeError::CrossOrigin(frame));
        }
        if !info.ready {
            return Err(BridgeError::NotReady(frame));
        }
        Ok(info)
    }
}

impl FrameInfo {
    pub fn from_document(doc: &Document, has_engine: bool) -> Self {
        Self {
            origin: doc.origin().to_string(),
            url: doc.url().to_string(),
            ready: doc.ready_state() == ReadyState::Complete,
            has_engine,
        }
    }
}

pub fn is_processed(doc: &Document, iframe: NodeId) -> bool {
    doc.attribute(iframe, PROCESSED_ATTR).is_some()
}

pub fn mark_processed(doc: &mut Document, iframe: NodeId) {
    if let Err(e) = doc.set_attribute(iframe, PROCESSED_ATTR, "true") {
        debug!(error = %e, "Could not mark iframe");
    }
}

/// Iframes in the document that have not been scheduled yet
pub fn unprocessed_iframes(doc: &Document) -> Vec<NodeId> {
    doc.elements_by_tag(doc.body(), "iframe")
        .into_iter()
        .filter(|iframe| !is_processed(doc, *iframe))
        .collect()
}

/// Mark every unprocessed iframe and return them
pub fn discover_iframes(doc: &mut Document) -> Vec<NodeId> {
    let found = unprocessed_iframes(doc);
    for iframe in &found {
        mark_processed(doc, *iframe);
    }
    found
}

/// Ask the host to install an engine in `iframe`'s frame.
///
/// On failure the processed mark is cleared so a later sweep retries.
pub fn try_inject(
    doc: &mut Document,
    frames: &FrameDirectory,
    iframe: NodeId,
    effects: &mut Vec<Effect>,
) -> Result<FrameId, BridgeError> {
    let result = resolve_frame(doc, frames, iframe);
    match &result {
        Ok(frame) => {
            let already = frames.get(*frame).is_some_and(|f| f.has_engine);
            if already {
                debug!(?frame, "Frame already has an engine");
            } else {
                info!(?frame, "Injecting engine into iframe");
                effects.push(Effect::InstallFrameEngine { frame: *frame });
            }
        }
        Err(e) => {
            debug!(error = %e, "Iframe injection deferred");
            if doc.is_alive(iframe) {
                let _ = doc.remove_attribute(iframe, PROCESSED_ATTR);
            }
        }
    }
    result
}

fn resolve_frame(doc: &Document, frames: &FrameDirectory, iframe: NodeId) -> Result<FrameId, BridgeError> {
    if !doc.is_connected(iframe) {
        return Err(BridgeError::Detached(iframe));
    }
    let frame = doc
        .content_frame(iframe)
        .ok_or(BridgeError::MissingFrame(iframe))?;
    frames.access(frame, doc.origin())?;
    Ok(frame)
}

/// Post `message` to every same-origin iframe of `doc`.
///
/// Cross-origin frames never receive the table.
pub fn broadcast(
    doc: &Document,
    frames: &FrameDirectory,
    message: &BridgeMessage,
    effects: &mut Vec<Effect>,
) -> usize {
    let mut sent = 0;
    for iframe in doc.elements_by_tag(doc.body(), "iframe") {
        let Some(frame) = doc.content_frame(iframe) else {
            continue;
        };
        if frames.access(frame, doc.origin()).is_ok() {
            effects.push(Effect::PostMessage {
                to: Peer::Child(frame),
                message: message.clone(),
            });
            sent += 1;
        }
    }
    sent
}

/// Child-side handshake state
#[derive(Debug, Clone, Default)]
pub struct ChildLink {
    pub received_data: bool,
    pub attempts: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::ReplacementTable;

    fn parent_with_iframe(frame_origin: &str, ready: bool) -> (Document, FrameDirectory, NodeId) {
        let mut doc = Document::new("https://app.test/page");
        let iframe = doc.create_element("iframe");
        doc.set_content_frame(iframe, FrameId(1)).unwrap();
        doc.append_child(doc.body(), iframe).unwrap();
        let mut frames = FrameDirectory::default();
        frames.insert(
            FrameId(1),
            FrameInfo {
                origin: frame_origin.to_string(),
                url: format!("{frame_origin}/frame"),
                ready,
                has_engine: false,
            },
        );
        (doc, frames, iframe)
    }

    #[test]
    fn test_discover_marks_each_iframe_once() {
        let (mut doc, _, iframe) = parent_with_iframe("https://app.test", true);
        assert_eq!(discover_iframes(&mut doc), vec![iframe]);
        assert!(is_processed(&doc, iframe));
        assert!(discover_iframes(&mut doc).is_empty());
    }

    #[test]
    fn test_inject_same_origin_emits_install() {
        let (mut doc, frames, iframe) = parent_with_iframe("https://app.test", true);
        mark_processed(&mut doc, iframe);
        let mut effects = Vec::new();
        assert_eq!(try_inject(&mut doc, &frames, iframe, &mut effects), Ok(FrameId(1)));
        assert_eq!(effects, vec![Effect::InstallFrameEngine { frame: FrameId(1) }]);
    }

    #[test]
    fn test_cross_origin_inject_clears_mark() {
        let (mut doc, frames, iframe) = parent_with_iframe("https://ads.test", true);
        mark_processed(&mut doc, iframe);
        let mut effects = Vec::new();
        assert_eq!(
            try_inject(&mut doc, &frames, iframe, &mut effects),
            Err(BridgeError::CrossOrigin(FrameId(1)))
        );
        assert!(!is_processed(&doc, iframe));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_unloaded_frame_is_not_ready() {
        let (mut doc, frames, iframe) = parent_with_iframe("https://app.test", false);
        let mut effects = Vec::new();
        assert_eq!(
            try_inject(&mut doc, &frames, iframe, &mut effects),
            Err(BridgeError::NotReady(FrameId(1)))
        );
    }

    #[test]
    fn test_broadcast_skips_cross_origin_frames() {
        let (doc, mut frames, _) = parent_with_iframe("https://app.test", true);
        let mut doc = doc;
        let foreign = doc.create_element("iframe");
        doc.set_content_frame(foreign, FrameId(2)).unwrap();
        doc.append_child(doc.body(), foreign).unwrap();
        frames.insert(
            FrameId(2),
            FrameInfo {
                origin: "https://ads.test".into(),
                url: "https://ads.test/x".into(),
                ready: true,
                has_engine: false,
            },
        );

        let message = BridgeMessage::data_update(&ReplacementTable::new(), true);
        let mut effects = Vec::new();
        assert_eq!(broadcast(&doc, &frames, &message, &mut effects), 1);
        assert_eq!(
            effects,
            vec![Effect::PostMessage {
                to: Peer::Child(FrameId(1)),
                message
            }]
        );
    }
}
