//! A browser tab, as seen by the engines
//!
//! Holds the top frame and its iframes (one [`Document`] each), the
//! clipboard, a virtual clock and the queue of posted messages. The page
//! delivers events to each frame's engine, carries out the effects engines
//! ask for, and fires engine timers as the clock advances.
//!
//! Messages are asynchronous: posting only enqueues, and the queue is
//! drained after every operation.

use std::collections::VecDeque;

use serde_json::Value;
use tracing::{debug, warn};

use crate::bridge::{Effect, FrameDirectory, FrameInfo, Peer};
use crate::clipboard::{Clipboard, MemoryClipboard};
use crate::config::EngineConfig;
use crate::dom::{
    Document, DomError, EventOrigin, FrameId, InputEvent, KeyEvent, NodeId, ReadyState,
};
use crate::engine::{Engine, EngineRole, FrameContext};
use crate::error::ResultExt;
use crate::protocol::{parse_value, to_value, ExtensionMessage, ParseResult};
use crate::store::Settings;

struct Frame {
    parent: Option<FrameId>,
    document: Document,
    engine: Option<Engine>,
}

struct Envelope {
    to: FrameId,
    from: FrameId,
    payload: Value,
}

pub struct Page {
    frames: Vec<Frame>,
    clipboard: Box<dyn Clipboard>,
    config: EngineConfig,
    now_ms: u64,
    queue: VecDeque<Envelope>,
}

impl Page {
    pub fn new(url: &str, config: EngineConfig) -> Self {
        Self::with_clipboard(url, config, Box::new(MemoryClipboard::default()))
    }

    pub fn with_clipboard(url: &str, config: EngineConfig, clipboard: Box<dyn Clipboard>) -> Self {
        Self {
            frames: vec![Frame {
                parent: None,
                document: Document::new(url),
                engine: None,
            }],
            clipboard,
            config,
            now_ms: 0,
            queue: VecDeque::new(),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    pub fn top(&self) -> FrameId {
        FrameId::TOP
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn parent_of(&self, frame: FrameId) -> Option<FrameId> {
        self.frames.get(frame.index()).and_then(|f| f.parent)
    }

    /// Panics if `frame` doesn't belong to this page
    pub fn document(&self, frame: FrameId) -> &Document {
        &self.frames[frame.index()].document
    }

    /// Direct document access for setup; mutations are picked up on the next pump.
    ///
    /// Panics if `frame` doesn't belong to this page.
    pub fn document_mut(&mut self, frame: FrameId) -> &mut Document {
        &mut self.frames[frame.index()].document
    }

    pub fn engine(&self, frame: FrameId) -> Option<&Engine> {
        self.frames.get(frame.index())?.engine.as_ref()
    }

    pub fn clipboard(&mut self) -> &mut dyn Clipboard {
        self.clipboard.as_mut()
    }

    /// Create an iframe element under `container` in `parent` with its own document
    pub fn add_iframe(
        &mut self,
        parent: FrameId,
        container: NodeId,
        url: &str,
    ) -> Result<(FrameId, NodeId), DomError> {
        let frame = FrameId(self.frames.len() as u32);
        let doc = &mut self.frames[parent.index()].document;
        let iframe = doc.create_element("iframe");
        doc.set_attribute(iframe, "src", url)?;
        doc.set_content_frame(iframe, frame)?;
        doc.append_child(container, iframe)?;
        self.frames.push(Frame {
            parent: Some(parent),
            document: Document::new(url),
            engine: None,
        });
        self.pump();
        Ok((frame, iframe))
    }

    pub fn set_ready_state(&mut self, frame: FrameId, state: ReadyState) {
        self.frames[frame.index()].document.set_ready_state(state);
    }

    // ------------------------------------------------------------------
    // Engine control
    // ------------------------------------------------------------------

    /// Install (if needed) and start the top-level engine with `settings`
    pub fn start_engine(&mut self, settings: &Settings) {
        let top = self.top();
        if self.frames[top.index()].engine.is_none() {
            self.frames[top.index()].engine = Some(Engine::new(EngineRole::Top, self.config.clone()));
        }
        self.with_engine(top, |engine, ctx| {
            engine.start(ctx);
            engine.apply_settings(settings, ctx);
        });
        self.pump();
    }

    pub fn apply_settings(&mut self, settings: &Settings) {
        self.with_engine(self.top(), |engine, ctx| engine.apply_settings(settings, ctx));
        self.pump();
    }

    /// Deliver a raw extension message to the top engine; unknown shapes are dropped
    pub fn send_extension_message(&mut self, payload: Value) {
        let message = match parse_value::<ExtensionMessage>(payload) {
            ParseResult::Ok(message) => message,
            other => {
                debug!(result = ?other, "Dropping extension message");
                return;
            }
        };
        self.with_engine(self.top(), |engine, ctx| {
            engine.handle_extension_message(message, ctx)
        });
        self.pump();
    }

    /// Post a raw message from `from` to `to`, as page scripts can
    pub fn post_raw_message(&mut self, from: FrameId, to: FrameId, payload: Value) {
        self.queue.push_back(Envelope { to, from, payload });
        self.pump();
    }

    // ------------------------------------------------------------------
    // User interaction
    // ------------------------------------------------------------------

    pub fn focus(&mut self, frame: FrameId, element: NodeId) {
        self.frames[frame.index()].document.focus(element);
    }

    /// One keystroke on the focused element.
    ///
    /// `fire_input` false models surfaces that suppress the native `input`
    /// event for some keys.
    pub fn press_key(&mut self, frame: FrameId, key: &str, fire_input: bool) {
        let doc = &self.frames[frame.index()].document;
        let target = doc
            .active_element()
            .or_else(|| doc.selection().map(|s| s.end.node))
            .unwrap_or_else(|| doc.body());
        let event = KeyEvent {
            target,
            key: key.to_string(),
            trusted: true,
        };
        self.with_engine(frame, |engine, ctx| engine.on_keydown(&event, ctx));

        let doc = &mut self.frames[frame.index()].document;
        if key.chars().count() == 1 && doc.type_text(key).warn_on_err().is_some() && fire_input {
            doc.dispatch_input(target, EventOrigin::User);
            let input = InputEvent {
                target,
                origin: EventOrigin::User,
            };
            self.with_engine(frame, |engine, ctx| engine.on_input(input, ctx));
        }
        self.pump();
    }

    /// Type `text` one character at a time, letting each keystroke's timers run
    pub fn type_text(&mut self, frame: FrameId, text: &str) {
        let per_key = self.config.timing.debounce_ms.max(self.config.timing.keydown_probe_ms) * 2;
        for c in text.chars() {
            self.press_key(frame, &c.to_string(), true);
            self.advance(per_key);
        }
    }

    // ------------------------------------------------------------------
    // Clock
    // ------------------------------------------------------------------

    /// Move the clock forward, firing engine timers in due order
    pub fn advance(&mut self, ms: u64) {
        let target = self.now_ms + ms;
        loop {
            let next = self
                .frames
                .iter()
                .filter_map(|f| f.engine.as_ref()?.next_deadline())
                .min();
            match next {
                Some(due) if due <= target => {
                    self.now_ms = self.now_ms.max(due);
                    for index in 0..self.frames.len() {
                        self.with_engine(FrameId(index as u32), |engine, ctx| engine.tick(ctx));
                    }
                    self.pump();
                }
                _ => break,
            }
        }
        self.now_ms = target;
        self.pump();
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    fn directory(&self) -> FrameDirectory {
        let mut directory = FrameDirectory::default();
        for (index, frame) in self.frames.iter().enumerate() {
            directory.insert(
                FrameId(index as u32),
                FrameInfo::from_document(&frame.document, frame.engine.is_some()),
            );
        }
        directory
    }

    /// Run `f` against `frame`'s engine, then carry out the effects it produced
    fn with_engine(&mut self, frame: FrameId, f: impl FnOnce(&mut Engine, &mut FrameContext<'_>)) {
        let directory = self.directory();
        let mut effects = Vec::new();
        let now_ms = self.now_ms;
        let Some(slot) = self.frames.get_mut(frame.index()) else {
            return;
        };
        let Some(engine) = slot.engine.as_mut() else {
            return;
        };
        let mut ctx = FrameContext {
            document: &mut slot.document,
            clipboard: self.clipboard.as_mut(),
            frames: &directory,
            effects: &mut effects,
            now_ms,
        };
        f(engine, &mut ctx);
        self.apply_effects(frame, effects);
    }

    fn apply_effects(&mut self, from: FrameId, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PostMessage { to, message } => {
                    let target = match to {
                        Peer::Parent => self.parent_of(from),
                        Peer::Child(child) => {
                            (self.parent_of(child) == Some(from)).then_some(child)
                        }
                        Peer::Unrelated => None,
                    };
                    let Some(target) = target else {
                        debug!(?from, ?to, "Message has no recipient");
                        continue;
                    };
                    if let Some(payload) = to_value(&message).log_err() {
                        self.queue.push_back(Envelope {
                            to: target,
                            from,
                            payload,
                        });
                    }
                }
                Effect::InstallFrameEngine { frame } => self.install_frame_engine(frame),
            }
        }
    }

    fn install_frame_engine(&mut self, frame: FrameId) {
        let Some(slot) = self.frames.get_mut(frame.index()) else {
            warn!(?frame, "Install requested for unknown frame");
            return;
        };
        if slot.engine.is_some() {
            debug!(?frame, "Frame engine already installed");
            return;
        }
        slot.engine = Some(Engine::new(EngineRole::Frame, self.config.clone()));
        self.with_engine(frame, |engine, ctx| engine.start(ctx));
    }

    fn peer_of(&self, receiver: FrameId, sender: FrameId) -> Peer {
        if self.parent_of(receiver) == Some(sender) {
            Peer::Parent
        } else if self.parent_of(sender) == Some(receiver) {
            Peer::Child(sender)
        } else {
            Peer::Unrelated
        }
    }

    /// Deliver queued messages and mutation records until both are drained
    fn pump(&mut self) {
        loop {
            if let Some(envelope) = self.queue.pop_front() {
                let peer = self.peer_of(envelope.to, envelope.from);
                let payload = envelope.payload;
                self.with_engine(envelope.to, |engine, ctx| engine.on_message(peer, payload, ctx));
                continue;
            }

            let mut delivered = false;
            for index in 0..self.frames.len() {
                let records = self.frames[index].document.take_mutations();
                if records.is_empty() {
                    continue;
                }
                delivered = true;
                self.with_engine(FrameId(index as u32), |engine, ctx| {
                    engine.on_mutations(&records, ctx)
                });
            }
            if !delivered {
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "page_tests.rs"]
mod tests;
