//! Replacement engine
//!
//! One explicit instance per frame. Lifecycle:
//!
//! ```text
//! new(role, config) ─▶ start ─▶ configure / apply_settings ─▶ attach ⇄ detach
//! ```
//!
//! The host feeds events (`on_input`, `on_keydown`, `on_mutations`,
//! `on_message`) and advances time (`tick`). Handlers never return errors:
//! every failure is logged and the event dropped. Anything the engine needs
//! from outside its frame (posting a message, installing an engine in an
//! iframe) is pushed as an [`Effect`] for the host to carry out.
//!
//! A `Top` engine owns the parent side of the bridge and is fed by settings
//! and extension messages. A `Frame` engine gets its table and enabled
//! flag only from the parent's `data-update` messages.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::bridge::{self, ChildLink, Effect, FrameDirectory, Peer};
use crate::clipboard::Clipboard;
use crate::config::EngineConfig;
use crate::dom::{Document, EventOrigin, InputEvent, KeyEvent, MutationRecord, NodeId};
use crate::mutation_watcher::MutationWatcher;
use crate::protocol::{parse_bridge_message, BridgeMessage, ExtensionMessage};
use crate::store::Settings;
use crate::strategy::{SpliceContext, SpliceRequest, StrategyChain};
use crate::surface::{SurfaceCache, SurfaceKind};
use crate::table::ReplacementTable;
use crate::timer::{TimerId, TimerQueue};
use crate::trigger::{detect, is_trigger_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineRole {
    /// Top-level document: parent side of the bridge
    Top,
    /// Inside an iframe: child side of the bridge
    Frame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    ProcessInput { target: NodeId },
    KeydownProbe { target: NodeId },
    InjectFrame { iframe: NodeId },
    IframeSweep,
    RequestData { attempt: u32 },
}

/// Everything an engine may touch while handling one event
pub struct FrameContext<'a> {
    pub document: &'a mut Document,
    pub clipboard: &'a mut dyn Clipboard,
    pub frames: &'a FrameDirectory,
    pub effects: &'a mut Vec<Effect>,
    pub now_ms: u64,
}

struct Chains {
    input_like: StrategyChain,
    rich_editable: StrategyChain,
    opaque: StrategyChain,
}

impl Chains {
    fn new() -> Self {
        Self {
            input_like: StrategyChain::input_like(),
            rich_editable: StrategyChain::rich_editable(),
            opaque: StrategyChain::opaque(),
        }
    }

    fn for_kind(&self, kind: SurfaceKind) -> &StrategyChain {
        match kind {
            SurfaceKind::InputLike => &self.input_like,
            SurfaceKind::RichEditable => &self.rich_editable,
            SurfaceKind::Opaque => &self.opaque,
        }
    }
}

pub struct Engine {
    role: EngineRole,
    config: EngineConfig,
    table: Arc<ReplacementTable>,
    feature_enabled: bool,
    extension_enabled: bool,
    started: bool,
    attached: bool,
    timers: TimerQueue<Task>,
    debounce: Option<TimerId>,
    sweep: Option<TimerId>,
    surfaces: SurfaceCache,
    watcher: MutationWatcher,
    chains: Chains,
    link: ChildLink,
}

impl Engine {
    pub fn new(role: EngineRole, config: EngineConfig) -> Self {
        let surfaces = SurfaceCache::new(config.surface_cache_size);
        Self {
            role,
            config,
            table: Arc::new(ReplacementTable::new()),
            feature_enabled: crate::config::DEFAULT_FEATURE_ENABLED,
            extension_enabled: crate::config::DEFAULT_EXTENSION_ENABLED,
            started: false,
            attached: false,
            timers: TimerQueue::new(),
            debounce: None,
            sweep: None,
            surfaces,
            watcher: MutationWatcher::default(),
            chains: Chains::new(),
            link: ChildLink::default(),
        }
    }

    pub fn role(&self) -> EngineRole {
        self.role
    }

    pub fn table(&self) -> Arc<ReplacementTable> {
        self.table.clone()
    }

    /// Both switches on
    pub fn is_enabled(&self) -> bool {
        self.feature_enabled && self.extension_enabled
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    /// Whether a frame engine has received its first `data-update`
    pub fn has_received_data(&self) -> bool {
        self.link.received_data
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Begin operating. A second call is a no-op.
    #[instrument(skip_all, fields(role = ?self.role))]
    pub fn start(&mut self, ctx: &mut FrameContext<'_>) {
        if self.started {
            debug!("Engine already started");
            return;
        }
        self.started = true;
        info!(event_type = "engine_lifecycle", action = "started", url = %ctx.document.url(), "Engine started");

        match self.role {
            EngineRole::Top => self.reconcile(ctx),
            EngineRole::Frame => {
                let url = ctx.document.url().to_string();
                self.post(ctx, Peer::Parent, BridgeMessage::request_data());
                self.post(ctx, Peer::Parent, BridgeMessage::iframe_ready(url));
                self.link.attempts = 1;
                self.timers.schedule_at(
                    ctx.now_ms + self.config.timing.bridge_retry_ms,
                    Task::RequestData { attempt: 1 },
                );
            }
        }
    }

    /// Replace the table and feature switch, then attach or detach to match
    pub fn configure(&mut self, table: Arc<ReplacementTable>, enabled: bool, ctx: &mut FrameContext<'_>) {
        self.table = table;
        self.feature_enabled = enabled;
        self.reconcile(ctx);
    }

    pub fn apply_settings(&mut self, settings: &Settings, ctx: &mut FrameContext<'_>) {
        self.table = Arc::new(settings.table());
        self.feature_enabled = settings.feature_enabled();
        self.extension_enabled = settings.extension_enabled();
        info!(
            replacement_count = self.table.len(),
            enabled = self.is_enabled(),
            "Applied settings"
        );
        self.reconcile(ctx);
    }

    pub fn handle_extension_message(&mut self, message: ExtensionMessage, ctx: &mut FrameContext<'_>) {
        debug!(?message, "Extension message");
        match message {
            ExtensionMessage::ExtState { enabled: Some(enabled) } => {
                self.extension_enabled = enabled;
            }
            ExtensionMessage::ExtState { enabled: None } => return,
            ExtensionMessage::TextReplacementToggle { enabled } => {
                self.feature_enabled = enabled;
            }
            ExtensionMessage::TextReplacementUpdate { replacements } => {
                self.table = Arc::new(ReplacementTable::from_map(replacements));
            }
        }
        self.reconcile(ctx);
    }

    /// Push state to frames, then attach or detach to match the enabled flag
    fn reconcile(&mut self, ctx: &mut FrameContext<'_>) {
        if !self.started {
            return;
        }
        if self.role == EngineRole::Top {
            let message = BridgeMessage::data_update(&self.table, self.is_enabled());
            let sent = bridge::broadcast(ctx.document, ctx.frames, &message, ctx.effects);
            debug!(frames = sent, "Broadcast data-update");
        }
        match (self.is_enabled(), self.attached) {
            (true, false) => self.attach(ctx),
            (false, true) => self.detach(),
            _ => {}
        }
    }

    /// Start listening: input handling, mutation watching and, for the top
    /// frame, iframe discovery
    #[instrument(skip_all, fields(role = ?self.role))]
    pub fn attach(&mut self, ctx: &mut FrameContext<'_>) {
        if self.attached {
            return;
        }
        self.attached = true;
        self.surfaces.clear();
        self.watcher.connect();
        // Records from before attach are not ours to act on
        ctx.document.take_mutations();

        if self.role == EngineRole::Top {
            for iframe in bridge::discover_iframes(ctx.document) {
                self.schedule_injection(iframe, ctx.now_ms);
            }
            self.arm_sweep(ctx.now_ms);
        }
        info!(event_type = "engine_lifecycle", action = "attached", "Engine attached");
    }

    /// Stop listening and drop every pending timer
    #[instrument(skip_all, fields(role = ?self.role))]
    pub fn detach(&mut self) {
        let dropped = self.timers.len();
        self.timers.clear();
        self.debounce = None;
        self.sweep = None;
        self.watcher.disconnect();
        self.attached = false;
        info!(
            event_type = "engine_lifecycle",
            action = "detached",
            dropped_timers = dropped,
            "Engine detached"
        );
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn on_input(&mut self, event: InputEvent, ctx: &mut FrameContext<'_>) {
        if !self.attached {
            return;
        }
        if event.origin == EventOrigin::Redispatch {
            return;
        }
        self.schedule_debounce(event.target, ctx.now_ms);
    }

    pub fn on_keydown(&mut self, event: &KeyEvent, ctx: &mut FrameContext<'_>) {
        if !self.attached || !event.trusted || !is_trigger_key(&event.key) {
            return;
        }
        self.timers.schedule_at(
            ctx.now_ms + self.config.timing.keydown_probe_ms,
            Task::KeydownProbe {
                target: event.target,
            },
        );
    }

    pub fn on_mutations(&mut self, records: &[MutationRecord], ctx: &mut FrameContext<'_>) {
        if !self.attached || self.role != EngineRole::Top {
            return;
        }
        for iframe in self.watcher.take_new_iframes(ctx.document, records) {
            self.schedule_injection(iframe, ctx.now_ms);
        }
    }

    /// A message posted to this frame; anything that isn't a well-formed
    /// bridge message from the right peer is ignored
    pub fn on_message(&mut self, from: Peer, payload: Value, ctx: &mut FrameContext<'_>) {
        let Some(message) = parse_bridge_message(payload) else {
            return;
        };
        match (self.role, from, message) {
            (EngineRole::Top, Peer::Child(frame), BridgeMessage::RequestData { .. }) => {
                debug!(?frame, "Answering request-data");
                let reply = BridgeMessage::data_update(&self.table, self.is_enabled());
                self.post(ctx, Peer::Child(frame), reply);
            }
            (EngineRole::Top, Peer::Child(frame), BridgeMessage::IframeReady { url, .. }) => {
                info!(?frame, url = url.as_deref().unwrap_or(""), "Iframe engine ready");
            }
            (
                EngineRole::Frame,
                Peer::Parent,
                BridgeMessage::DataUpdate {
                    replacements,
                    enabled,
                    ..
                },
            ) => {
                if !self.link.received_data {
                    info!(attempts = self.link.attempts, "Received first data-update");
                }
                self.link.received_data = true;
                self.table = Arc::new(ReplacementTable::from_map(replacements));
                self.feature_enabled = enabled;
                self.extension_enabled = true;
                self.reconcile(ctx);
            }
            (role, from, message) => {
                debug!(?role, ?from, ?message, "Ignoring bridge message not meant for this engine");
            }
        }
    }

    /// Run every task due at `ctx.now_ms`, in due order
    pub fn tick(&mut self, ctx: &mut FrameContext<'_>) {
        while let Some((id, task)) = self.timers.pop_due(ctx.now_ms) {
            self.run_task(id, task, ctx);
        }
    }

    fn run_task(&mut self, id: TimerId, task: Task, ctx: &mut FrameContext<'_>) {
        match task {
            Task::ProcessInput { target } => {
                if self.debounce == Some(id) {
                    self.debounce = None;
                }
                self.process(target, ctx);
            }
            Task::KeydownProbe { target } => {
                if !ctx.document.is_alive(target) {
                    return;
                }
                // Some surfaces swallow the native input event for trigger keys
                ctx.document.dispatch_input(target, EventOrigin::KeydownProbe);
                self.schedule_debounce(target, ctx.now_ms);
            }
            Task::InjectFrame { iframe } => {
                if bridge::try_inject(ctx.document, ctx.frames, iframe, ctx.effects).is_err() {
                    self.arm_sweep(ctx.now_ms);
                }
            }
            Task::IframeSweep => {
                self.sweep = None;
                let found = bridge::discover_iframes(ctx.document);
                if found.is_empty() {
                    debug!("Iframe sweep found nothing, stopping");
                    return;
                }
                debug!(count = found.len(), "Iframe sweep found frames");
                for iframe in found {
                    self.schedule_injection(iframe, ctx.now_ms);
                }
                self.arm_sweep(ctx.now_ms);
            }
            Task::RequestData { attempt } => {
                if self.link.received_data {
                    return;
                }
                if attempt >= self.config.timing.bridge_max_retries {
                    warn!(attempts = attempt, "Parent never answered request-data, giving up");
                    return;
                }
                self.post(ctx, Peer::Parent, BridgeMessage::request_data());
                self.link.attempts = attempt + 1;
                self.timers.schedule_at(
                    ctx.now_ms + self.config.timing.bridge_retry_ms,
                    Task::RequestData {
                        attempt: attempt + 1,
                    },
                );
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn schedule_debounce(&mut self, target: NodeId, now_ms: u64) {
        if let Some(previous) = self.debounce.take() {
            self.timers.cancel(previous);
        }
        let id = self.timers.schedule_at(
            now_ms + self.config.timing.debounce_ms,
            Task::ProcessInput { target },
        );
        self.debounce = Some(id);
    }

    fn schedule_injection(&mut self, iframe: NodeId, now_ms: u64) {
        self.timers.schedule_at(
            now_ms + self.config.timing.iframe_inject_delay_ms,
            Task::InjectFrame { iframe },
        );
    }

    fn arm_sweep(&mut self, now_ms: u64) {
        if self.sweep.is_some_and(|id| self.timers.is_pending(id)) {
            return;
        }
        let id = self.timers.schedule_at(
            now_ms + self.config.timing.iframe_sweep_interval_ms,
            Task::IframeSweep,
        );
        self.sweep = Some(id);
    }

    fn post(&self, ctx: &mut FrameContext<'_>, to: Peer, message: BridgeMessage) {
        ctx.effects.push(Effect::PostMessage { to, message });
    }

    /// Detect and splice for one settled input on `target`
    fn process(&mut self, target: NodeId, ctx: &mut FrameContext<'_>) {
        if !self.attached || !self.is_enabled() {
            return;
        }
        let Some(surface) = self.surfaces.classify(ctx.document, target) else {
            debug!(?target, "Target is not a replaceable surface");
            return;
        };
        let Some(text) = surface.read_text(ctx.document) else {
            return;
        };
        let cursor = surface.read_cursor(ctx.document);
        let Some(matched) = detect(&text, cursor, &self.table) else {
            return;
        };
        debug!(
            keyword = %matched.keyword,
            surface = ?surface.kind(),
            cursor = matched.cursor,
            "Trigger detected"
        );

        let request = SpliceRequest { surface, matched };
        let mut splice = SpliceContext {
            document: &mut *ctx.document,
            clipboard: &mut *ctx.clipboard,
        };
        if let Err(e) = self.chains.for_kind(surface.kind()).run(&request, &mut splice) {
            debug!(error = %e, keyword = %request.matched.keyword, "Replacement abandoned");
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
