use std::collections::BTreeMap;

use serde_json::json;

use super::*;
use crate::bridge::FrameInfo;
use crate::clipboard::MemoryClipboard;
use crate::dom::FrameId;
use crate::protocol::to_value;

struct Harness {
    doc: Document,
    clipboard: MemoryClipboard,
    frames: FrameDirectory,
    effects: Vec<Effect>,
    now: u64,
}

impl Harness {
    fn new() -> Self {
        Self {
            doc: Document::new("https://app.test/page"),
            clipboard: MemoryClipboard::default(),
            frames: FrameDirectory::default(),
            effects: Vec::new(),
            now: 0,
        }
    }

    fn ctx(&mut self) -> FrameContext<'_> {
        FrameContext {
            document: &mut self.doc,
            clipboard: &mut self.clipboard,
            frames: &self.frames,
            effects: &mut self.effects,
            now_ms: self.now,
        }
    }

    fn advance(&mut self, engine: &mut Engine, ms: u64) {
        self.now += ms;
        engine.tick(&mut self.ctx());
    }

    fn input(&mut self, value: &str) -> NodeId {
        let input = self.doc.create_element("input");
        self.doc.append_child(self.doc.body(), input).unwrap();
        self.doc.set_value(input, value).unwrap();
        input
    }
}

fn settings(enabled: bool) -> Settings {
    Settings {
        replacements: BTreeMap::from([
            ("brb".to_string(), "be right back".to_string()),
            ("br".to_string(), "bridge".to_string()),
        ]),
        text_replacement_enabled: Some(enabled),
        enabled: None,
    }
}

fn top_engine(h: &mut Harness, enabled: bool) -> Engine {
    let mut engine = Engine::new(EngineRole::Top, EngineConfig::default());
    engine.start(&mut h.ctx());
    engine.apply_settings(&settings(enabled), &mut h.ctx());
    h.effects.clear();
    engine
}

fn user_input(target: NodeId) -> InputEvent {
    InputEvent {
        target,
        origin: EventOrigin::User,
    }
}

#[test]
fn test_start_is_idempotent_and_disabled_engine_stays_detached() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, false);
    assert!(engine.is_started());
    assert!(!engine.is_attached());
    engine.start(&mut h.ctx());
    assert!(h.effects.is_empty());
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn test_input_is_replaced_after_debounce() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);
    assert!(engine.is_attached());
    let input = h.input("see brb ");

    engine.on_input(user_input(input), &mut h.ctx());
    h.advance(&mut engine, 5);
    assert_eq!(h.doc.value(input), Some("see brb "));
    h.advance(&mut engine, 5);
    assert_eq!(h.doc.value(input), Some("see be right back "));
    assert_eq!(h.doc.selection_range(input), Some((18, 18)));
}

#[test]
fn test_debounce_keeps_a_single_timer() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);
    let timers_before = engine.pending_timers();
    let input = h.input("x");
    for _ in 0..5 {
        engine.on_input(user_input(input), &mut h.ctx());
    }
    assert_eq!(engine.pending_timers(), timers_before + 1);
}

#[test]
fn test_redispatched_input_is_ignored() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);
    let timers_before = engine.pending_timers();
    let input = h.input("brb ");
    engine.on_input(
        InputEvent {
            target: input,
            origin: EventOrigin::Redispatch,
        },
        &mut h.ctx(),
    );
    assert_eq!(engine.pending_timers(), timers_before);
}

#[test]
fn test_trusted_trigger_keydown_probes_without_native_input() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);
    let input = h.input("brb.");

    let mut key = KeyEvent {
        target: input,
        key: ".".to_string(),
        trusted: false,
    };
    let timers_before = engine.pending_timers();
    engine.on_keydown(&key, &mut h.ctx());
    assert_eq!(engine.pending_timers(), timers_before);

    key.key = "a".to_string();
    key.trusted = true;
    engine.on_keydown(&key, &mut h.ctx());
    assert_eq!(engine.pending_timers(), timers_before);

    key.key = ".".to_string();
    engine.on_keydown(&key, &mut h.ctx());
    h.advance(&mut engine, 10);
    assert_eq!(
        h.doc.events().last().map(|e| e.origin),
        Some(EventOrigin::KeydownProbe)
    );
    h.advance(&mut engine, 10);
    assert_eq!(h.doc.value(input), Some("be right back."));
}

#[test]
fn test_disable_clears_every_timer_and_stops_processing() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);
    let input = h.input("brb ");
    engine.on_input(user_input(input), &mut h.ctx());
    assert!(engine.pending_timers() > 0);

    engine.handle_extension_message(
        ExtensionMessage::TextReplacementToggle { enabled: false },
        &mut h.ctx(),
    );
    assert!(!engine.is_attached());
    assert_eq!(engine.pending_timers(), 0);

    engine.on_input(user_input(input), &mut h.ctx());
    h.advance(&mut engine, 100);
    assert_eq!(engine.pending_timers(), 0);
    assert_eq!(h.doc.value(input), Some("brb "));
}

#[test]
fn test_extension_state_and_table_updates() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);

    engine.handle_extension_message(ExtensionMessage::ExtState { enabled: Some(false) }, &mut h.ctx());
    assert!(!engine.is_enabled());
    assert!(!engine.is_attached());

    engine.handle_extension_message(ExtensionMessage::ExtState { enabled: None }, &mut h.ctx());
    assert!(!engine.is_enabled());

    engine.handle_extension_message(ExtensionMessage::ExtState { enabled: Some(true) }, &mut h.ctx());
    assert!(engine.is_attached());

    engine.handle_extension_message(
        ExtensionMessage::TextReplacementUpdate {
            replacements: BTreeMap::from([("ty".to_string(), "thank you".to_string())]),
        },
        &mut h.ctx(),
    );
    assert_eq!(engine.table().get("ty"), Some("thank you"));
    assert_eq!(engine.table().get("brb"), None);
}

#[test]
fn test_top_broadcasts_disable_before_detaching() {
    let mut h = Harness::new();
    let iframe = h.doc.create_element("iframe");
    h.doc.set_content_frame(iframe, FrameId(1)).unwrap();
    h.doc.append_child(h.doc.body(), iframe).unwrap();
    h.frames.insert(
        FrameId(1),
        FrameInfo {
            origin: "https://app.test".into(),
            url: "https://app.test/frame".into(),
            ready: true,
            has_engine: true,
        },
    );
    let mut engine = top_engine(&mut h, true);

    let table = engine.table();
    engine.configure(table, false, &mut h.ctx());
    assert!(!engine.is_attached());
    assert!(h.effects.contains(&Effect::PostMessage {
        to: Peer::Child(FrameId(1)),
        message: BridgeMessage::DataUpdate {
            source: crate::protocol::SourceTag::ReplacerParent,
            replacements: engine.table().to_plain(),
            enabled: false,
        },
    }));
}

#[test]
fn test_top_answers_request_data_only_from_children() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);
    let request = to_value(&BridgeMessage::request_data()).unwrap();

    engine.on_message(Peer::Unrelated, request.clone(), &mut h.ctx());
    engine.on_message(Peer::Child(FrameId(3)), json!({"type": "noise"}), &mut h.ctx());
    assert!(h.effects.is_empty());

    engine.on_message(Peer::Child(FrameId(3)), request, &mut h.ctx());
    assert_eq!(h.effects.len(), 1);
    assert!(matches!(
        &h.effects[0],
        Effect::PostMessage {
            to: Peer::Child(FrameId(3)),
            message: BridgeMessage::DataUpdate { enabled: true, .. }
        }
    ));
}

#[test]
fn test_frame_engine_retries_until_first_update() {
    let mut h = Harness::new();
    let mut engine = Engine::new(EngineRole::Frame, EngineConfig::default());
    engine.start(&mut h.ctx());
    assert_eq!(h.effects.len(), 2);
    assert!(matches!(
        &h.effects[1],
        Effect::PostMessage {
            to: Peer::Parent,
            message: BridgeMessage::IframeReady { .. }
        }
    ));
    h.effects.clear();

    h.advance(&mut engine, 100);
    h.advance(&mut engine, 100);
    assert_eq!(h.effects.len(), 2);
    assert!(!engine.is_attached());

    let update = to_value(&BridgeMessage::data_update(
        &ReplacementTable::from_map([("brb", "be right back")]),
        true,
    ))
    .unwrap();
    // Only the parent may configure a frame engine
    engine.on_message(Peer::Unrelated, update.clone(), &mut h.ctx());
    assert!(!engine.has_received_data());

    engine.on_message(Peer::Parent, update, &mut h.ctx());
    assert!(engine.has_received_data());
    assert!(engine.is_attached());
    assert_eq!(engine.table().get("brb"), Some("be right back"));

    h.effects.clear();
    h.advance(&mut engine, 1000);
    assert!(h.effects.is_empty());
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn test_frame_engine_gives_up_after_max_retries() {
    let mut h = Harness::new();
    let mut config = EngineConfig::default();
    config.timing.bridge_max_retries = 3;
    let mut engine = Engine::new(EngineRole::Frame, config);
    engine.start(&mut h.ctx());
    for _ in 0..10 {
        h.advance(&mut engine, 100);
    }
    let requests = h
        .effects
        .iter()
        .filter(|e| {
            matches!(
                e,
                Effect::PostMessage {
                    message: BridgeMessage::RequestData { .. },
                    ..
                }
            )
        })
        .count();
    assert_eq!(requests, 3);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn test_sweep_stops_when_nothing_is_found() {
    let mut h = Harness::new();
    let mut engine = top_engine(&mut h, true);
    assert_eq!(engine.pending_timers(), 1);
    h.advance(&mut engine, 5000);
    assert_eq!(engine.pending_timers(), 0);
}

#[test]
fn test_cross_origin_injection_rearms_sweep() {
    let mut h = Harness::new();
    let iframe = h.doc.create_element("iframe");
    h.doc.set_content_frame(iframe, FrameId(1)).unwrap();
    h.doc.append_child(h.doc.body(), iframe).unwrap();
    h.frames.insert(
        FrameId(1),
        FrameInfo {
            origin: "https://ads.test".into(),
            url: "https://ads.test/x".into(),
            ready: true,
            has_engine: false,
        },
    );
    let mut engine = top_engine(&mut h, true);

    h.advance(&mut engine, 1000);
    assert!(h.effects.is_empty());
    assert!(!crate::bridge::is_processed(&h.doc, iframe));
    // Sweep picks it up again and schedules another attempt
    h.advance(&mut engine, 4000);
    assert!(crate::bridge::is_processed(&h.doc, iframe));
    assert_eq!(engine.pending_timers(), 2);
}
