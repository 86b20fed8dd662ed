use super::*;
use crate::clipboard::{ClipboardContent, MemoryClipboard};
use crate::dom::{Boundary, EditingSupport};
use crate::surface::classify;
use crate::table::ReplacementTable;
use crate::trigger::detect;

fn table() -> ReplacementTable {
    ReplacementTable::from_map([
        ("br", "bridge"),
        ("brb", "be right back"),
        ("addr", "1 Main St\nSpringfield"),
    ])
}

fn editable(doc: &mut Document, markup: &str) -> NodeId {
    let div = doc.create_element("div");
    doc.set_attribute(div, "contenteditable", "true").unwrap();
    doc.append_child(doc.body(), div).unwrap();
    doc.set_inner_html(div, markup).unwrap();
    div
}

/// Put the caret at the end of the host's last text node
fn caret_at_end(doc: &mut Document, host: NodeId) {
    let last = *crate::dom::text_nodes(doc, host).last().unwrap();
    let len = doc.text_data(last).unwrap().chars().count();
    doc.collapse_selection(Boundary::new(last, len));
}

fn request(doc: &Document, target: NodeId) -> SpliceRequest {
    let surface = classify(doc, target).unwrap();
    let text = surface.read_text(doc).unwrap();
    let matched = detect(&text, surface.read_cursor(doc), &table()).unwrap();
    SpliceRequest { surface, matched }
}

fn run(doc: &mut Document, clipboard: &mut MemoryClipboard, target: NodeId) -> Result<&'static str, SpliceError> {
    let req = request(doc, target);
    let chain = StrategyChain::for_kind(req.surface.kind());
    let mut ctx = SpliceContext {
        document: doc,
        clipboard,
    };
    chain.run(&req, &mut ctx)
}

#[test]
fn test_chain_order_per_surface() {
    assert_eq!(StrategyChain::input_like().names(), ["direct-value", "text-content"]);
    assert_eq!(
        StrategyChain::rich_editable().names(),
        [
            "range-splice",
            "selection-splice",
            "fragment-splice",
            "command-insert",
            "clipboard-paste"
        ]
    );
    assert_eq!(StrategyChain::opaque().names(), ["selection-splice"]);
}

#[test]
fn test_locate_span_requires_needle_at_cursor() {
    assert_eq!(locate_span("say brb now", 8, "brb "), Ok(4));
    assert!(matches!(
        locate_span("say brb now", 7, "brb "),
        Err(SpliceError::Mismatch { .. })
    ));
    assert!(locate_span("ab", 5, "b").is_err());
}

#[test]
fn test_input_splice_places_caret_after_trigger() {
    let mut doc = Document::new("https://a.test/");
    let input = doc.create_element("input");
    doc.append_child(doc.body(), input).unwrap();
    doc.set_value(input, "see brb, tail").unwrap();
    doc.set_selection_range(input, 8, 8).unwrap();

    let used = run(&mut doc, &mut MemoryClipboard::default(), input).unwrap();
    assert_eq!(used, "direct-value");
    assert_eq!(doc.value(input), Some("see be right back, tail"));
    assert_eq!(doc.selection_range(input), Some((18, 18)));
}

#[test]
fn test_email_input_falls_back_to_text_content() {
    let mut doc = Document::new("https://a.test/");
    let input = doc.create_element("input");
    doc.set_attribute(input, "type", "email").unwrap();
    doc.append_child(doc.body(), input).unwrap();
    doc.set_value(input, "brb ").unwrap();

    let used = run(&mut doc, &mut MemoryClipboard::default(), input).unwrap();
    assert_eq!(used, "text-content");
    assert_eq!(doc.value(input), Some("be right back "));
}

#[test]
fn test_rich_splice_preserves_sibling_formatting() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "<b>text</b> brb ");
    caret_at_end(&mut doc, host);

    let used = run(&mut doc, &mut MemoryClipboard::default(), host).unwrap();
    assert_eq!(used, "range-splice");
    assert_eq!(doc.inner_html(host), "<b>text</b> be right back ");

    let caret = doc.selection().unwrap().end;
    assert_eq!(crate::dom::flat_offset(&doc, host, caret), Some(19));
}

#[test]
fn test_keyword_split_across_nodes_uses_fragment_splice() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "<i>b</i>r ");
    caret_at_end(&mut doc, host);

    let used = run(&mut doc, &mut MemoryClipboard::default(), host).unwrap();
    assert_eq!(used, "fragment-splice");
    assert_eq!(doc.text_content(host), "bridge ");
}

#[test]
fn test_multiline_replacement_renders_line_break() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "addr.");
    caret_at_end(&mut doc, host);

    let used = run(&mut doc, &mut MemoryClipboard::default(), host).unwrap();
    assert_eq!(used, "selection-splice");
    assert_eq!(doc.inner_html(host), "1 Main St<br>Springfield.");
}

#[test]
fn test_guarded_editor_falls_back_to_command_insert() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "hello brb ");
    doc.guard_subtree(host);
    caret_at_end(&mut doc, host);

    let used = run(&mut doc, &mut MemoryClipboard::default(), host).unwrap();
    assert_eq!(used, "command-insert");
    assert_eq!(doc.text_content(host), "hello be right back ");
}

#[test]
fn test_insert_text_used_when_insert_html_unsupported() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "brb!");
    doc.guard_subtree(host);
    doc.set_editing_support(EditingSupport {
        insert_html: false,
        ..EditingSupport::default()
    });
    caret_at_end(&mut doc, host);

    let used = run(&mut doc, &mut MemoryClipboard::default(), host).unwrap();
    assert_eq!(used, "command-insert");
    assert_eq!(doc.text_content(host), "be right back!");
}

#[test]
fn test_clipboard_paste_restores_previous_clipboard() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "brb ");
    doc.guard_subtree(host);
    doc.set_editing_support(EditingSupport {
        insert_text: false,
        insert_html: false,
        paste: true,
    });
    caret_at_end(&mut doc, host);

    let previous = ClipboardContent::text("user data");
    let mut clipboard = MemoryClipboard::with_content(previous.clone());
    let used = run(&mut doc, &mut clipboard, host).unwrap();
    assert_eq!(used, "clipboard-paste");
    assert_eq!(doc.text_content(host), "be right back ");
    assert_eq!(clipboard.content(), Some(&previous));
}

#[test]
fn test_clipboard_paste_skipped_when_clipboard_cannot_be_saved() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "x brb ");
    doc.guard_subtree(host);
    doc.set_editing_support(EditingSupport {
        insert_text: false,
        insert_html: false,
        paste: true,
    });
    caret_at_end(&mut doc, host);
    let before = doc.selection();

    let mut clipboard = MemoryClipboard::default();
    let result = run(&mut doc, &mut clipboard, host);
    assert_eq!(result, Err(SpliceError::ChainExhausted));
    assert_eq!(doc.inner_html(host), "x brb ");
    assert_eq!(doc.selection(), before);
    assert_eq!(clipboard.content(), None);
}

#[test]
fn test_exhausted_chain_leaves_document_untouched() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "x brb ");
    doc.guard_subtree(host);
    doc.set_editing_support(EditingSupport {
        insert_text: false,
        insert_html: false,
        paste: false,
    });
    caret_at_end(&mut doc, host);
    let before = doc.selection();

    let result = run(&mut doc, &mut MemoryClipboard::default(), host);
    assert_eq!(result, Err(SpliceError::ChainExhausted));
    assert_eq!(doc.inner_html(host), "x brb ");
    assert_eq!(doc.selection(), before);
    assert!(doc.events().is_empty());
}

#[test]
fn test_success_redispatches_untrusted_input() {
    let mut doc = Document::new("https://a.test/");
    let host = editable(&mut doc, "<p>brb </p>");
    caret_at_end(&mut doc, host);

    run(&mut doc, &mut MemoryClipboard::default(), host).unwrap();
    let events = doc.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].target, host);
    assert_eq!(events[0].origin, EventOrigin::Redispatch);
    assert!(!events[0].origin.is_trusted());
}
