//! Direct DOM strategies for contenteditable regions

use tracing::debug;

use super::{host_span, locate_span, SpliceContext, SpliceError, SpliceRequest, SpliceStrategy};
use crate::dom::{
    format_for_rich_text, locate_end, locate_start, needs_markup, DomError, NodeId, Range,
};
use crate::surface::Surface;

fn rich_host(req: &SpliceRequest) -> Result<NodeId, SpliceError> {
    match req.surface {
        Surface::RichEditable { host, .. } => Ok(host),
        _ => Err(SpliceError::NoValue),
    }
}

/// Node-local range built from the detector's offsets; plain text insert
pub struct RangeSplice;

impl SpliceStrategy for RangeSplice {
    fn name(&self) -> &'static str {
        "range-splice"
    }

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError> {
        let host = rich_host(req)?;
        let insertion = req.insertion();
        if needs_markup(&insertion) {
            return Err(SpliceError::NeedsMarkup);
        }
        let doc = &mut *ctx.document;

        let (start, end) = (req.matched.keyword_start, req.matched.cursor);
        let start_point = locate_start(doc, host, start).ok_or(SpliceError::OffsetUnmapped(start))?;
        let end_point = locate_end(doc, host, end).ok_or(SpliceError::OffsetUnmapped(end))?;
        if start_point.node != end_point.node {
            return Err(SpliceError::SpansNodes);
        }

        let text = doc
            .text_data(start_point.node)
            .ok_or(DomError::NotText(start_point.node))?;
        locate_span(text, end_point.offset, &req.needle())?;

        let range = Range::new(start_point, end_point);
        let caret = doc.replace_range_with_text(&range, &insertion)?;
        doc.collapse_selection(caret);
        Ok(())
    }
}

/// Anchored to the text node holding the live caret
pub struct SelectionSplice;

impl SpliceStrategy for SelectionSplice {
    fn name(&self) -> &'static str {
        "selection-splice"
    }

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError> {
        let doc = &mut *ctx.document;
        let caret = doc.selection().ok_or(SpliceError::NoSelection)?.end;
        if !doc.is_content_editable(caret.node) {
            return Err(SpliceError::NoSelection);
        }
        let text = doc.text_data(caret.node).ok_or(DomError::NotText(caret.node))?;
        let start = locate_span(text, caret.offset, &req.needle())?;

        let range = Range::in_text(caret.node, start, caret.offset);
        let insertion = req.insertion();
        let after = if needs_markup(&insertion) {
            doc.replace_range_with_markup(&range, &format_for_rich_text(&insertion))?
        } else {
            doc.replace_range_with_text(&range, &insertion)?
        };
        doc.collapse_selection(after);
        Ok(())
    }
}

/// Fresh flat offsets over the whole host; may cross text nodes.
///
/// Inserts an escaped markup fragment so newlines and runs of spaces survive.
pub struct FragmentSplice;

impl SpliceStrategy for FragmentSplice {
    fn name(&self) -> &'static str {
        "fragment-splice"
    }

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError> {
        let host = rich_host(req)?;
        let doc = &mut *ctx.document;
        let range = host_span(doc, host, req)?;
        debug!(
            spans_nodes = range.start.node != range.end.node,
            "Fragment splice range"
        );
        let markup = format_for_rich_text(&req.insertion());
        let caret = doc.replace_range_with_markup(&range, &markup)?;
        doc.collapse_selection(caret);
        Ok(())
    }
}
