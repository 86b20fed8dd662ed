//! Strategies for `<input>` and `<textarea>`

use super::{locate_span, SpliceContext, SpliceError, SpliceRequest, SpliceStrategy};
use crate::dom::{char_len, splice_chars, NodeId};
use crate::surface::Surface;

fn input_element(req: &SpliceRequest) -> Result<NodeId, SpliceError> {
    match req.surface {
        Surface::InputLike { element } => Ok(element),
        _ => Err(SpliceError::NoValue),
    }
}

/// Splice through the native selection accessors
pub struct DirectValueSplice;

impl SpliceStrategy for DirectValueSplice {
    fn name(&self) -> &'static str {
        "direct-value"
    }

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError> {
        let element = input_element(req)?;
        let doc = &mut *ctx.document;
        let value = doc.value(element).ok_or(SpliceError::NoValue)?.to_string();
        let (_, caret) = doc.selection_range(element).ok_or(SpliceError::NoSelection)?;

        let needle = req.needle();
        let insertion = req.insertion();
        let start = locate_span(&value, caret, &needle)?;

        doc.set_value(element, &splice_chars(&value, start, caret, &insertion))?;
        let after = start + char_len(&insertion);
        doc.set_selection_range(element, after, after)?;
        Ok(())
    }
}

/// Rewrite the whole value at the detector's cursor.
///
/// Works for inputs that expose no selection API (`email`), where the
/// detector fell back to end-of-text.
pub struct TextContentSplice;

impl SpliceStrategy for TextContentSplice {
    fn name(&self) -> &'static str {
        "text-content"
    }

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError> {
        let element = input_element(req)?;
        let doc = &mut *ctx.document;
        let value = doc.value(element).ok_or(SpliceError::NoValue)?.to_string();

        let cursor = req.matched.cursor;
        let insertion = req.insertion();
        let start = locate_span(&value, cursor, &req.needle())?;

        doc.set_value(element, &splice_chars(&value, start, cursor, &insertion))?;
        // Not every input type can move its caret
        let after = start + char_len(&insertion);
        let _ = doc.set_selection_range(element, after, after);
        Ok(())
    }
}
