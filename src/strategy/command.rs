use tracing::debug;

use super::{host_span, SpliceContext, SpliceError, SpliceRequest, SpliceStrategy};
use crate::dom::format_for_rich_text;
use crate::surface::Surface;

/// Select the span and let the editor replace it through editing commands.
///
/// Editors that keep their own document model reject direct DOM edits but
/// still honour `insertHTML` / `insertText`.
pub struct CommandInsert;

impl SpliceStrategy for CommandInsert {
    fn name(&self) -> &'static str {
        "command-insert"
    }

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError> {
        let Surface::RichEditable { host, .. } = req.surface else {
            return Err(SpliceError::NoValue);
        };
        let doc = &mut *ctx.document;
        let range = host_span(doc, host, req)?;

        let previous = doc.selection();
        doc.focus(host);
        doc.set_selection(Some(range));

        let insertion = req.insertion();
        if doc.exec_insert_html(&format_for_rich_text(&insertion)) {
            return Ok(());
        }
        debug!("insertHTML unavailable, falling back to insertText");
        if doc.exec_insert_text(&insertion) {
            return Ok(());
        }

        doc.set_selection(previous);
        Err(SpliceError::CommandRejected("insertText"))
    }
}
