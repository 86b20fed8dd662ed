use tracing::debug;

use super::{host_span, SpliceContext, SpliceError, SpliceRequest, SpliceStrategy};
use crate::clipboard::ClipboardContent;
use crate::dom::format_for_rich_text;
use crate::error::ResultExt;
use crate::surface::Surface;

/// Last resort: put the replacement on the clipboard and paste it over the span.
///
/// Whatever was on the clipboard before is put back afterwards, whether or
/// not the paste went through. When the current contents can't be read as
/// text (empty, non-text, or a read error) the clipboard is left untouched
/// and the strategy fails.
pub struct ClipboardPaste;

impl SpliceStrategy for ClipboardPaste {
    fn name(&self) -> &'static str {
        "clipboard-paste"
    }

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError> {
        let Surface::RichEditable { host, .. } = req.surface else {
            return Err(SpliceError::NoValue);
        };
        let range = host_span(ctx.document, host, req)?;

        let Some(saved) = ctx.clipboard.read().warn_on_err().flatten() else {
            return Err(SpliceError::ClipboardUnsaved);
        };
        let insertion = req.insertion();
        ctx.clipboard.write(&ClipboardContent {
            html: Some(format_for_rich_text(&insertion)),
            plain: insertion,
        })?;

        let previous = ctx.document.selection();
        ctx.document.focus(host);
        ctx.document.set_selection(Some(range));
        let pasted = ctx.document.exec_paste(ctx.clipboard);

        ctx.clipboard.write(&saved).warn_on_err();
        debug!(pasted, "Clipboard restored after paste");

        if !pasted {
            ctx.document.set_selection(previous);
            return Err(SpliceError::PasteRejected);
        }
        Ok(())
    }
}
