//! Replacement strategy chain
//!
//! A splice swaps `<keyword><trigger>` for `<replacement><trigger>` in
//! place. Surfaces differ wildly in what they allow, so each surface kind
//! has an ordered list of strategies; the first that succeeds wins. A
//! strategy either completes its edit or leaves the document untouched.
//!
//! Every success is followed by a bubbling, non-trusted `input` event on
//! the surface target so framework listeners see the new value. The engine
//! recognises that event by its origin and never re-processes it.

mod clipboard_paste;
mod command;
mod input;
mod rich;

use thiserror::Error;
use tracing::{debug, info};

use crate::clipboard::{Clipboard, ClipboardError};
use crate::dom::{
    char_len, locate_end, locate_start, Document, DomError, EventOrigin, NodeId, Range,
};
use crate::surface::{Surface, SurfaceKind};
use crate::trigger::TriggerMatch;

pub use clipboard_paste::ClipboardPaste;
pub use command::CommandInsert;
pub use input::{DirectValueSplice, TextContentSplice};
pub use rich::{FragmentSplice, RangeSplice, SelectionSplice};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpliceError {
    #[error("surface has no readable value")]
    NoValue,
    #[error("no usable selection")]
    NoSelection,
    #[error("'{needle}' does not end at offset {cursor}")]
    Mismatch { needle: String, cursor: usize },
    #[error("offset {0} does not map to a text position")]
    OffsetUnmapped(usize),
    #[error("span crosses text node boundaries")]
    SpansNodes,
    #[error("replacement needs markup to render")]
    NeedsMarkup,
    #[error(transparent)]
    Dom(#[from] DomError),
    #[error("editing command '{0}' was rejected")]
    CommandRejected(&'static str),
    #[error("paste was rejected")]
    PasteRejected,
    #[error("previous clipboard contents could not be saved")]
    ClipboardUnsaved,
    #[error(transparent)]
    Clipboard(#[from] ClipboardError),
    #[error("every strategy failed")]
    ChainExhausted,
}

/// One replacement to perform
#[derive(Debug, Clone)]
pub struct SpliceRequest {
    pub surface: Surface,
    pub matched: TriggerMatch,
}

impl SpliceRequest {
    pub fn needle(&self) -> String {
        self.matched.needle()
    }

    pub fn insertion(&self) -> String {
        self.matched.insertion()
    }
}

/// What a strategy may touch
pub struct SpliceContext<'a> {
    pub document: &'a mut Document,
    pub clipboard: &'a mut dyn Clipboard,
}

pub trait SpliceStrategy {
    fn name(&self) -> &'static str;

    fn apply(&self, req: &SpliceRequest, ctx: &mut SpliceContext<'_>) -> Result<(), SpliceError>;
}

/// Char offset where `needle` starts, if `text[..cursor]` ends with it
pub(crate) fn locate_span(text: &str, cursor: usize, needle: &str) -> Result<usize, SpliceError> {
    let mismatch = || SpliceError::Mismatch {
        needle: needle.to_string(),
        cursor,
    };
    if cursor > char_len(text) {
        return Err(mismatch());
    }
    let prefix: String = text.chars().take(cursor).collect();
    if !prefix.ends_with(needle) {
        return Err(mismatch());
    }
    Ok(cursor - char_len(needle))
}

/// Fresh DOM range for the needle in a rich host, re-read from the live document
pub(crate) fn host_span(doc: &Document, host: NodeId, req: &SpliceRequest) -> Result<Range, SpliceError> {
    if !doc.is_alive(host) {
        return Err(SpliceError::NoValue);
    }
    let text = doc.text_content(host);
    let cursor = doc
        .selection()
        .and_then(|s| crate::dom::flat_offset(doc, host, s.end))
        .unwrap_or(req.matched.cursor);
    let start = locate_span(&text, cursor, &req.needle())?;
    let start_point = locate_start(doc, host, start).ok_or(SpliceError::OffsetUnmapped(start))?;
    let end_point = locate_end(doc, host, cursor).ok_or(SpliceError::OffsetUnmapped(cursor))?;
    Ok(Range::new(start_point, end_point))
}

/// Ordered strategies for one surface kind
pub struct StrategyChain {
    strategies: Vec<Box<dyn SpliceStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn SpliceStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn input_like() -> Self {
        Self::new(vec![Box::new(DirectValueSplice), Box::new(TextContentSplice)])
    }

    pub fn rich_editable() -> Self {
        Self::new(vec![
            Box::new(RangeSplice),
            Box::new(SelectionSplice),
            Box::new(FragmentSplice),
            Box::new(CommandInsert),
            Box::new(ClipboardPaste),
        ])
    }

    pub fn opaque() -> Self {
        Self::new(vec![Box::new(SelectionSplice)])
    }

    pub fn for_kind(kind: SurfaceKind) -> Self {
        match kind {
            SurfaceKind::InputLike => Self::input_like(),
            SurfaceKind::RichEditable => Self::rich_editable(),
            SurfaceKind::Opaque => Self::opaque(),
        }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order; on success redispatch `input` and return its name
    pub fn run(
        &self,
        req: &SpliceRequest,
        ctx: &mut SpliceContext<'_>,
    ) -> Result<&'static str, SpliceError> {
        for strategy in &self.strategies {
            match strategy.apply(req, ctx) {
                Ok(()) => {
                    ctx.document
                        .dispatch_input(req.surface.target(), EventOrigin::Redispatch);
                    info!(
                        strategy = strategy.name(),
                        keyword = %req.matched.keyword,
                        "Replacement applied"
                    );
                    return Ok(strategy.name());
                }
                Err(e) => {
                    debug!(strategy = strategy.name(), error = %e, "Strategy failed, trying next");
                }
            }
        }
        debug!(keyword = %req.matched.keyword, "All strategies failed");
        Err(SpliceError::ChainExhausted)
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
