//! Clipboard access for the paste-based replacement fallback
//!
//! The engine only needs to save, write and restore plain text plus an
//! optional HTML flavour. [`SystemClipboard`] talks to the OS clipboard
//! through `arboard`; [`MemoryClipboard`] backs tests and embedders
//! without one.

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClipboardContent {
    pub plain: String,
    pub html: Option<String>,
}

impl ClipboardContent {
    pub fn text(plain: impl Into<String>) -> Self {
        Self {
            plain: plain.into(),
            html: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("clipboard unavailable: {0}")]
    Unavailable(String),
    #[error("clipboard write failed: {0}")]
    Write(String),
    #[error("clipboard read failed: {0}")]
    Read(String),
}

pub trait Clipboard {
    /// Current contents; `None` when the clipboard is empty or holds no text
    fn read(&mut self) -> Result<Option<ClipboardContent>, ClipboardError>;

    fn write(&mut self, content: &ClipboardContent) -> Result<(), ClipboardError>;

    fn clear(&mut self) -> Result<(), ClipboardError>;
}

/// In-process clipboard
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    content: Option<ClipboardContent>,
    fail_writes: bool,
}

impl MemoryClipboard {
    pub fn with_content(content: ClipboardContent) -> Self {
        Self {
            content: Some(content),
            fail_writes: false,
        }
    }

    /// A clipboard that refuses every write (permission denied, locked, ...)
    pub fn read_only() -> Self {
        Self {
            content: None,
            fail_writes: true,
        }
    }

    pub fn content(&self) -> Option<&ClipboardContent> {
        self.content.as_ref()
    }
}

impl Clipboard for MemoryClipboard {
    fn read(&mut self) -> Result<Option<ClipboardContent>, ClipboardError> {
        Ok(self.content.clone())
    }

    fn write(&mut self, content: &ClipboardContent) -> Result<(), ClipboardError> {
        if self.fail_writes {
            return Err(ClipboardError::Write("clipboard is read-only".to_string()));
        }
        self.content = Some(content.clone());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ClipboardError> {
        if self.fail_writes {
            return Err(ClipboardError::Write("clipboard is read-only".to_string()));
        }
        self.content = None;
        Ok(())
    }
}

/// OS clipboard via `arboard`.
///
/// Reading only recovers the plain text flavour; `arboard` has no HTML getter.
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let inner =
            arboard::Clipboard::new().map_err(|e| ClipboardError::Unavailable(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl Clipboard for SystemClipboard {
    fn read(&mut self) -> Result<Option<ClipboardContent>, ClipboardError> {
        match self.inner.get_text() {
            Ok(text) => Ok(Some(ClipboardContent::text(text))),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(ClipboardError::Read(e.to_string())),
        }
    }

    fn write(&mut self, content: &ClipboardContent) -> Result<(), ClipboardError> {
        let result = match &content.html {
            Some(html) => self
                .inner
                .set_html(html.as_str(), Some(content.plain.as_str())),
            None => self.inner.set_text(content.plain.as_str()),
        };
        result.map_err(|e| ClipboardError::Write(e.to_string()))?;
        debug!(
            has_html = content.html.is_some(),
            plain_len = content.plain.len(),
            "Wrote clipboard"
        );
        Ok(())
    }

    fn clear(&mut self) -> Result<(), ClipboardError> {
        self.inner
            .clear()
            .map_err(|e| ClipboardError::Write(e.to_string()))
    }
}
