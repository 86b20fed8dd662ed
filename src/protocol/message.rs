use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::table::ReplacementTable;

/// Which side of the bridge sent a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    ReplacerParent,
    ReplacerFrame,
}

fn default_true() -> bool {
    true
}

/// Messages posted between a page's engine and the engines in its iframes.
///
/// Wire shape: `{type, source, replacements?, enabled?, url?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BridgeMessage {
    /// Child asks the parent for the current table and flag
    RequestData { source: SourceTag },

    /// Parent pushes the full table and flag
    DataUpdate {
        source: SourceTag,
        #[serde(default)]
        replacements: BTreeMap<String, String>,
        #[serde(default = "default_true")]
        enabled: bool,
    },

    /// Child announces it is installed; `url` is diagnostic only
    IframeReady {
        source: SourceTag,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl BridgeMessage {
    pub fn request_data() -> Self {
        BridgeMessage::RequestData {
            source: SourceTag::ReplacerFrame,
        }
    }

    pub fn iframe_ready(url: impl Into<String>) -> Self {
        BridgeMessage::IframeReady {
            source: SourceTag::ReplacerFrame,
            url: Some(url.into()),
        }
    }

    pub fn data_update(table: &ReplacementTable, enabled: bool) -> Self {
        BridgeMessage::DataUpdate {
            source: SourceTag::ReplacerParent,
            replacements: table.to_plain(),
            enabled,
        }
    }

    pub fn source(&self) -> SourceTag {
        match self {
            BridgeMessage::RequestData { source }
            | BridgeMessage::DataUpdate { source, .. }
            | BridgeMessage::IframeReady { source, .. } => *source,
        }
    }

    /// Whether the message travels in the direction its type implies
    pub fn has_expected_source(&self) -> bool {
        match self {
            BridgeMessage::DataUpdate { source, .. } => *source == SourceTag::ReplacerParent,
            BridgeMessage::RequestData { source } | BridgeMessage::IframeReady { source, .. } => {
                *source == SourceTag::ReplacerFrame
            }
        }
    }
}

/// Messages from the extension runtime to the top-level engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtensionMessage {
    /// Global extension on/off
    ExtState {
        #[serde(default)]
        enabled: Option<bool>,
    },
    /// Feature switch for text replacement
    TextReplacementToggle { enabled: bool },
    /// Replacement table changed
    TextReplacementUpdate {
        #[serde(default)]
        replacements: BTreeMap<String, String>,
    },
}
