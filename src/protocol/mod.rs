//! Message protocol
//!
//! Two families of `type`-tagged JSON messages:
//!
//! - `BridgeMessage`: parent page ↔ iframe engines (`request-data`,
//!   `data-update`, `iframe-ready`)
//! - `ExtensionMessage`: extension runtime → top-level engine
//!   (`EXT_STATE`, `TEXT_REPLACEMENT_TOGGLE`, `TEXT_REPLACEMENT_UPDATE`)
//!
//! # Module Structure
//!
//! - `message`: the message enums and constructors
//! - `io`: graceful classification of incoming values

mod io;
mod message;

pub use io::*;
pub use message::*;
