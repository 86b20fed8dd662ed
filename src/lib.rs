//! Text Replacer - live keyword-to-text replacement for editable surfaces
//!
//! Watches typing in plain inputs, textareas and rich editors, and when a
//! known keyword is followed by a trigger character (space or
//! punctuation) swaps the keyword for its replacement in place. Engines in
//! same-origin iframes are kept in sync with the top frame over a small
//! message bridge.
//!
//! The browser side is modelled by [`page::Page`] and [`dom::Document`] so
//! the whole pipeline runs deterministically against a virtual clock.

pub mod bridge;
pub mod clipboard;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mutation_watcher;
pub mod page;
pub mod protocol;
pub mod store;
pub mod strategy;
pub mod surface;
pub mod table;
pub mod timer;
pub mod trigger;
