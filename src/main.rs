//! Interactive demo: type lines into a textarea and watch keywords expand.
//!
//! Reads the stored settings (reloading when the file changes on disk),
//! starts an engine on a one-textarea page and types every stdin line into
//! it, followed by a newline.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use tracing::info;

use text_replacer::clipboard::SystemClipboard;
use text_replacer::config::{default_config_path, load_config};
use text_replacer::error::ResultExt;
use text_replacer::logging;
use text_replacer::page::Page;
use text_replacer::store::{SettingsStore, SettingsWatcher};

fn main() -> Result<()> {
    let _guard = logging::init();

    let config = load_config(&default_config_path());
    let store = SettingsStore::new(SettingsStore::default_path());
    let settings = store.load().context("Failed to load settings")?;
    if !settings.engine_enabled() {
        eprintln!(
            "Text replacement is disabled; set \"textReplacementEnabled\": true in {}",
            store.path().display()
        );
    }

    let (mut watcher, reloads) = SettingsWatcher::new(store.path());
    watcher.start().warn_on_err();

    let mut page = match SystemClipboard::new().warn_on_err() {
        Some(clipboard) => Page::with_clipboard("https://demo.local/", config, Box::new(clipboard)),
        None => Page::new("https://demo.local/", config),
    };
    let top = page.top();
    let textarea = {
        let doc = page.document_mut(top);
        let textarea = doc.create_element("textarea");
        let body = doc.body();
        doc.append_child(body, textarea)
            .context("Failed to build demo page")?;
        textarea
    };
    page.focus(top, textarea);
    page.start_engine(&settings);
    info!(settings = %store.path().display(), "Demo started");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;

        if reloads.try_recv().is_ok() {
            if let Some(settings) = store.load().warn_on_err() {
                page.apply_settings(&settings);
                info!("Reloaded settings");
            }
        }

        page.type_text(top, &line);
        page.type_text(top, "\n");
        let value = page.document(top).value(textarea).unwrap_or_default();
        writeln!(stdout, "{}", value.lines().last().unwrap_or_default())?;
    }
    Ok(())
}
