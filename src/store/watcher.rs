use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use notify::{recommended_watcher, RecursiveMode, Result as NotifyResult, Watcher};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Coalesces the burst of events one save produces (temp write + rename)
const RELOAD_DEBOUNCE: Duration = Duration::from_millis(500);

/// How often the watch loop checks whether it should stop
const STOP_POLL: Duration = Duration::from_millis(100);

/// Event emitted when settings need to be reloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsReloadEvent {
    Reload,
}

/// Watches the settings file for external changes and emits reload events
pub struct SettingsWatcher {
    path: PathBuf,
    tx: Option<Sender<SettingsReloadEvent>>,
    stop: Arc<AtomicBool>,
    watcher_thread: Option<thread::JoinHandle<()>>,
}

impl SettingsWatcher {
    /// Returns the watcher and a receiver of reload events for `path`
    pub fn new(path: impl Into<PathBuf>) -> (Self, Receiver<SettingsReloadEvent>) {
        let (tx, rx) = channel();
        let watcher = SettingsWatcher {
            path: path.into(),
            tx: Some(tx),
            stop: Arc::new(AtomicBool::new(false)),
            watcher_thread: None,
        };
        (watcher, rx)
    }

    /// Spawn the background watch thread
    pub fn start(&mut self) -> NotifyResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| std::io::Error::other("watcher already started"))?;
        let path = self.path.clone();
        let stop = self.stop.clone();

        let thread_handle = thread::spawn(move || {
            if let Err(e) = Self::watch_loop(&path, tx, stop) {
                warn!(error = %e, watcher = "settings", "Settings watcher error");
            }
        });

        self.watcher_thread = Some(thread_handle);
        Ok(())
    }

    fn watch_loop(
        settings_path: &Path,
        tx: Sender<SettingsReloadEvent>,
        stop: Arc<AtomicBool>,
    ) -> NotifyResult<()> {
        let watch_path = settings_path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(watch_path)?;
        let file_name = settings_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();

        let debounce_active = Arc::new(Mutex::new(false));
        let (watch_tx, watch_rx) = channel();

        let mut watcher: Box<dyn Watcher> = Box::new(recommended_watcher(
            move |res: notify::Result<notify::Event>| {
                let _ = watch_tx.send(res);
            },
        )?);

        // The directory, not the file: atomic saves replace the file's inode
        watcher.watch(watch_path, RecursiveMode::NonRecursive)?;

        info!(
            path = %watch_path.display(),
            target = %file_name,
            "Settings watcher started"
        );

        while !stop.load(Ordering::Relaxed) {
            match watch_rx.recv_timeout(STOP_POLL) {
                Ok(Ok(event)) => {
                    let is_settings_change = event.paths.iter().any(|path: &PathBuf| {
                        path.file_name().and_then(|name| name.to_str()) == Some(file_name.as_str())
                    });
                    let is_relevant_event = matches!(
                        event.kind,
                        notify::EventKind::Create(_)
                            | notify::EventKind::Modify(_)
                            | notify::EventKind::Remove(_)
                    );

                    if is_settings_change && is_relevant_event {
                        let mut debounce = debounce_active.lock();
                        if !*debounce {
                            *debounce = true;
                            drop(debounce);

                            let tx_clone = tx.clone();
                            let debounce_flag = debounce_active.clone();
                            thread::spawn(move || {
                                thread::sleep(RELOAD_DEBOUNCE);
                                let _ = tx_clone.send(SettingsReloadEvent::Reload);
                                *debounce_flag.lock() = false;
                                info!("Settings file changed, emitting reload event");
                            });
                        }
                    }
                }
                Ok(Err(e)) => {
                    warn!(error = %e, watcher = "settings", "File watcher error");
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        info!(watcher = "settings", "Settings watcher shutting down");
        Ok(())
    }
}

impl Drop for SettingsWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.watcher_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_start_is_rejected() {
        let dir = TempDir::new().unwrap();
        let (mut watcher, _rx) = SettingsWatcher::new(dir.path().join("settings.json"));
        watcher.start().unwrap();
        assert!(watcher.start().is_err());
    }

    #[test]
    fn test_drop_stops_the_thread() {
        let dir = TempDir::new().unwrap();
        let (mut watcher, rx) = SettingsWatcher::new(dir.path().join("settings.json"));
        watcher.start().unwrap();
        drop(watcher);
        // Every sender is gone once the thread has exited
        assert!(matches!(
            rx.recv_timeout(Duration::from_secs(2)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }

    #[test]
    fn test_reload_event_is_comparable() {
        assert_eq!(SettingsReloadEvent::Reload.clone(), SettingsReloadEvent::Reload);
    }
}
