pub mod settle;

pub use settle::FileSettleTracker;

use crate::config::WatchConfig;
use crate::state::CacheIndex;
use anyhow::{Context, Result};
use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// What a settled path should do to the cache index once it stops changing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileAction {
    Add,
    Update,
}

/// Raw filesystem event, tagged with what it means for the cache index.
enum RawEvent {
    Changed(PathBuf, FileAction),
    Removed(PathBuf),
}

/// Watches configured directories and drives the cache index's `addFile` /
/// `removeFile` / `updateFile` collaborator contract.
pub struct FileWatcher {
    config: WatchConfig,
    cache_index: Arc<CacheIndex>,
    watcher: Option<RecommendedWatcher>,
}

impl FileWatcher {
    pub fn new(config: WatchConfig, cache_index: Arc<CacheIndex>) -> Self {
        Self {
            config,
            cache_index,
            watcher: None,
        }
    }

    fn has_watched_extension(&self, path: &std::path::Path) -> bool {
        is_media_file(path, &self.config.extensions)
    }

    pub async fn start(&mut self) -> Result<()> {
        if !self.config.enabled {
            tracing::info!("file watcher is disabled");
            return Ok(());
        }
        if self.config.paths.is_empty() {
            tracing::warn!("no watch paths configured");
            return Ok(());
        }

        let (event_tx, mut event_rx) = mpsc::channel::<RawEvent>(100);
        let (settled_tx, mut settled_rx) = mpsc::channel::<PathBuf>(100);
        let mut settle_tracker = FileSettleTracker::new(self.config.settle_time_secs, settled_tx);

        let extensions = self.config.extensions.clone();
        let event_tx_clone = event_tx.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                let Ok(event) = res else { return };
                let matching = |path: &PathBuf| is_media_file(path, &extensions);

                match event.kind {
                    EventKind::Create(_) => {
                        for path in event.paths.iter().filter(|p| matching(p)) {
                            let _ = event_tx_clone.blocking_send(RawEvent::Changed(path.clone(), FileAction::Add));
                        }
                    }
                    EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
                        for path in event.paths.iter().filter(|p| matching(p)) {
                            let _ = event_tx_clone.blocking_send(RawEvent::Changed(path.clone(), FileAction::Update));
                        }
                    }
                    EventKind::Remove(_) => {
                        for path in event.paths.iter().filter(|p| matching(p)) {
                            let _ = event_tx_clone.blocking_send(RawEvent::Removed(path.clone()));
                        }
                    }
                    _ => {}
                }
            },
            Config::default(),
        )
        .context("failed to create file watcher")?;

        for path in &self.config.paths {
            if path.exists() {
                watcher
                    .watch(path, RecursiveMode::Recursive)
                    .with_context(|| format!("failed to watch path: {:?}", path))?;
                tracing::info!(?path, "watching directory");
            } else {
                tracing::warn!(?path, "watch path does not exist");
            }
        }

        self.watcher = Some(watcher);

        let cache_index = self.cache_index.clone();
        tokio::spawn(async move {
            let mut pending_actions: HashMap<PathBuf, FileAction> = HashMap::new();
            let mut check_interval = tokio::time::interval(Duration::from_secs(5));

            loop {
                tokio::select! {
                    Some(event) = event_rx.recv() => {
                        match event {
                            RawEvent::Changed(path, action) => {
                                pending_actions.insert(path.clone(), action);
                                settle_tracker.file_changed(path);
                            }
                            RawEvent::Removed(path) => {
                                pending_actions.remove(&path);
                                settle_tracker.remove(&path);
                                if let Err(e) = cache_index.remove_file(&path) {
                                    tracing::warn!(?path, error = %e, "failed to remove file from cache index");
                                }
                            }
                        }
                    }

                    Some(path) = settled_rx.recv() => {
                        let action = pending_actions.remove(&path).unwrap_or(FileAction::Update);
                        if path.exists() && path.is_file() {
                            match action {
                                FileAction::Add => cache_index.add_file(&path),
                                FileAction::Update => {
                                    if let Err(e) = cache_index.update_file(&path) {
                                        tracing::warn!(?path, error = %e, "failed to invalidate cache for updated file");
                                    }
                                }
                            }
                            tracing::info!(?path, "file settled");
                        }
                    }

                    _ = check_interval.tick() => {
                        settle_tracker.check_settled().await;
                    }
                }
            }
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        self.watcher = None;
        tracing::info!("file watcher stopped");
    }
}

/// Whether a path's extension is one of the watched media extensions.
pub fn is_media_file(path: &std::path::Path, extensions: &[String]) -> bool {
    let Some(ext) = path.extension() else { return false };
    let ext_str = ext.to_string_lossy().to_lowercase();
    if extensions.is_empty() {
        let default_exts = ["mkv", "mp4", "avi", "mov", "wmv", "m4v", "ts", "m2ts"];
        return default_exts.contains(&ext_str.as_str());
    }
    extensions.iter().any(|e| e.to_lowercase() == ext_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_media_file_matches_configured_extensions_case_insensitively() {
        let extensions = vec!["mp4".to_string(), "mkv".to_string()];
        assert!(is_media_file(std::path::Path::new("movie.MP4"), &extensions));
        assert!(!is_media_file(std::path::Path::new("notes.txt"), &extensions));
    }

    #[test]
    fn is_media_file_falls_back_to_defaults_when_unconfigured() {
        assert!(is_media_file(std::path::Path::new("movie.ts"), &[]));
        assert!(!is_media_file(std::path::Path::new("movie.xyz"), &[]));
    }
}
