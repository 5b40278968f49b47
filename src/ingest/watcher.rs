//! Recursive watch built from one non-recursive registration per directory,
//! so newly created subtrees are picked up explicitly and counted.

use super::readiness::poll_until_readable;
use crate::error::PipelineError;
use ignore::WalkBuilder;
use notify::event::{CreateKind, ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug)]
pub enum WatchEvent {
    /// A matching file finished writing; canonical absolute path.
    Ready(PathBuf),
    Error(PipelineError),
}

/// Case-insensitive extension check; `extension` may carry a leading dot.
pub fn matches_extension(path: &Path, extension: &str) -> bool {
    let wanted = extension.trim_start_matches('.');
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(wanted))
        .unwrap_or(false)
}

pub struct SubtreeWatcher {
    root: PathBuf,
    extension: String,
    poll_interval: Duration,
    watcher: RecommendedWatcher,
    registered: HashSet<PathBuf>,
    raw_rx: UnboundedReceiver<notify::Result<Event>>,
}

impl SubtreeWatcher {
    /// Enumerate `root` and register every directory below it.
    ///
    /// Any failure here is `StartupFatal`; the caller reports it once.
    pub fn start(
        root: &Path,
        extension: impl Into<String>,
        poll_interval: Duration,
    ) -> Result<Self, PipelineError> {
        let fatal = |source: io::Error| PipelineError::StartupFatal {
            path: root.to_path_buf(),
            source,
        };

        let root = std::fs::canonicalize(root).map_err(fatal)?;
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = raw_tx.send(res);
        })
        .map_err(|e| fatal(io::Error::other(e.to_string())))?;

        let mut this = Self {
            root: root.clone(),
            extension: extension.into(),
            poll_interval,
            watcher,
            registered: HashSet::new(),
            raw_rx,
        };

        for dir in walk_dirs(&root).map_err(fatal)? {
            this.register(&dir)
                .map_err(|e| fatal(io::Error::other(e.to_string())))?;
        }
        tracing::info!(
            root = %this.root.display(),
            directories = this.registered.len(),
            "watching for combat logs"
        );
        Ok(this)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    #[cfg(test)]
    fn is_registered(&self, dir: &Path) -> bool {
        self.registered.contains(dir)
    }

    #[cfg(test)]
    fn registered_count(&self) -> usize {
        self.registered.len()
    }

    fn register(&mut self, dir: &Path) -> Result<bool, PipelineError> {
        if self.registered.contains(dir) {
            return Ok(false);
        }
        self.watcher.watch(dir, RecursiveMode::NonRecursive)?;
        self.registered.insert(dir.to_path_buf());
        tracing::debug!(dir = %dir.display(), "registered directory");
        Ok(true)
    }

    /// Register `dir` and any subdirectories already inside it.
    fn register_tree(&mut self, dir: &Path) -> Result<usize, PipelineError> {
        let dirs = walk_dirs(dir)
            .map_err(|e| PipelineError::SoftWatch(format!("{}: {e}", dir.display())))?;
        let mut added = 0;
        for d in dirs {
            if self.register(&d)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Process notifications until `out` is dropped.
    pub async fn run(mut self, out: UnboundedSender<WatchEvent>) {
        while let Some(res) = self.raw_rx.recv().await {
            match res {
                Ok(event) => self.on_event(event, &out),
                Err(e) => {
                    let _ = out.send(WatchEvent::Error(e.into()));
                }
            }
            if out.is_closed() {
                break;
            }
        }
        tracing::debug!("watcher loop finished");
    }

    fn on_event(&mut self, event: Event, out: &UnboundedSender<WatchEvent>) {
        // Renames report the new name as `To` (inotify, Windows) or `Any`
        // (FSEvents, kqueue). inotify also sends `Both`, always after a `To`.
        let created_folder = match event.kind {
            EventKind::Create(kind) => kind == CreateKind::Folder,
            EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Any)) => false,
            _ => return,
        };

        for path in event.paths {
            let is_dir = if created_folder {
                true
            } else {
                match std::fs::metadata(&path) {
                    Ok(meta) => meta.is_dir(),
                    Err(e) => {
                        tracing::trace!(path = %path.display(), error = %e, "created entry vanished");
                        continue;
                    }
                }
            };

            if is_dir {
                if let Err(e) = self.register_tree(&path) {
                    tracing::warn!(dir = %path.display(), error = %e, "could not watch new directory");
                    let _ = out.send(WatchEvent::Error(e));
                }
                continue;
            }

            if !matches_extension(&path, &self.extension) {
                continue;
            }

            tracing::info!(path = %path.display(), "new combat log detected");
            let tx = out.clone();
            let every = self.poll_interval;
            tokio::spawn(async move {
                let ready = poll_until_readable(&path, every).await;
                let canonical = tokio::fs::canonicalize(&ready).await.unwrap_or(ready);
                let _ = tx.send(WatchEvent::Ready(canonical));
            });
        }
    }
}

fn walk_dirs(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkBuilder::new(root).standard_filters(false).build() {
        let entry = entry.map_err(|e| {
            let msg = e.to_string();
            e.into_io_error().unwrap_or_else(|| io::Error::other(msg))
        })?;
        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}
