//! File system watcher driving graph invalidation.
//!
//! Watches the project root recursively, filters out directories that never
//! hold graph modules, and feeds debounced change events into a task that
//! re-reads the affected module and evicts stale compiled output.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::state::DevState;

/// Directories that are never part of the module graph.
const IGNORED_DIRS: &[&str] = &["node_modules", "vendor", "dist", "target"];

const DEBOUNCE_MS: u64 = 50;

/// A debounced change to a file under the project root.
#[derive(Debug, Clone)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Recursive watcher over the project root.
///
/// The watcher must stay alive for events to keep flowing; the server holds
/// it for as long as it runs.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    pub fn new(root: PathBuf) -> Result<(Self, mpsc::Receiver<FileChange>), notify::Error> {
        let (tx, rx) = mpsc::channel(100);

        let debounce = Duration::from_millis(DEBOUNCE_MS);
        let mut last_event: Option<(PathBuf, Instant)> = None;
        let watch_root = root.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else { return };
            for path in &event.paths {
                if Self::should_ignore(path, &watch_root) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };
                let _ = tx.blocking_send(change);
            }
        })?;

        watcher.watch(&root, RecursiveMode::Recursive)?;
        info!(root = %root.display(), "watching for file changes");

        Ok((Self { _watcher: watcher, root }, rx))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn should_ignore(path: &Path, root: &Path) -> bool {
        let Ok(rel) = path.strip_prefix(root) else {
            return true;
        };

        for component in rel.components() {
            let Some(name) = component.as_os_str().to_str() else {
                return true;
            };
            if name.starts_with('.') {
                return true;
            }
            if IGNORED_DIRS.contains(&name) {
                return true;
            }
        }

        false
    }
}

/// Drain change events, refresh the graph and evict stale compiled output.
///
/// Only paths that correspond to a module already in the graph trigger
/// work; everything else is a file the graph has never loaded.
pub fn spawn_invalidation_task(
    state: DevState,
    mut rx: mpsc::Receiver<FileChange>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = rx.recv().await {
            let Some(id) = state.builder.module_id_for_path(&state.graph, change.path()) else {
                continue;
            };

            debug!(module = %id, "file change detected");
            match state.builder.invalidate(&state.graph, &id).await {
                Ok(affected) if !affected.is_empty() => {
                    info!(module = %id, affected = affected.len(), "module graph refreshed");
                    state.cache.evict(&affected);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(module = %id, error = %err, "invalidation failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_node_modules_and_hidden_paths() {
        let root = PathBuf::from("/project");

        assert!(FileWatcher::should_ignore(
            Path::new("/project/node_modules/react/index.js"),
            &root,
        ));
        assert!(FileWatcher::should_ignore(
            Path::new("/project/.git/HEAD"),
            &root,
        ));
        assert!(FileWatcher::should_ignore(
            Path::new("/project/src/.cache/mod.js"),
            &root,
        ));
        assert!(!FileWatcher::should_ignore(
            Path::new("/project/src/app.tsx"),
            &root,
        ));
    }

    #[test]
    fn ignores_paths_outside_root() {
        let root = PathBuf::from("/project");
        assert!(FileWatcher::should_ignore(
            Path::new("/elsewhere/app.tsx"),
            &root,
        ));
    }

    #[test]
    fn file_change_exposes_its_path() {
        let path = PathBuf::from("/project/src/app.tsx");
        assert_eq!(FileChange::Removed(path.clone()).path(), path.as_path());
    }
}
