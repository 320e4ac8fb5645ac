//! Continuous file discovery driven by filesystem events.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tokio::sync::{broadcast, mpsc};

use crate::discovery::file::{load_group, FileOutcome};
use crate::discovery::GroupSender;
use crate::jobcfg::config::PROVIDER_FILE_WATCHER;
use crate::jobcfg::Group;
use crate::observability::metrics;

const DEFAULT_REFRESH: Duration = Duration::from_secs(60);

/// Watches the directories behind a set of glob patterns and re-emits
/// a fresh group for a file's source on every relevant event.
///
/// No debounce: editors that rewrite through backups or renames cause
/// several events in a row, and each successful re-parse is a valid
/// observable group. Consumers must tolerate duplicates.
pub struct Watcher {
    patterns: Vec<String>,
    matchers: Vec<glob::Pattern>,
    refresh_every: Duration,
    out: GroupSender,
}

impl Watcher {
    pub fn new(patterns: &[String], out: GroupSender) -> Self {
        let matchers = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!(pattern = p, error = %e, "bad glob pattern");
                    None
                }
            })
            .collect();

        Self {
            patterns: patterns.to_vec(),
            matchers,
            refresh_every: DEFAULT_REFRESH,
            out,
        }
    }

    pub fn with_refresh(mut self, every: Duration) -> Self {
        self.refresh_every = every;
        self
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let (fs_tx, mut fs_rx) = mpsc::unbounded_channel();

        let mut watcher = match RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = fs_tx.send(res);
            },
            notify::Config::default(),
        ) {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::error!(error = %e, "failed to create filesystem watcher");
                return;
            }
        };

        for dir in watch_dirs(&self.patterns) {
            if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
                tracing::warn!(dir = %dir.display(), error = %e, "watch failed");
            } else {
                tracing::info!(dir = %dir.display(), "watching");
            }
        }

        // Known sources: files we have emitted a non-retracted group for.
        let mut cache: HashSet<PathBuf> = HashSet::new();

        let mut tick = tokio::time::interval(self.refresh_every);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                // first tick fires immediately and doubles as the
                // initial scan; later ticks pick up files in
                // directories that appeared after the watch started
                _ = tick.tick() => self.refresh(&mut cache),
                event = fs_rx.recv() => match event {
                    Some(Ok(event)) => self.handle_event(event, &mut cache),
                    Some(Err(e)) => tracing::warn!(error = %e, "watch error"),
                    None => break,
                },
            }
        }

        // dropping the watcher releases the watch descriptors
        drop(watcher);
        tracing::info!("file watcher stopped");
    }

    fn handle_event(&self, event: Event, cache: &mut HashSet<PathBuf>) {
        let relevant = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        );
        if !relevant {
            return;
        }

        for path in &event.paths {
            if !self.matches(path) {
                continue;
            }
            tracing::debug!(source = %path.display(), kind = ?event.kind, "filesystem event");
            match event.kind {
                EventKind::Remove(_) => self.retract(path, cache),
                _ => self.process(path, cache),
            }
        }
    }

    fn refresh(&self, cache: &mut HashSet<PathBuf>) {
        let mut existing: HashSet<PathBuf> = HashSet::new();
        for pattern in &self.patterns {
            let Ok(paths) = glob::glob(pattern) else { continue };
            existing.extend(paths.flatten());
        }

        let vanished: Vec<PathBuf> =
            cache.iter().filter(|p| !existing.contains(*p)).cloned().collect();
        for path in vanished {
            self.retract(&path, cache);
        }

        let unseen: Vec<PathBuf> =
            existing.into_iter().filter(|p| !cache.contains(p)).collect();
        for path in unseen {
            self.process(&path, cache);
        }
    }

    /// Re-parse a file and emit its current group. A file that turned
    /// unreadable is retracted; a malformed one is left alone so the
    /// consumer keeps the last good configuration.
    fn process(&self, path: &Path, cache: &mut HashSet<PathBuf>) {
        match load_group(path, PROVIDER_FILE_WATCHER) {
            FileOutcome::Group(group) => {
                cache.insert(path.to_path_buf());
                self.send(group);
            }
            FileOutcome::Unreadable => self.retract(path, cache),
            FileOutcome::Malformed => {}
        }
    }

    /// Emit the "this source now produces nothing" group, once per
    /// disappearance.
    fn retract(&self, path: &Path, cache: &mut HashSet<PathBuf>) {
        if cache.remove(path) {
            self.send(Group::empty(path.display().to_string()));
        }
    }

    fn send(&self, group: Group) {
        metrics::record_discovery(PROVIDER_FILE_WATCHER, 1);
        if self.out.send(vec![group]).is_err() {
            tracing::warn!("output channel closed, discarding group");
        }
    }

    fn matches(&self, path: &Path) -> bool {
        self.matchers.iter().any(|m| m.matches_path(path))
    }
}

/// Unique parent directories of the patterns. Watching the parent
/// (not the pattern itself) catches files created after startup.
fn watch_dirs(patterns: &[String]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = Vec::new();
    for pattern in patterns {
        let dir = Path::new(pattern).parent().map(Path::to_path_buf).unwrap_or_default();
        if !dir.as_os_str().is_empty() && !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}
