// Library scanner
// Counting pass with walkdir on the blocking pool, then an ordered tokio::fs walk
// that stats, extracts and hands each file to the catalog one track at a time.

use super::metadata::{AlbumArt, MetadataExtractor};
use super::track::Track;
use crate::config::{Config, DEFAULT_EXTENSIONS};
use crate::error::{LibraryError, Result};
use crate::library::TrackId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Re-read every file even when the catalog already has it unchanged.
    pub force_update: bool,
    /// Checked between files; a cancelled scan keeps what it already committed.
    pub cancel: Option<CancellationToken>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    pub total_files: usize,
    pub processed_files: usize,
    pub added_tracks: usize,
    pub updated_tracks: usize,
    pub skipped_files: usize,
    pub errors: usize,
    pub metadata_fallbacks: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone)]
pub enum ScanProgress {
    Started { roots: Vec<PathBuf> },
    Counted { total_files: usize },
    Scanning { directory: PathBuf },
    Processing { path: PathBuf, current: usize, total: usize },
    Skipped { path: PathBuf },
    TrackAdded { id: TrackId, title: String, updated: bool },
    Error { path: PathBuf, error: String },
    Completed { stats: ScanStats },
    Cancelled { stats: ScanStats },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Added,
    Updated,
}

/// Where scanned tracks land. The library implements this over its locked
/// state so each commit is one catalog + index + history unit.
pub trait ScanTarget: Send + Sync {
    /// True when `id` is catalogued and its stored size / mtime still match.
    fn is_current(
        &self,
        id: &TrackId,
        file_size: u64,
        modified: Option<DateTime<Utc>>,
    ) -> impl Future<Output = bool> + Send;

    fn commit(&self, track: Track) -> impl Future<Output = CommitOutcome> + Send;

    /// Runs once after the walk, before the final progress event.
    fn finish(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Which directory entries a scan looks at.
#[derive(Debug, Clone)]
struct FileFilter {
    extensions: Vec<String>,
    skip_hidden: bool,
}

impl FileFilter {
    fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let normalized = ext.to_ascii_lowercase();
                self.extensions.contains(&normalized)
            })
            .unwrap_or(false)
    }

    fn is_hidden(&self, path: &Path) -> bool {
        self.skip_hidden
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with('.'))
    }
}

pub struct MusicScanner {
    extractor: Arc<dyn MetadataExtractor>,
    filter: FileFilter,
    follow_links: bool,
    album_art_dir: Option<PathBuf>,
}

enum WalkItem {
    Directory(PathBuf),
    File(PathBuf),
}

impl MusicScanner {
    pub fn new(extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self {
            extractor,
            filter: FileFilter {
                extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
                skip_hidden: true,
            },
            follow_links: false,
            album_art_dir: None,
        }
    }

    pub fn from_config(config: &Config, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self::new(extractor)
            .with_extensions(&config.library.supported_extensions)
            .skip_hidden(config.library.skip_hidden)
            .follow_links(config.library.follow_links)
            .album_art_dir(config.album_art_dir())
    }

    pub fn with_extensions<S: AsRef<str>>(mut self, extensions: impl IntoIterator<Item = S>) -> Self {
        self.filter.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        self
    }

    pub fn skip_hidden(mut self, skip: bool) -> Self {
        self.filter.skip_hidden = skip;
        self
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn album_art_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.album_art_dir = dir;
        self
    }

    pub fn is_supported_file(&self, path: &Path) -> bool {
        self.filter.is_supported(path)
    }

    /// Eligible files under `roots`, counted on the blocking pool.
    pub async fn count_files(&self, roots: &[PathBuf]) -> Result<usize> {
        let roots = roots.to_vec();
        let filter = self.filter.clone();
        let follow_links = self.follow_links;

        let count = tokio::task::spawn_blocking(move || {
            roots
                .iter()
                .map(|root| {
                    WalkDir::new(root)
                        .follow_links(follow_links)
                        .into_iter()
                        .filter_entry(|e| e.depth() == 0 || !filter.is_hidden(e.path()))
                        .filter_map(|e| e.ok())
                        .filter(|e| e.file_type().is_file() && filter.is_supported(e.path()))
                        .count()
                })
                .sum::<usize>()
        })
        .await?;

        Ok(count)
    }

    /// Walk `roots` and commit every eligible file into `target`.
    ///
    /// Per-root, per-directory and per-file failures are reported and counted;
    /// the only hard failures are an empty root list and `finish` failing.
    pub async fn scan<T: ScanTarget>(
        &self,
        roots: &[PathBuf],
        target: &T,
        options: &ScanOptions,
        progress: Option<&mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanStats> {
        if roots.is_empty() {
            return Err(LibraryError::NoRootPaths);
        }

        let report = Reporter(progress);
        let mut stats = ScanStats::default();
        info!("Scanning {} library root(s)", roots.len());
        report.send(ScanProgress::Started { roots: roots.to_vec() }).await;

        stats.total_files = self.count_files(roots).await?;
        report
            .send(ScanProgress::Counted {
                total_files: stats.total_files,
            })
            .await;

        let mut pending: Vec<WalkItem> = Vec::new();
        let mut visited: HashSet<PathBuf> = HashSet::new();

        'roots: for root in roots {
            match tokio::fs::metadata(root).await {
                Ok(meta) if meta.is_dir() => pending.push(WalkItem::Directory(root.clone())),
                Ok(_) if self.is_supported_file(root) => pending.push(WalkItem::File(root.clone())),
                Ok(_) => continue,
                Err(source) => {
                    let error = LibraryError::PathUnreadable {
                        path: root.clone(),
                        source,
                    };
                    warn!("Skipping library root: {}", error);
                    stats.errors += 1;
                    report.error(root, &error).await;
                    continue;
                }
            }

            while let Some(item) = pending.pop() {
                match item {
                    WalkItem::Directory(dir) => {
                        if self.follow_links {
                            // Symlinked directories can loop back on themselves
                            let canonical = tokio::fs::canonicalize(&dir).await.unwrap_or_else(|_| dir.clone());
                            if !visited.insert(canonical) {
                                continue;
                            }
                        }
                        report.send(ScanProgress::Scanning { directory: dir.clone() }).await;
                        match self.read_directory(&dir).await {
                            Ok(children) => pending.extend(children),
                            Err(source) => {
                                let error = LibraryError::PathUnreadable { path: dir.clone(), source };
                                warn!("{}", error);
                                stats.errors += 1;
                                report.error(&dir, &error).await;
                            }
                        }
                    }
                    WalkItem::File(path) => {
                        if options.cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
                            info!("Scan cancelled after {} files", stats.processed_files);
                            stats.cancelled = true;
                            pending.clear();
                            break 'roots;
                        }
                        self.process_file(path, target, options, &report, &mut stats).await;

                        if stats.processed_files % 10 == 0 {
                            tokio::task::yield_now().await;
                        }
                    }
                }
            }
        }

        if let Err(e) = target.finish().await {
            warn!("Failed to persist scan results: {}", e);
            stats.errors += 1;
            report
                .send(ScanProgress::Error {
                    path: PathBuf::new(),
                    error: e.to_string(),
                })
                .await;
            return Err(e);
        }

        info!(
            "Scan finished: {} added, {} updated, {} skipped, {} errors",
            stats.added_tracks, stats.updated_tracks, stats.skipped_files, stats.errors
        );
        if stats.cancelled {
            report.send(ScanProgress::Cancelled { stats: stats.clone() }).await;
        } else {
            report.send(ScanProgress::Completed { stats: stats.clone() }).await;
        }
        Ok(stats)
    }

    /// Children of `dir` in stack order: popping yields subdirectories first,
    /// then files, each group by name.
    async fn read_directory(&self, dir: &Path) -> std::io::Result<Vec<WalkItem>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut subdirs = Vec::new();
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.filter.is_hidden(&path) {
                continue;
            }

            let mut file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    debug!("Cannot stat {}: {}", path.display(), e);
                    continue;
                }
            };
            if file_type.is_symlink() {
                if !self.follow_links {
                    continue;
                }
                match tokio::fs::metadata(&path).await {
                    Ok(target) => file_type = target.file_type(),
                    Err(e) => {
                        debug!("Dangling symlink {}: {}", path.display(), e);
                        continue;
                    }
                }
            }

            if file_type.is_dir() {
                subdirs.push(path);
            } else if file_type.is_file() && self.is_supported_file(&path) {
                files.push(path);
            }
        }

        subdirs.sort();
        files.sort();

        let mut items: Vec<WalkItem> = Vec::with_capacity(subdirs.len() + files.len());
        items.extend(files.into_iter().rev().map(WalkItem::File));
        items.extend(subdirs.into_iter().rev().map(WalkItem::Directory));
        Ok(items)
    }

    async fn process_file<T: ScanTarget>(
        &self,
        path: PathBuf,
        target: &T,
        options: &ScanOptions,
        report: &Reporter<'_>,
        stats: &mut ScanStats,
    ) {
        stats.processed_files += 1;
        let id = TrackId::from_path(&path);

        let file_meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(source) => {
                let error = LibraryError::PathUnreadable { path: path.clone(), source };
                warn!("{}", error);
                stats.errors += 1;
                report.error(&path, &error).await;
                return;
            }
        };
        let file_size = file_meta.len();
        let modified = file_meta.modified().ok().map(DateTime::<Utc>::from);

        if !options.force_update && target.is_current(&id, file_size, modified).await {
            debug!("Already catalogued: {}", path.display());
            stats.skipped_files += 1;
            report.send(ScanProgress::Skipped { path }).await;
            return;
        }

        report
            .send(ScanProgress::Processing {
                path: path.clone(),
                current: stats.processed_files,
                total: stats.total_files,
            })
            .await;

        let extractor = Arc::clone(&self.extractor);
        let extract_path = path.clone();
        let mut metadata = match tokio::task::spawn_blocking(move || extractor.extract(&extract_path)).await {
            Ok(Ok(metadata)) => Some(metadata),
            Ok(Err(e)) => {
                let error = LibraryError::MetadataUnparseable {
                    path: path.clone(),
                    reason: e.to_string(),
                };
                warn!("{}, falling back to defaults", error);
                stats.errors += 1;
                stats.metadata_fallbacks += 1;
                report.error(&path, &error).await;
                None
            }
            Err(e) => {
                let error = LibraryError::MetadataUnparseable {
                    path: path.clone(),
                    reason: format!("tag reader crashed: {}", e),
                };
                warn!("{}, falling back to defaults", error);
                stats.errors += 1;
                stats.metadata_fallbacks += 1;
                report.error(&path, &error).await;
                None
            }
        };

        let picture = metadata.as_mut().and_then(|m| m.picture.take());
        let mut track = Track::from_file(path, file_size, modified, metadata, Utc::now());
        if let (Some(dir), Some(art)) = (&self.album_art_dir, picture) {
            track.album_art = store_album_art(dir, &track.id, &art).await;
        }

        let title = track.title.clone();
        let outcome = target.commit(track).await;
        match outcome {
            CommitOutcome::Added => stats.added_tracks += 1,
            CommitOutcome::Updated => stats.updated_tracks += 1,
        }
        report
            .send(ScanProgress::TrackAdded {
                id,
                title,
                updated: outcome == CommitOutcome::Updated,
            })
            .await;
    }
}

/// Write embedded art to `<dir>/<track id>.<ext>`. Failures only cost the art.
async fn store_album_art(dir: &Path, id: &TrackId, art: &AlbumArt) -> Option<PathBuf> {
    let path = dir.join(format!("{}.{}", id, art.extension()));
    if let Err(e) = tokio::fs::create_dir_all(dir).await {
        warn!("Cannot create album art cache {}: {}", dir.display(), e);
        return None;
    }
    match tokio::fs::write(&path, &art.data).await {
        Ok(()) => Some(path),
        Err(e) => {
            warn!("Cannot write album art {}: {}", path.display(), e);
            None
        }
    }
}

/// Progress sender that tolerates a missing or dropped receiver.
struct Reporter<'a>(Option<&'a mpsc::Sender<ScanProgress>>);

impl Reporter<'_> {
    async fn send(&self, event: ScanProgress) {
        if let Some(tx) = self.0 {
            let _ = tx.send(event).await;
        }
    }

    async fn error(&self, path: &Path, error: &LibraryError) {
        self.send(ScanProgress::Error {
            path: path.to_path_buf(),
            error: error.to_string(),
        })
        .await;
    }
}
