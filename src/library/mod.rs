//! The library: catalog, indices, playlists and history behind one lock,
//! plus the async request/response operations a front end calls.

pub mod catalog;
pub mod history;
pub mod index;
pub mod query;
mod track_id;

pub use catalog::Catalog;
pub use history::{Favorites, RecentList};
pub use index::{Album, AlbumKey, Artist, Genre, LibraryIndex, PruneReport};
pub use query::{AlbumSummary, ArtistSummary, GenreSummary, SearchResults, SortField, SortOrder};
pub use track_id::{normalize_path, TrackId};

use crate::audio::{
    CommitOutcome, MetadataExtractor, MusicScanner, ScanOptions, ScanProgress, ScanStats, ScanTarget, TagExtractor,
    Track,
};
use crate::config::{Config, StorageBackend};
use crate::error::{LibraryError, Result};
use crate::persistence::{Collection, JsonFileStore, PersistenceError, PersistenceGateway};
use crate::playlist::{
    evaluate, ExportFormat, MatchType, Playlist, PlaylistExporter, PlaylistPatch, PlaylistStore, Rule, SmartPlaylist,
    SmartPlaylistPatch, SmartPlaylistStore,
};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Everything that changes together. Readers and writers go through the
/// library's `RwLock`, so a reader never sees a track without its index
/// entries or a deleted track still referenced from a playlist.
#[derive(Debug)]
pub struct LibraryState {
    pub catalog: Catalog,
    pub playlists: PlaylistStore,
    pub smart_playlists: SmartPlaylistStore,
    pub favorites: Favorites,
    pub recently_played: RecentList,
    pub recently_added: RecentList,
}

impl LibraryState {
    pub fn new(recently_played_limit: usize, recently_added_limit: usize) -> Self {
        Self {
            catalog: Catalog::new(),
            playlists: PlaylistStore::new(),
            smart_playlists: SmartPlaylistStore::new(),
            favorites: Favorites::new(),
            recently_played: RecentList::new(recently_played_limit),
            recently_added: RecentList::new(recently_added_limit),
        }
    }

    /// Remove a track and every reference to it.
    pub fn remove_track(&mut self, id: &TrackId) -> Option<Track> {
        let track = self.catalog.remove(id)?;
        let playlist_refs = self.playlists.purge_track(id);
        self.favorites.remove(id);
        self.recently_played.remove(id);
        self.recently_added.remove(id);
        debug!("Cascaded removal of {} ({} playlist entries)", id, playlist_refs);
        Some(track)
    }

    fn snapshot(&self, collections: &[Collection]) -> Result<Vec<(Collection, Value)>> {
        collections
            .iter()
            .map(|collection| -> Result<(Collection, Value)> {
                let data = match collection {
                    Collection::Tracks => to_json(&self.catalog.sorted())?,
                    Collection::Playlists => to_json(self.playlists.all())?,
                    Collection::SmartPlaylists => to_json(self.smart_playlists.all())?,
                    Collection::Favorites => to_json(&self.favorites)?,
                    Collection::RecentlyPlayed => to_json(self.recently_played.ids())?,
                    Collection::RecentlyAdded => to_json(self.recently_added.ids())?,
                };
                Ok((*collection, data))
            })
            .collect()
    }

    fn restore(mut stored: HashMap<Collection, Value>, recently_played_limit: usize, recently_added_limit: usize) -> Self {
        let mut take = |collection: Collection| stored.remove(&collection);

        let tracks: Vec<Track> = decode_records(Collection::Tracks, take(Collection::Tracks));
        let playlists = decode_records(Collection::Playlists, take(Collection::Playlists));
        let smart_playlists = decode_records(Collection::SmartPlaylists, take(Collection::SmartPlaylists));
        let favorites: Vec<TrackId> = decode_records(Collection::Favorites, take(Collection::Favorites));
        let played: Vec<TrackId> = decode_records(Collection::RecentlyPlayed, take(Collection::RecentlyPlayed));
        let added: Vec<TrackId> = decode_records(Collection::RecentlyAdded, take(Collection::RecentlyAdded));

        Self {
            catalog: Catalog::from_tracks(tracks),
            playlists: PlaylistStore::from_playlists(playlists),
            smart_playlists: SmartPlaylistStore::from_playlists(smart_playlists),
            favorites: favorites.into_iter().collect(),
            recently_played: RecentList::from_ids(played, recently_played_limit),
            recently_added: RecentList::from_ids(added, recently_added_limit),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| PersistenceError::from(e).into())
}

/// Decode a stored array record by record; bad records are logged and dropped.
fn decode_records<T: DeserializeOwned>(collection: Collection, stored: Option<Value>) -> Vec<T> {
    let records = match stored {
        None => return Vec::new(),
        Some(Value::Array(records)) => records,
        Some(other) => {
            warn!("Ignoring {} snapshot: expected an array, found {}", collection, kind_of(&other));
            return Vec::new();
        }
    };

    let total = records.len();
    let decoded: Vec<T> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value(record) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Skipping malformed {} record #{}: {}", collection, i, e);
                None
            }
        })
        .collect();
    debug!("Loaded {}/{} {} records", decoded.len(), total, collection);
    decoded
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LibraryStats {
    pub track_count: usize,
    pub artist_count: usize,
    pub album_count: usize,
    pub genre_count: usize,
    pub playlist_count: usize,
    pub smart_playlist_count: usize,
    pub favorite_count: usize,
    pub total_duration: f64,
    pub total_size: u64,
    pub average_bitrate: Option<u32>,
}

/// Knobs the library reads from [`Config`].
#[derive(Debug, Clone)]
pub struct LibrarySettings {
    pub roots: Vec<PathBuf>,
    pub max_results_per_category: usize,
    pub recently_played_limit: usize,
    pub recently_added_limit: usize,
    pub export_dir: PathBuf,
}

impl From<&Config> for LibrarySettings {
    fn from(config: &Config) -> Self {
        Self {
            roots: config.library.paths.clone(),
            max_results_per_category: config.search.max_results_per_category,
            recently_played_limit: config.history.recently_played_limit,
            recently_added_limit: config.history.recently_added_limit,
            export_dir: config.export_dir(),
        }
    }
}

/// Cleared on drop, so a failed or panicking scan never wedges the library.
struct ScanGuard<'a>(&'a AtomicBool);

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| LibraryError::ScanInProgress)?;
        Ok(ScanGuard(flag))
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Library {
    state: RwLock<LibraryState>,
    gateway: Arc<dyn PersistenceGateway>,
    // one in-flight snapshot write at a time
    write_lock: Mutex<()>,
    scanner: MusicScanner,
    scanning: AtomicBool,
    settings: LibrarySettings,
    exporter: PlaylistExporter,
}

/// Persistence backend selected by `config.storage.backend`.
pub fn open_gateway(config: &Config) -> Result<Arc<dyn PersistenceGateway>> {
    let data_dir = &config.storage.data_dir;
    match config.storage.backend {
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(data_dir)?;
            let store = crate::persistence::SqliteStore::open(data_dir.join("library.db"))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => {
            warn!("Built without sqlite support, falling back to JSON storage");
            Ok(Arc::new(JsonFileStore::new(data_dir)?))
        }
        StorageBackend::Json => Ok(Arc::new(JsonFileStore::new(data_dir)?)),
    }
}

impl Library {
    /// Configured backend and the default tag reader.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let gateway = open_gateway(config)?;
        Self::open(config, gateway, Arc::new(TagExtractor::new())).await
    }

    /// Load every collection from `gateway` and build the in-memory state.
    pub async fn open(
        config: &Config,
        gateway: Arc<dyn PersistenceGateway>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self> {
        let settings = LibrarySettings::from(config);

        let loader = Arc::clone(&gateway);
        let stored = tokio::task::spawn_blocking(move || {
            let mut stored = HashMap::new();
            for collection in Collection::ALL {
                match loader.load(collection) {
                    Ok(Some(value)) => {
                        stored.insert(collection, value);
                    }
                    Ok(None) => {}
                    Err(e) => warn!("Could not load {}, starting it empty: {}", collection, e),
                }
            }
            stored
        })
        .await?;

        let state = LibraryState::restore(stored, settings.recently_played_limit, settings.recently_added_limit);
        info!(
            "Library loaded: {} tracks, {} playlists, {} smart playlists",
            state.catalog.len(),
            state.playlists.len(),
            state.smart_playlists.len()
        );

        Ok(Self {
            state: RwLock::new(state),
            gateway,
            write_lock: Mutex::new(()),
            scanner: MusicScanner::from_config(config, extractor),
            scanning: AtomicBool::new(false),
            exporter: PlaylistExporter::new(settings.export_dir.clone()),
            settings,
        })
    }

    pub fn settings(&self) -> &LibrarySettings {
        &self.settings
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Acquire)
    }

    /// Write `collections` as one batch. Snapshots are taken after the write
    /// lock is held, so batches land in the order their state was produced.
    async fn persist(&self, collections: &[Collection]) -> Result<()> {
        let _writing = self.write_lock.lock().await;
        let entries = self.state.read().await.snapshot(collections)?;

        let gateway = Arc::clone(&self.gateway);
        tokio::task::spawn_blocking(move || gateway.save_all(&entries)).await??;
        debug!("Persisted {} collection(s)", collections.len());
        Ok(())
    }

    pub async fn save_snapshot(&self) -> Result<()> {
        self.persist(&Collection::ALL).await
    }

    // ---- scanning ----

    /// Scan `roots` into the catalog. Fails immediately with `ScanInProgress`
    /// if another scan is running.
    pub async fn scan(
        &self,
        roots: &[PathBuf],
        options: ScanOptions,
        progress: Option<mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanStats> {
        let _guard = ScanGuard::acquire(&self.scanning)?;
        let sink = CatalogSink { library: self };
        self.scanner.scan(roots, &sink, &options, progress.as_ref()).await
    }

    /// Scan the roots from the config file.
    pub async fn scan_library(
        &self,
        options: ScanOptions,
        progress: Option<mpsc::Sender<ScanProgress>>,
    ) -> Result<ScanStats> {
        let roots = self.settings.roots.clone();
        self.scan(&roots, options, progress).await
    }

    // ---- catalog reads ----

    pub async fn get_all_tracks(&self) -> Vec<Track> {
        self.state.read().await.catalog.sorted().into_iter().cloned().collect()
    }

    pub async fn get_track(&self, id: &TrackId) -> Result<Track> {
        self.state
            .read()
            .await
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::TrackNotFound(id.clone()))
    }

    pub async fn search_library(&self, term: &str) -> SearchResults {
        self.search_library_with(term, self.settings.max_results_per_category).await
    }

    pub async fn search_library_with(&self, term: &str, max_results: usize) -> SearchResults {
        query::search(&self.state.read().await.catalog, term, max_results)
    }

    pub async fn list_tracks(&self, field: SortField, order: SortOrder) -> Vec<Track> {
        query::list_by(&self.state.read().await.catalog, field, order)
    }

    pub async fn tracks_by_artist(&self, name: &str) -> Vec<Track> {
        let state = self.state.read().await;
        state.catalog.tracks_by_artist(name).into_iter().cloned().collect()
    }

    pub async fn tracks_by_album(&self, title: &str, album_artist: &str) -> Vec<Track> {
        let state = self.state.read().await;
        state.catalog.tracks_by_album(title, album_artist).into_iter().cloned().collect()
    }

    pub async fn tracks_by_genre(&self, name: &str) -> Vec<Track> {
        let state = self.state.read().await;
        state.catalog.tracks_by_genre(name).into_iter().cloned().collect()
    }

    pub async fn artists(&self) -> Vec<ArtistSummary> {
        let state = self.state.read().await;
        state.catalog.index().artists().into_iter().map(ArtistSummary::from).collect()
    }

    pub async fn albums(&self) -> Vec<AlbumSummary> {
        let state = self.state.read().await;
        state.catalog.index().albums().into_iter().map(AlbumSummary::from).collect()
    }

    pub async fn genres(&self) -> Vec<GenreSummary> {
        let state = self.state.read().await;
        state.catalog.index().genres().into_iter().map(GenreSummary::from).collect()
    }

    pub async fn library_stats(&self) -> LibraryStats {
        let state = self.state.read().await;
        let catalog = &state.catalog;
        let index = catalog.index();

        let bitrates: Vec<u32> = catalog.all().filter_map(|t| t.bitrate).collect();
        let average_bitrate = if bitrates.is_empty() {
            None
        } else {
            Some((bitrates.iter().map(|&b| u64::from(b)).sum::<u64>() / bitrates.len() as u64) as u32)
        };

        LibraryStats {
            track_count: catalog.len(),
            artist_count: index.artist_count(),
            album_count: index.album_count(),
            genre_count: index.genre_count(),
            playlist_count: state.playlists.len(),
            smart_playlist_count: state.smart_playlists.len(),
            favorite_count: state.favorites.len(),
            total_duration: catalog.all().map(|t| t.duration).sum(),
            total_size: catalog.all().map(|t| t.file_size).sum(),
            average_bitrate,
        }
    }

    // ---- catalog maintenance ----

    /// Delete a track and cascade it out of playlists, favorites and history.
    pub async fn remove_track(&self, id: &TrackId) -> Result<Track> {
        let removed = {
            let mut state = self.state.write().await;
            let removed = state.remove_track(id).ok_or_else(|| LibraryError::TrackNotFound(id.clone()))?;
            state.catalog.prune();
            removed
        };
        info!("Removed track '{}' ({})", removed.title, removed.path.display());
        self.persist(&Collection::ALL).await?;
        Ok(removed)
    }

    /// Remove every catalogued track whose file is gone from disk.
    pub async fn prune_missing_files(&self) -> Result<Vec<TrackId>> {
        let candidates: Vec<(TrackId, PathBuf)> = {
            let state = self.state.read().await;
            state.catalog.sorted().into_iter().map(|t| (t.id.clone(), t.path.clone())).collect()
        };

        let mut missing = Vec::new();
        for (id, path) in candidates {
            if !tokio::fs::try_exists(&path).await.unwrap_or(true) {
                missing.push(id);
            }
        }
        if missing.is_empty() {
            return Ok(missing);
        }

        {
            let mut state = self.state.write().await;
            for id in &missing {
                state.remove_track(id);
            }
            state.catalog.prune();
        }
        info!("Pruned {} missing file(s) from the library", missing.len());
        self.persist(&Collection::ALL).await?;
        Ok(missing)
    }

    // ---- playlists ----

    pub async fn create_playlist(
        &self,
        name: &str,
        description: Option<String>,
        track_ids: Vec<TrackId>,
    ) -> Result<Playlist> {
        let playlist = self
            .state
            .write()
            .await
            .playlists
            .create(name.to_string(), description, track_ids)
            .clone();
        self.persist(&[Collection::Playlists]).await?;
        Ok(playlist)
    }

    pub async fn update_playlist(&self, id: &str, patch: PlaylistPatch) -> Result<Playlist> {
        let playlist = self.state.write().await.playlists.update(id, patch)?.clone();
        self.persist(&[Collection::Playlists]).await?;
        Ok(playlist)
    }

    pub async fn delete_playlist(&self, id: &str) -> Result<Playlist> {
        let playlist = self.state.write().await.playlists.delete(id)?;
        self.persist(&[Collection::Playlists]).await?;
        Ok(playlist)
    }

    pub async fn get_playlist(&self, id: &str) -> Result<Playlist> {
        self.state
            .read()
            .await
            .playlists
            .get(id)
            .cloned()
            .ok_or_else(|| LibraryError::PlaylistNotFound(id.to_string()))
    }

    pub async fn list_playlists(&self) -> Vec<Playlist> {
        self.state.read().await.playlists.all().to_vec()
    }

    /// Returns false (and writes nothing) when the track was already there.
    pub async fn add_track_to_playlist(&self, playlist_id: &str, track_id: &TrackId) -> Result<bool> {
        let added = self
            .state
            .write()
            .await
            .playlists
            .add_track(playlist_id, track_id.clone())?;
        if added {
            self.persist(&[Collection::Playlists]).await?;
        }
        Ok(added)
    }

    pub async fn remove_track_from_playlist(&self, playlist_id: &str, track_id: &TrackId) -> Result<usize> {
        let removed = self.state.write().await.playlists.remove_track(playlist_id, track_id)?;
        self.persist(&[Collection::Playlists]).await?;
        Ok(removed)
    }

    /// The playlist's tracks in order, skipping ids that no longer resolve.
    pub async fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<Track>> {
        let state = self.state.read().await;
        let playlist = state
            .playlists
            .get(playlist_id)
            .ok_or_else(|| LibraryError::PlaylistNotFound(playlist_id.to_string()))?;
        Ok(state.catalog.resolve(&playlist.track_ids).into_iter().cloned().collect())
    }

    pub async fn export_playlist(&self, playlist_id: &str, format: ExportFormat) -> Result<PathBuf> {
        let playlist = self.get_playlist(playlist_id).await?;
        let tracks = self.playlist_tracks(playlist_id).await?;
        self.exporter.export(&playlist, &tracks, format).await
    }

    // ---- smart playlists ----

    pub async fn create_smart_playlist(
        &self,
        name: &str,
        description: Option<String>,
        rules: Vec<Rule>,
        match_type: MatchType,
    ) -> Result<SmartPlaylist> {
        let playlist = self
            .state
            .write()
            .await
            .smart_playlists
            .create(name.to_string(), description, rules, match_type)
            .clone();
        self.persist(&[Collection::SmartPlaylists]).await?;
        Ok(playlist)
    }

    pub async fn update_smart_playlist(&self, id: &str, patch: SmartPlaylistPatch) -> Result<SmartPlaylist> {
        let playlist = self.state.write().await.smart_playlists.update(id, patch)?.clone();
        self.persist(&[Collection::SmartPlaylists]).await?;
        Ok(playlist)
    }

    pub async fn delete_smart_playlist(&self, id: &str) -> Result<SmartPlaylist> {
        let playlist = self.state.write().await.smart_playlists.delete(id)?;
        self.persist(&[Collection::SmartPlaylists]).await?;
        Ok(playlist)
    }

    pub async fn get_smart_playlist(&self, id: &str) -> Result<SmartPlaylist> {
        self.state.read().await.smart_playlists.get(id).cloned()
    }

    pub async fn list_smart_playlists(&self) -> Vec<SmartPlaylist> {
        self.state.read().await.smart_playlists.all().to_vec()
    }

    /// Evaluated against the catalog as it is now; nothing is cached.
    pub async fn smart_playlist_tracks(&self, id: &str) -> Result<Vec<Track>> {
        let state = self.state.read().await;
        let playlist = state.smart_playlists.get(id)?;
        Ok(state
            .catalog
            .sorted()
            .into_iter()
            .filter(|track| playlist.matches(track))
            .cloned()
            .collect())
    }

    /// Evaluate unsaved rules, for editors that show matches while typing.
    pub async fn preview_rules(&self, rules: &[Rule], match_type: MatchType) -> Vec<Track> {
        let state = self.state.read().await;
        state
            .catalog
            .sorted()
            .into_iter()
            .filter(|track| evaluate(rules, match_type, track))
            .cloned()
            .collect()
    }

    // ---- favorites & history ----

    pub async fn add_to_favorites(&self, id: &TrackId) -> Result<bool> {
        let added = self.state.write().await.favorites.add(id.clone());
        if added {
            self.persist(&[Collection::Favorites]).await?;
        }
        Ok(added)
    }

    pub async fn remove_from_favorites(&self, id: &TrackId) -> Result<bool> {
        let removed = self.state.write().await.favorites.remove(id);
        if removed {
            self.persist(&[Collection::Favorites]).await?;
        }
        Ok(removed)
    }

    pub async fn get_favorites(&self) -> Vec<Track> {
        let state = self.state.read().await;
        state.catalog.resolve(state.favorites.ids()).into_iter().cloned().collect()
    }

    /// Move `id` to the front of the play history. Catalogued tracks also
    /// get their play count bumped; unknown ids are kept as soft references.
    pub async fn add_to_recently_played(&self, id: &TrackId) -> Result<()> {
        self.record_play_at(id, Utc::now()).await
    }

    pub async fn record_play_at(&self, id: &TrackId, at: DateTime<Utc>) -> Result<()> {
        let counted = {
            let mut state = self.state.write().await;
            state.recently_played.push(id.clone());
            state.catalog.record_play(id, at)
        };
        if counted {
            self.persist(&[Collection::Tracks, Collection::RecentlyPlayed]).await
        } else {
            debug!("Play of uncatalogued track {} kept in history only", id);
            self.persist(&[Collection::RecentlyPlayed]).await
        }
    }

    pub async fn get_recently_played(&self) -> Vec<Track> {
        let state = self.state.read().await;
        state.catalog.resolve(state.recently_played.ids()).into_iter().cloned().collect()
    }

    pub async fn get_recently_added(&self) -> Vec<Track> {
        let state = self.state.read().await;
        state.catalog.resolve(state.recently_added.ids()).into_iter().cloned().collect()
    }

    /// Ids in the play history, including ones whose track is gone.
    pub async fn recently_played_ids(&self) -> Vec<TrackId> {
        self.state.read().await.recently_played.ids().to_vec()
    }
}

/// Scan target over the library's locked state.
struct CatalogSink<'a> {
    library: &'a Library,
}

impl ScanTarget for CatalogSink<'_> {
    async fn is_current(&self, id: &TrackId, file_size: u64, modified: Option<DateTime<Utc>>) -> bool {
        let state = self.library.state.read().await;
        state
            .catalog
            .get(id)
            .is_some_and(|track| !track.is_stale(file_size, modified))
    }

    async fn commit(&self, track: Track) -> CommitOutcome {
        let mut state = self.library.state.write().await;
        match state.catalog.get(&track.id) {
            Some(previous) => {
                let track = track.with_user_state_from(previous);
                state.catalog.upsert(track);
                CommitOutcome::Updated
            }
            None => {
                let id = track.id.clone();
                state.catalog.upsert(track);
                state.recently_added.push(id);
                CommitOutcome::Added
            }
        }
    }

    async fn finish(&self) -> Result<()> {
        let report = self.library.state.write().await.catalog.prune();
        if report.total() > 0 {
            debug!("Pruned {} empty index entries", report.total());
        }
        self.library.persist(&Collection::ALL).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::ExtractedMetadata;
    use crate::persistence::MemoryStore;
    use crate::playlist::RuleOperator;
    use std::path::Path;
    use tempfile::tempdir;

    struct StubExtractor;

    impl MetadataExtractor for StubExtractor {
        fn extract(&self, path: &Path) -> anyhow::Result<ExtractedMetadata> {
            let stem = path.file_stem().unwrap().to_string_lossy().to_string();
            Ok(ExtractedMetadata {
                title: Some(stem.clone()),
                artist: Some(if stem.starts_with('a') { "Alpha" } else { "Beta" }.into()),
                album: Some("Demo".into()),
                genre: Some("Ambient".into()),
                year: Some(2001),
                bitrate: Some(320),
                ..Default::default()
            })
        }
    }

    async fn library_with(files: &[&str]) -> (tempfile::TempDir, Arc<MemoryStore>, Library) {
        let dir = tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), b"audio").unwrap();
        }
        let mut config = Config::default();
        config.storage.data_dir = dir.path().join("data");
        config.storage.cache_album_art = false;
        let store = Arc::new(MemoryStore::new());
        let library = Library::open(&config, store.clone(), Arc::new(StubExtractor)).await.unwrap();
        (dir, store, library)
    }

    #[tokio::test]
    async fn test_cascade_removes_every_reference() {
        let (dir, _store, library) = library_with(&["a1.mp3", "b1.mp3"]).await;
        library
            .scan(&[dir.path().to_path_buf()], ScanOptions::default(), None)
            .await
            .unwrap();
        let victim = TrackId::from_path(&dir.path().join("a1.mp3"));

        let playlist = library.create_playlist("Mix", None, vec![victim.clone(), victim.clone()]).await.unwrap();
        library.add_to_favorites(&victim).await.unwrap();
        library.add_to_recently_played(&victim).await.unwrap();

        library.remove_track(&victim).await.unwrap();

        assert!(library.get_playlist(&playlist.id).await.unwrap().track_ids.is_empty());
        assert!(library.get_favorites().await.is_empty());
        assert!(library.recently_played_ids().await.is_empty());
        assert!(library.get_recently_added().await.iter().all(|t| t.id != victim));
        assert!(library.tracks_by_artist("Alpha").await.is_empty());
        assert!(matches!(library.get_track(&victim).await, Err(LibraryError::TrackNotFound(_))));
    }

    #[tokio::test]
    async fn test_recently_played_bumps_play_count() {
        let (dir, _store, library) = library_with(&["a1.mp3"]).await;
        library
            .scan(&[dir.path().to_path_buf()], ScanOptions::default(), None)
            .await
            .unwrap();
        let id = TrackId::from_path(&dir.path().join("a1.mp3"));

        library.add_to_recently_played(&id).await.unwrap();
        library.add_to_recently_played(&id).await.unwrap();

        let track = library.get_track(&id).await.unwrap();
        assert_eq!(track.play_count, 2);
        assert!(track.last_played.is_some());
        assert_eq!(library.recently_played_ids().await, vec![id.clone()]);
    }

    #[tokio::test]
    async fn test_playing_an_unknown_id_only_touches_history() {
        let (dir, store, library) = library_with(&["a1.mp3"]).await;
        library
            .scan(&[dir.path().to_path_buf()], ScanOptions::default(), None)
            .await
            .unwrap();
        let known = TrackId::from_path(&dir.path().join("a1.mp3"));
        let ghost = TrackId::from("not-in-catalog");

        library.add_to_recently_played(&known).await.unwrap();
        library.add_to_recently_played(&ghost).await.unwrap();

        assert_eq!(library.recently_played_ids().await, vec![ghost.clone(), known.clone()]);
        let resolved: Vec<TrackId> = library.get_recently_played().await.into_iter().map(|t| t.id).collect();
        assert_eq!(resolved, vec![known.clone()]);
        assert_eq!(library.get_track(&known).await.unwrap().play_count, 1);

        let saved = store.load(Collection::RecentlyPlayed).unwrap().unwrap();
        assert_eq!(saved, serde_json::json!([ghost.as_str(), known.as_str()]));
    }

    #[tokio::test]
    async fn test_smart_playlist_reflects_live_catalog() {
        let (dir, _store, library) = library_with(&["a1.mp3", "b1.mp3"]).await;
        let rules = vec![Rule::new("artist", RuleOperator::Equals, "Alpha")];
        let smart = library
            .create_smart_playlist("Alpha only", None, rules, MatchType::All)
            .await
            .unwrap();
        assert!(library.smart_playlist_tracks(&smart.id).await.unwrap().is_empty());

        library
            .scan(&[dir.path().to_path_buf()], ScanOptions::default(), None)
            .await
            .unwrap();

        let tracks = library.smart_playlist_tracks(&smart.id).await.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].artist, "Alpha");
        assert!(matches!(
            library.smart_playlist_tracks("nope").await,
            Err(LibraryError::SmartPlaylistNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_stats_and_browse() {
        let (dir, _store, library) = library_with(&["a1.mp3", "a2.mp3", "b1.mp3"]).await;
        library
            .scan(&[dir.path().to_path_buf()], ScanOptions::default(), None)
            .await
            .unwrap();

        let stats = library.library_stats().await;
        assert_eq!(stats.track_count, 3);
        assert_eq!(stats.artist_count, 2);
        assert_eq!(stats.album_count, 2); // album key includes the album artist
        assert_eq!(stats.genre_count, 1);
        assert_eq!(stats.average_bitrate, Some(320));
        assert_eq!(library.tracks_by_album("Demo", "Alpha").await.len(), 2);
        assert_eq!(library.tracks_by_genre("Ambient").await.len(), 3);
        assert_eq!(library.artists().await[0].name, "Alpha");
    }

    #[tokio::test]
    async fn test_prune_missing_files() {
        let (dir, _store, library) = library_with(&["a1.mp3", "b1.mp3"]).await;
        library
            .scan(&[dir.path().to_path_buf()], ScanOptions::default(), None)
            .await
            .unwrap();
        std::fs::remove_file(dir.path().join("b1.mp3")).unwrap();

        let pruned = library.prune_missing_files().await.unwrap();

        assert_eq!(pruned, vec![TrackId::from_path(&dir.path().join("b1.mp3"))]);
        assert_eq!(library.get_all_tracks().await.len(), 1);
        assert!(library.genres().await.iter().all(|g| g.track_count == 1));
    }

    #[tokio::test]
    async fn test_single_collection_ops_write_once() {
        let (_dir, store, library) = library_with(&[]).await;
        let playlist = library.create_playlist("Empty", None, vec![]).await.unwrap();
        assert_eq!(store.write_count(), 1);

        library.add_track_to_playlist(&playlist.id, &TrackId::from("x")).await.unwrap();
        library.add_track_to_playlist(&playlist.id, &TrackId::from("x")).await.unwrap();
        assert_eq!(store.write_count(), 2);
        assert!(store.load(Collection::Tracks).unwrap().is_none());
    }

    #[test]
    fn test_decode_skips_malformed_records() {
        let stored = serde_json::json!(["aa", 7, "bb"]);
        let ids: Vec<TrackId> = decode_records(Collection::Favorites, Some(stored));
        assert_eq!(ids, vec![TrackId::from("aa"), TrackId::from("bb")]);

        let not_array: Vec<TrackId> = decode_records(Collection::Favorites, Some(serde_json::json!({})));
        assert!(not_array.is_empty());
    }

    #[tokio::test]
    async fn test_second_scan_is_rejected_while_guard_held() {
        let (dir, _store, library) = library_with(&["a1.mp3"]).await;
        let _held = ScanGuard::acquire(&library.scanning).unwrap();

        let result = library.scan(&[dir.path().to_path_buf()], ScanOptions::default(), None).await;
        assert!(matches!(result, Err(LibraryError::ScanInProgress)));
        drop(_held);
        assert!(!library.is_scanning());
    }
}
