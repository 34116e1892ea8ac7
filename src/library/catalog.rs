//! The authoritative track map plus its derived indices.
//!
//! Every mutation goes through `&mut Catalog`, which updates the track map and
//! [`LibraryIndex`] together; there is no way to touch one without the other.

use super::index::{AlbumKey, LibraryIndex, PruneReport};
use super::TrackId;
use crate::audio::Track;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tracks: HashMap<TrackId, Track>,
    index: LibraryIndex,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from persisted records, indexing each one.
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> Self {
        let mut catalog = Self::new();
        for track in tracks {
            catalog.upsert(track);
        }
        catalog
    }

    /// Insert or replace a track, keeping the indices in step. Returns the
    /// previous record when the id was already known.
    pub fn upsert(&mut self, track: Track) -> Option<Track> {
        let id = track.id.clone();
        let previous = self.tracks.remove(&id);
        if let Some(old) = &previous {
            self.index.unindex(old, &self.tracks);
        }

        self.index.index(&track);
        self.tracks.insert(id, track);
        previous
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.get(id)
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.tracks.contains_key(id)
    }

    /// Remove a track and its id from every index entry.
    pub fn remove(&mut self, id: &TrackId) -> Option<Track> {
        let track = self.tracks.remove(id)?;
        self.index.unindex(&track, &self.tracks);
        debug!("Removed track {} ({}) from catalog", track.id, track.path.display());
        Some(track)
    }

    /// Listening stats don't feed any index, so they can be bumped in place.
    pub fn record_play(&mut self, id: &TrackId, at: DateTime<Utc>) -> bool {
        match self.tracks.get_mut(id) {
            Some(track) => {
                track.record_play(at);
                true
            }
            None => false,
        }
    }

    pub fn all(&self) -> impl Iterator<Item = &Track> {
        self.tracks.values()
    }

    /// All tracks ordered by id. Used wherever output order has to be reproducible.
    pub fn sorted(&self) -> Vec<&Track> {
        let mut tracks: Vec<_> = self.tracks.values().collect();
        tracks.sort_by(|a, b| a.id.cmp(&b.id));
        tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn index(&self) -> &LibraryIndex {
        &self.index
    }

    pub fn prune(&mut self) -> PruneReport {
        self.index.prune()
    }

    pub fn tracks_by_artist(&self, name: &str) -> Vec<&Track> {
        self.index
            .artist(name)
            .map(|artist| self.resolve_sorted(artist.track_ids.iter()))
            .unwrap_or_default()
    }

    /// Album tracks in disc / track-number order.
    pub fn tracks_by_album(&self, title: &str, album_artist: &str) -> Vec<&Track> {
        let key = AlbumKey::new(album_artist, title);
        let mut tracks = self
            .index
            .album(&key)
            .map(|album| self.resolve_sorted(album.track_ids.iter()))
            .unwrap_or_default();
        tracks.sort_by_key(|t| (t.disc_number.unwrap_or(0), t.track_number.unwrap_or(0)));
        tracks
    }

    pub fn tracks_by_genre(&self, name: &str) -> Vec<&Track> {
        self.index
            .genre(name)
            .map(|genre| self.resolve_sorted(genre.track_ids.iter()))
            .unwrap_or_default()
    }

    /// Look up ids, silently dropping the ones that no longer resolve.
    pub fn resolve<'a>(&self, ids: impl IntoIterator<Item = &'a TrackId>) -> Vec<&Track> {
        ids.into_iter().filter_map(|id| self.tracks.get(id)).collect()
    }

    fn resolve_sorted<'a>(&self, ids: impl Iterator<Item = &'a TrackId>) -> Vec<&Track> {
        let mut tracks = self.resolve(ids);
        tracks.sort_by(|a, b| a.id.cmp(&b.id));
        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn track(path: &str, artist: &str, album: &str) -> Track {
        let mut t = Track::from_file(path.into(), 1, None, None, Utc::now());
        t.artist = artist.to_string();
        t.album_artist = artist.to_string();
        t.album = album.to_string();
        t
    }

    /// Each catalogued id sits in exactly one artist and one album entry, and
    /// every indexed id resolves.
    fn assert_consistent(catalog: &Catalog) {
        let index = catalog.index();
        for track in catalog.all() {
            let artist_hits = index.artists().iter().filter(|a| a.track_ids.contains(&track.id)).count();
            let album_hits = index.albums().iter().filter(|a| a.track_ids.contains(&track.id)).count();
            let genre_hits = index.genres().iter().filter(|g| g.track_ids.contains(&track.id)).count();
            assert_eq!((artist_hits, album_hits, genre_hits), (1, 1, 1), "track {}", track.id);
        }
        let indexed: HashSet<_> = index
            .artists()
            .iter()
            .flat_map(|a| a.track_ids.iter())
            .chain(index.albums().iter().flat_map(|a| a.track_ids.iter()))
            .chain(index.genres().iter().flat_map(|g| g.track_ids.iter()))
            .cloned()
            .collect();
        for id in indexed {
            assert!(catalog.contains(&id), "dangling id {}", id);
        }
    }

    #[test]
    fn test_upsert_moves_track_between_entries() {
        let mut catalog = Catalog::new();
        let original = track("/m/1.mp3", "Nico", "Chelsea Girl");
        catalog.upsert(original.clone());

        let mut retagged = original.clone();
        retagged.artist = "The Velvet Underground".to_string();
        retagged.album_artist = retagged.artist.clone();
        retagged.album = "The Velvet Underground & Nico".to_string();
        let previous = catalog.upsert(retagged);

        assert_eq!(previous, Some(original));
        assert_eq!(catalog.len(), 1);
        assert!(catalog.index().artist("Nico").is_none());
        assert_consistent(&catalog);
    }

    #[test]
    fn test_remove_clears_every_index() {
        let mut catalog = Catalog::from_tracks(vec![
            track("/m/1.mp3", "Nico", "Chelsea Girl"),
            track("/m/2.mp3", "Nico", "Chelsea Girl"),
            track("/m/3.mp3", "Cale", "Paris 1919"),
        ]);
        let gone = TrackId::from_path("/m/3.mp3".as_ref());

        assert!(catalog.remove(&gone).is_some());
        assert!(catalog.remove(&gone).is_none());
        assert!(catalog.index().artist("Cale").is_none());
        assert_eq!(catalog.index().artist_count(), 1);
        assert_consistent(&catalog);
    }

    #[test]
    fn test_album_listing_follows_track_numbers() {
        let mut a = track("/m/a.mp3", "Nico", "Desertshore");
        a.track_number = Some(2);
        let mut b = track("/m/b.mp3", "Nico", "Desertshore");
        b.track_number = Some(1);
        let catalog = Catalog::from_tracks(vec![a, b]);

        let titles: Vec<_> = catalog
            .tracks_by_album("Desertshore", "Nico")
            .iter()
            .map(|t| t.track_number)
            .collect();
        assert_eq!(titles, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_resolve_filters_missing_ids() {
        let catalog = Catalog::from_tracks(vec![track("/m/1.mp3", "Nico", "x")]);
        let ids = vec![TrackId::from_path("/m/1.mp3".as_ref()), TrackId::from("deadbeef")];
        assert_eq!(catalog.resolve(&ids).len(), 1);
    }

    #[test]
    fn test_record_play_bumps_count() {
        let mut catalog = Catalog::from_tracks(vec![track("/m/1.mp3", "Nico", "x")]);
        let id = TrackId::from_path("/m/1.mp3".as_ref());
        assert!(catalog.record_play(&id, Utc::now()));
        assert!(!catalog.record_play(&TrackId::from("nope"), Utc::now()));
        assert_eq!(catalog.get(&id).unwrap().play_count, 1);
    }
}
