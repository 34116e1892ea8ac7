//! Derived artist / album / genre indices.
//!
//! Nothing in here is ever created directly: entries appear when the first
//! track referencing them is indexed and go away on [`LibraryIndex::prune`]
//! (or immediately on removal) once their track set is empty.

use super::TrackId;
use crate::audio::Track;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

/// `albumArtist::title`, the identity of an album.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlbumKey(String);

impl AlbumKey {
    pub fn new(album_artist: &str, title: &str) -> Self {
        AlbumKey(format!("{}::{}", album_artist, title))
    }

    pub fn for_track(track: &Track) -> Self {
        Self::new(&track.album_artist, &track.album)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlbumKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub name: String,
    pub track_ids: HashSet<TrackId>,
    pub albums: HashSet<AlbumKey>,
    pub genres: HashSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Album {
    pub key: AlbumKey,
    pub title: String,
    pub artist: String,
    pub year: Option<u32>,
    pub genre: String,
    pub track_ids: HashSet<TrackId>,
    pub total_duration: f64,
    pub album_art: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Genre {
    pub name: String,
    pub track_ids: HashSet<TrackId>,
    pub artists: HashSet<String>,
    pub albums: HashSet<AlbumKey>,
}

/// How many empty entries a prune pass dropped, per index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub artists: usize,
    pub albums: usize,
    pub genres: usize,
}

impl PruneReport {
    pub fn total(&self) -> usize {
        self.artists + self.albums + self.genres
    }
}

#[derive(Debug, Clone, Default)]
pub struct LibraryIndex {
    artists: HashMap<String, Artist>,
    albums: HashMap<AlbumKey, Album>,
    genres: HashMap<String, Genre>,
}

impl LibraryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `track` to its artist, album and genre entries, creating them on first reference.
    pub fn index(&mut self, track: &Track) {
        let album_key = AlbumKey::for_track(track);

        let artist = self
            .artists
            .entry(track.artist.clone())
            .or_insert_with(|| Artist {
                name: track.artist.clone(),
                track_ids: HashSet::new(),
                albums: HashSet::new(),
                genres: HashSet::new(),
            });
        artist.track_ids.insert(track.id.clone());
        artist.albums.insert(album_key.clone());
        artist.genres.insert(track.genre.clone());

        let album = self.albums.entry(album_key.clone()).or_insert_with(|| Album {
            key: album_key.clone(),
            title: track.album.clone(),
            artist: track.album_artist.clone(),
            year: track.year,
            genre: track.genre.clone(),
            track_ids: HashSet::new(),
            total_duration: 0.0,
            album_art: track.album_art.clone(),
        });
        if album.track_ids.insert(track.id.clone()) {
            album.total_duration += track.duration;
        }
        if album.album_art.is_none() {
            album.album_art = track.album_art.clone();
        }
        if album.year.is_none() {
            album.year = track.year;
        }

        let genre = self.genres.entry(track.genre.clone()).or_insert_with(|| Genre {
            name: track.genre.clone(),
            track_ids: HashSet::new(),
            artists: HashSet::new(),
            albums: HashSet::new(),
        });
        genre.track_ids.insert(track.id.clone());
        genre.artists.insert(track.artist.clone());
        genre.albums.insert(album_key);
    }

    /// Drop `track` from every entry it participates in. `remaining` is the
    /// catalog without `track`; cross-reference sets are recomputed from it so
    /// an artist doesn't keep listing an album it no longer has tracks on.
    /// Entries left empty are removed on the spot.
    pub fn unindex(&mut self, track: &Track, remaining: &HashMap<TrackId, Track>) {
        let album_key = AlbumKey::for_track(track);

        if let Some(artist) = self.artists.get_mut(&track.artist) {
            artist.track_ids.remove(&track.id);
            if artist.track_ids.is_empty() {
                self.artists.remove(&track.artist);
            } else {
                let members = resolve(&artist.track_ids, remaining);
                artist.albums = members.iter().map(|t| AlbumKey::for_track(t)).collect();
                artist.genres = members.iter().map(|t| t.genre.clone()).collect();
            }
        }

        if let Some(album) = self.albums.get_mut(&album_key) {
            if album.track_ids.remove(&track.id) {
                album.total_duration = (album.total_duration - track.duration).max(0.0);
            }
            if album.track_ids.is_empty() {
                self.albums.remove(&album_key);
            } else {
                // Summary fields stay put while some remaining track still carries them
                let mut members = resolve(&album.track_ids, remaining);
                members.sort_by(|a, b| a.id.cmp(&b.id));
                if !members.iter().any(|t| t.genre == album.genre) {
                    if let Some(first) = members.first() {
                        album.genre = first.genre.clone();
                    }
                }
                if album.year.is_some() && !members.iter().any(|t| t.year == album.year) {
                    album.year = members.iter().find_map(|t| t.year);
                }
                if album.album_art.is_some() && !members.iter().any(|t| t.album_art == album.album_art) {
                    album.album_art = members.iter().find_map(|t| t.album_art.clone());
                }
            }
        }

        if let Some(genre) = self.genres.get_mut(&track.genre) {
            genre.track_ids.remove(&track.id);
            if genre.track_ids.is_empty() {
                self.genres.remove(&track.genre);
            } else {
                let members = resolve(&genre.track_ids, remaining);
                genre.artists = members.iter().map(|t| t.artist.clone()).collect();
                genre.albums = members.iter().map(|t| AlbumKey::for_track(t)).collect();
            }
        }
    }

    /// Remove entries whose track set is empty.
    pub fn prune(&mut self) -> PruneReport {
        let before = (self.artists.len(), self.albums.len(), self.genres.len());

        self.artists.retain(|_, artist| !artist.track_ids.is_empty());
        self.albums.retain(|_, album| !album.track_ids.is_empty());
        self.genres.retain(|_, genre| !genre.track_ids.is_empty());

        PruneReport {
            artists: before.0 - self.artists.len(),
            albums: before.1 - self.albums.len(),
            genres: before.2 - self.genres.len(),
        }
    }

    pub fn artist(&self, name: &str) -> Option<&Artist> {
        self.artists.get(name)
    }

    pub fn album(&self, key: &AlbumKey) -> Option<&Album> {
        self.albums.get(key)
    }

    pub fn genre(&self, name: &str) -> Option<&Genre> {
        self.genres.get(name)
    }

    /// Artists ordered by name, so listings and capped searches are reproducible.
    pub fn artists(&self) -> Vec<&Artist> {
        let mut artists: Vec<_> = self.artists.values().collect();
        artists.sort_by(|a, b| a.name.cmp(&b.name));
        artists
    }

    pub fn albums(&self) -> Vec<&Album> {
        let mut albums: Vec<_> = self.albums.values().collect();
        albums.sort_by(|a, b| a.key.cmp(&b.key));
        albums
    }

    pub fn genres(&self) -> Vec<&Genre> {
        let mut genres: Vec<_> = self.genres.values().collect();
        genres.sort_by(|a, b| a.name.cmp(&b.name));
        genres
    }

    pub fn artist_count(&self) -> usize {
        self.artists.len()
    }

    pub fn album_count(&self) -> usize {
        self.albums.len()
    }

    pub fn genre_count(&self) -> usize {
        self.genres.len()
    }
}

fn resolve<'a>(ids: &HashSet<TrackId>, tracks: &'a HashMap<TrackId, Track>) -> Vec<&'a Track> {
    ids.iter().filter_map(|id| tracks.get(id)).collect()
}
