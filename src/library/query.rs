//! Text search and sorted listing over the catalog.

use super::catalog::Catalog;
use super::index::{Album, AlbumKey, Artist, Genre};
use crate::audio::Track;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MAX_RESULTS: usize = 50;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub tracks: Vec<Track>,
    pub artists: Vec<ArtistSummary>,
    pub albums: Vec<AlbumSummary>,
    pub genres: Vec<GenreSummary>,
}

impl SearchResults {
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty() && self.artists.is_empty() && self.albums.is_empty() && self.genres.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistSummary {
    pub name: String,
    pub track_count: usize,
    pub album_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlbumSummary {
    pub key: AlbumKey,
    pub title: String,
    pub artist: String,
    pub year: Option<u32>,
    pub genre: String,
    pub track_count: usize,
    pub total_duration: f64,
    pub album_art: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreSummary {
    pub name: String,
    pub track_count: usize,
}

impl From<&Artist> for ArtistSummary {
    fn from(artist: &Artist) -> Self {
        Self {
            name: artist.name.clone(),
            track_count: artist.track_ids.len(),
            album_count: artist.albums.len(),
        }
    }
}

impl From<&Album> for AlbumSummary {
    fn from(album: &Album) -> Self {
        Self {
            key: album.key.clone(),
            title: album.title.clone(),
            artist: album.artist.clone(),
            year: album.year,
            genre: album.genre.clone(),
            track_count: album.track_ids.len(),
            total_duration: album.total_duration,
            album_art: album.album_art.clone(),
        }
    }
}

impl From<&Genre> for GenreSummary {
    fn from(genre: &Genre) -> Self {
        Self {
            name: genre.name.clone(),
            track_count: genre.track_ids.len(),
        }
    }
}

/// Case-insensitive substring search, each category capped at `max_results`.
/// Tracks are visited in id order and index entries in key order, so the same
/// catalog always yields the same capped result.
pub fn search(catalog: &Catalog, term: &str, max_results: usize) -> SearchResults {
    let needle = term.to_lowercase();
    let hit = |text: &str| text.to_lowercase().contains(&needle);
    let index = catalog.index();

    let tracks = catalog
        .sorted()
        .into_iter()
        .filter(|t| hit(&t.title) || hit(&t.artist) || hit(&t.album) || hit(&t.genre))
        .take(max_results)
        .cloned()
        .collect();

    let artists = index
        .artists()
        .into_iter()
        .filter(|a| hit(&a.name))
        .take(max_results)
        .map(ArtistSummary::from)
        .collect();

    let albums = index
        .albums()
        .into_iter()
        .filter(|a| hit(&a.title) || hit(&a.artist))
        .take(max_results)
        .map(AlbumSummary::from)
        .collect();

    let genres = index
        .genres()
        .into_iter()
        .filter(|g| hit(&g.name))
        .take(max_results)
        .map(GenreSummary::from)
        .collect();

    SearchResults { tracks, artists, albums, genres }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    Title,
    Artist,
    AlbumArtist,
    Album,
    Genre,
    Year,
    TrackNumber,
    Duration,
    Bitrate,
    FileSize,
    DateAdded,
    PlayCount,
    LastPlayed,
    Rating,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

enum SortKey {
    Text(String),
    Number(f64),
    Missing,
}

impl SortField {
    fn key(&self, track: &Track) -> SortKey {
        let text = |s: &str| SortKey::Text(s.to_lowercase());
        let number = |n: Option<f64>| n.map(SortKey::Number).unwrap_or(SortKey::Missing);
        match self {
            SortField::Title => text(&track.title),
            SortField::Artist => text(&track.artist),
            SortField::AlbumArtist => text(&track.album_artist),
            SortField::Album => text(&track.album),
            SortField::Genre => text(&track.genre),
            SortField::Year => number(track.year.map(f64::from)),
            SortField::TrackNumber => number(track.track_number.map(f64::from)),
            SortField::Duration => number(Some(track.duration)),
            SortField::Bitrate => number(track.bitrate.map(f64::from)),
            SortField::FileSize => number(Some(track.file_size as f64)),
            SortField::DateAdded => number(Some(track.date_added.timestamp_millis() as f64)),
            SortField::PlayCount => number(Some(track.play_count.into())),
            SortField::LastPlayed => number(track.last_played.map(|d| d.timestamp_millis() as f64)),
            SortField::Rating => number(Some(track.rating.into())),
        }
    }
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let field = match s.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "title" => SortField::Title,
            "artist" => SortField::Artist,
            "albumartist" => SortField::AlbumArtist,
            "album" => SortField::Album,
            "genre" => SortField::Genre,
            "year" => SortField::Year,
            "track" | "tracknumber" => SortField::TrackNumber,
            "duration" => SortField::Duration,
            "bitrate" => SortField::Bitrate,
            "filesize" | "size" => SortField::FileSize,
            "dateadded" | "added" => SortField::DateAdded,
            "playcount" | "plays" => SortField::PlayCount,
            "lastplayed" => SortField::LastPlayed,
            "rating" => SortField::Rating,
            other => return Err(format!("unknown sort field: {}", other)),
        };
        Ok(field)
    }
}

/// Every track sorted by `field`. Text compares case-insensitively, numbers
/// numerically; tracks without a value go last in either direction, and ties
/// fall back to id order.
pub fn list_by(catalog: &Catalog, field: SortField, order: SortOrder) -> Vec<Track> {
    let mut keyed: Vec<_> = catalog.all().map(|t| (field.key(t), t)).collect();

    keyed.sort_by(|(ka, a), (kb, b)| {
        let primary = match (ka, kb) {
            (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
            (SortKey::Missing, _) => return Ordering::Greater,
            (_, SortKey::Missing) => return Ordering::Less,
            (SortKey::Text(x), SortKey::Text(y)) => x.cmp(y),
            (SortKey::Number(x), SortKey::Number(y)) => x.total_cmp(y),
            _ => Ordering::Equal,
        };
        let primary = match order {
            SortOrder::Ascending => primary,
            SortOrder::Descending => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });

    keyed.into_iter().map(|(_, t)| t.clone()).collect()
}
