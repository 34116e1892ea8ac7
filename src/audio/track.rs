use super::metadata::ExtractedMetadata;
use super::AudioFormat;
use crate::library::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::PathBuf;

pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_GENRE: &str = "Unknown";

/// One audio file's catalog record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub path: PathBuf,
    pub filename: String,
    pub title: String,
    pub artist: String,
    pub album_artist: String,
    pub album: String,
    pub genre: String,
    #[serde(default)]
    pub year: Option<u32>,
    #[serde(default, rename = "track")]
    pub track_number: Option<u32>,
    #[serde(default, rename = "disc")]
    pub disc_number: Option<u32>,
    #[serde(default)]
    pub duration: f64, // seconds
    #[serde(default)]
    pub bitrate: Option<u32>, // kbps
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub bits_per_sample: Option<u8>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub codec: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub date_modified: Option<DateTime<Utc>>, // file mtime
    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub last_played: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rating: u8,
    #[serde(default)]
    pub composer: Option<String>,
    #[serde(default)]
    pub album_art: Option<PathBuf>,
}

/// A track attribute as seen by smart playlist rules.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Text(Cow<'a, str>),
    Number(f64),
}

impl Track {
    /// Build a record for a freshly stat'ed file. `metadata` is `None` when
    /// extraction failed, in which case everything falls back to defaults.
    pub fn from_file(
        path: PathBuf,
        file_size: u64,
        modified: Option<DateTime<Utc>>,
        metadata: Option<ExtractedMetadata>,
        now: DateTime<Utc>,
    ) -> Self {
        let id = TrackId::from_path(&path);
        let metadata = metadata.unwrap_or_default();
        let stem = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("Unknown")
            .to_string();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| stem.clone());

        let artist = non_empty(metadata.artist).unwrap_or_else(|| UNKNOWN_ARTIST.to_string());
        let album_artist = non_empty(metadata.album_artist).unwrap_or_else(|| artist.clone());
        let format = metadata
            .format
            .or_else(|| Some(AudioFormat::from_path(&path).container_name().to_string()));

        Self {
            id,
            filename,
            title: non_empty(metadata.title).unwrap_or(stem),
            artist,
            album_artist,
            album: non_empty(metadata.album).unwrap_or_else(|| UNKNOWN_ALBUM.to_string()),
            genre: non_empty(metadata.genre).unwrap_or_else(|| UNKNOWN_GENRE.to_string()),
            year: metadata.year,
            track_number: metadata.track_number,
            disc_number: metadata.disc_number,
            duration: metadata.duration.map(|d| d.as_secs_f64()).unwrap_or(0.0),
            bitrate: metadata.bitrate,
            sample_rate: metadata.sample_rate,
            bits_per_sample: metadata.bits_per_sample,
            format,
            codec: metadata.codec,
            file_size,
            date_added: now,
            date_modified: modified,
            play_count: 0,
            last_played: None,
            rating: 0,
            composer: non_empty(metadata.composer),
            album_art: None,
            path,
        }
    }

    /// Keep listening history and user edits when a file is re-read.
    pub fn with_user_state_from(mut self, previous: &Track) -> Self {
        self.date_added = previous.date_added;
        self.play_count = previous.play_count;
        self.last_played = previous.last_played;
        self.rating = previous.rating;
        if self.album_art.is_none() {
            self.album_art = previous.album_art.clone();
        }
        self
    }

    /// True when the file on disk no longer matches what was catalogued.
    pub fn is_stale(&self, file_size: u64, modified: Option<DateTime<Utc>>) -> bool {
        self.file_size != file_size || (modified.is_some() && self.date_modified != modified)
    }

    pub fn record_play(&mut self, at: DateTime<Utc>) {
        self.play_count = self.play_count.saturating_add(1);
        self.last_played = Some(at);
    }

    pub fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
        let text = |s: &str| Some(FieldValue::Text(Cow::Owned(s.to_string())));
        match field {
            "id" => text(self.id.as_str()),
            "path" => Some(FieldValue::Text(self.path.to_string_lossy())),
            "filename" => Some(FieldValue::Text(Cow::Borrowed(&self.filename))),
            "title" => Some(FieldValue::Text(Cow::Borrowed(&self.title))),
            "artist" => Some(FieldValue::Text(Cow::Borrowed(&self.artist))),
            "albumArtist" => Some(FieldValue::Text(Cow::Borrowed(&self.album_artist))),
            "album" => Some(FieldValue::Text(Cow::Borrowed(&self.album))),
            "genre" => Some(FieldValue::Text(Cow::Borrowed(&self.genre))),
            "year" => self.year.map(|v| FieldValue::Number(v.into())),
            "track" | "trackNumber" => self.track_number.map(|v| FieldValue::Number(v.into())),
            "disc" | "discNumber" => self.disc_number.map(|v| FieldValue::Number(v.into())),
            "duration" => Some(FieldValue::Number(self.duration)),
            "bitrate" => self.bitrate.map(|v| FieldValue::Number(v.into())),
            "sampleRate" => self.sample_rate.map(|v| FieldValue::Number(v.into())),
            "bitsPerSample" => self.bits_per_sample.map(|v| FieldValue::Number(v.into())),
            "format" => self.format.as_deref().map(|v| FieldValue::Text(Cow::Borrowed(v))),
            "codec" => self.codec.as_deref().map(|v| FieldValue::Text(Cow::Borrowed(v))),
            "fileSize" => Some(FieldValue::Number(self.file_size as f64)),
            "dateAdded" => text(&self.date_added.to_rfc3339()),
            "dateModified" => self.date_modified.and_then(|d| text(&d.to_rfc3339())),
            "playCount" => Some(FieldValue::Number(self.play_count.into())),
            "lastPlayed" => self.last_played.and_then(|d| text(&d.to_rfc3339())),
            "rating" => Some(FieldValue::Number(self.rating.into())),
            "composer" => self.composer.as_deref().map(|v| FieldValue::Text(Cow::Borrowed(v))),
            "albumArt" => self.album_art.as_ref().map(|p| FieldValue::Text(p.to_string_lossy())),
            _ => None,
        }
    }

    pub fn duration_string(&self) -> String {
        format_duration(self.duration.round() as u64)
    }
}

pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_missing_metadata_falls_back_to_defaults() {
        let track = Track::from_file(PathBuf::from("/music/loose/Some Song.mp3"), 1234, None, None, now());

        assert_eq!(track.title, "Some Song");
        assert_eq!(track.filename, "Some Song.mp3");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.album_artist, UNKNOWN_ARTIST);
        assert_eq!(track.album, UNKNOWN_ALBUM);
        assert_eq!(track.genre, UNKNOWN_GENRE);
        assert_eq!(track.duration, 0.0);
        assert_eq!(track.year, None);
        assert_eq!(track.format.as_deref(), Some("MPEG"));
        assert_eq!(track.id, TrackId::from_path(&track.path));
    }

    #[test]
    fn test_album_artist_falls_back_to_artist() {
        let metadata = ExtractedMetadata {
            title: Some("Blue in Green".into()),
            artist: Some("Miles Davis".into()),
            album_artist: Some("   ".into()),
            duration: Some(Duration::from_millis(337_500)),
            ..Default::default()
        };
        let track = Track::from_file(PathBuf::from("/m/x.flac"), 1, None, Some(metadata), now());

        assert_eq!(track.album_artist, "Miles Davis");
        assert!((track.duration - 337.5).abs() < f64::EPSILON);
        assert_eq!(track.duration_string(), "5:38");
    }

    #[test]
    fn test_user_state_survives_refresh() {
        let mut old = Track::from_file(PathBuf::from("/m/a.mp3"), 1, None, None, now());
        old.record_play(now());
        old.rating = 4;

        let later = now() + chrono::Duration::days(3);
        let fresh = Track::from_file(PathBuf::from("/m/a.mp3"), 2, None, None, later).with_user_state_from(&old);

        assert_eq!(fresh.play_count, 1);
        assert_eq!(fresh.rating, 4);
        assert_eq!(fresh.date_added, now());
        assert_eq!(fresh.file_size, 2);
    }

    #[test]
    fn test_field_values_for_rules() {
        let mut track = Track::from_file(PathBuf::from("/m/a.mp3"), 10, None, None, now());
        track.year = Some(1999);

        assert_eq!(track.field_value("year"), Some(FieldValue::Number(1999.0)));
        assert_eq!(track.field_value("genre"), Some(FieldValue::Text(Cow::Borrowed("Unknown"))));
        assert_eq!(track.field_value("bitrate"), None);
        assert_eq!(track.field_value("noSuchField"), None);
    }

    #[test]
    fn test_staleness_uses_size_and_mtime() {
        let track = Track::from_file(PathBuf::from("/m/a.mp3"), 10, Some(now()), None, now());
        assert!(!track.is_stale(10, Some(now())));
        assert!(track.is_stale(11, Some(now())));
        assert!(track.is_stale(10, Some(now() + chrono::Duration::seconds(1))));
        assert!(!track.is_stale(10, None));
    }

    #[test]
    fn test_serialized_layout_uses_camel_case() {
        let track = Track::from_file(PathBuf::from("/m/a.mp3"), 10, None, None, now());
        let json = serde_json::to_value(&track).unwrap();
        assert!(json.get("albumArtist").is_some());
        assert!(json.get("playCount").is_some());
        assert!(json.get("track").is_some());
    }
}
