// Playlist export - M3U for other players, JSON for backups

use super::store::Playlist;
use crate::audio::Track;
use crate::error::{LibraryError, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    M3u,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::M3u => "m3u",
            ExportFormat::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "m3u" | "m3u8" => Ok(ExportFormat::M3u),
            "json" => Ok(ExportFormat::Json),
            other => Err(LibraryError::UnsupportedExportFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistExport<'a> {
    name: &'a str,
    description: Option<&'a str>,
    exported_at: DateTime<Utc>,
    tracks: Vec<ExportedTrack<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedTrack<'a> {
    id: &'a str,
    title: &'a str,
    artist: &'a str,
    album: &'a str,
    duration: f64,
    path: &'a Path,
}

pub struct PlaylistExporter {
    export_dir: PathBuf,
}

impl PlaylistExporter {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    /// Write `playlist` with its resolved `tracks` and return the file written.
    pub async fn export(&self, playlist: &Playlist, tracks: &[Track], format: ExportFormat) -> Result<PathBuf> {
        let now = Utc::now();
        let file_name = format!(
            "{}_{}.{}",
            sanitize_file_name(&playlist.name),
            now.format("%Y%m%d_%H%M%S"),
            format.extension()
        );
        let path = self.export_dir.join(file_name);

        let content = match format {
            ExportFormat::M3u => render_m3u(tracks),
            ExportFormat::Json => render_json(playlist, tracks, now)?,
        };

        let export_error = |source| LibraryError::Export {
            path: path.clone(),
            source,
        };
        tokio::fs::create_dir_all(&self.export_dir).await.map_err(export_error)?;
        tokio::fs::write(&path, content).await.map_err(export_error)?;

        info!("Exported playlist '{}' ({} tracks) to {}", playlist.name, tracks.len(), path.display());
        Ok(path)
    }
}

pub fn render_m3u(tracks: &[Track]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for track in tracks {
        let _ = writeln!(out, "#EXTINF:{},{} - {}", track.duration.round() as i64, track.artist, track.title);
        let _ = writeln!(out, "{}", track.path.display());
    }
    out
}

fn render_json(playlist: &Playlist, tracks: &[Track], exported_at: DateTime<Utc>) -> Result<String> {
    let export = PlaylistExport {
        name: &playlist.name,
        description: playlist.description.as_deref(),
        exported_at,
        tracks: tracks
            .iter()
            .map(|t| ExportedTrack {
                id: t.id.as_str(),
                title: &t.title,
                artist: &t.artist,
                album: &t.album,
                duration: t.duration,
                path: &t.path,
            })
            .collect(),
    };
    serde_json::to_string_pretty(&export)
        .map_err(|e| LibraryError::Persistence(e.into()))
}

/// Replace characters that are invalid in file names on common platforms.
pub fn sanitize_file_name(name: &str) -> String {
    let name = name.trim();
    let cleaned = match Regex::new(r#"[\\/:*?"<>|]"#) {
        Ok(regex) => regex.replace_all(name, "_").into_owned(),
        Err(_) => name.to_string(),
    };
    if cleaned.is_empty() {
        "playlist".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn track(path: &str, artist: &str, title: &str, duration: f64) -> Track {
        let mut t = Track::from_file(path.into(), 1, None, None, Utc::now());
        t.artist = artist.to_string();
        t.title = title.to_string();
        t.duration = duration;
        t
    }

    #[test]
    fn test_m3u_layout() {
        let tracks = vec![track("/m/a.flac", "Björk", "Hyperballad", 321.6)];
        assert_eq!(render_m3u(&tracks), "#EXTM3U\n#EXTINF:322,Björk - Hyperballad\n/m/a.flac\n");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("AC/DC: Best?"), "AC_DC_ Best_");
        assert_eq!(sanitize_file_name("   "), "playlist");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("M3U".parse::<ExportFormat>().unwrap(), ExportFormat::M3u);
        assert!(matches!("xspf".parse::<ExportFormat>(), Err(LibraryError::UnsupportedExportFormat(_))));
    }

    #[tokio::test]
    async fn test_export_writes_timestamped_file() {
        let dir = tempdir().unwrap();
        let exporter = PlaylistExporter::new(dir.path().join("exports"));
        let playlist = Playlist::new("Late/Night".into(), None, vec![]);
        let tracks = vec![track("/m/a.mp3", "Low", "Words", 200.0)];

        let path = exporter.export(&playlist, &tracks, ExportFormat::Json).await.unwrap();

        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("Late_Night_"));
        assert!(name.ends_with(".json"));
        let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["tracks"][0]["title"], "Words");
    }
}
