// Tag and stream-property extraction
// lofty reads every container we list; id3 / mp4ameta take over when lofty chokes on a file

use super::AudioFormat;
use anyhow::{anyhow, Result};
use id3::TagLike;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Everything a tag reader could tell us about one file. All optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub composer: Option<String>,
    pub year: Option<u32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    pub duration: Option<Duration>,
    pub bitrate: Option<u32>,
    pub sample_rate: Option<u32>,
    pub bits_per_sample: Option<u8>,
    pub format: Option<String>,
    pub codec: Option<String>,
    pub picture: Option<AlbumArt>,
}

/// Embedded cover image, as raw bytes plus its MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbumArt {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl AlbumArt {
    /// File extension for the cache file, derived from the MIME subtype.
    pub fn extension(&self) -> &str {
        match self.mime_type.split('/').nth(1) {
            Some("jpeg") | Some("jpg") => "jpg",
            Some("png") => "png",
            Some("gif") => "gif",
            Some("bmp") => "bmp",
            Some("tiff") => "tiff",
            Some(other) if !other.is_empty() => other,
            _ => "img",
        }
    }
}

/// Reads tags from one file. Blocking; the scanner runs it on the blocking pool.
pub trait MetadataExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata>;
}

#[derive(Debug, Clone, Default)]
pub struct TagExtractor;

impl TagExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_with_lofty(&self, path: &Path) -> Result<ExtractedMetadata> {
        let tagged_file = Probe::open(path)?.guess_file_type()?.read()?;
        let properties = tagged_file.properties();
        let tag = tagged_file.primary_tag().or_else(|| tagged_file.first_tag());

        let mut metadata = ExtractedMetadata {
            duration: Some(properties.duration()).filter(|d| !d.is_zero()),
            bitrate: properties.audio_bitrate(),
            sample_rate: properties.sample_rate(),
            bits_per_sample: properties.bit_depth(),
            format: Some(AudioFormat::from_path(path).container_name().to_string()),
            codec: Some(format!("{:?}", tagged_file.file_type())),
            ..Default::default()
        };

        if let Some(tag) = tag {
            metadata.title = tag.title().map(|s| s.to_string());
            metadata.artist = tag.artist().map(|s| s.to_string());
            metadata.album = tag.album().map(|s| s.to_string());
            metadata.genre = tag.genre().map(|s| s.to_string());
            metadata.album_artist = tag.get_string(&ItemKey::AlbumArtist).map(|s| s.to_string());
            metadata.composer = tag.get_string(&ItemKey::Composer).map(|s| s.to_string());
            metadata.year = tag.year();
            metadata.track_number = tag.track();
            metadata.disc_number = tag.disk();
            metadata.picture = tag.pictures().first().map(|picture| AlbumArt {
                mime_type: picture
                    .mime_type()
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_else(|| "image/jpeg".to_string()),
                data: picture.data().to_vec(),
            });
        }

        Ok(metadata)
    }

    fn extract_id3_metadata(&self, path: &Path) -> Result<ExtractedMetadata> {
        let tag = id3::Tag::read_from_path(path)?;

        let metadata = ExtractedMetadata {
            title: tag.title().map(|s| s.to_string()),
            artist: tag.artist().map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
            album_artist: tag.album_artist().map(|s| s.to_string()),
            genre: tag.genre().map(|s| s.to_string()),
            year: tag.year().and_then(|y| u32::try_from(y).ok()),
            track_number: tag.track(),
            disc_number: tag.disc(),
            // TLEN is stored in milliseconds
            duration: tag.duration().map(|ms| Duration::from_millis(ms.into())),
            format: Some(AudioFormat::Mp3.container_name().to_string()),
            picture: tag.pictures().next().map(|p| AlbumArt {
                mime_type: p.mime_type.clone(),
                data: p.data.clone(),
            }),
            ..Default::default()
        };
        Ok(metadata)
    }

    fn extract_mp4_metadata(&self, path: &Path) -> Result<ExtractedMetadata> {
        let tag = mp4ameta::Tag::read_from_path(path)?;

        Ok(ExtractedMetadata {
            title: tag.title().map(|s| s.to_string()),
            artist: tag.artist().map(|s| s.to_string()),
            album: tag.album().map(|s| s.to_string()),
            album_artist: tag.album_artist().map(|s| s.to_string()),
            genre: tag.genre().map(|s| s.to_string()),
            composer: tag.composer().map(|s| s.to_string()),
            track_number: tag.track_number().map(|t| t as u32),
            disc_number: tag.disc_number().map(|d| d as u32),
            year: tag.year().and_then(|y| y.get(..4)).and_then(|y| y.parse().ok()),
            duration: tag.duration(),
            format: Some(AudioFormat::Mp4.container_name().to_string()),
            ..Default::default()
        })
    }
}

impl MetadataExtractor for TagExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata> {
        let lofty_error = match self.extract_with_lofty(path) {
            Ok(metadata) => return Ok(metadata),
            Err(e) => e,
        };
        debug!("lofty could not read {}: {}", path.display(), lofty_error);

        match AudioFormat::from_path(path) {
            AudioFormat::Mp3 => self.extract_id3_metadata(path),
            AudioFormat::Mp4 => self.extract_mp4_metadata(path),
            _ => Err(anyhow!("unreadable tags in {}: {}", path.display(), lofty_error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_garbage_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-really.flac");
        std::fs::write(&path, b"this is not a flac stream").unwrap();

        assert!(TagExtractor::new().extract(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(TagExtractor::new().extract(&dir.path().join("gone.mp3")).is_err());
    }

    #[test]
    fn test_id3_reader_picks_up_frames_and_cover() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tagged.mp3");
        std::fs::write(&path, b"").unwrap();

        let mut tag = id3::Tag::new();
        tag.set_title("Blue in Green");
        tag.set_artist("Miles Davis");
        tag.set_year(1959);
        tag.add_frame(id3::frame::Picture {
            mime_type: "image/png".to_string(),
            picture_type: id3::frame::PictureType::CoverFront,
            description: String::new(),
            data: vec![1, 2, 3],
        });
        tag.write_to_path(&path, id3::Version::Id3v24).unwrap();

        let metadata = TagExtractor::new().extract_id3_metadata(&path).unwrap();
        assert_eq!(metadata.title.as_deref(), Some("Blue in Green"));
        assert_eq!(metadata.artist.as_deref(), Some("Miles Davis"));
        assert_eq!(metadata.year, Some(1959));
        let cover = metadata.picture.unwrap();
        assert_eq!((cover.mime_type.as_str(), cover.data), ("image/png", vec![1, 2, 3]));
    }

    #[test]
    fn test_album_art_extension_from_mime() {
        let art = |mime: &str| AlbumArt { mime_type: mime.to_string(), data: vec![] };
        assert_eq!(art("image/jpeg").extension(), "jpg");
        assert_eq!(art("image/png").extension(), "png");
        assert_eq!(art("image/webp").extension(), "webp");
        assert_eq!(art("").extension(), "img");
    }
}
