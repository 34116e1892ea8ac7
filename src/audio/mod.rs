pub mod metadata;
pub mod scanner;
pub mod track;

pub use metadata::{AlbumArt, ExtractedMetadata, MetadataExtractor, TagExtractor};
pub use scanner::{CommitOutcome, MusicScanner, ScanOptions, ScanProgress, ScanStats, ScanTarget};
pub use track::Track;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AudioFormat {
    Mp3,
    Flac,
    Wav,
    Ogg,
    Opus,
    Mp4,
    Ape,
    WavPack,
    Wma,
    Unknown,
}

impl AudioFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "mp3" => AudioFormat::Mp3,
            "flac" => AudioFormat::Flac,
            "wav" => AudioFormat::Wav,
            "ogg" | "oga" => AudioFormat::Ogg,
            "opus" => AudioFormat::Opus,
            "mp4" | "m4a" | "aac" | "alac" => AudioFormat::Mp4,
            "ape" => AudioFormat::Ape,
            "wv" => AudioFormat::WavPack,
            "wma" => AudioFormat::Wma,
            _ => AudioFormat::Unknown,
        }
    }

    pub fn from_path(path: &std::path::Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(AudioFormat::from_extension)
            .unwrap_or(AudioFormat::Unknown)
    }

    /// Short container name, used when the tag reader can't tell us better.
    pub fn container_name(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "MPEG",
            AudioFormat::Flac => "FLAC",
            AudioFormat::Wav => "WAVE",
            AudioFormat::Ogg => "Ogg",
            AudioFormat::Opus => "Opus",
            AudioFormat::Mp4 => "MPEG-4",
            AudioFormat::Ape => "APE",
            AudioFormat::WavPack => "WavPack",
            AudioFormat::Wma => "ASF",
            AudioFormat::Unknown => "unknown",
        }
    }
}
