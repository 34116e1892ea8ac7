// Error types for the library core
// Per-file problems during a scan are recovered and counted; these are the ones callers see

use crate::library::TrackId;
use crate::persistence::PersistenceError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("library scan already in progress")]
    ScanInProgress,

    #[error("no library paths supplied")]
    NoRootPaths,

    #[error("cannot read {}: {source}", path.display())]
    PathUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse metadata of {}: {reason}", path.display())]
    MetadataUnparseable { path: PathBuf, reason: String },

    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),

    #[error("smart playlist not found: {0}")]
    SmartPlaylistNotFound(String),

    #[error("track not found: {0}")]
    TrackNotFound(TrackId),

    #[error("unsupported export format: {0}")]
    UnsupportedExportFormat(String),

    #[error("export to {} failed: {source}", path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
