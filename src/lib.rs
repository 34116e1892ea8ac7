// TrackHive Library - local music catalog core
// Scanner feeds the catalog, everything else reads from it

pub mod audio;       // tag extraction, track model, scanning
pub mod config;      // settings file
pub mod error;       // library error types
pub mod library;     // catalog, indices, queries, the Library facade
pub mod persistence; // snapshot storage backends
pub mod playlist;    // playlists, smart playlists, export

// Export the stuff front ends actually use
pub use audio::{MetadataExtractor, MusicScanner, ScanOptions, ScanProgress, ScanStats, TagExtractor, Track};
pub use config::Config;
pub use error::{LibraryError, Result};
pub use library::{Library, LibraryStats, SearchResults, SortField, SortOrder, TrackId};
pub use persistence::{Collection, JsonFileStore, MemoryStore, PersistenceGateway};
pub use playlist::{ExportFormat, MatchType, Playlist, Rule, RuleOperator, SmartPlaylist};
