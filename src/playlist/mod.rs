pub mod export;
pub mod smart;
pub mod store;

pub use export::{ExportFormat, PlaylistExporter};
pub use smart::{evaluate, MatchType, Rule, RuleOperator, SmartPlaylist, SmartPlaylistPatch, SmartPlaylistStore};
pub use store::{Playlist, PlaylistPatch, PlaylistStore};
