use crate::error::{LibraryError, Result};
use crate::library::TrackId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// A user playlist. Track ids are soft references: a deleted track is
/// cascaded out, but readers still filter ids that don't resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub track_ids: Vec<TrackId>,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl Playlist {
    /// Duplicate ids in `track_ids` are kept as given.
    pub fn new(name: String, description: Option<String>, track_ids: Vec<TrackId>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            track_ids,
            date_created: now,
            date_modified: now,
        }
    }

    /// Append `track_id` unless it's already there. Returns whether anything changed.
    pub fn add_track(&mut self, track_id: TrackId) -> bool {
        if self.track_ids.contains(&track_id) {
            return false;
        }
        self.track_ids.push(track_id);
        self.date_modified = Utc::now();
        true
    }

    /// Drop every occurrence of `track_id`. Returns how many were removed.
    pub fn remove_track(&mut self, track_id: &TrackId) -> usize {
        let before = self.track_ids.len();
        self.track_ids.retain(|id| id != track_id);
        self.date_modified = Utc::now();
        before - self.track_ids.len()
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.track_ids.contains(track_id)
    }
}

/// Partial update. `None` leaves the field alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub track_ids: Option<Vec<TrackId>>,
}

/// Playlists in creation order.
#[derive(Debug, Clone, Default)]
pub struct PlaylistStore {
    playlists: Vec<Playlist>,
}

impl PlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_playlists(playlists: Vec<Playlist>) -> Self {
        Self { playlists }
    }

    pub fn create(&mut self, name: String, description: Option<String>, track_ids: Vec<TrackId>) -> &Playlist {
        let playlist = Playlist::new(name, description, track_ids);
        info!("Created playlist '{}' with {} tracks", playlist.name, playlist.track_ids.len());
        self.playlists.push(playlist);
        &self.playlists[self.playlists.len() - 1]
    }

    pub fn get(&self, id: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Playlist> {
        self.playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LibraryError::PlaylistNotFound(id.to_string()))
    }

    pub fn update(&mut self, id: &str, patch: PlaylistPatch) -> Result<&Playlist> {
        let playlist = self.get_mut(id)?;
        if let Some(name) = patch.name {
            playlist.name = name;
        }
        if let Some(description) = patch.description {
            playlist.description = Some(description);
        }
        if let Some(track_ids) = patch.track_ids {
            playlist.track_ids = track_ids;
        }
        playlist.date_modified = Utc::now();
        Ok(&*playlist)
    }

    pub fn delete(&mut self, id: &str) -> Result<Playlist> {
        let pos = self
            .playlists
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| LibraryError::PlaylistNotFound(id.to_string()))?;
        let playlist = self.playlists.remove(pos);
        info!("Deleted playlist '{}'", playlist.name);
        Ok(playlist)
    }

    pub fn add_track(&mut self, id: &str, track_id: TrackId) -> Result<bool> {
        let playlist = self.get_mut(id)?;
        Ok(playlist.add_track(track_id))
    }

    pub fn remove_track(&mut self, id: &str, track_id: &TrackId) -> Result<usize> {
        let playlist = self.get_mut(id)?;
        Ok(playlist.remove_track(track_id))
    }

    /// Cascade for a deleted track. Only playlists that held it are touched.
    pub fn purge_track(&mut self, track_id: &TrackId) -> usize {
        self.playlists
            .iter_mut()
            .filter(|p| p.contains(track_id))
            .map(|p| p.remove_track(track_id))
            .sum()
    }

    pub fn all(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> TrackId {
        TrackId::from(s)
    }

    #[test]
    fn test_creation_keeps_duplicates() {
        let mut store = PlaylistStore::new();
        let playlist = store.create("Loops".into(), None, vec![id("a"), id("b"), id("a")]);
        assert_eq!(playlist.track_ids, vec![id("a"), id("b"), id("a")]);
        assert_eq!(playlist.date_created, playlist.date_modified);
    }

    #[test]
    fn test_add_is_idempotent_without_timestamp_bump() {
        let mut store = PlaylistStore::new();
        let pid = store.create("Mix".into(), None, vec![id("a")]).id.clone();
        let stamped = store.get(&pid).unwrap().date_modified;

        assert!(!store.add_track(&pid, id("a")).unwrap());
        assert_eq!(store.get(&pid).unwrap().date_modified, stamped);
        assert!(store.add_track(&pid, id("b")).unwrap());
        assert_eq!(store.get(&pid).unwrap().track_ids, vec![id("a"), id("b")]);
    }

    #[test]
    fn test_remove_drops_every_occurrence() {
        let mut store = PlaylistStore::new();
        let pid = store.create("Mix".into(), None, vec![id("a"), id("b"), id("a")]).id.clone();

        assert_eq!(store.remove_track(&pid, &id("a")).unwrap(), 2);
        assert_eq!(store.get(&pid).unwrap().track_ids, vec![id("b")]);
    }

    #[test]
    fn test_unknown_playlist_is_an_error() {
        let mut store = PlaylistStore::new();
        assert!(matches!(store.add_track("nope", id("a")), Err(LibraryError::PlaylistNotFound(_))));
        assert!(matches!(store.delete("nope"), Err(LibraryError::PlaylistNotFound(_))));
        assert!(store.update("nope", PlaylistPatch::default()).is_err());
    }

    #[test]
    fn test_purge_touches_only_holders() {
        let mut store = PlaylistStore::new();
        let holder = store.create("A".into(), None, vec![id("x"), id("y")]).id.clone();
        let other = store.create("B".into(), None, vec![id("y")]).id.clone();
        let untouched = store.get(&other).unwrap().date_modified;

        assert_eq!(store.purge_track(&id("x")), 1);
        assert_eq!(store.get(&holder).unwrap().track_ids, vec![id("y")]);
        assert_eq!(store.get(&other).unwrap().date_modified, untouched);
    }

    #[test]
    fn test_patch_updates_only_given_fields() {
        let mut store = PlaylistStore::new();
        let pid = store.create("Old".into(), Some("desc".into()), vec![id("a")]).id.clone();
        let patch = PlaylistPatch {
            name: Some("New".into()),
            ..Default::default()
        };

        let updated = store.update(&pid, patch).unwrap();
        assert_eq!(updated.name, "New");
        assert_eq!(updated.description.as_deref(), Some("desc"));
        assert_eq!(updated.track_ids, vec![id("a")]);
    }
}
