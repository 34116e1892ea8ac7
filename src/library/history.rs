// Favorites and the two most-recent-first history lists

use super::TrackId;
use serde::{Deserialize, Serialize};

/// Insertion-ordered set of favorite track ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Favorites(Vec<TrackId>);

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the id was already a favorite.
    pub fn add(&mut self, id: TrackId) -> bool {
        if self.0.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    pub fn remove(&mut self, id: &TrackId) -> bool {
        let before = self.0.len();
        self.0.retain(|fav| fav != id);
        self.0.len() != before
    }

    pub fn ids(&self) -> &[TrackId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<TrackId> for Favorites {
    fn from_iter<I: IntoIterator<Item = TrackId>>(iter: I) -> Self {
        let mut favorites = Favorites::new();
        for id in iter {
            favorites.add(id);
        }
        favorites
    }
}

/// Most-recent-first list of ids, capped at `limit`. Pushing an id that is
/// already present moves it to the front instead of duplicating it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentList {
    ids: Vec<TrackId>,
    limit: usize,
}

impl RecentList {
    pub fn new(limit: usize) -> Self {
        Self { ids: Vec::new(), limit }
    }

    /// Rebuild from persisted ids (already most-recent-first), enforcing the cap.
    pub fn from_ids(ids: impl IntoIterator<Item = TrackId>, limit: usize) -> Self {
        let mut list = Self::new(limit);
        for id in ids {
            if !list.ids.contains(&id) && list.ids.len() < limit {
                list.ids.push(id);
            }
        }
        list
    }

    pub fn push(&mut self, id: TrackId) {
        self.ids.retain(|existing| existing != &id);
        self.ids.insert(0, id);
        self.ids.truncate(self.limit);
    }

    pub fn remove(&mut self, id: &TrackId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    pub fn ids(&self) -> &[TrackId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: usize) -> TrackId {
        TrackId::from(format!("{:032x}", n))
    }

    #[test]
    fn test_favorites_keep_insertion_order_without_duplicates() {
        let mut favorites = Favorites::new();
        assert!(favorites.add(id(2)));
        assert!(favorites.add(id(1)));
        assert!(!favorites.add(id(2)));

        assert_eq!(favorites.ids(), &[id(2), id(1)]);
        assert!(favorites.remove(&id(2)));
        assert!(!favorites.remove(&id(2)));
        assert_eq!(favorites.len(), 1);
    }

    #[test]
    fn test_recent_list_moves_repeat_to_front() {
        let mut recent = RecentList::new(10);
        recent.push(id(1));
        recent.push(id(2));
        recent.push(id(1));

        assert_eq!(recent.ids(), &[id(1), id(2)]);
    }

    #[test]
    fn test_recent_list_cap() {
        let mut recent = RecentList::new(100);
        for n in 0..150 {
            recent.push(id(n));
        }

        assert_eq!(recent.len(), 100);
        assert_eq!(recent.ids()[0], id(149));
        assert_eq!(recent.ids()[99], id(50));
    }

    #[test]
    fn test_from_ids_enforces_cap_and_uniqueness() {
        let recent = RecentList::from_ids(vec![id(1), id(1), id(2), id(3)], 2);
        assert_eq!(recent.ids(), &[id(1), id(2)]);
    }
}
