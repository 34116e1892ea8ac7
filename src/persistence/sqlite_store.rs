use super::{Collection, PersistenceError, PersistenceGateway, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS collections (
        name TEXT PRIMARY KEY,
        data TEXT NOT NULL, -- JSON array
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );
"#;

/// All collections in one sqlite file, one row each.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::initialize(conn)
    }

    fn initialize(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }

    fn write_row(conn: &Connection, collection: Collection, data: &Value) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO collections (name, data, updated_at)
             VALUES (?1, ?2, CURRENT_TIMESTAMP)",
            params![collection.key(), serde_json::to_string(data)?],
        )?;
        Ok(())
    }
}

impl PersistenceGateway for SqliteStore {
    fn save(&self, collection: Collection, data: &Value) -> Result<()> {
        let conn = self.conn()?;
        Self::write_row(&conn, collection, data)
    }

    fn load(&self, collection: Collection) -> Result<Option<Value>> {
        let conn = self.conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM collections WHERE name = ?1",
                params![collection.key()],
                |row| row.get(0),
            )
            .optional()?;

        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_all(&self, entries: &[(Collection, Value)]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        for (collection, data) in entries {
            Self::write_row(&tx, *collection, data)?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_batch_save_and_reload_from_disk() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("library.db");

        {
            let store = SqliteStore::open(&db_path).unwrap();
            store
                .save_all(&[
                    (Collection::Favorites, json!(["a", "b"])),
                    (Collection::RecentlyPlayed, json!(["b"])),
                ])
                .unwrap();
            store.save(Collection::Favorites, &json!(["c"])).unwrap();
        }

        let store = SqliteStore::open(&db_path).unwrap();
        assert_eq!(store.load(Collection::Favorites).unwrap(), Some(json!(["c"])));
        assert_eq!(store.load(Collection::RecentlyPlayed).unwrap(), Some(json!(["b"])));
        assert_eq!(store.load(Collection::Tracks).unwrap(), None);
    }
}
