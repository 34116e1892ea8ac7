use super::{Collection, PersistenceGateway, Result};
use serde_json::Value;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::debug;

/// One pretty-printed `<collection>.json` file per collection under `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.dir.join(format!("{}.json", collection.key()))
    }
}

impl PersistenceGateway for JsonFileStore {
    fn save(&self, collection: Collection, data: &Value) -> Result<()> {
        let path = self.path_for(collection);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(data)?;

        // Write then rename so a crash mid-write leaves the old snapshot intact
        let mut file = fs::File::create(&tmp)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;

        debug!("Saved {} to {}", collection, path.display());
        Ok(())
    }

    fn load(&self, collection: Collection) -> Result<Option<Value>> {
        let path = self.path_for(collection);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}
