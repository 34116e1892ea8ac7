//! Content-addressed track identifiers.
//!
//! A track's id is derived from nothing but its absolute path, so scanning the
//! same file twice always lands on the same catalog entry.

use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, MAIN_SEPARATOR};
use xxhash_rust::xxh3::xxh3_128;

/// 128-bit XXH3 of the normalized absolute path, as 32 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn from_path(path: &Path) -> Self {
        let normalized = normalize_path(path);
        TrackId(format!("{:032x}", xxh3_128(normalized.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lexically absolute path with `/` separators. Case is left untouched.
pub fn normalize_path(path: &Path) -> String {
    let absolute = path.absolutize().unwrap_or(Cow::Borrowed(path));
    let text = absolute.to_string_lossy();
    if MAIN_SEPARATOR == '\\' {
        text.replace('\\', "/")
    } else {
        text.into_owned()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TrackId {
    fn from(value: String) -> Self {
        TrackId(value)
    }
}

impl From<&str> for TrackId {
    fn from(value: &str) -> Self {
        TrackId(value.to_string())
    }
}

impl AsRef<str> for TrackId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
