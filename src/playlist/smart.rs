//! Rule-based playlists. Nothing is materialized: membership is evaluated
//! against the live catalog every time the tracks are requested.

use crate::audio::track::FieldValue;
use crate::audio::Track;
use crate::error::{LibraryError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleOperator {
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    GreaterThan,
    LessThan,
    Between,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    #[default]
    All,
    Any,
}

/// One predicate over a track field. `field` uses the serialized
/// (camelCase) track field names, e.g. `genre`, `year`, `playCount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    pub operator: RuleOperator,
    pub value: Value,
}

impl Rule {
    pub fn new(field: impl Into<String>, operator: RuleOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }

    /// Fails closed: an absent track value, an unknown field or a value that
    /// can't be compared all evaluate to false.
    pub fn matches(&self, track: &Track) -> bool {
        let Some(actual) = track.field_value(&self.field) else {
            return false;
        };

        match self.operator {
            RuleOperator::Equals => match (&actual, &self.value) {
                (FieldValue::Text(text), Value::String(expected)) => **text == **expected,
                (FieldValue::Number(n), Value::Number(expected)) => expected.as_f64() == Some(*n),
                _ => false,
            },
            RuleOperator::Contains => self.compare_text(&actual, |hay, needle| hay.contains(needle)),
            RuleOperator::StartsWith => self.compare_text(&actual, |hay, needle| hay.starts_with(needle)),
            RuleOperator::EndsWith => self.compare_text(&actual, |hay, needle| hay.ends_with(needle)),
            RuleOperator::GreaterThan => field_number(&actual) > value_number(&self.value),
            RuleOperator::LessThan => field_number(&actual) < value_number(&self.value),
            RuleOperator::Between => {
                let (min, max) = match &self.value {
                    Value::Object(range) => (
                        range.get("min").map(value_number).unwrap_or(f64::NAN),
                        range.get("max").map(value_number).unwrap_or(f64::NAN),
                    ),
                    Value::Array(pair) if pair.len() == 2 => (value_number(&pair[0]), value_number(&pair[1])),
                    _ => return false,
                };
                let n = field_number(&actual);
                n >= min && n <= max
            }
        }
    }

    fn compare_text(&self, actual: &FieldValue<'_>, op: impl Fn(&str, &str) -> bool) -> bool {
        let Some(needle) = value_text(&self.value) else {
            return false;
        };
        let haystack = match actual {
            FieldValue::Text(text) => text.to_lowercase(),
            FieldValue::Number(n) => number_text(*n),
        };
        op(&haystack, &needle.to_lowercase())
    }
}

/// Whole numbers print without a fractional part so `year contains "199"` works.
fn number_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(number_text),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// NaN for anything non-numeric; every comparison against NaN is false.
fn field_number(value: &FieldValue<'_>) -> f64 {
    match value {
        FieldValue::Number(n) => *n,
        FieldValue::Text(text) => text.trim().parse().unwrap_or(f64::NAN),
    }
}

fn value_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

/// Combine rules under `match_type`. With no rules, `All` matches everything
/// and `Any` matches nothing.
pub fn evaluate(rules: &[Rule], match_type: MatchType, track: &Track) -> bool {
    match match_type {
        MatchType::All => rules.iter().all(|rule| rule.matches(track)),
        MatchType::Any => rules.iter().any(|rule| rule.matches(track)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartPlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub match_type: MatchType,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
}

impl SmartPlaylist {
    pub fn new(name: String, description: Option<String>, rules: Vec<Rule>, match_type: MatchType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            rules,
            match_type,
            date_created: now,
            date_modified: now,
        }
    }

    pub fn matches(&self, track: &Track) -> bool {
        evaluate(&self.rules, self.match_type, track)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartPlaylistPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub rules: Option<Vec<Rule>>,
    pub match_type: Option<MatchType>,
}

#[derive(Debug, Clone, Default)]
pub struct SmartPlaylistStore {
    playlists: Vec<SmartPlaylist>,
}

impl SmartPlaylistStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_playlists(playlists: Vec<SmartPlaylist>) -> Self {
        Self { playlists }
    }

    pub fn create(
        &mut self,
        name: String,
        description: Option<String>,
        rules: Vec<Rule>,
        match_type: MatchType,
    ) -> &SmartPlaylist {
        let playlist = SmartPlaylist::new(name, description, rules, match_type);
        info!("Created smart playlist '{}' with {} rules", playlist.name, playlist.rules.len());
        self.playlists.push(playlist);
        &self.playlists[self.playlists.len() - 1]
    }

    pub fn get(&self, id: &str) -> Result<&SmartPlaylist> {
        self.playlists
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| LibraryError::SmartPlaylistNotFound(id.to_string()))
    }

    pub fn update(&mut self, id: &str, patch: SmartPlaylistPatch) -> Result<&SmartPlaylist> {
        let playlist = self
            .playlists
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| LibraryError::SmartPlaylistNotFound(id.to_string()))?;

        if let Some(name) = patch.name {
            playlist.name = name;
        }
        if let Some(description) = patch.description {
            playlist.description = Some(description);
        }
        if let Some(rules) = patch.rules {
            playlist.rules = rules;
        }
        if let Some(match_type) = patch.match_type {
            playlist.match_type = match_type;
        }
        playlist.date_modified = Utc::now();
        Ok(&*playlist)
    }

    pub fn delete(&mut self, id: &str) -> Result<SmartPlaylist> {
        let pos = self
            .playlists
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| LibraryError::SmartPlaylistNotFound(id.to_string()))?;
        Ok(self.playlists.remove(pos))
    }

    pub fn all(&self) -> &[SmartPlaylist] {
        &self.playlists
    }

    pub fn len(&self) -> usize {
        self.playlists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playlists.is_empty()
    }
}
