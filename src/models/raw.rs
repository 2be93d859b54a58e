//! Shape of the AniList `MediaListCollection` + `User` response.
//!
//! Only the envelope is typed strictly here. Entries stay as raw JSON until
//! they are decoded one at a time by the flattener, so a single malformed entry
//! cannot reject the whole payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::fields::{FuzzyDate, ImageChoice, Tag, Title, lenient_int, present_int};

#[derive(Debug, Clone, Deserialize)]
pub struct RawPayload {
    pub data: RawData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawData {
    #[serde(rename = "MediaListCollection")]
    pub media_list_collection: MediaListCollection,
    #[serde(rename = "User")]
    pub user: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaListCollection {
    pub lists: Vec<MediaList>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaList {
    pub name: Option<String>,
    pub status: Option<String>,
    pub entries: Vec<Value>,
}

impl RawPayload {
    pub fn from_value(raw: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(raw)
    }

    /// Entries in source order, paired with their `(list, entry)` position.
    pub fn entries(&self) -> impl Iterator<Item = ((usize, usize), &Value)> {
        self.data
            .media_list_collection
            .lists
            .iter()
            .enumerate()
            .flat_map(|(list_idx, list)| {
                list.entries
                    .iter()
                    .enumerate()
                    .map(move |(entry_idx, entry)| ((list_idx, entry_idx), entry))
            })
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.data
            .media_list_collection
            .lists
            .iter()
            .map(|l| l.entries.len())
            .sum()
    }
}

/// One watch-list entry with its media decoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// `None` when the key is missing, `Some(None)` when it is `null`.
    #[serde(default, deserialize_with = "present_int")]
    pub id: Option<Option<i64>>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub user_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub media_id: Option<i64>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub progress: Option<i64>,
    pub started_at: Option<FuzzyDate>,
    pub completed_at: Option<FuzzyDate>,
    pub media: Media,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    #[serde(default, deserialize_with = "lenient_int")]
    pub id: Option<i64>,
    pub genres: Option<Vec<String>>,
    pub description: Option<String>,
    pub title: Option<Title>,
    #[serde(default)]
    pub cover_image: ImageChoice,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub average_score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub mean_score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub popularity: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub trending: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub favourites: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub episodes: Option<i64>,
    pub tags: Option<Vec<Tag>>,
    pub format: Option<String>,
    pub season: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub season_year: Option<i64>,
    pub start_date: Option<FuzzyDate>,
    pub end_date: Option<FuzzyDate>,
    pub synonyms: Option<Vec<String>>,
    pub source: Option<String>,
    pub banner_image: Option<String>,
    pub site_url: Option<String>,
    pub stats: Option<Value>,
    pub rankings: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, deserialize_with = "lenient_int")]
    pub id: Option<i64>,
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: ImageChoice,
    pub banner_image: Option<String>,
    pub site_url: Option<String>,
    #[serde(default)]
    pub statistics: Value,
}
