//! Flat fact and dimension records.
//!
//! Each record has an explicit constructor from a decoded [`Entry`]. Where an
//! entry and its media both carry a field, the entry wins whenever it has the
//! key, even when the value is null; the media value fills in only for a
//! missing key. `status` always comes from the media
//! (release status) and `watchStatus` always from the entry.

use serde::Serialize;
use serde_json::Value;

use super::fields::{Tag, Title, flatten_date};
use super::raw::{Entry, User};

/// A record type the flattener can build from one watch-list entry.
pub trait FromEntry: Sized + Serialize {
    /// Table the records of this model are written to.
    const TABLE: &'static str;

    fn from_entry(entry: Entry) -> Result<Self, String>;
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, String> {
    value.ok_or_else(|| format!("missing required field `{field}`"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactAnime {
    pub id: i64,
    pub user_id: i64,
    pub media_id: i64,
    pub average_score: Option<i64>,
    pub mean_score: Option<i64>,
    pub popularity: Option<i64>,
    pub trending: Option<i64>,
    pub favourites: Option<i64>,
    pub progress: Option<i64>,
    pub episodes: Option<i64>,
    pub score: Option<i64>,
    pub watch_status: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub stats: Option<Value>,
    pub rankings: Option<Value>,
}

impl FromEntry for FactAnime {
    const TABLE: &'static str = "fact_anime";

    fn from_entry(entry: Entry) -> Result<Self, String> {
        let media = entry.media;

        Ok(Self {
            id: match entry.id {
                Some(id) => id.ok_or_else(|| "field `id` is null".to_string())?,
                None => required(media.id, "id")?,
            },
            user_id: required(entry.user_id, "userId")?,
            media_id: required(entry.media_id, "mediaId")?,
            average_score: media.average_score,
            mean_score: media.mean_score,
            popularity: media.popularity,
            trending: media.trending,
            favourites: media.favourites,
            progress: entry.progress,
            episodes: media.episodes,
            score: entry.score,
            watch_status: entry.status,
            started_at: flatten_date(entry.started_at.as_ref())?,
            completed_at: flatten_date(entry.completed_at.as_ref())?,
            stats: media.stats,
            rankings: media.rankings,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionMedia {
    pub id: i64,
    pub genres: Vec<String>,
    pub description: Option<String>,
    pub cover_image: Option<String>,
    #[serde(rename = "type")]
    pub media_type: Option<String>,
    pub tags: Vec<Tag>,
    pub episodes: Option<i64>,
    pub format: Option<String>,
    pub season: Option<String>,
    pub season_year: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub synonyms: Vec<String>,
    pub title: Title,
    pub source: Option<String>,
    pub banner_image: Option<String>,
    pub site_url: Option<String>,
    pub status: Option<String>,
}

impl FromEntry for DimensionMedia {
    const TABLE: &'static str = "dimension_media";

    /// Keyed by media identity: `id` is the entry's `mediaId`.
    fn from_entry(entry: Entry) -> Result<Self, String> {
        let media = entry.media;

        Ok(Self {
            id: required(entry.media_id, "mediaId")?,
            genres: required(media.genres, "genres")?,
            description: media.description,
            cover_image: media.cover_image.into_url(),
            media_type: media.media_type,
            tags: required(media.tags, "tags")?,
            episodes: media.episodes,
            format: media.format,
            season: media.season,
            season_year: media.season_year,
            start_date: flatten_date(media.start_date.as_ref())?,
            end_date: flatten_date(media.end_date.as_ref())?,
            synonyms: required(media.synonyms, "synonyms")?,
            title: required(media.title, "title")?,
            source: media.source,
            banner_image: media.banner_image,
            site_url: media.site_url,
            status: media.status,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionUser {
    pub id: i64,
    pub name: String,
    pub avatar: Option<String>,
    pub banner_image: Option<String>,
    pub site_url: String,
    pub statistics: Value,
}

impl DimensionUser {
    pub const TABLE: &'static str = "dimension_user";

    pub fn from_user(user: User) -> Result<Self, String> {
        Ok(Self {
            id: required(user.id, "id")?,
            name: required(user.name, "name")?,
            avatar: user.avatar.into_url(),
            banner_image: user.banner_image,
            site_url: required(user.site_url, "siteUrl")?,
            statistics: user.statistics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(value: serde_json::Value) -> Entry {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_fact_takes_watch_status_from_entry() {
        let fact = FactAnime::from_entry(entry(json!({
            "id": 1, "userId": 42, "mediaId": 2, "status": "WATCHING",
            "media": {"id": 2, "status": "RELEASING", "averageScore": 50}
        })))
        .unwrap();

        assert_eq!(fact.id, 1);
        assert_eq!(fact.watch_status.as_deref(), Some("WATCHING"));
        assert_eq!(fact.average_score, Some(50));

        let serialized = serde_json::to_value(&fact).unwrap();
        assert!(serialized.get("status").is_none());
    }

    #[test]
    fn test_fact_id_falls_back_to_media() {
        let fact = FactAnime::from_entry(entry(json!({
            "userId": 42, "mediaId": 2, "media": {"id": 7}
        })))
        .unwrap();
        assert_eq!(fact.id, 7);
    }

    #[test]
    fn test_fact_null_entry_id_is_not_replaced_by_media_id() {
        let err = FactAnime::from_entry(entry(json!({
            "id": null, "userId": 42, "mediaId": 2, "media": {"id": 2}
        })))
        .unwrap_err();
        assert!(err.contains("`id` is null"));
    }

    #[test]
    fn test_fact_without_any_id_is_rejected() {
        let err = FactAnime::from_entry(entry(json!({
            "userId": 42, "mediaId": 2, "media": {}
        })))
        .unwrap_err();
        assert!(err.contains("`id`"));
    }

    #[test]
    fn test_dimension_media_is_keyed_by_media_id() {
        let dim = DimensionMedia::from_entry(entry(json!({
            "id": 1, "mediaId": 2, "status": "WATCHING",
            "media": {
                "id": 99, "status": "FINISHED", "genres": ["Drama"], "tags": [],
                "synonyms": [], "title": {"romaji": "Mushishi"},
                "coverImage": {"large": "cover.png"}
            }
        })))
        .unwrap();

        assert_eq!(dim.id, 2);
        assert_eq!(dim.status.as_deref(), Some("FINISHED"));
        assert_eq!(dim.cover_image.as_deref(), Some("cover.png"));
    }

    #[test]
    fn test_dimension_user_flattens_avatar() {
        let user: User = serde_json::from_value(json!({
            "id": 42, "name": "test_user", "avatar": {"large": "avatar.png"},
            "siteUrl": "https://anilist.co/user/test_user", "statistics": {}
        }))
        .unwrap();

        let dim = DimensionUser::from_user(user).unwrap();
        assert_eq!(dim.avatar.as_deref(), Some("avatar.png"));
        assert_eq!(dim.banner_image, None);
    }
}
