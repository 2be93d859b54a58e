//! Nested AniList field groups and the rules that flatten them into scalars.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// Accepts JSON integers, integral floats and numeric strings.
///
/// `null` and a missing key both decode to `None`; a fractional number or a
/// non-numeric string is a decode error.
pub fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
    }

    let Some(raw) = Option::<Raw>::deserialize(deserializer)? else {
        return Ok(None);
    };

    match raw {
        Raw::Int(n) => Ok(Some(n)),
        #[allow(clippy::cast_possible_truncation)]
        Raw::Float(f) if f.fract() == 0.0 && f.is_finite() => Ok(Some(f as i64)),
        Raw::Float(f) => Err(serde::de::Error::custom(format!(
            "expected an integer, found {f}"
        ))),
        Raw::Text(s) => s.trim().parse::<i64>().map(Some).map_err(|_| {
            serde::de::Error::custom(format!("expected an integer, found \"{s}\""))
        }),
    }
}

/// Wraps a present value in `Some` so `Option<Option<T>>` can tell a key set to
/// `null` apart from a key that is missing.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// [`lenient_int`] for a key whose explicit `null` must stay distinguishable
/// from its absence: missing is `None`, `null` is `Some(None)`.
pub fn present_int<'de, D>(deserializer: D) -> Result<Option<Option<i64>>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient_int(deserializer).map(Some)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ImageSet {
    #[serde(rename = "extraLarge", default, deserialize_with = "present")]
    extra_large: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    large: Option<Option<String>>,
}

/// An AniList image group reduced to the variant that wins.
///
/// `extraLarge` wins whenever the key is present, even when its value is null.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageChoice {
    ExtraLarge(Option<String>),
    Large(Option<String>),
    #[default]
    Absent,
}

impl ImageChoice {
    #[must_use]
    pub fn into_url(self) -> Option<String> {
        match self {
            Self::ExtraLarge(url) | Self::Large(url) => url,
            Self::Absent => None,
        }
    }
}

impl From<ImageSet> for ImageChoice {
    fn from(set: ImageSet) -> Self {
        match (set.extra_large, set.large) {
            (Some(url), _) => Self::ExtraLarge(url),
            (None, Some(url)) => Self::Large(url),
            (None, None) => Self::Absent,
        }
    }
}

impl<'de> Deserialize<'de> for ImageChoice {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<ImageSet>::deserialize(deserializer)?
            .map(Self::from)
            .unwrap_or_default())
    }
}

/// `{year, month, day}` as AniList reports it, any component possibly missing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuzzyDate {
    #[serde(default, deserialize_with = "lenient_int")]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub month: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub day: Option<i64>,
}

impl FuzzyDate {
    /// All-or-nothing: a missing or zero component yields `Ok(None)`. A complete
    /// date that does not exist on the calendar is an error.
    pub fn to_iso(&self) -> Result<Option<String>, String> {
        let (Some(year), Some(month), Some(day)) = (self.year, self.month, self.day) else {
            return Ok(None);
        };
        if year == 0 || month == 0 || day == 0 {
            return Ok(None);
        }

        let date = i32::try_from(year)
            .ok()
            .zip(u32::try_from(month).ok())
            .zip(u32::try_from(day).ok())
            .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
            .ok_or_else(|| format!("invalid date {year}-{month}-{day}"))?;

        Ok(Some(date.format("%Y-%m-%d").to_string()))
    }
}

/// Flattens an optional date group; see [`FuzzyDate::to_iso`].
pub fn flatten_date(date: Option<&FuzzyDate>) -> Result<Option<String>, String> {
    date.map_or(Ok(None), FuzzyDate::to_iso)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub category: Option<String>,
    pub description: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub rank: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Title {
    pub english: Option<String>,
    pub native: Option<String>,
    pub romaji: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn image(value: serde_json::Value) -> Option<String> {
        serde_json::from_value::<ImageChoice>(value)
            .unwrap()
            .into_url()
    }

    fn date(value: serde_json::Value) -> Result<Option<String>, String> {
        serde_json::from_value::<FuzzyDate>(value).unwrap().to_iso()
    }

    #[test]
    fn test_image_prefers_extra_large() {
        assert_eq!(
            image(json!({"extraLarge": "x", "large": "y"})),
            Some("x".to_string())
        );
        assert_eq!(image(json!({"large": "y"})), Some("y".to_string()));
        assert_eq!(image(json!({})), None);
        assert_eq!(image(serde_json::Value::Null), None);
    }

    #[test]
    fn test_image_present_null_still_wins() {
        let choice: ImageChoice =
            serde_json::from_value(json!({"extraLarge": null, "large": "y"})).unwrap();
        assert_eq!(choice, ImageChoice::ExtraLarge(None));
    }

    #[test]
    fn test_date_all_or_nothing() {
        assert_eq!(
            date(json!({"year": 2024, "month": 1, "day": 15})),
            Ok(Some("2024-01-15".to_string()))
        );
        assert_eq!(date(json!({"year": 2024, "month": null, "day": 15})), Ok(None));
        assert_eq!(date(json!({"year": 2024, "month": 0, "day": 15})), Ok(None));
        assert_eq!(date(json!({})), Ok(None));
        assert_eq!(flatten_date(None), Ok(None));
    }

    #[test]
    fn test_date_rejects_impossible_day() {
        assert!(date(json!({"year": 2024, "month": 2, "day": 30})).is_err());
    }

    #[test]
    fn test_lenient_int_coercion() {
        let parsed: FuzzyDate =
            serde_json::from_value(json!({"year": "2024", "month": 3.0, "day": 9})).unwrap();
        assert_eq!(parsed.year, Some(2024));
        assert_eq!(parsed.month, Some(3));

        assert!(serde_json::from_value::<FuzzyDate>(json!({"year": 20.5})).is_err());
        assert!(serde_json::from_value::<FuzzyDate>(json!({"year": "soon"})).is_err());
    }
}
