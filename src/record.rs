//! Typed access into raw activity-record JSON.
//!
//! Source records are duck-typed: fields appear or vanish depending on
//! whether the text was truncated, whether the record is a reply, and
//! whether geo data exists. [`RawRecord`] wraps a sanitized
//! `serde_json::Value` and turns each nested optional lookup into one
//! explicit accessor call, with JSON `null` treated the same as an absent
//! field throughout (the source emits `"geo": null` far more often than it
//! omits the key).
//!
//! The extended-vs-default container shadowing is captured once in
//! [`EntityKind`] rather than as per-type branches: when a record's text
//! overflows the legacy length limit, the service moves each entity list
//! independently under `extended_tweet`, and the default list is then
//! truncated and must be ignored for that one type only.

use crate::sanitize::{NulPolicy, sanitize_value};
use serde_json::Value;

/// The five entity containers that may appear in either the default or the
/// extended location, independently of one another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Urls,
    Mentions,
    Hashtags,
    Symbols,
    Media,
}

impl EntityKind {
    /// Path of the non-truncated container.
    const fn extended_path(self) -> &'static [&'static str] {
        match self {
            Self::Urls => &["extended_tweet", "entities", "urls"],
            Self::Mentions => &["extended_tweet", "entities", "user_mentions"],
            Self::Hashtags => &["extended_tweet", "entities", "hashtags"],
            Self::Symbols => &["extended_tweet", "entities", "symbols"],
            Self::Media => &["extended_tweet", "extended_entities", "media"],
        }
    }

    /// Path of the legacy container, possibly truncated.
    const fn default_path(self) -> &'static [&'static str] {
        match self {
            Self::Urls => &["entities", "urls"],
            Self::Mentions => &["entities", "user_mentions"],
            Self::Hashtags => &["entities", "hashtags"],
            Self::Symbols => &["entities", "symbols"],
            Self::Media => &["extended_entities", "media"],
        }
    }
}

/// A sanitized raw record with optional-field accessors.
#[derive(Debug, Clone)]
pub struct RawRecord {
    value: Value,
}

impl RawRecord {
    /// Wrap a raw record value, sanitizing every string leaf per `policy`.
    #[must_use]
    pub fn new(mut value: Value, policy: NulPolicy) -> Self {
        sanitize_value(&mut value, policy);
        Self { value }
    }

    /// Walk `path` through nested objects; `null` counts as absent.
    #[must_use]
    pub fn get(&self, path: &[&str]) -> Option<&Value> {
        path.iter()
            .try_fold(&self.value, |value, key| value.get(key))
            .filter(|value| !value.is_null())
    }

    #[must_use]
    pub fn str_at(&self, path: &[&str]) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    #[must_use]
    pub fn string_at(&self, path: &[&str]) -> Option<String> {
        self.str_at(path).map(String::from)
    }

    #[must_use]
    pub fn i64_at(&self, path: &[&str]) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    #[must_use]
    pub fn bool_at(&self, path: &[&str]) -> Option<bool> {
        self.get(path).and_then(Value::as_bool)
    }

    #[must_use]
    pub fn array_at(&self, path: &[&str]) -> Option<&[Value]> {
        self.get(path).and_then(Value::as_array).map(Vec::as_slice)
    }

    /// A list of strings, e.g. withheld jurisdiction codes.
    #[must_use]
    pub fn string_list_at(&self, path: &[&str]) -> Option<Vec<String>> {
        self.array_at(path).map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
    }

    /// Items of one entity container, preferring the extended location when
    /// that container is present (even empty), else falling back to the
    /// default. Each kind resolves independently.
    #[must_use]
    pub fn entities(&self, kind: EntityKind) -> &[Value] {
        self.array_at(kind.extended_path())
            .or_else(|| self.array_at(kind.default_path()))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::{EntityKind, RawRecord};
    use crate::sanitize::NulPolicy;
    use serde_json::json;

    fn record(value: serde_json::Value) -> RawRecord {
        RawRecord::new(value, NulPolicy::Strip)
    }

    #[test]
    fn null_counts_as_absent() {
        let r = record(json!({"geo": null, "lang": "en", "user": {"url": null}}));
        assert!(r.get(&["geo"]).is_none());
        assert!(r.get(&["geo", "coordinates"]).is_none());
        assert!(r.str_at(&["user", "url"]).is_none());
        assert_eq!(r.str_at(&["lang"]), Some("en"));
    }

    #[test]
    fn deep_paths_resolve() {
        let r = record(json!({"a": {"b": {"c": 42}}}));
        assert_eq!(r.i64_at(&["a", "b", "c"]), Some(42));
        assert!(r.i64_at(&["a", "b", "missing"]).is_none());
        assert!(r.i64_at(&["a", "b", "c", "deeper"]).is_none());
    }

    #[test]
    fn entity_kinds_fall_back_independently() {
        let r = record(json!({
            "entities": {
                "urls": [{"expanded_url": "https://example.com"}],
                "hashtags": [{"text": "short"}],
            },
            "extended_tweet": {
                "entities": {
                    "hashtags": [{"text": "long"}, {"text": "tail"}],
                },
            },
        }));

        // Hashtags use the extended container, urls the default, in the
        // same record.
        assert_eq!(r.entities(EntityKind::Hashtags).len(), 2);
        assert_eq!(
            r.entities(EntityKind::Hashtags)[0]["text"],
            json!("long")
        );
        assert_eq!(r.entities(EntityKind::Urls).len(), 1);
        assert!(r.entities(EntityKind::Symbols).is_empty());
    }

    #[test]
    fn empty_extended_container_still_wins() {
        let r = record(json!({
            "entities": {"urls": [{"expanded_url": "https://stale.example"}]},
            "extended_tweet": {"entities": {"urls": []}},
        }));
        assert!(r.entities(EntityKind::Urls).is_empty());
    }

    #[test]
    fn media_lives_under_extended_entities() {
        let r = record(json!({
            "extended_entities": {"media": [{"media_url": "https://img", "type": "photo"}]},
        }));
        assert_eq!(r.entities(EntityKind::Media).len(), 1);

        let r = record(json!({
            "extended_entities": {"media": [{"media_url": "https://old", "type": "photo"}]},
            "extended_tweet": {
                "extended_entities": {"media": [
                    {"media_url": "https://new", "type": "video"},
                ]},
            },
        }));
        assert_eq!(r.entities(EntityKind::Media)[0]["media_url"], json!("https://new"));
    }

    #[test]
    fn string_list_collects_codes() {
        let r = record(json!({"user": {"withheld_in_countries": ["DE", "FR"]}}));
        assert_eq!(
            r.string_list_at(&["user", "withheld_in_countries"]),
            Some(vec!["DE".to_string(), "FR".to_string()])
        );
        assert!(r.string_list_at(&["withheld_in_countries"]).is_none());
    }
}
