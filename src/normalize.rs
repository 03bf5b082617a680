//! Record normalization.
//!
//! Turns one raw activity record into the canonical set of relation rows
//! ([`NormalizedRecord`]). Both write strategies share this single pure
//! function; the only knob is the NUL policy, because the batch path keeps
//! a denormalized copy of the record that must remain reconstructible.
//!
//! Field resolution follows the service's truncation quirks: the extended
//! body and each extended entity container shadow their legacy
//! counterparts independently, and geo data arrives in one of two
//! mutually exclusive shapes (direct point coordinates, or a place
//! bounding box the loader closes into a polygon ring).

use crate::error::{LoadError, Result};
use crate::model::{GeoShape, MediaRef, NormalizedRecord, StubUser, TweetRow, UserRow};
use crate::record::{EntityKind, RawRecord};
use crate::sanitize::NulPolicy;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Parse the service's timestamp format: `Wed Oct 10 20:19:24 +0000 2018`.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%a %b %d %H:%M:%S %z %Y")
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse one JSON line and normalize it.
///
/// # Errors
///
/// Returns [`LoadError::MalformedRecord`] when the line is not valid JSON,
/// and whatever [`normalize`] raises beyond that.
pub fn normalize_line(line: &str, policy: NulPolicy) -> Result<NormalizedRecord> {
    let value: Value =
        serde_json::from_str(line).map_err(|e| LoadError::malformed(e.to_string()))?;
    normalize(value, policy)
}

/// Normalize one raw record into the rows it contributes to every
/// relation.
///
/// # Errors
///
/// Returns [`LoadError::MissingField`] when the record id, author id, body
/// text, or a required entity attribute is absent. Everything else
/// degrades to NULL.
pub fn normalize(value: Value, policy: NulPolicy) -> Result<NormalizedRecord> {
    if !value.is_object() {
        return Err(LoadError::malformed("record is not a JSON object"));
    }
    let record = RawRecord::new(value, policy);

    let tweet_id = record.i64_at(&["id"]).ok_or(LoadError::missing("id"))?;
    let user_id = record
        .i64_at(&["user", "id"])
        .ok_or(LoadError::missing("user.id"))?;
    let text = record
        .string_at(&["extended_tweet", "full_text"])
        .or_else(|| record.string_at(&["text"]))
        .ok_or(LoadError::missing("text"))?;
    let created_at = record.str_at(&["created_at"]).and_then(parse_timestamp);

    let user = UserRow {
        id: user_id,
        created_at: record
            .str_at(&["user", "created_at"])
            .and_then(parse_timestamp),
        updated_at: created_at,
        screen_name: record.string_at(&["user", "screen_name"]),
        name: record.string_at(&["user", "name"]),
        location: record.string_at(&["user", "location"]),
        url: record.string_at(&["user", "url"]),
        description: record.string_at(&["user", "description"]),
        protected: record.bool_at(&["user", "protected"]),
        verified: record.bool_at(&["user", "verified"]),
        friends_count: record.i64_at(&["user", "friends_count"]),
        listed_count: record.i64_at(&["user", "listed_count"]),
        favourites_count: record.i64_at(&["user", "favourites_count"]),
        statuses_count: record.i64_at(&["user", "statuses_count"]),
        withheld_in_countries: record.string_list_at(&["user", "withheld_in_countries"]),
    };

    let country_code = record
        .str_at(&["place", "country_code"])
        .map(str::to_lowercase);
    let place_name = record.string_at(&["place", "full_name"]);
    let state_code = derive_state_code(country_code.as_deref(), place_name.as_deref());

    let reply_stub = record.i64_at(&["in_reply_to_user_id"]).map(|id| StubUser {
        id,
        screen_name: record.string_at(&["in_reply_to_screen_name"]),
        name: None,
    });

    let tweet = TweetRow {
        id: tweet_id,
        user_id,
        created_at,
        in_reply_to_status_id: record.i64_at(&["in_reply_to_status_id"]),
        in_reply_to_user_id: record.i64_at(&["in_reply_to_user_id"]),
        quoted_status_id: record.i64_at(&["quoted_status_id"]),
        retweet_count: record.i64_at(&["retweet_count"]),
        favorite_count: record.i64_at(&["favorite_count"]),
        quote_count: record.i64_at(&["quote_count"]),
        withheld_copyright: record.bool_at(&["withheld_copyright"]),
        withheld_in_countries: record.string_list_at(&["withheld_in_countries"]),
        source: record.string_at(&["source"]),
        text,
        country_code,
        state_code,
        lang: record.string_at(&["lang"]),
        place_name,
        geo: derive_geo(&record),
    };

    let urls = record
        .entities(EntityKind::Urls)
        .iter()
        .map(|u| {
            u.get("expanded_url")
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or(LoadError::missing("entities.urls.expanded_url"))
        })
        .collect::<Result<Vec<_>>>()?;

    let mention_stubs = record
        .entities(EntityKind::Mentions)
        .iter()
        .map(|m| {
            let id = m
                .get("id")
                .and_then(Value::as_i64)
                .ok_or(LoadError::missing("entities.user_mentions.id"))?;
            Ok(StubUser {
                id,
                screen_name: m.get("screen_name").and_then(Value::as_str).map(String::from),
                name: m.get("name").and_then(Value::as_str).map(String::from),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut tags = Vec::new();
    for hashtag in record.entities(EntityKind::Hashtags) {
        let text = hashtag
            .get("text")
            .and_then(Value::as_str)
            .ok_or(LoadError::missing("entities.hashtags.text"))?;
        tags.push(format!("#{text}"));
    }
    for symbol in record.entities(EntityKind::Symbols) {
        let text = symbol
            .get("text")
            .and_then(Value::as_str)
            .ok_or(LoadError::missing("entities.symbols.text"))?;
        tags.push(format!("${text}"));
    }

    let media = record
        .entities(EntityKind::Media)
        .iter()
        .map(|m| {
            let url = m
                .get("media_url")
                .and_then(Value::as_str)
                .ok_or(LoadError::missing("extended_entities.media.media_url"))?;
            let kind = m
                .get("type")
                .and_then(Value::as_str)
                .ok_or(LoadError::missing("extended_entities.media.type"))?;
            Ok(MediaRef {
                url: url.to_string(),
                kind: kind.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NormalizedRecord {
        user,
        tweet,
        reply_stub,
        mention_stubs,
        urls,
        tags,
        media,
    })
}

/// Derive the record's location: direct point coordinates win over the
/// place bounding box; neither yields no location.
fn derive_geo(record: &RawRecord) -> Option<GeoShape> {
    derive_point(record).or_else(|| derive_polygon(record))
}

fn derive_point(record: &RawRecord) -> Option<GeoShape> {
    let coords = record.array_at(&["geo", "coordinates"])?;
    let x = coords.first()?.as_f64()?;
    let y = coords.get(1)?.as_f64()?;
    Some(GeoShape::Point { x, y })
}

fn derive_polygon(record: &RawRecord) -> Option<GeoShape> {
    let rings = record.array_at(&["place", "bounding_box", "coordinates"])?;
    let outer = rings.first()?.as_array()?;
    let mut ring: Vec<(f64, f64)> = outer
        .iter()
        .filter_map(|point| {
            let point = point.as_array()?;
            Some((point.first()?.as_f64()?, point.get(1)?.as_f64()?))
        })
        .collect();
    if ring.is_empty() {
        return None;
    }
    // Bounding boxes arrive as open rings; WKT wants them closed.
    if ring.first() != ring.last() {
        ring.push(ring[0]);
    }
    Some(GeoShape::Polygon { ring })
}

/// The service names US places `City, ST`; treat a short trailing
/// component as a state code. This is a convention heuristic, not an
/// address parser, and it only applies inside the US.
fn derive_state_code(country_code: Option<&str>, place_name: Option<&str>) -> Option<String> {
    if country_code != Some("us") {
        return None;
    }
    let tail = place_name?.rsplit(',').next()?.trim().to_lowercase();
    (tail.chars().count() <= 2).then_some(tail)
}

#[cfg(test)]
mod tests {
    use super::{normalize, normalize_line};
    use crate::error::LoadError;
    use crate::model::GeoShape;
    use crate::sanitize::NulPolicy;
    use serde_json::{Value, json};

    fn minimal_record() -> Value {
        json!({
            "id": 100,
            "text": "hello",
            "created_at": "Wed Oct 10 20:19:24 +0000 2018",
            "user": {"id": 7, "screen_name": "alice"},
            "entities": {"urls": [], "user_mentions": [], "hashtags": [], "symbols": []},
        })
    }

    fn normalized(value: Value) -> crate::model::NormalizedRecord {
        normalize(value, NulPolicy::Strip).expect("record should normalize")
    }

    #[test]
    fn minimal_record_normalizes() {
        let r = normalized(minimal_record());
        assert_eq!(r.tweet.id, 100);
        assert_eq!(r.tweet.user_id, 7);
        assert_eq!(r.user.id, 7);
        assert_eq!(r.tweet.text, "hello");
        assert_eq!(r.user.updated_at, r.tweet.created_at);
        assert!(r.tweet.created_at.is_some());
        assert!(r.reply_stub.is_none());
        assert!(r.tweet.geo.is_none());
        assert!(r.urls.is_empty() && r.tags.is_empty() && r.media.is_empty());
    }

    #[test]
    fn missing_required_fields_fail() {
        let mut no_id = minimal_record();
        no_id.as_object_mut().unwrap().remove("id");
        assert!(matches!(
            normalize(no_id, NulPolicy::Strip),
            Err(LoadError::MissingField { field: "id" })
        ));

        let mut no_user = minimal_record();
        no_user.as_object_mut().unwrap().remove("user");
        assert!(matches!(
            normalize(no_user, NulPolicy::Strip),
            Err(LoadError::MissingField { field: "user.id" })
        ));

        let mut no_text = minimal_record();
        no_text.as_object_mut().unwrap().remove("text");
        assert!(matches!(
            normalize(no_text, NulPolicy::Strip),
            Err(LoadError::MissingField { field: "text" })
        ));
    }

    #[test]
    fn extended_text_wins_over_truncated() {
        let mut value = minimal_record();
        value["extended_tweet"] = json!({"full_text": "hello, at full length"});
        assert_eq!(normalized(value).tweet.text, "hello, at full length");

        // Without the extended form the legacy body stands.
        assert_eq!(normalized(minimal_record()).tweet.text, "hello");
    }

    #[test]
    fn extended_containers_resolve_per_type() {
        let mut value = minimal_record();
        value["entities"] = json!({
            "urls": [{"expanded_url": "https://example.com/a"}],
            "user_mentions": [],
            "hashtags": [{"text": "stale"}],
            "symbols": [],
        });
        value["extended_tweet"] = json!({
            "full_text": "longer",
            "entities": {"hashtags": [{"text": "fresh"}, {"text": "extra"}]},
        });

        let r = normalized(value);
        assert_eq!(r.tags, vec!["#fresh", "#extra"]);
        assert_eq!(r.urls, vec!["https://example.com/a"]);
    }

    #[test]
    fn point_coordinates_win_and_carry_no_place_codes() {
        let mut value = minimal_record();
        value["geo"] = json!({"coordinates": [-122.4, 37.8]});
        let r = normalized(value);
        assert_eq!(r.tweet.geo, Some(GeoShape::Point { x: -122.4, y: 37.8 }));
        assert!(r.tweet.country_code.is_none());
        assert!(r.tweet.state_code.is_none());
    }

    #[test]
    fn bounding_box_closes_into_polygon_with_place_codes() {
        let mut value = minimal_record();
        value["place"] = json!({
            "full_name": "San Francisco, CA",
            "country_code": "US",
            "bounding_box": {"coordinates": [[
                [-122.5, 37.7], [-122.5, 37.9], [-122.3, 37.9], [-122.3, 37.7],
            ]]},
        });

        let r = normalized(value);
        match r.tweet.geo.expect("polygon expected") {
            GeoShape::Polygon { ring } => {
                assert_eq!(ring.len(), 5);
                assert_eq!(ring.first(), ring.last());
            }
            GeoShape::Point { .. } => panic!("expected a polygon"),
        }
        assert_eq!(r.tweet.country_code.as_deref(), Some("us"));
        assert_eq!(r.tweet.state_code.as_deref(), Some("ca"));
        assert_eq!(r.tweet.place_name.as_deref(), Some("San Francisco, CA"));
    }

    #[test]
    fn already_closed_ring_is_left_alone() {
        let mut value = minimal_record();
        value["place"] = json!({
            "full_name": "Somewhere",
            "country_code": "GB",
            "bounding_box": {"coordinates": [[
                [0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0],
            ]]},
        });
        let r = normalized(value);
        match r.tweet.geo.unwrap() {
            GeoShape::Polygon { ring } => assert_eq!(ring.len(), 4),
            GeoShape::Point { .. } => panic!("expected a polygon"),
        }
        assert!(r.tweet.state_code.is_none());
    }

    #[test]
    fn state_code_requires_us_and_short_suffix() {
        let mut value = minimal_record();
        value["place"] = json!({"full_name": "Seattle, Washington", "country_code": "US"});
        assert!(normalized(value).tweet.state_code.is_none());

        let mut value = minimal_record();
        value["place"] = json!({"full_name": "Paris, FR", "country_code": "FR"});
        assert!(normalized(value).tweet.state_code.is_none());
    }

    #[test]
    fn reply_emits_stub_with_screen_name() {
        let mut value = minimal_record();
        value["in_reply_to_user_id"] = json!(42);
        value["in_reply_to_status_id"] = json!(99);
        value["in_reply_to_screen_name"] = json!("bob");

        let r = normalized(value);
        let stub = r.reply_stub.expect("reply stub expected");
        assert_eq!(stub.id, 42);
        assert_eq!(stub.screen_name.as_deref(), Some("bob"));
        assert_eq!(r.tweet.in_reply_to_status_id, Some(99));
    }

    #[test]
    fn mentions_emit_stubs() {
        let mut value = minimal_record();
        value["entities"]["user_mentions"] = json!([
            {"id": 1, "screen_name": "x", "name": "X"},
            {"id": 2, "screen_name": "y", "name": "Y"},
        ]);
        let r = normalized(value);
        assert_eq!(r.mention_stubs.len(), 2);
        assert_eq!(r.mention_stubs[0].id, 1);
        assert_eq!(r.mention_stubs[1].screen_name.as_deref(), Some("y"));
    }

    #[test]
    fn tags_concatenate_hashtags_then_symbols() {
        let mut value = minimal_record();
        value["entities"]["hashtags"] = json!([{"text": "rustlang"}]);
        value["entities"]["symbols"] = json!([{"text": "GME"}]);
        assert_eq!(normalized(value).tags, vec!["#rustlang", "$GME"]);
    }

    #[test]
    fn media_carries_kind() {
        let mut value = minimal_record();
        value["extended_entities"] = json!({
            "media": [{"media_url": "https://img.example/1.jpg", "type": "photo"}],
        });
        let r = normalized(value);
        assert_eq!(r.media.len(), 1);
        assert_eq!(r.media[0].kind, "photo");
    }

    #[test]
    fn nul_policy_flows_into_text() {
        let mut value = minimal_record();
        value["text"] = json!("a\u{0}b");

        let stripped = normalize(value.clone(), NulPolicy::Strip).unwrap();
        assert_eq!(stripped.tweet.text, "ab");

        let escaped = normalize(value, NulPolicy::Escape).unwrap();
        assert_eq!(escaped.tweet.text, "a\\x00b");
    }

    #[test]
    fn normalize_line_rejects_garbage() {
        assert!(matches!(
            normalize_line("not json", NulPolicy::Strip),
            Err(LoadError::MalformedRecord { .. })
        ));
        assert!(matches!(
            normalize_line("[1, 2]", NulPolicy::Strip),
            Err(LoadError::MalformedRecord { .. })
        ));
    }

    #[test]
    fn unparseable_timestamp_degrades_to_null() {
        let mut value = minimal_record();
        value["created_at"] = json!("not a date");
        let r = normalized(value);
        assert!(r.tweet.created_at.is_none());
        assert!(r.user.updated_at.is_none());
    }
}
