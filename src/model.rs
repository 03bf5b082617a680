//! Normalized row models.
//!
//! These structures are the canonical tuple-set derived from one raw
//! activity record, shared by both write strategies. Every field maps onto
//! a column of the target schema; `Option` fields load as NULL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic shape derived from a record's location fields.
///
/// Exactly one of the two source representations wins: direct point
/// coordinates, or the first ring of a place bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeoShape {
    Point { x: f64, y: f64 },
    Polygon { ring: Vec<(f64, f64)> },
}

impl GeoShape {
    /// Render as WKT, suitable for `ST_GeomFromText`.
    #[must_use]
    pub fn to_wkt(&self) -> String {
        match self {
            Self::Point { x, y } => format!("POINT({x} {y})"),
            Self::Polygon { ring } => {
                let points = ring
                    .iter()
                    .map(|(x, y)| format!("{x} {y}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("POLYGON(({points}))")
            }
        }
    }
}

/// A fully hydrated row for the `users` relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    /// Creation time of the tweet that carried this profile snapshot.
    pub updated_at: Option<DateTime<Utc>>,
    pub screen_name: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    /// Profile URL as a raw string; the row strategy resolves it to a
    /// `urls` surrogate id before insert.
    pub url: Option<String>,
    pub description: Option<String>,
    pub protected: Option<bool>,
    pub verified: Option<bool>,
    pub friends_count: Option<i64>,
    pub listed_count: Option<i64>,
    pub favourites_count: Option<i64>,
    pub statuses_count: Option<i64>,
    pub withheld_in_countries: Option<Vec<String>>,
}

/// An id-first user row inserted so that a referencing row's foreign key
/// is satisfiable. A later full record for the same id hydrates it; the
/// stub never overwrites an existing row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubUser {
    pub id: i64,
    /// Known in batch mode only; the row strategy inserts the bare id.
    pub screen_name: Option<String>,
    pub name: Option<String>,
}

/// A media attachment: URL plus the service's media kind string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: String,
}

/// Row for the `tweets` relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetRow {
    pub id: i64,
    pub user_id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub in_reply_to_status_id: Option<i64>,
    pub in_reply_to_user_id: Option<i64>,
    pub quoted_status_id: Option<i64>,
    pub retweet_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub quote_count: Option<i64>,
    pub withheld_copyright: Option<bool>,
    pub withheld_in_countries: Option<Vec<String>>,
    pub source: Option<String>,
    /// Body text, preferring the untruncated extended form.
    pub text: String,
    pub country_code: Option<String>,
    pub state_code: Option<String>,
    pub lang: Option<String>,
    pub place_name: Option<String>,
    pub geo: Option<GeoShape>,
}

/// The canonical tuple-set derived from one raw record: the rows it
/// touches in every target relation.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub user: UserRow,
    pub tweet: TweetRow,
    /// Stub for the account being replied to, when the record is a reply.
    pub reply_stub: Option<StubUser>,
    /// One stub per mentioned account; the mention association rows are
    /// derived from these ids.
    pub mention_stubs: Vec<StubUser>,
    /// Expanded URLs referenced by the record body.
    pub urls: Vec<String>,
    /// `#`-prefixed hashtags followed by `$`-prefixed symbols.
    pub tags: Vec<String>,
    pub media: Vec<MediaRef>,
}

#[cfg(test)]
mod tests {
    use super::GeoShape;

    #[test]
    fn point_wkt() {
        let shape = GeoShape::Point { x: -122.4, y: 37.8 };
        assert_eq!(shape.to_wkt(), "POINT(-122.4 37.8)");
    }

    #[test]
    fn polygon_wkt_joins_ring_points() {
        let shape = GeoShape::Polygon {
            ring: vec![(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)],
        };
        assert_eq!(shape.to_wkt(), "POLYGON((0 0, 1 0, 1 1, 0 0))");
    }
}
