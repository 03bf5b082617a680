//! Postgres storage layer.
//!
//! All writes are insert-only and conflict-tolerant: every statement ends
//! in `ON CONFLICT DO NOTHING`, so repeated runs over overlapping input
//! (or several loaders racing on the same archives) are absorbed by the
//! store's uniqueness constraints rather than coordinated up front. No row
//! is ever updated or deleted here.
//!
//! Two write strategies share the normalized row models:
//!
//! - [`Storage::insert_record`] — one record per transaction, with an
//!   existence pre-check for cheap re-runs and inline URL surrogate
//!   resolution through the `urls` relation.
//! - [`Storage::insert_batch`] — one batch per transaction, grouped
//!   multi-row inserts with no pre-check; URL strings are written raw and
//!   surrogate resolution is left to the store's own referential step.
//!
//! Expected relations (constraints supplied by the store, not created
//! here):
//!
//! ```sql
//! users          (id_users PRIMARY KEY, created_at, updated_at, url,
//!                 friends_count, listed_count, favourites_count,
//!                 statuses_count, protected, verified, screen_name, name,
//!                 location, description, withheld_in_countries TEXT[])
//! tweets         (id_tweets PRIMARY KEY, id_users, created_at,
//!                 in_reply_to_status_id, in_reply_to_user_id,
//!                 quoted_status_id, retweet_count, favorite_count,
//!                 quote_count, withheld_copyright,
//!                 withheld_in_countries TEXT[], source, text,
//!                 country_code, state_code, lang, place_name,
//!                 geo GEOMETRY)
//! urls           (id_urls BIGSERIAL PRIMARY KEY, url UNIQUE)
//! tweet_urls     (id_tweets, id_urls)       -- unique pair
//! tweet_mentions (id_tweets, id_users)      -- unique pair
//! tweet_tags     (id_tweets, tag)           -- unique pair
//! tweet_media    (id_tweets, id_urls, type) -- unique (id_tweets, id_urls)
//! ```

use crate::batch::BatchRows;
use crate::error::{LoadError, Result};
use crate::model::{GeoShape, NormalizedRecord, StubUser, TweetRow, UserRow};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Hard Postgres limit on bind parameters per statement. Grouped inserts
/// are sub-chunked so one statement never crosses it.
const PG_MAX_BINDS: usize = 65_535;

const USER_BINDS: usize = 15;
const TWEET_BINDS: usize = 18;

/// Postgres-backed storage for normalized records.
pub struct Storage {
    pool: PgPool,
}

impl Storage {
    /// Connect to the database behind `database_url`.
    ///
    /// The pool is capped at one connection: each run is a single logical
    /// writer, and cross-run safety comes from the store's constraints.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL is invalid or the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options =
            PgConnectOptions::from_str(database_url)?.application_name(env!("CARGO_PKG_NAME"));
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await?;
        info!("connected to database");
        Ok(Self { pool })
    }

    /// Wrap an existing pool (for callers that manage their own).
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Whether a tweet row with this id already exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the query fails.
    pub async fn tweet_exists(&self, id: i64) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id_tweets FROM tweets WHERE id_tweets = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Resolve a URL string to its `urls` surrogate id, inserting it when
    /// absent.
    ///
    /// The insert is conflict-tolerant: when a concurrent loader wins the
    /// race, the insert returns no row and the fallback lookup reads the
    /// winner. Either way the same id comes back for the same string, on
    /// every call, forever.
    async fn resolve_url(tx: &mut Transaction<'_, Postgres>, url: &str) -> Result<i64> {
        let inserted: Option<i64> = sqlx::query_scalar(
            "INSERT INTO urls (url) VALUES ($1) ON CONFLICT DO NOTHING RETURNING id_urls",
        )
        .bind(url)
        .fetch_optional(&mut **tx)
        .await?;
        if let Some(id) = inserted {
            return Ok(id);
        }
        let id = sqlx::query_scalar("SELECT id_urls FROM urls WHERE url = $1")
            .bind(url)
            .fetch_one(&mut **tx)
            .await?;
        Ok(id)
    }

    // =========================================================================
    // Row strategy
    // =========================================================================

    /// Load one normalized record in its own transaction.
    ///
    /// Returns `false` without writing anything when the tweet already
    /// exists — re-runs over loaded archives become read-only. The skip is
    /// an optimization only; correctness rests on the conflict-tolerant
    /// inserts, so a record slipping past the check (e.g. two loaders
    /// racing) still lands exactly once.
    ///
    /// The user row is insert-if-absent: a stub left by an earlier mention
    /// hydrates here, and an already-hydrated row is left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when any statement fails; the whole record's
    /// transaction rolls back.
    pub async fn insert_record(&self, record: &NormalizedRecord) -> Result<bool> {
        if self.tweet_exists(record.tweet.id).await? {
            return Ok(false);
        }

        let mut tx = self.pool.begin().await?;

        let user_url_id = match &record.user.url {
            Some(url) => Some(Self::resolve_url(&mut tx, url).await?),
            None => None,
        };

        sqlx::query(
            "INSERT INTO users \
             (id_users, created_at, updated_at, url, friends_count, listed_count, \
              favourites_count, statuses_count, protected, verified, screen_name, \
              name, location, description, withheld_in_countries) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT DO NOTHING",
        )
        .bind(record.user.id)
        .bind(record.user.created_at)
        .bind(record.user.updated_at)
        .bind(user_url_id)
        .bind(record.user.friends_count)
        .bind(record.user.listed_count)
        .bind(record.user.favourites_count)
        .bind(record.user.statuses_count)
        .bind(record.user.protected)
        .bind(record.user.verified)
        .bind(record.user.screen_name.as_deref())
        .bind(record.user.name.as_deref())
        .bind(record.user.location.as_deref())
        .bind(record.user.description.as_deref())
        .bind(record.user.withheld_in_countries.clone())
        .execute(&mut *tx)
        .await?;

        // The replied-to account may be unseen; give its foreign key a row.
        if let Some(stub) = &record.reply_stub {
            sqlx::query("INSERT INTO users (id_users) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(stub.id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            "INSERT INTO tweets \
             (id_tweets, id_users, created_at, in_reply_to_status_id, in_reply_to_user_id, \
              quoted_status_id, retweet_count, favorite_count, quote_count, \
              withheld_copyright, withheld_in_countries, source, text, country_code, \
              state_code, lang, place_name, geo) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
              $17, ST_GeomFromText($18)) \
             ON CONFLICT DO NOTHING",
        )
        .bind(record.tweet.id)
        .bind(record.tweet.user_id)
        .bind(record.tweet.created_at)
        .bind(record.tweet.in_reply_to_status_id)
        .bind(record.tweet.in_reply_to_user_id)
        .bind(record.tweet.quoted_status_id)
        .bind(record.tweet.retweet_count)
        .bind(record.tweet.favorite_count)
        .bind(record.tweet.quote_count)
        .bind(record.tweet.withheld_copyright)
        .bind(record.tweet.withheld_in_countries.clone())
        .bind(record.tweet.source.as_deref())
        .bind(record.tweet.text.as_str())
        .bind(record.tweet.country_code.as_deref())
        .bind(record.tweet.state_code.as_deref())
        .bind(record.tweet.lang.as_deref())
        .bind(record.tweet.place_name.as_deref())
        .bind(record.tweet.geo.as_ref().map(GeoShape::to_wkt))
        .execute(&mut *tx)
        .await?;

        for url in &record.urls {
            let id_urls = Self::resolve_url(&mut tx, url).await?;
            sqlx::query(
                "INSERT INTO tweet_urls (id_tweets, id_urls) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(record.tweet.id)
            .bind(id_urls)
            .execute(&mut *tx)
            .await?;
        }

        for stub in &record.mention_stubs {
            sqlx::query("INSERT INTO users (id_users) VALUES ($1) ON CONFLICT DO NOTHING")
                .bind(stub.id)
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO tweet_mentions (id_tweets, id_users) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(record.tweet.id)
            .bind(stub.id)
            .execute(&mut *tx)
            .await?;
        }

        for tag in &record.tags {
            sqlx::query(
                "INSERT INTO tweet_tags (id_tweets, tag) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(record.tweet.id)
            .bind(tag.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for media in &record.media {
            let id_urls = Self::resolve_url(&mut tx, &media.url).await?;
            sqlx::query(
                "INSERT INTO tweet_media (id_tweets, id_urls, type) VALUES ($1, $2, $3) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(record.tweet.id)
            .bind(id_urls)
            .bind(media.kind.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    // =========================================================================
    // Batch strategy
    // =========================================================================

    /// Load one assembled batch in a single transaction.
    ///
    /// Relations are written in dependency order: hydrated author rows
    /// first (so a stub for the same account inside this batch cannot
    /// shadow them), then stubs, then association rows, then the tweets
    /// themselves. Every insert is conflict-tolerant; a batch overlapping
    /// an earlier run re-sends its rows and the constraints no-op them.
    ///
    /// # Errors
    ///
    /// Returns an error when any statement fails; the whole batch's
    /// transaction rolls back.
    pub async fn insert_batch(&self, batch: &BatchRows) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        if !batch.users.is_empty() {
            Self::bulk_users(&mut tx, &batch.users).await?;
        }
        if !batch.reply_stubs.is_empty() {
            Self::bulk_reply_stubs(&mut tx, &batch.reply_stubs).await?;
        }
        if !batch.mention_stubs.is_empty() {
            Self::bulk_mention_stubs(&mut tx, &batch.mention_stubs).await?;
        }
        if !batch.mentions.is_empty() {
            Self::bulk_pairs(&mut tx, "tweet_mentions", "id_users", &batch.mentions).await?;
        }
        if !batch.tags.is_empty() {
            Self::bulk_tags(&mut tx, &batch.tags).await?;
        }
        if !batch.media.is_empty() {
            Self::bulk_media(&mut tx, &batch.media).await?;
        }
        if !batch.urls.is_empty() {
            Self::bulk_urls(&mut tx, &batch.urls).await?;
        }
        if !batch.tweets.is_empty() {
            Self::bulk_tweets(&mut tx, &batch.tweets).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn bulk_users(tx: &mut Transaction<'_, Postgres>, rows: &[UserRow]) -> Result<()> {
        require_rows("users", rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / USER_BINDS) {
            let mut qb = users_insert(chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn bulk_reply_stubs(tx: &mut Transaction<'_, Postgres>, rows: &[StubUser]) -> Result<()> {
        require_rows("users", rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / 2) {
            let mut qb = reply_stubs_insert(chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn bulk_mention_stubs(
        tx: &mut Transaction<'_, Postgres>,
        rows: &[StubUser],
    ) -> Result<()> {
        require_rows("users", rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / 3) {
            let mut qb = mention_stubs_insert(chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn bulk_pairs(
        tx: &mut Transaction<'_, Postgres>,
        table: &'static str,
        second_column: &'static str,
        rows: &[(i64, i64)],
    ) -> Result<()> {
        require_rows(table, rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / 2) {
            let mut qb = pairs_insert(table, second_column, chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn bulk_tags(tx: &mut Transaction<'_, Postgres>, rows: &[(i64, String)]) -> Result<()> {
        require_rows("tweet_tags", rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / 2) {
            let mut qb = tags_insert(chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn bulk_media(
        tx: &mut Transaction<'_, Postgres>,
        rows: &[(i64, String, String)],
    ) -> Result<()> {
        require_rows("tweet_media", rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / 3) {
            let mut qb = media_insert(chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn bulk_urls(tx: &mut Transaction<'_, Postgres>, rows: &[(i64, String)]) -> Result<()> {
        require_rows("tweet_urls", rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / 2) {
            let mut qb = urls_insert(chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }

    async fn bulk_tweets(tx: &mut Transaction<'_, Postgres>, rows: &[TweetRow]) -> Result<()> {
        require_rows("tweets", rows)?;
        for chunk in rows.chunks(PG_MAX_BINDS / TWEET_BINDS) {
            let mut qb = tweets_insert(chunk);
            qb.build().execute(&mut **tx).await?;
        }
        Ok(())
    }
}

/// Guard the grouped-insert builders: a zero-row insert is a caller bug
/// and must fail before any statement is built or sent.
fn require_rows<T>(table: &'static str, rows: &[T]) -> Result<()> {
    if rows.is_empty() {
        return Err(LoadError::EmptyRowSet { table });
    }
    Ok(())
}

// =============================================================================
// Grouped statement builders
// =============================================================================

fn users_insert(rows: &[UserRow]) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO users \
         (id_users, created_at, updated_at, url, friends_count, listed_count, \
          favourites_count, statuses_count, protected, verified, screen_name, \
          name, location, description, withheld_in_countries) ",
    );
    qb.push_values(rows, |mut b, u| {
        b.push_bind(u.id)
            .push_bind(u.created_at)
            .push_bind(u.updated_at)
            .push_bind(u.url.as_deref())
            .push_bind(u.friends_count)
            .push_bind(u.listed_count)
            .push_bind(u.favourites_count)
            .push_bind(u.statuses_count)
            .push_bind(u.protected)
            .push_bind(u.verified)
            .push_bind(u.screen_name.as_deref())
            .push_bind(u.name.as_deref())
            .push_bind(u.location.as_deref())
            .push_bind(u.description.as_deref())
            .push_bind(u.withheld_in_countries.clone());
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn reply_stubs_insert(rows: &[StubUser]) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO users (id_users, screen_name) ");
    qb.push_values(rows, |mut b, s| {
        b.push_bind(s.id).push_bind(s.screen_name.as_deref());
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn mention_stubs_insert(rows: &[StubUser]) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO users (id_users, name, screen_name) ");
    qb.push_values(rows, |mut b, s| {
        b.push_bind(s.id)
            .push_bind(s.name.as_deref())
            .push_bind(s.screen_name.as_deref());
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn pairs_insert<'a>(
    table: &'static str,
    second_column: &'static str,
    rows: &'a [(i64, i64)],
) -> QueryBuilder<'a, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new(format!("INSERT INTO {table} (id_tweets, {second_column}) "));
    qb.push_values(rows, |mut b, (tweet_id, other)| {
        b.push_bind(tweet_id).push_bind(other);
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn tags_insert(rows: &[(i64, String)]) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO tweet_tags (id_tweets, tag) ");
    qb.push_values(rows, |mut b, (tweet_id, tag)| {
        b.push_bind(tweet_id).push_bind(tag.as_str());
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn media_insert(rows: &[(i64, String, String)]) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO tweet_media (id_tweets, url, type) ");
    qb.push_values(rows, |mut b, (tweet_id, url, kind)| {
        b.push_bind(tweet_id)
            .push_bind(url.as_str())
            .push_bind(kind.as_str());
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn urls_insert(rows: &[(i64, String)]) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> =
        QueryBuilder::new("INSERT INTO tweet_urls (id_tweets, url) ");
    qb.push_values(rows, |mut b, (tweet_id, url)| {
        b.push_bind(tweet_id).push_bind(url.as_str());
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}

fn tweets_insert(rows: &[TweetRow]) -> QueryBuilder<'_, Postgres> {
    let mut qb: QueryBuilder<'_, Postgres> = QueryBuilder::new(
        "INSERT INTO tweets \
         (id_tweets, id_users, created_at, in_reply_to_status_id, in_reply_to_user_id, \
          quoted_status_id, retweet_count, favorite_count, quote_count, \
          withheld_copyright, withheld_in_countries, source, text, country_code, \
          state_code, lang, place_name, geo) ",
    );
    qb.push_values(rows, |mut b, t| {
        b.push_bind(t.id)
            .push_bind(t.user_id)
            .push_bind(t.created_at)
            .push_bind(t.in_reply_to_status_id)
            .push_bind(t.in_reply_to_user_id)
            .push_bind(t.quoted_status_id)
            .push_bind(t.retweet_count)
            .push_bind(t.favorite_count)
            .push_bind(t.quote_count)
            .push_bind(t.withheld_copyright)
            .push_bind(t.withheld_in_countries.clone())
            .push_bind(t.source.as_deref())
            .push_bind(t.text.as_str())
            .push_bind(t.country_code.as_deref())
            .push_bind(t.state_code.as_deref())
            .push_bind(t.lang.as_deref())
            .push_bind(t.place_name.as_deref());
        b.push("ST_GeomFromText(");
        b.push_bind_unseparated(t.geo.as_ref().map(GeoShape::to_wkt));
        b.push_unseparated(")");
    });
    qb.push(" ON CONFLICT DO NOTHING");
    qb
}
