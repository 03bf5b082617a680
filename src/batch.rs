//! Batch assembly.
//!
//! Groups an ordered sequence of raw records into fixed-size chunks and
//! merges each chunk's normalized rows into one flat row-set per relation,
//! ready for a single grouped multi-row write. Chunk boundaries carry no
//! semantics; the merged sets preserve per-record order so fixtures stay
//! deterministic.

use crate::error::{LoadError, Result};
use crate::model::{NormalizedRecord, StubUser, TweetRow, UserRow};
use crate::normalize::normalize;
use crate::sanitize::NulPolicy;
use rayon::prelude::*;
use serde_json::Value;
use tracing::warn;

/// Per-relation row sets for one grouped multi-row write.
#[derive(Debug, Default)]
pub struct BatchRows {
    /// Hydrated author rows.
    pub users: Vec<UserRow>,
    /// Stubs for replied-to accounts (id + screen name).
    pub reply_stubs: Vec<StubUser>,
    /// Stubs for mentioned accounts (id + name + screen name).
    pub mention_stubs: Vec<StubUser>,
    /// (id_tweets, id_users) mention associations.
    pub mentions: Vec<(i64, i64)>,
    /// (id_tweets, tag) associations.
    pub tags: Vec<(i64, String)>,
    /// (id_tweets, url, kind) media associations.
    pub media: Vec<(i64, String, String)>,
    /// (id_tweets, url) link associations.
    pub urls: Vec<(i64, String)>,
    /// Tweet rows, written last.
    pub tweets: Vec<TweetRow>,
}

impl BatchRows {
    fn push(&mut self, record: NormalizedRecord) {
        let tweet_id = record.tweet.id;
        self.users.push(record.user);
        if let Some(stub) = record.reply_stub {
            self.reply_stubs.push(stub);
        }
        for stub in record.mention_stubs {
            self.mentions.push((tweet_id, stub.id));
            self.mention_stubs.push(stub);
        }
        for tag in record.tags {
            self.tags.push((tweet_id, tag));
        }
        for media in record.media {
            self.media.push((tweet_id, media.url, media.kind));
        }
        for url in record.urls {
            self.urls.push((tweet_id, url));
        }
        self.tweets.push(record.tweet);
    }

    /// Number of records merged into this batch.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.tweets.len()
    }
}

/// Partition `records` into `ceil(len / batch_size)` chunks (last chunk
/// possibly shorter) and normalize each chunk into merged per-relation row
/// sets.
///
/// With `skip_malformed`, records that fail normalization are logged and
/// dropped; otherwise the first failure aborts assembly.
///
/// # Errors
///
/// Returns [`LoadError::InvalidBatchSize`] for a zero batch size, and the
/// first normalization failure unless `skip_malformed` is set.
pub fn assemble(
    records: Vec<Value>,
    batch_size: usize,
    policy: NulPolicy,
    skip_malformed: bool,
) -> Result<Vec<BatchRows>> {
    if batch_size == 0 {
        return Err(LoadError::InvalidBatchSize);
    }

    let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size));
    let mut records = records.into_iter();
    loop {
        let chunk: Vec<Value> = records.by_ref().take(batch_size).collect();
        if chunk.is_empty() {
            break;
        }

        let normalized: Vec<Result<NormalizedRecord>> = chunk
            .into_par_iter()
            .map(|value| normalize(value, policy))
            .collect();

        let mut rows = BatchRows::default();
        for result in normalized {
            match result {
                Ok(record) => rows.push(record),
                Err(e) if skip_malformed => warn!("skipping malformed record: {e}"),
                Err(e) => return Err(e),
            }
        }
        batches.push(rows);
    }

    Ok(batches)
}
