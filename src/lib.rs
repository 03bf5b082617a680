//! xload - bulk loader for X/Twitter archive data
//!
//! This library turns zipped, line-delimited activity archives into rows
//! of a normalized Postgres schema, idempotently: all writes are
//! insert-if-absent, so overlapping or repeated runs converge on the same
//! relation contents.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface definitions
//! - [`error`] - Custom error types
//! - [`archive`] - Zip archive reading
//! - [`sanitize`] - NUL sanitization of record strings
//! - [`record`] - Typed access into raw record JSON
//! - [`model`] - Normalized row models
//! - [`normalize`] - Raw record to relation rows
//! - [`batch`] - Chunking and per-relation row-set merging
//! - [`storage`] - Postgres upsert layer (row and batch strategies)

pub mod archive;
pub mod batch;
pub mod cli;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod record;
pub mod sanitize;
pub mod storage;

pub use archive::TweetArchive;
pub use batch::{BatchRows, assemble};
pub use cli::*;
pub use error::{LoadError, Result};
pub use model::{GeoShape, MediaRef, NormalizedRecord, StubUser, TweetRow, UserRow};
pub use normalize::{normalize, normalize_line};
pub use sanitize::NulPolicy;
pub use storage::Storage;

/// Format an integer with thousands separators.
#[must_use]
pub fn format_number(value: i64) -> String {
    let abs = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(abs.len() + abs.len() / 3);

    for (idx, ch) in abs.chars().rev().enumerate() {
        if idx > 0 && idx % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    let mut formatted: String = out.chars().rev().collect();
    if value < 0 {
        formatted.insert(0, '-');
    }
    formatted
}

/// Format a usize with thousands separators.
#[must_use]
pub fn format_number_usize(value: usize) -> String {
    format_number(i64::try_from(value).unwrap_or(i64::MAX))
}
