//! Zip archive reading.
//!
//! Input archives hold one text file per day; each line of a member is a
//! self-contained JSON record. Members are handed out in reverse lexical
//! order, matching the loader's deliberate (if arbitrary) processing
//! order, so that interrupted and resumed runs walk files the same way.

use crate::error::{LoadError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// A zip archive of per-day record files.
pub struct TweetArchive {
    path: PathBuf,
    zip: zip::ZipArchive<File>,
}

impl TweetArchive {
    /// Open an archive for reading.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or is not a valid
    /// zip archive.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|source| LoadError::ArchiveOpen {
            path: path.clone(),
            source,
        })?;
        let zip = zip::ZipArchive::new(file)?;
        Ok(Self { path, zip })
    }

    /// Path this archive was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Member names in reverse lexical order.
    #[must_use]
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.zip.file_names().map(String::from).collect();
        names.sort_unstable();
        names.reverse();
        names
    }

    /// Iterate the text lines of one member.
    ///
    /// # Errors
    ///
    /// Returns an error when the member does not exist or cannot be
    /// decompressed; per-line read errors surface through the iterator.
    pub fn member_lines(
        &mut self,
        name: &str,
    ) -> Result<impl Iterator<Item = std::io::Result<String>> + '_> {
        let member = self.zip.by_name(name)?;
        Ok(BufReader::new(member).lines())
    }
}
