use std::path::Path;

use globset::{Glob, GlobMatcher};
use tracing::debug;

use crate::{
    error::{Error, Result},
    index::{FileRecord, IndexDb},
};

/// Structured filter over the files table. All clauses are optional and
/// conjunctive; an empty predicate matches everything.
#[derive(Debug, Default, Clone)]
pub struct Predicate {
    glob: Option<GlobMatcher>,
    substring: Option<String>,
    extensions: Vec<String>,
    min_size: Option<u64>,
    max_size: Option<u64>,
    modified_after: Option<u64>,
    modified_before: Option<u64>,
}

impl Predicate {
    /// Add a glob clause applied to relative paths.
    pub fn with_glob(mut self, pattern: &str) -> Result<Self> {
        let glob = Glob::new(pattern)
            .map_err(|e| Error::Config(format!("invalid glob pattern: {e}")))?;
        self.glob = Some(glob.compile_matcher());
        Ok(self)
    }

    /// Add a case-insensitive path substring clause.
    pub fn with_substring(mut self, needle: &str) -> Self {
        self.substring = Some(needle.to_lowercase());
        self
    }

    /// Restrict to a set of file extensions (leading dots are tolerated).
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn with_size_range(
        mut self,
        min: Option<u64>,
        max: Option<u64>,
    ) -> Self {
        self.min_size = min;
        self.max_size = max;
        self
    }

    pub fn with_mtime_range(
        mut self,
        after: Option<u64>,
        before: Option<u64>,
    ) -> Self {
        self.modified_after = after;
        self.modified_before = before;
        self
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        if let Some(ref glob) = self.glob
            && !glob.is_match(&record.path)
        {
            return false;
        }
        if let Some(ref needle) = self.substring
            && !record.path.to_lowercase().contains(needle)
        {
            return false;
        }
        if !self.extensions.is_empty() {
            let ext = Path::new(&record.path)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());
            match ext {
                Some(ext) if self.extensions.contains(&ext) => {}
                _ => return false,
            }
        }
        if let Some(min) = self.min_size
            && record.size < min
        {
            return false;
        }
        if let Some(max) = self.max_size
            && record.size > max
        {
            return false;
        }
        if let Some(after) = self.modified_after
            && record.mtime < after
        {
            return false;
        }
        if let Some(before) = self.modified_before
            && record.mtime > before
        {
            return false;
        }
        true
    }
}

/// Evaluate the predicate against the index and return up to `limit`
/// matching records, ordered by path.
///
/// Purely read-only. An empty result is a legitimate terminal outcome for
/// the pipeline, not an error.
pub fn shortlist(
    index: &IndexDb,
    predicate: &Predicate,
    limit: usize,
) -> Result<Vec<FileRecord>> {
    let matched: Vec<FileRecord> = index
        .list_records()?
        .into_iter()
        .filter(|r| predicate.matches(r))
        .take(limit)
        .collect();

    debug!(count = matched.len(), limit, "shortlist evaluated");
    Ok(matched)
}
