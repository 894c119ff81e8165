use std::path::{Component, Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::{
    archive::{ArchiveReader, Span},
    error::{Error, Result},
    index::{FileRecord, content_hash_hex},
};

/// Per-file outcome of one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Bytes written and content hash verified.
    Verified,
    /// Bytes written but the hash does not match the indexed value.
    IntegrityMismatch { expected: String, actual: String },
    /// The file could not be written at all.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ExtractReport {
    pub path: String,
    pub output_path: PathBuf,
    pub status: FileStatus,
}

impl ExtractReport {
    pub fn is_verified(&self) -> bool {
        self.status == FileStatus::Verified
    }
}

/// Extract the winning records into `out_dir`.
///
/// Every span is bounds-checked against the container before anything is
/// written: an out-of-bounds span means the index and container do not match,
/// which aborts the whole batch as [`Error::ArchiveTruncated`]. After that,
/// files are extracted independently from parallel workers over disjoint byte
/// ranges; one file failing its write or its hash check never blocks the
/// rest. Mismatched files are still written, and their reports carry the
/// failure.
pub fn extract_files(
    archive: &ArchiveReader,
    records: &[FileRecord],
    out_dir: &Path,
) -> Result<Vec<ExtractReport>> {
    for record in records {
        if record.offset.checked_add(record.length).is_none_or(|end| {
            end > archive.len()
        }) {
            return Err(Error::ArchiveTruncated {
                path: record.path.clone(),
                offset: record.offset,
                length: record.length,
                container_len: archive.len(),
            });
        }
    }

    std::fs::create_dir_all(out_dir)?;

    let mut reports: Vec<ExtractReport> = records
        .par_iter()
        .map(|record| extract_one(archive, record, out_dir))
        .collect();

    reports.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(reports)
}

fn extract_one(
    archive: &ArchiveReader,
    record: &FileRecord,
    out_dir: &Path,
) -> ExtractReport {
    let Some(relative) = sanitize_path(&record.path) else {
        warn!(path = %record.path, "refusing to extract outside the output directory");
        return ExtractReport {
            path: record.path.clone(),
            output_path: out_dir.to_path_buf(),
            status: FileStatus::Failed("unsafe relative path".to_string()),
        };
    };
    let output_path = out_dir.join(relative);

    let span = Span { offset: record.offset, length: record.length };
    let bytes = match archive.read_span(&record.path, span) {
        Ok(bytes) => bytes,
        Err(e) => {
            return ExtractReport {
                path: record.path.clone(),
                output_path,
                status: FileStatus::Failed(e.to_string()),
            };
        }
    };

    if let Some(parent) = output_path.parent()
        && let Err(e) = std::fs::create_dir_all(parent)
    {
        return ExtractReport {
            path: record.path.clone(),
            output_path,
            status: FileStatus::Failed(e.to_string()),
        };
    }
    if let Err(e) = std::fs::write(&output_path, &bytes) {
        return ExtractReport {
            path: record.path.clone(),
            output_path,
            status: FileStatus::Failed(e.to_string()),
        };
    }

    let actual = content_hash_hex(&bytes);
    let status = if actual == record.content_hash {
        debug!(path = %record.path, "extracted and verified");
        FileStatus::Verified
    } else {
        warn!(path = %record.path, "content hash mismatch on extraction");
        FileStatus::IntegrityMismatch {
            expected: record.content_hash.clone(),
            actual,
        }
    };

    ExtractReport { path: record.path.clone(), output_path, status }
}

/// Reject absolute paths and parent-directory components so an extracted
/// file can never land outside the output directory.
fn sanitize_path(path: &str) -> Option<&Path> {
    let p = Path::new(path);
    let safe = p
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    (safe && !path.is_empty()).then_some(p)
}
