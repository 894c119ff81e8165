use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    archive::ArchiveWriter,
    backend::InferenceBackend,
    error::{Error, Result},
    index::{FileRecord, IndexDb, content_hash_hex},
    snippet,
    walker::discover_files,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackSummary {
    pub files: usize,
    pub embedded: usize,
    pub container_len: u64,
}

/// Pack a directory into an index/container pair.
///
/// Walks the tree, appends each file's bytes to the container while
/// recording byte-exact spans and content hashes, captures text snippets,
/// then commits all records in one transaction. When a backend is supplied,
/// one embedding per file (snippet text, falling back to the relative path)
/// is computed in parallel and committed in a second single transaction;
/// an embedding failure is fatal, since a partially-embedded index would
/// silently degrade later queries. Passing `None` packs an index usable only
/// in `off` mode.
pub fn pack_directory(
    root: &Path,
    index_path: &Path,
    container_path: &Path,
    backend: Option<&dyn InferenceBackend>,
) -> Result<PackSummary> {
    if !root.is_dir() {
        return Err(Error::Config(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let files = discover_files(root)?;
    info!(count = files.len(), root = %root.display(), "packing directory");

    let mut writer = ArchiveWriter::create(container_path)?;
    let mut records: Vec<FileRecord> = Vec::with_capacity(files.len());

    for file in &files {
        let bytes = match std::fs::read(&file.absolute_path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %file.relative_path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };

        let span = writer.append(&bytes)?;
        let rel_path = file.relative_path.to_string_lossy().to_string();
        let extension = file
            .relative_path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);

        records.push(FileRecord {
            path: rel_path,
            size: span.length,
            mtime: file.mtime,
            content_hash: content_hash_hex(&bytes),
            offset: span.offset,
            length: span.length,
            embedding_id: records.len() as u64,
            snippet: snippet::capture(&bytes, extension.as_deref(), span.length),
        });
    }

    let container_len = writer.finish()?;

    let index = IndexDb::create(index_path)?;
    index.batch_insert_records(&records)?;
    debug!(records = records.len(), "file records committed");

    let embedded = match backend {
        Some(backend) => embed_records(backend, &index, &records)?,
        None => 0,
    };

    Ok(PackSummary { files: records.len(), embedded, container_len })
}

/// Compute one embedding per record in parallel, then commit the whole batch
/// in a single transaction.
fn embed_records(
    backend: &dyn InferenceBackend,
    index: &IndexDb,
    records: &[FileRecord],
) -> Result<usize> {
    if records.is_empty() {
        return Ok(0);
    }

    let entries: Vec<(u64, Vec<f32>)> = records
        .par_iter()
        .map(|record| {
            let text = record.snippet.as_deref().unwrap_or(&record.path);
            backend.embed(text).map(|v| (record.embedding_id, v))
        })
        .collect::<Result<Vec<_>>>()?;

    // One backend serves one fixed dimension; anything else is a broken
    // backend and would poison every later query.
    let dim = entries[0].1.len();
    if dim == 0 || entries.iter().any(|(_, v)| v.len() != dim) {
        return Err(Error::Config(
            "backend returned embeddings of inconsistent dimension".to_string(),
        ));
    }

    index.batch_store_embeddings(&entries)?;
    debug!(count = entries.len(), dim, "embeddings committed");
    Ok(entries.len())
}
