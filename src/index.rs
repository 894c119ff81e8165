use std::path::Path;

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition,
};

use crate::error::{Error, Result};

const FILES: TableDefinition<&str, &[u8]> = TableDefinition::new("files");
const EMBEDDINGS: TableDefinition<u64, &[u8]> =
    TableDefinition::new("embeddings");

/// Header size for a stored embedding: 4 bytes dimension (u32 LE).
const VECTOR_HEADER_SIZE: usize = 4;

/// Metadata for one archived file, keyed by its relative path.
///
/// Created at pack time and immutable afterwards: re-packing produces a new
/// index/container pair rather than updating in place.
///
/// Serialized as `"size\0mtime\0content_hash\0offset\0length\0embedding_id\0snippet"`
/// where an empty snippet field means the file had no usable text snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Path relative to the packed root; unique within one index.
    pub path: String,
    pub size: u64,
    /// Last modification time as seconds since the Unix epoch.
    pub mtime: u64,
    /// Blake3 hex digest of the file's bytes.
    pub content_hash: String,
    /// Byte position of the file inside the archive container.
    pub offset: u64,
    /// Byte length of the file inside the archive container.
    pub length: u64,
    /// Key into the embeddings table; assigned sequentially at pack time.
    pub embedding_id: u64,
    /// Text excerpt captured at pack time, if the file looked like text.
    pub snippet: Option<String>,
}

impl FileRecord {
    /// Serialize to a byte vector for storage in the files table.
    pub fn serialize(&self) -> Vec<u8> {
        format!(
            "{}\0{}\0{}\0{}\0{}\0{}\0{}",
            self.size,
            self.mtime,
            self.content_hash,
            self.offset,
            self.length,
            self.embedding_id,
            self.snippet.as_deref().unwrap_or("")
        )
        .into_bytes()
    }

    /// Deserialize from bytes. Returns `None` if the format is invalid.
    pub fn deserialize(path: &str, bytes: &[u8]) -> Option<Self> {
        let s = std::str::from_utf8(bytes).ok()?;
        let mut parts = s.splitn(7, '\0');
        let size = parts.next()?.parse().ok()?;
        let mtime = parts.next()?.parse().ok()?;
        let content_hash = parts.next()?.to_string();
        let offset = parts.next()?.parse().ok()?;
        let length = parts.next()?.parse().ok()?;
        let embedding_id = parts.next()?.parse().ok()?;
        let snippet = match parts.next()? {
            "" => None,
            s => Some(s.to_string()),
        };
        Some(Self {
            path: path.to_string(),
            size,
            mtime,
            content_hash,
            offset,
            length,
            embedding_id,
            snippet,
        })
    }
}

/// Blake3 hex digest used for `FileRecord::content_hash`.
pub fn content_hash_hex(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// The archive index: one redb database holding the files table and the
/// embeddings table.
///
/// Embedding entries are fixed-dimension vectors stored as 4 bytes dimension
/// (u32 LE) followed by `dim * 4` bytes of f32 LE values.
pub struct IndexDb {
    db: Database,
}

impl IndexDb {
    /// Create (or truncate-open) an index database at pack time.
    pub fn create(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(FILES)?;
        txn.open_table(EMBEDDINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// Open an existing index for querying.
    ///
    /// Fails with [`Error::IndexUnavailable`] when the file is missing or
    /// unreadable; the query pipeline has no fallback without it.
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::IndexUnavailable(path.to_path_buf()));
        }
        let db = Database::open(path)
            .map_err(|_| Error::IndexUnavailable(path.to_path_buf()))?;
        Ok(Self { db })
    }

    // -- File records --

    /// Store multiple file records in a single transaction.
    pub fn batch_insert_records(&self, records: &[FileRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(FILES)?;
            for record in records {
                table.insert(record.path.as_str(), record.serialize().as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_record(&self, path: &str) -> Result<Option<FileRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILES)?;
        Ok(table
            .get(path)?
            .and_then(|v| FileRecord::deserialize(path, v.value())))
    }

    /// Return all file records, ordered by path.
    ///
    /// redb iterates string keys in lexical byte order, which is exactly the
    /// deterministic ordering the shortlist relies on.
    pub fn list_records(&self) -> Result<Vec<FileRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILES)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            if let Some(record) = FileRecord::deserialize(k.value(), v.value())
            {
                result.push(record);
            }
        }
        Ok(result)
    }

    pub fn file_count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(FILES)?;
        Ok(table.len()? as usize)
    }

    // -- Embeddings --

    /// Store multiple embedding vectors in a single transaction.
    pub fn batch_store_embeddings(
        &self,
        entries: &[(u64, Vec<f32>)],
    ) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(EMBEDDINGS)?;
            for (id, vector) in entries {
                let byte_len =
                    VECTOR_HEADER_SIZE + std::mem::size_of_val(vector.as_slice());
                let mut guard = table.insert_reserve(*id, byte_len)?;
                let dest = guard.as_mut();

                dest[0..4]
                    .copy_from_slice(&(vector.len() as u32).to_le_bytes());
                dest[VECTOR_HEADER_SIZE..]
                    .copy_from_slice(bytemuck::cast_slice(vector));
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Retrieve one embedding vector, or None if absent or malformed.
    pub fn load_embedding(&self, id: u64) -> Result<Option<Vec<f32>>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        let Some(guard) = table.get(id)? else {
            return Ok(None);
        };
        Ok(decode_vector(guard.value()))
    }

    /// Load multiple embedding vectors in a single read transaction,
    /// preserving input order. Missing entries return None.
    pub fn batch_load_embeddings(
        &self,
        ids: &[u64],
    ) -> Result<Vec<(u64, Option<Vec<f32>>)>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;

        let mut results = Vec::with_capacity(ids.len());
        for &id in ids {
            let vector =
                table.get(id)?.and_then(|guard| decode_vector(guard.value()));
            results.push((id, vector));
        }
        Ok(results)
    }

    pub fn embedding_count(&self) -> Result<usize> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        Ok(table.len()? as usize)
    }

    /// Dimension of the stored vectors, taken from the first entry.
    ///
    /// Returns None for an index packed without embeddings.
    pub fn embedding_dimension(&self) -> Result<Option<usize>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(EMBEDDINGS)?;
        for entry in table.iter()? {
            let (_, v) = entry?;
            if let Some(vector) = decode_vector(v.value()) {
                return Ok(Some(vector.len()));
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for IndexDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexDb").finish_non_exhaustive()
    }
}

fn decode_vector(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() < VECTOR_HEADER_SIZE {
        return None;
    }
    let dim = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
    if bytes.len() != VECTOR_HEADER_SIZE + dim * 4 {
        return None;
    }
    Some(bytemuck::cast_slice(&bytes[VECTOR_HEADER_SIZE..]).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, IndexDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = IndexDb::create(&tmp.path().join("index.redb")).unwrap();
        (tmp, db)
    }

    fn make_record(path: &str, embedding_id: u64) -> FileRecord {
        FileRecord {
            path: path.to_string(),
            size: 42,
            mtime: 1700000000,
            content_hash: "abc123".to_string(),
            offset: 128,
            length: 42,
            embedding_id,
            snippet: Some("hello world".to_string()),
        }
    }

    #[test]
    fn record_roundtrip() {
        let record = make_record("docs/a.md", 7);
        let bytes = record.serialize();
        let restored = FileRecord::deserialize("docs/a.md", &bytes).unwrap();
        assert_eq!(record, restored);
    }

    #[test]
    fn record_roundtrip_without_snippet() {
        let mut record = make_record("bin/tool", 3);
        record.snippet = None;
        let bytes = record.serialize();
        let restored = FileRecord::deserialize("bin/tool", &bytes).unwrap();
        assert_eq!(restored.snippet, None);
    }

    #[test]
    fn deserialize_rejects_garbage() {
        assert!(FileRecord::deserialize("x", b"not\0enough\0fields").is_none());
        assert!(FileRecord::deserialize("x", &[0xff, 0xfe]).is_none());
    }

    #[test]
    fn insert_and_get_records() {
        let (_tmp, db) = test_db();
        let records = vec![make_record("b.md", 1), make_record("a.md", 0)];
        db.batch_insert_records(&records).unwrap();

        let got = db.get_record("a.md").unwrap().unwrap();
        assert_eq!(got.embedding_id, 0);
        assert!(db.get_record("missing.md").unwrap().is_none());
    }

    #[test]
    fn list_records_is_path_ordered() {
        let (_tmp, db) = test_db();
        let records = vec![
            make_record("z.md", 2),
            make_record("a.md", 0),
            make_record("m.md", 1),
        ];
        db.batch_insert_records(&records).unwrap();

        let listed = db.list_records().unwrap();
        let paths: Vec<_> = listed.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["a.md", "m.md", "z.md"]);
    }

    #[test]
    fn embedding_roundtrip() {
        let (_tmp, db) = test_db();
        db.batch_store_embeddings(&[(0, vec![1.0, 2.0, 3.0])]).unwrap();

        let vector = db.load_embedding(0).unwrap().unwrap();
        assert_eq!(vector, vec![1.0, 2.0, 3.0]);
        assert!(db.load_embedding(99).unwrap().is_none());
        assert_eq!(db.embedding_dimension().unwrap(), Some(3));
    }

    #[test]
    fn batch_load_preserves_order_and_gaps() {
        let (_tmp, db) = test_db();
        db.batch_store_embeddings(&[
            (10, vec![1.0, 0.0]),
            (20, vec![0.0, 1.0]),
        ])
        .unwrap();

        let loaded = db.batch_load_embeddings(&[20, 99, 10]).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].0, 20);
        assert_eq!(loaded[0].1.as_deref(), Some(&[0.0, 1.0][..]));
        assert!(loaded[1].1.is_none());
        assert_eq!(loaded[2].1.as_deref(), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn counts() {
        let (_tmp, db) = test_db();
        assert_eq!(db.file_count().unwrap(), 0);
        assert_eq!(db.embedding_count().unwrap(), 0);
        assert_eq!(db.embedding_dimension().unwrap(), None);

        db.batch_insert_records(&[make_record("a.md", 0)]).unwrap();
        db.batch_store_embeddings(&[(0, vec![0.5; 4])]).unwrap();
        assert_eq!(db.file_count().unwrap(), 1);
        assert_eq!(db.embedding_count().unwrap(), 1);
    }

    #[test]
    fn create_in_missing_directory_fails() {
        let err = IndexDb::create(Path::new("/nonexistent/dir/index.redb"))
            .unwrap_err();
        assert!(matches!(err, Error::RedbDatabase(_)));
    }

    #[test]
    fn open_missing_index_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let err = IndexDb::open(&tmp.path().join("absent.redb")).unwrap_err();
        assert!(matches!(err, Error::IndexUnavailable(_)));
    }

    #[test]
    fn reopen_preserves_data() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("index.redb");

        {
            let db = IndexDb::create(&path).unwrap();
            db.batch_insert_records(&[make_record("a.md", 0)]).unwrap();
            db.batch_store_embeddings(&[(0, vec![1.0, 2.0])]).unwrap();
        }

        {
            let db = IndexDb::open(&path).unwrap();
            assert!(db.get_record("a.md").unwrap().is_some());
            assert_eq!(db.load_embedding(0).unwrap().unwrap(), vec![1.0, 2.0]);
        }
    }
}
