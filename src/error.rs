use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database open error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("cannot open archive index: {}", .0.display())]
    IndexUnavailable(PathBuf),

    #[error("inference backend unavailable: {0}")]
    InferenceUnavailable(String),

    #[error("embedding dimension mismatch: index has {expected}, query vector has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "archive truncated: {path} spans bytes {offset}..{end} but container is {container_len} bytes",
        end = .offset + .length
    )]
    ArchiveTruncated {
        path: String,
        offset: u64,
        length: u64,
        container_len: u64,
    },
}
