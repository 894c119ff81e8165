//! packrat - an offline-first retrieval engine for packed directories.
//!
//! packrat packs a directory tree into a single byte-exact container plus a
//! [redb](https://github.com/cberner/redb) index holding per-file metadata,
//! content hashes, and embedding vectors. Queries run a staged cascade:
//! a structured shortlist over the index, embedding-similarity ranking,
//! an optional rerank pass against an external inference server, winner
//! selection with score-tie handling, and selective byte-range extraction
//! of just the winning files.
//!
//! The inference server is optional at every stage: packing without one
//! produces an index usable in `off` mode, and a hybrid query whose rerank
//! call fails degrades to the embedding order instead of failing.
//!
//! # Quick start
//!
//! ```no_run
//! use packrat::archive::ArchiveReader;
//! use packrat::backend::HttpBackend;
//! use packrat::config::{AppConfig, QueryMode};
//! use packrat::index::IndexDb;
//! use packrat::query::{self, QueryParams};
//! use packrat::shortlist::Predicate;
//!
//! let config = AppConfig::default();
//! let index = IndexDb::open("index.redb".as_ref()).unwrap();
//! let archive = ArchiveReader::open("data.pack".as_ref()).unwrap();
//! let backend = HttpBackend::new(&config).unwrap();
//!
//! let params = QueryParams {
//!     query: "error handling in the parser".to_string(),
//!     mode: QueryMode::Hybrid,
//!     predicate: Predicate::default(),
//!     limit: 200,
//!     topk: 5,
//!     epsilon: 0.0,
//!     out_dir: "extracted".into(),
//! };
//!
//! let outcome =
//!     query::execute_query(&params, &index, &archive, &backend, &config)
//!         .unwrap();
//! query::format_human(&outcome);
//! ```

pub mod archive;
pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod pack;
pub mod query;
pub mod ranker;
pub mod rerank;
pub mod select;
pub mod shortlist;
pub mod snippet;
pub mod walker;

pub use error::{Error, Result};
