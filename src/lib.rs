//! sitelens - embedding sync and similarity search for published site content.
//!
//! sitelens keeps a local vector store of document embeddings in sync with a
//! content export, embedding only documents that are not already stored, and
//! answers semantic queries over the result by cosine similarity.
//!
//! # Quick start
//!
//! ```no_run
//! use sitelens::{DataDir, EmbeddingConfig, OpenAiEmbeddings, VectorStore};
//! use sitelens::search::{self, SearchParams};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let store = VectorStore::open(&data_dir.records_db()).unwrap();
//! let config = EmbeddingConfig::from_env(None).unwrap();
//! let provider = OpenAiEmbeddings::new(&config).unwrap();
//!
//! let params = SearchParams {
//!     query: "model trains in the garden".to_string(),
//!     limit: 5,
//!     date_after: None,
//!     date_before: None,
//! };
//!
//! let hits = search::search_similar(&store, &provider, &params).unwrap();
//! for hit in &hits {
//!     println!("{} ({:.3}) {}", hit.title, hit.score, hit.permalink);
//! }
//! ```

pub mod batch;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod data_dir;
pub mod document;
pub mod embedding;
pub mod error;
pub mod search;
pub mod sync;
pub mod vector_store;

pub use config::EmbeddingConfig;
pub use data_dir::DataDir;
pub use document::Document;
pub use embedding::{EmbeddingProvider, OpenAiEmbeddings};
pub use error::{Error, Result};
pub use vector_store::{TimestampPrecision, VectorRecord, VectorStore};
