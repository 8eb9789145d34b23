//! # Lectro - Vector Search for a Personal Reader
//!
//! Lectro keeps embedded book chunks in a single JSON file and answers
//! semantic search by scoring every chunk with cosine similarity. Chunks are
//! merged by id (last write wins) and removed by owning book.
//!
//! ## Example
//!
//! ```
//! use lectro::{Chunk, VectorStore};
//! use std::collections::HashSet;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = VectorStore::in_library(dir.path());
//!
//! let chunk = |id: &str, book: &str, embedding: Vec<f32>| Chunk {
//!     id: id.to_string(),
//!     book_id: book.to_string(),
//!     embedding,
//!     text: format!("chunk {}", id),
//!     chapter_title: None,
//! };
//!
//! // Merge chunks
//! store.merge(vec![chunk("a", "b1", vec![1.0, 0.0]), chunk("c", "b2", vec![0.0, 1.0])], &HashSet::new()).unwrap();
//!
//! // Search for similar chunks
//! let results = store.search(&[1.0, 0.0], 1).unwrap();
//! assert_eq!(results[0].book_id, "b1"); // Most similar chunk
//! ```

pub mod config;
pub mod embedding;
pub mod error;
pub mod server;
pub mod store;
pub mod vector;

// Re-export the store as the primary public API
pub use error::{LectroError, Result};
pub use store::{Chunk, SearchHit, StoreDocument, StoreStats, VectorStore, STORE_FILE_NAME};
