//! The store module
//! File-backed chunk collection with merge-upsert, delete-by-book and search

use crate::error::{LectroError, Result};
use crate::vector::cosine_similarity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fs::{self, File},
    io::{BufReader, BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// File name of the store document inside the library root.
pub const STORE_FILE_NAME: &str = "lectro_vectors.json";

/// One embedded unit of book text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub book_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_title: Option<String>,
}

/// The persisted document: every chunk plus the time of the last write.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreDocument {
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

/// A ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub book_id: String,
    pub score: f32,
    pub text: String,
    pub chapter_title: Option<String>,
}

/// Summary of what the store currently holds.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub chunks: usize,
    pub books: usize,
    /// Every distinct embedding length present. More than one entry means
    /// scores across those chunks are not comparable.
    pub dimensions: Vec<usize>,
    pub last_sync: Option<DateTime<Utc>>,
}

/// Handle on a single store file.
///
/// The file is read in full on every operation. Merges inside this process
/// are serialized by an internal lock, and each write replaces the file via
/// rename, so readers never see a half-written document.
#[derive(Debug)]
pub struct VectorStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl VectorStore {
    /// Creates a store backed by the file at `path`. Nothing is touched on
    /// disk until the first merge.
    ///
    /// # Examples
    ///
    /// ```
    /// use lectro::VectorStore;
    ///
    /// let store = VectorStore::new("/tmp/lectro-doc/lectro_vectors.json");
    /// assert!(store.path().ends_with("lectro_vectors.json"));
    /// ```
    pub fn new(path: impl Into<PathBuf>) -> VectorStore {
        VectorStore { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Creates a store at `<library_root>/lectro_vectors.json`.
    pub fn in_library(library_root: impl AsRef<Path>) -> VectorStore {
        VectorStore::new(library_root.as_ref().join(STORE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the whole store document.
    ///
    /// A missing file is an empty store, not an error. A file that exists but
    /// does not parse fails with [`LectroError::Read`].
    pub fn load(&self) -> Result<StoreDocument> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "vector store absent, treating as empty");
                return Ok(StoreDocument::default());
            }
            Err(e) => return Err(self.read_error(e)),
        };

        let reader = BufReader::new(file);
        let doc: StoreDocument = serde_json::from_reader(reader)
            .map_err(|e| self.read_error(e))?;

        Ok(doc)
    }

    /// Upserts `incoming` by id, then drops every chunk owned by one of
    /// `deleted_book_ids`, and writes the result back with a fresh `lastSync`.
    ///
    /// Deletion applies after the upsert, so it also removes incoming chunks
    /// that belong to a deleted book. Returns the chunk count after the merge.
    ///
    /// # Examples
    ///
    /// ```
    /// use lectro::{Chunk, VectorStore};
    /// use std::collections::HashSet;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = VectorStore::in_library(dir.path());
    ///
    /// let chunk = Chunk {
    ///     id: "a".to_string(),
    ///     book_id: "b1".to_string(),
    ///     embedding: vec![1.0, 0.0],
    ///     text: "Call me Ishmael.".to_string(),
    ///     chapter_title: None,
    /// };
    /// assert_eq!(store.merge(vec![chunk], &HashSet::new()).unwrap(), 1);
    ///
    /// let deleted: HashSet<String> = ["b1".to_string()].into();
    /// assert_eq!(store.merge(Vec::new(), &deleted).unwrap(), 0);
    /// ```
    pub fn merge(&self, incoming: Vec<Chunk>, deleted_book_ids: &HashSet<String>) -> Result<usize> {
        validate_chunks(&incoming)?;

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let existing = self.load()?.chunks;
        let incoming_count = incoming.len();

        let mut merged: Vec<Chunk> = Vec::with_capacity(existing.len() + incoming_count);
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(merged.capacity());

        for chunk in existing.into_iter().chain(incoming) {
            match positions.get(&chunk.id) {
                Some(&index) => merged[index] = chunk,
                None => {
                    positions.insert(chunk.id.clone(), merged.len());
                    merged.push(chunk);
                }
            }
        }

        let before_delete = merged.len();
        if !deleted_book_ids.is_empty() {
            merged.retain(|chunk| !deleted_book_ids.contains(&chunk.book_id));
        }
        let removed = before_delete - merged.len();

        let doc = StoreDocument { chunks: merged, last_sync: Some(Utc::now()) };
        self.write_document(&doc)?;

        info!(
            path = %self.path.display(),
            incoming = incoming_count,
            removed,
            total = doc.chunks.len(),
            "merged vector store"
        );

        Ok(doc.chunks.len())
    }

    /// Scores every stored chunk against `query` and returns the best `limit`.
    ///
    /// Results are ordered by descending cosine similarity; equal scores keep
    /// store order. Chunks whose embedding length differs from the query, or
    /// whose score is NaN (zero-magnitude vector), are skipped.
    ///
    /// # Examples
    ///
    /// ```
    /// use lectro::{Chunk, VectorStore};
    /// use std::collections::HashSet;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = VectorStore::in_library(dir.path());
    /// let chunk = |id: &str, book: &str, e: Vec<f32>| Chunk {
    ///     id: id.to_string(),
    ///     book_id: book.to_string(),
    ///     embedding: e,
    ///     text: String::new(),
    ///     chapter_title: None,
    /// };
    /// store.merge(vec![chunk("a", "b1", vec![1.0, 0.0]), chunk("c", "b2", vec![0.0, 1.0])], &HashSet::new()).unwrap();
    ///
    /// let hits = store.search(&[1.0, 0.0], 1).unwrap();
    /// assert_eq!(hits.len(), 1);
    /// assert_eq!(hits[0].book_id, "b1");
    /// ```
    pub fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if limit == 0 {
            return Err(LectroError::validation("limit must be greater than zero"));
        }
        if query.is_empty() {
            return Err(LectroError::validation("query embedding is empty"));
        }

        let doc = self.load()?;
        let hits = rank_chunks(&doc.chunks, query, limit);

        debug!(candidates = doc.chunks.len(), returned = hits.len(), limit, "vector search");
        Ok(hits)
    }

    /// Counts chunks, books and embedding lengths.
    pub fn stats(&self) -> Result<StoreStats> {
        let doc = self.load()?;

        let books: HashSet<&str> = doc.chunks.iter().map(|c| c.book_id.as_str()).collect();
        let dimensions: BTreeSet<usize> = doc.chunks.iter().map(|c| c.embedding.len()).collect();

        if dimensions.len() > 1 {
            warn!(?dimensions, "vector store holds embeddings of different lengths");
        }

        Ok(StoreStats {
            chunks: doc.chunks.len(),
            books: books.len(),
            dimensions: dimensions.into_iter().collect(),
            last_sync: doc.last_sync,
        })
    }

    /// Serializes compactly into a temp file next to the store, then renames
    /// it over the store file.
    fn write_document(&self, doc: &StoreDocument) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        {
            let mut writer = BufWriter::new(&mut tmp);
            serde_json::to_writer(&mut writer, doc).map_err(|e| self.write_error(e))?;
            writer.flush().map_err(|e| self.write_error(e))?;
        }

        tmp.persist(&self.path).map_err(|e| self.write_error(e.error))?;
        Ok(())
    }

    fn read_error(&self, e: impl std::fmt::Display) -> LectroError {
        LectroError::Read { path: self.path.display().to_string(), reason: e.to_string() }
    }

    fn write_error(&self, e: impl std::fmt::Display) -> LectroError {
        LectroError::Write { path: self.path.display().to_string(), reason: e.to_string() }
    }
}

/// Every chunk needs an id to upsert on and a book to be deleted with.
fn validate_chunks(chunks: &[Chunk]) -> Result<()> {
    for (index, chunk) in chunks.iter().enumerate() {
        if chunk.id.trim().is_empty() {
            return Err(LectroError::validation(format!("chunk at index {} has an empty id", index)));
        }
        if chunk.book_id.trim().is_empty() {
            return Err(LectroError::validation(format!("chunk '{}' has an empty bookId", chunk.id)));
        }
    }
    Ok(())
}

/// Keeps a descending top-`limit` buffer while scanning all chunks once.
fn rank_chunks(chunks: &[Chunk], query: &[f32], limit: usize) -> Vec<SearchHit> {
    let mut top: Vec<(usize, f32)> = Vec::with_capacity(limit.min(chunks.len()) + 1);
    let mut mismatched = 0usize;
    let mut unusable = 0usize;

    for (i, chunk) in chunks.iter().enumerate() {
        let sim = match cosine_similarity(query, &chunk.embedding) {
            Ok(sim) if sim.is_nan() => {
                unusable += 1;
                continue;
            }
            Ok(sim) => sim,
            Err(e) => {
                debug!(chunk_id = %chunk.id, error = %e, "skipping chunk");
                mismatched += 1;
                continue;
            }
        };

        if top.len() == limit && top.last().is_some_and(|&(_, worst)| worst >= sim) {
            continue;
        }

        // Ties go after existing entries so store order wins.
        let insert_index = top.partition_point(|&(_, s)| s >= sim);
        top.insert(insert_index, (i, sim));
        top.truncate(limit);
    }

    if mismatched > 0 {
        warn!(mismatched, query_dim = query.len(), "skipped chunks with a different embedding length");
    }
    if unusable > 0 {
        warn!(unusable, "skipped chunks with an undefined similarity score");
    }

    top.into_iter()
        .map(|(i, score)| {
            let chunk = &chunks[i];
            SearchHit {
                book_id: chunk.book_id.clone(),
                score,
                text: chunk.text.clone(),
                chapter_title: chunk.chapter_title.clone(),
            }
        })
        .collect()
}
