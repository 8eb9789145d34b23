use clap::{Parser, Subcommand};
use lectro::config::Config;
use lectro::server::SyncRequest;
use lectro::{Chunk, LectroError, Result, VectorStore};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "lectro", version, about = "Vector store and semantic search for the Lectro reader")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, env = "LECTRO_BIND", default_value = "127.0.0.1:7878")]
        bind: String,
    },

    /// Show chunk, book and dimension counts.
    Stats,

    /// Search the store with a raw embedding.
    Search {
        /// Comma-separated components, e.g. `0.1,-0.4,0.9`.
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
        vector: Vec<f32>,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Merge chunks from a JSON file into the store.
    Ingest {
        /// A chunk array, or a `{chunks, deletedBookIds}` object.
        #[arg(long)]
        file: PathBuf,

        /// Remove every chunk of this book after merging. Repeatable.
        #[arg(long = "delete-book")]
        delete_books: Vec<String>,
    },

    /// Remove every chunk owned by the given books.
    DeleteBook {
        #[arg(required = true)]
        book_ids: Vec<String>,
    },
}

/// Either shape the ingest file may take.
#[derive(Deserialize)]
#[serde(untagged)]
enum IngestFile {
    Chunks(Vec<Chunk>),
    Sync(SyncRequest),
}

/// Runs every command except `serve` against the configured store.
pub fn execute(config: &Config, command: Command) -> Result<()> {
    let store = config.store();

    match command {
        Command::Serve { .. } => {
            return Err(LectroError::Configuration("'serve' runs inside the async runtime".to_string()));
        }

        Command::Stats => {
            let stats = store.stats()?;
            println!("Store: {}", store.path().display());
            println!("Chunks: {}", stats.chunks);
            println!("Books: {}", stats.books);
            println!("Dimensions: {:?}", stats.dimensions);
            match stats.last_sync {
                Some(ts) => println!("Last sync: {}", ts.to_rfc3339()),
                None => println!("Last sync: never"),
            }
        }

        Command::Search { vector, limit } => {
            let results = store.search(&vector, limit)?;
            if results.is_empty() {
                println!("No results found");
            } else {
                println!("Top {} results:", results.len());
                for (rank, hit) in results.iter().enumerate() {
                    println!("{}. Book: {}, Score: {:.4}, Chapter: {}, Text: {}",
                        rank + 1,
                        hit.book_id,
                        hit.score,
                        hit.chapter_title.as_deref().unwrap_or("-"),
                        preview(&hit.text, 80));
                }
            }
        }

        Command::Ingest { file, delete_books } => {
            let (chunks, mut deleted) = read_ingest_file(&file)?;
            deleted.extend(delete_books);
            let incoming = chunks.len();

            let count = merge(&store, chunks, deleted)?;
            println!("Merged {} chunks from '{}' ({} total)", incoming, file.display(), count);
        }

        Command::DeleteBook { book_ids } => {
            let count = merge(&store, Vec::new(), book_ids)?;
            println!("Store now holds {} chunks", count);
        }
    }

    Ok(())
}

fn merge(store: &VectorStore, chunks: Vec<Chunk>, deleted: Vec<String>) -> Result<usize> {
    let deleted: HashSet<String> = deleted.into_iter().collect();
    store.merge(chunks, &deleted)
}

fn read_ingest_file(path: &Path) -> Result<(Vec<Chunk>, Vec<String>)> {
    let read_error = |reason: String| LectroError::Read { path: path.display().to_string(), reason };

    let raw = fs::read_to_string(path).map_err(|e| read_error(e.to_string()))?;
    let parsed: IngestFile = serde_json::from_str(&raw).map_err(|e| read_error(e.to_string()))?;

    Ok(match parsed {
        IngestFile::Chunks(chunks) => (chunks, Vec::new()),
        IngestFile::Sync(req) => (req.chunks.unwrap_or_default(), req.deleted_book_ids),
    })
}

/// First `max` characters on one line.
fn preview(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let cut: String = flat.chars().take(max).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod cli_test {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_search_vector() {
        let cli = parse(&["lectro", "--library-root", "/tmp/lib", "search", "--vector", "0.5,-1,2", "--limit", "3"]);

        assert_eq!(cli.config.library_root, PathBuf::from("/tmp/lib"));
        match cli.command {
            Command::Search { vector, limit } => {
                assert_eq!(vector, vec![0.5, -1.0, 2.0]);
                assert_eq!(limit, 3);
            }
            _ => panic!("Expected search command"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_vector() {
        assert!(Cli::try_parse_from(["lectro", "search", "--vector", "1,abc"]).is_err());
    }

    #[test]
    fn test_parse_delete_book_requires_ids() {
        assert!(Cli::try_parse_from(["lectro", "delete-book"]).is_err());
        let cli = parse(&["lectro", "delete-book", "b1", "b2"]);
        assert!(matches!(cli.command, Command::DeleteBook { ref book_ids } if book_ids.len() == 2));
    }

    #[test]
    fn test_ingest_then_delete_book() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("library"));
        let file = dir.path().join("chunks.json");
        fs::write(&file, r#"[
            {"id": "a", "bookId": "b1", "embedding": [1, 0], "text": "first"},
            {"id": "c", "bookId": "b2", "embedding": [0, 1], "text": "second", "chapterTitle": "Two"}
        ]"#).unwrap();

        execute(&config, Command::Ingest { file, delete_books: Vec::new() }).unwrap();
        assert_eq!(config.store().stats().unwrap().chunks, 2);

        execute(&config, Command::DeleteBook { book_ids: vec!["b1".to_string()] }).unwrap();
        let doc = config.store().load().unwrap();
        assert_eq!(doc.chunks.len(), 1);
        assert_eq!(doc.chunks[0].id, "c");
    }

    #[test]
    fn test_ingest_sync_payload_with_deletions() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());
        let file = dir.path().join("sync.json");
        fs::write(&file, r#"{
            "chunks": [{"id": "x", "bookId": "keep", "embedding": [1], "text": "kept"},
                       {"id": "y", "bookId": "drop", "embedding": [1], "text": "dropped"}],
            "deletedBookIds": ["drop"]
        }"#).unwrap();

        execute(&config, Command::Ingest { file, delete_books: Vec::new() }).unwrap();

        let doc = config.store().load().unwrap();
        assert_eq!(doc.chunks.len(), 1);
        assert_eq!(doc.chunks[0].book_id, "keep");
    }

    #[test]
    fn test_ingest_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path());

        let result = execute(&config, Command::Ingest { file: dir.path().join("missing.json"), delete_books: Vec::new() });
        assert!(matches!(result, Err(LectroError::Read { .. })));
    }

    #[test]
    fn test_preview_truncates_and_flattens() {
        assert_eq!(preview("a\n  b", 10), "a b");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
    }
}
