//! Runtime settings, read from command-line flags with environment fallbacks.

use crate::store::VectorStore;
use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_EMBEDDING_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Library root; the store file lives directly inside it.
    #[arg(long, env = "LECTRO_LIBRARY_ROOT", default_value = "./library", global = true)]
    pub library_root: PathBuf,

    #[command(flatten)]
    pub embedding: EmbeddingSettings,
}

impl Config {
    pub fn new(library_root: impl Into<PathBuf>) -> Config {
        Config { library_root: library_root.into(), embedding: EmbeddingSettings::default() }
    }

    /// Store handle for `<library_root>/lectro_vectors.json`.
    pub fn store(&self) -> VectorStore {
        VectorStore::in_library(&self.library_root)
    }
}

/// Where and how to reach the embedding provider.
#[derive(Debug, Clone, Args)]
pub struct EmbeddingSettings {
    /// Base URL of an OpenAI-compatible API.
    #[arg(long = "embedding-url", env = "LECTRO_EMBEDDING_URL", default_value = DEFAULT_EMBEDDING_URL, global = true)]
    pub base_url: String,

    #[arg(long = "embedding-model", env = "LECTRO_EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    pub model: String,

    /// Missing keys only fail once an embedding is requested.
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    #[arg(long = "embedding-timeout", default_value_t = 30, global = true)]
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        EmbeddingSettings {
            base_url: DEFAULT_EMBEDDING_URL.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}
