//! REST API for Lectro.
//!
//! Exposes semantic search and vector sync over JSON. The store file is loaded
//! from disk on every request and written back after each sync.
//!
//! ## Endpoints
//!
//! - `POST /api/ai/search` - Embed a query and return the closest chunks
//! - `POST /api/ai/embed` - Embed arbitrary text
//! - `GET /api/library/vectors` - Return the whole store document
//! - `POST /api/library/vectors` - Merge chunks and delete books
//! - `GET /api/health` - Liveness plus chunk count
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lectro::{config::EmbeddingSettings, embedding::OpenAiEmbedder, server::{self, AppState}, VectorStore};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let embedder = OpenAiEmbedder::new(&EmbeddingSettings::default()).map_err(std::io::Error::other)?;
//!     let state = AppState::new(VectorStore::in_library("./library"), Arc::new(embedder));
//!     server::serve("127.0.0.1:7878", state).await
//! }
//! ```

use crate::embedding::EmbeddingProvider;
use crate::error::{LectroError, Result};
use crate::store::{Chunk, SearchHit, VectorStore};
use actix_web::{middleware::Logger, web, App, HttpResponse, HttpServer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Results returned when a search request names no limit.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Shared by every worker.
pub struct AppState {
    pub store: VectorStore,
    pub embedder: Arc<dyn EmbeddingProvider>,
}

impl AppState {
    pub fn new(store: VectorStore, embedder: Arc<dyn EmbeddingProvider>) -> web::Data<AppState> {
        web::Data::new(AppState { store, embedder })
    }
}

// --- Request structs ---

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct EmbedRequest {
    #[serde(default)]
    text: Option<String>,
}

/// Body of a vector sync write. Also accepted by the CLI `ingest` command.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub chunks: Option<Vec<Chunk>>,
    #[serde(default)]
    pub deleted_book_ids: Vec<String>,
}

// --- Response structs ---

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchMatch>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchMatch {
    /// Owning book, not the chunk id.
    id: String,
    score: f32,
    text: String,
    chapter_title: Option<String>,
}

impl From<SearchHit> for SearchMatch {
    fn from(hit: SearchHit) -> Self {
        SearchMatch {
            id: hit.book_id,
            score: hit.score,
            text: hit.text,
            chapter_title: hit.chapter_title,
        }
    }
}

#[derive(Serialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct SyncResponse {
    success: bool,
    count: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    chunks: usize,
}

// --- Handlers ---

async fn search_handler(state: web::Data<AppState>, body: web::Json<SearchRequest>) -> Result<HttpResponse> {
    let query = body.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(LectroError::validation("query is required"));
    }

    let limit = match body.limit {
        None => DEFAULT_SEARCH_LIMIT,
        Some(0) => return Err(LectroError::validation("limit must be greater than zero")),
        Some(n) => n,
    };

    let embedding = state.embedder.embed(query).await?;
    let hits = state.store.search(&embedding, limit)?;

    let results = hits.into_iter().map(SearchMatch::from).collect();
    Ok(HttpResponse::Ok().json(SearchResponse { results }))
}

async fn embed_handler(state: web::Data<AppState>, body: web::Json<EmbedRequest>) -> Result<HttpResponse> {
    let text = body.text.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(LectroError::validation("text is required"));
    }

    let embedding = state.embedder.embed(text).await?;
    Ok(HttpResponse::Ok().json(EmbedResponse { embedding }))
}

async fn vectors_get_handler(state: web::Data<AppState>) -> Result<HttpResponse> {
    let doc = state.store.load()?;
    Ok(HttpResponse::Ok().json(doc))
}

async fn vectors_sync_handler(state: web::Data<AppState>, body: web::Json<SyncRequest>) -> Result<HttpResponse> {
    let SyncRequest { chunks, deleted_book_ids } = body.into_inner();
    let chunks = chunks.ok_or_else(|| LectroError::validation("chunks must be an array"))?;
    let deleted: HashSet<String> = deleted_book_ids.into_iter().collect();

    let count = state.store.merge(chunks, &deleted)?;
    Ok(HttpResponse::Ok().json(SyncResponse { success: true, count }))
}

async fn health_handler(state: web::Data<AppState>) -> Result<HttpResponse> {
    let stats = state.store.stats()?;
    Ok(HttpResponse::Ok().json(HealthResponse { status: "ok", chunks: stats.chunks }))
}

/// Malformed bodies become validation errors instead of actix's plain-text 400.
fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024 * 1024)
        .error_handler(|err, _req| LectroError::validation(err.to_string()).into())
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
       .service(web::resource("/api/ai/search").route(web::post().to(search_handler)))
       .service(web::resource("/api/ai/embed").route(web::post().to(embed_handler)))
       .service(
           web::resource("/api/library/vectors")
               .route(web::get().to(vectors_get_handler))
               .route(web::post().to(vectors_sync_handler)),
       )
       .service(web::resource("/api/health").route(web::get().to(health_handler)));
}

/// Binds `addr` and serves until shutdown.
pub async fn serve(addr: &str, state: web::Data<AppState>) -> std::io::Result<()> {
    info!(%addr, store = %state.store.path().display(), "starting Lectro API");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(config)
    })
    .bind(addr)?
    .run()
    .await
}
