use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Path as AxumPath, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use rastro_core::paths::META_NAME;
use rastro_core::{analyzer, lang, Error, IndexConfig, Language, SearchConfig, SearchEngine};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
    /// Analyzer language override when query detection comes back unknown.
    pub language: Option<String>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_uid: String,
    pub score: f64,
    pub title: Option<String>,
    pub url: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
}

#[derive(Deserialize, Default)]
pub struct IndexRequest {
    pub corpus_path: Option<String>,
}

#[derive(Serialize)]
pub struct IndexBuildResponse {
    pub ok: bool,
    pub indexed_docs: u64,
    pub vocab_size: u64,
    pub index_path: String,
}

#[derive(Clone)]
pub struct AppState {
    pub index_dir: PathBuf,
    pub default_corpus: Option<PathBuf>,
    pub engine: Arc<Mutex<Option<SearchEngine>>>,
    pub index_cfg: IndexConfig,
    pub search_cfg: SearchConfig,
}

pub fn build_app(index_dir: PathBuf, default_corpus: Option<PathBuf>) -> Router {
    let state = AppState {
        index_dir,
        default_corpus,
        engine: Arc::new(Mutex::new(None)),
        index_cfg: IndexConfig::from_env(),
        search_cfg: SearchConfig::from_env(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_uid", get(doc_handler))
        .route("/index", post(index_handler))
        .with_state(state)
        .layer(cors)
}

type HandlerError = (StatusCode, String);

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, HandlerError> {
    let override_lang = match params.language.as_deref() {
        Some(code) => Some(Language::from_code(code.trim()).ok_or_else(|| {
            error_response(Error::UnsupportedLanguage(code.to_string()))
        })?),
        None => None,
    };

    let normalized = analyzer::normalize(&params.q);
    let (mut qlang, _conf) = lang::detect(&normalized);
    if qlang == Language::Unknown {
        qlang = override_lang.unwrap_or(state.search_cfg.default_query_language);
    }
    let terms = analyzer::analyze(&normalized, qlang, state.index_cfg.min_token_len);
    let top_k = params.k.unwrap_or(state.search_cfg.top_k);

    let mut guard = state.engine.lock();
    let engine = ensure_engine(&state, &mut guard)?;

    let ranked = engine.search(&terms, top_k);

    let mut results = Vec::with_capacity(ranked.len());
    for (doc_uid, score) in ranked {
        let meta = engine.get_doc_meta(&doc_uid);
        results.push(SearchHit {
            doc_uid,
            score,
            title: json_str(&meta, "title"),
            url: json_str(&meta, "url"),
            snippet: json_str(&meta, "snippet"),
        });
    }
    Ok(Json(SearchResponse {
        query: params.q,
        results,
    }))
}

pub async fn doc_handler(
    State(state): State<AppState>,
    AxumPath(doc_uid): AxumPath<String>,
) -> Result<Json<serde_json::Value>, HandlerError> {
    let mut guard = state.engine.lock();
    let engine = ensure_engine(&state, &mut guard)?;

    let meta = engine.get_doc_meta(&doc_uid);
    if meta.is_empty() {
        return Err((StatusCode::NOT_FOUND, format!("unknown document: {doc_uid}")));
    }
    Ok(Json(serde_json::Value::Object(meta)))
}

pub async fn index_handler(
    State(state): State<AppState>,
    body: Option<Json<IndexRequest>>,
) -> Result<Json<IndexBuildResponse>, HandlerError> {
    let Json(req) = body.unwrap_or_default();
    let corpus = req
        .corpus_path
        .map(PathBuf::from)
        .or_else(|| state.default_corpus.clone())
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                "no corpus path configured".to_string(),
            )
        })?;

    // Release the old engine's handles (including the sled lock) before the
    // build rewrites the index directory.
    *state.engine.lock() = None;

    let out_dir = state.index_dir.clone();
    let cfg = state.index_cfg.clone();
    let result = tokio::task::spawn_blocking(move || rastro_core::build(&corpus, &out_dir, &cfg))
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("index build task failed: {e}"),
            )
        })?
        .map_err(error_response)?;

    // Swap in an engine over the fresh index.
    let engine = SearchEngine::open(&result.meta_path).map_err(error_response)?;
    *state.engine.lock() = Some(engine);

    Ok(Json(IndexBuildResponse {
        ok: true,
        indexed_docs: result.n_docs,
        vocab_size: result.vocab_size,
        index_path: result.meta_path.display().to_string(),
    }))
}

fn ensure_engine<'a>(
    state: &AppState,
    guard: &'a mut Option<SearchEngine>,
) -> Result<&'a mut SearchEngine, HandlerError> {
    if guard.is_none() {
        let meta_path = state.index_dir.join(META_NAME);
        *guard = Some(SearchEngine::open(&meta_path).map_err(error_response)?);
    }
    guard.as_mut().ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "engine unavailable".to_string(),
        )
    })
}

fn error_response(err: Error) -> HandlerError {
    let status = match &err {
        Error::CorpusNotFound(_) => StatusCode::NOT_FOUND,
        Error::IndexNotReady(_) => StatusCode::BAD_REQUEST,
        Error::UnsupportedLanguage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn json_str(map: &serde_json::Map<String, serde_json::Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}
