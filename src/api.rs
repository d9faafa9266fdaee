use crate::config::Config;
use crate::engine::{EngineStats, RetrievalEngine};
use crate::error::Error;
use crate::ranking::ScoredDocument;
use crate::snapshot::{RestoreStatus, Restored};
use crate::storage::{SledStorage, SnapshotStore, StorageError, StoredText};
use crate::tokenizer::StandardTokenizer;
use crate::VERSION;
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// State shared by the HTTP handlers and the CLI.
pub struct AppState {
    pub storage: SledStorage,
    pub config: Config,
}

impl AppState {
    pub fn new(storage: SledStorage, config: Config) -> Self {
        Self { storage, config }
    }

    /// Open the sled database under `config.data_dir`.
    pub fn open(config: Config) -> anyhow::Result<Self> {
        let storage = SledStorage::open(&config.data_dir)
            .with_context(|| format!("opening {}", config.data_dir.display()))?;
        Ok(Self::new(storage, config))
    }

    /// Rebuild the engine from whatever snapshot is stored, plus the raw bytes
    /// it came from for a later checked save.
    fn load_engine(&self) -> anyhow::Result<(Restored<StandardTokenizer>, Option<Vec<u8>>)> {
        let loaded = self.storage.load()?;
        let restored = RetrievalEngine::restore_bytes(loaded.as_deref());
        Ok((restored, loaded))
    }

    /// Add a batch to the stored index.
    ///
    /// The new snapshot and the batch's texts land in one transaction, and
    /// only if no other writer replaced the snapshot since it was loaded.
    /// A rejected batch persists nothing.
    pub fn ingest(&self, items: Vec<IngestItem>) -> anyhow::Result<IndexResponse> {
        let items: Vec<(String, Option<String>)> =
            items.into_iter().map(IngestItem::into_parts).collect();

        let (restored, loaded) = self.load_engine()?;
        let previous_state = restored.status;
        if previous_state == RestoreStatus::Corrupt {
            tracing::warn!("stored snapshot was corrupt, rebuilding from scratch");
        }
        let mut engine = restored.engine;

        let indices = engine.add_documents(items.iter().map(|(text, key)| (text.as_str(), key.clone())))?;
        let texts: Vec<(usize, StoredText)> = indices
            .iter()
            .copied()
            .zip(items)
            .map(|(index, (text, key))| (index, StoredText { key, text }))
            .collect();
        self.storage
            .commit_ingest(loaded.as_deref(), &engine.snapshot().to_bytes()?, &texts)?;

        tracing::info!(indexed = indices.len(), total = engine.len(), "data indexed");
        Ok(IndexResponse {
            indexed: indices.len(),
            total_documents: engine.len(),
            previous_state,
        })
    }

    /// Rank the stored documents against `question` and gather their texts.
    /// `k` falls back to the configured top-k.
    pub fn answer(&self, question: &str, k: Option<usize>) -> anyhow::Result<QuestionResponse> {
        let k = k.unwrap_or(self.config.top_k);
        let (restored, _) = self.load_engine()?;
        let mut engine = restored.engine;
        let results = engine.retrieve(question, k)?;

        let mut texts = Vec::with_capacity(results.len());
        for hit in &results {
            match self.storage.get_text(hit.index)? {
                Some(stored) => texts.push(stored.text),
                None => tracing::warn!(index = hit.index, "no retained text for document"),
            }
        }

        Ok(QuestionResponse {
            question: question.to_string(),
            results,
            context: texts.join(" "),
        })
    }

    pub fn stats(&self) -> anyhow::Result<StatsResponse> {
        let (restored, _) = self.load_engine()?;
        Ok(StatsResponse {
            engine: restored.engine.stats(),
            state: restored.status,
        })
    }
}

// ========== Request/Response Types ==========

/// One ingested document: a bare string or a keyed object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IngestItem {
    Text(String),
    Keyed {
        text: String,
        #[serde(default)]
        key: Option<String>,
    },
}

impl IngestItem {
    fn into_parts(self) -> (String, Option<String>) {
        match self {
            Self::Text(text) => (text, None),
            Self::Keyed { text, key } => (text, key),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub indexed: usize,
    pub total_documents: usize,
    pub previous_state: RestoreStatus,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub question: String,
    pub results: Vec<ScoredDocument>,
    /// Retained texts of the results, joined for prompt assembly.
    pub context: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub engine: EngineStats,
    pub state: RestoreStatus,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

// ========== Error Handling ==========

struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        if let Some(err) = self.0.downcast_ref::<Error>() {
            return match err {
                Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                Error::NotFound { .. } => StatusCode::NOT_FOUND,
            };
        }
        if let Some(StorageError::Conflict) = self.0.downcast_ref::<StorageError>() {
            return StatusCode::CONFLICT;
        }
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = format!("{:#}", self.0);
        if status.is_server_error() {
            tracing::error!("API error: {}", message);
        } else {
            tracing::info!(%status, "request rejected: {}", message);
        }

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

fn parse_items(body: serde_json::Value) -> Result<Vec<IngestItem>, Error> {
    if !body.is_array() {
        return Err(Error::InvalidInput("expected an array of documents".to_string()));
    }
    serde_json::from_value(body).map_err(|e| Error::InvalidInput(e.to_string()))
}

// ========== Handlers ==========

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "OK",
        version: VERSION,
    }))
}

async fn index_and_train(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let items = parse_items(body)?;
    Ok(Json(ApiResponse::success(state.ingest(items)?)))
}

async fn question(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let req: QuestionRequest =
        serde_json::from_value(body).map_err(|e| Error::InvalidInput(e.to_string()))?;
    Ok(Json(ApiResponse::success(state.answer(&req.question, req.k)?)))
}

async fn get_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(ApiResponse::success(state.stats()?)))
}

// ========== Router ==========

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/index_and_train", post(index_and_train))
        .route("/question", post(question))
        .route("/stats", get(get_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_items() {
        let body = serde_json::json!(["plain text", {"text": "keyed", "key": "k1"}, {"text": "no key"}]);
        let items: Vec<_> = parse_items(body)
            .unwrap()
            .into_iter()
            .map(IngestItem::into_parts)
            .collect();
        assert_eq!(items[0], ("plain text".to_string(), None));
        assert_eq!(items[1], ("keyed".to_string(), Some("k1".to_string())));
        assert_eq!(items[2], ("no key".to_string(), None));
    }

    #[test]
    fn test_parse_items_rejects_non_arrays() {
        assert!(matches!(
            parse_items(serde_json::json!({"text": "x"})),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            parse_items(serde_json::json!([42])),
            Err(Error::InvalidInput(_))
        ));
    }

    fn state() -> AppState {
        AppState::new(
            SledStorage::in_memory().unwrap(),
            Config::default().with_top_k(1),
        )
    }

    fn items(body: serde_json::Value) -> Vec<IngestItem> {
        parse_items(body).unwrap()
    }

    #[test]
    fn test_ingest_then_answer() {
        let state = state();
        let first = state
            .ingest(items(serde_json::json!([
                {"text": "Diesel engines rely on compression", "key": "engines"},
                "Forest spirits roam the woods"
            ])))
            .unwrap();
        assert_eq!(first.indexed, 2);
        assert_eq!(first.previous_state, RestoreStatus::Absent);

        let second = state.ingest(items(serde_json::json!(["Stars waltz in galaxies"]))).unwrap();
        assert_eq!(second.total_documents, 3);
        assert_eq!(second.previous_state, RestoreStatus::Restored);
        assert_eq!(state.storage.count_texts().unwrap(), 3);

        // configured top-k applies when the caller gives none
        let answer = state.answer("diesel engines", None).unwrap();
        assert_eq!(answer.results.len(), 1);
        assert_eq!(answer.results[0].key.as_deref(), Some("engines"));
        assert_eq!(answer.context, "Diesel engines rely on compression");

        let wider = state.answer("diesel engines", Some(3)).unwrap();
        assert_eq!(wider.results.len(), 3);
        assert_eq!(state.stats().unwrap().engine.total_documents, 3);
    }

    #[test]
    fn test_rejected_batch_persists_nothing() {
        let state = state();
        state.ingest(items(serde_json::json!(["kept"]))).unwrap();
        let before = state.storage.load().unwrap();

        let err = state
            .ingest(items(serde_json::json!(["fine", "   "])))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidInput(_))));
        assert_eq!(state.storage.load().unwrap(), before);
        assert_eq!(state.storage.count_texts().unwrap(), 1);
    }

    #[test]
    fn test_open_uses_data_dir() {
        let dir = std::env::temp_dir().join(format!("kbrank-open-{}", std::process::id()));
        let config = Config {
            data_dir: dir.clone(),
            ..Config::default()
        };
        {
            let state = AppState::open(config.clone()).unwrap();
            state.ingest(items(serde_json::json!(["persisted across opens"]))).unwrap();
        }
        let reopened = AppState::open(config).unwrap();
        assert_eq!(reopened.stats().unwrap().engine.total_documents, 1);
        drop(reopened);
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_error_status_mapping() {
        let invalid = AppError::from(Error::InvalidInput("x".to_string()));
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        let missing = AppError::from(Error::NotFound { index: 1, len: 0 });
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        let conflict = AppError::from(StorageError::Conflict);
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        let other = AppError::from(anyhow::anyhow!("disk on fire"));
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
