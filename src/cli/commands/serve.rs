//! HTTP API server for the course assistant.
//!
//! Provides REST endpoints for queries and course statistics.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::tools::Source;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
pub struct AppState {
    orchestrator: Orchestrator,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }
}

/// Build the API router.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/query", post(query))
        .route("/api/courses", get(courses))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: &str,
    port: u16,
    docs: Option<String>,
    settings: Settings,
) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    if let Some(docs) = docs {
        let path = Settings::expand_path(&docs);
        match orchestrator.add_course_folder(&path, false).await {
            Ok((courses, chunks)) => {
                Output::success(&format!("Loaded {} courses ({} chunks)", courses, chunks))
            }
            Err(e) => Output::warning(&format!("Could not load {}: {}", path.display(), e)),
        }
    }

    let app = router(Arc::new(AppState::new(orchestrator)));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Kurs API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Query", "POST /api/query");
    Output::kv("Courses", "GET  /api/courses");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    answer: String,
    sources: Vec<Source>,
    session_id: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

fn internal_error(e: impl std::fmt::Display) -> Response {
    error!("Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            detail: e.to_string(),
        }),
    )
        .into_response()
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn query(State(state): State<Arc<AppState>>, Json(req): Json<QueryRequest>) -> Response {
    let session_id = match req.session_id {
        Some(id) => id,
        None => match state.orchestrator.sessions().create_session() {
            Ok(id) => id,
            Err(e) => return internal_error(e),
        },
    };

    info!("Query in {}", session_id);
    match state.orchestrator.query(&req.query, Some(&session_id)).await {
        Ok(response) => Json(QueryResponse {
            answer: response.answer,
            sources: response.sources,
            session_id,
        })
        .into_response(),
        Err(e) => internal_error(e),
    }
}

async fn courses(State(state): State<Arc<AppState>>) -> Response {
    match state.orchestrator.get_course_analytics().await {
        Ok(analytics) => Json(analytics).into_response(),
        Err(e) => internal_error(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Prompts;
    use crate::error::KursError;
    use crate::rag::ModelResponse;
    use crate::test_support::{sample_courses, FailingIndex, KeywordEmbedder, ScriptedModel};
    use crate::vector_store::MemoryCourseIndex;

    fn state(index: Arc<dyn crate::vector_store::CourseIndex>, model: ScriptedModel) -> Arc<AppState> {
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            index,
            Arc::new(KeywordEmbedder::new()),
            Arc::new(model),
        )
        .unwrap();
        Arc::new(AppState::new(orchestrator))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_query_creates_session() {
        let state = state(
            Arc::new(MemoryCourseIndex::new()),
            ScriptedModel::new(vec![Ok(ModelResponse::text("Hello"))]),
        );

        let response = query(
            State(state),
            Json(QueryRequest {
                query: "hi".to_string(),
                session_id: None,
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["answer"], "Hello");
        assert_eq!(body["session_id"], "session_1");
        assert_eq!(body["sources"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_query_failure_is_500_with_detail() {
        let state = state(
            Arc::new(MemoryCourseIndex::new()),
            ScriptedModel::new(vec![Err(KursError::OpenAI("unauthorized".to_string()))]),
        );

        let response = query(
            State(state),
            Json(QueryRequest {
                query: "hi".to_string(),
                session_id: Some("session_7".to_string()),
            }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().unwrap().contains("unauthorized"));
    }

    #[tokio::test]
    async fn test_courses_endpoint() {
        let index = Arc::new(MemoryCourseIndex::new());
        let state = state(index, ScriptedModel::new(Vec::new()));
        for course in sample_courses() {
            state.orchestrator.add_course(&course, &[]).await.unwrap();
        }

        let response = courses(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["total_courses"], 2);
        assert_eq!(
            body["course_titles"],
            serde_json::json!(["Advanced Python", "Python Programming"])
        );
    }

    #[tokio::test]
    async fn test_courses_endpoint_error() {
        let state = state(Arc::new(FailingIndex::new("offline")), ScriptedModel::new(Vec::new()));
        let response = courses(State(state)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
