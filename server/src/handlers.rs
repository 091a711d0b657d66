use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use common::{HealthResponse, ResearchRequest, ResearchResponse, ResearchResult};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::error::OrchestratorError;
use crate::state::{AppState, SERVICE_NAME};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/research", post(start_research))
        .route("/api/v1/research/:id", get(get_research))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

// Crea la tarea y responde enseguida; la ejecución sigue en segundo plano
async fn start_research(
    State(state): State<AppState>,
    Json(req): Json<ResearchRequest>,
) -> Result<Json<ResearchResponse>, OrchestratorError> {
    let task = state.orchestrator.submit(&req.query, req.session_id)?;

    info!("nueva investigación {} (session={:?})", task.id, task.session_id);

    Ok(Json(ResearchResponse {
        task_id: task.id.clone(),
        status: task.state,
        message: "Research task started".to_string(),
    }))
}

async fn get_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ResearchResult>, OrchestratorError> {
    let task = state.orchestrator.status(&id)?;
    Ok(Json(ResearchResult::from(task.as_ref())))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;

    let tasks = orchestrator
        .store()
        .counts()
        .into_iter()
        .map(|(s, n)| (s.as_str().to_string(), n))
        .collect();

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        executor_available: orchestrator.executor_available(),
        in_flight: orchestrator.in_flight(),
        tasks,
    })
}
