use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Json, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use moodring_journal::{build_graph, timeline, JournalError};
use moodring_schemas::{
    CreateInfluenceRequest, CreateLinkRequest, ErrorResponse, Influence, InfluenceGraph,
    InfluenceId, InfluenceLink, Reflection, TimelineEntry,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))

        // Influences
        .route("/influences", get(list_influences).post(create_influence))
        .route("/influences/:id", delete(delete_influence))
        .route("/influences/:id/links", get(influence_links))
        .route("/influences/:id/analysis", post(analyze_connections))

        // Links
        .route("/links", get(list_links).post(create_link))

        // Views
        .route("/timeline", get(get_timeline))
        .route("/graph", get(get_graph))

        // Reflections
        .route("/reflections/weekly", post(weekly_reflection))

        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// User-facing error body. Internal detail is logged, never returned.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<JournalError> for ApiError {
    fn from(err: JournalError) -> Self {
        let status = match &err {
            JournalError::EmptyContent | JournalError::SelfLink(_) => StatusCode::BAD_REQUEST,
            JournalError::NotFound(_) => StatusCode::NOT_FOUND,
            JournalError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Journal request failed: {}", err);
        } else {
            warn!("Rejected journal request: {}", err);
        }

        Self {
            status,
            message: err.user_message(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        warn!("Rejected request body: {}", rejection.body_text());
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "That request could not be read. Please check the fields and try again.",
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        warn!("Rejected request path: {}", rejection.body_text());
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "That influence id is not valid.",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "moodring",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_influences(State(state): State<AppState>) -> ApiResult<Json<Vec<Influence>>> {
    Ok(Json(state.repository.list_influences()?))
}

async fn create_influence(
    State(state): State<AppState>,
    body: Result<Json<CreateInfluenceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Influence>)> {
    let Json(request) = body?;
    let influence = state.repository.create_influence(&request.content)?;
    info!("Created influence {}", influence.id);
    Ok((StatusCode::CREATED, Json(influence)))
}

async fn delete_influence(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    let Path(id) = path?;
    state.repository.delete_influence(InfluenceId(id))?;
    info!("Deleted influence {}", id);
    Ok(StatusCode::NO_CONTENT)
}

async fn influence_links(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Vec<InfluenceLink>>> {
    let Path(id) = path?;
    let id = InfluenceId(id);
    state.repository.get_influence(id)?;
    Ok(Json(state.repository.list_links_for(id)?))
}

async fn analyze_connections(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Reflection>> {
    let Path(id) = path?;
    Ok(Json(state.analyze_connections(InfluenceId(id)).await))
}

async fn list_links(State(state): State<AppState>) -> ApiResult<Json<Vec<InfluenceLink>>> {
    Ok(Json(state.repository.list_links()?))
}

async fn create_link(
    State(state): State<AppState>,
    body: Result<Json<CreateLinkRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<InfluenceLink>)> {
    let Json(request) = body?;
    let link = state
        .repository
        .create_link(request.source_id, request.target_id)?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn get_timeline(State(state): State<AppState>) -> ApiResult<Json<Vec<TimelineEntry>>> {
    let influences = state.repository.list_influences()?;
    let links = state.repository.list_links()?;
    Ok(Json(timeline(&influences, &links)))
}

async fn get_graph(State(state): State<AppState>) -> ApiResult<Json<InfluenceGraph>> {
    let influences = state.repository.list_influences()?;
    let links = state.repository.list_links()?;
    Ok(Json(build_graph(&influences, &links)))
}

async fn weekly_reflection(State(state): State<AppState>) -> Json<Reflection> {
    Json(state.weekly_reflection().await)
}
