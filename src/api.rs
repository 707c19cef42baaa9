use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use log::error;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::app::App;
use crate::error::StudyError;
use crate::generator::GenerationRequest;
use crate::models::Difficulty;

#[derive(Clone)]
pub struct ApiState {
    pub app: Arc<Mutex<App>>,
}

pub fn app_router(state: ApiState) -> Router {
    Router::new()
        .route("/api/flashcards/generate", post(generate_flashcards))
        .route("/api/quiz/generate", post(generate_quiz))
        .route("/api/cards/due", get(due_cards))
        .route("/api/cards/:id/review", post(review_card))
        .route("/api/cards/:id", delete(remove_card))
        .route("/api/usage", get(usage))
        .route("/api/content/analyze", post(analyze_content))
        .route("/api/session", get(session))
        .route("/api/session/notices/:id", delete(dismiss_notice))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(err: anyhow::Error) -> Response {
    let status = match err.downcast_ref::<StudyError>() {
        Some(StudyError::InvalidQuality(_)) | Some(StudyError::InvalidRequest(_)) => StatusCode::BAD_REQUEST,
        Some(StudyError::CardNotFound(_)) => StatusCode::NOT_FOUND,
        Some(StudyError::UsageLimitReached { .. }) => StatusCode::TOO_MANY_REQUESTS,
        None => {
            error!("request failed: {:#}", err);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string()).into_response()
}

fn default_count() -> usize {
    5
}

#[derive(Deserialize)]
struct GenerateBody {
    content: String,
    #[serde(default)]
    topic: String,
    #[serde(default)]
    difficulty: Difficulty,
    #[serde(default = "default_count")]
    count: usize,
}

impl From<GenerateBody> for GenerationRequest {
    fn from(body: GenerateBody) -> Self {
        GenerationRequest {
            content: body.content,
            topic: body.topic,
            difficulty: body.difficulty,
            count: body.count,
        }
    }
}

async fn generate_flashcards(State(state): State<ApiState>, Json(body): Json<GenerateBody>) -> Response {
    let mut app = state.app.lock().await;
    match app.generate_flashcards(body.into()).await {
        Ok(generated) => Json(generated).into_response(),
        Err(e) => error_response(e),
    }
}

async fn generate_quiz(State(state): State<ApiState>, Json(body): Json<GenerateBody>) -> Response {
    let mut app = state.app.lock().await;
    match app.generate_quiz(body.into()).await {
        Ok(generated) => Json(generated).into_response(),
        Err(e) => error_response(e),
    }
}

async fn due_cards(State(state): State<ApiState>) -> Response {
    let mut app = state.app.lock().await;
    match app.load_due(Utc::now()).await {
        Ok(cards) => Json(cards).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct ReviewBody {
    quality: u8,
}

async fn review_card(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ReviewBody>,
) -> Response {
    let mut app = state.app.lock().await;
    match app.review(id, body.quality, Utc::now()).await {
        Ok(card) => Json(card).into_response(),
        Err(e) => error_response(e),
    }
}

async fn remove_card(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    let mut app = state.app.lock().await;
    match app.remove_card(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(e),
    }
}

async fn usage(State(state): State<ApiState>) -> Response {
    let app = state.app.lock().await;
    match app.usage_report().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct AnalyzeBody {
    content: String,
}

async fn analyze_content(State(state): State<ApiState>, Json(body): Json<AnalyzeBody>) -> impl IntoResponse {
    let app = state.app.lock().await;
    Json(app.analyze(&body.content))
}

async fn session(State(state): State<ApiState>) -> impl IntoResponse {
    let app = state.app.lock().await;
    Json(app.session.clone())
}

async fn dismiss_notice(State(state): State<ApiState>, Path(id): Path<Uuid>) -> StatusCode {
    let mut app = state.app.lock().await;
    if app.dismiss_notice(id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}
