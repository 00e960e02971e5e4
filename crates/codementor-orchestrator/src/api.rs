//! HTTP API for the CodeMentor orchestrator.
//!
//! Learners' front ends call these endpoints. The session is identified by
//! the `x-session-id` header; `POST /select-language` mints one when the
//! header is absent and returns it in both the body and the response header.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness and model name
//! - `GET /available-languages` - Supported languages
//! - `GET /curriculum` - All topics
//! - `POST /select-language` - Start or reset a session
//! - `GET /lesson/:lesson_id` - Generate a lesson
//! - `GET /generate-quiz/:lesson_id` - Issue a quiz
//! - `POST /submit-quiz` - Grade a quiz
//! - `GET /generate-coding-challenge` - Issue a coding challenge
//! - `POST /submit-code` - Review code for a challenge
//! - `POST /ask-tutor` - Ask a contextual question
//! - `GET /session-status` - Progress snapshot
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use codementor_orchestrator::{create_router, AppState, Config, ContentGenerator};
//!
//! # async fn example(generator: Arc<dyn ContentGenerator>) {
//! let state = AppState::new(Config::default(), generator);
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8000").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::{ErrorKind, TutorError};
use crate::generator::ContentGenerator;
use crate::language::LanguageInfo;
use crate::orchestrator::{
    ChallengeView, CodeReview, LessonView, Orchestrator, QuizGrade, QuizView, SessionStatus,
    TopicSummary, TutorAnswer,
};
use crate::Config;

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "x-session-id";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for `POST /select-language`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectLanguageRequest {
    /// Language name, matched case-insensitively.
    pub language: String,
}

/// Request body for `POST /submit-quiz`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuizRequest {
    /// Lesson whose quiz is being answered.
    pub lesson_id: u32,
    /// Chosen option index per question, in order.
    pub answers: Vec<usize>,
}

/// Query string for `GET /generate-coding-challenge`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChallengeQuery {
    /// Specific challenge-eligible topic to use.
    pub topic_id: Option<u32>,
}

/// Request body for `POST /submit-code`.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitCodeRequest {
    /// The learner's source code.
    pub code: String,
    /// Challenge being answered.
    pub challenge_id: String,
}

/// Request body for `POST /ask-tutor`.
#[derive(Debug, Clone, Deserialize)]
pub struct AskTutorRequest {
    /// The learner's question.
    pub question: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `"ok"`.
    pub status: String,
    /// Generation model in use.
    pub model: String,
    /// Number of sessions held in memory.
    pub sessions: usize,
}

/// Response body for `GET /available-languages`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagesResponse {
    /// Supported languages.
    pub languages: Vec<LanguageInfo>,
}

/// Response body for `GET /curriculum`.
#[derive(Debug, Clone, Serialize)]
pub struct CurriculumResponse {
    /// Number of topics.
    pub total_lessons: usize,
    /// Topics in order.
    pub topics: Vec<TopicSummary>,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
    /// Error classification.
    pub kind: ErrorKind,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The orchestrator serving requests.
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Creates state with a fresh orchestrator over `generator`.
    #[must_use]
    pub fn new(config: Config, generator: Arc<dyn ContentGenerator>) -> Self {
        Self {
            orchestrator: Arc::new(Orchestrator::new(config, generator)),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Internal error type for API handlers.
#[derive(Debug)]
enum ApiError {
    /// The orchestrator rejected the operation.
    Tutor(TutorError),
    /// The request is missing or has an unusable field.
    InvalidRequest(String),
}

impl From<TutorError> for ApiError {
    fn from(err: TutorError) -> Self {
        Self::Tutor(err)
    }
}

/// HTTP status for an orchestrator error.
const fn status_for(err: &TutorError) -> StatusCode {
    match err {
        TutorError::LessonNotFound { .. } | TutorError::SessionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        _ => match err.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::State => StatusCode::CONFLICT,
            ErrorKind::Generation => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Tutor(err) => (
                status_for(&err),
                ErrorResponse {
                    error: err.to_string(),
                    kind: err.kind(),
                },
            ),
            Self::InvalidRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: message,
                    kind: ErrorKind::Validation,
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}

/// Reads the session id from the request headers.
fn session_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ApiError::InvalidRequest(format!(
                "missing {SESSION_HEADER} header; call /select-language first"
            ))
        })
}

fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::InvalidRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all endpoints, CORS, and request tracing.
pub fn create_router(state: AppState) -> Router {
    // Front ends are served from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/available-languages", get(handle_available_languages))
        .route("/curriculum", get(handle_curriculum))
        .route("/select-language", post(handle_select_language))
        .route("/lesson/:lesson_id", get(handle_lesson))
        .route("/generate-quiz/:lesson_id", get(handle_generate_quiz))
        .route("/submit-quiz", post(handle_submit_quiz))
        .route("/generate-coding-challenge", get(handle_generate_challenge))
        .route("/submit-code", post(handle_submit_code))
        .route("/ask-tutor", post(handle_ask_tutor))
        .route("/session-status", get(handle_session_status))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.orchestrator.model_name().to_string(),
        sessions: state.orchestrator.session_count().await,
    })
}

async fn handle_available_languages() -> Json<LanguagesResponse> {
    Json(LanguagesResponse {
        languages: Orchestrator::available_languages(),
    })
}

async fn handle_curriculum(State(state): State<Arc<AppState>>) -> Json<CurriculumResponse> {
    Json(CurriculumResponse {
        total_lessons: state.orchestrator.curriculum().len(),
        topics: state.orchestrator.topics(),
    })
}

/// Handler for `POST /select-language`.
///
/// Uses the `x-session-id` header when present, otherwise mints a new id.
async fn handle_select_language(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SelectLanguageRequest>,
) -> Result<Response, ApiError> {
    let requested = session_id(&headers).ok();
    info!(session_id = ?requested, language = %request.language, "Language selection requested");

    let selection = state
        .orchestrator
        .select_language(requested.as_deref(), &request.language)
        .await?;

    let header = HeaderValue::from_str(&selection.session_id).ok();
    let mut response = Json(selection).into_response();
    if let Some(value) = header {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    Ok(response)
}

async fn handle_lesson(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<u32>,
) -> Result<Json<LessonView>, ApiError> {
    let session_id = session_id(&headers)?;
    let lesson = state.orchestrator.get_lesson(&session_id, lesson_id).await?;
    Ok(Json(lesson))
}

async fn handle_generate_quiz(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(lesson_id): Path<u32>,
) -> Result<Json<QuizView>, ApiError> {
    let session_id = session_id(&headers)?;
    let quiz = state
        .orchestrator
        .generate_quiz(&session_id, lesson_id)
        .await?;
    Ok(Json(quiz))
}

async fn handle_submit_quiz(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmitQuizRequest>,
) -> Result<Json<QuizGrade>, ApiError> {
    let session_id = session_id(&headers)?;
    let grade = state
        .orchestrator
        .submit_quiz(&session_id, request.lesson_id, &request.answers)
        .await?;
    Ok(Json(grade))
}

async fn handle_generate_challenge(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<ChallengeView>, ApiError> {
    let session_id = session_id(&headers)?;
    let challenge = state
        .orchestrator
        .generate_challenge(&session_id, query.topic_id)
        .await?;
    Ok(Json(challenge))
}

async fn handle_submit_code(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SubmitCodeRequest>,
) -> Result<Json<CodeReview>, ApiError> {
    let session_id = session_id(&headers)?;
    require_text("code", &request.code).map_err(|e| {
        warn!(session_id = %session_id, "Empty code submission");
        e
    })?;
    let review = state
        .orchestrator
        .submit_code(&session_id, &request.code, &request.challenge_id)
        .await?;
    Ok(Json(review))
}

async fn handle_ask_tutor(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<AskTutorRequest>,
) -> Result<Json<TutorAnswer>, ApiError> {
    let session_id = session_id(&headers)?;
    require_text("question", &request.question)?;
    let answer = state
        .orchestrator
        .ask_tutor(&session_id, &request.question)
        .await?;
    Ok(Json(answer))
}

async fn handle_session_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<SessionStatus>, ApiError> {
    let session_id = session_id(&headers)?;
    let status = state.orchestrator.session_status(&session_id).await?;
    Ok(Json(status))
}

// ============================================================================
// Tests
// ============================================================================
