//! Pulso HTTP REST API
//!
//! Axum-based HTTP server for the patient app and the clinician dashboard.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function returning `(StatusCode, serde_json::Value)`. The inner
//! functions are directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /health                              : health check with DB status
//! - GET    /version                             : server version info
//! - POST   /api/chat                            : one chat turn
//! - POST   /api/analyze-food                    : nutrition JSON for free text
//! - POST   /api/avatar                          : create/complete avatar challenges
//! - GET    /api/patients                        : dashboard list + summary
//! - POST   /api/patients                        : intake
//! - GET    /api/patients/:id                    : patient record
//! - PATCH  /api/patients/:id                    : clinician edit
//! - DELETE /api/patients/:id                    : clinician delete
//! - GET    /api/patients/:id/chat               : chat history
//! - GET    /api/patients/:id/avatar             : avatar + challenges
//! - GET    /api/patients/:id/visual             : body mesh scale
//! - GET    /api/patients/:id/food-logs          : food log list
//! - POST   /api/patients/:id/food-logs          : analyze and store food
//! - GET    /api/patients/:id/health-logs        : weight/stress series
//! - POST   /api/patients/:id/health-logs        : record weight/stress
//! - GET    /api/patients/:id/challenges         : clinician checklist
//! - POST   /api/patients/:id/challenges         : add checklist item
//! - PATCH  /api/challenges/:id                  : toggle checklist item
//! - GET    /api/patients/:id/reports/chat       : chat history PDF
//! - GET    /api/patients/:id/reports/summary    : patient summary PDF
//! - GET    /api/dashboard/summary               : total/critical/stable

use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use pulso_core::api::{
    AnalyzeFoodRequest, AvatarAction, ChatRequest, ChecklistRequest, ChecklistToggle,
    FoodLogRequest, HealthLogRequest,
};
use pulso_core::completion::{CompletionBackend, OpenAiCompatClient};
use pulso_core::models::{NewPatient, PatientUpdate};
use pulso_core::visual::VisualState;
use pulso_core::{summarize, PulsoConfig, PulsoError};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::subsystems::dashboard::RenderedReport;
use crate::subsystems::{avatar, biometrics, chat, dashboard, food, intake};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;

/// A JSON body, or the reason axum could not extract one.
pub type JsonPayload<T> = std::result::Result<Json<T>, JsonRejection>;

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub config: PulsoConfig,
    /// `None` when no completion API key is configured; completion endpoints
    /// then answer 500.
    pub completion: Option<Arc<dyn CompletionBackend>>,
}

impl HttpState {
    pub fn new(pool: PgPool, config: PulsoConfig) -> Self {
        let completion = match OpenAiCompatClient::from_settings(&config.completion) {
            Ok(client) => {
                tracing::info!(model = %config.completion.model, "Completion client ready");
                Some(Arc::new(client) as Arc<dyn CompletionBackend>)
            }
            Err(e) => {
                tracing::warn!(
                    env = %config.completion.api_key_env,
                    error = %e,
                    "Completion client unavailable; chat and food analysis will return 500"
                );
                None
            }
        };
        Self::with_completion(pool, config, completion)
    }

    pub fn with_completion(
        pool: PgPool,
        config: PulsoConfig,
        completion: Option<Arc<dyn CompletionBackend>>,
    ) -> Self {
        Self {
            pool,
            config,
            completion,
        }
    }

    fn completion(&self) -> std::result::Result<&dyn CompletionBackend, PulsoError> {
        self.completion.as_deref().ok_or(PulsoError::MissingApiKey)
    }
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/chat", post(chat_handler).fallback(method_not_allowed))
        .route(
            "/api/analyze-food",
            post(analyze_food_handler).fallback(method_not_allowed),
        )
        .route("/api/avatar", post(avatar_handler).fallback(method_not_allowed))
        .route(
            "/api/patients",
            get(list_patients_handler).post(create_patient_handler),
        )
        .route(
            "/api/patients/:id",
            get(get_patient_handler)
                .patch(update_patient_handler)
                .delete(delete_patient_handler),
        )
        .route("/api/patients/:id/chat", get(chat_history_handler))
        .route("/api/patients/:id/avatar", get(avatar_state_handler))
        .route("/api/patients/:id/visual", get(visual_handler))
        .route(
            "/api/patients/:id/food-logs",
            get(list_food_logs_handler).post(log_food_handler),
        )
        .route(
            "/api/patients/:id/health-logs",
            get(list_health_logs_handler).post(record_health_log_handler),
        )
        .route(
            "/api/patients/:id/challenges",
            get(list_checklist_handler).post(add_checklist_handler),
        )
        .route("/api/challenges/:id", patch(toggle_checklist_handler))
        .route("/api/patients/:id/reports/chat", get(chat_report_handler))
        .route("/api/patients/:id/reports/summary", get(patient_report_handler))
        .route("/api/dashboard/summary", get(dashboard_summary_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    pool: PgPool,
    config: PulsoConfig,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let state = Arc::new(HttpState::new(pool, config));

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Pulso HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ListParams {
    pub limit: Option<i64>,
}

impl ListParams {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT)
    }
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Map a domain error onto an HTTP status and JSON body.
pub fn error_response(err: &PulsoError) -> (StatusCode, serde_json::Value) {
    let status = match err {
        PulsoError::Validation(_) => StatusCode::BAD_REQUEST,
        PulsoError::NotFound(_) => StatusCode::NOT_FOUND,
        PulsoError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let mut body = ErrorResponse::new(err.to_string());
    match err {
        PulsoError::Nutrition(e) => {
            if let Some(raw) = e.raw() {
                body = body.with_details(raw);
            }
        }
        PulsoError::Completion(e) => body = body.with_details(e.to_string()),
        _ => {}
    }

    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    } else {
        tracing::debug!(error = %err, "Request rejected");
    }

    (
        status,
        serde_json::to_value(body).unwrap_or_else(|_| serde_json::json!({"status": "error"})),
    )
}

fn respond<T: Serialize>(
    ok: StatusCode,
    result: pulso_core::error::Result<T>,
) -> (StatusCode, serde_json::Value) {
    match result.and_then(|value| serde_json::to_value(value).map_err(PulsoError::from)) {
        Ok(body) => (ok, body),
        Err(e) => error_response(&e),
    }
}

fn bad_request(msg: &str) -> (StatusCode, serde_json::Value) {
    error_response(&PulsoError::Validation(msg.to_string()))
}

/// Unwraps an extracted body. Malformed JSON, a wrong content type or a
/// field of the wrong type answer 400 in the usual error shape.
pub fn json_body<T>(
    payload: JsonPayload<T>,
) -> std::result::Result<T, (StatusCode, serde_json::Value)> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| bad_request(&rejection.body_text()))
}

/// Like `json_body`, but a missing completion key wins over any body error.
fn completion_body<T>(
    state: &HttpState,
    payload: JsonPayload<T>,
) -> std::result::Result<(&dyn CompletionBackend, T), (StatusCode, serde_json::Value)> {
    let backend = state.completion().map_err(|e| error_response(&e))?;
    Ok((backend, json_body(payload)?))
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner health check: queries DB and returns (status_code, json_body).
pub async fn health_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let pg_ver = match pulso_core::db::health_check(&state.pool).await {
        Ok(v) => v,
        Err(e) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "status": "unhealthy",
                    "error": e.to_string(),
                }),
            );
        }
    };

    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "postgresql": pg_ver,
            "completion_configured": state.completion.is_some(),
        }),
    )
}

/// Inner version: returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "pulso/1",
    })
}

/// Inner chat: one turn: key check, validation, completion, persistence.
pub async fn chat_inner(state: &HttpState, req: ChatRequest) -> (StatusCode, serde_json::Value) {
    let backend = match state.completion() {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let user_message = match req.user_message {
        Some(m) if !m.trim().is_empty() => m,
        _ => return bad_request("userMessage is required"),
    };
    let patient_id = match req.patient_id {
        Some(id) => id,
        None => return bad_request("patientId is required"),
    };

    let result = chat::send_message(
        &state.pool,
        backend,
        patient_id,
        &user_message,
        req.system_prompt.as_deref(),
    )
    .await
    .map(|message| serde_json::json!({ "message": message }));

    respond(StatusCode::OK, result)
}

/// Inner analyze-food: returns `{calories, nutrients}`.
pub async fn analyze_food_inner(
    state: &HttpState,
    req: AnalyzeFoodRequest,
) -> (StatusCode, serde_json::Value) {
    let backend = match state.completion() {
        Ok(b) => b,
        Err(e) => return error_response(&e),
    };

    let food_text = match req.food_text {
        Some(t) if !t.trim().is_empty() => t,
        _ => return bad_request("foodText is required"),
    };

    respond(StatusCode::OK, food::analyze_food(backend, &food_text).await)
}

/// Inner avatar: parses the tagged action and dispatches it.
pub async fn avatar_inner(
    state: &HttpState,
    payload: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let action: AvatarAction = match serde_json::from_value(payload) {
        Ok(a) => a,
        Err(e) => return bad_request(&format!("Invalid avatar action: {}", e)),
    };

    respond(
        StatusCode::OK,
        crate::router::handle_avatar_action(action, &state.pool, &state.config).await,
    )
}

pub async fn create_patient_inner(
    state: &HttpState,
    input: NewPatient,
) -> (StatusCode, serde_json::Value) {
    respond(
        StatusCode::CREATED,
        intake::create_patient(&state.pool, input).await,
    )
}

/// Inner dashboard list: patients with avatars plus the summary counts.
pub async fn list_patients_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let result = dashboard::list_patients_with_avatar(&state.pool)
        .await
        .map(|patients| {
            let summary = summarize(&patients, state.config.avatar.critical_threshold);
            serde_json::json!({ "patients": patients, "summary": summary })
        });
    respond(StatusCode::OK, result)
}

pub async fn dashboard_summary_inner(state: &HttpState) -> (StatusCode, serde_json::Value) {
    let result = dashboard::list_patients_with_avatar(&state.pool)
        .await
        .map(|patients| summarize(&patients, state.config.avatar.critical_threshold));
    respond(StatusCode::OK, result)
}

pub async fn visual_inner(state: &HttpState, patient_id: Uuid) -> (StatusCode, serde_json::Value) {
    let result = async {
        intake::get_patient(&state.pool, patient_id).await?;
        let latest = biometrics::latest_health_log(&state.pool, patient_id).await?;
        Ok::<_, PulsoError>(VisualState::for_weight(
            &state.config.avatar.model_url,
            latest.map(|h| h.weight),
        ))
    }
    .await;
    respond(StatusCode::OK, result)
}

fn report_response(result: pulso_core::error::Result<RenderedReport>) -> Response {
    match result {
        Ok(report) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/pdf".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", report.filename),
                ),
            ],
            report.bytes,
        )
            .into_response(),
        Err(e) => {
            let (status, body) = error_response(&e);
            (status, Json(body)).into_response()
        }
    }
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({
            "error": "Method not allowed",
            "status": "error",
        })),
    )
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    payload: JsonPayload<ChatRequest>,
) -> impl IntoResponse {
    let (status, body) = match completion_body(&state, payload) {
        Ok((_, req)) => chat_inner(&state, req).await,
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn analyze_food_handler(
    State(state): State<Arc<HttpState>>,
    payload: JsonPayload<AnalyzeFoodRequest>,
) -> impl IntoResponse {
    let (status, body) = match completion_body(&state, payload) {
        Ok((_, req)) => analyze_food_inner(&state, req).await,
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn avatar_handler(
    State(state): State<Arc<HttpState>>,
    payload: JsonPayload<serde_json::Value>,
) -> impl IntoResponse {
    let (status, body) = match json_body(payload) {
        Ok(value) => avatar_inner(&state, value).await,
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn list_patients_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_patients_inner(&state).await;
    (status, Json(body))
}

pub async fn create_patient_handler(
    State(state): State<Arc<HttpState>>,
    payload: JsonPayload<NewPatient>,
) -> impl IntoResponse {
    let (status, body) = match json_body(payload) {
        Ok(input) => create_patient_inner(&state, input).await,
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn get_patient_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = respond(StatusCode::OK, intake::get_patient(&state.pool, id).await);
    (status, Json(body))
}

pub async fn update_patient_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    payload: JsonPayload<PatientUpdate>,
) -> impl IntoResponse {
    let (status, body) = match json_body(payload) {
        Ok(update) => respond(
            StatusCode::OK,
            intake::update_patient(&state.pool, id, update).await,
        ),
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn delete_patient_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let result = intake::delete_patient(&state.pool, id)
        .await
        .map(|_| serde_json::json!({ "success": true }));
    let (status, body) = respond(StatusCode::OK, result);
    (status, Json(body))
}

pub async fn chat_history_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = respond(StatusCode::OK, chat::load_history(&state.pool, id).await);
    (status, Json(body))
}

pub async fn avatar_state_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = respond(StatusCode::OK, avatar::avatar_state(&state.pool, id).await);
    (status, Json(body))
}

pub async fn visual_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = visual_inner(&state, id).await;
    (status, Json(body))
}

pub async fn list_food_logs_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let (status, body) = respond(
        StatusCode::OK,
        food::list_food_logs(&state.pool, id, params.limit()).await,
    );
    (status, Json(body))
}

pub async fn log_food_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    payload: JsonPayload<FoodLogRequest>,
) -> impl IntoResponse {
    let (status, body) = match completion_body(&state, payload) {
        Ok((backend, req)) => respond(
            StatusCode::CREATED,
            food::log_food(&state.pool, backend, id, &req.description).await,
        ),
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn list_health_logs_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ListParams>,
) -> impl IntoResponse {
    let (status, body) = respond(
        StatusCode::OK,
        biometrics::list_health_logs(&state.pool, id, params.limit()).await,
    );
    (status, Json(body))
}

pub async fn record_health_log_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    payload: JsonPayload<HealthLogRequest>,
) -> impl IntoResponse {
    let (status, body) = match json_body(payload) {
        Ok(req) => respond(
            StatusCode::CREATED,
            biometrics::record_health_log(&state.pool, id, req.weight, req.stress_level).await,
        ),
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn list_checklist_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = respond(
        StatusCode::OK,
        dashboard::list_checklist(&state.pool, id).await,
    );
    (status, Json(body))
}

pub async fn add_checklist_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    payload: JsonPayload<ChecklistRequest>,
) -> impl IntoResponse {
    let (status, body) = match json_body(payload) {
        Ok(req) => respond(
            StatusCode::CREATED,
            dashboard::add_checklist_item(&state.pool, id, &req.title).await,
        ),
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn toggle_checklist_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
    payload: JsonPayload<ChecklistToggle>,
) -> impl IntoResponse {
    let (status, body) = match json_body(payload) {
        Ok(req) => respond(
            StatusCode::OK,
            dashboard::set_checklist_completed(&state.pool, id, req.is_completed).await,
        ),
        Err(rejected) => rejected,
    };
    (status, Json(body))
}

pub async fn chat_report_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> Response {
    report_response(dashboard::chat_report(&state.pool, id).await)
}

pub async fn patient_report_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<Uuid>,
) -> Response {
    report_response(dashboard::patient_report(&state.pool, id).await)
}

pub async fn dashboard_summary_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = dashboard_summary_inner(&state).await;
    (status, Json(body))
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
