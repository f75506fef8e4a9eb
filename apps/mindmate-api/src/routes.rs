use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use mindmate_domain::SessionMemories;
use mindmate_service::{
	ChatRequest, ChatResponse, Error, IngestReport, IngestRequest, SessionStats,
};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/chat", post(chat))
		.route("/v1/sessions/{session_id}/stats", get(session_stats))
		.route("/v1/sessions/{session_id}/memories", get(session_memories))
		.route("/v1/sessions/{session_id}/memories/extract", post(extract_memories))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn chat(
	State(state): State<AppState>,
	Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
	let response = state.service.handle_turn(payload).await?;

	Ok(Json(response))
}

async fn session_stats(
	State(state): State<AppState>,
	Path(session_id): Path<String>,
) -> Result<Json<SessionStats>, ApiError> {
	let response = state.service.session_stats(&session_id).await?;

	Ok(Json(response))
}

async fn session_memories(
	State(state): State<AppState>,
	Path(session_id): Path<String>,
) -> Result<Json<SessionMemories>, ApiError> {
	let response = state.service.session_memories(&session_id).await?;

	Ok(Json(response))
}

async fn extract_memories(
	State(state): State<AppState>,
	Path(session_id): Path<String>,
	Json(payload): Json<IngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
	let response = state.service.ingest(&session_id, payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } => {
				let fields = invalid_field(&message).map(|field| vec![format!("$.{field}")]);

				ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, fields)
			},
			Error::Provider { message } => {
				tracing::error!(error = %message, "Model provider failed.");

				ApiError::new(
					StatusCode::BAD_GATEWAY,
					"PROVIDER_ERROR",
					"The model provider is unavailable. Please try again.",
					None,
				)
			},
			Error::Storage { message } => {
				tracing::error!(error = %message, "Storage failed.");

				ApiError::new(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORAGE_ERROR",
					"Internal storage error.",
					None,
				)
			},
			Error::Extraction { message } => {
				tracing::error!(error = %message, "Memory extraction failed.");

				ApiError::new(
					StatusCode::BAD_GATEWAY,
					"EXTRACTION_ERROR",
					"Memory extraction did not succeed. Please try again.",
					None,
				)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

/// Validation messages lead with the offending field name.
fn invalid_field(message: &str) -> Option<&str> {
	const FIELDS: [&str; 4] = ["session_id", "user_id", "user_message", "data"];

	FIELDS.into_iter().find(|field| message.starts_with(field))
}
