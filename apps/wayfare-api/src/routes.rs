use axum::{
	Json, Router,
	extract::{Path, State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use wayfare_domain::SearchRecord;
use wayfare_service::{Error, SearchProgress, SearchRequest, SearchResults, Step};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/searches", post(submit))
		.route("/v1/searches/{search_id}", get(fetch))
		.route("/v1/searches/{search_id}/results", get(results))
		.route("/v1/searches/{search_id}/status", get(status))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn submit(
	State(state): State<AppState>,
	payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchRecord>, ApiError> {
	let Json(payload) = payload?;
	let record = state.service.search(payload).await?;

	Ok(Json(record))
}

async fn fetch(
	State(state): State<AppState>,
	Path(search_id): Path<String>,
) -> Result<Json<SearchRecord>, ApiError> {
	let record = state.service.get_search(&search_id).await?;

	Ok(Json(record))
}

async fn results(
	State(state): State<AppState>,
	Path(search_id): Path<String>,
) -> Result<Json<SearchResults>, ApiError> {
	let response = state.service.search_results(&search_id).await?;

	Ok(Json(response))
}

async fn status(
	State(state): State<AppState>,
	Path(search_id): Path<String>,
) -> Result<Json<SearchProgress>, ApiError> {
	let response = state.service.search_progress(&search_id).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: &'static str,
	message: String,
	step: Option<Step>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
	step: Option<Step>,
}
impl ApiError {
	fn new(status: StatusCode, error_code: &'static str, err: &Error) -> Self {
		Self { status, error_code, message: err.to_string(), step: err.step() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match &err {
			Error::Validation { .. } => Self::new(StatusCode::BAD_REQUEST, "bad_input", &err),
			Error::NoAvailability { .. } =>
				Self::new(StatusCode::NOT_FOUND, "no_availability", &err),
			Error::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, "not_found", &err),
			Error::Upstream { .. } | Error::Internal { .. } => {
				tracing::error!(error = %err, "Request failed.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_failure", &err)
			},
		}
	}
}
impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		Self {
			status: StatusCode::BAD_REQUEST,
			error_code: "bad_input",
			message: format!("Invalid request: {}", rejection.body_text()),
			step: None,
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, step: self.step };

		(self.status, Json(body)).into_response()
	}
}
