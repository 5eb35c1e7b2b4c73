use axum::{
	Json, Router,
	extract::{State, rejection::JsonRejection},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use kg_service::{AssociationsRequest, AssociationsResponse, Error, ErrorKind};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/associations", post(associations))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn associations(
	State(state): State<AppState>,
	payload: Result<Json<AssociationsRequest>, JsonRejection>,
) -> Result<Json<AssociationsResponse>, ApiError> {
	let Json(payload) = payload.map_err(|err| {
		ApiError::new(StatusCode::BAD_REQUEST, ErrorKind::Validation.as_str(), err.body_text())
	})?;
	let response = state.service.associations(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		let kind = err.kind();
		let status = match kind {
			ErrorKind::Validation | ErrorKind::InvalidCursor => StatusCode::BAD_REQUEST,
			ErrorKind::Store => StatusCode::BAD_GATEWAY,
		};

		if kind == ErrorKind::Store {
			tracing::error!(error = %err, "Association query failed in the store.");
		}

		Self::new(status, kind.as_str(), err.message())
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
