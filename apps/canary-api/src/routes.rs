use std::collections::BTreeMap;

use axum::{
	Json, Router,
	body::Body,
	extract::State,
	http::{HeaderMap, Request, StatusCode},
	middleware::{self, Next},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use canary_service::{
	CreateExperimentRequest, DeleteExperimentResponse, Error as ServiceError, Evaluation,
	ExperimentRecord, ExperimentStats, ResetReport,
};

const HEADER_AUTHORIZATION: &str = "Authorization";

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
	pub user_id: String,
	pub experiment_key: String,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateAllRequest {
	pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct EvaluateAllResponse {
	pub variants: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct EnabledRequest {
	pub user_id: String,
	pub flag_key: String,
}

#[derive(Debug, Serialize)]
pub struct EnabledResponse {
	pub flag_key: String,
	pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExperimentIdRequest {
	pub experiment_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct RolloutRequest {
	pub experiment_id: Uuid,
	pub percentage: f64,
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
	pub experiment_id: Uuid,
	pub enabled: bool,
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
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message, None),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message, None),
			ServiceError::Conflict { message } =>
				json_error(StatusCode::CONFLICT, "CONFLICT", message, None),
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Admin request failed on storage.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"STORAGE_ERROR",
					"Storage is unavailable.",
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

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/flags/evaluate", post(evaluate))
		.route("/v1/flags/evaluate_all", post(evaluate_all))
		.route("/v1/flags/enabled", post(enabled))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/experiments", get(list_experiments).post(create_experiment))
		.route("/v1/admin/experiments/rollout", post(update_rollout))
		.route("/v1/admin/experiments/toggle", post(toggle))
		.route("/v1/admin/experiments/reset", post(reset))
		.route("/v1/admin/experiments/stats", post(stats))
		.route("/v1/admin/experiments/delete", post(delete))
		.layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
		.with_state(state)
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn evaluate(
	State(state): State<AppState>,
	Json(payload): Json<EvaluateRequest>,
) -> Json<Evaluation> {
	Json(state.service.evaluate(&payload.user_id, &payload.experiment_key).await)
}

async fn evaluate_all(
	State(state): State<AppState>,
	Json(payload): Json<EvaluateAllRequest>,
) -> Json<EvaluateAllResponse> {
	let variants = state.service.get_all_variants(&payload.user_id).await;

	Json(EvaluateAllResponse { variants })
}

async fn enabled(
	State(state): State<AppState>,
	Json(payload): Json<EnabledRequest>,
) -> Json<EnabledResponse> {
	let enabled = state.service.is_feature_enabled(&payload.user_id, &payload.flag_key).await;

	Json(EnabledResponse { flag_key: payload.flag_key, enabled })
}

async fn list_experiments(
	State(state): State<AppState>,
) -> Result<Json<Vec<ExperimentRecord>>, ApiError> {
	let response = state.service.list_experiments().await?;

	Ok(Json(response))
}

async fn create_experiment(
	State(state): State<AppState>,
	Json(payload): Json<CreateExperimentRequest>,
) -> Result<(StatusCode, Json<ExperimentRecord>), ApiError> {
	let response = state.service.create_experiment(payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn update_rollout(
	State(state): State<AppState>,
	Json(payload): Json<RolloutRequest>,
) -> Result<Json<ExperimentRecord>, ApiError> {
	let response =
		state.service.update_rollout_percentage(payload.experiment_id, payload.percentage).await?;

	Ok(Json(response))
}

async fn toggle(
	State(state): State<AppState>,
	Json(payload): Json<ToggleRequest>,
) -> Result<Json<ExperimentRecord>, ApiError> {
	let response =
		state.service.toggle_feature_flag(payload.experiment_id, payload.enabled).await?;

	Ok(Json(response))
}

async fn reset(
	State(state): State<AppState>,
	Json(payload): Json<ExperimentIdRequest>,
) -> Result<Json<ResetReport>, ApiError> {
	let response = state.service.reset_assignments(payload.experiment_id).await?;

	Ok(Json(response))
}

async fn stats(
	State(state): State<AppState>,
	Json(payload): Json<ExperimentIdRequest>,
) -> Result<Json<ExperimentStats>, ApiError> {
	let response = state.service.experiment_stats(payload.experiment_id).await?;

	Ok(Json(response))
}

async fn delete(
	State(state): State<AppState>,
	Json(payload): Json<ExperimentIdRequest>,
) -> Result<Json<DeleteExperimentResponse>, ApiError> {
	let response = state.service.delete_experiment(payload.experiment_id).await?;

	Ok(Json(response))
}

async fn admin_auth_middleware(
	State(state): State<AppState>,
	req: Request<Body>,
	next: Next,
) -> Response {
	if !is_authorized(req.headers(), state.admin_auth_token()) {
		return json_error(
			StatusCode::UNAUTHORIZED,
			"UNAUTHORIZED",
			"Admin requests require security.admin_auth_token as a Bearer token.",
			None,
		)
		.into_response();
	}

	next.run(req).await
}

fn is_authorized(headers: &HeaderMap, expected: Option<&str>) -> bool {
	match expected {
		None => true,
		Some(expected) => read_bearer_token(headers).is_some_and(|token| token == expected),
	}
}

fn read_bearer_token(headers: &HeaderMap) -> Option<&str> {
	let raw = headers.get(HEADER_AUTHORIZATION)?;
	let value = raw.to_str().ok()?.trim();
	let token = value.strip_prefix("Bearer ")?.trim();

	if token.is_empty() { None } else { Some(token) }
}
