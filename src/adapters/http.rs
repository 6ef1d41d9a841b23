//! Department HTTP API
//!
//! - `POST   /departments`
//! - `GET    /departments/:id?depth=0..5&include_employees=bool`
//! - `PATCH  /departments/:id`
//! - `DELETE /departments/:id?mode=cascade|reassign&reassign_to_department_id=ID`
//! - `POST   /departments/:id/employees`
//!
//! Request parsing lives here; every business rule is delegated to `DepartmentEngine`.

use crate::core::dto::{parse_date, DepartmentDto, DepartmentTreeDto, EmployeeDto};
use crate::core::hierarchy::{DepartmentEngine, MAX_TREE_DEPTH, MIN_TREE_DEPTH};
use crate::domain::model::{DepartmentId, GetDepartmentOptions, ParentUpdate};
use crate::domain::ports::DepartmentRepository;
use crate::utils::error::{ErrorKind, OrgError};
use crate::utils::validation::validate_range;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug)]
pub struct ApiError(OrgError);

impl From<OrgError> for ApiError {
    fn from(err: OrgError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self(OrgError::validation(message))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => {
                tracing::error!("unexpected error: {}", self.0);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, &self.0.user_friendly_message())
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// =============================================================================
// REQUEST BODIES
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDepartmentRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<DepartmentId>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDepartmentRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "ParentUpdate::deserialize_present")]
    pub parent_id: ParentUpdate,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEmployeeRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub hired_at: Option<String>,
}

// =============================================================================
// ROUTER
// =============================================================================

pub fn router<R: DepartmentRepository + 'static>(engine: Arc<DepartmentEngine<R>>) -> Router {
    Router::new()
        .route(
            "/departments",
            post(create_department::<R>).fallback(method_not_allowed),
        )
        .route(
            "/departments/:id",
            get(get_department::<R>)
                .patch(update_department::<R>)
                .delete(delete_department::<R>)
                .fallback(method_not_allowed),
        )
        .route(
            "/departments/:id/employees",
            post(create_employee::<R>).fallback(method_not_allowed),
        )
        .route("/healthcheck", get(healthcheck))
        .fallback(route_not_found)
        .with_state(engine)
}

/// Router plus access logging and a per-request deadline.
pub fn app<R: DepartmentRepository + 'static>(
    engine: Arc<DepartmentEngine<R>>,
    request_timeout: Duration,
) -> Router {
    with_request_deadline(router(engine), request_timeout).layer(TraceLayer::new_for_http())
}

fn with_request_deadline(router: Router, request_timeout: Duration) -> Router {
    router
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::map_response(timeout_as_json))
}

// TimeoutLayer answers with a bare 408
async fn timeout_as_json(response: Response) -> Response {
    if response.status() != StatusCode::REQUEST_TIMEOUT {
        return response;
    }
    tracing::warn!("request exceeded its deadline");
    ApiError(OrgError::internal("request deadline exceeded")).into_response()
}

// =============================================================================
// HANDLERS
// =============================================================================

async fn create_department<R: DepartmentRepository + 'static>(
    State(engine): State<Arc<DepartmentEngine<R>>>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<DepartmentDto>)> {
    let req: CreateDepartmentRequest = decode_json(&body)?;
    reject_negative_parent(req.parent_id)?;

    let department = engine.create_department(&req.name, req.parent_id).await?;

    Ok((StatusCode::CREATED, Json(department.into())))
}

async fn create_employee<R: DepartmentRepository + 'static>(
    State(engine): State<Arc<DepartmentEngine<R>>>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<EmployeeDto>)> {
    let department_id = parse_department_id(&raw_id)?;
    let req: CreateEmployeeRequest = decode_json(&body)?;

    let hired_at = match req.hired_at.as_deref() {
        Some(raw) => Some(
            parse_date(raw)
                .ok_or_else(|| ApiError::bad_request("hired_at must be in YYYY-MM-DD format"))?,
        ),
        None => None,
    };

    let employee = engine
        .create_employee(department_id, &req.full_name, &req.position, hired_at)
        .await?;

    Ok((StatusCode::CREATED, Json(employee.into())))
}

async fn get_department<R: DepartmentRepository + 'static>(
    State(engine): State<Arc<DepartmentEngine<R>>>,
    Path(raw_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<DepartmentTreeDto>> {
    let department_id = parse_department_id(&raw_id)?;
    let options = parse_get_department_options(&params)?;

    let tree = engine.get_department(department_id, &options).await?;

    Ok(Json(tree.into()))
}

async fn update_department<R: DepartmentRepository + 'static>(
    State(engine): State<Arc<DepartmentEngine<R>>>,
    Path(raw_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<DepartmentDto>> {
    let department_id = parse_department_id(&raw_id)?;
    let req: UpdateDepartmentRequest = decode_json(&body)?;
    if let ParentUpdate::Set(parent_id) = req.parent_id {
        reject_negative_parent(Some(parent_id))?;
    }

    let department = engine
        .update_department(department_id, req.name.as_deref(), req.parent_id)
        .await?;

    Ok(Json(department.into()))
}

async fn delete_department<R: DepartmentRepository + 'static>(
    State(engine): State<Arc<DepartmentEngine<R>>>,
    Path(raw_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<StatusCode> {
    let department_id = parse_department_id(&raw_id)?;
    let mode = params
        .get("mode")
        .map(|mode| mode.trim().to_lowercase())
        .unwrap_or_default();
    let reassign_to = parse_optional_reassign_id(params.get("reassign_to_department_id"))?;

    engine
        .delete_department(department_id, &mode, reassign_to)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn healthcheck() -> &'static str {
    "ok"
}

async fn route_not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "route not found")
}

async fn method_not_allowed() -> Response {
    error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

// =============================================================================
// PARSING HELPERS
// =============================================================================

/// Any body that does not decode, an empty one included, is `invalid JSON body`.
fn decode_json<T: DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    // from_slice also rejects trailing data after the first value
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!("rejected request body: {}", e);
        ApiError::bad_request("invalid JSON body")
    })
}

/// Ids are unsigned on the wire; a negative one is a malformed body, not a missing department.
fn reject_negative_parent(parent_id: Option<DepartmentId>) -> ApiResult<()> {
    match parent_id {
        Some(id) if id < 0 => Err(ApiError::bad_request("invalid JSON body")),
        _ => Ok(()),
    }
}

fn parse_positive_id(raw: &str) -> Option<DepartmentId> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<DepartmentId>().ok().filter(|id| *id > 0)
}

fn parse_department_id(raw: &str) -> ApiResult<DepartmentId> {
    parse_positive_id(raw).ok_or_else(|| ApiError::bad_request("invalid department id"))
}

fn parse_optional_reassign_id(raw: Option<&String>) -> ApiResult<Option<DepartmentId>> {
    let value = raw.map(|v| v.trim()).unwrap_or_default();
    if value.is_empty() {
        return Ok(None);
    }
    parse_positive_id(value).map(Some).ok_or_else(|| {
        ApiError::bad_request("reassign_to_department_id must be a positive integer")
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

fn parse_get_department_options(
    params: &HashMap<String, String>,
) -> ApiResult<GetDepartmentOptions> {
    let mut options = GetDepartmentOptions::default();

    if let Some(raw_depth) = params.get("depth").map(|v| v.trim()).filter(|v| !v.is_empty()) {
        let depth = raw_depth
            .parse::<i32>()
            .map_err(|_| ApiError::bad_request("depth must be an integer"))?;
        validate_range("depth", depth, MIN_TREE_DEPTH, MAX_TREE_DEPTH)?;
        options.depth = depth;
    }

    if let Some(raw_include) = params
        .get("include_employees")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
    {
        options.include_employees = parse_bool(raw_include)
            .ok_or_else(|| ApiError::bad_request("include_employees must be a boolean"))?;
    }

    Ok(options)
}
