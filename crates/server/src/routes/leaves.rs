use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::{Leave, LeaveId, LeaveQuery, LeaveRequest, ReviewStatus};

use super::AppState;
use crate::error::ApiError;
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub struct ReviewBody {
    pub reviewer_id: EmployeeId,
    pub status: String,
    #[serde(default)]
    pub comment: String,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<LeaveRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Leave>), ApiError> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;

    let leave = state
        .leaves
        .create_leave(request)
        .await
        .map_err(|error| ApiError::from_application(error, &request_id))?;
    Ok((StatusCode::CREATED, Json(leave)))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    query: Result<Query<LeaveQuery>, QueryRejection>,
) -> Result<Json<Vec<Leave>>, ApiError> {
    let Query(query) =
        query.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;

    state
        .leaves
        .get_leaves(query)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &request_id))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Leave>, ApiError> {
    let Path(id) =
        id.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;

    state
        .leaves
        .get_leave_by_id(LeaveId(id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &request_id))
}

pub async fn review(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ReviewBody>, JsonRejection>,
) -> Result<Json<Leave>, ApiError> {
    let Path(id) =
        id.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;
    let Json(body) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;
    let decision = ReviewStatus::parse(&body.status).ok_or_else(|| {
        ApiError::bad_request(format!("unknown review status `{}`", body.status), &request_id)
    })?;

    state
        .leaves
        .review_leave(LeaveId(id), body.reviewer_id, decision, body.comment)
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &request_id))
}
