use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use leaveflow_core::domain::employee::{Employee, EmployeeId, NewEmployee};

use super::AppState;
use crate::error::ApiError;
use crate::middleware::RequestId;

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

fn first_page() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

#[derive(Debug, Serialize)]
pub struct EmployeeListResponse {
    pub employees: Vec<Employee>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

pub async fn create(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    payload: Result<Json<NewEmployee>, JsonRejection>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let Json(candidate) =
        payload.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;

    let employee = state
        .employees
        .create_employee(candidate)
        .await
        .map_err(|error| ApiError::from_application(error, &request_id))?;
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn list(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    params: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<EmployeeListResponse>, ApiError> {
    let Query(params) =
        params.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;

    let page = state
        .employees
        .list_employees(params.page, params.page_size)
        .await
        .map_err(|error| ApiError::from_application(error, &request_id))?;

    Ok(Json(EmployeeListResponse {
        employees: page.employees,
        total_count: page.total_count,
        page: params.page,
        page_size: params.page_size,
    }))
}

pub async fn get(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<Employee>, ApiError> {
    let Path(id) =
        id.map_err(|rejection| ApiError::bad_request(rejection.body_text(), &request_id))?;

    state
        .employees
        .get_employee_by_id(EmployeeId(id))
        .await
        .map(Json)
        .map_err(|error| ApiError::from_application(error, &request_id))
}
