//! JSON API.
//!
//! - `POST /api/v1/employees`              create an employee
//! - `GET  /api/v1/employees`              page through employees (`page`, `page_size`)
//! - `GET  /api/v1/employees/{id}`         fetch one employee
//! - `POST /api/v1/leaves`                 submit a leave request
//! - `GET  /api/v1/leaves`                 list by `employee_id` or `current_reviewer_id`
//! - `GET  /api/v1/leaves/{id}`            fetch one leave with its reviews
//! - `POST /api/v1/leaves/{id}/review`     approve or reject as the current reviewer
//! - `GET  /health`                        database and cache readiness

use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};

use leaveflow_core::services::{EmployeeService, LeaveService};

use crate::health::{self, HealthState};
use crate::middleware::with_request_tracking;

mod employees;
mod leaves;

#[derive(Clone)]
pub struct AppState {
    pub employees: Arc<EmployeeService>,
    pub leaves: Arc<LeaveService>,
}

pub fn router(state: AppState, health: HealthState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/api/v1/employees", post(employees::create).get(employees::list))
        .route("/api/v1/employees/{id}", get(employees::get))
        .route("/api/v1/leaves", post(leaves::create).get(leaves::list))
        .route("/api/v1/leaves/{id}", get(leaves::get))
        .route("/api/v1/leaves/{id}/review", post(leaves::review))
        .with_state(state);

    with_request_tracking(api.merge(health::router(health)), request_timeout)
}
