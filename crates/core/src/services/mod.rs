//! Use cases exposed to the transport layers.

pub mod employees;
pub mod leaves;

#[cfg(test)]
pub(crate) mod fakes;

pub use employees::{EmployeeService, MAX_PAGE_SIZE};
pub use leaves::LeaveService;
