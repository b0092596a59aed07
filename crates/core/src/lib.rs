pub mod approvals;
pub mod config;
pub mod domain;
pub mod errors;
pub mod ports;
pub mod read_through;
pub mod services;

pub use approvals::{ApprovalEngine, EscalationPolicy, ReviewDecision, MAX_REVIEW_CHAIN};
pub use domain::employee::{Employee, EmployeeId, EmployeePage, NewEmployee, Position};
pub use domain::leave::{
    Leave, LeaveId, LeaveListKey, LeaveQuery, LeaveRequest, LeaveReview, LeaveType, NewLeave,
    ReviewId, ReviewStatus, ReviewTransition,
};
pub use errors::{ApplicationError, DomainError, ErrorKind, InterfaceError};
pub use ports::{
    CacheError, EmployeeCache, EmployeeDirectory, EmployeeStore, LeaveCache, LeaveStore,
    StoreError,
};
pub use services::{EmployeeService, LeaveService};
