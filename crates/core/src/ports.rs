//! Collaborator contracts the services are written against.
//!
//! Stores are authoritative. Caches are an optimization: every cache failure
//! is logged by the caller and otherwise ignored.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::employee::{Employee, EmployeeId, EmployeePage, NewEmployee};
use crate::domain::leave::{Leave, LeaveId, LeaveListKey, NewLeave, ReviewTransition};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A guarded write found the record in a different state than expected.
    #[error("concurrent modification: {0}")]
    Conflict(String),
    #[error("store backend failure: {0}")]
    Backend(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache backend failure: {0}")]
    Backend(String),
    #[error("cache codec failure: {0}")]
    Codec(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(value: serde_json::Error) -> Self {
        Self::Codec(value.to_string())
    }
}

#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    async fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError>;
}

#[async_trait]
pub trait EmployeeStore: EmployeeDirectory {
    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, StoreError>;

    /// `page` is 1-based; employees are ordered by ascending id.
    async fn list_employees(&self, page: u32, page_size: u32)
        -> Result<EmployeePage, StoreError>;
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    /// Persists the leave and, when a reviewer is assigned, its first review
    /// record in one transaction.
    async fn create_leave(&self, leave: NewLeave) -> Result<Leave, StoreError>;

    async fn find_leave(&self, id: LeaveId) -> Result<Option<Leave>, StoreError>;

    /// Most recent first.
    async fn list_leaves(&self, key: LeaveListKey) -> Result<Vec<Leave>, StoreError>;

    /// Applies a review atomically. Returns [`StoreError::Conflict`] without
    /// writing anything when the leave no longer matches the transition's
    /// expected status and reviewer.
    async fn apply_review(&self, transition: &ReviewTransition) -> Result<Leave, StoreError>;
}

#[async_trait]
pub trait LeaveCache: Send + Sync {
    async fn get_leave(&self, id: LeaveId) -> Result<Option<Leave>, CacheError>;
    async fn set_leave(&self, leave: &Leave) -> Result<(), CacheError>;
    async fn del_leave(&self, id: LeaveId) -> Result<(), CacheError>;

    async fn get_leaves(&self, key: LeaveListKey) -> Result<Option<Vec<Leave>>, CacheError>;
    async fn set_leaves(&self, key: LeaveListKey, leaves: &[Leave]) -> Result<(), CacheError>;
    async fn del_leaves(&self, key: LeaveListKey) -> Result<(), CacheError>;
}

#[async_trait]
pub trait EmployeeCache: Send + Sync {
    async fn get_employee(&self, id: EmployeeId) -> Result<Option<Employee>, CacheError>;
    async fn set_employee(&self, employee: &Employee) -> Result<(), CacheError>;

    async fn get_page(&self, page: u32, page_size: u32)
        -> Result<Option<EmployeePage>, CacheError>;
    async fn set_page(
        &self,
        page: u32,
        page_size: u32,
        employees: &EmployeePage,
    ) -> Result<(), CacheError>;
    /// Drops every cached list page.
    async fn clear_pages(&self) -> Result<(), CacheError>;
}
