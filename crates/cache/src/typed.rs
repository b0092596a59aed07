use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use leaveflow_core::domain::employee::{Employee, EmployeeId, EmployeePage};
use leaveflow_core::domain::leave::{Leave, LeaveId, LeaveListKey};
use leaveflow_core::ports::{CacheError, EmployeeCache, LeaveCache};

use crate::store::CacheStore;

async fn get_json<T: DeserializeOwned>(
    store: &dyn CacheStore,
    key: &str,
) -> Result<Option<T>, CacheError> {
    match store.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

async fn set_json<T: Serialize + ?Sized>(
    store: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> Result<(), CacheError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw, ttl).await
}

/// Leaves as JSON: `{prefix}_leave_{id}` for single leaves, and
/// `{prefix}_employee_{id}` / `{prefix}_reviewer_{id}` for lists.
pub struct JsonLeaveCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
    ttl: Duration,
}

impl JsonLeaveCache {
    pub fn new(store: Arc<dyn CacheStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self { store, prefix: prefix.into(), ttl }
    }

    fn leave_key(&self, id: LeaveId) -> String {
        format!("{}_leave_{}", self.prefix, id)
    }

    fn list_key(&self, key: LeaveListKey) -> String {
        match key {
            LeaveListKey::Employee(id) => format!("{}_employee_{}", self.prefix, id),
            LeaveListKey::Reviewer(id) => format!("{}_reviewer_{}", self.prefix, id),
        }
    }
}

#[async_trait]
impl LeaveCache for JsonLeaveCache {
    async fn get_leave(&self, id: LeaveId) -> Result<Option<Leave>, CacheError> {
        get_json(self.store.as_ref(), &self.leave_key(id)).await
    }

    async fn set_leave(&self, leave: &Leave) -> Result<(), CacheError> {
        set_json(self.store.as_ref(), &self.leave_key(leave.id), leave, self.ttl).await
    }

    async fn del_leave(&self, id: LeaveId) -> Result<(), CacheError> {
        self.store.del(&self.leave_key(id)).await
    }

    async fn get_leaves(&self, key: LeaveListKey) -> Result<Option<Vec<Leave>>, CacheError> {
        get_json(self.store.as_ref(), &self.list_key(key)).await
    }

    async fn set_leaves(&self, key: LeaveListKey, leaves: &[Leave]) -> Result<(), CacheError> {
        set_json(self.store.as_ref(), &self.list_key(key), leaves, self.ttl).await
    }

    async fn del_leaves(&self, key: LeaveListKey) -> Result<(), CacheError> {
        self.store.del(&self.list_key(key)).await
    }
}

pub struct JsonEmployeeCache {
    store: Arc<dyn CacheStore>,
    prefix: String,
    ttl: Duration,
}

impl JsonEmployeeCache {
    pub fn new(store: Arc<dyn CacheStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self { store, prefix: prefix.into(), ttl }
    }

    fn employee_key(&self, id: EmployeeId) -> String {
        format!("{}_id_{}", self.prefix, id)
    }

    fn pages_prefix(&self) -> String {
        format!("{}_list", self.prefix)
    }

    fn page_key(&self, page: u32, page_size: u32) -> String {
        format!("{}_page_{}_page_size_{}", self.pages_prefix(), page, page_size)
    }
}

#[async_trait]
impl EmployeeCache for JsonEmployeeCache {
    async fn get_employee(&self, id: EmployeeId) -> Result<Option<Employee>, CacheError> {
        get_json(self.store.as_ref(), &self.employee_key(id)).await
    }

    async fn set_employee(&self, employee: &Employee) -> Result<(), CacheError> {
        set_json(self.store.as_ref(), &self.employee_key(employee.id), employee, self.ttl).await
    }

    async fn get_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Option<EmployeePage>, CacheError> {
        get_json(self.store.as_ref(), &self.page_key(page, page_size)).await
    }

    async fn set_page(
        &self,
        page: u32,
        page_size: u32,
        employees: &EmployeePage,
    ) -> Result<(), CacheError> {
        set_json(self.store.as_ref(), &self.page_key(page, page_size), employees, self.ttl).await
    }

    async fn clear_pages(&self) -> Result<(), CacheError> {
        self.store.del_by_prefix(&self.pages_prefix()).await
    }
}
