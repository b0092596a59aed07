use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use crate::domain::employee::{Employee, EmployeeId, EmployeePage, NewEmployee};
use crate::errors::{ApplicationError, DomainError};
use crate::ports::{CacheError, EmployeeCache, EmployeeStore, StoreError};
use crate::read_through::{best_effort, read_through, ReadThrough};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Organization directory use cases: onboarding and cached lookups.
#[derive(Clone)]
pub struct EmployeeService {
    store: Arc<dyn EmployeeStore>,
    cache: Arc<dyn EmployeeCache>,
}

impl EmployeeService {
    pub fn new(store: Arc<dyn EmployeeStore>, cache: Arc<dyn EmployeeCache>) -> Self {
        Self { store, cache }
    }

    pub async fn create_employee(
        &self,
        employee: NewEmployee,
    ) -> Result<Employee, ApplicationError> {
        validate_new_employee(&employee)?;

        if let Some(manager_id) = employee.manager_id {
            if self.store.find_employee(manager_id).await?.is_none() {
                return Err(ApplicationError::invalid_input(format!(
                    "manager {manager_id} not found"
                )));
            }
        }

        let created = self.store.create_employee(employee).await?;

        best_effort("cache.invalidate_failed", "employee pages", self.cache.clear_pages().await);
        best_effort(
            "cache.write_failed",
            &format!("employee {}", created.id),
            self.cache.set_employee(&created).await,
        );

        info!(
            event_name = "employee.created",
            employee_id = %created.id,
            manager_id = ?created.manager_id.map(|id| id.0),
            positions = created.positions.len(),
            "employee created"
        );
        Ok(created)
    }

    pub async fn get_employee_by_id(&self, id: EmployeeId) -> Result<Employee, ApplicationError> {
        let lookup = EmployeeLookup { id, store: self.store.as_ref(), cache: self.cache.as_ref() };
        read_through(&lookup)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("employee {id}")))
    }

    /// `page` is 1-based.
    pub async fn list_employees(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<EmployeePage, ApplicationError> {
        if page == 0 {
            return Err(ApplicationError::invalid_input("page must be at least 1"));
        }
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(ApplicationError::invalid_input(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }

        let lookup = EmployeePageLookup {
            page,
            page_size,
            store: self.store.as_ref(),
            cache: self.cache.as_ref(),
        };
        Ok(read_through(&lookup)
            .await?
            .unwrap_or(EmployeePage { employees: Vec::new(), total_count: 0 }))
    }
}

fn validate_new_employee(employee: &NewEmployee) -> Result<(), DomainError> {
    if employee.name.trim().is_empty() {
        return Err(DomainError::InvalidInput("name is required".to_string()));
    }
    let email = employee.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(DomainError::InvalidInput(format!("email `{email}` is not valid")));
    }
    if employee.positions.is_empty() {
        return Err(DomainError::InvalidInput("at least one position is required".to_string()));
    }

    for position in &employee.positions {
        if position.title.trim().is_empty() {
            return Err(DomainError::InvalidInput("position title is required".to_string()));
        }
        if position.month_salary < Decimal::ZERO {
            return Err(DomainError::InvalidInput(format!(
                "month_salary of `{}` must not be negative",
                position.title
            )));
        }
        if let Some(end_date) = position.end_date {
            if end_date < position.start_date {
                return Err(DomainError::InvalidInput(format!(
                    "position `{}` ends before it starts",
                    position.title
                )));
            }
        }
    }

    Ok(())
}

struct EmployeeLookup<'a> {
    id: EmployeeId,
    store: &'a dyn EmployeeStore,
    cache: &'a dyn EmployeeCache,
}

#[async_trait]
impl ReadThrough for EmployeeLookup<'_> {
    type Value = Employee;

    fn describe(&self) -> String {
        format!("employee {}", self.id)
    }

    async fn fetch_cached(&self) -> Result<Option<Employee>, CacheError> {
        self.cache.get_employee(self.id).await
    }

    async fn fetch_stored(&self) -> Result<Option<Employee>, StoreError> {
        self.store.find_employee(self.id).await
    }

    async fn populate(&self, value: &Employee) -> Result<(), CacheError> {
        self.cache.set_employee(value).await
    }
}

struct EmployeePageLookup<'a> {
    page: u32,
    page_size: u32,
    store: &'a dyn EmployeeStore,
    cache: &'a dyn EmployeeCache,
}

#[async_trait]
impl ReadThrough for EmployeePageLookup<'_> {
    type Value = EmployeePage;

    fn describe(&self) -> String {
        format!("employee page {} (size {})", self.page, self.page_size)
    }

    async fn fetch_cached(&self) -> Result<Option<EmployeePage>, CacheError> {
        self.cache.get_page(self.page, self.page_size).await
    }

    async fn fetch_stored(&self) -> Result<Option<EmployeePage>, StoreError> {
        self.store.list_employees(self.page, self.page_size).await.map(Some)
    }

    async fn populate(&self, value: &EmployeePage) -> Result<(), CacheError> {
        self.cache.set_page(self.page, self.page_size, value).await
    }
}
