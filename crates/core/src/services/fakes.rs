use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

use crate::domain::employee::{Employee, EmployeeId, EmployeePage, NewEmployee, Position};
use crate::domain::leave::{
    Leave, LeaveId, LeaveListKey, LeaveReview, NewLeave, ReviewId, ReviewStatus, ReviewTransition,
};
use crate::ports::{
    CacheError, EmployeeCache, EmployeeDirectory, EmployeeStore, LeaveCache, LeaveStore,
    StoreError,
};

pub fn employee(id: i64, manager_id: Option<i64>, manager_level: i32) -> Employee {
    let now = Utc::now();
    Employee {
        id: EmployeeId(id),
        name: format!("employee-{id}"),
        email: format!("employee-{id}@example.com"),
        address: String::new(),
        phone_number: String::new(),
        manager_id: manager_id.map(EmployeeId),
        positions: vec![Position {
            title: "Staff".to_string(),
            level: String::new(),
            manager_level,
            month_salary: Decimal::new(350_000, 2),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 1).expect("date"),
            end_date: None,
        }],
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct FakeDirectory {
    employees: Mutex<Vec<Employee>>,
}

impl FakeDirectory {
    pub fn with(employees: Vec<Employee>) -> Self {
        Self { employees: Mutex::new(employees) }
    }
}

#[async_trait]
impl EmployeeDirectory for FakeDirectory {
    async fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        let employees = self.employees.lock().expect("lock");
        Ok(employees.iter().find(|employee| employee.id == id).cloned())
    }
}

#[async_trait]
impl EmployeeStore for FakeDirectory {
    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, StoreError> {
        let mut employees = self.employees.lock().expect("lock");
        let now = Utc::now();
        let id = employees.iter().map(|existing| existing.id.0).max().unwrap_or(0) + 1;
        let created = Employee {
            id: EmployeeId(id),
            name: employee.name,
            email: employee.email,
            address: employee.address,
            phone_number: employee.phone_number,
            manager_id: employee.manager_id,
            positions: employee.positions,
            created_at: now,
            updated_at: now,
        };
        employees.push(created.clone());
        Ok(created)
    }

    async fn list_employees(&self, page: u32, page_size: u32) -> Result<EmployeePage, StoreError> {
        let employees = self.employees.lock().expect("lock");
        let mut sorted = employees.clone();
        sorted.sort_by_key(|employee| employee.id);
        let skip = ((page - 1) * page_size) as usize;
        Ok(EmployeePage {
            employees: sorted.into_iter().skip(skip).take(page_size as usize).collect(),
            total_count: employees.len() as u64,
        })
    }
}

#[derive(Default)]
pub struct FakeLeaveStore {
    leaves: Mutex<Vec<Leave>>,
    next_review_id: AtomicUsize,
    pub reads: AtomicUsize,
}

impl FakeLeaveStore {
    pub fn snapshot(&self, id: LeaveId) -> Option<Leave> {
        self.leaves.lock().expect("lock").iter().find(|leave| leave.id == id).cloned()
    }

    fn review_id(&self) -> ReviewId {
        ReviewId(self.next_review_id.fetch_add(1, Ordering::SeqCst) as i64 + 1)
    }
}

#[async_trait]
impl LeaveStore for FakeLeaveStore {
    async fn create_leave(&self, leave: NewLeave) -> Result<Leave, StoreError> {
        let now = Utc::now();
        let mut leaves = self.leaves.lock().expect("lock");
        let id = LeaveId(leaves.len() as i64 + 1);
        let reviews = leave
            .current_reviewer_id
            .map(|reviewer_id| LeaveReview {
                id: self.review_id(),
                leave_id: id,
                reviewer_id,
                status: ReviewStatus::Reviewing,
                comment: String::new(),
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            })
            .into_iter()
            .collect();
        let created = Leave {
            id,
            employee_id: leave.employee_id,
            leave_type: leave.leave_type,
            start_date: leave.start_date,
            end_date: leave.end_date,
            reason: leave.reason,
            status: leave.status,
            current_reviewer_id: leave.current_reviewer_id,
            reviews,
            created_at: now,
            updated_at: now,
        };
        leaves.push(created.clone());
        Ok(created)
    }

    async fn find_leave(&self, id: LeaveId) -> Result<Option<Leave>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.snapshot(id))
    }

    async fn list_leaves(&self, key: LeaveListKey) -> Result<Vec<Leave>, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let leaves = self.leaves.lock().expect("lock");
        let mut matching = leaves
            .iter()
            .filter(|leave| match key {
                LeaveListKey::Employee(id) => leave.employee_id == id,
                LeaveListKey::Reviewer(id) => leave.current_reviewer_id == Some(id),
            })
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| right.id.cmp(&left.id));
        Ok(matching)
    }

    async fn apply_review(&self, transition: &ReviewTransition) -> Result<Leave, StoreError> {
        let mut leaves = self.leaves.lock().expect("lock");
        let leave = leaves
            .iter_mut()
            .find(|leave| leave.id == transition.leave_id)
            .ok_or_else(|| StoreError::Backend("leave vanished".to_string()))?;
        if leave.status != transition.expected_status
            || leave.current_reviewer_id != Some(transition.expected_reviewer_id)
        {
            return Err(StoreError::Conflict(format!("leave {} changed", leave.id)));
        }

        let now = transition.reviewed_at;
        if let Some(review) =
            leave.reviews.iter_mut().find(|review| review.id == transition.decided_review_id)
        {
            review.status = transition.decision;
            review.comment = transition.comment.clone();
            review.reviewed_at = Some(now);
            review.updated_at = now;
        }
        if let Some(reviewer_id) = transition.appended_reviewer_id {
            let id = self.review_id();
            leave.reviews.push(LeaveReview {
                id,
                leave_id: leave.id,
                reviewer_id,
                status: ReviewStatus::Reviewing,
                comment: String::new(),
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            });
        }
        leave.status = transition.next_status;
        leave.current_reviewer_id = transition.next_reviewer_id;
        leave.updated_at = now;
        Ok(leave.clone())
    }
}

/// Cache double that can be switched into a failing state.
#[derive(Default)]
pub struct FakeCache {
    leaves: Mutex<HashMap<LeaveId, Leave>>,
    lists: Mutex<HashMap<LeaveListKey, Vec<Leave>>>,
    employees: Mutex<HashMap<EmployeeId, Employee>>,
    pages: Mutex<HashMap<(u32, u32), EmployeePage>>,
    pub broken: bool,
    pub invalidations: Mutex<Vec<String>>,
}

impl FakeCache {
    pub fn broken() -> Self {
        Self { broken: true, ..Self::default() }
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.broken {
            return Err(CacheError::Backend("cache unreachable".to_string()));
        }
        Ok(())
    }

    fn record(&self, what: String) {
        self.invalidations.lock().expect("lock").push(what);
    }

    pub fn invalidated(&self) -> Vec<String> {
        self.invalidations.lock().expect("lock").clone()
    }

    pub fn cached_list(&self, key: LeaveListKey) -> Option<Vec<Leave>> {
        self.lists.lock().expect("lock").get(&key).cloned()
    }

    pub fn cached_leave(&self, id: LeaveId) -> Option<Leave> {
        self.leaves.lock().expect("lock").get(&id).cloned()
    }

    pub fn cached_employee(&self, id: EmployeeId) -> Option<Employee> {
        self.employees.lock().expect("lock").get(&id).cloned()
    }

    pub fn cached_page_count(&self) -> usize {
        self.pages.lock().expect("lock").len()
    }
}

#[async_trait]
impl LeaveCache for FakeCache {
    async fn get_leave(&self, id: LeaveId) -> Result<Option<Leave>, CacheError> {
        self.check()?;
        Ok(self.cached_leave(id))
    }

    async fn set_leave(&self, leave: &Leave) -> Result<(), CacheError> {
        self.check()?;
        self.leaves.lock().expect("lock").insert(leave.id, leave.clone());
        Ok(())
    }

    async fn del_leave(&self, id: LeaveId) -> Result<(), CacheError> {
        self.record(format!("leave:{id}"));
        self.check()?;
        self.leaves.lock().expect("lock").remove(&id);
        Ok(())
    }

    async fn get_leaves(&self, key: LeaveListKey) -> Result<Option<Vec<Leave>>, CacheError> {
        self.check()?;
        Ok(self.cached_list(key))
    }

    async fn set_leaves(&self, key: LeaveListKey, leaves: &[Leave]) -> Result<(), CacheError> {
        self.check()?;
        self.lists.lock().expect("lock").insert(key, leaves.to_vec());
        Ok(())
    }

    async fn del_leaves(&self, key: LeaveListKey) -> Result<(), CacheError> {
        self.record(match key {
            LeaveListKey::Employee(id) => format!("employee:{id}"),
            LeaveListKey::Reviewer(id) => format!("reviewer:{id}"),
        });
        self.check()?;
        self.lists.lock().expect("lock").remove(&key);
        Ok(())
    }
}

#[async_trait]
impl EmployeeCache for FakeCache {
    async fn get_employee(&self, id: EmployeeId) -> Result<Option<Employee>, CacheError> {
        self.check()?;
        Ok(self.cached_employee(id))
    }

    async fn set_employee(&self, employee: &Employee) -> Result<(), CacheError> {
        self.check()?;
        self.employees.lock().expect("lock").insert(employee.id, employee.clone());
        Ok(())
    }

    async fn get_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Option<EmployeePage>, CacheError> {
        self.check()?;
        Ok(self.pages.lock().expect("lock").get(&(page, page_size)).cloned())
    }

    async fn set_page(
        &self,
        page: u32,
        page_size: u32,
        employees: &EmployeePage,
    ) -> Result<(), CacheError> {
        self.check()?;
        self.pages.lock().expect("lock").insert((page, page_size), employees.clone());
        Ok(())
    }

    async fn clear_pages(&self) -> Result<(), CacheError> {
        self.record("pages".to_string());
        self.check()?;
        self.pages.lock().expect("lock").clear();
        Ok(())
    }
}
