use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use leaveflow_core::domain::employee::{Employee, EmployeeId, EmployeePage, NewEmployee};
use leaveflow_core::domain::leave::{
    Leave, LeaveId, LeaveListKey, LeaveReview, NewLeave, ReviewId, ReviewStatus, ReviewTransition,
};
use leaveflow_core::ports::{EmployeeDirectory, EmployeeStore, LeaveStore, StoreError};

#[derive(Default)]
pub struct InMemoryEmployeeRepository {
    employees: RwLock<BTreeMap<EmployeeId, Employee>>,
}

#[async_trait]
impl EmployeeDirectory for InMemoryEmployeeRepository {
    async fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        let employees = self.employees.read().await;
        Ok(employees.get(&id).cloned())
    }
}

#[async_trait]
impl EmployeeStore for InMemoryEmployeeRepository {
    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, StoreError> {
        let mut employees = self.employees.write().await;
        if let Some(manager_id) = employee.manager_id {
            if !employees.contains_key(&manager_id) {
                return Err(StoreError::Backend(format!("manager {manager_id} does not exist")));
            }
        }

        let now = Utc::now();
        let id = EmployeeId(employees.keys().next_back().map_or(1, |last| last.0 + 1));
        let mut positions = employee.positions;
        positions.sort_by(|left, right| right.start_date.cmp(&left.start_date));
        let created = Employee {
            id,
            name: employee.name,
            email: employee.email,
            address: employee.address,
            phone_number: employee.phone_number,
            manager_id: employee.manager_id,
            positions,
            created_at: now,
            updated_at: now,
        };
        employees.insert(id, created.clone());
        Ok(created)
    }

    async fn list_employees(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<EmployeePage, StoreError> {
        let employees = self.employees.read().await;
        let skip = page.saturating_sub(1) as usize * page_size as usize;
        Ok(EmployeePage {
            employees: employees.values().skip(skip).take(page_size as usize).cloned().collect(),
            total_count: employees.len() as u64,
        })
    }
}

#[derive(Default)]
struct LeaveTable {
    leaves: BTreeMap<LeaveId, Leave>,
    last_review_id: i64,
}

impl LeaveTable {
    fn pending_review(
        &mut self,
        leave_id: LeaveId,
        reviewer_id: EmployeeId,
        at: chrono::DateTime<Utc>,
    ) -> LeaveReview {
        self.last_review_id += 1;
        LeaveReview {
            id: ReviewId(self.last_review_id),
            leave_id,
            reviewer_id,
            status: ReviewStatus::Reviewing,
            comment: String::new(),
            reviewed_at: None,
            created_at: at,
            updated_at: at,
        }
    }
}

/// Leave store backed by a single lock, so every write is trivially atomic.
#[derive(Default)]
pub struct InMemoryLeaveRepository {
    table: RwLock<LeaveTable>,
}

#[async_trait]
impl LeaveStore for InMemoryLeaveRepository {
    async fn create_leave(&self, leave: NewLeave) -> Result<Leave, StoreError> {
        let mut table = self.table.write().await;
        let now = Utc::now();
        let id = LeaveId(table.leaves.keys().next_back().map_or(1, |last| last.0 + 1));
        let reviews = match leave.current_reviewer_id {
            Some(reviewer_id) => vec![table.pending_review(id, reviewer_id, now)],
            None => Vec::new(),
        };

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
        table.leaves.insert(id, created.clone());
        Ok(created)
    }

    async fn find_leave(&self, id: LeaveId) -> Result<Option<Leave>, StoreError> {
        let table = self.table.read().await;
        Ok(table.leaves.get(&id).cloned())
    }

    async fn list_leaves(&self, key: LeaveListKey) -> Result<Vec<Leave>, StoreError> {
        let table = self.table.read().await;
        Ok(table
            .leaves
            .values()
            .rev()
            .filter(|leave| match key {
                LeaveListKey::Employee(id) => leave.employee_id == id,
                LeaveListKey::Reviewer(id) => leave.current_reviewer_id == Some(id),
            })
            .cloned()
            .collect())
    }

    async fn apply_review(&self, transition: &ReviewTransition) -> Result<Leave, StoreError> {
        let mut table = self.table.write().await;
        let leave_id = transition.leave_id;
        let missing = || StoreError::Backend(format!("leave {leave_id} does not exist"));
        let Some(current) = table.leaves.get(&transition.leave_id) else {
            return Err(missing());
        };

        let guard_holds = current.status == transition.expected_status
            && current.current_reviewer_id == Some(transition.expected_reviewer_id)
            && current.reviews.iter().any(|review| {
                review.id == transition.decided_review_id
                    && review.status == ReviewStatus::Reviewing
            });
        if !guard_holds {
            return Err(StoreError::Conflict(format!(
                "leave {} is no longer awaiting reviewer {}",
                transition.leave_id, transition.expected_reviewer_id
            )));
        }

        let at = transition.reviewed_at;
        let appended = transition
            .appended_reviewer_id
            .map(|reviewer_id| table.pending_review(transition.leave_id, reviewer_id, at));

        let Some(leave) = table.leaves.get_mut(&transition.leave_id) else {
            return Err(missing());
        };
        for review in &mut leave.reviews {
            if review.id == transition.decided_review_id {
                review.status = transition.decision;
                review.comment = transition.comment.clone();
                review.reviewed_at = Some(at);
                review.updated_at = at;
            }
        }
        leave.reviews.extend(appended);
        leave.status = transition.next_status;
        leave.current_reviewer_id = transition.next_reviewer_id;
        leave.updated_at = at;

        Ok(leave.clone())
    }
}
