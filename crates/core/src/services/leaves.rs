use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::approvals::{ApprovalEngine, ReviewDecision};
use crate::domain::employee::EmployeeId;
use crate::domain::leave::{
    Leave, LeaveId, LeaveListKey, LeaveQuery, LeaveRequest, ReviewStatus, ReviewTransition,
};
use crate::errors::ApplicationError;
use crate::ports::{CacheError, EmployeeDirectory, LeaveCache, LeaveStore, StoreError};
use crate::read_through::{best_effort, read_through, ReadThrough};

/// Creates, reviews and serves leave requests.
///
/// The store is the source of truth. Every write invalidates exactly the
/// cache entries it makes stale; every read goes through the cache first.
#[derive(Clone)]
pub struct LeaveService {
    engine: ApprovalEngine,
    directory: Arc<dyn EmployeeDirectory>,
    store: Arc<dyn LeaveStore>,
    cache: Arc<dyn LeaveCache>,
}

impl LeaveService {
    pub fn new(
        directory: Arc<dyn EmployeeDirectory>,
        store: Arc<dyn LeaveStore>,
        cache: Arc<dyn LeaveCache>,
    ) -> Self {
        Self { engine: ApprovalEngine::default(), directory, store, cache }
    }

    pub fn with_engine(mut self, engine: ApprovalEngine) -> Self {
        self.engine = engine;
        self
    }

    pub async fn create_leave(&self, request: LeaveRequest) -> Result<Leave, ApplicationError> {
        let draft = self.engine.validate_request(&request)?;
        let requester = self
            .directory
            .find_employee(draft.employee_id)
            .await?
            .ok_or_else(|| employee_not_found(draft.employee_id))?;

        let planned = self.engine.plan_creation(draft, &requester)?;
        let leave = self.store.create_leave(planned).await?;

        self.invalidate_list(LeaveListKey::Employee(leave.employee_id)).await;
        if let Some(reviewer_id) = leave.current_reviewer_id {
            self.invalidate_list(LeaveListKey::Reviewer(reviewer_id)).await;
        }
        best_effort(
            "cache.write_failed",
            &format!("leave {}", leave.id),
            self.cache.set_leave(&leave).await,
        );

        info!(
            event_name = "leave.created",
            leave_id = %leave.id,
            employee_id = %leave.employee_id,
            status = %leave.status,
            current_reviewer_id = ?leave.current_reviewer_id.map(|id| id.0),
            "leave request created"
        );
        Ok(leave)
    }

    /// Applies `reviewer_id`'s decision and returns the leave as stored
    /// afterwards.
    pub async fn review_leave(
        &self,
        leave_id: LeaveId,
        reviewer_id: EmployeeId,
        decision: ReviewStatus,
        comment: impl Into<String>,
    ) -> Result<Leave, ApplicationError> {
        self.engine.validate_decision(decision)?;

        let leave = self
            .store
            .find_leave(leave_id)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("leave {leave_id}")))?;
        self.engine.authorize_review(&leave, reviewer_id)?;

        let reviewer = match decision {
            ReviewStatus::Approved => Some(
                self.directory
                    .find_employee(reviewer_id)
                    .await?
                    .ok_or_else(|| employee_not_found(reviewer_id))?,
            ),
            _ => None,
        };

        let transition = self.engine.plan_review(
            &leave,
            ReviewDecision { reviewer_id, decision, comment: comment.into() },
            reviewer.as_ref(),
            Utc::now(),
        )?;
        let updated = self.store.apply_review(&transition).await?;
        self.invalidate_after_review(&transition).await;

        if transition.is_escalation() {
            info!(
                event_name = "leave.escalated",
                leave_id = %updated.id,
                from_reviewer_id = %reviewer_id,
                to_reviewer_id = ?transition.next_reviewer_id.map(|id| id.0),
                span_days = updated.span_days(),
                "leave escalated to next reviewer"
            );
        }
        info!(
            event_name = "leave.reviewed",
            leave_id = %updated.id,
            reviewer_id = %reviewer_id,
            decision = %decision,
            status = %updated.status,
            "leave reviewed"
        );
        Ok(updated)
    }

    pub async fn get_leaves(&self, query: LeaveQuery) -> Result<Vec<Leave>, ApplicationError> {
        let key = query.into_key()?;
        let lookup =
            LeaveListLookup { key, store: self.store.as_ref(), cache: self.cache.as_ref() };
        Ok(read_through(&lookup).await?.unwrap_or_default())
    }

    pub async fn get_leave_by_id(&self, id: LeaveId) -> Result<Leave, ApplicationError> {
        let lookup = LeaveLookup { id, store: self.store.as_ref(), cache: self.cache.as_ref() };
        read_through(&lookup)
            .await?
            .ok_or_else(|| ApplicationError::NotFound(format!("leave {id}")))
    }

    async fn invalidate_after_review(&self, transition: &ReviewTransition) {
        best_effort(
            "cache.invalidate_failed",
            &format!("leave {}", transition.leave_id),
            self.cache.del_leave(transition.leave_id).await,
        );
        for key in transition.stale_list_keys() {
            self.invalidate_list(key).await;
        }
    }

    async fn invalidate_list(&self, key: LeaveListKey) {
        let outcome = self.cache.del_leaves(key).await;
        best_effort("cache.invalidate_failed", &describe_key(key), outcome);
    }
}

fn employee_not_found(id: EmployeeId) -> ApplicationError {
    ApplicationError::NotFound(format!("employee {id}"))
}

fn describe_key(key: LeaveListKey) -> String {
    match key {
        LeaveListKey::Employee(id) => format!("leaves of employee {id}"),
        LeaveListKey::Reviewer(id) => format!("leaves awaiting reviewer {id}"),
    }
}

struct LeaveLookup<'a> {
    id: LeaveId,
    store: &'a dyn LeaveStore,
    cache: &'a dyn LeaveCache,
}

#[async_trait]
impl ReadThrough for LeaveLookup<'_> {
    type Value = Leave;

    fn describe(&self) -> String {
        format!("leave {}", self.id)
    }

    async fn fetch_cached(&self) -> Result<Option<Leave>, CacheError> {
        self.cache.get_leave(self.id).await
    }

    async fn fetch_stored(&self) -> Result<Option<Leave>, StoreError> {
        self.store.find_leave(self.id).await
    }

    async fn populate(&self, value: &Leave) -> Result<(), CacheError> {
        self.cache.set_leave(value).await
    }
}

struct LeaveListLookup<'a> {
    key: LeaveListKey,
    store: &'a dyn LeaveStore,
    cache: &'a dyn LeaveCache,
}

#[async_trait]
impl ReadThrough for LeaveListLookup<'_> {
    type Value = Vec<Leave>;

    fn describe(&self) -> String {
        describe_key(self.key)
    }

    async fn fetch_cached(&self) -> Result<Option<Vec<Leave>>, CacheError> {
        self.cache.get_leaves(self.key).await
    }

    async fn fetch_stored(&self) -> Result<Option<Vec<Leave>>, StoreError> {
        self.store.list_leaves(self.key).await.map(Some)
    }

    async fn populate(&self, value: &Vec<Leave>) -> Result<(), CacheError> {
        self.cache.set_leaves(self.key, value).await
    }
}
