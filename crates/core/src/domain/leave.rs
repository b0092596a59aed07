use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::employee::EmployeeId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaveId(pub i64);

impl fmt::Display for LeaveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
}

impl LeaveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Sick => "sick",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "annual" => Some(Self::Annual),
            "sick" => Some(Self::Sick),
            _ => None,
        }
    }
}

/// Status of a leave as a whole, and of a single reviewer's decision on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Reviewing,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reviewing => "reviewing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reviewing" => Some(Self::Reviewing),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveReview {
    pub id: ReviewId,
    pub leave_id: LeaveId,
    pub reviewer_id: EmployeeId,
    pub status: ReviewStatus,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leave {
    pub id: LeaveId,
    pub employee_id: EmployeeId,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub reason: String,
    pub status: ReviewStatus,
    #[serde(default)]
    pub current_reviewer_id: Option<EmployeeId>,
    /// Append-only, oldest first. Only the last entry may still be `reviewing`.
    #[serde(default)]
    pub reviews: Vec<LeaveReview>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Leave {
    /// Whole days between start and end date.
    pub fn span_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }

    pub fn last_review(&self) -> Option<&LeaveReview> {
        self.reviews.last()
    }

    pub fn has_reviewed(&self, reviewer_id: EmployeeId) -> bool {
        self.reviews.iter().any(|review| review.reviewer_id == reviewer_id)
    }
}

/// Leave submission as received from a caller, before structural validation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRequest {
    #[serde(default)]
    pub employee_id: Option<EmployeeId>,
    #[serde(default, rename = "type")]
    pub leave_type: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub reason: String,
}

/// A validated leave with its initial status decided, ready to be persisted.
///
/// When `current_reviewer_id` is set the store also writes the first review
/// record for that reviewer with status `reviewing`, in the same transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLeave {
    pub employee_id: EmployeeId,
    pub leave_type: LeaveType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub status: ReviewStatus,
    pub current_reviewer_id: Option<EmployeeId>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveQuery {
    #[serde(default)]
    pub employee_id: Option<EmployeeId>,
    #[serde(default)]
    pub current_reviewer_id: Option<EmployeeId>,
}

impl LeaveQuery {
    pub fn by_employee(employee_id: EmployeeId) -> Self {
        Self { employee_id: Some(employee_id), current_reviewer_id: None }
    }

    pub fn by_reviewer(reviewer_id: EmployeeId) -> Self {
        Self { employee_id: None, current_reviewer_id: Some(reviewer_id) }
    }

    /// Exactly one dimension must be set; list caches are partitioned by one.
    pub fn into_key(self) -> Result<LeaveListKey, DomainError> {
        match (self.employee_id, self.current_reviewer_id) {
            (Some(employee_id), None) => Ok(LeaveListKey::Employee(employee_id)),
            (None, Some(reviewer_id)) => Ok(LeaveListKey::Reviewer(reviewer_id)),
            (Some(_), Some(_)) => Err(DomainError::InvalidInput(
                "only one of employee_id or current_reviewer_id may be provided".to_string(),
            )),
            (None, None) => Err(DomainError::InvalidInput(
                "employee_id or current_reviewer_id must be provided".to_string(),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeaveListKey {
    Employee(EmployeeId),
    Reviewer(EmployeeId),
}

/// Complete next state of a leave after one reviewer acted on it.
///
/// Stores apply this atomically and only while the leave still has
/// `expected_status` and `expected_reviewer_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewTransition {
    pub leave_id: LeaveId,
    pub employee_id: EmployeeId,
    pub expected_status: ReviewStatus,
    pub expected_reviewer_id: EmployeeId,
    pub next_status: ReviewStatus,
    pub next_reviewer_id: Option<EmployeeId>,
    pub decided_review_id: ReviewId,
    pub decision: ReviewStatus,
    pub comment: String,
    pub reviewed_at: DateTime<Utc>,
    /// Reviewer that receives a fresh `reviewing` record when escalating.
    pub appended_reviewer_id: Option<EmployeeId>,
}

impl ReviewTransition {
    pub fn acting_reviewer_id(&self) -> EmployeeId {
        self.expected_reviewer_id
    }

    pub fn is_escalation(&self) -> bool {
        self.appended_reviewer_id.is_some()
    }

    /// Leave-list keys whose cached contents this transition makes stale.
    pub fn stale_list_keys(&self) -> Vec<LeaveListKey> {
        let mut keys = vec![
            LeaveListKey::Employee(self.employee_id),
            LeaveListKey::Reviewer(self.expected_reviewer_id),
        ];
        if let Some(next) = self.next_reviewer_id {
            if next != self.expected_reviewer_id {
                keys.push(LeaveListKey::Reviewer(next));
            }
        }
        keys
    }
}
