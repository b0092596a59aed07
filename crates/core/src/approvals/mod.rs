//! Leave approval state machine.
//!
//! Everything here is pure: callers fetch the leave and the people involved,
//! the engine decides the next state, and the store applies it atomically.
//!
//! ```text
//!            create (no manager)
//!   ──────────────────────────────────────► approved
//!            create (has manager)
//!   ──────────────────────────────────────► reviewing ──reject──► rejected
//!                                             │   ▲
//!                               approve,      │   │ approve, level too low:
//!                               level enough  │   └─ escalate to reviewer's manager
//!                                             ▼
//!                                          approved
//! ```

pub mod escalation;

use chrono::{DateTime, Utc};

use crate::domain::employee::{Employee, EmployeeId};
use crate::domain::leave::{
    Leave, LeaveRequest, LeaveType, NewLeave, ReviewId, ReviewStatus, ReviewTransition,
};
use crate::errors::DomainError;

pub use escalation::{AuthorityThreshold, EscalationPolicy};

/// Upper bound on reviewers consulted for a single leave. Guards against a
/// corrupted manager graph.
pub const MAX_REVIEW_CHAIN: usize = 16;

/// Structurally valid leave submission, not yet routed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaveDraft {
    pub employee_id: EmployeeId,
    pub leave_type: LeaveType,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub reason: String,
}

/// A reviewer's decision on the leave currently assigned to them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewDecision {
    pub reviewer_id: EmployeeId,
    pub decision: ReviewStatus,
    pub comment: String,
}

#[derive(Clone, Debug, Default)]
pub struct ApprovalEngine {
    policy: EscalationPolicy,
}

impl ApprovalEngine {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    pub fn validate_request(&self, request: &LeaveRequest) -> Result<LeaveDraft, DomainError> {
        let employee_id = request
            .employee_id
            .ok_or_else(|| DomainError::InvalidInput("employee_id is required".to_string()))?;

        let raw_type = request
            .leave_type
            .as_deref()
            .ok_or_else(|| DomainError::InvalidInput("type is required".to_string()))?;
        let leave_type = LeaveType::parse(raw_type).ok_or_else(|| {
            DomainError::InvalidInput(format!("type `{raw_type}` must be one of annual|sick"))
        })?;

        let start_date = request
            .start_date
            .ok_or_else(|| DomainError::InvalidInput("start_date is required".to_string()))?;
        let end_date = request
            .end_date
            .ok_or_else(|| DomainError::InvalidInput("end_date is required".to_string()))?;
        if start_date > end_date {
            return Err(DomainError::InvalidInput(format!(
                "start_date {start_date} must not be after end_date {end_date}"
            )));
        }

        Ok(LeaveDraft {
            employee_id,
            leave_type,
            start_date,
            end_date,
            reason: request.reason.clone(),
        })
    }

    /// Routes a new leave: employees without a manager are approved on the
    /// spot, everyone else starts with their manager as reviewer.
    pub fn plan_creation(
        &self,
        draft: LeaveDraft,
        requester: &Employee,
    ) -> Result<NewLeave, DomainError> {
        if requester.id != draft.employee_id {
            return Err(DomainError::InvariantViolation(format!(
                "requester {} does not own leave draft for employee {}",
                requester.id, draft.employee_id
            )));
        }

        let status = match requester.manager_id {
            Some(_) => ReviewStatus::Reviewing,
            None => ReviewStatus::Approved,
        };

        Ok(NewLeave {
            employee_id: draft.employee_id,
            leave_type: draft.leave_type,
            start_date: draft.start_date,
            end_date: draft.end_date,
            reason: draft.reason,
            status,
            current_reviewer_id: requester.manager_id,
        })
    }

    pub fn validate_decision(&self, decision: ReviewStatus) -> Result<(), DomainError> {
        match decision {
            ReviewStatus::Approved | ReviewStatus::Rejected => Ok(()),
            other => Err(DomainError::InvalidInput(format!(
                "decision `{other}` must be one of approved|rejected"
            ))),
        }
    }

    /// Checks that `reviewer_id` is the one reviewer allowed to act on the
    /// leave right now and returns the pending review record's id.
    pub fn authorize_review(
        &self,
        leave: &Leave,
        reviewer_id: EmployeeId,
    ) -> Result<ReviewId, DomainError> {
        if leave.status != ReviewStatus::Reviewing {
            return Err(DomainError::StatusConflict(format!(
                "leave {} is {} and no longer under review",
                leave.id, leave.status
            )));
        }

        if leave.current_reviewer_id != Some(reviewer_id) {
            return Err(DomainError::StatusConflict(format!(
                "employee {reviewer_id} is not the current reviewer of leave {}",
                leave.id
            )));
        }

        match leave.last_review() {
            Some(review)
                if review.reviewer_id == reviewer_id && review.status == ReviewStatus::Reviewing =>
            {
                Ok(review.id)
            }
            _ => Err(DomainError::InvariantViolation(format!(
                "leave {} has no pending review for its current reviewer {reviewer_id}",
                leave.id
            ))),
        }
    }

    /// Computes the complete next state after `decision`.
    ///
    /// `reviewer` is the acting reviewer's employee record; it is only
    /// consulted for approvals, where their authority decides whether the
    /// leave moves on to their manager.
    pub fn plan_review(
        &self,
        leave: &Leave,
        decision: ReviewDecision,
        reviewer: Option<&Employee>,
        now: DateTime<Utc>,
    ) -> Result<ReviewTransition, DomainError> {
        self.validate_decision(decision.decision)?;
        let decided_review_id = self.authorize_review(leave, decision.reviewer_id)?;

        let mut transition = ReviewTransition {
            leave_id: leave.id,
            employee_id: leave.employee_id,
            expected_status: ReviewStatus::Reviewing,
            expected_reviewer_id: decision.reviewer_id,
            next_status: decision.decision,
            next_reviewer_id: None,
            decided_review_id,
            decision: decision.decision,
            comment: decision.comment,
            reviewed_at: now,
            appended_reviewer_id: None,
        };

        if decision.decision == ReviewStatus::Rejected {
            return Ok(transition);
        }

        let reviewer = match reviewer {
            Some(reviewer) if reviewer.id == decision.reviewer_id => reviewer,
            _ => {
                return Err(DomainError::InvariantViolation(format!(
                    "approving leave {} requires the record of reviewer {}",
                    leave.id, decision.reviewer_id
                )))
            }
        };

        if !self.policy.needs_next_reviewer(leave, reviewer)? {
            return Ok(transition);
        }

        let next_reviewer_id = self.next_reviewer(leave, reviewer)?;
        transition.next_status = ReviewStatus::Reviewing;
        transition.next_reviewer_id = Some(next_reviewer_id);
        transition.appended_reviewer_id = Some(next_reviewer_id);
        Ok(transition)
    }

    fn next_reviewer(&self, leave: &Leave, reviewer: &Employee) -> Result<EmployeeId, DomainError> {
        let required = self.policy.required_authority_level(leave.span_days());
        let Some(manager_id) = reviewer.manager_id else {
            return Err(DomainError::InvariantViolation(format!(
                "authority chain exhausted: reviewer {} has no manager, leave {} needs level {}",
                reviewer.id, leave.id, required
            )));
        };

        if manager_id == leave.employee_id || leave.has_reviewed(manager_id) {
            return Err(DomainError::InvariantViolation(format!(
                "manager chain of leave {} loops back to employee {manager_id}",
                leave.id
            )));
        }

        if leave.reviews.len() >= MAX_REVIEW_CHAIN {
            return Err(DomainError::InvariantViolation(format!(
                "leave {} exceeded {MAX_REVIEW_CHAIN} reviewers without reaching level {required}",
                leave.id
            )));
        }

        Ok(manager_id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;

    use super::{ApprovalEngine, LeaveDraft, ReviewDecision, MAX_REVIEW_CHAIN};
    use crate::domain::employee::{Employee, EmployeeId, Position};
    use crate::domain::leave::{
        Leave, LeaveId, LeaveRequest, LeaveReview, LeaveType, ReviewId, ReviewStatus,
    };
    use crate::errors::DomainError;

    fn employee(id: i64, manager_id: Option<i64>, level: i32) -> Employee {
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
                manager_level: level,
                month_salary: Decimal::new(400_000, 2),
                start_date: NaiveDate::from_ymd_opt(2023, 1, 1).expect("date"),
                end_date: None,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    fn request(start: &str, end: &str) -> LeaveRequest {
        LeaveRequest {
            employee_id: Some(EmployeeId(1)),
            leave_type: Some("annual".to_string()),
            start_date: Some(start.parse().expect("start")),
            end_date: Some(end.parse().expect("end")),
            reason: "family trip".to_string(),
        }
    }

    fn pending_leave(span_days: i64, reviewers: &[i64]) -> Leave {
        let now = Utc::now();
        let start = NaiveDate::from_ymd_opt(2026, 5, 4).expect("date");
        let reviews = reviewers
            .iter()
            .enumerate()
            .map(|(index, reviewer)| LeaveReview {
                id: ReviewId(index as i64 + 1),
                leave_id: LeaveId(1),
                reviewer_id: EmployeeId(*reviewer),
                status: if index + 1 == reviewers.len() {
                    ReviewStatus::Reviewing
                } else {
                    ReviewStatus::Approved
                },
                comment: String::new(),
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            })
            .collect::<Vec<_>>();

        Leave {
            id: LeaveId(1),
            employee_id: EmployeeId(1),
            leave_type: LeaveType::Annual,
            start_date: start,
            end_date: start + Duration::days(span_days),
            reason: String::new(),
            status: ReviewStatus::Reviewing,
            current_reviewer_id: reviewers.last().copied().map(EmployeeId),
            reviews,
            created_at: now,
            updated_at: now,
        }
    }

    fn approve(reviewer: i64) -> ReviewDecision {
        ReviewDecision {
            reviewer_id: EmployeeId(reviewer),
            decision: ReviewStatus::Approved,
            comment: "ok".to_string(),
        }
    }

    #[test]
    fn validation_rejects_missing_fields_and_unknown_type() {
        let engine = ApprovalEngine::default();

        let mut missing_employee = request("2026-01-05", "2026-01-06");
        missing_employee.employee_id = None;
        assert!(matches!(
            engine.validate_request(&missing_employee),
            Err(DomainError::InvalidInput(_))
        ));

        let mut bad_type = request("2026-01-05", "2026-01-06");
        bad_type.leave_type = Some("sabbatical".to_string());
        assert!(matches!(engine.validate_request(&bad_type), Err(DomainError::InvalidInput(_))));

        let mut missing_end = request("2026-01-05", "2026-01-06");
        missing_end.end_date = None;
        assert!(matches!(engine.validate_request(&missing_end), Err(DomainError::InvalidInput(_))));
    }

    #[test]
    fn validation_rejects_start_after_end_but_allows_single_day() {
        let engine = ApprovalEngine::default();

        assert!(matches!(
            engine.validate_request(&request("2026-01-07", "2026-01-06")),
            Err(DomainError::InvalidInput(_))
        ));

        let draft = engine.validate_request(&request("2026-01-06", "2026-01-06")).expect("valid");
        assert_eq!(draft.leave_type, LeaveType::Annual);
        assert_eq!(draft.reason, "family trip");
    }

    #[test]
    fn employee_without_manager_is_auto_approved() {
        let engine = ApprovalEngine::default();
        let draft = engine.validate_request(&request("2026-01-05", "2026-01-20")).expect("valid");

        let planned = engine.plan_creation(draft, &employee(1, None, 5)).expect("plan");

        assert_eq!(planned.status, ReviewStatus::Approved);
        assert_eq!(planned.current_reviewer_id, None);
    }

    #[test]
    fn employee_with_manager_starts_under_manager_review() {
        let engine = ApprovalEngine::default();
        let draft = engine.validate_request(&request("2026-01-05", "2026-01-06")).expect("valid");

        let planned = engine.plan_creation(draft, &employee(1, Some(2), 0)).expect("plan");

        assert_eq!(planned.status, ReviewStatus::Reviewing);
        assert_eq!(planned.current_reviewer_id, Some(EmployeeId(2)));
    }

    #[test]
    fn creation_for_someone_else_is_refused() {
        let engine = ApprovalEngine::default();
        let draft = LeaveDraft {
            employee_id: EmployeeId(9),
            leave_type: LeaveType::Sick,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 5).expect("date"),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 5).expect("date"),
            reason: String::new(),
        };

        assert!(matches!(
            engine.plan_creation(draft, &employee(1, Some(2), 0)),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn reviewing_is_not_a_valid_decision() {
        let engine = ApprovalEngine::default();
        let decision = ReviewDecision {
            reviewer_id: EmployeeId(2),
            decision: ReviewStatus::Reviewing,
            comment: String::new(),
        };

        assert!(matches!(
            engine.plan_review(&pending_leave(1, &[2]), decision, None, Utc::now()),
            Err(DomainError::InvalidInput(_))
        ));
    }

    #[test]
    fn only_current_reviewer_may_act() {
        let engine = ApprovalEngine::default();
        let leave = pending_leave(1, &[2]);

        assert!(matches!(
            engine.plan_review(&leave, approve(3), Some(&employee(3, None, 9)), Utc::now()),
            Err(DomainError::StatusConflict(_))
        ));
    }

    #[test]
    fn decided_leave_cannot_be_reviewed_again() {
        let engine = ApprovalEngine::default();
        let mut leave = pending_leave(1, &[2]);
        leave.status = ReviewStatus::Approved;
        leave.current_reviewer_id = None;

        assert!(matches!(
            engine.plan_review(&leave, approve(2), Some(&employee(2, None, 9)), Utc::now()),
            Err(DomainError::StatusConflict(_))
        ));
    }

    #[test]
    fn rejection_is_terminal_regardless_of_authority() {
        let engine = ApprovalEngine::default();
        let decision = ReviewDecision {
            reviewer_id: EmployeeId(2),
            decision: ReviewStatus::Rejected,
            comment: "team offsite".to_string(),
        };

        let transition =
            engine.plan_review(&pending_leave(30, &[2]), decision, None, Utc::now()).expect("plan");

        assert_eq!(transition.next_status, ReviewStatus::Rejected);
        assert_eq!(transition.next_reviewer_id, None);
        assert_eq!(transition.appended_reviewer_id, None);
        assert_eq!(transition.decided_review_id, ReviewId(1));
        assert_eq!(transition.comment, "team offsite");
    }

    #[test]
    fn five_day_leave_approved_by_level_zero_terminates() {
        let engine = ApprovalEngine::default();

        let reviewer = employee(2, Some(3), 0);

        let transition = engine
            .plan_review(&pending_leave(5, &[2]), approve(2), Some(&reviewer), Utc::now())
            .expect("plan");

        assert_eq!(transition.next_status, ReviewStatus::Approved);
        assert_eq!(transition.next_reviewer_id, None);
        assert!(!transition.is_escalation());
    }

    #[test]
    fn six_day_leave_approved_by_level_zero_escalates_to_manager() {
        let engine = ApprovalEngine::default();

        let reviewer = employee(2, Some(3), 0);

        let transition = engine
            .plan_review(&pending_leave(6, &[2]), approve(2), Some(&reviewer), Utc::now())
            .expect("plan");

        assert_eq!(transition.next_status, ReviewStatus::Reviewing);
        assert_eq!(transition.next_reviewer_id, Some(EmployeeId(3)));
        assert_eq!(transition.appended_reviewer_id, Some(EmployeeId(3)));
        assert_eq!(transition.decision, ReviewStatus::Approved);
    }

    #[test]
    fn exhausted_authority_chain_is_an_invariant_violation() {
        let engine = ApprovalEngine::default();

        assert!(matches!(
            engine.plan_review(
                &pending_leave(12, &[2]),
                approve(2),
                Some(&employee(2, None, 1)),
                Utc::now()
            ),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn approval_without_reviewer_record_is_an_invariant_violation() {
        let engine = ApprovalEngine::default();

        assert!(matches!(
            engine.plan_review(&pending_leave(1, &[2]), approve(2), None, Utc::now()),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn cyclic_manager_chain_is_detected() {
        let engine = ApprovalEngine::default();
        // 2 already approved, 3 is reviewing and reports back to 2.
        let leave = pending_leave(12, &[2, 3]);

        assert!(matches!(
            engine.plan_review(&leave, approve(3), Some(&employee(3, Some(2), 1)), Utc::now()),
            Err(DomainError::InvariantViolation(_))
        ));
    }

    #[test]
    fn review_chain_is_bounded() {
        let engine = ApprovalEngine::default();
        let reviewers = (100..100 + MAX_REVIEW_CHAIN as i64).collect::<Vec<_>>();
        let leave = pending_leave(12, &reviewers);
        let last = *reviewers.last().expect("reviewers");

        assert!(matches!(
            engine.plan_review(
                &leave,
                approve(last),
                Some(&employee(last, Some(999), 1)),
                Utc::now()
            ),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
