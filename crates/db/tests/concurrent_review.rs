use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tempfile::TempDir;

use leaveflow_core::approvals::{ApprovalEngine, ReviewDecision};
use leaveflow_core::domain::employee::{Employee, NewEmployee, Position};
use leaveflow_core::domain::leave::{Leave, LeaveId, LeaveRequest, ReviewStatus};
use leaveflow_core::ports::{EmployeeStore, LeaveStore, StoreError};
use leaveflow_db::repositories::{SqlEmployeeRepository, SqlLeaveRepository};
use leaveflow_db::{connect_with_settings, migrations, DbPool};

/// A file database so the pool hands out independent connections.
async fn shared_pool(dir: &TempDir) -> DbPool {
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("leaveflow.db").display());
    let pool = connect_with_settings(&url, 6, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    pool
}

async fn hire(
    repo: &SqlEmployeeRepository,
    name: &str,
    manager: Option<&Employee>,
    level: i32,
) -> Employee {
    repo.create_employee(NewEmployee {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_ascii_lowercase()),
        address: String::new(),
        phone_number: String::new(),
        manager_id: manager.map(|manager| manager.id),
        positions: vec![Position {
            title: "Engineer".to_string(),
            level: String::new(),
            manager_level: level,
            month_salary: Decimal::new(500_000, 2),
            start_date: NaiveDate::from_ymd_opt(2023, 1, 2).expect("date"),
            end_date: None,
        }],
    })
    .await
    .expect("hire")
}

/// Eight days needs level 3, so two level-0 managers both escalate.
async fn submit_eight_days(
    leaves: &SqlLeaveRepository,
    engine: &ApprovalEngine,
    requester: &Employee,
) -> Leave {
    let draft = engine
        .validate_request(&LeaveRequest {
            employee_id: Some(requester.id),
            leave_type: Some("annual".to_string()),
            start_date: Some("2026-05-04".parse().expect("start")),
            end_date: Some("2026-05-12".parse().expect("end")),
            reason: "family visit".to_string(),
        })
        .expect("valid");
    let planned = engine.plan_creation(draft, requester).expect("plan");
    leaves.create_leave(planned).await.expect("create")
}

async fn approve(
    leaves: &SqlLeaveRepository,
    engine: &ApprovalEngine,
    leave: &Leave,
    reviewer: &Employee,
) -> Leave {
    let transition = engine
        .plan_review(
            leave,
            ReviewDecision {
                reviewer_id: reviewer.id,
                decision: ReviewStatus::Approved,
                comment: String::new(),
            },
            Some(reviewer),
            Utc::now(),
        )
        .expect("plan");
    leaves.apply_review(&transition).await.expect("apply")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_reviews_of_one_leave_apply_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = shared_pool(&dir).await;
    let employees = SqlEmployeeRepository::new(pool.clone());
    let leaves = Arc::new(SqlLeaveRepository::new(pool));
    let engine = ApprovalEngine::default();
    let director = hire(&employees, "Dana", None, 5).await;
    let manager = hire(&employees, "Milo", Some(&director), 0).await;
    let report = hire(&employees, "Ravi", Some(&manager), 0).await;
    let leave = submit_eight_days(&leaves, &engine, &report).await;

    let transition = engine
        .plan_review(
            &leave,
            ReviewDecision {
                reviewer_id: manager.id,
                decision: ReviewStatus::Approved,
                comment: "ok".to_string(),
            },
            Some(&manager),
            Utc::now(),
        )
        .expect("plan");

    let attempts = (0..2)
        .map(|_| {
            let leaves = Arc::clone(&leaves);
            let transition = transition.clone();
            tokio::spawn(async move { leaves.apply_review(&transition).await })
        })
        .collect::<Vec<_>>();
    let mut outcomes = Vec::new();
    for attempt in attempts {
        outcomes.push(attempt.await.expect("join"));
    }

    let applied = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let conflicts =
        outcomes.iter().filter(|outcome| matches!(outcome, Err(StoreError::Conflict(_)))).count();
    assert_eq!((applied, conflicts), (1, 1), "outcomes: {outcomes:?}");

    let stored = leaves.find_leave(leave.id).await.expect("find").expect("exists");
    assert_eq!(stored.status, ReviewStatus::Reviewing);
    assert_eq!(stored.current_reviewer_id, Some(director.id));
    let chain = stored.reviews.iter().map(|review| review.reviewer_id).collect::<Vec<_>>();
    assert_eq!(chain, vec![manager.id, director.id]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_half_applied_review() {
    let dir = tempfile::tempdir().expect("tempdir");
    let pool = shared_pool(&dir).await;
    let employees = SqlEmployeeRepository::new(pool.clone());
    let leaves = Arc::new(SqlLeaveRepository::new(pool));
    let engine = ApprovalEngine::default();
    let director = hire(&employees, "Iris", None, 5).await;
    let senior = hire(&employees, "Jon", Some(&director), 0).await;
    let lead = hire(&employees, "Kai", Some(&senior), 0).await;
    let report = hire(&employees, "Lea", Some(&lead), 0).await;

    let done = Arc::new(AtomicBool::new(false));
    let readers = (0..4)
        .map(|_| {
            let leaves = Arc::clone(&leaves);
            let done = Arc::clone(&done);
            tokio::spawn(async move {
                let engine = ApprovalEngine::default();
                let mut inconsistent = Vec::new();
                while !done.load(Ordering::Acquire) {
                    for id in 1..=40 {
                        let Some(leave) = leaves.find_leave(LeaveId(id)).await.expect("find")
                        else {
                            continue;
                        };
                        if let Some(reviewer) = leave.current_reviewer_id {
                            if let Err(error) = engine.authorize_review(&leave, reviewer) {
                                inconsistent.push(format!("{error}"));
                            }
                        }
                    }
                    tokio::task::yield_now().await;
                }
                inconsistent
            })
        })
        .collect::<Vec<_>>();

    for _ in 0..40 {
        let leave = submit_eight_days(&leaves, &engine, &report).await;
        let leave = approve(&leaves, &engine, &leave, &lead).await;
        let leave = approve(&leaves, &engine, &leave, &senior).await;
        let leave = approve(&leaves, &engine, &leave, &director).await;
        assert_eq!(leave.status, ReviewStatus::Approved);
        assert_eq!(leave.reviews.len(), 3);
    }
    done.store(true, Ordering::Release);

    for reader in readers {
        let inconsistent = reader.await.expect("join");
        assert!(inconsistent.is_empty(), "torn reads: {:?}", &inconsistent[..1]);
    }
}
