use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, Transaction};

use leaveflow_core::domain::employee::EmployeeId;
use leaveflow_core::domain::leave::{
    Leave, LeaveId, LeaveListKey, LeaveReview, LeaveType, NewLeave, ReviewId, ReviewStatus,
    ReviewTransition,
};
use leaveflow_core::ports::{LeaveStore, StoreError};

use super::{column, parse_date, parse_timestamp, RepositoryError};
use crate::DbPool;

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, reason, status,
                             current_reviewer_id, created_at, updated_at";

pub struct SqlLeaveRepository {
    pool: DbPool,
}

impl SqlLeaveRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, leave: NewLeave) -> Result<Leave, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO leave_request (employee_id, leave_type, start_date, end_date, reason,
                                        status, current_reviewer_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(leave.employee_id.0)
        .bind(leave.leave_type.as_str())
        .bind(leave.start_date.to_string())
        .bind(leave.end_date.to_string())
        .bind(&leave.reason)
        .bind(leave.status.as_str())
        .bind(leave.current_reviewer_id.map(|id| id.0))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut reviews = Vec::new();
        if let Some(reviewer_id) = leave.current_reviewer_id {
            let review_id = insert_pending_review(&mut tx, LeaveId(id), reviewer_id, now).await?;
            reviews.push(LeaveReview {
                id: review_id,
                leave_id: LeaveId(id),
                reviewer_id,
                status: ReviewStatus::Reviewing,
                comment: String::new(),
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            });
        }

        tx.commit().await?;

        Ok(Leave {
            id: LeaveId(id),
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
        })
    }

    /// Reads the row and its reviews inside one transaction so both come from
    /// the same snapshot.
    async fn load(&self, id: LeaveId) -> Result<Option<Leave>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let leave = load_leave(&mut tx, id).await?;
        tx.commit().await?;
        Ok(leave)
    }

    async fn list(&self, key: LeaveListKey) -> Result<Vec<Leave>, RepositoryError> {
        let (filter, id) = match key {
            LeaveListKey::Employee(id) => ("employee_id", id),
            LeaveListKey::Reviewer(id) => ("current_reviewer_id", id),
        };
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(&format!(
            "SELECT {LEAVE_COLUMNS} FROM leave_request WHERE {filter} = ? ORDER BY id DESC"
        ))
        .bind(id.0)
        .fetch_all(&mut *tx)
        .await?;

        let mut leaves = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = column(row, "id")?;
            let reviews = load_reviews(&mut tx, LeaveId(id)).await?;
            leaves.push(row_to_leave(row, reviews)?);
        }
        tx.commit().await?;
        Ok(leaves)
    }

    /// Both guarded updates and the optional insert share one transaction;
    /// dropping `tx` on an early return rolls everything back.
    async fn apply(&self, transition: &ReviewTransition) -> Result<Leave, RepositoryError> {
        let at = transition.reviewed_at.to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE leave_request
             SET status = ?, current_reviewer_id = ?, updated_at = ?
             WHERE id = ? AND status = ? AND current_reviewer_id = ?",
        )
        .bind(transition.next_status.as_str())
        .bind(transition.next_reviewer_id.map(|id| id.0))
        .bind(&at)
        .bind(transition.leave_id.0)
        .bind(transition.expected_status.as_str())
        .bind(transition.expected_reviewer_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if updated == 0 {
            return Err(RepositoryError::Stale(format!(
                "leave {} is no longer awaiting reviewer {}",
                transition.leave_id, transition.expected_reviewer_id
            )));
        }

        let decided = sqlx::query(
            "UPDATE leave_review
             SET status = ?, comment = ?, reviewed_at = ?, updated_at = ?
             WHERE id = ? AND leave_id = ? AND reviewer_id = ? AND status = 'reviewing'",
        )
        .bind(transition.decision.as_str())
        .bind(&transition.comment)
        .bind(&at)
        .bind(&at)
        .bind(transition.decided_review_id.0)
        .bind(transition.leave_id.0)
        .bind(transition.expected_reviewer_id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if decided == 0 {
            return Err(RepositoryError::Stale(format!(
                "review {} of leave {} was already decided",
                transition.decided_review_id.0, transition.leave_id
            )));
        }

        if let Some(reviewer_id) = transition.appended_reviewer_id {
            insert_pending_review(&mut tx, transition.leave_id, reviewer_id, transition.reviewed_at)
                .await?;
        }

        let leave = load_leave(&mut tx, transition.leave_id).await?.ok_or_else(|| {
            RepositoryError::Decode(format!("leave {} vanished after review", transition.leave_id))
        })?;
        tx.commit().await?;
        Ok(leave)
    }
}

async fn load_leave(
    tx: &mut Transaction<'_, Sqlite>,
    id: LeaveId,
) -> Result<Option<Leave>, RepositoryError> {
    let row = sqlx::query(&format!("SELECT {LEAVE_COLUMNS} FROM leave_request WHERE id = ?"))
        .bind(id.0)
        .fetch_optional(&mut **tx)
        .await?;

    match row {
        Some(ref r) => {
            let reviews = load_reviews(tx, id).await?;
            Ok(Some(row_to_leave(r, reviews)?))
        }
        None => Ok(None),
    }
}

/// Oldest first.
async fn load_reviews(
    tx: &mut Transaction<'_, Sqlite>,
    leave_id: LeaveId,
) -> Result<Vec<LeaveReview>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT id, leave_id, reviewer_id, status, comment, reviewed_at, created_at, updated_at
         FROM leave_review WHERE leave_id = ? ORDER BY id ASC",
    )
    .bind(leave_id.0)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(row_to_review).collect()
}

async fn insert_pending_review(
    tx: &mut Transaction<'_, Sqlite>,
    leave_id: LeaveId,
    reviewer_id: EmployeeId,
    at: chrono::DateTime<Utc>,
) -> Result<ReviewId, RepositoryError> {
    let id = sqlx::query(
        "INSERT INTO leave_review (leave_id, reviewer_id, status, comment, reviewed_at,
                                   created_at, updated_at)
         VALUES (?, ?, 'reviewing', '', NULL, ?, ?)",
    )
    .bind(leave_id.0)
    .bind(reviewer_id.0)
    .bind(at.to_rfc3339())
    .bind(at.to_rfc3339())
    .execute(&mut **tx)
    .await?
    .last_insert_rowid();

    Ok(ReviewId(id))
}

fn parse_status(value: &str) -> Result<ReviewStatus, RepositoryError> {
    ReviewStatus::parse(value)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown review status `{value}`")))
}

fn row_to_leave(row: &SqliteRow, reviews: Vec<LeaveReview>) -> Result<Leave, RepositoryError> {
    let leave_type: String = column(row, "leave_type")?;
    let start_date: String = column(row, "start_date")?;
    let end_date: String = column(row, "end_date")?;
    let status: String = column(row, "status")?;
    let current_reviewer_id: Option<i64> = column(row, "current_reviewer_id")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Leave {
        id: LeaveId(column(row, "id")?),
        employee_id: EmployeeId(column(row, "employee_id")?),
        leave_type: LeaveType::parse(&leave_type)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown leave type `{leave_type}`")))?,
        start_date: parse_date("start_date", &start_date)?,
        end_date: parse_date("end_date", &end_date)?,
        reason: column(row, "reason")?,
        status: parse_status(&status)?,
        current_reviewer_id: current_reviewer_id.map(EmployeeId),
        reviews,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_review(row: &SqliteRow) -> Result<LeaveReview, RepositoryError> {
    let status: String = column(row, "status")?;
    let reviewed_at: Option<String> = column(row, "reviewed_at")?;
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(LeaveReview {
        id: ReviewId(column(row, "id")?),
        leave_id: LeaveId(column(row, "leave_id")?),
        reviewer_id: EmployeeId(column(row, "reviewer_id")?),
        status: parse_status(&status)?,
        comment: column(row, "comment")?,
        reviewed_at: reviewed_at
            .as_deref()
            .map(|value| parse_timestamp("reviewed_at", value))
            .transpose()?,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait]
impl LeaveStore for SqlLeaveRepository {
    async fn create_leave(&self, leave: NewLeave) -> Result<Leave, StoreError> {
        Ok(self.insert(leave).await?)
    }

    async fn find_leave(&self, id: LeaveId) -> Result<Option<Leave>, StoreError> {
        Ok(self.load(id).await?)
    }

    async fn list_leaves(&self, key: LeaveListKey) -> Result<Vec<Leave>, StoreError> {
        Ok(self.list(key).await?)
    }

    async fn apply_review(&self, transition: &ReviewTransition) -> Result<Leave, StoreError> {
        Ok(self.apply(transition).await?)
    }
}
