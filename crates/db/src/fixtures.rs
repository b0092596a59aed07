use serde::Serialize;
use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_EMPLOYEES: &[&str] = &["Alice", "Bob", "Charlie", "David", "Eva"];

/// (table, rows the fixture owns)
const SEED_ROWS: &[(&str, i64)] =
    &[("employee", 5), ("employee_position", 5), ("leave_request", 3), ("leave_review", 2)];

/// Demonstration organization plus one leave in each status.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &'static str = include_str!("../fixtures/seed.sql");

    /// Loads the fixture in one transaction. Rows that already exist are left
    /// untouched, so `inserted_rows` is zero on a seeded database.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        let outcome = tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            employees: SEED_EMPLOYEES.to_vec(),
            inserted_rows: outcome.rows_affected(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_ROWS.len() + 1);

        for (table, expected) in SEED_ROWS {
            let actual: i64 =
                sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE id <= ?"))
                    .bind(*expected)
                    .fetch_one(pool)
                    .await?;
            checks.push(SeedCheck { name: format!("{table} rows"), expected: *expected, actual });
        }

        let pending: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM leave_request
             WHERE status = 'reviewing' AND current_reviewer_id = 3",
        )
        .fetch_one(pool)
        .await?;
        checks.push(SeedCheck {
            name: "pending with Charlie".to_string(),
            expected: 1,
            actual: pending,
        });

        Ok(VerificationResult { checks })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SeedResult {
    pub employees: Vec<&'static str>,
    pub inserted_rows: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SeedCheck {
    pub name: String,
    pub expected: i64,
    pub actual: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct VerificationResult {
    pub checks: Vec<SeedCheck>,
}

impl VerificationResult {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|check| check.expected == check.actual)
    }

    pub fn failures(&self) -> impl Iterator<Item = &SeedCheck> {
        self.checks.iter().filter(|check| check.expected != check.actual)
    }
}
