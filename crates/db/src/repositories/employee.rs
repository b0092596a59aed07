use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, Transaction};

use leaveflow_core::domain::employee::{Employee, EmployeeId, EmployeePage, NewEmployee, Position};
use leaveflow_core::ports::{EmployeeDirectory, EmployeeStore, StoreError};

use super::{column, parse_date, parse_decimal, parse_timestamp, RepositoryError};
use crate::DbPool;

pub struct SqlEmployeeRepository {
    pool: DbPool,
}

impl SqlEmployeeRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load(&self, id: EmployeeId) -> Result<Option<Employee>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            "SELECT id, name, email, address, phone_number, manager_id, created_at, updated_at
             FROM employee WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?;

        let employee = match row {
            Some(ref r) => {
                let positions = load_positions(&mut tx, id).await?;
                Some(row_to_employee(r, positions)?)
            }
            None => None,
        };
        tx.commit().await?;
        Ok(employee)
    }

    async fn insert(&self, employee: NewEmployee) -> Result<Employee, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO employee (name, email, address, phone_number, manager_id,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&employee.name)
        .bind(&employee.email)
        .bind(&employee.address)
        .bind(&employee.phone_number)
        .bind(employee.manager_id.map(|id| id.0))
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for position in &employee.positions {
            sqlx::query(
                "INSERT INTO employee_position (employee_id, title, level, manager_level,
                                                month_salary, start_date, end_date)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&position.title)
            .bind(&position.level)
            .bind(position.manager_level)
            .bind(position.month_salary.to_string())
            .bind(position.start_date.to_string())
            .bind(position.end_date.map(|date| date.to_string()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        let mut positions = employee.positions;
        positions.sort_by(|left, right| right.start_date.cmp(&left.start_date));
        Ok(Employee {
            id: EmployeeId(id),
            name: employee.name,
            email: employee.email,
            address: employee.address,
            phone_number: employee.phone_number,
            manager_id: employee.manager_id,
            positions,
            created_at: now,
            updated_at: now,
        })
    }

    /// Count, rows and positions share one read transaction.
    async fn page(&self, page: u32, page_size: u32) -> Result<EmployeePage, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM employee").fetch_one(&mut *tx).await?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(page_size);
        let rows = sqlx::query(
            "SELECT id, name, email, address, phone_number, manager_id, created_at, updated_at
             FROM employee ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(i64::from(page_size))
        .bind(offset)
        .fetch_all(&mut *tx)
        .await?;

        let mut employees = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: i64 = column(row, "id")?;
            let positions = load_positions(&mut tx, EmployeeId(id)).await?;
            employees.push(row_to_employee(row, positions)?);
        }
        tx.commit().await?;

        Ok(EmployeePage { employees, total_count: u64::try_from(total).unwrap_or(0) })
    }
}

/// Most recent position first.
async fn load_positions(
    tx: &mut Transaction<'_, Sqlite>,
    id: EmployeeId,
) -> Result<Vec<Position>, RepositoryError> {
    let rows = sqlx::query(
        "SELECT title, level, manager_level, month_salary, start_date, end_date
         FROM employee_position WHERE employee_id = ?
         ORDER BY start_date DESC, id DESC",
    )
    .bind(id.0)
    .fetch_all(&mut **tx)
    .await?;

    rows.iter().map(row_to_position).collect()
}

fn row_to_employee(row: &SqliteRow, positions: Vec<Position>) -> Result<Employee, RepositoryError> {
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;
    let manager_id: Option<i64> = column(row, "manager_id")?;

    Ok(Employee {
        id: EmployeeId(column(row, "id")?),
        name: column(row, "name")?,
        email: column(row, "email")?,
        address: column(row, "address")?,
        phone_number: column(row, "phone_number")?,
        manager_id: manager_id.map(EmployeeId),
        positions,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

fn row_to_position(row: &SqliteRow) -> Result<Position, RepositoryError> {
    let month_salary: String = column(row, "month_salary")?;
    let start_date: String = column(row, "start_date")?;
    let end_date: Option<String> = column(row, "end_date")?;

    Ok(Position {
        title: column(row, "title")?,
        level: column(row, "level")?,
        manager_level: column(row, "manager_level")?,
        month_salary: parse_decimal("month_salary", &month_salary)?,
        start_date: parse_date("start_date", &start_date)?,
        end_date: end_date.as_deref().map(|value| parse_date("end_date", value)).transpose()?,
    })
}

#[async_trait]
impl EmployeeDirectory for SqlEmployeeRepository {
    async fn find_employee(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        Ok(self.load(id).await?)
    }
}

#[async_trait]
impl EmployeeStore for SqlEmployeeRepository {
    async fn create_employee(&self, employee: NewEmployee) -> Result<Employee, StoreError> {
        Ok(self.insert(employee).await?)
    }

    async fn list_employees(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<EmployeePage, StoreError> {
        Ok(self.page(page, page_size).await?)
    }
}
