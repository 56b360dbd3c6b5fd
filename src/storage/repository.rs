use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::domain::{Expense, ExpenseId};

use super::MIGRATION_001_INITIAL;

const EXPENSE_COLUMNS: &str =
    "id, sequence, amount, paid_by, split_with, created_by, created_at, label";

/// Repository for persisting and querying expenses.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Save a new expense.
    /// Automatically assigns the next sequence number.
    pub async fn save_expense(&self, expense: &mut Expense) -> Result<()> {
        expense.sequence = self.next_sequence().await?;

        let split_with_json = serde_json::to_string(&expense.split_with)?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, sequence, amount, paid_by, split_with, created_by, created_at, label)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(expense.sequence)
        .bind(expense.amount.to_string())
        .bind(&expense.paid_by)
        .bind(&split_with_json)
        .bind(&expense.created_by)
        .bind(expense.created_at.to_rfc3339())
        .bind(&expense.label)
        .execute(&self.pool)
        .await
        .context("Failed to save expense")?;

        debug!(id = %expense.id, sequence = expense.sequence, "Saved expense");
        Ok(())
    }

    async fn next_sequence(&self) -> Result<i64> {
        let row = sqlx::query(
            r#"
            UPDATE sequence_counter
            SET value = value + 1
            WHERE name = 'expense_sequence'
            RETURNING value
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to get next sequence number")?;

        Ok(row.get("value"))
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM expenses WHERE id = ?",
            EXPENSE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    /// List all expenses in insertion order.
    pub async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM expenses ORDER BY sequence",
            EXPENSE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// List expenses a participant paid for or shares, in insertion order.
    pub async fn list_expenses_for_participant(&self, participant: &str) -> Result<Vec<Expense>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM expenses
            WHERE paid_by = ?
               OR EXISTS (SELECT 1 FROM json_each(expenses.split_with) WHERE json_each.value = ?)
            ORDER BY sequence
            "#,
            EXPENSE_COLUMNS
        ))
        .bind(participant)
        .bind(participant)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses for participant")?;

        rows.iter().map(Self::row_to_expense).collect()
    }

    /// Delete an expense. Returns false if nothing matched.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to delete expense")?;

        Ok(result.rows_affected() > 0)
    }

    /// Count stored expenses.
    pub async fn count_expenses(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM expenses")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count expenses")?;

        Ok(row.get("count"))
    }

    fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let amount_str: String = row.get("amount");
        let split_with_json: String = row.get("split_with");
        let created_at_str: String = row.get("created_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            sequence: row.get("sequence"),
            amount: Decimal::from_str(&amount_str)
                .with_context(|| format!("Invalid stored amount: {}", amount_str))?,
            paid_by: row.get("paid_by"),
            split_with: serde_json::from_str(&split_with_json)
                .context("Invalid split_with list")?,
            created_by: row.get("created_by"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
            label: row.get("label"),
        })
    }
}
