use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::domain::{
    Amount, Balances, Expense, ExpenseId, MAX_EXPENSE_AMOUNT, Participant, SettlementPolicy,
    Transaction, compute_balances, format_amount, normalize_participant, simplify_with,
};
use crate::storage::Repository;

use super::{AppError, LedgerSummary, SettlementCheck, build_settlement_check, build_summary};

/// Application service providing high-level operations for the expense ledger.
/// This is the primary interface for any client (CLI, importer, tests).
///
/// Balances and settlements are never stored: every query recomputes them
/// from the full list of expenses in insertion order.
pub struct LedgerService {
    repo: Repository,
    policy: SettlementPolicy,
}

/// Input for recording an expense.
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub amount: Amount,
    pub paid_by: String,
    pub split_with: Vec<String>,
    pub created_by: String,
    pub label: Option<String>,
    /// Defaults to now
    pub created_at: Option<DateTime<Utc>>,
}

impl NewExpense {
    pub fn new(
        amount: Amount,
        paid_by: impl Into<String>,
        split_with: Vec<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            amount,
            paid_by: paid_by.into(),
            split_with,
            created_by: created_by.into(),
            label: None,
            created_at: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Check the input without touching the database. Recording an expense
    /// and a dry-run import both go through here.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::NonPositiveAmount(self.amount));
        }
        if self.amount > MAX_EXPENSE_AMOUNT {
            return Err(AppError::InvalidAmount(format!(
                "{} exceeds the maximum of {}",
                self.amount,
                format_amount(MAX_EXPENSE_AMOUNT)
            )));
        }
        if normalize_participant(&self.paid_by).is_empty() {
            return Err(AppError::MissingPayer);
        }
        if self.normalized_split().is_empty() {
            return Err(AppError::MissingSplit);
        }
        Ok(())
    }

    fn normalized_split(&self) -> Vec<Participant> {
        self.split_with
            .iter()
            .map(|name| normalize_participant(name))
            .filter(|name| !name.is_empty())
            .collect()
    }
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self {
            repo,
            policy: SettlementPolicy::default(),
        }
    }

    /// Use a specific settlement policy for balances and settlements.
    pub fn with_policy(mut self, policy: SettlementPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &SettlementPolicy {
        &self.policy
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // Expense operations
    // ========================

    /// Validate and record a new expense.
    pub async fn add_expense(&self, input: NewExpense) -> Result<Expense, AppError> {
        input.validate()?;

        let split_with = input.normalized_split();
        let mut expense = Expense::new(input.amount, &input.paid_by, split_with, input.created_by);
        if let Some(label) = input.label {
            expense = expense.with_label(label);
        }
        if let Some(created_at) = input.created_at {
            expense = expense.with_created_at(created_at);
        }

        self.repo.save_expense(&mut expense).await?;
        info!(
            id = %expense.id,
            paid_by = %expense.paid_by,
            amount = %expense.amount,
            shares = expense.share_count(),
            "Recorded expense"
        );

        Ok(expense)
    }

    /// Delete an expense, returning what was removed.
    pub async fn delete_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        let expense = self.get_expense(id).await?;
        if !self.repo.delete_expense(id).await? {
            return Err(AppError::ExpenseNotFound(id.to_string()));
        }
        info!(id = %id, "Deleted expense");
        Ok(expense)
    }

    /// Get an expense by ID.
    pub async fn get_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        self.repo
            .get_expense(id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(id.to_string()))
    }

    /// List every expense in insertion order.
    pub async fn list_expenses(&self) -> Result<Vec<Expense>, AppError> {
        Ok(self.repo.list_expenses().await?)
    }

    /// List expenses a participant paid for or shares.
    pub async fn list_expenses_for(&self, participant: &str) -> Result<Vec<Expense>, AppError> {
        let participant = normalize_participant(participant);
        Ok(self.repo.list_expenses_for_participant(&participant).await?)
    }

    pub async fn count_expenses(&self) -> Result<i64, AppError> {
        Ok(self.repo.count_expenses().await?)
    }

    // ========================
    // Derived views
    // ========================

    /// Net balance per participant, in first-seen order.
    pub async fn balances(&self) -> Result<Balances, AppError> {
        let expenses = self.list_expenses().await?;
        debug!(expenses = expenses.len(), "Recomputing balances");
        Ok(compute_balances(&expenses))
    }

    /// Payments that settle the whole group.
    pub async fn settlements(&self) -> Result<Vec<Transaction>, AppError> {
        let balances = self.balances().await?;
        Ok(simplify_with(&balances, &self.policy))
    }

    /// Balances and settlements in one pass over the ledger.
    pub async fn summary(&self) -> Result<LedgerSummary, AppError> {
        let expenses = self.list_expenses().await?;
        debug!(expenses = expenses.len(), "Building ledger summary");
        Ok(build_summary(&expenses, &self.policy))
    }

    /// Verify that balances sum to zero and that the settlement plan clears them.
    pub async fn check(&self) -> Result<SettlementCheck, AppError> {
        let expenses = self.list_expenses().await?;
        Ok(build_settlement_check(&expenses, &self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(amount: Amount, paid_by: &str, split_with: &[&str]) -> NewExpense {
        NewExpense::new(
            amount,
            paid_by,
            split_with.iter().map(|s| s.to_string()).collect(),
            "test",
        )
    }

    #[test]
    fn test_validate_accepts_ceiling() {
        assert!(input(MAX_EXPENSE_AMOUNT, "alice", &["bob"]).validate().is_ok());
        assert!(input(Decimal::new(1, 2), "alice", &["bob"]).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_amount_above_ceiling() {
        let result = input(MAX_EXPENSE_AMOUNT + Decimal::new(1, 2), "alice", &["bob"]).validate();
        assert!(matches!(result, Err(AppError::InvalidAmount(_))));

        let result = input(Decimal::MAX, "alice", &["bob"]).validate();
        assert!(matches!(result, Err(AppError::InvalidAmount(_))));
    }

    #[test]
    fn test_validate_rejects_missing_parts() {
        assert!(matches!(
            input(Decimal::ZERO, "alice", &["bob"]).validate(),
            Err(AppError::NonPositiveAmount(_))
        ));
        assert!(matches!(
            input(Decimal::TEN, " ", &["bob"]).validate(),
            Err(AppError::MissingPayer)
        ));
        assert!(matches!(
            input(Decimal::TEN, "alice", &["", "  "]).validate(),
            Err(AppError::MissingSplit)
        ));
    }
}
