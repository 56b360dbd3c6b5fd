use thiserror::Error;

use crate::domain::Amount;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Expense not found: {0}")]
    ExpenseNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Amount),

    #[error("An expense needs someone who paid for it")]
    MissingPayer,

    #[error("An expense must be split with at least one person")]
    MissingSplit,

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
