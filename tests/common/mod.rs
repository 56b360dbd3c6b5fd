// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::str::FromStr;

use anyhow::Result;
use divvy::application::{LedgerService, NewExpense};
use divvy::domain::{Amount, Expense};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a decimal literal
pub fn dec(s: &str) -> Amount {
    Decimal::from_str(s).unwrap()
}

/// Record an expense through the service
pub async fn add(
    service: &LedgerService,
    amount: &str,
    paid_by: &str,
    split_with: &[&str],
) -> Result<Expense> {
    let input = NewExpense::new(
        dec(amount),
        paid_by,
        split_with.iter().map(|s| s.to_string()).collect(),
        "test-user",
    );
    Ok(service.add_expense(input).await?)
}

/// Test fixture: the three-person trip used across scenarios
pub struct Trip;

impl Trip {
    /// Alice pays 90 for everyone, Bob pays 30 split with Alice
    pub async fn record(service: &LedgerService) -> Result<()> {
        add(service, "90", "Alice", &["Bob", "Carol"]).await?;
        add(service, "30", "Bob", &["Alice"]).await?;
        Ok(())
    }
}
