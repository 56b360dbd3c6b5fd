use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{
    Amount, Balances, Expense, SettlementPolicy, Transaction, apply_transactions,
    compute_balances, saturating_sum, simplify_with,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceStatus {
    ToReceive,
    ToPay,
    Settled,
}

impl BalanceStatus {
    pub fn of(balance: Amount, tolerance: Amount) -> Self {
        if balance.abs() <= tolerance {
            BalanceStatus::Settled
        } else if balance > Decimal::ZERO {
            BalanceStatus::ToReceive
        } else {
            BalanceStatus::ToPay
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceStatus::ToReceive => "to receive",
            BalanceStatus::ToPay => "to pay",
            BalanceStatus::Settled => "settled",
        }
    }
}

impl fmt::Display for BalanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceLine {
    pub participant: String,
    pub balance: Amount,
    pub status: BalanceStatus,
}

/// Everything a client needs to show the state of the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSummary {
    pub expense_count: usize,
    pub total_spent: Amount,
    pub balances: Vec<BalanceLine>,
    pub transactions: Vec<Transaction>,
}

/// Outcome of verifying that the settlement plan actually settles the group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementCheck {
    pub participant_count: usize,
    pub transaction_count: usize,
    /// Sum of all balances before settling
    pub balance_total: Amount,
    /// Largest balance left after applying every transaction
    pub max_residual: Amount,
    pub tolerance: Amount,
    pub issues: Vec<String>,
}

impl SettlementCheck {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Turn balances into display lines, keeping first-seen order.
pub fn balance_lines(balances: &Balances, tolerance: Amount) -> Vec<BalanceLine> {
    balances
        .iter()
        .map(|(participant, balance)| BalanceLine {
            participant: participant.to_string(),
            balance,
            status: BalanceStatus::of(balance, tolerance),
        })
        .collect()
}

pub fn build_summary(expenses: &[Expense], policy: &SettlementPolicy) -> LedgerSummary {
    let balances = compute_balances(expenses);
    let transactions = simplify_with(&balances, policy);

    LedgerSummary {
        expense_count: expenses.len(),
        total_spent: saturating_sum(expenses.iter().map(|expense| expense.amount)),
        balances: balance_lines(&balances, policy.tolerance),
        transactions,
    }
}

/// Check the zero-sum property and that the emitted transactions drive every
/// balance to zero.
///
/// Transactions are rounded to cents, so after settling a participant can be
/// off by up to half a cent per emitted transaction. Residuals are
/// judged against that rounding allowance rather than the dust tolerance.
pub fn build_settlement_check(expenses: &[Expense], policy: &SettlementPolicy) -> SettlementCheck {
    let balances = compute_balances(expenses);
    let transactions = simplify_with(&balances, policy);
    let settled = apply_transactions(&balances, &transactions);

    let balance_total = balances.total();
    let max_residual = settled.max_residual();
    let rounding_allowance = Decimal::new(5, 3) * Decimal::from(transactions.len().max(1));

    let mut issues = Vec::new();
    if balance_total.abs() > policy.tolerance {
        issues.push(format!(
            "Balances do not sum to zero (total {})",
            balance_total
        ));
    }
    if max_residual > rounding_allowance {
        issues.push(format!(
            "Settlement leaves an unresolved balance of {}",
            max_residual
        ));
    }
    for expense in expenses {
        if expense.amount <= Decimal::ZERO {
            issues.push(format!(
                "Expense {} has a non-positive amount ({})",
                expense.id, expense.amount
            ));
        }
    }

    SettlementCheck {
        participant_count: balances.len(),
        transaction_count: transactions.len(),
        balance_total,
        max_residual,
        tolerance: policy.tolerance,
        issues,
    }
}
