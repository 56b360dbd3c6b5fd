use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Amount;

pub type ExpenseId = Uuid;

/// A participant is identified by a normalized (trimmed, lowercase) name.
pub type Participant = String;

/// An expense records that one participant paid an amount on behalf of
/// themselves and everyone in `split_with`. Expenses are immutable; a wrong
/// entry is deleted and recorded again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: ExpenseId,
    /// Insertion order assigned by the repository
    pub sequence: i64,
    /// Total amount paid (expected to be positive)
    pub amount: Amount,
    pub paid_by: Participant,
    /// Participants sharing the cost with the payer. Duplicates and the
    /// payer themselves are kept as entered.
    pub split_with: Vec<Participant>,
    /// Identity of whoever recorded the expense
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub label: Option<String>,
}

impl Expense {
    /// Create a new expense. Names are normalized; the sequence number is
    /// assigned by the repository.
    pub fn new(
        amount: Amount,
        paid_by: &str,
        split_with: Vec<String>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: 0,
            amount,
            paid_by: normalize_participant(paid_by),
            split_with: split_with
                .iter()
                .map(|name| normalize_participant(name))
                .collect(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = if label.trim().is_empty() {
            None
        } else {
            Some(label)
        };
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Number of equal shares: the payer plus everyone split with.
    pub fn share_count(&self) -> usize {
        self.split_with.len() + 1
    }
}

/// Normalize a participant name so "Alice " and "alice" are the same person.
pub fn normalize_participant(name: &str) -> Participant {
    name.trim().to_lowercase()
}

/// Parse a comma-separated list of names.
/// Example: "Bob, CAROL" -> ["bob", "carol"]. Empty entries are dropped.
///
/// This deliberately differs from a raw comma split: "bob," is one name and
/// two shares, never a nameless third share.
pub fn parse_split_list(input: &str) -> Vec<Participant> {
    input
        .split(',')
        .map(normalize_participant)
        .filter(|name| !name.is_empty())
        .collect()
}
