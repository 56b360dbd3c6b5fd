use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use super::{Amount, Expense, Participant, saturating_add, saturating_sum};

/// Net balance per participant, kept in the order participants were first
/// seen. Positive means the group owes them, negative means they owe.
///
/// Iteration order matters: the simplifier breaks ties by it, so the same
/// expenses in the same order always settle the same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balances {
    entries: Vec<(Participant, Amount)>,
    index: HashMap<Participant, usize>,
}

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `delta` to a participant's balance, inserting them at zero if unseen.
    /// A balance that leaves the representable range is clamped to it.
    pub fn adjust(&mut self, participant: &str, delta: Amount) {
        match self.index.get(participant) {
            Some(&position) => {
                let balance = &mut self.entries[position].1;
                *balance = saturating_add(*balance, delta);
            }
            None => {
                self.index
                    .insert(participant.to_string(), self.entries.len());
                self.entries.push((participant.to_string(), delta));
            }
        }
    }

    pub fn get(&self, participant: &str) -> Option<Amount> {
        self.index
            .get(participant)
            .map(|&position| self.entries[position].1)
    }

    /// Iterate in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Amount)> {
        self.entries
            .iter()
            .map(|(participant, balance)| (participant.as_str(), *balance))
    }

    pub fn participants(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(participant, _)| participant.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all balances. Zero for any ledger, up to division dust.
    pub fn total(&self) -> Amount {
        saturating_sum(self.entries.iter().map(|(_, balance)| *balance))
    }

    /// Largest absolute balance left.
    pub fn max_residual(&self) -> Amount {
        self.entries
            .iter()
            .map(|(_, balance)| balance.abs())
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    /// True when every balance is within `tolerance` of zero.
    pub fn is_settled(&self, tolerance: Amount) -> bool {
        self.max_residual() <= tolerance
    }
}

impl<'a> FromIterator<(&'a str, Amount)> for Balances {
    fn from_iter<I: IntoIterator<Item = (&'a str, Amount)>>(iter: I) -> Self {
        let mut balances = Balances::new();
        for (participant, delta) in iter {
            balances.adjust(participant, delta);
        }
        balances
    }
}

impl Serialize for Balances {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (participant, balance) in &self.entries {
            map.serialize_entry(participant, balance)?;
        }
        map.end()
    }
}

/// Reduce a sequence of expenses to net balances.
///
/// Every expense is split into `split_with.len() + 1` equal shares. The payer
/// is credited everything except their own share and each split-with entry
/// is debited one share. Entries are processed in slice order and the payer
/// is credited before anyone is debited.
pub fn compute_balances(expenses: &[Expense]) -> Balances {
    let mut balances = Balances::new();

    for expense in expenses {
        let split_amount = expense.amount / Decimal::from(expense.share_count());

        balances.adjust(&expense.paid_by, expense.amount - split_amount);
        for person in &expense.split_with {
            balances.adjust(person, -split_amount);
        }
    }

    balances
}
