use std::collections::VecDeque;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Amount, Balances, Participant, round_to_cents, saturating_sum};

/// A single payment: `from` pays `amount` to `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub from: Participant,
    pub to: Participant,
    /// Rounded to cents
    pub amount: Amount,
}

/// Controls how arithmetic dust is treated while settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlementPolicy {
    /// Balances and residuals whose magnitude is at most this value count as
    /// settled. Zero gives the strict `< 0` / `> 0` partition.
    pub tolerance: Amount,
}

impl SettlementPolicy {
    /// 1e-9, far below a cent and far above the dust left by exact decimal
    /// division.
    pub const DEFAULT_TOLERANCE: Amount = Decimal::from_parts(1, 0, 0, false, 9);

    pub fn strict() -> Self {
        Self {
            tolerance: Decimal::ZERO,
        }
    }

    pub fn with_tolerance(tolerance: Amount) -> Self {
        Self {
            tolerance: tolerance.abs(),
        }
    }

    fn is_negligible(&self, amount: Amount) -> bool {
        amount.abs() <= self.tolerance
    }
}

impl Default for SettlementPolicy {
    fn default() -> Self {
        Self {
            tolerance: Self::DEFAULT_TOLERANCE,
        }
    }
}

/// Produce payments that settle `balances`, using the default policy.
pub fn simplify(balances: &Balances) -> Vec<Transaction> {
    simplify_with(balances, &SettlementPolicy::default())
}

/// Greedy queue matching of debtors against creditors.
///
/// Both queues keep the balance iteration order. Each step pairs the front
/// debtor with the front creditor and pays the smaller of the two amounts.
/// Whoever still has something left goes back to the *front* of its queue,
/// so a large creditor is paid off by consecutive debtors before the next
/// creditor is touched. Amounts are rounded only when a transaction is
/// emitted; residuals carry full precision.
pub fn simplify_with(balances: &Balances, policy: &SettlementPolicy) -> Vec<Transaction> {
    let mut debtors: VecDeque<(&str, Amount)> = VecDeque::new();
    let mut creditors: VecDeque<(&str, Amount)> = VecDeque::new();

    for (participant, balance) in balances.iter() {
        if policy.is_negligible(balance) {
            continue;
        }
        if balance < Decimal::ZERO {
            debtors.push_back((participant, balance));
        } else {
            creditors.push_back((participant, balance));
        }
    }

    debug!(
        debtors = debtors.len(),
        creditors = creditors.len(),
        "Simplifying debts"
    );

    let mut transactions = Vec::new();

    while !debtors.is_empty() && !creditors.is_empty() {
        let Some((debtor, debt_amount)) = debtors.pop_front() else {
            break;
        };
        let Some((creditor, credit_amount)) = creditors.pop_front() else {
            break;
        };

        let owed = -debt_amount;
        let transfer_amount = owed.min(credit_amount);

        transactions.push(Transaction {
            from: debtor.to_string(),
            to: creditor.to_string(),
            amount: round_to_cents(transfer_amount),
        });

        if owed < credit_amount {
            let residual = credit_amount + debt_amount;
            if !policy.is_negligible(residual) {
                creditors.push_front((creditor, residual));
            }
        } else if owed > credit_amount {
            let residual = debt_amount + credit_amount;
            if !policy.is_negligible(residual) {
                debtors.push_front((debtor, residual));
            }
        }
    }

    let leftover = saturating_sum(
        debtors
            .iter()
            .chain(creditors.iter())
            .map(|(_, amount)| amount.abs()),
    );
    if !leftover.is_zero() {
        warn!(%leftover, "Dropping unmatched residual balances");
    }

    transactions
}

/// Apply payments to a copy of `balances`: the payer's balance rises, the
/// receiver's falls. Used to verify that a settlement plan zeroes everyone.
pub fn apply_transactions(balances: &Balances, transactions: &[Transaction]) -> Balances {
    let mut settled = balances.clone();
    for transaction in transactions {
        settled.adjust(&transaction.from, transaction.amount);
        settled.adjust(&transaction.to, -transaction.amount);
    }
    settled
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::domain::{Expense, compute_balances};

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn balances_of(entries: &[(&str, &str)]) -> Balances {
        entries
            .iter()
            .map(|(participant, amount)| (*participant, dec(amount)))
            .collect()
    }

    fn tx(from: &str, to: &str, amount: &str) -> Transaction {
        Transaction {
            from: from.into(),
            to: to.into(),
            amount: dec(amount),
        }
    }

    #[test]
    fn test_simplify_empty() {
        assert!(simplify(&Balances::new()).is_empty());
    }

    #[test]
    fn test_simplify_all_zero() {
        let balances = balances_of(&[("x", "0"), ("y", "0")]);
        assert!(simplify(&balances).is_empty());
        assert!(simplify_with(&balances, &SettlementPolicy::strict()).is_empty());
    }

    #[test]
    fn test_simplify_single_pair() {
        let balances = balances_of(&[("alice", "15"), ("bob", "-15")]);
        assert_eq!(simplify(&balances), vec![tx("bob", "alice", "15.00")]);
    }

    #[test]
    fn test_creditor_residual_goes_back_to_front() {
        // alice is owed 45, carol and bob both pay her before anyone else
        let balances = balances_of(&[
            ("alice", "45"),
            ("bob", "-15"),
            ("carol", "-30"),
            ("dave", "5"),
            ("erin", "-5"),
        ]);

        assert_eq!(
            simplify(&balances),
            vec![
                tx("bob", "alice", "15"),
                tx("carol", "alice", "30"),
                tx("erin", "dave", "5"),
            ]
        );
    }

    #[test]
    fn test_debtor_residual_goes_back_to_front() {
        let balances = balances_of(&[("bob", "-50"), ("alice", "20"), ("carol", "30")]);

        assert_eq!(
            simplify(&balances),
            vec![tx("bob", "alice", "20"), tx("bob", "carol", "30")]
        );
    }

    #[test]
    fn test_exact_match_discards_both() {
        let balances = balances_of(&[("a", "-10"), ("b", "10"), ("c", "-7"), ("d", "7")]);

        assert_eq!(
            simplify(&balances),
            vec![tx("a", "b", "10"), tx("c", "d", "7")]
        );
    }

    #[test]
    fn test_amounts_rounded_only_at_emission() {
        let balances = balances_of(&[
            ("alice", "66.666666666666"),
            ("bob", "-33.333333333333"),
            ("carol", "-33.333333333333"),
        ]);
        let transactions = simplify(&balances);

        assert_eq!(
            transactions,
            vec![tx("bob", "alice", "33.33"), tx("carol", "alice", "33.33")]
        );
    }

    #[test]
    fn test_strict_policy_emits_dust_transactions() {
        let balances =
            balances_of(&[("a", "10.0000000001"), ("b", "-10"), ("c", "-0.0000000001")]);

        let strict = simplify_with(&balances, &SettlementPolicy::strict());
        assert_eq!(strict, vec![tx("b", "a", "10"), tx("c", "a", "0")]);

        let lenient = simplify_with(&balances, &SettlementPolicy::default());
        assert_eq!(lenient, vec![tx("b", "a", "10")]);
    }

    #[test]
    fn test_apply_transactions_settles_everything() {
        let expenses = vec![
            Expense::new(dec("90"), "alice", vec!["bob".into(), "carol".into()], "t"),
            Expense::new(dec("30"), "bob", vec!["alice".into()], "t"),
            Expense::new(dec("12"), "carol", vec!["dave".into()], "t"),
        ];
        let balances = compute_balances(&expenses);
        let transactions = simplify(&balances);
        let settled = apply_transactions(&balances, &transactions);

        assert!(settled.is_settled(dec("0.000000001")));
    }

    #[test]
    fn test_simplify_is_deterministic() {
        let balances = balances_of(&[
            ("a", "12.5"),
            ("b", "-4.25"),
            ("c", "-8.25"),
            ("d", "3"),
            ("e", "-3"),
        ]);

        assert_eq!(simplify(&balances), simplify(&balances));
    }

    #[test]
    fn test_policy_with_tolerance_uses_magnitude() {
        let policy = SettlementPolicy::with_tolerance(dec("-0.01"));
        assert_eq!(policy.tolerance, dec("0.01"));
        assert_eq!(SettlementPolicy::default().tolerance, dec("0.000000001"));
    }
}
