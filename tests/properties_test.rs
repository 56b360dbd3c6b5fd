//! Properties that must hold for any ledger, checked over seeded random ledgers.

use divvy::domain::{
    Balances, Expense, SettlementPolicy, apply_transactions, compute_balances, simplify,
    simplify_with,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;

const NAMES: [&str; 7] = ["alice", "bob", "carol", "dave", "erin", "frank", "grace"];

fn random_ledger(seed: u64, count: usize) -> Vec<Expense> {
    let mut rng = StdRng::seed_from_u64(seed);

    (0..count)
        .map(|_| {
            // 0.01 .. 500.00
            let amount = Decimal::new(rng.gen_range(1..=50_000), 2);
            let payer = NAMES[rng.gen_range(0..NAMES.len())];
            let split_count = rng.gen_range(0..=4);
            let split_with = (0..split_count)
                .map(|_| NAMES[rng.gen_range(0..NAMES.len())].to_string())
                .collect();
            Expense::new(amount, payer, split_with, "prop")
        })
        .collect()
}

fn tolerance() -> Decimal {
    Decimal::new(1, 9)
}

// Each emitted transaction is rounded by at most half a cent.
fn rounding_allowance(transaction_count: usize) -> Decimal {
    Decimal::new(5, 3) * Decimal::from(transaction_count.max(1)) + tolerance()
}

#[test]
fn test_balances_sum_to_zero() {
    for seed in 0..50 {
        let balances = compute_balances(&random_ledger(seed, 40));
        assert!(
            balances.total().abs() <= tolerance(),
            "seed {}: total {}",
            seed,
            balances.total()
        );
    }
}

#[test]
fn test_settlement_clears_every_balance() {
    for seed in 0..50 {
        let balances = compute_balances(&random_ledger(seed, 40));
        let transactions = simplify(&balances);

        let allowance = rounding_allowance(transactions.len());
        let settled = apply_transactions(&balances, &transactions);
        assert!(
            settled.max_residual() <= allowance,
            "seed {}: residual {}",
            seed,
            settled.max_residual()
        );
    }
}

#[test]
fn test_transactions_flow_from_debtors_to_creditors() {
    for seed in 0..50 {
        let balances = compute_balances(&random_ledger(seed, 25));
        for transaction in simplify(&balances) {
            // Sub-cent matches may round down to 0.00, never below
            assert!(transaction.amount >= Decimal::ZERO, "seed {}", seed);
            assert_ne!(transaction.from, transaction.to, "seed {}", seed);
            assert!(balances.get(&transaction.from).unwrap() < Decimal::ZERO);
            assert!(balances.get(&transaction.to).unwrap() > Decimal::ZERO);
        }
    }
}

#[test]
fn test_fewer_transactions_than_participants() {
    for seed in 0..50 {
        let balances = compute_balances(&random_ledger(seed, 30));
        let transactions = simplify(&balances);
        assert!(transactions.len() < balances.len().max(1), "seed {}", seed);
    }
}

#[test]
fn test_recomputation_is_deterministic() {
    for seed in 0..20 {
        let expenses = random_ledger(seed, 30);

        let first = compute_balances(&expenses);
        let second = compute_balances(&expenses);
        assert_eq!(first, second);
        assert_eq!(simplify(&first), simplify(&second));
    }
}

#[test]
fn test_reordering_keeps_settlement_property() {
    for seed in 0..20 {
        let mut expenses = random_ledger(seed, 30);
        expenses.reverse();

        let balances = compute_balances(&expenses);
        let transactions = simplify(&balances);
        let allowance = rounding_allowance(transactions.len());

        assert!(apply_transactions(&balances, &transactions).max_residual() <= allowance);
    }
}

#[test]
fn test_first_seen_order_changes_plan_not_total() {
    let forward = vec![
        Expense::new(Decimal::from(60), "alice", vec!["bob".into(), "carol".into()], "t"),
        Expense::new(Decimal::from(60), "dave", vec!["carol".into(), "bob".into()], "t"),
    ];
    let mut backward = forward.clone();
    backward.reverse();

    let forward_plan = simplify(&compute_balances(&forward));
    let backward_plan = simplify(&compute_balances(&backward));

    assert_ne!(forward_plan, backward_plan);

    let total = |plan: &[divvy::domain::Transaction]| -> Decimal {
        plan.iter().map(|t| t.amount).sum()
    };
    assert_eq!(total(&forward_plan), total(&backward_plan));
}

#[test]
fn test_no_split_expenses_are_neutral() {
    let expenses: Vec<Expense> = (1..=10usize)
        .map(|i| {
            let payer = NAMES[i % NAMES.len()];
            Expense::new(Decimal::from(i * 7), payer, vec![], "t")
        })
        .collect();

    let balances = compute_balances(&expenses);
    assert!(balances.iter().all(|(_, balance)| balance.is_zero()));
    assert!(simplify_with(&balances, &SettlementPolicy::strict()).is_empty());
}

#[test]
fn test_settled_balances_produce_nothing() {
    let balances: Balances = [("x", Decimal::ZERO)].into_iter().collect();
    assert!(simplify(&balances).is_empty());
}
