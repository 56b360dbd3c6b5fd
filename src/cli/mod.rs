use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::application::{LedgerService, LedgerSummary, NewExpense};
use crate::domain::{SettlementPolicy, Transaction, format_amount, parse_amount, parse_split_list};

/// Divvy - Shared Expense Ledger
#[derive(Parser)]
#[command(name = "divvy")]
#[command(about = "Record shared expenses and work out who owes whom")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, default_value = "divvy.db", global = true)]
    pub database: String,

    /// Enable verbose (debug) logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Who is recording expenses (stored as created_by)
    #[arg(long, default_value = "local", global = true)]
    pub actor: String,

    /// Balances at or below this magnitude count as settled (default 0.000000001)
    #[arg(long, global = true)]
    pub tolerance: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Record an expense paid by one person and shared with others
    Add {
        /// Total amount paid (e.g., "30" or "12.50")
        amount: String,

        /// Who paid
        #[arg(long)]
        paid_by: String,

        /// Comma-separated names sharing the cost with the payer
        #[arg(long)]
        split_with: String,

        /// Free-text description (e.g., "Groceries")
        #[arg(short, long)]
        label: Option<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Delete an expense by ID
    Delete {
        /// Expense ID
        id: String,
    },

    /// List recorded expenses
    List {
        /// Only expenses this person paid for or shares
        #[arg(long)]
        participant: Option<String>,

        /// Maximum number of expenses to show (most recent)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show detailed expense information
    Show {
        /// Expense ID
        id: String,
    },

    /// Show net balance per person
    Balances {
        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show the payments that settle all balances
    Settle {
        /// Output format: table, json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show expenses total, balances and settlements together
    Summary {
        /// Output format: table, json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Verify that balances sum to zero and the settlement clears them
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: expenses, balances, settlements, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Import expenses from CSV
    Import {
        /// What to import: expenses
        import_type: String,

        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Validate without importing
        #[arg(long)]
        validate: bool,
    },
}

impl Cli {
    fn policy(&self) -> Result<SettlementPolicy> {
        match &self.tolerance {
            Some(value) => {
                let tolerance = parse_amount(value)
                    .with_context(|| format!("Invalid tolerance '{}'", value))?;
                Ok(SettlementPolicy::with_tolerance(tolerance))
            }
            None => Ok(SettlementPolicy::default()),
        }
    }

    async fn service(&self) -> Result<LedgerService> {
        let service = LedgerService::connect(&self.database)
            .await
            .with_context(|| {
                format!(
                    "Cannot open '{}'. Run `divvy init` first?",
                    self.database
                )
            })?;
        Ok(service.with_policy(self.policy()?))
    }

    pub async fn run(self) -> Result<()> {
        if matches!(self.command, Commands::Init) {
            LedgerService::init(&self.database).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = self.service().await?;

        match self.command {
            Commands::Init => {}

            Commands::Add {
                amount,
                paid_by,
                split_with,
                label,
                date,
            } => {
                let amount =
                    parse_amount(&amount).context("Invalid amount format. Use '30.00' or '30'")?;

                let mut input =
                    NewExpense::new(amount, paid_by, parse_split_list(&split_with), self.actor);
                input.label = label;
                input.created_at = date
                    .as_deref()
                    .map(|date_str| {
                        parse_date(date_str).with_context(|| {
                            format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)
                        })
                    })
                    .transpose()?;

                let expense = service.add_expense(input).await?;
                println!(
                    "Recorded expense: {} paid {} (split with: {}) ({})",
                    expense.paid_by,
                    format_amount(expense.amount),
                    expense.split_with.join(", "),
                    expense.id
                );
            }

            Commands::Delete { id } => {
                let expense_id = parse_expense_id(&id)?;
                let expense = service.delete_expense(expense_id).await?;
                println!(
                    "Deleted expense: {} paid {}{}",
                    expense.paid_by,
                    format_amount(expense.amount),
                    expense
                        .label
                        .map(|label| format!(" - {}", label))
                        .unwrap_or_default()
                );
            }

            Commands::List { participant, limit } => {
                run_list_command(&service, participant.as_deref(), limit).await?;
            }

            Commands::Show { id } => {
                let expense_id = parse_expense_id(&id)?;
                run_show_command(&service, expense_id).await?;
            }

            Commands::Balances { format } => {
                run_balances_command(&service, &format).await?;
            }

            Commands::Settle { format } => {
                run_settle_command(&service, &format).await?;
            }

            Commands::Summary { format } => {
                let summary = service.summary().await?;
                match format.as_str() {
                    "json" => println!("{}", serde_json::to_string_pretty(&summary)?),
                    _ => print_summary(&summary),
                }
            }

            Commands::Check => {
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
            } => {
                run_export_command(&service, &export_type, output.as_deref()).await?;
            }

            Commands::Import {
                import_type,
                input,
                dry_run,
                validate,
            } => {
                run_import_command(
                    &service,
                    &import_type,
                    input.as_deref(),
                    dry_run,
                    validate,
                    self.actor,
                )
                .await?;
            }
        }

        Ok(())
    }
}

async fn run_list_command(
    service: &LedgerService,
    participant: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let mut expenses = match participant {
        Some(name) => service.list_expenses_for(name).await?,
        None => service.list_expenses().await?,
    };

    if let Some(limit) = limit {
        let skip = expenses.len().saturating_sub(limit);
        expenses.drain(..skip);
    }

    if expenses.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    println!(
        "{:<36} {:<12} {:>10} {:<12} {:<25} {:<20}",
        "ID", "DATE", "AMOUNT", "PAID BY", "SPLIT WITH", "LABEL"
    );
    println!("{}", "-".repeat(120));

    for expense in expenses {
        println!(
            "{:<36} {:<12} {:>10} {:<12} {:<25} {:<20}",
            expense.id,
            expense.created_at.format("%Y-%m-%d"),
            format_amount(expense.amount),
            truncate(&expense.paid_by, 12),
            truncate(&expense.split_with.join(", "), 25),
            truncate(expense.label.as_deref().unwrap_or(""), 20)
        );
    }

    Ok(())
}

async fn run_show_command(service: &LedgerService, expense_id: Uuid) -> Result<()> {
    let expense = service.get_expense(expense_id).await?;
    let share = expense.amount / rust_decimal::Decimal::from(expense.share_count());

    println!("Expense: {}", expense.id);
    println!("  Sequence:    {}", expense.sequence);
    println!("  Amount:      {}", format_amount(expense.amount));
    println!("  Paid by:     {}", expense.paid_by);
    println!("  Split with:  {}", expense.split_with.join(", "));
    println!(
        "  Share:       {} x {}",
        expense.share_count(),
        format_amount(share)
    );
    if let Some(label) = &expense.label {
        println!("  Label:       {}", label);
    }
    println!("  Created by:  {}", expense.created_by);
    println!(
        "  Created at:  {}",
        expense.created_at.format("%Y-%m-%d %H:%M:%S")
    );

    Ok(())
}

async fn run_balances_command(service: &LedgerService, format: &str) -> Result<()> {
    let summary = service.summary().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&summary.balances)?),
        "csv" => {
            println!("participant,balance,status");
            for line in &summary.balances {
                println!(
                    "{},{},{}",
                    line.participant,
                    format_amount(line.balance),
                    line.status
                );
            }
        }
        _ => print_balances(&summary),
    }

    Ok(())
}

async fn run_settle_command(service: &LedgerService, format: &str) -> Result<()> {
    let transactions = service.settlements().await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&transactions)?),
        "csv" => {
            println!("from,to,amount");
            for transaction in &transactions {
                println!(
                    "{},{},{}",
                    transaction.from,
                    transaction.to,
                    format_amount(transaction.amount)
                );
            }
        }
        _ => print_transactions(&transactions),
    }

    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger...\n");

    let check = service.check().await?;

    println!("Expenses:     {}", service.count_expenses().await?);
    println!("Participants: {}", check.participant_count);
    println!("Payments:     {}", check.transaction_count);
    println!();
    println!("Balance total:   {}", check.balance_total);
    println!("Max residual:    {}", check.max_residual);
    println!("Tolerance:       {}", check.tolerance);
    println!();

    if check.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &check.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "expenses" => {
            let count = exporter.export_expenses_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "settlements" => {
            let count = exporter.export_settlements_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} settlements", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported full ledger: {} expenses, {} balances, {} settlements",
                    snapshot.expenses.len(),
                    snapshot.balances.len(),
                    snapshot.transactions.len()
                );
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: expenses, balances, settlements, full",
                export_type
            );
        }
    }

    Ok(())
}

async fn run_import_command(
    service: &LedgerService,
    import_type: &str,
    input: Option<&str>,
    dry_run: bool,
    validate: bool,
    actor: String,
) -> Result<()> {
    use crate::io::{ImportOptions, Importer};
    use std::fs::File;
    use std::io::{Read, stdin};

    if import_type != "expenses" {
        anyhow::bail!(
            "Invalid import type '{}'. Valid types: expenses",
            import_type
        );
    }

    let reader: Box<dyn Read> = match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("Failed to open input file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdin()),
    };

    let options = ImportOptions {
        dry_run,
        validate_only: validate,
        actor,
    };

    let result = Importer::new(service)
        .import_expenses_csv(reader, options)
        .await?;

    if validate || dry_run {
        println!("Validation complete");
    } else {
        println!("Import complete");
    }
    println!("  Imported: {}", result.imported);
    println!("  Skipped:  {}", result.skipped);
    println!("  Errors:   {}", result.errors.len());

    if !result.errors.is_empty() {
        println!("\nErrors:");
        for error in result.errors.iter().take(10) {
            println!(
                "  Line {}: {}",
                error.line,
                error
                    .field
                    .as_ref()
                    .map(|f| format!("{}: ", f))
                    .unwrap_or_default()
                    + &error.error
            );
        }
        if result.errors.len() > 10 {
            println!("  ... and {} more errors", result.errors.len() - 10);
        }
    }

    Ok(())
}

fn print_balances(summary: &LedgerSummary) {
    if summary.balances.is_empty() {
        println!("No balances yet.");
        return;
    }
    for line in &summary.balances {
        println!(
            "{}: {} ({})",
            line.participant,
            format_amount(line.balance),
            line.status
        );
    }
}

fn print_transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("Everyone is settled up.");
        return;
    }
    for transaction in transactions {
        println!(
            "{} pays {} to {}",
            transaction.from,
            format_amount(transaction.amount),
            transaction.to
        );
    }
}

fn print_summary(summary: &LedgerSummary) {
    println!(
        "Expenses: {} (total spent {})",
        summary.expense_count,
        format_amount(summary.total_spent)
    );
    println!();
    println!("Balances");
    println!("{}", "-".repeat(30));
    print_balances(summary);
    println!();
    println!("Settlements");
    println!("{}", "-".repeat(30));
    print_transactions(&summary.transactions);
}

fn parse_expense_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).context("Invalid expense ID format (expected UUID)")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn parse_date(date_str: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    use chrono::NaiveDate;

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(chrono::DateTime::from_naive_utc_and_offset(
        naive_datetime,
        chrono::Utc,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("alice", 12), "alice");
        assert_eq!(truncate("a very long label indeed", 10), "a very ...");
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-01").unwrap();
        assert_eq!(date.format("%Y-%m-%d").to_string(), "2024-03-01");
        assert!(parse_date("03/01/2024").is_err());
    }

    #[test]
    fn test_cli_parses_add_command() {
        let cli = Cli::try_parse_from([
            "divvy",
            "add",
            "30",
            "--paid-by",
            "Alice",
            "--split-with",
            "Bob",
        ])
        .unwrap();

        match cli.command {
            Commands::Add {
                amount, paid_by, ..
            } => {
                assert_eq!(amount, "30");
                assert_eq!(paid_by, "Alice");
            }
            _ => panic!("expected add command"),
        }
        assert_eq!(cli.database, "divvy.db");
    }

    #[test]
    fn test_policy_from_tolerance_flag() {
        let cli =
            Cli::try_parse_from(["divvy", "--tolerance", "0.001", "settle"]).unwrap();
        let policy = cli.policy().unwrap();
        assert_eq!(policy.tolerance, parse_amount("0.001").unwrap());

        let cli = Cli::try_parse_from(["divvy", "--tolerance", "abc", "settle"]).unwrap();
        assert!(cli.policy().is_err());
    }
}
