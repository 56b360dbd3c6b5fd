use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::{BalanceLine, LedgerService};
use crate::domain::{Expense, Transaction, format_amount};

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub expenses: Vec<Expense>,
    pub balances: Vec<BalanceLine>,
    pub transactions: Vec<Transaction>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export expenses to CSV. The first five columns are what
    /// `Importer::import_expenses_csv` reads back.
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "amount",
            "paid_by",
            "split_with",
            "label",
            "created_by",
            "created_at",
            "id",
            "sequence",
        ])?;

        for expense in &expenses {
            csv_writer.write_record([
                expense.amount.to_string(),
                expense.paid_by.clone(),
                expense.split_with.join(";"),
                expense.label.clone().unwrap_or_default(),
                expense.created_by.clone(),
                expense.created_at.to_rfc3339(),
                expense.id.to_string(),
                expense.sequence.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(expenses.len())
    }

    /// Export balances to CSV, in first-seen order.
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let summary = self.service.summary().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["participant", "balance", "status"])?;
        for line in &summary.balances {
            csv_writer.write_record([
                line.participant.as_str(),
                format_amount(line.balance).as_str(),
                line.status.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(summary.balances.len())
    }

    /// Export the settlement plan to CSV.
    pub async fn export_settlements_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let transactions = self.service.settlements().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["from", "to", "amount"])?;
        for transaction in &transactions {
            csv_writer.write_record([
                transaction.from.as_str(),
                transaction.to.as_str(),
                format_amount(transaction.amount).as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(transactions.len())
    }

    /// Export expenses plus derived balances and settlements as JSON
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let expenses = self.service.list_expenses().await?;
        let summary = self.service.summary().await?;

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            expenses,
            balances: summary.balances,
            transactions: summary.transactions,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
