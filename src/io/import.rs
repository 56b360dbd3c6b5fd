use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::io::Read;
use tracing::{debug, warn};

use crate::application::{LedgerService, NewExpense};
use crate::domain::{parse_amount, parse_split_list};

/// Result of an import operation
#[derive(Debug, Clone)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error that occurred during import
#[derive(Debug, Clone)]
pub struct ImportError {
    pub line: usize,
    pub field: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub dry_run: bool,
    pub validate_only: bool,
    /// Recorded as `created_by` when a row has none
    pub actor: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            validate_only: false,
            actor: "import".to_string(),
        }
    }
}

/// Importer for loading expenses into the ledger
pub struct Importer<'a> {
    service: &'a LedgerService,
}

impl<'a> Importer<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Import expenses from CSV with columns
    /// `amount,paid_by,split_with,label[,created_by[,created_at]]`.
    /// `split_with` names are separated by `;`. Rows are imported in file order,
    /// which becomes their insertion order.
    pub async fn import_expenses_csv<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut imported = 0;
        let mut skipped = 0;
        let mut errors = Vec::new();

        for (line_num, result) in csv_reader.records().enumerate() {
            let line = line_num + 2; // +2 for header and 0-indexing

            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("CSV parse error: {}", e),
                    });
                    continue;
                }
            };

            if record.iter().all(str::is_empty) {
                skipped += 1;
                continue;
            }

            let amount_str = record.get(0).unwrap_or("");
            let paid_by = record.get(1).unwrap_or("");
            let split_with = parse_split_list(&record.get(2).unwrap_or("").replace(';', ","));
            let label = record
                .get(3)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            let created_by = record
                .get(4)
                .filter(|s| !s.is_empty())
                .unwrap_or(options.actor.as_str())
                .to_string();

            let amount = match parse_amount(amount_str) {
                Ok(a) => a,
                Err(e) => {
                    errors.push(ImportError {
                        line,
                        field: Some("amount".to_string()),
                        error: format!("Invalid amount: {}", e),
                    });
                    continue;
                }
            };

            let created_at = match record.get(5).filter(|s| !s.is_empty()) {
                Some(s) => match parse_timestamp(s) {
                    Ok(ts) => Some(ts),
                    Err(e) => {
                        errors.push(ImportError {
                            line,
                            field: Some("created_at".to_string()),
                            error: format!("Invalid timestamp: {}", e),
                        });
                        continue;
                    }
                },
                None => None,
            };

            let mut input = NewExpense::new(amount, paid_by, split_with, created_by);
            input.label = label;
            input.created_at = created_at;

            if options.dry_run || options.validate_only {
                if let Err(e) = input.validate() {
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("Expense rejected: {}", e),
                    });
                    continue;
                }
                imported += 1;
                continue;
            }

            match self.service.add_expense(input).await {
                Ok(expense) => {
                    debug!(line, id = %expense.id, "Imported expense");
                    imported += 1;
                }
                Err(e) => {
                    warn!(line, error = %e, "Rejected expense row");
                    errors.push(ImportError {
                        line,
                        field: None,
                        error: format!("Expense rejected: {}", e),
                    });
                }
            }
        }

        Ok(ImportResult {
            imported,
            skipped,
            errors,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(dt.and_utc());
        }
    }

    anyhow::bail!("Invalid timestamp format: {}", s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert!(parse_timestamp("2024-01-15T10:30:00Z").is_ok());
        assert!(parse_timestamp("2024-01-15").is_ok());
        assert!(parse_timestamp("15/01/2024").is_err());
    }
}
