use crate::cli::args::{CliArgs, Command};
use crate::client::MAX_TABLE_LIMIT;
use crate::model::TableName;
use crate::output::OutputFormat;

fn check_limit(limit: Option<usize>) -> Result<(), String> {
    if let Some(limit) = limit {
        if limit == 0 || limit > MAX_TABLE_LIMIT {
            return Err(format!(
                "invalid --limit {limit}, expected 1 to {MAX_TABLE_LIMIT}"
            ));
        }
    }
    Ok(())
}

fn check_table(raw: &str) -> Result<(), String> {
    TableName::resolve(raw)
        .map(|_| ())
        .map_err(|e| format!("invalid table '{raw}': {e}"))
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        if OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --output-format '{raw}', expected text, json or html"
            ));
        }
    }

    match &args.command {
        Command::Table(table) => {
            check_table(&table.table)?;
            check_limit(table.limit)?;
            if let Some(raw) = table.matcher.as_deref() {
                crate::utils::compile_row_matcher(raw)
                    .map_err(|e| format!("invalid --match '{raw}': {e}"))?;
            }
        }
        Command::Tables(tables) => {
            check_limit(tables.limit)?;
            if let Some(raw) = tables.only.as_deref() {
                crate::utils::parse_tables_csv(raw)
                    .map_err(|e| format!("invalid --only '{raw}': {e}"))?;
            }
        }
        Command::Row(row) | Command::Delete(row) => {
            check_table(&row.table)?;
            if row.id.trim().is_empty() {
                return Err("row id is empty".to_string());
            }
        }
        Command::Create(create) => {
            check_table(&create.table)?;
            crate::utils::parse_assignments(&create.set)?;
        }
        Command::Update(update) => {
            check_table(&update.table)?;
            if update.id.trim().is_empty() {
                return Err("row id is empty".to_string());
            }
            crate::utils::parse_assignments(&update.set)?;
        }
        Command::Reindex(reindex) => {
            if reindex.poll_interval_ms == Some(0) {
                return Err("invalid poll-interval, expected positive integer".to_string());
            }
        }
        _ => {}
    }
    Ok(())
}
