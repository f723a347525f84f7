use std::collections::HashSet;

use regex::Regex;

use crate::model::{CellValue, Row, TableName};

/// Parses a `column=value` assignment; the value goes through literal
/// inference (`null`, booleans, numbers, else text).
pub fn parse_assignment(value: &str) -> Result<(String, CellValue), String> {
    let (column, raw) = value
        .split_once('=')
        .ok_or_else(|| "expected format COLUMN=VALUE".to_string())?;
    let column = column.trim();
    if column.is_empty() {
        return Err("column name is empty".to_string());
    }
    if column.chars().any(char::is_whitespace) {
        return Err(format!("invalid column name '{column}'"));
    }
    Ok((column.to_string(), CellValue::parse_literal(raw)))
}

pub fn parse_assignments(values: &[String]) -> Result<Row, String> {
    let mut row = Row::new();
    for raw in values {
        let (column, value) =
            parse_assignment(raw).map_err(|e| format!("invalid --set '{raw}': {e}"))?;
        row.insert(column, value);
    }
    Ok(row)
}

pub fn parse_tables_csv(value: &str) -> Result<Vec<TableName>, String> {
    let raw = value.trim();
    if raw.is_empty() {
        return Err("table list is empty".to_string());
    }
    let mut out: Vec<TableName> = Vec::new();
    let mut seen: HashSet<&'static str> = HashSet::new();
    for part in raw.split(',') {
        let item = part.trim();
        if item.is_empty() {
            continue;
        }
        let table = TableName::resolve(item).map_err(|e| e.to_string())?;
        if seen.insert(table.table()) {
            out.push(table);
        }
    }
    if out.is_empty() {
        return Err("table list is empty".to_string());
    }
    Ok(out)
}

pub fn compile_row_matcher(pattern: &str) -> Result<Regex, String> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return Err("pattern is empty".to_string());
    }
    Regex::new(pattern).map_err(|e| e.to_string())
}

/// Keeps rows where at least one cell's display text matches.
pub fn filter_rows(rows: Vec<Row>, matcher: &Regex) -> Vec<Row> {
    rows.into_iter()
        .filter(|row| {
            row.iter()
                .any(|(_, value)| matcher.is_match(&value.to_string()))
        })
        .collect()
}
