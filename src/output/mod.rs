pub mod html;

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use serde::Serialize;

use crate::model::{Row, SearchHit};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" | "table" => Some(Self::Text),
            "json" => Some(Self::Json),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".html") || lower.ends_with(".htm") {
        return Some(OutputFormat::Html);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

pub const NO_HITS: &str = "(no hits)";
pub const EMPTY_TABLE: &str = "(empty)";

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Columns of a row listing: the first row's columns, then any column a
/// later row adds.
pub fn row_columns(rows: &[Row]) -> Vec<String> {
    let mut cols: Vec<String> = Vec::new();
    for row in rows {
        for col in row.columns() {
            if !cols.iter().any(|c| c == col) {
                cols.push(col.to_string());
            }
        }
    }
    cols
}

pub fn render_hits_text(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("{NO_HITS}\n");
    }
    let with_snippets = hits.iter().any(|h| h.snippet.is_some());
    let mut table = new_table();
    let mut header = vec!["Type", "ID", "Text"];
    if with_snippets {
        header.push("Snippet");
    }
    table.set_header(header);
    for hit in hits {
        let mut cells = vec![hit.kind.clone(), hit.id.clone(), hit.text.clone()];
        if with_snippets {
            cells.push(hit.snippet.clone().unwrap_or_default());
        }
        table.add_row(cells);
    }
    format!("{table}\n")
}

pub fn render_rows_text(rows: &[Row]) -> String {
    if rows.is_empty() {
        return format!("{EMPTY_TABLE}\n");
    }
    let cols = row_columns(rows);
    let mut table = new_table();
    table.set_header(cols.clone());
    for row in rows {
        table.add_row(
            cols.iter()
                .map(|c| row.get(c).map(|v| v.to_string()).unwrap_or_default())
                .collect::<Vec<_>>(),
        );
    }
    format!("{table}\n")
}

/// A single row as `column : value` lines.
pub fn render_row_text(row: &Row) -> String {
    let width = row.columns().map(|c| c.chars().count()).max().unwrap_or(0);
    let mut out = String::new();
    for (col, value) in row.iter() {
        out.push_str(&format!("{col:<width$} : {value}\n"));
    }
    out
}

pub fn render_json<T: Serialize + ?Sized>(value: &T) -> Vec<u8> {
    let mut out = serde_json::to_vec_pretty(value).unwrap_or_else(|_| b"[]".to_vec());
    out.push(b'\n');
    out
}

pub fn render_hits(hits: &[SearchHit], format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_hits_text(hits).into_bytes(),
        OutputFormat::Json => render_json(hits),
        OutputFormat::Html => html::render_hits(hits),
    }
}

pub fn render_rows(title: &str, rows: &[Row], format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_rows_text(rows).into_bytes(),
        OutputFormat::Json => render_json(rows),
        OutputFormat::Html => html::render_rows(title, rows),
    }
}

pub fn render_row(title: &str, row: &Row, format: OutputFormat) -> Vec<u8> {
    match format {
        OutputFormat::Text => render_row_text(row).into_bytes(),
        OutputFormat::Json => render_json(row),
        OutputFormat::Html => html::render_rows(title, std::slice::from_ref(row)),
    }
}
