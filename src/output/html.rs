use crate::model::{Row, SearchHit};

use super::{row_columns, EMPTY_TABLE, NO_HITS};

pub fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn page(title: &str, body: &str) -> Vec<u8> {
    let title = escape_html(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8"/>
  <title>{title}</title>
  <style>
    body {{ font-family: sans-serif; margin: 2rem; }}
    .table-scroll {{ overflow-x: auto; }}
    table {{ border-collapse: collapse; }}
    th, td {{ border: 1px solid #cbd5e1; padding: 0.25rem 0.5rem; text-align: left; }}
    th {{ background: #f1f5f9; }}
  </style>
</head>
<body>
  <h2>{title}</h2>
{body}</body>
</html>
"#
    )
    .into_bytes()
}

fn table(header: &[String], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    out.push_str("  <div class=\"table-scroll\">\n    <table>\n      <tr>");
    for h in header {
        out.push_str(&format!("<th>{}</th>", escape_html(h)));
    }
    out.push_str("</tr>\n");
    for row in rows {
        out.push_str("      <tr>");
        for cell in row {
            out.push_str(&format!("<td>{}</td>", escape_html(cell)));
        }
        out.push_str("</tr>\n");
    }
    out.push_str("    </table>\n  </div>\n");
    out
}

pub fn render_hits(hits: &[SearchHit]) -> Vec<u8> {
    if hits.is_empty() {
        return page("Search", &format!("  <p>{}</p>\n", escape_html(NO_HITS)));
    }
    let header = ["Type", "ID", "Text", "Snippet"].map(String::from).to_vec();
    let rows: Vec<Vec<String>> = hits
        .iter()
        .map(|h| {
            vec![
                h.kind.clone(),
                h.id.clone(),
                h.text.clone(),
                h.snippet.clone().unwrap_or_default(),
            ]
        })
        .collect();
    page("Search", &table(&header, &rows))
}

pub fn render_rows(title: &str, rows: &[Row]) -> Vec<u8> {
    if rows.is_empty() {
        return page(title, &format!("  <p>{}</p>\n", escape_html(EMPTY_TABLE)));
    }
    let cols = row_columns(rows);
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            cols.iter()
                .map(|c| r.get(c).map(|v| v.to_string()).unwrap_or_default())
                .collect()
        })
        .collect();
    page(title, &table(&cols, &cells))
}
