//! Quote-aware handling of conjunctive structured queries.
//!
//! A query is treated as a list of fragments joined with ` AND `. Fragments
//! are derived on demand from the query text; nothing here keeps state.

pub mod session;

use std::collections::HashSet;

pub use session::QuerySession;

/// Separator used when rejoining fragments.
pub const SEPARATOR: &str = " AND ";

fn is_separator_at(bytes: &[u8], at: usize) -> bool {
    bytes
        .get(at..at + SEPARATOR.len())
        .map(|window| window.eq_ignore_ascii_case(SEPARATOR.as_bytes()))
        .unwrap_or(false)
}

fn push_trimmed(out: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Splits a query into its ` AND `-separated fragments.
///
/// The separator is matched case-insensitively and only outside double
/// quotes. An unterminated quote swallows the rest of the input into the
/// last fragment.
pub fn split(query: &str) -> Vec<String> {
    let bytes = query.as_bytes();
    let mut fragments = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes && is_separator_at(bytes, i) {
            // separator is pure ASCII so both ends sit on char boundaries
            push_trimmed(&mut fragments, &query[start..i]);
            i += SEPARATOR.len();
            start = i;
            continue;
        }
        i += 1;
    }
    push_trimmed(&mut fragments, &query[start..]);
    fragments
}

fn is_quoted(fragment: &str) -> bool {
    fragment.len() >= 2
        && fragment.starts_with('"')
        && fragment.ends_with('"')
        && !fragment[1..fragment.len() - 1].contains('"')
}

/// Prepares a fragment for insertion into a query.
///
/// Bare multi-word phrases are wrapped in double quotes. Field-qualified or
/// parenthesised expressions and already quoted phrases are only trimmed.
pub fn format(fragment: &str) -> String {
    let trimmed = fragment.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let needs_quotes = !is_quoted(trimmed)
        && trimmed.contains(char::is_whitespace)
        && !trimmed.contains(['(', ')', ':']);
    if needs_quotes {
        format!("\"{trimmed}\"")
    } else {
        trimmed.to_string()
    }
}

/// Equality key for fragments: collapsed whitespace, trimmed, lower-cased.
pub fn normalize(fragment: &str) -> String {
    fragment
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// A bare trailing `and` (any case, outside quotes) is an unfinished
// conjunction left over from typing; it never forms a fragment of its own.
fn trim_dangling_conjunction(query: &str) -> &str {
    let mut rest = query.trim();
    loop {
        let n = rest.len();
        if n < 3 || !rest.as_bytes()[n - 3..].eq_ignore_ascii_case(b"and") {
            return rest;
        }
        // the last three bytes are ASCII so this is a char boundary
        let head = &rest[..n - 3];
        if !(head.is_empty() || head.ends_with(char::is_whitespace)) {
            return rest;
        }
        if head.matches('"').count() % 2 == 1 {
            return rest;
        }
        rest = head.trim_end();
    }
}

// A merged fragment is always the trailing conjunct of the merge result, even
// when it does not survive `split` on its own (unbalanced quotes earlier in the
// query, unquoted AND inside parentheses).
fn is_trailing_conjunct(query: &str, key: &str) -> bool {
    let normalized = normalize(query);
    normalized == key || normalized.ends_with(&format!(" and {key}"))
}

fn is_present(query: &str, existing: &HashSet<String>, key: &str) -> bool {
    existing.contains(key) || is_trailing_conjunct(query, key)
}

/// Adds `fragment` to `current` unless an equivalent fragment is already
/// there. Merging the same fragment twice yields the same query.
///
/// A dangling trailing `AND` on either side is dropped first.
pub fn merge(current: &str, fragment: &str) -> String {
    let current = trim_dangling_conjunction(current);
    let formatted = trim_dangling_conjunction(&format(fragment)).to_string();
    if formatted.is_empty() {
        return current.to_string();
    }

    let mut fragments = split(current);
    let existing: HashSet<String> = fragments.iter().map(|f| normalize(f)).collect();
    let key = normalize(&formatted);

    if !is_present(current, &existing, &key) {
        fragments.extend(split(&formatted));
    }
    fragments.join(SEPARATOR)
}

/// Whether `query` already filters on `fragment`.
///
/// Uses the same presence rule as [`merge`]: besides the fragments `split`
/// yields, a fragment that ends the query after ` AND ` counts as present,
/// even when an unbalanced quote earlier in the query swallows it.
pub fn contains(fragment: &str, query: &str) -> bool {
    let formatted = trim_dangling_conjunction(&format(fragment)).to_string();
    if formatted.is_empty() {
        return false;
    }
    let query = trim_dangling_conjunction(query);
    let existing: HashSet<String> = split(query).iter().map(|f| normalize(f)).collect();
    is_present(query, &existing, &normalize(&formatted))
}

/// Heuristic: does the input already use the backend's query syntax?
pub fn looks_structured(query: &str) -> bool {
    let q = query.trim();
    q.contains(':')
        || q.contains('"')
        || q.contains(" AND ")
        || q.contains(" OR ")
        || q.ends_with('*')
}

/// Turns free text into a prefix-wildcard query, term by term.
///
/// Input that already looks structured is returned unmodified.
pub fn build_user_query(raw: &str) -> String {
    let trimmed = raw.trim();
    if looks_structured(trimmed) {
        return raw.to_string();
    }
    trimmed
        .split_whitespace()
        .map(|token| {
            if token.ends_with('*') || token.ends_with('?') {
                token.to_string()
            } else {
                format!("{token}*")
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
