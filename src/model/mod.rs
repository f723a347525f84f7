use std::collections::BTreeMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("table name is empty")]
    EmptyTableName,

    #[error("unknown table: {name}")]
    UnknownTable { name: String },
}

/// Accepts a JSON string, number or bool (and null as empty) as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match CellValue::deserialize(deserializer)? {
        CellValue::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// One entry of the global search result list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(alias = "name", default, deserialize_with = "lenient_string")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A scalar cell of a backend table row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    Text(String),
}

impl CellValue {
    /// Reads a command line literal: `null`, `true`/`false`, numbers, else
    /// text. The input is trimmed first. Numbers whose canonical form differs
    /// from the input (`+43...`, `0123`, `1e3`, `.5`) stay text so phone
    /// numbers and zero-padded codes survive.
    pub fn parse_literal(raw: &str) -> Self {
        let value = raw.trim();
        match value {
            "null" => return CellValue::Null,
            "true" => return CellValue::Bool(true),
            "false" => return CellValue::Bool(false),
            _ => {}
        }
        if let Ok(n) = value.parse::<i64>() {
            if n.to_string() == value {
                return CellValue::Number(n.into());
            }
        } else if let Some(n) = value
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
        {
            if n.to_string() == value {
                return CellValue::Number(n);
            }
        }
        CellValue::Text(value.to_string())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

/// A table row keyed by column name, in the order the backend sent it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column`, replacing an existing value in place.
    pub fn insert(&mut self, column: impl Into<String>, value: CellValue) {
        let column = column.into();
        match self.cells.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = value,
            None => self.cells.push((column, value)),
        }
    }

    /// Looks a column up, falling back to a case-insensitive match.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(c, _)| c == column)
            .or_else(|| {
                self.cells
                    .iter()
                    .find(|(c, _)| c.eq_ignore_ascii_case(column))
            })
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (column, value) in &self.cells {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

struct RowVisitor;

impl<'de> Visitor<'de> for RowVisitor {
    type Value = Row;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object of scalar column values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Row, A::Error> {
        let mut row = Row::new();
        while let Some((column, value)) = access.next_entry::<String, CellValue>()? {
            row.insert(column, value);
        }
        Ok(row)
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Row, D::Error> {
        deserializer.deserialize_map(RowVisitor)
    }
}

impl FromIterator<(String, CellValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, CellValue)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.insert(column, value);
        }
        row
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryProgress {
    pub done: u64,
    pub total: u64,
}

impl CategoryProgress {
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.done)
    }
}

/// Reindex progress as reported by `/api/index-progress`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IndexStatus {
    pub active: bool,
    pub total_done: u64,
    pub grand_total: u64,
    pub details: BTreeMap<String, CategoryProgress>,
}

impl IndexStatus {
    pub fn percent(&self) -> u8 {
        if self.grand_total == 0 {
            return 0;
        }
        let pct = self.total_done.saturating_mul(100) / self.grand_total;
        pct.min(100) as u8
    }

    /// The unfinished category with the most work left.
    pub fn busiest_category(&self) -> Option<&str> {
        self.details
            .iter()
            .filter(|(_, p)| p.remaining() > 0)
            .max_by_key(|(_, p)| p.remaining())
            .map(|(name, _)| name.as_str())
    }
}

// (url alias, backend table)
const TABLE_ALIASES: &[(&str, &str)] = &[
    ("account", "Account"),
    ("project", "Project"),
    ("site", "Site"),
    ("server", "Server"),
    ("client", "Clients"),
    ("clients", "Clients"),
    ("workingposition", "Clients"),
    ("radio", "Radio"),
    ("audiodevice", "AudioDevice"),
    ("phoneintegration", "PhoneIntegration"),
    ("country", "Country"),
    ("city", "City"),
    ("address", "Address"),
    ("deploymentvariant", "DeploymentVariant"),
    ("software", "Software"),
    ("installedsoftware", "InstalledSoftware"),
    ("upgradeplan", "UpgradePlan"),
    ("servicecontract", "ServiceContract"),
];

const PRIMARY_KEYS: &[(&str, &str)] = &[
    ("Account", "AccountID"),
    ("Project", "ProjectID"),
    ("Site", "SiteID"),
    ("Server", "ServerID"),
    ("Clients", "ClientID"),
    ("Radio", "RadioID"),
    ("AudioDevice", "AudioDeviceID"),
    ("PhoneIntegration", "PhoneIntegrationID"),
    ("Country", "CountryCode"),
    ("City", "CityID"),
    ("Address", "AddressID"),
    ("DeploymentVariant", "VariantID"),
    ("Software", "SoftwareID"),
    ("InstalledSoftware", "InstalledSoftwareID"),
    ("UpgradePlan", "UpgradePlanID"),
    ("ServiceContract", "ContractID"),
];

/// A table name the backend accepts, resolved from a user supplied alias.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TableName {
    alias: &'static str,
    table: &'static str,
}

impl TableName {
    pub fn resolve(raw: &str) -> Result<Self, ModelError> {
        let key = raw.trim().to_lowercase();
        if key.is_empty() {
            return Err(ModelError::EmptyTableName);
        }
        TABLE_ALIASES
            .iter()
            .find(|(alias, _)| *alias == key)
            .map(|&(alias, table)| TableName { alias, table })
            .ok_or_else(|| ModelError::UnknownTable {
                name: raw.trim().to_string(),
            })
    }

    /// One entry per backend table, using the first alias for each.
    pub fn all() -> Vec<TableName> {
        let mut out: Vec<TableName> = Vec::new();
        for &(alias, table) in TABLE_ALIASES {
            if !out.iter().any(|t| t.table == table) {
                out.push(TableName { alias, table });
            }
        }
        out
    }

    /// Path segment used in requests.
    pub fn alias(&self) -> &'static str {
        self.alias
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn primary_key(&self) -> &'static str {
        PRIMARY_KEYS
            .iter()
            .find(|(table, _)| *table == self.table)
            .map(|(_, pk)| *pk)
            .unwrap_or("ID")
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table)
    }
}

/// Fragment produced by a table cell's quick-filter action.
pub fn quick_filter(column: &str, value: &str) -> String {
    let value = value.replace('"', "");
    let value = value.trim();
    if value.is_empty() {
        return String::new();
    }
    let column = column.trim();
    if column.is_empty() {
        return crate::query::format(value);
    }
    if value.contains(char::is_whitespace) {
        format!("{column}:\"{value}\"")
    } else {
        format!("{column}:{value}")
    }
}
