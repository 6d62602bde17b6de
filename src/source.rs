//! Access to guideline rule tables.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::RuleRow;

/// Errors raised by a [`RuleSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no rule table '{table}'")]
    UnknownTable { table: String },

    #[error("rule table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },
}

/// Deterministic table name for one sheet of one guideline version.
///
/// `{sheet}_{guideline}_{version}`, or `{sheet}_{guideline}` when the version is empty.
#[must_use]
pub fn table_name(sheet: &str, guideline: &str, version: &str) -> String {
    if version.is_empty() {
        format!("{sheet}_{guideline}")
    } else {
        format!("{sheet}_{guideline}_{version}")
    }
}

/// A resolved rule table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableHandle {
    name: String,
    guideline: String,
}

impl TableHandle {
    #[must_use]
    pub fn new(name: &str, guideline: &str) -> Self {
        Self {
            name: name.to_owned(),
            guideline: guideline.to_owned(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn guideline(&self) -> &str {
        &self.guideline
    }
}

/// Tabular provider of guideline rules.
///
/// Implementations must be deterministic: resolving the same triple twice names
/// the same table, and fetching from it returns rows in the same order.
pub trait RuleSource {
    /// Resolve the table holding `sheet` of `guideline` at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnknownTable`] when the guideline or version is absent.
    fn resolve_table(
        &self,
        sheet: &str,
        guideline: &str,
        version: &str,
    ) -> Result<TableHandle, SourceError>;

    /// Rows of `table` restricted to `columns`, in table order.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the table or one of the columns is absent.
    fn fetch_rows(&self, table: &TableHandle, columns: &[String]) -> Result<Vec<RuleRow>, SourceError>;
}

/// One stored table: its own column names plus rows laid out by them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleTable {
    pub columns: Vec<String>,
    #[serde(default)]
    pub rows: Vec<RuleRow>,
}

impl RuleTable {
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    #[must_use]
    pub fn row(mut self, row: impl Into<RuleRow>) -> Self {
        self.rows.push(row.into());
        self
    }
}

/// A [`RuleSource`] held in memory, keyed by [`table_name`].
///
/// Loadable from TOML:
///
/// ```
/// use comply::source::{MemoryRuleSource, RuleSource};
///
/// let source = MemoryRuleSource::from_toml(r#"
/// [ciphers_Mozilla_5]
/// columns = ["name", "level", "condition", "guidelineName"]
/// rows = [["aes128", "must", "", "Mozilla"]]
/// "#).unwrap();
/// let table = source.resolve_table("ciphers", "Mozilla", "5").unwrap();
/// assert_eq!(source.fetch_rows(&table, &["name".into()]).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryRuleSource {
    tables: BTreeMap<String, RuleTable>,
}

impl MemoryRuleSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, sheet: &str, guideline: &str, version: &str, table: RuleTable) -> Self {
        self.insert(sheet, guideline, version, table);
        self
    }

    pub fn insert(&mut self, sheet: &str, guideline: &str, version: &str, table: RuleTable) {
        self.tables
            .insert(table_name(sheet, guideline, version), table);
    }

    /// # Errors
    ///
    /// Returns [`toml::de::Error`] on malformed input.
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// # Errors
    ///
    /// Returns [`ComplyError`](crate::ComplyError) on I/O or parse failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::ComplyError> {
        let input = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&input)?)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl RuleSource for MemoryRuleSource {
    fn resolve_table(
        &self,
        sheet: &str,
        guideline: &str,
        version: &str,
    ) -> Result<TableHandle, SourceError> {
        let name = table_name(sheet, guideline, version);
        if self.tables.contains_key(&name) {
            Ok(TableHandle::new(&name, guideline))
        } else {
            Err(SourceError::UnknownTable { table: name })
        }
    }

    fn fetch_rows(&self, table: &TableHandle, columns: &[String]) -> Result<Vec<RuleRow>, SourceError> {
        let stored = self
            .tables
            .get(table.name())
            .ok_or_else(|| SourceError::UnknownTable {
                table: table.name().to_owned(),
            })?;
        let positions = columns
            .iter()
            .map(|column| {
                stored
                    .columns
                    .iter()
                    .position(|c| c == column)
                    .ok_or_else(|| SourceError::MissingColumn {
                        table: table.name().to_owned(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stored
            .rows
            .iter()
            .map(|row| positions.iter().map(|&i| row.get(i)).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemoryRuleSource {
        MemoryRuleSource::new().with_table(
            "ciphers",
            "G1",
            "1",
            RuleTable::new(["guidelineName", "name", "level", "condition"])
                .row(["G1", "aes128", "must", ""])
                .row(["G1", "rc4", "must not", ""]),
        )
    }

    #[test]
    fn table_names() {
        assert_eq!(table_name("ciphers", "G1", "1"), "ciphers_G1_1");
        assert_eq!(table_name("ciphers", "G1", ""), "ciphers_G1");
    }

    #[test]
    fn projects_requested_columns_in_order() {
        let source = source();
        let table = source.resolve_table("ciphers", "G1", "1").unwrap();
        let columns: Vec<String> = ["name", "guidelineName"].map(String::from).to_vec();
        let rows = source.fetch_rows(&table, &columns).unwrap();
        assert_eq!(rows, vec![RuleRow::from(["aes128", "G1"]), RuleRow::from(["rc4", "G1"])]);
        assert_eq!(table.guideline(), "G1");
    }

    #[test]
    fn unknown_table_and_column() {
        let source = source();
        assert!(matches!(
            source.resolve_table("ciphers", "G1", "2"),
            Err(SourceError::UnknownTable { table }) if table == "ciphers_G1_2"
        ));
        let table = source.resolve_table("ciphers", "G1", "1").unwrap();
        let err = source.fetch_rows(&table, &["evaluation".to_owned()]).unwrap_err();
        assert_eq!(err.to_string(), "rule table 'ciphers_G1_1' has no column 'evaluation'");
    }

    #[test]
    fn fetch_is_stable() {
        let source = source();
        let table = source.resolve_table("ciphers", "G1", "1").unwrap();
        let columns = vec!["name".to_owned()];
        assert_eq!(
            source.fetch_rows(&table, &columns).unwrap(),
            source.fetch_rows(&table, &columns).unwrap()
        );
    }
}
