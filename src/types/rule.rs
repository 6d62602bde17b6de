use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::error::SchemaError;

pub const NAME: &str = "name";
pub const LEVEL: &str = "level";
pub const CONDITION: &str = "condition";
pub const GUIDELINE: &str = "guidelineName";
pub const EVALUATION: &str = "evaluation";

/// One guideline rule as an ordered sequence of cells.
///
/// The meaning of each position comes from a [`ColumnSchema`]. Out-of-range reads
/// yield an empty cell rather than panicking, so a short row degrades like a row
/// with empty trailing columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleRow(Vec<String>);

impl RuleRow {
    #[must_use]
    pub fn new(cells: Vec<String>) -> Self {
        Self(cells)
    }

    /// A row of `width` empty cells, used to pad missing guideline blocks.
    #[must_use]
    pub fn empty(width: usize) -> Self {
        Self(vec![String::new(); width])
    }

    #[must_use]
    pub fn get(&self, index: usize) -> &str {
        self.0.get(index).map_or("", String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> &str {
        self.0.last().map_or("", String::as_str)
    }

    #[must_use]
    pub fn cells(&self) -> &[String] {
        &self.0
    }

    /// The `width`-wide block starting at `start`, padded with empty cells.
    #[must_use]
    pub fn block(&self, start: usize, width: usize) -> RuleRow {
        RuleRow((start..start + width).map(|i| self.get(i).to_owned()).collect())
    }

    /// Append another row's cells, producing a wider merged row.
    pub fn extend(&mut self, other: &RuleRow) {
        self.0.extend(other.0.iter().cloned());
    }
}

impl<S: Into<String>> FromIterator<S> for RuleRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for RuleRow {
    fn from(cells: [S; N]) -> Self {
        cells.into_iter().collect()
    }
}

/// The column layout of a sheet, and which columns compose its display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub columns: Vec<String>,
    /// Positions joined with `_` to build the display name. Defaults to the
    /// position of the `name` column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_columns: Option<Vec<usize>>,
}

impl ColumnSchema {
    #[must_use]
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            name_columns: None,
        }
    }

    /// `name, level, condition, guidelineName`
    #[must_use]
    pub fn rules() -> Self {
        Self::new([NAME, LEVEL, CONDITION, GUIDELINE])
    }

    /// `name, evaluation, condition`
    #[must_use]
    pub fn evaluation() -> Self {
        Self::new([NAME, EVALUATION, CONDITION])
    }

    #[must_use]
    pub fn with_name_columns(mut self, name_columns: Vec<usize>) -> Self {
        self.name_columns = Some(name_columns);
        self
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Like [`index_of`](Self::index_of), but a missing column is a schema error.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::MissingColumn`] when `column` is not part of the schema.
    pub fn require(&self, sheet: &str, column: &str) -> Result<usize, SchemaError> {
        self.index_of(column)
            .ok_or_else(|| SchemaError::MissingColumn {
                sheet: sheet.to_owned(),
                column: column.to_owned(),
            })
    }

    /// Check that the schema can produce display names.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] if the `name` column is missing or a name column
    /// index points past the end of the schema.
    pub fn validate(&self, sheet: &str) -> Result<(), SchemaError> {
        self.require(sheet, NAME)?;
        if let Some(indices) = &self.name_columns {
            if let Some(&index) = indices.iter().find(|&&i| i >= self.width()) {
                return Err(SchemaError::NameColumnOutOfRange {
                    sheet: sheet.to_owned(),
                    index,
                    width: self.width(),
                });
            }
        }
        Ok(())
    }

    /// Join the name columns of `row` with `_`.
    #[must_use]
    pub fn display_name(&self, row: &RuleRow) -> String {
        match &self.name_columns {
            Some(indices) => indices
                .iter()
                .map(|&i| row.get(i))
                .collect::<Vec<_>>()
                .join("_"),
            None => self
                .index_of(NAME)
                .map(|i| row.get(i).to_owned())
                .unwrap_or_default(),
        }
    }

    /// Read `column` from `row`; unknown columns read as empty.
    #[must_use]
    pub fn cell<'r>(&self, row: &'r RuleRow, column: &str) -> &'r str {
        self.index_of(column).map_or("", |i| row.get(i))
    }
}

/// Per-sheet schema overrides. Static configuration, read-only to the workers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SheetColumns(BTreeMap<String, ColumnSchema>);

impl SheetColumns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sheet: &str, schema: ColumnSchema) -> Self {
        self.0.insert(sheet.to_owned(), schema);
        self
    }

    /// The override for `sheet`, or `default` when there is none.
    #[must_use]
    pub fn schema_for(&self, sheet: &str, default: &ColumnSchema) -> ColumnSchema {
        self.0.get(sheet).cloned().unwrap_or_else(|| default.clone())
    }
}
