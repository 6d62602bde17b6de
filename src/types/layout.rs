use std::collections::HashMap;

use super::rule::{ColumnSchema, RuleRow, GUIDELINE};

/// Maps guideline names to the start of their block inside a merged row.
///
/// A merged row is the concatenation of equally wide per-guideline blocks, each
/// laid out by the same [`ColumnSchema`]. Built once per merged row set and used
/// to find a given guideline's cell for any column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidelineBlockLayout {
    schema_width: usize,
    offsets: HashMap<String, usize>,
}

impl GuidelineBlockLayout {
    /// Layout for blocks in `guidelines` order.
    #[must_use]
    pub fn from_guidelines<S: AsRef<str>>(schema_width: usize, guidelines: &[S]) -> Self {
        let offsets = guidelines
            .iter()
            .enumerate()
            .map(|(i, g)| (g.as_ref().to_owned(), i * schema_width))
            .collect();
        Self {
            schema_width,
            offsets,
        }
    }

    /// Layout discovered from the guideline column of each block of `row`.
    ///
    /// Blocks with an empty guideline cell are padding and are skipped. If a
    /// guideline name repeats, its first block wins. Schemas without a
    /// `guidelineName` column produce an empty layout.
    #[must_use]
    pub fn from_row(row: &RuleRow, schema: &ColumnSchema) -> Self {
        Self::from_rows(std::iter::once(row), schema)
    }

    /// Layout discovered from every row of a merged row set.
    #[must_use]
    pub fn from_rows<'r>(rows: impl IntoIterator<Item = &'r RuleRow>, schema: &ColumnSchema) -> Self {
        let schema_width = schema.width();
        let mut offsets = HashMap::new();
        if let (Some(column), true) = (schema.index_of(GUIDELINE), schema_width > 0) {
            for row in rows {
                for start in (0..row.len()).step_by(schema_width) {
                    let guideline = row.get(start + column);
                    if !guideline.is_empty() {
                        offsets.entry(guideline.to_owned()).or_insert(start);
                    }
                }
            }
        }
        Self {
            schema_width,
            offsets,
        }
    }

    #[must_use]
    pub fn schema_width(&self) -> usize {
        self.schema_width
    }

    #[must_use]
    pub fn block_start(&self, guideline: &str) -> Option<usize> {
        self.offsets.get(guideline).copied()
    }

    /// Absolute position of `column_index` within `guideline`'s block.
    #[must_use]
    pub fn column(&self, guideline: &str, column_index: usize) -> Option<usize> {
        self.block_start(guideline).map(|start| start + column_index)
    }

    /// Read `guideline`'s cell at `column_index` from `row`.
    #[must_use]
    pub fn cell<'r>(&self, row: &'r RuleRow, guideline: &str, column_index: usize) -> Option<&'r str> {
        self.column(guideline, column_index).map(|i| row.get(i))
    }

    /// `guideline`'s whole block, as a single-guideline row.
    #[must_use]
    pub fn block(&self, row: &RuleRow, guideline: &str) -> Option<RuleRow> {
        self.block_start(guideline)
            .map(|start| row.block(start, self.schema_width))
    }

    pub fn guidelines(&self) -> impl Iterator<Item = &str> {
        self.offsets.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
