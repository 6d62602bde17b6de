use std::collections::HashMap;

use tracing::debug;

use crate::source::RuleSource;
use crate::types::{ColumnSchema, GuidelineRef, RuleRow};
use crate::ComplyError;

/// Rows of one guideline's table for `sheet`, laid out by `schema`.
pub(crate) fn single_guideline(
    source: &dyn RuleSource,
    sheet: &str,
    guideline: &GuidelineRef,
    schema: &ColumnSchema,
) -> Result<Vec<RuleRow>, ComplyError> {
    let table = source.resolve_table(sheet, &guideline.name, &guideline.version)?;
    let rows = source.fetch_rows(&table, &schema.columns)?;
    debug!(sheet, table = table.name(), rows = rows.len(), "fetched rule rows");
    Ok(rows)
}

/// One display name's rows across several guidelines.
///
/// Holds one optional block per requested guideline, in request order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRuleRow {
    pub name: String,
    blocks: Vec<Option<RuleRow>>,
}

impl MergedRuleRow {
    fn new(name: String, guidelines: usize) -> Self {
        Self {
            name,
            blocks: vec![None; guidelines],
        }
    }

    /// Present blocks with their guideline position.
    pub fn blocks(&self) -> impl Iterator<Item = (usize, &RuleRow)> {
        self.blocks
            .iter()
            .enumerate()
            .filter_map(|(i, b)| b.as_ref().map(|row| (i, row)))
    }

    /// The flat merged row. Absent blocks are filled with `width` empty cells.
    #[must_use]
    pub fn to_row(&self, width: usize) -> RuleRow {
        let mut row = RuleRow::default();
        for block in &self.blocks {
            match block {
                Some(cells) => row.extend(&cells.block(0, width)),
                None => row.extend(&RuleRow::empty(width)),
            }
        }
        row
    }
}

/// Fetch `sheet` for every guideline and merge rows by display name.
///
/// Names keep the order in which they are first seen. Within one guideline the
/// first row for a name wins.
pub(crate) fn merged_guidelines(
    source: &dyn RuleSource,
    sheet: &str,
    guidelines: &[GuidelineRef],
    schema: &ColumnSchema,
) -> Result<Vec<MergedRuleRow>, ComplyError> {
    let mut merged: Vec<MergedRuleRow> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for (block, guideline) in guidelines.iter().enumerate() {
        for row in single_guideline(source, sheet, guideline, schema)? {
            let name = schema.display_name(&row);
            let slot = *positions.entry(name.clone()).or_insert_with(|| {
                merged.push(MergedRuleRow::new(name.clone(), guidelines.len()));
                merged.len() - 1
            });
            let target = &mut merged[slot].blocks[block];
            if target.is_some() {
                debug!(sheet, name = %name, guideline = %guideline.name, "duplicate rule name, keeping first");
                continue;
            }
            *target = Some(row);
        }
    }
    Ok(merged)
}
