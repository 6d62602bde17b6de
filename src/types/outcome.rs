use std::collections::BTreeMap;
use std::fmt;

use super::layout::GuidelineBlockLayout;
use super::rule::{ColumnSchema, RuleRow};

/// Result of evaluating one rule (or one merged multi-guideline rule) in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutcome {
    /// Display name, built from the sheet's name columns.
    pub name: String,
    /// Raw `name` cell, as passed to the condition evaluator.
    pub rule_name: String,
    pub level: String,
    pub enabled: bool,
    pub valid_condition: bool,
    /// Guideline whose level was chosen; empty for evaluation-only passes.
    pub source: String,
    pub note: String,
    /// The evaluated row. For merged retrieval, all guideline blocks side by side.
    pub row: RuleRow,
}

impl fmt::Display for EvaluationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: level={}, enabled={}, valid={}",
            self.name, self.level, self.enabled, self.valid_condition
        )?;
        if !self.source.is_empty() {
            write!(f, ", source={}", self.source)?;
        }
        Ok(())
    }
}

/// Evaluated entries of one sheet, in table order, with the schema that lays
/// out each block of their rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetEntries {
    pub schema: ColumnSchema,
    pub entries: Vec<EvaluationOutcome>,
}

impl SheetEntries {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EvaluationOutcome> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Layout of the merged rows of this sheet.
    #[must_use]
    pub fn layout(&self) -> GuidelineBlockLayout {
        GuidelineBlockLayout::from_rows(self.entries.iter().map(|e| &e.row), &self.schema)
    }
}

/// Shared evaluated-entries state, sheet → entries.
///
/// Produced by every worker pipeline and consumed by the
/// [`DirectiveSynthesizer`](crate::synth::DirectiveSynthesizer).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[must_use]
pub struct EvaluatedEntries {
    sheets: BTreeMap<String, SheetEntries>,
}

impl EvaluatedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, sheet: &str, entries: SheetEntries) {
        self.sheets.insert(sheet.to_owned(), entries);
    }

    #[must_use]
    pub fn sheet(&self, sheet: &str) -> Option<&SheetEntries> {
        self.sheets.get(sheet)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SheetEntries)> {
        self.sheets.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries across all sheets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sheets.values().map(|s| s.entries.len()).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
