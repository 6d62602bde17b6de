use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::evaluate::{ConditionEvaluator, ConditionUpdate, DslConditionEvaluator};
use crate::retrieve::{self, MergedRuleRow};
use crate::source::RuleSource;
use crate::types::{
    ColumnSchema, EvaluatedEntries, EvaluationOutcome, GuidelineRef, ResultStore, RuleRow,
    SchemaError, SheetEntries, SheetsToCheck, UserConfiguration, CONDITION, EVALUATION, GUIDELINE,
    LEVEL, NAME,
};
use crate::ComplyError;

/// Where rule rows come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Retrieval {
    /// The first guideline requested for each sheet.
    SingleGuideline,
    /// Every requested guideline, merged by display name.
    MergedGuidelines,
}

/// How each row is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Evaluation {
    /// Levels, conditions, level resolution and notes.
    Leveled,
    /// Enablement plus the raw `evaluation` cell only.
    EvaluationOnly,
}

/// Whether evaluated entries become results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Record,
    /// Stop after evaluation; only the evaluated entries are produced.
    Skip,
}

/// A compliance worker, as a combination of strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pipeline {
    pub retrieval: Retrieval,
    pub evaluation: Evaluation,
    pub aggregation: Aggregation,
}

impl Pipeline {
    #[must_use]
    pub const fn new(retrieval: Retrieval, evaluation: Evaluation, aggregation: Aggregation) -> Self {
        Self {
            retrieval,
            evaluation,
            aggregation,
        }
    }

    fn default_schema(&self) -> ColumnSchema {
        match self.evaluation {
            Evaluation::Leveled => ColumnSchema::rules(),
            Evaluation::EvaluationOnly => ColumnSchema::evaluation(),
        }
    }
}

/// The four stock workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    /// One guideline per sheet, with levels and conditions.
    SingleGuideline,
    /// One guideline per sheet, enablement and evaluation only.
    EvaluationOnly,
    /// Several guidelines per sheet, levels resolved across them.
    MultiGuideline,
    /// Several guidelines per sheet, evaluated for synthesis but not recorded.
    GenerateOnly,
}

impl WorkerKind {
    #[must_use]
    pub const fn pipeline(self) -> Pipeline {
        match self {
            WorkerKind::SingleGuideline => {
                Pipeline::new(Retrieval::SingleGuideline, Evaluation::Leveled, Aggregation::Record)
            }
            WorkerKind::EvaluationOnly => Pipeline::new(
                Retrieval::SingleGuideline,
                Evaluation::EvaluationOnly,
                Aggregation::Record,
            ),
            WorkerKind::MultiGuideline => {
                Pipeline::new(Retrieval::MergedGuidelines, Evaluation::Leveled, Aggregation::Record)
            }
            WorkerKind::GenerateOnly => {
                Pipeline::new(Retrieval::MergedGuidelines, Evaluation::Leveled, Aggregation::Skip)
            }
        }
    }
}

impl From<WorkerKind> for Pipeline {
    fn from(kind: WorkerKind) -> Self {
        kind.pipeline()
    }
}

/// What one worker invocation produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerOutput {
    /// Empty when the pipeline skips aggregation.
    pub results: ResultStore,
    pub evaluated: EvaluatedEntries,
}

/// Column positions of one schema, resolved once per sheet.
struct Columns {
    name: usize,
    level: usize,
    condition: Option<usize>,
    guideline: Option<usize>,
}

impl Columns {
    fn resolve(sheet: &str, schema: &ColumnSchema, evaluation: Evaluation) -> Result<Self, SchemaError> {
        schema.validate(sheet)?;
        let (level, condition) = match evaluation {
            Evaluation::Leveled => (
                schema.require(sheet, LEVEL)?,
                Some(schema.require(sheet, CONDITION)?),
            ),
            Evaluation::EvaluationOnly => {
                (schema.require(sheet, EVALUATION)?, schema.index_of(CONDITION))
            }
        };
        Ok(Self {
            name: schema.require(sheet, NAME)?,
            level,
            condition,
            guideline: schema.index_of(GUIDELINE),
        })
    }
}

/// Runs compliance workers against a rule source.
///
/// The engine holds no per-run state: every [`run`](Self::run) builds a fresh
/// [`ResultStore`], so independent sheets may be run on separate threads and
/// their stores combined with [`ResultStore::merge`].
///
/// # Example
///
/// ```
/// use comply::source::{MemoryRuleSource, RuleTable};
/// use comply::{ComplianceEngine, SheetsToCheck, UserConfiguration, WorkerKind};
///
/// let source = MemoryRuleSource::new().with_table(
///     "Protocol",
///     "Mozilla",
///     "5.7",
///     RuleTable::new(["name", "level", "condition", "guidelineName"])
///         .row(["TLSv1.3", "must", "", "Mozilla"])
///         .row(["TLSv1.0", "must not", "", "Mozilla"]),
/// );
/// let engine = ComplianceEngine::new(source);
/// let sheets = SheetsToCheck::new().sheet("Protocol", "Mozilla", "5.7");
/// let user = UserConfiguration::new().set("Protocol", ["TLSv1.2", "TLSv1.3"]);
///
/// let output = engine.run(WorkerKind::SingleGuideline, &sheets, &user).unwrap();
/// assert!(output.results.get("Protocol", "TLSv1.3").unwrap().enabled);
/// assert!(!output.results.get("Protocol", "TLSv1.0").unwrap().enabled);
/// ```
#[derive(Debug, Clone)]
pub struct ComplianceEngine<S, E = DslConditionEvaluator> {
    source: S,
    evaluator: E,
    config: EngineConfig,
}

impl<S: RuleSource> ComplianceEngine<S> {
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            evaluator: DslConditionEvaluator,
            config: EngineConfig::default(),
        }
    }
}

impl<S: RuleSource, E: ConditionEvaluator> ComplianceEngine<S, E> {
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_evaluator<F: ConditionEvaluator>(self, evaluator: F) -> ComplianceEngine<S, F> {
        ComplianceEngine {
            source: self.source,
            evaluator,
            config: self.config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run one worker over `sheets`.
    ///
    /// Retrieval and evaluation finish for every sheet before any result is
    /// recorded.
    ///
    /// # Errors
    ///
    /// - [`ComplyError::MissingConfiguration`] when `user` is empty.
    /// - [`ComplyError::Schema`] when a sheet's schema lacks a required column.
    /// - [`ComplyError::Source`] when a table or column cannot be found.
    pub fn run(
        &self,
        worker: impl Into<Pipeline>,
        sheets: &SheetsToCheck,
        user: &UserConfiguration,
    ) -> Result<WorkerOutput, ComplyError> {
        if user.is_empty() {
            return Err(ComplyError::MissingConfiguration);
        }
        let pipeline = worker.into();
        info!(?pipeline, sheets = sheets.len(), "running compliance worker");

        let mut output = WorkerOutput::default();
        for (sheet, guidelines) in sheets.iter() {
            let Some(first) = guidelines.first() else {
                debug!(sheet, "no guideline requested, skipping sheet");
                continue;
            };
            let schema = self
                .config
                .sheet_columns
                .schema_for(sheet, &pipeline.default_schema());
            let columns = Columns::resolve(sheet, &schema, pipeline.evaluation)?;
            let entries: Vec<EvaluationOutcome> = match pipeline.retrieval {
                Retrieval::SingleGuideline => {
                    retrieve::single_guideline(&self.source, sheet, first, &schema)?
                        .into_iter()
                        .map(|row| {
                            self.evaluate_row(user, sheet, &schema, &columns, pipeline.evaluation, row, &first.name)
                        })
                        .collect()
                }
                Retrieval::MergedGuidelines => {
                    retrieve::merged_guidelines(&self.source, sheet, guidelines, &schema)?
                        .iter()
                        .filter_map(|merged| {
                            self.evaluate_merged(user, sheet, &schema, &columns, pipeline.evaluation, merged, guidelines)
                        })
                        .collect()
                }
            };
            output.evaluated.insert(sheet, SheetEntries { schema, entries });
        }

        if pipeline.aggregation == Aggregation::Record {
            for (sheet, sheet_entries) in output.evaluated.iter() {
                output.results.ensure_sheet(sheet);
                for entry in &sheet_entries.entries {
                    output.results.update_result(
                        sheet,
                        &entry.name,
                        &entry.level,
                        entry.enabled,
                        &entry.source,
                        entry.valid_condition,
                    );
                    if !entry.note.is_empty() {
                        output.results.append_note(sheet, &entry.name, &entry.note);
                    }
                }
            }
        }
        info!(
            evaluated = output.evaluated.len(),
            recorded = output.results.len(),
            "compliance worker finished"
        );
        Ok(output)
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_row(
        &self,
        user: &UserConfiguration,
        sheet: &str,
        schema: &ColumnSchema,
        columns: &Columns,
        evaluation: Evaluation,
        row: RuleRow,
        guideline: &str,
    ) -> EvaluationOutcome {
        let rule_name = row.get(columns.name).to_owned();
        let condition = columns.condition.map_or("", |i| row.get(i)).to_owned();
        let enabled = self
            .evaluator
            .is_enabled(user, sheet, &rule_name, &row, &condition);
        let name = schema.display_name(&row);

        if evaluation == Evaluation::EvaluationOnly {
            debug!(sheet, name = %name, enabled, "evaluated rule");
            return EvaluationOutcome {
                name,
                rule_name,
                level: row.get(columns.level).to_owned(),
                enabled,
                valid_condition: true,
                source: String::new(),
                note: String::new(),
                row,
            };
        }

        let mut level = row.get(columns.level).to_owned();
        let mut valid_condition = true;
        let mut update = ConditionUpdate::default();
        if !condition.trim().is_empty() {
            let outcome = self.evaluator.run(user, sheet, &condition, enabled);
            valid_condition = outcome.valid;
            update = outcome.update.unwrap_or_default();
        }
        if !update.levels.is_empty() {
            level = self.config.levels.resolve_with_own(&level, &update.levels);
        }
        if !level.is_empty() && !self.config.levels.is_known(&level) {
            warn!(sheet, name = %name, level = %level, "unknown level, ranked lowest");
        }
        if self.config.force_valid_on_guidance && (update.has_alternative || !update.notes.is_empty()) {
            valid_condition = true;
        }

        let mut note = String::new();
        if update.has_alternative && !enabled && condition.matches(' ').count() > 1 {
            let parts: Vec<&str> = condition.split(' ').collect();
            note = format!(
                "\nNOTE: {name} {} {} is needed",
                parts[1].to_uppercase(),
                parts[2..].join(" ")
            );
        }
        if !update.notes.is_empty() {
            note.push_str("\nNOTE:");
            note.push_str(&update.notes.join("\n"));
        }

        let source = columns
            .guideline
            .map(|i| row.get(i))
            .filter(|g| !g.is_empty())
            .unwrap_or(guideline)
            .to_owned();
        debug!(sheet, name = %name, level = %level, enabled, valid_condition, "evaluated rule");
        EvaluationOutcome {
            name,
            rule_name,
            level,
            enabled,
            valid_condition,
            source,
            note,
            row,
        }
    }

    /// Evaluate each guideline block of `merged` and keep the one whose level
    /// takes precedence, with every block's notes.
    #[allow(clippy::too_many_arguments)]
    fn evaluate_merged(
        &self,
        user: &UserConfiguration,
        sheet: &str,
        schema: &ColumnSchema,
        columns: &Columns,
        evaluation: Evaluation,
        merged: &MergedRuleRow,
        guidelines: &[GuidelineRef],
    ) -> Option<EvaluationOutcome> {
        let width = schema.width();
        let mut blocks: Vec<EvaluationOutcome> = merged
            .blocks()
            .map(|(position, block)| {
                let guideline = guidelines.get(position).map_or("", |g| g.name.as_str());
                self.evaluate_row(user, sheet, schema, columns, evaluation, block.block(0, width), guideline)
            })
            .collect();
        if blocks.is_empty() {
            return None;
        }
        let levels: Vec<String> = blocks.iter().map(|b| b.level.clone()).collect();
        let note: String = blocks.iter().map(|b| b.note.as_str()).collect();
        let winner = self.config.levels.resolve(&levels, true);
        let mut outcome = blocks.swap_remove(winner);
        outcome.name = merged.name.clone();
        outcome.note = note;
        outcome.row = merged.to_row(width);
        Some(outcome)
    }
}
