//! Guideline compliance checking and nginx directive synthesis.
//!
//! A [`ComplianceEngine`] fetches guideline rule tables from a
//! [`RuleSource`](source::RuleSource), evaluates each rule against a
//! [`UserConfiguration`], resolves conflicting levels and records a
//! [`ResultStore`]. The [`DirectiveSynthesizer`](synth::DirectiveSynthesizer)
//! turns evaluated entries back into directives of an nginx template.

mod config;
mod error;
mod evaluate;
pub mod parse;
mod retrieve;
pub mod source;
pub mod synth;
mod types;
mod worker;

pub use config::EngineConfig;
pub use error::ComplyError;
pub use evaluate::{ConditionEvaluator, ConditionOutcome, ConditionUpdate, DslConditionEvaluator};
pub use retrieve::MergedRuleRow;
pub use types::{
    Action, ColumnSchema, Condition, ConfigValue, EvaluatedEntries, EvaluationOutcome,
    GuidelineBlockLayout, GuidelineRef, LevelAction, LevelDefinition, LevelPolicy, ParsedCondition,
    ResultRecord, ResultStore, RuleRow, SchemaError, SheetColumns, SheetEntries, SheetsToCheck,
    UserConfiguration, Verdict, CONDITION, EVALUATION, GUIDELINE, LEVEL, NAME, in_field,
    this_field,
};
pub use worker::{
    Aggregation, ComplianceEngine, Evaluation, Pipeline, Retrieval, WorkerKind, WorkerOutput,
};
