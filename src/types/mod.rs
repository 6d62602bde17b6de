mod context;
mod error;
mod expr;
mod layout;
mod level;
mod outcome;
mod request;
mod result_store;
mod rule;
mod value;
mod verdict;

pub use context::UserConfiguration;
pub use error::SchemaError;
pub use expr::{Action, Condition, ParsedCondition, in_field, this_field};
pub use layout::GuidelineBlockLayout;
pub use level::{LevelAction, LevelDefinition, LevelPolicy};
pub use outcome::{EvaluatedEntries, EvaluationOutcome, SheetEntries};
pub use request::{GuidelineRef, SheetsToCheck};
pub use result_store::{ResultRecord, ResultStore};
pub use rule::{ColumnSchema, RuleRow, SheetColumns, CONDITION, EVALUATION, GUIDELINE, LEVEL, NAME};
pub use value::ConfigValue;
pub use verdict::Verdict;
