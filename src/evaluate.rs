use tracing::warn;

use crate::parse::parse_optional;
use crate::types::{Condition, ParsedCondition, RuleRow, UserConfiguration};

/// Guidance produced by one condition run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionUpdate {
    /// Alternative levels injected by the condition, in trigger order.
    pub levels: Vec<String>,
    /// The rule's own enablement has an alternative (`THIS OR ...`).
    pub has_alternative: bool,
    pub notes: Vec<String>,
}

impl ConditionUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && !self.has_alternative && self.notes.is_empty()
    }
}

/// Result of running a condition: whether its guidance is actionable, plus any
/// update it carries. The update belongs to this call only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionOutcome {
    pub valid: bool,
    pub update: Option<ConditionUpdate>,
}

impl ConditionOutcome {
    /// Outcome of a rule without a (usable) condition.
    #[must_use]
    pub fn unconditional() -> Self {
        Self {
            valid: true,
            update: None,
        }
    }
}

/// Decides rule enablement and condition validity.
///
/// Both operations must be pure functions of their inputs: no state may carry
/// over from one rule to the next.
pub trait ConditionEvaluator {
    /// Whether the rule `name` of `field` is currently satisfied by `config`.
    fn is_enabled(
        &self,
        config: &UserConfiguration,
        field: &str,
        name: &str,
        row: &RuleRow,
        condition: &str,
    ) -> bool;

    /// Run `condition` for a rule of `field` whose own enablement is `enabled`.
    fn run(
        &self,
        config: &UserConfiguration,
        field: &str,
        condition: &str,
        enabled: bool,
    ) -> ConditionOutcome;
}

/// Evaluator for the built-in condition language.
///
/// ```text
/// THIS OR TLSv1.3 NOTE("TLS 1.3 also satisfies this rule")
/// Protocol:TLSv1.2 AND NOT rc4 LEVEL("must not")
/// ```
///
/// `THIS` is the rule's own enablement, a bare name is looked up in the rule's
/// own field and `field:name` in another field. Actions fire only when the
/// expression holds. A condition that fails to parse is logged and treated as
/// absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DslConditionEvaluator;

impl DslConditionEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConditionEvaluator for DslConditionEvaluator {
    fn is_enabled(
        &self,
        config: &UserConfiguration,
        field: &str,
        name: &str,
        _row: &RuleRow,
        _condition: &str,
    ) -> bool {
        config.is_enabled(field, name)
    }

    fn run(
        &self,
        config: &UserConfiguration,
        field: &str,
        condition: &str,
        enabled: bool,
    ) -> ConditionOutcome {
        let parsed = match parse_optional(condition) {
            Ok(Some(parsed)) => parsed,
            Ok(None) => return ConditionOutcome::unconditional(),
            Err(err) => {
                warn!(field, condition, error = %err, "ignoring unparsable condition");
                return ConditionOutcome::unconditional();
            }
        };
        let valid = holds(&parsed.expr, config, field, enabled);
        let update = guidance(&parsed, valid);
        ConditionOutcome {
            valid,
            update: (!update.is_empty()).then_some(update),
        }
    }
}

fn guidance(parsed: &ParsedCondition, valid: bool) -> ConditionUpdate {
    let mut update = ConditionUpdate {
        has_alternative: parsed.expr.has_alternative(),
        ..ConditionUpdate::default()
    };
    if valid {
        update.levels = parsed.levels();
        update.notes = parsed.notes();
    }
    update
}

fn holds(cond: &Condition, config: &UserConfiguration, field: &str, enabled: bool) -> bool {
    match cond {
        Condition::This => enabled,
        Condition::Ref { field: other, name } => {
            config.is_enabled(other.as_deref().unwrap_or(field), name)
        }
        Condition::And(a, b) => {
            holds(a, config, field, enabled) && holds(b, config, field, enabled)
        }
        Condition::Or(a, b) => {
            holds(a, config, field, enabled) || holds(b, config, field, enabled)
        }
        Condition::Not(inner) => !holds(inner, config, field, enabled),
    }
}
