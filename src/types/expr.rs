use std::fmt;
use std::ops::Not;

/// Boolean expression over rule enablement, as written in a rule's condition cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The enablement of the rule that owns the condition.
    This,
    /// Enablement of `name` in `field`, or in the owning rule's field when `None`.
    Ref { field: Option<String>, name: String },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

/// Guidance attached to a condition, emitted when the expression holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Inject an alternative support level.
    Level(String),
    /// Attach free text to the rule's result.
    Note(String),
}

/// A parsed condition cell: the expression plus its trailing actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCondition {
    pub expr: Condition,
    pub actions: Vec<Action>,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::This => write!(f, "THIS"),
            Condition::Ref {
                field: Some(field),
                name,
            } => write!(f, "{field}:{name}"),
            Condition::Ref { field: None, name } => write!(f, "{name}"),
            Condition::And(a, b) => write!(f, "({a} AND {b})"),
            Condition::Or(a, b) => write!(f, "({a} OR {b})"),
            Condition::Not(inner) => write!(f, "(NOT {inner})"),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Level(level) => write!(f, "LEVEL({level:?})"),
            Action::Note(note) => write!(f, "NOTE({note:?})"),
        }
    }
}

impl Condition {
    #[must_use]
    pub fn and(self, other: Condition) -> Condition {
        Condition::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Condition) -> Condition {
        Condition::Or(Box::new(self), Box::new(other))
    }

    /// Whether the rule's own enablement has an alternative, i.e. the top-level
    /// expression is an `OR` chain with `THIS` as one of its operands.
    #[must_use]
    pub fn has_alternative(&self) -> bool {
        matches!(self, Condition::Or(_, _)) && self.or_operands().contains(&&Condition::This)
    }

    /// Operands of the top-level `OR` chain, flattened left to right.
    fn or_operands(&self) -> Vec<&Condition> {
        match self {
            Condition::Or(a, b) => {
                let mut out = a.or_operands();
                out.extend(b.or_operands());
                out
            }
            other => vec![other],
        }
    }

    /// Every reference in the expression, in source order.
    #[must_use]
    pub fn references(&self) -> Vec<(Option<&str>, &str)> {
        let mut out = Vec::new();
        collect_refs(self, &mut out);
        out
    }
}

fn collect_refs<'a>(cond: &'a Condition, out: &mut Vec<(Option<&'a str>, &'a str)>) {
    match cond {
        Condition::Ref { field, name } => out.push((field.as_deref(), name.as_str())),
        Condition::And(a, b) | Condition::Or(a, b) => {
            collect_refs(a, out);
            collect_refs(b, out);
        }
        Condition::Not(inner) => collect_refs(inner, out),
        Condition::This => {}
    }
}

impl Not for Condition {
    type Output = Condition;

    fn not(self) -> Condition {
        Condition::Not(Box::new(self))
    }
}

impl ParsedCondition {
    /// Levels injected by `LEVEL(..)` actions, in order.
    #[must_use]
    pub fn levels(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Level(level) => Some(level.clone()),
                Action::Note(_) => None,
            })
            .collect()
    }

    /// Texts of `NOTE(..)` actions, in order.
    #[must_use]
    pub fn notes(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                Action::Note(note) => Some(note.clone()),
                Action::Level(_) => None,
            })
            .collect()
    }
}

/// Reference to `name` in the owning rule's field.
#[must_use]
pub fn this_field(name: &str) -> Condition {
    Condition::Ref {
        field: None,
        name: name.to_owned(),
    }
}

/// Reference to `name` in another `field`.
#[must_use]
pub fn in_field(field: &str, name: &str) -> Condition {
    Condition::Ref {
        field: Some(field.to_owned()),
        name: name.to_owned(),
    }
}
