use std::fmt;

use serde::Serialize;

use super::level::LevelAction;

/// How a configuration stands against one resolved rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[must_use]
pub enum Verdict {
    /// The configuration already does what the level asks.
    Satisfied,
    /// The level asks for the item but it is not enabled.
    Missing,
    /// The level forbids the item but it is enabled.
    Forbidden,
    /// The rule's condition does not hold, so its guidance does not apply.
    NotApplicable,
    /// The level carries no enable/disable requirement.
    Informational,
}

impl Verdict {
    pub fn classify(action: LevelAction, enabled: bool, valid_condition: bool) -> Self {
        if !valid_condition {
            return Verdict::NotApplicable;
        }
        match (action, enabled) {
            (LevelAction::Enable, true) | (LevelAction::Disable, false) => Verdict::Satisfied,
            (LevelAction::Enable, false) => Verdict::Missing,
            (LevelAction::Disable, true) => Verdict::Forbidden,
            (LevelAction::Ignore, _) => Verdict::Informational,
        }
    }

    #[must_use]
    pub fn is_violation(self) -> bool {
        matches!(self, Verdict::Missing | Verdict::Forbidden)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Satisfied => "satisfied",
            Verdict::Missing => "missing",
            Verdict::Forbidden => "forbidden",
            Verdict::NotApplicable => "not applicable",
            Verdict::Informational => "informational",
        };
        f.write_str(s)
    }
}
