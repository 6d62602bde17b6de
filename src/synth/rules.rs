use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::LevelAction;

/// Placeholder replaced by the entry name in enable/disable templates.
pub const NAME_PLACEHOLDER: &str = "name";

/// A literal text replacement applied to entry names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
}

/// How the entries of one field are written into a directive value.
///
/// With a `disable` template the directive is enable/disable style
/// (`aes128:!rc4`); without one it only lists the enabled names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRules {
    pub enable: String,
    pub disable: Option<String>,
    pub separator: String,
    /// Applied in order.
    pub replacements: Vec<Replacement>,
}

impl Default for FieldRules {
    fn default() -> Self {
        Self::listing(" ")
    }
}

impl FieldRules {
    /// Rules for a directive listing enabled names separated by `separator`.
    #[must_use]
    pub fn listing(separator: &str) -> Self {
        Self {
            enable: NAME_PLACEHOLDER.to_owned(),
            disable: None,
            separator: separator.to_owned(),
            replacements: Vec::new(),
        }
    }

    /// Rules for an enable/disable style directive.
    #[must_use]
    pub fn toggle(enable: &str, disable: &str, separator: &str) -> Self {
        Self {
            enable: enable.to_owned(),
            disable: Some(disable.to_owned()),
            separator: separator.to_owned(),
            replacements: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_replacement(mut self, from: &str, to: &str) -> Self {
        self.replacements.push(Replacement {
            from: from.to_owned(),
            to: to.to_owned(),
        });
        self
    }

    pub(crate) fn apply_replacements(&self, name: &str) -> String {
        self.replacements
            .iter()
            .fold(name.to_owned(), |acc, r| acc.replace(&r.from, &r.to))
    }

    /// Text appended to the value buffer for `name` under `action`, separator included.
    pub(crate) fn fragment(&self, action: LevelAction, name: &str) -> Option<String> {
        let template = match action {
            LevelAction::Enable => &self.enable,
            LevelAction::Disable => self.disable.as_ref()?,
            LevelAction::Ignore => return None,
        };
        let mut fragment = template.replace(NAME_PLACEHOLDER, name);
        fragment.push_str(&self.separator);
        Some(fragment)
    }

    /// Strip formatting leftovers from an accumulated value.
    pub(crate) fn finish(&self, value: &str) -> String {
        let mut value = value.trim_end();
        let separator = self.separator.trim();
        if !separator.is_empty() {
            value = value.strip_suffix(separator).unwrap_or(value);
        }
        value = value.strip_suffix(':').unwrap_or(value);
        value.trim().to_owned()
    }
}

/// Synthesis settings: where directives go, which directive each field maps to,
/// and how field values are formatted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Top-level block that receives synthesized directives.
    pub anchor: String,
    /// Field → directive name. Unmapped fields are not supported by the target.
    pub mapping: BTreeMap<String, String>,
    pub field_rules: FieldRules,
    /// Per-field overrides of `field_rules`.
    pub specific_rules: BTreeMap<String, FieldRules>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            anchor: "http".to_owned(),
            mapping: BTreeMap::new(),
            field_rules: FieldRules::default(),
            specific_rules: BTreeMap::new(),
        }
    }
}

impl SynthesisConfig {
    #[must_use]
    pub fn map(mut self, field: &str, directive: &str) -> Self {
        self.mapping.insert(field.to_owned(), directive.to_owned());
        self
    }

    #[must_use]
    pub fn with_rules(mut self, field: &str, rules: FieldRules) -> Self {
        self.specific_rules.insert(field.to_owned(), rules);
        self
    }

    #[must_use]
    pub fn directive_for(&self, field: &str) -> Option<&str> {
        self.mapping
            .get(field)
            .map(String::as_str)
            .filter(|d| !d.is_empty())
    }

    /// The rules for `field`: its specific override, or the shared default.
    #[must_use]
    pub fn rules_for(&self, field: &str) -> &FieldRules {
        self.specific_rules.get(field).unwrap_or(&self.field_rules)
    }
}
