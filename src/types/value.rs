use std::fmt;

use serde::{Deserialize, Serialize};

/// A single value in a [`UserConfiguration`](super::UserConfiguration).
///
/// Operator-supplied configurations and live dumps use whichever shape fits the
/// field: a switch (`"HSTS" = true`), a raw directive value
/// (`"Protocol" = "TLSv1.2 TLSv1.3"`), or an explicit list of enabled names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// A field that is either on or off as a whole.
    Flag(bool),
    /// A raw value; names are matched against its tokens.
    Text(String),
    /// The names enabled for this field.
    List(Vec<String>),
}

impl ConfigValue {
    /// Whether `name` is enabled by this value.
    ///
    /// Matching is ASCII case-insensitive. Text values are tokenized on
    /// whitespace, `:` and `,`, so `"!RC4:AES128"` enables `aes128` but not `rc4`.
    #[must_use]
    pub fn enables(&self, name: &str) -> bool {
        match self {
            ConfigValue::Flag(on) => *on,
            ConfigValue::Text(text) => tokens(text).any(|t| t.eq_ignore_ascii_case(name)),
            ConfigValue::List(items) => items.iter().any(|i| i.eq_ignore_ascii_case(name)),
        }
    }

    /// Whether the value carries no information at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            ConfigValue::Flag(_) => false,
            ConfigValue::Text(text) => text.trim().is_empty(),
            ConfigValue::List(items) => items.is_empty(),
        }
    }
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| c.is_whitespace() || c == ':' || c == ',')
        .filter(|t| !t.is_empty())
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Flag(on) => write!(f, "{on}"),
            ConfigValue::Text(text) => write!(f, "\"{text}\""),
            ConfigValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Flag(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Text(v.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Text(v)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(v: Vec<String>) -> Self {
        ConfigValue::List(v)
    }
}

impl From<Vec<&str>> for ConfigValue {
    fn from(v: Vec<&str>) -> Self {
        ConfigValue::List(v.into_iter().map(str::to_owned).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ConfigValue {
    fn from(v: [&str; N]) -> Self {
        ConfigValue::List(v.iter().map(|s| (*s).to_owned()).collect())
    }
}
