use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ConfigValue;

/// The configuration under evaluation, keyed by field (sheet) name.
///
/// Either supplied by the operator or produced from a live configuration dump.
/// Field names are matched exactly; names inside a field are matched
/// case-insensitively (see [`ConfigValue::enables`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserConfiguration {
    fields: BTreeMap<String, ConfigValue>,
}

impl UserConfiguration {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field's value, replacing any previous one.
    #[must_use]
    pub fn set(mut self, field: &str, value: impl Into<ConfigValue>) -> Self {
        self.insert(field, value.into());
        self
    }

    /// Set a field's value (mutable reference version).
    pub fn insert(&mut self, field: &str, value: ConfigValue) {
        self.fields.insert(field.to_owned(), value);
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&ConfigValue> {
        self.fields.get(field)
    }

    /// Whether `name` is enabled in `field`. A missing field enables nothing.
    #[must_use]
    pub fn is_enabled(&self, field: &str, name: &str) -> bool {
        self.fields.get(field).is_some_and(|v| v.enables(name))
    }

    /// Whether the configuration has no fields. A field holding `""` or `[]`
    /// still counts: it states that nothing is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Parse a JSON object of `field -> bool | string | [string]`.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] on malformed input.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Parse a TOML table of `field -> bool | string | [string]`.
    ///
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] on malformed input.
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// Read a configuration dump, choosing the format from the file extension
    /// (`.json`, anything else is read as TOML).
    ///
    /// # Errors
    ///
    /// Returns [`ComplyError`](crate::ComplyError) on I/O or parse failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, crate::ComplyError> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|ext| ext == "json") {
            Ok(Self::from_json(&input)?)
        } else {
            Ok(Self::from_toml(&input)?)
        }
    }
}
