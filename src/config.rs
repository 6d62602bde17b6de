use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::synth::SynthesisConfig;
use crate::types::{LevelPolicy, SheetColumns};
use crate::ComplyError;

/// Static engine configuration, usually read from TOML.
///
/// ```toml
/// force_valid_on_guidance = true
///
/// [[levels]]
/// name = "must"
/// action = "enable"
/// mandatory = true
///
/// [sheet_columns.KeyLengths]
/// columns = ["name", "level", "length", "condition", "guidelineName"]
/// name_columns = [0, 2]
///
/// [synthesis]
/// anchor = "http"
/// mapping = { CipherSuite = "ssl_ciphers" }
/// ```
///
/// Every table is optional; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Level vocabulary, highest precedence first.
    pub levels: LevelPolicy,
    /// Treat a condition that reports an alternative or extra notes as valid,
    /// so its guidance is never suppressed.
    pub force_valid_on_guidance: bool,
    pub sheet_columns: SheetColumns,
    pub synthesis: SynthesisConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            levels: LevelPolicy::default(),
            force_valid_on_guidance: true,
            sheet_columns: SheetColumns::default(),
            synthesis: SynthesisConfig::default(),
        }
    }
}

impl EngineConfig {
    /// # Errors
    ///
    /// Returns [`toml::de::Error`] on malformed input or unknown level actions.
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    /// # Errors
    ///
    /// Returns [`ComplyError`] on I/O or parse failure.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ComplyError> {
        let input = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&input)?)
    }
}
