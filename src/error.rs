use std::path::PathBuf;

use thiserror::Error;

use crate::parse::ParseError;
use crate::source::SourceError;
use crate::types::SchemaError;

/// Unified error type for engine runs, configuration loading, and synthesis.
///
/// Only configuration and schema problems abort a run. Evaluation ambiguities
/// such as unknown levels or unparsable conditions are defaulted and logged.
#[derive(Debug, Error)]
pub enum ComplyError {
    /// A worker was invoked without any user configuration to check.
    #[error("no user configuration supplied")]
    MissingConfiguration,

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("template file not found: {}", path.display())]
    TemplateNotFound { path: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        assert_eq!(
            ComplyError::MissingConfiguration.to_string(),
            "no user configuration supplied"
        );
        let err = ComplyError::TemplateNotFound {
            path: PathBuf::from("/tmp/missing.conf"),
        };
        assert_eq!(err.to_string(), "template file not found: /tmp/missing.conf");
    }

    #[test]
    fn schema_errors_convert() {
        let err: ComplyError = SchemaError::MissingAnchor {
            anchor: "http".into(),
        }
        .into();
        assert!(matches!(err, ComplyError::Schema(_)));
    }
}
