use std::fmt;

/// Errors produced when parsing a condition cell or a target document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    message: String,
    input: Option<String>,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            input: None,
        }
    }

    /// Attach the text that failed to parse.
    #[must_use]
    pub(crate) fn with_input(mut self, input: &str) -> Self {
        self.input = Some(input.to_owned());
        self
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The rejected text, when it is short enough to be worth reporting.
    #[must_use]
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error: {}", self.message)?;
        if let Some(input) = &self.input {
            write!(f, " (in `{input}`)")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}
