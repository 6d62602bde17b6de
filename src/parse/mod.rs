mod error;
mod grammar;
mod nginx;
mod parser;

pub use error::ParseError;
pub use nginx::parse_document;
pub use parser::parse_optional;

use crate::types::ParsedCondition;

/// Parse a condition cell into a [`ParsedCondition`].
///
/// # Errors
///
/// Returns [`ParseError`] if the input is not a valid condition.
pub fn parse(input: &str) -> Result<ParsedCondition, ParseError> {
    use winnow::Parser;
    grammar::parse_condition
        .parse(input)
        .map_err(|e| ParseError::new(e.to_string()).with_input(input))
}
