use crate::types::ParsedCondition;

/// Parse a condition cell that may be empty.
///
/// Empty and whitespace-only cells mean "no condition" and yield `Ok(None)`.
///
/// # Errors
///
/// Returns [`ParseError`](super::ParseError) if a non-empty cell is not a
/// valid condition.
pub fn parse_optional(input: &str) -> Result<Option<ParsedCondition>, super::ParseError> {
    if input.trim().is_empty() {
        return Ok(None);
    }
    super::parse(input).map(Some)
}
