use thiserror::Error;

/// Errors caused by a schema that does not fit the data it describes.
///
/// Raised at load time; an invocation never proceeds with partial data after one.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("column '{column}' is missing from the schema of sheet '{sheet}'")]
    MissingColumn { sheet: String, column: String },

    #[error("name column index {index} is out of range for sheet '{sheet}' ({width} columns)")]
    NameColumnOutOfRange {
        sheet: String,
        index: usize,
        width: usize,
    },

    #[error("malformed target document: {message}")]
    MalformedDocument { message: String },

    #[error("target document has no top-level '{anchor}' block")]
    MissingAnchor { anchor: String },
}
