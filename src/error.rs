//! Error types for quarry.

use thiserror::Error;

/// The main error type for quarry operations.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed expression syntax.
    #[error("Parse error at position {position} near '{token}': {message}")]
    Parse {
        position: usize,
        token: String,
        message: String,
    },

    /// A placeholder referenced a positional value that was not supplied.
    #[error("Placeholder needs argument #{index} but only {supplied} supplied")]
    ArgumentCount { index: usize, supplied: usize },

    /// An operator outside the supported set.
    #[error("Unsupported operator: '{0}'")]
    UnsupportedOperator(String),

    /// A join or extra source lives on another backend.
    #[error("Incompatible source '{other}': it does not share the backend of '{owner}'")]
    IncompatibleSource { owner: String, other: String },

    /// Placeholder code that names no known type.
    #[error("Unknown placeholder type: '%{0}'")]
    UnknownType(String),

    /// Value that cannot be represented by the requested type.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Statement shape the target cannot express.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Statement execution failed in the backend.
    #[error("Query error: {0}")]
    Query(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            token: token.into(),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }
}

/// Result type alias for quarry operations.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QueryError::parse(5, ")", "unbalanced parenthesis");
        assert_eq!(
            err.to_string(),
            "Parse error at position 5 near ')': unbalanced parenthesis"
        );
    }

    #[test]
    fn test_argument_count_display() {
        let err = QueryError::ArgumentCount { index: 2, supplied: 2 };
        assert_eq!(
            err.to_string(),
            "Placeholder needs argument #2 but only 2 supplied"
        );
    }
}
