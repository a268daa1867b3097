use thiserror::Error;

use super::span::Location;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unexpected token encountered
    #[error("{expected} expected, found '{found}'")]
    UnexpectedToken { expected: String, found: String, location: Location },

    #[error("reached end of file while parsing")]
    UnexpectedEndOfInput { expected: String, location: Location },

    #[error("{message}")]
    InvalidSyntax { message: String, location: Location },

    #[error("{message}")]
    LexicalError { message: String, location: Location },
}

impl ParseError {
    pub fn unexpected_token(expected: &str, found: &str, location: Location) -> Self {
        ParseError::UnexpectedToken { expected: expected.to_string(), found: found.to_string(), location }
    }

    pub fn unexpected_end_of_input(expected: &str, location: Location) -> Self {
        ParseError::UnexpectedEndOfInput { expected: expected.to_string(), location }
    }

    pub fn invalid_syntax(message: impl Into<String>, location: Location) -> Self {
        ParseError::InvalidSyntax { message: message.into(), location }
    }

    pub fn lexical_error(message: impl Into<String>, location: Location) -> Self {
        ParseError::LexicalError { message: message.into(), location }
    }

    pub fn location(&self) -> Location {
        match self {
            ParseError::UnexpectedToken { location, .. }
            | ParseError::UnexpectedEndOfInput { location, .. }
            | ParseError::InvalidSyntax { location, .. }
            | ParseError::LexicalError { location, .. } => *location,
        }
    }
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
