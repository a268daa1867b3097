use std::io;

use thiserror::Error;

use crate::rt::RuntimeError;
use crate::tools::Diagnostic;

/// Result type for session and synthesis operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Unusable input detected before compilation; never retried
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// The batch produced error diagnostics; nothing from it was loaded
    #[error("compilation failed with {count} error(s):\n{report}")]
    Compile {
        count: usize,
        report: String,
        diagnostics: Vec<Diagnostic>,
    },

    /// Compilation succeeded but a produced class could not be loaded
    #[error("compiled class {class_name} could not be resolved: {source}")]
    Resolution {
        class_name: String,
        #[source]
        source: RuntimeError,
    },

    /// The file manager failed to close; `masked` is the error that was
    /// already propagating when the release failed
    #[error("failed to release compilation resources: {source}{}", masked_suffix(.masked))]
    ResourceRelease {
        #[source]
        source: io::Error,
        masked: Option<Box<Error>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn masked_suffix(masked: &Option<Box<Error>>) -> String {
    masked.as_ref().map(|error| format!(" (while handling: {})", error)).unwrap_or_default()
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    pub fn is_compile(&self) -> bool {
        matches!(self, Error::Compile { .. })
    }

    /// Error diagnostics of a compile failure; empty for other kinds
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::Compile { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_error_mentions_masked_error() {
        let masked = Error::configuration("no contracts");
        let error = Error::ResourceRelease {
            source: io::Error::new(io::ErrorKind::Other, "close failed"),
            masked: Some(Box::new(masked)),
        };
        let text = error.to_string();
        assert!(text.contains("close failed"));
        assert!(text.contains("configuration error: no contracts"));
    }
}
