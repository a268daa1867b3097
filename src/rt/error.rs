use std::io;

use thiserror::Error;

use crate::codegen::error::ClassFormatError;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("bad class file for {class}: {source}")]
    ClassFormat {
        class: String,
        #[source]
        source: ClassFormatError,
    },

    #[error("cannot read {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("linkage error: {0}")]
    Linkage(String),

    #[error("no such method: {class}.{name}{descriptor}")]
    NoSuchMethod { class: String, name: String, descriptor: String },

    #[error("no such field: {class}.{name}")]
    NoSuchField { class: String, name: String },

    /// A Java exception escaped the outermost call
    #[error("{}{}", .class_name, message_suffix(.message))]
    Exception { class_name: String, message: Option<String> },

    #[error("java.lang.StackOverflowError: call depth exceeded {0}")]
    StackOverflow(usize),

    #[error("instruction budget of {0} steps exhausted")]
    StepLimit(u64),

    #[error("verify error in {method}: {message}")]
    Verify { method: String, message: String },

    #[error("illegal argument: {0}")]
    IllegalArgument(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default()
}

impl RuntimeError {
    pub fn exception(class_name: &str, message: impl Into<String>) -> Self {
        Self::Exception { class_name: class_name.to_string(), message: Some(message.into()) }
    }

    pub fn null_pointer(what: impl Into<String>) -> Self {
        Self::exception("java.lang.NullPointerException", what)
    }

    pub fn verify(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Verify { method: method.into(), message: message.into() }
    }

    /// Class name of a thrown Java exception
    pub fn exception_class(&self) -> Option<&str> {
        match self {
            Self::Exception { class_name, .. } => Some(class_name),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
