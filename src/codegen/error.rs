use thiserror::Error;

/// Errors raised while reading or writing class file structures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFormatError {
    #[error("truncated class file: needed {needed} more byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("invalid constant pool index {0}")]
    BadConstantIndex(u16),

    #[error("unknown constant pool tag {tag} at index {index}")]
    BadConstantTag { tag: u8, index: u16 },

    #[error("invalid descriptor '{0}'")]
    BadDescriptor(String),

    #[error("malformed {what}: {message}")]
    Malformed { what: &'static str, message: String },
}

impl ClassFormatError {
    pub fn malformed(what: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed { what, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, ClassFormatError>;
