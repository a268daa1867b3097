//! Shared configuration, error and class path definitions

pub mod classpath;
pub mod config;
pub mod error;

pub use classpath::{ClassPath, ClasspathResolver};
pub use config::Config;
pub use error::{Error, Result};
