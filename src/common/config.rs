//! Compiler configuration

use std::env;

use super::error::{Error, Result};
use crate::codegen::defs::major_for_java_version;

/// Options for one compiler instance, javac's `-target`, `-g` and `-nowarn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Java release the generated class files target (`8` for Java 8)
    pub target_version: u8,
    /// Emit `SourceFile` and `LineNumberTable` attributes
    pub debug: bool,
    /// Report warnings as diagnostics
    pub warnings: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self { target_version: 8, debug: true, warnings: true }
    }
}

impl Config {
    pub fn with_target_java_version(mut self, version: u8) -> Self {
        self.target_version = version;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_warnings(mut self, warnings: bool) -> Self {
        self.warnings = warnings;
        self
    }

    /// Defaults overridden by `TOLC_TARGET` and `TOLC_DEBUG`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(target) = env::var("TOLC_TARGET") {
            let version = target.trim().trim_start_matches("1.").parse::<u8>().map_err(|_| {
                Error::configuration(format!("TOLC_TARGET is not a Java release: '{}'", target))
            })?;
            config = config.with_target_java_version(version);
        }
        if let Ok(debug) = env::var("TOLC_DEBUG") {
            config.debug = !matches!(debug.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.major_version().map(|_| ())
    }

    /// Class file major version for [`Self::target_version`]
    pub fn major_version(&self) -> Result<u16> {
        major_for_java_version(self.target_version)
            .ok_or_else(|| Error::configuration(format!("invalid target release: {}", self.target_version)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_and_major_version() {
        let config = Config::default().with_target_java_version(7).with_debug(false);
        assert_eq!(config.major_version().unwrap(), 51);
        assert!(!config.debug);
        assert!(config.warnings);
        assert!(Config::default().with_target_java_version(3).validate().is_err());
    }
}
