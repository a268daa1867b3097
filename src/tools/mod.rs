//! Compiler-facing contracts: file objects, file managers, diagnostics and
//! the pluggable compiler backend.

pub mod compiler;
pub mod diagnostic;
pub mod file_manager;
pub mod file_object;

pub use compiler::{JavaCompiler, Tolc};
pub use diagnostic::{Diagnostic, DiagnosticCollector, DiagnosticKind};
pub use file_manager::{ClassOutput, FileManager, StandardFileManager};
pub use file_object::{FileObject, MemoryClassFile, PathFileObject, SourceFile};

use std::fmt;

/// Places a file manager knows how to search or write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// The bootstrap `java.lang` / `java.io` classes
    PlatformClassPath,
    /// User class path
    ClassPath,
    SourcePath,
    /// Where compiled classes are written
    ClassOutput,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Location::PlatformClassPath => "PLATFORM_CLASS_PATH",
            Location::ClassPath => "CLASS_PATH",
            Location::SourcePath => "SOURCE_PATH",
            Location::ClassOutput => "CLASS_OUTPUT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Source,
    Class,
    Other,
}

impl Kind {
    pub fn extension(&self) -> &'static str {
        match self {
            Kind::Source => ".java",
            Kind::Class => ".class",
            Kind::Other => "",
        }
    }
}
