//! Semantic analysis between parsing and code generation
//!
//! Mirrors javac's phases in reduced form:
//!
//! - Enter: record declared classes, resolve imports and member signatures
//! - Check: class-level rules (duplicates, overriding, abstract methods)
//!
//! Attribution and flow analysis of method bodies happen while bytecode is
//! generated, see [`crate::codegen::gen`].

pub mod check;
pub mod enter;
pub mod symtab;

use std::cell::Cell;
use std::sync::Arc;

use crate::parser::{Location, Span};
use crate::tools::{Diagnostic, DiagnosticCollector, FileObject};

pub use enter::{EnteredClass, UnitEnv};
pub use symtab::{ClassSymbol, FieldSymbol, MethodSymbol, Symtab};

/// Reports diagnostics against source positions and counts errors
pub struct Log<'d> {
    diagnostics: &'d DiagnosticCollector,
    errors: Cell<usize>,
    warnings_enabled: bool,
}

impl<'d> Log<'d> {
    pub fn new(diagnostics: &'d DiagnosticCollector, warnings_enabled: bool) -> Self {
        Self { diagnostics, errors: Cell::new(0), warnings_enabled }
    }

    pub fn error(&self, file: &Arc<dyn FileObject>, span: Span, message: impl Into<String>) {
        self.error_at(file, span.start, message);
    }

    pub fn error_at(&self, file: &Arc<dyn FileObject>, location: Location, message: impl Into<String>) {
        self.errors.set(self.errors.get() + 1);
        self.diagnostics.report(Diagnostic::error(
            Some(file.clone()),
            Some(location.line),
            Some(location.column),
            message,
        ));
    }

    pub fn warning(&self, file: &Arc<dyn FileObject>, span: Span, message: impl Into<String>) {
        if self.warnings_enabled {
            self.diagnostics.report(Diagnostic::warning(
                Some(file.clone()),
                Some(span.start.line),
                Some(span.start.column),
                message,
            ));
        }
    }

    /// Error not tied to a source position
    pub fn error_without_position(&self, message: impl Into<String>) {
        self.errors.set(self.errors.get() + 1);
        self.diagnostics.report(Diagnostic::error(None, None, None, message));
    }

    pub fn error_count(&self) -> usize {
        self.errors.get()
    }
}
