//! Compiler diagnostics and the collector that receives them

use std::fmt;
use std::sync::{Arc, Mutex};

use super::file_object::FileObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    Error,
    Warning,
    MandatoryWarning,
    Note,
    Other,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning | DiagnosticKind::MandatoryWarning => "warning",
            DiagnosticKind::Note => "note",
            DiagnosticKind::Other => "info",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub source: Option<Arc<dyn FileObject>>,
    /// 1-based line, when the diagnostic has a position
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub message: String,
}

impl Diagnostic {
    pub fn error(source: Option<Arc<dyn FileObject>>, line: Option<usize>, column: Option<usize>, message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::Error, source, line, column, message: message.into() }
    }

    pub fn warning(source: Option<Arc<dyn FileObject>>, line: Option<usize>, column: Option<usize>, message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::Warning, source, line, column, message: message.into() }
    }

    pub fn note(message: impl Into<String>) -> Self {
        Self { kind: DiagnosticKind::Note, source: None, line: None, column: None, message: message.into() }
    }

    pub fn is_error(&self) -> bool {
        self.kind == DiagnosticKind::Error
    }

    pub fn source_name(&self) -> Option<String> {
        self.source.as_ref().map(|source| source.name())
    }
}

impl fmt::Display for Diagnostic {
    /// javac layout: `demo/Greeter.java:3: error: ';' expected`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{}:", source.name())?;
            if let Some(line) = self.line {
                write!(f, "{}:", line)?;
            }
            f.write_str(" ")?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Thread-safe sink the compiler reports into
#[derive(Debug, Default)]
pub struct DiagnosticCollector {
    diagnostics: Mutex<Vec<Diagnostic>>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        log::debug!("{}", diagnostic);
        match self.diagnostics.lock() {
            Ok(mut diagnostics) => diagnostics.push(diagnostic),
            Err(poisoned) => poisoned.into_inner().push(diagnostic),
        }
    }

    /// Snapshot in report order
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self.diagnostics.lock() {
            Ok(diagnostics) => diagnostics.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn errors(&self) -> Vec<Diagnostic> {
        self.diagnostics().into_iter().filter(Diagnostic::is_error).collect()
    }

    pub fn error_count(&self) -> usize {
        self.errors().len()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SourceFile;

    #[test]
    fn test_display_matches_javac_layout() {
        let source: Arc<dyn FileObject> = Arc::new(SourceFile::new("demo.A", "class A {}"));
        let diagnostic = Diagnostic::error(Some(source), Some(3), Some(5), "';' expected");
        assert_eq!(diagnostic.to_string(), "demo/A.java:3: error: ';' expected");
        assert_eq!(Diagnostic::note("done").to_string(), "note: done");
    }

    #[test]
    fn test_collector_counts_errors_only() {
        let collector = DiagnosticCollector::new();
        collector.report(Diagnostic::warning(None, None, None, "unused"));
        assert!(!collector.has_errors());
        collector.report(Diagnostic::error(None, Some(1), None, "boom"));
        assert_eq!(collector.error_count(), 1);
        assert_eq!(collector.diagnostics().len(), 2);
    }
}
