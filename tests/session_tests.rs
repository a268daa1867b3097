mod common;

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use common::{session_with_root, ENGLISH_GREETER, GREETER};
use tolc_synth::common::ClassPath;
use tolc_synth::rt::{ClassLoader, RuntimeError};
use tolc_synth::tools::{
    ClassOutput, Diagnostic, DiagnosticCollector, FileManager, FileObject, JavaCompiler, Kind, Location, StandardFileManager,
    Tolc,
};
use tolc_synth::{CompilationSession, Error, Value};

const BROKEN: &str = r#"package demo;

public class Broken {
    public int value() {
        return "text";
    }
}
"#;

#[test]
fn test_compile_errors_carry_position_and_source() {
    common::init_logging();
    let session = CompilationSession::new();
    session.add_source("demo.Greeter", GREETER).unwrap();
    session.add_source("demo.Broken", BROKEN).unwrap();

    let error = session.compile().unwrap_err();
    match &error {
        Error::Compile { count, report, diagnostics } => {
            assert_eq!(*count, 1);
            assert_eq!(diagnostics[0].line, Some(5));
            assert!(report.contains("demo/Broken.java:5: incompatible types: String cannot be converted to int"));
            assert!(report.contains("   5 |         return \"text\";"));
            assert!(report.contains("   3 | public class Broken {"));
        }
        other => panic!("expected a compile error, got {:?}", other),
    }
    assert!(session.registry().is_empty());
    assert!(matches!(session.class_loader().load_class("demo.Greeter"), Err(RuntimeError::ClassNotFound(_))));
}

#[test]
fn test_syntax_error_next_to_a_valid_unit() {
    let session = CompilationSession::new();
    let valid = session.add_source("demo.Greeter", GREETER).unwrap();
    session
        .add_source("demo.Typo", "package demo;\n\npublic class Typo {\n    public int value() {\n        return 1\n    }\n}\n")
        .unwrap();

    let error = session.compile().unwrap_err();
    match &error {
        Error::Compile { count, report, diagnostics } => {
            assert_eq!(*count, 1);
            assert_eq!(diagnostics[0].line, Some(5));
            assert!(report.contains("demo/Typo.java:5: ';' expected, found '}'"), "{}", report);
            assert!(report.contains("   5 |         return 1"));
            assert!(report.contains("   7 | }"));
        }
        other => panic!("expected a compile error, got {:?}", other),
    }
    assert!(session.registry().is_empty());
    assert!(session.class_loader().load_class(valid.class_name()).is_err());
}

#[test]
fn test_oversized_string_constant_is_a_compile_error() {
    let session = CompilationSession::new();
    let source = format!(
        "package demo;\n\npublic class Big {{\n    public static String text() {{\n        return \"{}\";\n    }}\n}}\n",
        "x".repeat(70_000)
    );
    session.add_source("demo.Big", source).unwrap();

    let error = session.compile().unwrap_err();
    assert!(error.is_compile(), "{:?}", error);
    assert_eq!(error.diagnostics()[0].message, "constant string too long");
    assert_eq!(error.diagnostics()[0].line, Some(5));
    assert!(session.registry().is_empty());
}

#[test]
fn test_every_error_in_the_batch_is_reported() {
    let session = CompilationSession::new();
    session.add_source("demo.Broken", BROKEN).unwrap();
    session
        .add_source("demo.Other", "package demo;\n\npublic class Other {\n    public void run() {\n        missing();\n    }\n}\n")
        .unwrap();

    let error = session.compile().unwrap_err();
    let sources: Vec<String> = error.diagnostics().iter().filter_map(|d| d.source_name()).collect();
    assert_eq!(error.diagnostics().len(), 2);
    assert!(sources.contains(&"demo/Broken.java".to_string()));
    assert!(sources.contains(&"demo/Other.java".to_string()));
    assert!(error.to_string().starts_with("compilation failed with 2 error(s):"));
}

#[test]
fn test_unit_compile_returns_its_own_class() {
    let session = CompilationSession::new();
    session.add_source("demo.Greeter", GREETER).unwrap();
    let english = session.add_source("demo.EnglishGreeter", ENGLISH_GREETER).unwrap();

    let class = english.compile().unwrap();
    assert_eq!(class.name(), "demo.EnglishGreeter");
    assert_eq!(class.loader().name(), "in-memory");
    let instance = class.new_instance(&[]).unwrap();
    let greeting = instance.invoke("greet", &[Value::string("unit").unwrap()]).unwrap();
    assert_eq!(greeting.as_str(), Some("Hello, unit"));
}

#[test]
fn test_sessions_do_not_share_compiled_classes() {
    let source = |value: i32| format!("package demo;\n\npublic class Same {{\n    public static int value() {{\n        return {};\n    }}\n}}\n", value);
    let first = session_with_root("iso");
    let second = session_with_root("iso");
    let one = first.add_source("demo.Same", source(1)).unwrap();
    let two = second.add_source("demo.Same", source(2)).unwrap();

    let from_first = first.compile().unwrap().remove(&one).unwrap();
    let from_second = second.compile().unwrap().remove(&two).unwrap();
    assert!(!Arc::ptr_eq(&from_first, &from_second));
    assert_eq!(from_first.invoke_static("value", &[]).unwrap().as_int(), Some(1));
    assert_eq!(from_second.invoke_static("value", &[]).unwrap().as_int(), Some(2));
}

#[test]
fn test_concurrent_sessions() {
    let results: Vec<i32> = thread::scope(|scope| {
        let workers: Vec<_> = (0..8)
            .map(|i| {
                scope.spawn(move || {
                    let session = CompilationSession::new();
                    let source = format!(
                        "package demo;\n\npublic class Worker {{\n    public static int id() {{\n        return {};\n    }}\n}}\n",
                        i
                    );
                    let unit = session.add_source("demo.Worker", source).unwrap();
                    let class = session.compile().unwrap().remove(&unit).unwrap();
                    class.invoke_static("id", &[]).unwrap().as_int().unwrap()
                })
            })
            .collect();
        workers.into_iter().map(|worker| worker.join().unwrap()).collect()
    });
    assert_eq!(results, (0..8).collect::<Vec<_>>());
}

/// Compiler double that reports success and does whatever `emit` says
struct ScriptedCompiler<F> {
    emit: F,
}

impl<F> JavaCompiler for ScriptedCompiler<F>
where
    F: Fn(&[Arc<dyn FileObject>], &dyn FileManager, &DiagnosticCollector) -> bool + Send + Sync,
{
    fn standard_file_manager(&self) -> Box<dyn FileManager> {
        Box::new(StandardFileManager::new(ClassPath::new()))
    }

    fn compile(&self, units: &[Arc<dyn FileObject>], file_manager: &dyn FileManager, diagnostics: &DiagnosticCollector) -> bool {
        (self.emit)(units, file_manager, diagnostics)
    }
}

fn scripted<F>(emit: F) -> CompilationSession
where
    F: Fn(&[Arc<dyn FileObject>], &dyn FileManager, &DiagnosticCollector) -> bool + Send + Sync + 'static,
{
    CompilationSession::builder().compiler(Arc::new(ScriptedCompiler { emit })).build()
}

#[test]
fn test_missing_output_is_a_resolution_error() {
    let session = scripted(|_, _, _| true);
    session.add_source("demo.Ghost", "package demo; public class Ghost { }").unwrap();
    match session.compile().unwrap_err() {
        Error::Resolution { class_name, source } => {
            assert_eq!(class_name, "demo.Ghost");
            assert!(matches!(source, RuntimeError::ClassNotFound(_)));
        }
        other => panic!("expected a resolution error, got {:?}", other),
    }
}

#[test]
fn test_corrupt_output_is_a_resolution_error() {
    let session = scripted(|units, file_manager, _| {
        for unit in units {
            let name = unit.binary_name().unwrap();
            let mut out = file_manager.output_for_class(Location::ClassOutput, &name, Kind::Class, Some(unit.as_ref())).unwrap();
            out.write_all(&[0xCA, 0xFE]).unwrap();
            out.close().unwrap();
        }
        true
    });
    session.add_source("demo.Torn", "package demo; public class Torn { }").unwrap();
    let error = session.compile().unwrap_err();
    assert!(matches!(error, Error::Resolution { source: RuntimeError::ClassFormat { .. }, .. }));
    assert!(session.registry().contains("demo.Torn"));
}

#[test]
fn test_error_diagnostic_fails_even_when_compiler_reports_success() {
    let session = scripted(|units, _, diagnostics| {
        diagnostics.report(Diagnostic::error(Some(units[0].clone()), Some(1), Some(1), "boom"));
        true
    });
    session.add_source("demo.Loud", "package demo; public class Loud { }").unwrap();
    let error = session.compile().unwrap_err();
    assert!(error.is_compile());
    assert!(error.to_string().contains("demo/Loud.java:1: boom"));
}

#[test]
fn test_failure_without_diagnostics() {
    let session = scripted(|_, _, _| false);
    session.add_source("demo.Quiet", "package demo; public class Quiet { }").unwrap();
    let error = session.compile().unwrap_err();
    assert!(matches!(error, Error::Compile { count: 0, .. }));
    assert!(error.to_string().contains("the compiler reported failure without diagnostics"));
}

/// Standard file manager whose `close` fails, counting the attempts
#[derive(Debug)]
struct FailingClose {
    inner: StandardFileManager,
    closes: Arc<AtomicUsize>,
}

impl FileManager for FailingClose {
    fn list(&self, location: Location, package: &str, kinds: &[Kind], recurse: bool) -> io::Result<Vec<Arc<dyn FileObject>>> {
        self.inner.list(location, package, kinds, recurse)
    }

    fn infer_binary_name(&self, location: Location, file: &dyn FileObject) -> Option<String> {
        self.inner.infer_binary_name(location, file)
    }

    fn output_for_class(
        &self,
        location: Location,
        class_name: &str,
        kind: Kind,
        sibling: Option<&dyn FileObject>,
    ) -> io::Result<Box<dyn ClassOutput>> {
        self.inner.output_for_class(location, class_name, kind, sibling)
    }

    fn class_loader(&self, location: Location) -> Option<Arc<dyn ClassLoader>> {
        self.inner.class_loader(location)
    }

    fn has_location(&self, location: Location) -> bool {
        self.inner.has_location(location)
    }

    fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Err(io::Error::new(io::ErrorKind::Other, "handle already gone"))
    }
}

struct ReleaseFails {
    tolc: Tolc,
    closes: Arc<AtomicUsize>,
}

impl JavaCompiler for ReleaseFails {
    fn standard_file_manager(&self) -> Box<dyn FileManager> {
        Box::new(FailingClose { inner: StandardFileManager::new(ClassPath::new()), closes: self.closes.clone() })
    }

    fn compile(&self, units: &[Arc<dyn FileObject>], file_manager: &dyn FileManager, diagnostics: &DiagnosticCollector) -> bool {
        self.tolc.compile(units, file_manager, diagnostics)
    }
}

#[test]
fn test_release_failure_is_reported() {
    let closes = Arc::new(AtomicUsize::new(0));
    let session = CompilationSession::builder()
        .compiler(Arc::new(ReleaseFails { tolc: Tolc::default(), closes: closes.clone() }))
        .build();
    session.add_source("demo.Fine", "package demo; public class Fine { }").unwrap();

    match session.compile().unwrap_err() {
        Error::ResourceRelease { source, masked } => {
            assert_eq!(source.to_string(), "handle already gone");
            assert!(masked.is_none());
        }
        other => panic!("expected a release error, got {:?}", other),
    }
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_release_failure_keeps_the_compile_error() {
    let closes = Arc::new(AtomicUsize::new(0));
    let session = CompilationSession::builder()
        .compiler(Arc::new(ReleaseFails { tolc: Tolc::default(), closes: closes.clone() }))
        .build();
    session.add_source("demo.Broken", BROKEN).unwrap();

    let error = session.compile().unwrap_err();
    match &error {
        Error::ResourceRelease { masked: Some(masked), .. } => assert!(masked.is_compile()),
        other => panic!("expected a release error masking a compile error, got {:?}", other),
    }
    assert!(error.to_string().contains("while handling: compilation failed with 1 error(s)"));
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
