mod common;

use std::fs;
use std::sync::Arc;

use common::{ENGLISH_GREETER, GREETER};
use tolc_synth::codegen::read_class_file;
use tolc_synth::common::{ClassPath, Config};
use tolc_synth::rt::ClassLoader;
use tolc_synth::tools::{DiagnosticCollector, FileObject, JavaCompiler, SourceFile, StandardFileManager, Tolc};
use tolc_synth::{compile, HostClassLoader, Value};

fn units(sources: &[(&str, &str)]) -> Vec<Arc<dyn FileObject>> {
    sources
        .iter()
        .map(|(name, text)| Arc::new(SourceFile::new(*name, *text)) as Arc<dyn FileObject>)
        .collect()
}

#[test]
fn test_class_files_written_to_output_directory() {
    common::init_logging();
    let dir = tempfile::tempdir().unwrap();
    let compiler = Tolc::new(Config::default().with_target_java_version(7));
    let file_manager = StandardFileManager::new(ClassPath::new()).with_output_dir(dir.path());
    let diagnostics = DiagnosticCollector::new();

    let ok = compiler.compile(
        &units(&[("demo.Greeter", GREETER), ("demo.EnglishGreeter", ENGLISH_GREETER)]),
        &file_manager,
        &diagnostics,
    );
    assert!(ok, "{:?}", diagnostics.diagnostics());

    let bytes = fs::read(dir.path().join("demo/EnglishGreeter.class")).unwrap();
    assert_eq!(&bytes[0..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
    let file = read_class_file(&bytes).unwrap();
    assert_eq!(file.major_version, 51);
    assert_eq!(file.class_name().unwrap(), "demo.EnglishGreeter");
    assert_eq!(file.source_file().unwrap().as_deref(), Some("EnglishGreeter.java"));

    let host = HostClassLoader::new(ClassPath::new().with_directory(dir.path()));
    let greeter = host.load_class("demo.EnglishGreeter").unwrap().new_instance(&[]).unwrap();
    let greeting = greeter.invoke("greet", &[Value::string("disk").unwrap()]).unwrap();
    assert_eq!(greeting.as_str(), Some("Hello, disk"));
}

#[test]
fn test_debug_off_omits_source_file() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Tolc::new(Config::default().with_debug(false));
    let file_manager = StandardFileManager::new(ClassPath::new()).with_output_dir(dir.path());
    let diagnostics = DiagnosticCollector::new();
    assert!(compiler.compile(&units(&[("demo.Greeter", GREETER)]), &file_manager, &diagnostics));

    let file = read_class_file(&fs::read(dir.path().join("demo/Greeter.class")).unwrap()).unwrap();
    assert_eq!(file.source_file().unwrap(), None);
}

#[test]
fn test_nothing_is_written_when_any_unit_fails() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Tolc::default();
    let file_manager = StandardFileManager::new(ClassPath::new()).with_output_dir(dir.path());
    let diagnostics = DiagnosticCollector::new();

    let ok = compiler.compile(
        &units(&[
            ("demo.Greeter", GREETER),
            ("demo.Rude", "package demo;\n\npublic class Rude implements Greeter {\n}\n"),
        ]),
        &file_manager,
        &diagnostics,
    );
    assert!(!ok);
    let errors = diagnostics.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].line, Some(3));
    assert!(errors[0].message.contains("Rude is not abstract and does not override abstract method greet(String) in Greeter"));
    assert!(!dir.path().join("demo").exists());
}

#[test]
fn test_warnings_can_be_disabled() {
    let source = "package demo;\n\nimport java.io.IOException;\n\npublic class Quiet {\n}\n";
    for (warnings, expected) in [(true, 1), (false, 0)] {
        let dir = tempfile::tempdir().unwrap();
        let compiler = Tolc::new(Config::default().with_warnings(warnings));
        let file_manager = StandardFileManager::new(ClassPath::new()).with_output_dir(dir.path());
        let diagnostics = DiagnosticCollector::new();
        assert!(compiler.compile(&units(&[("demo.Quiet", source)]), &file_manager, &diagnostics));
        assert_eq!(diagnostics.diagnostics().len(), expected);
    }
}

#[test]
fn test_compile_helper_runs_the_whole_pipeline() {
    let classes = compile(
        &[
            (
                "demo.Shapes",
                r#"package demo;

public class Shapes {
    public static int area(int width, int height) {
        int area = width * height;
        if (area < 0) {
            throw new IllegalArgumentException("negative area");
        }
        return area;
    }

    public static boolean square(int width, int height) {
        return width == height && width > 0;
    }
}
"#,
            ),
        ],
        &Config::default(),
    )
    .unwrap();

    let shapes = &classes["demo.Shapes"];
    assert_eq!(shapes.invoke_static("area", &[Value::Int(6), Value::Int(7)]).unwrap().as_int(), Some(42));
    assert_eq!(shapes.invoke_static("square", &[Value::Int(3), Value::Int(3)]).unwrap().as_bool(), Some(true));
    let error = shapes.invoke_static("area", &[Value::Int(-1), Value::Int(2)]).unwrap_err();
    assert_eq!(error.exception_class(), Some("java.lang.IllegalArgumentException"));
}

#[test]
fn test_methods_with_hundreds_of_locals() {
    let mut body = String::new();
    for i in 0..300 {
        body.push_str(&format!("        int v{} = {};\n", i, i));
    }
    let source = format!(
        "package demo;\n\npublic class Locals {{\n    public static int spread(int base) {{\n{}        return base + v299 - v1;\n    }}\n}}\n",
        body
    );
    let classes = compile(&[("demo.Locals", source.as_str())], &Config::default()).unwrap();
    let spread = classes["demo.Locals"].invoke_static("spread", &[Value::Int(2)]).unwrap();
    assert_eq!(spread.as_int(), Some(300));
}

#[test]
fn test_jump_past_the_branch_range_is_reported() {
    let mut body = String::new();
    for _ in 0..9_000 {
        body.push_str("            x = x + 1;\n");
    }
    let source = format!(
        "package demo;\n\npublic class Grower {{\n    public static int grow(boolean flag) {{\n        int x = 0;\n        if (flag) {{\n{}        }}\n        return x;\n    }}\n}}\n",
        body
    );
    let error = compile(&[("demo.Grower", source.as_str())], &Config::default()).unwrap_err();
    assert!(error.is_compile());
    assert_eq!(error.diagnostics().len(), 1);
    assert!(error.diagnostics()[0].message.starts_with("code too large"), "{}", error.diagnostics()[0].message);
    assert_eq!(error.diagnostics()[0].line, Some(4));
}
