mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use tolc_synth::common::ClassPath;
use tolc_synth::tools::{DiagnosticCollector, FileObject, JavaCompiler, SourceFile, StandardFileManager, Tolc};
use tolc_synth::{CompilationSession, HostClassLoader};

const TOOL: &str = "package lib;\n\npublic class Tool {\n    public int size() {\n        return 7;\n    }\n}\n";

const USER: &str = r#"package app;

import lib.Tool;

public class User {
    public static int run() {
        Tool tool = new Tool();
        return tool.size() * 6;
    }
}
"#;

/// Bytes of `lib.Tool`, compiled by a separate session
fn tool_bytes() -> Arc<[u8]> {
    let session = CompilationSession::new();
    session.add_source("lib.Tool", TOOL).unwrap();
    session.compile().unwrap();
    session.registry().get("lib.Tool").unwrap()
}

#[test]
fn test_scanner_finds_classes_the_class_path_cannot_list() {
    common::init_logging();
    let host = HostClassLoader::new(ClassPath::new());
    host.define_resource("lib.Tool", tool_bytes());
    assert!(host.class_path().list_classes("lib", false).unwrap().is_empty());

    let session = CompilationSession::builder().host_loader(host.clone()).build();
    let user = session.add_source("app.User", USER).unwrap();
    let classes = session.compile().unwrap();

    let class = &classes[&user];
    assert_eq!(class.invoke_static("run", &[]).unwrap().as_int(), Some(42));
    let tool = session.class_loader().load_class("lib.Tool").unwrap();
    assert_eq!(tool.loader().name(), "host");
    assert!(!session.registry().contains("lib.Tool"));
}

#[test]
fn test_without_a_scanner_unlisted_classes_are_invisible() {
    let host = HostClassLoader::new(ClassPath::new());
    host.define_resource("lib.Tool", tool_bytes());

    let session = CompilationSession::builder().parent_loader(host).build();
    session.add_source("app.User", USER).unwrap();
    let error = session.compile().unwrap_err();
    assert!(error.is_compile());
    assert!(error.to_string().contains("package lib does not exist"));
}

#[test]
fn test_custom_scanner_closure() {
    let host = HostClassLoader::new(ClassPath::new());
    host.define_resource("lib.Tool", tool_bytes());

    let session = CompilationSession::builder()
        .parent_loader(host)
        .scanner(|package: &str| -> BTreeSet<String> {
            if package == "lib" {
                ["lib.Tool".to_string()].into_iter().collect()
            } else {
                BTreeSet::new()
            }
        })
        .build();
    let user = session.add_source("app.User", USER).unwrap();
    assert_eq!(user.compile().unwrap().invoke_static("run", &[]).unwrap().as_int(), Some(42));
}

#[test]
fn test_directory_class_path_is_listed_directly() {
    let dir = tempfile::tempdir().unwrap();
    let compiler = Tolc::default();
    let file_manager = StandardFileManager::new(ClassPath::new()).with_output_dir(dir.path());
    let diagnostics = DiagnosticCollector::new();
    let units: Vec<Arc<dyn FileObject>> = vec![Arc::new(SourceFile::new("lib.Tool", TOOL))];
    assert!(compiler.compile(&units, &file_manager, &diagnostics), "{:?}", diagnostics.diagnostics());
    assert!(dir.path().join("lib/Tool.class").exists());

    let session = CompilationSession::builder().class_path(ClassPath::new().with_directory(dir.path())).build();
    let user = session.add_source("app.User", USER).unwrap();
    let class = user.compile().unwrap();
    assert_eq!(class.invoke_static("run", &[]).unwrap().as_int(), Some(42));
    assert_eq!(session.registry().names().into_iter().collect::<Vec<_>>(), vec!["app.User".to_string()]);
}
