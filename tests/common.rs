// Common test utilities
#![allow(dead_code)]

use std::sync::Arc;

use tolc_synth::codegen::JType;
use tolc_synth::{CompilationSession, MethodMeta, NameAllocator, TypeMeta};

pub const GREETER: &str = r#"package demo;

public interface Greeter {
    String greet(String name);
}
"#;

pub const ENGLISH_GREETER: &str = r#"package demo;

public class EnglishGreeter {
    public String greet(String name) {
        return "Hello, " + name;
    }
}
"#;

/// Debug logging for the test binary; repeated calls are harmless
pub fn init_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

/// Metadata matching [`GREETER`]
pub fn greeter_contract() -> TypeMeta {
    TypeMeta::interface("demo.Greeter").method(MethodMeta::new("greet", JType::string()).param(JType::string()))
}

/// A session whose generated names live under `generated.<root>`
pub fn session_with_root(root: &str) -> CompilationSession {
    CompilationSession::builder().name_allocator(Arc::new(NameAllocator::with_root(root))).build()
}
