//! Runtime adapter synthesis and in-process compilation (tolc-synth)
//!
//! Generates Java source for wrapper classes that implement a set of
//! interfaces by delegating to another object, compiles that source in
//! process and hands back loaded classes.
//!
//! ## Architecture
//!
//! - **synth**: unique class names and wrapper source generation
//! - **session**: compilation sessions, the classpath bridge and the
//!   in-memory class loader
//! - **tools**: compiler-facing contracts (file objects, file managers,
//!   diagnostics) and the built-in [`Tolc`](tools::Tolc) backend
//! - **parser** / **ast** / **wash** / **codegen**: the Java subset compiler
//! - **rt**: class loaders, linked classes and a bytecode interpreter
//!
//! ## Compilation Flow
//!
//! ```text
//! WrapperSpec → synth → source ─┐
//!                               ├→ CompilationSession → Tolc → ClasspathBridge → registry
//! hand-written source ──────────┘                                                  ↓
//!                                                    InMemoryClassLoader → Arc<Class>
//! ```

pub mod ast;
pub mod codegen;
pub mod common;
pub mod consts;
pub mod parser;
pub mod rt;
pub mod session;
pub mod synth;
pub mod tools;
pub mod wash;

use std::collections::HashMap;
use std::sync::Arc;

pub use common::{ClassPath, Config, Error, Result};
pub use rt::{Class, ClassLoader, HostClassLoader, MethodMeta, TypeMeta, Value};
pub use session::{CompilationSession, CompilationSessionBuilder, SourceUnit};
pub use synth::{GeneratedClassName, MethodAdapterContext, NameAllocator, WrapperSpec};

/// Compile `(class name, source)` pairs as one batch and load the results
///
/// Shorthand for a throwaway [`CompilationSession`] using the built-in
/// compiler. The map is keyed by class name.
pub fn compile(sources: &[(&str, &str)], config: &Config) -> Result<HashMap<String, Arc<Class>>> {
    config.validate()?;
    log::debug!("in-memory compilation of {} source(s)", sources.len());
    let session = CompilationSession::builder().config(config.clone()).build();
    for (class_name, text) in sources {
        session.add_source(class_name, *text)?;
    }
    let compiled = session.compile()?;
    Ok(compiled.into_iter().map(|(unit, class)| (unit.class_name().to_string(), class)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_returns_classes_by_name() {
        let classes = compile(
            &[
                ("demo.Api", "package demo; public interface Api { int size(); }"),
                ("demo.Impl", "package demo; public class Impl implements Api { public int size() { return 3; } }"),
            ],
            &Config::default(),
        )
        .unwrap();
        assert_eq!(classes.len(), 2);
        assert!(classes["demo.Api"].is_interface());
        let instance = classes["demo.Impl"].new_instance(&[]).unwrap();
        assert_eq!(instance.invoke("size", &[]).unwrap().as_int(), Some(3));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let error = compile(&[("demo.A", "package demo; public class A { }")], &Config::default().with_target_java_version(2))
            .unwrap_err();
        assert!(error.is_configuration());
    }
}
