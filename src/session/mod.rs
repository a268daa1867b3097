//! In-process compilation sessions
//!
//! A [`CompilationSession`] collects source units, compiles them through a
//! [`JavaCompiler`](crate::tools::JavaCompiler) behind a [`ClasspathBridge`]
//! and resolves the results with an [`InMemoryClassLoader`].

pub mod bridge;
pub mod loader;
pub mod registry;
#[allow(clippy::module_inception)]
pub mod session;

pub use bridge::{BridgeGuard, ClassScanner, ClasspathBridge, MemoryClassOutput, ScannedClassFile};
pub use loader::InMemoryClassLoader;
pub use registry::CompiledBytecodeRegistry;
pub use session::{CompilationSession, CompilationSessionBuilder, SourceUnit};
