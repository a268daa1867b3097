//! Class runtime
//!
//! Defines classes from class file bytes, links them through a chain of
//! [`ClassLoader`]s and executes their bytecode with a small interpreter.
//! The bootstrap loader provides the `java.lang` / `java.io` platform
//! classes; their native methods are implemented in Rust.

pub mod bootstrap;
pub mod class;
pub mod error;
pub mod interp;
pub mod loader;
pub mod natives;
pub mod reflect;
pub mod value;

pub use class::{Class, Field, Method};
pub use error::{Result, RuntimeError};
pub use interp::Interpreter;
pub use loader::{bootstrap_loader, ClassCache, ClassLoader, HostClassLoader};
pub use reflect::{MethodMeta, TypeMeta};
pub use value::{Object, ObjectRef, Value};
