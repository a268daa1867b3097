//! Class file model and bytecode generation
//!
//! The structures here model the class file format; [`gen::Gen`] turns
//! entered and checked classes into class file bytes.

pub mod attribute;
pub mod builder;
pub mod class;
pub mod code;
pub mod constpool;
pub mod defs;
pub mod descriptor;
pub mod error;
pub mod gen;
pub mod opcodes;
pub mod reader;
pub mod writer;

pub use builder::ClassBuilder;
pub use class::ClassFile;
pub use constpool::{Constant, ConstantPool};
pub use descriptor::{JType, MethodDescriptor};
pub use error::ClassFormatError;
pub use gen::Gen;
pub use reader::read_class_file;
