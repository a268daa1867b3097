//! Source synthesis: generated class names and adapter source

pub mod naming;
pub mod source;
pub mod wrapper;

pub use naming::{GeneratedClassName, NameAllocator};
pub use source::{FieldSpec, SourceWriter};
pub use wrapper::{synthesize, MethodAdapterContext, SynthesizedClass, WrapperClass, WrapperSpec};
