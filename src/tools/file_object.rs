//! File objects handed between the compiler and its file manager

use std::fmt;
use std::io;
use std::sync::Arc;

use super::Kind;
use crate::common::classpath::{resource_path, ResourceLocation};

/// A source or class file, real or virtual
pub trait FileObject: Send + Sync + fmt::Debug {
    /// Name used in diagnostics (`demo/Greeter.java`)
    fn name(&self) -> String;

    fn kind(&self) -> Kind;

    fn char_content(&self) -> io::Result<String> {
        Err(io::Error::new(io::ErrorKind::Unsupported, format!("{} has no character content", self.name())))
    }

    fn open_bytes(&self) -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::Unsupported, format!("{} has no byte content", self.name())))
    }

    /// Binary name recorded when the object was created, if any
    fn binary_name(&self) -> Option<String> {
        None
    }

    /// True when this object stands for the simple class name `simple` of `kind`
    fn is_name_compatible(&self, simple: &str, kind: Kind) -> bool {
        if self.kind() != kind {
            return false;
        }
        let name = self.name();
        let base = name.rsplit('/').next().unwrap_or(&name);
        base == format!("{}{}", simple, kind.extension())
    }
}

/// In-memory Java source for one top-level class
#[derive(Debug)]
pub struct SourceFile {
    class_name: String,
    path: String,
    text: String,
}

impl SourceFile {
    /// `class_name` is the fully qualified name of the declared top-level class
    pub fn new(class_name: impl Into<String>, text: impl Into<String>) -> Self {
        let class_name = class_name.into();
        let path = format!("{}{}", class_name.replace('.', "/"), Kind::Source.extension());
        Self { class_name, path, text: text.into() }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl FileObject for SourceFile {
    fn name(&self) -> String {
        self.path.clone()
    }

    fn kind(&self) -> Kind {
        Kind::Source
    }

    fn char_content(&self) -> io::Result<String> {
        Ok(self.text.clone())
    }

    fn binary_name(&self) -> Option<String> {
        Some(self.class_name.clone())
    }
}

/// A class file found on a class path entry
#[derive(Debug)]
pub struct PathFileObject {
    binary_name: String,
    location: ResourceLocation,
}

impl PathFileObject {
    pub fn new(binary_name: impl Into<String>, location: ResourceLocation) -> Self {
        Self { binary_name: binary_name.into(), location }
    }
}

impl FileObject for PathFileObject {
    fn name(&self) -> String {
        self.location.display_name(&self.binary_name)
    }

    fn kind(&self) -> Kind {
        Kind::Class
    }

    fn open_bytes(&self) -> io::Result<Vec<u8>> {
        self.location.read()
    }

    fn binary_name(&self) -> Option<String> {
        Some(self.binary_name.clone())
    }
}

/// Class bytes that only exist in memory
#[derive(Debug, Clone)]
pub struct MemoryClassFile {
    binary_name: String,
    bytes: Arc<[u8]>,
}

impl MemoryClassFile {
    pub fn new(binary_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { binary_name: binary_name.into(), bytes: bytes.into() }
    }
}

impl FileObject for MemoryClassFile {
    fn name(&self) -> String {
        resource_path(&self.binary_name)
    }

    fn kind(&self) -> Kind {
        Kind::Class
    }

    fn open_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.to_vec())
    }

    fn binary_name(&self) -> Option<String> {
        Some(self.binary_name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_file_naming() {
        let source = SourceFile::new("demo.Greeter", "class Greeter {}");
        assert_eq!(source.name(), "demo/Greeter.java");
        assert!(source.is_name_compatible("Greeter", Kind::Source));
        assert!(!source.is_name_compatible("Greeter", Kind::Class));
        assert!(source.open_bytes().is_err());
    }

    #[test]
    fn test_memory_class_file() {
        let file = MemoryClassFile::new("demo.Outer$Inner", vec![0xCA, 0xFE]);
        assert_eq!(file.name(), "demo/Outer$Inner.class");
        assert_eq!(file.open_bytes().unwrap(), vec![0xCA, 0xFE]);
        assert_eq!(file.binary_name().as_deref(), Some("demo.Outer$Inner"));
    }
}
