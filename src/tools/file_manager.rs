//! File managers: how the compiler finds class files and writes its output

use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::file_object::{FileObject, MemoryClassFile, PathFileObject};
use super::{Kind, Location};
use crate::common::classpath::{resource_path, ClassPath};
use crate::rt::bootstrap::platform_classes;
use crate::rt::loader::{bootstrap_loader, ClassLoader, HostClassLoader};

/// Sink for one compiled class; the bytes are committed by [`ClassOutput::close`]
pub trait ClassOutput: Write + Send {
    fn close(self: Box<Self>) -> io::Result<()>;
}

pub trait FileManager: Send + Sync {
    /// Files of the given kinds in `package` (dotted, empty for the unnamed package)
    fn list(&self, location: Location, package: &str, kinds: &[Kind], recurse: bool) -> io::Result<Vec<Arc<dyn FileObject>>>;

    fn infer_binary_name(&self, location: Location, file: &dyn FileObject) -> Option<String>;

    fn output_for_class(
        &self,
        location: Location,
        class_name: &str,
        kind: Kind,
        sibling: Option<&dyn FileObject>,
    ) -> io::Result<Box<dyn ClassOutput>>;

    fn class_loader(&self, location: Location) -> Option<Arc<dyn ClassLoader>>;

    fn has_location(&self, location: Location) -> bool;

    fn close(&self) -> io::Result<()>;
}

/// File manager over the bootstrap classes and a [`ClassPath`], optionally
/// writing class files under an output directory
#[derive(Debug)]
pub struct StandardFileManager {
    class_path: ClassPath,
    output_dir: Option<PathBuf>,
    host_loader: OnceCell<Arc<HostClassLoader>>,
}

impl StandardFileManager {
    pub fn new(class_path: ClassPath) -> Self {
        Self { class_path, output_dir: None, host_loader: OnceCell::new() }
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn class_path(&self) -> &ClassPath {
        &self.class_path
    }
}

fn in_package(binary_name: &str, package: &str, recurse: bool) -> bool {
    let own_package = binary_name.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("");
    own_package == package || (recurse && (package.is_empty() || own_package.starts_with(&format!("{}.", package))))
}

impl FileManager for StandardFileManager {
    fn list(&self, location: Location, package: &str, kinds: &[Kind], recurse: bool) -> io::Result<Vec<Arc<dyn FileObject>>> {
        if !kinds.contains(&Kind::Class) {
            return Ok(Vec::new());
        }
        let files: Vec<Arc<dyn FileObject>> = match location {
            Location::PlatformClassPath => platform_classes()
                .iter()
                .filter(|(name, _)| in_package(name, package, recurse))
                .map(|(name, bytes)| Arc::new(MemoryClassFile::new(name.clone(), bytes.clone())) as Arc<dyn FileObject>)
                .collect(),
            Location::ClassPath => self
                .class_path
                .list_classes(package, recurse)?
                .into_iter()
                .map(|class| Arc::new(PathFileObject::new(class.binary_name, class.location)) as Arc<dyn FileObject>)
                .collect(),
            Location::SourcePath | Location::ClassOutput => Vec::new(),
        };
        Ok(files)
    }

    fn infer_binary_name(&self, _location: Location, file: &dyn FileObject) -> Option<String> {
        file.binary_name()
    }

    fn output_for_class(
        &self,
        location: Location,
        class_name: &str,
        kind: Kind,
        _sibling: Option<&dyn FileObject>,
    ) -> io::Result<Box<dyn ClassOutput>> {
        if location != Location::ClassOutput || kind != Kind::Class {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("cannot write {:?} output to {}", kind, location)));
        }
        let Some(dir) = &self.output_dir else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "no class output directory configured"));
        };
        Ok(Box::new(FileClassOutput { path: dir.join(resource_path(class_name)), buffer: Vec::new() }))
    }

    fn class_loader(&self, location: Location) -> Option<Arc<dyn ClassLoader>> {
        match location {
            Location::ClassPath => {
                let loader = self.host_loader.get_or_init(|| HostClassLoader::new(self.class_path.clone()));
                Some(loader.clone() as Arc<dyn ClassLoader>)
            }
            Location::PlatformClassPath => Some(bootstrap_loader()),
            Location::SourcePath | Location::ClassOutput => None,
        }
    }

    fn has_location(&self, location: Location) -> bool {
        match location {
            Location::PlatformClassPath | Location::ClassPath => true,
            Location::ClassOutput => self.output_dir.is_some(),
            Location::SourcePath => false,
        }
    }

    fn close(&self) -> io::Result<()> {
        log::debug!("closing standard file manager");
        Ok(())
    }
}

/// Buffers class bytes and writes them to disk on close
struct FileClassOutput {
    path: PathBuf,
    buffer: Vec<u8>,
}

impl Write for FileClassOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ClassOutput for FileClassOutput {
    fn close(self: Box<Self>) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, &self.buffer)?;
        log::debug!("wrote {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::classpath::MemoryJar;

    #[test]
    fn test_platform_listing_is_per_package() {
        let fm = StandardFileManager::new(ClassPath::new());
        let lang = fm.list(Location::PlatformClassPath, "java.lang", &[Kind::Class], false).unwrap();
        let names: Vec<_> = lang.iter().filter_map(|f| fm.infer_binary_name(Location::PlatformClassPath, f.as_ref())).collect();
        assert!(names.contains(&"java.lang.Object".to_string()));
        assert!(!names.contains(&"java.io.IOException".to_string()));
        assert!(fm.list(Location::PlatformClassPath, "java.lang", &[Kind::Source], false).unwrap().is_empty());
    }

    #[test]
    fn test_class_path_listing_and_output() {
        let dir = tempfile::tempdir().unwrap();
        let cp = ClassPath::new().with_jar(MemoryJar::new("lib").with_class("demo.Greeter", vec![1u8, 2]));
        let fm = StandardFileManager::new(cp).with_output_dir(dir.path());

        let listed = fm.list(Location::ClassPath, "demo", &[Kind::Class], false).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].open_bytes().unwrap(), vec![1u8, 2]);

        let mut out = fm.output_for_class(Location::ClassOutput, "demo.Out", Kind::Class, None).unwrap();
        out.write_all(&[0xCA, 0xFE]).unwrap();
        out.close().unwrap();
        assert_eq!(fs::read(dir.path().join("demo/Out.class")).unwrap(), vec![0xCA, 0xFE]);
    }

    #[test]
    fn test_output_requires_directory() {
        let fm = StandardFileManager::new(ClassPath::new());
        assert!(fm.output_for_class(Location::ClassOutput, "demo.A", Kind::Class, None).is_err());
        assert!(!fm.has_location(Location::ClassOutput));
    }
}
