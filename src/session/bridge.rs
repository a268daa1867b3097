//! File manager that connects the compiler to in-memory state
//!
//! Wraps the compiler's standard file manager. Class output is captured into
//! the session's registry instead of touching disk. Class path listings that
//! come back empty are filled in from a [`ClassScanner`]. The class path
//! class loader is the session's [`InMemoryClassLoader`].

use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::loader::InMemoryClassLoader;
use super::registry::CompiledBytecodeRegistry;
use crate::common::classpath::resource_path;
use crate::rt::loader::{ClassLoader, HostClassLoader};
use crate::tools::{ClassOutput, FileManager, FileObject, Kind, Location};

/// Names classes of a package when the regular class path listing cannot
pub trait ClassScanner: Send + Sync {
    /// Fully qualified names of classes in `package`
    fn scan_classes(&self, package: &str) -> BTreeSet<String>;
}

impl<F> ClassScanner for F
where
    F: Fn(&str) -> BTreeSet<String> + Send + Sync,
{
    fn scan_classes(&self, package: &str) -> BTreeSet<String> {
        self(package)
    }
}

impl ClassScanner for HostClassLoader {
    fn scan_classes(&self, package: &str) -> BTreeSet<String> {
        let mut names: BTreeSet<String> = self
            .extra_class_names()
            .into_iter()
            .filter(|name| package_of(name) == package)
            .collect();
        match self.class_path().list_classes(package, false) {
            Ok(classes) => names.extend(classes.into_iter().map(|class| class.binary_name)),
            Err(error) => log::warn!("class path scan of {} failed: {}", package, error),
        }
        names
    }
}

fn package_of(binary_name: &str) -> &str {
    binary_name.rsplit_once('.').map(|(package, _)| package).unwrap_or("")
}

/// A class known only by name; its bytes come from a class loader when opened
#[derive(Debug)]
pub struct ScannedClassFile {
    binary_name: String,
    loader: Arc<dyn ClassLoader>,
}

impl ScannedClassFile {
    pub fn new(binary_name: impl Into<String>, loader: Arc<dyn ClassLoader>) -> Self {
        Self { binary_name: binary_name.into(), loader }
    }
}

impl FileObject for ScannedClassFile {
    fn name(&self) -> String {
        resource_path(&self.binary_name)
    }

    fn kind(&self) -> Kind {
        Kind::Class
    }

    fn open_bytes(&self) -> io::Result<Vec<u8>> {
        self.loader.get_resource(&resource_path(&self.binary_name))?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no class file for {}", self.binary_name))
        })
    }

    fn binary_name(&self) -> Option<String> {
        Some(self.binary_name.clone())
    }
}

/// Buffers one compiled class and records it in the registry on close
pub struct MemoryClassOutput {
    binary_name: String,
    buffer: Vec<u8>,
    registry: Arc<CompiledBytecodeRegistry>,
}

impl Write for MemoryClassOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ClassOutput for MemoryClassOutput {
    fn close(self: Box<Self>) -> io::Result<()> {
        let MemoryClassOutput { binary_name, buffer, registry } = *self;
        registry.insert(binary_name, buffer);
        Ok(())
    }
}

pub struct ClasspathBridge {
    inner: Box<dyn FileManager>,
    registry: Arc<CompiledBytecodeRegistry>,
    loader: Arc<InMemoryClassLoader>,
    scanner: Option<Arc<dyn ClassScanner>>,
    released: AtomicBool,
}

impl fmt::Debug for ClasspathBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClasspathBridge")
            .field("loader", &self.loader)
            .field("scanner", &self.scanner.is_some())
            .field("released", &self.is_released())
            .finish()
    }
}

impl ClasspathBridge {
    pub fn new(inner: Box<dyn FileManager>, loader: Arc<InMemoryClassLoader>) -> Self {
        Self { inner, registry: loader.registry().clone(), loader, scanner: None, released: AtomicBool::new(false) }
    }

    pub fn with_scanner(mut self, scanner: Option<Arc<dyn ClassScanner>>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Close the wrapped file manager; later calls do nothing
    pub fn release(&self) -> io::Result<()> {
        if self.released.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::debug!("releasing classpath bridge");
        self.inner.close()
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    fn scanned(&self, package: &str, recurse: bool) -> Vec<Arc<dyn FileObject>> {
        let Some(scanner) = &self.scanner else {
            return Vec::new();
        };
        let loader: Arc<dyn ClassLoader> = self.loader.clone();
        let files: Vec<Arc<dyn FileObject>> = scanner
            .scan_classes(package)
            .into_iter()
            .filter(|name| {
                let own = package_of(name);
                own == package || (recurse && own.starts_with(&format!("{}.", package)))
            })
            .map(|name| Arc::new(ScannedClassFile::new(name, loader.clone())) as Arc<dyn FileObject>)
            .collect();
        if !files.is_empty() {
            log::debug!("class path listing of '{}' was empty; scanner found {} class(es)", package, files.len());
        }
        files
    }
}

impl FileManager for ClasspathBridge {
    fn list(&self, location: Location, package: &str, kinds: &[Kind], recurse: bool) -> io::Result<Vec<Arc<dyn FileObject>>> {
        let listed = self.inner.list(location, package, kinds, recurse)?;
        if location == Location::ClassPath && listed.is_empty() && kinds.contains(&Kind::Class) {
            return Ok(self.scanned(package, recurse));
        }
        Ok(listed)
    }

    fn infer_binary_name(&self, location: Location, file: &dyn FileObject) -> Option<String> {
        file.binary_name().or_else(|| self.inner.infer_binary_name(location, file))
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
        Ok(Box::new(MemoryClassOutput {
            binary_name: class_name.to_string(),
            buffer: Vec::new(),
            registry: self.registry.clone(),
        }))
    }

    fn class_loader(&self, location: Location) -> Option<Arc<dyn ClassLoader>> {
        match location {
            Location::ClassPath => Some(self.loader.clone() as Arc<dyn ClassLoader>),
            other => self.inner.class_loader(other),
        }
    }

    fn has_location(&self, location: Location) -> bool {
        location == Location::ClassOutput || self.inner.has_location(location)
    }

    fn close(&self) -> io::Result<()> {
        self.release()
    }
}

/// Releases the bridge if the session unwinds before releasing it itself
pub struct BridgeGuard<'a> {
    bridge: &'a ClasspathBridge,
}

impl<'a> BridgeGuard<'a> {
    pub fn new(bridge: &'a ClasspathBridge) -> Self {
        Self { bridge }
    }

    pub fn release(self) -> io::Result<()> {
        self.bridge.release()
    }
}

impl Drop for BridgeGuard<'_> {
    fn drop(&mut self) {
        if !self.bridge.is_released() {
            if let Err(error) = self.bridge.release() {
                log::error!("failed to release classpath bridge: {}", error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::classpath::ClassPath;
    use crate::rt::loader::bootstrap_loader;
    use crate::tools::StandardFileManager;

    fn bridge(scanner: Option<Arc<dyn ClassScanner>>) -> ClasspathBridge {
        let loader = InMemoryClassLoader::new(Arc::new(CompiledBytecodeRegistry::new()), bootstrap_loader());
        ClasspathBridge::new(Box::new(StandardFileManager::new(ClassPath::new())), loader).with_scanner(scanner)
    }

    #[test]
    fn test_output_is_captured_in_registry() {
        let bridge = bridge(None);
        let mut out = bridge.output_for_class(Location::ClassOutput, "demo.A", Kind::Class, None).unwrap();
        out.write_all(&[0xCA, 0xFE]).unwrap();
        out.close().unwrap();
        assert_eq!(&*bridge.registry.get("demo.A").unwrap(), &[0xCA, 0xFE]);
        assert!(bridge.has_location(Location::ClassOutput));
        assert!(bridge.output_for_class(Location::ClassPath, "demo.A", Kind::Class, None).is_err());
    }

    #[test]
    fn test_empty_listing_falls_back_to_scanner() {
        let scanner: Arc<dyn ClassScanner> = Arc::new(|package: &str| -> BTreeSet<String> {
            if package == "lib" {
                ["lib.Tool".to_string(), "lib.sub.Other".to_string()].into_iter().collect()
            } else {
                BTreeSet::new()
            }
        });
        let bridge = bridge(Some(scanner));
        let listed = bridge.list(Location::ClassPath, "lib", &[Kind::Class], false).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(bridge.infer_binary_name(Location::ClassPath, listed[0].as_ref()).as_deref(), Some("lib.Tool"));
        assert!(listed[0].open_bytes().is_err());
        assert!(bridge.list(Location::ClassPath, "other", &[Kind::Class], false).unwrap().is_empty());
    }

    #[test]
    fn test_class_path_loader_is_in_memory_and_release_is_idempotent() {
        let bridge = bridge(None);
        assert_eq!(bridge.class_loader(Location::ClassPath).unwrap().name(), "in-memory");
        {
            let _guard = BridgeGuard::new(&bridge);
        }
        assert!(bridge.is_released());
        assert!(bridge.release().is_ok());
    }
}
