//! Class loaders
//!
//! Resolution is a two-tier interface: [`ClassLoader::find_class`] looks only
//! at what the loader owns, [`ClassLoader::load_class`] adds delegation to
//! the parent. Loaders hand themselves to [`Class::define`] as the defining
//! loader, so each keeps a weak reference to its own `Arc`.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, RwLock, Weak};
use std::thread::{self, ThreadId};

use once_cell::sync::Lazy;

use super::bootstrap::platform_class_bytes;
use super::class::Class;
use super::error::{Result, RuntimeError};
use crate::common::classpath::{resource_path, ClassPath};

pub trait ClassLoader: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn parent(&self) -> Option<Arc<dyn ClassLoader>>;

    /// Classes this loader defines itself; `Ok(None)` when it has no bytes for `name`
    fn find_class(&self, name: &str) -> Result<Option<Arc<Class>>>;

    /// Resource bytes this loader owns
    fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>>;

    /// Local lookup first, then the parent
    fn load_class(&self, name: &str) -> Result<Arc<Class>> {
        if let Some(class) = self.find_class(name)? {
            return Ok(class);
        }
        match self.parent() {
            Some(parent) => parent.load_class(name),
            None => Err(RuntimeError::ClassNotFound(name.to_string())),
        }
    }

    fn get_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        if let Some(bytes) = self.find_resource(path)? {
            return Ok(Some(bytes));
        }
        match self.parent() {
            Some(parent) => parent.get_resource(path),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Retention {
    /// Keep classes alive for the life of the loader
    Strong,
    /// Remember a class only while something else holds it
    Weak,
}

#[derive(Debug)]
enum Slot {
    Strong(Arc<Class>),
    Weak(Weak<Class>),
}

/// Per-loader table of defined classes
///
/// Definitions happen outside the table lock; when two threads race, the
/// first inserted class wins and the other definition is discarded.
#[derive(Debug)]
pub struct ClassCache {
    retention: Retention,
    classes: Mutex<HashMap<String, Slot>>,
    /// Names being defined, per thread, to detect circular supertypes
    defining: Mutex<HashSet<(String, ThreadId)>>,
}

impl ClassCache {
    pub fn strong() -> Self {
        Self::with_retention(Retention::Strong)
    }

    pub fn weak() -> Self {
        Self::with_retention(Retention::Weak)
    }

    fn with_retention(retention: Retention) -> Self {
        Self { retention, classes: Mutex::new(HashMap::new()), defining: Mutex::new(HashSet::new()) }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Class>> {
        let classes = self.classes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        match classes.get(name)? {
            Slot::Strong(class) => Some(class.clone()),
            Slot::Weak(class) => class.upgrade(),
        }
    }

    /// Cached class, or the result of `define` recorded under `name`
    pub fn get_or_define(&self, name: &str, define: impl FnOnce() -> Result<Arc<Class>>) -> Result<Arc<Class>> {
        if let Some(class) = self.get(name) {
            return Ok(class);
        }
        {
            let mut defining = self.defining.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if !defining.insert((name.to_string(), thread::current().id())) {
                return Err(RuntimeError::Linkage(format!("class circularity while defining {}", name)));
            }
        }
        let defined = define();
        self.defining.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(&(name.to_string(), thread::current().id()));
        let defined = defined?;

        let mut classes = self.classes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let existing = match classes.get(name) {
            Some(Slot::Strong(class)) => Some(class.clone()),
            Some(Slot::Weak(class)) => class.upgrade(),
            None => None,
        };
        if let Some(existing) = existing {
            return Ok(existing);
        }
        let slot = match self.retention {
            Retention::Strong => Slot::Strong(defined.clone()),
            Retention::Weak => Slot::Weak(Arc::downgrade(&defined)),
        };
        classes.insert(name.to_string(), slot);
        Ok(defined)
    }

    pub fn len(&self) -> usize {
        let classes = self.classes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        classes
            .values()
            .filter(|slot| match slot {
                Slot::Strong(_) => true,
                Slot::Weak(class) => class.strong_count() > 0,
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Defines the platform classes; the root of every loader chain
#[derive(Debug)]
pub struct BootstrapClassLoader {
    this: Weak<BootstrapClassLoader>,
    cache: ClassCache,
}

static BOOTSTRAP: Lazy<Arc<BootstrapClassLoader>> =
    Lazy::new(|| Arc::new_cyclic(|this| BootstrapClassLoader { this: this.clone(), cache: ClassCache::strong() }));

pub fn bootstrap_loader() -> Arc<dyn ClassLoader> {
    BOOTSTRAP.clone()
}

pub(crate) fn upgrade<T: ClassLoader + 'static>(this: &Weak<T>) -> Result<Arc<dyn ClassLoader>> {
    this.upgrade()
        .map(|loader| loader as Arc<dyn ClassLoader>)
        .ok_or_else(|| RuntimeError::Linkage("class loader has been dropped".to_string()))
}

impl ClassLoader for BootstrapClassLoader {
    fn name(&self) -> &str {
        "bootstrap"
    }

    fn parent(&self) -> Option<Arc<dyn ClassLoader>> {
        None
    }

    fn find_class(&self, name: &str) -> Result<Option<Arc<Class>>> {
        let Some(bytes) = platform_class_bytes(name) else {
            return Ok(None);
        };
        let this = upgrade(&self.this)?;
        self.cache.get_or_define(name, || Class::define(this, &bytes, Some(name))).map(Some)
    }

    fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        let name = path.strip_suffix(".class").map(|stem| stem.replace('/', "."));
        Ok(name.and_then(|name| platform_class_bytes(&name)).map(|bytes| bytes.to_vec()))
    }
}

/// The embedding application's class path
///
/// Delegates parent-first, so class path entries cannot replace platform
/// classes. Extra classes registered with [`HostClassLoader::define_resource`]
/// are loadable but do not show up in class path listings.
#[derive(Debug)]
pub struct HostClassLoader {
    this: Weak<HostClassLoader>,
    class_path: ClassPath,
    extras: RwLock<HashMap<String, Arc<[u8]>>>,
    cache: ClassCache,
}

impl HostClassLoader {
    pub fn new(class_path: ClassPath) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            class_path,
            extras: RwLock::new(HashMap::new()),
            cache: ClassCache::weak(),
        })
    }

    pub fn class_path(&self) -> &ClassPath {
        &self.class_path
    }

    /// Register class bytes under a binary name without adding them to the class path
    pub fn define_resource(&self, binary_name: &str, bytes: impl Into<Arc<[u8]>>) {
        let mut extras = self.extras.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        extras.insert(resource_path(binary_name), bytes.into());
    }

    /// Binary names registered through [`Self::define_resource`]
    pub fn extra_class_names(&self) -> Vec<String> {
        let extras = self.extras.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        extras.keys().filter_map(|path| crate::common::classpath::binary_name_from_path(path)).collect()
    }
}

impl ClassLoader for HostClassLoader {
    fn name(&self) -> &str {
        "host"
    }

    fn parent(&self) -> Option<Arc<dyn ClassLoader>> {
        Some(bootstrap_loader())
    }

    fn find_class(&self, name: &str) -> Result<Option<Arc<Class>>> {
        if let Some(class) = self.cache.get(name) {
            return Ok(Some(class));
        }
        let bytes = self
            .find_resource(&resource_path(name))
            .map_err(|source| RuntimeError::Io { name: name.to_string(), source })?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let this = upgrade(&self.this)?;
        self.cache.get_or_define(name, || Class::define(this, &bytes, Some(name))).map(Some)
    }

    fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        {
            let extras = self.extras.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(bytes) = extras.get(path) {
                return Ok(Some(bytes.to_vec()));
            }
        }
        self.class_path.find_resource(path)
    }

    fn load_class(&self, name: &str) -> Result<Arc<Class>> {
        match bootstrap_loader().load_class(name) {
            Err(RuntimeError::ClassNotFound(_)) => {}
            found => return found,
        }
        self.find_class(name)?.ok_or_else(|| RuntimeError::ClassNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::classpath::MemoryJar;

    #[test]
    fn test_bootstrap_classes_are_shared() {
        let a = bootstrap_loader().load_class("java.lang.String").unwrap();
        let b = bootstrap_loader().load_class("java.lang.String").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.super_class().map(|c| c.name().to_string()).as_deref(), Some("java.lang.Object"));
        assert!(matches!(bootstrap_loader().load_class("demo.Missing"), Err(RuntimeError::ClassNotFound(_))));
    }

    #[test]
    fn test_host_loader_is_parent_first() {
        let object = crate::rt::bootstrap::platform_class_bytes("java.lang.Object").unwrap();
        let jar = MemoryJar::new("shadow").with_class("java.lang.Object", object.to_vec());
        let host = HostClassLoader::new(ClassPath::new().with_jar(jar));
        let class = host.load_class("java.lang.Object").unwrap();
        assert_eq!(class.loader().name(), "bootstrap");
    }

    #[test]
    fn test_host_extras_are_loadable_but_unlisted() {
        let bytes = crate::codegen::builder::ClassBuilder::new("demo.Extra", Some("java.lang.Object"), 0x21).to_bytes();
        let host = HostClassLoader::new(ClassPath::new());
        host.define_resource("demo.Extra", bytes);
        assert_eq!(host.load_class("demo.Extra").unwrap().name(), "demo.Extra");
        assert!(host.class_path().list_classes("demo", false).unwrap().is_empty());
        assert_eq!(host.extra_class_names(), vec!["demo.Extra"]);
        assert!(host.get_resource("demo/Extra.class").unwrap().is_some());
    }
}
