//! Class loader over a session's compiled bytecode

use std::fmt;
use std::io;
use std::sync::{Arc, Weak};

use super::registry::CompiledBytecodeRegistry;
use crate::common::classpath::binary_name_from_path;
use crate::rt::class::Class;
use crate::rt::error::Result;
use crate::rt::loader::{upgrade, ClassCache, ClassLoader};

/// Defines classes from a [`CompiledBytecodeRegistry`], otherwise asks its parent
///
/// Missing names are looked up again every time. Defined classes are only
/// remembered while they are alive, so one name maps to one live `Class`.
pub struct InMemoryClassLoader {
    this: Weak<InMemoryClassLoader>,
    registry: Arc<CompiledBytecodeRegistry>,
    parent: Arc<dyn ClassLoader>,
    cache: ClassCache,
}

impl fmt::Debug for InMemoryClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryClassLoader")
            .field("classes", &self.registry.len())
            .field("parent", &self.parent.name())
            .finish()
    }
}

impl InMemoryClassLoader {
    pub fn new(registry: Arc<CompiledBytecodeRegistry>, parent: Arc<dyn ClassLoader>) -> Arc<Self> {
        Arc::new_cyclic(|this| Self { this: this.clone(), registry, parent, cache: ClassCache::weak() })
    }

    pub fn registry(&self) -> &Arc<CompiledBytecodeRegistry> {
        &self.registry
    }
}

impl ClassLoader for InMemoryClassLoader {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn parent(&self) -> Option<Arc<dyn ClassLoader>> {
        Some(self.parent.clone())
    }

    fn find_class(&self, name: &str) -> Result<Option<Arc<Class>>> {
        if let Some(class) = self.cache.get(name) {
            return Ok(Some(class));
        }
        let Some(bytes) = self.registry.get(name) else {
            return Ok(None);
        };
        let this = upgrade(&self.this)?;
        let class = self.cache.get_or_define(name, || Class::define(this, &bytes, Some(name)))?;
        log::debug!("defined {} from compiled bytecode", name);
        Ok(Some(class))
    }

    fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(binary_name_from_path(path).and_then(|name| self.registry.get(&name)).map(|bytes| bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::builder::ClassBuilder;
    use crate::codegen::defs::access_flags::{ACC_PUBLIC, ACC_SUPER};
    use crate::rt::error::RuntimeError;
    use crate::rt::loader::bootstrap_loader;

    fn loader() -> Arc<InMemoryClassLoader> {
        InMemoryClassLoader::new(Arc::new(CompiledBytecodeRegistry::new()), bootstrap_loader())
    }

    #[test]
    fn test_registry_first_then_parent() {
        let loader = loader();
        let bytes = ClassBuilder::new("demo.Made", Some("java.lang.Object"), ACC_PUBLIC | ACC_SUPER).to_bytes();
        loader.registry().insert("demo.Made", bytes);

        let made = loader.load_class("demo.Made").unwrap();
        assert_eq!(made.loader().name(), "in-memory");
        assert!(Arc::ptr_eq(&made, &loader.load_class("demo.Made").unwrap()));
        assert_eq!(loader.load_class("java.lang.String").unwrap().loader().name(), "bootstrap");
        assert!(loader.get_resource("demo/Made.class").unwrap().is_some());
    }

    #[test]
    fn test_missing_names_are_not_cached() {
        let loader = loader();
        assert!(matches!(loader.load_class("demo.Later"), Err(RuntimeError::ClassNotFound(_))));
        let bytes = ClassBuilder::new("demo.Later", Some("java.lang.Object"), ACC_PUBLIC | ACC_SUPER).to_bytes();
        loader.registry().insert("demo.Later", bytes);
        assert!(loader.load_class("demo.Later").is_ok());
    }
}
