//! Compiled class bytes captured from the compiler

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

/// Binary name to class file bytes, owned by one session
#[derive(Debug, Default)]
pub struct CompiledBytecodeRegistry {
    classes: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl CompiledBytecodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `bytes` under `binary_name`, replacing an earlier capture
    pub fn insert(&self, binary_name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        let binary_name = binary_name.into();
        let bytes = bytes.into();
        log::debug!("captured {} ({} bytes)", binary_name, bytes.len());
        self.classes.write().unwrap_or_else(|poisoned| poisoned.into_inner()).insert(binary_name, bytes);
    }

    pub fn get(&self, binary_name: &str) -> Option<Arc<[u8]>> {
        self.classes.read().unwrap_or_else(|poisoned| poisoned.into_inner()).get(binary_name).cloned()
    }

    pub fn contains(&self, binary_name: &str) -> bool {
        self.classes.read().unwrap_or_else(|poisoned| poisoned.into_inner()).contains_key(binary_name)
    }

    pub fn remove(&self, binary_name: &str) -> Option<Arc<[u8]>> {
        self.classes.write().unwrap_or_else(|poisoned| poisoned.into_inner()).remove(binary_name)
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.classes.read().unwrap_or_else(|poisoned| poisoned.into_inner()).keys().cloned().collect()
    }

    /// Drop every entry whose name is not in `keep`
    pub fn retain_names(&self, keep: &BTreeSet<String>) {
        let mut classes = self.classes.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        classes.retain(|name, _| {
            let kept = keep.contains(name);
            if !kept {
                log::debug!("discarding captured {}", name);
            }
            kept
        });
    }

    pub fn len(&self) -> usize {
        self.classes.read().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replace_and_retain() {
        let registry = CompiledBytecodeRegistry::new();
        registry.insert("demo.A", vec![1u8]);
        registry.insert("demo.B", vec![2u8]);
        registry.insert("demo.A", vec![3u8]);
        assert_eq!(registry.len(), 2);
        assert_eq!(&*registry.get("demo.A").unwrap(), &[3u8]);

        let keep: BTreeSet<String> = ["demo.B".to_string()].into_iter().collect();
        registry.retain_names(&keep);
        assert!(!registry.contains("demo.A"));
        assert!(registry.contains("demo.B"));
        assert!(registry.remove("demo.B").is_some());
        assert!(registry.is_empty());
    }
}
