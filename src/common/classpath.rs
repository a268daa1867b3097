//! Class path model and javac-aligned class path resolution
//!
//! A [`ClassPath`] is an ordered list of entries searched first-to-last:
//! directories on disk (scanned with `walkdir`) and in-memory jars. The
//! resolver picks the class path string with javac's priority order:
//! 1. `-cp` / `-classpath` command line arguments
//! 2. `CLASSPATH` environment variable
//! 3. `TOLC_CLASSPATH` environment variable
//! 4. Current directory "."

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

const CLASS_SUFFIX: &str = ".class";

/// Class file bytes held in memory under their resource paths (`demo/Greeter.class`)
#[derive(Debug, Default)]
pub struct MemoryJar {
    name: String,
    entries: BTreeMap<String, Arc<[u8]>>,
}

impl MemoryJar {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: BTreeMap::new() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a class under its binary name (`demo.Outer$Inner`)
    pub fn add_class(&mut self, binary_name: &str, bytes: impl Into<Arc<[u8]>>) {
        self.entries.insert(resource_path(binary_name), bytes.into());
    }

    pub fn with_class(mut self, binary_name: &str, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.add_class(binary_name, bytes);
        self
    }

    pub fn resource(&self, path: &str) -> Option<Arc<[u8]>> {
        self.entries.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum ClassPathEntry {
    Directory(PathBuf),
    Memory(Arc<MemoryJar>),
}

/// Where a listed class file lives
#[derive(Debug, Clone)]
pub enum ResourceLocation {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

impl ResourceLocation {
    pub fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            ResourceLocation::File(path) => fs::read(path),
            ResourceLocation::Memory(bytes) => Ok(bytes.to_vec()),
        }
    }

    pub fn display_name(&self, binary_name: &str) -> String {
        match self {
            ResourceLocation::File(path) => path.display().to_string(),
            ResourceLocation::Memory(_) => resource_path(binary_name),
        }
    }
}

/// A class found while listing a package
#[derive(Debug, Clone)]
pub struct ClassPathClass {
    pub binary_name: String,
    pub location: ResourceLocation,
}

#[derive(Debug, Clone, Default)]
pub struct ClassPath {
    entries: Vec<ClassPathEntry>,
}

impl ClassPath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a class path string such as `lib:build/classes`
    pub fn from_class_path_string(classpath: &str) -> Self {
        let mut cp = Self::new();
        for entry in ClasspathResolver::parse_classpath_entries(classpath) {
            let path = PathBuf::from(&entry);
            if path.extension().map_or(false, |ext| ext == "jar" || ext == "zip") {
                log::warn!("skipping archive class path entry {} (archives are not supported)", entry);
                continue;
            }
            cp.push_directory(path);
        }
        cp
    }

    pub fn push_directory(&mut self, path: impl Into<PathBuf>) {
        self.entries.push(ClassPathEntry::Directory(path.into()));
    }

    pub fn push_jar(&mut self, jar: MemoryJar) {
        self.entries.push(ClassPathEntry::Memory(Arc::new(jar)));
    }

    pub fn with_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.push_directory(path);
        self
    }

    pub fn with_jar(mut self, jar: MemoryJar) -> Self {
        self.push_jar(jar);
        self
    }

    pub fn entries(&self) -> &[ClassPathEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes of the first entry that has `path`
    pub fn find_resource(&self, path: &str) -> io::Result<Option<Vec<u8>>> {
        for entry in &self.entries {
            match entry {
                ClassPathEntry::Directory(dir) => {
                    let file = dir.join(path);
                    if file.is_file() {
                        return fs::read(&file).map(Some);
                    }
                }
                ClassPathEntry::Memory(jar) => {
                    if let Some(bytes) = jar.resource(path) {
                        return Ok(Some(bytes.to_vec()));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Classes in `package` (dotted, empty for the unnamed package). The first
    /// entry providing a binary name shadows later ones.
    pub fn list_classes(&self, package: &str, recurse: bool) -> io::Result<Vec<ClassPathClass>> {
        let mut seen = BTreeSet::new();
        let mut found = Vec::new();
        let package_dir = package.replace('.', "/");
        for entry in &self.entries {
            let listed = match entry {
                ClassPathEntry::Directory(dir) => list_directory(dir, &package_dir, recurse)?,
                ClassPathEntry::Memory(jar) => list_jar(jar, &package_dir, recurse),
            };
            for class in listed {
                if seen.insert(class.binary_name.clone()) {
                    found.push(class);
                }
            }
        }
        Ok(found)
    }
}

fn list_directory(root: &Path, package_dir: &str, recurse: bool) -> io::Result<Vec<ClassPathClass>> {
    let dir = if package_dir.is_empty() { root.to_path_buf() } else { root.join(package_dir) };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let walker = WalkDir::new(&dir).min_depth(1).sort_by_file_name();
    let walker = if recurse { walker } else { walker.max_depth(1) };
    let mut classes = Vec::new();
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else { continue };
        let relative = relative.to_string_lossy().replace('\\', "/");
        if let Some(binary_name) = binary_name_from_path(&relative) {
            classes.push(ClassPathClass { binary_name, location: ResourceLocation::File(entry.into_path()) });
        }
    }
    Ok(classes)
}

fn list_jar(jar: &MemoryJar, package_dir: &str, recurse: bool) -> Vec<ClassPathClass> {
    let prefix = if package_dir.is_empty() { String::new() } else { format!("{}/", package_dir) };
    jar.entries
        .iter()
        .filter(|(path, _)| {
            path.starts_with(&prefix) && (recurse || !path[prefix.len()..].contains('/'))
        })
        .filter_map(|(path, bytes)| {
            binary_name_from_path(path)
                .map(|binary_name| ClassPathClass { binary_name, location: ResourceLocation::Memory(bytes.clone()) })
        })
        .collect()
}

/// `demo/Outer$Inner.class` -> `demo.Outer$Inner`
pub fn binary_name_from_path(path: &str) -> Option<String> {
    path.strip_suffix(CLASS_SUFFIX).map(|stem| stem.replace('/', "."))
}

/// `demo.Outer$Inner` -> `demo/Outer$Inner.class`
pub fn resource_path(binary_name: &str) -> String {
    format!("{}{}", binary_name.replace('.', "/"), CLASS_SUFFIX)
}

/// JavaC-aligned classpath resolver
pub struct ClasspathResolver;

impl ClasspathResolver {
    /// Resolve the class path string; never empty, falls back to "."
    pub fn resolve_classpath(classpath_arg: Option<&str>, cp_arg: Option<&str>) -> String {
        // -cp and -classpath share a handler in javac; -cp wins when both are given
        if let Some(cp) = cp_arg {
            log::debug!("class path from -cp: {}", cp);
            return cp.to_string();
        }
        if let Some(classpath) = classpath_arg {
            log::debug!("class path from -classpath: {}", classpath);
            return classpath.to_string();
        }
        if let Ok(classpath_env) = env::var("CLASSPATH") {
            if !classpath_env.is_empty() {
                log::debug!("class path from CLASSPATH: {}", classpath_env);
                return classpath_env;
            }
        }
        ".".to_string()
    }

    /// Like [`Self::resolve_classpath`], with `TOLC_CLASSPATH` consulted before "."
    pub fn resolve_classpath_with_tolc_fallback(classpath_arg: Option<&str>, cp_arg: Option<&str>) -> String {
        let result = Self::resolve_classpath(classpath_arg, cp_arg);
        if result == "." {
            if let Ok(tolc_classpath) = env::var("TOLC_CLASSPATH") {
                if !tolc_classpath.is_empty() {
                    log::debug!("class path from TOLC_CLASSPATH: {}", tolc_classpath);
                    return tolc_classpath;
                }
            }
        }
        result
    }

    /// Split on the platform separator (`:` on Unix, `;` on Windows)
    pub fn parse_classpath_entries(classpath: &str) -> Vec<String> {
        let separator = if cfg!(windows) { ';' } else { ':' };
        classpath
            .split(separator)
            .map(|entry| entry.trim().to_string())
            .filter(|entry| !entry.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cp_argument_priority() {
        let result = ClasspathResolver::resolve_classpath(Some("/path/classpath"), Some("/path/cp"));
        assert_eq!(result, "/path/cp");
        let result = ClasspathResolver::resolve_classpath(Some("/path/classpath"), None);
        assert_eq!(result, "/path/classpath");
    }

    #[test]
    fn test_parse_classpath_entries() {
        let separator = if cfg!(windows) { ";" } else { ":" };
        let entries = ClasspathResolver::parse_classpath_entries(&format!("/a{0} {0}/b", separator));
        assert_eq!(entries, vec!["/a", "/b"]);
    }

    #[test]
    fn test_memory_jar_listing_respects_packages() {
        let jar = MemoryJar::new("test")
            .with_class("demo.Greeter", vec![1u8])
            .with_class("demo.inner.Deep", vec![2u8])
            .with_class("other.Thing", vec![3u8]);
        let cp = ClassPath::new().with_jar(jar);

        let names: Vec<_> = cp.list_classes("demo", false).unwrap().into_iter().map(|c| c.binary_name).collect();
        assert_eq!(names, vec!["demo.Greeter"]);
        let names: Vec<_> = cp.list_classes("demo", true).unwrap().into_iter().map(|c| c.binary_name).collect();
        assert_eq!(names, vec!["demo.Greeter", "demo.inner.Deep"]);
        assert_eq!(cp.find_resource("other/Thing.class").unwrap(), Some(vec![3u8]));
    }

    #[test]
    fn test_directory_listing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("demo")).unwrap();
        fs::write(dir.path().join("demo/A.class"), [0xCA]).unwrap();
        fs::write(dir.path().join("demo/Outer$Inner.class"), [0xFE]).unwrap();
        fs::write(dir.path().join("demo/readme.txt"), b"x").unwrap();

        let cp = ClassPath::new().with_directory(dir.path());
        let names: Vec<_> = cp.list_classes("demo", false).unwrap().into_iter().map(|c| c.binary_name).collect();
        assert_eq!(names, vec!["demo.A", "demo.Outer$Inner"]);
        assert!(cp.list_classes("missing", false).unwrap().is_empty());
    }
}
