//! Symbol table shared by the compiler phases
//!
//! Corresponds to javac's `Symtab` plus the class reader completer: source
//! classes are entered directly, everything else is read lazily from the
//! class files the file manager lists for the platform and the class path.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::codegen::descriptor::{JType, MethodDescriptor, ERROR, OBJECT, RUNTIME_EXCEPTION, THROWABLE};
use crate::codegen::reader::read_class_file;
use crate::consts::SYMTAB_MAX_HIERARCHY_STEPS;
use crate::tools::{FileManager, FileObject, Kind, Location};

#[derive(Debug, Clone)]
pub struct FieldSymbol {
    pub name: String,
    pub ty: JType,
    pub flags: u16,
    pub owner: String,
}

impl FieldSymbol {
    pub fn is_static(&self) -> bool {
        self.flags & ACC_STATIC != 0
    }

    pub fn is_final(&self) -> bool {
        self.flags & ACC_FINAL != 0
    }
}

#[derive(Debug, Clone)]
pub struct MethodSymbol {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub flags: u16,
    /// Declared exceptions, binary names
    pub throws: Vec<String>,
    pub owner: String,
    pub owner_is_interface: bool,
}

impl MethodSymbol {
    pub fn is_static(&self) -> bool {
        self.flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.flags & ACC_ABSTRACT != 0
    }

    pub fn is_private(&self) -> bool {
        self.flags & ACC_PRIVATE != 0
    }

    pub fn is_public(&self) -> bool {
        self.flags & ACC_PUBLIC != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_METHOD_NAME
    }

    pub fn is_default(&self) -> bool {
        self.owner_is_interface && !self.is_abstract() && !self.is_static()
    }

    pub fn params(&self) -> &[JType] {
        &self.descriptor.params
    }

    pub fn return_type(&self) -> &JType {
        &self.descriptor.ret
    }

    /// Same name and parameter types
    pub fn same_signature(&self, other: &MethodSymbol) -> bool {
        self.name == other.name && self.descriptor.params == other.descriptor.params
    }

    /// `greet(String)`, the form javac uses in diagnostics
    pub fn signature(&self) -> String {
        let name = if self.is_constructor() { simple_name(&self.owner) } else { self.name.as_str() };
        format!("{}({})", name, type_list(self.params()))
    }
}

/// A class or interface known to the compiler
#[derive(Debug, Clone)]
pub struct ClassSymbol {
    /// Binary name (`demo.Outer$Inner`)
    pub name: String,
    /// Access flags as declared; may include `ACC_PRIVATE` for member types
    pub flags: u16,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldSymbol>,
    pub methods: Vec<MethodSymbol>,
    pub from_source: bool,
}

impl ClassSymbol {
    pub fn is_interface(&self) -> bool {
        self.flags & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.flags & ACC_ABSTRACT != 0
    }

    pub fn is_final(&self) -> bool {
        self.flags & ACC_FINAL != 0
    }

    pub fn is_public(&self) -> bool {
        self.flags & ACC_PUBLIC != 0
    }

    pub fn package(&self) -> &str {
        package_of(&self.name)
    }

    pub fn simple_name(&self) -> &str {
        simple_name(&self.name)
    }

    pub fn constructors(&self) -> impl Iterator<Item = &MethodSymbol> {
        self.methods.iter().filter(|m| m.is_constructor())
    }

    pub fn declared_method(&self, name: &str, params: &[JType]) -> Option<&MethodSymbol> {
        self.methods.iter().find(|m| m.name == name && m.params() == params)
    }

    /// Flags written to the class file; member type access collapses to public or package
    pub fn class_file_flags(&self) -> u16 {
        let mut flags = self.flags & (ACC_PUBLIC | ACC_FINAL | ACC_INTERFACE | ACC_ABSTRACT);
        if !self.is_interface() {
            flags |= ACC_SUPER;
        }
        flags
    }

    fn from_class_bytes(bytes: &[u8]) -> Option<ClassSymbol> {
        let file = read_class_file(bytes).ok()?;
        let pool = &file.constant_pool;
        let name = file.class_name().ok()?;
        let is_interface = file.access_flags & ACC_INTERFACE != 0;
        let mut fields = Vec::new();
        for info in &file.fields {
            fields.push(FieldSymbol {
                name: info.name(pool).ok()?.to_string(),
                ty: JType::parse(info.descriptor(pool).ok()?).ok()?,
                flags: info.access_flags,
                owner: name.clone(),
            });
        }
        let mut methods = Vec::new();
        for info in &file.methods {
            let method_name = info.name(pool).ok()?;
            if method_name.starts_with('<') && method_name != CONSTRUCTOR_METHOD_NAME {
                continue;
            }
            methods.push(MethodSymbol {
                name: method_name.to_string(),
                descriptor: MethodDescriptor::parse(info.descriptor(pool).ok()?).ok()?,
                flags: info.access_flags,
                throws: info.exceptions(pool).ok()?,
                owner: name.clone(),
                owner_is_interface: is_interface,
            });
        }
        Some(ClassSymbol {
            super_name: file.super_class_name().ok()?,
            interfaces: file.interface_names().ok()?,
            name,
            flags: file.access_flags,
            fields,
            methods,
            from_source: false,
        })
    }
}

pub fn package_of(binary_name: &str) -> &str {
    binary_name.rsplit_once('.').map(|(package, _)| package).unwrap_or("")
}

/// Innermost simple name: `demo.Outer$Inner` gives `Inner`
pub fn simple_name(binary_name: &str) -> &str {
    let after_package = binary_name.rsplit('.').next().unwrap_or(binary_name);
    after_package.rsplit('$').next().unwrap_or(after_package)
}

/// Binary name of the top-level class enclosing `binary_name`
pub fn outermost(binary_name: &str) -> &str {
    let start = binary_name.rfind('.').map(|i| i + 1).unwrap_or(0);
    match binary_name[start..].find('$') {
        Some(offset) => &binary_name[..start + offset],
        None => binary_name,
    }
}

/// Type as javac prints it in diagnostics: simple class names
pub fn display_type(ty: &JType) -> String {
    match ty {
        JType::Class(name) => simple_name(name).to_string(),
        JType::Array(component) => format!("{}[]", display_type(component)),
        JType::Null => "<null>".to_string(),
        other => other.source_name(),
    }
}

pub fn type_list(types: &[JType]) -> String {
    types.iter().map(display_type).collect::<Vec<_>>().join(",")
}

/// Class files available in one package, by binary name
type PackageIndex = Rc<HashMap<String, Arc<dyn FileObject>>>;

pub struct Symtab<'a> {
    file_manager: &'a dyn FileManager,
    source: HashMap<String, Rc<ClassSymbol>>,
    /// Names entered from source before their members are known
    source_names: HashSet<String>,
    source_packages: HashSet<String>,
    classes: RefCell<HashMap<String, Option<Rc<ClassSymbol>>>>,
    packages: RefCell<HashMap<String, PackageIndex>>,
}

impl<'a> Symtab<'a> {
    pub fn new(file_manager: &'a dyn FileManager) -> Self {
        Self {
            file_manager,
            source: HashMap::new(),
            source_names: HashSet::new(),
            source_packages: HashSet::new(),
            classes: RefCell::new(HashMap::new()),
            packages: RefCell::new(HashMap::new()),
        }
    }

    /// Record that `name` is declared in source; false if it already was
    pub fn enter_source_name(&mut self, name: &str) -> bool {
        self.source_packages.insert(package_of(name).to_string());
        self.source_names.insert(name.to_string())
    }

    pub fn complete_source_class(&mut self, symbol: ClassSymbol) {
        self.source.insert(symbol.name.clone(), Rc::new(symbol));
    }

    /// Whether a class with this binary name exists, without completing it
    pub fn class_exists(&self, name: &str) -> bool {
        self.source_names.contains(name) || self.lookup(name).is_some()
    }

    pub fn lookup(&self, name: &str) -> Option<Rc<ClassSymbol>> {
        if let Some(symbol) = self.source.get(name) {
            return Some(symbol.clone());
        }
        if self.source_names.contains(name) {
            return None;
        }
        if let Some(cached) = self.classes.borrow().get(name) {
            return cached.clone();
        }
        let loaded = self.read_class(name);
        self.classes.borrow_mut().insert(name.to_string(), loaded.clone());
        loaded
    }

    fn read_class(&self, name: &str) -> Option<Rc<ClassSymbol>> {
        let index = self.package_index(package_of(name));
        let file = index.get(name)?;
        let bytes = match file.open_bytes() {
            Ok(bytes) => bytes,
            Err(err) => {
                log::warn!("cannot read {}: {}", file.name(), err);
                return None;
            }
        };
        match ClassSymbol::from_class_bytes(&bytes) {
            Some(symbol) if symbol.name == name => {
                log::trace!("completed {} from {}", name, file.name());
                Some(Rc::new(symbol))
            }
            _ => {
                log::warn!("bad class file {}", file.name());
                None
            }
        }
    }

    /// Class files of `package`; platform classes shadow the class path
    fn package_index(&self, package: &str) -> PackageIndex {
        if let Some(index) = self.packages.borrow().get(package) {
            return index.clone();
        }
        let mut index: HashMap<String, Arc<dyn FileObject>> = HashMap::new();
        for location in [Location::PlatformClassPath, Location::ClassPath] {
            if !self.file_manager.has_location(location) {
                continue;
            }
            match self.file_manager.list(location, package, &[Kind::Class], false) {
                Ok(files) => {
                    for file in files {
                        if let Some(name) = self.file_manager.infer_binary_name(location, file.as_ref()) {
                            index.entry(name).or_insert(file);
                        }
                    }
                }
                Err(err) => log::warn!("cannot list package '{}' in {}: {}", package, location, err),
            }
        }
        log::trace!("indexed package '{}': {} class file(s)", package, index.len());
        let index = Rc::new(index);
        self.packages.borrow_mut().insert(package.to_string(), index.clone());
        index
    }

    pub fn package_exists(&self, package: &str) -> bool {
        if self.source_packages.iter().any(|p| p == package || p.starts_with(&format!("{}.", package))) {
            return true;
        }
        !self.package_index(package).is_empty()
    }

    /// Supertypes of `name`, nearest first, without duplicates and excluding `name`
    pub fn supertypes(&self, name: &str) -> Vec<Rc<ClassSymbol>> {
        let mut seen = HashSet::new();
        seen.insert(name.to_string());
        let mut result = Vec::new();
        let mut queue = VecDeque::new();
        if let Some(symbol) = self.lookup(name) {
            queue.extend(symbol.super_name.clone());
            queue.extend(symbol.interfaces.iter().cloned());
            if symbol.is_interface() {
                queue.push_back(OBJECT.to_string());
            }
        }
        while let Some(next) = queue.pop_front() {
            if result.len() >= SYMTAB_MAX_HIERARCHY_STEPS {
                break;
            }
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(symbol) = self.lookup(&next) {
                queue.extend(symbol.super_name.clone());
                queue.extend(symbol.interfaces.iter().cloned());
                result.push(symbol);
            }
        }
        result
    }

    /// Superclass chain starting with `name`
    pub fn superclasses(&self, name: &str) -> Vec<Rc<ClassSymbol>> {
        let mut chain = Vec::new();
        let mut next = Some(name.to_string());
        while let Some(current) = next {
            if chain.len() >= SYMTAB_MAX_HIERARCHY_STEPS {
                break;
            }
            let Some(symbol) = self.lookup(&current) else { break };
            next = symbol.super_name.clone();
            chain.push(symbol);
        }
        chain
    }

    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        sub == sup || sup == OBJECT || self.supertypes(sub).iter().any(|s| s.name == sup)
    }

    /// Assignment conversion without boxing or primitive widening
    pub fn is_assignable(&self, from: &JType, to: &JType) -> bool {
        match (from, to) {
            _ if from == to => true,
            (JType::Null, _) => to.is_reference(),
            (JType::Class(sub), JType::Class(sup)) => self.is_subclass(sub, sup),
            (JType::Array(_), JType::Class(sup)) => sup == OBJECT,
            _ => false,
        }
    }

    /// Reference cast legality, a simplified form of JLS 5.5
    pub fn is_castable(&self, from: &JType, to: &JType) -> bool {
        if self.is_assignable(from, to) {
            return true;
        }
        match (from, to) {
            (JType::Class(a), JType::Class(b)) => {
                let (Some(a_sym), Some(b_sym)) = (self.lookup(a), self.lookup(b)) else {
                    return false;
                };
                if self.is_subclass(b, a) {
                    return true;
                }
                (a_sym.is_interface() && !b_sym.is_final()) || (b_sym.is_interface() && !a_sym.is_final())
            }
            (JType::Class(a), JType::Array(_)) => a == OBJECT,
            _ => false,
        }
    }

    pub fn is_checked_exception(&self, name: &str) -> bool {
        self.is_subclass(name, THROWABLE) && !self.is_subclass(name, RUNTIME_EXCEPTION) && !self.is_subclass(name, ERROR)
    }

    /// Nearest field named `name` in the superclass chain of `class`
    pub fn find_field(&self, class: &str, name: &str) -> Option<FieldSymbol> {
        self.superclasses(class).iter().find_map(|symbol| symbol.fields.iter().find(|f| f.name == name).cloned())
    }

    /// Member methods named `name`: inherited ones hidden by an override
    /// with the same parameter types are dropped
    pub fn find_methods(&self, class: &str, name: &str) -> Vec<MethodSymbol> {
        let mut found: Vec<MethodSymbol> = Vec::new();
        let Some(start) = self.lookup(class) else {
            return found;
        };
        let mut symbols = vec![start];
        symbols.extend(self.supertypes(class));
        for symbol in symbols {
            for method in symbol.methods.iter().filter(|m| m.name == name && !m.is_constructor()) {
                if found.iter().any(|seen| seen.same_signature(method)) {
                    // A concrete method beats an abstract one met earlier through an interface
                    if let Some(slot) = found.iter_mut().find(|seen| seen.same_signature(method)) {
                        if slot.is_abstract() && !method.is_abstract() && !symbol.is_interface() {
                            *slot = method.clone();
                        }
                    }
                    continue;
                }
                found.push(method.clone());
            }
        }
        found
    }

    /// Abstract methods `class` inherits without a concrete implementation
    pub fn unimplemented_methods(&self, class: &str) -> Vec<MethodSymbol> {
        let Some(start) = self.lookup(class) else {
            return Vec::new();
        };
        let mut candidates: Vec<MethodSymbol> = Vec::new();
        let mut symbols = vec![start];
        symbols.extend(self.supertypes(class));
        for symbol in &symbols {
            for method in symbol.methods.iter().filter(|m| !m.is_constructor() && !m.is_static()) {
                if !candidates.iter().any(|c| c.same_signature(method)) {
                    candidates.push(method.clone());
                }
            }
        }
        candidates
            .into_iter()
            .filter(|candidate| {
                let implemented = symbols.iter().any(|symbol| {
                    symbol
                        .declared_method(&candidate.name, candidate.params())
                        .map(|m| !m.is_abstract() && !m.is_static())
                        .unwrap_or(false)
                });
                !implemented
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::classpath::ClassPath;
    use crate::tools::StandardFileManager;

    #[test]
    fn test_platform_classes_complete_lazily() {
        let fm = StandardFileManager::new(ClassPath::new());
        let symtab = Symtab::new(&fm);
        let string = symtab.lookup("java.lang.String").unwrap();
        assert!(string.is_final());
        assert!(string.declared_method("length", &[]).is_some());
        assert!(symtab.lookup("java.lang.Missing").is_none());
        assert!(symtab.package_exists("java.lang"));
        assert!(!symtab.package_exists("nowhere"));
    }

    #[test]
    fn test_hierarchy_queries() {
        let fm = StandardFileManager::new(ClassPath::new());
        let symtab = Symtab::new(&fm);
        assert!(symtab.is_subclass("java.lang.IllegalStateException", RUNTIME_EXCEPTION));
        assert!(symtab.is_checked_exception("java.io.IOException"));
        assert!(!symtab.is_checked_exception("java.lang.IllegalStateException"));
        assert!(symtab.is_assignable(&JType::Null, &JType::string()));
        assert!(!symtab.is_assignable(&JType::Int, &JType::object()));
        assert!(symtab.is_castable(&JType::object(), &JType::string()));
        assert!(!symtab.is_castable(&JType::string(), &JType::class("java.lang.Runnable")));
        let messages = symtab.find_methods("java.lang.IllegalStateException", "getMessage");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].owner, THROWABLE);
    }

    #[test]
    fn test_names() {
        assert_eq!(simple_name("demo.Outer$Inner"), "Inner");
        assert_eq!(outermost("demo.Outer$Inner$Deep"), "demo.Outer");
        assert_eq!(package_of("Top"), "");
        assert_eq!(type_list(&[JType::string(), JType::Int]), "String,int");
    }
}
