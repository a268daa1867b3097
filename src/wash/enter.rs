//! Enter phase: class entry, import resolution and member signatures
//!
//! Corresponds to javac's `Enter`/`MemberEnter`. Each compilation unit gets a
//! [`UnitEnv`] that owns its AST, the classes it declares and the import
//! scope used to resolve simple type names.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::Arc;

use super::symtab::{outermost, package_of, simple_name, ClassSymbol, FieldSymbol, MethodSymbol, Symtab};
use super::Log;
use crate::ast::{ClassDecl, CompilationUnit, ImportDecl, Modifier, TypeRef};
use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::codegen::descriptor::{JType, MethodDescriptor, OBJECT};
use crate::consts::JAVA_LANG_PACKAGE;
use crate::tools::FileObject;

/// A class declared in source, in declaration order (outer before nested)
#[derive(Debug, Clone)]
pub struct EnteredClass {
    /// Binary name
    pub name: String,
    /// Binary name of the enclosing class
    pub outer: Option<String>,
    pub decl: Rc<ClassDecl>,
    /// Set when an earlier declaration already claimed `name`
    pub duplicate: bool,
}

#[derive(Debug, Clone)]
enum OnDemand {
    Package(String),
    /// `import demo.Outer.*;` brings in member types
    Type(String),
}

pub struct UnitEnv {
    pub file: Arc<dyn FileObject>,
    pub unit: CompilationUnit,
    pub classes: Vec<EnteredClass>,
    /// Simple name to binary name, with the import's index
    single_imports: HashMap<String, (String, usize)>,
    on_demand: Vec<(OnDemand, usize)>,
    resolved_imports: HashSet<usize>,
    used_imports: RefCell<HashSet<usize>>,
}

pub fn modifier_flags(modifiers: &[Modifier]) -> u16 {
    modifiers.iter().fold(0, |flags, modifier| {
        flags
            | match modifier {
                Modifier::Public => ACC_PUBLIC,
                Modifier::Private => ACC_PRIVATE,
                Modifier::Protected => ACC_PROTECTED,
                Modifier::Static => ACC_STATIC,
                Modifier::Final => ACC_FINAL,
                Modifier::Abstract => ACC_ABSTRACT,
                Modifier::Native => ACC_NATIVE,
                _ => 0,
            }
    })
}

/// `pkg.Outer.Inner` by the longest existing package prefix
fn resolve_fully_qualified(symtab: &Symtab, dotted: &str) -> Option<String> {
    let segments: Vec<&str> = dotted.split('.').collect();
    for split in (0..segments.len()).rev() {
        let package = segments[..split].join(".");
        let mut name = if package.is_empty() {
            segments[split].to_string()
        } else {
            format!("{}.{}", package, segments[split])
        };
        if !symtab.class_exists(&name) {
            continue;
        }
        for member in &segments[split + 1..] {
            name = format!("{}${}", name, member);
            if !symtab.class_exists(&name) {
                return None;
            }
        }
        return Some(name);
    }
    None
}

fn cannot_find_class(name: &str, current: Option<&str>) -> String {
    match current {
        Some(current) => format!(
            "cannot find symbol\n  symbol:   class {}\n  location: class {}",
            name,
            simple_name(current)
        ),
        None => format!("cannot find symbol\n  symbol: class {}", name),
    }
}

impl UnitEnv {
    pub fn new(file: Arc<dyn FileObject>, unit: CompilationUnit) -> Self {
        let mut classes = Vec::new();
        fn walk(decl: &ClassDecl, name: String, outer: Option<String>, out: &mut Vec<EnteredClass>) {
            out.push(EnteredClass { name: name.clone(), outer, decl: Rc::new(decl.clone()), duplicate: false });
            for member in decl.member_types() {
                walk(member, format!("{}${}", name, member.name), Some(name.clone()), out);
            }
        }
        for decl in &unit.type_decls {
            walk(decl, unit.binary_name_of(&decl.name), None, &mut classes);
        }
        Self {
            file,
            unit,
            classes,
            single_imports: HashMap::new(),
            on_demand: Vec::new(),
            resolved_imports: HashSet::new(),
            used_imports: RefCell::new(HashSet::new()),
        }
    }

    pub fn package(&self) -> &str {
        self.unit.package_name()
    }

    /// Register the declared classes with the symbol table
    pub fn enter_names(&mut self, symtab: &mut Symtab, log: &Log) {
        for class in &mut self.classes {
            if symtab.enter_source_name(&class.name) {
                continue;
            }
            class.duplicate = true;
            let message = match &class.outer {
                Some(outer) => format!("class {} is already defined in class {}", class.decl.name, simple_name(outer)),
                None => format!("duplicate class: {}", class.name.replace('$', ".")),
            };
            log.error(&self.file, class.decl.name_span, message);
        }
    }

    /// The unit must declare the class its file object was created for
    pub fn check_declared_name(&self, log: &Log) {
        let Some(expected) = self.file.binary_name() else {
            return;
        };
        if self.classes.iter().any(|c| c.outer.is_none() && c.name == expected) {
            return;
        }
        let expected_simple = simple_name(&expected);
        let public = self.unit.type_decls.iter().find(|d| d.has_modifier(Modifier::Public));
        match public {
            Some(decl) if decl.name != expected_simple => log.error(
                &self.file,
                decl.name_span,
                format!("class {} is public, should be declared in a file named {}.java", decl.name, decl.name),
            ),
            _ => {
                let at = self.unit.type_decls.first().map(|d| d.name_span).unwrap_or(self.unit.span);
                log.error(&self.file, at, format!("{} does not declare class {}", self.file.name(), expected));
            }
        }
    }

    pub fn resolve_imports(&mut self, symtab: &Symtab, log: &Log) {
        for (index, import) in self.unit.imports.iter().enumerate() {
            if import.is_wildcard {
                if symtab.package_exists(&import.name) {
                    self.on_demand.push((OnDemand::Package(import.name.clone()), index));
                } else if let Some(owner) = resolve_fully_qualified(symtab, &import.name) {
                    self.on_demand.push((OnDemand::Type(owner), index));
                } else {
                    log.error(&self.file, import.span, format!("package {} does not exist", import.name));
                    continue;
                }
                self.resolved_imports.insert(index);
                continue;
            }
            let Some(binary) = resolve_fully_qualified(symtab, &import.name) else {
                let (package, simple) = import.name.rsplit_once('.').unwrap_or(("", import.name.as_str()));
                let message = if symtab.package_exists(package) {
                    format!("cannot find symbol\n  symbol:   class {}\n  location: package {}", simple, package)
                } else {
                    format!("package {} does not exist", package)
                };
                log.error(&self.file, import.span, message);
                continue;
            };
            let simple = simple_name(&binary).to_string();
            match self.single_imports.get(&simple) {
                Some((existing, _)) if *existing != binary => {
                    log.error(
                        &self.file,
                        import.span,
                        format!(
                            "a type with the same simple name {} is already defined by the single-type-import of {}",
                            simple,
                            existing.replace('$', ".")
                        ),
                    );
                }
                _ => {
                    self.single_imports.insert(simple, (binary, index));
                    self.resolved_imports.insert(index);
                }
            }
        }
    }

    fn mark_used(&self, index: usize) {
        self.used_imports.borrow_mut().insert(index);
    }

    /// Imports that resolved but were never needed
    pub fn unused_imports(&self) -> Vec<&ImportDecl> {
        let used = self.used_imports.borrow();
        self.unit
            .imports
            .iter()
            .enumerate()
            .filter(|(index, _)| self.resolved_imports.contains(index) && !used.contains(index))
            .map(|(_, import)| import)
            .collect()
    }

    /// `@SuppressWarnings("all")` or `("unused")` on a top-level class
    pub fn suppresses_unused(&self) -> bool {
        self.unit.type_decls.iter().any(|decl| {
            decl.annotations
                .iter()
                .filter(|a| a.simple_name() == "SuppressWarnings")
                .any(|a| a.string_values().iter().any(|v| *v == "all" || *v == "unused"))
        })
    }

    /// Resolve a simple type name as seen from inside `current`
    fn resolve_simple(&self, symtab: &Symtab, name: &str, current: Option<&str>) -> Result<Option<String>, String> {
        let mut scope = current;
        while let Some(class) = scope {
            let candidate = format!("{}${}", class, name);
            if symtab.class_exists(&candidate) {
                return Ok(Some(candidate));
            }
            scope = class.rsplit_once('$').map(|(outer, _)| outer);
        }
        if let Some((binary, index)) = self.single_imports.get(name) {
            self.mark_used(*index);
            return Ok(Some(binary.clone()));
        }
        let same_package = self.unit.binary_name_of(name);
        if symtab.class_exists(&same_package) {
            return Ok(Some(same_package));
        }
        let mut matches: Vec<(String, Option<usize>)> = Vec::new();
        for (on_demand, index) in &self.on_demand {
            let candidate = match on_demand {
                OnDemand::Package(package) => format!("{}.{}", package, name),
                OnDemand::Type(owner) => format!("{}${}", owner, name),
            };
            if symtab.class_exists(&candidate) && !matches.iter().any(|(m, _)| *m == candidate) {
                matches.push((candidate, Some(*index)));
            }
        }
        let implicit = format!("{}.{}", JAVA_LANG_PACKAGE, name);
        if !matches.iter().any(|(m, _)| *m == implicit) && symtab.class_exists(&implicit) {
            matches.push((implicit, None));
        }
        match matches.len() {
            0 => Ok(None),
            1 => {
                let (binary, index) = matches.remove(0);
                if let Some(index) = index {
                    self.mark_used(index);
                }
                Ok(Some(binary))
            }
            _ => Err(format!(
                "reference to {} is ambiguous\n  both class {} in {} and class {} in {} match",
                name,
                matches[0].0.replace('$', "."),
                package_of(&matches[0].0),
                matches[1].0.replace('$', "."),
                package_of(&matches[1].0)
            )),
        }
    }

    /// Resolve a possibly qualified class name to a binary name
    pub fn resolve_class(&self, symtab: &Symtab, name: &str, current: Option<&str>) -> Result<String, String> {
        let Some((first, rest)) = name.split_once('.') else {
            return self.resolve_simple(symtab, name, current)?.ok_or_else(|| cannot_find_class(name, current));
        };
        if let Some(mut binary) = self.resolve_simple(symtab, first, current)? {
            for member in rest.split('.') {
                binary = format!("{}${}", binary, member);
                if !symtab.class_exists(&binary) {
                    return Err(cannot_find_class(name, current));
                }
            }
            return Ok(binary);
        }
        if let Some(binary) = resolve_fully_qualified(symtab, name) {
            return Ok(binary);
        }
        let package = name.rsplit_once('.').map(|(package, _)| package).unwrap_or("");
        if symtab.package_exists(package) {
            Err(cannot_find_class(name, current))
        } else {
            Err(format!("package {} does not exist", package))
        }
    }

    /// Resolve a type name if it names a class; `None` instead of an error
    pub fn try_resolve_class(&self, symtab: &Symtab, name: &str, current: Option<&str>) -> Option<String> {
        self.resolve_class(symtab, name, current).ok()
    }

    pub fn resolve_type(&self, symtab: &Symtab, ty: &TypeRef, current: Option<&str>) -> Result<JType, String> {
        if ty.array_dims > 0 {
            return Err("array types are not supported".to_string());
        }
        match JType::from_keyword(&ty.name) {
            Some(primitive @ (JType::Int | JType::Boolean | JType::Void)) => return Ok(primitive),
            Some(_) => return Err(format!("type {} is not supported", ty.name)),
            None => {}
        }
        let binary = self.resolve_class(symtab, &ty.name, current)?;
        check_class_access(symtab, &binary, current)?;
        Ok(JType::Class(binary))
    }

    /// Build the member signatures of `class`
    pub fn member_enter(&self, class: &EnteredClass, symtab: &Symtab, log: &Log) -> ClassSymbol {
        let decl = &class.decl;
        let current = Some(class.name.as_str());
        let in_interface_owner = class
            .outer
            .as_deref()
            .and_then(|outer| self.classes.iter().find(|c| c.name == outer))
            .map(|outer| outer.decl.is_interface())
            .unwrap_or(false);

        let mut flags = modifier_flags(&decl.modifiers) & (ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED | ACC_FINAL | ACC_ABSTRACT | ACC_STATIC);
        if decl.is_interface() {
            flags |= ACC_INTERFACE | ACC_ABSTRACT;
        }
        if in_interface_owner {
            flags |= ACC_PUBLIC | ACC_STATIC;
        }

        let resolve_or_report = |ty: &TypeRef| -> Option<JType> {
            match self.resolve_type(symtab, ty, current) {
                Ok(resolved) => Some(resolved),
                Err(message) => {
                    log.error(&self.file, ty.span, message);
                    None
                }
            }
        };
        let resolve_class_or_report = |ty: &TypeRef| -> Option<String> {
            match resolve_or_report(ty)? {
                JType::Class(name) => Some(name),
                other => {
                    log.error(&self.file, ty.span, format!("unexpected type\n  required: class\n  found:    {}", other));
                    None
                }
            }
        };

        let super_name = if decl.is_interface() {
            Some(OBJECT.to_string())
        } else {
            match &decl.extends {
                Some(ty) => Some(resolve_class_or_report(ty).unwrap_or_else(|| OBJECT.to_string())),
                None => Some(OBJECT.to_string()),
            }
        };
        let interfaces: Vec<String> = decl.interfaces.iter().filter_map(|ty| resolve_class_or_report(ty)).collect();

        let mut fields = Vec::new();
        for field in decl.fields() {
            let ty = resolve_or_report(&field.type_ref).unwrap_or_else(JType::object);
            let mut field_flags = modifier_flags(&field.modifiers) & (ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED | ACC_STATIC | ACC_FINAL);
            if decl.is_interface() {
                field_flags |= ACC_PUBLIC | ACC_STATIC | ACC_FINAL;
            }
            fields.push(FieldSymbol { name: field.name.clone(), ty, flags: field_flags, owner: class.name.clone() });
        }

        let mut methods = Vec::new();
        for method in decl.methods() {
            let ret = resolve_or_report(&method.return_type).unwrap_or_else(JType::object);
            let params = method
                .parameters
                .iter()
                .map(|p| resolve_or_report(&p.type_ref).unwrap_or_else(JType::object))
                .collect();
            let throws = method.throws.iter().filter_map(|ty| resolve_class_or_report(ty)).collect();
            let mut method_flags = modifier_flags(&method.modifiers);
            if decl.is_interface() {
                method_flags |= ACC_PUBLIC;
                if !method.has_modifier(Modifier::Default) && !method.has_modifier(Modifier::Static) {
                    method_flags |= ACC_ABSTRACT;
                }
            }
            methods.push(MethodSymbol {
                name: method.name.clone(),
                descriptor: MethodDescriptor::new(params, ret),
                flags: method_flags,
                throws,
                owner: class.name.clone(),
                owner_is_interface: decl.is_interface(),
            });
        }
        for ctor in decl.constructors() {
            let params = ctor
                .parameters
                .iter()
                .map(|p| resolve_or_report(&p.type_ref).unwrap_or_else(JType::object))
                .collect();
            methods.push(MethodSymbol {
                name: CONSTRUCTOR_METHOD_NAME.to_string(),
                descriptor: MethodDescriptor::new(params, JType::Void),
                flags: modifier_flags(&ctor.modifiers) & (ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED),
                throws: ctor.throws.iter().filter_map(|ty| resolve_class_or_report(ty)).collect(),
                owner: class.name.clone(),
                owner_is_interface: false,
            });
        }
        if !decl.is_interface() && decl.constructors().next().is_none() {
            methods.push(MethodSymbol {
                name: CONSTRUCTOR_METHOD_NAME.to_string(),
                descriptor: MethodDescriptor::new(Vec::new(), JType::Void),
                flags: flags & (ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED),
                throws: Vec::new(),
                owner: class.name.clone(),
                owner_is_interface: false,
            });
        }

        log::trace!("member enter {}: {} field(s), {} method(s)", class.name, fields.len(), methods.len());
        ClassSymbol { name: class.name.clone(), flags, super_name, interfaces, fields, methods, from_source: true }
    }
}

/// Class-level access from code in `current`
pub fn check_class_access(symtab: &Symtab, binary: &str, current: Option<&str>) -> Result<(), String> {
    let Some(symbol) = symtab.lookup(binary) else {
        return Ok(());
    };
    let from_outermost = current.map(outermost);
    if symbol.flags & ACC_PRIVATE != 0 && from_outermost != Some(outermost(binary)) {
        let owner = binary.rsplit_once('$').map(|(owner, _)| owner).unwrap_or(binary);
        return Err(format!("{} has private access in {}", symbol.simple_name(), simple_name(owner)));
    }
    let from_package = current.map(package_of).unwrap_or("");
    let accessible = symbol.flags & (ACC_PUBLIC | ACC_PROTECTED) != 0 || symbol.package() == from_package;
    if !accessible {
        return Err(format!(
            "{} is not public in {}; cannot be accessed from outside package",
            binary.replace('$', "."),
            symbol.package()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::classpath::ClassPath;
    use crate::parser::parse_java;
    use crate::tools::{DiagnosticCollector, SourceFile, StandardFileManager};

    fn env(class_name: &str, text: &str) -> UnitEnv {
        let file: Arc<dyn FileObject> = Arc::new(SourceFile::new(class_name, text));
        UnitEnv::new(file, parse_java(text).unwrap())
    }

    #[test]
    fn test_type_resolution_order() {
        let fm = StandardFileManager::new(ClassPath::new());
        let mut symtab = Symtab::new(&fm);
        let diagnostics = DiagnosticCollector::new();
        let log = Log::new(&diagnostics, true);
        let mut env = env(
            "demo.Outer",
            "package demo; import java.io.*; import java.lang.Runnable; class Outer { static class String {} }",
        );
        env.enter_names(&mut symtab, &log);
        env.resolve_imports(&symtab, &log);
        assert_eq!(log.error_count(), 0);

        let inside = Some("demo.Outer");
        assert_eq!(env.resolve_class(&symtab, "String", inside).unwrap(), "demo.Outer$String");
        assert_eq!(env.resolve_class(&symtab, "String", None).unwrap(), "java.lang.String");
        assert_eq!(env.resolve_class(&symtab, "IOException", inside).unwrap(), "java.io.IOException");
        assert_eq!(env.resolve_class(&symtab, "Outer.String", inside).unwrap(), "demo.Outer$String");
        assert_eq!(env.resolve_class(&symtab, "java.lang.Object", inside).unwrap(), OBJECT);
        let err = env.resolve_class(&symtab, "Missing", inside).unwrap_err();
        assert!(err.starts_with("cannot find symbol"));
        assert_eq!(env.resolve_class(&symtab, "nope.Thing", inside).unwrap_err(), "package nope does not exist");

        let unused: Vec<&str> = env.unused_imports().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(unused, vec!["java.lang.Runnable"]);
    }

    #[test]
    fn test_member_enter_adds_default_constructor() {
        let fm = StandardFileManager::new(ClassPath::new());
        let mut symtab = Symtab::new(&fm);
        let diagnostics = DiagnosticCollector::new();
        let log = Log::new(&diagnostics, true);
        let mut env = env("demo.Api", "package demo; public interface Api { String name(); default int size() { return 0; } }");
        env.enter_names(&mut symtab, &log);
        let symbol = env.member_enter(&env.classes[0], &symtab, &log);
        assert!(symbol.is_interface());
        assert!(symbol.declared_method("name", &[]).unwrap().is_abstract());
        assert!(symbol.declared_method("size", &[]).unwrap().is_default());
        assert_eq!(symbol.constructors().count(), 0);

        let mut env = self::env("demo.Impl", "package demo; public class Impl {}");
        env.enter_names(&mut symtab, &log);
        let symbol = env.member_enter(&env.classes[0], &symtab, &log);
        assert_eq!(symbol.constructors().next().unwrap().flags, ACC_PUBLIC);
        assert_eq!(symbol.super_name.as_deref(), Some(OBJECT));
    }

    #[test]
    fn test_duplicate_class_and_wrong_name() {
        let fm = StandardFileManager::new(ClassPath::new());
        let mut symtab = Symtab::new(&fm);
        let diagnostics = DiagnosticCollector::new();
        let log = Log::new(&diagnostics, true);
        let mut env = env("demo.Greeter", "package demo; public class Other {} class Other {}");
        env.enter_names(&mut symtab, &log);
        env.check_declared_name(&log);
        let messages: Vec<String> = diagnostics.errors().into_iter().map(|d| d.message).collect();
        assert_eq!(
            messages,
            vec!["duplicate class: demo.Other", "class Other is public, should be declared in a file named Other.java"]
        );
    }
}
