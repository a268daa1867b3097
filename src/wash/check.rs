//! Class-level checks run after member enter
//!
//! Covers what javac's `Check` and the override parts of `Attr` report for
//! declarations: modifier combinations, duplicate members, supertype rules,
//! overriding and unimplemented abstract methods. Method bodies are checked
//! during code generation.

use std::collections::HashSet;

use super::enter::{EnteredClass, UnitEnv};
use super::symtab::{simple_name, ClassSymbol, MethodSymbol, Symtab};
use super::Log;
use crate::ast::{ClassDecl, MethodDecl, Modifier};
use crate::codegen::defs::access_flags::*;
use crate::parser::Span;

fn access_rank(flags: u16) -> u8 {
    if flags & ACC_PUBLIC != 0 {
        3
    } else if flags & ACC_PROTECTED != 0 {
        2
    } else if flags & ACC_PRIVATE != 0 {
        0
    } else {
        1
    }
}

fn access_name(flags: u16) -> &'static str {
    match access_rank(flags) {
        3 => "public",
        2 => "protected",
        0 => "private",
        _ => "package",
    }
}

/// `-source 1.7` for old releases, `-source 11` for new ones
fn source_option(version: u8) -> String {
    if version <= 8 {
        format!("-source 1.{}", version)
    } else {
        format!("-source {}", version)
    }
}

pub struct ClassChecker<'a, 's> {
    env: &'a UnitEnv,
    symtab: &'a Symtab<'s>,
    log: &'a Log<'a>,
    target_version: u8,
}

impl<'a, 's> ClassChecker<'a, 's> {
    pub fn new(env: &'a UnitEnv, symtab: &'a Symtab<'s>, log: &'a Log<'a>, target_version: u8) -> Self {
        Self { env, symtab, log, target_version }
    }

    fn error(&self, span: Span, message: impl Into<String>) {
        self.log.error(&self.env.file, span, message);
    }

    pub fn check(&self, class: &EnteredClass) {
        let Some(symbol) = self.symtab.lookup(&class.name) else {
            return;
        };
        let decl = &class.decl;
        self.check_class_modifiers(class, &symbol);
        if !self.check_supertypes(decl, &symbol) {
            return;
        }
        self.check_fields(decl, &symbol);
        self.check_methods(decl, &symbol);
        self.check_constructors(decl, &symbol);
        self.check_implemented(decl, &symbol);
    }

    fn check_class_modifiers(&self, class: &EnteredClass, symbol: &ClassSymbol) {
        let decl = &class.decl;
        if decl.has_modifier(Modifier::Abstract) && decl.has_modifier(Modifier::Final) {
            self.error(decl.name_span, "illegal combination of modifiers: abstract and final");
        }
        if class.outer.is_none() {
            for modifier in [Modifier::Private, Modifier::Protected, Modifier::Static] {
                if decl.has_modifier(modifier) {
                    self.error(decl.name_span, format!("modifier {} not allowed here", modifier));
                }
            }
        } else if symbol.flags & ACC_STATIC == 0 && !symbol.is_interface() {
            self.error(decl.name_span, format!("inner classes are not supported; declare {} static", decl.name));
        }
    }

    fn is_cyclic(&self, name: &str) -> bool {
        let mut seen = HashSet::new();
        let mut pending = vec![name.to_string()];
        while let Some(next) = pending.pop() {
            let Some(symbol) = self.symtab.lookup(&next) else { continue };
            for parent in symbol.super_name.iter().chain(symbol.interfaces.iter()) {
                if parent == name {
                    return true;
                }
                if seen.insert(parent.clone()) {
                    pending.push(parent.clone());
                }
            }
        }
        false
    }

    /// False when the hierarchy is broken and member checks would only cascade
    fn check_supertypes(&self, decl: &ClassDecl, symbol: &ClassSymbol) -> bool {
        if self.is_cyclic(&symbol.name) {
            self.error(decl.name_span, format!("cyclic inheritance involving {}", symbol.name.replace('$', ".")));
            return false;
        }
        if let (Some(extends), Some(super_name)) = (&decl.extends, &symbol.super_name) {
            if let Some(super_symbol) = self.symtab.lookup(super_name) {
                if super_symbol.is_interface() {
                    self.error(extends.span, "no interface expected here");
                    return false;
                }
                if super_symbol.is_final() {
                    self.error(extends.span, format!("cannot inherit from final {}", super_symbol.simple_name()));
                    return false;
                }
            }
        }
        let mut ok = true;
        for (ty, name) in decl.interfaces.iter().zip(&symbol.interfaces) {
            if let Some(interface) = self.symtab.lookup(name) {
                if !interface.is_interface() {
                    self.error(ty.span, "interface expected here");
                    ok = false;
                }
            }
        }
        ok
    }

    fn check_fields(&self, decl: &ClassDecl, symbol: &ClassSymbol) {
        let mut seen = HashSet::new();
        for field in decl.fields() {
            if !seen.insert(field.name.as_str()) {
                self.error(
                    field.span,
                    format!("variable {} is already defined in class {}", field.name, symbol.simple_name()),
                );
                continue;
            }
            if decl.is_interface() {
                self.error(field.span, "interface fields are not supported");
            } else if field.has_modifier(Modifier::Static) {
                self.error(field.span, "static fields are not supported");
            }
        }
    }

    fn check_methods(&self, decl: &ClassDecl, symbol: &ClassSymbol) {
        let declared: Vec<&MethodSymbol> = symbol.methods.iter().filter(|m| !m.is_constructor()).collect();
        for (index, (method, method_symbol)) in decl.methods().zip(declared.iter()).enumerate() {
            if declared[..index].iter().any(|earlier| earlier.same_signature(method_symbol)) {
                self.error(
                    method.name_span,
                    format!("method {} is already defined in class {}", method_symbol.signature(), symbol.simple_name()),
                );
                continue;
            }
            if decl.is_interface() {
                self.check_interface_method(method);
            } else {
                self.check_class_method(method);
            }
            self.check_override(decl, symbol, method, method_symbol);
        }
    }

    fn check_interface_method(&self, method: &MethodDecl) {
        for modifier in [Modifier::Private, Modifier::Protected, Modifier::Final] {
            if method.has_modifier(modifier) {
                self.error(method.name_span, format!("modifier {} not allowed here", modifier));
                return;
            }
        }
        let is_default = method.has_modifier(Modifier::Default);
        let is_static = method.has_modifier(Modifier::Static);
        if is_default || is_static {
            if self.target_version < 8 {
                let (what, plural) = if is_default { ("default", "default methods") } else { ("static interface", "static interface methods") };
                self.error(
                    method.name_span,
                    format!(
                        "{} are not supported in {}\n  (use -source 8 or higher to enable {} methods)",
                        plural,
                        source_option(self.target_version),
                        what
                    ),
                );
            }
            if method.body.is_none() {
                self.error(method.name_span, "missing method body, or declare abstract");
            }
        } else if method.body.is_some() {
            self.error(method.name_span, "interface abstract methods cannot have body");
        }
    }

    fn check_class_method(&self, method: &MethodDecl) {
        if method.has_modifier(Modifier::Default) {
            self.error(method.name_span, "modifier default not allowed here");
            return;
        }
        if method.has_modifier(Modifier::Native) {
            self.error(method.name_span, "native methods are not supported");
            return;
        }
        if method.has_modifier(Modifier::Abstract) {
            for modifier in [Modifier::Private, Modifier::Static, Modifier::Final] {
                if method.has_modifier(modifier) {
                    self.error(
                        method.name_span,
                        format!("illegal combination of modifiers: abstract and {}", modifier),
                    );
                    return;
                }
            }
            if method.body.is_some() {
                self.error(method.name_span, "abstract methods cannot have a body");
            }
        } else if method.body.is_none() {
            self.error(method.name_span, "missing method body, or declare abstract");
        }
    }

    fn overridden_methods(&self, symbol: &ClassSymbol, method: &MethodSymbol) -> Vec<MethodSymbol> {
        self.symtab
            .supertypes(&symbol.name)
            .iter()
            .filter_map(|sup| sup.declared_method(&method.name, method.params()).cloned())
            .filter(|m| !m.is_private() && !m.is_constructor())
            .filter(|m| !(m.is_static() && m.owner_is_interface))
            .collect()
    }

    fn check_override(&self, decl: &ClassDecl, symbol: &ClassSymbol, method: &MethodDecl, method_symbol: &MethodSymbol) {
        let overridden = if method_symbol.is_private() || (decl.is_interface() && method_symbol.is_static()) {
            Vec::new()
        } else {
            self.overridden_methods(symbol, method_symbol)
        };
        if let Some(annotation) = method.annotations.iter().find(|a| a.simple_name() == "Override") {
            if method_symbol.is_static() {
                self.error(annotation.span, "static methods cannot be annotated with @Override");
            } else if overridden.is_empty() {
                self.error(annotation.span, "method does not override or implement a method from a supertype");
            }
        }
        for base in &overridden {
            if let Some(problem) = self.override_problem(method_symbol, base) {
                let verb = if base.owner_is_interface && !symbol.is_interface() { "implement" } else { "override" };
                self.error(
                    method.name_span,
                    format!(
                        "{} in {} cannot {} {} in {}\n  {}",
                        method_symbol.signature(),
                        symbol.simple_name(),
                        verb,
                        base.signature(),
                        simple_name(&base.owner),
                        problem
                    ),
                );
                return;
            }
        }
    }

    fn override_problem(&self, method: &MethodSymbol, base: &MethodSymbol) -> Option<String> {
        if method.is_static() && !base.is_static() {
            return Some("overriding method is static".to_string());
        }
        if !method.is_static() && base.is_static() {
            return Some("overridden method is static".to_string());
        }
        if base.flags & ACC_FINAL != 0 {
            return Some("overridden method is final".to_string());
        }
        let (ret, base_ret) = (method.return_type(), base.return_type());
        let compatible = ret == base_ret || (ret.is_reference() && base_ret.is_reference() && self.symtab.is_assignable(ret, base_ret));
        if !compatible {
            return Some(format!(
                "return type {} is not compatible with {}",
                super::symtab::display_type(ret),
                super::symtab::display_type(base_ret)
            ));
        }
        if access_rank(method.flags) < access_rank(base.flags) {
            return Some(format!("attempting to assign weaker access privileges; was {}", access_name(base.flags)));
        }
        for thrown in &method.throws {
            if !self.symtab.is_checked_exception(thrown) {
                continue;
            }
            if !base.throws.iter().any(|allowed| self.symtab.is_subclass(thrown, allowed)) {
                return Some(format!("overridden method does not throw {}", simple_name(thrown)));
            }
        }
        None
    }

    fn check_constructors(&self, decl: &ClassDecl, symbol: &ClassSymbol) {
        let declared: Vec<&MethodSymbol> = symbol.constructors().collect();
        for (index, (ctor, ctor_symbol)) in decl.constructors().zip(declared.iter()).enumerate() {
            if ctor.name != decl.name {
                self.error(ctor.span, "invalid method declaration; return type required");
                continue;
            }
            if declared[..index].iter().any(|earlier| earlier.same_signature(ctor_symbol)) {
                self.error(
                    ctor.span,
                    format!(
                        "constructor {} is already defined in class {}",
                        ctor_symbol.signature(),
                        symbol.simple_name()
                    ),
                );
            }
        }
    }

    fn check_implemented(&self, decl: &ClassDecl, symbol: &ClassSymbol) {
        if symbol.is_interface() || symbol.is_abstract() {
            return;
        }
        if let Some(missing) = self.symtab.unimplemented_methods(&symbol.name).into_iter().find(|m| m.is_abstract()) {
            self.error(
                decl.name_span,
                format!(
                    "{} is not abstract and does not override abstract method {} in {}",
                    symbol.simple_name(),
                    missing.signature(),
                    simple_name(&missing.owner)
                ),
            );
        }
    }
}
