//! Reflected type metadata
//!
//! [`Class::reflect`] derives metadata from a loaded class. The same types
//! can be built by hand when the contract was never compiled in-process.

use std::collections::HashSet;
use std::sync::Arc;

use super::class::{Class, Method};
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::codegen::descriptor::{JType, MethodDescriptor, OBJECT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMeta {
    pub name: String,
    pub return_type: JType,
    pub parameter_types: Vec<JType>,
    /// Checked exceptions from the `throws` clause, binary names
    pub exception_types: Vec<String>,
    pub is_public: bool,
    pub is_static: bool,
    pub is_default: bool,
    pub is_abstract: bool,
}

impl MethodMeta {
    /// A public abstract method
    pub fn new(name: impl Into<String>, return_type: JType) -> Self {
        Self {
            name: name.into(),
            return_type,
            parameter_types: Vec::new(),
            exception_types: Vec::new(),
            is_public: true,
            is_static: false,
            is_default: false,
            is_abstract: true,
        }
    }

    pub fn param(mut self, ty: JType) -> Self {
        self.parameter_types.push(ty);
        self
    }

    pub fn throws(mut self, exception: impl Into<String>) -> Self {
        self.exception_types.push(exception.into());
        self
    }

    pub fn into_default(mut self) -> Self {
        self.is_default = true;
        self.is_abstract = false;
        self
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self.is_abstract = false;
        self
    }

    pub fn into_concrete(mut self) -> Self {
        self.is_abstract = false;
        self
    }

    pub fn descriptor(&self) -> MethodDescriptor {
        MethodDescriptor::new(self.parameter_types.clone(), self.return_type.clone())
    }

    pub fn is_void(&self) -> bool {
        self.return_type.is_void()
    }

    /// Whether a generated adapter must implement this method
    pub fn needs_adapter(&self) -> bool {
        self.is_public && !self.is_default && !self.is_static
    }

    /// `greet(java.lang.String)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.parameter_types.iter().map(JType::source_name).collect();
        format!("{}({})", self.name, params.join(","))
    }

    fn from_method(method: &Method, in_interface: bool) -> Self {
        Self {
            name: method.name.clone(),
            return_type: method.descriptor.ret.clone(),
            parameter_types: method.descriptor.params.clone(),
            exception_types: method.exceptions.clone(),
            is_public: method.is_public(),
            is_static: method.is_static(),
            is_default: in_interface && !method.is_abstract() && !method.is_static(),
            is_abstract: method.is_abstract(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMeta {
    /// Binary name (`demo.Outer$Inner`)
    pub name: String,
    pub is_interface: bool,
    pub methods: Vec<MethodMeta>,
}

impl TypeMeta {
    pub fn interface(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_interface: true, methods: Vec::new() }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_interface: false, methods: Vec::new() }
    }

    pub fn method(mut self, method: MethodMeta) -> Self {
        self.methods.push(method);
        self
    }

    /// Name as spelled in Java source
    pub fn source_name(&self) -> String {
        self.name.replace('$', ".")
    }

    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodMeta> + 'a {
        self.methods.iter().filter(move |m| m.name == name)
    }
}

impl Class {
    /// Public methods of this type: declared ones first, then inherited ones
    /// from the superclass chain and superinterfaces, each signature once
    pub fn reflect(self: &Arc<Self>) -> TypeMeta {
        let mut seen = HashSet::new();
        let mut methods = Vec::new();
        let mut collect = |class: &Arc<Class>| {
            for method in class.declared_methods() {
                if !method.is_public() || method.name == CONSTRUCTOR_METHOD_NAME || method.name.starts_with('<') {
                    continue;
                }
                if seen.insert((method.name.clone(), method.raw_descriptor.clone())) {
                    methods.push(MethodMeta::from_method(method, class.is_interface()));
                }
            }
        };
        if self.is_interface() {
            collect(self);
        } else {
            for class in self.ancestors() {
                collect(&class);
            }
        }
        for interface in self.all_interfaces() {
            if interface.name() != OBJECT {
                collect(&interface);
            }
        }
        TypeMeta { name: self.name().to_string(), is_interface: self.is_interface(), methods }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::loader::bootstrap_loader;

    #[test]
    fn test_reflect_interface() {
        let closeable = bootstrap_loader().load_class("java.lang.AutoCloseable").unwrap().reflect();
        assert!(closeable.is_interface);
        assert_eq!(closeable.methods.len(), 1);
        assert_eq!(closeable.methods[0].exception_types, vec!["java.lang.Exception"]);
        assert!(closeable.methods[0].needs_adapter());
    }

    #[test]
    fn test_reflect_class_includes_inherited_methods() {
        let meta = bootstrap_loader().load_class("java.lang.IllegalStateException").unwrap().reflect();
        assert!(meta.methods_named("getMessage").next().is_some());
        assert!(meta.methods_named("hashCode").next().is_some());
        assert!(meta.methods_named("<init>").next().is_none());
    }

    #[test]
    fn test_hand_built_metadata() {
        let greet = MethodMeta::new("greet", JType::string()).param(JType::string());
        assert_eq!(greet.signature(), "greet(java.lang.String)");
        assert!(!MethodMeta::new("helper", JType::Void).into_default().needs_adapter());
        assert_eq!(TypeMeta::interface("demo.Outer$Api").source_name(), "demo.Outer.Api");
    }
}
