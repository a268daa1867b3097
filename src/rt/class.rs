//! Classes defined from class file bytes

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::error::{Result, RuntimeError};
use super::interp::Interpreter;
use super::loader::ClassLoader;
use super::value::{Object, ObjectRef, Value};
use crate::codegen::attribute::CodeAttribute;
use crate::codegen::constpool::ConstantPool;
use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::codegen::descriptor::{JType, MethodDescriptor, OBJECT};
use crate::codegen::error::ClassFormatError;
use crate::codegen::reader::read_class_file;
use crate::consts::SYMTAB_MAX_HIERARCHY_STEPS;

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: JType,
    pub flags: u16,
}

#[derive(Debug)]
pub struct Method {
    pub name: String,
    pub descriptor: MethodDescriptor,
    pub raw_descriptor: String,
    pub flags: u16,
    pub code: Option<CodeAttribute>,
    /// Declared checked exceptions, binary names
    pub exceptions: Vec<String>,
    /// Binary name of the declaring class
    pub owner: String,
}

impl Method {
    pub fn is_static(&self) -> bool {
        self.flags & ACC_STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.flags & ACC_ABSTRACT != 0
    }

    pub fn is_native(&self) -> bool {
        self.flags & ACC_NATIVE != 0
    }

    pub fn is_public(&self) -> bool {
        self.flags & ACC_PUBLIC != 0
    }

    pub fn is_private(&self) -> bool {
        self.flags & ACC_PRIVATE != 0
    }

    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_METHOD_NAME
    }

    /// `demo.Greeter.greet(Ljava/lang/String;)Ljava/lang/String;`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}{}", self.owner, self.name, self.raw_descriptor)
    }
}

pub struct Class {
    name: String,
    flags: u16,
    super_class: Option<Arc<Class>>,
    interfaces: Vec<Arc<Class>>,
    fields: Vec<Field>,
    methods: Vec<Arc<Method>>,
    pool: ConstantPool,
    loader: Arc<dyn ClassLoader>,
    source_file: Option<String>,
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("loader", &self.loader.name())
            .field("super", &self.super_class.as_ref().map(|c| c.name()))
            .finish()
    }
}

fn format_error(class: &str) -> impl Fn(ClassFormatError) -> RuntimeError + '_ {
    move |source| RuntimeError::ClassFormat { class: class.to_string(), source }
}

impl Class {
    /// Define a class from its bytes. Supertypes are loaded through `loader`.
    pub fn define(loader: Arc<dyn ClassLoader>, bytes: &[u8], expected_name: Option<&str>) -> Result<Arc<Class>> {
        let label = expected_name.unwrap_or("<unnamed>");
        let file = read_class_file(bytes).map_err(format_error(label))?;
        let name = file.class_name().map_err(format_error(label))?;
        if let Some(expected) = expected_name {
            if expected != name {
                return Err(RuntimeError::Linkage(format!("{} (wrong name: {})", expected, name)));
            }
        }
        let owner = name.clone();
        let wrap = format_error(&owner);

        let super_class = match file.super_class_name().map_err(&wrap)? {
            Some(super_name) => {
                let super_class = loader.load_class(&super_name)?;
                if super_class.is_interface() {
                    return Err(RuntimeError::Linkage(format!("class {} has interface {} as super class", name, super_name)));
                }
                Some(super_class)
            }
            None if name == OBJECT => None,
            None => return Err(RuntimeError::Linkage(format!("{} has no super class", name))),
        };
        let mut interfaces = Vec::new();
        for interface_name in file.interface_names().map_err(&wrap)? {
            let interface = loader.load_class(&interface_name)?;
            if !interface.is_interface() {
                return Err(RuntimeError::Linkage(format!("class {} can not implement {}, because it is not an interface", name, interface_name)));
            }
            interfaces.push(interface);
        }

        let pool = &file.constant_pool;
        let mut fields = Vec::with_capacity(file.fields.len());
        for info in &file.fields {
            let descriptor = info.descriptor(pool).map_err(&wrap)?;
            fields.push(Field {
                name: info.name(pool).map_err(&wrap)?.to_string(),
                ty: JType::parse(descriptor).map_err(&wrap)?,
                flags: info.access_flags,
            });
        }
        let mut methods = Vec::with_capacity(file.methods.len());
        for info in &file.methods {
            let raw_descriptor = info.descriptor(pool).map_err(&wrap)?.to_string();
            let method = Method {
                name: info.name(pool).map_err(&wrap)?.to_string(),
                descriptor: MethodDescriptor::parse(&raw_descriptor).map_err(&wrap)?,
                raw_descriptor,
                flags: info.access_flags,
                code: info.code(pool).map_err(&wrap)?,
                exceptions: info.exceptions(pool).map_err(&wrap)?,
                owner: name.clone(),
            };
            if method.code.is_none() && !method.is_abstract() && !method.is_native() {
                return Err(RuntimeError::verify(method.qualified_name(), "missing Code attribute"));
            }
            methods.push(Arc::new(method));
        }
        let source_file = file.source_file().map_err(&wrap)?;

        log::debug!("defined class {} in loader {}", name, loader.name());
        Ok(Arc::new(Class {
            name,
            flags: file.access_flags,
            super_class,
            interfaces,
            fields,
            methods,
            pool: file.constant_pool,
            loader,
            source_file,
        }))
    }

    /// Binary name (`demo.Outer$Inner`)
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flags(&self) -> u16 {
        self.flags
    }

    pub fn is_interface(&self) -> bool {
        self.flags & ACC_INTERFACE != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.flags & ACC_ABSTRACT != 0
    }

    pub fn super_class(&self) -> Option<&Arc<Class>> {
        self.super_class.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<Class>] {
        &self.interfaces
    }

    pub fn loader(&self) -> &Arc<dyn ClassLoader> {
        &self.loader
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn declared_fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn declared_methods(&self) -> &[Arc<Method>] {
        &self.methods
    }

    pub fn find_declared_method(&self, name: &str, descriptor: &str) -> Option<Arc<Method>> {
        self.methods.iter().find(|m| m.name == name && m.raw_descriptor == descriptor).cloned()
    }

    /// Superclass chain starting with this class
    pub fn ancestors(self: &Arc<Self>) -> impl Iterator<Item = Arc<Class>> {
        std::iter::successors(Some(self.clone()), |class| class.super_class.clone()).take(SYMTAB_MAX_HIERARCHY_STEPS)
    }

    /// Resolve `name` + `descriptor`: the class chain first, then default
    /// methods of the implemented interfaces
    pub fn find_method(self: &Arc<Self>, name: &str, descriptor: &str) -> Option<(Arc<Class>, Arc<Method>)> {
        for class in self.ancestors() {
            if let Some(method) = class.find_declared_method(name, descriptor) {
                return Some((class, method));
            }
        }
        let mut abstract_match = None;
        for interface in self.all_interfaces() {
            if let Some(method) = interface.find_declared_method(name, descriptor) {
                if !method.is_abstract() && !method.is_static() {
                    return Some((interface, method));
                }
                abstract_match.get_or_insert((interface, method));
            }
        }
        abstract_match
    }

    /// Every interface reachable from this type, nearest first, without duplicates
    pub fn all_interfaces(self: &Arc<Self>) -> Vec<Arc<Class>> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        let mut queue: Vec<Arc<Class>> = Vec::new();
        if self.is_interface() {
            queue.extend(self.interfaces.iter().cloned());
        } else {
            for class in self.ancestors() {
                queue.extend(class.interfaces.iter().cloned());
            }
        }
        let mut index = 0;
        while index < queue.len() && index < SYMTAB_MAX_HIERARCHY_STEPS {
            let interface = queue[index].clone();
            index += 1;
            if seen.insert(interface.name.clone()) {
                queue.extend(interface.interfaces.iter().cloned());
                result.push(interface);
            }
        }
        result
    }

    /// Instance fields of this class and all superclasses
    pub fn instance_fields(self: &Arc<Self>) -> Vec<Field> {
        self.ancestors()
            .flat_map(|class| class.fields.iter().filter(|f| f.flags & ACC_STATIC == 0).cloned().collect::<Vec<_>>())
            .collect()
    }

    /// Subtype test by name: `target` is this class, a superclass or an implemented interface
    pub fn is_assignable_to(self: &Arc<Self>, target: &str) -> bool {
        if target == OBJECT || self.name == target {
            return true;
        }
        self.ancestors().any(|class| class.name == target) || self.all_interfaces().iter().any(|i| i.name == target)
    }

    /// Pick the method named `name` whose parameter types accept `args`
    pub(crate) fn select_method(self: &Arc<Self>, name: &str, args: &[Value], want_static: bool) -> Result<(Arc<Class>, Arc<Method>)> {
        let mut seen = HashSet::new();
        let candidates = self.ancestors().chain(self.all_interfaces());
        for class in candidates {
            for method in &class.methods {
                if method.name != name || method.is_static() != want_static || !seen.insert(method.raw_descriptor.clone()) {
                    continue;
                }
                let accepts = method.descriptor.params.len() == args.len()
                    && method.descriptor.params.iter().zip(args).all(|(ty, arg)| arg.fits(ty));
                if accepts {
                    return match self.find_method(name, &method.raw_descriptor) {
                        Some((owner, resolved)) if !want_static && !resolved.is_abstract() => Ok((owner, resolved)),
                        Some(found) if want_static => Ok(found),
                        _ => Err(RuntimeError::Linkage(format!("abstract method {} has no implementation", method.qualified_name()))),
                    };
                }
            }
        }
        Err(RuntimeError::NoSuchMethod {
            class: self.name.clone(),
            name: name.to_string(),
            descriptor: format!("({} argument(s))", args.len()),
        })
    }

    /// Allocate an instance and run the constructor whose parameters accept `args`
    pub fn new_instance(self: &Arc<Self>, args: &[Value]) -> Result<ObjectRef> {
        if self.is_interface() || self.is_abstract() {
            return Err(RuntimeError::Linkage(format!("{} is abstract; cannot be instantiated", self.name)));
        }
        let ctor = self
            .methods
            .iter()
            .find(|m| {
                m.is_constructor()
                    && m.descriptor.params.len() == args.len()
                    && m.descriptor.params.iter().zip(args).all(|(ty, arg)| arg.fits(ty))
            })
            .cloned()
            .ok_or_else(|| RuntimeError::NoSuchMethod {
                class: self.name.clone(),
                name: CONSTRUCTOR_METHOD_NAME.to_string(),
                descriptor: format!("({} argument(s))", args.len()),
            })?;
        let object = Object::allocate(self.clone());
        Interpreter::new().invoke(self, &ctor, Some(object.clone()), args.to_vec())?;
        Ok(object)
    }

    /// Call the static method `name` whose parameters accept `args`
    pub fn invoke_static(self: &Arc<Self>, name: &str, args: &[Value]) -> Result<Value> {
        let (owner, method) = self.select_method(name, args, true)?;
        let ret = method.descriptor.ret.clone();
        Ok(Interpreter::new().invoke(&owner, &method, None, args.to_vec())?.for_type(&ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::builder::ClassBuilder;
    use crate::common::classpath::ClassPath;
    use crate::rt::loader::HostClassLoader;

    fn host() -> Arc<dyn ClassLoader> {
        HostClassLoader::new(ClassPath::new())
    }

    #[test]
    fn test_define_reads_members_and_source_file() {
        let mut builder = ClassBuilder::new("demo.Point", Some(OBJECT), ACC_PUBLIC | ACC_SUPER);
        builder.add_field(ACC_PRIVATE, "x", &JType::Int);
        builder.add_method(ACC_PUBLIC | ACC_ABSTRACT, "size", &MethodDescriptor::new(vec![], JType::Int), None, &[]);
        builder.set_source_file("Point.java");

        let class = Class::define(host(), &builder.to_bytes(), Some("demo.Point")).unwrap();
        assert_eq!(class.name(), "demo.Point");
        assert_eq!(class.super_class().map(|c| c.name()), Some(OBJECT));
        assert_eq!(class.source_file(), Some("Point.java"));
        assert_eq!(class.declared_fields()[0].name, "x");
        assert_eq!(class.find_declared_method("size", "()I").unwrap().owner, "demo.Point");
    }

    #[test]
    fn test_define_rejects_wrong_name_and_missing_code() {
        let bytes = ClassBuilder::new("demo.Actual", Some(OBJECT), ACC_PUBLIC | ACC_SUPER).to_bytes();
        let err = Class::define(host(), &bytes, Some("demo.Expected")).unwrap_err();
        assert!(err.to_string().contains("demo.Expected (wrong name: demo.Actual)"));

        let mut builder = ClassBuilder::new("demo.Hollow", Some(OBJECT), ACC_PUBLIC | ACC_SUPER);
        builder.add_method(ACC_PUBLIC, "run", &MethodDescriptor::new(vec![], JType::Void), None, &[]);
        let err = Class::define(host(), &builder.to_bytes(), None).unwrap_err();
        assert!(err.to_string().contains("missing Code attribute"));

        let err = Class::define(host(), &[0xCA, 0xFE], Some("demo.Torn")).unwrap_err();
        assert!(matches!(err, RuntimeError::ClassFormat { ref class, .. } if class == "demo.Torn"));
    }
}
