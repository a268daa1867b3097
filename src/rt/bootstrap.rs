//! Platform class files for `java.lang` and `java.io`
//!
//! The classes are assembled once with the class builder. Methods that need
//! host behaviour are `native` and bound in [`super::natives`]; constructors
//! and the `Throwable` accessors are ordinary bytecode.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::codegen::builder::ClassBuilder;
use crate::codegen::code::Code;
use crate::codegen::defs::access_flags::*;
use crate::codegen::defs::CONSTRUCTOR_METHOD_NAME;
use crate::codegen::descriptor::{internal_name, JType, MethodDescriptor, OBJECT, STRING, THROWABLE};
use crate::codegen::opcodes::*;

pub const DETAIL_MESSAGE_FIELD: &str = "detailMessage";

/// Exception classes with `()` and `(String)` constructors, supertypes first
const EXCEPTION_CLASSES: &[(&str, &str)] = &[
    ("java.lang.Exception", THROWABLE),
    ("java.lang.Error", THROWABLE),
    ("java.lang.RuntimeException", "java.lang.Exception"),
    ("java.lang.IllegalStateException", "java.lang.RuntimeException"),
    ("java.lang.IllegalArgumentException", "java.lang.RuntimeException"),
    ("java.lang.UnsupportedOperationException", "java.lang.RuntimeException"),
    ("java.lang.NullPointerException", "java.lang.RuntimeException"),
    ("java.lang.ArithmeticException", "java.lang.RuntimeException"),
    ("java.lang.ClassCastException", "java.lang.RuntimeException"),
    ("java.io.IOException", "java.lang.Exception"),
];

const NO_THROWS: &[&str] = &[];
const THROWS_EXCEPTION: &[&str] = &["java.lang.Exception"];

static PLATFORM_CLASSES: Lazy<Vec<(String, Arc<[u8]>)>> = Lazy::new(build_platform_classes);

/// Every platform class as `(binary name, class file bytes)`
pub fn platform_classes() -> &'static [(String, Arc<[u8]>)] {
    &PLATFORM_CLASSES
}

pub fn platform_class_bytes(name: &str) -> Option<Arc<[u8]>> {
    PLATFORM_CLASSES.iter().find(|(n, _)| n == name).map(|(_, bytes)| bytes.clone())
}

fn desc(params: &[JType], ret: JType) -> MethodDescriptor {
    MethodDescriptor::new(params.to_vec(), ret)
}

fn add_native(builder: &mut ClassBuilder, is_static: bool, name: &str, descriptor: MethodDescriptor) {
    let flags = ACC_PUBLIC | ACC_NATIVE | if is_static { ACC_STATIC } else { 0 };
    builder.add_method(flags, name, &descriptor, None, &[]);
}

/// `<init>` that forwards its parameters to the superclass constructor
fn add_forwarding_constructor(builder: &mut ClassBuilder, super_name: &str, params: &[JType]) {
    let descriptor = desc(params, JType::Void);
    let slots = 1 + descriptor.param_slots();
    let mut code = Code::new(slots);
    code.load(true, 0);
    for (i, param) in params.iter().enumerate() {
        code.load(param.is_reference(), 1 + i as u16);
    }
    let index = builder.pool_mut().add_method_ref(&internal_name(super_name), CONSTRUCTOR_METHOD_NAME, &descriptor.to_string());
    code.emit_cp(INVOKESPECIAL, index, -(slots as i32));
    code.emitop(RETURN, 0);
    builder.add_method(ACC_PUBLIC, CONSTRUCTOR_METHOD_NAME, &descriptor, code.finish(slots).ok(), &[]);
}

fn object_class() -> ClassBuilder {
    let mut builder = ClassBuilder::new(OBJECT, None, ACC_PUBLIC | ACC_SUPER);
    let mut init = Code::new(1);
    init.emitop(RETURN, 0);
    builder.add_method(ACC_PUBLIC, CONSTRUCTOR_METHOD_NAME, &desc(&[], JType::Void), init.finish(1).ok(), &[]);
    add_native(&mut builder, false, "hashCode", desc(&[], JType::Int));
    add_native(&mut builder, false, "equals", desc(&[JType::object()], JType::Boolean));
    add_native(&mut builder, false, "toString", desc(&[], JType::string()));
    builder
}

fn string_class() -> ClassBuilder {
    let mut builder = ClassBuilder::new(STRING, Some(OBJECT), ACC_PUBLIC | ACC_FINAL | ACC_SUPER);
    let s = JType::string;
    for (name, params, ret) in [
        ("length", vec![], JType::Int),
        ("isEmpty", vec![], JType::Boolean),
        ("concat", vec![s()], s()),
        ("equals", vec![JType::object()], JType::Boolean),
        ("hashCode", vec![], JType::Int),
        ("toString", vec![], s()),
        ("toUpperCase", vec![], s()),
        ("toLowerCase", vec![], s()),
        ("trim", vec![], s()),
        ("startsWith", vec![s()], JType::Boolean),
        ("endsWith", vec![s()], JType::Boolean),
        ("indexOf", vec![s()], JType::Int),
        ("substring", vec![JType::Int], s()),
        ("substring", vec![JType::Int, JType::Int], s()),
    ] {
        add_native(&mut builder, false, name, desc(&params, ret));
    }
    for param in [JType::object(), JType::Int, JType::Boolean] {
        add_native(&mut builder, true, "valueOf", desc(&[param], s()));
    }
    builder
}

fn math_class() -> ClassBuilder {
    let mut builder = ClassBuilder::new("java.lang.Math", Some(OBJECT), ACC_PUBLIC | ACC_FINAL | ACC_SUPER);
    add_native(&mut builder, true, "abs", desc(&[JType::Int], JType::Int));
    add_native(&mut builder, true, "max", desc(&[JType::Int, JType::Int], JType::Int));
    add_native(&mut builder, true, "min", desc(&[JType::Int, JType::Int], JType::Int));
    builder
}

fn interface(name: &str, methods: &[(&str, MethodDescriptor, &[&str])]) -> ClassBuilder {
    let mut builder = ClassBuilder::new(name, Some(OBJECT), ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT);
    for (method, descriptor, throws) in methods {
        let throws: Vec<String> = throws.iter().map(|t| t.to_string()).collect();
        builder.add_method(ACC_PUBLIC | ACC_ABSTRACT, method, descriptor, None, &throws);
    }
    builder
}

fn throwable_class() -> ClassBuilder {
    let mut builder = ClassBuilder::new(THROWABLE, Some(OBJECT), ACC_PUBLIC | ACC_SUPER);
    builder.add_field(ACC_PRIVATE, DETAIL_MESSAGE_FIELD, &JType::string());
    let this = internal_name(THROWABLE);
    let message_ref = builder.pool_mut().add_field_ref(&this, DETAIL_MESSAGE_FIELD, &JType::string().descriptor());
    let object_init = builder.pool_mut().add_method_ref(&internal_name(OBJECT), CONSTRUCTOR_METHOD_NAME, "()V");

    add_forwarding_constructor(&mut builder, OBJECT, &[]);

    let mut init = Code::new(2);
    init.load(true, 0);
    init.emit_cp(INVOKESPECIAL, object_init, -1);
    init.load(true, 0);
    init.load(true, 1);
    init.emit_cp(PUTFIELD, message_ref, -2);
    init.emitop(RETURN, 0);
    builder.add_method(ACC_PUBLIC, CONSTRUCTOR_METHOD_NAME, &desc(&[JType::string()], JType::Void), init.finish(2).ok(), &[]);

    let mut get_message = Code::new(1);
    get_message.load(true, 0);
    get_message.emit_cp(GETFIELD, message_ref, 0);
    get_message.emitop(ARETURN, -1);
    builder.add_method(ACC_PUBLIC, "getMessage", &desc(&[], JType::string()), get_message.finish(1).ok(), &[]);

    add_native(&mut builder, false, "toString", desc(&[], JType::string()));
    builder
}

fn exception_class(name: &str, super_name: &str) -> ClassBuilder {
    let mut builder = ClassBuilder::new(name, Some(super_name), ACC_PUBLIC | ACC_SUPER);
    add_forwarding_constructor(&mut builder, super_name, &[]);
    add_forwarding_constructor(&mut builder, super_name, &[JType::string()]);
    builder
}

fn build_platform_classes() -> Vec<(String, Arc<[u8]>)> {
    let mut classes = vec![
        (OBJECT, object_class()),
        (STRING, string_class()),
        ("java.lang.Math", math_class()),
        ("java.lang.Runnable", interface("java.lang.Runnable", &[("run", desc(&[], JType::Void), NO_THROWS)])),
        ("java.lang.Cloneable", interface("java.lang.Cloneable", &[])),
        (
            "java.lang.AutoCloseable",
            interface("java.lang.AutoCloseable", &[("close", desc(&[], JType::Void), THROWS_EXCEPTION)]),
        ),
        (THROWABLE, throwable_class()),
    ];
    for &(name, super_name) in EXCEPTION_CLASSES {
        classes.push((name, exception_class(name, super_name)));
    }
    let built: Vec<(String, Arc<[u8]>)> =
        classes.into_iter().map(|(name, builder)| (name.to_string(), Arc::from(builder.to_bytes()))).collect();
    log::debug!("assembled {} platform classes", built.len());
    built
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::reader::read_class_file;

    #[test]
    fn test_platform_classes_parse() {
        for (name, bytes) in platform_classes() {
            let file = read_class_file(bytes).unwrap();
            assert_eq!(&file.class_name().unwrap(), name);
        }
        assert!(platform_class_bytes("java.io.IOException").is_some());
        assert!(platform_class_bytes("java.util.List").is_none());
    }

    #[test]
    fn test_object_is_the_root() {
        let file = read_class_file(&platform_class_bytes(OBJECT).unwrap()).unwrap();
        assert_eq!(file.super_class_name().unwrap(), None);
        let file = read_class_file(&platform_class_bytes("java.lang.RuntimeException").unwrap()).unwrap();
        assert_eq!(file.super_class_name().unwrap().as_deref(), Some("java.lang.Exception"));
    }
}
