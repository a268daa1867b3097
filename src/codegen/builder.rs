//! Incremental construction of a [`ClassFile`]
//!
//! The generator and the bootstrap class table both assemble classes through
//! this builder so constant pool bookkeeping lives in one place.

use super::attribute::{exceptions_to_bytes, AttributeInfo, CodeAttribute};
use super::class::{ClassFile, FieldInfo, MethodInfo};
use super::constpool::ConstantPool;
use super::defs::attribute_names;
use super::descriptor::{internal_name, JType, MethodDescriptor};
use super::writer::ClassfileWritable;

#[derive(Debug)]
pub struct ClassBuilder {
    file: ClassFile,
}

impl ClassBuilder {
    /// `name` and `super_name` are binary names; `None` only for `java.lang.Object`
    pub fn new(name: &str, super_name: Option<&str>, access_flags: u16) -> Self {
        let mut file = ClassFile::new();
        file.access_flags = access_flags;
        file.this_class = file.constant_pool.add_class(&internal_name(name));
        if let Some(super_name) = super_name {
            file.super_class = file.constant_pool.add_class(&internal_name(super_name));
        }
        Self { file }
    }

    pub fn set_major_version(&mut self, major: u16) {
        self.file.major_version = major;
    }

    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.file.constant_pool
    }

    pub fn add_interface(&mut self, name: &str) {
        let index = self.file.constant_pool.add_class(&internal_name(name));
        self.file.interfaces.push(index);
    }

    pub fn add_field(&mut self, access_flags: u16, name: &str, ty: &JType) {
        let pool = &mut self.file.constant_pool;
        let field = FieldInfo::new(access_flags, pool.add_utf8(name), pool.add_utf8(&ty.descriptor()));
        self.file.fields.push(field);
    }

    /// Add a method; `code` is `None` for abstract and native methods
    pub fn add_method(
        &mut self,
        access_flags: u16,
        name: &str,
        descriptor: &MethodDescriptor,
        code: Option<CodeAttribute>,
        exceptions: &[String],
    ) {
        let pool = &mut self.file.constant_pool;
        let mut method = MethodInfo::new(access_flags, pool.add_utf8(name), pool.add_utf8(&descriptor.to_string()));
        if let Some(code) = code {
            let line_table = if code.line_numbers.is_empty() {
                None
            } else {
                Some(pool.add_utf8(attribute_names::LINE_NUMBER_TABLE))
            };
            let payload = code.to_bytes(line_table);
            method.attributes.push(AttributeInfo::new(pool.add_utf8(attribute_names::CODE), payload));
        }
        if !exceptions.is_empty() {
            let indices: Vec<u16> = exceptions.iter().map(|name| pool.add_class(&internal_name(name))).collect();
            let payload = exceptions_to_bytes(&indices);
            method.attributes.push(AttributeInfo::new(pool.add_utf8(attribute_names::EXCEPTIONS), payload));
        }
        self.file.methods.push(method);
    }

    pub fn set_source_file(&mut self, file_name: &str) {
        let pool = &mut self.file.constant_pool;
        let value = pool.add_utf8(file_name);
        let name = pool.add_utf8(attribute_names::SOURCE_FILE);
        self.file.attributes.push(AttributeInfo::new(name, value.to_be_bytes().to_vec()));
    }

    pub fn finish(self) -> ClassFile {
        self.file
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.file.to_classfile_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::defs::access_flags::*;
    use crate::codegen::opcodes::RETURN;
    use crate::codegen::reader::read_class_file;

    #[test]
    fn test_built_class_reads_back() {
        let mut builder = ClassBuilder::new("demo.Widget", Some("java.lang.Object"), ACC_PUBLIC | ACC_SUPER);
        builder.add_interface("java.lang.Runnable");
        builder.add_field(ACC_PRIVATE, "count", &JType::Int);
        builder.add_method(
            ACC_PUBLIC,
            "run",
            &MethodDescriptor::new(vec![], JType::Void),
            Some(CodeAttribute::new(0, 1, vec![RETURN])),
            &["java.io.IOException".to_string()],
        );
        builder.set_source_file("Widget.java");

        let file = read_class_file(&builder.to_bytes()).unwrap();
        assert_eq!(file.class_name().unwrap(), "demo.Widget");
        assert_eq!(file.super_class_name().unwrap().as_deref(), Some("java.lang.Object"));
        assert_eq!(file.interface_names().unwrap(), vec!["java.lang.Runnable"]);
        assert_eq!(file.source_file().unwrap().as_deref(), Some("Widget.java"));
        let run = &file.methods[0];
        assert_eq!(run.exceptions(&file.constant_pool).unwrap(), vec!["java.io.IOException"]);
        assert_eq!(run.code(&file.constant_pool).unwrap().unwrap().code, vec![RETURN]);
    }
}
