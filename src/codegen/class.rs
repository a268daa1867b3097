//! Core classfile structures: ClassFile, FieldInfo, MethodInfo

use super::attribute::{parse_exceptions, AttributeInfo, CodeAttribute};
use super::constpool::ConstantPool;
use super::defs::{attribute_names, MAGIC, JAVA_1_8};
use super::descriptor::binary_name;
use super::error::Result;

#[derive(Debug, Clone)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl Default for ClassFile {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassFile {
    pub fn new() -> Self {
        Self {
            magic: MAGIC,
            minor_version: 0,
            major_version: JAVA_1_8,
            constant_pool: ConstantPool::new(),
            access_flags: 0,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            attributes: Vec::new(),
        }
    }

    /// Binary name of this class (`demo.Outer$Inner`)
    pub fn class_name(&self) -> Result<String> {
        Ok(binary_name(self.constant_pool.class_name(self.this_class)?))
    }

    /// Binary name of the superclass; `None` only for `java.lang.Object`
    pub fn super_class_name(&self) -> Result<Option<String>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        Ok(Some(binary_name(self.constant_pool.class_name(self.super_class)?)))
    }

    pub fn interface_names(&self) -> Result<Vec<String>> {
        self.interfaces
            .iter()
            .map(|idx| Ok(binary_name(self.constant_pool.class_name(*idx)?)))
            .collect()
    }

    pub fn source_file(&self) -> Result<Option<String>> {
        match find_attribute(&self.constant_pool, &self.attributes, attribute_names::SOURCE_FILE) {
            Some(attr) if attr.info.len() == 2 => {
                let index = u16::from_be_bytes([attr.info[0], attr.info[1]]);
                Ok(Some(self.constant_pool.utf8(index)?.to_string()))
            }
            _ => Ok(None),
        }
    }
}

/// Find an attribute by name in a list of attributes
pub fn find_attribute<'a>(pool: &ConstantPool, attributes: &'a [AttributeInfo], name: &str) -> Option<&'a AttributeInfo> {
    attributes
        .iter()
        .find(|attr| pool.utf8(attr.name_index).map(|n| n == name).unwrap_or(false))
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl FieldInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self { access_flags, name_index, descriptor_index, attributes: Vec::new() }
    }

    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.descriptor_index)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        member_to_bytes(self.access_flags, self.name_index, self.descriptor_index, &self.attributes)
    }
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
    pub fn new(access_flags: u16, name_index: u16, descriptor_index: u16) -> Self {
        Self { access_flags, name_index, descriptor_index, attributes: Vec::new() }
    }

    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8(self.descriptor_index)
    }

    /// Decoded `Code` attribute; `None` for abstract and native methods
    pub fn code(&self, pool: &ConstantPool) -> Result<Option<CodeAttribute>> {
        match find_attribute(pool, &self.attributes, attribute_names::CODE) {
            Some(attr) => {
                let is_line_table =
                    |idx: u16| pool.utf8(idx).map(|n| n == attribute_names::LINE_NUMBER_TABLE).unwrap_or(false);
                Ok(Some(CodeAttribute::parse(&attr.info, is_line_table)?))
            }
            None => Ok(None),
        }
    }

    /// Binary names of the declared checked exceptions
    pub fn exceptions(&self, pool: &ConstantPool) -> Result<Vec<String>> {
        match find_attribute(pool, &self.attributes, attribute_names::EXCEPTIONS) {
            Some(attr) => parse_exceptions(&attr.info)?
                .into_iter()
                .map(|idx| Ok(binary_name(pool.class_name(idx)?)))
                .collect(),
            None => Ok(Vec::new()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        member_to_bytes(self.access_flags, self.name_index, self.descriptor_index, &self.attributes)
    }
}

fn member_to_bytes(access_flags: u16, name_index: u16, descriptor_index: u16, attributes: &[AttributeInfo]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&access_flags.to_be_bytes());
    bytes.extend_from_slice(&name_index.to_be_bytes());
    bytes.extend_from_slice(&descriptor_index.to_be_bytes());
    bytes.extend_from_slice(&(attributes.len() as u16).to_be_bytes());
    for attribute in attributes {
        bytes.extend_from_slice(&attribute.to_bytes());
    }
    bytes
}
