//! Class file reader
//!
//! Parses class file bytes back into a [`ClassFile`]. The runtime uses this to
//! define classes and the symbol table uses it to complete class path types.

use super::attribute::AttributeInfo;
use super::class::{ClassFile, FieldInfo, MethodInfo};
use super::constpool::{constant_tags::*, Constant, ConstantPool};
use super::defs::{MAGIC, MAX_SUPPORTED_MAJOR};
use super::error::{ClassFormatError, Result};

/// Big-endian cursor over a byte slice
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.data.len().saturating_sub(self.pos);
        if available < n {
            return Err(ClassFormatError::Truncated { offset: self.pos, needed: n - available });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16> {
        let b = self.bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn u32(&mut self) -> Result<u32> {
        let b = self.bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64(&mut self) -> Result<u64> {
        let hi = self.u32()? as u64;
        let lo = self.u32()? as u64;
        Ok((hi << 32) | lo)
    }
}

/// Parse a complete class file
pub fn read_class_file(bytes: &[u8]) -> Result<ClassFile> {
    let mut reader = ByteReader::new(bytes);

    let magic = reader.u32()?;
    if magic != MAGIC {
        return Err(ClassFormatError::BadMagic(magic));
    }
    let minor_version = reader.u16()?;
    let major_version = reader.u16()?;
    if major_version > MAX_SUPPORTED_MAJOR {
        return Err(ClassFormatError::UnsupportedVersion { major: major_version, minor: minor_version });
    }

    let constant_pool = read_constant_pool(&mut reader)?;

    let access_flags = reader.u16()?;
    let this_class = reader.u16()?;
    let super_class = reader.u16()?;

    let interface_count = reader.u16()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(reader.u16()?);
    }

    let field_count = reader.u16()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        let (flags, name, descriptor, attributes) = read_member(&mut reader)?;
        fields.push(FieldInfo { access_flags: flags, name_index: name, descriptor_index: descriptor, attributes });
    }

    let method_count = reader.u16()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        let (flags, name, descriptor, attributes) = read_member(&mut reader)?;
        methods.push(MethodInfo { access_flags: flags, name_index: name, descriptor_index: descriptor, attributes });
    }

    let attributes = read_attributes(&mut reader)?;

    if !reader.is_at_end() {
        return Err(ClassFormatError::malformed(
            "class file",
            format!("{} trailing byte(s)", bytes.len() - reader.position()),
        ));
    }

    let class_file = ClassFile {
        magic,
        minor_version,
        major_version,
        constant_pool,
        access_flags,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        attributes,
    };
    // Validate the self reference early so callers can rely on class_name()
    class_file.class_name()?;
    Ok(class_file)
}

fn read_constant_pool(reader: &mut ByteReader<'_>) -> Result<ConstantPool> {
    let count = reader.u16()?;
    let mut pool = ConstantPool::new();
    let mut index: u16 = 1;
    while index < count {
        let tag = reader.u8()?;
        let constant = match tag {
            CONSTANT_UTF8 => {
                let len = reader.u16()? as usize;
                let raw = reader.bytes(len)?;
                let text = std::str::from_utf8(raw)
                    .map_err(|e| ClassFormatError::malformed("Utf8 constant", e.to_string()))?;
                Constant::Utf8(text.to_string())
            }
            CONSTANT_INTEGER => Constant::Integer(reader.u32()? as i32),
            CONSTANT_FLOAT => Constant::Float(f32::from_bits(reader.u32()?)),
            CONSTANT_LONG => Constant::Long(reader.u64()? as i64),
            CONSTANT_DOUBLE => Constant::Double(f64::from_bits(reader.u64()?)),
            CONSTANT_CLASS => Constant::Class(reader.u16()?),
            CONSTANT_STRING => Constant::String(reader.u16()?),
            CONSTANT_FIELDREF => Constant::FieldRef(reader.u16()?, reader.u16()?),
            CONSTANT_METHODREF => Constant::MethodRef(reader.u16()?, reader.u16()?),
            CONSTANT_INTERFACEMETHODREF => Constant::InterfaceMethodRef(reader.u16()?, reader.u16()?),
            CONSTANT_NAMEANDTYPE => Constant::NameAndType(reader.u16()?, reader.u16()?),
            CONSTANT_METHODHANDLE => Constant::MethodHandle(reader.u8()?, reader.u16()?),
            CONSTANT_METHODTYPE => Constant::MethodType(reader.u16()?),
            CONSTANT_INVOKEDYNAMIC => Constant::InvokeDynamic(reader.u16()?, reader.u16()?),
            _ => return Err(ClassFormatError::BadConstantTag { tag, index }),
        };
        let wide = matches!(constant, Constant::Long(_) | Constant::Double(_));
        pool.push_raw(constant);
        index += if wide { 2 } else { 1 };
    }
    Ok(pool)
}

fn read_member(reader: &mut ByteReader<'_>) -> Result<(u16, u16, u16, Vec<AttributeInfo>)> {
    let access_flags = reader.u16()?;
    let name_index = reader.u16()?;
    let descriptor_index = reader.u16()?;
    let attributes = read_attributes(reader)?;
    Ok((access_flags, name_index, descriptor_index, attributes))
}

fn read_attributes(reader: &mut ByteReader<'_>) -> Result<Vec<AttributeInfo>> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = reader.u16()?;
        let length = reader.u32()? as usize;
        let info = reader.bytes(length)?.to_vec();
        attributes.push(AttributeInfo { name_index, info });
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::writer::ClassfileWritable;

    fn minimal_class() -> ClassFile {
        let mut class = ClassFile::new();
        class.this_class = class.constant_pool.add_class("demo/Empty");
        class.super_class = class.constant_pool.add_class("java/lang/Object");
        class
    }

    #[test]
    fn test_read_back_minimal_class() {
        let bytes = minimal_class().to_classfile_bytes();
        let parsed = read_class_file(&bytes).unwrap();
        assert_eq!(parsed.class_name().unwrap(), "demo.Empty");
        assert_eq!(parsed.super_class_name().unwrap().as_deref(), Some("java.lang.Object"));
    }

    #[test]
    fn test_rejects_bad_magic_and_truncation() {
        let mut bytes = minimal_class().to_classfile_bytes();
        assert!(matches!(read_class_file(&bytes[..12]), Err(ClassFormatError::Truncated { .. })));
        bytes[0] = 0;
        assert!(matches!(read_class_file(&bytes), Err(ClassFormatError::BadMagic(_))));
    }
}
