//! Attribute structures for Java class files

use super::error::{ClassFormatError, Result};
use super::reader::ByteReader;

/// Raw attribute: name index into the constant pool plus its payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name_index: u16,
    pub info: Vec<u8>,
}

impl AttributeInfo {
    pub fn new(name_index: u16, info: Vec<u8>) -> Self {
        Self { name_index, info }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(6 + self.info.len());
        bytes.extend_from_slice(&self.name_index.to_be_bytes());
        bytes.extend_from_slice(&(self.info.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.info);
        bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

/// The `Code` attribute of a method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    /// Decoded `LineNumberTable`, if present
    pub line_numbers: Vec<LineNumberEntry>,
}

impl CodeAttribute {
    pub fn new(max_stack: u16, max_locals: u16, code: Vec<u8>) -> Self {
        Self { max_stack, max_locals, code, line_numbers: Vec::new() }
    }

    /// Serialize the payload. `line_number_table_index` is the constant pool
    /// index of the "LineNumberTable" name, required when line numbers exist.
    pub fn to_bytes(&self, line_number_table_index: Option<u16>) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&self.max_stack.to_be_bytes());
        bytes.extend_from_slice(&self.max_locals.to_be_bytes());
        bytes.extend_from_slice(&(self.code.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&self.code);
        // No exception handlers: the subset has no try/catch
        bytes.extend_from_slice(&0u16.to_be_bytes());
        match line_number_table_index {
            Some(name_index) if !self.line_numbers.is_empty() => {
                bytes.extend_from_slice(&1u16.to_be_bytes());
                let mut table = Vec::with_capacity(2 + self.line_numbers.len() * 4);
                table.extend_from_slice(&(self.line_numbers.len() as u16).to_be_bytes());
                for entry in &self.line_numbers {
                    table.extend_from_slice(&entry.start_pc.to_be_bytes());
                    table.extend_from_slice(&entry.line_number.to_be_bytes());
                }
                bytes.extend_from_slice(&AttributeInfo::new(name_index, table).to_bytes());
            }
            _ => bytes.extend_from_slice(&0u16.to_be_bytes()),
        }
        bytes
    }

    /// Decode a `Code` payload. `is_line_table` tells whether a nested
    /// attribute name index refers to "LineNumberTable".
    pub fn parse(info: &[u8], is_line_table: impl Fn(u16) -> bool) -> Result<Self> {
        let mut reader = ByteReader::new(info);
        let max_stack = reader.u16()?;
        let max_locals = reader.u16()?;
        let code_length = reader.u32()? as usize;
        let code = reader.bytes(code_length)?.to_vec();
        let exception_table_length = reader.u16()? as usize;
        if exception_table_length != 0 {
            return Err(ClassFormatError::malformed("Code attribute", "exception handlers are not supported"));
        }
        let mut line_numbers = Vec::new();
        let attribute_count = reader.u16()?;
        for _ in 0..attribute_count {
            let name_index = reader.u16()?;
            let length = reader.u32()? as usize;
            let payload = reader.bytes(length)?;
            if is_line_table(name_index) {
                let mut table = ByteReader::new(payload);
                let entries = table.u16()?;
                for _ in 0..entries {
                    line_numbers.push(LineNumberEntry { start_pc: table.u16()?, line_number: table.u16()? });
                }
            }
        }
        Ok(Self { max_stack, max_locals, code, line_numbers })
    }

    /// Source line for a given pc, using the closest preceding entry
    pub fn line_for_pc(&self, pc: usize) -> Option<u16> {
        self.line_numbers
            .iter()
            .filter(|entry| entry.start_pc as usize <= pc)
            .max_by_key(|entry| entry.start_pc)
            .map(|entry| entry.line_number)
    }
}

/// Encode an `Exceptions` attribute payload from class constant indices
pub fn exceptions_to_bytes(class_indices: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(2 + class_indices.len() * 2);
    bytes.extend_from_slice(&(class_indices.len() as u16).to_be_bytes());
    for index in class_indices {
        bytes.extend_from_slice(&index.to_be_bytes());
    }
    bytes
}

/// Decode an `Exceptions` attribute payload into class constant indices
pub fn parse_exceptions(info: &[u8]) -> Result<Vec<u16>> {
    let mut reader = ByteReader::new(info);
    let count = reader.u16()?;
    (0..count).map(|_| reader.u16()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_attribute_with_line_numbers() {
        let mut code = CodeAttribute::new(2, 1, vec![0x2a, 0xb0]);
        code.line_numbers.push(LineNumberEntry { start_pc: 0, line_number: 7 });
        let bytes = code.to_bytes(Some(9));
        let parsed = CodeAttribute::parse(&bytes, |idx| idx == 9).unwrap();
        assert_eq!(parsed, code);
        assert_eq!(parsed.line_for_pc(1), Some(7));
    }

    #[test]
    fn test_exceptions_payload() {
        let bytes = exceptions_to_bytes(&[4, 12]);
        assert_eq!(parse_exceptions(&bytes).unwrap(), vec![4, 12]);
    }
}
