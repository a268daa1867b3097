//! Field and method descriptors
//!
//! `JType` is the descriptor-level view of a Java type. Class types carry the
//! binary name with dots (`java.lang.String`, `demo.Outer$Inner`); the
//! descriptor form uses slashes and the source form turns `$` into `.`.

use std::fmt;

use super::error::{ClassFormatError, Result};

pub const OBJECT: &str = "java.lang.Object";
pub const STRING: &str = "java.lang.String";
pub const THROWABLE: &str = "java.lang.Throwable";
pub const RUNTIME_EXCEPTION: &str = "java.lang.RuntimeException";
pub const ERROR: &str = "java.lang.Error";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JType {
    Void,
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    /// Class or interface, binary name with dots
    Class(String),
    Array(Box<JType>),
    /// Type of the `null` literal; only produced during attribution
    Null,
}

impl JType {
    pub fn class(name: impl Into<String>) -> Self {
        JType::Class(name.into())
    }

    pub fn object() -> Self {
        JType::Class(OBJECT.to_string())
    }

    pub fn string() -> Self {
        JType::Class(STRING.to_string())
    }

    /// Primitive or `void` keyword as written in source
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "void" => JType::Void,
            "boolean" => JType::Boolean,
            "byte" => JType::Byte,
            "char" => JType::Char,
            "short" => JType::Short,
            "int" => JType::Int,
            "long" => JType::Long,
            "float" => JType::Float,
            "double" => JType::Double,
            _ => return None,
        })
    }

    pub fn is_void(&self) -> bool {
        matches!(self, JType::Void)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, JType::Class(_) | JType::Array(_) | JType::Null)
    }

    pub fn is_primitive(&self) -> bool {
        !self.is_reference() && !self.is_void()
    }

    /// Binary name of a class type
    pub fn class_name(&self) -> Option<&str> {
        match self {
            JType::Class(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_string(&self) -> bool {
        self.class_name() == Some(STRING)
    }

    /// Number of local variable / operand stack slots
    pub fn slot_size(&self) -> u16 {
        match self {
            JType::Void => 0,
            JType::Long | JType::Double => 2,
            _ => 1,
        }
    }

    pub fn descriptor(&self) -> String {
        let mut out = String::new();
        self.write_descriptor(&mut out);
        out
    }

    fn write_descriptor(&self, out: &mut String) {
        match self {
            JType::Void => out.push('V'),
            JType::Boolean => out.push('Z'),
            JType::Byte => out.push('B'),
            JType::Char => out.push('C'),
            JType::Short => out.push('S'),
            JType::Int => out.push('I'),
            JType::Long => out.push('J'),
            JType::Float => out.push('F'),
            JType::Double => out.push('D'),
            JType::Class(name) => {
                out.push('L');
                out.push_str(&name.replace('.', "/"));
                out.push(';');
            }
            JType::Array(component) => {
                out.push('[');
                component.write_descriptor(out);
            }
            // Never written into a class file; attribution replaces it first
            JType::Null => out.push_str("Ljava/lang/Object;"),
        }
    }

    /// Type as it would be spelled in Java source
    pub fn source_name(&self) -> String {
        match self {
            JType::Void => "void".into(),
            JType::Boolean => "boolean".into(),
            JType::Byte => "byte".into(),
            JType::Char => "char".into(),
            JType::Short => "short".into(),
            JType::Int => "int".into(),
            JType::Long => "long".into(),
            JType::Float => "float".into(),
            JType::Double => "double".into(),
            JType::Class(name) => name.replace('$', "."),
            JType::Array(component) => format!("{}[]", component.source_name()),
            JType::Null => "null".into(),
        }
    }

    /// Parse a single field descriptor, e.g. `Ljava/lang/String;`
    pub fn parse(descriptor: &str) -> Result<Self> {
        let mut chars = descriptor.char_indices().peekable();
        let ty = parse_one(descriptor, &mut chars)?;
        if chars.next().is_some() {
            return Err(ClassFormatError::BadDescriptor(descriptor.to_string()));
        }
        Ok(ty)
    }
}

impl fmt::Display for JType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source_name())
    }
}

type CharCursor<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn parse_one(descriptor: &str, chars: &mut CharCursor<'_>) -> Result<JType> {
    let bad = || ClassFormatError::BadDescriptor(descriptor.to_string());
    let (start, c) = chars.next().ok_or_else(bad)?;
    Ok(match c {
        'V' => JType::Void,
        'Z' => JType::Boolean,
        'B' => JType::Byte,
        'C' => JType::Char,
        'S' => JType::Short,
        'I' => JType::Int,
        'J' => JType::Long,
        'F' => JType::Float,
        'D' => JType::Double,
        '[' => JType::Array(Box::new(parse_one(descriptor, chars)?)),
        'L' => {
            let rest = &descriptor[start + 1..];
            let end = rest.find(';').ok_or_else(bad)?;
            let name = &rest[..end];
            if name.is_empty() {
                return Err(bad());
            }
            // Skip the class name and the terminating ';'
            for _ in 0..=name.chars().count() {
                chars.next();
            }
            JType::Class(name.replace('/', "."))
        }
        _ => return Err(bad()),
    })
}

/// Parameter and return types of a method
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    pub params: Vec<JType>,
    pub ret: JType,
}

impl MethodDescriptor {
    pub fn new(params: Vec<JType>, ret: JType) -> Self {
        Self { params, ret }
    }

    pub fn parse(descriptor: &str) -> Result<Self> {
        let bad = || ClassFormatError::BadDescriptor(descriptor.to_string());
        if !descriptor.starts_with('(') {
            return Err(bad());
        }
        let mut chars = descriptor.char_indices().peekable();
        chars.next();
        let mut params = Vec::new();
        loop {
            match chars.peek() {
                Some((_, ')')) => {
                    chars.next();
                    break;
                }
                Some(_) => params.push(parse_one(descriptor, &mut chars)?),
                None => return Err(bad()),
            }
        }
        let ret = parse_one(descriptor, &mut chars)?;
        if chars.next().is_some() {
            return Err(bad());
        }
        Ok(Self { params, ret })
    }

    /// Total slots taken by the parameters (excluding `this`)
    pub fn param_slots(&self) -> u16 {
        self.params.iter().map(JType::slot_size).sum()
    }
}

impl fmt::Display for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for param in &self.params {
            f.write_str(&param.descriptor())?;
        }
        f.write_str(")")?;
        f.write_str(&self.ret.descriptor())
    }
}

/// Convert a binary name (`a.b.C$D`) to an internal name (`a/b/C$D`)
pub fn internal_name(binary_name: &str) -> String {
    binary_name.replace('.', "/")
}

/// Convert an internal name (`a/b/C$D`) to a binary name (`a.b.C$D`)
pub fn binary_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_descriptors() {
        assert_eq!(JType::string().descriptor(), "Ljava/lang/String;");
        assert_eq!(JType::Array(Box::new(JType::Int)).descriptor(), "[I");
        assert_eq!(JType::parse("Ldemo/Outer$Inner;").unwrap(), JType::class("demo.Outer$Inner"));
        assert!(JType::parse("Ljava/lang/String").is_err());
        assert!(JType::parse("II").is_err());
    }

    #[test]
    fn test_method_descriptor_round_trip() {
        let desc = MethodDescriptor::parse("(ILjava/lang/String;Z)Ljava/lang/Object;").unwrap();
        assert_eq!(desc.params, vec![JType::Int, JType::string(), JType::Boolean]);
        assert_eq!(desc.ret, JType::object());
        assert_eq!(desc.to_string(), "(ILjava/lang/String;Z)Ljava/lang/Object;");
        assert_eq!(MethodDescriptor::parse("()V").unwrap().params.len(), 0);
        assert!(MethodDescriptor::parse("(I").is_err());
    }

    #[test]
    fn test_source_names() {
        assert_eq!(JType::class("demo.Outer$Inner").source_name(), "demo.Outer.Inner");
        assert_eq!(JType::Void.source_name(), "void");
    }
}
