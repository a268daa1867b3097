//! Runtime values and heap objects

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::class::Class;
use super::error::{Result, RuntimeError};
use super::interp::Interpreter;
use super::loader::bootstrap_loader;
use crate::codegen::descriptor::{JType, STRING};

pub type ObjectRef = Arc<Object>;

/// A value crossing the runtime boundary. Inside the interpreter booleans are
/// ints; [`Value::Bool`] is produced for `boolean` results handed back out.
#[derive(Debug, Clone)]
pub enum Value {
    Void,
    Null,
    Int(i32),
    Bool(bool),
    Ref(ObjectRef),
}

impl Value {
    /// A `java.lang.String` instance
    pub fn string(text: impl Into<String>) -> Result<Value> {
        let class = bootstrap_loader().load_class(STRING)?;
        Ok(Value::Ref(Arc::new(Object { class, body: ObjectBody::Str(text.into()) })))
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(*b as i32),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_int().map(|v| v != 0)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(obj) => Some(obj),
            _ => None,
        }
    }

    /// Contents of a string value
    pub fn as_str(&self) -> Option<&str> {
        self.as_object().and_then(|obj| obj.as_str())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::Null | Value::Ref(_))
    }

    /// Interpreter representation: booleans become ints
    pub(crate) fn normalize(self) -> Value {
        match self {
            Value::Bool(b) => Value::Int(b as i32),
            other => other,
        }
    }

    /// Outward representation for a value of declared type `ty`
    pub(crate) fn for_type(self, ty: &JType) -> Value {
        match (ty, self) {
            (JType::Boolean, Value::Int(v)) => Value::Bool(v != 0),
            (JType::Void, _) => Value::Void,
            (_, other) => other,
        }
    }

    /// Zero value for a field of type `ty`
    pub fn default_for(ty: &JType) -> Value {
        if ty.is_reference() {
            Value::Null
        } else {
            Value::Int(0)
        }
    }

    /// Whether this value can be passed where `ty` is expected
    pub fn fits(&self, ty: &JType) -> bool {
        match (self, ty) {
            (Value::Int(_), JType::Int | JType::Short | JType::Byte | JType::Char) => true,
            (Value::Bool(_), JType::Boolean) => true,
            (Value::Null, t) => t.is_reference(),
            (Value::Ref(obj), JType::Class(name)) => obj.class().is_assignable_to(name),
            _ => false,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) | (Value::Null, Value::Null) => true,
            (Value::Ref(a), Value::Ref(b)) => Arc::ptr_eq(a, b) || matches!((a.as_str(), b.as_str()), (Some(x), Some(y)) if x == y),
            (a, b) => match (a.as_int(), b.as_int()) {
                (Some(x), Some(y)) => x == y && matches!(a, Value::Bool(_)) == matches!(b, Value::Bool(_)),
                _ => false,
            },
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => f.write_str("void"),
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Ref(obj) => match obj.as_str() {
                Some(text) => f.write_str(text),
                None => write!(f, "{}@{:x}", obj.class().name(), obj.identity_hash()),
            },
        }
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Ref(value)
    }
}

#[derive(Debug)]
enum ObjectBody {
    /// Instance fields keyed by name, across the whole hierarchy
    Instance(Mutex<HashMap<String, Value>>),
    Str(String),
}

pub struct Object {
    class: Arc<Class>,
    body: ObjectBody,
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object").field("class", &self.class.name()).field("body", &self.body).finish()
    }
}

impl Object {
    /// Allocate an instance with every field of the hierarchy zeroed
    pub(crate) fn allocate(class: Arc<Class>) -> ObjectRef {
        let fields = class
            .instance_fields()
            .into_iter()
            .map(|field| (field.name.clone(), Value::default_for(&field.ty)))
            .collect();
        Arc::new(Object { class, body: ObjectBody::Instance(Mutex::new(fields)) })
    }

    pub fn class(&self) -> &Arc<Class> {
        &self.class
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.body {
            ObjectBody::Str(text) => Some(text),
            ObjectBody::Instance(_) => None,
        }
    }

    pub fn identity_hash(&self) -> i32 {
        ((self as *const Object as usize) >> 4) as i32
    }

    pub fn get_field(&self, name: &str) -> Result<Value> {
        match &self.body {
            ObjectBody::Instance(fields) => {
                let fields = fields.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                fields.get(name).cloned().ok_or_else(|| self.no_such_field(name))
            }
            ObjectBody::Str(_) => Err(self.no_such_field(name)),
        }
    }

    pub fn set_field(&self, name: &str, value: Value) -> Result<()> {
        match &self.body {
            ObjectBody::Instance(fields) => {
                let mut fields = fields.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                match fields.get_mut(name) {
                    Some(slot) => {
                        *slot = value.normalize();
                        Ok(())
                    }
                    None => Err(self.no_such_field(name)),
                }
            }
            ObjectBody::Str(_) => Err(self.no_such_field(name)),
        }
    }

    fn no_such_field(&self, name: &str) -> RuntimeError {
        RuntimeError::NoSuchField { class: self.class.name().to_string(), name: name.to_string() }
    }

    /// Call the public instance method `name` whose parameters accept `args`
    pub fn invoke(self: &Arc<Self>, name: &str, args: &[Value]) -> Result<Value> {
        let (owner, method) = self.class.select_method(name, args, false)?;
        log::debug!("invoking {}.{}{} on {}", owner.name(), name, method.raw_descriptor, self.class.name());
        let ret = method.descriptor.ret.clone();
        let result = Interpreter::new().invoke(&owner, &method, Some(self.clone()), args.to_vec())?;
        Ok(result.for_type(&ret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_values() {
        let hello = Value::string("hello").unwrap();
        assert_eq!(hello.as_str(), Some("hello"));
        assert_eq!(hello, Value::string("hello").unwrap());
        assert_eq!(hello.to_string(), "hello");
        assert!(hello.fits(&JType::object()));
        assert!(!hello.fits(&JType::Int));
    }

    #[test]
    fn test_boolean_normalization() {
        assert_eq!(Value::Bool(true).normalize(), Value::Int(1));
        assert_eq!(Value::Int(0).for_type(&JType::Boolean), Value::Bool(false));
        assert_ne!(Value::Bool(true), Value::Int(1));
        assert!(Value::Null.fits(&JType::string()));
    }
}
