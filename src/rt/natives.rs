//! Native method bindings for the platform classes
//!
//! Keyed by `owner.name + descriptor`, e.g. `java.lang.String.length()I`.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::bootstrap::DETAIL_MESSAGE_FIELD;
use super::error::{Result, RuntimeError};
use super::interp::Interpreter;
use super::value::{ObjectRef, Value};

/// Receiver (`None` for static methods) and arguments in declaration order
pub type NativeFn = fn(&mut Interpreter, Option<&ObjectRef>, &[Value]) -> Result<Value>;

static NATIVES: Lazy<HashMap<&'static str, NativeFn>> = Lazy::new(|| {
    let entries: &[(&'static str, NativeFn)] = &[
        ("java.lang.Object.hashCode()I", object_hash_code),
        ("java.lang.Object.equals(Ljava/lang/Object;)Z", object_equals),
        ("java.lang.Object.toString()Ljava/lang/String;", object_to_string),
        ("java.lang.String.length()I", string_length),
        ("java.lang.String.isEmpty()Z", string_is_empty),
        ("java.lang.String.concat(Ljava/lang/String;)Ljava/lang/String;", string_concat),
        ("java.lang.String.equals(Ljava/lang/Object;)Z", string_equals),
        ("java.lang.String.hashCode()I", string_hash_code),
        ("java.lang.String.toString()Ljava/lang/String;", string_to_string),
        ("java.lang.String.toUpperCase()Ljava/lang/String;", string_to_upper_case),
        ("java.lang.String.toLowerCase()Ljava/lang/String;", string_to_lower_case),
        ("java.lang.String.trim()Ljava/lang/String;", string_trim),
        ("java.lang.String.startsWith(Ljava/lang/String;)Z", string_starts_with),
        ("java.lang.String.endsWith(Ljava/lang/String;)Z", string_ends_with),
        ("java.lang.String.indexOf(Ljava/lang/String;)I", string_index_of),
        ("java.lang.String.substring(I)Ljava/lang/String;", string_substring_from),
        ("java.lang.String.substring(II)Ljava/lang/String;", string_substring),
        ("java.lang.String.valueOf(Ljava/lang/Object;)Ljava/lang/String;", string_value_of_object),
        ("java.lang.String.valueOf(I)Ljava/lang/String;", string_value_of_int),
        ("java.lang.String.valueOf(Z)Ljava/lang/String;", string_value_of_boolean),
        ("java.lang.Math.abs(I)I", math_abs),
        ("java.lang.Math.max(II)I", math_max),
        ("java.lang.Math.min(II)I", math_min),
        ("java.lang.Throwable.toString()Ljava/lang/String;", throwable_to_string),
    ];
    entries.iter().copied().collect()
});

pub fn lookup(owner: &str, name: &str, descriptor: &str) -> Option<NativeFn> {
    NATIVES.get(format!("{}.{}{}", owner, name, descriptor).as_str()).copied()
}

fn receiver<'a>(this: Option<&'a ObjectRef>) -> Result<&'a ObjectRef> {
    this.ok_or_else(|| RuntimeError::null_pointer("native instance method called without a receiver"))
}

fn this_str<'a>(this: Option<&'a ObjectRef>) -> Result<&'a str> {
    receiver(this)?
        .as_str()
        .ok_or_else(|| RuntimeError::IllegalArgument("receiver is not a java.lang.String".into()))
}

fn int_arg(args: &[Value], index: usize) -> Result<i32> {
    args.get(index)
        .and_then(Value::as_int)
        .ok_or_else(|| RuntimeError::IllegalArgument(format!("argument {} is not an int", index)))
}

/// String argument that must not be null
fn str_arg(args: &[Value], index: usize) -> Result<&str> {
    match args.get(index) {
        Some(Value::Null) | None => Err(RuntimeError::null_pointer(format!("argument {} is null", index))),
        Some(value) => value
            .as_str()
            .ok_or_else(|| RuntimeError::IllegalArgument(format!("argument {} is not a java.lang.String", index))),
    }
}

fn utf16_len(text: &str) -> i32 {
    text.encode_utf16().count() as i32
}

fn object_hash_code(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    Ok(Value::Int(receiver(this)?.identity_hash()))
}

fn object_equals(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    let this = receiver(this)?;
    let same = matches!(args.first(), Some(Value::Ref(other)) if std::sync::Arc::ptr_eq(this, other));
    Ok(Value::Bool(same))
}

fn object_to_string(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    let this = receiver(this)?;
    Value::string(format!("{}@{:x}", this.class().name(), this.identity_hash()))
}

fn string_length(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    Ok(Value::Int(utf16_len(this_str(this)?)))
}

fn string_is_empty(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    Ok(Value::Bool(this_str(this)?.is_empty()))
}

fn string_concat(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    let this = this_str(this)?;
    Value::string(format!("{}{}", this, str_arg(args, 0)?))
}

fn string_equals(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    let this = this_str(this)?;
    Ok(Value::Bool(args.first().and_then(Value::as_str) == Some(this)))
}

fn string_hash_code(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    let hash = this_str(this)?.encode_utf16().fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    Ok(Value::Int(hash))
}

fn string_to_string(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    Ok(Value::Ref(receiver(this)?.clone()))
}

fn string_to_upper_case(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    Value::string(this_str(this)?.to_uppercase())
}

fn string_to_lower_case(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    Value::string(this_str(this)?.to_lowercase())
}

fn string_trim(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    Value::string(this_str(this)?.trim_matches(|c: char| c <= ' '))
}

fn string_starts_with(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(this_str(this)?.starts_with(str_arg(args, 0)?)))
}

fn string_ends_with(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    Ok(Value::Bool(this_str(this)?.ends_with(str_arg(args, 0)?)))
}

fn string_index_of(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    let this = this_str(this)?;
    let index = this.find(str_arg(args, 0)?).map(|byte| utf16_len(&this[..byte])).unwrap_or(-1);
    Ok(Value::Int(index))
}

fn substring(text: &str, begin: i32, end: i32) -> Result<Value> {
    let units: Vec<u16> = text.encode_utf16().collect();
    if begin < 0 || end > units.len() as i32 || begin > end {
        return Err(RuntimeError::exception(
            "java.lang.StringIndexOutOfBoundsException",
            format!("begin {}, end {}, length {}", begin, end, units.len()),
        ));
    }
    Value::string(String::from_utf16_lossy(&units[begin as usize..end as usize]))
}

fn string_substring_from(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    let this = this_str(this)?;
    substring(this, int_arg(args, 0)?, utf16_len(this))
}

fn string_substring(_: &mut Interpreter, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    substring(this_str(this)?, int_arg(args, 0)?, int_arg(args, 1)?)
}

fn string_value_of_object(interp: &mut Interpreter, _: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Ref(obj)) if obj.as_str().is_some() => Ok(Value::Ref(obj.clone())),
        Some(Value::Ref(obj)) => interp.invoke_virtual(obj, "toString", "()Ljava/lang/String;", Vec::new()),
        _ => Value::string("null"),
    }
}

fn string_value_of_int(_: &mut Interpreter, _: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    Value::string(int_arg(args, 0)?.to_string())
}

fn string_value_of_boolean(_: &mut Interpreter, _: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    Value::string((int_arg(args, 0)? != 0).to_string())
}

fn math_abs(_: &mut Interpreter, _: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(int_arg(args, 0)?.wrapping_abs()))
}

fn math_max(_: &mut Interpreter, _: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(int_arg(args, 0)?.max(int_arg(args, 1)?)))
}

fn math_min(_: &mut Interpreter, _: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
    Ok(Value::Int(int_arg(args, 0)?.min(int_arg(args, 1)?)))
}

fn throwable_to_string(_: &mut Interpreter, this: Option<&ObjectRef>, _: &[Value]) -> Result<Value> {
    let this = receiver(this)?;
    let text = match this.get_field(DETAIL_MESSAGE_FIELD)?.as_str() {
        Some(message) => format!("{}: {}", this.class().name(), message),
        None => this.class().name().to_string(),
    };
    Value::string(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(owner: &str, name: &str, descriptor: &str, this: Option<&ObjectRef>, args: &[Value]) -> Result<Value> {
        let native = lookup(owner, name, descriptor).expect("native is bound");
        native(&mut Interpreter::new(), this, args)
    }

    #[test]
    fn test_string_natives() {
        let hello = Value::string("Hello").unwrap();
        let this = hello.as_object();
        assert_eq!(call("java.lang.String", "length", "()I", this, &[]).unwrap(), Value::Int(5));
        let world = Value::string(", World").unwrap();
        let joined = call("java.lang.String", "concat", "(Ljava/lang/String;)Ljava/lang/String;", this, &[world]).unwrap();
        assert_eq!(joined.as_str(), Some("Hello, World"));
        assert_eq!(call("java.lang.String", "hashCode", "()I", this, &[]).unwrap(), Value::Int(69609650));
        let err = call("java.lang.String", "substring", "(II)Ljava/lang/String;", this, &[Value::Int(3), Value::Int(9)]).unwrap_err();
        assert_eq!(err.exception_class(), Some("java.lang.StringIndexOutOfBoundsException"));
    }

    #[test]
    fn test_value_of_and_math() {
        let null = call("java.lang.String", "valueOf", "(Ljava/lang/Object;)Ljava/lang/String;", None, &[Value::Null]).unwrap();
        assert_eq!(null.as_str(), Some("null"));
        let b = call("java.lang.String", "valueOf", "(Z)Ljava/lang/String;", None, &[Value::Int(1)]).unwrap();
        assert_eq!(b.as_str(), Some("true"));
        assert_eq!(call("java.lang.Math", "max", "(II)I", None, &[Value::Int(3), Value::Int(7)]).unwrap(), Value::Int(7));
        assert!(lookup("java.lang.String", "intern", "()Ljava/lang/String;").is_none());
    }
}
