//! Bytecode interpreter
//!
//! Executes the instruction subset the generator emits. Java exceptions are
//! not catchable inside interpreted code, so a thrown exception unwinds the
//! whole call and surfaces as [`RuntimeError::Exception`].

use std::sync::Arc;

use super::bootstrap::DETAIL_MESSAGE_FIELD;
use super::class::{Class, Method};
use super::error::{Result, RuntimeError};
use super::natives;
use super::value::{Object, ObjectRef, Value};
use crate::codegen::attribute::CodeAttribute;
use crate::codegen::constpool::{Constant, MemberRef};
use crate::codegen::descriptor::{binary_name, MethodDescriptor};
use crate::codegen::error::ClassFormatError;
use crate::codegen::opcodes::*;
use crate::consts::{INTERP_MAX_CALL_DEPTH, INTERP_MAX_STEPS};

#[derive(Debug)]
pub struct Interpreter {
    depth: usize,
    steps: u64,
    max_steps: u64,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self { depth: 0, steps: 0, max_steps: INTERP_MAX_STEPS }
    }
}

/// Operand stack of one frame
struct Stack<'m> {
    values: Vec<Value>,
    method: &'m Method,
}

impl Stack<'_> {
    fn push(&mut self, value: Value) {
        self.values.push(value.normalize());
    }

    fn pop(&mut self) -> Result<Value> {
        self.values
            .pop()
            .ok_or_else(|| RuntimeError::verify(self.method.qualified_name(), "operand stack underflow"))
    }

    fn pop_int(&mut self) -> Result<i32> {
        let value = self.pop()?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::verify(self.method.qualified_name(), format!("expected int, found {:?}", value)))
    }

    /// Reference operand; `None` for null
    fn pop_ref(&mut self) -> Result<Option<ObjectRef>> {
        match self.pop()? {
            Value::Null => Ok(None),
            Value::Ref(obj) => Ok(Some(obj)),
            other => Err(RuntimeError::verify(self.method.qualified_name(), format!("expected reference, found {:?}", other))),
        }
    }

    fn peek(&self) -> Result<&Value> {
        self.values
            .last()
            .ok_or_else(|| RuntimeError::verify(self.method.qualified_name(), "operand stack underflow"))
    }

    fn pop_args(&mut self, count: usize) -> Result<Vec<Value>> {
        if self.values.len() < count {
            return Err(RuntimeError::verify(self.method.qualified_name(), "operand stack underflow"));
        }
        Ok(self.values.split_off(self.values.len() - count))
    }
}

fn same_reference(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Ref(x), Value::Ref(y)) => Arc::ptr_eq(x, y),
        _ => false,
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Interpreter that gives up after `max_steps` instructions
    pub fn with_step_limit(max_steps: u64) -> Self {
        Self { max_steps, ..Self::default() }
    }

    /// Run `method`, declared by `class`, with `this` for instance methods
    pub fn invoke(&mut self, class: &Arc<Class>, method: &Arc<Method>, this: Option<ObjectRef>, args: Vec<Value>) -> Result<Value> {
        if self.depth >= INTERP_MAX_CALL_DEPTH {
            return Err(RuntimeError::StackOverflow(INTERP_MAX_CALL_DEPTH));
        }
        let args: Vec<Value> = args.into_iter().map(Value::normalize).collect();
        if args.len() != method.descriptor.params.len() {
            return Err(RuntimeError::IllegalArgument(format!(
                "{} expects {} argument(s), got {}",
                method.qualified_name(),
                method.descriptor.params.len(),
                args.len()
            )));
        }
        if !method.is_static() && this.is_none() {
            return Err(RuntimeError::null_pointer(format!("instance method {} invoked without a receiver", method.qualified_name())));
        }

        if method.is_native() {
            let native = natives::lookup(&method.owner, &method.name, &method.raw_descriptor)
                .ok_or_else(|| RuntimeError::Linkage(format!("UnsatisfiedLinkError: {}", method.qualified_name())))?;
            self.depth += 1;
            let result = native(self, this.as_ref(), &args);
            self.depth -= 1;
            return result.map(Value::normalize);
        }
        if method.is_abstract() {
            return Err(RuntimeError::Linkage(format!("AbstractMethodError: {}", method.qualified_name())));
        }
        let code = method
            .code
            .as_ref()
            .ok_or_else(|| RuntimeError::verify(method.qualified_name(), "missing Code attribute"))?;

        let mut locals = vec![Value::Int(0); code.max_locals.max(1 + method.descriptor.param_slots()) as usize];
        let mut slot = 0usize;
        if let Some(this) = this {
            locals[0] = Value::Ref(this);
            slot = 1;
        }
        for (value, ty) in args.into_iter().zip(&method.descriptor.params) {
            locals[slot] = value;
            slot += ty.slot_size() as usize;
        }

        self.depth += 1;
        let result = self.execute(class, method, code, locals);
        self.depth -= 1;
        result
    }

    /// Dispatch `name` + `descriptor` on the runtime class of `receiver`
    pub fn invoke_virtual(&mut self, receiver: &ObjectRef, name: &str, descriptor: &str, args: Vec<Value>) -> Result<Value> {
        let (owner, method) = receiver.class().find_method(name, descriptor).ok_or_else(|| RuntimeError::NoSuchMethod {
            class: receiver.class().name().to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        })?;
        self.invoke(&owner, &method, Some(receiver.clone()), args)
    }

    fn execute(&mut self, class: &Arc<Class>, method: &Method, code: &CodeAttribute, mut locals: Vec<Value>) -> Result<Value> {
        let bytes = &code.code;
        let mut stack = Stack { values: Vec::with_capacity(code.max_stack as usize), method };
        let mut pc = 0usize;
        let verify = |message: String| RuntimeError::verify(method.qualified_name(), message);
        let class_format = |source: ClassFormatError| RuntimeError::ClassFormat { class: class.name().to_string(), source };

        let u8_at = |at: usize| bytes.get(at).copied().ok_or_else(|| verify(format!("truncated instruction at pc {}", at)));
        let u16_at = |at: usize| -> Result<u16> { Ok(u16::from_be_bytes([u8_at(at)?, u8_at(at + 1)?])) };
        let locals_len = locals.len();
        let local = |index: usize| -> Result<usize> {
            if index < locals_len {
                Ok(index)
            } else {
                Err(verify(format!("local variable {} out of range", index)))
            }
        };

        loop {
            self.steps += 1;
            if self.steps > self.max_steps {
                return Err(RuntimeError::StepLimit(self.max_steps));
            }
            let opcode = u8_at(pc)?;
            match opcode {
                NOP => pc += 1,
                ACONST_NULL => {
                    stack.push(Value::Null);
                    pc += 1;
                }
                ICONST_M1..=ICONST_5 => {
                    stack.push(Value::Int(opcode as i32 - ICONST_0 as i32));
                    pc += 1;
                }
                BIPUSH => {
                    stack.push(Value::Int(u8_at(pc + 1)? as i8 as i32));
                    pc += 2;
                }
                SIPUSH => {
                    stack.push(Value::Int(u16_at(pc + 1)? as i16 as i32));
                    pc += 3;
                }
                LDC | LDC_W => {
                    let (index, width) = if opcode == LDC { (u8_at(pc + 1)? as u16, 2) } else { (u16_at(pc + 1)?, 3) };
                    let value = match class.pool().get(index).map_err(class_format)? {
                        Constant::Integer(v) => Value::Int(*v),
                        Constant::String(utf8) => Value::string(class.pool().utf8(*utf8).map_err(class_format)?)?,
                        other => return Err(verify(format!("unsupported ldc constant {:?}", other))),
                    };
                    stack.push(value);
                    pc += width;
                }
                ILOAD | ALOAD => {
                    let index = local(u8_at(pc + 1)? as usize)?;
                    stack.push(locals[index].clone());
                    pc += 2;
                }
                ILOAD_0..=ILOAD_3 => {
                    let index = local((opcode - ILOAD_0) as usize)?;
                    stack.push(locals[index].clone());
                    pc += 1;
                }
                ALOAD_0..=ALOAD_3 => {
                    let index = local((opcode - ALOAD_0) as usize)?;
                    stack.push(locals[index].clone());
                    pc += 1;
                }
                ISTORE | ASTORE => {
                    let index = local(u8_at(pc + 1)? as usize)?;
                    locals[index] = stack.pop()?;
                    pc += 2;
                }
                ISTORE_0..=ISTORE_3 => {
                    let index = local((opcode - ISTORE_0) as usize)?;
                    locals[index] = stack.pop()?;
                    pc += 1;
                }
                ASTORE_0..=ASTORE_3 => {
                    let index = local((opcode - ASTORE_0) as usize)?;
                    locals[index] = stack.pop()?;
                    pc += 1;
                }
                WIDE => {
                    let index = local(u16_at(pc + 2)? as usize)?;
                    match u8_at(pc + 1)? {
                        ILOAD | ALOAD => stack.push(locals[index].clone()),
                        ISTORE | ASTORE => locals[index] = stack.pop()?,
                        other => return Err(verify(format!("wide {} is not supported", mnemonic(other)))),
                    }
                    pc += 4;
                }
                POP => {
                    stack.pop()?;
                    pc += 1;
                }
                DUP => {
                    let top = stack.peek()?.clone();
                    stack.push(top);
                    pc += 1;
                }
                SWAP => {
                    let a = stack.pop()?;
                    let b = stack.pop()?;
                    stack.push(a);
                    stack.push(b);
                    pc += 1;
                }
                IADD | ISUB | IMUL | IDIV | IREM | IXOR => {
                    let b = stack.pop_int()?;
                    let a = stack.pop_int()?;
                    if (opcode == IDIV || opcode == IREM) && b == 0 {
                        return Err(RuntimeError::exception("java.lang.ArithmeticException", "/ by zero"));
                    }
                    let result = match opcode {
                        IADD => a.wrapping_add(b),
                        ISUB => a.wrapping_sub(b),
                        IMUL => a.wrapping_mul(b),
                        IDIV => a.wrapping_div(b),
                        IREM => a.wrapping_rem(b),
                        _ => a ^ b,
                    };
                    stack.push(Value::Int(result));
                    pc += 1;
                }
                INEG => {
                    let a = stack.pop_int()?;
                    stack.push(Value::Int(a.wrapping_neg()));
                    pc += 1;
                }
                IFEQ..=IFLE => {
                    let a = stack.pop_int()?;
                    let taken = match opcode {
                        IFEQ => a == 0,
                        IFNE => a != 0,
                        IFLT => a < 0,
                        IFGE => a >= 0,
                        IFGT => a > 0,
                        _ => a <= 0,
                    };
                    pc = branch_target(pc, taken, u16_at(pc + 1)?);
                }
                IF_ICMPEQ..=IF_ICMPLE => {
                    let b = stack.pop_int()?;
                    let a = stack.pop_int()?;
                    let taken = match opcode {
                        IF_ICMPEQ => a == b,
                        IF_ICMPNE => a != b,
                        IF_ICMPLT => a < b,
                        IF_ICMPGE => a >= b,
                        IF_ICMPGT => a > b,
                        _ => a <= b,
                    };
                    pc = branch_target(pc, taken, u16_at(pc + 1)?);
                }
                IF_ACMPEQ | IF_ACMPNE => {
                    let b = stack.pop()?;
                    let a = stack.pop()?;
                    let same = same_reference(&a, &b);
                    pc = branch_target(pc, same == (opcode == IF_ACMPEQ), u16_at(pc + 1)?);
                }
                IFNULL | IFNONNULL => {
                    let is_null = stack.pop_ref()?.is_none();
                    pc = branch_target(pc, is_null == (opcode == IFNULL), u16_at(pc + 1)?);
                }
                GOTO => pc = branch_target(pc, true, u16_at(pc + 1)?),
                IRETURN | ARETURN => return stack.pop(),
                RETURN => return Ok(Value::Void),
                GETFIELD => {
                    let member = class.pool().member_ref(u16_at(pc + 1)?).map_err(class_format)?;
                    let target = stack
                        .pop_ref()?
                        .ok_or_else(|| RuntimeError::null_pointer(format!("Cannot read field \"{}\" because value is null", member.name)))?;
                    stack.push(target.get_field(&member.name)?);
                    pc += 3;
                }
                PUTFIELD => {
                    let member = class.pool().member_ref(u16_at(pc + 1)?).map_err(class_format)?;
                    let value = stack.pop()?;
                    let target = stack
                        .pop_ref()?
                        .ok_or_else(|| RuntimeError::null_pointer(format!("Cannot assign field \"{}\" because value is null", member.name)))?;
                    target.set_field(&member.name, value)?;
                    pc += 3;
                }
                INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
                    let member = class.pool().member_ref(u16_at(pc + 1)?).map_err(class_format)?;
                    let result = self.invoke_member(class, opcode, &member, &mut stack)?;
                    if !matches!(result, Value::Void) {
                        stack.push(result);
                    }
                    pc += if opcode == INVOKEINTERFACE { 5 } else { 3 };
                }
                NEW => {
                    let name = binary_name(class.pool().class_name(u16_at(pc + 1)?).map_err(class_format)?);
                    let target = class.loader().load_class(&name)?;
                    if target.is_interface() || target.is_abstract() {
                        return Err(RuntimeError::Linkage(format!("InstantiationError: {}", name)));
                    }
                    stack.push(Value::Ref(Object::allocate(target)));
                    pc += 3;
                }
                ATHROW => {
                    let thrown = stack
                        .pop_ref()?
                        .ok_or_else(|| RuntimeError::null_pointer("Cannot throw exception because value is null"))?;
                    let message = thrown.get_field(DETAIL_MESSAGE_FIELD).ok().and_then(|m| m.as_str().map(str::to_string));
                    log::debug!("{} thrown from {}", thrown.class().name(), method.qualified_name());
                    return Err(RuntimeError::Exception { class_name: thrown.class().name().to_string(), message });
                }
                CHECKCAST => {
                    let name = binary_name(class.pool().class_name(u16_at(pc + 1)?).map_err(class_format)?);
                    if let Value::Ref(obj) = stack.peek()? {
                        if !obj.class().is_assignable_to(&name) {
                            return Err(RuntimeError::exception(
                                "java.lang.ClassCastException",
                                format!("class {} cannot be cast to class {}", obj.class().name(), name),
                            ));
                        }
                    }
                    pc += 3;
                }
                INSTANCEOF => {
                    let name = binary_name(class.pool().class_name(u16_at(pc + 1)?).map_err(class_format)?);
                    let is_instance = match stack.pop_ref()? {
                        Some(obj) => obj.class().is_assignable_to(&name),
                        None => false,
                    };
                    stack.push(Value::Bool(is_instance));
                    pc += 3;
                }
                other => return Err(verify(format!("unsupported opcode {:#04x} ({}) at pc {}", other, mnemonic(other), pc))),
            }
        }
    }

    fn invoke_member(&mut self, class: &Arc<Class>, opcode: u8, member: &MemberRef, stack: &mut Stack<'_>) -> Result<Value> {
        let descriptor = MethodDescriptor::parse(&member.descriptor)
            .map_err(|source| RuntimeError::ClassFormat { class: class.name().to_string(), source })?;
        let args = stack.pop_args(descriptor.params.len())?;
        let owner_name = binary_name(&member.class);
        let no_such_method = || RuntimeError::NoSuchMethod {
            class: owner_name.clone(),
            name: member.name.clone(),
            descriptor: member.descriptor.clone(),
        };

        if opcode == INVOKESTATIC {
            let owner = class.loader().load_class(&owner_name)?;
            let (declaring, method) = owner.find_method(&member.name, &member.descriptor).ok_or_else(no_such_method)?;
            if !method.is_static() {
                return Err(RuntimeError::Linkage(format!("IncompatibleClassChangeError: {} is not static", method.qualified_name())));
            }
            return self.invoke(&declaring, &method, None, args);
        }

        let receiver = stack.pop_ref()?.ok_or_else(|| {
            RuntimeError::null_pointer(format!("Cannot invoke \"{}.{}()\" because value is null", owner_name, member.name))
        })?;
        let (declaring, method) = if opcode == INVOKESPECIAL {
            let owner = class.loader().load_class(&owner_name)?;
            owner.find_method(&member.name, &member.descriptor).ok_or_else(no_such_method)?
        } else {
            receiver.class().find_method(&member.name, &member.descriptor).ok_or_else(no_such_method)?
        };
        if method.is_static() {
            return Err(RuntimeError::Linkage(format!("IncompatibleClassChangeError: {} is static", method.qualified_name())));
        }
        self.invoke(&declaring, &method, Some(receiver), args)
    }
}

fn branch_target(pc: usize, taken: bool, offset: u16) -> usize {
    if taken {
        (pc as i64 + offset as i16 as i64) as usize
    } else {
        pc + 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::builder::ClassBuilder;
    use crate::codegen::code::Code;
    use crate::codegen::defs::access_flags::*;
    use crate::codegen::descriptor::JType;
    use crate::common::classpath::ClassPath;
    use crate::rt::loader::{ClassLoader, HostClassLoader};

    /// `static int run(int a, int b)` assembled from `body`
    fn define_static(name: &str, max_locals: u16, body: impl FnOnce(&mut Code, &mut ClassBuilder)) -> Arc<Class> {
        let mut builder = ClassBuilder::new(name, Some("java.lang.Object"), ACC_PUBLIC | ACC_SUPER);
        let mut code = Code::new(max_locals);
        body(&mut code, &mut builder);
        let descriptor = MethodDescriptor::new(vec![JType::Int, JType::Int], JType::Int);
        builder.add_method(ACC_PUBLIC | ACC_STATIC, "run", &descriptor, Some(code.finish(max_locals).unwrap()), &[]);
        let host = HostClassLoader::new(ClassPath::new());
        host.define_resource(name, builder.to_bytes());
        host.load_class(name).unwrap()
    }

    #[test]
    fn test_arithmetic_and_branches() {
        // return a > b ? a - b : b * 2
        let class = define_static("t.Arith", 2, |code, _| {
            let else_label = code.new_label();
            code.load(false, 0);
            code.load(false, 1);
            code.branch(IF_ICMPLE, else_label, -2);
            code.load(false, 0);
            code.load(false, 1);
            code.emitop(ISUB, -1);
            code.emitop(IRETURN, -1);
            code.place(else_label);
            code.load(false, 1);
            code.iconst(2);
            code.emitop(IMUL, -1);
            code.emitop(IRETURN, -1);
        });
        assert_eq!(class.invoke_static("run", &[Value::Int(9), Value::Int(4)]).unwrap(), Value::Int(5));
        assert_eq!(class.invoke_static("run", &[Value::Int(1), Value::Int(4)]).unwrap(), Value::Int(8));
    }

    #[test]
    fn test_division_by_zero_throws() {
        let class = define_static("t.Div", 2, |code, _| {
            code.load(false, 0);
            code.load(false, 1);
            code.emitop(IDIV, -1);
            code.emitop(IRETURN, -1);
        });
        let err = class.invoke_static("run", &[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(err.exception_class(), Some("java.lang.ArithmeticException"));
        assert_eq!(err.to_string(), "java.lang.ArithmeticException: / by zero");
    }

    #[test]
    fn test_thrown_exception_carries_message() {
        let class = define_static("t.Throw", 2, |code, builder| {
            let exception = builder.pool_mut().add_class("java/lang/IllegalStateException");
            let init = builder.pool_mut().add_method_ref("java/lang/IllegalStateException", "<init>", "(Ljava/lang/String;)V");
            let message = builder.pool_mut().add_string("broken");
            code.emit_cp(NEW, exception, 1);
            code.emitop(DUP, 1);
            code.ldc(message);
            code.emit_cp(INVOKESPECIAL, init, -2);
            code.emitop(ATHROW, -1);
        });
        let err = class.invoke_static("run", &[Value::Int(0), Value::Int(0)]).unwrap_err();
        assert_eq!(err.to_string(), "java.lang.IllegalStateException: broken");
    }

    #[test]
    fn test_infinite_loop_hits_step_budget() {
        let class = define_static("t.Spin", 2, |code, _| {
            let top = code.new_label();
            code.place(top);
            code.branch(GOTO, top, 0);
        });
        let method = class.find_declared_method("run", "(II)I").unwrap();
        let err = Interpreter::with_step_limit(1_000).invoke(&class, &method, None, vec![Value::Int(0), Value::Int(0)]).unwrap_err();
        assert!(matches!(err, RuntimeError::StepLimit(1_000)));
    }

    #[test]
    fn test_wide_locals() {
        // int x299 = a; int x5 = b; return x299 - x5
        let class = define_static("t.Wide", 300, |code, _| {
            code.load(false, 0);
            code.store(false, 299);
            code.load(false, 1);
            code.store(false, 5);
            code.load(false, 299);
            code.load(false, 5);
            code.emitop(ISUB, -1);
            code.emitop(IRETURN, -1);
        });
        assert_eq!(class.invoke_static("run", &[Value::Int(50), Value::Int(8)]).unwrap(), Value::Int(42));
    }
}
