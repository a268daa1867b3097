//! Code buffer for a single method body
//!
//! Tracks the operand stack depth, local variable slots, forward jumps and the
//! line number table while bytecode is emitted. Jumps are recorded against
//! [`Label`]s and patched once the label is placed.

use thiserror::Error;

use super::attribute::{CodeAttribute, LineNumberEntry};
use super::opcodes::*;

/// `code_length` must fit the class file's u16 offsets
const MAX_CODE_LENGTH: usize = u16::MAX as usize;

/// A method body that does not fit the class file encoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeLimitError {
    #[error("code too large ({0} bytes)")]
    CodeTooLarge(usize),

    #[error("code too large: branch offset {0} exceeds the 16-bit jump range")]
    BranchTooFar(i64),
}

/// A jump target inside the current method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

#[derive(Debug)]
struct PendingJump {
    /// pc of the branch opcode
    opcode_pc: usize,
    label: Label,
}

/// Allocates local variable slots; blocks restore the watermark on exit
#[derive(Debug, Default)]
pub struct LocalAllocator {
    next: u16,
    max: u16,
}

impl LocalAllocator {
    pub fn new(first_free: u16) -> Self {
        Self { next: first_free, max: first_free }
    }

    pub fn alloc(&mut self, size: u16) -> u16 {
        let slot = self.next;
        self.next += size;
        self.max = self.max.max(self.next);
        slot
    }

    pub fn mark(&self) -> u16 {
        self.next
    }

    pub fn reset(&mut self, mark: u16) {
        self.next = mark;
    }

    pub fn max_locals(&self) -> u16 {
        self.max
    }
}

#[derive(Debug)]
pub struct Code {
    bytes: Vec<u8>,
    stack: i32,
    max_stack: i32,
    /// False after an unconditional transfer until the next label
    alive: bool,
    labels: Vec<Option<usize>>,
    /// Stack depth expected at each label, taken from the first jump to it
    label_stack: Vec<Option<i32>>,
    pending: Vec<PendingJump>,
    line_numbers: Vec<LineNumberEntry>,
    pub locals: LocalAllocator,
}

impl Code {
    /// `first_free_local` is the slot after `this` and the parameters
    pub fn new(first_free_local: u16) -> Self {
        Self {
            bytes: Vec::new(),
            stack: 0,
            max_stack: 0,
            alive: true,
            labels: Vec::new(),
            label_stack: Vec::new(),
            pending: Vec::new(),
            line_numbers: Vec::new(),
            locals: LocalAllocator::new(first_free_local),
        }
    }

    pub fn pc(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    fn adjust_stack(&mut self, delta: i32) {
        self.stack += delta;
        if self.stack < 0 {
            log::warn!("operand stack underflow at pc {}", self.pc());
            self.stack = 0;
        }
        self.max_stack = self.max_stack.max(self.stack);
    }

    /// Emit an opcode with its net stack effect
    pub fn emitop(&mut self, opcode: u8, stack_delta: i32) {
        self.bytes.push(opcode);
        self.adjust_stack(stack_delta);
        if matches!(opcode, IRETURN | ARETURN | RETURN | ATHROW | GOTO) {
            self.alive = false;
        }
    }

    pub fn emit1(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn emit2(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    /// Record a line number for the next instruction
    pub fn mark_line(&mut self, line: usize) {
        let line = line.min(u16::MAX as usize) as u16;
        let start_pc = self.pc() as u16;
        match self.line_numbers.last_mut() {
            Some(last) if last.start_pc == start_pc => last.line_number = line,
            Some(last) if last.line_number == line => {}
            _ => self.line_numbers.push(LineNumberEntry { start_pc, line_number: line }),
        }
    }

    pub fn iconst(&mut self, value: i32) {
        match value {
            -1..=5 => self.emitop((ICONST_0 as i32 + value) as u8, 1),
            -128..=127 => {
                self.emitop(BIPUSH, 1);
                self.emit1(value as i8 as u8);
            }
            _ => {
                // Callers route values outside the i16 range through ldc
                debug_assert!((-32768..=32767).contains(&value));
                self.emitop(SIPUSH, 1);
                self.emit2(value as i16 as u16);
            }
        }
    }

    pub fn ldc(&mut self, index: u16) {
        if index <= u8::MAX as u16 {
            self.emitop(LDC, 1);
            self.emit1(index as u8);
        } else {
            self.emitop(LDC_W, 1);
            self.emit2(index);
        }
    }

    pub fn load(&mut self, reference: bool, slot: u16) {
        let (short, long) = if reference { (ALOAD_0, ALOAD) } else { (ILOAD_0, ILOAD) };
        self.emit_local(short, long, slot, 1);
    }

    pub fn store(&mut self, reference: bool, slot: u16) {
        let (short, long) = if reference { (ASTORE_0, ASTORE) } else { (ISTORE_0, ISTORE) };
        self.emit_local(short, long, slot, -1);
    }

    /// Local access in its shortest form: `xload_n`, `xload idx` or `wide xload idx16`
    fn emit_local(&mut self, short: u8, long: u8, slot: u16, stack_delta: i32) {
        match slot {
            0..=3 => self.emitop(short + slot as u8, stack_delta),
            4..=255 => {
                self.emitop(long, stack_delta);
                self.emit1(slot as u8);
            }
            _ => {
                self.emit1(WIDE);
                self.emitop(long, stack_delta);
                self.emit2(slot);
            }
        }
    }

    /// Emit an instruction with a u16 constant pool operand
    pub fn emit_cp(&mut self, opcode: u8, index: u16, stack_delta: i32) {
        self.emitop(opcode, stack_delta);
        self.emit2(index);
    }

    /// `invokeinterface` carries an argument count and a zero byte
    pub fn invokeinterface(&mut self, index: u16, arg_slots: u8, stack_delta: i32) {
        self.emitop(INVOKEINTERFACE, stack_delta);
        self.emit2(index);
        self.emit1(arg_slots + 1);
        self.emit1(0);
    }

    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        self.label_stack.push(None);
        Label(self.labels.len() - 1)
    }

    /// Emit a branch to `label`; `stack_delta` is the branch's own pop count
    pub fn branch(&mut self, opcode: u8, label: Label, stack_delta: i32) {
        let opcode_pc = self.pc();
        self.emitop(opcode, stack_delta);
        self.emit2(0);
        if self.label_stack[label.0].is_none() {
            self.label_stack[label.0] = Some(self.stack);
        }
        self.pending.push(PendingJump { opcode_pc, label });
    }

    /// Bind `label` to the current pc
    pub fn place(&mut self, label: Label) {
        self.labels[label.0] = Some(self.pc());
        if let Some(depth) = self.label_stack[label.0] {
            self.stack = depth;
            self.alive = true;
        }
    }

    /// Resolve pending jumps and build the `Code` attribute
    pub fn finish(mut self, max_locals_floor: u16) -> Result<CodeAttribute, CodeLimitError> {
        if self.bytes.len() > MAX_CODE_LENGTH {
            return Err(CodeLimitError::CodeTooLarge(self.bytes.len()));
        }
        for jump in std::mem::take(&mut self.pending) {
            let target = self.labels[jump.label.0].unwrap_or(jump.opcode_pc);
            let offset = target as i64 - jump.opcode_pc as i64;
            let offset = i16::try_from(offset).map_err(|_| CodeLimitError::BranchTooFar(offset))?;
            let bytes = offset.to_be_bytes();
            self.bytes[jump.opcode_pc + 1] = bytes[0];
            self.bytes[jump.opcode_pc + 2] = bytes[1];
        }
        let mut attribute = CodeAttribute::new(
            self.max_stack.max(0) as u16,
            self.locals.max_locals().max(max_locals_floor),
            self.bytes,
        );
        attribute.line_numbers = self.line_numbers;
        Ok(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_branch_is_patched() {
        let mut code = Code::new(1);
        let end = code.new_label();
        code.load(false, 0);
        code.branch(IFEQ, end, -1);
        code.iconst(1);
        code.emitop(IRETURN, -1);
        code.place(end);
        code.iconst(0);
        code.emitop(IRETURN, -1);
        let attr = code.finish(1).unwrap();
        // iload_0, ifeq +5, iconst_1, ireturn, iconst_0, ireturn
        assert_eq!(attr.code, vec![ILOAD_0, IFEQ, 0, 5, ICONST_1, IRETURN, ICONST_0, IRETURN]);
        assert_eq!(attr.max_stack, 1);
    }

    #[test]
    fn test_constants_pick_shortest_form() {
        let mut code = Code::new(0);
        code.iconst(3);
        code.iconst(100);
        code.iconst(1000);
        let attr = code.finish(0).unwrap();
        assert_eq!(attr.code, vec![ICONST_3, BIPUSH, 100, SIPUSH, 0x03, 0xe8]);
        assert_eq!(attr.max_stack, 3);
    }

    #[test]
    fn test_high_slots_use_wide() {
        let mut code = Code::new(0);
        code.load(false, 200);
        code.store(false, 299);
        code.load(true, 256);
        let attr = code.finish(300).unwrap();
        assert_eq!(attr.code, vec![ILOAD, 200, WIDE, ISTORE, 0x01, 0x2b, WIDE, ALOAD, 0x01, 0x00]);
        assert_eq!(attr.max_locals, 300);
        assert_eq!(attr.max_stack, 1);
    }

    #[test]
    fn test_branch_out_of_range_is_rejected() {
        let mut code = Code::new(0);
        let end = code.new_label();
        code.branch(GOTO, end, 0);
        for _ in 0..33_000 {
            code.emitop(NOP, 0);
        }
        code.place(end);
        code.emitop(RETURN, 0);
        assert_eq!(code.finish(0).unwrap_err(), CodeLimitError::BranchTooFar(33_003));
    }

    #[test]
    fn test_locals_watermark() {
        let mut locals = LocalAllocator::new(2);
        let mark = locals.mark();
        assert_eq!(locals.alloc(1), 2);
        assert_eq!(locals.alloc(1), 3);
        locals.reset(mark);
        assert_eq!(locals.alloc(1), 2);
        assert_eq!(locals.max_locals(), 4);
    }
}
