//! Bytecode generation with attribution of method bodies
//!
//! Corresponds to javac's `Gen`, with the body checks of `Attr` and `Flow`
//! folded in: every expression is typed while its code is emitted, and
//! reachability is read off the code buffer's liveness. A class whose
//! generation reported any error yields no bytes.

use std::rc::Rc;

use super::attribute::CodeAttribute;
use super::builder::ClassBuilder;
use super::code::{Code, Label};
use super::constpool::{ConstantPool, MAX_UTF8_LENGTH};
use super::defs::access_flags::*;
use super::defs::CONSTRUCTOR_METHOD_NAME;
use super::descriptor::{internal_name, JType, MethodDescriptor, OBJECT, STRING, THROWABLE};
use super::opcodes::*;
use crate::ast::*;
use crate::common::config::Config;
use crate::wash::enter::{check_class_access, EnteredClass, UnitEnv};
use crate::wash::symtab::{display_type, outermost, package_of, simple_name, type_list, ClassSymbol, FieldSymbol, MethodSymbol, Symtab};
use crate::wash::Log;

const METHOD_FLAG_MASK: u16 = ACC_PUBLIC | ACC_PRIVATE | ACC_PROTECTED | ACC_STATIC | ACC_FINAL | ACC_ABSTRACT;

/// Generates class files for the classes of one compilation unit
pub struct Gen<'a, 's> {
    env: &'a UnitEnv,
    symtab: &'a Symtab<'s>,
    log: &'a Log<'a>,
    config: &'a Config,
}

#[derive(Debug, Clone)]
struct LocalVar {
    name: String,
    /// `None` when the declared type failed to resolve
    ty: Option<JType>,
    slot: u16,
    is_final: bool,
}

/// How a call's receiver is supplied
enum CallSite {
    /// `Type.m()`: no receiver
    Static(String),
    /// Receiver already on the stack, typed as the named class
    Instance(String),
    /// `super.m()`: `this` on the stack, dispatched non-virtually
    Super(String),
}

impl<'a, 's> Gen<'a, 's> {
    pub fn new(env: &'a UnitEnv, symtab: &'a Symtab<'s>, log: &'a Log<'a>, config: &'a Config) -> Self {
        Self { env, symtab, log, config }
    }

    /// Class file bytes for `class`, or `None` if it had errors
    pub fn gen_def_class(&self, class: &EnteredClass) -> Option<Vec<u8>> {
        let errors_before = self.log.error_count();
        let symbol = self.symtab.lookup(&class.name)?;
        let decl = &class.decl;

        let mut builder = ClassBuilder::new(&symbol.name, symbol.super_name.as_deref(), symbol.class_file_flags());
        builder.set_major_version(self.config.major_version().ok()?);
        for interface in &symbol.interfaces {
            builder.add_interface(interface);
        }
        for field in &symbol.fields {
            builder.add_field(field.flags, &field.name, &field.ty);
        }

        let methods: Vec<&MethodSymbol> = symbol.methods.iter().filter(|m| !m.is_constructor()).collect();
        for (method, method_symbol) in decl.methods().zip(methods) {
            let code = match &method.body {
                Some(body) if !method_symbol.is_abstract() => {
                    Some(self.gen_method(builder.pool_mut(), &symbol, method, body, method_symbol))
                }
                _ => None,
            };
            builder.add_method(
                method_symbol.flags & METHOD_FLAG_MASK,
                &method_symbol.name,
                &method_symbol.descriptor,
                code,
                &method_symbol.throws,
            );
        }

        let ctors: Vec<&MethodSymbol> = symbol.constructors().collect();
        if decl.constructors().next().is_some() {
            for (ctor, ctor_symbol) in decl.constructors().zip(ctors) {
                let code = self.gen_constructor(builder.pool_mut(), &symbol, decl, Some(ctor), ctor_symbol);
                builder.add_method(ctor_symbol.flags & METHOD_FLAG_MASK, CONSTRUCTOR_METHOD_NAME, &ctor_symbol.descriptor, Some(code), &ctor_symbol.throws);
            }
        } else if let Some(default_ctor) = ctors.first() {
            let code = self.gen_constructor(builder.pool_mut(), &symbol, decl, None, default_ctor);
            builder.add_method(default_ctor.flags & METHOD_FLAG_MASK, CONSTRUCTOR_METHOD_NAME, &default_ctor.descriptor, Some(code), &[]);
        }

        if self.config.debug {
            let file_name = self.env.file.name();
            builder.set_source_file(file_name.rsplit('/').next().unwrap_or(&file_name));
        }
        if self.log.error_count() > errors_before {
            log::debug!("skipping class file for {}: {} error(s)", symbol.name, self.log.error_count() - errors_before);
            return None;
        }
        log::debug!("generated {}", symbol.name);
        Some(builder.to_bytes())
    }

    fn gen_method(
        &self,
        pool: &mut ConstantPool,
        class: &Rc<ClassSymbol>,
        decl: &MethodDecl,
        body: &Block,
        method: &MethodSymbol,
    ) -> CodeAttribute {
        let context = format!("method {}", method.signature());
        let mut gen = MethodGen::new(self, pool, class.clone(), method, context, false);
        gen.declare_parameters(&decl.parameters, method);
        gen.gen_stats(&body.statements);
        if gen.code.is_alive() {
            if method.return_type().is_void() {
                gen.mark_line(body.span.end.line);
                gen.code.emitop(RETURN, 0);
            } else {
                gen.error_at(body.span.end, "missing return statement");
            }
        }
        gen.finish(body.span.start)
    }

    /// Constructor body, or the default constructor when `decl` is `None`
    fn gen_constructor(
        &self,
        pool: &mut ConstantPool,
        class: &Rc<ClassSymbol>,
        class_decl: &ClassDecl,
        decl: Option<&ConstructorDecl>,
        ctor: &MethodSymbol,
    ) -> CodeAttribute {
        let context = format!("constructor {}", ctor.signature());
        let mut gen = MethodGen::new(self, pool, class.clone(), ctor, context, true);
        let line = decl.map(|d| d.span.start.line).unwrap_or(class_decl.name_span.start.line);
        gen.mark_line(line);
        if let Some(decl) = decl {
            gen.declare_parameters(&decl.parameters, ctor);
        }

        let invocation = decl.and_then(|d| d.explicit_invocation.as_ref());
        let calls_this = matches!(invocation, Some(inv) if inv.kind == CtorInvocationKind::This);
        let (arguments, span): (&[Expr], Span) = match invocation {
            Some(inv) => (&inv.arguments, inv.span),
            None => (&[], class_decl.name_span),
        };
        let target = if calls_this { class.name.clone() } else { class.super_name.clone().unwrap_or_else(|| OBJECT.to_string()) };
        gen.gen_ctor_invocation(&target, arguments, span);

        if !calls_this {
            for field in class_decl.fields().filter(|f| !f.has_modifier(Modifier::Static)) {
                if let Some(init) = &field.initializer {
                    gen.gen_field_init(field, init);
                }
            }
        }
        if let Some(decl) = decl {
            gen.gen_stats(&decl.body.statements);
        }
        if gen.code.is_alive() {
            if let Some(decl) = decl {
                gen.mark_line(decl.body.span.end.line);
            }
            gen.code.emitop(RETURN, 0);
        }
        gen.finish(decl.map(|d| d.span.start).unwrap_or(class_decl.name_span.start))
    }
}

/// Per-method generation state
struct MethodGen<'g, 'a, 's> {
    gen: &'g Gen<'a, 's>,
    pool: &'g mut ConstantPool,
    class: Rc<ClassSymbol>,
    code: Code,
    scopes: Vec<Vec<LocalVar>>,
    locals_floor: u16,
    is_static: bool,
    in_ctor: bool,
    return_type: JType,
    throws: Vec<String>,
    /// `method greet(String)`, used in redeclaration errors
    context: String,
    /// Inferring argument types: report nothing
    quiet: bool,
}

impl<'g, 'a, 's> MethodGen<'g, 'a, 's> {
    fn new(
        gen: &'g Gen<'a, 's>,
        pool: &'g mut ConstantPool,
        class: Rc<ClassSymbol>,
        method: &MethodSymbol,
        context: String,
        in_ctor: bool,
    ) -> Self {
        let is_static = method.is_static();
        // Parameters are declared into the slots right after `this`
        let receiver = if is_static { 0 } else { 1 };
        Self {
            gen,
            pool,
            class,
            code: Code::new(receiver),
            scopes: vec![Vec::new()],
            locals_floor: method.descriptor.param_slots() + receiver,
            is_static,
            in_ctor,
            return_type: method.return_type().clone(),
            throws: method.throws.clone(),
            context,
            quiet: false,
        }
    }

    /// Patch jumps and build the attribute. A body over the class file
    /// limits is reported at `at`, which drops the class.
    fn finish(self, at: Location) -> CodeAttribute {
        let gen = self.gen;
        let floor = self.locals_floor;
        self.code.finish(floor).unwrap_or_else(|error| {
            gen.log.error_at(&gen.env.file, at, error.to_string());
            CodeAttribute::new(0, floor, Vec::new())
        })
    }

    fn symtab(&self) -> &Symtab<'s> {
        self.gen.symtab
    }

    fn error(&self, span: Span, message: impl Into<String>) {
        self.error_at(span.start, message);
    }

    fn error_at(&self, location: Location, message: impl Into<String>) {
        if !self.quiet {
            self.gen.log.error_at(&self.gen.env.file, location, message);
        }
    }

    fn mark_line(&mut self, line: usize) {
        if self.gen.config.debug {
            self.code.mark_line(line);
        }
    }

    fn current(&self) -> &str {
        &self.class.name
    }

    fn resolve_type(&self, ty: &TypeRef) -> Option<JType> {
        match self.gen.env.resolve_type(self.symtab(), ty, Some(&self.class.name)) {
            Ok(resolved) => Some(resolved),
            Err(message) => {
                self.error(ty.span, message);
                None
            }
        }
    }

    // Locals

    fn declare_parameters(&mut self, parameters: &[Parameter], method: &MethodSymbol) {
        for (param, ty) in parameters.iter().zip(method.params()) {
            self.declare_local(&param.name, Some(ty.clone()), param.modifiers.contains(&Modifier::Final), param.span);
        }
    }

    fn find_local(&self, name: &str) -> Option<&LocalVar> {
        self.scopes.iter().rev().flat_map(|scope| scope.iter().rev()).find(|local| local.name == name)
    }

    fn declare_local(&mut self, name: &str, ty: Option<JType>, is_final: bool, span: Span) -> u16 {
        if self.find_local(name).is_some() {
            self.error(span, format!("variable {} is already defined in {}", name, self.context));
        }
        let size = ty.as_ref().map(JType::slot_size).unwrap_or(1).max(1);
        let slot = self.code.locals.alloc(size);
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(LocalVar { name: name.to_string(), ty, slot, is_final });
        }
        slot
    }

    // Statements

    fn gen_stats(&mut self, stats: &[Stmt]) {
        let mut reported = false;
        for stat in stats {
            if !self.code.is_alive() && !reported && !matches!(stat, Stmt::Empty(_)) {
                self.error(stat.span(), "unreachable statement");
                reported = true;
            }
            self.gen_stmt(stat);
        }
    }

    fn gen_block(&mut self, block: &Block) {
        let mark = self.code.locals.mark();
        self.scopes.push(Vec::new());
        self.gen_stats(&block.statements);
        self.scopes.pop();
        self.code.locals.reset(mark);
    }

    fn gen_stmt(&mut self, stmt: &Stmt) {
        if !matches!(stmt, Stmt::Block(_) | Stmt::Empty(_)) {
            self.mark_line(stmt.span().line());
        }
        match stmt {
            Stmt::Expression(s) => self.gen_expr_stmt(&s.expr),
            Stmt::Declaration(s) => self.gen_var_decl(s),
            Stmt::If(s) => self.gen_if_stmt(s),
            Stmt::While(s) => self.gen_while_stmt(s),
            Stmt::Return(s) => self.gen_return(s),
            Stmt::Throw(s) => self.gen_throw(s),
            Stmt::Block(block) => self.gen_block(block),
            Stmt::Empty(_) => {}
        }
    }

    fn gen_expr_stmt(&mut self, expr: &Expr) {
        match expr {
            Expr::Assignment(assignment) => self.gen_assignment(assignment),
            _ => {
                if let Some(ty) = self.gen_expr(expr) {
                    if !ty.is_void() {
                        self.code.emitop(POP, -1);
                    }
                }
            }
        }
    }

    fn gen_var_decl(&mut self, decl: &VarDeclStmt) {
        let ty = self.resolve_type(&decl.type_ref);
        if ty.as_ref().map(JType::is_void).unwrap_or(false) {
            self.error(decl.type_ref.span, "'void' type not allowed here");
        }
        let Some(init) = &decl.initializer else {
            self.error(decl.span, format!("variable {} must be initialized where it is declared", decl.name));
            self.declare_local(&decl.name, ty, true, decl.span);
            return;
        };
        let value = self.gen_expr(init);
        if let (Some(value), Some(ty)) = (&value, &ty) {
            self.check_assignable(value, ty, init.span());
        }
        let is_final = decl.modifiers.contains(&Modifier::Final);
        let reference = ty.as_ref().map(JType::is_reference).unwrap_or(true);
        let slot = self.declare_local(&decl.name, ty, is_final, decl.span);
        self.code.store(reference, slot);
    }

    fn gen_if_stmt(&mut self, stmt: &IfStmt) {
        let else_label = self.code.new_label();
        self.gen_cond(&stmt.condition, false, else_label);
        self.gen_branch_body(&stmt.then_branch);
        match &stmt.else_branch {
            Some(else_branch) => {
                let end = self.code.new_label();
                if self.code.is_alive() {
                    self.code.branch(GOTO, end, 0);
                }
                self.code.place(else_label);
                self.gen_branch_body(else_branch);
                self.code.place(end);
            }
            None => self.code.place(else_label),
        }
    }

    /// Statement in its own scope, as javac scopes `if`/`while` bodies
    fn gen_branch_body(&mut self, stmt: &Stmt) {
        let mark = self.code.locals.mark();
        self.scopes.push(Vec::new());
        self.gen_stmt(stmt);
        self.scopes.pop();
        self.code.locals.reset(mark);
    }

    fn gen_while_stmt(&mut self, stmt: &WhileStmt) {
        let top = self.code.new_label();
        let exit = self.code.new_label();
        self.code.place(top);
        match constant_condition(&stmt.condition) {
            Some(true) => {}
            Some(false) => {
                self.error(stmt.body.span(), "unreachable statement");
                return;
            }
            None => self.gen_cond(&stmt.condition, false, exit),
        }
        self.gen_branch_body(&stmt.body);
        if self.code.is_alive() {
            self.code.branch(GOTO, top, 0);
        }
        self.code.place(exit);
    }

    fn gen_return(&mut self, stmt: &ReturnStmt) {
        let void = self.return_type.is_void();
        match (&stmt.value, void) {
            (None, true) => self.code.emitop(RETURN, 0),
            (None, false) => {
                self.error(stmt.span, "incompatible types: missing return value");
                self.code.emitop(RETURN, 0);
            }
            (Some(value), true) => {
                self.gen_expr(value);
                self.error(value.span(), "incompatible types: unexpected return value");
                self.code.emitop(RETURN, 0);
            }
            (Some(value), false) => {
                if let Some(ty) = self.gen_expr(value) {
                    let expected = self.return_type.clone();
                    self.check_assignable(&ty, &expected, value.span());
                }
                let opcode = if self.return_type.is_reference() { ARETURN } else { IRETURN };
                self.code.emitop(opcode, -1);
            }
        }
    }

    fn gen_throw(&mut self, stmt: &ThrowStmt) {
        if let Some(ty) = self.gen_expr(&stmt.expr) {
            match &ty {
                JType::Null => {}
                JType::Class(name) if self.symtab().is_subclass(name, THROWABLE) => {
                    let name = name.clone();
                    self.check_thrown(&name, stmt.span);
                }
                other => self.error(
                    stmt.expr.span(),
                    format!("incompatible types: {} cannot be converted to Throwable", display_type(other)),
                ),
            }
        }
        self.code.emitop(ATHROW, -1);
    }

    /// Checked exceptions must be declared by the enclosing method
    fn check_thrown(&self, exception: &str, span: Span) {
        if !self.symtab().is_checked_exception(exception) {
            return;
        }
        if self.throws.iter().any(|declared| self.symtab().is_subclass(exception, declared)) {
            return;
        }
        self.error(
            span,
            format!("unreported exception {}; must be caught or declared to be thrown", simple_name(exception)),
        );
    }

    fn check_assignable(&self, from: &JType, to: &JType, span: Span) -> bool {
        if from.is_void() {
            self.error(span, "'void' type not allowed here");
            return false;
        }
        if self.symtab().is_assignable(from, to) {
            return true;
        }
        self.error(
            span,
            format!("incompatible types: {} cannot be converted to {}", display_type(from), display_type(to)),
        );
        false
    }

    // Constructors

    fn gen_ctor_invocation(&mut self, target: &str, arguments: &[Expr], span: Span) {
        self.code.load(true, 0);
        let arg_types = self.gen_args(arguments);
        let Some(target_symbol) = self.symtab().lookup(target) else {
            return;
        };
        let Some(arg_types) = arg_types else { return };
        let candidates: Vec<MethodSymbol> = target_symbol.constructors().cloned().collect();
        let Some(ctor) = self.resolve_method(&target_symbol, CONSTRUCTOR_METHOD_NAME, candidates, &arg_types, span) else {
            return;
        };
        self.check_member_access(ctor.flags, &ctor.owner, &ctor.signature(), span);
        for thrown in &ctor.throws {
            self.check_thrown(thrown, span);
        }
        self.emit_invoke(&ctor, target, INVOKESPECIAL);
    }

    fn gen_field_init(&mut self, field: &FieldDecl, init: &Expr) {
        let Some(field_symbol) = self.class.fields.iter().find(|f| f.name == field.name).cloned() else {
            return;
        };
        self.mark_line(field.span.start.line);
        self.code.load(true, 0);
        if let Some(ty) = self.gen_expr(init) {
            self.check_assignable(&ty, &field_symbol.ty, init.span());
        }
        let index = self.pool.add_field_ref(&internal_name(&self.class.name), &field_symbol.name, &field_symbol.ty.descriptor());
        self.code.emit_cp(PUTFIELD, index, -2);
    }

    // Expressions

    fn gen_expr(&mut self, expr: &Expr) -> Option<JType> {
        match expr {
            Expr::Literal(literal) => self.gen_literal(literal),
            Expr::Identifier(id) => self.gen_identifier(id),
            Expr::This(span) => {
                if self.is_static {
                    self.error(*span, "non-static variable this cannot be referenced from a static context");
                    return None;
                }
                self.code.load(true, 0);
                Some(JType::Class(self.class.name.clone()))
            }
            Expr::Binary(binary) => match binary.operator {
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => self.gen_arith(binary),
                _ => self.gen_boolean_value(expr),
            },
            Expr::Unary(unary) => match unary.operator {
                UnaryOp::Minus => {
                    let ty = self.gen_expr(&unary.operand)?;
                    if ty != JType::Int {
                        self.error(unary.span, format!("bad operand type {} for unary operator '-'", display_type(&ty)));
                        return None;
                    }
                    self.code.emitop(INEG, 0);
                    Some(JType::Int)
                }
                UnaryOp::Not => self.gen_boolean_value(expr),
            },
            Expr::Assignment(assignment) => {
                self.error(assignment.span, "assignments are only supported as statements");
                None
            }
            Expr::MethodCall(call) => self.gen_call(call),
            Expr::FieldAccess(access) => self.gen_field_access(access),
            Expr::Cast(cast) => self.gen_cast(cast),
            Expr::InstanceOf(test) => self.gen_instanceof(test),
            Expr::New(new) => self.gen_new(new),
            Expr::Parenthesized(inner, _) => self.gen_expr(inner),
            Expr::ArrayInitializer(_, span) => {
                self.error(*span, "illegal initializer");
                None
            }
        }
    }

    fn gen_literal(&mut self, literal: &LiteralExpr) -> Option<JType> {
        match &literal.value {
            Literal::Integer(value) => {
                let Ok(value) = i32::try_from(*value) else {
                    self.error(literal.span, "integer number too large");
                    return None;
                };
                if (-32768..=32767).contains(&value) {
                    self.code.iconst(value);
                } else {
                    let index = self.pool.add_integer(value);
                    self.code.ldc(index);
                }
                Some(JType::Int)
            }
            Literal::Boolean(value) => {
                self.code.iconst(*value as i32);
                Some(JType::Boolean)
            }
            Literal::String(text) => {
                if text.len() > MAX_UTF8_LENGTH {
                    self.error(literal.span, "constant string too long");
                    self.code.emitop(ACONST_NULL, 1);
                } else {
                    let index = self.pool.add_string(text);
                    self.code.ldc(index);
                }
                Some(JType::string())
            }
            Literal::Null => {
                self.code.emitop(ACONST_NULL, 1);
                Some(JType::Null)
            }
        }
    }

    fn gen_identifier(&mut self, id: &IdentifierExpr) -> Option<JType> {
        if let Some(local) = self.find_local(&id.name).cloned() {
            let ty = local.ty?;
            self.code.load(ty.is_reference(), local.slot);
            return Some(ty);
        }
        let current = self.class.name.clone();
        if let Some(field) = self.symtab().find_field(&current, &id.name) {
            if self.is_static && !field.is_static() {
                self.error(id.span, format!("non-static variable {} cannot be referenced from a static context", id.name));
                return None;
            }
            self.code.load(true, 0);
            let index = self.pool.add_field_ref(&internal_name(&current), &field.name, &field.ty.descriptor());
            self.code.emit_cp(GETFIELD, index, 0);
            return Some(field.ty);
        }
        let mut outer = current.rsplit_once('$').map(|(outer, _)| outer.to_string());
        while let Some(enclosing) = outer {
            if self.symtab().find_field(&enclosing, &id.name).is_some() {
                self.error(id.span, format!("non-static variable {} cannot be referenced from a static context", id.name));
                return None;
            }
            outer = enclosing.rsplit_once('$').map(|(outer, _)| outer.to_string());
        }
        self.error(
            id.span,
            format!("cannot find symbol\n  symbol:   variable {}\n  location: class {}", id.name, simple_name(&current)),
        );
        None
    }

    /// The class a qualified-name expression denotes, when it is a type name
    fn type_name_target(&self, expr: &Expr) -> Option<String> {
        let name = expr.as_qualified_name()?;
        let first = name.split('.').next()?;
        if self.find_local(first).is_some() || self.symtab().find_field(self.current(), first).is_some() {
            return None;
        }
        let binary = self.gen.env.try_resolve_class(self.symtab(), &name, Some(self.current()))?;
        if let Err(message) = check_class_access(self.symtab(), &binary, Some(self.current())) {
            self.error(expr.span(), message);
        }
        Some(binary)
    }

    fn receiver_class(&self, ty: &JType, span: Span) -> Option<String> {
        match ty {
            JType::Class(name) => Some(name.clone()),
            other => {
                self.error(span, format!("{} cannot be dereferenced", display_type(other)));
                None
            }
        }
    }

    fn gen_field_access(&mut self, access: &FieldAccessExpr) -> Option<JType> {
        if let Some(owner) = self.type_name_target(&access.target) {
            self.error(
                access.span,
                format!("cannot find symbol\n  symbol:   variable {}\n  location: class {}", access.name, simple_name(&owner)),
            );
            return None;
        }
        let target_type = self.gen_expr(&access.target)?;
        let owner = self.receiver_class(&target_type, access.target.span())?;
        let Some(field) = self.symtab().find_field(&owner, &access.name) else {
            self.error(
                access.span,
                format!("cannot find symbol\n  symbol:   variable {}\n  location: class {}", access.name, simple_name(&owner)),
            );
            return None;
        };
        self.check_member_access(field.flags, &field.owner, &field.name, access.span);
        let index = self.pool.add_field_ref(&internal_name(&owner), &field.name, &field.ty.descriptor());
        self.code.emit_cp(GETFIELD, index, 0);
        Some(field.ty)
    }

    fn gen_assignment(&mut self, assignment: &AssignmentExpr) {
        match assignment.target.as_ref() {
            Expr::Identifier(id) => {
                if let Some(local) = self.find_local(&id.name).cloned() {
                    if local.is_final {
                        self.error(id.span, format!("cannot assign a value to final variable {}", id.name));
                    }
                    if let (Some(value), Some(ty)) = (self.gen_expr(&assignment.value), &local.ty) {
                        self.check_assignable(&value, ty, assignment.value.span());
                    }
                    let reference = local.ty.as_ref().map(JType::is_reference).unwrap_or(true);
                    self.code.store(reference, local.slot);
                    return;
                }
                let current = self.class.name.clone();
                let Some(field) = self.symtab().find_field(&current, &id.name) else {
                    self.error(
                        id.span,
                        format!("cannot find symbol\n  symbol:   variable {}\n  location: class {}", id.name, simple_name(&current)),
                    );
                    return;
                };
                if self.is_static {
                    self.error(id.span, format!("non-static variable {} cannot be referenced from a static context", id.name));
                    return;
                }
                self.code.load(true, 0);
                self.gen_field_store(&current, &field, true, assignment, id.span);
            }
            Expr::FieldAccess(access) => {
                if let Some(owner) = self.type_name_target(&access.target) {
                    self.error(
                        access.span,
                        format!("cannot find symbol\n  symbol:   variable {}\n  location: class {}", access.name, simple_name(&owner)),
                    );
                    return;
                }
                let through_this = matches!(access.target.as_ref(), Expr::This(_));
                let Some(target_type) = self.gen_expr(&access.target) else { return };
                let Some(owner) = self.receiver_class(&target_type, access.target.span()) else { return };
                let Some(field) = self.symtab().find_field(&owner, &access.name) else {
                    self.error(
                        access.span,
                        format!("cannot find symbol\n  symbol:   variable {}\n  location: class {}", access.name, simple_name(&owner)),
                    );
                    return;
                };
                self.check_member_access(field.flags, &field.owner, &field.name, access.span);
                self.gen_field_store(&owner, &field, through_this, assignment, access.span);
            }
            other => self.error(other.span(), "unexpected type\n  required: variable\n  found:    value"),
        }
    }

    fn gen_field_store(
        &mut self,
        owner: &str,
        field: &FieldSymbol,
        through_this: bool,
        assignment: &AssignmentExpr,
        span: Span,
    ) {
        let initializing = self.in_ctor && through_this && field.owner == self.class.name;
        if field.is_final() && !initializing {
            self.error(span, format!("cannot assign a value to final variable {}", field.name));
        }
        if let Some(value) = self.gen_expr(&assignment.value) {
            self.check_assignable(&value, &field.ty, assignment.value.span());
        }
        let index = self.pool.add_field_ref(&internal_name(owner), &field.name, &field.ty.descriptor());
        self.code.emit_cp(PUTFIELD, index, -2);
    }

    /// Access to a member of `owner` from the current class
    fn check_member_access(&self, flags: u16, owner: &str, member: &str, span: Span) -> bool {
        let current = self.current();
        let allowed = if flags & ACC_PUBLIC != 0 {
            true
        } else if flags & ACC_PRIVATE != 0 {
            outermost(owner) == outermost(current)
        } else if flags & ACC_PROTECTED != 0 {
            package_of(owner) == package_of(current) || self.symtab().is_subclass(current, owner)
        } else {
            package_of(owner) == package_of(current)
        };
        if allowed {
            return true;
        }
        let message = if flags & ACC_PRIVATE != 0 {
            format!("{} has private access in {}", member, simple_name(owner))
        } else if flags & ACC_PROTECTED != 0 {
            format!("{} has protected access in {}", member, simple_name(owner))
        } else {
            format!("{} is not public in {}; cannot be accessed from outside package", member, simple_name(owner))
        };
        self.error(span, message);
        false
    }

    fn gen_arith(&mut self, binary: &BinaryExpr) -> Option<JType> {
        let left = self.gen_expr(&binary.left);
        if binary.operator == BinaryOp::Add && left.as_ref().map(JType::is_string).unwrap_or(false) {
            self.emit_value_of(&JType::string());
            let right = self.gen_expr(&binary.right)?;
            if right.is_void() {
                self.error(binary.right.span(), "'void' type not allowed here");
                return None;
            }
            self.emit_value_of(&right);
            self.emit_concat();
            return Some(JType::string());
        }
        let right = self.gen_expr(&binary.right);
        let (left, right) = (left?, right?);
        if left.is_void() || right.is_void() {
            let span = if left.is_void() { binary.left.span() } else { binary.right.span() };
            self.error(span, "'void' type not allowed here");
            return None;
        }
        if binary.operator == BinaryOp::Add && right.is_string() {
            self.emit_value_of(&right);
            self.code.emitop(SWAP, 0);
            self.emit_value_of(&left);
            self.code.emitop(SWAP, 0);
            self.emit_concat();
            return Some(JType::string());
        }
        if left != JType::Int || right != JType::Int {
            self.error(
                binary.span,
                format!(
                    "bad operand types for binary operator '{}'\n  first type:  {}\n  second type: {}",
                    binary.operator,
                    display_type(&left),
                    display_type(&right)
                ),
            );
            return None;
        }
        let opcode = match binary.operator {
            BinaryOp::Add => IADD,
            BinaryOp::Sub => ISUB,
            BinaryOp::Mul => IMUL,
            BinaryOp::Div => IDIV,
            _ => IREM,
        };
        self.code.emitop(opcode, -1);
        Some(JType::Int)
    }

    /// `String.valueOf` for the value on top of the stack
    fn emit_value_of(&mut self, ty: &JType) {
        let descriptor = match ty {
            JType::Int => "(I)Ljava/lang/String;",
            JType::Boolean => "(Z)Ljava/lang/String;",
            _ => "(Ljava/lang/Object;)Ljava/lang/String;",
        };
        let index = self.pool.add_method_ref(&internal_name(STRING), "valueOf", descriptor);
        self.code.emit_cp(INVOKESTATIC, index, 0);
    }

    fn emit_concat(&mut self) {
        let index = self.pool.add_method_ref(&internal_name(STRING), "concat", "(Ljava/lang/String;)Ljava/lang/String;");
        self.code.emit_cp(INVOKEVIRTUAL, index, -1);
    }

    /// Materialize a condition as 0 or 1
    fn gen_boolean_value(&mut self, expr: &Expr) -> Option<JType> {
        let false_label = self.code.new_label();
        let end = self.code.new_label();
        let errors_before = self.gen.log.error_count();
        self.gen_cond(expr, false, false_label);
        self.code.iconst(1);
        self.code.branch(GOTO, end, 0);
        self.code.place(false_label);
        self.code.iconst(0);
        self.code.place(end);
        (self.gen.log.error_count() == errors_before || self.quiet).then_some(JType::Boolean)
    }

    /// Jump to `target` when `expr` evaluates to `jump_if`, else fall through
    fn gen_cond(&mut self, expr: &Expr, jump_if: bool, target: Label) {
        match expr {
            Expr::Parenthesized(inner, _) => self.gen_cond(inner, jump_if, target),
            Expr::Unary(unary) if unary.operator == UnaryOp::Not => self.gen_cond(&unary.operand, !jump_if, target),
            Expr::Binary(binary) => match binary.operator {
                BinaryOp::And | BinaryOp::Or => {
                    // `a && b` jumps on false when either does; `a || b` on true
                    let short_circuit_on = binary.operator == BinaryOp::Or;
                    if jump_if == short_circuit_on {
                        self.gen_cond(&binary.left, jump_if, target);
                        self.gen_cond(&binary.right, jump_if, target);
                    } else {
                        let skip = self.code.new_label();
                        self.gen_cond(&binary.left, !jump_if, skip);
                        self.gen_cond(&binary.right, jump_if, target);
                        self.code.place(skip);
                    }
                }
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => self.gen_relational(binary, jump_if, target),
                BinaryOp::Eq | BinaryOp::Ne => self.gen_equality(binary, jump_if, target),
                _ => self.gen_test(expr, jump_if, target),
            },
            _ => self.gen_test(expr, jump_if, target),
        }
    }

    fn gen_test(&mut self, expr: &Expr, jump_if: bool, target: Label) {
        if let Some(ty) = self.gen_expr(expr) {
            if ty != JType::Boolean {
                self.error(
                    expr.span(),
                    format!("incompatible types: {} cannot be converted to boolean", display_type(&ty)),
                );
            }
        }
        self.code.branch(if jump_if { IFNE } else { IFEQ }, target, -1);
    }

    fn gen_relational(&mut self, binary: &BinaryExpr, jump_if: bool, target: Label) {
        let left = self.gen_expr(&binary.left);
        let right = self.gen_expr(&binary.right);
        if let (Some(left), Some(right)) = (&left, &right) {
            if *left != JType::Int || *right != JType::Int {
                self.bad_operands(binary, left, right);
            }
        }
        let (when_true, when_false) = match binary.operator {
            BinaryOp::Lt => (IF_ICMPLT, IF_ICMPGE),
            BinaryOp::Le => (IF_ICMPLE, IF_ICMPGT),
            BinaryOp::Gt => (IF_ICMPGT, IF_ICMPLE),
            _ => (IF_ICMPGE, IF_ICMPLT),
        };
        self.code.branch(if jump_if { when_true } else { when_false }, target, -2);
    }

    fn gen_equality(&mut self, binary: &BinaryExpr, jump_if: bool, target: Label) {
        let left = self.gen_expr(&binary.left);
        let right = self.gen_expr(&binary.right);
        let mut reference = true;
        if let (Some(left), Some(right)) = (&left, &right) {
            let primitive_pair = left.is_primitive() && left == right;
            let reference_pair = left.is_reference() && right.is_reference();
            if primitive_pair {
                reference = false;
            } else if reference_pair {
                let comparable = *left == JType::Null
                    || *right == JType::Null
                    || self.symtab().is_castable(left, right)
                    || self.symtab().is_castable(right, left);
                if !comparable {
                    self.error(
                        binary.span,
                        format!("incomparable types: {} and {}", display_type(left), display_type(right)),
                    );
                }
            } else {
                self.bad_operands(binary, left, right);
            }
        }
        let equal = (binary.operator == BinaryOp::Eq) == jump_if;
        let opcode = match (reference, equal) {
            (true, true) => IF_ACMPEQ,
            (true, false) => IF_ACMPNE,
            (false, true) => IF_ICMPEQ,
            (false, false) => IF_ICMPNE,
        };
        self.code.branch(opcode, target, -2);
    }

    fn bad_operands(&self, binary: &BinaryExpr, left: &JType, right: &JType) {
        self.error(
            binary.span,
            format!(
                "bad operand types for binary operator '{}'\n  first type:  {}\n  second type: {}",
                binary.operator,
                display_type(left),
                display_type(right)
            ),
        );
    }

    fn gen_cast(&mut self, cast: &CastExpr) -> Option<JType> {
        let target = self.resolve_type(&cast.target_type);
        let source = self.gen_expr(&cast.expr)?;
        let target = target?;
        if source == target || self.symtab().is_assignable(&source, &target) && target.is_reference() {
            return Some(target);
        }
        if source.is_reference() && target.is_reference() && self.symtab().is_castable(&source, &target) {
            if let Some(name) = target.class_name() {
                let index = self.pool.add_class(&internal_name(name));
                self.code.emit_cp(CHECKCAST, index, 0);
            }
            return Some(target);
        }
        self.error(
            cast.span,
            format!("incompatible types: {} cannot be converted to {}", display_type(&source), display_type(&target)),
        );
        None
    }

    fn gen_instanceof(&mut self, test: &InstanceOfExpr) -> Option<JType> {
        let source = self.gen_expr(&test.expr)?;
        let target = self.resolve_type(&test.target_type)?;
        if !source.is_reference() {
            self.error(
                test.expr.span(),
                format!("unexpected type\n  required: reference\n  found:    {}", display_type(&source)),
            );
            return None;
        }
        if !self.symtab().is_castable(&source, &target) {
            self.error(
                test.span,
                format!("incompatible types: {} cannot be converted to {}", display_type(&source), display_type(&target)),
            );
            return None;
        }
        let Some(name) = target.class_name() else {
            self.error(
                test.target_type.span,
                format!("unexpected type\n  required: reference\n  found:    {}", display_type(&target)),
            );
            return None;
        };
        let index = self.pool.add_class(&internal_name(name));
        self.code.emit_cp(INSTANCEOF, index, 0);
        Some(JType::Boolean)
    }

    fn gen_new(&mut self, new: &NewExpr) -> Option<JType> {
        let ty = self.resolve_type(&new.target_type)?;
        let Some(name) = ty.class_name().map(str::to_string) else {
            self.error(new.target_type.span, format!("unexpected type\n  required: class\n  found:    {}", display_type(&ty)));
            return None;
        };
        let symbol = self.symtab().lookup(&name)?;
        if symbol.is_abstract() {
            self.error(new.span, format!("{} is abstract; cannot be instantiated", simple_name(&name)));
            return None;
        }
        let index = self.pool.add_class(&internal_name(&name));
        self.code.emit_cp(NEW, index, 1);
        self.code.emitop(DUP, 1);
        let arg_types = self.gen_args(&new.arguments)?;
        let candidates: Vec<MethodSymbol> = symbol.constructors().cloned().collect();
        let ctor = self.resolve_method(&symbol, CONSTRUCTOR_METHOD_NAME, candidates, &arg_types, new.span)?;
        self.check_member_access(ctor.flags, &ctor.owner, &ctor.signature(), new.span);
        for thrown in &ctor.throws {
            self.check_thrown(thrown, new.span);
        }
        self.emit_invoke(&ctor, &name, INVOKESPECIAL);
        Some(ty)
    }

    /// Generate arguments left to right; `None` if any failed to attribute
    fn gen_args(&mut self, arguments: &[Expr]) -> Option<Vec<JType>> {
        let mut types = Vec::with_capacity(arguments.len());
        let mut ok = true;
        for arg in arguments {
            match self.gen_expr(arg) {
                Some(ty) if ty.is_void() => {
                    self.error(arg.span(), "'void' type not allowed here");
                    ok = false;
                }
                Some(ty) => types.push(ty),
                None => ok = false,
            }
        }
        ok.then_some(types)
    }

    /// Argument types without emitting code or reporting errors
    fn infer_arg_types(&mut self, arguments: &[Expr]) -> Option<Vec<JType>> {
        let mut scratch = ConstantPool::new();
        let mut quiet_gen = MethodGen {
            gen: self.gen,
            pool: &mut scratch,
            class: self.class.clone(),
            code: Code::new(self.code.locals.mark()),
            scopes: self.scopes.clone(),
            locals_floor: self.locals_floor,
            is_static: self.is_static,
            in_ctor: self.in_ctor,
            return_type: self.return_type.clone(),
            throws: self.throws.clone(),
            context: self.context.clone(),
            quiet: true,
        };
        quiet_gen.gen_args(arguments)
    }

    fn gen_call(&mut self, call: &MethodCallExpr) -> Option<JType> {
        let site = if call.is_super {
            if self.is_static {
                self.error(call.span, "non-static variable super cannot be referenced from a static context");
                return None;
            }
            self.code.load(true, 0);
            CallSite::Super(self.class.super_name.clone().unwrap_or_else(|| OBJECT.to_string()))
        } else if let Some(target) = &call.target {
            match self.type_name_target(target) {
                Some(owner) => CallSite::Static(owner),
                None => {
                    let ty = self.gen_expr(target)?;
                    CallSite::Instance(self.receiver_class(&ty, target.span())?)
                }
            }
        } else {
            return self.gen_implicit_call(call);
        };

        let (owner, receiver) = match &site {
            CallSite::Static(owner) => (owner.clone(), false),
            CallSite::Instance(owner) | CallSite::Super(owner) => (owner.clone(), true),
        };
        let symbol = self.symtab().lookup(&owner)?;
        let arg_types = self.gen_args(&call.arguments)?;
        let candidates = self.member_methods(&owner, &call.name);
        let method = self.resolve_method(&symbol, &call.name, candidates, &arg_types, call.span)?;
        if !receiver && !method.is_static() {
            self.error(
                call.span,
                format!("non-static method {} cannot be referenced from a static context", method.signature()),
            );
            return None;
        }
        if receiver && method.is_static() {
            self.error(call.span, format!("static method {} must be called through its class", method.signature()));
            return None;
        }
        if matches!(site, CallSite::Super(_)) && method.is_abstract() {
            self.error(call.span, format!("abstract method {} in {} cannot be accessed directly", method.signature(), simple_name(&method.owner)));
            return None;
        }
        self.finish_call(&method, &owner, matches!(site, CallSite::Super(_)), call.span)
    }

    /// `m(args)`: the innermost enclosing class with a member named `m` is the site
    fn gen_implicit_call(&mut self, call: &MethodCallExpr) -> Option<JType> {
        let mut scope = Some(self.class.name.clone());
        let mut found = None;
        while let Some(class) = scope {
            let candidates = self.member_methods(&class, &call.name);
            if !candidates.is_empty() {
                found = Some((class, candidates));
                break;
            }
            scope = class.rsplit_once('$').map(|(outer, _)| outer.to_string());
        }
        let Some((site, candidates)) = found else {
            let arg_types = self.gen_args(&call.arguments);
            let args = arg_types.map(|types| type_list(&types)).unwrap_or_default();
            self.error(
                call.span,
                format!(
                    "cannot find symbol\n  symbol:   method {}({})\n  location: class {}",
                    call.name,
                    args,
                    simple_name(self.current())
                ),
            );
            return None;
        };

        let same_arity: Vec<&MethodSymbol> = candidates.iter().filter(|m| m.params().len() == call.arguments.len()).collect();
        let needs_receiver = if same_arity.iter().all(|m| m.is_static()) {
            false
        } else if same_arity.iter().all(|m| !m.is_static()) {
            true
        } else {
            // Undecidable argument types fall through to the real pass, which reports
            let types = self.infer_arg_types(&call.arguments);
            let symbol = self.symtab().lookup(&site);
            let quiet = std::mem::replace(&mut self.quiet, true);
            let chosen = match (types, symbol) {
                (Some(types), Some(symbol)) => self.resolve_method(&symbol, &call.name, candidates.clone(), &types, call.span),
                _ => None,
            };
            self.quiet = quiet;
            chosen.map(|m| !m.is_static()).unwrap_or(false)
        };
        let from_static_context = self.is_static || site != self.class.name;
        if needs_receiver && !from_static_context {
            self.code.load(true, 0);
        }
        let symbol = self.symtab().lookup(&site)?;
        let arg_types = self.gen_args(&call.arguments)?;
        let method = self.resolve_method(&symbol, &call.name, candidates, &arg_types, call.span)?;
        if !method.is_static() && from_static_context {
            self.error(
                call.span,
                format!("non-static method {} cannot be referenced from a static context", method.signature()),
            );
            return None;
        }
        self.finish_call(&method, &site, false, call.span)
    }

    fn finish_call(&mut self, method: &MethodSymbol, site: &str, is_super: bool, span: Span) -> Option<JType> {
        self.check_member_access(method.flags, &method.owner, &method.signature(), span);
        for thrown in &method.throws {
            self.check_thrown(thrown, span);
        }
        let opcode = if method.is_static() {
            INVOKESTATIC
        } else if is_super || method.is_private() {
            INVOKESPECIAL
        } else {
            INVOKEVIRTUAL
        };
        let ref_class = if method.is_private() || method.is_static() { method.owner.as_str() } else { site };
        self.emit_invoke(method, ref_class, opcode);
        Some(method.return_type().clone())
    }

    /// Methods named `name` visible as members of `class`; static interface
    /// methods are only members of their own interface
    fn member_methods(&self, class: &str, name: &str) -> Vec<MethodSymbol> {
        let mut methods = self.symtab().find_methods(class, name);
        methods.retain(|m| !(m.is_static() && m.owner_is_interface && m.owner != class));
        methods
    }

    /// Overload resolution: applicable by subtyping, then most specific
    fn resolve_method(
        &self,
        site: &ClassSymbol,
        name: &str,
        candidates: Vec<MethodSymbol>,
        arg_types: &[JType],
        span: Span,
    ) -> Option<MethodSymbol> {
        let is_ctor = name == CONSTRUCTOR_METHOD_NAME;
        let kind = if site.is_interface() { "interface" } else { "class" };
        let shown_name = if is_ctor { site.simple_name() } else { name };
        let applicable: Vec<&MethodSymbol> = candidates
            .iter()
            .filter(|m| {
                m.params().len() == arg_types.len()
                    && m.params().iter().zip(arg_types).all(|(param, arg)| self.symtab().is_assignable(arg, param))
            })
            .collect();

        if applicable.is_empty() {
            let found = if arg_types.is_empty() { "no arguments".to_string() } else { type_list(arg_types) };
            let message = match candidates.as_slice() {
                [] => format!(
                    "cannot find symbol\n  symbol:   method {}({})\n  location: {} {}",
                    name,
                    type_list(arg_types),
                    kind,
                    site.simple_name()
                ),
                [only] => {
                    let required = if only.params().is_empty() { "no arguments".to_string() } else { type_list(only.params()) };
                    let reason = if only.params().len() != arg_types.len() {
                        "actual and formal argument lists differ in length".to_string()
                    } else {
                        let (arg, param) = arg_types
                            .iter()
                            .zip(only.params())
                            .find(|(arg, param)| !self.symtab().is_assignable(arg, param))
                            .map(|(arg, param)| (display_type(arg), display_type(param)))
                            .unwrap_or_default();
                        format!("argument mismatch; {} cannot be converted to {}", arg, param)
                    };
                    format!(
                        "{} {} in {} {} cannot be applied to given types;\n  required: {}\n  found:    {}\n  reason: {}",
                        if is_ctor { "constructor" } else { "method" },
                        shown_name,
                        kind,
                        site.simple_name(),
                        required,
                        found,
                        reason
                    )
                }
                _ => format!(
                    "no suitable {} found for {}({})",
                    if is_ctor { "constructor" } else { "method" },
                    shown_name,
                    type_list(arg_types)
                ),
            };
            self.error(span, message);
            return None;
        }

        let more_specific = |a: &MethodSymbol, b: &MethodSymbol| {
            a.params().iter().zip(b.params()).all(|(pa, pb)| self.symtab().is_assignable(pa, pb))
        };
        let best: Vec<&MethodSymbol> = applicable
            .iter()
            .copied()
            .filter(|candidate| applicable.iter().all(|other| more_specific(candidate, other)))
            .collect();
        match best.as_slice() {
            [chosen, ..] if best.iter().all(|m| m.same_signature(chosen)) => Some((*chosen).clone()),
            _ => {
                let (first, second) = (applicable[0], applicable[1]);
                self.error(
                    span,
                    format!(
                        "reference to {} is ambiguous\n  both method {} in {} and method {} in {} match",
                        shown_name,
                        first.signature(),
                        simple_name(&first.owner),
                        second.signature(),
                        simple_name(&second.owner)
                    ),
                );
                None
            }
        }
    }

    fn emit_invoke(&mut self, method: &MethodSymbol, ref_class: &str, opcode: u8) {
        let descriptor: &MethodDescriptor = &method.descriptor;
        let arg_slots = descriptor.param_slots() as i32;
        let ret_slots = descriptor.ret.slot_size() as i32;
        let site_is_interface = self.symtab().lookup(ref_class).map(|s| s.is_interface()).unwrap_or(false);
        let (ref_class, site_is_interface) = if site_is_interface && method.owner == OBJECT && !method.is_static() {
            (OBJECT, false)
        } else {
            (ref_class, site_is_interface)
        };
        let internal = internal_name(ref_class);
        let raw = descriptor.to_string();
        let index = if site_is_interface {
            self.pool.add_interface_method_ref(&internal, &method.name, &raw)
        } else {
            self.pool.add_method_ref(&internal, &method.name, &raw)
        };
        match opcode {
            INVOKESTATIC => self.code.emit_cp(INVOKESTATIC, index, ret_slots - arg_slots),
            _ if site_is_interface && opcode == INVOKEVIRTUAL => {
                self.code.invokeinterface(index, arg_slots as u8, ret_slots - arg_slots - 1)
            }
            _ => self.code.emit_cp(opcode, index, ret_slots - arg_slots - 1),
        }
    }
}

/// `while (true)` and `while (false)` are the only folded conditions
fn constant_condition(expr: &Expr) -> Option<bool> {
    match expr {
        Expr::Literal(LiteralExpr { value: Literal::Boolean(value), .. }) => Some(*value),
        Expr::Parenthesized(inner, _) => constant_condition(inner),
        _ => None,
    }
}
