//! Recursive descent parser for the supported Java subset
//!
//! The parser stops at the first syntax error. Constructs outside the subset
//! are recognized far enough to report a precise "not supported" error
//! instead of a confusing cascade.

use super::error::{ParseError, ParseResult};
use super::lexer::{Lexer, LexicalToken, Token};
use crate::ast::*;
use crate::consts::PARSER_MAX_DEPTH;

pub struct Parser {
    tokens: Vec<LexicalToken>,
    current: usize,
    depth: usize,
}

impl Parser {
    pub fn new(source: &str) -> ParseResult<Self> {
        let tokens = Lexer::new(source).tokenize()?;
        Ok(Self { tokens, current: 0, depth: 0 })
    }

    /// Parse a whole compilation unit
    pub fn parse(mut self) -> ParseResult<CompilationUnit> {
        let start = self.current_location();

        let mut leading_annotations = Vec::new();
        while self.check(Token::At) && !self.check_at(1, Token::Interface) {
            leading_annotations.push(self.parse_annotation()?);
        }

        let package_decl = if self.check(Token::Package) {
            let pkg_start = self.current_location();
            self.advance();
            let name = self.parse_qualified_name()?;
            self.consume(Token::Semicolon, "';'")?;
            Some(PackageDecl { name, span: Span::new(pkg_start, self.previous_end()) })
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.check(Token::Import) {
            imports.push(self.parse_import_decl()?);
        }

        let mut type_decls = Vec::new();
        let mut pending_annotations = if package_decl.is_none() { leading_annotations } else { Vec::new() };
        while !self.is_at_end() {
            if self.match_token(Token::Semicolon) {
                continue;
            }
            if self.check(Token::Import) {
                return Err(self.error_here("class, interface, enum, or record expected"));
            }
            let (modifiers, mut annotations) = self.parse_modifiers()?;
            annotations.splice(0..0, pending_annotations.drain(..));
            type_decls.push(self.parse_type_decl(modifiers, annotations)?);
        }

        Ok(CompilationUnit { package_decl, imports, type_decls, span: Span::new(start, self.previous_end()) })
    }

    // Helper methods

    fn is_at_end(&self) -> bool {
        self.current >= self.tokens.len()
    }

    fn peek(&self) -> Option<&LexicalToken> {
        self.tokens.get(self.current)
    }

    fn peek_token(&self) -> Option<Token> {
        self.peek().map(|t| t.token)
    }

    fn check(&self, token: Token) -> bool {
        self.peek_token() == Some(token)
    }

    fn check_at(&self, offset: usize, token: Token) -> bool {
        self.tokens.get(self.current + offset).map(|t| t.token) == Some(token)
    }

    fn advance(&mut self) -> Option<&LexicalToken> {
        if self.is_at_end() {
            return None;
        }
        self.current += 1;
        self.tokens.get(self.current - 1)
    }

    fn match_token(&mut self, token: Token) -> bool {
        if self.check(token) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn current_location(&self) -> Location {
        match self.peek() {
            Some(token) => token.location,
            None => self.previous_end(),
        }
    }

    fn previous_end(&self) -> Location {
        match self.current.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(token) => token.end,
            None => Location::start(),
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError::invalid_syntax(message, self.current_location())
    }

    /// Consume `token` or report `<what> expected` just after the previous token
    fn consume(&mut self, token: Token, what: &str) -> ParseResult<LexicalToken> {
        if self.check(token) {
            self.current += 1;
            return Ok(self.tokens[self.current - 1].clone());
        }
        match self.peek() {
            Some(found) => Err(ParseError::unexpected_token(what, &found.lexeme, self.previous_end())),
            None => Err(ParseError::unexpected_end_of_input(what, self.previous_end())),
        }
    }

    fn consume_identifier(&mut self) -> ParseResult<LexicalToken> {
        self.consume(Token::Identifier, "<identifier>")
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > PARSER_MAX_DEPTH {
            return Err(self.error_here("expression nesting is too deep"));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // Declarations

    fn parse_qualified_name(&mut self) -> ParseResult<String> {
        let mut name = self.consume_identifier()?.lexeme;
        while self.check(Token::Dot) && self.check_at(1, Token::Identifier) {
            self.advance();
            name.push('.');
            name.push_str(&self.consume_identifier()?.lexeme);
        }
        Ok(name)
    }

    fn parse_import_decl(&mut self) -> ParseResult<ImportDecl> {
        let start = self.current_location();
        self.consume(Token::Import, "import")?;
        if self.check(Token::Static) {
            return Err(self.error_here("static imports are not supported"));
        }
        let name = self.parse_qualified_name()?;
        let is_wildcard = if self.match_token(Token::Dot) {
            self.consume(Token::Star, "'*'")?;
            true
        } else {
            false
        };
        self.consume(Token::Semicolon, "';'")?;
        Ok(ImportDecl { name, is_wildcard, span: Span::new(start, self.previous_end()) })
    }

    fn parse_annotation(&mut self) -> ParseResult<Annotation> {
        let start = self.current_location();
        self.consume(Token::At, "'@'")?;
        let name = self.parse_qualified_name()?;
        let mut arguments = Vec::new();
        if self.match_token(Token::LParen) {
            if !self.check(Token::RParen) {
                loop {
                    if self.check(Token::Identifier) && self.check_at(1, Token::Assign) {
                        let element = self.consume_identifier()?.lexeme;
                        self.advance();
                        arguments.push(AnnotationArg::Named(element, self.parse_element_value()?));
                    } else {
                        arguments.push(AnnotationArg::Value(self.parse_element_value()?));
                    }
                    if !self.match_token(Token::Comma) {
                        break;
                    }
                }
            }
            self.consume(Token::RParen, "')'")?;
        }
        Ok(Annotation { name, arguments, span: Span::new(start, self.previous_end()) })
    }

    fn parse_element_value(&mut self) -> ParseResult<Expr> {
        if self.check(Token::LBrace) {
            let start = self.current_location();
            self.advance();
            let mut items = Vec::new();
            while !self.check(Token::RBrace) {
                items.push(self.parse_element_value()?);
                if !self.match_token(Token::Comma) {
                    break;
                }
            }
            self.consume(Token::RBrace, "'}'")?;
            return Ok(Expr::ArrayInitializer(items, Span::new(start, self.previous_end())));
        }
        self.parse_conditional_or()
    }

    fn parse_modifiers(&mut self) -> ParseResult<(Vec<Modifier>, Vec<Annotation>)> {
        let mut modifiers = Vec::new();
        let mut annotations = Vec::new();
        loop {
            let modifier = match self.peek_token() {
                Some(Token::At) if self.check_at(1, Token::Interface) => {
                    return Err(self.error_here("annotation type declarations are not supported"));
                }
                Some(Token::At) => {
                    annotations.push(self.parse_annotation()?);
                    continue;
                }
                Some(Token::Public) => Modifier::Public,
                Some(Token::Protected) => Modifier::Protected,
                Some(Token::Private) => Modifier::Private,
                Some(Token::Abstract) => Modifier::Abstract,
                Some(Token::Static) => Modifier::Static,
                Some(Token::Final) => Modifier::Final,
                Some(Token::Native) => Modifier::Native,
                Some(Token::Synchronized) => Modifier::Synchronized,
                Some(Token::Transient) => Modifier::Transient,
                Some(Token::Volatile) => Modifier::Volatile,
                Some(Token::Strictfp) => Modifier::Strictfp,
                Some(Token::Default) => Modifier::Default,
                _ => break,
            };
            if modifiers.contains(&modifier) {
                return Err(self.error_here("repeated modifier"));
            }
            modifiers.push(modifier);
            self.advance();
        }
        Ok((modifiers, annotations))
    }

    fn parse_type_decl(&mut self, modifiers: Vec<Modifier>, annotations: Vec<Annotation>) -> ParseResult<ClassDecl> {
        let start = self.current_location();
        let kind = match self.peek_token() {
            Some(Token::Class) => TypeKind::Class,
            Some(Token::Interface) => TypeKind::Interface,
            Some(Token::Enum) => return Err(self.error_here("enum declarations are not supported")),
            _ => return Err(self.error_here("class, interface, enum, or record expected")),
        };
        self.advance();
        let name_token = self.consume_identifier()?;
        let name_span = Span::new(name_token.location, name_token.end);
        if self.check(Token::Lt) {
            return Err(self.error_here("generic type declarations are not supported"));
        }

        let mut extends = None;
        let mut interfaces = Vec::new();
        match kind {
            TypeKind::Class => {
                if self.match_token(Token::Extends) {
                    extends = Some(self.parse_type()?);
                }
                if self.match_token(Token::Implements) {
                    interfaces = self.parse_type_list()?;
                }
            }
            TypeKind::Interface => {
                if self.match_token(Token::Extends) {
                    interfaces = self.parse_type_list()?;
                }
                if self.check(Token::Implements) {
                    return Err(self.error_here("'{' expected"));
                }
            }
        }

        let body = self.parse_class_body(&name_token.lexeme)?;
        Ok(ClassDecl {
            kind,
            modifiers,
            annotations,
            name: name_token.lexeme,
            extends,
            interfaces,
            body,
            name_span,
            span: Span::new(start, self.previous_end()),
        })
    }

    fn parse_type_list(&mut self) -> ParseResult<Vec<TypeRef>> {
        let mut types = vec![self.parse_type()?];
        while self.match_token(Token::Comma) {
            types.push(self.parse_type()?);
        }
        Ok(types)
    }

    fn parse_class_body(&mut self, class_name: &str) -> ParseResult<Vec<ClassMember>> {
        self.consume(Token::LBrace, "'{'")?;
        let mut members = Vec::new();
        while !self.check(Token::RBrace) {
            if self.is_at_end() {
                return Err(ParseError::unexpected_end_of_input("'}'", self.previous_end()));
            }
            if self.match_token(Token::Semicolon) {
                continue;
            }
            self.parse_member(class_name, &mut members)?;
        }
        self.consume(Token::RBrace, "'}'")?;
        Ok(members)
    }

    fn parse_member(&mut self, class_name: &str, members: &mut Vec<ClassMember>) -> ParseResult<()> {
        let start = self.current_location();
        if self.check(Token::LBrace) || (self.check(Token::Static) && self.check_at(1, Token::LBrace)) {
            return Err(self.error_here("initializer blocks are not supported"));
        }
        let (modifiers, annotations) = self.parse_modifiers()?;

        if matches!(self.peek_token(), Some(Token::Class | Token::Interface | Token::Enum)) {
            members.push(ClassMember::TypeDecl(self.parse_type_decl(modifiers, annotations)?));
            return Ok(());
        }
        if self.check(Token::Lt) {
            return Err(self.error_here("generic methods are not supported"));
        }

        // Constructor: Identifier '('
        if self.check(Token::Identifier) && self.check_at(1, Token::LParen) {
            let name_token = self.consume_identifier()?;
            if name_token.lexeme != class_name {
                return Err(ParseError::invalid_syntax(
                    "invalid method declaration; return type required",
                    name_token.location,
                ));
            }
            let parameters = self.parse_parameters()?;
            let throws = self.parse_throws()?;
            let (explicit_invocation, body) = self.parse_constructor_body()?;
            members.push(ClassMember::Constructor(ConstructorDecl {
                modifiers,
                annotations,
                name: name_token.lexeme,
                parameters,
                throws,
                explicit_invocation,
                body,
                span: Span::new(start, self.previous_end()),
            }));
            return Ok(());
        }

        let type_ref = self.parse_type()?;
        let name_token = self.consume_identifier()?;
        let name_span = Span::new(name_token.location, name_token.end);

        if self.check(Token::LParen) {
            let parameters = self.parse_parameters()?;
            if self.check(Token::LBracket) {
                return Err(self.error_here("array dimensions after the parameter list are not supported"));
            }
            let throws = self.parse_throws()?;
            let body = if self.match_token(Token::Semicolon) { None } else { Some(self.parse_block()?) };
            members.push(ClassMember::Method(MethodDecl {
                modifiers,
                annotations,
                return_type: type_ref,
                name: name_token.lexeme,
                parameters,
                throws,
                body,
                name_span,
                span: Span::new(start, self.previous_end()),
            }));
            return Ok(());
        }

        if type_ref.is_void() {
            return Err(ParseError::unexpected_token("'('", &self.peek_lexeme(), self.previous_end()));
        }

        // One or more field declarators
        let mut name = name_token.lexeme;
        loop {
            let initializer = if self.match_token(Token::Assign) { Some(self.parse_expression()?) } else { None };
            members.push(ClassMember::Field(FieldDecl {
                modifiers: modifiers.clone(),
                annotations: annotations.clone(),
                type_ref: type_ref.clone(),
                name,
                initializer,
                span: Span::new(start, self.previous_end()),
            }));
            if !self.match_token(Token::Comma) {
                break;
            }
            name = self.consume_identifier()?.lexeme;
        }
        self.consume(Token::Semicolon, "';'")?;
        Ok(())
    }

    fn peek_lexeme(&self) -> String {
        self.peek().map(|t| t.lexeme.clone()).unwrap_or_default()
    }

    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        self.consume(Token::LParen, "'('")?;
        let mut parameters = Vec::new();
        if !self.check(Token::RParen) {
            loop {
                let start = self.current_location();
                let (modifiers, _annotations) = self.parse_modifiers()?;
                if modifiers.iter().any(|m| *m != Modifier::Final) {
                    return Err(ParseError::invalid_syntax("modifier not allowed here", start));
                }
                let type_ref = self.parse_type()?;
                if self.check(Token::Ellipsis) {
                    return Err(self.error_here("variable-arity parameters are not supported"));
                }
                let name = self.consume_identifier()?.lexeme;
                parameters.push(Parameter { modifiers, type_ref, name, span: Span::new(start, self.previous_end()) });
                if !self.match_token(Token::Comma) {
                    break;
                }
            }
        }
        self.consume(Token::RParen, "')'")?;
        Ok(parameters)
    }

    fn parse_throws(&mut self) -> ParseResult<Vec<TypeRef>> {
        if self.match_token(Token::Throws) {
            self.parse_type_list()
        } else {
            Ok(Vec::new())
        }
    }

    fn parse_constructor_body(&mut self) -> ParseResult<(Option<ExplicitCtorInvocation>, Block)> {
        let start = self.current_location();
        self.consume(Token::LBrace, "'{'")?;
        let mut explicit = None;
        if matches!(self.peek_token(), Some(Token::This | Token::Super)) && self.check_at(1, Token::LParen) {
            let call_start = self.current_location();
            let kind = if self.check(Token::This) { CtorInvocationKind::This } else { CtorInvocationKind::Super };
            self.advance();
            let arguments = self.parse_arguments()?;
            self.consume(Token::Semicolon, "';'")?;
            explicit = Some(ExplicitCtorInvocation { kind, arguments, span: Span::new(call_start, self.previous_end()) });
        }
        let statements = self.parse_block_statements()?;
        Ok((explicit, Block { statements, span: Span::new(start, self.previous_end()) }))
    }

    /// Parse a type: primitive or (qualified) class name, with optional `[]` suffixes
    fn parse_type(&mut self) -> ParseResult<TypeRef> {
        let start = self.current_location();
        let name = match self.peek_token() {
            Some(t) if t.is_primitive_type() => {
                let lexeme = self.peek_lexeme();
                self.advance();
                lexeme
            }
            Some(Token::Identifier) => self.parse_qualified_name()?,
            Some(_) => return Err(ParseError::unexpected_token("<identifier>", &self.peek_lexeme(), start)),
            None => return Err(ParseError::unexpected_end_of_input("<identifier>", self.previous_end())),
        };
        if self.check(Token::Lt) {
            return Err(self.error_here("generic types are not supported"));
        }
        let mut array_dims = 0;
        while self.check(Token::LBracket) && self.check_at(1, Token::RBracket) {
            self.advance();
            self.advance();
            array_dims += 1;
        }
        Ok(TypeRef { name, array_dims, span: Span::new(start, self.previous_end()) })
    }

    // Statements

    fn parse_block(&mut self) -> ParseResult<Block> {
        let start = self.current_location();
        self.consume(Token::LBrace, "'{'")?;
        let statements = self.parse_block_statements()?;
        Ok(Block { statements, span: Span::new(start, self.previous_end()) })
    }

    /// Statements up to and including the closing brace
    fn parse_block_statements(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut statements = Vec::new();
        while !self.check(Token::RBrace) {
            if self.is_at_end() {
                return Err(ParseError::unexpected_end_of_input("'}'", self.previous_end()));
            }
            statements.push(self.parse_statement()?);
        }
        self.consume(Token::RBrace, "'}'")?;
        Ok(statements)
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        self.enter()?;
        let result = self.parse_statement_inner();
        self.leave();
        result
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Stmt> {
        let start = self.current_location();
        match self.peek_token() {
            Some(Token::LBrace) => Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::Semicolon) => {
                self.advance();
                Ok(Stmt::Empty(Span::new(start, self.previous_end())))
            }
            Some(Token::If) => {
                self.advance();
                self.consume(Token::LParen, "'('")?;
                let condition = self.parse_expression()?;
                self.consume(Token::RParen, "')'")?;
                let then_branch = Box::new(self.parse_statement()?);
                let else_branch =
                    if self.match_token(Token::Else) { Some(Box::new(self.parse_statement()?)) } else { None };
                Ok(Stmt::If(IfStmt { condition, then_branch, else_branch, span: Span::new(start, self.previous_end()) }))
            }
            Some(Token::While) => {
                self.advance();
                self.consume(Token::LParen, "'('")?;
                let condition = self.parse_expression()?;
                self.consume(Token::RParen, "')'")?;
                let body = Box::new(self.parse_statement()?);
                Ok(Stmt::While(WhileStmt { condition, body, span: Span::new(start, self.previous_end()) }))
            }
            Some(Token::Return) => {
                self.advance();
                let value = if self.check(Token::Semicolon) { None } else { Some(self.parse_expression()?) };
                self.consume(Token::Semicolon, "';'")?;
                Ok(Stmt::Return(ReturnStmt { value, span: Span::new(start, self.previous_end()) }))
            }
            Some(Token::Throw) => {
                self.advance();
                let expr = self.parse_expression()?;
                self.consume(Token::Semicolon, "';'")?;
                Ok(Stmt::Throw(ThrowStmt { expr, span: Span::new(start, self.previous_end()) }))
            }
            Some(
                token @ (Token::For
                | Token::Do
                | Token::Switch
                | Token::Try
                | Token::Break
                | Token::Continue
                | Token::Synchronized
                | Token::Assert),
            ) => Err(self.error_here(format!("'{}' statements are not supported", keyword_text(token)))),
            Some(Token::Class | Token::Interface | Token::Abstract | Token::Static) => {
                Err(self.error_here("local class declarations are not supported"))
            }
            Some(Token::Else) => Err(self.error_here("'else' without 'if'")),
            Some(Token::Final) => {
                self.advance();
                self.parse_local_declaration(start, vec![Modifier::Final])
            }
            _ if self.looks_like_local_declaration() => self.parse_local_declaration(start, Vec::new()),
            _ => {
                let expr = self.parse_expression()?;
                if !matches!(expr, Expr::Assignment(_) | Expr::MethodCall(_) | Expr::New(_)) {
                    return Err(ParseError::invalid_syntax("not a statement", expr.span().start));
                }
                self.consume(Token::Semicolon, "';'")?;
                Ok(Stmt::Expression(ExprStmt { expr, span: Span::new(start, self.previous_end()) }))
            }
        }
    }

    /// `Type name` where Type is a primitive or a dotted name with optional `[]`
    fn looks_like_local_declaration(&self) -> bool {
        let mut i = self.current;
        match self.tokens.get(i).map(|t| t.token) {
            Some(t) if t.is_primitive_type() => return true,
            Some(Token::Identifier) => i += 1,
            _ => return false,
        }
        while self.tokens.get(i).map(|t| t.token) == Some(Token::Dot)
            && self.tokens.get(i + 1).map(|t| t.token) == Some(Token::Identifier)
        {
            i += 2;
        }
        if self.tokens.get(i).map(|t| t.token) == Some(Token::Lt) {
            // `List<String> x`: let parse_type report the generic type
            return self.tokens.get(i + 2).map(|t| t.token) == Some(Token::Gt);
        }
        while self.tokens.get(i).map(|t| t.token) == Some(Token::LBracket)
            && self.tokens.get(i + 1).map(|t| t.token) == Some(Token::RBracket)
        {
            i += 2;
        }
        self.tokens.get(i).map(|t| t.token) == Some(Token::Identifier)
    }

    fn parse_local_declaration(&mut self, start: Location, modifiers: Vec<Modifier>) -> ParseResult<Stmt> {
        let type_ref = self.parse_type()?;
        let name = self.consume_identifier()?.lexeme;
        let initializer = if self.match_token(Token::Assign) { Some(self.parse_expression()?) } else { None };
        if self.check(Token::Comma) {
            return Err(self.error_here("declare one local variable per statement"));
        }
        self.consume(Token::Semicolon, "';'")?;
        Ok(Stmt::Declaration(VarDeclStmt {
            modifiers,
            type_ref,
            name,
            initializer,
            span: Span::new(start, self.previous_end()),
        }))
    }

    // Expressions

    pub fn parse_expression(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let result = self.parse_assignment();
        self.leave();
        result
    }

    fn parse_assignment(&mut self) -> ParseResult<Expr> {
        let target = self.parse_conditional_or()?;
        match self.peek_token() {
            Some(Token::Assign) => {
                self.advance();
                if !matches!(target, Expr::Identifier(_) | Expr::FieldAccess(_)) {
                    return Err(ParseError::invalid_syntax("unexpected type\n  required: variable\n  found:    value", target.span().start));
                }
                let value = self.parse_expression()?;
                let span = target.span().merge(value.span());
                Ok(Expr::Assignment(AssignmentExpr { target: Box::new(target), value: Box::new(value), span }))
            }
            Some(Token::AddAssign | Token::SubAssign | Token::MulAssign | Token::DivAssign | Token::ModAssign) => {
                Err(self.error_here("compound assignment operators are not supported"))
            }
            Some(Token::Question) => Err(self.error_here("conditional expressions are not supported")),
            Some(Token::Arrow) => Err(self.error_here("lambda expressions are not supported")),
            _ => Ok(target),
        }
    }

    fn parse_conditional_or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_conditional_and()?;
        while self.match_token(Token::PipePipe) {
            let right = self.parse_conditional_and()?;
            expr = binary(expr, BinaryOp::Or, right);
        }
        Ok(expr)
    }

    fn parse_conditional_and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_equality()?;
        while self.match_token(Token::AndAnd) {
            let right = self.parse_equality()?;
            expr = binary(expr, BinaryOp::And, right);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_relational()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Amp | Token::Pipe | Token::Caret) => {
                    return Err(self.error_here("bitwise operators are not supported"));
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_relational()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_relational(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_additive()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                Some(Token::InstanceOf) => {
                    self.advance();
                    let target_type = self.parse_type()?;
                    let span = expr.span().merge(target_type.span);
                    expr = Expr::InstanceOf(InstanceOfExpr { expr: Box::new(expr), target_type, span });
                    continue;
                }
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_additive(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_multiplicative(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek_token() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            expr = binary(expr, op, right);
        }
        Ok(expr)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        self.enter()?;
        let result = self.parse_unary_inner();
        self.leave();
        result
    }

    fn parse_unary_inner(&mut self) -> ParseResult<Expr> {
        let start = self.current_location();
        match self.peek_token() {
            Some(Token::Minus) => {
                self.advance();
                // Fold negative literals so that -2147483648 is representable
                if self.check(Token::DecimalInteger) {
                    let token = self.consume(Token::DecimalInteger, "<literal>")?;
                    let value = parse_decimal(&token)?;
                    if value > i32::MAX as i64 + 1 {
                        return Err(ParseError::invalid_syntax("integer number too large", token.location));
                    }
                    let literal = Expr::Literal(LiteralExpr {
                        value: Literal::Integer(-value),
                        span: Span::new(start, token.end),
                    });
                    return self.parse_postfix(literal);
                }
                let operand = self.parse_unary()?;
                let span = Span::new(start, operand.span().end);
                Ok(Expr::Unary(UnaryExpr { operator: UnaryOp::Minus, operand: Box::new(operand), span }))
            }
            Some(Token::Bang) => {
                self.advance();
                let operand = self.parse_unary()?;
                let span = Span::new(start, operand.span().end);
                Ok(Expr::Unary(UnaryExpr { operator: UnaryOp::Not, operand: Box::new(operand), span }))
            }
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            Some(Token::Inc | Token::Dec) => Err(self.error_here("increment and decrement operators are not supported")),
            Some(Token::Tilde) => Err(self.error_here("bitwise operators are not supported")),
            Some(Token::LParen) if self.looks_like_cast() => {
                self.advance();
                let target_type = self.parse_type()?;
                self.consume(Token::RParen, "')'")?;
                let operand = self.parse_unary()?;
                let span = Span::new(start, operand.span().end);
                Ok(Expr::Cast(CastExpr { target_type, expr: Box::new(operand), span }))
            }
            _ => {
                let primary = self.parse_primary()?;
                self.parse_postfix(primary)
            }
        }
    }

    /// `(int) x`, `(String) o`, `(a.B) o`: a parenthesized type followed by an operand start
    fn looks_like_cast(&self) -> bool {
        let mut i = self.current + 1;
        let token_at = |i: usize| self.tokens.get(i).map(|t| t.token);
        match token_at(i) {
            Some(t) if t.is_primitive_type() => return true,
            Some(Token::Identifier) => i += 1,
            _ => return false,
        }
        while token_at(i) == Some(Token::Dot) && token_at(i + 1) == Some(Token::Identifier) {
            i += 2;
        }
        while token_at(i) == Some(Token::LBracket) && token_at(i + 1) == Some(Token::RBracket) {
            i += 2;
        }
        if token_at(i) != Some(Token::RParen) {
            return false;
        }
        matches!(
            token_at(i + 1),
            Some(
                Token::Identifier
                    | Token::StringLiteral
                    | Token::DecimalInteger
                    | Token::HexInteger
                    | Token::True
                    | Token::False
                    | Token::Null
                    | Token::This
                    | Token::New
                    | Token::LParen
                    | Token::Bang
            )
        )
    }

    fn parse_postfix(&mut self, mut expr: Expr) -> ParseResult<Expr> {
        loop {
            match self.peek_token() {
                Some(Token::Dot) => {
                    self.advance();
                    if self.check(Token::New) || self.check(Token::Class) || self.check(Token::This) {
                        return Err(self.error_here(format!("'.{}' is not supported", self.peek_lexeme())));
                    }
                    let name_token = self.consume_identifier()?;
                    if self.check(Token::LParen) {
                        let arguments = self.parse_arguments()?;
                        let span = Span::new(expr.span().start, self.previous_end());
                        expr = Expr::MethodCall(MethodCallExpr {
                            target: Some(Box::new(expr)),
                            is_super: false,
                            name: name_token.lexeme,
                            arguments,
                            span,
                        });
                    } else {
                        let span = Span::new(expr.span().start, name_token.end);
                        expr = Expr::FieldAccess(FieldAccessExpr { target: Box::new(expr), name: name_token.lexeme, span });
                    }
                }
                Some(Token::LBracket) => return Err(self.error_here("array access is not supported")),
                Some(Token::Inc | Token::Dec) => {
                    return Err(self.error_here("increment and decrement operators are not supported"))
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Expr>> {
        self.consume(Token::LParen, "'('")?;
        let mut arguments = Vec::new();
        if !self.check(Token::RParen) {
            loop {
                arguments.push(self.parse_expression()?);
                if !self.match_token(Token::Comma) {
                    break;
                }
            }
        }
        self.consume(Token::RParen, "')'")?;
        Ok(arguments)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        let start = self.current_location();
        let Some(token) = self.peek().cloned() else {
            return Err(ParseError::unexpected_end_of_input("<expression>", self.previous_end()));
        };
        let literal = |value| Expr::Literal(LiteralExpr { value, span: Span::new(token.location, token.end) });
        match token.token {
            Token::DecimalInteger => {
                self.advance();
                let value = parse_decimal(&token)?;
                if value > i32::MAX as i64 {
                    return Err(ParseError::invalid_syntax("integer number too large", token.location));
                }
                Ok(literal(Literal::Integer(value)))
            }
            Token::HexInteger => {
                self.advance();
                let value = u32::from_str_radix(&token.lexeme[2..], 16)
                    .map_err(|_| ParseError::invalid_syntax("integer number too large", token.location))?;
                Ok(literal(Literal::Integer(value as i32 as i64)))
            }
            Token::StringLiteral => {
                self.advance();
                Ok(literal(Literal::String(unescape(&token)?)))
            }
            Token::True => {
                self.advance();
                Ok(literal(Literal::Boolean(true)))
            }
            Token::False => {
                self.advance();
                Ok(literal(Literal::Boolean(false)))
            }
            Token::Null => {
                self.advance();
                Ok(literal(Literal::Null))
            }
            Token::LongLiteral | Token::FloatLiteral | Token::CharLiteral => {
                Err(ParseError::invalid_syntax(format!("literal {} is not supported", token.lexeme), token.location))
            }
            Token::This => {
                self.advance();
                if self.check(Token::LParen) {
                    return Err(ParseError::invalid_syntax(
                        "call to this must be first statement in constructor",
                        token.location,
                    ));
                }
                Ok(Expr::This(Span::new(token.location, token.end)))
            }
            Token::Super => {
                self.advance();
                if self.check(Token::LParen) {
                    return Err(ParseError::invalid_syntax(
                        "call to super must be first statement in constructor",
                        token.location,
                    ));
                }
                self.consume(Token::Dot, "'.'")?;
                let name = self.consume_identifier()?.lexeme;
                if !self.check(Token::LParen) {
                    return Err(self.error_here("super field access is not supported"));
                }
                let arguments = self.parse_arguments()?;
                Ok(Expr::MethodCall(MethodCallExpr {
                    target: None,
                    is_super: true,
                    name,
                    arguments,
                    span: Span::new(start, self.previous_end()),
                }))
            }
            Token::New => {
                self.advance();
                let target_type = self.parse_type()?;
                if target_type.array_dims > 0 || self.check(Token::LBracket) || is_primitive_name(&target_type.name) {
                    return Err(ParseError::invalid_syntax("array creation is not supported", start));
                }
                let arguments = self.parse_arguments()?;
                if self.check(Token::LBrace) {
                    return Err(self.error_here("anonymous classes are not supported"));
                }
                Ok(Expr::New(NewExpr { target_type, arguments, span: Span::new(start, self.previous_end()) }))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expression()?;
                self.consume(Token::RParen, "')'")?;
                Ok(Expr::Parenthesized(Box::new(inner), Span::new(start, self.previous_end())))
            }
            Token::Identifier => {
                self.advance();
                if self.check(Token::LParen) {
                    let arguments = self.parse_arguments()?;
                    return Ok(Expr::MethodCall(MethodCallExpr {
                        target: None,
                        is_super: false,
                        name: token.lexeme.clone(),
                        arguments,
                        span: Span::new(start, self.previous_end()),
                    }));
                }
                Ok(Expr::Identifier(IdentifierExpr { name: token.lexeme.clone(), span: Span::new(token.location, token.end) }))
            }
            _ => Err(ParseError::invalid_syntax("illegal start of expression", token.location)),
        }
    }
}

fn binary(left: Expr, operator: BinaryOp, right: Expr) -> Expr {
    let span = left.span().merge(right.span());
    Expr::Binary(BinaryExpr { left: Box::new(left), operator, right: Box::new(right), span })
}

fn is_primitive_name(name: &str) -> bool {
    matches!(name, "boolean" | "byte" | "short" | "int" | "long" | "char" | "float" | "double" | "void")
}

fn keyword_text(token: Token) -> &'static str {
    match token {
        Token::For => "for",
        Token::Do => "do",
        Token::Switch => "switch",
        Token::Try => "try",
        Token::Break => "break",
        Token::Continue => "continue",
        Token::Synchronized => "synchronized",
        Token::Assert => "assert",
        _ => "unsupported",
    }
}

fn parse_decimal(token: &LexicalToken) -> ParseResult<i64> {
    token
        .lexeme
        .parse::<i64>()
        .map_err(|_| ParseError::invalid_syntax("integer number too large", token.location))
}

/// Decode the escapes of a string literal token (quotes included)
fn unescape(token: &LexicalToken) -> ParseResult<String> {
    let body = &token.lexeme[1..token.lexeme.len() - 1];
    let bad = || ParseError::lexical_error("illegal escape character in string literal", token.location);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next().ok_or_else(bad)? {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            's' => out.push(' '),
            d @ '0'..='7' => {
                // Octal escape: up to three digits, at most \377
                let mut value = d.to_digit(8).unwrap_or(0);
                let max_digits = if d <= '3' { 3 } else { 2 };
                for _ in 1..max_digits {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value).ok_or_else(bad)?);
            }
            'u' => {
                let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                let value = u32::from_str_radix(&hex, 16).map_err(|_| bad())?;
                out.push(char::from_u32(value).ok_or_else(bad)?);
            }
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '\\' => out.push('\\'),
            _ => return Err(bad()),
        }
    }
    Ok(out)
}
