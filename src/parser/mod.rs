//! Lexical analysis and parsing of Java source into an AST

pub mod error;
pub mod lexer;
pub mod parser;
pub mod span;

pub use error::{ParseError, ParseResult};
pub use lexer::Lexer;
pub use parser::Parser;
pub use span::{Location, Span};

use crate::ast::CompilationUnit;

/// Parse one Java source file
pub fn parse_java(source: &str) -> ParseResult<CompilationUnit> {
    Parser::new(source)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;

    #[test]
    fn test_parse_class_with_members() {
        let source = r#"
package demo;

import java.io.IOException;

@SuppressWarnings("all")
public class Greeter implements Named, java.lang.Cloneable {
    private final String prefix;

    public Greeter(String prefix) {
        super();
        this.prefix = prefix;
    }

    public String greet(String name) throws IOException {
        if (name == null) {
            throw new IllegalArgumentException("name");
        }
        return prefix + ", " + name;
    }

    static class Helper {}
}
"#;
        let unit = parse_java(source).expect("Failed to parse");
        assert_eq!(unit.package_name(), "demo");
        assert_eq!(unit.imports.len(), 1);
        let class = &unit.type_decls[0];
        assert_eq!(class.name, "Greeter");
        assert_eq!(class.annotations[0].string_values(), vec!["all"]);
        assert_eq!(class.interfaces.len(), 2);
        assert_eq!(class.fields().count(), 1);
        let ctor = class.constructors().next().unwrap();
        assert_eq!(ctor.explicit_invocation.as_ref().map(|i| i.kind), Some(CtorInvocationKind::Super));
        let method = class.methods().next().unwrap();
        assert_eq!(method.throws[0].name, "IOException");
        assert_eq!(method.body.as_ref().unwrap().statements.len(), 2);
        assert_eq!(class.member_types().count(), 1);
    }

    #[test]
    fn test_operator_precedence() {
        let unit = parse_java("class A { boolean f(int a) { return a + 2 * 3 < 10 && !false; } }").unwrap();
        let method = unit.type_decls[0].methods().next().unwrap();
        let Stmt::Return(ret) = &method.body.as_ref().unwrap().statements[0] else { panic!("expected return") };
        let Some(Expr::Binary(and)) = &ret.value else { panic!("expected &&") };
        assert_eq!(and.operator, BinaryOp::And);
        let Expr::Binary(lt) = and.left.as_ref() else { panic!("expected <") };
        assert_eq!(lt.operator, BinaryOp::Lt);
        let Expr::Binary(add) = lt.left.as_ref() else { panic!("expected +") };
        assert_eq!(add.operator, BinaryOp::Add);
    }

    #[test]
    fn test_casts_and_parenthesized_expressions() {
        let unit = parse_java("class A { Object f(Object o, int x) { int y = (x) + 1; return (String) o; } }").unwrap();
        let body = unit.type_decls[0].methods().next().unwrap().body.clone().unwrap();
        assert!(matches!(&body.statements[0], Stmt::Declaration(d) if matches!(d.initializer, Some(Expr::Binary(_)))));
        assert!(matches!(&body.statements[1], Stmt::Return(r) if matches!(r.value, Some(Expr::Cast(_)))));
    }

    #[test]
    fn test_missing_semicolon_reported_after_previous_token() {
        let err = parse_java("class A {\n  int f() {\n    return 1\n  }\n}").unwrap_err();
        assert!(err.to_string().contains("';' expected"));
        assert_eq!(err.location().line, 3);
    }

    #[test]
    fn test_illegal_start_of_expression() {
        let err = parse_java("class A {\n int f() {\n\n  return 42 +;\n }\n}").unwrap_err();
        assert_eq!(err.to_string(), "illegal start of expression");
        assert_eq!(err.location().line, 4);
    }

    #[test]
    fn test_unsupported_constructs_are_reported() {
        for (source, needle) in [
            ("class A { void f() { for (;;) {} } }", "'for' statements are not supported"),
            ("class A<T> {}", "generic type declarations are not supported"),
            ("enum E { X }", "enum declarations are not supported"),
            ("class A { void f() { x++; } }", "increment and decrement"),
        ] {
            let err = parse_java(source).unwrap_err();
            assert!(err.to_string().contains(needle), "{}: {}", source, err);
        }
    }

    #[test]
    fn test_string_escapes_and_min_int() {
        let unit = parse_java(r#"class A { String s = "a\tbA\101\n"; int m = -2147483648; }"#).unwrap();
        let fields: Vec<_> = unit.type_decls[0].fields().collect();
        assert!(matches!(&fields[0].initializer, Some(Expr::Literal(l)) if l.value == Literal::String("a\tbAA\n".into())));
        assert!(matches!(&fields[1].initializer, Some(Expr::Literal(l)) if l.value == Literal::Integer(-2147483648)));
        assert!(parse_java("class A { int m = 2147483648; }").is_err());
    }
}
