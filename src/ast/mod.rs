//! Abstract Syntax Tree for the supported Java subset

mod nodes;

pub use nodes::*;

pub use crate::parser::span::{Location, Span};

/// AST node trait that all AST nodes implement
pub trait AstNode {
    /// Get the source span of this node
    fn span(&self) -> Span;
}

/// One parsed source file
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    pub package_decl: Option<PackageDecl>,
    pub imports: Vec<ImportDecl>,
    pub type_decls: Vec<ClassDecl>,
    pub span: Span,
}

impl CompilationUnit {
    pub fn package_name(&self) -> &str {
        self.package_decl.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }

    /// Binary name of a top-level type declared in this unit
    pub fn binary_name_of(&self, simple_name: &str) -> String {
        match self.package_name() {
            "" => simple_name.to_string(),
            package => format!("{}.{}", package, simple_name),
        }
    }
}

impl AstNode for CompilationUnit {
    fn span(&self) -> Span {
        self.span
    }
}
