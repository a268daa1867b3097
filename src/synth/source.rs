//! Indented Java source text

use crate::codegen::descriptor::JType;

const INDENT: &str = "    ";

/// A field of the generated class that is also a constructor parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub ty: JType,
    pub name: String,
}

impl FieldSpec {
    pub fn new(ty: JType, name: impl Into<String>) -> Self {
        Self { ty, name: name.into() }
    }
}

/// Line-oriented writer that tracks brace nesting
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    depth: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn indent(&mut self) {
        self.depth += 1;
    }

    pub fn dedent(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn line(&mut self, text: &str) {
        for _ in 0..self.depth {
            self.out.push_str(INDENT);
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Each line of `text` at the current depth, keeping its own relative indentation
    pub fn lines(&mut self, text: &str) {
        for line in text.trim_end().lines() {
            if line.trim().is_empty() {
                self.blank();
            } else {
                self.line(line);
            }
        }
    }

    /// `header {` and one level deeper
    pub fn open(&mut self, header: &str) {
        self.line(&format!("{} {{", header));
        self.indent();
    }

    pub fn close(&mut self) {
        self.dedent();
        self.line("}");
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// Comma-separated source spelling of `types`
pub fn source_type_list(types: &[JType]) -> String {
    types.iter().map(JType::source_name).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting() {
        let mut writer = SourceWriter::new();
        writer.open("class A");
        writer.open("void f()");
        writer.lines("int x = 1;\n\nreturn;\n");
        writer.close();
        writer.close();
        assert_eq!(writer.depth(), 0);
        assert_eq!(
            writer.finish(),
            "class A {\n    void f() {\n        int x = 1;\n\n        return;\n    }\n}\n"
        );
    }

    #[test]
    fn test_dedent_saturates() {
        let mut writer = SourceWriter::new();
        writer.dedent();
        writer.line("x");
        assert_eq!(writer.as_str(), "x\n");
    }
}
