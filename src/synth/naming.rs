//! Unique names for generated classes

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::consts::DEFAULT_GENERATED_ROOT;

/// Package every generated class lives under, before the allocator's root
const GENERATED_PACKAGE: &str = "generated";

/// Keywords and literals that are not legal package segments
const RESERVED_WORDS: &[&str] = &[
    "_", "abstract", "assert", "boolean", "break", "byte", "case", "catch", "char", "class", "const", "continue",
    "default", "do", "double", "else", "enum", "extends", "false", "final", "finally", "float", "for", "goto", "if",
    "implements", "import", "instanceof", "int", "interface", "long", "native", "new", "null", "package", "private",
    "protected", "public", "return", "short", "static", "strictfp", "super", "switch", "synchronized", "this",
    "throw", "throws", "transient", "true", "try", "void", "volatile", "while",
];

static SHARED: Lazy<Arc<NameAllocator>> = Lazy::new(|| Arc::new(NameAllocator::new()));

/// A class name handed out by a [`NameAllocator`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneratedClassName {
    package_name: String,
    simple_name: String,
    fully_qualified_name: String,
}

impl GeneratedClassName {
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    pub fn simple_name(&self) -> &str {
        &self.simple_name
    }

    pub fn fully_qualified_name(&self) -> &str {
        &self.fully_qualified_name
    }
}

impl fmt::Display for GeneratedClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fully_qualified_name)
    }
}

/// Hands out class names that never repeat for the allocator's lifetime
///
/// `demo.Outer$Greeter` becomes `generated.tolc.demo.Outer.Greeter17`: the
/// nested separator turns into a package separator, the original package is
/// namespaced under `generated.<root>`, and the counter is appended.
#[derive(Debug)]
pub struct NameAllocator {
    root: String,
    counter: AtomicU64,
}

impl Default for NameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::with_root(DEFAULT_GENERATED_ROOT)
    }

    pub fn with_root(root: impl Into<String>) -> Self {
        Self { root: root.into(), counter: AtomicU64::new(0) }
    }

    /// The process-wide allocator sessions use unless given their own
    pub fn shared() -> Arc<NameAllocator> {
        SHARED.clone()
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn create_class_name(&self, hint: &str) -> GeneratedClassName {
        let id = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let normalized = hint.replace('$', ".");
        let mut segments: Vec<String> = normalized.split('.').filter(|s| !s.is_empty()).map(identifier).collect();
        let base = segments.pop().unwrap_or_else(|| "Generated".to_string());

        let mut package_name = format!("{}.{}", GENERATED_PACKAGE, identifier(&self.root));
        for segment in &segments {
            package_name.push('.');
            package_name.push_str(segment);
        }
        let simple_name = numbered(&base, id);
        let fully_qualified_name = format!("{}.{}", package_name, simple_name);
        log::debug!("allocated class name {} for hint '{}'", fully_qualified_name, hint);
        GeneratedClassName { package_name, simple_name, fully_qualified_name }
    }
}

/// Append the counter to `base`
///
/// A base ending in a digit or `_` gets a `_` separator, so the trailing
/// digits of a name always belong to the counter alone.
fn numbered(base: &str, id: u64) -> String {
    if base.ends_with(|c: char| c.is_ascii_digit() || c == '_') {
        format!("{}_{}", base, id)
    } else {
        format!("{}{}", base, id)
    }
}

/// Replace characters that cannot appear in a Java identifier
fn identifier(segment: &str) -> String {
    let mut out: String = segment
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    if RESERVED_WORDS.contains(&out.as_str()) {
        out.push('_');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_hint_is_split_into_package_and_name() {
        let allocator = NameAllocator::new();
        let name = allocator.create_class_name("demo.Outer$Greeter");
        assert_eq!(name.package_name(), "generated.tolc.demo.Outer");
        assert_eq!(name.simple_name(), "Greeter1");
        assert_eq!(name.fully_qualified_name(), "generated.tolc.demo.Outer.Greeter1");
    }

    #[test]
    fn test_same_hint_never_collides() {
        let allocator = NameAllocator::with_root("test");
        let first = allocator.create_class_name("Greeter");
        let second = allocator.create_class_name("Greeter");
        assert_ne!(first, second);
        assert_eq!(first.package_name(), "generated.test");
        assert_eq!(second.simple_name(), "Greeter2");
    }

    #[test]
    fn test_unusable_characters_are_replaced() {
        let allocator = NameAllocator::new();
        assert_eq!(allocator.create_class_name("my-lib.9Api").fully_qualified_name(), "generated.tolc.my_lib._9Api1");
        assert_eq!(allocator.create_class_name("").simple_name(), "Generated2");
    }

    #[test]
    fn test_reserved_words_are_escaped() {
        let allocator = NameAllocator::with_root("throws");
        let name = allocator.create_class_name("int.class$-.Task");
        assert_eq!(name.package_name(), "generated.throws_.int_.class_.__");
        assert_eq!(name.simple_name(), "Task1");
        assert_eq!(allocator.create_class_name("demo.new").simple_name(), "new__2");
    }

    #[test]
    fn test_hints_ending_in_digits_cannot_collide() {
        let allocator = NameAllocator::with_root("p");
        let numbered = allocator.create_class_name("demo.Task1");
        for _ in 0..9 {
            allocator.create_class_name("demo.Other");
        }
        let plain = allocator.create_class_name("demo.Task");
        assert_eq!(numbered.simple_name(), "Task1_1");
        assert_eq!(plain.simple_name(), "Task11");
        assert_ne!(numbered, plain);
    }

    #[test]
    fn test_hints_ending_in_underscore_cannot_collide() {
        let allocator = NameAllocator::with_root("p");
        let underscore = allocator.create_class_name("Task1_");
        let digit = allocator.create_class_name("Task1");
        assert_eq!(underscore.simple_name(), "Task1__1");
        assert_eq!(digit.simple_name(), "Task1_2");
        assert_ne!(underscore, digit);
    }
}
