// Global safety caps to prevent pathological or infinite recursion

// Parser: maximum nesting of statements and expressions
pub const PARSER_MAX_DEPTH: usize = 512;

// Symbol table: maximum supertype hops when walking a hierarchy
pub const SYMTAB_MAX_HIERARCHY_STEPS: usize = 10_000;

// Runtime: maximum interpreter call depth before StackOverflowError
pub const INTERP_MAX_CALL_DEPTH: usize = 512;

// Runtime: instruction budget per top-level invocation
pub const INTERP_MAX_STEPS: u64 = 50_000_000;

// Simple names resolved implicitly from java.lang
pub const JAVA_LANG_PACKAGE: &str = "java.lang";

// Root segment of generated class packages
pub const DEFAULT_GENERATED_ROOT: &str = "tolc";
