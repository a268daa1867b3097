//! Compilation sessions: accumulate sources, compile them as one batch and
//! resolve the resulting classes

use std::collections::HashMap;
use std::fmt;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use super::bridge::{BridgeGuard, ClassScanner, ClasspathBridge};
use super::loader::InMemoryClassLoader;
use super::registry::CompiledBytecodeRegistry;
use crate::common::classpath::ClassPath;
use crate::common::config::Config;
use crate::common::error::{Error, Result};
use crate::rt::class::Class;
use crate::rt::loader::{ClassLoader, HostClassLoader};
use crate::synth::naming::NameAllocator;
use crate::synth::wrapper::{synthesize, WrapperSpec};
use crate::tools::{Diagnostic, DiagnosticCollector, FileObject, JavaCompiler, Kind, SourceFile, Tolc};

/// One class submitted to a session
///
/// Equality and hashing use the class name; a session holds at most one
/// unit per name.
#[derive(Clone)]
pub struct SourceUnit {
    file: Arc<SourceFile>,
    session: Weak<SessionState>,
}

impl SourceUnit {
    pub fn class_name(&self) -> &str {
        self.file.class_name()
    }

    pub fn source(&self) -> &str {
        self.file.text()
    }

    pub fn kind(&self) -> Kind {
        Kind::Source
    }

    /// Compile the whole session batch and return this unit's class
    pub fn compile(&self) -> Result<Arc<Class>> {
        let state = self
            .session
            .upgrade()
            .ok_or_else(|| Error::configuration(format!("the session of {} has been dropped", self.class_name())))?;
        let mut compiled = state.compile()?;
        compiled.remove(self).ok_or_else(|| Error::configuration(format!("{} is not part of its session", self.class_name())))
    }
}

impl PartialEq for SourceUnit {
    fn eq(&self, other: &Self) -> bool {
        self.class_name() == other.class_name()
    }
}

impl Eq for SourceUnit {}

impl Hash for SourceUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.class_name().hash(state);
    }
}

impl fmt::Debug for SourceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceUnit").field("class_name", &self.class_name()).finish()
    }
}

struct SessionState {
    compiler: Arc<dyn JavaCompiler>,
    names: Arc<NameAllocator>,
    loader: Arc<InMemoryClassLoader>,
    scanner: Option<Arc<dyn ClassScanner>>,
    units: Mutex<Vec<SourceUnit>>,
    /// Held for the duration of a batch so concurrent misuse serializes
    batch: Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionState {
    fn registry(&self) -> &Arc<CompiledBytecodeRegistry> {
        self.loader.registry()
    }

    fn compile(&self) -> Result<HashMap<SourceUnit, Arc<Class>>> {
        let _batch = lock(&self.batch);
        let units = lock(&self.units).clone();
        log::info!("compiling {} source unit(s)", units.len());

        let bridge = ClasspathBridge::new(self.compiler.standard_file_manager(), self.loader.clone())
            .with_scanner(self.scanner.clone());
        let guard = BridgeGuard::new(&bridge);
        let outcome = self.compile_batch(&bridge, &units);
        match guard.release() {
            Ok(()) => outcome,
            Err(source) => {
                log::error!("failed to release classpath bridge: {}", source);
                Err(Error::ResourceRelease { source, masked: outcome.err().map(Box::new) })
            }
        }
    }

    fn compile_batch(&self, bridge: &ClasspathBridge, units: &[SourceUnit]) -> Result<HashMap<SourceUnit, Arc<Class>>> {
        let captured_before = self.registry().names();
        let diagnostics = DiagnosticCollector::new();
        let files: Vec<Arc<dyn FileObject>> = units.iter().map(|unit| unit.file.clone() as Arc<dyn FileObject>).collect();

        let succeeded = self.compiler.compile(&files, bridge, &diagnostics);
        let errors = diagnostics.errors();
        for warning in diagnostics.diagnostics().iter().filter(|d| !d.is_error()) {
            log::warn!("{}", warning);
        }
        if !succeeded || !errors.is_empty() {
            self.registry().retain_names(&captured_before);
            log::info!("compilation failed with {} error(s)", errors.len());
            return Err(compile_error(errors, succeeded));
        }

        let mut resolved = HashMap::with_capacity(units.len());
        for unit in units {
            let class = self
                .loader
                .load_class(unit.class_name())
                .map_err(|source| Error::Resolution { class_name: unit.class_name().to_string(), source })?;
            resolved.insert(unit.clone(), class);
        }
        log::info!("compiled and resolved {} class(es)", resolved.len());
        Ok(resolved)
    }
}

/// Aggregate error with each diagnostic and the source it points into
fn compile_error(errors: Vec<Diagnostic>, compiler_succeeded: bool) -> Error {
    let mut report = String::new();
    if errors.is_empty() {
        report.push_str("the compiler reported failure without diagnostics\n");
    }
    for error in &errors {
        let _ = writeln!(
            report,
            "{}:{}: {}",
            error.source_name().unwrap_or_else(|| "<unknown>".to_string()),
            error.line.map(|line| line.to_string()).unwrap_or_else(|| "?".to_string()),
            error.message
        );
        if let Some(text) = error.source.as_ref().and_then(|source| source.char_content().ok()) {
            for (index, line) in text.lines().enumerate() {
                let _ = writeln!(report, "{:>4} | {}", index + 1, line);
            }
        }
    }
    if compiler_succeeded {
        log::warn!("compiler reported success along with {} error diagnostic(s)", errors.len());
    }
    Error::Compile { count: errors.len(), report, diagnostics: errors }
}

/// Compiles a batch of generated or hand-written sources in-process
///
/// Create one per unit of work: add sources, call [`compile`](Self::compile)
/// once and use the returned classes.
#[derive(Clone)]
pub struct CompilationSession {
    state: Arc<SessionState>,
}

impl fmt::Debug for CompilationSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationSession")
            .field("units", &lock(&self.state.units).len())
            .field("loader", &self.state.loader)
            .finish()
    }
}

impl Default for CompilationSession {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl CompilationSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> CompilationSessionBuilder {
        CompilationSessionBuilder::default()
    }

    /// Register source text for `class_name` (fully qualified)
    pub fn add_source(&self, class_name: &str, text: impl Into<String>) -> Result<SourceUnit> {
        if class_name.trim().is_empty() {
            return Err(Error::configuration("source units need a class name"));
        }
        let mut units = lock(&self.state.units);
        if units.iter().any(|unit| unit.class_name() == class_name) {
            return Err(Error::configuration(format!("duplicate source unit {}", class_name)));
        }
        let unit = SourceUnit { file: Arc::new(SourceFile::new(class_name, text)), session: Arc::downgrade(&self.state) };
        log::debug!("added source unit {}", class_name);
        units.push(unit.clone());
        Ok(unit)
    }

    /// Synthesize a wrapper class and register its source
    pub fn add_wrapper(&self, spec: WrapperSpec) -> Result<SourceUnit> {
        let class = synthesize(&spec, &self.state.names)?;
        self.add_source(class.name.fully_qualified_name(), class.source)
    }

    /// Compile every unit as one batch; all of them resolve or none do
    pub fn compile(&self) -> Result<HashMap<SourceUnit, Arc<Class>>> {
        self.state.compile()
    }

    pub fn units(&self) -> Vec<SourceUnit> {
        lock(&self.state.units).clone()
    }

    pub fn class_loader(&self) -> Arc<dyn ClassLoader> {
        self.state.loader.clone()
    }

    pub fn registry(&self) -> &Arc<CompiledBytecodeRegistry> {
        self.state.registry()
    }
}

#[derive(Default)]
pub struct CompilationSessionBuilder {
    config: Option<Config>,
    class_path: Option<ClassPath>,
    compiler: Option<Arc<dyn JavaCompiler>>,
    parent: Option<Arc<dyn ClassLoader>>,
    scanner: Option<Arc<dyn ClassScanner>>,
    names: Option<Arc<NameAllocator>>,
}

impl CompilationSessionBuilder {
    /// Options for the built-in compiler
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Class path of the built-in compiler and the default host loader
    pub fn class_path(mut self, class_path: ClassPath) -> Self {
        self.class_path = Some(class_path);
        self
    }

    pub fn compiler(mut self, compiler: Arc<dyn JavaCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    /// Loader asked for everything the session did not compile
    pub fn parent_loader(mut self, parent: Arc<dyn ClassLoader>) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Use `host` as parent loader and class path scanner
    pub fn host_loader(mut self, host: Arc<HostClassLoader>) -> Self {
        self.scanner = Some(host.clone() as Arc<dyn ClassScanner>);
        self.parent = Some(host as Arc<dyn ClassLoader>);
        self
    }

    pub fn scanner(mut self, scanner: impl ClassScanner + 'static) -> Self {
        self.scanner = Some(Arc::new(scanner));
        self
    }

    pub fn name_allocator(mut self, names: Arc<NameAllocator>) -> Self {
        self.names = Some(names);
        self
    }

    pub fn build(self) -> CompilationSession {
        let class_path = self.class_path.unwrap_or_default();
        let compiler = self.compiler.unwrap_or_else(|| {
            Arc::new(Tolc::new(self.config.unwrap_or_default()).with_class_path(class_path.clone()))
        });
        let (parent, scanner) = match self.parent {
            Some(parent) => (parent, self.scanner),
            None => {
                let host = HostClassLoader::new(class_path);
                let scanner = self.scanner.or_else(|| Some(host.clone() as Arc<dyn ClassScanner>));
                (host as Arc<dyn ClassLoader>, scanner)
            }
        };
        let loader = InMemoryClassLoader::new(Arc::new(CompiledBytecodeRegistry::new()), parent);
        CompilationSession {
            state: Arc::new(SessionState {
                compiler,
                names: self.names.unwrap_or_else(NameAllocator::shared),
                loader,
                scanner,
                units: Mutex::new(Vec::new()),
                batch: Mutex::new(()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rt::value::Value;

    #[test]
    fn test_add_source_rejects_duplicates() {
        let session = CompilationSession::new();
        session.add_source("demo.A", "package demo; public class A { }").unwrap();
        assert!(session.add_source("demo.A", "package demo; public class A { }").unwrap_err().is_configuration());
        assert!(session.add_source(" ", "").unwrap_err().is_configuration());
    }

    #[test]
    fn test_compile_and_invoke_static() {
        let session = CompilationSession::new();
        let unit = session
            .add_source("demo.Calc", "package demo; public class Calc { public static int twice(int x) { return x * 2; } }")
            .unwrap();
        let compiled = session.compile().unwrap();
        let class = &compiled[&unit];
        assert_eq!(class.name(), "demo.Calc");
        assert_eq!(class.invoke_static("twice", &[Value::Int(21)]).unwrap().as_int(), Some(42));
        assert!(session.registry().contains("demo.Calc"));
    }

    #[test]
    fn test_failed_batch_captures_nothing() {
        let session = CompilationSession::new();
        session.add_source("demo.Good", "package demo; public class Good { }").unwrap();
        session.add_source("demo.Bad", "package demo; public class Bad { int f() { } }").unwrap();
        let error = session.compile().unwrap_err();
        assert!(error.is_compile());
        assert!(error.to_string().contains("demo/Bad.java:1: missing return statement"));
        assert!(session.registry().is_empty());
    }

    #[test]
    fn test_unit_of_dropped_session() {
        let unit = {
            let session = CompilationSession::new();
            session.add_source("demo.Gone", "package demo; public class Gone { }").unwrap()
        };
        assert!(unit.compile().unwrap_err().is_configuration());
    }
}
