//! The compiler backend contract and the built-in `Tolc` implementation

use std::io::Write;
use std::sync::Arc;

use super::diagnostic::{Diagnostic, DiagnosticCollector};
use super::file_manager::{FileManager, StandardFileManager};
use super::file_object::FileObject;
use super::{Kind, Location};
use crate::codegen::gen::Gen;
use crate::common::classpath::ClassPath;
use crate::common::config::Config;
use crate::parser::parse_java;
use crate::wash::check::ClassChecker;
use crate::wash::{Log, Symtab, UnitEnv};

/// A compiler that can be driven in-process
///
/// `compile` reports every problem through `diagnostics` and returns whether
/// the task succeeded. Compiled classes are written through
/// [`FileManager::output_for_class`] with [`Location::ClassOutput`].
pub trait JavaCompiler: Send + Sync {
    /// The file manager the compiler would use on its own
    fn standard_file_manager(&self) -> Box<dyn FileManager>;

    fn compile(&self, units: &[Arc<dyn FileObject>], file_manager: &dyn FileManager, diagnostics: &DiagnosticCollector) -> bool;
}

/// Java-subset compiler producing class files in memory
#[derive(Debug, Clone, Default)]
pub struct Tolc {
    config: Config,
    class_path: ClassPath,
}

impl Tolc {
    pub fn new(config: Config) -> Self {
        Self { config, class_path: ClassPath::new() }
    }

    /// Class path of the standard file manager
    pub fn with_class_path(mut self, class_path: ClassPath) -> Self {
        self.class_path = class_path;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl JavaCompiler for Tolc {
    fn standard_file_manager(&self) -> Box<dyn FileManager> {
        Box::new(StandardFileManager::new(self.class_path.clone()))
    }

    fn compile(&self, units: &[Arc<dyn FileObject>], file_manager: &dyn FileManager, diagnostics: &DiagnosticCollector) -> bool {
        log::info!("tolc: compiling {} unit(s)", units.len());
        let log = Log::new(diagnostics, self.config.warnings);
        if let Err(error) = self.config.validate() {
            log.error_without_position(error.to_string());
            return false;
        }

        // Parse
        let mut envs = Vec::with_capacity(units.len());
        for unit in units {
            let text = match unit.char_content() {
                Ok(text) => text,
                Err(error) => {
                    log.error_without_position(format!("error reading {}; {}", unit.name(), error));
                    continue;
                }
            };
            match parse_java(&text) {
                Ok(tree) => envs.push(UnitEnv::new(unit.clone(), tree)),
                Err(error) => log.error_at(unit, error.location(), error.to_string()),
            }
        }
        if log.error_count() > 0 {
            log::debug!("tolc: stopping after parse with {} error(s)", log.error_count());
            return false;
        }

        // Enter
        let mut symtab = Symtab::new(file_manager);
        for env in &mut envs {
            env.enter_names(&mut symtab, &log);
        }
        for env in &mut envs {
            env.check_declared_name(&log);
            env.resolve_imports(&symtab, &log);
        }
        let mut entered = Vec::new();
        for env in &envs {
            for class in env.classes.iter().filter(|c| !c.duplicate) {
                entered.push(env.member_enter(class, &symtab, &log));
            }
        }
        for symbol in entered {
            symtab.complete_source_class(symbol);
        }

        // Check and generate
        let mut outputs: Vec<(String, Vec<u8>, Arc<dyn FileObject>)> = Vec::new();
        for env in &envs {
            let checker = ClassChecker::new(env, &symtab, &log, self.config.target_version);
            let gen = Gen::new(env, &symtab, &log, &self.config);
            for class in env.classes.iter().filter(|c| !c.duplicate) {
                checker.check(class);
                if let Some(bytes) = gen.gen_def_class(class) {
                    outputs.push((class.name.clone(), bytes, env.file.clone()));
                }
            }
            if !env.suppresses_unused() {
                for import in env.unused_imports() {
                    log.warning(&env.file, import.span, format!("import {} is never used", import.name));
                }
            }
        }
        let error_count = log.error_count();
        drop(envs);
        if error_count > 0 {
            log::info!("tolc: {} error(s)", error_count);
            return false;
        }

        // Write
        for (name, bytes, source) in outputs {
            if let Err(error) = write_class(file_manager, &name, &bytes, source.as_ref()) {
                diagnostics.report(Diagnostic::error(
                    Some(source),
                    None,
                    None,
                    format!("error while writing {}: {}", name, error),
                ));
                return false;
            }
        }
        log::info!("tolc: compilation finished");
        true
    }
}

fn write_class(file_manager: &dyn FileManager, name: &str, bytes: &[u8], sibling: &dyn FileObject) -> std::io::Result<()> {
    let mut output = file_manager.output_for_class(Location::ClassOutput, name, Kind::Class, Some(sibling))?;
    output.write_all(bytes)?;
    output.close()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SourceFile;

    fn unit(name: &str, text: &str) -> Arc<dyn FileObject> {
        Arc::new(SourceFile::new(name, text))
    }

    #[test]
    fn test_parse_error_is_reported_as_diagnostic() {
        let compiler = Tolc::default();
        let fm = compiler.standard_file_manager();
        let diagnostics = DiagnosticCollector::new();
        let ok = compiler.compile(&[unit("demo.Bad", "package demo; class Bad { int f( }")], fm.as_ref(), &diagnostics);
        assert!(!ok);
        let errors = diagnostics.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].line, Some(1));
    }

    #[test]
    fn test_output_without_class_output_location_fails() {
        let compiler = Tolc::default();
        let fm = compiler.standard_file_manager();
        let diagnostics = DiagnosticCollector::new();
        let ok = compiler.compile(&[unit("demo.Ok", "package demo; public class Ok { }")], fm.as_ref(), &diagnostics);
        assert!(!ok);
        assert!(diagnostics.errors()[0].message.starts_with("error while writing demo.Ok"));
    }

    #[test]
    fn test_unused_import_warning() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = Tolc::default();
        let fm = StandardFileManager::new(ClassPath::new()).with_output_dir(dir.path());
        let diagnostics = DiagnosticCollector::new();
        let ok = compiler.compile(
            &[unit("demo.Imp", "package demo; import java.io.IOException; public class Imp { }")],
            &fm,
            &diagnostics,
        );
        assert!(ok);
        let all = diagnostics.diagnostics();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].message, "import java.io.IOException is never used");
        assert!(dir.path().join("demo/Imp.class").exists());
    }
}
