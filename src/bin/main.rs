use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tolc_synth::common::{ClassPath, ClasspathResolver, Config};
use tolc_synth::parser::parse_java;
use tolc_synth::rt::{ClassLoader, HostClassLoader};
use tolc_synth::tools::{DiagnosticCollector, FileObject, JavaCompiler, SourceFile, StandardFileManager, Tolc};

#[derive(Parser)]
#[command(name = "tolc-synth")]
#[command(about = "In-process compiler for generated Java adapters")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile .java files to .class files
    Compile {
        /// Input .java files
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

        /// Output directory for .class files
        #[arg(short = 'd', value_name = "DIR", default_value = ".")]
        output: PathBuf,

        #[arg(long = "cp", value_name = "PATH")]
        cp: Option<String>,

        #[arg(long = "classpath", value_name = "PATH")]
        classpath: Option<String>,

        /// Target Java release
        #[arg(long, value_name = "RELEASE")]
        target: Option<u8>,

        /// Suppress warnings
        #[arg(long)]
        nowarn: bool,
    },

    /// Show the public methods of a class
    Inspect {
        /// Binary name, e.g. demo.Greeter
        #[arg(value_name = "CLASS")]
        class_name: String,

        #[arg(long = "cp", value_name = "PATH")]
        cp: Option<String>,

        #[arg(long = "classpath", value_name = "PATH")]
        classpath: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match &cli.command {
        Commands::Compile { inputs, output, cp, classpath, target, nowarn } => {
            let mut config = Config::from_env()?.with_warnings(!nowarn);
            if let Some(target) = target {
                config = config.with_target_java_version(*target);
            }
            let class_path = resolve_class_path(classpath.as_deref(), cp.as_deref());
            compile_files(inputs, output, class_path, config)?;
        }
        Commands::Inspect { class_name, cp, classpath } => {
            inspect_class(class_name, resolve_class_path(classpath.as_deref(), cp.as_deref()))?;
        }
    }

    Ok(())
}

fn resolve_class_path(classpath: Option<&str>, cp: Option<&str>) -> ClassPath {
    let resolved = ClasspathResolver::resolve_classpath_with_tolc_fallback(classpath, cp);
    log::info!("class path: {}", resolved);
    ClassPath::from_class_path_string(&resolved)
}

fn compile_files(inputs: &[PathBuf], output: &Path, class_path: ClassPath, config: Config) -> Result<()> {
    let mut units: Vec<Arc<dyn FileObject>> = Vec::with_capacity(inputs.len());
    for input in inputs {
        let text = fs::read_to_string(input).with_context(|| format!("cannot read {}", input.display()))?;
        let class_name = declared_class_name(input, &text);
        log::info!("compiling {} as {}", input.display(), class_name);
        units.push(Arc::new(SourceFile::new(class_name, text)));
    }

    if !output.exists() {
        fs::create_dir_all(output).with_context(|| format!("cannot create {}", output.display()))?;
    }
    let compiler = Tolc::new(config).with_class_path(class_path.clone());
    let file_manager = StandardFileManager::new(class_path).with_output_dir(output);
    let diagnostics = DiagnosticCollector::new();
    let succeeded = compiler.compile(&units, &file_manager, &diagnostics);

    for diagnostic in diagnostics.diagnostics() {
        eprintln!("{}", diagnostic);
    }
    let errors = diagnostics.error_count();
    if !succeeded || errors > 0 {
        bail!("{} error(s)", errors);
    }
    println!("Compiled {} file(s) into {}", inputs.len(), output.display());
    Ok(())
}

/// Binary name of the first type in `text`; the file stem when it does not parse
fn declared_class_name(path: &Path, text: &str) -> String {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    match parse_java(text) {
        Ok(unit) => {
            let simple = unit
                .type_decls
                .iter()
                .find(|decl| decl.name == stem)
                .or_else(|| unit.type_decls.first())
                .map(|decl| decl.name.clone())
                .unwrap_or(stem);
            unit.binary_name_of(&simple)
        }
        Err(_) => stem,
    }
}

fn inspect_class(class_name: &str, class_path: ClassPath) -> Result<()> {
    let loader = HostClassLoader::new(class_path);
    let class = loader.load_class(class_name).with_context(|| format!("cannot load {}", class_name))?;
    let meta = class.reflect();

    println!("{} {}", if meta.is_interface { "interface" } else { "class" }, meta.source_name());
    for method in &meta.methods {
        let mut modifiers = vec!["public"];
        if method.is_static {
            modifiers.push("static");
        } else if method.is_default {
            modifiers.push("default");
        } else if method.is_abstract {
            modifiers.push("abstract");
        }
        let throws = if method.exception_types.is_empty() {
            String::new()
        } else {
            format!(" throws {}", method.exception_types.join(", "))
        };
        println!("  {} {} {}{}", modifiers.join(" "), method.return_type.source_name(), method.signature(), throws);
    }
    Ok(())
}
