//! Compilation engine: turns an extension source into a dynamic library.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use super::diagnostics::{Diagnostic, UNCODED_DIAGNOSTIC_ID, parse_rustc_output};
use super::resolver::ReferenceSet;
use super::toolchain::ToolchainManager;
use super::types::{
    CompilationResult, CompilationUnit, CompiledModule, CompilerConfig, dylib_extension,
    dylib_prefix,
};

/// Something that can compile a unit against a set of references.
///
/// The host only talks to this trait so tests and embedders can swap the
/// `rustc` implementation out.
pub trait Compiler: Send + Sync {
    fn compile(&self, unit: &CompilationUnit, references: &ReferenceSet) -> CompilationResult;
}

/// Compiles extension sources with `rustc` into `cdylib`s.
pub struct RustcCompiler {
    /// Compiler configuration
    config: CompilerConfig,

    /// Toolchain manager
    toolchain: ToolchainManager,
}

impl RustcCompiler {
    /// Create a new compiler.
    pub fn new(config: CompilerConfig, toolchain: ToolchainManager) -> Self {
        Self { config, toolchain }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn toolchain(&self) -> &ToolchainManager {
        &self.toolchain
    }

    /// Build the rustc command line.
    fn command(
        &self,
        unit: &CompilationUnit,
        src_file: &Path,
        dylib_path: &Path,
        build_id: &str,
        references: &ReferenceSet,
    ) -> Command {
        let mut cmd = Command::new(self.toolchain.rustc_path());

        cmd.arg(src_file)
            .arg("--crate-type=cdylib")
            .arg("--crate-name")
            .arg(&unit.crate_name)
            .arg(format!("--edition={}", self.config.edition))
            .arg("--error-format=json")
            .arg("-o")
            .arg(dylib_path);

        // Distinct symbol hashes per build so two generations of the same
        // file can be loaded side by side.
        cmd.arg(format!("-Cmetadata={build_id}"));
        cmd.arg(format!("-Copt-level={}", self.config.opt_level));

        if self.config.debug_info {
            cmd.arg("-g");
        }

        if self.config.warnings_as_errors {
            cmd.arg("-D").arg("warnings");
        }

        for dir in &references.search_dirs {
            cmd.arg("-L").arg(format!("dependency={}", dir.display()));
        }

        for reference in &references.references {
            cmd.arg("--extern")
                .arg(format!("{}={}", reference.name, reference.path.display()));
        }

        for flag in &self.config.extra_rustc_flags {
            cmd.arg(flag);
        }

        cmd
    }

    fn compile_to_dylib(
        &self,
        unit: &CompilationUnit,
        references: &ReferenceSet,
    ) -> std::result::Result<PathBuf, Vec<Diagnostic>> {
        let src_dir = self.config.source_dir();
        fs::create_dir_all(&src_dir).map_err(|e| {
            vec![Diagnostic::error(
                UNCODED_DIAGNOSTIC_ID,
                format!("Failed to create build directory: {e}"),
            )]
        })?;

        let build_id = uuid::Uuid::new_v4().simple().to_string();
        let artifact = format!("{}_{}", unit.crate_name, &build_id[..12]);

        let src_file = src_dir.join(format!("{artifact}.rs"));
        fs::write(&src_file, &unit.source).map_err(|e| {
            vec![Diagnostic::error(
                UNCODED_DIAGNOSTIC_ID,
                format!("Failed to write source: {e}"),
            )]
        })?;

        let file_name = format!("{}{artifact}.{}", dylib_prefix(), dylib_extension());
        let dylib_path = self.config.build_dir.join(file_name);

        let output = self
            .command(unit, &src_file, &dylib_path, &build_id, references)
            .output();

        // Generated sources are only needed for the duration of the build.
        if let Err(e) = fs::remove_file(&src_file) {
            tracing::debug!("Failed to remove {}: {}", src_file.display(), e);
        }

        let output = output.map_err(|e| {
            vec![Diagnostic::error(
                UNCODED_DIAGNOSTIC_ID,
                format!("Failed to run rustc: {e}"),
            )]
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr);

        if output.status.success() {
            let warnings = parse_rustc_output(&stderr).len();
            if warnings > 0 {
                tracing::debug!("{} compiled with {} warning(s)", unit.file_name, warnings);
            }
            return Ok(dylib_path);
        }

        let errors: Vec<Diagnostic> = parse_rustc_output(&stderr)
            .into_iter()
            .filter(Diagnostic::is_error)
            .collect();

        if errors.is_empty() {
            // Fallback if JSON parsing failed
            let raw = stderr.trim();
            let message = if raw.is_empty() {
                format!("rustc exited with {}", output.status)
            } else {
                raw.to_string()
            };
            Err(vec![Diagnostic::error(UNCODED_DIAGNOSTIC_ID, message)])
        } else {
            Err(errors)
        }
    }
}

impl Compiler for RustcCompiler {
    fn compile(&self, unit: &CompilationUnit, references: &ReferenceSet) -> CompilationResult {
        let start = Instant::now();

        match self.compile_to_dylib(unit, references) {
            Ok(path) => {
                let compile_time_ms = start.elapsed().as_millis() as u64;
                tracing::info!("Compiled {} in {}ms", unit.file_name, compile_time_ms);

                CompilationResult::Success(CompiledModule {
                    name: unit.crate_name.clone(),
                    path,
                    compile_time_ms,
                })
            }
            Err(errors) => CompilationResult::Failure(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn compiler(temp: &TempDir) -> RustcCompiler {
        let config = CompilerConfig {
            build_dir: temp.path().join("build"),
            debug_info: false,
            ..CompilerConfig::development()
        };
        RustcCompiler::new(config, ToolchainManager::new().unwrap())
    }

    #[test]
    fn test_command_line() {
        let temp = TempDir::new().unwrap();
        let mut compiler = compiler(&temp);
        compiler.config.warnings_as_errors = true;

        let unit = CompilationUnit::new("a.rs", "");
        let references = ReferenceSet {
            references: vec![super::super::resolver::Reference {
                name: "hotbed_sdk".to_string(),
                path: PathBuf::from("/deps/libhotbed_sdk-abc.rlib"),
            }],
            search_dirs: vec![PathBuf::from("/deps")],
            unresolved: Vec::new(),
        };

        let cmd = compiler.command(
            &unit,
            Path::new("a.rs"),
            Path::new("liba.so"),
            "feed",
            &references,
        );
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--crate-type=cdylib".to_string()));
        assert!(args.contains(&"ext_a".to_string()));
        assert!(args.contains(&"-Cmetadata=feed".to_string()));
        assert!(args.contains(&"warnings".to_string()));
        assert!(args.contains(&"dependency=/deps".to_string()));
        assert!(args.contains(&"hotbed_sdk=/deps/libhotbed_sdk-abc.rlib".to_string()));
    }

    #[test]
    fn test_compile_success_produces_unique_dylibs() {
        let temp = TempDir::new().unwrap();
        let compiler = compiler(&temp);
        let unit = CompilationUnit::new("plain.rs", "pub fn answer() -> u32 { 42 }\n");

        let first = compiler.compile(&unit, &ReferenceSet::default());
        let second = compiler.compile(&unit, &ReferenceSet::default());

        let (Some(first), Some(second)) = (first.module(), second.module()) else {
            panic!("expected both compilations to succeed");
        };
        assert!(first.path.exists());
        assert!(second.path.exists());
        assert_ne!(first.path, second.path);
        assert_eq!(first.name, "ext_plain");
    }

    #[test]
    fn test_syntax_error_yields_diagnostics() {
        let temp = TempDir::new().unwrap();
        let compiler = compiler(&temp);
        let unit = CompilationUnit::new("broken.rs", "pub fn broken() {\n");

        let result = compiler.compile(&unit, &ReferenceSet::default());

        assert!(!result.is_success());
        let diagnostics = result.diagnostics();
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.iter().all(Diagnostic::is_error));
        assert_eq!(diagnostics[0].id, UNCODED_DIAGNOSTIC_ID);
        assert!(diagnostics[0].location.is_some());
    }

    #[test]
    fn test_coded_error_and_warnings_as_errors() {
        let temp = TempDir::new().unwrap();
        let mut compiler = compiler(&temp);

        let unit = CompilationUnit::new("typo.rs", "pub fn f() -> u32 { missing_value }\n");
        let result = compiler.compile(&unit, &ReferenceSet::default());
        assert_eq!(result.diagnostics()[0].id, "E0425");

        let unit = CompilationUnit::new("lint.rs", "pub fn f() { let unused = 1; }\n");
        let result = compiler.compile(&unit, &ReferenceSet::default());
        assert!(result.is_success());

        compiler.config.warnings_as_errors = true;
        let result = compiler.compile(&unit, &ReferenceSet::default());
        assert!(!result.is_success());
        assert_eq!(result.diagnostics()[0].id, "unused_variables");
    }
}
