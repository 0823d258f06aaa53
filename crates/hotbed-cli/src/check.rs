//! Check command implementation for the hotbed CLI.
//!
//! Compiles one extension source exactly as the host would, without
//! loading it, and prints the diagnostics.

use std::fs;
use std::path::{Path, PathBuf};

use hotbed_core::compile::{
    CompilationResult, CompilationUnit, Compiler, CompilerConfig, ReferenceResolver,
    RustcCompiler, ToolchainManager, parse_dependency_header,
};
use hotbed_core::render_diagnostics;
use hotbed_core::watch::read_source;

use crate::colors;

/// Execute the check command.
pub fn execute(
    file: &Path,
    lib_dirs: Vec<PathBuf>,
    warnings_as_errors: bool,
) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("Extension source not found: {}", file.display());
    }

    let source = read_source(file)?;
    let file_name = source.file_name();

    let build_dir = std::env::temp_dir().join("hotbed-check");
    fs::create_dir_all(&build_dir)?;
    let config = CompilerConfig {
        build_dir,
        warnings_as_errors,
        ..CompilerConfig::development()
    };
    let compiler = RustcCompiler::new(config, ToolchainManager::new()?);

    let search_dirs = if lib_dirs.is_empty() {
        ReferenceResolver::default_search_dirs()
    } else {
        lib_dirs
    };
    let references =
        ReferenceResolver::new(search_dirs).resolve(&parse_dependency_header(&source.text));

    println!(
        "\n{}Checking{} {}{}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        file_name,
        colors::RESET
    );
    for name in &references.unresolved {
        println!(
            "{}warning:{} no compiled library found for `{}`",
            colors::YELLOW,
            colors::RESET,
            name
        );
    }

    let unit = CompilationUnit::new(&file_name, &source.text);
    match compiler.compile(&unit, &references) {
        CompilationResult::Success(module) => {
            // The artifact is never loaded.
            let _ = fs::remove_file(&module.path);
            println!(
                "{}OK{} compiled in {}ms",
                colors::GREEN,
                colors::RESET,
                module.compile_time_ms
            );
            Ok(())
        }
        CompilationResult::Failure(diagnostics) => {
            print!("{}", render_diagnostics(&file_name, &diagnostics));
            colors::flush_stdout();
            anyhow::bail!(
                "{} failed to compile ({} error(s))",
                file_name,
                diagnostics.len()
            )
        }
    }
}
