//! hotbed CLI - hot-pluggable extension host.

mod check;
mod colors;
mod new;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "hotbed")]
#[command(about = "Hot-pluggable extension host: drop a .rs file in, watch it run")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the extensions directory and hot-load every source file
    Run {
        /// Base directory holding `extensions/` and `.hotbed/`
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,

        /// Quiet period before a changed file is compiled, in milliseconds
        #[arg(long, default_value = "500")]
        settle_ms: u64,

        /// Directory searched for compiled libraries named in dependency headers
        #[arg(long = "lib-dir")]
        lib_dirs: Vec<PathBuf>,

        /// Reject extensions that compile with warnings
        #[arg(long)]
        warnings_as_errors: bool,
    },

    /// Compile one extension source and report diagnostics
    Check {
        /// Path to the extension (.rs file)
        file: PathBuf,

        /// Directory searched for compiled libraries named in dependency headers
        #[arg(long = "lib-dir")]
        lib_dirs: Vec<PathBuf>,

        /// Treat warnings as errors
        #[arg(long)]
        warnings_as_errors: bool,
    },

    /// Create a new extension from template
    New {
        /// Name of the extension (without .rs extension)
        name: String,

        /// Base directory holding `extensions/`
        #[arg(long, default_value = ".")]
        base_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::WARN.into())
            .add_directive("hotbed_core=info".parse::<tracing_subscriber::filter::Directive>()?)
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Helper to format hotbed-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(hotbed_err) = err.downcast_ref::<hotbed_core::Error>() {
            anyhow::anyhow!("{}", hotbed_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            base_dir,
            settle_ms,
            lib_dirs,
            warnings_as_errors,
        } => {
            let options = run::RunOptions {
                base_dir,
                settle_ms,
                lib_dirs,
                warnings_as_errors,
            };
            run::execute(options).await.map_err(format_error)?;
        }

        Commands::Check {
            file,
            lib_dirs,
            warnings_as_errors,
        } => {
            check::execute(&file, lib_dirs, warnings_as_errors).map_err(format_error)?;
        }

        Commands::New { name, base_dir } => {
            new::execute(&name, &base_dir).map_err(format_error)?;
        }
    }

    Ok(())
}
