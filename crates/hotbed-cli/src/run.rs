//! Run command implementation for the hotbed CLI.
//!
//! Starts the host over `<base>/extensions` and keeps it running until
//! Ctrl+C, then prints the final state of every extension.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hotbed_core::{ExtensionHost, ExtensionRecord, HostConfig};

use crate::colors;

/// Options for `hotbed run`.
pub struct RunOptions {
    pub base_dir: PathBuf,
    pub settle_ms: u64,
    pub lib_dirs: Vec<PathBuf>,
    pub warnings_as_errors: bool,
}

/// Execute the run command.
pub async fn execute(options: RunOptions) -> anyhow::Result<()> {
    let mut config = HostConfig::from_base_dir(&options.base_dir)?;
    config.settle_delay = Duration::from_millis(options.settle_ms);
    config.lib_dirs = options.lib_dirs;
    config.compiler.warnings_as_errors = options.warnings_as_errors;

    let watcher = config.watcher()?;
    let extensions_dir = config.dirs.extensions_dir.clone();
    let host = Arc::new(ExtensionHost::new(config)?);

    println!(
        "\n{}hotbed{} - {}{}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        extensions_dir.display(),
        colors::RESET
    );
    println!("{}", "─".repeat(50));
    println!(
        "{}Watching for changes... (Ctrl+C to stop){}",
        colors::DIM,
        colors::RESET
    );
    colors::flush_stdout();

    tokio::select! {
        result = Arc::clone(&host).run(watcher) => result?,
        _ = tokio::signal::ctrl_c() => {
            println!("\n{}Shutting down...{}", colors::YELLOW, colors::RESET);
        }
    }

    host.shutdown();
    print_summary(&host.registry().snapshot());

    Ok(())
}

/// Print one line per extension record.
fn print_summary(records: &[ExtensionRecord]) {
    println!("\n{}Extensions:{}", colors::BOLD, colors::RESET);
    println!("{}", "─".repeat(50));

    if records.is_empty() {
        println!("{}No extensions loaded.{}", colors::DIM, colors::RESET);
        return;
    }

    for record in records {
        if record.is_loaded {
            println!(
                "{}✓{} {} {}v{}{} ({})",
                colors::GREEN,
                colors::RESET,
                record.name,
                colors::DIM,
                record.version,
                colors::RESET,
                record.file_name
            );
        } else {
            println!(
                "{}✗{} {} ({})",
                colors::RED,
                colors::RESET,
                record.name,
                record.file_name
            );
            for line in record.error_message.as_deref().unwrap_or_default().lines() {
                println!("    {}{}{}", colors::DIM, line, colors::RESET);
            }
        }
    }
}
