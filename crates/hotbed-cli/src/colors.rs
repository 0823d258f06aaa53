//! ANSI escape codes for terminal output.

use std::io::Write;

pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const RED: &str = "\x1b[31m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const CYAN: &str = "\x1b[36m";
pub const RESET: &str = "\x1b[0m";

/// Flush stdout, ignoring errors (e.g. a closed pipe).
pub fn flush_stdout() {
    let _ = std::io::stdout().flush();
}
