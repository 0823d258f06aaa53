//! New command implementation for the hotbed CLI.

use std::fs;
use std::path::{Path, PathBuf};

use hotbed_core::HostDirs;

use crate::colors;

/// Create a new extension from template in `<base>/extensions`.
pub fn execute(name: &str, base_dir: &Path) -> anyhow::Result<()> {
    let stem = name.trim_end_matches(".rs");
    let allowed = |c: char| c.is_alphanumeric() || c == '_' || c == '-';
    if stem.is_empty() || !stem.chars().all(allowed) {
        anyhow::bail!("Invalid extension name: {name:?}");
    }

    let dirs = HostDirs::from_base_dir(base_dir)?;
    let path = extension_path(&dirs, stem);
    if path.exists() {
        anyhow::bail!("File {} already exists", path.display());
    }

    fs::write(&path, template(stem))?;
    println!(
        "{}Created{} new extension: {}",
        colors::GREEN,
        colors::RESET,
        path.display()
    );

    Ok(())
}

fn extension_path(dirs: &HostDirs, stem: &str) -> PathBuf {
    dirs.extensions_dir.join(format!("{stem}.rs"))
}

/// `hello-world` → `HelloWorld`.
fn type_name(stem: &str) -> String {
    stem.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

fn template(stem: &str) -> String {
    let ty = type_name(stem);
    format!(
        r#"//! # {ty}
//!
//! A hotbed extension. Save the file and the host recompiles it.
//
// Dependencies:

use hotbed_sdk::prelude::*;

#[derive(Default)]
pub struct {ty} {{
    greeting: String,
}}

impl Extension for {ty} {{
    fn name(&self) -> &str {{
        "{ty}"
    }}

    fn version(&self) -> &str {{
        "0.1.0"
    }}

    fn description(&self) -> &str {{
        "Describe what {ty} does"
    }}

    fn prepare(&mut self, logger: &Logger) -> Result<(), ExtensionError> {{
        self.greeting = "Hello from {ty}!".to_string();
        logger.info("prepared");
        Ok(())
    }}

    fn execute(&mut self, logger: &Logger) -> Result<(), ExtensionError> {{
        logger.info(&self.greeting);
        Ok(())
    }}

    fn menu_items(&self) -> Vec<MenuItem> {{
        vec![MenuItem::new("{ty}")]
    }}
}}

hotbed_sdk::export_extensions!({ty});
"#
    )
}
