use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use codelist::create_example_config;

/// Write the example configuration to `path`
pub fn init_command(path: &Path, out: &mut dyn Write) -> Result<()> {
    create_example_config(path)
        .with_context(|| format!("Failed to create configuration file: {}", path.display()))?;

    writeln!(out, "Created example configuration file: {}", path.display())?;
    writeln!(out, "Edit warehouse.project and the codelists, then run:")?;
    writeln!(out, "  codelist --config {} build --all", path.display())?;
    Ok(())
}
