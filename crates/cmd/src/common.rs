use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use codelist::{
    CodelistConfig, CodelistDefinition, OutputFormat, ProductType, ResultSource, ResultTable,
    builtin_config, load_config, render,
};
use diagnostics::*;

/// Configuration every command works from
pub struct CodelistContext {
    pub config: CodelistConfig,
}

impl CodelistContext {
    /// Load `config_path`, or the built-in definitions when none is given.
    /// `cache_dir` overrides the configured cache directory.
    pub fn load(config_path: Option<&Path>, cache_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => {
                let file = path.display().to_string();
                debug!("Loading configuration from {file}");
                load_config(path)?
            }
            None => {
                debug!("Using built-in codelist definitions");
                builtin_config()?
            }
        };

        if let Some(dir) = cache_dir {
            config.cache_dir = dir;
        }

        Ok(Self::from_config(config))
    }

    pub fn from_config(config: CodelistConfig) -> Self {
        Self { config }
    }

    pub fn find(&self, name: &str) -> Result<&CodelistDefinition> {
        self.config
            .select(&[name])?
            .into_iter()
            .next()
            .with_context(|| format!("Unknown codelist {name}"))
    }

    /// Definitions named on the command line, or all of them with `--all`
    pub fn select(&self, names: &[String], all: bool) -> Result<Vec<&CodelistDefinition>> {
        match (all, names.is_empty()) {
            (true, true) => Ok(self.config.codelists.iter().collect()),
            (true, false) => bail!("Pass codelist names or --all, not both"),
            (false, true) => bail!(
                "No codelist named; pass one of {} or --all",
                self.config.names().join(", ")
            ),
            (false, false) => self.config.select(names),
        }
    }

    pub fn cache_path(&self, definition: &CodelistDefinition) -> PathBuf {
        self.config.cache_path(definition)
    }
}

/// Write one codelist in the requested format.
///
/// Table output gets a heading line; CSV is written bare so it can be
/// redirected to a file. `none` prints only the summary line.
pub fn write_codelist(
    out: &mut dyn Write,
    definition: &CodelistDefinition,
    table: &ResultTable,
    source: ResultSource,
    format: OutputFormat,
) -> Result<()> {
    let summary = format!(
        "{}: {} rows ({} vmp, {} amp) from {}",
        definition.name,
        table.len(),
        table.count(ProductType::Vmp),
        table.count(ProductType::Amp),
        source
    );

    match format {
        OutputFormat::Table => {
            writeln!(out, "{summary}")?;
            if let Some(title) = &definition.title {
                writeln!(out, "{title}")?;
            }
            out.write_all(render(table, format)?.as_bytes())?;
        }
        OutputFormat::Csv => out.write_all(render(table, format)?.as_bytes())?,
        OutputFormat::None => writeln!(out, "{summary}")?,
    }
    Ok(())
}

/// Local time in the same layout as the cache listing
pub fn format_modified(time: SystemTime) -> String {
    let local: chrono::DateTime<chrono::Local> = time.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}
