use std::io::Write;

use anyhow::{Context, Result};
use codelist::{CachedQueryRunner, OutputFormat, Warehouse};
use diagnostics::*;

use crate::common::{CodelistContext, write_codelist};

/// Build the selected codelists, from cache where possible.
///
/// Codelists run in order and the first failure stops the command. Rows
/// that could not be cached are still printed.
pub fn build_command<W: Warehouse>(
    ctx: &CodelistContext,
    runner: &CachedQueryRunner<W>,
    names: &[String],
    all: bool,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let selected = ctx.select(names, all)?;

    for definition in selected {
        let name = definition.name.as_str();
        let query = definition.query(&ctx.config.sources)?;
        let path = ctx.cache_path(definition);

        let outcome = runner
            .run(&query, &path)
            .with_context(|| format!("Failed to build codelist {name}"))?;

        if let Some(e) = &outcome.cache_error {
            let reason = e.to_string();
            warn!("Codelist {name} was built but not cached: {reason}");
        }

        write_codelist(out, definition, &outcome.table, outcome.source, format)?;
    }

    Ok(())
}
