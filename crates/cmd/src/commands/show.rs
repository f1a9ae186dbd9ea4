use std::io::Write;

use anyhow::{Result, bail};
use codelist::{OutputFormat, ResultSource, cache};

use crate::common::{CodelistContext, write_codelist};

/// Print a codelist that has already been built. Never queries.
pub fn show_command(
    ctx: &CodelistContext,
    name: &str,
    format: OutputFormat,
    out: &mut dyn Write,
) -> Result<()> {
    let definition = ctx.find(name)?;
    let path = ctx.cache_path(definition);

    if !cache::cache_exists(&path)? {
        bail!(
            "Codelist {name} has not been built ({} is missing); run `codelist build {name}`",
            path.display()
        );
    }

    let table = cache::read_cache(&path)?;
    write_codelist(out, definition, &table, ResultSource::Cache, format)
}
