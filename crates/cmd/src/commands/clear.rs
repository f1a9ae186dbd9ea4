use std::io::Write;

use anyhow::{Context, Result};
use codelist::cache;

use crate::common::CodelistContext;

/// Delete cache files so the next build queries the warehouse again.
pub fn clear_command(
    ctx: &CodelistContext,
    names: &[String],
    all: bool,
    out: &mut dyn Write,
) -> Result<()> {
    for definition in ctx.select(names, all)? {
        let path = ctx.cache_path(definition);
        let file = path.display().to_string();

        let removed = cache::remove_cache(&path)
            .with_context(|| format!("Failed to remove {file}"))?;

        if removed {
            writeln!(out, "{}: removed {file}", definition.name)?;
        } else {
            writeln!(out, "{}: not cached", definition.name)?;
        }
    }
    Ok(())
}
