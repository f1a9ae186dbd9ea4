use std::io::{ErrorKind, Write};
use std::path::Path;

use anyhow::Result;
use codelist::cache;

use crate::common::{CodelistContext, format_modified};

/// One line per codelist: name, cache status, title.
pub fn list_command(ctx: &CodelistContext, out: &mut dyn Write) -> Result<()> {
    let width = ctx
        .config
        .codelists
        .iter()
        .map(|c| c.name.len())
        .max()
        .unwrap_or(0);

    for definition in &ctx.config.codelists {
        let status = cache_status(&ctx.cache_path(definition));
        let title = definition.title.as_deref().unwrap_or("");
        writeln!(out, "{:<width$}  {status}  {title}", definition.name)?;
    }

    Ok(())
}

// Unreadable cache files are reported, not treated as errors.
fn cache_status(path: &Path) -> String {
    let modified = match std::fs::metadata(path) {
        Ok(meta) => meta
            .modified()
            .map(format_modified)
            .unwrap_or_else(|_| "unknown time".to_string()),
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
            return "missing".to_string();
        }
        Err(e) => return format!("unreadable ({e})"),
    };

    match cache::read_cache(path) {
        Ok(table) => format!("cached, {} rows, {modified}", table.len()),
        Err(e) => format!("unreadable ({e})"),
    }
}
