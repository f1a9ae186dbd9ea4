use std::io::Write;

use anyhow::Result;

use crate::common::CodelistContext;

pub fn sql_command(ctx: &CodelistContext, name: &str, out: &mut dyn Write) -> Result<()> {
    let definition = ctx.find(name)?;
    let query = definition.query(&ctx.config.sources)?;
    writeln!(out, "{}", query.as_str().trim_end())?;
    Ok(())
}
