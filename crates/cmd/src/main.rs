use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use cmd::commands::*;
use cmd::common::CodelistContext;
use codelist::{BigQueryClient, CachedQueryRunner, OutputFormat};
use diagnostics::init_diagnostics;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "codelist")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file (built-in definitions when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the cached CSV files, overriding the configuration
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List codelists and whether they are cached
    List,
    /// Print the SQL for a codelist
    Sql {
        /// Codelist name
        name: String,
    },
    /// Build codelists, querying the warehouse for any that are not cached
    Build(BuildArgs),
    /// Print a cached codelist without querying
    Show {
        /// Codelist name
        name: String,

        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
    /// Delete cached codelists
    Clear(SelectArgs),
    /// Create an example configuration file
    Init {
        #[arg(default_value = "codelists.yaml")]
        path: PathBuf,
    },
}

#[derive(Args)]
struct SelectArgs {
    /// Codelist names
    names: Vec<String>,

    /// Every configured codelist
    #[arg(long)]
    all: bool,
}

#[derive(Args)]
struct BuildArgs {
    #[command(flatten)]
    select: SelectArgs,

    /// table, csv or none
    #[arg(short, long, default_value = "table")]
    format: OutputFormat,
}

fn run(cli: Cli, out: &mut dyn Write) -> Result<()> {
    if let Commands::Init { path } = &cli.command {
        return init_command(path, out);
    }

    let ctx = CodelistContext::load(cli.config.as_deref(), cli.cache_dir)?;

    match cli.command {
        Commands::List => list_command(&ctx, out),
        Commands::Sql { name } => sql_command(&ctx, &name, out),
        Commands::Build(args) => {
            let client = BigQueryClient::new(ctx.config.warehouse.clone())?;
            let runner = CachedQueryRunner::new(client);
            build_command(
                &ctx,
                &runner,
                &args.select.names,
                args.select.all,
                args.format,
                out,
            )
        }
        Commands::Show { name, format } => show_command(&ctx, &name, format, out),
        Commands::Clear(args) => clear_command(&ctx, &args.names, args.all, out),
        Commands::Init { .. } => Ok(()),
    }
}

fn main() -> Result<()> {
    init_diagnostics();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = run(cli, &mut out);
    out.flush()?;
    result
}
