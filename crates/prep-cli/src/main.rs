//! Binary entrypoint for preprocessing runs and provenance operations.
use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod logging;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.json_logs);

    match cli.command {
        Commands::Run(args) => commands::run(args),
        Commands::Register(args) => commands::register(args),
        Commands::Upload(args) => commands::upload(args),
        Commands::Lookup { store, tag } => commands::lookup(store, &tag),
        Commands::History { store, artifact } => commands::history(store, &artifact),
        Commands::Verify { store, artifact } => commands::verify(store, &artifact),
        Commands::List { listing } => commands::list(listing),
        Commands::Download {
            listing,
            project,
            filename,
            output,
        } => commands::download(listing, &project, &filename, output.as_deref()),
    }
}
