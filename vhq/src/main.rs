use anyhow::Result;
use clap::Parser;
use tracing::debug;
use vhq::cli::{Cli, Commands};
use vhq::{commands, config, AppContext};
use vhq_core::storage::ProjectStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Values from .env feed the `env` fallbacks of the CLI options.
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    config::init_tracing(cli.verbose, cli.quiet);

    let store_config = config::store_config(&cli);
    debug!("Using projects root {}", store_config.projects_root.display());
    let cx = AppContext::new(ProjectStore::new(store_config));

    match cli.command {
        Commands::Projects(args) => commands::handle_projects(args, &cx).await?,
        Commands::Tree(args) => commands::handle_tree(args, &cx).await?,
        Commands::CreateFile(args) => commands::handle_create_file(args, &cx).await?,
        Commands::CreateFolder(args) => commands::handle_create_folder(args, &cx).await?,
        Commands::Write(args) => commands::handle_write(args, &cx).await?,
        Commands::Cat(args) => commands::handle_cat(args, &cx).await?,
        Commands::Rename(args) => commands::handle_rename(args, &cx).await?,
        Commands::Mv(args) => commands::handle_move(args, &cx).await?,
        Commands::Rm(args) => commands::handle_remove(args, &cx).await?,
        Commands::Import(args) => commands::handle_import(args, &cx).await?,
        Commands::Request(args) => commands::handle_request(args, &cx).await?,
    }

    Ok(())
}
