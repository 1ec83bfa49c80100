use crate::demo::{
    run_catalog_check, run_demo, run_scope, CatalogCheckArgs, DemoArgs, ScopeArgs,
};
use crate::server;
use clap::{Args, Parser, Subcommand};
use claim_scope::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "claim-scope",
    about = "Scope and validate insurance line items for damaged zones",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Scope and validate the zone(s) described in a JSON file
    Scope(ScopeArgs),
    /// Inspect scope rule catalogs
    Catalog {
        #[command(subcommand)]
        command: CatalogCommand,
    },
    /// Assess the built-in kitchen and roof reference zones
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Load a catalog export and report whether it compiles
    Check(CatalogCheckArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Scope(args) => run_scope(args),
        Command::Catalog {
            command: CatalogCommand::Check(args),
        } => run_catalog_check(args),
        Command::Demo(args) => run_demo(args),
    }
}
