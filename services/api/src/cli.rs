use crate::flow::{run_flow, FlowArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use orryin::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "orryin-api",
    about = "Serve the Orryin onboarding backend or exercise it from the command line",
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
    /// Run the full onboarding flow once against the configured providers
    Flow(FlowArgs),
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
        Command::Flow(args) => run_flow(args).await,
    }
}
