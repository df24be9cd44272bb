use crate::demo::{run_demo, run_sweep, DemoArgs, SweepArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use sampurasun::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Sampurasun",
    about = "Run the tourism reporting compliance service or exercise it from the command line",
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
    /// Run one compliance sweep and print its outcome
    Sweep(SweepArgs),
    /// Seed a sample region and print the dashboard, trend, export and sweep results
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Load the sample region into the in-memory store before serving
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Sweep(args) => run_sweep(args).await,
        Command::Demo(args) => run_demo(args),
    }
}
