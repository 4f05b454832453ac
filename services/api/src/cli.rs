use crate::assess::{run_assess, AssessCommand};
use crate::demo::{run_demo, DemoArgs};
use crate::server;
use chemrisk::error::AppError;
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Chemical Risk Dashboard",
    about = "Serve and exercise the chemical risk assessment dashboard from the command line",
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
    /// Submit one assessment form, or a CSV batch of them, to the scoring service
    Assess {
        #[command(subcommand)]
        command: AssessCommand,
    },
    /// Walk through every assessment form against canned scoring replies
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
    /// Answer from canned scoring replies and accept any credentials
    #[arg(long)]
    pub(crate) offline: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Assess { command } => run_assess(command).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
