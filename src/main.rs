use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use tariffboard::cli::setup::{setup, setup_at_path};
use tariffboard::cli::show::{ShowOptions, View};
use tariffboard::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct ViewArgs {
    /// Which view to render
    #[arg(value_enum, default_value_t = View::Countries)]
    view: View,

    /// Case-insensitive filter over names and codes
    #[arg(short, long)]
    query: Option<String>,

    /// Field to sort by, e.g. effective_tariff
    #[arg(short, long)]
    sort: Option<String>,

    /// Sort ascending instead of descending
    #[arg(long, requires = "sort")]
    asc: bool,

    /// Page to show, starting at 1
    #[arg(short, long, default_value_t = 1)]
    page: usize,

    /// Ask the service to recompute before loading
    #[arg(short, long)]
    refresh: bool,

    /// Country or industry code to show details for. Codes apply in order as
    /// toggles, so repeating the selected code clears it again
    #[arg(long = "select")]
    select: Vec<String>,
}

impl From<ViewArgs> for ShowOptions {
    fn from(args: ViewArgs) -> ShowOptions {
        ShowOptions {
            view: args.view,
            query: args.query,
            sort: args.sort,
            ascending: args.asc,
            page: args.page,
            refresh: args.refresh,
            select: args.select,
        }
    }
}

impl From<Commands> for tariffboard::AppCommand {
    fn from(cmd: Commands) -> tariffboard::AppCommand {
        match cmd {
            Commands::Show(args) => tariffboard::AppCommand::Show(args.into()),
            Commands::Update { wait } => tariffboard::AppCommand::Update { wait },
            Commands::Watch(args) => tariffboard::AppCommand::Watch(args.into()),
            Commands::Status => tariffboard::AppCommand::Status,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Load the dashboard and print one view
    Show(ViewArgs),
    /// Trigger a server-side data update
    Update {
        /// Wait for the delayed re-fetch and report what it loaded
        #[arg(short, long)]
        wait: bool,
    },
    /// Poll the dashboard and re-render a view until Ctrl-C
    Watch(ViewArgs),
    /// Check the dashboard service health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => setup_at_path(path),
            None => setup(),
        },
        Some(cmd) => tariffboard::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
