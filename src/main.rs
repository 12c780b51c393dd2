use anyhow::Result;
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::Instrument;
use xrates::core::log::init_logging;

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

impl From<Commands> for xrates::AppCommand {
    fn from(cmd: Commands) -> xrates::AppCommand {
        match cmd {
            Commands::Update {
                date,
                providers,
                exclude_providers,
            } => xrates::AppCommand::Update {
                date,
                providers,
                exclude_providers,
            },
            Commands::UpdateAll { origin_date } => xrates::AppCommand::UpdateAll { origin_date },
            Commands::Rate { from, to, date } => xrates::AppCommand::Rate { from, to, date },
            Commands::Average {
                from,
                to,
                start_date,
                end_date,
            } => xrates::AppCommand::Average {
                from,
                to,
                start_date,
                end_date,
            },
            Commands::Intervals { from, to, date } => {
                xrates::AppCommand::Intervals { from, to, date }
            }
            Commands::Serve { host, port } => xrates::AppCommand::Serve { host, port },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Fetch and store the rates of one day
    Update {
        /// Day to update, defaults to today (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only update these providers
        #[arg(long, value_delimiter = ',')]
        providers: Vec<String>,
        /// Skip these providers
        #[arg(long, value_delimiter = ',')]
        exclude_providers: Vec<String>,
    },
    /// Back-fill historical rates of every provider
    UpdateAll {
        #[arg(long, default_value = "2015-01-01")]
        origin_date: NaiveDate,
    },
    /// Display the exchange rate of a day
    Rate {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Display the average exchange rate of a period
    Average {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        start_date: NaiveDate,
        #[arg(long)]
        end_date: NaiveDate,
    },
    /// Display daily, weekly and monthly exchange rates
    Intervals {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Serve the HTTP query API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let span = tracing::info_span!("command", flow_id = %uuid::Uuid::new_v4());
    let result = match cli.command {
        Some(Commands::Setup) => span.in_scope(xrates::cli::setup::setup),
        Some(cmd) => {
            xrates::run_command(cmd.into(), cli.config_path.as_deref())
                .instrument(span)
                .await
        }
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
