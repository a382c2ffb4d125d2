//! letarette-sql: SQL document manager tool
//!
//! Validates a letarette-sql deployment against its database.
//!
//! ## Commands
//! - `check` (default): load configuration and templates, resolve the binding
//!   order and connect to the database
//! - `probe [LIMIT]`: as `check`, then run one change feed from the start of
//!   time and print the result as JSON
//!
//! ## Configuration
//! See `letarette_sql::config`; every key can be set as `LRSQL__SECTION__KEY`.
//! `--help` lists the variables and the drivers compiled into this build.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing::{error, info};

use letarette_sql::config::usage_rows;
use letarette_sql::handler::rows::from_nanos;
use letarette_sql::manager::ChannelDocumentManager;
use letarette_sql::protocol::ChangeFeedRequest;
use letarette_sql::utils::bootstrap::init_tracing;
use letarette_sql::{Adapter, AdapterError, Config, DriverRegistry, ErrorHandler};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// SQL document manager tool
#[derive(Parser, Debug)]
#[command(name = "letarette-sql")]
#[command(about = "Check a letarette-sql deployment against its database")]
#[command(version)]
struct Cli {
    /// YAML configuration file, layered over letarette-sql.yaml
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Load configuration and templates, then connect to the database
    Check,
    /// Run `check`, then print one change feed from the start of time as JSON
    Probe {
        /// Maximum number of updates to request
        #[arg(default_value_t = 10)]
        limit: u32,
    },
}

/// Configuration variables and supported drivers, shown after `--help`.
fn after_help(registry: &DriverRegistry) -> String {
    let mut help = String::from("Configuration environment variables:\n\n");
    let _ = writeln!(help, "  {:<32}{:<10}DEFAULT", "VARIABLE", "TYPE");
    for (key, kind, default) in usage_rows() {
        let _ = writeln!(help, "  {key:<32}{kind:<10}{default}");
    }
    let _ = write!(
        help,
        "\nSupported drivers: {}",
        registry.supported().join(", ")
    );
    help
}

fn parse_cli(registry: &DriverRegistry) -> Cli {
    let matches = Cli::command().after_help(after_help(registry)).get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let registry = DriverRegistry::with_builtin();
    let cli = parse_cli(&registry);
    let probe_limit = match cli.command.unwrap_or(Command::Check) {
        Command::Check => None,
        Command::Probe { limit } => Some(limit),
    };

    init_tracing();

    let config = Config::load(cli.config.as_deref())?;
    let manager = Arc::new(ChannelDocumentManager::new());
    let client = manager.client().with_timeout(PROBE_TIMEOUT);
    let error_handler: ErrorHandler = Arc::new(|err: &AdapterError| {
        error!(error = %err, request_scoped = err.is_request_scoped(), "Adapter error");
    });

    let adapter = Adapter::new(&config, &registry, manager, error_handler).await?;
    info!(
        space = %config.index.space,
        binding = %adapter.handler().templates().binding,
        "Configuration OK"
    );

    let outcome = match probe_limit {
        Some(limit) => client
            .request_changes(ChangeFeedRequest {
                space: config.index.space.clone(),
                after_document: String::new(),
                from_time: from_nanos(0),
                limit,
            })
            .await
            .map(Some),
        None => Ok(None),
    };

    adapter.close().await;

    if let Some(result) = outcome? {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}
