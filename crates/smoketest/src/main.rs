//! Smoketest binary: drives the organizer against the in-memory host and
//! fails loudly when any scenario diverges.

use clap::{Parser, Subcommand};

mod cases;
mod error;

use error::Result;

#[derive(Parser, Debug)]
#[command(name = "smoketest", about = "Tabtidy smoketest tool", version)]
struct Cli {
    #[command(flatten)]
    logs: logging::LogArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Converge a window of mixed locators to reversed-domain order
    Sort,
    /// Form titled, colored groups from threshold-sized clusters
    Groups,
    /// Repair pre-existing wrong grouping state
    Repair,
    /// Collapse idle groups as activations roll through
    Collapse,
    /// Keep a window converged through a stream of tab events
    Churn,
    /// Organize two windows independently
    Windows,
    /// Run every scenario
    All,
}

/// Every scenario, in run order.
const ALL: &[&str] = &["sort", "groups", "repair", "collapse", "churn", "windows"];

async fn run_case(name: &str) -> Result<()> {
    match name {
        "sort" => cases::sort().await,
        "groups" => cases::groups().await,
        "repair" => cases::repair().await,
        "collapse" => cases::collapse().await,
        "churn" => cases::churn().await,
        "windows" => cases::windows().await,
        other => Err(error::Error::Check(format!("unknown case {other}"))),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(logging::env_filter_from_spec(&cli.logs.spec()))
        .init();

    let names: &[&str] = match cli.command {
        Commands::Sort => &["sort"],
        Commands::Groups => &["groups"],
        Commands::Repair => &["repair"],
        Commands::Collapse => &["collapse"],
        Commands::Churn => &["churn"],
        Commands::Windows => &["windows"],
        Commands::All => ALL,
    };

    let mut failed = 0usize;
    for name in names {
        match run_case(name).await {
            Ok(()) => println!("PASS {name}"),
            Err(e) => {
                failed += 1;
                println!("FAIL {name}: {e}");
            }
        }
    }
    if failed > 0 {
        std::process::exit(1);
    }
}
