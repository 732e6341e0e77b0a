use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpDutiesApi, LoadOutcome};
use shared::domain::DutyId;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod console;
mod render;
mod shell;

use config::load_settings;
use console::{start_url, Console, ConsoleNotifier};

/// Upper bound for waiting on a page when requests have no timeout of their own.
const UNBOUNDED_SETTLE: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(name = "duties", version, about = "Page through and edit the duty list")]
struct Args {
    /// Config file. Defaults to ./duties.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Base URL of the duties API, e.g. http://localhost:3000/api/
    #[arg(long)]
    server_url: Option<String>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    page: Option<u32>,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    page_size: Option<u32>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one page of duties (default).
    List,
    Create {
        name: String,
    },
    Rename {
        id: DutyId,
        name: String,
    },
    Delete {
        id: DutyId,
    },
    /// Interactive pager with history navigation.
    Shell,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(url) = args.server_url {
        settings.api_base_url = url;
    }

    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let base_url = settings.base_url()?;
    let api = match settings.request_timeout() {
        Some(timeout) => HttpDutiesApi::with_timeout(base_url, timeout)
            .context("failed to build http client")?,
        None => HttpDutiesApi::new(base_url),
    };
    info!(base_url = %api.base_url(), "duties console starting");

    let settle_timeout = settings
        .request_timeout()
        .map_or(UNBOUNDED_SETTLE, |timeout| timeout + Duration::from_secs(1));
    let console = Console::new(
        Arc::new(api),
        start_url(args.page, args.page_size)?,
        Arc::new(ConsoleNotifier),
        settle_timeout,
    );

    match args.command.unwrap_or(Command::List) {
        Command::List => {
            if console.load_current().await == LoadOutcome::Failed {
                bail!("failed to load duties");
            }
            println!("{}", console.render());
        }
        Command::Create { name } => {
            let duty = console.create(&name).await?;
            println!("{}  {}", duty.id, duty.name);
        }
        Command::Rename { id, name } => {
            let duty = console.rename(id, &name).await?;
            println!("{}  {}", duty.id, duty.name);
        }
        Command::Delete { id } => {
            console.delete(id).await?;
        }
        Command::Shell => {
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            console.run_shell(stdin).await?;
        }
    }

    Ok(())
}
