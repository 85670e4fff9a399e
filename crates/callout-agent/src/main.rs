use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use callout_agent::config::AgentConfig;
use callout_agent::directory::{AssignmentsDirectory, Directory};
use callout_agent::ingest::{Ingestor, WebhookEvent};
use callout_agent::provider::RetellClient;
use callout_agent::store::{JsonSheet, RowCodec, RowStore};
use callout_agent::{setup, Scheduler, TickLock};
use clap::{Parser, Subcommand};
use coordination::phone;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "callout-agent", version, about = "Outbound call escalation for emergency records")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON logs and JSON command output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Process every record once
    Tick,
    /// Tick on the configured interval until Ctrl-C
    Run,
    /// Write header names and initialize automation cells
    Setup,
    /// Append a record from a call_analyzed event (file or stdin)
    Ingest { file: Option<PathBuf> },
    /// Show escalation state of the most recent records
    Inspect {
        #[arg(long, default_value_t = 20)]
        rows: usize,
    },
    /// Print the dialable form of phone numbers
    Normalize {
        #[arg(required = true)]
        numbers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json);

    if let Command::Normalize { numbers } = &cli.command {
        for number in numbers {
            println!("{number}\t{}", phone::normalize(number));
        }
        return Ok(());
    }

    let config = AgentConfig::load(cli.config.as_deref())?;
    let store: Arc<dyn RowStore> = Arc::new(JsonSheet::new(&config.store.sheet));
    let codec = RowCodec::new(config.columns.clone());

    match cli.command {
        Command::Tick | Command::Run => {
            config.validate()?;
            let Some(_lock) = TickLock::acquire(&config.store.lock, config.schedule.stale_lock_after())
                .with_context(|| format!("taking lock {}", config.store.lock.display()))?
            else {
                warn!(lock = %config.store.lock.display(), "another tick is running, exiting");
                return Ok(());
            };
            let scheduler = build_scheduler(&config, store)?;
            if matches!(cli.command, Command::Tick) {
                let report = scheduler.tick().await;
                if cli.json {
                    println!("{}", serde_json::to_string(&report)?);
                } else {
                    println!("{report}");
                }
            } else {
                let cancel = CancellationToken::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        on_signal.cancel();
                    }
                });
                info!(
                    sheet = %config.store.sheet.display(),
                    every_secs = config.schedule.tick_interval().as_secs(),
                    "scheduler starting"
                );
                let ticks = scheduler.run(config.schedule.tick_interval(), cancel).await;
                info!(ticks, "scheduler stopped");
            }
        }
        Command::Setup => {
            let report = setup::provision(store.as_ref(), codec.layout()).await?;
            if cli.json {
                println!("{}", serde_json::to_string(&report)?);
            } else {
                println!(
                    "headers written: {}, rows initialized: {}",
                    report.headers_written, report.rows_initialized
                );
            }
        }
        Command::Ingest { file } => {
            let text = read_event(file.as_deref())?;
            let event: WebhookEvent = serde_json::from_str(&text).context("parsing webhook event")?;
            let mut ingestor = Ingestor::new(store, codec);
            if let Some(directory) = build_directory(&config)? {
                ingestor = ingestor.with_directory(directory);
            }
            let outcome = ingestor.ingest(&event).await?;
            println!("{outcome:?}");
        }
        Command::Inspect { rows } => {
            let summaries = setup::inspect(store.as_ref(), &codec, &config.engine(), rows).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                for summary in &summaries {
                    println!("{summary}");
                }
            }
        }
        Command::Normalize { .. } => {}
    }
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_directory(config: &AgentConfig) -> Result<Option<Arc<dyn Directory>>> {
    if config.directory.is_empty() {
        return Ok(None);
    }
    let directory = AssignmentsDirectory::new(config.directory.clone())
        .context("building directory client")?;
    Ok(Some(Arc::new(directory)))
}

fn build_scheduler(config: &AgentConfig, store: Arc<dyn RowStore>) -> Result<Scheduler> {
    let provider = RetellClient::new(&config.provider).context("building provider client")?;
    let mut scheduler = Scheduler::from_config(config, store, Arc::new(provider));
    if let Some(directory) = build_directory(config)? {
        scheduler = scheduler.with_directory(directory);
    }
    Ok(scheduler)
}

fn read_event(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display())),
        None => std::io::read_to_string(std::io::stdin()).context("reading event from stdin"),
    }
}
