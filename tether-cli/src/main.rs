//! Tether CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tether_config::{load_from_file, DestinationConfig, SourceConfig};
use tether_core::{CancellationToken, Destination, Position, Source};
use tether_http::{HttpDestination, HttpSource};
use tether_scripting::{ScriptRequestBuilder, ScriptResponseParser, ScriptSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tether")]
#[command(about = "Poll HTTP endpoints into records and send records to HTTP endpoints", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the source and print records as JSON lines
    Read(RunArgs),

    /// Run the source and send every record to the destination
    Pipe(RunArgs),

    /// Validate configuration and compile configured scripts
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "tether.yaml")]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

#[derive(Args)]
struct RunArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "tether.yaml")]
    config: PathBuf,

    /// Resume from this position
    #[arg(short, long)]
    position: Option<String>,

    /// Stop after this many records
    #[arg(long)]
    limit: Option<usize>,

    /// Wait between polls that produced nothing
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    backoff: Duration,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", env = "TETHER_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "TETHER_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Read(args) => {
            init_tracing(&args)?;
            let cancel = cancel_on_ctrl_c();
            let count = run(&args, false, &cancel).await?;
            tracing::info!(records = count, "Read finished");
            Ok(())
        }

        Commands::Pipe(args) => {
            init_tracing(&args)?;
            let cancel = cancel_on_ctrl_c();
            let count = run(&args, true, &cancel).await?;
            tracing::info!(records = count, "Pipe finished");
            Ok(())
        }

        Commands::Check { config } => {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();

            tracing::info!("Checking configuration: {}", config.display());

            match check(&config) {
                Ok(()) => {
                    tracing::info!("✓ Configuration is valid");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("✗ Configuration check failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Version => {
            println!("Tether HTTP connectors");
            println!("Version: {}", env!("CARGO_PKG_VERSION"));
            println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
            Ok(())
        }
    }
}

/// Drive the source until the limit is reached or the token is cancelled
async fn run(args: &RunArgs, pipe: bool, cancel: &CancellationToken) -> Result<usize> {
    let file = load_from_file(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;

    let mut source = HttpSource::new();
    source.configure(file.require_source()?).await?;

    let mut destination = if pipe {
        let mut destination = HttpDestination::new();
        destination.configure(file.require_destination()?).await?;
        destination.open(cancel).await?;
        Some(destination)
    } else {
        None
    };

    let position = args.position.clone().map(Position::from);
    source.open(position, cancel).await?;

    let result = pump(&mut source, destination.as_mut(), args, cancel).await;

    if let Some(destination) = destination.as_mut() {
        destination.teardown().await?;
    }
    source.teardown().await?;
    result
}

async fn pump(
    source: &mut HttpSource,
    mut destination: Option<&mut HttpDestination>,
    args: &RunArgs,
    cancel: &CancellationToken,
) -> Result<usize> {
    let mut count = 0;

    while args.limit.map_or(true, |limit| count < limit) {
        let record = match source.read(cancel).await {
            Ok(record) => record,
            Err(e) if e.is_backoff_retry() => {
                tracing::debug!(backoff = ?args.backoff, "Nothing new, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(args.backoff) => continue,
                }
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => return Err(e.into()),
        };

        match destination.as_deref_mut() {
            Some(destination) => {
                destination
                    .write(std::slice::from_ref(&record), cancel)
                    .await?;
            }
            None => println!("{}", serde_json::to_string(&record)?),
        }

        source.ack(&record.position).await?;
        count += 1;
    }

    Ok(count)
}

/// Parse both sections and compile every configured script
fn check(path: &Path) -> Result<()> {
    let file = load_from_file(path)?;

    if let Some(raw) = &file.source {
        let config = SourceConfig::from_raw(raw).context("invalid source section")?;
        tracing::info!("  Source: {} {}", config.http.method, config.http.url);
        tracing::info!("  Polling period: {}", humantime::format_duration(config.polling_period));

        if let Some(script) = &config.scripts.get_request_data {
            ScriptRequestBuilder::new(&ScriptSource::file(script))
                .with_context(|| format!("request builder {}", script.display()))?;
            tracing::info!("  Request builder: {}", script.display());
        }
        if let Some(script) = &config.scripts.parse_response {
            ScriptResponseParser::new(&ScriptSource::file(script))
                .with_context(|| format!("response parser {}", script.display()))?;
            tracing::info!("  Response parser: {}", script.display());
        }
    }

    if let Some(raw) = &file.destination {
        let config = DestinationConfig::from_raw(raw).context("invalid destination section")?;
        tracing::info!("  Destination: {} {}", config.http.method, config.http.url);
    }

    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, shutting down");
            trigger.cancel();
        }
    });
    cancel
}

fn init_tracing(args: &RunArgs) -> Result<()> {
    let level = args
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    // stdout carries records
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_read_args() {
        let cli = Cli::try_parse_from([
            "tether", "read", "--config", "feed.yaml", "--limit", "5", "--backoff", "250ms",
        ])
        .unwrap();

        match cli.command {
            Commands::Read(args) => {
                assert_eq!(args.config, PathBuf::from("feed.yaml"));
                assert_eq!(args.limit, Some(5));
                assert_eq!(args.backoff, Duration::from_millis(250));
                assert_eq!(args.position, None);
                assert!(!args.log_json);
            }
            _ => panic!("expected read"),
        }
    }

    #[test]
    fn test_invalid_backoff_rejected() {
        assert!(Cli::try_parse_from(["tether", "pipe", "--backoff", "soon"]).is_err());
    }

    #[test]
    fn test_check_reports_bad_script() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("build.rhai");
        std::fs::write(&script, "fn getRequestData(a, b) { }").unwrap();

        let config = dir.path().join("tether.yaml");
        std::fs::write(
            &config,
            format!(
                "source:\n  url: http://example.com\n  script:\n    getRequestData: {}\n",
                script.display()
            ),
        )
        .unwrap();

        let err = check(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("getRequestData"));
    }

    #[test]
    fn test_check_accepts_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("tether.json");
        std::fs::write(
            &config,
            r#"{"source": {"url": "http://example.com", "pollingPeriod": "1m"},
                "destination": {"url": "http://example.com/sink", "method": "PUT"}}"#,
        )
        .unwrap();

        check(&config).unwrap();
    }
}
