use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use switchyard_config::{CliOverrides, SwitchyardConfig};
use switchyard_mcp::{RebuildReport, ToolProxy};
use switchyard_rank::{Ranker, build_ranker};
use switchyard_server::AppState;

#[derive(Parser)]
#[command(
    name = "switchyard",
    version,
    about = "One HTTP endpoint in front of many MCP tool providers"
)]
struct Cli {
    /// Config directory (default: ~/.switchyard)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Provider file: mcp.json, or TOML with [servers.<name>] tables
    #[arg(long)]
    providers: Option<PathBuf>,

    /// Address for the HTTP API (default: 127.0.0.1:8080)
    #[arg(long)]
    listen: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API until Ctrl-C (default)
    Serve,
    /// Connect to every provider, print the merged catalog as JSON and exit
    Tools,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = SwitchyardConfig::load(CliOverrides {
        config_dir: cli.config_dir,
        providers_file: cli.providers,
        listen: cli.listen,
    })
    .context("Failed to load configuration")?;

    if config.providers.providers.is_empty() {
        tracing::warn!(
            "No providers configured (looked for a provider file and [providers] in {})",
            config.config_dir.display()
        );
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(config).await,
        Command::Tools => run_tools(config).await,
    }
}

async fn run_serve(config: SwitchyardConfig) -> Result<()> {
    let ranker: Option<Arc<dyn Ranker>> = match config.ranker.clone() {
        Some(backend) => Some(
            build_ranker(backend, config.max_tools).context("Failed to create ranking backend")?,
        ),
        None => {
            tracing::warn!(
                "No ranking backend configured (set OPENAI_API_KEY or GEMINI_API_KEY); /discover is disabled"
            );
            None
        }
    };

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;

    let proxy = ToolProxy::new(config.providers);
    let report = proxy
        .rebuild_all()
        .await
        .context("Initial provider connection failed")?;
    log_rebuild(&report);
    eprintln!(
        "switchyard: serving {} tools from {} providers on http://{}/api/v1",
        report.tools,
        report.connected.len(),
        config.listen
    );

    let served = switchyard_server::serve(
        listener,
        AppState::new(proxy.clone(), ranker),
        shutdown_signal(),
    )
    .await;

    // Close every provider before reporting the server result
    let shutdown = proxy.shutdown().await;
    for (name, error) in &shutdown.failures {
        tracing::warn!("Provider '{}' did not close cleanly: {}", name, error);
    }
    served.context("HTTP server failed")
}

async fn run_tools(config: SwitchyardConfig) -> Result<()> {
    let proxy = ToolProxy::new(config.providers);
    let rebuilt = proxy.rebuild_all().await;
    let listing = match rebuilt {
        Ok(report) => {
            log_rebuild(&report);
            serde_json::to_string_pretty(&proxy.list_all().await)
                .context("Failed to serialize catalog")
        }
        Err(e) => Err(e).context("Provider connection failed"),
    };
    proxy.shutdown().await;

    println!("{}", listing?);
    Ok(())
}

fn log_rebuild(report: &RebuildReport) {
    for (name, error) in &report.failed {
        eprintln!("switchyard: provider '{name}' excluded: {error}");
    }
    tracing::info!(
        "{} tools from providers: {}",
        report.tools,
        report.connected.join(", ")
    );
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
        Err(e) => {
            // Without a signal handler the server runs until killed
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
