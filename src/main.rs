use std::path::{Path, PathBuf};

use anyhow::Context;
use casegen_core::config::{Config, LogFormat};
use casegen_core::{AppContext, Document};
use casegen_gateway::GatewayServer;
use casegen_storage::RequestId;
use clap::{Parser, Subcommand};
use tokio::sync::watch;

#[derive(Debug, Parser)]
#[command(
    name = "casegen",
    version,
    about = "Generate test suites from guideline PDFs"
)]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP gateway.
    Serve,
    /// Ingest one PDF and print the outcome as JSON.
    Ingest { file: PathBuf },
    /// List recent status records.
    History {
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Print one status record.
    Show { id: RequestId },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config_path = casegen_core::bootstrap::resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    init_subscriber(config.observability.log_format);

    let ctx = AppContext::build(&config).await?;
    let result = run(cli.command, &config, &ctx).await;
    ctx.shutdown().await;
    result
}

async fn run(command: Command, config: &Config, ctx: &AppContext) -> anyhow::Result<()> {
    match command {
        Command::Serve => serve(config, ctx).await,
        Command::Ingest { file } => {
            let document = read_document(&file).await?;
            let outcome = ctx.orchestrator.ingest(document).await?;
            print_json(&outcome)
        }
        Command::History { limit } => print_json(&ctx.catalog.list_records(limit).await),
        Command::Show { id } => print_json(&ctx.catalog.get_record(id).await?),
    }
}

async fn serve(config: &Config, ctx: &AppContext) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e:#}");
            return;
        }
        tracing::info!("received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    GatewayServer::new(&config.gateway.bind, config.gateway.port, ctx, shutdown_rx)
        .with_max_body_size(config.gateway.max_body_size)
        .serve()
        .await?;
    Ok(())
}

async fn read_document(path: &Path) -> anyhow::Result<Document> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(Document {
        filename,
        content_type: None,
        bytes,
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_subscriber(format: LogFormat) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}
