//! `EchoLens` worker service
//!
//! Processes uploaded support-call recordings: download, transcription,
//! insight extraction and persistence, with crash recovery at startup.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

use clap::{Parser, Subcommand};
use echolens_analytics::AnalyticsEngine;
use echolens_core::{Call, Config, Error, Result};
use echolens_database::{CallQueries, Database};
use echolens_providers::{ChatAnalyzer, ChatSummarizer, OpenAiTranscriber, SummaryModel};
use echolens_storage::HttpBlobStore;
use echolens_worker::processor::CallProcessor;
use echolens_worker::queue::TaskQueue;
use echolens_worker::service::WorkerService;
use echolens_worker::store::{CallStore, PgCallStore};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Command line interface for the `EchoLens` worker
#[derive(Parser)]
#[command(
    name = "echolens-worker",
    version = env!("CARGO_PKG_VERSION"),
    about = "Support call processing worker",
    long_about = "Processes uploaded support-call recordings through transcription and \
                  insight extraction, and serves trend analytics over the results."
)]
struct Cli {
    /// Number of worker tasks (overrides configuration)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Subcommand
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand)]
enum Commands {
    /// Start the worker service (default)
    Start,

    /// Register a recording for processing on the next worker start
    Submit {
        /// Object key of the recording in the blob store
        audio_key: String,
    },

    /// Print the executive summary for the current week
    Summary,

    /// Print per-topic trends as JSON
    Trends,

    /// Print escalation risk scores as JSON
    Risks,

    /// Print active spike alerts as JSON
    Alerts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Could not load configuration ({e}), using defaults");
        Config::default()
    });

    echolens_core::init_logging(&config.logging)?;

    match cli.command.unwrap_or(Commands::Start) {
        Commands::Start => start(&config, cli.workers).await,
        Commands::Submit { audio_key } => submit(&config, &audio_key).await,
        Commands::Summary => {
            let engine = analytics_engine(&config).await?;
            println!("{}", engine.executive_summary().await);
            Ok(())
        }
        Commands::Trends => {
            let engine = analytics_engine(&config).await?;
            print_json(&engine.topic_trends().await)
        }
        Commands::Risks => {
            let engine = analytics_engine(&config).await?;
            print_json(&engine.escalation_risk().await)
        }
        Commands::Alerts => {
            let engine = analytics_engine(&config).await?;
            print_json(&engine.spike_alerts().await)
        }
    }
}

/// Check that provider credentials are configured before starting
fn require_credentials(config: &Config) -> Result<()> {
    if config.transcription.api_key.is_empty() {
        return Err(Error::Configuration {
            message: "transcription.api_key is not set".to_string(),
        });
    }
    if config.analysis.api_key.is_empty() {
        return Err(Error::Configuration {
            message: "analysis.api_key is not set".to_string(),
        });
    }
    Ok(())
}

async fn connect(config: &Config) -> Result<Database> {
    let db = Database::new(config).await?;
    db.migrate().await?;
    db.health_check().await?;
    Ok(db)
}

async fn start(config: &Config, workers_override: Option<usize>) -> Result<()> {
    require_credentials(config)?;

    let db = connect(config).await?;
    let store: Arc<dyn CallStore> = Arc::new(PgCallStore::new(db));

    let blobs = Arc::new(HttpBlobStore::new(&config.storage)?);
    let transcriber = Arc::new(OpenAiTranscriber::new(&config.transcription)?);
    let analyzer = Arc::new(ChatAnalyzer::new(&config.analysis)?);

    let processor = Arc::new(CallProcessor::new(
        Arc::clone(&store),
        blobs,
        transcriber,
        analyzer,
    ));
    let queue = Arc::new(TaskQueue::new(
        config.queue.max_size,
        config.queue.persistence_file.clone(),
    ));

    let workers = workers_override.unwrap_or(config.worker.workers);
    let service = WorkerService::new(store, processor, queue, workers);

    let (shutdown_tx, shutdown_rx) = async_channel::bounded::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for shutdown signal");
        }
        info!("Shutdown signal received");
        drop(shutdown_tx);
    });

    service
        .run(shutdown_rx)
        .await
        .map_err(|e| Error::Other(e.to_string()))
}

/// Insert a PENDING call row; the next worker start sweeps it into the queue
async fn submit(config: &Config, audio_key: &str) -> Result<()> {
    let db = connect(config).await?;
    let call = Call::new(audio_key);
    let id = CallQueries::insert(db.pool(), &call).await?;
    println!("{id}");
    Ok(())
}

async fn analytics_engine(config: &Config) -> Result<AnalyticsEngine> {
    let db = connect(config).await?;

    let summarizer: Option<Arc<dyn SummaryModel>> = if config.analysis.api_key.is_empty() {
        None
    } else {
        Some(Arc::new(ChatSummarizer::new(&config.analysis)?))
    };

    Ok(AnalyticsEngine::new(Arc::new(db), summarizer)
        .with_trend_window(config.analytics.trend_window_weeks))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
