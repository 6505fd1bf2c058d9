mod commands;
mod docs;
mod error;
mod llm;
mod pipeline;
mod state;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, Level};

use commands::Cli;
use docs::Corpus;
use llm::LlmClient;
use pipeline::capability::{Capabilities, Exclusive};
use pipeline::Pipeline;
use state::{AppState, PipelineConfig};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // Load env
    let _ = dotenv::dotenv();
    let config = Arc::new(PipelineConfig::from_env()?);
    info!(
        threshold = config.similarity_threshold,
        chunk_size = config.chunk_size,
        max_concurrency = config.max_concurrency,
        "Pipeline configured"
    );

    // Init model capabilities
    let llm_client = LlmClient::from_env()?;
    info!(base_url = llm_client.base_url(), "LLM client initialized");
    let capabilities = if config.exclusive_capabilities {
        info!("Serializing model calls");
        Capabilities::from_backend(Arc::new(Exclusive::new(llm_client)))
    } else {
        Capabilities::from_backend(Arc::new(llm_client))
    };

    let corpus = if cli.command.needs_corpus() {
        Corpus::new(docs::ingest::load_export(&cli.data).await?)
    } else {
        Corpus::new(Vec::new())
    };

    let app_state = AppState {
        corpus,
        pipeline: Arc::new(Pipeline::new(capabilities, &config)),
        config,
    };

    let result = commands::dispatch(&app_state, cli.command).await;

    drop(app_state);
    info!("Model handles released");
    result
}
