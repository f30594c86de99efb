use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pdfqa_cli::{Cli, Command, format_answer, format_ingest, format_status, read_document};
use pdfqa_rag::{
    IndexStatus, OpenAIEmbeddingProvider, OpenAIGenerator, RagConfig, RagPipeline, SnapshotStore,
    VectorIndex,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();
    }
}

async fn build_pipeline(config: RagConfig) -> Result<RagPipeline> {
    let base_url = std::env::var("OPENAI_BASE_URL").ok();

    let mut embedder = OpenAIEmbeddingProvider::from_env()
        .context("failed to create embedding provider")?
        .with_model(&config.embedding_model);
    let mut generator = OpenAIGenerator::from_env()
        .context("failed to create answer generator")?
        .with_model(&config.generation_model);
    if let Some(url) = base_url {
        info!(base_url = %url, "using custom OpenAI-compatible endpoint");
        embedder = embedder.with_base_url(&url);
        generator = generator.with_base_url(url);
    }

    RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(embedder))
        .generator(Arc::new(generator))
        .build()
        .await
        .context("failed to open the document index")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let mut config = RagConfig::from_env().context("invalid PDFQA_* configuration")?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Command::Ingest { files } => {
            let pipeline = build_pipeline(config).await?;
            for path in &files {
                let document = read_document(path).await?;
                let report = pipeline
                    .ingest(&document)
                    .await
                    .with_context(|| format!("failed to ingest {}", path.display()))?;
                println!("{}", format_ingest(&report));
            }
        }
        Command::Ask { question } => {
            let pipeline = build_pipeline(config).await?;
            match pipeline.answer(&question).await {
                Ok(answer) => println!("{}", format_answer(&answer)),
                Err(e) if e.is_not_ready() => {
                    warn!("question asked before any document was ingested");
                    anyhow::bail!("{e}");
                }
                Err(e) => return Err(e).context("failed to answer the question"),
            }
        }
        Command::Status => {
            // Reads the snapshot directly; no API key required.
            let index = VectorIndex::load(&SnapshotStore::new(&config.data_dir))
                .await
                .context("failed to read the document index")?;
            let status = IndexStatus::from(&*index.snapshot().await);
            println!("{}", format_status(&status));
        }
        Command::Rebuild => {
            let pipeline = build_pipeline(config).await?;
            pipeline.rebuild().await.context("failed to rebuild the index")?;
            println!("index cleared");
        }
    }

    Ok(())
}
