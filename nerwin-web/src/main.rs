//! CLI e servidor web para gerar e inspecionar janelas de treino NER

mod build;
mod cli;
#[cfg(feature = "hf")]
mod hf;
mod server;
mod tokenizer;

use std::sync::Arc;

use clap::Parser;
use nerwin_core::WindowPipeline;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command};
use crate::server::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Build(args) => {
            // Processamento em lote é síncrono: fora do runtime assíncrono
            tokio::task::spawn_blocking(move || build::run(&args)).await?
        }
        Command::Serve(args) => {
            let config = args.pipeline.pipeline_config()?;
            let loaded = tokenizer::load(&args.pipeline.model_name, args.pipeline.tokenizer.as_deref())?;
            let pipeline = WindowPipeline::new(loaded.tokenizer, loaded.config, config)?;
            server::serve(args.addr, Arc::new(AppState { pipeline })).await
        }
    }
}
