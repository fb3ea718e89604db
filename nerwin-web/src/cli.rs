//! Argumentos de linha de comando e montagem da configuração do pipeline.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nerwin_core::PipelineConfig;

/// Gera e inspeciona janelas de treino para NER baseado em spans
#[derive(Parser, Debug)]
#[command(name = "nerwin", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Converte splits JSON Lines em arquivos de janelas
    Build(BuildArgs),
    /// Sobe o servidor HTTP/WebSocket de pré-visualização
    Serve(ServeArgs),
}

/// Opções compartilhadas de tokenizador e pipeline
#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Nome do checkpoint; decide a família (roberta, deberta, bert, rubert)
    #[arg(long, default_value = "roberta-base")]
    pub model_name: String,

    /// tokenizer.json do HuggingFace (requer a feature `hf`); sem ele usa BPE-lite
    #[arg(long)]
    pub tokenizer: Option<PathBuf>,

    /// Arquivo JSON com a configuração do pipeline
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Tamanho máximo da janela em subpalavras (inclui CLS e SEP)
    #[arg(long)]
    pub max_len: Option<usize>,

    /// Splits segmentados apenas por tamanho (pode repetir)
    #[arg(long = "length-only")]
    pub length_only: Vec<String>,

    /// Processa documentos em paralelo
    #[arg(long)]
    pub parallel: bool,
}

impl PipelineArgs {
    /// Configuração do arquivo (ou padrão) sobrescrita pelas flags.
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_json_file(path)
                .with_context(|| format!("lendo configuração {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(max_len) = self.max_len {
            config.max_len = max_len;
        }
        config.length_only_splits.extend(self.length_only.iter().cloned());
        config.parallel |= self.parallel;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Split de treino (também define o vocabulário de rótulos)
    #[arg(long)]
    pub train: PathBuf,

    #[arg(long)]
    pub dev: Option<PathBuf>,

    #[arg(long)]
    pub test: Option<PathBuf>,

    /// Diretório de saída
    #[arg(short, long)]
    pub out_dir: PathBuf,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(long, default_value = "0.0.0.0:3000")]
    pub addr: SocketAddr,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}
