//! # Configuração
//!
//! Duas partes independentes:
//!
//! - [`TokenizerConfig`]: resolvida **uma vez** pelo colaborador que carrega o
//!   tokenizador. Diz qual família de modelo está em uso, quais IDs fazem o papel
//!   de CLS/SEP e se cada palavra recebe um espaço à esquerda antes de ser
//!   tokenizada.
//! - [`PipelineConfig`]: parâmetros da segmentação e do empacotamento de janelas,
//!   com valores padrão e carregável de um arquivo JSON.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Tamanho máximo padrão de uma janela, em subpalavras (inclui CLS e SEP).
pub const DEFAULT_MAX_LEN: usize = 400;

/// Teto absoluto de qualquer janela emitida.
pub const HARD_LIMIT: usize = 512;

/// Padrão padrão de "fim de sentença": a palavra termina em ponto.
pub const DEFAULT_SENTENCE_END: &str = r"\.$";

/// Famílias de modelos suportadas.
///
/// A família decide o prefixo de espaço e quais tokens especiais delimitam a janela:
///
/// | Família   | Prefixo de espaço | Início / Fim |
/// |-----------|-------------------|--------------|
/// | RoBERTa   | sim               | CLS / SEP    |
/// | DeBERTa   | não               | BOS / EOS    |
/// | BERT      | não               | CLS / SEP    |
/// | ruBERT    | não               | CLS / SEP    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Roberta,
    Deberta,
    Bert,
    #[serde(alias = "ru_bert")]
    Rubert,
}

impl ModelFamily {
    /// Resolve a família a partir do nome de um checkpoint (ex: `"roberta-base"`).
    ///
    /// A ordem dos testes importa: "deberta" e "roberta" contêm "bert".
    pub fn from_model_name(name: &str) -> Result<Self> {
        if name.contains("roberta") {
            Ok(Self::Roberta)
        } else if name.contains("deberta") {
            Ok(Self::Deberta)
        } else if name.contains("ruBert") || name.contains("rubert") {
            Ok(Self::Rubert)
        } else if name.contains("bert") {
            Ok(Self::Bert)
        } else {
            Err(Error::UnsupportedModel(name.to_string()))
        }
    }

    /// Se cada palavra deve ser tokenizada como `" " + palavra`.
    pub fn add_prefix_space(&self) -> bool {
        matches!(self, Self::Roberta)
    }

    /// Nomes candidatos (em ordem de preferência) para os tokens de início, fim e padding.
    ///
    /// Usado por quem carrega um vocabulário de subpalavras para achar os IDs.
    pub fn special_token_candidates(&self) -> SpecialTokenNames {
        match self {
            Self::Roberta => SpecialTokenNames {
                start: &["<s>"],
                end: &["</s>"],
                pad: &["<pad>"],
            },
            Self::Deberta => SpecialTokenNames {
                start: &["[CLS]", "<s>"],
                end: &["[SEP]", "</s>"],
                pad: &["[PAD]", "<pad>"],
            },
            Self::Bert | Self::Rubert => SpecialTokenNames {
                start: &["[CLS]"],
                end: &["[SEP]"],
                pad: &["[PAD]"],
            },
        }
    }
}

impl std::str::FromStr for ModelFamily {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "roberta" => Ok(Self::Roberta),
            "deberta" => Ok(Self::Deberta),
            "bert" => Ok(Self::Bert),
            "rubert" | "ru_bert" => Ok(Self::Rubert),
            _ => Err(Error::UnsupportedModel(s.to_string())),
        }
    }
}

/// Nomes textuais dos tokens especiais de uma família.
#[derive(Debug, Clone, Copy)]
pub struct SpecialTokenNames {
    pub start: &'static [&'static str],
    pub end: &'static [&'static str],
    pub pad: &'static [&'static str],
}

/// IDs dos tokens que delimitam uma janela e do token de padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryTokens {
    /// Equivalente a CLS (ou BOS no DeBERTa)
    pub start: u32,
    /// Equivalente a SEP (ou EOS no DeBERTa)
    pub end: u32,
    pub pad: u32,
}

/// Configuração do tokenizador, resolvida uma única vez antes do processamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub family: ModelFamily,
    pub boundary: BoundaryTokens,
    pub add_prefix_space: bool,
}

impl TokenizerConfig {
    /// Configuração canônica da família com os IDs de fronteira fornecidos.
    pub fn new(family: ModelFamily, boundary: BoundaryTokens) -> Self {
        Self {
            family,
            boundary,
            add_prefix_space: family.add_prefix_space(),
        }
    }
}

/// Como um split é segmentado antes do empacotamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitPolicy {
    /// Corta em fins de sentença fora de entidades (padrão).
    #[default]
    Sentences,
    /// Não procura fins de sentença: o documento inteiro é um segmento.
    LengthOnly,
}

/// Parâmetros do pipeline de janelas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Tamanho alvo de uma janela, incluindo os dois tokens de fronteira.
    pub max_len: usize,
    /// Teto absoluto; uma janela maior é um erro fatal.
    pub hard_limit: usize,
    /// Regex aplicada a cada palavra para detectar fim de sentença.
    pub sentence_end: String,
    /// Splits processados com [`SplitPolicy::LengthOnly`].
    pub length_only_splits: BTreeSet<String>,
    /// Split usado para construir o vocabulário de rótulos.
    pub reference_split: String,
    /// Processa documentos em paralelo (rayon), um cache por worker.
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_len: DEFAULT_MAX_LEN,
            hard_limit: HARD_LIMIT,
            sentence_end: DEFAULT_SENTENCE_END.to_string(),
            length_only_splits: BTreeSet::new(),
            reference_split: "train".to_string(),
            parallel: false,
        }
    }
}

impl PipelineConfig {
    /// Lê a configuração de um arquivo JSON; campos ausentes usam o padrão.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|source| Error::Json {
            line: source.line(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Verifica limites coerentes. O padrão de fim de sentença é validado pelo segmentador.
    pub fn validate(&self) -> Result<()> {
        if self.max_len < 3 {
            return Err(Error::invalid_config(format!(
                "max_len = {} não comporta os dois tokens de fronteira e uma subpalavra",
                self.max_len
            )));
        }
        if self.max_len > self.hard_limit {
            return Err(Error::invalid_config(format!(
                "max_len = {} excede hard_limit = {}",
                self.max_len, self.hard_limit
            )));
        }
        Ok(())
    }

    /// Política de segmentação aplicada a um split.
    pub fn policy_for(&self, split: &str) -> SplitPolicy {
        if self.length_only_splits.contains(split) {
            SplitPolicy::LengthOnly
        } else {
            SplitPolicy::Sentences
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_family_from_model_name() {
        assert_eq!(ModelFamily::from_model_name("roberta-large").unwrap(), ModelFamily::Roberta);
        assert_eq!(ModelFamily::from_model_name("microsoft/deberta-v3-base").unwrap(), ModelFamily::Deberta);
        assert_eq!(ModelFamily::from_model_name("bert-base-cased").unwrap(), ModelFamily::Bert);
        assert_eq!(ModelFamily::from_model_name("DeepPavlov/rubert-base-cased").unwrap(), ModelFamily::Rubert);
        assert_eq!(ModelFamily::from_model_name("ai-forever/ruBert-large").unwrap(), ModelFamily::Rubert);
        assert!(matches!(
            ModelFamily::from_model_name("gpt2"),
            Err(Error::UnsupportedModel(_))
        ));
    }

    #[test]
    fn test_prefix_space_only_for_roberta() {
        let boundary = BoundaryTokens { start: 0, end: 2, pad: 1 };
        assert!(TokenizerConfig::new(ModelFamily::Roberta, boundary).add_prefix_space);
        assert!(!TokenizerConfig::new(ModelFamily::Deberta, boundary).add_prefix_space);
        assert!(!TokenizerConfig::new(ModelFamily::Bert, boundary).add_prefix_space);
    }

    #[test]
    fn test_family_from_str() {
        assert_eq!("RoBERTa".parse::<ModelFamily>().unwrap(), ModelFamily::Roberta);
        assert!("xlnet".parse::<ModelFamily>().is_err());
    }

    #[test]
    fn test_defaults_and_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_len": 256, "length_only_splits": ["test"]}"#).unwrap();
        assert_eq!(config.max_len, 256);
        assert_eq!(config.hard_limit, HARD_LIMIT);
        assert_eq!(config.sentence_end, DEFAULT_SENTENCE_END);
        assert_eq!(config.policy_for("test"), SplitPolicy::LengthOnly);
        assert_eq!(config.policy_for("dev"), SplitPolicy::Sentences);
    }

    #[test]
    fn test_validate_limits() {
        let mut config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        config.max_len = 600;
        assert!(config.validate().is_err());
        config.max_len = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"parallel": true}"#).unwrap();
        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert!(config.parallel);
        assert_eq!(config.max_len, DEFAULT_MAX_LEN);
    }

    #[test]
    fn test_from_json_file_reports_error_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{\n  \"parallel\": true,\n  \"max_len\": \"muito\"\n}\n").unwrap();
        let err = PipelineConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, Error::Json { line: 3, .. }), "{err}");
    }
}
