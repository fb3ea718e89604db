//! Tipos de erro do `nerwin-core`.
//!
//! Todos os erros são fatais para a execução: a transformação é determinística,
//! então uma falha é reproduzível e deve ser reportada, nunca repetida.

use thiserror::Error;

/// Alias de resultado usado em todo o crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Família de modelo não suportada (roberta, deberta, bert, rubert).
    #[error("modelo não suportado: {0}")]
    UnsupportedModel(String),

    /// Configuração inválida (regex de fim de sentença, limites de janela...).
    #[error("configuração inválida: {0}")]
    InvalidConfig(String),

    /// Uma janela finalizada passou do teto absoluto de subpalavras.
    ///
    /// Indica um segmento grande demais para caber sozinho numa janela.
    /// Nunca truncamos: truncar quebraria o alinhamento das entidades.
    #[error("documento {doc_index}: janela com {len} subpalavras excede o limite de {limit}")]
    WindowOverflow {
        doc_index: usize,
        len: usize,
        limit: usize,
    },

    /// O multiconjunto de menções recuperado das janelas difere do documento.
    #[error("documento {doc_index}: integridade das entidades violada ({detail})")]
    EntityIntegrity { doc_index: usize, detail: String },

    /// Menção com `start > end` ou que ultrapassa o fim do documento.
    #[error("menção inválida ({start}, {end}) num documento de {len} palavras")]
    InvalidMention { start: usize, end: usize, len: usize },

    /// O split de referência para o vocabulário não foi fornecido.
    #[error("split ausente: {0}")]
    MissingSplit(String),

    /// Falha do tokenizador de subpalavras externo.
    #[error("erro do tokenizador: {0}")]
    Tokenizer(String),

    #[error("erro de IO: {0}")]
    Io(#[from] std::io::Error),

    /// JSON malformado no corpus ou no arquivo de configuração; `line` é 1-based.
    #[error("JSON inválido na linha {line}: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Cria um erro de configuração.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Cria um erro do tokenizador.
    #[must_use]
    pub fn tokenizer(msg: impl Into<String>) -> Self {
        Self::Tokenizer(msg.into())
    }
}
