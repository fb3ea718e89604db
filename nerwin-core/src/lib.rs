//! # nerwin-core — Janelas de Treino para NER Baseado em Spans
//!
//! Este crate transforma documentos tokenizados por palavra, anotados com
//! menções de entidades, em **janelas de subpalavras** de tamanho fixo prontas
//! para treinar um modelo de reconhecimento de entidades baseado em spans.
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui de forma linear, um documento por vez:
//!
//! 1.  **Entrada**: [`Document`] (palavras + menções `(start, end, tipo)` com fim inclusivo).
//! 2.  **Vocabulário** ([`vocab`]): tipos de entidade do split de treino, em ordem lexicográfica.
//! 3.  **Segmentação** ([`segmenter`]): pontos de corte em fins de sentença que nunca caem dentro de uma entidade.
//! 4.  **Subpalavras** ([`subword`]): cada palavra é re-tokenizada (com cache) e alinhada ao seu índice.
//! 5.  **Empacotamento** ([`window`]): segmentos são agrupados gulosamente até o limite de subpalavras.
//! 6.  **Codificação** ([`encoder`]): as menções de cada janela viram uma matriz esparsa simétrica.
//! 7.  **Saída**: [`Window`]s, com a garantia de que nenhuma menção foi perdida ou duplicada ([`pipeline`]).
//!
//! O carregamento de corpus em JSON Lines fica em [`corpus`], a configuração em [`config`].

pub mod config;
pub mod corpus;
pub mod encoder;
pub mod error;
pub mod mention;
pub mod pipeline;
pub mod segmenter;
pub mod subword;
pub mod vocab;
pub mod window;

pub use config::{BoundaryTokens, ModelFamily, PipelineConfig, SplitPolicy, TokenizerConfig};
pub use corpus::CorpusBundle;
pub use encoder::{SparseLabelMatrix, SpanEncoder};
pub use error::{Error, Result};
pub use mention::{Document, EntityMention};
pub use pipeline::{ProcessedBundle, SplitOutput, SplitStats, WindowPipeline};
pub use segmenter::{Segment, Segmenter};
pub use subword::{BpeLiteTokenizer, SubwordCache, SubwordTokenizer};
pub use vocab::LabelVocabulary;
pub use window::{PaddingSpec, Window, WindowAccumulator};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::BoundaryTokens;
    use crate::error::Result;
    use crate::mention::EntityMention;
    use crate::segmenter::Segment;
    use crate::subword::SubwordTokenizer;

    pub const BOUNDARY: BoundaryTokens = BoundaryTokens { start: 1, end: 2, pad: 0 };

    /// Uma subpalavra por caractere: facilita contar comprimentos nos testes.
    pub struct CharTokenizer;

    impl SubwordTokenizer for CharTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>> {
            Ok(text.chars().map(|c| c as u32).collect())
        }
    }

    pub fn segment(offset: usize, words: &[&str], mentions: Vec<EntityMention>) -> Segment {
        Segment {
            offset,
            words: words.iter().map(|w| w.to_string()).collect(),
            mentions,
        }
    }
}
