//! # Janelas de Treino e o Acumulador
//!
//! Uma [`Window`] é a unidade final de dados de treino: uma sequência de
//! subpalavras limitada em tamanho, delimitada pelos tokens de início e fim,
//! com o alinhamento para as palavras locais e a matriz de rótulos.
//!
//! O [`WindowAccumulator`] empacota segmentos consecutivos de um documento de
//! forma gulosa:
//!
//! ```text
//!            offer(seg) cabe            offer(seg) não cabe
//!   Empty ─────────────────▶ Accumulating ─────────────────▶ devolve Window,
//!     ▲                          │    ▲                      reinicia com seg
//!     │                          │    └──────────────────────────┘
//!     │         flush()          ▼
//!     └──────────────────── Flushed
//! ```
//!
//! ## Convenção de índices
//!
//! No alinhamento (`indexes`), as palavras são numeradas a partir de **1**; o
//! índice 0 fica reservado para os tokens de fronteira. Já as menções e a
//! matriz usam índices de palavra **0-based**.
//!
//! | subpalavra | `[CLS]` | Ac | me | Corp | `[SEP]` |
//! |------------|---------|----|----|------|---------|
//! | indexes    | 0       | 1  | 1  | 2    | 0       |

use serde::{Deserialize, Serialize};

use crate::config::BoundaryTokens;
use crate::encoder::{SparseLabelMatrix, SpanEncoder, MATRIX_PAD_VALUE};
use crate::error::{Error, Result};
use crate::mention::{surface_of, EntityMention};
use crate::segmenter::Segment;
use crate::subword::{Alignment, SubwordCache, SubwordTokenizer};
use crate::vocab::LabelVocabulary;

/// Uma janela de treino pronta, imutável depois de emitida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub input_ids: Vec<u32>,
    /// Alinhamento subpalavra → palavra (1-based; 0 nas fronteiras).
    pub indexes: Vec<usize>,
    pub bpe_len: usize,
    pub word_len: usize,
    pub matrix: SparseLabelMatrix,
    /// `(start, end, label_index)` em coordenadas locais.
    pub ent_target: Vec<(usize, usize, usize)>,
    /// Palavras locais da janela.
    pub tokens: Vec<String>,
    /// Posição do documento de origem no seu split.
    pub doc_index: usize,
    /// Posição, no documento, da primeira palavra da janela.
    pub word_offset: usize,
    /// Primeiro e último segmento do documento empacotados nesta janela.
    pub segment_range: (usize, usize),
    /// Menções locais usadas para montar a matriz (inclui rótulos desconhecidos).
    #[serde(default)]
    pub mentions: Vec<EntityMention>,
}

impl Window {
    /// Textos de superfície das menções locais, na ordem em que foram empacotadas.
    pub fn surfaces(&self) -> impl Iterator<Item = String> + '_ {
        self.mentions.iter().map(|m| surface_of(&self.tokens, m))
    }

    /// Menções locais levadas de volta às coordenadas do documento.
    pub fn document_mentions(&self) -> impl Iterator<Item = EntityMention> + '_ {
        self.mentions.iter().map(|m| m.shifted(self.word_offset))
    }

    /// Menções cujo rótulo não foi codificado na matriz.
    pub fn unencoded_mentions(&self) -> usize {
        self.mentions.len().saturating_sub(self.ent_target.len())
    }
}

/// Contrato de padding exposto a quem monta os batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaddingSpec {
    /// Preenche `input_ids` com o ID de padding do tokenizador.
    pub input_ids: u32,
    /// Preenche `matrix` com -100 ("ignorar na loss").
    pub matrix: i8,
    /// `ent_target` é preenchido com ausência (`null`).
    pub ent_target: Option<Vec<(usize, usize, usize)>>,
}

impl PaddingSpec {
    pub fn new(boundary: BoundaryTokens) -> Self {
        Self {
            input_ids: boundary.pad,
            matrix: MATRIX_PAD_VALUE,
            ent_target: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorState {
    Empty,
    Accumulating,
    Flushed,
}

/// Empacotador guloso de segmentos em janelas de no máximo `max_len` subpalavras.
pub struct WindowAccumulator<'v> {
    boundary: BoundaryTokens,
    max_len: usize,
    hard_limit: usize,
    vocab: &'v LabelVocabulary,
    doc_index: usize,
    state: AccumulatorState,
    ids: Vec<u32>,
    indexes: Vec<usize>,
    words: Vec<String>,
    mentions: Vec<EntityMention>,
    word_offset: usize,
    first_segment: usize,
    last_segment: usize,
    next_segment: usize,
}

impl<'v> WindowAccumulator<'v> {
    /// Cria um acumulador vazio para o documento `doc_index`.
    ///
    /// `max_len` já conta os dois tokens de fronteira; `hard_limit` é o teto
    /// que nenhuma janela pode ultrapassar.
    pub fn new(
        boundary: BoundaryTokens,
        max_len: usize,
        hard_limit: usize,
        vocab: &'v LabelVocabulary,
        doc_index: usize,
    ) -> Self {
        Self {
            boundary,
            max_len,
            hard_limit,
            vocab,
            doc_index,
            state: AccumulatorState::Empty,
            ids: vec![boundary.start],
            indexes: vec![0],
            words: Vec::new(),
            mentions: Vec::new(),
            word_offset: 0,
            first_segment: 0,
            last_segment: 0,
            next_segment: 0,
        }
    }

    pub fn state(&self) -> AccumulatorState {
        self.state
    }

    /// Tamanho atual em subpalavras (inclui o token de início, não o de fim).
    pub fn current_len(&self) -> usize {
        self.ids.len()
    }

    /// Oferece o próximo segmento do documento.
    ///
    /// Se o segmento cabe (`atual + segmento + fim <= max_len`), ele é
    /// incorporado e nada é devolvido. Caso contrário a janela acumulada é
    /// finalizada e devolvida, e o acumulador recomeça a partir deste segmento.
    /// Um segmento oferecido a um acumulador vazio é sempre aceito.
    pub fn offer<T: SubwordTokenizer + ?Sized>(
        &mut self,
        segment: &Segment,
        cache: &mut SubwordCache<'_, T>,
    ) -> Result<Option<Window>> {
        let alignment = cache.align(&segment.words)?;
        let segment_index = self.next_segment;
        self.next_segment += 1;

        match self.state {
            AccumulatorState::Empty | AccumulatorState::Flushed => {
                self.reset(segment_index, segment.offset);
                self.merge(segment, alignment, segment_index);
                Ok(None)
            }
            AccumulatorState::Accumulating => {
                if self.ids.len() + alignment.len() + 1 <= self.max_len {
                    self.merge(segment, alignment, segment_index);
                    Ok(None)
                } else {
                    let window = self.finalize()?;
                    self.reset(segment_index, segment.offset);
                    self.merge(segment, alignment, segment_index);
                    Ok(Some(window))
                }
            }
        }
    }

    /// Finaliza o que restou acumulado. `None` se nada foi acumulado.
    pub fn flush(&mut self) -> Result<Option<Window>> {
        let window = match self.state {
            AccumulatorState::Accumulating => Some(self.finalize()?),
            AccumulatorState::Empty | AccumulatorState::Flushed => None,
        };
        self.state = AccumulatorState::Flushed;
        Ok(window)
    }

    fn reset(&mut self, first_segment: usize, word_offset: usize) {
        self.ids.clear();
        self.ids.push(self.boundary.start);
        self.indexes.clear();
        self.indexes.push(0);
        self.words.clear();
        self.mentions.clear();
        self.word_offset = word_offset;
        self.first_segment = first_segment;
        self.state = AccumulatorState::Empty;
    }

    fn merge(&mut self, segment: &Segment, alignment: Alignment, segment_index: usize) {
        let offset = self.words.len();
        self.ids.extend(alignment.ids);
        self.indexes
            .extend(alignment.word_index.into_iter().map(|i| i + offset + 1));
        self.mentions
            .extend(segment.mentions.iter().map(|m| m.shifted(offset)));
        self.words.extend(segment.words.iter().cloned());
        self.last_segment = segment_index;
        self.state = AccumulatorState::Accumulating;
    }

    fn finalize(&mut self) -> Result<Window> {
        let mut input_ids = std::mem::take(&mut self.ids);
        let mut indexes = std::mem::take(&mut self.indexes);
        input_ids.push(self.boundary.end);
        indexes.push(0);

        if input_ids.len() > self.hard_limit {
            return Err(Error::WindowOverflow {
                doc_index: self.doc_index,
                len: input_ids.len(),
                limit: self.hard_limit,
            });
        }

        let tokens = std::mem::take(&mut self.words);
        let mentions = std::mem::take(&mut self.mentions);
        let word_len = tokens.len();
        let encoded = SpanEncoder::encode(word_len, &mentions, self.vocab);
        for mention in &encoded.unknown {
            tracing::warn!(
                doc_index = self.doc_index,
                label = %mention.label,
                "rótulo fora do vocabulário; menção não codificada"
            );
        }

        Ok(Window {
            bpe_len: input_ids.len(),
            input_ids,
            indexes,
            word_len,
            matrix: encoded.matrix,
            ent_target: encoded.targets,
            tokens,
            doc_index: self.doc_index,
            word_offset: self.word_offset,
            segment_range: (self.first_segment, self.last_segment),
            mentions,
        })
    }
}
