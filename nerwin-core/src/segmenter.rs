//! # Segmentação em Pontos de Corte Seguros
//!
//! Antes de empacotar um documento em janelas, ele é dividido em **segmentos**:
//! fatias contíguas de palavras entre dois pontos de corte. Um ponto de corte
//! logo após a palavra `i` só é candidato se:
//!
//! 1. a palavra `i` termina uma sentença (por padrão: termina em `.`), **e**
//! 2. nenhuma menção cobre a palavra `i`.
//!
//! A regra 2 garante que nenhuma entidade jamais seja cortada ao meio. Uma
//! abreviação dentro de uma entidade ("Acme Inc.") suprime o corte, ao custo
//! de um segmento mais longo.
//!
//! O comprimento do documento é sempre o último ponto de corte.

use regex::Regex;

use crate::config::{SplitPolicy, DEFAULT_SENTENCE_END};
use crate::error::{Error, Result};
use crate::mention::{Document, EntityMention};

/// Uma fatia do documento entre dois pontos de corte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Posição da primeira palavra no documento.
    pub offset: usize,
    pub words: Vec<String>,
    /// Menções inteiramente contidas no segmento, em coordenadas locais.
    pub mentions: Vec<EntityMention>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Detecta fins de sentença e divide documentos em segmentos.
#[derive(Debug, Clone)]
pub struct Segmenter {
    sentence_end: Regex,
}

impl Segmenter {
    /// Cria o segmentador com a regex de fim de sentença aplicada a cada palavra.
    ///
    /// # Erros
    /// [`Error::InvalidConfig`] se a regex não compila.
    pub fn new(sentence_end: &str) -> Result<Self> {
        let sentence_end = Regex::new(sentence_end)
            .map_err(|e| Error::invalid_config(format!("regex de fim de sentença inválida: {e}")))?;
        Ok(Self { sentence_end })
    }

    fn ends_sentence(&self, word: &str) -> bool {
        !word.is_empty() && self.sentence_end.is_match(word)
    }

    /// Pontos de corte estritamente crescentes, sempre terminando em `doc.len()`.
    pub fn cut_points(&self, doc: &Document, policy: SplitPolicy) -> Vec<usize> {
        let mut cuts = Vec::new();

        if policy == SplitPolicy::Sentences {
            let mut covered = vec![false; doc.len()];
            for mention in &doc.mentions {
                covered[mention.start..=mention.end].fill(true);
            }
            for (idx, word) in doc.tokens.iter().enumerate() {
                if !covered[idx] && self.ends_sentence(word) {
                    cuts.push(idx + 1);
                }
            }
        }

        if cuts.last() != Some(&doc.len()) {
            cuts.push(doc.len());
        }
        cuts
    }

    /// Particiona o documento em segmentos com as menções re-baseadas.
    ///
    /// Um documento vazio não produz segmentos.
    pub fn split(&self, doc: &Document, policy: SplitPolicy) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut last = 0;
        for cut in self.cut_points(doc, policy) {
            if cut == last {
                continue;
            }
            let mentions = doc
                .mentions
                .iter()
                .filter(|m| last <= m.start && m.end < cut)
                .map(|m| m.rebased(last))
                .collect();
            segments.push(Segment {
                offset: last,
                words: doc.tokens[last..cut].to_vec(),
                mentions,
            });
            last = cut;
        }
        segments
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            sentence_end: Regex::new(DEFAULT_SENTENCE_END).expect("regex padrão válida"),
        }
    }
}
