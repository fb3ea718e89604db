//! # Subpalavras: tokenizador, cache e alinhamento
//!
//! Cada palavra do documento é re-tokenizada em unidades de subpalavra pelo
//! tokenizador do modelo. Como um corpus repete muito as mesmas palavras, o
//! [`SubwordCache`] memoriza `palavra → IDs` durante o processamento de um split.
//!
//! O alinhamento resultante guarda, para cada subpalavra, o índice local da
//! palavra que a produziu:
//!
//! ```text
//! palavras:   "Fiocruz"        "desenvolveu"
//! subpalavras: Fi  oc  ruz      des  envol  veu
//! alinhamento: 0   0   0        1    1      1
//! ```
//!
//! O tokenizador em si é um colaborador externo, representado pelo trait
//! [`SubwordTokenizer`]. O crate traz o [`BpeLiteTokenizer`], uma simulação
//! determinística de BPE sem dependência de arquivos de modelo.

use std::collections::HashMap;
use std::sync::Arc;

use unicode_segmentation::UnicodeSegmentation;

use crate::config::BoundaryTokens;
use crate::error::Result;

/// Função externa palavra → IDs de subpalavras (sem tokens especiais).
pub trait SubwordTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>>;
}

impl<T: SubwordTokenizer + ?Sized> SubwordTokenizer for &T {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }
}

impl<T: SubwordTokenizer + ?Sized> SubwordTokenizer for Box<T> {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }
}

impl<T: SubwordTokenizer + ?Sized> SubwordTokenizer for Arc<T> {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        (**self).encode(text)
    }
}

/// Sequência de subpalavras de um trecho e seu alinhamento com as palavras.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Alignment {
    /// IDs concatenados de todas as palavras, em ordem.
    pub ids: Vec<u32>,
    /// `word_index[k]` = índice local (0-based) da palavra que gerou `ids[k]`.
    pub word_index: Vec<usize>,
}

impl Alignment {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Memoização `palavra → subpalavras` com escopo de um split.
///
/// Não há estado global: o cache é criado por quem processa o split e descartado
/// no fim. Strings idênticas sempre produzem a mesma sequência de IDs.
pub struct SubwordCache<'t, T: ?Sized> {
    tokenizer: &'t T,
    add_prefix_space: bool,
    entries: HashMap<String, Vec<u32>>,
    hits: u64,
    misses: u64,
}

impl<'t, T: SubwordTokenizer + ?Sized> SubwordCache<'t, T> {
    pub fn new(tokenizer: &'t T, add_prefix_space: bool) -> Self {
        Self {
            tokenizer,
            add_prefix_space,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// IDs de subpalavra de uma palavra, consultando o tokenizador só na primeira vez.
    pub fn encode_word(&mut self, word: &str) -> Result<&[u32]> {
        if self.entries.contains_key(word) {
            self.hits += 1;
        } else {
            let ids = if self.add_prefix_space {
                self.tokenizer.encode(&format!(" {word}"))?
            } else {
                self.tokenizer.encode(word)?
            };
            if ids.is_empty() {
                tracing::debug!(word, "palavra sem subpalavras");
            }
            self.entries.insert(word.to_string(), ids);
            self.misses += 1;
        }
        Ok(&self.entries[word])
    }

    /// Codifica uma sequência de palavras e monta o alinhamento subpalavra → palavra.
    pub fn align(&mut self, words: &[String]) -> Result<Alignment> {
        let mut alignment = Alignment::default();
        for (idx, word) in words.iter().enumerate() {
            let ids = self.encode_word(word)?;
            alignment.word_index.extend(std::iter::repeat(idx).take(ids.len()));
            alignment.ids.extend_from_slice(ids);
        }
        Ok(alignment)
    }

    /// Número de palavras distintas memorizadas.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

/// Marcador de início de palavra emitido quando o texto começa com espaço.
const WORD_START: &str = "▁";

const PAD_ID: u32 = 0;
const UNK_ID: u32 = 1;
const CLS_ID: u32 = 2;
const SEP_ID: u32 = 3;
const MARKER_ID: u32 = 4;
/// IDs dos merges começam aqui, na ordem de prioridade.
const MERGE_BASE: u32 = 16;
/// IDs de caracteres isolados: `CHAR_BASE + code point`.
const CHAR_BASE: u32 = 1024;

/// Merges padrão (ordem = prioridade), focados em sílabas frequentes do português.
const DEFAULT_MERGES: &[(&str, &str)] = &[
    ("e", "s"), ("a", "s"), ("o", "s"), // plurais
    ("d", "e"), ("d", "o"), ("d", "a"), // preposições
    ("q", "u"), ("qu", "e"), ("e", "m"), // "que", "em"
    ("ã", "o"), ("ç", "ã"), ("çã", "o"), // nasais/cedilha
    ("r", "e"), ("i", "n"), ("t", "e"), ("o", "r"),
    ("a", "r"), ("e", "r"), ("e", "n"), ("o", "n"),
    ("t", "a"), ("t", "o"), ("c", "o"), ("m", "e"),
    ("a", "n"), ("t", "h"), ("th", "e"), ("i", "ng"), ("n", "g"),
];

/// Simulação didática de Byte-Pair Encoding.
///
/// 1. Quebra o texto em grafemas (não em `char`s, para não separar acentos combinantes).
/// 2. Aplica repetidamente o merge de menor posto entre pares adjacentes.
/// 3. Converte cada peça em um ID estável: merges têm IDs pela posição na lista,
///    caracteres isolados pelo code point.
///
/// É puro e determinístico: serve para testes e para a demonstração web quando
/// nenhum `tokenizer.json` real foi fornecido.
#[derive(Debug, Clone)]
pub struct BpeLiteTokenizer {
    ranks: HashMap<(String, String), usize>,
    merged_ids: HashMap<String, u32>,
}

impl BpeLiteTokenizer {
    pub fn new() -> Self {
        Self::with_merges(DEFAULT_MERGES)
    }

    /// Tokenizador com uma lista de merges própria (a ordem define a prioridade).
    pub fn with_merges(merges: &[(&str, &str)]) -> Self {
        let mut ranks = HashMap::new();
        let mut merged_ids = HashMap::new();
        for (rank, (a, b)) in merges.iter().enumerate() {
            ranks.entry((a.to_string(), b.to_string())).or_insert(rank);
            merged_ids
                .entry(format!("{a}{b}"))
                .or_insert(MERGE_BASE + rank as u32);
        }
        Self { ranks, merged_ids }
    }

    /// IDs de fronteira e padding deste vocabulário.
    pub fn boundary_tokens() -> BoundaryTokens {
        BoundaryTokens {
            start: CLS_ID,
            end: SEP_ID,
            pad: PAD_ID,
        }
    }

    /// Peças de subpalavra de um texto (útil para depuração).
    pub fn pieces(&self, text: &str) -> Vec<String> {
        let (marked, body) = match text.strip_prefix(' ') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let mut pieces = Vec::new();
        if marked {
            pieces.push(WORD_START.to_string());
        }
        for word in body.split_whitespace() {
            pieces.extend(self.merge_word(word));
        }
        pieces
    }

    fn merge_word(&self, word: &str) -> Vec<String> {
        let mut parts: Vec<String> = word.graphemes(true).map(str::to_string).collect();
        loop {
            let best = parts
                .windows(2)
                .enumerate()
                .filter_map(|(i, pair)| {
                    self.ranks
                        .get(&(pair[0].clone(), pair[1].clone()))
                        .map(|rank| (*rank, i))
                })
                .min();
            let Some((_, i)) = best else { break };
            let right = parts.remove(i + 1);
            parts[i].push_str(&right);
        }
        parts
    }

    fn piece_id(&self, piece: &str) -> u32 {
        if piece == WORD_START {
            return MARKER_ID;
        }
        if let Some(id) = self.merged_ids.get(piece) {
            return *id;
        }
        let mut chars = piece.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => CHAR_BASE + c as u32,
            _ => UNK_ID,
        }
    }
}

impl Default for BpeLiteTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SubwordTokenizer for BpeLiteTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self.pieces(text).iter().map(|p| self.piece_id(p)).collect())
    }
}
