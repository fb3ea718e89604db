//! # Documentos e Menções de Entidades
//!
//! Um [`Document`] é uma sequência de palavras já tokenizadas com um conjunto de
//! [`EntityMention`]s. Cada menção é um triplo `(start, end, label)` com **ambos
//! os índices inclusivos**, sempre expresso no sistema de coordenadas de quem a
//! contém: o documento, um segmento ou uma janela.
//!
//! ## Exemplo
//!
//! ```rust
//! use nerwin_core::mention::{Document, EntityMention};
//!
//! let doc = Document::new(
//!     vec!["Acme".into(), "Corp".into(), "was".into(), "founded".into(), ".".into()],
//!     vec![EntityMention::new(0, 1, "ORG"), EntityMention::new(0, 1, "ORG")],
//! ).unwrap();
//!
//! // Menções literalmente duplicadas são removidas na construção
//! assert_eq!(doc.mentions.len(), 1);
//! assert_eq!(doc.surface(&doc.mentions[0]), "AcmeCorp");
//! ```

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Uma menção de entidade sobre índices de palavras.
///
/// Em "Universidade de São Paulo", a menção "São Paulo" é
/// `EntityMention { start: 2, end: 3, label: "LOC" }` (fim inclusivo).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityMention {
    /// Índice da primeira palavra (inclusivo)
    pub start: usize,
    /// Índice da última palavra (inclusivo)
    pub end: usize,
    /// Tipo da entidade (ex: "PER", "ORG")
    pub label: String,
}

impl EntityMention {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// Cópia da menção transladada para um sistema de coordenadas que começa em `origin`.
    ///
    /// Assume `origin <= start`.
    pub fn rebased(&self, origin: usize) -> Self {
        Self::new(self.start - origin, self.end - origin, self.label.clone())
    }

    /// Cópia da menção deslocada `offset` posições para a direita.
    pub fn shifted(&self, offset: usize) -> Self {
        Self::new(self.start + offset, self.end + offset, self.label.clone())
    }
}

/// Um documento de entrada: palavras + menções deduplicadas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub tokens: Vec<String>,
    pub mentions: Vec<EntityMention>,
}

impl Document {
    /// Constrói um documento validando e deduplicando as menções.
    ///
    /// Duplicatas são detectadas por igualdade estrutural do triplo; a primeira
    /// ocorrência é mantida, preservando a ordem original.
    ///
    /// # Erros
    /// [`Error::InvalidMention`] se `start > end` ou `end >= tokens.len()`.
    pub fn new(tokens: Vec<String>, mentions: Vec<EntityMention>) -> Result<Self> {
        let len = tokens.len();
        let mut seen = HashSet::new();
        let mut unique = Vec::with_capacity(mentions.len());
        for mention in mentions {
            if mention.start > mention.end || mention.end >= len {
                return Err(Error::InvalidMention {
                    start: mention.start,
                    end: mention.end,
                    len,
                });
            }
            if seen.insert(mention.clone()) {
                unique.push(mention);
            }
        }
        Ok(Self {
            tokens,
            mentions: unique,
        })
    }

    /// Constrói um documento a partir de pares (palavra, tag BIO).
    pub fn from_bio(annotations: &[(&str, &str)]) -> Result<Self> {
        let tokens = annotations.iter().map(|(w, _)| w.to_string()).collect();
        let tags: Vec<&str> = annotations.iter().map(|(_, t)| *t).collect();
        Self::new(tokens, bio_to_mentions(&tags))
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Texto de superfície da menção: as palavras `start..=end` concatenadas sem separador.
    ///
    /// É a chave usada na verificação de conservação de entidades.
    pub fn surface(&self, mention: &EntityMention) -> String {
        surface_of(&self.tokens, mention)
    }
}

/// Concatena `words[start..=end]`.
pub fn surface_of(words: &[String], mention: &EntityMention) -> String {
    words[mention.start..=mention.end].concat()
}

/// Converte tags BIO em menções com fim inclusivo.
///
/// Um `I-X` sem `B-X` anterior (ou após outro tipo) abre uma nova menção.
pub fn bio_to_mentions(tags: &[&str]) -> Vec<EntityMention> {
    let mut mentions = Vec::new();
    let mut open: Option<(usize, &str)> = None;

    for (i, tag) in tags.iter().enumerate() {
        if let Some(label) = tag.strip_prefix("B-") {
            if let Some((start, current)) = open.take() {
                mentions.push(EntityMention::new(start, i - 1, current));
            }
            open = Some((i, label));
        } else if let Some(label) = tag.strip_prefix("I-") {
            match open {
                Some((_, current)) if current == label => {}
                _ => {
                    if let Some((start, current)) = open.take() {
                        mentions.push(EntityMention::new(start, i - 1, current));
                    }
                    open = Some((i, label));
                }
            }
        } else if let Some((start, current)) = open.take() {
            mentions.push(EntityMention::new(start, i - 1, current));
        }
    }

    if let Some((start, current)) = open {
        mentions.push(EntityMention::new(start, tags.len() - 1, current));
    }

    mentions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(ws: &[&str]) -> Vec<String> {
        ws.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_bio_to_mentions() {
        let tags = vec!["O", "B-PER", "I-PER", "O", "B-LOC"];
        let mentions = bio_to_mentions(&tags);
        assert_eq!(
            mentions,
            vec![EntityMention::new(1, 2, "PER"), EntityMention::new(4, 4, "LOC")]
        );
    }

    #[test]
    fn test_bio_inconsistent_inside_opens_new_mention() {
        let tags = vec!["I-ORG", "I-LOC", "B-PER", "B-PER"];
        let mentions = bio_to_mentions(&tags);
        assert_eq!(
            mentions,
            vec![
                EntityMention::new(0, 0, "ORG"),
                EntityMention::new(1, 1, "LOC"),
                EntityMention::new(2, 2, "PER"),
                EntityMention::new(3, 3, "PER"),
            ]
        );
    }

    #[test]
    fn test_duplicates_removed_in_order() {
        let doc = Document::new(
            words(&["Lula", "visitou", "Belém"]),
            vec![
                EntityMention::new(2, 2, "LOC"),
                EntityMention::new(0, 0, "PER"),
                EntityMention::new(2, 2, "LOC"),
            ],
        )
        .unwrap();
        assert_eq!(
            doc.mentions,
            vec![EntityMention::new(2, 2, "LOC"), EntityMention::new(0, 0, "PER")]
        );
    }

    #[test]
    fn test_nested_mentions_are_kept() {
        let doc = Document::new(
            words(&["Universidade", "de", "São", "Paulo"]),
            vec![EntityMention::new(0, 3, "ORG"), EntityMention::new(2, 3, "LOC")],
        )
        .unwrap();
        assert_eq!(doc.mentions.len(), 2);
        assert_eq!(doc.surface(&doc.mentions[1]), "SãoPaulo");
    }

    #[test]
    fn test_invalid_mentions_rejected() {
        let out_of_range = Document::new(words(&["a", "b"]), vec![EntityMention::new(1, 2, "X")]);
        assert!(matches!(out_of_range, Err(Error::InvalidMention { .. })));

        let reversed = Document::new(words(&["a", "b"]), vec![EntityMention::new(1, 0, "X")]);
        assert!(matches!(reversed, Err(Error::InvalidMention { .. })));
    }

    #[test]
    fn test_from_bio() {
        let doc = Document::from_bio(&[("Dom", "B-PER"), ("Pedro", "I-PER"), ("I", "I-PER"), ("reinou", "O")]).unwrap();
        assert_eq!(doc.mentions, vec![EntityMention::new(0, 2, "PER")]);
    }

    #[test]
    fn test_rebase_and_shift() {
        let m = EntityMention::new(5, 7, "ORG");
        assert_eq!(m.rebased(5), EntityMention::new(0, 2, "ORG"));
        assert_eq!(m.shifted(3), EntityMention::new(8, 10, "ORG"));
    }
}
