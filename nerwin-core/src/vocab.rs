//! # Vocabulário de Rótulos
//!
//! Mapeia cada tipo de entidade observado no split de treino para um índice
//! denso, atribuído pela **ordem lexicográfica** dos rótulos. A ordem é o que
//! garante o determinismo: duas execuções com o mesmo conjunto de tipos geram
//! exatamente o mesmo mapeamento, independentemente da ordem dos documentos.
//!
//! O vocabulário é construído uma vez por execução e depois apenas lido
//! (treino, dev e teste usam o mesmo).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::mention::Document;

/// Mapeamento congelado rótulo → índice.
///
/// Serializa como um objeto JSON ordenado `{"LOC": 0, "ORG": 1, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, usize>",
    into = "BTreeMap<String, usize>"
)]
pub struct LabelVocabulary {
    labels: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl LabelVocabulary {
    /// Coleta todos os tipos de menção dos documentos e os indexa em ordem crescente.
    ///
    /// Um conjunto vazio produz um vocabulário vazio (`len() == 0`).
    pub fn build<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let labels: BTreeSet<&str> = documents
            .into_iter()
            .flat_map(|doc| doc.mentions.iter().map(|m| m.label.as_str()))
            .collect();
        Self::from_labels(labels)
    }

    /// Constrói a partir de uma lista explícita de rótulos (ordenada e deduplicada aqui).
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let sorted: BTreeSet<String> = labels.into_iter().map(|l| l.as_ref().to_string()).collect();
        let labels: Vec<String> = sorted.into_iter().collect();
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.clone(), i))
            .collect();
        Self { labels, index }
    }

    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn label_of(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rótulos na ordem dos índices.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl From<LabelVocabulary> for BTreeMap<String, usize> {
    fn from(vocab: LabelVocabulary) -> Self {
        vocab.index
    }
}

impl TryFrom<BTreeMap<String, usize>> for LabelVocabulary {
    type Error = String;

    fn try_from(map: BTreeMap<String, usize>) -> Result<Self, Self::Error> {
        let vocab = Self::from_labels(map.keys());
        if vocab.index != map {
            return Err("os índices do vocabulário devem seguir a ordem lexicográfica dos rótulos".to_string());
        }
        Ok(vocab)
    }
}
