//! # Matriz Esparsa de Rótulos
//!
//! Para cada janela, as menções viram uma matriz conceitual `(n × n × L)`:
//! `n` palavras locais, `L` rótulos. Cada menção `(s, e, l)` liga **as duas**
//! células `(s, e, l)` e `(e, s, l)`, de modo que o modelo pode ler o span em
//! qualquer ordem.
//!
//! A matriz densa nunca é materializada: guardamos apenas as coordenadas não
//! nulas (formato COO), em ordem, o que torna a serialização determinística.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::mention::EntityMention;
use crate::vocab::LabelVocabulary;

/// Valor de padding da matriz: "ignorar na loss".
pub const MATRIX_PAD_VALUE: i8 = -100;

/// Matriz `(n × n × L)` de presença de spans, em formato COO.
///
/// Serializa como `{"shape": [n, n, L], "coords": [[i, j, k], ...], "data": [1, ...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "CooRepr", try_from = "CooRepr")]
pub struct SparseLabelMatrix {
    shape: (usize, usize, usize),
    coords: BTreeSet<(usize, usize, usize)>,
}

#[derive(Serialize, Deserialize)]
struct CooRepr {
    shape: [usize; 3],
    coords: Vec<[usize; 3]>,
    data: Vec<i8>,
}

impl From<SparseLabelMatrix> for CooRepr {
    fn from(m: SparseLabelMatrix) -> Self {
        let coords: Vec<[usize; 3]> = m.coords.iter().map(|&(i, j, k)| [i, j, k]).collect();
        Self {
            shape: [m.shape.0, m.shape.1, m.shape.2],
            data: vec![1; coords.len()],
            coords,
        }
    }
}

impl TryFrom<CooRepr> for SparseLabelMatrix {
    type Error = String;

    fn try_from(repr: CooRepr) -> Result<Self, Self::Error> {
        if repr.coords.len() != repr.data.len() {
            return Err(format!(
                "coords tem {} entradas, data tem {}",
                repr.coords.len(),
                repr.data.len()
            ));
        }
        let [n, m, l] = repr.shape;
        let mut coords = BTreeSet::new();
        for (&[i, j, k], &v) in repr.coords.iter().zip(&repr.data) {
            if i >= n || j >= m || k >= l {
                return Err(format!("coordenada ({i}, {j}, {k}) fora da forma ({n}, {m}, {l})"));
            }
            if v != 0 {
                coords.insert((i, j, k));
            }
        }
        Ok(Self {
            shape: (n, m, l),
            coords,
        })
    }
}

impl SparseLabelMatrix {
    /// Matriz toda zero com a forma `(words × words × labels)`.
    pub fn zeros(words: usize, labels: usize) -> Self {
        Self {
            shape: (words, words, labels),
            coords: BTreeSet::new(),
        }
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.shape
    }

    /// Liga `(i, j, k)` e `(j, i, k)`. Repetir é idempotente.
    ///
    /// Coordenadas fora da forma são ignoradas.
    pub fn set_symmetric(&mut self, i: usize, j: usize, k: usize) {
        let (n, _, l) = self.shape;
        if i < n && j < n && k < l {
            self.coords.insert((i, j, k));
            self.coords.insert((j, i, k));
        }
    }

    pub fn get(&self, i: usize, j: usize, k: usize) -> u8 {
        u8::from(self.coords.contains(&(i, j, k)))
    }

    /// Número de células não nulas.
    pub fn nnz(&self) -> usize {
        self.coords.len()
    }

    /// Coordenadas não nulas em ordem lexicográfica.
    pub fn coords(&self) -> impl Iterator<Item = (usize, usize, usize)> + '_ {
        self.coords.iter().copied()
    }

    /// Versão densa (row-major) preenchida até `padded_words × padded_words × L`.
    ///
    /// Células fora da janela recebem [`MATRIX_PAD_VALUE`]; é o contrato de
    /// padding esperado por quem monta os batches.
    pub fn to_dense_padded(&self, padded_words: usize) -> Vec<i8> {
        let (n, _, l) = self.shape;
        let p = padded_words.max(n);
        let mut dense = vec![MATRIX_PAD_VALUE; p * p * l];
        for i in 0..n {
            for j in 0..n {
                let row = (i * p + j) * l;
                dense[row..row + l].fill(0);
            }
        }
        for (i, j, k) in self.coords() {
            dense[(i * p + j) * l + k] = 1;
        }
        dense
    }
}

/// Resultado da codificação de uma janela.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSpans {
    pub matrix: SparseLabelMatrix,
    /// `(start, end, label_index)` das menções codificadas, em ordem de entrada.
    pub targets: Vec<(usize, usize, usize)>,
    /// Menções cujo rótulo não está no vocabulário.
    pub unknown: Vec<EntityMention>,
}

/// Constrói a matriz de rótulos de uma janela.
pub struct SpanEncoder;

impl SpanEncoder {
    /// Codifica as menções locais de uma janela de `word_count` palavras.
    ///
    /// Menções com rótulo fora do vocabulário não entram na matriz; são
    /// devolvidas em [`EncodedSpans::unknown`] para o chamador decidir.
    pub fn encode(word_count: usize, mentions: &[EntityMention], vocab: &LabelVocabulary) -> EncodedSpans {
        let mut matrix = SparseLabelMatrix::zeros(word_count, vocab.len());
        let mut targets = Vec::with_capacity(mentions.len());
        let mut unknown = Vec::new();

        for mention in mentions {
            match vocab.index_of(&mention.label) {
                Some(k) => {
                    matrix.set_symmetric(mention.start, mention.end, k);
                    targets.push((mention.start, mention.end, k));
                }
                None => unknown.push(mention.clone()),
            }
        }

        EncodedSpans {
            matrix,
            targets,
            unknown,
        }
    }
}
