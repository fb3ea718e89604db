//! # Corpus em JSON Lines
//!
//! Cada linha do arquivo de entrada é um documento:
//!
//! ```json
//! {"tokens": ["Acme", "Corp", "was", "founded", "."],
//!  "entity_mentions": [{"start": 0, "end": 2, "entity_type": "ORG"}]}
//! ```
//!
//! No arquivo o `end` é **exclusivo**; ao carregar ele vira inclusivo
//! (`end - 1`) e menções duplicadas são removidas. A saída é um arquivo JSON
//! Lines com uma [`Window`] por linha.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::mention::{Document, EntityMention};
use crate::window::Window;

/// Menção como aparece no arquivo (fim exclusivo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMention {
    pub start: usize,
    pub end: usize,
    pub entity_type: String,
}

/// Uma linha do corpus de entrada.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusRecord {
    pub tokens: Vec<String>,
    #[serde(default)]
    pub entity_mentions: Vec<RawMention>,
}

impl CorpusRecord {
    /// Converte para [`Document`]: fim inclusivo e menções deduplicadas.
    pub fn into_document(self) -> Result<Document> {
        let len = self.tokens.len();
        let mut mentions = Vec::with_capacity(self.entity_mentions.len());
        for raw in self.entity_mentions {
            if raw.end <= raw.start {
                return Err(Error::InvalidMention {
                    start: raw.start,
                    end: raw.end,
                    len,
                });
            }
            mentions.push(EntityMention::new(raw.start, raw.end - 1, raw.entity_type));
        }
        Document::new(self.tokens, mentions)
    }
}

impl From<&Document> for CorpusRecord {
    fn from(doc: &Document) -> Self {
        Self {
            tokens: doc.tokens.clone(),
            entity_mentions: doc
                .mentions
                .iter()
                .map(|m| RawMention {
                    start: m.start,
                    end: m.end + 1,
                    entity_type: m.label.clone(),
                })
                .collect(),
        }
    }
}

/// Lê documentos de um leitor JSON Lines. Linhas em branco são ignoradas.
pub fn read_documents<R: BufRead>(reader: R) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CorpusRecord =
            serde_json::from_str(&line).map_err(|source| Error::Json { line: i + 1, source })?;
        documents.push(record.into_document()?);
    }
    Ok(documents)
}

pub fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Document>> {
    let file = File::open(path)?;
    read_documents(BufReader::new(file))
}

/// Escreve uma janela por linha.
pub fn write_windows<'a, W: Write>(mut writer: W, windows: impl IntoIterator<Item = &'a Window>) -> Result<()> {
    for (i, window) in windows.into_iter().enumerate() {
        serde_json::to_writer(&mut writer, window).map_err(|source| Error::Json { line: i + 1, source })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_windows<'a>(path: impl AsRef<Path>, windows: impl IntoIterator<Item = &'a Window>) -> Result<()> {
    let file = File::create(path)?;
    write_windows(BufWriter::new(file), windows)
}

/// Conjunto de splits nomeados (train, dev, test...).
#[derive(Debug, Clone, Default)]
pub struct CorpusBundle {
    splits: BTreeMap<String, Vec<Document>>,
}

impl CorpusBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, documents: Vec<Document>) {
        self.splits.insert(name.into(), documents);
    }

    /// Carrega um split de um arquivo JSON Lines.
    pub fn load_split(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<()> {
        let name = name.into();
        let documents = load_documents(path.as_ref())?;
        tracing::info!(split = %name, documents = documents.len(), path = %path.as_ref().display(), "split carregado");
        self.insert(name, documents);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[Document]> {
        self.splits.get(name).map(Vec::as_slice)
    }

    /// Splits em ordem de nome.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Document])> {
        self.splits.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }
}
