//! Adaptador para tokenizadores `tokenizer.json` do HuggingFace.

use std::path::Path;

use anyhow::anyhow;
use nerwin_core::{BoundaryTokens, Error, ModelFamily, SubwordTokenizer};
use tokenizers::Tokenizer;

pub struct HfTokenizer {
    inner: Tokenizer,
}

impl HfTokenizer {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let inner = Tokenizer::from_file(path)
            .map_err(|e| anyhow!("falha ao carregar {}: {e}", path.display()))?;
        Ok(Self { inner })
    }

    fn find(&self, candidates: &[&str], role: &str) -> anyhow::Result<u32> {
        candidates
            .iter()
            .find_map(|token| self.inner.token_to_id(token))
            .ok_or_else(|| anyhow!("token de {role} não encontrado (candidatos: {candidates:?})"))
    }

    /// IDs de início, fim e padding conforme a convenção da família.
    pub fn boundary_tokens(&self, family: ModelFamily) -> anyhow::Result<BoundaryTokens> {
        let names = family.special_token_candidates();
        Ok(BoundaryTokens {
            start: self.find(names.start, "início")?,
            end: self.find(names.end, "fim")?,
            pad: self.find(names.pad, "padding")?,
        })
    }
}

impl SubwordTokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> nerwin_core::Result<Vec<u32>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| Error::tokenizer(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }
}
