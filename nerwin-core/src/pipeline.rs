//! # Pipeline de Janelas — Orquestrador
//!
//! Coordena todos os módulos para transformar splits de documentos anotados em
//! janelas de treino:
//!
//! 1. **Vocabulário**: construído uma vez a partir do split de referência (`train`).
//! 2. Para cada split, um [`SubwordCache`] novo; para cada documento:
//!    - [`Segmenter`]: pontos de corte seguros;
//!    - [`WindowAccumulator`]: empacotamento guloso dos segmentos;
//!    - [`SpanEncoder`](crate::encoder::SpanEncoder): matriz de rótulos de cada janela.
//! 3. **Conservação**: as menções recuperadas das janelas, levadas de volta às
//!    coordenadas do documento, precisam ser exatamente as do documento. Qualquer
//!    diferença é um erro fatal, nunca um aviso.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use nerwin_core::{BpeLiteTokenizer, ModelFamily, PipelineConfig, TokenizerConfig, WindowPipeline};
//! use nerwin_core::mention::{Document, EntityMention};
//!
//! let tokenizer_config = TokenizerConfig::new(ModelFamily::Bert, BpeLiteTokenizer::boundary_tokens());
//! let pipeline = WindowPipeline::new(BpeLiteTokenizer::new(), tokenizer_config, PipelineConfig::default()).unwrap();
//!
//! let doc = Document::new(
//!     vec!["Acme".into(), "Corp".into(), "was".into(), "founded".into(), ".".into()],
//!     vec![EntityMention::new(0, 1, "ORG")],
//! ).unwrap();
//! let docs = vec![doc];
//! let vocab = pipeline.build_vocabulary(&docs);
//! let output = pipeline.process_split("train", &docs, &vocab).unwrap();
//!
//! assert_eq!(output.windows.len(), 1);
//! assert_eq!(output.windows[0].word_len, 5);
//! ```

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{PipelineConfig, SplitPolicy, TokenizerConfig};
use crate::corpus::CorpusBundle;
use crate::error::{Error, Result};
use crate::mention::{Document, EntityMention};
use crate::segmenter::Segmenter;
use crate::subword::{SubwordCache, SubwordTokenizer};
use crate::vocab::LabelVocabulary;
use crate::window::{PaddingSpec, Window, WindowAccumulator};

/// Estatísticas de um split processado.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitStats {
    pub documents: usize,
    pub segments: usize,
    pub windows: usize,
    pub mentions: usize,
    /// Menções com rótulo fora do vocabulário (conservadas, mas fora da matriz).
    pub unencoded_mentions: usize,
    pub max_bpe_len: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl SplitStats {
    fn absorb(&mut self, doc: &DocumentOutput) {
        self.documents += 1;
        self.segments += doc.segments;
        self.windows += doc.windows.len();
        for window in &doc.windows {
            self.mentions += window.mentions.len();
            self.unencoded_mentions += window.unencoded_mentions();
            self.max_bpe_len = self.max_bpe_len.max(window.bpe_len);
        }
        self.cache_hits += doc.cache_hits;
        self.cache_misses += doc.cache_misses;
    }
}

/// Janelas de um documento.
#[derive(Debug, Clone)]
pub struct DocumentOutput {
    pub windows: Vec<Window>,
    pub segments: usize,
    cache_hits: u64,
    cache_misses: u64,
}

/// Janelas de um split, na ordem dos documentos.
#[derive(Debug, Clone)]
pub struct SplitOutput {
    pub name: String,
    pub windows: Vec<Window>,
    pub stats: SplitStats,
}

/// Resultado de uma execução completa.
#[derive(Debug, Clone)]
pub struct ProcessedBundle {
    pub vocab: LabelVocabulary,
    pub splits: BTreeMap<String, SplitOutput>,
    pub padding: PaddingSpec,
}

/// O pipeline principal: segmentação → empacotamento → codificação.
pub struct WindowPipeline<T> {
    tokenizer: T,
    tokenizer_config: TokenizerConfig,
    config: PipelineConfig,
    segmenter: Segmenter,
}

impl<T: SubwordTokenizer + Sync> WindowPipeline<T> {
    /// Cria o pipeline, validando a configuração antes de qualquer documento.
    pub fn new(tokenizer: T, tokenizer_config: TokenizerConfig, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let segmenter = Segmenter::new(&config.sentence_end)?;
        Ok(Self {
            tokenizer,
            tokenizer_config,
            config,
            segmenter,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn tokenizer_config(&self) -> &TokenizerConfig {
        &self.tokenizer_config
    }

    pub fn padding(&self) -> PaddingSpec {
        PaddingSpec::new(self.tokenizer_config.boundary)
    }

    pub fn build_vocabulary(&self, documents: &[Document]) -> LabelVocabulary {
        LabelVocabulary::build(documents)
    }

    /// Cache novo, com a convenção de espaço da família configurada.
    pub fn new_cache(&self) -> SubwordCache<'_, T> {
        SubwordCache::new(&self.tokenizer, self.tokenizer_config.add_prefix_space)
    }

    /// Segmenta, empacota e codifica um documento, verificando a conservação das menções.
    pub fn process_document(
        &self,
        doc_index: usize,
        doc: &Document,
        vocab: &LabelVocabulary,
        policy: SplitPolicy,
        cache: &mut SubwordCache<'_, T>,
    ) -> Result<DocumentOutput> {
        let (hits, misses) = (cache.hits(), cache.misses());
        let segments = self.segmenter.split(doc, policy);

        let mut accumulator = WindowAccumulator::new(
            self.tokenizer_config.boundary,
            self.config.max_len,
            self.config.hard_limit,
            vocab,
            doc_index,
        );
        let mut windows = Vec::new();
        for segment in &segments {
            if let Some(window) = accumulator.offer(segment, cache)? {
                windows.push(window);
            }
        }
        if let Some(window) = accumulator.flush()? {
            windows.push(window);
        }

        verify_conservation(doc_index, doc, &windows)?;
        tracing::debug!(
            doc_index,
            words = doc.len(),
            segments = segments.len(),
            windows = windows.len(),
            "documento processado"
        );

        Ok(DocumentOutput {
            windows,
            segments: segments.len(),
            cache_hits: cache.hits() - hits,
            cache_misses: cache.misses() - misses,
        })
    }

    /// Processa um split inteiro com o vocabulário fornecido.
    ///
    /// Com `parallel = true`, cada worker do rayon usa seu próprio cache; a
    /// ordem da saída continua sendo a ordem dos documentos.
    pub fn process_split(&self, name: &str, documents: &[Document], vocab: &LabelVocabulary) -> Result<SplitOutput> {
        let policy = self.config.policy_for(name);
        let outputs: Vec<DocumentOutput> = if self.config.parallel {
            documents
                .par_iter()
                .enumerate()
                .map_init(
                    || self.new_cache(),
                    |cache, (i, doc)| self.process_document(i, doc, vocab, policy, cache),
                )
                .collect::<Result<_>>()?
        } else {
            let mut cache = self.new_cache();
            documents
                .iter()
                .enumerate()
                .map(|(i, doc)| self.process_document(i, doc, vocab, policy, &mut cache))
                .collect::<Result<_>>()?
        };

        let mut stats = SplitStats::default();
        let mut windows = Vec::new();
        for output in outputs {
            stats.absorb(&output);
            windows.extend(output.windows);
        }

        tracing::info!(
            split = name,
            ?policy,
            documents = stats.documents,
            windows = stats.windows,
            mentions = stats.mentions,
            unencoded = stats.unencoded_mentions,
            max_bpe_len = stats.max_bpe_len,
            cache_hits = stats.cache_hits,
            cache_misses = stats.cache_misses,
            "split processado"
        );

        Ok(SplitOutput {
            name: name.to_string(),
            windows,
            stats,
        })
    }

    /// Execução completa: vocabulário do split de referência + todos os splits.
    pub fn run(&self, bundle: &CorpusBundle) -> Result<ProcessedBundle> {
        let reference = bundle
            .get(&self.config.reference_split)
            .ok_or_else(|| Error::MissingSplit(self.config.reference_split.clone()))?;
        let vocab = self.build_vocabulary(reference);
        tracing::info!(labels = vocab.len(), "vocabulário de rótulos construído");

        let mut splits = BTreeMap::new();
        for (name, documents) in bundle.iter() {
            let output = self.process_split(name, documents, &vocab)?;
            splits.insert(name.to_string(), output);
        }

        Ok(ProcessedBundle {
            vocab,
            splits,
            padding: self.padding(),
        })
    }
}

/// Compara o multiconjunto de menções do documento com o recuperado das janelas.
fn verify_conservation(doc_index: usize, doc: &Document, windows: &[Window]) -> Result<()> {
    let mut balance: HashMap<EntityMention, isize> = HashMap::new();
    for mention in &doc.mentions {
        *balance.entry(mention.clone()).or_insert(0) += 1;
    }
    for window in windows {
        for (mention, surface) in window.document_mentions().zip(window.surfaces()) {
            let in_bounds = mention.end < doc.len() && doc.surface(&mention) == surface;
            if !in_bounds {
                return Err(Error::EntityIntegrity {
                    doc_index,
                    detail: format!("menção {mention:?} ('{surface}') desalinhada do documento"),
                });
            }
            *balance.entry(mention).or_insert(0) -= 1;
        }
    }

    let mut diff: Vec<_> = balance.into_iter().filter(|(_, n)| *n != 0).collect();
    if diff.is_empty() {
        return Ok(());
    }
    diff.sort();
    let detail = diff
        .iter()
        .map(|(m, n)| {
            let what = if *n > 0 { "perdida" } else { "duplicada" };
            format!("'{}' {}..={} {} {what}", doc.surface(m), m.start, m.end, m.label)
        })
        .collect::<Vec<_>>()
        .join(", ");
    Err(Error::EntityIntegrity { doc_index, detail })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelFamily;
    use crate::subword::BpeLiteTokenizer;
    use crate::test_support::{CharTokenizer, BOUNDARY};

    fn document(words: &[&str], mentions: Vec<EntityMention>) -> Document {
        Document::new(words.iter().map(|w| w.to_string()).collect(), mentions).unwrap()
    }

    fn char_pipeline(max_len: usize) -> WindowPipeline<CharTokenizer> {
        let config = PipelineConfig {
            max_len,
            ..PipelineConfig::default()
        };
        WindowPipeline::new(CharTokenizer, TokenizerConfig::new(ModelFamily::Bert, BOUNDARY), config).unwrap()
    }

    #[test]
    fn test_acme_corp_single_window() {
        let pipeline = char_pipeline(400);
        let docs = vec![document(
            &["Acme", "Corp", "was", "founded", "."],
            vec![EntityMention::new(0, 1, "ORG")],
        )];
        let vocab = pipeline.build_vocabulary(&docs);
        let out = pipeline.process_split("train", &docs, &vocab).unwrap();

        assert_eq!(out.windows.len(), 1);
        let w = &out.windows[0];
        assert_eq!(w.word_len, 5);
        assert_eq!(w.matrix.shape(), (5, 5, 1));
        assert_eq!(w.matrix.get(0, 1, 0), 1);
        assert_eq!(w.matrix.get(1, 0, 0), 1);
        assert_eq!(w.matrix.nnz(), 2);
        assert_eq!(w.bpe_len, 2 + "AcmeCorpwasfounded.".len());
        assert_eq!(w.indexes.len(), w.input_ids.len());
        assert_eq!(w.tokens, vec!["Acme", "Corp", "was", "founded", "."]);
    }

    #[test]
    fn test_long_document_splits_into_expected_windows() {
        // 6 sentenças de 10 subpalavras cada
        let sentence = ["abcd", "efg", "hi", "."]; // 4 + 3 + 2 + 1 = 10 subpalavras
        let mut words = Vec::new();
        let mut mentions = Vec::new();
        for s in 0..6 {
            mentions.push(EntityMention::new(s * 4, s * 4 + 1, if s % 2 == 0 { "PER" } else { "ORG" }));
            words.extend(sentence);
        }
        let docs = vec![document(&words, mentions)];
        // [CLS] + 2 sentenças (20) + [SEP] = 22 <= 25; uma terceira não cabe
        let pipeline = char_pipeline(25);
        let vocab = pipeline.build_vocabulary(&docs);
        let out = pipeline.process_split("train", &docs, &vocab).unwrap();

        assert_eq!(out.windows.len(), 3);
        for w in &out.windows {
            assert_eq!(w.bpe_len, 22);
            assert!(w.bpe_len <= 25);
            assert_eq!(w.word_len, 8);
            assert_eq!(w.ent_target.len(), 2);
        }
        assert_eq!(out.stats.mentions, 6);
        assert_eq!(out.stats.segments, 6);
        assert_eq!(out.windows[2].word_offset, 16);
    }

    #[test]
    fn test_length_only_split_is_one_segment() {
        let mut config = PipelineConfig {
            max_len: 400,
            ..PipelineConfig::default()
        };
        config.length_only_splits.insert("test".to_string());
        let pipeline =
            WindowPipeline::new(CharTokenizer, TokenizerConfig::new(ModelFamily::Bert, BOUNDARY), config).unwrap();
        let docs = vec![document(&["a", ".", "b", "."], vec![])];
        let vocab = LabelVocabulary::default();

        let test = pipeline.process_split("test", &docs, &vocab).unwrap();
        assert_eq!(test.stats.segments, 1);
        let dev = pipeline.process_split("dev", &docs, &vocab).unwrap();
        assert_eq!(dev.stats.segments, 2);
        assert_eq!(test.windows.len(), 1);
        assert_eq!(test.windows[0].input_ids, dev.windows[0].input_ids);
        assert_eq!(dev.windows[0].segment_range, (0, 1));
    }

    #[test]
    fn test_overflowing_segment_is_fatal() {
        let config = PipelineConfig {
            max_len: 5,
            hard_limit: 8,
            ..PipelineConfig::default()
        };
        let pipeline =
            WindowPipeline::new(CharTokenizer, TokenizerConfig::new(ModelFamily::Bert, BOUNDARY), config).unwrap();
        let docs = vec![document(&["ab", "."], vec![]), document(&["abcdefgh", "."], vec![])];
        let err = pipeline
            .process_split("train", &docs, &LabelVocabulary::default())
            .unwrap_err();
        assert!(matches!(err, Error::WindowOverflow { doc_index: 1, .. }));
    }

    #[test]
    fn test_conservation_detects_lost_mention() {
        let doc = document(&["a", "b"], vec![EntityMention::new(0, 0, "X"), EntityMention::new(1, 1, "Y")]);
        let window = Window {
            input_ids: vec![],
            indexes: vec![],
            bpe_len: 0,
            word_len: 2,
            matrix: crate::encoder::SparseLabelMatrix::zeros(2, 2),
            ent_target: vec![],
            tokens: vec!["a".into(), "b".into()],
            doc_index: 0,
            word_offset: 0,
            segment_range: (0, 0),
            mentions: vec![EntityMention::new(0, 0, "X")],
        };
        let err = verify_conservation(0, &doc, &[window.clone()]).unwrap_err();
        assert!(matches!(err, Error::EntityIntegrity { .. }));

        let mut duplicated = window;
        duplicated.mentions = vec![
            EntityMention::new(0, 0, "X"),
            EntityMention::new(1, 1, "Y"),
            EntityMention::new(1, 1, "Y"),
        ];
        assert!(verify_conservation(0, &doc, &[duplicated]).is_err());
    }

    #[test]
    fn test_run_requires_train_split() {
        let pipeline = char_pipeline(400);
        let mut bundle = CorpusBundle::new();
        bundle.insert("dev", vec![]);
        assert!(matches!(pipeline.run(&bundle), Err(Error::MissingSplit(_))));
    }

    #[test]
    fn test_run_uses_train_vocabulary_everywhere() {
        let pipeline = char_pipeline(400);
        let mut bundle = CorpusBundle::new();
        bundle.insert("train", vec![document(&["Lula", "."], vec![EntityMention::new(0, 0, "PER")])]);
        bundle.insert(
            "dev",
            vec![document(
                &["Belém", "em", "2023", "."],
                vec![EntityMention::new(0, 0, "LOC"), EntityMention::new(2, 2, "PER")],
            )],
        );
        let out = pipeline.run(&bundle).unwrap();
        assert_eq!(out.vocab.labels(), &["PER"]);
        let dev = &out.splits["dev"];
        assert_eq!(dev.stats.unencoded_mentions, 1);
        assert_eq!(dev.windows[0].ent_target, vec![(2, 2, 0)]);
        assert_eq!(dev.windows[0].matrix.shape(), (4, 4, 1));
        assert_eq!(out.padding.matrix, -100);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let docs: Vec<Document> = (0..20)
            .map(|i| {
                document(
                    &["Dom", "Pedro", "I", "reinou", ".", "Fim", "."],
                    vec![EntityMention::new(0, 2, if i % 3 == 0 { "PER" } else { "MISC" })],
                )
            })
            .collect();
        let tokenizer_config = TokenizerConfig::new(ModelFamily::Roberta, BpeLiteTokenizer::boundary_tokens());
        let sequential = WindowPipeline::new(
            BpeLiteTokenizer::new(),
            tokenizer_config,
            PipelineConfig { max_len: 16, ..PipelineConfig::default() },
        )
        .unwrap();
        let parallel = WindowPipeline::new(
            BpeLiteTokenizer::new(),
            tokenizer_config,
            PipelineConfig { max_len: 16, parallel: true, ..PipelineConfig::default() },
        )
        .unwrap();

        let vocab = sequential.build_vocabulary(&docs);
        let a = sequential.process_split("train", &docs, &vocab).unwrap();
        let b = parallel.process_split("train", &docs, &vocab).unwrap();
        assert_eq!(a.windows, b.windows);
        assert_eq!(
            serde_json::to_string(&a.windows).unwrap(),
            serde_json::to_string(&b.windows).unwrap()
        );
    }

    #[test]
    fn test_empty_document_produces_no_windows() {
        let pipeline = char_pipeline(400);
        let docs = vec![document(&[], vec![])];
        let out = pipeline.process_split("train", &docs, &LabelVocabulary::default()).unwrap();
        assert!(out.windows.is_empty());
        assert_eq!(out.stats.documents, 1);
    }
}
