//! Subcomando `build`: splits JSON Lines → janelas em disco.
//!
//! Para cada split `nome` é escrito `nome.jsonl` (uma janela por linha). Também
//! são gravados `label2idx.json`, `padding.json` e `stats.json`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::Context;
use nerwin_core::corpus::save_windows;
use nerwin_core::{CorpusBundle, ProcessedBundle, SplitStats, WindowPipeline};
use tracing::info;

use crate::cli::BuildArgs;
use crate::tokenizer;

pub fn run(args: &BuildArgs) -> anyhow::Result<()> {
    let config = args.pipeline.pipeline_config()?;
    let loaded = tokenizer::load(&args.pipeline.model_name, args.pipeline.tokenizer.as_deref())?;

    let mut bundle = CorpusBundle::new();
    let inputs = [
        ("train", Some(&args.train)),
        ("dev", args.dev.as_ref()),
        ("test", args.test.as_ref()),
    ];
    for (name, path) in inputs {
        if let Some(path) = path {
            bundle
                .load_split(name, path)
                .with_context(|| format!("carregando split {name} de {}", path.display()))?;
        }
    }

    let pipeline = WindowPipeline::new(loaded.tokenizer, loaded.config, config)?;
    let processed = pipeline.run(&bundle)?;
    write_outputs(&args.out_dir, &processed)?;

    info!(out_dir = %args.out_dir.display(), splits = processed.splits.len(), "janelas gravadas");
    Ok(())
}

pub fn write_outputs(out_dir: &Path, processed: &ProcessedBundle) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir).with_context(|| format!("criando {}", out_dir.display()))?;

    let mut stats: BTreeMap<&str, &SplitStats> = BTreeMap::new();
    for (name, split) in &processed.splits {
        let path = out_dir.join(format!("{name}.jsonl"));
        save_windows(&path, &split.windows).with_context(|| format!("gravando {}", path.display()))?;
        stats.insert(name, &split.stats);
    }

    write_json(&out_dir.join("label2idx.json"), &processed.vocab)?;
    write_json(&out_dir.join("padding.json"), &processed.padding)?;
    write_json(&out_dir.join("stats.json"), &stats)?;
    Ok(())
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("gravando {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::PipelineArgs;

    const TRAIN: &str = r#"{"tokens": ["Acme", "Corp", "was", "founded", "."], "entity_mentions": [{"start": 0, "end": 2, "entity_type": "ORG"}]}
{"tokens": ["Lula", "visitou", "Belém", "."], "entity_mentions": [{"start": 0, "end": 1, "entity_type": "PER"}, {"start": 2, "end": 3, "entity_type": "LOC"}]}
"#;

    #[test]
    fn test_build_writes_all_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("train.jsonl");
        fs::write(&train, TRAIN).unwrap();
        let out_dir = dir.path().join("out");

        let args = BuildArgs {
            train,
            dev: None,
            test: None,
            out_dir: out_dir.clone(),
            pipeline: PipelineArgs {
                model_name: "bert-base-cased".to_string(),
                tokenizer: None,
                config: None,
                max_len: None,
                length_only: vec![],
                parallel: false,
            },
        };
        run(&args).unwrap();

        let windows = fs::read_to_string(out_dir.join("train.jsonl")).unwrap();
        assert_eq!(windows.lines().count(), 2);
        let first: serde_json::Value = serde_json::from_str(windows.lines().next().unwrap()).unwrap();
        assert_eq!(first["word_len"], 5);
        assert_eq!(first["ent_target"], serde_json::json!([[0, 1, 1]]));

        let vocab: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out_dir.join("label2idx.json")).unwrap()).unwrap();
        assert_eq!(vocab, serde_json::json!({"LOC": 0, "ORG": 1, "PER": 2}));

        let padding: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out_dir.join("padding.json")).unwrap()).unwrap();
        assert_eq!(padding["matrix"], -100);
        assert!(out_dir.join("stats.json").exists());
    }
}
